//! Operation dispatcher - generic tool envelope over the orchestrator

pub mod dispatcher;
pub mod operation;

pub use dispatcher::{Dispatcher, ToolResult, TOOL_DESCRIPTION, TOOL_NAME};
pub use operation::{Operation, OperationError, VALID_OPERATIONS};
