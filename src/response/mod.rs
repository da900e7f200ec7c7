//! Response handling module - payload decoding and image file storage

pub mod base64;
pub mod file;
