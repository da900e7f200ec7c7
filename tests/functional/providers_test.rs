//! Functional tests for the provider clients against a mock HTTP server

use image_gen_orchestrator::config::ProviderConfig;
use image_gen_orchestrator::provider::credentials::ApiKey;
use image_gen_orchestrator::provider::dalle::DalleProvider;
use image_gen_orchestrator::provider::gpt_image::GptImageProvider;
use image_gen_orchestrator::provider::imagen::ImagenProvider;
use image_gen_orchestrator::provider::nano_banana::NanoBananaProvider;
use image_gen_orchestrator::provider::{
    ConversationOptions, ConversationalProvider, GenerationParams, ImageProvider,
};
use image_gen_orchestrator::response::base64;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

fn key() -> Option<ApiKey> {
    ApiKey::new("test-key")
}

async fn last_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let request = requests.last().unwrap();
    serde_json::from_slice(&request.body).unwrap()
}

fn gemini_image_response(data: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    {"text": "thinking about it", "thought": true},
                    {"text": "Here is your image"},
                    {"inlineData": {"mimeType": "image/png", "data": data}}
                ]
            }
        }]
    })
}

#[tokio::test]
async fn test_imagen_generates_and_writes_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/imagen-4.0-ultra-generate-001:predict"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_json(json!({
            "instances": [{"prompt": "a lighthouse"}],
            "parameters": {"sampleCount": 1, "aspectRatio": "16:9"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"bytesBase64Encoded": base64::encode(PNG_BYTES)}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let imagen =
        ImagenProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key()).unwrap();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("nested/lighthouse.png");
    let params = GenerationParams {
        quality: Some("ultra".to_string()),
        aspect_ratio: Some("16:9".to_string()),
        ..GenerationParams::default()
    };

    let output = imagen
        .generate("a lighthouse", &destination, &params)
        .await
        .unwrap();

    assert_eq!(output.cost, 0.06);
    assert_eq!(output.locator, format!("file://{}", destination.display()));
    assert_eq!(std::fs::read(&destination).unwrap(), PNG_BYTES);
}

#[tokio::test]
async fn test_imagen_empty_predictions_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
        .mount(&server)
        .await;

    let imagen =
        ImagenProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key()).unwrap();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("none.png");

    let err = imagen
        .generate("a cat", &destination, &GenerationParams::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "No image data in Imagen response");
    assert!(!destination.exists());
}

#[tokio::test]
async fn test_imagen_http_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let imagen =
        ImagenProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key()).unwrap();
    let dir = TempDir::new().unwrap();

    let err = imagen
        .generate("a cat", &dir.path().join("x.png"), &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(!err.is_configuration());
    let message = err.to_string();
    assert!(message.contains("429"));
    assert!(message.contains("quota exceeded"));
}

#[tokio::test]
async fn test_availability_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("pageSize", "1"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    let config = ProviderConfig::with_base_url(server.uri());
    let imagen = ImagenProvider::with_api_key(&config, key()).unwrap();
    assert!(imagen.check_availability().await);

    let rejected = ImagenProvider::with_api_key(&config, ApiKey::new("wrong-key")).unwrap();
    assert!(!rejected.check_availability().await);
}

#[tokio::test]
async fn test_unreachable_provider_is_unavailable() {
    // Nothing listens on port 9 on a test host
    let config = ProviderConfig {
        base_url: Some("http://127.0.0.1:9".to_string()),
        timeout_ms: Some(2_000),
        ..ProviderConfig::default()
    };
    let dalle = DalleProvider::with_api_key(&config, key()).unwrap();
    assert!(!dalle.check_availability().await);
}

#[tokio::test]
async fn test_unconfigured_providers_never_touch_the_network() {
    let server = MockServer::start().await;
    let config = ProviderConfig::with_base_url(server.uri());
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("x.png");
    let params = GenerationParams::default();

    let providers: Vec<Box<dyn ImageProvider>> = vec![
        Box::new(ImagenProvider::with_api_key(&config, None).unwrap()),
        Box::new(NanoBananaProvider::with_api_key(&config, None).unwrap()),
        Box::new(DalleProvider::with_api_key(&config, None).unwrap()),
        Box::new(GptImageProvider::with_api_key(&config, None).unwrap()),
    ];

    for provider in &providers {
        assert!(!provider.check_availability().await);
        let err = provider
            .generate("a cat", &destination, &params)
            .await
            .unwrap_err();
        assert!(err.is_configuration(), "{} should need a key", provider.name());
        assert!(err.to_string().contains("API key not configured"));
    }

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unconfigured_hint_names_the_variable() {
    let config = ProviderConfig {
        api_key_env: Some("MY_OPENAI_KEY".to_string()),
        ..ProviderConfig::default()
    };
    let dalle = DalleProvider::with_api_key(&config, None).unwrap();
    let dir = TempDir::new().unwrap();

    let err = dalle
        .generate("a cat", &dir.path().join("x.png"), &GenerationParams::default())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "OpenAI API key not configured. Please set MY_OPENAI_KEY environment variable."
    );
}

#[tokio::test]
async fn test_dalle_downloads_hosted_image() {
    let server = MockServer::start().await;
    let image_url = format!("{}/files/img-123.png", server.uri());

    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"url": image_url, "revised_prompt": "a friendly cat"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/img-123.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let dalle =
        DalleProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key()).unwrap();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("cat.png");

    let output = dalle
        .generate("a cat", &destination, &GenerationParams::with_quality("hd"))
        .await
        .unwrap();

    assert_eq!(output.locator, image_url);
    assert_eq!(output.cost, 0.080);
    assert_eq!(std::fs::read(&destination).unwrap(), PNG_BYTES);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "dall-e-3");
    assert_eq!(body["quality"], "hd");
    assert_eq!(body["size"], "1024x1024");
    assert_eq!(body["response_format"], "url");
}

#[tokio::test]
async fn test_gpt_image_decodes_inline_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"b64_json": base64::encode(PNG_BYTES)}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gpt = GptImageProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key())
        .unwrap();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("cat.png");

    let output = gpt
        .generate("a cat", &destination, &GenerationParams::with_quality("standard"))
        .await
        .unwrap();

    assert_eq!(output.cost, 0.040);
    assert_eq!(output.locator, format!("file://{}", destination.display()));
    assert_eq!(std::fs::read(&destination).unwrap(), PNG_BYTES);

    let body = last_body(&server).await;
    assert_eq!(body["model"], "gpt-image-1");
    assert_eq!(body["quality"], "medium");
}

#[tokio::test]
async fn test_gpt_image_uses_edits_with_reference_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images/edits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"b64_json": base64::encode(PNG_BYTES)}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("reference.png");
    std::fs::write(&reference, PNG_BYTES).unwrap();

    let gpt = GptImageProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key())
        .unwrap();
    let params = GenerationParams {
        quality: Some("low".to_string()),
        reference_image: Some(reference),
        ..GenerationParams::default()
    };

    let output = gpt
        .generate("make it blue", &dir.path().join("edited.png"), &params)
        .await
        .unwrap();

    assert_eq!(output.cost, 0.020);
    let requests = server.received_requests().await.unwrap();
    let form = String::from_utf8_lossy(&requests[0].body);
    assert!(form.contains("name=\"image\""));
    assert!(form.contains("make it blue"));
    assert!(form.contains("gpt-image-1"));
}

#[tokio::test]
async fn test_nano_banana_skips_thought_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-3-pro-image-preview:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_image_response(&base64::encode(PNG_BYTES))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let nano = NanoBananaProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key())
        .unwrap();
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("cat.png");

    let output = nano
        .generate("a cat", &destination, &GenerationParams::with_resolution("2K"))
        .await
        .unwrap();

    assert_eq!(output.cost, 0.050);
    assert_eq!(std::fs::read(&destination).unwrap(), PNG_BYTES);

    let body = last_body(&server).await;
    assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "2K");
    assert_eq!(
        body["generationConfig"]["responseModalities"],
        json!(["TEXT", "IMAGE"])
    );
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn test_nano_banana_blocked_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let nano = NanoBananaProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key())
        .unwrap();
    let dir = TempDir::new().unwrap();

    let err = nano
        .generate("a cat", &dir.path().join("x.png"), &GenerationParams::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("SAFETY"));
}

#[tokio::test]
async fn test_nano_banana_conversation_replays_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-3-pro-image-preview:generateContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_image_response(&base64::encode(PNG_BYTES))),
        )
        .expect(2)
        .mount(&server)
        .await;

    let nano = NanoBananaProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key())
        .unwrap();
    let handle = nano
        .create_conversation(ConversationOptions {
            use_thinking: false,
            use_search: true,
        })
        .unwrap();
    let params = GenerationParams {
        conversation_id: Some(handle.clone()),
        ..GenerationParams::default()
    };
    let dir = TempDir::new().unwrap();

    nano.generate("a red car", &dir.path().join("1.png"), &params)
        .await
        .unwrap();
    assert_eq!(nano.conversation_turns(&handle).await, Some(2));

    nano.generate("now make it blue", &dir.path().join("2.png"), &params)
        .await
        .unwrap();
    assert_eq!(nano.conversation_turns(&handle).await, Some(4));

    let body = last_body(&server).await;
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["parts"][0]["text"], "now make it blue");
    assert_eq!(body["tools"], json!([{"googleSearch": {}}]));
    assert_eq!(
        body["generationConfig"]["thinkingConfig"]["includeThoughts"],
        false
    );

    nano.close_conversation(&handle);
    assert!(nano.conversation_turns(&handle).await.is_none());
}

#[tokio::test]
async fn test_nano_banana_concurrent_turns_run_one_at_a_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-3-pro-image-preview:generateContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_image_response(&base64::encode(PNG_BYTES)))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let nano = NanoBananaProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key())
        .unwrap();
    let handle = nano
        .create_conversation(ConversationOptions::default())
        .unwrap();
    let params = GenerationParams {
        conversation_id: Some(handle.clone()),
        ..GenerationParams::default()
    };
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("1.png");
    let second = dir.path().join("2.png");

    let (a, b) = tokio::join!(
        nano.generate("a red car", &first, &params),
        nano.generate("a blue car", &second, &params),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(nano.conversation_turns(&handle).await, Some(4));

    // The second turn saw the first one's history
    let requests = server.received_requests().await.unwrap();
    let mut lengths: Vec<usize> = requests
        .iter()
        .map(|request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            body["contents"].as_array().unwrap().len()
        })
        .collect();
    lengths.sort();
    assert_eq!(lengths, vec![1, 3]);
}

#[tokio::test]
async fn test_nano_banana_failed_turn_leaves_history_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let nano = NanoBananaProvider::with_api_key(&ProviderConfig::with_base_url(server.uri()), key())
        .unwrap();
    let handle = nano
        .create_conversation(ConversationOptions::default())
        .unwrap();
    let params = GenerationParams {
        conversation_id: Some(handle.clone()),
        ..GenerationParams::default()
    };
    let dir = TempDir::new().unwrap();

    assert!(nano
        .generate("a red car", &dir.path().join("1.png"), &params)
        .await
        .is_err());
    assert_eq!(nano.conversation_turns(&handle).await, Some(0));
}
