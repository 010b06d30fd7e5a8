use commonai::{create_service, Config, Content, Error};
use futures::StreamExt;
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}

#[tokio::test]
async fn test_openai_chat_round_trip() {
    init_logging();

    let mock_server = MockServer::start().await;

    // Second turn: the request must carry the first exchange.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "Be terse."},
                {"role": "user", "content": "Hello."},
                {"role": "assistant", "content": "Hi there!"},
                {"role": "user", "content": "Give three points."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-2",
            "object": "chat.completion",
            "created": 1234567891,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "One. Two. Three."},
                "finish_reason": "stop"
            }]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1234567890,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there!"},
                "finish_reason": "stop"
            }]
        })))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let config = Config::new()
        .with_provider("openai")
        .with_openai_key("sk-test")
        .with_base_url(mock_server.uri());
    let service = create_service(&config).unwrap();
    let model = service.model("gpt-4o-mini");

    let mut chat = model.start_chat(vec![Content::system("Be terse.")]);
    let first = chat.send(vec![Content::user("Hello.")]).await.unwrap();
    let second = chat.send(vec![Content::user("Give three points.")]).await.unwrap();

    assert_eq!(first.text, "Hi there!");
    assert_eq!(second.text, "One. Two. Three.");
    assert_eq!(chat.history().len(), 5);
}

#[tokio::test]
async fn test_ollama_stream_through_factory() {
    init_logging();

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Rust \"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"is fast.\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        )))
        .mount(&mock_server)
        .await;

    let config = Config::new()
        .with_provider("ollama")
        .with_base_url(mock_server.uri());
    let service = create_service(&config).unwrap();
    let mut chat = service.model("llama3.2").start_chat(Vec::new());

    let texts: Vec<String> = chat
        .send_stream(vec![Content::user("Describe Rust.")])
        .map(|item| item.unwrap().text)
        .collect()
        .await;

    assert_eq!(texts, vec!["Rust ", "Rust is fast."]);
    assert_eq!(
        chat.history(),
        vec![Content::user("Describe Rust."), Content::model("Rust is fast.")]
    );
}

#[tokio::test]
async fn test_apple_bridge_unavailable_without_server() {
    init_logging();

    // Bind and release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let config = Config::new()
        .with_provider("apple")
        .with_base_url(format!("http://{address}"));
    let service = create_service(&config).unwrap();

    let err = service
        .model("apple.system.general")
        .generate_text("Hello")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProviderUnavailable { .. }));
}
