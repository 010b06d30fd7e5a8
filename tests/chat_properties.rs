//! Behavioral properties of the public API, driven by a deterministic
//! in-process backend.

use std::sync::Arc;

use commonai::async_trait;
use commonai::stream::{StreamUpdate, UpdateStream};
use commonai::{
    Chat, Choice, Completion, Content, Error, HistoryChat, Message, Model, ModelInfo, Result,
    Role, Service, StreamSource, Transcript, TranscriptEntry, TransportError,
};
use futures::{stream, StreamExt};

/// Answers with "echo: <prompt>" and reveals it as growing snapshots, one
/// word at a time. When `fail` is set every call errors before producing
/// anything.
#[derive(Clone)]
struct EchoModel {
    fail: bool,
}

impl EchoModel {
    fn reply(&self, contents: &[Content]) -> Result<String> {
        if self.fail {
            return Err(TransportError::Stream("backend offline".into()).into());
        }
        let context = Transcript::reconcile(contents)?;
        Ok(format!("echo: {}", context.prompt))
    }
}

#[async_trait]
impl Model for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, contents: &[Content]) -> Result<Completion> {
        let text = self.reply(contents)?;
        Ok(Completion::new(
            "echo",
            vec![Choice::new(0, Message::model(text), Some("stop".into()))],
        ))
    }

    fn start_chat(&self, history: Vec<Content>) -> Box<dyn Chat> {
        Box::new(HistoryChat::new(self.clone(), history))
    }
}

#[async_trait]
impl StreamSource for EchoModel {
    async fn open_stream(&self, contents: Vec<Content>) -> Result<UpdateStream> {
        let text = self.reply(&contents)?;
        let snapshots: Vec<Result<StreamUpdate>> = text
            .char_indices()
            .filter(|(_, c)| *c == ' ')
            .map(|(end, _)| text[..end].to_string())
            .chain(std::iter::once(text.clone()))
            .map(|snapshot| Ok(StreamUpdate::Snapshot(snapshot)))
            .collect();
        Ok(stream::iter(snapshots).boxed())
    }
}

struct EchoService;

#[async_trait]
impl Service for EchoService {
    fn provider_name(&self) -> &str {
        "Echo"
    }

    fn model(&self, _name: &str) -> Arc<dyn Model> {
        Arc::new(EchoModel { fail: false })
    }

    async fn list_models(&self, page_size: Option<usize>) -> Result<Vec<ModelInfo>> {
        let mut models = vec![
            ModelInfo::new("echo-small"),
            ModelInfo::new("echo-medium"),
            ModelInfo::new("echo-large"),
        ];
        if let Some(limit) = page_size {
            models.truncate(limit);
        }
        Ok(models)
    }
}

#[test]
fn test_trailing_user_turn_becomes_prompt() {
    let cases = vec![
        (vec![Content::user("only")], None, "only"),
        (
            vec![Content::system("A."), Content::system("B."), Content::user("go")],
            Some("A.\nB."),
            "go",
        ),
        (
            vec![
                Content::user("q"),
                Content::model("a"),
                Content::system("late rule"),
                Content::user("last"),
            ],
            Some("late rule"),
            "last",
        ),
    ];

    for (contents, instructions, prompt) in cases {
        let context = Transcript::reconcile(&contents).unwrap();
        assert_eq!(context.transcript.instructions.as_deref(), instructions);
        assert_eq!(context.prompt, prompt);
    }
}

#[test]
fn test_missing_trailing_prompt() {
    let result = Transcript::reconcile(&[Content::user("Explain X"), Content::model("X is Y")]);
    assert!(matches!(result, Err(Error::MissingPrompt)));
}

#[test]
fn test_paired_history() {
    let context = Transcript::reconcile(&[
        Content::system("Be terse."),
        Content::user("Hello."),
        Content::model("Hi there!"),
        Content::user("Give three points."),
    ])
    .unwrap();

    assert_eq!(context.transcript.instructions.as_deref(), Some("Be terse."));
    assert_eq!(
        context.transcript.entries,
        vec![
            TranscriptEntry::Prompt("Hello.".into()),
            TranscriptEntry::Response("Hi there!".into()),
        ]
    );
    assert_eq!(context.prompt, "Give three points.");
}

#[test]
fn test_consecutive_user_turns() {
    let context = Transcript::reconcile(&[Content::user("A"), Content::user("B")]).unwrap();

    assert_eq!(
        context.transcript.entries,
        vec![TranscriptEntry::Prompt("A".into())]
    );
    assert_eq!(context.prompt, "B");
}

#[tokio::test]
async fn test_stream_is_monotonic_and_matches_history() {
    let model = EchoModel { fail: false };
    let mut chat = model.start_chat(vec![Content::system("Be terse.")]);

    let texts: Vec<String> = chat
        .send_stream(vec![Content::user("what is the weather")])
        .map(|item| item.unwrap().text)
        .collect()
        .await;

    assert!(texts.len() > 1);
    assert!(texts.windows(2).all(|pair| pair[0].len() <= pair[1].len()));

    let history = chat.history();
    let last = history.last().unwrap();
    assert_eq!(last.role, Role::Model);
    assert_eq!(&last.text(), texts.last().unwrap());
    assert_eq!(last.text(), "echo: what is the weather");
}

#[tokio::test]
async fn test_failed_stream_leaves_history_unchanged() {
    let model = EchoModel { fail: true };
    let mut chat = model.start_chat(vec![Content::user("seed"), Content::model("ack")]);
    let before = chat.history().len();

    let items: Vec<Result<Message>> = chat.send_stream(vec![Content::user("q")]).collect().await;

    assert_eq!(items.len(), 1);
    assert!(items[0].is_err());
    assert_eq!(chat.history().len(), before);
}

#[tokio::test]
async fn test_generate_text_matches_complete() {
    let model = EchoModel { fail: false };

    for text in ["", "hello", "multi\nline prompt"] {
        let generated = model.generate_text(text).await.unwrap();
        let completed = model
            .complete(&[Content::user(text)])
            .await
            .unwrap()
            .primary_message();
        assert_eq!(generated, completed);
    }
}

#[tokio::test]
async fn test_chat_send_builds_on_history() {
    let service: Arc<dyn Service> = Arc::new(EchoService);
    let model = service.model("echo-small");
    let mut chat = model.start_chat(Vec::new());

    let first = chat.send(vec![Content::user("one")]).await.unwrap();
    let second = chat.send(vec![Content::user("two")]).await.unwrap();

    assert_eq!(first.text, "echo: one");
    assert_eq!(second.text, "echo: two");
    assert_eq!(
        chat.history(),
        vec![
            Content::user("one"),
            Content::model("echo: one"),
            Content::user("two"),
            Content::model("echo: two"),
        ]
    );
}

#[tokio::test]
async fn test_list_models_page_size_truncates() {
    let service = EchoService;

    assert_eq!(service.list_models(None).await.unwrap().len(), 3);

    let page = service.list_models(Some(2)).await.unwrap();
    let names: Vec<&str> = page.iter().map(ModelInfo::id).collect();
    assert_eq!(names, vec!["echo-small", "echo-medium"]);
}

#[tokio::test]
async fn test_completion_ids_are_unique_per_call() {
    let model = EchoModel { fail: false };
    let a = model.complete_text("x").await.unwrap();
    let b = model.complete_text("x").await.unwrap();
    assert_ne!(a.id, b.id);
}
