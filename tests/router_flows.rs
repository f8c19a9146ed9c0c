//! End-to-end router flows driven through fake collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use linegpt::bot::composer::Outbound;
use linegpt::bot::error::{MSG_EMPTY_CONTENT, MSG_MISSING_TOKEN, MSG_OVERLOADED, PREFIX_OVERLOADED};
use linegpt::bot::handlers::{
    SessionRouter, MSG_CANCELLED, MSG_TOKEN_ENABLED, PROMPT_IMAGE, PROMPT_TOKEN, PROMPT_URL,
};
use linegpt::bot::memory::ConversationMemory;
use linegpt::bot::sessions::{ProviderFactory, SessionRegistry};
use linegpt::bot::state::{CommandState, PendingCommand};
use linegpt::fetch::{website, youtube, ContentFetcher, FetchError};
use linegpt::llm::{CompletionProvider, LlmError, Message, Role};
use linegpt::storage::{CredentialMap, CredentialStore, StorageError};

const DEFAULT_SYSTEM: &str = "あなたは有能なアシスタントです。";

/// Provider that pops one canned outcome per chat call and records
/// every request it sees.
struct ScriptedProvider {
    chat_script: Mutex<VecDeque<Result<String, LlmError>>>,
    seen_requests: Mutex<Vec<Vec<Message>>>,
    image_url: String,
    image_calls: AtomicUsize,
    validate_error: Option<String>,
    validate_calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            chat_script: Mutex::new(VecDeque::new()),
            seen_requests: Mutex::new(Vec::new()),
            image_url: "https://images.example/out.png".to_string(),
            image_calls: AtomicUsize::new(0),
            validate_error: None,
            validate_calls: AtomicUsize::new(0),
        }
    }

    fn script_chat(self, outcome: Result<String, LlmError>) -> Self {
        self.chat_script
            .lock()
            .expect("script lock")
            .push_back(outcome);
        self
    }

    fn chat_requests(&self) -> Vec<Vec<Message>> {
        self.seen_requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn chat_completion(
        &self,
        messages: &[Message],
        _model_engine: &str,
    ) -> Result<String, LlmError> {
        self.seen_requests
            .lock()
            .expect("requests lock")
            .push(messages.to_vec());
        self.chat_script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ApiError("unexpected chat call".to_string())))
    }

    async fn image_generation(&self, _prompt: &str) -> Result<String, LlmError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.image_url.clone())
    }

    async fn transcribe_audio(
        &self,
        _audio: Vec<u8>,
        _filename: &str,
        _model_engine: &str,
    ) -> Result<String, LlmError> {
        Err(LlmError::ApiError("transcription not scripted".to_string()))
    }

    async fn validate_credential(&self) -> Result<(), LlmError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        match &self.validate_error {
            None => Ok(()),
            Some(message) => Err(LlmError::ApiError(message.clone())),
        }
    }
}

/// Factory that hands out one shared provider and records the keys it
/// was asked to build clients for.
struct RecordingFactory {
    provider: Arc<ScriptedProvider>,
    created_keys: Mutex<Vec<String>>,
}

impl RecordingFactory {
    fn new(provider: Arc<ScriptedProvider>) -> Self {
        Self {
            provider,
            created_keys: Mutex::new(Vec::new()),
        }
    }

    fn created_keys(&self) -> Vec<String> {
        self.created_keys.lock().expect("keys lock").clone()
    }
}

impl ProviderFactory for RecordingFactory {
    fn create(&self, api_key: &str) -> Arc<dyn CompletionProvider> {
        self.created_keys
            .lock()
            .expect("keys lock")
            .push(api_key.to_string());
        let provider: Arc<dyn CompletionProvider> = self.provider.clone();
        provider
    }
}

/// In-memory credential store with real merge semantics.
#[derive(Default)]
struct MemoryStore {
    entries: Mutex<CredentialMap>,
    save_calls: AtomicUsize,
}

impl MemoryStore {
    fn stored(&self) -> CredentialMap {
        self.entries.lock().expect("entries lock").clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<CredentialMap, StorageError> {
        Ok(self.stored())
    }

    async fn save(&self, entries: &CredentialMap) -> Result<(), StorageError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .expect("entries lock")
            .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

/// Fetcher with real URL/video-id recognition over canned content.
#[derive(Default)]
struct StubFetcher {
    pages: HashMap<String, Vec<String>>,
    transcript: Option<Vec<String>>,
    page_calls: AtomicUsize,
    transcript_calls: AtomicUsize,
}

#[async_trait]
impl ContentFetcher for StubFetcher {
    fn resolve_url(&self, text: &str) -> Option<String> {
        website::url_from_text(text)
    }

    fn video_id(&self, url: &str) -> Option<String> {
        youtube::video_id(url)
    }

    async fn fetch_transcript(&self, _video_id: &str) -> Result<Vec<String>, FetchError> {
        self.transcript_calls.fetch_add(1, Ordering::SeqCst);
        self.transcript
            .clone()
            .ok_or_else(|| FetchError::Parse("no caption track found".to_string()))
    }

    async fn fetch_page(&self, url: &str) -> Result<Vec<String>, FetchError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.get(url).cloned().unwrap_or_default())
    }
}

struct RouterKit {
    router: SessionRouter,
    memory: Arc<ConversationMemory>,
    commands: Arc<CommandState>,
    provider: Arc<ScriptedProvider>,
    factory: Arc<RecordingFactory>,
    store: Arc<MemoryStore>,
    fetcher: Arc<StubFetcher>,
}

fn kit(default_token: Option<&str>, provider: ScriptedProvider, fetcher: StubFetcher) -> RouterKit {
    let provider = Arc::new(provider);
    let factory = Arc::new(RecordingFactory::new(Arc::clone(&provider)));
    let store = Arc::new(MemoryStore::default());
    let fetcher = Arc::new(fetcher);

    let sessions = SessionRegistry::new(
        factory.clone(),
        store.clone(),
        default_token.map(str::to_string),
    );
    let memory = Arc::new(ConversationMemory::new(DEFAULT_SYSTEM, 2));
    let commands = Arc::new(CommandState::new());
    let router = SessionRouter::new(
        Arc::clone(&memory),
        Arc::clone(&commands),
        sessions,
        fetcher.clone(),
        "gpt-3.5-turbo".to_string(),
    );

    RouterKit {
        router,
        memory,
        commands,
        provider,
        factory,
        store,
        fetcher,
    }
}

fn text_of(outbound: &Outbound) -> &str {
    match outbound {
        Outbound::Text { text, .. } => text,
        Outbound::Image { .. } => panic!("expected text reply"),
    }
}

#[tokio::test]
async fn any_text_without_credential_or_default_is_refused() {
    let kit = kit(None, ScriptedProvider::new(), StubFetcher::default());

    let chat = kit.router.handle_text("user", "こんにちは").await;
    let command = kit.router.handle_text("user", "/token").await;

    assert_eq!(text_of(&chat), MSG_MISSING_TOKEN);
    assert_eq!(text_of(&command), MSG_MISSING_TOKEN);
    assert!(kit.factory.created_keys().is_empty());
    assert_eq!(kit.store.save_calls.load(Ordering::SeqCst), 0);
    assert_eq!(kit.memory.get("user").len(), 1);
}

#[tokio::test]
async fn token_flow_bootstraps_default_then_registers_personal_key() {
    let kit = kit(Some("sk-default"), ScriptedProvider::new(), StubFetcher::default());

    let armed = kit.router.handle_text("user", "/token").await;
    assert_eq!(text_of(&armed), PROMPT_TOKEN);

    let confirmed = kit.router.handle_text("user", "sk-personal-key").await;
    assert_eq!(text_of(&confirmed), MSG_TOKEN_ENABLED);

    assert_eq!(
        kit.factory.created_keys(),
        vec!["sk-default".to_string(), "sk-personal-key".to_string()]
    );
    assert_eq!(kit.provider.validate_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        kit.store.stored().get("user").map(String::as_str),
        Some("sk-personal-key")
    );
}

#[tokio::test]
async fn structured_chat_keeps_raw_turns_across_the_window() {
    let provider = ScriptedProvider::new()
        .script_chat(Ok(
            r#"{"reply":"こんにちは！","reply sample1":"質問する"}"#.to_string()
        ))
        .script_chat(Ok("ただのテキスト".to_string()));
    let kit = kit(Some("sk-default"), provider, StubFetcher::default());

    let first = kit.router.handle_text("user", "やあ").await;
    let Outbound::Text { text, chips } = first else {
        panic!("expected text reply");
    };
    assert_eq!(text, "こんにちは！");
    assert_eq!(chips.len(), 1);
    assert_eq!(chips[0].text, "質問する");

    let second = kit.router.handle_text("user", "続きを教えて").await;
    let Outbound::Text { text, chips } = second else {
        panic!("expected text reply");
    };
    assert_eq!(text, "ただのテキスト");
    assert!(chips.is_empty());

    let requests = kit.provider.chat_requests();
    assert_eq!(requests.len(), 2);

    // First request: system + instruction-wrapped user turn.
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[0][0].content, DEFAULT_SYSTEM);
    assert!(requests[0][1].content.contains("やあ"));
    assert!(requests[0][1].content.contains("reply sample1"));

    // Second request: earlier turns are replayed raw; only the final
    // user turn carries the instruction wrapper.
    assert_eq!(requests[1].len(), 4);
    assert_eq!(requests[1][1].content, "やあ");
    assert_eq!(requests[1][2].content, "こんにちは！");
    assert!(requests[1][3].content.contains("続きを教えて"));
}

#[tokio::test]
async fn overloaded_failure_clears_history_but_not_system_prompt() {
    let provider = ScriptedProvider::new()
        .script_chat(Ok("前の返事".to_string()))
        .script_chat(Err(LlmError::ApiError(format!(
            "{PREFIX_OVERLOADED} Please retry your request."
        ))));
    let kit = kit(Some("sk-default"), provider, StubFetcher::default());
    kit.router.handle_text("user", "/system").await;
    kit.router.handle_text("user", "関西弁で話して").await;

    kit.router.handle_text("user", "最初の質問").await;
    assert_eq!(kit.memory.get("user").len(), 3);

    let failed = kit.router.handle_text("user", "次の質問").await;
    assert_eq!(text_of(&failed), MSG_OVERLOADED);

    let context = kit.memory.get("user");
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].content, "関西弁で話して");
}

#[tokio::test]
async fn image_two_step_flow_records_both_turns() {
    let kit = kit(Some("sk-default"), ScriptedProvider::new(), StubFetcher::default());

    let armed = kit.router.handle_text("user", "/image").await;
    assert_eq!(text_of(&armed), PROMPT_IMAGE);

    let reply = kit.router.handle_text("user", "かわいい猫").await;
    let Outbound::Image {
        original_url,
        preview_url,
        chips,
    } = reply
    else {
        panic!("expected image reply");
    };
    assert_eq!(original_url, "https://images.example/out.png");
    assert_eq!(preview_url, original_url);
    assert!(!chips.is_empty());

    assert_eq!(kit.provider.image_calls.load(Ordering::SeqCst), 1);
    assert_eq!(kit.commands.pop("user"), PendingCommand::None);

    let context = kit.memory.get("user");
    assert_eq!(context.len(), 3);
    assert_eq!(context[1].content, "かわいい猫");
    assert_eq!(context[2].content, "https://images.example/out.png");
}

#[tokio::test]
async fn cancel_disarms_and_next_text_goes_to_chat() {
    let provider = ScriptedProvider::new().script_chat(Ok("チャットの返事".to_string()));
    let kit = kit(Some("sk-default"), provider, StubFetcher::default());

    let armed = kit.router.handle_text("user", "/url").await;
    assert_eq!(text_of(&armed), PROMPT_URL);

    let cancelled = kit.router.handle_text("user", "/cancel").await;
    assert_eq!(text_of(&cancelled), MSG_CANCELLED);

    let reply = kit.router.handle_text("user", "こんにちは").await;
    assert_eq!(text_of(&reply), "チャットの返事");
    assert_eq!(kit.fetcher.page_calls.load(Ordering::SeqCst), 0);
    assert_eq!(kit.fetcher.transcript_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn page_without_extractable_text_reports_empty_content() {
    let kit = kit(Some("sk-default"), ScriptedProvider::new(), StubFetcher::default());

    kit.router.handle_text("user", "/url").await;
    let reply = kit
        .router
        .handle_text("user", "https://example.com/article")
        .await;

    assert_eq!(text_of(&reply), MSG_EMPTY_CONTENT);
    assert_eq!(kit.fetcher.page_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn video_url_is_summarized_through_the_transcript_template() {
    let provider = ScriptedProvider::new().script_chat(Ok("動画のまとめです。".to_string()));
    let fetcher = StubFetcher {
        transcript: Some(vec!["前半の内容".to_string(), "後半の内容".to_string()]),
        ..StubFetcher::default()
    };
    let kit = kit(Some("sk-default"), provider, fetcher);

    kit.router.handle_text("user", "/url").await;
    let reply = kit
        .router
        .handle_text("user", "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        .await;

    assert_eq!(text_of(&reply), "動画のまとめです。");
    assert_eq!(kit.fetcher.transcript_calls.load(Ordering::SeqCst), 1);
    assert_eq!(kit.fetcher.page_calls.load(Ordering::SeqCst), 0);

    let requests = kit.provider.chat_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0][0].content, youtube::SYSTEM_MESSAGE);
    assert!(requests[0][1].content.contains("前半の内容\n後半の内容"));

    // Only the answer lands in memory, as an assistant turn.
    let context = kit.memory.get("user");
    assert_eq!(context.len(), 2);
    assert_eq!(context[1].role, Role::Assistant);
    assert_eq!(context[1].content, "動画のまとめです。");
}
