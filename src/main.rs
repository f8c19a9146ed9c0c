use dotenvy::dotenv;
use linegpt::bot::handlers::SessionRouter;
use linegpt::bot::memory::ConversationMemory;
use linegpt::bot::sessions::{OpenAiFactory, SessionRegistry};
use linegpt::bot::state::CommandState;
use linegpt::config::Settings;
use linegpt::fetch::WebFetcher;
use linegpt::line::client::LineClient;
use linegpt::server::{self, AppState};
use linegpt::storage::{self, CredentialStore};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    openai_key: Regex,
    bearer: Regex,
    line_env: Regex,
    r2_key: Regex,
    r2_secret: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            openai_key: Regex::new(r"sk-[A-Za-z0-9_-]{8,}")?,
            bearer: Regex::new(r"Bearer [A-Za-z0-9._+/=-]+")?,
            line_env: Regex::new(r"LINE_CHANNEL_(ACCESS_TOKEN|SECRET)=[^\s&]+")?,
            r2_key: Regex::new(r"R2_ACCESS_KEY_ID=[^\s&]+")?,
            r2_secret: Regex::new(r"R2_SECRET_ACCESS_KEY=[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .openai_key
            .replace_all(&output, "[OPENAI_TOKEN]")
            .to_string();
        output = self
            .bearer
            .replace_all(&output, "Bearer [MASKED]")
            .to_string();
        output = self
            .line_env
            .replace_all(&output, "LINE_CHANNEL_$1=[MASKED]")
            .to_string();
        output = self
            .r2_key
            .replace_all(&output, "R2_ACCESS_KEY_ID=[MASKED]")
            .to_string();
        output = self
            .r2_secret
            .replace_all(&output, "R2_SECRET_ACCESS_KEY=[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    // Setup logging with redaction
    init_logging(patterns);

    info!("Starting LINE GPT webhook server...");

    // Load settings
    let settings = init_settings();

    // Initialize credential storage
    let store = init_storage(&settings);

    // Restore persisted credentials into the client registry
    let sessions = init_sessions(&settings, Arc::clone(&store)).await;

    let memory = Arc::new(ConversationMemory::new(
        settings.default_system_message(),
        settings.memory_window(),
    ));
    let commands = Arc::new(CommandState::new());
    let router = SessionRouter::new(
        memory,
        commands,
        sessions,
        Arc::new(WebFetcher::new()),
        settings.model().to_string(),
    );

    let state = Arc::new(AppState {
        router,
        line: LineClient::new(settings.line_channel_access_token.clone()),
        channel_secret: settings.line_channel_secret.clone(),
    });

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, server::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_storage(settings: &Settings) -> Arc<dyn CredentialStore> {
    match storage::build_storage(settings) {
        Ok(s) => {
            info!("Credential storage initialized.");
            s
        }
        Err(e) => {
            error!("Failed to initialize credential storage: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_sessions(settings: &Settings, store: Arc<dyn CredentialStore>) -> SessionRegistry {
    let sessions = SessionRegistry::new(
        Arc::new(OpenAiFactory),
        Arc::clone(&store),
        settings.default_api_token.clone(),
    );
    match store.load().await {
        Ok(credentials) => {
            info!("Loaded {} stored credential(s).", credentials.len());
            sessions.preload(&credentials);
        }
        Err(e) => {
            error!("Failed to load stored credentials: {}", e);
            std::process::exit(1);
        }
    }
    sessions
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received."),
        Err(e) => error!("Failed to listen for shutdown signal: {e}"),
    }
}
