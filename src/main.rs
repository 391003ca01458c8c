use atlas_chat_rs::bot::{BotProfile, Dispatcher, Poller};
use atlas_chat_rs::config::Settings;
use atlas_chat_rs::llm::GroqClient;
use atlas_chat_rs::media::MediaStudio;
use atlas_chat_rs::telegram::TelegramTransport;
use atlas_chat_rs::{health, llm};
use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting credentials from log output
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    token_prefixed: Regex,
    groq_key: Regex,
}

impl RedactionPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token_prefixed: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            groq_key: Regex::new(r"gsk_[A-Za-z0-9]{20,}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token_bare
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token_prefixed
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .groq_key
            .replace_all(&output, "[GROQ_API_KEY]")
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
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("🚀 Starting ATLAS chat bot...");

    let settings = init_settings();

    // Collaborators behind their trait seams
    let transport = Arc::new(TelegramTransport::new(&settings.telegram_token));
    let completion = Arc::new(GroqClient::new(
        settings.groq_api_key.clone(),
        settings.groq_model.clone(),
    ));
    let media = Arc::new(MediaStudio::new(
        settings.groq_api_key.clone(),
        settings.media_dir(),
    ));
    info!("Collaborators initialized.");

    let profile = BotProfile::from_settings(&settings);
    let dispatcher = Dispatcher::new(
        transport.clone(),
        completion as Arc<dyn llm::CompletionClient>,
        media,
        profile,
    );
    let mut poller = Poller::new(transport, dispatcher);

    // Health listener runs beside the polling loop; they share nothing
    // mutable
    tokio::spawn({
        let assistant_name = settings.assistant_name.clone();
        let creator_name = settings.creator_name.clone();
        let port = settings.port;
        async move {
            if let Err(e) = health::serve(port, assistant_name, creator_name).await {
                error!("Health endpoint failed: {e}");
            }
        }
    });

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down...");
                shutdown.cancel();
            }
        }
    });

    if let Err(e) = poller.run(shutdown).await {
        error!("Failed to connect to the messaging transport: {e}");
        std::process::exit(1);
    }

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
            error!("Please set TELEGRAM_TOKEN and GROQ_API_KEY");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> RedactionPatterns {
        RedactionPatterns::new().expect("patterns compile")
    }

    #[test]
    fn test_redaction_masks_token_in_url() {
        let token = format!("123456789:{}", "A".repeat(35));
        let line = format!("GET https://api.telegram.org/bot{token}/getMe failed");
        let redacted = patterns().redact(&line);
        assert!(!redacted.contains(&token));
        assert!(redacted.contains("bot[TELEGRAM_TOKEN]/getMe"));
    }

    #[test]
    fn test_redaction_masks_bare_token() {
        let token = format!("987654321:{}", "B".repeat(35));
        let redacted = patterns().redact(&format!("token is {token}"));
        assert!(!redacted.contains(&token));
        assert!(redacted.contains("[TELEGRAM_TOKEN]"));
    }

    #[test]
    fn test_redaction_masks_groq_key() {
        let key = format!("gsk_{}", "c".repeat(30));
        let redacted = patterns().redact(&format!("auth with {key} sent"));
        assert!(!redacted.contains(&key));
        assert_eq!(redacted, "auth with [GROQ_API_KEY] sent");
    }

    #[test]
    fn test_redaction_leaves_ordinary_text_alone() {
        let line = "📩 @alice99 (Alice): what is the weather?";
        assert_eq!(patterns().redact(line), line);
    }
}
