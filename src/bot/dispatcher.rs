//! Message dispatch: one inbound text, exactly one outcome.
//!
//! The dispatcher owns the session store exclusively and talks to the
//! messaging transport, the completion client and the media generator
//! through their traits. Collaborator failures become short user-facing
//! error strings; nothing propagates past a single dispatch except as a
//! logged error at the poller boundary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::bot::commands::{parse_command, Command};
use crate::config::{Settings, MESSAGE_LIMIT, SEND_PAUSE_MS};
use crate::llm::{ChatMessage, CompletionClient};
use crate::media::{DocumentKind, MediaGenerator};
use crate::session::{Session, SessionStore};
use crate::telegram::Transport;
use crate::utils::{format_uptime, split_long_message};

/// Identity the bot presents in its canned messages.
#[derive(Debug, Clone)]
pub struct BotProfile {
    pub assistant_name: String,
    pub creator_name: String,
    pub system_message: Option<String>,
}

impl BotProfile {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            assistant_name: settings.assistant_name.clone(),
            creator_name: settings.creator_name.clone(),
            system_message: settings.system_message.clone(),
        }
    }
}

/// One inbound text message, as extracted from an update.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub chat_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub username: Option<String>,
    pub text: String,
}

/// Placeholder document body when the session has no assistant reply yet.
const DEFAULT_DOCUMENT_CONTENT: &str =
    "This is your personalized document. Ask me something first and I will \
     use my latest answer as the content.";

/// Interprets inbound messages against the session store and performs
/// the resulting outbound sends.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    completion: Arc<dyn CompletionClient>,
    media: Arc<dyn MediaGenerator>,
    profile: BotProfile,
    store: SessionStore,
    send_pause: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        completion: Arc<dyn CompletionClient>,
        media: Arc<dyn MediaGenerator>,
        profile: BotProfile,
    ) -> Self {
        Self {
            transport,
            completion,
            media,
            profile,
            store: SessionStore::new(),
            send_pause: Duration::from_millis(SEND_PAUSE_MS),
        }
    }

    /// Override the inter-send pause (tests use zero).
    #[must_use]
    pub const fn with_send_pause(mut self, pause: Duration) -> Self {
        self.send_pause = pause;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Handle one inbound text message end to end.
    ///
    /// # Errors
    ///
    /// Only unexpected internal failures bubble up; collaborator and send
    /// failures are turned into user-facing error messages here.
    pub async fn dispatch(&mut self, inbound: Inbound) -> Result<()> {
        info!(
            "📩 @{} ({}): {}",
            inbound.username.as_deref().unwrap_or("N/A"),
            inbound.display_name,
            inbound.text
        );

        let session = self.store.get_or_create(inbound.user_id);
        session.capture_identity(&inbound.display_name, inbound.username.as_deref());
        session.touch();

        match parse_command(&inbound.text) {
            Command::Start => self.send(inbound.chat_id, &self.welcome_text(&inbound)).await,
            Command::Help => self.send(inbound.chat_id, &self.help_text()).await,
            Command::Stats => self.send(inbound.chat_id, &self.stats_text()).await,
            Command::MyInfo => {
                let body = self.store.get(inbound.user_id).map_or_else(
                    || "❌ User not found".to_string(),
                    Self::myinfo_text,
                );
                self.send(inbound.chat_id, &body).await;
            }
            Command::Clear => {
                self.store.clear(inbound.user_id);
                let name = html_escape::encode_text(&inbound.display_name);
                self.send(
                    inbound.chat_id,
                    &format!("🧹 Your conversation cleared! Fresh start, {name}!"),
                )
                .await;
            }
            Command::Voice(text) => self.handle_voice(&inbound, &text).await,
            Command::Document { kind, title } => {
                self.handle_document(&inbound, kind, &title).await;
            }
            Command::Report(title) => self.handle_report(&inbound, &title).await,
            Command::FreeForm(text) => self.handle_free_form(&inbound, &text).await,
        }

        Ok(())
    }

    /// Send one text message; a failed send is logged, never propagated.
    async fn send(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.transport.send_text(chat_id, text).await {
            warn!("Failed to send message to {chat_id}: {e}");
        }
    }

    async fn handle_voice(&mut self, inbound: &Inbound, text: &str) {
        if text.is_empty() {
            self.send(
                inbound.chat_id,
                "❌ Please provide text to convert to voice\nExample: /voice Hello world",
            )
            .await;
            return;
        }

        self.send(inbound.chat_id, "🎵 Converting text to voice...").await;

        match self.media.synthesize_speech(text, inbound.user_id).await {
            Ok(voice) => {
                // The file is deleted when `voice` drops, success or not
                if let Err(e) = self
                    .transport
                    .send_voice(inbound.chat_id, voice.path())
                    .await
                {
                    warn!("Voice send failed for {}: {e}", inbound.user_id);
                    self.send(inbound.chat_id, "❌ Failed to generate voice message")
                        .await;
                }
            }
            Err(e) => {
                warn!("Speech synthesis failed for {}: {e}", inbound.user_id);
                self.send(inbound.chat_id, "❌ Failed to generate voice message")
                    .await;
            }
        }
    }

    async fn handle_document(&mut self, inbound: &Inbound, kind: DocumentKind, title: &str) {
        if title.is_empty() {
            self.send(inbound.chat_id, &usage_hint(kind)).await;
            return;
        }

        self.send(inbound.chat_id, progress_note(kind)).await;

        let content = self.document_content(inbound.user_id, kind);
        match self
            .media
            .generate_document(kind, title, &content, inbound.user_id)
            .await
        {
            Ok(file) => {
                let caption = format!("{} Your {}: {title}", kind_emoji(kind), kind.label());
                if let Err(e) = self
                    .transport
                    .send_document(inbound.chat_id, file.path(), &caption)
                    .await
                {
                    warn!("Document send failed for {}: {e}", inbound.user_id);
                    self.send(
                        inbound.chat_id,
                        &format!("❌ Failed to generate {}", kind.label()),
                    )
                    .await;
                }
            }
            Err(e) => {
                warn!("Document generation failed for {}: {e}", inbound.user_id);
                self.send(
                    inbound.chat_id,
                    &format!("❌ Failed to generate {}", kind.label()),
                )
                .await;
            }
        }
    }

    async fn handle_report(&mut self, inbound: &Inbound, title: &str) {
        if title.is_empty() {
            self.send(
                inbound.chat_id,
                "❌ Please provide a title for the report\nExample: /report Summary",
            )
            .await;
            return;
        }

        self.send(inbound.chat_id, "📋 Generating multi-format report...")
            .await;

        let content = self.document_content(inbound.user_id, DocumentKind::Pdf);
        match self
            .media
            .generate_report(title, &content, inbound.user_id)
            .await
        {
            Ok(files) => {
                let mut send_failed = false;
                for (i, (kind, file)) in files.iter().enumerate() {
                    if i > 0 {
                        // Respect outbound rate limits between file sends
                        tokio::time::sleep(self.send_pause).await;
                    }
                    let caption = format!(
                        "📋 Your {} report: {title}",
                        kind.label().to_uppercase()
                    );
                    if let Err(e) = self
                        .transport
                        .send_document(inbound.chat_id, file.path(), &caption)
                        .await
                    {
                        warn!("Report send failed for {}: {e}", inbound.user_id);
                        send_failed = true;
                    }
                }
                if send_failed {
                    self.send(inbound.chat_id, "❌ Failed to generate report").await;
                }
            }
            Err(e) => {
                warn!("Report generation failed for {}: {e}", inbound.user_id);
                self.send(inbound.chat_id, "❌ Failed to generate report").await;
            }
        }
    }

    async fn handle_free_form(&mut self, inbound: &Inbound, text: &str) {
        let name = &self.profile.assistant_name;
        self.send(
            inbound.chat_id,
            &format!("🧠 Processing with {name} AI intelligence..."),
        )
        .await;

        let system_prompt = self.system_prompt(inbound.user_id);
        let window: Vec<ChatMessage> = self
            .store
            .get(inbound.user_id)
            .map(|s| s.history_window().to_vec())
            .unwrap_or_default();

        let reply = match self.completion.complete(&system_prompt, &window, text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Completion failed for {}: {e}", inbound.user_id);
                self.send(
                    inbound.chat_id,
                    "❌ AI Service temporarily unavailable. Please try again.",
                )
                .await;
                return;
            }
        };

        self.store.complete_exchange(inbound.user_id, text, &reply);
        self.send_reply(inbound.chat_id, &reply).await;
    }

    /// Send a completion reply, splitting into labelled sequential parts
    /// when it exceeds the outbound limit.
    async fn send_reply(&self, chat_id: i64, reply: &str) {
        let name = &self.profile.assistant_name;
        // The threshold counts characters, not bytes
        if reply.chars().count() <= MESSAGE_LIMIT {
            self.send(chat_id, &format!("🧠 {name} AI:\n\n{reply}")).await;
            return;
        }

        let parts = split_long_message(reply, MESSAGE_LIMIT);
        let total = parts.len();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.send_pause).await;
            }
            let label = i + 1;
            self.send(chat_id, &format!("🧠 {name} AI (Part {label}/{total}):\n\n{part}"))
                .await;
        }
    }

    /// Document body: the most recent assistant reply, a session field
    /// sheet for Excel, or a fixed placeholder.
    fn document_content(&self, user_id: i64, kind: DocumentKind) -> String {
        let session = self.store.get(user_id);

        if kind == DocumentKind::Excel {
            return session.map_or_else(String::new, session_sheet_rows);
        }

        session
            .and_then(Session::last_assistant_message)
            .unwrap_or(DEFAULT_DOCUMENT_CONTENT)
            .to_string()
    }

    fn system_prompt(&self, user_id: i64) -> String {
        if let Some(message) = &self.profile.system_message {
            return message.clone();
        }

        let user_name = self
            .store
            .get(user_id)
            .and_then(|s| s.display_name.clone())
            .unwrap_or_else(|| "User".to_string());
        let history_len = self.store.get(user_id).map_or(0, |s| s.history.len());
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");

        format!(
            "You are {assistant}, a highly capable AI assistant. Be helpful, \
             comprehensive and well-structured, and use emojis appropriately.\n\
             Current time: {now}\n\
             User: {user_name}\n\
             Session history: {history_len} messages\n\
             Creator: {creator}",
            assistant = self.profile.assistant_name,
            creator = self.profile.creator_name,
        )
    }

    fn welcome_text(&self, inbound: &Inbound) -> String {
        let assistant = &self.profile.assistant_name;
        let creator = &self.profile.creator_name;
        let name = html_escape::encode_text(&inbound.display_name);
        format!(
            "🚀 Welcome to {assistant} AI!\n\n\
             Hello {name}! I'm {assistant}, your AI assistant with private \
             per-user conversation memory and media capabilities.\n\n\
             🎯 <b>Commands:</b>\n\
             /start - Welcome message\n\
             /help - Show all capabilities\n\
             /stats - Bot statistics\n\
             /myinfo - Your session info\n\
             /clear - Clear your conversation\n\
             /voice &lt;text&gt; - Convert text to voice\n\
             /note &lt;title&gt; - Create markdown note\n\
             /pdf &lt;title&gt; - Generate PDF document\n\
             /word &lt;title&gt; - Create Word document\n\
             /excel &lt;title&gt; - Generate Excel sheet\n\
             /report &lt;title&gt; - Generate multi-format report\n\n\
             🔥 Created by {creator}\n\n\
             Ask me anything - I'm ready to help! 🚀"
        )
    }

    fn help_text(&self) -> String {
        let assistant = &self.profile.assistant_name;
        let creator = &self.profile.creator_name;
        format!(
            "🧠 {assistant} AI - Help\n\n\
             📋 <b>Basic Commands:</b>\n\
             /start - Welcome message\n\
             /help - Show this help\n\
             /stats - Global bot statistics\n\
             /myinfo - Your session information\n\
             /clear - Clear your conversation\n\n\
             🎵 <b>Media Commands:</b>\n\
             /voice &lt;text&gt; - Convert text to voice message\n\
             /note &lt;title&gt; - Create markdown note file\n\
             /pdf &lt;title&gt; - Generate PDF document\n\
             /word &lt;title&gt; - Create Word document\n\
             /excel &lt;title&gt; - Generate Excel sheet\n\
             /report &lt;title&gt; - Generate multi-format report\n\n\
             Documents use my most recent answer as their content, so ask \
             first and generate after.\n\n\
             👨‍💻 <b>Created by:</b> {creator}"
        )
    }

    fn stats_text(&self) -> String {
        let assistant = &self.profile.assistant_name;
        let creator = &self.profile.creator_name;
        format!(
            "📊 {assistant} AI - Statistics\n\n\
             🤖 <b>Bot Status:</b> ✅ Online\n\
             👨‍💻 <b>Creator:</b> {creator}\n\
             🕐 <b>Uptime:</b> {uptime}\n\
             📈 <b>Total Messages:</b> {total}\n\
             👥 <b>Active Users:</b> {active}\n\
             💾 <b>Total Sessions:</b> {sessions}",
            uptime = format_uptime(self.store.uptime()),
            total = self.store.total_messages(),
            active = self.store.active_user_count(),
            sessions = self.store.session_count(),
        )
    }

    fn myinfo_text(session: &Session) -> String {
        format!(
            "👤 <b>User Information:</b>\n\n\
             🆔 <b>User ID:</b> {id}\n\
             👨‍💼 <b>Name:</b> {name}\n\
             🏷️ <b>Username:</b> @{username}\n\
             💬 <b>Messages:</b> {count}\n\
             🕐 <b>Session Duration:</b> {duration}\n\
             📅 <b>Started:</b> {started}\n\
             ⚙️ <b>Response Style:</b> {style}\n\
             🌐 <b>Language:</b> {language}\n\
             💾 <b>Memory Items:</b> {memory}",
            id = session.user_id,
            name = html_escape::encode_text(
                session.display_name.as_deref().unwrap_or("Unknown")
            ),
            username = html_escape::encode_text(
                session.username.as_deref().unwrap_or("N/A")
            ),
            count = session.message_count,
            duration = format_uptime(session.age()),
            started = session.created_at.format("%Y-%m-%d %H:%M:%S"),
            style = session.preferences.response_style,
            language = session.preferences.language,
            memory = session.history.len(),
        )
    }
}

/// Field/value CSV rows describing the caller's session, used as the
/// Excel sheet body.
fn session_sheet_rows(session: &Session) -> String {
    let rows = [
        ("User Name", session.display_name.clone().unwrap_or_else(|| "Unknown".into())),
        ("Username", session.username.clone().unwrap_or_else(|| "N/A".into())),
        ("Messages", session.message_count.to_string()),
        (
            "Session Start",
            session.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        (
            "Last Activity",
            session
                .last_activity_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ),
    ];
    let mut sheet = String::from("Field,Value\n");
    for (field, value) in rows {
        sheet.push_str(&format!("{field},\"{}\"\n", value.replace('"', "\"\"")));
    }
    sheet
}

const fn kind_emoji(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Pdf => "📄",
        DocumentKind::Word | DocumentKind::Note => "📝",
        DocumentKind::Excel => "📊",
    }
}

const fn progress_note(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Pdf => "📄 Generating PDF document...",
        DocumentKind::Word => "📝 Creating Word document...",
        DocumentKind::Excel => "📊 Generating Excel sheet...",
        DocumentKind::Note => "📝 Creating markdown note...",
    }
}

fn usage_hint(kind: DocumentKind) -> String {
    let (command, example) = match kind {
        DocumentKind::Pdf => ("pdf", "Business Plan"),
        DocumentKind::Word => ("word", "Meeting Notes"),
        DocumentKind::Excel => ("excel", "Project Data"),
        DocumentKind::Note => ("note", "My Ideas"),
    };
    format!(
        "❌ Please provide a title for the {}\nExample: /{command} {example}",
        kind.label()
    )
}
