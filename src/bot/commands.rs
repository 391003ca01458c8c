//! Command parsing.
//!
//! One parse step turns raw inbound text into a [`Command`] variant the
//! dispatcher consumes exhaustively, so routing is a match instead of a
//! conditional chain and every input lands on exactly one outcome.

use crate::media::DocumentKind;

/// Parsed outcome of one inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Stats,
    MyInfo,
    Clear,
    /// Text to synthesize; empty means a usage error downstream.
    Voice(String),
    /// Document title; empty means a usage error downstream.
    Document { kind: DocumentKind, title: String },
    /// Report title; empty means a usage error downstream.
    Report(String),
    /// Anything else is forwarded to the completion API as-is.
    FreeForm(String),
}

/// Parses trimmed, case-insensitively matched input into a [`Command`].
///
/// Exact commands with trailing text (e.g. `/start now`) are not
/// commands and fall through to free-form. Argument-taking commands keep
/// their variant even with a missing argument; the dispatcher answers
/// those with a usage hint.
#[must_use]
pub fn parse_command(text: &str) -> Command {
    let trimmed = text.trim();
    let (head, rest) = trimmed
        .split_once(char::is_whitespace)
        .map_or((trimmed, ""), |(head, rest)| (head, rest.trim()));

    match head.to_lowercase().as_str() {
        "/start" if rest.is_empty() => Command::Start,
        "/help" if rest.is_empty() => Command::Help,
        "/stats" if rest.is_empty() => Command::Stats,
        "/myinfo" if rest.is_empty() => Command::MyInfo,
        "/clear" if rest.is_empty() => Command::Clear,
        "/voice" => Command::Voice(rest.to_string()),
        "/pdf" => Command::Document {
            kind: DocumentKind::Pdf,
            title: rest.to_string(),
        },
        "/word" => Command::Document {
            kind: DocumentKind::Word,
            title: rest.to_string(),
        },
        "/excel" => Command::Document {
            kind: DocumentKind::Excel,
            title: rest.to_string(),
        },
        "/note" => Command::Document {
            kind: DocumentKind::Note,
            title: rest.to_string(),
        },
        "/report" => Command::Report(rest.to_string()),
        _ => Command::FreeForm(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_commands() {
        assert_eq!(parse_command("/start"), Command::Start);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("/stats"), Command::Stats);
        assert_eq!(parse_command("/myinfo"), Command::MyInfo);
        assert_eq!(parse_command("/clear"), Command::Clear);
    }

    #[test]
    fn test_case_insensitive_and_trimmed() {
        assert_eq!(parse_command("  /START  "), Command::Start);
        assert_eq!(parse_command("/Clear"), Command::Clear);
        assert_eq!(
            parse_command("/VOICE Hello"),
            Command::Voice("Hello".to_string())
        );
    }

    #[test]
    fn test_exact_command_with_trailing_text_is_free_form() {
        assert_eq!(
            parse_command("/start now"),
            Command::FreeForm("/start now".to_string())
        );
    }

    #[test]
    fn test_voice_argument_extraction() {
        assert_eq!(
            parse_command("/voice Hello world"),
            Command::Voice("Hello world".to_string())
        );
        // Whitespace-only argument is treated as empty
        assert_eq!(parse_command("/voice    "), Command::Voice(String::new()));
        assert_eq!(parse_command("/voice"), Command::Voice(String::new()));
    }

    #[test]
    fn test_document_commands() {
        assert_eq!(
            parse_command("/pdf Business Plan"),
            Command::Document {
                kind: DocumentKind::Pdf,
                title: "Business Plan".to_string()
            }
        );
        assert_eq!(
            parse_command("/word Meeting Notes"),
            Command::Document {
                kind: DocumentKind::Word,
                title: "Meeting Notes".to_string()
            }
        );
        assert_eq!(
            parse_command("/excel Project Data"),
            Command::Document {
                kind: DocumentKind::Excel,
                title: "Project Data".to_string()
            }
        );
        assert_eq!(
            parse_command("/note My Ideas"),
            Command::Document {
                kind: DocumentKind::Note,
                title: "My Ideas".to_string()
            }
        );
        assert_eq!(
            parse_command("/report Summary"),
            Command::Report("Summary".to_string())
        );
    }

    #[test]
    fn test_plain_text_is_free_form() {
        assert_eq!(
            parse_command("what is the weather?"),
            Command::FreeForm("what is the weather?".to_string())
        );
        // Unknown slash commands are prompts too
        assert_eq!(
            parse_command("/unknown"),
            Command::FreeForm("/unknown".to_string())
        );
    }

    #[test]
    fn test_dispatch_is_total() {
        // No input panics or gets silently dropped
        for input in ["", "   ", "/", "/voice\u{a0}x", "hello\nworld"] {
            let _ = parse_command(input);
        }
    }
}
