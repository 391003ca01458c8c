//! HTTP helpers for the completion API
//!
//! Common request/response handling so provider code stays focused on
//! payload shape.

use crate::llm::CompletionError;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// Creates an HTTP client with the given request timeout.
///
/// A bounded timeout prevents infinite hangs when the API is slow or
/// unresponsive.
#[must_use]
pub fn create_http_client(timeout_secs: u64) -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends an HTTP POST with a JSON body and returns the parsed JSON response.
///
/// # Errors
///
/// Returns `CompletionError::Network` on connectivity issues,
/// `CompletionError::Api` on non-success status codes, or
/// `CompletionError::Json` if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: &str,
) -> Result<Value, CompletionError> {
    let response = client
        .post(url)
        .header("Authorization", auth_header)
        .json(body)
        .send()
        .await
        .map_err(|e| CompletionError::Network(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();

        // Detect HTML error pages from Nginx/proxies
        let is_html = error_text.trim_start().starts_with("<!DOCTYPE")
            || error_text.trim_start().starts_with("<html")
            || error_text.trim_start().starts_with("<HTML");

        let clean_message = if is_html {
            format!("API error: {status} (Server returned HTML error page)")
        } else {
            let truncated = if error_text.len() > 500 {
                format!("{}... (truncated)", &error_text[..500])
            } else {
                error_text
            };
            format!("API error: {status} - {truncated}")
        };

        return Err(CompletionError::Api(clean_message));
    }

    response
        .json()
        .await
        .map_err(|e| CompletionError::Json(e.to_string()))
}

/// Extracts text content from a JSON response by navigating a path.
///
/// Path segments may be string keys or numeric indices, e.g.
/// `["choices", "0", "message", "content"]`.
///
/// # Errors
///
/// Returns `CompletionError::Api` if the path is invalid or the target is
/// not a string.
pub fn extract_text_content(response: &Value, path: &[&str]) -> Result<String, CompletionError> {
    let mut current = response;

    for segment in path {
        if let Ok(index) = segment.parse::<usize>() {
            current = current.get(index).ok_or_else(|| {
                CompletionError::Api(format!("Invalid path: missing index {index}"))
            })?;
        } else {
            current = current.get(*segment).ok_or_else(|| {
                CompletionError::Api(format!("Invalid path: missing key {segment}"))
            })?;
        }
    }

    current
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| CompletionError::Api(format!("Expected string at path, got: {current:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_content_openai_shape() {
        let response = json!({
            "choices": [{"message": {"content": "hello there"}}]
        });
        let content = extract_text_content(&response, &["choices", "0", "message", "content"])
            .expect("path resolves");
        assert_eq!(content, "hello there");
    }

    #[test]
    fn test_extract_text_content_missing_key() {
        let response = json!({"choices": []});
        let err = extract_text_content(&response, &["choices", "0", "message", "content"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_extract_text_content_not_a_string() {
        let response = json!({"value": 42});
        let err = extract_text_content(&response, &["value"]);
        assert!(err.is_err());
    }
}
