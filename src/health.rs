//! Health-check HTTP endpoint.
//!
//! A hosting platform probes these fixed-shape JSON routes to verify
//! liveness. The listener runs on its own task and shares no mutable
//! session state with the polling loop.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

#[derive(Clone)]
struct HealthInfo {
    assistant_name: String,
    creator_name: String,
}

/// Builds the health router: `/`, `/health` and `/ready`.
#[must_use]
pub fn router(assistant_name: String, creator_name: String) -> Router {
    let info = HealthInfo {
        assistant_name,
        creator_name,
    };
    let home_info = info.clone();
    Router::new()
        .route(
            "/",
            get(move || {
                let info = home_info.clone();
                async move { Json(home(&info)) }
            }),
        )
        .route(
            "/health",
            get(move || {
                let info = info.clone();
                async move { Json(health(&info)) }
            }),
        )
        .route("/ready", get(|| async { Json(ready()) }))
}

fn home(info: &HealthInfo) -> Value {
    json!({
        "status": "healthy",
        "bot": format!("{} AI Telegram Bot", info.assistant_name),
        "message": "Multi-User Media Edition is running",
        "creator": info.creator_name,
    })
}

fn health(info: &HealthInfo) -> Value {
    json!({
        "status": "healthy",
        "service": format!("{}-telegram-bot", info.assistant_name.to_lowercase()),
        "version": "multi-user-media",
    })
}

fn ready() -> Value {
    json!({
        "status": "ready",
        "bot_running": true,
    })
}

/// Binds the listener and serves until the process exits.
///
/// # Errors
///
/// Returns an error if the port cannot be bound.
pub async fn serve(port: u16, assistant_name: String, creator_name: String) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🌐 Health endpoint listening on port {port}");
    axum::serve(listener, router(assistant_name, creator_name)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_bodies_have_fixed_shape() {
        let info = HealthInfo {
            assistant_name: "ATLAS".to_string(),
            creator_name: "the ATLAS team".to_string(),
        };

        let home = home(&info);
        assert_eq!(home["status"], "healthy");
        assert_eq!(home["bot"], "ATLAS AI Telegram Bot");
        assert_eq!(home["message"], "Multi-User Media Edition is running");

        let health = health(&info);
        assert_eq!(health["service"], "atlas-telegram-bot");

        let ready = ready();
        assert_eq!(ready["status"], "ready");
        assert_eq!(ready["bot_running"], true);
    }
}
