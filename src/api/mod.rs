//! Local REST API over the card repository
//!
//! Runs on localhost and serves the JSON endpoints plus, optionally, the
//! static front end. Handlers lock the shared SQLite storage for the
//! duration of one repository call.

mod cards;
mod decks;
mod error;
mod study;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub use error::{ApiError, ApiResult};

use crate::flashcards::FlashcardStorage;

/// State shared across requests
#[derive(Clone)]
pub struct ApiState {
    storage: Arc<Mutex<FlashcardStorage>>,
}

impl ApiState {
    pub fn new(storage: Arc<Mutex<FlashcardStorage>>) -> Self {
        Self { storage }
    }

    pub(crate) fn storage(&self) -> ApiResult<MutexGuard<'_, FlashcardStorage>> {
        self.storage
            .lock()
            .map_err(|_| ApiError::Internal("storage lock poisoned".to_string()))
    }
}

/// Build the API router, serving `public_dir` for everything else when given
pub fn router(state: ApiState, public_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/api/decks", get(decks::list_decks).post(decks::create_deck))
        .route(
            "/api/decks/{id}",
            put(decks::rename_deck).delete(decks::delete_deck),
        )
        .route("/api/cards", get(cards::list_cards).post(cards::create_card))
        .route(
            "/api/cards/{id}",
            put(cards::update_card).delete(cards::delete_card),
        )
        .route("/api/srs/due", get(study::due_cards))
        .route("/api/srs/review", post(study::grade_card))
        .route(
            "/api/reviews",
            get(study::list_reviews).post(study::log_review),
        )
        .route("/api/stats", get(study::stats))
        .route(
            "/api/settings",
            get(study::get_settings).put(study::put_settings),
        )
        .with_state(state);

    if let Some(dir) = public_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Handle for a running API server
pub struct ApiServer {
    pub port: u16,
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the server gracefully
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind `addr` and serve the API in a background task.
/// Port 0 picks a free port; the chosen one is on the returned handle.
pub async fn start_server(
    addr: SocketAddr,
    storage: Arc<Mutex<FlashcardStorage>>,
    public_dir: Option<&Path>,
) -> std::io::Result<ApiServer> {
    let app = router(ApiState::new(storage), public_dir);

    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    log::info!("Flashcards API listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                log::info!("Flashcards API shutting down");
            })
            .await;
        if let Err(e) = result {
            log::error!("Flashcards API stopped with error: {}", e);
        }
    });

    Ok(ApiServer {
        port: addr.port(),
        addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    pub fn app() -> Router {
        let storage = FlashcardStorage::open_in_memory().unwrap();
        router(ApiState::new(Arc::new(Mutex::new(storage))), None)
    }

    /// Send one request, returning the status and the JSON body (Null if empty)
    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_full_crud_round_trip() {
        let app = app();

        let (status, deck) = send(&app, "POST", "/api/decks", Some(json!({"name": "Spanish"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let deck_id = deck["id"].as_i64().unwrap();

        let (status, card) = send(
            &app,
            "POST",
            "/api/cards",
            Some(json!({"front": "hola", "back": "hello", "deck": "Spanish"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(card["deck_id"], deck_id);
        let card_id = card["id"].as_i64().unwrap();

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/cards/{}", card_id),
            Some(json!({"back": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["back"], "hi");

        let (_, listed) = send(&app, "GET", &format!("/api/cards?deck_id={}", deck_id), None).await;
        assert_eq!(listed["cards"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", &format!("/api/cards/{}", card_id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/api/decks/{}", deck_id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, decks) = send(&app, "GET", "/api/decks", None).await;
        assert_eq!(decks["decks"], json!([]));
    }

    #[tokio::test]
    async fn test_cors_preflight_allowed() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let response = app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/cards")
                    .header("origin", "http://example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }

    #[tokio::test]
    async fn test_start_server_binds_free_port() {
        let storage = Arc::new(Mutex::new(FlashcardStorage::open_in_memory().unwrap()));
        let mut server = start_server("127.0.0.1:0".parse().unwrap(), storage, None)
            .await
            .unwrap();

        assert_ne!(server.port, 0);
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        server.stop();
    }
}
