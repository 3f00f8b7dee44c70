//! Deck endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiResult, ApiState};
use crate::flashcards::{CardSource, Deck};

#[derive(Debug, Deserialize)]
pub struct DeckBody {
    #[serde(default)]
    name: String,
}

pub async fn list_decks(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let decks = state.storage()?.list_decks()?;
    Ok(Json(json!({ "decks": decks })))
}

pub async fn create_deck(
    State(state): State<ApiState>,
    body: Result<Json<DeckBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Deck>)> {
    let Json(body) = body?;
    let deck = state.storage()?.create_deck(&body.name)?;
    log::info!("Created deck {} '{}'", deck.id, deck.name);
    Ok((StatusCode::CREATED, Json(deck)))
}

pub async fn rename_deck(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    body: Result<Json<DeckBody>, JsonRejection>,
) -> ApiResult<Json<Deck>> {
    let Json(body) = body?;
    let deck = state.storage()?.rename_deck(id, &body.name)?;
    Ok(Json(deck))
}

pub async fn delete_deck(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.storage()?.delete_deck(id)?;
    log::info!("Deleted deck {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_deck_errors() {
        let app = app();

        let (status, body) = send(&app, "POST", "/api/decks", Some(json!({"name": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        send(&app, "POST", "/api/decks", Some(json!({"name": "Dup"}))).await;
        let (status, _) = send(&app, "POST", "/api/decks", Some(json!({"name": "Dup"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_rename_and_list_sorted() {
        let app = app();
        let (_, zeta) = send(&app, "POST", "/api/decks", Some(json!({"name": "Zeta"}))).await;
        send(&app, "POST", "/api/decks", Some(json!({"name": "Beta"}))).await;

        let uri = format!("/api/decks/{}", zeta["id"]);
        let (status, renamed) = send(&app, "PUT", &uri, Some(json!({"name": "Alpha"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["name"], "Alpha");

        let (_, list) = send(&app, "GET", "/api/decks", None).await;
        let names: Vec<&str> = list["decks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);

        let (status, _) = send(&app, "PUT", "/api/decks/999", Some(json!({"name": "X"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "PUT", &uri, Some(json!({"name": "Beta"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_delete_missing_deck() {
        let (status, body) = send(&app(), "DELETE", "/api/decks/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Deck not found: 42");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/decks", Some(json!(42))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
