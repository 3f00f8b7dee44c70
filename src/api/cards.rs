//! Card endpoints

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiResult, ApiState};
use crate::flashcards::{Card, CardPatch, CardSource, DeckFilter, NewCard};

#[derive(Debug, Default, Deserialize)]
pub struct CardsQuery {
    /// Deck name
    deck: Option<String>,
    deck_id: Option<i64>,
}

pub async fn list_cards(
    State(state): State<ApiState>,
    query: Result<Query<CardsQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let filter = DeckFilter::from_query(query.deck.as_deref(), query.deck_id);
    let cards = state.storage()?.list_cards(&filter)?;
    Ok(Json(json!({ "cards": cards })))
}

pub async fn create_card(
    State(state): State<ApiState>,
    body: Result<Json<NewCard>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Card>)> {
    let Json(new_card) = body?;
    let card = state.storage()?.create_card(&new_card)?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn update_card(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    body: Result<Json<CardPatch>, JsonRejection>,
) -> ApiResult<Json<Card>> {
    let Json(patch) = body?;
    let card = state.storage()?.update_card(id, &patch)?;
    Ok(Json(card))
}

pub async fn delete_card(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.storage()?.delete_card(id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_card_uses_default_deck() {
        let app = app();
        let (status, card) = send(
            &app,
            "POST",
            "/api/cards",
            Some(json!({"front": "Q", "back": "A"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(card["type"], "basic");

        let (_, decks) = send(&app, "GET", "/api/decks", None).await;
        assert_eq!(decks["decks"][0]["name"], "Default");
        assert_eq!(decks["decks"][0]["id"], card["deck_id"]);
    }

    #[tokio::test]
    async fn test_create_mcq_validation() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/cards",
            Some(json!({"front": "Q", "type": "mcq", "choices": ["a"], "answer": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "For type 'mcq', 'choices' must be a list of 2+ non-empty strings"
        );

        let (status, card) = send(
            &app,
            "POST",
            "/api/cards",
            Some(json!({
                "front": "Primes", "type": "mcq", "multi": true,
                "choices": ["2", "4", "5"], "answers": [2, 0, 7]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(card["multi"], true);
        assert_eq!(card["answers"], json!([0, 2]));
        assert_eq!(card["choices"], json!(["2", "4", "5"]));
    }

    #[tokio::test]
    async fn test_list_cards_by_deck_name() {
        let app = app();
        for (front, deck) in [("a", "One"), ("b", "Two"), ("c", "One")] {
            send(
                &app,
                "POST",
                "/api/cards",
                Some(json!({"front": front, "back": "x", "deck": deck})),
            )
            .await;
        }

        let (_, one) = send(&app, "GET", "/api/cards?deck=One", None).await;
        let fronts: Vec<&str> = one["cards"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["front"].as_str().unwrap())
            .collect();
        assert_eq!(fronts, vec!["a", "c"]);

        let (_, all) = send(&app, "GET", "/api/cards", None).await;
        assert_eq!(all["cards"].as_array().unwrap().len(), 3);

        let (status, _) = send(&app, "GET", "/api/cards?deck_id=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_card_rules() {
        let app = app();
        let (_, card) = send(
            &app,
            "POST",
            "/api/cards",
            Some(json!({"front": "Q", "type": "mcq", "choices": ["a", "b"], "answer": 0})),
        )
        .await;
        let uri = format!("/api/cards/{}", card["id"]);

        let (status, _) = send(&app, "PUT", &uri, Some(json!({"type": "basic"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "PUT", &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "PUT", "/api/cards/999", Some(json!({"front": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, updated) = send(
            &app,
            "PUT",
            &uri,
            Some(json!({"choices": ["a", "b", "c"], "answer": 2, "deck": "Moved"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["answer"], 2);
        assert_eq!(updated["choices"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_missing_card() {
        let (status, _) = send(&app(), "DELETE", "/api/cards/5", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
