//! Spaced repetition, review log, stats and settings endpoints

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, ApiResult, ApiState};
use crate::flashcards::{CardSource, DeckFilter, ReviewOutcome, StudyPreferences, StudyStats};

const DEFAULT_DUE_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct StudyQuery {
    /// Deck name, or a numeric deck id
    deck: Option<String>,
    deck_id: Option<i64>,
    limit: Option<usize>,
}

impl StudyQuery {
    fn filter(&self) -> DeckFilter {
        match self.deck.as_deref().map(str::trim).map(str::parse::<i64>) {
            Some(Ok(id)) if self.deck_id.is_none() => DeckFilter::Id(id),
            _ => DeckFilter::from_query(self.deck.as_deref(), self.deck_id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeBody {
    id: i64,
    grade: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    id: i64,
    result: String,
    #[serde(default)]
    duration_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewsQuery {
    card_id: Option<i64>,
}

pub async fn due_cards(
    State(state): State<ApiState>,
    query: Result<Query<StudyQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let limit = query.limit.filter(|&l| l > 0).unwrap_or(DEFAULT_DUE_LIMIT);
    let cards = state.storage()?.list_due_cards(&query.filter(), limit)?;
    Ok(Json(json!({ "cards": cards })))
}

pub async fn grade_card(
    State(state): State<ApiState>,
    body: Result<Json<GradeBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    if !(0..=5).contains(&body.grade) {
        return Err(ApiError::BadRequest(
            "'grade' must be between 0 and 5".to_string(),
        ));
    }

    let srs = state.storage()?.log_srs_grade(body.id, body.grade)?;
    Ok(Json(json!({ "ok": true, "srs": srs })))
}

pub async fn log_review(
    State(state): State<ApiState>,
    body: Result<Json<ReviewBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let outcome = ReviewOutcome::parse(&body.result).ok_or_else(|| {
        ApiError::BadRequest(
            "'result' must be one of correct, wrong, revealed, timeout".to_string(),
        )
    })?;

    let storage = state.storage()?;
    storage.get_card(body.id)?;
    storage.log_review(body.id, outcome, body.duration_ms)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn list_reviews(
    State(state): State<ApiState>,
    query: Result<Query<ReviewsQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let reviews = state.storage()?.list_reviews(query.card_id)?;
    Ok(Json(json!({ "reviews": reviews })))
}

pub async fn stats(
    State(state): State<ApiState>,
    query: Result<Query<StudyQuery>, QueryRejection>,
) -> ApiResult<Json<StudyStats>> {
    let Query(query) = query?;
    Ok(Json(state.storage()?.stats(&query.filter())?))
}

pub async fn get_settings(State(state): State<ApiState>) -> ApiResult<Json<StudyPreferences>> {
    Ok(Json(state.storage()?.load_preferences()?))
}

pub async fn put_settings(
    State(state): State<ApiState>,
    body: Result<Json<StudyPreferences>, JsonRejection>,
) -> ApiResult<Json<StudyPreferences>> {
    let Json(prefs) = body?;
    state.storage()?.save_preferences(&prefs)?;
    log::info!("Study preferences updated");
    Ok(Json(prefs))
}
