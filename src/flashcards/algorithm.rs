//! SM-2 scheduling for graded reviews (`POST /api/srs/review`).
//!
//! Grades run 0-5; 3 and above count as recalled. A failed grade sends the
//! card back to a one-day interval and costs 0.2 ease.

use chrono::{DateTime, Duration, Utc};

use super::models::{CardStatus, SrsState};

/// Minimum ease factor allowed
const MIN_EASE_FACTOR: f32 = 1.3;

/// Longest interval a card can be scheduled out, in days
pub const MAX_INTERVAL_DAYS: i32 = 36_500;

/// Lowest grade that counts as a correct recall
pub const PASSING_GRADE: i32 = 3;

/// Result of calculating the next review
#[derive(Debug, Clone)]
pub struct ReviewResult {
    pub interval: i32,
    pub ease_factor: f32,
    pub due_at: DateTime<Utc>,
    pub status: CardStatus,
}

/// Calculate the next review interval and ease factor for a grade
pub fn calculate_next_review(state: &SrsState, grade: i32, now: DateTime<Utc>) -> ReviewResult {
    let grade = grade.clamp(0, 5);

    let mut ease_factor = state.ease_factor;
    let interval;
    let status;

    if grade >= PASSING_GRADE {
        match state.review_count {
            0 => {
                interval = 1;
                status = CardStatus::Learning;
            }
            1 => {
                interval = 6;
                status = CardStatus::Review;
            }
            _ => {
                let next = (state.interval.max(1) as f64 * ease_factor as f64).round();
                interval = next.min(MAX_INTERVAL_DAYS as f64) as i32;
                status = CardStatus::Review;
            }
        }

        // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
        let miss = (5 - grade) as f32;
        ease_factor = (ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR);
    } else {
        interval = 1;
        ease_factor = (ease_factor - 0.2).max(MIN_EASE_FACTOR);

        status = if state.status == CardStatus::Review {
            CardStatus::Relearning
        } else {
            CardStatus::Learning
        };
    }

    let interval = interval.clamp(1, MAX_INTERVAL_DAYS);
    let due_at = now
        .checked_add_signed(Duration::days(interval as i64))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    ReviewResult {
        interval,
        ease_factor,
        due_at,
        status,
    }
}

/// Apply a grade to a state, returning the updated state
pub fn apply_grade(state: &SrsState, grade: i32, now: DateTime<Utc>) -> SrsState {
    let ReviewResult {
        interval,
        ease_factor,
        due_at,
        status,
    } = calculate_next_review(state, grade, now);

    SrsState {
        card_id: state.card_id,
        interval,
        ease_factor,
        due_at,
        review_count: state.review_count + 1,
        correct_count: state.correct_count + i32::from(grade >= PASSING_GRADE),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_review_correct() {
        let state = SrsState::new(1);
        let result = calculate_next_review(&state, 4, Utc::now());

        assert_eq!(result.interval, 1);
        assert_eq!(result.status, CardStatus::Learning);
    }

    #[test]
    fn test_second_review_correct() {
        let mut state = SrsState::new(1);
        state.review_count = 1;
        state.interval = 1;

        let result = calculate_next_review(&state, 4, Utc::now());

        assert_eq!(result.interval, 6);
        assert_eq!(result.status, CardStatus::Review);
    }

    #[test]
    fn test_subsequent_review_multiplies_by_ease() {
        let mut state = SrsState::new(1);
        state.review_count = 5;
        state.interval = 10;
        state.ease_factor = 2.5;

        let result = calculate_next_review(&state, 4, Utc::now());

        assert_eq!(result.interval, 25);
    }

    #[test]
    fn test_failed_review_relearns() {
        let mut state = SrsState::new(1);
        state.review_count = 5;
        state.interval = 30;
        state.status = CardStatus::Review;

        let result = calculate_next_review(&state, 1, Utc::now());

        assert_eq!(result.interval, 1);
        assert_eq!(result.status, CardStatus::Relearning);
    }

    #[test]
    fn test_ease_factor_never_drops_below_minimum() {
        let mut state = SrsState::new(1);
        state.ease_factor = 1.4;
        for _ in 0..5 {
            state = apply_grade(&state, 0, Utc::now());
            assert!(state.ease_factor >= MIN_EASE_FACTOR);
        }
    }

    #[test]
    fn test_apply_grade_counts_correct_reviews() {
        let now = Utc::now();
        let state = apply_grade(&SrsState::new(7), 5, now);
        let state = apply_grade(&state, 2, now);

        assert_eq!(state.card_id, 7);
        assert_eq!(state.review_count, 2);
        assert_eq!(state.correct_count, 1);
        assert_eq!(state.due_at, now + Duration::days(1));
    }

    #[test]
    fn test_interval_is_capped_after_many_perfect_reviews() {
        let now = Utc::now();
        let mut state = SrsState::new(1);
        for _ in 0..40 {
            state = apply_grade(&state, 5, now);
            assert!(state.interval <= MAX_INTERVAL_DAYS);
        }

        assert_eq!(state.interval, MAX_INTERVAL_DAYS);
        assert_eq!(state.due_at, now + Duration::days(MAX_INTERVAL_DAYS as i64));
    }

    #[test]
    fn test_oversized_stored_interval_is_clamped() {
        let mut state = SrsState::new(1);
        state.review_count = 3;
        state.interval = i32::MAX;

        let result = calculate_next_review(&state, 4, Utc::now());
        assert_eq!(result.interval, MAX_INTERVAL_DAYS);
    }
}
