//! Data models for the flashcard system

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A named grouping of cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: i64,
    pub name: String,
}

/// Which decks a card query covers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeckFilter {
    #[default]
    All,
    Id(i64),
    Name(String),
}

impl DeckFilter {
    /// Build a filter from the optional `deck` (name) and `deck_id` query values.
    /// An id wins over a name; blank names mean all decks.
    pub fn from_query(name: Option<&str>, id: Option<i64>) -> Self {
        match (id, name.map(str::trim)) {
            (Some(id), _) => Self::Id(id),
            (None, Some(name)) if !name.is_empty() => Self::Name(name.to_string()),
            _ => Self::All,
        }
    }
}

/// Stored card type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    /// Flip-style front/back card
    #[default]
    Basic,
    /// Multiple choice, single or multi answer
    Mcq,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Mcq => "mcq",
        }
    }

    /// Anything other than "mcq" is treated as a basic card
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("mcq") {
            Self::Mcq
        } else {
            Self::Basic
        }
    }
}

/// What a card asks and how it is answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardContent {
    Basic {
        front: String,
        back: String,
    },
    MultipleChoiceSingle {
        front: String,
        choices: Vec<String>,
        /// Index into `choices`; may be out of range for malformed data
        answer: Option<usize>,
        choices_as_cards: bool,
    },
    MultipleChoiceMulti {
        front: String,
        choices: Vec<String>,
        answers: BTreeSet<usize>,
        choices_as_cards: bool,
    },
}

impl CardContent {
    pub fn front(&self) -> &str {
        match self {
            Self::Basic { front, .. }
            | Self::MultipleChoiceSingle { front, .. }
            | Self::MultipleChoiceMulti { front, .. } => front,
        }
    }

    /// Choices in their stored order; empty for basic cards
    pub fn choices(&self) -> &[String] {
        match self {
            Self::Basic { .. } => &[],
            Self::MultipleChoiceSingle { choices, .. } | Self::MultipleChoiceMulti { choices, .. } => {
                choices
            }
        }
    }

    pub fn card_type(&self) -> CardType {
        match self {
            Self::Basic { .. } => CardType::Basic,
            _ => CardType::Mcq,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Self::MultipleChoiceMulti { .. })
    }

    /// Texts of the correct choices, skipping indices that do not exist
    pub fn correct_choice_texts(&self) -> Vec<String> {
        match self {
            Self::Basic { .. } => Vec::new(),
            Self::MultipleChoiceSingle {
                choices, answer, ..
            } => answer
                .and_then(|i| choices.get(i))
                .cloned()
                .into_iter()
                .collect(),
            Self::MultipleChoiceMulti {
                choices, answers, ..
            } => answers
                .iter()
                .filter_map(|&i| choices.get(i).cloned())
                .collect(),
        }
    }
}

/// A flashcard as used by the rest of the crate.
///
/// On the wire and in the database a card is a flat record (see [`CardRecord`]);
/// serde converts through that record so the JSON contract stays the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CardRecord", into = "CardRecord")]
pub struct Card {
    pub id: i64,
    pub deck_id: Option<i64>,
    pub content: CardContent,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Card {
    pub fn basic(id: i64, front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            id,
            deck_id: None,
            content: CardContent::Basic {
                front: front.into(),
                back: back.into(),
            },
            created_at: None,
            updated_at: None,
        }
    }

    pub fn single_choice(id: i64, front: &str, choices: &[&str], answer: usize) -> Self {
        Self {
            id,
            deck_id: None,
            content: CardContent::MultipleChoiceSingle {
                front: front.to_string(),
                choices: choices.iter().map(|c| c.to_string()).collect(),
                answer: Some(answer),
                choices_as_cards: false,
            },
            created_at: None,
            updated_at: None,
        }
    }

    pub fn multi_choice(id: i64, front: &str, choices: &[&str], answers: &[usize]) -> Self {
        Self {
            id,
            deck_id: None,
            content: CardContent::MultipleChoiceMulti {
                front: front.to_string(),
                choices: choices.iter().map(|c| c.to_string()).collect(),
                answers: answers.iter().copied().collect(),
                choices_as_cards: false,
            },
            created_at: None,
            updated_at: None,
        }
    }
}

/// Flat card record matching the REST payloads and the `cards` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: i64,
    #[serde(default)]
    pub deck_id: Option<i64>,
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
    #[serde(rename = "type", default)]
    pub card_type: CardType,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub answer: Option<i64>,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub answers: Option<Vec<i64>>,
    #[serde(default)]
    pub choices_as_cards: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn to_index(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

impl From<CardRecord> for Card {
    fn from(record: CardRecord) -> Self {
        let content = match record.card_type {
            CardType::Basic => CardContent::Basic {
                front: record.front,
                back: record.back,
            },
            CardType::Mcq if record.multi => {
                let mut answers: BTreeSet<usize> = record
                    .answers
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(to_index)
                    .collect();
                if answers.is_empty() {
                    answers.extend(record.answer.and_then(to_index));
                }
                CardContent::MultipleChoiceMulti {
                    front: record.front,
                    choices: record.choices.unwrap_or_default(),
                    answers,
                    choices_as_cards: record.choices_as_cards,
                }
            }
            CardType::Mcq => CardContent::MultipleChoiceSingle {
                front: record.front,
                choices: record.choices.unwrap_or_default(),
                answer: record.answer.and_then(to_index),
                choices_as_cards: record.choices_as_cards,
            },
        };

        Self {
            id: record.id,
            deck_id: record.deck_id,
            content,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<Card> for CardRecord {
    fn from(card: Card) -> Self {
        let mut record = CardRecord {
            id: card.id,
            deck_id: card.deck_id,
            card_type: card.content.card_type(),
            created_at: card.created_at,
            updated_at: card.updated_at,
            ..Default::default()
        };

        match card.content {
            CardContent::Basic { front, back } => {
                record.front = front;
                record.back = back;
            }
            CardContent::MultipleChoiceSingle {
                front,
                choices,
                answer,
                choices_as_cards,
            } => {
                record.front = front;
                record.choices = Some(choices);
                record.answer = answer.map(|a| a as i64);
                record.answers = answer.map(|a| vec![a as i64]);
                record.choices_as_cards = choices_as_cards;
            }
            CardContent::MultipleChoiceMulti {
                front,
                choices,
                answers,
                choices_as_cards,
            } => {
                record.front = front;
                record.choices = Some(choices);
                record.multi = true;
                record.answers = Some(answers.into_iter().map(|a| a as i64).collect());
                record.choices_as_cards = choices_as_cards;
            }
        }

        record
    }
}

/// Payload for creating a card
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewCard {
    pub front: String,
    pub back: String,
    #[serde(rename = "type")]
    pub card_type: Option<String>,
    /// Deck name; created on demand. Defaults to "Default".
    pub deck: Option<String>,
    pub deck_id: Option<i64>,
    pub choices: Option<Vec<String>>,
    pub multi: bool,
    pub answer: Option<i64>,
    pub answers: Option<Vec<i64>>,
    pub choices_as_cards: bool,
}

/// Distinguish a missing field from an explicit `null`
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update for a card. Outer `None` means "leave unchanged";
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CardPatch {
    pub front: Option<String>,
    pub back: Option<String>,
    #[serde(rename = "type")]
    pub card_type: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub choices: Option<Option<Vec<String>>>,
    #[serde(deserialize_with = "double_option")]
    pub answer: Option<Option<i64>>,
    #[serde(deserialize_with = "double_option")]
    pub answers: Option<Option<Vec<i64>>>,
    pub multi: Option<bool>,
    pub choices_as_cards: Option<bool>,
    /// Move to the deck with this name, creating it if needed
    pub deck: Option<String>,
}

/// How a single study attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Correct,
    Wrong,
    /// Basic card flipped to its back
    Revealed,
    /// The reveal timer ran out
    Timeout,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Wrong => "wrong",
            Self::Revealed => "revealed",
            Self::Timeout => "timeout",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "correct" => Some(Self::Correct),
            "wrong" => Some(Self::Wrong),
            "revealed" => Some(Self::Revealed),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }
}

/// A persisted review log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub id: i64,
    pub card_id: i64,
    pub outcome: ReviewOutcome,
    pub duration_ms: u64,
    pub reviewed_at: DateTime<Utc>,
}

/// Status of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardStatus {
    /// Never reviewed
    #[default]
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Failed and re-learning
    Relearning,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "learning" => Self::Learning,
            "review" => Self::Review,
            "relearning" => Self::Relearning,
            _ => Self::New,
        }
    }
}

/// Current spaced repetition state for a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsState {
    pub card_id: i64,
    /// Current interval in days
    pub interval: i32,
    /// SM-2 ease factor (default 2.5)
    pub ease_factor: f32,
    /// When the card is due for review
    pub due_at: DateTime<Utc>,
    pub review_count: i32,
    pub correct_count: i32,
    pub status: CardStatus,
}

impl SrsState {
    pub fn new(card_id: i64) -> Self {
        Self {
            card_id,
            interval: 0,
            ease_factor: 2.5,
            due_at: Utc::now(),
            review_count: 0,
            correct_count: 0,
            status: CardStatus::New,
        }
    }

    pub fn is_due(&self) -> bool {
        Utc::now() >= self.due_at
    }
}

/// Card, deck and review counts, optionally for one deck
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck: Option<String>,
    pub card_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck_count: Option<usize>,
    pub due_count: usize,
    pub review_count: usize,
    pub correct_count: usize,
    pub reviews_today: usize,
}

/// Study preferences persisted in the settings key-value table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudyPreferences {
    pub timer_enabled: bool,
    pub timer_duration_ms: u64,
    pub auto_advance_enabled: bool,
    pub auto_advance_delay_ms: u64,
    pub default_deck_name: Option<String>,
    pub cards_per_page: u32,
    pub stats_per_page: u32,
    pub allow_html: bool,
}

impl Default for StudyPreferences {
    fn default() -> Self {
        Self {
            timer_enabled: false,
            timer_duration_ms: 10_000,
            auto_advance_enabled: false,
            auto_advance_delay_ms: 5_000,
            default_deck_name: None,
            cards_per_page: 20,
            stats_per_page: 20,
            allow_html: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_record_becomes_tagged_content() {
        let json = r#"{"id":4,"deck_id":1,"front":"Which language runs in the browser?","back":"",
            "type":"mcq","choices":["Python","Java","JavaScript","C++"],"answer":2,"multi":false,
            "answers":[2],"choices_as_cards":false}"#;
        let card: Card = serde_json::from_str(json).unwrap();

        assert_eq!(card.deck_id, Some(1));
        match &card.content {
            CardContent::MultipleChoiceSingle { choices, answer, .. } => {
                assert_eq!(choices.len(), 4);
                assert_eq!(*answer, Some(2));
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_multi_record_keeps_answer_set() {
        let json = r#"{"id":9,"front":"Primes","type":"mcq","choices":["2","4","5"],"multi":true,"answers":[2,0,2]}"#;
        let card: Card = serde_json::from_str(json).unwrap();

        match card.content {
            CardContent::MultipleChoiceMulti { answers, .. } => {
                assert_eq!(answers.into_iter().collect::<Vec<_>>(), vec![0, 2]);
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_mcq_is_normalized() {
        let json = r#"{"id":1,"front":"?","type":"mcq","choices":null,"answer":-3}"#;
        let card: Card = serde_json::from_str(json).unwrap();

        assert_eq!(
            card.content,
            CardContent::MultipleChoiceSingle {
                front: "?".to_string(),
                choices: Vec::new(),
                answer: None,
                choices_as_cards: false,
            }
        );
    }

    #[test]
    fn test_serialized_card_uses_flat_wire_shape() {
        let card = Card::single_choice(3, "Pick y", &["x", "y", "z"], 1);
        let value = serde_json::to_value(&card).unwrap();

        assert_eq!(value["type"], "mcq");
        assert_eq!(value["answer"], 1);
        assert_eq!(value["answers"], serde_json::json!([1]));
        assert_eq!(value["multi"], false);
    }

    #[test]
    fn test_patch_distinguishes_null_from_missing() {
        let patch: CardPatch = serde_json::from_str(r#"{"answer":null}"#).unwrap();
        assert_eq!(patch.answer, Some(None));
        assert!(patch.answers.is_none());
        assert!(patch.choices.is_none());
    }

    #[test]
    fn test_correct_choice_texts_skip_out_of_range() {
        let card = Card::multi_choice(1, "q", &["a", "b"], &[1, 7]);
        assert_eq!(card.content.correct_choice_texts(), vec!["b".to_string()]);
    }

    #[test]
    fn test_deck_filter_from_query() {
        assert_eq!(DeckFilter::from_query(Some("Spanish"), None), DeckFilter::Name("Spanish".into()));
        assert_eq!(DeckFilter::from_query(Some("Spanish"), Some(2)), DeckFilter::Id(2));
        assert_eq!(DeckFilter::from_query(Some("  "), None), DeckFilter::All);
    }

    #[test]
    fn test_preferences_fill_missing_fields() {
        let prefs: StudyPreferences = serde_json::from_str(r#"{"timerEnabled":true}"#).unwrap();
        assert!(prefs.timer_enabled);
        assert_eq!(prefs.timer_duration_ms, 10_000);
        assert_eq!(prefs.auto_advance_delay_ms, 5_000);
    }
}
