//! SQLite storage for decks, cards, review logs and spaced repetition state
//!
//! Tables:
//! ```text
//! decks     (id, name UNIQUE)
//! cards     (id, deck_id -> decks ON DELETE SET NULL, front, back, type,
//!            choices JSON, answer, multi, answers JSON, choices_as_cards, timestamps)
//! reviews   (id, card_id, outcome, duration_ms, reviewed_at)
//! srs_state (card_id PK, interval, ease_factor, due_at, counts, status)
//! settings  (key PK, value JSON)
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use thiserror::Error;

use super::algorithm::apply_grade;
use super::models::*;

#[derive(Error, Debug)]
pub enum FlashcardStorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deck not found: {0}")]
    DeckNotFound(i64),

    #[error("Card not found: {0}")]
    CardNotFound(i64),

    #[error("Deck already exists: {0}")]
    DuplicateDeck(String),

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, FlashcardStorageError>;

fn invalid(message: &str) -> FlashcardStorageError {
    FlashcardStorageError::Invalid(message.to_string())
}

/// Read side of the repository, as consumed by study sessions
pub trait CardSource {
    fn list_decks(&self) -> Result<Vec<Deck>>;
    fn list_cards(&self, deck: &DeckFilter) -> Result<Vec<Card>>;
    fn list_due_cards(&self, deck: &DeckFilter, limit: usize) -> Result<Vec<Card>>;
}

const CARD_COLUMNS: &str = "c.id, c.deck_id, c.front, c.back, c.created_at, c.updated_at, \
     c.type, c.choices, c.answer, c.multi, c.answers, c.choices_as_cards";

/// Columns added after the first release; added to older databases on open
const UPGRADE_COLUMNS: &[(&str, &str)] = &[
    ("type", "TEXT NOT NULL DEFAULT 'basic'"),
    ("choices", "TEXT"),
    ("answer", "INTEGER"),
    ("multi", "INTEGER NOT NULL DEFAULT 0"),
    ("answers", "TEXT"),
    ("choices_as_cards", "INTEGER NOT NULL DEFAULT 0"),
];

const DEFAULT_DECK: &str = "Default";

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn to_index(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

fn valid_indices(values: &[i64], len: usize) -> BTreeSet<usize> {
    values
        .iter()
        .filter_map(|&v| to_index(v))
        .filter(|&v| v < len)
        .collect()
}

/// Trimmed choices, or `None` unless there are 2+ non-empty entries
fn normalize_choices(choices: &[String]) -> Option<Vec<String>> {
    if choices.len() < 2 || choices.iter().any(|c| c.trim().is_empty()) {
        return None;
    }
    Some(choices.iter().map(|c| c.trim().to_string()).collect())
}

fn deck_clause(filter: &DeckFilter) -> (&'static str, Vec<Value>) {
    match filter {
        DeckFilter::All => ("1 = 1", Vec::new()),
        DeckFilter::Id(id) => ("c.deck_id = ?", vec![Value::Integer(*id)]),
        DeckFilter::Name(name) => (
            "c.deck_id IN (SELECT id FROM decks WHERE name = ?)",
            vec![Value::Text(name.clone())],
        ),
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<CardRecord> {
    let card_type: Option<String> = row.get(6)?;
    let choices: Option<String> = row.get(7)?;
    let answers: Option<String> = row.get(10)?;

    Ok(CardRecord {
        id: row.get(0)?,
        deck_id: row.get(1)?,
        front: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        back: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        card_type: card_type.as_deref().map(CardType::parse).unwrap_or_default(),
        // Undecodable JSON is treated as missing rather than failing the query
        choices: choices.and_then(|s| serde_json::from_str(&s).ok()),
        answer: row.get(8)?,
        multi: row.get::<_, Option<i64>>(9)?.unwrap_or(0) != 0,
        answers: answers.and_then(|s| serde_json::from_str(&s).ok()),
        choices_as_cards: row.get::<_, Option<i64>>(11)?.unwrap_or(0) != 0,
    })
}

fn row_to_srs_state(row: &Row) -> rusqlite::Result<SrsState> {
    let due_at: String = row.get(3)?;
    let status: String = row.get(6)?;
    Ok(SrsState {
        card_id: row.get(0)?,
        interval: row.get(1)?,
        ease_factor: row.get::<_, f64>(2)? as f32,
        due_at: parse_timestamp(&due_at),
        review_count: row.get(4)?,
        correct_count: row.get(5)?,
        status: CardStatus::parse(&status),
    })
}

/// Validate a create payload into card content
fn content_from_new(new: &NewCard) -> Result<CardContent> {
    let front = new.front.trim().to_string();
    let card_type = new
        .card_type
        .as_deref()
        .map(CardType::parse)
        .unwrap_or_default();

    match card_type {
        CardType::Basic => {
            let back = new.back.trim();
            if front.is_empty() || back.is_empty() {
                return Err(invalid("'front' and 'back' are required for basic cards"));
            }
            Ok(CardContent::Basic {
                front,
                back: back.to_string(),
            })
        }
        CardType::Mcq => {
            let choices = new
                .choices
                .as_deref()
                .and_then(normalize_choices)
                .ok_or_else(|| {
                    invalid("For type 'mcq', 'choices' must be a list of 2+ non-empty strings")
                })?;

            let content = if new.multi {
                let answers = new
                    .answers
                    .as_deref()
                    .ok_or_else(|| invalid("For MCQ multi, 'answers' must be an array of indexes"))?;
                let answers = valid_indices(answers, choices.len());
                if answers.is_empty() {
                    return Err(invalid("Provide at least one valid answer index"));
                }
                CardContent::MultipleChoiceMulti {
                    front: front.clone(),
                    choices,
                    answers,
                    choices_as_cards: new.choices_as_cards,
                }
            } else {
                let answer = new
                    .answer
                    .and_then(to_index)
                    .filter(|&a| a < choices.len())
                    .ok_or_else(|| {
                        invalid("For MCQ single, 'answer' must be a valid choice index")
                    })?;
                CardContent::MultipleChoiceSingle {
                    front: front.clone(),
                    choices,
                    answer: Some(answer),
                    choices_as_cards: new.choices_as_cards,
                }
            };

            if front.is_empty() {
                return Err(invalid("'front' (question) is required"));
            }
            Ok(content)
        }
    }
}

/// Storage manager for flashcard operations
pub struct FlashcardStorage {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl FlashcardStorage {
    /// Open (or create) the database at `db_path` and bring the schema up to date
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn,
            db_path: Some(db_path.to_path_buf()),
        };
        storage.init_schema()?;
        log::info!("Opened flashcard database at {:?}", db_path);
        Ok(storage)
    }

    /// In-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        let storage = Self {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        storage.init_schema()?;
        Ok(storage)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS decks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                deck_id INTEGER,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                created_at TEXT DEFAULT (datetime('now')),
                updated_at TEXT DEFAULT (datetime('now')),
                FOREIGN KEY(deck_id) REFERENCES decks(id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                card_id INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                reviewed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS srs_state (
                card_id INTEGER PRIMARY KEY,
                interval INTEGER NOT NULL,
                ease_factor REAL NOT NULL,
                due_at TEXT NOT NULL,
                review_count INTEGER NOT NULL,
                correct_count INTEGER NOT NULL,
                status TEXT NOT NULL,
                FOREIGN KEY(card_id) REFERENCES cards(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cards_deck_id ON cards(deck_id);
            CREATE INDEX IF NOT EXISTS idx_reviews_card_id ON reviews(card_id);
            "#,
        )?;

        self.upgrade_cards_table()
    }

    /// Add multiple-choice columns to databases created before they existed
    fn upgrade_cards_table(&self) -> Result<()> {
        let existing: BTreeSet<String> = {
            let mut stmt = self.conn.prepare("PRAGMA table_info(cards)")?;
            let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
            names.collect::<rusqlite::Result<_>>()?
        };

        for (column, definition) in UPGRADE_COLUMNS {
            if !existing.contains(*column) {
                self.conn.execute(
                    &format!("ALTER TABLE cards ADD COLUMN {} {}", column, definition),
                    [],
                )?;
                log::info!("Added cards.{} column", column);
            }
        }

        Ok(())
    }

    /// Seed a "Default" deck and a few sample cards into an empty database
    pub fn seed_if_empty(&self) -> Result<()> {
        let deck_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM decks", [], |row| row.get(0))?;
        if deck_count == 0 {
            self.conn
                .execute("INSERT INTO decks (name) VALUES (?1)", params![DEFAULT_DECK])?;
        }

        let card_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        if card_count > 0 {
            return Ok(());
        }

        let deck_id = self.ensure_deck(DEFAULT_DECK)?;
        let samples = [
            ("What is the capital of France?", "Paris"),
            ("2 + 2 = ?", "4"),
            ("HTTP status for Not Found?", "404"),
        ];
        for (front, back) in samples {
            self.insert_content(
                deck_id,
                &CardContent::Basic {
                    front: front.to_string(),
                    back: back.to_string(),
                },
            )?;
        }
        self.insert_content(
            deck_id,
            &CardContent::MultipleChoiceSingle {
                front: "Which language runs in the browser?".to_string(),
                choices: ["Python", "Java", "JavaScript", "C++"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                answer: Some(2),
                choices_as_cards: false,
            },
        )?;

        log::info!("Seeded sample deck '{}'", DEFAULT_DECK);
        Ok(())
    }

    // ==================== Deck Operations ====================

    pub fn get_deck(&self, deck_id: i64) -> Result<Deck> {
        self.conn
            .query_row(
                "SELECT id, name FROM decks WHERE id = ?1",
                params![deck_id],
                |row| {
                    Ok(Deck {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or(FlashcardStorageError::DeckNotFound(deck_id))
    }

    pub fn find_deck_by_name(&self, name: &str) -> Result<Option<Deck>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM decks WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Deck {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    /// Create a deck; names are trimmed and must be unique
    pub fn create_deck(&self, name: &str) -> Result<Deck> {
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("'name' is required"));
        }

        match self
            .conn
            .execute("INSERT INTO decks (name) VALUES (?1)", params![name])
        {
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                return Err(FlashcardStorageError::DuplicateDeck(name.to_string()))
            }
            other => other?,
        };

        Ok(Deck {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Id of the deck with this name, creating it if it does not exist
    fn ensure_deck(&self, name: &str) -> Result<i64> {
        if let Some(deck) = self.find_deck_by_name(name)? {
            return Ok(deck.id);
        }
        self.conn
            .execute("INSERT INTO decks (name) VALUES (?1)", params![name])?;
        log::debug!("Created deck '{}' on demand", name);
        Ok(self.conn.last_insert_rowid())
    }

    pub fn rename_deck(&self, deck_id: i64, name: &str) -> Result<Deck> {
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("'name' is required"));
        }

        let updated = match self.conn.execute(
            "UPDATE decks SET name = ?1 WHERE id = ?2",
            params![name, deck_id],
        ) {
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                return Err(FlashcardStorageError::DuplicateDeck(name.to_string()))
            }
            other => other?,
        };
        if updated == 0 {
            return Err(FlashcardStorageError::DeckNotFound(deck_id));
        }

        Ok(Deck {
            id: deck_id,
            name: name.to_string(),
        })
    }

    /// Delete a deck. Its cards stay, with no deck.
    pub fn delete_deck(&self, deck_id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE cards SET deck_id = NULL WHERE deck_id = ?1",
            params![deck_id],
        )?;
        let deleted = tx.execute("DELETE FROM decks WHERE id = ?1", params![deck_id])?;
        if deleted == 0 {
            return Err(FlashcardStorageError::DeckNotFound(deck_id));
        }
        tx.commit()?;
        Ok(())
    }

    // ==================== Card Operations ====================

    pub fn get_card(&self, card_id: i64) -> Result<Card> {
        let sql = format!("SELECT {} FROM cards c WHERE c.id = ?1", CARD_COLUMNS);
        self.conn
            .query_row(&sql, params![card_id], row_to_record)
            .optional()?
            .map(Card::from)
            .ok_or(FlashcardStorageError::CardNotFound(card_id))
    }

    fn query_cards(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_record)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records.into_iter().map(Card::from).collect())
    }

    fn insert_content(&self, deck_id: i64, content: &CardContent) -> Result<i64> {
        let record = CardRecord::from(Card {
            id: 0,
            deck_id: Some(deck_id),
            content: content.clone(),
            created_at: None,
            updated_at: None,
        });
        let choices = record.choices.as_ref().map(serde_json::to_string).transpose()?;
        let answers = record.answers.as_ref().map(serde_json::to_string).transpose()?;

        self.conn.execute(
            "INSERT INTO cards (deck_id, front, back, type, choices, answer, multi, answers, choices_as_cards)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.deck_id,
                record.front,
                record.back,
                record.card_type.as_str(),
                choices,
                record.answer,
                record.multi,
                answers,
                record.choices_as_cards,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Validate and insert a new card
    pub fn create_card(&self, new: &NewCard) -> Result<Card> {
        let content = content_from_new(new)?;

        let deck_id = match new.deck_id {
            Some(id) => self.get_deck(id)?.id,
            None => {
                let name = new
                    .deck
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_DECK);
                self.ensure_deck(name)?
            }
        };

        let id = self.insert_content(deck_id, &content)?;
        log::debug!("Created {} card {} in deck {}", content.card_type().as_str(), id, deck_id);
        self.get_card(id)
    }

    /// Apply a partial update. The card type is immutable and fields that do
    /// not belong to the card's type are rejected.
    pub fn update_card(&self, card_id: i64, patch: &CardPatch) -> Result<Card> {
        let existing = self.get_card(card_id)?;

        if patch.card_type.is_some() {
            return Err(invalid(
                "'type' is immutable; create a new card to change type",
            ));
        }

        match existing.content.card_type() {
            CardType::Basic => {
                if matches!(patch.choices, Some(Some(_)))
                    || matches!(patch.answer, Some(Some(_)))
                    || matches!(patch.answers, Some(Some(_)))
                    || patch.multi.is_some()
                {
                    return Err(invalid(
                        "Basic cards cannot have 'choices', 'answer(s)', or 'multi'",
                    ));
                }
            }
            CardType::Mcq => {
                if patch.back.as_deref().is_some_and(|b| !b.trim().is_empty()) {
                    return Err(invalid("MCQ cards do not support 'back' text"));
                }
            }
        }

        if patch.answer.is_some() && patch.answers.is_some() {
            return Err(invalid("Provide either 'answer' or 'answers', not both"));
        }

        let mut current_choices = existing.content.choices().to_vec();
        let mut fields: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(front) = &patch.front {
            fields.push("front = ?");
            values.push(Value::Text(front.trim().to_string()));
        }
        if let Some(back) = &patch.back {
            fields.push("back = ?");
            values.push(Value::Text(back.trim().to_string()));
        }
        match &patch.choices {
            None => {}
            Some(None) => fields.push("choices = NULL"),
            Some(Some(choices)) => {
                let choices = normalize_choices(choices).ok_or_else(|| {
                    invalid("'choices' must be null or a list of 2+ non-empty strings")
                })?;
                fields.push("choices = ?");
                values.push(Value::Text(serde_json::to_string(&choices)?));
                current_choices = choices;
            }
        }
        match patch.answer {
            None => {}
            Some(None) => fields.push("answer = NULL"),
            Some(Some(answer)) => {
                let answer = to_index(answer)
                    .filter(|&a| a < current_choices.len())
                    .ok_or_else(|| invalid("'answer' must be a valid choice index"))?;
                fields.push("answer = ?");
                values.push(Value::Integer(answer as i64));
                fields.push("answers = ?");
                values.push(Value::Text(serde_json::to_string(&[answer])?));
            }
        }
        match &patch.answers {
            None => {}
            Some(None) => fields.push("answers = NULL"),
            Some(Some(answers)) => {
                let answers = valid_indices(answers, current_choices.len());
                if answers.is_empty() {
                    return Err(invalid("'answers' must contain at least one valid index"));
                }
                fields.push("answers = ?");
                values.push(Value::Text(serde_json::to_string(&answers)?));
            }
        }
        if let Some(multi) = patch.multi {
            fields.push("multi = ?");
            values.push(Value::Integer(i64::from(multi)));
        }
        if let Some(choices_as_cards) = patch.choices_as_cards {
            fields.push("choices_as_cards = ?");
            values.push(Value::Integer(i64::from(choices_as_cards)));
        }

        let tx = self.conn.unchecked_transaction()?;
        if let Some(deck) = &patch.deck {
            let deck = deck.trim();
            if deck.is_empty() {
                return Err(invalid("'deck' must be a non-empty deck name"));
            }
            let deck_id = self.ensure_deck(deck)?;
            fields.push("deck_id = ?");
            values.push(Value::Integer(deck_id));
        }

        if fields.is_empty() {
            return Err(invalid("No valid fields to update"));
        }

        values.push(Value::Integer(card_id));
        let sql = format!(
            "UPDATE cards SET {}, updated_at = datetime('now') WHERE id = ?",
            fields.join(", ")
        );
        let updated = tx.execute(&sql, params_from_iter(values))?;
        if updated == 0 {
            return Err(FlashcardStorageError::CardNotFound(card_id));
        }
        tx.commit()?;

        self.get_card(card_id)
    }

    /// Delete a card and its scheduling state
    pub fn delete_card(&self, card_id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM srs_state WHERE card_id = ?1", params![card_id])?;
        let deleted = tx.execute("DELETE FROM cards WHERE id = ?1", params![card_id])?;
        if deleted == 0 {
            return Err(FlashcardStorageError::CardNotFound(card_id));
        }
        tx.commit()?;
        Ok(())
    }

    // ==================== Review Operations ====================

    /// Append an entry to the review log
    pub fn log_review(
        &self,
        card_id: i64,
        outcome: ReviewOutcome,
        duration_ms: u64,
    ) -> Result<ReviewLog> {
        let reviewed_at = Utc::now();
        self.conn.execute(
            "INSERT INTO reviews (card_id, outcome, duration_ms, reviewed_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                card_id,
                outcome.as_str(),
                i64::try_from(duration_ms).unwrap_or(i64::MAX),
                timestamp(reviewed_at)
            ],
        )?;

        Ok(ReviewLog {
            id: self.conn.last_insert_rowid(),
            card_id,
            outcome,
            duration_ms,
            reviewed_at,
        })
    }

    /// Review log entries, newest first
    pub fn list_reviews(&self, card_id: Option<i64>) -> Result<Vec<ReviewLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, card_id, outcome, duration_ms, reviewed_at FROM reviews
             WHERE ?1 IS NULL OR card_id = ?1 ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![card_id], |row| {
            let outcome: String = row.get(2)?;
            let reviewed_at: String = row.get(4)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                outcome,
                row.get::<_, i64>(3)?,
                reviewed_at,
            ))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            let (id, card_id, outcome, duration_ms, reviewed_at) = row?;
            let Some(outcome) = ReviewOutcome::parse(&outcome) else {
                log::warn!("Skipping review {} with unknown outcome '{}'", id, outcome);
                continue;
            };
            logs.push(ReviewLog {
                id,
                card_id,
                outcome,
                duration_ms: u64::try_from(duration_ms).unwrap_or(0),
                reviewed_at: parse_timestamp(&reviewed_at),
            });
        }
        Ok(logs)
    }

    /// Scheduling state for a card; new cards get the default state
    pub fn srs_state(&self, card_id: i64) -> Result<SrsState> {
        let state = self
            .conn
            .query_row(
                "SELECT card_id, interval, ease_factor, due_at, review_count, correct_count, status
                 FROM srs_state WHERE card_id = ?1",
                params![card_id],
                row_to_srs_state,
            )
            .optional()?;
        Ok(state.unwrap_or_else(|| SrsState::new(card_id)))
    }

    /// Record an SM-2 grade (0-5) and reschedule the card
    pub fn log_srs_grade(&self, card_id: i64, grade: i32) -> Result<SrsState> {
        self.get_card(card_id)?;
        let state = apply_grade(&self.srs_state(card_id)?, grade, Utc::now());

        self.conn.execute(
            "INSERT OR REPLACE INTO srs_state
             (card_id, interval, ease_factor, due_at, review_count, correct_count, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                state.card_id,
                state.interval,
                state.ease_factor as f64,
                timestamp(state.due_at),
                state.review_count,
                state.correct_count,
                state.status.as_str(),
            ],
        )?;

        log::debug!(
            "Card {} graded {} -> next review in {} day(s)",
            card_id,
            grade,
            state.interval
        );
        Ok(state)
    }

    /// Card, deck and review counts
    pub fn stats(&self, filter: &DeckFilter) -> Result<StudyStats> {
        let (clause, values) = deck_clause(filter);
        let now = timestamp(Utc::now());

        let card_count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM cards c WHERE {}", clause),
            params_from_iter(values.clone()),
            |row| row.get(0),
        )?;

        let mut due_values = vec![Value::Text(now)];
        due_values.extend(values.clone());
        let due_count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM cards c LEFT JOIN srs_state s ON s.card_id = c.id
                 WHERE (s.due_at IS NULL OR s.due_at <= ?) AND {}",
                clause
            ),
            params_from_iter(due_values),
            |row| row.get(0),
        )?;

        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| timestamp(t.and_utc()))
            .unwrap_or_default();
        let mut review_values = vec![Value::Text(midnight)];
        review_values.extend(values);
        let (review_count, correct_count, reviews_today): (i64, i64, i64) = self.conn.query_row(
            &format!(
                "SELECT COUNT(*),
                        COALESCE(SUM(r.outcome = 'correct'), 0),
                        COALESCE(SUM(r.reviewed_at >= ?), 0)
                 FROM reviews r LEFT JOIN cards c ON c.id = r.card_id
                 WHERE {}",
                clause
            ),
            params_from_iter(review_values),
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let deck = match filter {
            DeckFilter::All => None,
            DeckFilter::Name(name) => Some(name.clone()),
            DeckFilter::Id(id) => self.get_deck(*id).ok().map(|d| d.name),
        };
        let deck_count = match filter {
            DeckFilter::All => Some(
                self.conn
                    .query_row("SELECT COUNT(*) FROM decks", [], |row| row.get::<_, i64>(0))?
                    as usize,
            ),
            _ => None,
        };

        Ok(StudyStats {
            deck,
            card_count: card_count as usize,
            deck_count,
            due_count: due_count as usize,
            review_count: review_count as usize,
            correct_count: correct_count as usize,
            reviews_today: reviews_today as usize,
        })
    }

    // ==================== Preferences ====================

    /// Load study preferences from the settings table, filling in defaults
    pub fn load_preferences(&self) -> Result<StudyPreferences> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut map = serde_json::Map::new();
        for row in rows {
            let (key, value) = row?;
            match serde_json::from_str(&value) {
                Ok(value) => {
                    map.insert(key, value);
                }
                Err(e) => log::warn!("Ignoring unreadable setting '{}': {}", key, e),
            }
        }

        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }

    /// Store each preference under its own key
    pub fn save_preferences(&self, prefs: &StudyPreferences) -> Result<()> {
        let serde_json::Value::Object(map) = serde_json::to_value(prefs)? else {
            return Err(invalid("preferences must serialize to an object"));
        };

        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in map {
            tx.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl CardSource for FlashcardStorage {
    fn list_decks(&self) -> Result<Vec<Deck>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM decks ORDER BY name")?;
        let decks = stmt.query_map([], |row| {
            Ok(Deck {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(decks.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_cards(&self, deck: &DeckFilter) -> Result<Vec<Card>> {
        let (clause, values) = deck_clause(deck);
        let sql = format!(
            "SELECT {} FROM cards c WHERE {} ORDER BY c.id",
            CARD_COLUMNS, clause
        );
        self.query_cards(&sql, values)
    }

    /// Cards never graded or due now, oldest due first
    fn list_due_cards(&self, deck: &DeckFilter, limit: usize) -> Result<Vec<Card>> {
        let (clause, deck_values) = deck_clause(deck);
        let sql = format!(
            "SELECT {} FROM cards c LEFT JOIN srs_state s ON s.card_id = c.id
             WHERE (s.due_at IS NULL OR s.due_at <= ?) AND {}
             ORDER BY s.due_at IS NOT NULL, s.due_at, c.id
             LIMIT ?",
            CARD_COLUMNS, clause
        );

        let mut values = vec![Value::Text(timestamp(Utc::now()))];
        values.extend(deck_values);
        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        self.query_cards(&sql, values)
    }
}
