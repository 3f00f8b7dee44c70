use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Context, Result};

use flashcards_lib::config::AppConfig;
use flashcards_lib::flashcards::models::{Deck, DeckFilter};
use flashcards_lib::flashcards::{CardSource, FlashcardStorage};

/// Shared application state for CLI commands
pub struct App {
    pub config: AppConfig,
    pub storage: Arc<Mutex<FlashcardStorage>>,
}

impl App {
    /// Load config (file, then env, then `--db`) and open the database
    pub fn new(config_path: Option<&Path>, db: Option<PathBuf>) -> Result<Self> {
        let mut config = AppConfig::load(config_path)
            .and_then(AppConfig::with_env)
            .context("Failed to load configuration")?;
        if let Some(db) = db {
            config.db_path = db;
        }
        log::debug!("Using database {:?}", config.db_path);

        let storage = flashcards_lib::open_storage(&config)?;
        Ok(Self { config, storage })
    }

    pub fn storage(&self) -> Result<MutexGuard<'_, FlashcardStorage>> {
        self.storage
            .lock()
            .map_err(|_| anyhow!("Storage lock poisoned"))
    }

    pub fn list_decks(&self) -> Result<Vec<Deck>> {
        self.storage()?.list_decks().context("Failed to list decks")
    }

    /// Find a deck by name (case-insensitive prefix match)
    pub fn find_deck(&self, name: &str) -> Result<Deck> {
        let decks = self.list_decks()?;
        let name_lower = name.to_lowercase();

        // Exact match first
        if let Some(deck) = decks.iter().find(|d| d.name.to_lowercase() == name_lower) {
            return Ok(deck.clone());
        }

        let matches: Vec<&Deck> = decks
            .iter()
            .filter(|d| d.name.to_lowercase().starts_with(&name_lower))
            .collect();

        match matches.len() {
            0 => bail!(
                "No deck matching '{}'. Available decks:\n{}",
                name,
                decks
                    .iter()
                    .map(|d| format!("  - {}", d.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous deck name '{}'. Matches:\n{}",
                name,
                matches
                    .iter()
                    .map(|d| format!("  - {}", d.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }

    /// Filter for an optional deck name given on the command line
    pub fn deck_filter(&self, name: Option<&str>) -> Result<DeckFilter> {
        match name {
            Some(name) => Ok(DeckFilter::Id(self.find_deck(name)?.id)),
            None => Ok(DeckFilter::All),
        }
    }
}
