use std::collections::HashMap;

use anyhow::{Context, Result};

use flashcards_lib::flashcards::models::{Deck, DeckFilter};
use flashcards_lib::flashcards::CardSource;

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run_list(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let decks = app.list_decks()?;

    let mut counts: HashMap<i64, usize> = HashMap::new();
    let mut unfiled = 0;
    for card in app.storage()?.list_cards(&DeckFilter::All)? {
        match card.deck_id {
            Some(id) => *counts.entry(id).or_default() += 1,
            None => unfiled += 1,
        }
    }

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = decks
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "id": d.id,
                        "name": d.name,
                        "cardCount": counts.get(&d.id).copied().unwrap_or(0),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if decks.is_empty() {
                println!("No decks found.");
                return Ok(());
            }

            let max_name_len = decks.iter().map(|d| d.name.len()).max().unwrap_or(4).max(4);

            println!("{:>5}  {:<width$} Cards", "ID", "Deck", width = max_name_len + 1);
            println!(
                "{}  {} {}",
                "\u{2500}".repeat(5),
                "\u{2500}".repeat(max_name_len + 1),
                "\u{2500}".repeat(6)
            );

            for deck in &decks {
                let name = format!("{:<width$}", deck.name, width = max_name_len + 1);
                println!(
                    "{:>5}  {} {}",
                    deck.id,
                    paint(&name, Color::BOLD, use_color),
                    counts.get(&deck.id).copied().unwrap_or(0)
                );
            }

            if unfiled > 0 {
                println!("\n{} cards without a deck", unfiled);
            }
        }
    }

    Ok(())
}

pub fn run_add(app: &App, name: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let deck = app
        .storage()?
        .create_deck(name)
        .with_context(|| format!("Failed to create deck '{}'", name))?;
    print_deck("Created", &deck, format, use_color)
}

pub fn run_rename(
    app: &App,
    deck_name: &str,
    new_name: &str,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    let renamed = app
        .storage()?
        .rename_deck(deck.id, new_name)
        .with_context(|| format!("Failed to rename deck '{}'", deck.name))?;
    print_deck("Renamed", &renamed, format, use_color)
}

pub fn run_remove(app: &App, deck_name: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let deck = app.find_deck(deck_name)?;
    app.storage()?
        .delete_deck(deck.id)
        .with_context(|| format!("Failed to delete deck '{}'", deck.name))?;
    print_deck("Deleted", &deck, format, use_color)
}

fn print_deck(verb: &str, deck: &Deck, format: &OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(deck)?),
        OutputFormat::Plain => println!(
            "{} deck {} (id {})",
            verb,
            paint(&deck.name, Color::BOLD, use_color),
            deck.id
        ),
    }
    Ok(())
}
