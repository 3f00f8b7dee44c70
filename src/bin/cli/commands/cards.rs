use anyhow::{Context, Result};

use flashcards_lib::flashcards::models::{Card, CardContent, NewCard};
use flashcards_lib::flashcards::CardSource;

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

/// Turn `card add` arguments into a create payload; validation happens in storage
pub fn build_new_card(
    front: String,
    back: Option<String>,
    deck: Option<String>,
    choices: Vec<String>,
    answers: Vec<i64>,
    multi: bool,
) -> NewCard {
    if choices.is_empty() {
        return NewCard {
            front,
            back: back.unwrap_or_default(),
            deck,
            ..Default::default()
        };
    }

    let (answer, answers) = if multi {
        (None, Some(answers))
    } else {
        (answers.first().copied(), None)
    };

    NewCard {
        front,
        card_type: Some("mcq".to_string()),
        deck,
        choices: Some(choices),
        multi,
        answer,
        answers,
        ..Default::default()
    }
}

pub fn run_list(app: &App, deck: Option<&str>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let filter = app.deck_filter(deck)?;
    let cards = app
        .storage()?
        .list_cards(&filter)
        .context("Failed to list cards")?;
    print_cards(app, &cards, format, use_color)
}

pub fn run_due(
    app: &App,
    deck: Option<&str>,
    limit: usize,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let filter = app.deck_filter(deck)?;
    let cards = app
        .storage()?
        .list_due_cards(&filter, limit)
        .context("Failed to list due cards")?;
    print_cards(app, &cards, format, use_color)
}

pub fn run_add(app: &App, new: &NewCard, format: &OutputFormat, use_color: bool) -> Result<()> {
    let card = app
        .storage()?
        .create_card(new)
        .context("Failed to create card")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&card)?),
        OutputFormat::Plain => println!(
            "Created card {}: {}",
            paint(&card.id.to_string(), Color::BOLD, use_color),
            card.content.front()
        ),
    }
    Ok(())
}

pub fn run_remove(app: &App, id: i64, format: &OutputFormat, _use_color: bool) -> Result<()> {
    app.storage()?
        .delete_card(id)
        .with_context(|| format!("Failed to delete card {}", id))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "ok": true, "id": id })),
        OutputFormat::Plain => println!("Deleted card {}", id),
    }
    Ok(())
}

fn print_cards(app: &App, cards: &[Card], format: &OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(cards)?);
        }
        OutputFormat::Plain => {
            if cards.is_empty() {
                println!("No cards found.");
                return Ok(());
            }

            let decks = app.list_decks()?;
            let deck_name = |id: Option<i64>| {
                id.and_then(|id| decks.iter().find(|d| d.id == id))
                    .map(|d| d.name.as_str())
                    .unwrap_or("-")
            };

            println!("{:>5}  {:<6} {:<16} Front / Answer", "ID", "Type", "Deck");
            println!(
                "{}  {} {} {}",
                "\u{2500}".repeat(5),
                "\u{2500}".repeat(6),
                "\u{2500}".repeat(16),
                "\u{2500}".repeat(30)
            );

            for card in cards {
                println!(
                    "{:>5}  {:<6} {:<16} {}",
                    card.id,
                    card.content.card_type().as_str(),
                    truncate(deck_name(card.deck_id), 16),
                    truncate(card.content.front(), 60)
                );
                let answer = match &card.content {
                    CardContent::Basic { back, .. } => back.clone(),
                    content => content.correct_choice_texts().join(", "),
                };
                println!(
                    "{:>5}  {:<6} {:<16} {}",
                    "",
                    "",
                    "",
                    paint(&truncate(&answer, 60), Color::GRAY, use_color)
                );
            }

            println!("\n{} cards", cards.len());
        }
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max.saturating_sub(1)).collect();
        format!("{}\u{2026}", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_card_args() {
        let new = build_new_card("Q".into(), Some("A".into()), None, vec![], vec![], false);
        assert_eq!(new.back, "A");
        assert_eq!(new.card_type, None);
        assert_eq!(new.choices, None);
    }

    #[test]
    fn test_single_choice_takes_first_answer() {
        let new = build_new_card(
            "Q".into(),
            None,
            Some("Geo".into()),
            vec!["a".into(), "b".into()],
            vec![1, 0],
            false,
        );
        assert_eq!(new.card_type.as_deref(), Some("mcq"));
        assert_eq!(new.answer, Some(1));
        assert_eq!(new.answers, None);
        assert_eq!(new.deck.as_deref(), Some("Geo"));
    }

    #[test]
    fn test_multi_choice_keeps_all_answers() {
        let new = build_new_card(
            "Q".into(),
            None,
            None,
            vec!["a".into(), "b".into(), "c".into()],
            vec![0, 2],
            true,
        );
        assert!(new.multi);
        assert_eq!(new.answers, Some(vec![0, 2]));
        assert_eq!(new.answer, None);
    }

    #[test]
    fn test_truncate_long_text() {
        assert_eq!(truncate("abcdef", 4), "abc\u{2026}");
        assert_eq!(truncate("one\ntwo", 10), "one");
    }
}
