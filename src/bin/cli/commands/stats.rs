use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run(app: &App, deck: Option<&str>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let filter = app.deck_filter(deck)?;
    let stats = app
        .storage()?
        .stats(&filter)
        .context("Failed to compute statistics")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Plain => {
            let title = match &stats.deck {
                Some(name) => format!("Deck: {}", name),
                None => "All decks".to_string(),
            };
            println!("{}", paint(&title, Color::BOLD, use_color));
            println!("{}", "\u{2500}".repeat(title.len().max(24)));

            if let Some(deck_count) = stats.deck_count {
                println!("Decks          {}", deck_count);
            }
            println!("Cards          {}", stats.card_count);
            println!("Due now        {}", stats.due_count);
            println!("Reviews        {}", stats.review_count);
            println!("Reviews today  {}", stats.reviews_today);

            if stats.review_count > 0 {
                let accuracy = stats.correct_count as f64 * 100.0 / stats.review_count as f64;
                println!("Accuracy       {:.0}%", accuracy);
            }
        }
    }

    Ok(())
}
