//! Terminal study session
//!
//! Reads one line per action from stdin and redraws whenever the session view
//! changes, including changes made by the reveal and auto-advance timers.

use std::io::BufRead;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use flashcards_lib::flashcards::CardSource;
use flashcards_lib::session::{
    CardKind, Direction, SessionCommand, SessionDriver, SessionEngine, SessionView, TimerConfig,
};

use crate::app::App;
use crate::render::terminal::{key_help, paint, render_view, Color};
use crate::{OutputFormat, StudyArgs};

const DUE_LIMIT: usize = 500;

#[derive(Debug, PartialEq)]
enum Input {
    Command(SessionCommand),
    Quit,
    Help,
    Ignore,
}

pub fn run(app: &App, args: &StudyArgs, format: &OutputFormat, use_color: bool) -> Result<()> {
    let filter = app.deck_filter(args.deck.as_deref())?;
    let (cards, prefs) = {
        let storage = app.storage()?;
        let cards = if args.due {
            storage.list_due_cards(&filter, DUE_LIMIT)
        } else {
            storage.list_cards(&filter)
        }
        .context("Failed to load cards")?;
        let prefs = storage
            .load_preferences()
            .context("Failed to load study preferences")?;
        (cards, prefs)
    };

    let config = timer_config(TimerConfig::from(&prefs), args.timer, args.auto_advance);
    let allow_html = args.html || prefs.allow_html;
    log::info!("Studying {} cards", cards.len());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(study_loop(app, cards, config, allow_html, args.shuffle, format, use_color))
}

/// Apply `--timer` / `--auto-advance` (seconds, 0 disables) over the saved preferences
fn timer_config(
    mut config: TimerConfig,
    timer: Option<u64>,
    auto_advance: Option<u64>,
) -> TimerConfig {
    if let Some(secs) = timer {
        config.timer_enabled = secs > 0;
        config.reveal_timeout_ms = secs.saturating_mul(1000);
    }
    if let Some(secs) = auto_advance {
        config.auto_advance_enabled = secs > 0;
        config.auto_advance_delay_ms = secs.saturating_mul(1000);
    }
    config
}

async fn study_loop(
    app: &App,
    cards: Vec<flashcards_lib::flashcards::Card>,
    mut config: TimerConfig,
    allow_html: bool,
    shuffle: bool,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let (handle, task) =
        SessionDriver::spawn(SessionEngine::new(config), std::sync::Arc::clone(&app.storage));

    handle
        .dispatch(SessionCommand::SetAllowHtml { allow: allow_html })
        .await?;
    handle.dispatch(SessionCommand::Load { cards }).await?;
    if shuffle {
        handle.dispatch(SessionCommand::Shuffle).await?;
    }

    let mut lines = spawn_stdin_reader();
    let mut views = handle.subscribe();
    let mut view = views.borrow_and_update().clone();
    draw(&view, format, use_color)?;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                match parse_input(&line, &view, &config) {
                    Input::Quit => break,
                    Input::Help => println!("{}", key_help(&view)),
                    Input::Ignore => println!("{}", paint(key_help(&view), Color::GRAY, use_color)),
                    Input::Command(command) => {
                        if let SessionCommand::SetTimerConfig { config: next } = &command {
                            config = *next;
                        }
                        handle.dispatch(command).await?;
                    }
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                view = views.borrow_and_update().clone();
                draw(&view, format, use_color)?;
            }
        }
    }

    drop(views);
    drop(handle);
    task.await.context("Study session task failed")?;
    Ok(())
}

fn draw(view: &SessionView, format: &OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(view)?),
        OutputFormat::Plain => {
            if use_color {
                print!("\x1b[2J\x1b[H");
            } else {
                println!("{}", "\u{2500}".repeat(40));
            }
            println!("{}", render_view(view, use_color));
            println!("{}", paint(key_help(view), Color::GRAY, use_color));
        }
    }
    Ok(())
}

/// Forward stdin lines on a channel; closes on EOF
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn parse_input(line: &str, view: &SessionView, config: &TimerConfig) -> Input {
    let key = line.trim().to_lowercase();
    let card = view.card.as_ref();

    if let Ok(n) = key.parse::<usize>() {
        let Some(card) = card else { return Input::Ignore };
        if n == 0 || n > card.choices.len() {
            return Input::Ignore;
        }
        return match card.kind {
            CardKind::SingleChoice => Input::Command(SessionCommand::SelectChoice { index: n - 1 }),
            CardKind::MultiChoice => {
                Input::Command(SessionCommand::ToggleMultiChoice { index: n - 1 })
            }
            CardKind::Basic => Input::Ignore,
        };
    }

    match key.as_str() {
        "" | "f" => match card {
            None => Input::Ignore,
            Some(card) if card.kind == CardKind::Basic && card.back.is_none() => {
                Input::Command(SessionCommand::Flip)
            }
            Some(card) if card.can_check => Input::Command(SessionCommand::CheckMulti),
            Some(card) if card.banner.is_some() || card.back.is_some() => {
                Input::Command(SessionCommand::Advance {
                    direction: Direction::Next,
                })
            }
            Some(_) => Input::Ignore,
        },
        "c" => Input::Command(SessionCommand::CheckMulti),
        "n" => Input::Command(SessionCommand::Advance {
            direction: Direction::Next,
        }),
        "p" => Input::Command(SessionCommand::Advance {
            direction: Direction::Prev,
        }),
        "s" => Input::Command(SessionCommand::Shuffle),
        "r" => Input::Command(SessionCommand::ResumeTimers),
        "t" => Input::Command(SessionCommand::SetTimerConfig {
            config: TimerConfig {
                timer_enabled: !config.timer_enabled,
                ..*config
            },
        }),
        "a" => Input::Command(SessionCommand::SetTimerConfig {
            config: TimerConfig {
                auto_advance_enabled: !config.auto_advance_enabled,
                ..*config
            },
        }),
        "q" | "quit" | "exit" => Input::Quit,
        "?" | "h" | "help" => Input::Help,
        _ => Input::Ignore,
    }
}
