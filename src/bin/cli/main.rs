mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flashcards-cli", about = "Flashcards Anywhere CLI", version)]
struct Cli {
    /// Config file (default: <config dir>/flashcards-anywhere/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a specific database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API server
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Directory of static front-end files
        #[arg(long)]
        public_dir: Option<PathBuf>,
    },

    /// Deck management
    #[command(subcommand)]
    Deck(DeckCommand),

    /// List cards
    Cards {
        /// Deck name (case-insensitive prefix match)
        #[arg(long)]
        deck: Option<String>,
    },

    /// Card management
    #[command(subcommand)]
    Card(CardCommand),

    /// List cards due for review
    Due {
        #[arg(long)]
        deck: Option<String>,
        /// Maximum results
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show study statistics
    Stats {
        #[arg(long)]
        deck: Option<String>,
    },

    /// Study cards interactively in the terminal
    Study(StudyArgs),
}

#[derive(Subcommand)]
enum DeckCommand {
    /// List decks with card counts
    List,
    /// Create a deck
    Add { name: String },
    /// Rename a deck
    Rename { deck: String, name: String },
    /// Delete a deck; its cards are kept without a deck
    Rm { deck: String },
}

#[derive(Subcommand)]
enum CardCommand {
    /// Add a card. Pass --choice two or more times for a multiple-choice card.
    Add {
        front: String,
        /// Back text (basic cards)
        back: Option<String>,
        /// Deck name; created if missing (default: "Default")
        #[arg(long)]
        deck: Option<String>,
        /// Answer choice, in order
        #[arg(long = "choice")]
        choices: Vec<String>,
        /// Index of a correct choice (0-based); repeat for multi-answer cards
        #[arg(long = "answer")]
        answers: Vec<i64>,
        /// Accept several correct answers
        #[arg(long)]
        multi: bool,
    },
    /// Delete a card
    Rm { id: i64 },
}

#[derive(clap::Args)]
pub struct StudyArgs {
    /// Deck name (case-insensitive prefix match)
    #[arg(long)]
    pub deck: Option<String>,
    /// Only cards due for review
    #[arg(long)]
    pub due: bool,
    /// Reveal the answer after this many seconds
    #[arg(long)]
    pub timer: Option<u64>,
    /// Move to the next card this many seconds after answering
    #[arg(long)]
    pub auto_advance: Option<u64>,
    /// Render card text as sanitized HTML
    #[arg(long)]
    pub html: bool,
    /// Shuffle before starting
    #[arg(long)]
    pub shuffle: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();

    let command = cli.command.unwrap_or(Command::Study(StudyArgs {
        deck: None,
        due: false,
        timer: None,
        auto_advance: None,
        html: false,
        shuffle: false,
    }));

    let app = app::App::new(cli.config.as_deref(), cli.db)?;

    match command {
        Command::Serve { port, public_dir } => {
            commands::serve::run(app, port, public_dir)?;
        }
        Command::Deck(subcmd) => match subcmd {
            DeckCommand::List => commands::decks::run_list(&app, &cli.format, use_color)?,
            DeckCommand::Add { name } => {
                commands::decks::run_add(&app, &name, &cli.format, use_color)?
            }
            DeckCommand::Rename { deck, name } => {
                commands::decks::run_rename(&app, &deck, &name, &cli.format, use_color)?
            }
            DeckCommand::Rm { deck } => {
                commands::decks::run_remove(&app, &deck, &cli.format, use_color)?
            }
        },
        Command::Cards { deck } => {
            commands::cards::run_list(&app, deck.as_deref(), &cli.format, use_color)?;
        }
        Command::Card(subcmd) => match subcmd {
            CardCommand::Add {
                front,
                back,
                deck,
                choices,
                answers,
                multi,
            } => {
                let new = commands::cards::build_new_card(front, back, deck, choices, answers, multi);
                commands::cards::run_add(&app, &new, &cli.format, use_color)?;
            }
            CardCommand::Rm { id } => {
                commands::cards::run_remove(&app, id, &cli.format, use_color)?;
            }
        },
        Command::Due { deck, limit } => {
            commands::cards::run_due(&app, deck.as_deref(), limit, &cli.format, use_color)?;
        }
        Command::Stats { deck } => {
            commands::stats::run(&app, deck.as_deref(), &cli.format, use_color)?;
        }
        Command::Study(args) => {
            commands::study::run(&app, &args, &cli.format, use_color)?;
        }
    }

    Ok(())
}
