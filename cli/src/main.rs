//! Wrangler CLI - interactive thread relocation over an in-memory workspace
//!
//! Usage:
//!   wrangler
//!   wrangler --fixture team.json --config wrangler.json --as alice

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::info;
use wrangler_core::{Wrangler, WranglerConfig};

mod commands;
mod fixture;
mod ui;

use commands::CommandHandler;
use fixture::Fixture;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON fixture with users, channels and posts (built-in demo if omitted)
    #[arg(short, long)]
    fixture: Option<PathBuf>,

    /// JSON engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Username to act as
    #[arg(short = 'u', long = "as", default_value = "alice")]
    user: String,

    /// Allow the store to delete moved originals
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    allow_delete: bool,

    /// History file for the REPL
    #[arg(long, default_value = ".wrangler_history")]
    history: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    if !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }

    let args = Args::parse();

    // Print banner with version
    println!("{}", "=".repeat(60).bright_blue());
    println!("{}", format!("  {}", wrangler_core::version_string()).bright_cyan().bold());
    println!("{}", "  Move, copy, attach and merge threads".bright_white());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    let config = match &args.config {
        Some(path) => WranglerConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => WranglerConfig::default(),
    };

    let fixture = match &args.fixture {
        Some(path) => Fixture::load(path)?,
        None => Fixture::demo()?,
    };
    fixture.store.set_deletion_permitted(args.allow_delete);

    let user = fixture
        .store
        .user_by_username(&args.user)
        .with_context(|| format!("No user named {} in the fixture", args.user))?;

    info!(
        channels = fixture.store.channels().len(),
        posts = fixture.store.post_count(),
        "Loaded fixture"
    );

    println!("{} @{}", "Acting as:".bright_green(), user.username);
    println!(
        "{} {} channels, {} posts",
        "Workspace:".bright_green(),
        fixture.store.channels().len(),
        fixture.store.post_count()
    );
    println!();

    let wrangler = Wrangler::new(fixture.store.clone(), fixture.bot, config)?;
    let mut handler = CommandHandler::new(fixture.store, wrangler, user);

    // Interactive REPL
    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(&args.history);

    println!("{}", "Type 'help' for available commands, 'quit' to exit".bright_yellow());
    println!();

    loop {
        let prompt = format!("{}> ", handler.username().bright_cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match line {
                    "quit" | "exit" => {
                        println!("{}", "Goodbye!".bright_green());
                        break;
                    }
                    _ => {
                        if let Err(e) = handler.handle_command(line).await {
                            ui::print_error(&format!("{:#}", e));
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
            Err(err) => {
                ui::print_error(&format!("Error: {}", err));
                break;
            }
        }
    }

    // Save history
    let _ = rl.save_history(&args.history);

    Ok(())
}
