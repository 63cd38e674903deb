use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;

use gemini_chat::{logging, ChatSession, ChatStore, Config, GeminiClient, KvStore};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "gemini-chat")]
#[command(about = "Chat with Gemini from the terminal")]
struct Cli {
    /// Gemini model to use (overrides the config file)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Directory for the chat database and log file
    #[arg(long, env = "GEMINI_CHAT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt and print the answer
    Ask {
        /// Your prompt
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Ask { prompt }) => ask(cli.model, &prompt).await,
        None => run_tui(cli.model, cli.data_dir).await,
    }
}

/// Config file plus the `--model` override. Logging must be up first so a
/// broken config file is reported.
fn load_config(model: Option<String>) -> Config {
    let mut config = Config::load_or_default();
    if let Some(model) = model {
        config.model = model;
    }
    config
}

async fn ask(model: Option<String>, prompt: &str) -> Result<()> {
    logging::init_stderr_logging()?;
    let config = load_config(model);

    let client = GeminiClient::from_config(&config)?
        .ok_or_else(|| anyhow!("No API key configured. Set GEMINI_API_KEY or run the TUI to enter one."))?;

    let answer = client.generate(prompt).await?;
    println!("{}", answer);
    Ok(())
}

async fn run_tui(model: Option<String>, data_dir: Option<PathBuf>) -> Result<()> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => Config::data_dir()?,
    };
    let log_path = logging::init_file_logging(&data_dir)?;
    let config = load_config(model);
    info!(log = %log_path.display(), model = %config.model, "starting gemini-chat");

    let store = ChatStore::new(KvStore::open(&data_dir.join("chat.db"))?);
    let client = GeminiClient::from_config(&config)?;

    let mut events = EventHandler::new();
    let session = ChatSession::new(
        store,
        client,
        events.session_sender(),
        Duration::from_millis(config.typing_interval_ms),
    );
    let mut app = App::new(config, session);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    info!("exiting");
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
