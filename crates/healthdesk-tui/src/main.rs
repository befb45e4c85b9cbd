use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use healthdesk_core::config::DataPaths;
use healthdesk_core::tts::{self, GoogleTts};
use healthdesk_core::{dashboard, Config, ConsultationMode, GeminiClient, HealthDb, Language, DISCLAIMER};

mod app;
mod form;
mod handler;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "healthdesk")]
#[command(version, about = "Medical information companion: AI consultation, reports, appointments and more")]
struct Cli {
    /// Directory for the database, uploads, exports and log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal app (default)
    Tui,
    /// Ask a one-off health question
    Ask {
        /// Your question
        question: String,
        /// Consultation mode: general, medicine, nutrition or mental
        #[arg(short, long, default_value = "general")]
        mode: String,
        /// Response language code: en, hi, es or fr
        #[arg(short, long)]
        lang: Option<String>,
        /// Read the answer aloud
        #[arg(short, long)]
        speak: bool,
    },
    /// Print a daily health tip
    Tip,
    /// List available Gemini models
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|_| Config::new());

    let data_dir = config.resolve_data_dir(cli.data_dir.as_deref())?;
    let paths = DataPaths::new(data_dir);
    paths.ensure()?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            init_tracing(Some(&paths.log_file()))?;
            let db = HealthDb::open(&paths.database())?;
            run_tui(App::new(db, paths, config)).await?
        }
        Commands::Ask { question, mode, lang, speak } => {
            init_tracing(None)?;
            ask(&config, &question, &mode, lang.as_deref(), speak).await?
        }
        Commands::Tip => {
            init_tracing(None)?;
            let client = GeminiClient::new(&config.api_key().unwrap_or_default());
            let tip = client.generate(&config.model(), dashboard::daily_tip_prompt()).await?;
            println!("{}", tip.trim());
        }
        Commands::Models => list_models(&config),
    }

    Ok(())
}

/// Log to a file while the TUI owns the terminal, otherwise to stderr.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    info!("HealthDesk v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

async fn run_tui(mut app: App) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn ask(config: &Config, question: &str, mode: &str, lang: Option<&str>, speak: bool) -> Result<()> {
    let mode = ConsultationMode::from_str(mode)
        .ok_or_else(|| anyhow!("Unknown mode '{}'. Use general, medicine, nutrition or mental.", mode))?;
    let code = lang.or(config.language.as_deref()).unwrap_or("en");
    let language = Language::from_code(code)
        .ok_or_else(|| anyhow!("Unknown language '{}'. Use en, hi, es or fr.", code))?;

    let client = GeminiClient::new(&config.api_key().unwrap_or_default());
    let answer = client.medical_answer(&config.model(), mode, language, question).await;

    println!("{}\n", answer.trim());
    println!("⚠ {}", DISCLAIMER);

    if speak {
        let audio = GoogleTts::new().synthesize(&answer, language).await?;
        tts::play_mp3(audio).await?;
    }
    Ok(())
}

fn list_models(config: &Config) {
    let current = config.model();
    println!("Available Gemini models:");
    for model in GeminiClient::list_models() {
        let marker = if model == current { "*" } else { " " };
        println!(" {} {}", marker, model);
    }
    match config.key_source() {
        Some(source) => println!("\nAPI key: set ({})", source),
        None => println!("\nAPI key: not set (export GOOGLE_API_KEY or press K in the app)"),
    }
}
