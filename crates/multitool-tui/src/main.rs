use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use multitool_core::{Config, Gateway, GeminiClient, ImageEditor};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod input;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

/// Environment variable holding the log filter, e.g. `MULTITOOL_LOG=debug`
const LOG_ENV: &str = "MULTITOOL_LOG";

#[derive(Parser)]
#[command(name = "multitool")]
#[command(version, about = "Task list, Gemini chat and Gemini image editor in one terminal app")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt to Gemini and print the reply
    Ask {
        /// The prompt
        prompt: String,
        /// Text model to use instead of the configured one
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Edit an image with a text instruction and save the result
    Edit {
        /// PNG, JPEG, WEBP, HEIC or HEIF file
        image: PathBuf,
        /// What to change, e.g. "Add a retro filter"
        instruction: String,
        /// Directory for the edited image (defaults to the configured output dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the text models offered in the model picker
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = Config::get_config_path()?;

    match cli.command {
        None => {
            init_file_logging()?;
            let config = load_config(&config_path);
            run_tui(config, config_path).await
        }
        Some(command) => {
            init_stderr_logging();
            let config = load_config(&config_path);
            match command {
                Commands::Ask { prompt, model } => cmd_ask(&config, &prompt, model).await,
                Commands::Edit {
                    image,
                    instruction,
                    output,
                } => cmd_edit(&config, &image, &instruction, output).await,
                Commands::Models => {
                    cmd_models(&config);
                    Ok(())
                }
            }
        }
    }
}

/// A config that cannot be read is logged and replaced by the defaults
fn load_config(path: &Path) -> Config {
    Config::load_from(path).unwrap_or_else(|e| {
        warn!(error = %e, path = %path.display(), "Could not read config, using defaults");
        Config::new()
    })
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The TUI owns the terminal, so logs go to a file under the data dir
fn init_file_logging() -> Result<()> {
    let dir = dirs::data_local_dir()
        .context("Could not determine data directory")?
        .join("gemini-multitool");
    fs::create_dir_all(&dir)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("multitool.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

async fn run_tui(config: Config, config_path: PathBuf) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(config, config_path, events.sender());
    info!("Started TUI");

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("Stopped TUI");
    result
}

async fn cmd_ask(config: &Config, prompt: &str, model: Option<String>) -> Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        bail!("Prompt is empty. Type something to ask Gemini.");
    }

    let mut client = GeminiClient::from_config(config)?;
    if let Some(model) = model {
        client = client.with_text_model(model);
    }

    let reply = client.generate_text(prompt).await?;
    println!("{}", reply);
    Ok(())
}

async fn cmd_edit(
    config: &Config,
    image: &Path,
    instruction: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    // Validate the inputs before touching the API key or the network
    let mut editor = ImageEditor::new();
    editor
        .load(image)
        .with_context(|| format!("Could not load {}", image.display()))?;
    editor.set_instruction(instruction);
    if instruction.trim().is_empty() {
        bail!("Instruction is empty. Describe the edit, e.g. \"Add a retro filter\".");
    }

    let client = GeminiClient::from_config(config)?;
    editor.edit(&client).await;

    if editor.edited().is_none() {
        let mut message = editor
            .message()
            .unwrap_or("The image could not be edited.")
            .to_string();
        if let Some(reason) = editor.request().error().filter(|r| *r != message) {
            message.push_str(&format!(" ({})", reason));
        }
        if let Some(note) = editor.provider_note() {
            message.push_str(&format!("\nGemini said: {}", note));
        }
        bail!(message);
    }

    let dir = output.unwrap_or_else(|| config.output_dir());
    fs::create_dir_all(&dir)?;
    let path = editor.save_edited(&dir)?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_models(config: &Config) {
    let current = config.text_model();
    for model in GeminiClient::list_models() {
        let marker = if model == current { "*" } else { " " };
        println!("{} {}", marker, model);
    }
    println!("\nImage model: {}", config.image_model());
}

