use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use colored::*;
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use coco_chat_core::{
    cancellable, drive, ChatSession, CocoClient, CocoError, Config, DriveOptions, StreamOutcome,
};

mod render;

use render::{format_details, format_history, ReplyPrinter};

#[derive(Parser)]
#[command(name = "coco-chat")]
#[command(about = "Chat with Coco Server assistants from the terminal")]
struct Cli {
    /// Coco server URL (overrides config and COCO_SERVER)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask an assistant a question and stream the reply
    Ask {
        /// Your question
        question: String,
        /// Assistant ID (defaults to default_assistant from config)
        #[arg(short, long)]
        assistant: Option<String>,
        /// Give up if the server or the reply stream stalls for this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Print query intent, sources and reasoning after the reply
        #[arg(short = 'd', long)]
        show_details: bool,
    },
    /// Decode a recorded NDJSON reply offline
    Replay {
        /// File containing the raw reply body
        file: PathBuf,
        /// Feed the body in fragments of this many bytes
        #[arg(short, long, default_value = "64")]
        chunk_size: usize,
        /// Print query intent, sources and reasoning after the reply
        #[arg(short = 'd', long)]
        show_details: bool,
    },
    /// Show or change the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set a value (server, api_token, access_token, integration_id, default_assistant)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            Config::new()
        })
        .with_env_overrides();
    if let Some(server) = cli.server {
        config.server = Some(server);
    }

    match cli.command {
        Commands::Ask { question, assistant, timeout, show_details } => {
            let assistant = assistant
                .or_else(|| config.default_assistant.clone())
                .ok_or_else(|| anyhow!("No assistant given. Pass --assistant or run: coco-chat config set default_assistant <id>"))?;
            ask(&config, &assistant, &question, timeout.map(Duration::from_secs), show_details).await?
        }
        Commands::Replay { file, chunk_size, show_details } => {
            replay(&file, chunk_size, show_details).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(&config)?,
            ConfigAction::Set { key, value } => {
                let mut saved = Config::load()?;
                saved.set(&key, &value)?;
                saved.save()?;
                println!("{} {} = {}", "✓".green(), key.bold(), value);
            }
        },
    }

    Ok(())
}

/// Logs go to stderr so the streamed reply on stdout stays clean
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coco_chat=info,coco_chat_core=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn ask(
    config: &Config,
    assistant: &str,
    question: &str,
    timeout: Option<Duration>,
    show_details: bool,
) -> Result<()> {
    let client = CocoClient::from_config(config);
    println!("🤖 Asking {} at {}...\n", assistant.bold().magenta(), client.base_url().dimmed());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut session = ChatSession::new();
    session.submit(question);

    let body = match cancellable(client.ask(assistant, question), &cancel, timeout).await {
        Some(Ok(body)) => body,
        Some(Err(e)) => {
            session.fail(&e)?;
            print_failure(&session, &e);
            return Ok(());
        }
        None => {
            session.abort();
            finish_output(&session, StreamOutcome::Aborted, show_details);
            return Ok(());
        }
    };

    let options = DriveOptions { idle_timeout: timeout };
    let outcome = stream_to_terminal(&mut session, body, &cancel, &options).await?;
    finish_output(&session, outcome, show_details);
    Ok(())
}

async fn replay(file: &Path, chunk_size: usize, show_details: bool) -> Result<()> {
    let raw = tokio::fs::read(file).await?;
    let fragments: Vec<Result<Vec<u8>, CocoError>> = raw
        .chunks(chunk_size.max(1))
        .map(|c| Ok(c.to_vec()))
        .collect();

    let mut session = ChatSession::new();
    session.submit(&file.display().to_string());

    let outcome =
        stream_to_terminal(&mut session, stream::iter(fragments), &CancellationToken::new(), &DriveOptions::default())
            .await?;
    finish_output(&session, outcome, show_details);

    println!("\n{}", "Transcript:".bold().blue());
    println!("{}", format_history(session.history()).dimmed());
    Ok(())
}

async fn stream_to_terminal<S, B, E>(
    session: &mut ChatSession,
    body: S,
    cancel: &CancellationToken,
    options: &DriveOptions,
) -> Result<StreamOutcome>
where
    S: futures_util::Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<CocoError>,
{
    let mut printer = ReplyPrinter::new();
    let outcome = drive(session, body, cancel, options, |message| {
        if let Some(status) = printer.status(message) {
            eprintln!("{}", status.dimmed());
        }
        if let Some(delta) = printer.response_delta(message) {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
    })
    .await?;
    Ok(outcome)
}

fn finish_output(session: &ChatSession, outcome: StreamOutcome, show_details: bool) {
    match outcome {
        StreamOutcome::Completed => {
            println!();
            if let Some(details) = session.history().last().and_then(|m| m.details.as_ref()) {
                if show_details {
                    print!("{}", format_details(details));
                }
            }
        }
        StreamOutcome::Failed(e) => print_failure(session, &e),
        StreamOutcome::Aborted => println!("\n{}", "Aborted.".yellow()),
    }
}

fn print_failure(session: &ChatSession, error: &CocoError) {
    let notice = session
        .history()
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    println!("\n{}", notice.red());
    eprintln!("{}: {}", "Error".red(), error);
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "⚙️  Coco Chat Configuration".bold().blue());
    println!("{}", "=".repeat(40).dimmed());
    println!("file:              {}", Config::get_config_path()?.display());
    println!("server:            {}", config.server_url().green());
    println!("api_token:         {}", mask(config.api_token.as_deref()));
    println!("access_token:      {}", mask(config.access_token.as_deref()));
    println!("integration_id:    {}", config.integration_id.as_deref().unwrap_or("-"));
    println!("default_assistant: {}", config.default_assistant.as_deref().unwrap_or("-"));
    Ok(())
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if s.chars().count() > 4 => format!("{}****", s.chars().take(4).collect::<String>()),
        Some(_) => "****".to_string(),
        None => "-".to_string(),
    }
}
