use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use recito_core::{Session, Settings, SimpleSource, reconstruct_paragraphs};
use tracing_subscriber::EnvFilter;

mod console;

use console::{ConsoleEngine, FileCatalog, StaticSettings};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read documents aloud from the terminal
#[derive(Parser, Debug)]
#[command(name = "recito")]
#[command(version = VERSION)]
#[command(about = "Read documents aloud from the terminal", long_about = None)]
struct Args {
    /// Text file to read, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Reconstruct paragraphs from hard-wrapped lines and print them,
    /// without starting playback
    #[arg(short, long)]
    paragraphs: bool,

    /// JSON voice catalog file
    #[arg(long, value_name = "FILE")]
    voices: Option<PathBuf>,

    /// Voice name to speak with
    #[arg(long, value_name = "NAME")]
    voice: Option<String>,

    /// Language tag override (e.g. "en-GB")
    #[arg(long, value_name = "TAG")]
    lang: Option<String>,

    /// Speech rate multiplier
    #[arg(long, default_value = "1.0", value_name = "NUM")]
    rate: f32,

    /// Speech pitch multiplier
    #[arg(long, default_value = "1.0", value_name = "NUM")]
    pitch: f32,

    /// Speech volume, 0.0 to 1.0
    #[arg(long, default_value = "1.0", value_name = "NUM")]
    volume: f32,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Print a styled banner for verbose mode
fn print_banner() {
    eprintln!("\n{} {} {}", "Recito".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Read documents aloud from the terminal".dimmed());
    eprintln!();
}

/// Print a success message
fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read file: {}", input))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
            .with_writer(io::stderr)
            .init();
        print_banner();
    }

    let text = read_input(&args.input)?;

    if args.paragraphs {
        let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        for paragraph in reconstruct_paragraphs(&lines) {
            println!("{}", paragraph);
            println!();
        }
        return Ok(());
    }

    let settings = Settings {
        rate: Some(args.rate),
        pitch: Some(args.pitch),
        volume: Some(args.volume),
        voice_name: args.voice.clone(),
    };

    let mut source = SimpleSource::from_text(&text);
    if let Some(lang) = &args.lang {
        source = source.declared_language(lang);
    }

    let mut builder = Session::builder(Arc::new(source), Arc::new(ConsoleEngine { verbose: args.verbose }))
        .settings(Arc::new(StaticSettings(settings)));
    if let Some(path) = &args.voices {
        let catalog = FileCatalog::load(path)
            .with_context(|| format!("Failed to load voice catalog: {}", path.display()))?;
        builder = builder.voices(Arc::new(catalog));
    }
    let (session, end) = builder.build();

    session.play().await.context("Failed to start playback")?;
    let outcome = end.await.context("Playback ended without a terminal event")?;
    outcome.context("Playback failed")?;
    session.close().await;

    if args.verbose {
        print_success("Done");
    }
    Ok(())
}
