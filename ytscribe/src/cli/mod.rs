// cli/mod.rs
//
// Command-line front-end over the transcription service.

pub mod transcript;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::TranscribeConfig;
use crate::pipeline::{TranscriptionResult, TranscriptionService};
use crate::utils::check_dependencies;
use crate::whisper_engine::{find_whisper_model, resolve_model, KNOWN_MODELS};

pub use transcript::{
    extract_video_id, file_label, format_transcript_markdown, generate_transcript_filename,
    is_valid_youtube_url, transcript_filename, youtube_title,
};

const DEFAULT_OUTPUT_DIR: &str = "./ytaudio_output";
const DEFAULT_MODEL: &str = "base";
const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;

#[derive(Parser, Debug)]
#[command(
    name = "ytscribe",
    version,
    about = "Extract and transcribe audio from YouTube videos with Whisper"
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the audio of a YouTube video and transcribe it
    Transcribe(TranscribeArgs),
    /// Transcribe a local audio or video file
    File(FileArgs),
    /// Check that ffmpeg and yt-dlp are available and list installed models
    Check,
    /// List known Whisper models and where they resolve
    Models,
}

#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// YouTube video URL
    pub url: String,

    #[command(flatten)]
    pub options: RunOptions,
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// Any media file ffmpeg can read
    pub input: PathBuf,

    #[command(flatten)]
    pub options: RunOptions,
}

#[derive(Args, Debug, Default)]
pub struct RunOptions {
    /// Output directory for transcripts and temporary files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Whisper model name (tiny, base, small, medium, large) or path to a model file
    #[arg(short, long)]
    pub model: Option<String>,

    /// Language hint for Whisper, e.g. "en"; empty or "auto" lets Whisper decide
    #[arg(short, long)]
    pub language: Option<String>,

    /// Keep downloaded media files
    #[arg(short, long)]
    pub keep: bool,

    /// Timeout for the entire operation, in seconds
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Save the transcript as markdown in <output>/<project>/
    #[arg(short, long)]
    pub project: Option<String>,
}

/// What a single run transcribes.
#[derive(Debug)]
enum Input {
    Url(String),
    File(PathBuf),
}

impl Input {
    fn source(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }

    fn title(&self) -> String {
        match self {
            Self::Url(url) => youtube_title(url),
            Self::File(path) => format!("Audio Transcript ({})", file_label(path)),
        }
    }

    fn transcript_filename(&self, now: chrono::DateTime<chrono::Local>) -> String {
        match self {
            Self::Url(url) => generate_transcript_filename(url, now),
            Self::File(path) => transcript_filename(&file_label(path), now),
        }
    }
}

/// Initialise `env_logger`: `RUST_LOG` wins, otherwise info, or debug with
/// `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Transcribe(args) => {
            transcribe(Input::Url(args.url), &args.options, cli.verbose).await
        }
        Command::File(args) => transcribe(Input::File(args.input), &args.options, cli.verbose).await,
        Command::Check => check(),
        Command::Models => {
            list_models();
            Ok(())
        }
    }
}

/// Environment-derived config with the command-line flags laid over it.
fn build_config(options: &RunOptions) -> Result<TranscribeConfig> {
    let mut config = TranscribeConfig::from_env();

    config.output_dir = match &options.output {
        Some(dir) => dir.clone(),
        None if std::env::var_os("YTSCRIBE_OUTPUT_DIR").is_some() => config.output_dir,
        None => PathBuf::from(DEFAULT_OUTPUT_DIR),
    };

    let model = options
        .model
        .clone()
        .or_else(|| std::env::var("YTSCRIBE_MODEL").ok())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    config.model_path = match resolve_model(&model) {
        Some(path) => path,
        None => bail!(
            "Whisper model '{}' not found\nAvailable models: {}\nMake sure the model is installed in a standard location",
            model,
            KNOWN_MODELS
                .iter()
                .map(|m| m.name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };

    if let Some(language) = &options.language {
        config.language = language.clone();
    }
    if options.keep {
        config.cleanup_files = false;
    }
    Ok(config)
}

fn validate_input(input: &Input) -> Result<()> {
    match input {
        Input::Url(url) if !is_valid_youtube_url(url) => bail!(
            "Invalid YouTube URL: {}\nPlease provide a valid YouTube URL (e.g., https://youtube.com/watch?v=...)",
            url
        ),
        Input::File(path) if !path.is_file() => {
            bail!("Input file not found: {}", path.display())
        }
        _ => Ok(()),
    }
}

async fn transcribe(input: Input, options: &RunOptions, verbose: bool) -> Result<()> {
    validate_input(&input)?;

    let config = build_config(options)?;
    if verbose {
        println!("Starting transcription of: {}", input.source());
        println!("Output directory: {}", config.output_dir.display());
        println!("Whisper model: {}", config.model_path.display());
        println!("Keep files: {}", !config.cleanup_files);
    }

    let output_dir = config.output_dir.clone();
    let service = TranscriptionService::new(config);
    let cancel = CancellationToken::new();
    let watchdog = spawn_watchdog(cancel.clone(), Duration::from_secs(options.timeout));

    let outcome = match &input {
        Input::Url(url) => service.transcribe_url(url, &cancel).await,
        Input::File(path) => service.transcribe_file(path, &cancel).await,
    };
    watchdog.abort();
    let result = outcome.context("Error transcribing")?;

    match &options.project {
        Some(project) => {
            let path = save_transcript(&input, &result, &output_dir.join(project)).await?;
            if verbose {
                println!(
                    "Transcription completed in {:.1}s",
                    result.duration.as_secs_f64()
                );
            }
            println!("Transcript saved to: {}", path.display());
        }
        None => {
            if verbose {
                println!(
                    "Transcription completed in {:.1}s",
                    result.duration.as_secs_f64()
                );
                println!("--- Transcript ---");
            }
            println!("{}", result.text);
        }
    }
    Ok(())
}

async fn save_transcript(
    input: &Input,
    result: &TranscriptionResult,
    project_dir: &std::path::Path,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(project_dir)
        .await
        .with_context(|| format!("Error creating project directory {}", project_dir.display()))?;

    let now = chrono::Local::now();
    let path = project_dir.join(input.transcript_filename(now));
    let content = format_transcript_markdown(&input.title(), &input.source(), result, now);
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Error writing transcript file {}", path.display()))?;
    Ok(path)
}

/// Cancel `cancel` on timeout or Ctrl-C. Abort the handle once the run is over.
fn spawn_watchdog(cancel: CancellationToken, timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                log::warn!("Timed out after {}s, cancelling", timeout.as_secs());
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                log::warn!("Interrupted, cancelling");
            }
        }
        cancel.cancel();
    })
}

fn check() -> Result<()> {
    println!("Checking YouTube audio transcription dependencies...");

    if let Err(e) = check_dependencies() {
        println!("\nTo fix this, install the missing dependencies:");
        println!("- ffmpeg: https://ffmpeg.org/download.html");
        println!("- yt-dlp: https://github.com/yt-dlp/yt-dlp#installation");
        return Err(e.context("Dependency check failed"));
    }

    println!("✅ All dependencies are available!");
    println!();
    list_models();
    Ok(())
}

fn list_models() {
    println!("Available Whisper models:");

    let mut found_any = false;
    for spec in KNOWN_MODELS {
        match find_whisper_model(spec.name) {
            Some(path) => {
                found_any = true;
                println!("  ✅ {}: {}", spec.name, path.display());
            }
            None => println!(
                "  ❌ {} (~{} MB, {}): not found",
                spec.name, spec.size_mb, spec.description
            ),
        }
    }

    if !found_any {
        println!("\nNo Whisper models found!");
        println!("Download GGML models from https://huggingface.co/ggerganov/whisper.cpp");
        println!("and place them in ./models or ~/.cache/whisper");
    }
}
