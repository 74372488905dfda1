use std::{io::Write, path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use digest_datastore::{DataStore, PgDataStore};
use digest_pulse::{
    openai::OpenAIClient,
    retry::RetryExecutor,
    tracing::init_tracing_subscriber,
    types::{ProcessingJob, Step},
    yt::{captions::YtDlpCaptions, video_id::parse_video_id},
    ProcessingCoordinatorBuilder,
};

#[derive(Parser)]
#[command(name = "digest-pulse", about = "Streams bullet summaries of YouTube videos")]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a video, streaming the summary to stdout
    Summarize {
        /// Video id or YouTube URL
        video: String,

        /// Channel the video belongs to, stored alongside the summary
        #[arg(long)]
        channel_id: Option<String>,

        /// Print the final job as JSON instead of streaming text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Print a previously saved summary
    Show {
        /// Video id or YouTube URL
        video: String,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Chat model used for summaries
    #[arg(long, env = "SUMMARY_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// yt-dlp executable
    #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    ytdlp_path: PathBuf,

    /// Path to yt-dlp cookies file
    #[arg(long, env = "YTDLP_COOKIES_PATH")]
    cookies_path: Option<PathBuf>,

    /// Working directory for downloaded captions
    #[arg(long, env = "WORKDIR", default_value = "/var/tmp/digest-pulse")]
    workdir: PathBuf,

    /// Retries for transcript fetching
    #[arg(long, env = "TRANSCRIPT_RETRIES", default_value = "1")]
    transcript_retries: u32,

    /// Retries for the summary stream
    #[arg(long, env = "SUMMARY_RETRIES", default_value = "3")]
    summary_retries: u32,

    /// Base backoff delay in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "1000")]
    retry_base_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff, in milliseconds
    #[arg(long, env = "RETRY_MAX_JITTER_MS", default_value = "1000")]
    retry_max_jitter_ms: u64,
}

impl PipelineArgs {
    fn retry(&self, max_retries: u32) -> RetryExecutor {
        RetryExecutor::new(max_retries, Duration::from_millis(self.retry_base_delay_ms))
            .with_max_jitter(Duration::from_millis(self.retry_max_jitter_ms))
    }
}

async fn summarize(
    store: PgDataStore,
    video: &str,
    channel_id: Option<String>,
    json: bool,
    args: PipelineArgs,
) -> anyhow::Result<()> {
    let captions = YtDlpCaptions::new(&args.workdir)
        .with_binary(&args.ytdlp_path)
        .with_cookies(args.cookies_path.clone());
    let openai = OpenAIClient::new(&args.openai_key)
        .with_base_url(&args.openai_base_url)
        .with_model(&args.model);

    let coordinator = ProcessingCoordinatorBuilder::new()
        .store(store)
        .transcript_source(captions)
        .summarizer(openai)
        .transcript_retry(args.retry(args.transcript_retries))
        .summary_retry(args.retry(args.summary_retries))
        .build();

    let token = coordinator.submit(video, channel_id)?;
    let mut rx = coordinator.subscribe();
    let mut printed = String::new();

    let job = loop {
        let job = rx.borrow_and_update().clone();
        if !json {
            print_progress(&job, &mut printed)?;
        }
        if job.generation_token != token || job.step.is_settled() {
            break job;
        }
        if rx.changed().await.is_err() {
            break coordinator.snapshot();
        }
    };

    coordinator.flush_pending_writes().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
    } else if !printed.is_empty() {
        println!();
    }

    if job.step == Step::Error {
        anyhow::bail!(
            "{:?} failed: {}",
            job.error_step,
            job.error_message.unwrap_or_default()
        );
    }

    Ok(())
}

/// Writes whatever part of the job's text has not been printed yet.
fn print_progress(job: &ProcessingJob, printed: &mut String) -> anyhow::Result<()> {
    let text = job.current_text();
    let mut stdout = std::io::stdout().lock();

    // a retried stream starts over from an empty buffer
    if !text.starts_with(printed.as_str()) {
        writeln!(stdout)?;
        printed.clear();
    }

    stdout.write_all(text[printed.len()..].as_bytes())?;
    stdout.flush()?;
    printed.replace_range(.., text);

    Ok(())
}

async fn show(store: PgDataStore, video: &str, json: bool) -> anyhow::Result<()> {
    let video_id = parse_video_id(video)?;
    let saved = store
        .find_summary(&video_id)
        .await?
        .with_context(|| format!("No saved summary for {video_id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        println!("{}", saved.summary_md);
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let _guard = sentry::init((
        std::env::var("SENTRY_DSN").unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some("production".into()),
            ..Default::default()
        },
    ));

    let cli = Cli::parse();
    init_tracing_subscriber()?;

    let store = PgDataStore::init(&cli.database_url).await?;

    match cli.command {
        Command::Summarize {
            video,
            channel_id,
            json,
            pipeline,
        } => summarize(store, &video, channel_id, json, pipeline).await,
        Command::Show { video, json } => show(store, &video, json).await,
    }
}
