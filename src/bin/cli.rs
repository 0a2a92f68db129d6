use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64ct::{Base64, Encoding};
use clap::{Args as ClapArgs, Parser, Subcommand};

use transcribe_runner::auth::generate_api_key;
use transcribe_runner::client::{EndpointClient, PollOptions, DEFAULT_BASE_URL};
use transcribe_runner::job::{JobHandle, JobInput, JobOutput, Task};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the platform hosting the endpoint
    #[arg(long, env = "TRANSCRIBE_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Id of the endpoint jobs are submitted to
    #[arg(long, env = "TRANSCRIBE_ENDPOINT_ID", default_value = "local", global = true)]
    endpoint_id: String,

    /// API key sent as bearer token
    #[arg(long, env = "TRANSCRIBE_API_KEY", default_value = "", hide_env_values = true, global = true)]
    api_key: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(ClapArgs)]
struct AudioArgs {
    /// Local audio file, sent base64 encoded
    #[arg(short, long, conflicts_with = "url")]
    file: Option<PathBuf>,

    /// Audio URL the handler downloads
    #[arg(short, long)]
    url: Option<String>,

    /// Language hint, e.g. "en"
    #[arg(short, long)]
    language: Option<String>,

    /// Translate into English instead of transcribing
    #[arg(long)]
    translate: bool,

    /// Return timed segments
    #[arg(short, long)]
    timestamps: bool,

    /// Model requested from the transcription service
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job and print its handle
    Submit(AudioArgs),

    /// Print the current status of a job
    Status {
        /// Handle returned by `submit`
        job_id: String,
    },

    /// Submit a job and poll until it finishes
    Transcribe {
        #[command(flatten)]
        audio: AudioArgs,

        /// Milliseconds between status requests
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Seconds after which the job is treated as failed
        #[arg(long, default_value_t = 300)]
        timeout_sec: u64,
    },

    /// Generate a new API key and the hash to add to API_KEY_HASHES
    GenerateKey,
}

impl AudioArgs {
    fn into_input(self) -> Result<JobInput> {
        let audio = match (&self.file, &self.url) {
            (Some(path), None) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read audio file {}", path.display()))?;
                eprintln!("Audio size: {} bytes", bytes.len());
                Some(Base64::encode_string(&bytes))
            }
            (None, Some(_)) => None,
            _ => bail!("Pass either --file or --url"),
        };

        Ok(JobInput {
            audio,
            audio_url: self.url,
            language: self.language,
            task: if self.translate {
                Task::Translate
            } else {
                Task::Transcribe
            },
            return_timestamps: self.timestamps,
            model: self.model,
        })
    }
}

fn print_output(output: &JobOutput) {
    let transcription = &output.transcription;
    println!(
        "Language: {}",
        transcription.language.as_deref().unwrap_or("unknown")
    );
    if let Some(processing_time) = output.processing_time {
        println!("Processing time: {:.2}s", processing_time);
    }
    println!();
    println!("{}", transcription.text.trim());

    if !transcription.segments.is_empty() {
        println!("\nSegments ({} total):", transcription.segments.len());
        for segment in &transcription.segments {
            println!(
                "  [{:.2}s - {:.2}s]: {}",
                segment.start,
                segment.end,
                segment.text.trim()
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client =
        EndpointClient::new(args.endpoint_id, args.api_key).with_base_url(args.base_url);

    match args.cmd {
        Commands::Submit(audio) => {
            let id = client.submit(&audio.into_input()?).await?;
            println!("{}", id);
        }
        Commands::Status { job_id } => {
            let status = client.status(&JobHandle::from(job_id)).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Transcribe {
            audio,
            interval_ms,
            timeout_sec,
        } => {
            let options = PollOptions {
                interval: Duration::from_millis(interval_ms),
                timeout: Duration::from_secs(timeout_sec),
            };
            let output = client.transcribe(&audio.into_input()?, options).await?;
            print_output(&output);
        }
        Commands::GenerateKey => {
            let generated = generate_api_key()?;
            println!("API key: {}", generated.key);
            println!("Hash:    {}", generated.hash);
        }
    }
    Ok(())
}
