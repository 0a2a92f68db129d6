use std::error;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;

#[derive(Parser)]
#[command(author, version, about = "Probe the /health route of a transcribe_runner server")]
struct Args {
    /// Base URL of the server, e.g. http://localhost:8000
    url: Url,

    /// Seconds to wait for an answer
    #[arg(short, long, default_value_t = 5)]
    timeout_sec: u64,
}

fn main() -> Result<ExitCode, Box<dyn error::Error>> {
    let args = Args::parse();
    let url = args.url.join("health")?;

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(args.timeout_sec))
        .build()?;
    let response = match client.get(url).send() {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Health check failed: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if !response.status().is_success() {
        eprintln!("Health check failed with status {}", response.status());
        return Ok(ExitCode::FAILURE);
    }
    println!("{}", response.text()?);
    Ok(ExitCode::SUCCESS)
}
