// mindlink test application -- CLI tool for exercising the protocol engine
// against a live acquisition service.
//
// Usage:
//   mindlink-test-app --client-id ID --client-secret SECRET collect
//   mindlink-test-app --client-id ID --client-secret SECRET collect --duration 60
//   mindlink-test-app --client-id ID --client-secret SECRET --record frames.csv stream
//   mindlink-test-app --url wss://localhost:6868 --client-id ID --client-secret SECRET collect
//
// Credentials can also be supplied via MINDLINK_CLIENT_ID and
// MINDLINK_CLIENT_SECRET.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use mindlink_core::Credentials;
use mindlink_cortex::decoder::DecodedFrame;
use mindlink_cortex::{CortexSession, CortexSessionBuilder, DEFAULT_CORTEX_URL};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// mindlink test application -- exercises the session engine from the
/// command line.
#[derive(Parser)]
#[command(name = "mindlink-test-app", version, about)]
struct Cli {
    /// Acquisition service URL.
    #[arg(long, default_value = DEFAULT_CORTEX_URL)]
    url: String,

    /// Application client id.
    #[arg(long, env = "MINDLINK_CLIENT_ID")]
    client_id: String,

    /// Application client secret.
    #[arg(long, env = "MINDLINK_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Record every decoded telemetry frame to this CSV file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Reject self-signed service certificates.
    #[arg(long)]
    strict_tls: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect band power for a fixed window and print per-band averages.
    Collect {
        /// Collection window in seconds.
        #[arg(long, default_value_t = 30)]
        duration: u64,

        /// Minimum decoded frames for the window to count.
        #[arg(long, default_value_t = 50)]
        min_samples: usize,
    },
    /// Stream decoded telemetry to stdout until Ctrl-C.
    Stream,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_collect(
    mut session: CortexSession,
    duration: Duration,
) -> Result<()> {
    let averages = session
        .run_collection(duration)
        .await
        .context("collection run failed")?;

    println!("Band power averages over {}s:", duration.as_secs());
    for (band, value) in averages.iter() {
        println!("  {:>6}: {:.6}", band.to_string(), value);
    }
    Ok(())
}

async fn cmd_stream(mut session: CortexSession) -> Result<()> {
    session.establish().await.context("handshake failed")?;

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping...");
            canceller.cancel();
        }
    });

    println!("Streaming (Ctrl-C to stop)...");
    let mut frames = 0usize;
    let result = session
        .stream(&cancel, |frame| {
            frames += 1;
            match frame {
                DecodedFrame::Power(p) => {
                    let mean = if p.frames.is_empty() {
                        0.0
                    } else {
                        p.frames.iter().map(|f| f.value).sum::<f64>() / p.frames.len() as f64
                    };
                    println!(
                        "[{:>12.3}] pow frame #{:<6} samples={:<3} mean={:.4}",
                        p.time,
                        frames,
                        p.frames.len(),
                        mean
                    );
                }
                DecodedFrame::Raw(r) => {
                    println!(
                        "[{:>12.3}] eeg frame #{:<6}",
                        r.time.unwrap_or(0.0),
                        frames
                    );
                }
            }
        })
        .await;

    session.shutdown().await;
    result.context("streaming failed")?;
    println!("{} frames received", frames);
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut builder = CortexSessionBuilder::new()
        .url(&cli.url)
        .credentials(Credentials::new(cli.client_id, cli.client_secret))
        .accept_invalid_certs(!cli.strict_tls);
    if let Some(path) = &cli.record {
        builder = builder.record_to(path);
    }
    if let Command::Collect { min_samples, .. } = &cli.command {
        builder = builder.min_samples(*min_samples);
    }

    let session = builder
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", cli.url))?;

    match cli.command {
        Command::Collect { duration, .. } => {
            cmd_collect(session, Duration::from_secs(duration)).await
        }
        Command::Stream => cmd_stream(session).await,
    }
}
