mod cli;
mod error;
mod pipeline;
mod run_artifacts;
mod video;

use anyhow::Result;
use cli::{Args, Command, IoArgs};
use pipeline::defects::DefectConfig;
use pipeline::driver::{DetectionMode, MotionConfig};
use tracing_subscriber::EnvFilter;
use video::processor::{OutputConfig, VideoSession};

fn session(io: IoArgs) -> VideoSession {
    VideoSession {
        input: io.input,
        output: io.output,
        backend: io.backend,
        output_config: OutputConfig {
            codec: io.codec,
            ..OutputConfig::default()
        },
        report: io.report,
        summary: io.summary,
    }
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse_args();

    let (io, mode) = match args.command {
        Command::Motion(io) => (io, DetectionMode::Motion(MotionConfig::default())),
        Command::Defects(io) => (io, DetectionMode::Defects(DefectConfig::default())),
    };

    let stats = session(io).run(mode)?;
    tracing::debug!(
        "{} frames read, {} written in {:.2?}",
        stats.frames_read,
        stats.frames_written,
        stats.duration
    );

    Ok(())
}
