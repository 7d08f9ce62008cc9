use crate::video::writer::DEFAULT_CODEC;
use crate::video::Backend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Highlight moving objects with a background model and optical flow
    Motion(IoArgs),
    /// Mark scratches and stains on each frame independently
    Defects(IoArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct IoArgs {
    /// Path to the input video
    #[arg(long)]
    pub input: String,

    /// Path of the annotated output video
    #[arg(long)]
    pub output: String,

    /// Decoder used to read the input
    #[arg(long, value_enum, default_value_t = Backend::Opencv, env = "FRAME_ANOMALIES_BACKEND")]
    pub backend: Backend,

    /// FourCC of the output video
    #[arg(long, default_value = DEFAULT_CODEC, env = "FRAME_ANOMALIES_CODEC")]
    pub codec: String,

    /// Write one CSV row per detected region
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write a JSON summary of the run
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
