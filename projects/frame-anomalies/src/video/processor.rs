use crate::pipeline::driver::{DetectionMode, PipelineDriver, RunStats};
use crate::pipeline::types::ProcessedFrame;
use crate::run_artifacts::{RegionReport, RunSummary};
use crate::video::writer::{VideoFileWriter, DEFAULT_CODEC};
use crate::video::{Backend, VideoReader};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Output-side settings shared by both detection modes
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// FourCC of the output container
    pub codec: String,
    /// A progress line is logged after every `progress_every` frames
    pub progress_every: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_CODEC.to_string(),
            progress_every: 50,
        }
    }
}

/// A trait for observing processed frames as the driver produces them.
pub trait FrameProcessor {
    fn process(&mut self, frame: &ProcessedFrame) -> Result<()>;
}

/// Blanket implementation so any closure with the right signature
/// automatically implements FrameProcessor.
impl<F> FrameProcessor for F
where
    F: FnMut(&ProcessedFrame) -> Result<()>,
{
    fn process(&mut self, frame: &ProcessedFrame) -> Result<()> {
        self(frame)
    }
}

/// Progress bar plus the periodic "Processed n frames" log line.
pub struct ProgressReporter {
    pb: ProgressBar,
    total: usize,
    every: usize,
    processed: usize,
}

impl ProgressReporter {
    pub fn new(total: usize, every: usize) -> Result<Self> {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} fps, {eta})")?
                .progress_chars("#>-"),
        );
        Ok(Self::with_bar(pb, total, every))
    }

    /// Reporter without a visible bar; log lines are still emitted.
    pub fn hidden(total: usize, every: usize) -> Self {
        Self::with_bar(ProgressBar::hidden(), total, every)
    }

    fn with_bar(pb: ProgressBar, total: usize, every: usize) -> Self {
        Self {
            pb,
            total,
            every: every.max(1),
            processed: 0,
        }
    }

    /// Records one frame. Returns true when a progress line was logged.
    pub fn tick(&mut self) -> bool {
        self.processed += 1;
        self.pb.inc(1);
        if self.processed % self.every != 0 {
            return false;
        }
        let (processed, total) = (self.processed, self.total);
        self.pb.suspend(|| {
            tracing::info!("Processed {} frames out of {}", processed, total);
        });
        true
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn finish(&self) {
        self.pb.finish_with_message("Done");
    }
}

impl FrameProcessor for ProgressReporter {
    fn process(&mut self, _frame: &ProcessedFrame) -> Result<()> {
        self.tick();
        Ok(())
    }
}

/// Everything one run needs: where to read, where to write, and which
/// artifacts to produce.
#[derive(Clone, Debug)]
pub struct VideoSession {
    pub input: String,
    pub output: String,
    pub backend: Backend,
    pub output_config: OutputConfig,
    pub report: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

impl VideoSession {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            backend: Backend::default(),
            output_config: OutputConfig::default(),
            report: None,
            summary: None,
        }
    }

    /// Opens the input, runs the detection mode over every frame and writes
    /// the annotated video plus any requested artifacts.
    pub fn run(&self, mode: DetectionMode) -> Result<RunStats> {
        let mut reader = self.backend.open(&self.input)?;
        self.run_with_reader(reader.as_mut(), mode)
    }

    pub fn run_with_reader(
        &self,
        reader: &mut dyn VideoReader,
        mode: DetectionMode,
    ) -> Result<RunStats> {
        let total_frames = reader.frame_count()?;
        let fps = reader.source_fps()?;
        let frame_size = reader.frame_size()?;
        tracing::info!(
            "Opened {} ({}x{}, {:.2} fps, ~{} frames) for {} detection",
            self.input,
            frame_size.width,
            frame_size.height,
            fps,
            total_frames,
            mode.name()
        );

        let mut writer =
            VideoFileWriter::create(&self.output, &self.output_config.codec, fps, frame_size)?;

        let mut report = match &self.report {
            Some(path) => Some(RegionReport::create(path)?),
            None => None,
        };

        let mut progress = ProgressReporter::new(total_frames, self.output_config.progress_every)?;
        let mode_name = mode.name();
        let mut driver = PipelineDriver::new(mode, frame_size);

        let stats = driver.run(reader, &mut writer, |frame: &ProcessedFrame| {
            progress.process(frame)?;
            if let Some(report) = report.as_mut() {
                report.record(frame)?;
            }
            Ok(())
        })?;
        progress.finish();

        if let Some(report) = report.as_mut() {
            report.flush()?;
        }

        if let Some(path) = &self.summary {
            RunSummary::from_stats(&self.input, &self.output, mode_name, &stats)
                .write(path)
                .with_context(|| format!("Failed to write run summary {}", path.display()))?;
        }

        tracing::info!(
            "Processing complete, annotated video saved to {}",
            self.output
        );
        Ok(stats)
    }
}
