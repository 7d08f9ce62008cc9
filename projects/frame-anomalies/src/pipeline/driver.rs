use crate::error::PipelineError;
use crate::pipeline::annotate::annotate;
use crate::pipeline::background::{BackgroundConfig, BackgroundModel};
use crate::pipeline::defects::{DefectConfig, DefectDetector};
use crate::pipeline::flow::{FlowConfig, FlowVisualizer, OpticalFlowEstimator};
use crate::pipeline::regions;
use crate::pipeline::types::{ProcessedFrame, RegionKind};
use crate::video::processor::FrameProcessor;
use crate::video::{FrameSink, VideoReader};
use anyhow::Result;
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Configuration for motion-anomaly detection
#[derive(Clone, Debug)]
pub struct MotionConfig {
    pub background: BackgroundConfig,
    pub flow: FlowConfig,
    /// Weight of the source frame when blending the flow overlay
    pub overlay_frame_weight: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            background: BackgroundConfig::default(),
            flow: FlowConfig::default(),
            overlay_frame_weight: 0.7,
        }
    }
}

/// Closed set of detector chains the driver can run.
#[derive(Clone, Debug)]
pub enum DetectionMode {
    Motion(MotionConfig),
    Defects(DefectConfig),
}

impl DetectionMode {
    pub fn name(&self) -> &'static str {
        match self {
            DetectionMode::Motion(_) => "motion",
            DetectionMode::Defects(_) => "defects",
        }
    }
}

/// Temporal state threaded through a motion-mode run
struct MotionState {
    background: BackgroundModel,
    flow: OpticalFlowEstimator,
    visualizer: FlowVisualizer,
    prev_gray: Option<Mat>,
}

enum ModeState {
    Motion(Box<MotionState>),
    Defects(DefectDetector),
}

enum DriverState {
    Idle,
    Running(ModeState),
    Finished,
}

impl DriverState {
    fn name(&self) -> &'static str {
        match self {
            DriverState::Idle => "idle",
            DriverState::Running(_) => "running",
            DriverState::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub frames_read: usize,
    pub frames_written: usize,
    pub regions: BTreeMap<RegionKind, usize>,
    pub duration: Duration,
}

/// Owns one video's detection state and moves it through
/// `Idle -> Running -> Finished`.
pub struct PipelineDriver {
    mode: DetectionMode,
    frame_size: Size,
    state: DriverState,
    frames_processed: usize,
}

impl PipelineDriver {
    /// `frame_size` is the output size every frame is conformed to.
    pub fn new(mode: DetectionMode, frame_size: Size) -> Self {
        Self {
            mode,
            frame_size,
            state: DriverState::Idle,
            frames_processed: 0,
        }
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    fn invalid_state(&self, expected: &'static str) -> anyhow::Error {
        PipelineError::InvalidState {
            expected,
            actual: self.state.name(),
        }
        .into()
    }

    /// Builds fresh per-video state. Motion mode starts with an empty
    /// background model and no previous frame.
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.state, DriverState::Idle) {
            return Err(self.invalid_state("idle"));
        }

        let mode_state = match &self.mode {
            DetectionMode::Motion(config) => ModeState::Motion(Box::new(MotionState {
                background: BackgroundModel::new(config.background.clone())?,
                flow: OpticalFlowEstimator::new(config.flow.clone()),
                visualizer: FlowVisualizer {
                    frame_weight: config.overlay_frame_weight,
                },
                prev_gray: None,
            })),
            DetectionMode::Defects(config) => ModeState::Defects(DefectDetector::new(config)),
        };

        tracing::debug!("Pipeline started in {} mode", self.mode.name());
        self.frames_processed = 0;
        self.state = DriverState::Running(mode_state);
        Ok(())
    }

    /// Runs the mode's detector chain on one frame and returns the annotated
    /// result.
    pub fn process_frame(&mut self, frame: &Mat) -> Result<ProcessedFrame> {
        let frame_size = self.frame_size;
        let index = self.frames_processed;
        let DriverState::Running(mode_state) = &mut self.state else {
            return Err(self.invalid_state("running"));
        };

        let conformed;
        let frame = if frame.size()? != frame_size {
            conformed = conform(frame, frame_size)?;
            &conformed
        } else {
            frame
        };

        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let processed = match mode_state {
            ModeState::Motion(state) => {
                let mask = state.background.foreground_mask(frame)?;

                let (overlay, flow_applied) = match state.prev_gray.as_ref() {
                    Some(prev_gray) => {
                        let flow = state.flow.estimate(prev_gray, &gray)?;
                        (state.visualizer.visualize(&flow, frame)?, true)
                    }
                    None => (frame.try_clone()?, false),
                };
                state.prev_gray = Some(gray);

                let found = regions::extract(&mask, RegionKind::Motion)?;
                ProcessedFrame {
                    index,
                    annotated: annotate(&overlay, &found)?,
                    regions: found,
                    flow_applied,
                }
            }
            ModeState::Defects(detector) => {
                let found = detector.detect(&gray)?;
                ProcessedFrame {
                    index,
                    annotated: annotate(frame, &found)?,
                    regions: found,
                    flow_applied: false,
                }
            }
        };

        self.frames_processed += 1;
        Ok(processed)
    }

    /// Flushes the sink and drops all per-video state. Terminal.
    pub fn finish(&mut self, sink: &mut dyn FrameSink) -> Result<()> {
        if !matches!(self.state, DriverState::Running(_)) {
            return Err(self.invalid_state("running"));
        }
        self.state = DriverState::Finished;
        sink.finish()?;
        tracing::debug!(
            "Pipeline finished after {} frames",
            self.frames_processed
        );
        Ok(())
    }

    /// Pulls every frame from `source`, pushes the annotated frames to `sink`
    /// and hands each result to `processor`. A frame that fails to decode
    /// ends the stream.
    pub fn run<P>(
        &mut self,
        source: &mut dyn VideoReader,
        sink: &mut dyn FrameSink,
        mut processor: P,
    ) -> Result<RunStats>
    where
        P: FrameProcessor,
    {
        let start_time = Instant::now();
        let mut stats = RunStats::default();
        self.start()?;

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        "Failed to decode frame {}, treating as end of stream: {:#}",
                        stats.frames_read,
                        e
                    );
                    break;
                }
            };
            stats.frames_read += 1;

            let processed = self.process_frame(&frame)?;
            sink.write(&processed.annotated)?;
            stats.frames_written += 1;
            for region in &processed.regions {
                *stats.regions.entry(region.kind).or_default() += 1;
            }

            processor.process(&processed)?;
        }

        self.finish(sink)?;
        stats.duration = start_time.elapsed();
        Ok(stats)
    }
}

/// Resizes a frame to the output size with area interpolation.
fn conform(frame: &Mat, size: Size) -> Result<Mat> {
    let mut resized = Mat::default();
    imgproc::resize(frame, &mut resized, size, 0.0, 0.0, imgproc::INTER_AREA)?;
    Ok(resized)
}
