use thiserror::Error;

/// Domain failures surfaced by the video layer and the pipeline driver.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unable to open video source {path}: {reason}")]
    SourceOpen { path: String, reason: String },

    #[error("unable to open video sink {path}")]
    SinkOpen { path: String },

    #[error("pipeline is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("frame size mismatch: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h}")]
    FrameSize {
        expected_w: i32,
        expected_h: i32,
        actual_w: i32,
        actual_h: i32,
    },
}
