use super::VideoReader;
use crate::error::PipelineError;
use anyhow::Result;
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH,
    },
};

pub struct OpencvReader {
    capture: VideoCapture,
    source_fps: f64,
    total_frames: usize,
    frame_size: Size,
}

impl OpencvReader {
    pub fn new(path: &str) -> Result<Self> {
        let source_open = |reason: String| PipelineError::SourceOpen {
            path: path.to_string(),
            reason,
        };

        let capture =
            VideoCapture::from_file(path, CAP_ANY).map_err(|e| source_open(e.to_string()))?;
        if !capture.is_opened()? {
            return Err(source_open("capture did not open".to_string()).into());
        }

        let mut fps = capture.get(CAP_PROP_FPS)?;
        if fps <= 0.0 {
            tracing::warn!("OpencvReader: Failed to get FPS from metadata, falling back to 30.0");
            fps = 30.0;
        }
        let total_frames = capture.get(CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;
        let frame_size = Size::new(
            capture.get(CAP_PROP_FRAME_WIDTH)? as i32,
            capture.get(CAP_PROP_FRAME_HEIGHT)? as i32,
        );

        tracing::info!(
            "OpencvReader: opened {}, {}x{}, fps={:.2}, stream_frames={}",
            path,
            frame_size.width,
            frame_size.height,
            fps,
            total_frames
        );

        Ok(Self {
            capture,
            source_fps: fps,
            total_frames,
            frame_size,
        })
    }
}

impl VideoReader for OpencvReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.total_frames)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(self.source_fps)
    }

    fn frame_size(&self) -> Result<Size> {
        Ok(self.frame_size)
    }

    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_source_open_error() {
        let err = OpencvReader::new("/nonexistent/clip.mp4").err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::SourceOpen { .. })
        ));
    }
}
