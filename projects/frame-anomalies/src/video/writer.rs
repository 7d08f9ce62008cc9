use super::FrameSink;
use crate::error::PipelineError;
use anyhow::{bail, Result};
use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio::VideoWriter;

/// Default output FourCC (MPEG-4 part 2)
pub const DEFAULT_CODEC: &str = "mp4v";

/// Packs a four-character codec name into an OpenCV FourCC code.
pub fn fourcc(codec: &str) -> Result<i32> {
    let chars: Vec<char> = codec.chars().collect();
    if chars.len() != 4 {
        bail!("Codec must be a four-character code, got {:?}", codec);
    }
    Ok(VideoWriter::fourcc(chars[0], chars[1], chars[2], chars[3])?)
}

/// Encodes annotated frames to a video file with a fixed size and rate.
pub struct VideoFileWriter {
    writer: Option<VideoWriter>,
    path: String,
    frame_size: Size,
    frames_written: usize,
}

impl VideoFileWriter {
    pub fn create(path: &str, codec: &str, fps: f64, frame_size: Size) -> Result<Self> {
        let code = fourcc(codec)?;
        let writer = VideoWriter::new(path, code, fps, frame_size, true).map_err(|_| {
            PipelineError::SinkOpen {
                path: path.to_string(),
            }
        })?;
        if !writer.is_opened()? {
            return Err(PipelineError::SinkOpen {
                path: path.to_string(),
            }
            .into());
        }

        tracing::info!(
            "VideoFileWriter: writing {} ({}x{}, fps={:.2}, codec={})",
            path,
            frame_size.width,
            frame_size.height,
            fps,
            codec
        );

        Ok(Self {
            writer: Some(writer),
            path: path.to_string(),
            frame_size,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

impl FrameSink for VideoFileWriter {
    fn write(&mut self, frame: &Mat) -> Result<()> {
        let size = frame.size()?;
        if size != self.frame_size {
            return Err(PipelineError::FrameSize {
                expected_w: self.frame_size.width,
                expected_h: self.frame_size.height,
                actual_w: size.width,
                actual_h: size.height,
            }
            .into());
        }

        let Some(writer) = self.writer.as_mut() else {
            bail!("Writer for {} is already released", self.path);
        };
        writer.write(frame)?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.release()?;
            tracing::debug!(
                "VideoFileWriter: released {} after {} frames",
                self.path,
                self.frames_written
            );
        }
        Ok(())
    }
}
