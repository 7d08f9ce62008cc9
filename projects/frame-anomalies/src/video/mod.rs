pub mod ffmpeg_reader;
pub mod opencv_reader;
pub mod processor;
pub mod writer;

use anyhow::Result;
use opencv::core::{Mat, Size};

/// Source of decoded BGR frames in decode order.
pub trait VideoReader {
    /// Container's frame count estimate; only used for progress reporting.
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    fn frame_size(&self) -> Result<Size>;
    /// Returns `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Mat>>;
}

/// Destination for annotated frames, written in the order they are produced.
pub trait FrameSink {
    fn write(&mut self, frame: &Mat) -> Result<()>;
    /// Flushes and releases the sink. Later calls are no-ops.
    fn finish(&mut self) -> Result<()>;
}

/// Decoder implementation used to read the input video
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Opencv,
    Ffmpeg,
}

impl Backend {
    pub fn open(self, path: &str) -> Result<Box<dyn VideoReader>> {
        let reader: Box<dyn VideoReader> = match self {
            Backend::Opencv => Box::new(opencv_reader::OpencvReader::new(path)?),
            Backend::Ffmpeg => Box::new(ffmpeg_reader::FfmpegReader::new(path)?),
        };
        Ok(reader)
    }
}
