use anyhow::Result;
use opencv::core::{self, Mat, Ptr};
use opencv::prelude::*;
use opencv::{imgproc, video};

/// Configuration for the per-pixel background model
#[derive(Clone, Debug)]
pub struct BackgroundConfig {
    /// Number of recent observations that shape the mixture
    pub history: i32,
    /// Squared Mahalanobis distance a pixel must exceed to be foreground
    pub var_threshold: f64,
    pub detect_shadows: bool,
    /// Likelihood cut-off applied to the raw model output
    pub mask_cutoff: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 50.0,
            detect_shadows: true,
            mask_cutoff: 25.0,
        }
    }
}

/// Gaussian-mixture background estimator owned by one video run.
///
/// Every call to [`BackgroundModel::observe`] folds the frame into the
/// per-pixel statistics, so frames must be fed exactly once and in decode
/// order. The mixture has no random state: identical input sequences produce
/// identical masks.
pub struct BackgroundModel {
    config: BackgroundConfig,
    subtractor: Ptr<video::BackgroundSubtractorMOG2>,
    observed: usize,
}

impl BackgroundModel {
    pub fn new(config: BackgroundConfig) -> Result<Self> {
        let subtractor = Self::build_subtractor(&config)?;
        Ok(Self {
            config,
            subtractor,
            observed: 0,
        })
    }

    fn build_subtractor(config: &BackgroundConfig) -> Result<Ptr<video::BackgroundSubtractorMOG2>> {
        Ok(video::create_background_subtractor_mog2(
            config.history,
            config.var_threshold,
            config.detect_shadows,
        )?)
    }

    /// Drops all learned statistics.
    pub fn reset(&mut self) -> Result<()> {
        self.subtractor = Self::build_subtractor(&self.config)?;
        self.observed = 0;
        Ok(())
    }

    pub fn config(&self) -> &BackgroundConfig {
        &self.config
    }

    /// Number of frames folded into the model since construction or reset
    pub fn observed(&self) -> usize {
        self.observed
    }

    /// Updates the model with `frame` and returns the raw likelihood buffer:
    /// 0 for background, the shadow value (127) for shadows, 255 for foreground.
    pub fn observe(&mut self, frame: &Mat) -> Result<Mat> {
        let mut raw = Mat::default();
        // Negative rate selects the automatic 1/min(2n, history) schedule.
        self.subtractor.apply(frame, &mut raw, -1.0)?;
        self.observed += 1;
        Ok(raw)
    }

    /// Updates the model with `frame` and returns a strict 0/255 foreground
    /// mask. Shadow-tagged pixels are never foreground.
    pub fn foreground_mask(&mut self, frame: &Mat) -> Result<Mat> {
        let raw = self.observe(frame)?;

        let mut cutoff = self.config.mask_cutoff;
        if self.config.detect_shadows {
            let shadow_value = self.subtractor.get_shadow_value()? as f64;
            cutoff = cutoff.max(shadow_value);
        }

        let mut binary = Mat::default();
        imgproc::threshold(&raw, &mut binary, cutoff, 255.0, imgproc::THRESH_BINARY)?;
        Ok(binary)
    }
}
