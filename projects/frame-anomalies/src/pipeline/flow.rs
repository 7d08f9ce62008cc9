use crate::error::PipelineError;
use anyhow::Result;
use opencv::core::{self, Mat, Scalar, Vector};
use opencv::prelude::*;
use opencv::{imgproc, video};
use std::f64::consts::PI;

/// Farnebäck dense optical flow parameters
#[derive(Clone, Debug)]
pub struct FlowConfig {
    pub pyr_scale: f64,
    pub levels: i32,
    pub winsize: i32,
    pub iterations: i32,
    pub poly_n: i32,
    pub poly_sigma: f64,
    pub flags: i32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            winsize: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
            flags: 0,
        }
    }
}

/// Estimates a dense per-pixel displacement field between consecutive
/// grayscale frames.
pub struct OpticalFlowEstimator {
    config: FlowConfig,
}

impl OpticalFlowEstimator {
    pub fn new(config: FlowConfig) -> Self {
        Self { config }
    }

    /// Returns a `CV_32FC2` field of (dx, dy) displacements from `prev_gray`
    /// to `curr_gray`.
    pub fn estimate(&self, prev_gray: &Mat, curr_gray: &Mat) -> Result<Mat> {
        let prev_size = prev_gray.size()?;
        let curr_size = curr_gray.size()?;
        if prev_size != curr_size {
            return Err(PipelineError::FrameSize {
                expected_w: prev_size.width,
                expected_h: prev_size.height,
                actual_w: curr_size.width,
                actual_h: curr_size.height,
            }
            .into());
        }

        let mut flow = Mat::default();
        video::calc_optical_flow_farneback(
            prev_gray,
            curr_gray,
            &mut flow,
            self.config.pyr_scale,
            self.config.levels,
            self.config.winsize,
            self.config.iterations,
            self.config.poly_n,
            self.config.poly_sigma,
            self.config.flags,
        )?;
        Ok(flow)
    }
}

/// Renders a flow field as an HSV color overlay blended onto the frame.
///
/// Direction maps to hue, magnitude (min-max normalized over the whole
/// field) maps to value, saturation is fixed at maximum.
pub struct FlowVisualizer {
    /// Weight of the source frame in the blend; the overlay gets the rest.
    pub frame_weight: f64,
}

impl Default for FlowVisualizer {
    fn default() -> Self {
        Self { frame_weight: 0.7 }
    }
}

impl FlowVisualizer {
    /// Builds the BGR flow color image for `flow`.
    pub fn colorize(&self, flow: &Mat) -> Result<Mat> {
        let mut components = Vector::<Mat>::new();
        core::split(flow, &mut components)?;

        let mut magnitude = Mat::default();
        let mut angle = Mat::default();
        core::cart_to_polar(
            &components.get(0)?,
            &components.get(1)?,
            &mut magnitude,
            &mut angle,
            false,
        )?;

        // 8-bit hue spans 0..180
        let mut hue = Mat::default();
        angle.convert_to(&mut hue, core::CV_8U, 180.0 / PI / 2.0, 0.0)?;

        let mut value = Mat::default();
        core::normalize(
            &magnitude,
            &mut value,
            0.0,
            255.0,
            core::NORM_MINMAX,
            core::CV_8U,
            &core::no_array(),
        )?;

        let saturation = Mat::new_size_with_default(hue.size()?, core::CV_8UC1, Scalar::all(255.0))?;

        let mut planes = Vector::<Mat>::new();
        planes.push(hue);
        planes.push(saturation);
        planes.push(value);
        let mut hsv = Mat::default();
        core::merge(&planes, &mut hsv)?;

        let mut bgr = Mat::default();
        imgproc::cvt_color_def(&hsv, &mut bgr, imgproc::COLOR_HSV2BGR)?;
        Ok(bgr)
    }

    /// Returns `frame_weight * frame + (1 - frame_weight) * colorize(flow)`.
    pub fn visualize(&self, flow: &Mat, frame: &Mat) -> Result<Mat> {
        let color = self.colorize(flow)?;
        let mut blended = Mat::default();
        core::add_weighted(
            frame,
            self.frame_weight,
            &color,
            1.0 - self.frame_weight,
            0.0,
            &mut blended,
            -1,
        )?;
        Ok(blended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Rect, Vec2f, Vec3b, CV_32FC2, CV_8UC1, CV_8UC3};

    fn wave(width: i32, height: i32, shift: f64) -> Mat {
        let mut img = Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(0.0))
            .unwrap();
        for y in 0..height {
            for x in 0..width {
                let fx = x as f64 - shift;
                let v = 128.0 + 60.0 * (fx / 5.0).sin() * (y as f64 / 7.0).cos();
                *img.at_2d_mut::<u8>(y, x).unwrap() = v.round() as u8;
            }
        }
        img
    }

    #[test]
    fn test_estimate_recovers_horizontal_shift() {
        let prev = wave(160, 120, 0.0);
        let curr = wave(160, 120, 2.0);

        let estimator = OpticalFlowEstimator::new(FlowConfig::default());
        let flow = estimator.estimate(&prev, &curr).unwrap();
        assert_eq!(flow.typ(), CV_32FC2);
        assert_eq!(flow.size().unwrap(), prev.size().unwrap());

        let interior = Mat::roi(&flow, Rect::new(30, 30, 100, 60))
            .unwrap()
            .try_clone()
            .unwrap();
        let mean = core::mean(&interior, &core::no_array()).unwrap();
        assert!((mean[0] - 2.0).abs() < 0.4, "dx mean {}", mean[0]);
        assert!(mean[1].abs() < 0.4, "dy mean {}", mean[1]);
    }

    #[test]
    fn test_estimate_rejects_size_mismatch() {
        let estimator = OpticalFlowEstimator::new(FlowConfig::default());
        let err = estimator
            .estimate(&wave(64, 48, 0.0), &wave(48, 48, 0.0))
            .unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().is_some());
    }

    #[test]
    fn test_visualize_blends_overlay() {
        let frame =
            Mat::new_rows_cols_with_default(20, 40, CV_8UC3, Scalar::all(100.0)).unwrap();

        // Left half moves right by 3px, right half is still.
        let mut flow = Mat::new_rows_cols_with_default(20, 40, CV_32FC2, Scalar::all(0.0))
            .unwrap();
        for y in 0..20 {
            for x in 0..20 {
                *flow.at_2d_mut::<Vec2f>(y, x).unwrap() = Vec2f::from([3.0, 0.0]);
            }
        }

        let out = FlowVisualizer::default().visualize(&flow, &frame).unwrap();
        assert_eq!(out.size().unwrap(), frame.size().unwrap());

        // Zero angle is red at full value.
        let moving = *out.at_2d::<Vec3b>(10, 5).unwrap();
        assert_eq!(moving[0], 70);
        assert_eq!(moving[1], 70);
        assert!((moving[2] as i32 - 146).abs() <= 1);

        // Zero magnitude normalizes to black.
        let still = *out.at_2d::<Vec3b>(10, 30).unwrap();
        assert_eq!(still, Vec3b::from([70, 70, 70]));
    }

    #[test]
    fn test_colorize_maps_direction_to_hue() {
        let mut flow = Mat::new_rows_cols_with_default(4, 8, CV_32FC2, Scalar::all(0.0)).unwrap();
        // Bottom rows stay still so the magnitude range is non-degenerate.
        for y in 0..2 {
            for x in 0..4 {
                *flow.at_2d_mut::<Vec2f>(y, x).unwrap() = Vec2f::from([2.0, 0.0]);
            }
            for x in 4..8 {
                *flow.at_2d_mut::<Vec2f>(y, x).unwrap() = Vec2f::from([-2.0, 0.0]);
            }
        }

        let color = FlowVisualizer::default().colorize(&flow).unwrap();
        let right = *color.at_2d::<Vec3b>(0, 0).unwrap();
        let left = *color.at_2d::<Vec3b>(0, 6).unwrap();
        // Rightward motion is red, leftward motion is cyan.
        assert_eq!(right, Vec3b::from([0, 0, 255]));
        assert_eq!(left, Vec3b::from([255, 255, 0]));
    }
}
