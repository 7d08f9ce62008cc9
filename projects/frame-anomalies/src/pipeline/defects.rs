use crate::pipeline::regions;
use crate::pipeline::types::{Region, RegionKind};
use anyhow::Result;
use opencv::core::{Mat, Size};
use opencv::imgproc;

/// Configuration for surface-defect detection
#[derive(Clone, Debug)]
pub struct DefectConfig {
    /// Square Gaussian kernel applied before both detectors
    pub blur_kernel: i32,
    pub canny_low: f64,
    pub canny_high: f64,
    /// Neighborhood size for the local Gaussian mean (odd)
    pub adaptive_block: i32,
    /// Offset subtracted from the local mean
    pub adaptive_c: f64,
}

impl Default for DefectConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            canny_low: 30.0,
            canny_high: 120.0,
            adaptive_block: 11,
            adaptive_c: 2.0,
        }
    }
}

/// Two-threshold gradient edge detector used to find scratches.
pub struct EdgeDetector {
    low: f64,
    high: f64,
}

impl EdgeDetector {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Returns a 0/255 edge map of `blurred_gray`.
    pub fn detect(&self, blurred_gray: &Mat) -> Result<Mat> {
        let mut edges = Mat::default();
        imgproc::canny_def(blurred_gray, &mut edges, self.low, self.high)?;
        Ok(edges)
    }
}

/// Local adaptive threshold that marks pixels darker than their
/// Gaussian-weighted neighborhood, tolerating uneven illumination.
pub struct AdaptiveRegionDetector {
    block_size: i32,
    c: f64,
}

impl AdaptiveRegionDetector {
    pub fn new(block_size: i32, c: f64) -> Self {
        Self { block_size, c }
    }

    /// Returns a 0/255 blotch map: 255 where `pixel <= local_mean - c`.
    pub fn detect(&self, blurred_gray: &Mat) -> Result<Mat> {
        let mut blotches = Mat::default();
        imgproc::adaptive_threshold(
            blurred_gray,
            &mut blotches,
            255.0,
            imgproc::ADAPTIVE_THRESH_GAUSSIAN_C,
            imgproc::THRESH_BINARY_INV,
            self.block_size,
            self.c,
        )?;
        Ok(blotches)
    }
}

/// Stateless scratch + stain detector chain. Frames can be handed to it in
/// any order.
pub struct DefectDetector {
    blur_kernel: i32,
    edges: EdgeDetector,
    blotches: AdaptiveRegionDetector,
}

impl DefectDetector {
    pub fn new(config: &DefectConfig) -> Self {
        Self {
            blur_kernel: config.blur_kernel,
            edges: EdgeDetector::new(config.canny_low, config.canny_high),
            blotches: AdaptiveRegionDetector::new(config.adaptive_block, config.adaptive_c),
        }
    }

    /// Gaussian blur shared by both detectors; sigma follows from the kernel size.
    pub fn blur(&self, gray: &Mat) -> Result<Mat> {
        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(
            gray,
            &mut blurred,
            Size::new(self.blur_kernel, self.blur_kernel),
            0.0,
        )?;
        Ok(blurred)
    }

    /// Returns scratches followed by stains for one grayscale frame.
    pub fn detect(&self, gray: &Mat) -> Result<Vec<Region>> {
        let blurred = self.blur(gray)?;

        let edge_map = self.edges.detect(&blurred)?;
        let mut found = regions::extract(&edge_map, RegionKind::Scratch)?;

        let blotch_map = self.blotches.detect(&blurred)?;
        found.extend(regions::extract(&blotch_map, RegionKind::Stain)?);

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Point, Rect, Scalar, CV_8UC1};
    use opencv::prelude::*;

    fn gray(value: f64) -> Mat {
        Mat::new_rows_cols_with_default(240, 320, CV_8UC1, Scalar::all(value)).unwrap()
    }

    fn count(kind: RegionKind, regions: &[Region]) -> usize {
        regions.iter().filter(|r| r.kind == kind).count()
    }

    #[test]
    fn test_uniform_surface_is_clean() {
        let detector = DefectDetector::new(&DefectConfig::default());
        let regions = detector.detect(&gray(180.0)).unwrap();
        assert!(regions.is_empty());
    }

    #[test]
    fn test_edge_map_is_binary() {
        let mut img = gray(200.0);
        imgproc::rectangle(
            &mut img,
            Rect::new(100, 80, 60, 40),
            Scalar::all(20.0),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let detector = DefectDetector::new(&DefectConfig::default());
        let edges = EdgeDetector::new(30.0, 120.0)
            .detect(&detector.blur(&img).unwrap())
            .unwrap();
        assert!(core::count_non_zero(&edges).unwrap() > 0);

        let mut strict = Mat::default();
        imgproc::threshold(&edges, &mut strict, 0.0, 255.0, imgproc::THRESH_BINARY).unwrap();
        let mut diff = Mat::default();
        core::absdiff(&edges, &strict, &mut diff).unwrap();
        assert_eq!(core::count_non_zero(&diff).unwrap(), 0);
    }

    #[test]
    fn test_adaptive_threshold_ignores_illumination_ramp() {
        let mut img = gray(0.0);
        for y in 0..240 {
            for x in 0..320 {
                *img.at_2d_mut::<u8>(y, x).unwrap() = (50 + x * 150 / 319) as u8;
            }
        }

        let detector = DefectDetector::new(&DefectConfig::default());
        let blotches = AdaptiveRegionDetector::new(11, 2.0)
            .detect(&detector.blur(&img).unwrap())
            .unwrap();
        assert_eq!(core::count_non_zero(&blotches).unwrap(), 0);
    }

    #[test]
    fn test_dark_blotch_is_a_stain() {
        let mut img = gray(200.0);
        imgproc::circle(
            &mut img,
            Point::new(160, 120),
            12,
            Scalar::all(90.0),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let detector = DefectDetector::new(&DefectConfig::default());
        let regions = detector.detect(&img).unwrap();
        assert!(count(RegionKind::Stain, &regions) >= 1);

        let stain = regions
            .iter()
            .find(|r| r.kind == RegionKind::Stain)
            .unwrap();
        assert!(stain.area > 200.0);
        assert!(stain.bbox.x <= 150 && stain.bbox.x + stain.bbox.w >= 170);
    }

    #[test]
    fn test_thin_line_is_one_scratch_and_no_stain() {
        let mut img = gray(200.0);
        imgproc::line(
            &mut img,
            Point::new(120, 120),
            Point::new(200, 120),
            Scalar::all(0.0),
            3,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let detector = DefectDetector::new(&DefectConfig::default());
        let regions = detector.detect(&img).unwrap();

        assert_eq!(count(RegionKind::Scratch, &regions), 1);
        assert_eq!(count(RegionKind::Stain, &regions), 0);

        let scratch = &regions[0];
        assert_eq!(scratch.label(), Some("Scratch"));
        assert!(scratch.bbox.x <= 120 && scratch.bbox.x + scratch.bbox.w >= 200);
        assert!(scratch.bbox.y <= 118 && scratch.bbox.y + scratch.bbox.h >= 122);
    }
}
