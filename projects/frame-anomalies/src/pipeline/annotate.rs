use crate::pipeline::types::Region;
use anyhow::Result;
use opencv::core::{Mat, Point, Rect};
use opencv::imgproc::{self, put_text, rectangle, FONT_HERSHEY_SIMPLEX, LINE_8};
use opencv::prelude::*;

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f64 = 0.5;
const LABEL_THICKNESS: i32 = 2;
/// Baseline offset of a label above its box
const LABEL_OFFSET: i32 = 10;

/// Returns a copy of `frame` with every region's box (and label, when the
/// region has one) drawn on it. `frame` is left untouched.
pub fn annotate(frame: &Mat, regions: &[Region]) -> Result<Mat> {
    let mut out = frame.try_clone()?;
    draw_regions(&mut out, regions)?;
    Ok(out)
}

/// Draws `regions` onto a frame the caller already owns.
pub fn draw_regions(canvas: &mut Mat, regions: &[Region]) -> Result<()> {
    for region in regions {
        let color = region.color();
        rectangle(
            canvas,
            Rect::from(region.bbox),
            color,
            BOX_THICKNESS,
            LINE_8,
            0,
        )?;

        if let Some(label) = region.label() {
            put_text(
                canvas,
                label,
                Point::new(region.bbox.x, region.bbox.y - LABEL_OFFSET),
                FONT_HERSHEY_SIMPLEX,
                LABEL_SCALE,
                color,
                LABEL_THICKNESS,
                imgproc::LINE_8,
                false,
            )?;
        }
    }
    Ok(())
}
