use crate::pipeline::types::{Region, RegionKind};
use anyhow::Result;
use opencv::core::{Mat, Point, Vector};
use opencv::imgproc;

/// Turns a binary mask into regions of `kind`.
///
/// Only outermost boundaries are considered; a component nested inside
/// another never produces its own region. A region survives when its
/// boundary-enclosed area strictly exceeds `kind.min_area()`. Output order is
/// the contour traversal order, which is fixed for a given mask.
pub fn extract(mask: &Mat, kind: RegionKind) -> Result<Vec<Region>> {
    extract_with_min_area(mask, kind, kind.min_area())
}

pub fn extract_with_min_area(mask: &Mat, kind: RegionKind, min_area: f64) -> Result<Vec<Region>> {
    let mut contours = Vector::<Vector<Point>>::new();
    imgproc::find_contours_def(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
    )?;

    let mut regions = Vec::new();
    for contour in contours.iter() {
        let area = imgproc::contour_area_def(&contour)?;
        if area <= min_area {
            continue;
        }
        let rect = imgproc::bounding_rect(&contour)?;
        regions.push(Region {
            bbox: rect.into(),
            area,
            kind,
        });
    }

    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::BBox;
    use opencv::core::{Rect, Scalar, CV_8UC1};

    fn blank() -> Mat {
        Mat::new_rows_cols_with_default(100, 120, CV_8UC1, Scalar::all(0.0)).unwrap()
    }

    fn fill(mask: &mut Mat, rect: Rect) {
        imgproc::rectangle(mask, rect, Scalar::all(255.0), -1, imgproc::LINE_8, 0).unwrap();
    }

    #[test]
    fn test_empty_mask_has_no_regions() {
        assert!(extract(&blank(), RegionKind::Motion).unwrap().is_empty());
    }

    #[test]
    fn test_small_components_are_dropped() {
        let mut mask = blank();
        fill(&mut mask, Rect::new(10, 10, 20, 20)); // area 19*19 = 361
        fill(&mut mask, Rect::new(70, 60, 10, 10)); // area 81

        let regions = extract(&mask, RegionKind::Motion).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].bbox,
            BBox {
                x: 10,
                y: 10,
                w: 20,
                h: 20
            }
        );
        assert_eq!(regions[0].area, 361.0);
        assert_eq!(regions[0].kind, RegionKind::Motion);
    }

    #[test]
    fn test_area_filter_is_strict() {
        // A filled w x h block encloses (w - 1) * (h - 1).
        let cases = [
            (RegionKind::Scratch, Rect::new(5, 5, 11, 6), Rect::new(5, 5, 12, 6)),
            (RegionKind::Stain, Rect::new(5, 5, 21, 11), Rect::new(5, 5, 22, 11)),
            (RegionKind::Motion, Rect::new(5, 5, 31, 11), Rect::new(5, 5, 32, 11)),
        ];

        for (kind, at_threshold, above_threshold) in cases {
            let mut mask = blank();
            fill(&mut mask, at_threshold);
            assert!(
                extract(&mask, kind).unwrap().is_empty(),
                "{:?} kept a region at its threshold",
                kind
            );

            let mut mask = blank();
            fill(&mut mask, above_threshold);
            assert_eq!(extract(&mask, kind).unwrap().len(), 1, "{:?}", kind);
        }
    }

    #[test]
    fn test_nested_components_are_ignored() {
        let mut mask = blank();
        imgproc::rectangle(
            &mut mask,
            Rect::new(20, 20, 60, 60),
            Scalar::all(255.0),
            1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        fill(&mut mask, Rect::new(40, 40, 20, 20));

        let regions = extract(&mask, RegionKind::Motion).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(Rect::from(regions[0].bbox), Rect::new(20, 20, 60, 60));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let mut mask = blank();
        fill(&mut mask, Rect::new(5, 5, 25, 25));
        fill(&mut mask, Rect::new(60, 50, 30, 30));

        let first = extract(&mask, RegionKind::Stain).unwrap();
        let second = extract(&mask, RegionKind::Stain).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}
