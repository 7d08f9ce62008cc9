use opencv::core::{Mat, Rect, Scalar};
use serde::Serialize;

/// Which detector produced a region. Selects the area filter, the label and
/// the draw color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Motion,
    Scratch,
    Stain,
}

impl RegionKind {
    /// Minimum contour area (exclusive) a region must exceed to be kept.
    pub fn min_area(self) -> f64 {
        match self {
            RegionKind::Motion => 300.0,
            RegionKind::Scratch => 50.0,
            RegionKind::Stain => 200.0,
        }
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            RegionKind::Motion => None,
            RegionKind::Scratch => Some("Scratch"),
            RegionKind::Stain => Some("Stain"),
        }
    }

    /// BGR draw color.
    pub fn color(self) -> Scalar {
        match self {
            RegionKind::Motion => Scalar::new(0.0, 0.0, 255.0, 0.0),  // Red
            RegionKind::Scratch => Scalar::new(0.0, 255.0, 0.0, 0.0), // Green
            RegionKind::Stain => Scalar::new(0.0, 0.0, 255.0, 0.0),   // Red
        }
    }
}

/// Pixel-space bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl From<Rect> for BBox {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            w: r.width,
            h: r.height,
        }
    }
}

impl From<BBox> for Rect {
    fn from(b: BBox) -> Self {
        Rect::new(b.x, b.y, b.w, b.h)
    }
}

/// A candidate anomaly accepted by the area filter. Regions carry no identity
/// across frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub bbox: BBox,
    pub area: f64,
    pub kind: RegionKind,
}

impl Region {
    pub fn label(&self) -> Option<&'static str> {
        self.kind.label()
    }

    pub fn color(&self) -> Scalar {
        self.kind.color()
    }
}

/// Output of one driver iteration
pub struct ProcessedFrame {
    pub index: usize,
    pub regions: Vec<Region>,
    pub annotated: Mat,
    /// True when the optical-flow overlay was blended into `annotated`.
    pub flow_applied: bool,
}
