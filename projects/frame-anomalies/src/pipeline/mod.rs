// Per-frame detectors and the driver that chains them

pub mod annotate;
pub mod background;
pub mod defects;
pub mod driver;
pub mod flow;
pub mod regions;
pub mod types;
