// Run artifact definitions
//
// Optional files written next to the annotated video: a per-region CSV report
// and a JSON summary of the whole run.

use crate::pipeline::driver::RunStats;
use crate::pipeline::types::{ProcessedFrame, RegionKind};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// One accepted region, as a row of the CSV report
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RegionRow {
    pub frame_index: usize,
    pub kind: RegionKind,
    pub label: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub area: f64,
}

impl RegionRow {
    pub fn from_frame(frame: &ProcessedFrame) -> Vec<Self> {
        frame
            .regions
            .iter()
            .map(|r| RegionRow {
                frame_index: frame.index,
                kind: r.kind,
                label: r.label().unwrap_or_default().to_string(),
                x: r.bbox.x,
                y: r.bbox.y,
                width: r.bbox.w,
                height: r.bbox.h,
                area: r.area,
            })
            .collect()
    }
}

/// Incremental CSV writer for region rows
pub struct RegionReport {
    writer: csv::Writer<File>,
    rows: usize,
}

impl RegionReport {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create region report {}", path.display()))?;
        tracing::info!("Writing region report to {:?}", path);
        Ok(Self { writer, rows: 0 })
    }

    pub fn record(&mut self, frame: &ProcessedFrame) -> Result<()> {
        for row in RegionRow::from_frame(frame) {
            self.writer.serialize(&row)?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Summary persisted as pretty JSON after a run
#[derive(Serialize, Debug, Clone)]
pub struct RunSummary {
    pub input: String,
    pub output: String,
    pub mode: String,
    pub frames_processed: usize,
    pub regions: BTreeMap<RegionKind, usize>,
    pub total_regions: usize,
    pub elapsed_secs: f64,
    pub completed_at: String,
}

impl RunSummary {
    pub fn from_stats(input: &str, output: &str, mode: &str, stats: &RunStats) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            mode: mode.to_string(),
            frames_processed: stats.frames_written,
            regions: stats.regions.clone(),
            total_regions: stats.regions.values().sum(),
            elapsed_secs: stats.duration.as_secs_f64(),
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
