//! Tabular export of motion samples.
//!
//! CSV export writes every metric with four decimals. The display form
//! used by tables shows shoulder slope with one decimal and a degree sign.

use std::fmt::Write as _;
use std::path::Path;

use crate::sample::{Metric, MotionSample};

/// Header column for the frame index.
pub const FRAME_COLUMN: &str = "Frame";

/// Decimal places used for every metric in CSV output.
pub const CSV_PRECISION: usize = 4;

/// Default file name for CSV downloads.
pub const CSV_FILE_NAME: &str = "movement_data.csv";

/// The CSV header line (without newline).
pub fn csv_header() -> String {
    std::iter::once(FRAME_COLUMN)
        .chain(Metric::ALL.iter().map(|m| m.column_name()))
        .collect::<Vec<_>>()
        .join(",")
}

/// One CSV row (without newline).
pub fn csv_row(sample: &MotionSample) -> String {
    let mut row = sample.frame_index.to_string();
    for metric in Metric::ALL {
        let _ = write!(row, ",{:.*}", CSV_PRECISION, metric.value(sample));
    }
    row
}

/// Render samples as CSV: a header followed by one line per sample.
pub fn samples_to_csv(samples: &[MotionSample]) -> String {
    let mut out = csv_header();
    for sample in samples {
        out.push('\n');
        out.push_str(&csv_row(sample));
    }
    out
}

/// Write samples as CSV to `path`.
pub fn write_csv(path: &Path, samples: &[MotionSample]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, samples_to_csv(samples))
}

/// Display cells for one sample: frame index then every metric.
pub fn display_row(sample: &MotionSample) -> Vec<String> {
    let mut cells = Vec::with_capacity(Metric::ALL.len() + 1);
    cells.push(sample.frame_index.to_string());
    for metric in Metric::ALL {
        cells.push(format!(
            "{:.*}{}",
            metric.display_precision(),
            metric.value(sample),
            metric.unit_suffix()
        ));
    }
    cells
}
