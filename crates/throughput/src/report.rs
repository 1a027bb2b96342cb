use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use crate::error::ReportError;
use crate::stats::RunStatistics;

/// Append `stats` as one compact JSON line, creating the log if needed.
pub fn append_report(path: &Path, stats: &RunStatistics) -> Result<(), ReportError> {
    let mut line = serde_json::to_string(stats)?;
    line.push('\n');

    let io_err = |source: io::Error| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(line.as_bytes()).map_err(io_err)?;
    info!(path = %path.display(), "run_report_appended");
    Ok(())
}

/// Read every run recorded in a results log. Blank lines are ignored.
pub fn read_reports(path: &Path) -> Result<Vec<RunStatistics>, ReportError> {
    let contents = fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| ReportError::Decode {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })
        })
        .collect()
}
