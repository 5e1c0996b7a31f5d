//! Demo detection-results CSV.
//!
//! The file is a fixed artifact rather than session data; downstream tools
//! only rely on its header.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const EXPORT_FILE_NAME: &str = "detection_results.csv";
pub const HEADER: [&str; 5] = ["Time(ms)", "Channel1", "Channel2", "Channel3", "Detection"];

const ROWS: [[&str; 5]; 3] = [
    ["0", "0.1", "0.2", "0.3", "0"],
    ["1", "0.2", "0.3", "0.4", "0"],
    ["2", "0.8", "0.9", "1.0", "1"],
];

fn write_rows<W: std::io::Write>(w: &mut csv::Writer<W>) -> Result<()> {
    w.write_record(HEADER).context("write CSV header")?;
    for row in ROWS {
        w.write_record(row).context("write CSV row")?;
    }
    w.flush().context("flush CSV")?;
    Ok(())
}

#[cfg(test)]
pub fn demo_csv() -> Result<String> {
    let mut w = csv::Writer::from_writer(Vec::new());
    write_rows(&mut w)?;
    let bytes = w
        .into_inner()
        .map_err(|e| anyhow::anyhow!("finish CSV buffer: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV is not UTF-8")
}

/// Write the demo CSV to `path`, creating parent directories as needed.
pub fn export_csv(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    write_rows(&mut w)
}

/// Export into `dir` under the standard file name and return the full path.
pub fn export_into(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(EXPORT_FILE_NAME);
    export_csv(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_stable() {
        let csv = demo_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Time(ms),Channel1,Channel2,Channel3,Detection")
        );
        assert_eq!(lines.last(), Some("2,0.8,0.9,1.0,1"));
    }

    #[test]
    fn writes_file_into_directory() {
        let dir = std::env::temp_dir().join(format!("sawtooth-export-{}", std::process::id()));
        let path = export_into(&dir).unwrap();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(EXPORT_FILE_NAME));
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, demo_csv().unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
