//! Benchmark result output.
//!
//! Records are appended to the output file as JSON lines, one per entry,
//! so a crashed run still leaves every completed measurement on disk.

use crate::runner::BenchRecord;
use phiva_core::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Appends benchmark records to a JSON-lines file.
pub struct ResultSink {
    file: File,
    path: PathBuf,
}

impl ResultSink {
    /// Opens the sink, creating the file if needed and appending otherwise.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Writes one record and flushes it to disk.
    pub fn append(&mut self, record: &BenchRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    /// The output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");

        let mut sink = ResultSink::open(&path).unwrap();
        sink.append(&BenchRecord::completed(0, "a.jpg", 12, "reply one"))
            .unwrap();
        sink.append(&BenchRecord::skipped(1, "missing.jpg")).unwrap();
        drop(sink);

        let file = std::fs::File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        let first: BenchRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.response, "reply one");
        assert!(!first.skipped);

        let second: BenchRecord = serde_json::from_str(&lines[1]).unwrap();
        assert!(second.skipped);
    }
}
