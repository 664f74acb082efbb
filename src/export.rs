//! CSV export of recovered sales.
//!
//! Writes `{label}_{YYYYMMDD_HHMMSS}.csv` (UTC) into the configured export
//! directory with the header `order_id,sku,quantity,created_at`. An empty
//! batch never produces a file, so an operator never sees a zero-row export
//! that looks like a failed one.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::SaleRecord;
use crate::traits::ExportSink;

#[derive(Serialize)]
struct ExportRow<'a> {
    order_id: &'a str,
    sku: Option<&'a str>,
    quantity: i64,
    created_at: String,
}

pub struct CsvExportSink {
    dir: PathBuf,
}

impl CsvExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a fresh file for `label`, suffixing `_N` if a file from the
    /// same second already exists.
    fn create_file(&self, label: &str) -> Result<(PathBuf, File)> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        for attempt in 0..100 {
            let name = if attempt == 0 {
                format!("{}_{}.csv", label, stamp)
            } else {
                format!("{}_{}_{}.csv", label, stamp, attempt)
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create {}", path.display()))
                }
            }
        }
        anyhow::bail!(
            "Could not find a free export file name for '{}' in {}",
            label,
            self.dir.display()
        )
    }
}

impl ExportSink for CsvExportSink {
    fn write(&self, records: &[SaleRecord], label: &str) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create export dir {}", self.dir.display()))?;

        let (path, file) = self.create_file(label)?;
        let mut writer = csv::Writer::from_writer(file);
        for record in records {
            writer.serialize(ExportRow {
                order_id: &record.order_id,
                sku: record.sku.as_deref(),
                quantity: record.quantity,
                created_at: record.created_at_text(),
            })?;
        }
        writer.flush()?;

        Ok(Some(path))
    }
}
