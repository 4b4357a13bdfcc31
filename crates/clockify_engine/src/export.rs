//! Snapshot exports of fetched and derived datasets.
//!
//! Managers hand every dataset worth keeping to an [`ExportSink`]. Sinks never
//! fail the caller: problems are logged and the run carries on.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clockify_logging::{clk_debug, clk_warn};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::filename::export_filename;
use crate::persist::{PersistError, SnapshotDir};

pub const DEFAULT_EXPORT_DIR: &str = "Export";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer error: {0}")]
    CsvBuffer(String),
}

pub trait ExportSink: Send + Sync {
    fn export(&self, name: &str, dataset: &Value);
}

/// Serializes `data` and passes it to `sink`.
pub fn export_dataset<T: Serialize + ?Sized>(sink: &dyn ExportSink, name: &str, data: &T) {
    match serde_json::to_value(data) {
        Ok(value) => sink.export(name, &value),
        Err(err) => clk_warn!("Skipping export {name}: {err}"),
    }
}

/// Discards every dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExportSink;

impl ExportSink for NullExportSink {
    fn export(&self, name: &str, _dataset: &Value) {
        clk_debug!("Export {name} skipped");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub json: PathBuf,
    pub csv: Option<PathBuf>,
}

/// Writes each dataset as pretty JSON plus a flat CSV of its rows.
pub struct FileExportSink {
    snapshots: SnapshotDir,
    timestamped: bool,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshots: SnapshotDir::new(dir.into()),
            timestamped: true,
        }
    }

    /// Fixed file names; later exports of the same name replace earlier ones.
    pub fn without_timestamps(mut self) -> Self {
        self.timestamped = false;
        self
    }

    pub fn dir(&self) -> &Path {
        self.snapshots.dir()
    }

    pub fn write_both(&self, name: &str, dataset: &Value) -> Result<ExportedFiles, ExportError> {
        let stamp = self.timestamped.then(Utc::now);
        let json_name = export_filename(name, stamp, "json");
        let json = serde_json::to_vec_pretty(dataset)?;
        let rows = dataset_rows(dataset);
        if rows.is_empty() {
            return Ok(ExportedFiles {
                json: self.snapshots.write(&json_name, &json)?,
                csv: None,
            });
        }

        let csv_name = export_filename(name, stamp, "csv");
        let csv = rows_to_csv(&rows)?;
        self.snapshots.write_group(&[
            (json_name.as_str(), json.as_slice()),
            (csv_name.as_str(), csv.as_slice()),
        ])?;
        Ok(ExportedFiles {
            json: self.snapshots.dir().join(json_name),
            csv: Some(self.snapshots.dir().join(csv_name)),
        })
    }
}

impl ExportSink for FileExportSink {
    fn export(&self, name: &str, dataset: &Value) {
        match self.write_both(name, dataset) {
            Ok(files) => clk_debug!("Exported {name} to {:?}", files.json),
            Err(err) => clk_warn!("Export {name} failed: {err}"),
        }
    }
}

/// Rows of a dataset: an array, the `items` array of an object, or the object itself.
pub fn dataset_rows(dataset: &Value) -> Vec<Map<String, Value>> {
    let items: Vec<&Value> = match dataset {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![dataset],
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => map.clone(),
            other => {
                let mut row = Map::new();
                row.insert("value".to_string(), other.clone());
                row
            }
        })
        .collect()
}

/// CSV over the union of row keys, in first-seen order. Nested values are
/// written as compact JSON.
pub fn rows_to_csv(rows: &[Map<String, Value>]) -> Result<Vec<u8>, ExportError> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| row.get(*column).map(cell_text).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::CsvBuffer(err.to_string()))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        nested => nested.to_string(),
    }
}
