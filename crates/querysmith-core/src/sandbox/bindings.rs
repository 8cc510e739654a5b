//! Read-only data bindings injected into the sandbox.
//!
//! Every binding resolves against the [`ExecutionContext`] only. Failures
//! are raised into the script as a [`BindingFault`] so the classifier can
//! recover the exact kind after the run.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use rhai::{Dynamic, Engine, EvalAltResult, Position};
use serde_json::Value;

use crate::domain::{ExecutionContext, FailureKind};

use super::capability::{Capability, CapabilityTable};

const RECORD_EXTENSION: &str = "json";
const SECONDS_PER_DAY: i64 = 86_400;

/// A typed data-access failure raised inside the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingFault {
    pub kind: FailureKind,
    pub message: String,
}

impl BindingFault {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn into_rhai(self) -> Box<EvalAltResult> {
        EvalAltResult::ErrorRuntime(Dynamic::from(self), Position::NONE).into()
    }
}

impl std::fmt::Display for BindingFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A parsed CSV lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl TableData {
    fn require_column(&self, table: &str, column: &str) -> Result<(), BindingFault> {
        if self.headers.iter().any(|h| h == column) {
            Ok(())
        } else {
            Err(BindingFault::new(
                FailureKind::MissingField,
                format!("table '{table}' has no column '{column}'"),
            ))
        }
    }
}

/// Data access confined to one execution context.
#[derive(Debug, Clone)]
pub struct DataSources {
    ctx: ExecutionContext,
}

impl DataSources {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Ids of every record in the record directory, sorted.
    pub fn record_ids(&self) -> Result<Vec<String>, BindingFault> {
        let entries = std::fs::read_dir(&self.ctx.record_dir).map_err(|_| {
            BindingFault::new(
                FailureKind::ResourceNotFound,
                "record directory is not available",
            )
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Load and parse one record by id (`abc` or `abc.json`).
    pub fn read_record(&self, id: &str) -> Result<Value, BindingFault> {
        let path = self.resolve_record(id)?;
        let text = std::fs::read_to_string(&path).map_err(|_| {
            BindingFault::new(
                FailureKind::ResourceNotFound,
                format!("record '{id}' could not be read"),
            )
        })?;
        serde_json::from_str(&text).map_err(|e| {
            BindingFault::new(
                FailureKind::MalformedData,
                format!("record '{id}' is not valid JSON: {e}"),
            )
        })
    }

    fn resolve_record(&self, id: &str) -> Result<PathBuf, BindingFault> {
        let out_of_bounds = || {
            BindingFault::new(
                FailureKind::ResourceNotFound,
                format!("record id '{id}' is not a bare record name"),
            )
        };

        if id.trim().is_empty() || id.contains('/') || id.contains('\\') {
            return Err(out_of_bounds());
        }
        let file_name = if Path::new(id).extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
            id.to_string()
        } else {
            format!("{id}.{RECORD_EXTENSION}")
        };
        let mut components = Path::new(&file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(out_of_bounds()),
        }

        let candidate = self.ctx.record_dir.join(&file_name);
        if !candidate.is_file() {
            return Err(BindingFault::new(
                FailureKind::ResourceNotFound,
                format!("record '{id}' not found"),
            ));
        }

        // Symlinks must not lead outside the record directory.
        let root = self
            .ctx
            .record_dir
            .canonicalize()
            .map_err(|_| out_of_bounds())?;
        let resolved = candidate.canonicalize().map_err(|_| out_of_bounds())?;
        if !resolved.starts_with(&root) {
            return Err(out_of_bounds());
        }
        Ok(resolved)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.ctx.table_names().map(str::to_string).collect()
    }

    /// Parse a bound lookup table.
    pub fn read_table(&self, name: &str) -> Result<TableData, BindingFault> {
        let path = self.ctx.table_path(name).ok_or_else(|| {
            BindingFault::new(
                FailureKind::ResourceNotFound,
                format!("no lookup table named '{name}'"),
            )
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|_| {
                BindingFault::new(
                    FailureKind::ResourceNotFound,
                    format!("lookup table '{name}' could not be opened"),
                )
            })?;

        let malformed = |e: csv::Error| {
            BindingFault::new(
                FailureKind::EmptyInput,
                format!("lookup table '{name}' is improperly formatted: {e}"),
            )
        };

        let headers: Vec<String> = reader
            .headers()
            .map_err(malformed)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(BindingFault::new(
                FailureKind::EmptyInput,
                format!("lookup table '{name}' is empty"),
            ));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(malformed)?;
            let row = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            rows.push(row);
        }
        Ok(TableData { headers, rows })
    }

    /// Every row of `table` whose `column` equals `value`.
    pub fn lookup(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<BTreeMap<String, String>>, BindingFault> {
        let data = self.read_table(table)?;
        data.require_column(table, column)?;
        Ok(data
            .rows
            .into_iter()
            .filter(|row| row.get(column).map(String::as_str) == Some(value))
            .collect())
    }

    /// `value_column` of the first row whose `key_column` equals `key`.
    pub fn lookup_one(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
        value_column: &str,
    ) -> Result<String, BindingFault> {
        let data = self.read_table(table)?;
        data.require_column(table, key_column)?;
        data.require_column(table, value_column)?;
        data.rows
            .iter()
            .find(|row| row.get(key_column).map(String::as_str) == Some(key))
            .and_then(|row| row.get(value_column).cloned())
            .ok_or_else(|| {
                BindingFault::new(
                    FailureKind::ResourceNotFound,
                    format!("no entry '{key}' in column '{key_column}' of table '{table}'"),
                )
            })
    }
}

/// Parse JSON text supplied by the script.
pub fn parse_json(text: &str) -> Result<Value, BindingFault> {
    serde_json::from_str(text).map_err(|e| {
        BindingFault::new(FailureKind::MalformedData, format!("invalid JSON text: {e}"))
    })
}

/// Parse a date or timestamp into unix seconds (UTC).
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, and
/// `YYYY-MM-DD`.
pub fn parse_datetime(text: &str) -> Result<i64, BindingFault> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc().timestamp());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc().timestamp());
        }
    }
    Err(BindingFault::new(
        FailureKind::MalformedData,
        format!("'{text}' is not a recognised date or timestamp"),
    ))
}

pub fn format_date(secs: i64) -> Result<String, BindingFault> {
    timestamp(secs).map(|dt| dt.format("%Y-%m-%d").to_string())
}

pub fn format_datetime(secs: i64) -> Result<String, BindingFault> {
    timestamp(secs).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Whole days from `from` to `to`, rounded toward negative infinity.
pub fn days_between(from: i64, to: i64) -> i64 {
    // Widened so any pair of timestamps is valid; the day count always fits in i64.
    let days = (i128::from(to) - i128::from(from)).div_euclid(i128::from(SECONDS_PER_DAY));
    days as i64
}

fn timestamp(secs: i64) -> Result<DateTime<chrono::Utc>, BindingFault> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        BindingFault::new(
            FailureKind::MalformedData,
            format!("timestamp {secs} is out of range"),
        )
    })
}

fn to_dynamic<T: serde::Serialize>(value: T) -> Result<Dynamic, Box<EvalAltResult>> {
    rhai::serde::to_dynamic(value)
}

/// Register the data-access and date bindings allowed by `table`.
pub(crate) fn register(engine: &mut Engine, table: &CapabilityTable, sources: Arc<DataSources>) {
    if table.allows(Capability::Dates) {
        engine.register_fn("parse_datetime", |text: &str| {
            parse_datetime(text).map_err(BindingFault::into_rhai)
        });
        engine.register_fn("format_date", |secs: i64| {
            format_date(secs).map_err(BindingFault::into_rhai)
        });
        engine.register_fn("format_datetime", |secs: i64| {
            format_datetime(secs).map_err(BindingFault::into_rhai)
        });
        engine.register_fn("days_between", days_between);
    }

    if table.allows(Capability::Records) {
        let src = sources.clone();
        engine.register_fn("record_ids", move || {
            src.record_ids().map_err(BindingFault::into_rhai).and_then(to_dynamic)
        });
        let src = sources.clone();
        engine.register_fn("read_record", move |id: &str| {
            src.read_record(id).map_err(BindingFault::into_rhai).and_then(to_dynamic)
        });
        engine.register_fn("parse_json", |text: &str| {
            parse_json(text).map_err(BindingFault::into_rhai).and_then(to_dynamic)
        });
    }

    if table.allows(Capability::Tables) {
        let src = sources.clone();
        engine.register_fn("table_names", move || to_dynamic(src.table_names()));
        let src = sources.clone();
        engine.register_fn("read_table", move |name: &str| {
            src.read_table(name)
                .map_err(BindingFault::into_rhai)
                .and_then(|data| to_dynamic(data.rows))
        });
        let src = sources.clone();
        engine.register_fn("lookup", move |table: &str, column: &str, value: &str| {
            src.lookup(table, column, value)
                .map_err(BindingFault::into_rhai)
                .and_then(to_dynamic)
        });
        let src = sources;
        engine.register_fn(
            "lookup_one",
            move |table: &str, key_column: &str, key: &str, value_column: &str| {
                src.lookup_one(table, key_column, key, value_column)
                    .map_err(BindingFault::into_rhai)
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, DataSources) {
        let dir = tempdir().unwrap();
        let records = dir.path().join("records");
        std::fs::create_dir(&records).unwrap();
        std::fs::write(
            records.join("alice_at_example_com.json"),
            r#"{"email": "alice@example.com", "conversations": []}"#,
        )
        .unwrap();
        std::fs::write(records.join("broken.json"), "{not json").unwrap();
        std::fs::write(records.join("notes.txt"), "ignored").unwrap();

        let links = dir.path().join("links.csv");
        std::fs::write(
            &links,
            "email,file\nalice@example.com,alice_at_example_com.json\n",
        )
        .unwrap();
        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();
        let ragged = dir.path().join("ragged.csv");
        std::fs::write(&ragged, "a,b\n1,2,3\n").unwrap();

        let ctx = ExecutionContext::new(&records)
            .with_table("links", &links)
            .with_table("empty", &empty)
            .with_table("ragged", &ragged)
            .with_table("gone", dir.path().join("gone.csv"));
        (dir, DataSources::new(ctx))
    }

    #[test]
    fn test_record_ids_lists_json_stems_sorted() {
        let (_dir, src) = fixture();
        assert_eq!(
            src.record_ids().unwrap(),
            vec!["alice_at_example_com".to_string(), "broken".to_string()]
        );
    }

    #[test]
    fn test_read_record_with_and_without_extension() {
        let (_dir, src) = fixture();
        let a = src.read_record("alice_at_example_com").unwrap();
        let b = src.read_record("alice_at_example_com.json").unwrap();
        assert_eq!(a, b);
        assert_eq!(a["email"], "alice@example.com");
    }

    #[test]
    fn test_read_record_missing_is_resource_not_found() {
        let (_dir, src) = fixture();
        let fault = src.read_record("nobody").unwrap_err();
        assert_eq!(fault.kind, FailureKind::ResourceNotFound);
    }

    #[test]
    fn test_read_record_malformed() {
        let (_dir, src) = fixture();
        let fault = src.read_record("broken").unwrap_err();
        assert_eq!(fault.kind, FailureKind::MalformedData);
    }

    #[test]
    fn test_read_record_rejects_path_escape() {
        let (_dir, src) = fixture();
        for id in ["../links.csv", "/etc/passwd", "..", "a/b", "..\\x", ""] {
            let fault = src.read_record(id).unwrap_err();
            assert_eq!(fault.kind, FailureKind::ResourceNotFound, "id {id:?}");
        }
    }

    #[test]
    fn test_fault_messages_do_not_leak_paths() {
        let (dir, src) = fixture();
        let shown = dir.path().display().to_string();
        for fault in [
            src.read_record("nobody").unwrap_err(),
            src.read_table("gone").unwrap_err(),
            src.read_table("unbound").unwrap_err(),
        ] {
            assert!(!fault.message.contains(&shown), "{}", fault.message);
        }
    }

    #[test]
    fn test_read_table_rows() {
        let (_dir, src) = fixture();
        let data = src.read_table("links").unwrap();
        assert_eq!(data.headers, vec!["email", "file"]);
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.rows[0]["file"], "alice_at_example_com.json");
    }

    #[test]
    fn test_read_table_failures() {
        let (_dir, src) = fixture();
        assert_eq!(
            src.read_table("unbound").unwrap_err().kind,
            FailureKind::ResourceNotFound
        );
        assert_eq!(
            src.read_table("gone").unwrap_err().kind,
            FailureKind::ResourceNotFound
        );
        assert_eq!(src.read_table("empty").unwrap_err().kind, FailureKind::EmptyInput);
        assert_eq!(src.read_table("ragged").unwrap_err().kind, FailureKind::EmptyInput);
    }

    #[test]
    fn test_lookup_and_lookup_one() {
        let (_dir, src) = fixture();
        let rows = src.lookup("links", "email", "alice@example.com").unwrap();
        assert_eq!(rows.len(), 1);
        assert!(src.lookup("links", "email", "bob@example.com").unwrap().is_empty());

        let file = src
            .lookup_one("links", "email", "alice@example.com", "file")
            .unwrap();
        assert_eq!(file, "alice_at_example_com.json");

        let fault = src
            .lookup_one("links", "email", "bob@example.com", "file")
            .unwrap_err();
        assert_eq!(fault.kind, FailureKind::ResourceNotFound);

        let fault = src.lookup("links", "phone", "x").unwrap_err();
        assert_eq!(fault.kind, FailureKind::MissingField);
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(parse_datetime("2023-01-01T10:00:00Z").unwrap(), 1_672_567_200);
        assert_eq!(parse_datetime("2023-01-01 10:00:00").unwrap(), 1_672_567_200);
        assert_eq!(parse_datetime("2023-01-01").unwrap(), 1_672_531_200);
        assert_eq!(
            parse_datetime("yesterday").unwrap_err().kind,
            FailureKind::MalformedData
        );
    }

    #[test]
    fn test_format_and_days_between() {
        assert_eq!(format_date(1_672_567_200).unwrap(), "2023-01-01");
        assert_eq!(format_datetime(1_672_567_200).unwrap(), "2023-01-01T10:00:00Z");
        assert_eq!(days_between(1_672_531_200, 1_672_531_200 + 3 * 86_400), 3);
        assert!(format_date(i64::MAX).is_err());
    }

    #[test]
    fn test_days_between_extremes_do_not_overflow() {
        assert_eq!(days_between(i64::MIN, i64::MAX), 213_503_982_334_601);
        assert_eq!(days_between(i64::MAX, i64::MIN), -213_503_982_334_602);
        assert_eq!(days_between(86_399, 0), -1);
    }

    #[test]
    fn test_parse_json() {
        assert_eq!(parse_json("[1,2]").unwrap(), serde_json::json!([1, 2]));
        assert_eq!(parse_json("{").unwrap_err().kind, FailureKind::MalformedData);
    }
}
