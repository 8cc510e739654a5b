//! Execution context: the fixed set of data sources a sandboxed run may see.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{QsError, Result};

/// Caller-supplied resource locators for one pipeline run.
///
/// Candidate programs never see these paths. They reach the data only
/// through the bindings the sandbox injects, which resolve against this
/// context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Directory holding one `<id>.json` file per entity.
    pub record_dir: PathBuf,
    /// Named CSV lookup tables.
    #[serde(default)]
    pub lookup_tables: BTreeMap<String, PathBuf>,
}

impl ExecutionContext {
    pub fn new(record_dir: impl Into<PathBuf>) -> Self {
        Self {
            record_dir: record_dir.into(),
            lookup_tables: BTreeMap::new(),
        }
    }

    /// Bind a lookup table under `name` (builder pattern).
    pub fn with_table(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.lookup_tables.insert(name.into(), path.into());
        self
    }

    pub fn table_path(&self, name: &str) -> Option<&Path> {
        self.lookup_tables.get(name).map(PathBuf::as_path)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.lookup_tables.keys().map(String::as_str)
    }

    /// Check that every locator is absolute and exists.
    pub fn validate(&self) -> Result<()> {
        require_absolute_existing(&self.record_dir)?;
        if !self.record_dir.is_dir() {
            return Err(QsError::InvalidContext(format!(
                "record directory is not a directory: {}",
                self.record_dir.display()
            )));
        }
        for (name, path) in &self.lookup_tables {
            if name.trim().is_empty() {
                return Err(QsError::InvalidContext(
                    "lookup table name must not be empty".to_string(),
                ));
            }
            require_absolute_existing(path)?;
        }
        Ok(())
    }

    /// Replace every context path in `text` with a placeholder.
    pub fn redact(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        for (name, path) in &self.lookup_tables {
            let shown = path.display().to_string();
            if !shown.is_empty() {
                redacted = redacted.replace(&shown, &format!("<table:{name}>"));
            }
        }
        let records = self.record_dir.display().to_string();
        if !records.is_empty() {
            redacted = redacted.replace(&records, "<records>");
        }
        redacted
    }
}

fn require_absolute_existing(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(QsError::RelativePath(path.to_path_buf()));
    }
    if !path.exists() {
        return Err(QsError::MissingPath(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_accepts_existing_absolute_paths() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("links.csv");
        std::fs::write(&table, "email,file\n").unwrap();

        let ctx = ExecutionContext::new(dir.path()).with_table("links", &table);
        ctx.validate().unwrap();
        assert_eq!(ctx.table_names().collect::<Vec<_>>(), vec!["links"]);
    }

    #[test]
    fn test_validate_rejects_relative_record_dir() {
        let ctx = ExecutionContext::new("relative/records");
        assert!(matches!(ctx.validate(), Err(QsError::RelativePath(_))));
    }

    #[test]
    fn test_validate_rejects_missing_table() {
        let dir = tempdir().unwrap();
        let ctx = ExecutionContext::new(dir.path()).with_table("links", dir.path().join("nope.csv"));
        assert!(matches!(ctx.validate(), Err(QsError::MissingPath(_))));
    }

    #[test]
    fn test_validate_rejects_file_as_record_dir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not_a_dir.json");
        std::fs::write(&file, "{}").unwrap();
        let ctx = ExecutionContext::new(&file);
        assert!(matches!(ctx.validate(), Err(QsError::InvalidContext(_))));
    }

    #[test]
    fn test_redact_replaces_paths() {
        let ctx = ExecutionContext::new("/srv/data/records").with_table("links", "/srv/data/links.csv");
        let text = "failed at /srv/data/records/a.json and /srv/data/links.csv";
        let redacted = ctx.redact(text);
        assert_eq!(redacted, "failed at <records>/a.json and <table:links>");
    }
}
