//! Audit records for answered questions, with digest verification.
//!
//! Layout: `<dir>/<question_id>/audit.json` plus `audit.digest`, the
//! SHA-256 hex digest of the JSON bytes. Records keep programs and failure
//! categories; internal traces are dropped before writing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{CandidateProgram, FailureKind, QsError, Result};
use crate::interpreter::ResponsePayload;
use crate::repair::{FinalResult, LoopState, RepairLog};

const RECORD_FILE: &str = "audit.json";
const DIGEST_FILE: &str = "audit.digest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditAttempt {
    pub attempt_index: u32,
    pub kind: FailureKind,
    pub message: String,
    pub input_program: CandidateProgram,
    pub produced_program: Option<CandidateProgram>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub question_id: String,
    pub question: String,
    pub payload: ResponsePayload,
    /// Program that produced the answer, if any.
    pub final_program: Option<CandidateProgram>,
    pub repair_rounds: u32,
    pub attempts: Vec<AuditAttempt>,
    pub transitions: Vec<LoopState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(question: &str, log: &RepairLog, payload: &ResponsePayload) -> Self {
        let final_program = match &log.result {
            FinalResult::Executed { program, .. } => Some(program.clone()),
            FinalResult::Exhausted { .. } => None,
        };
        Self {
            question_id: log.question_id.clone(),
            question: question.to_string(),
            payload: payload.clone(),
            final_program,
            repair_rounds: log.result.repair_rounds(),
            attempts: log
                .attempts
                .iter()
                .map(|a| AuditAttempt {
                    attempt_index: a.attempt_index,
                    kind: a.failure.kind(),
                    message: a.failure.message().to_string(),
                    input_program: a.input_program.clone(),
                    produced_program: a.produced_program.clone(),
                })
                .collect(),
            transitions: log.transitions.clone(),
            started_at: log.started_at,
            finished_at: log.finished_at,
        }
    }
}

fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `<dir>/<question_id>/audit.json` and its digest.
pub fn write_audit_record(record: &AuditRecord, dir: &Path) -> Result<PathBuf> {
    let question_dir = dir.join(&record.question_id);
    std::fs::create_dir_all(&question_dir)?;

    let record_path = question_dir.join(RECORD_FILE);
    let json = serde_json::to_vec_pretty(record)?;
    std::fs::write(&record_path, &json)?;
    std::fs::write(question_dir.join(DIGEST_FILE), digest_hex(&json))?;

    Ok(record_path)
}

/// Read and verify `<dir>/<question_id>/audit.json`.
pub fn read_audit_record(question_id: &str, dir: &Path) -> Result<AuditRecord> {
    let question_dir = dir.join(question_id);
    let json = std::fs::read(question_dir.join(RECORD_FILE))?;
    let expected = std::fs::read_to_string(question_dir.join(DIGEST_FILE))?;
    let actual = digest_hex(&json);
    if expected.trim() != actual {
        return Err(QsError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExecutionFailure;
    use crate::interpreter::interpret;
    use crate::repair::{AttemptFailure, RepairAttempt, TerminalFailure};

    fn exhausted_log() -> RepairLog {
        let failure = AttemptFailure::Execution(
            ExecutionFailure::new(FailureKind::ResourceNotFound, "record 'bob' not found")
                .with_detail("in call to function 'run'"),
        );
        RepairLog {
            question_id: "q-42".into(),
            result: FinalResult::Exhausted {
                last_failure: TerminalFailure::from(&failure),
                repair_rounds: 0,
            },
            attempts: vec![RepairAttempt {
                attempt_index: 0,
                input_program: CandidateProgram::new(r#"fn run() { read_record("bob") }"#),
                failure,
                produced_program: None,
            }],
            transitions: vec![
                LoopState::Generated,
                LoopState::Validating,
                LoopState::Executing,
                LoopState::Exhausted,
            ],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_then_read_verifies_digest() {
        let dir = tempfile::tempdir().unwrap();
        let log = exhausted_log();
        let record = AuditRecord::new("where is bob?", &log, &interpret(&log.result));

        let path = write_audit_record(&record, dir.path()).unwrap();
        assert!(path.ends_with("q-42/audit.json"));
        let back = read_audit_record("q-42", dir.path()).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.attempts[0].kind, FailureKind::ResourceNotFound);
    }

    #[test]
    fn test_record_drops_internal_detail() {
        let dir = tempfile::tempdir().unwrap();
        let log = exhausted_log();
        let record = AuditRecord::new("where is bob?", &log, &interpret(&log.result));
        let path = write_audit_record(&record, dir.path()).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(!text.contains("in call to function"));
    }

    #[test]
    fn test_tampered_record_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let log = exhausted_log();
        let record = AuditRecord::new("q", &log, &interpret(&log.result));
        let path = write_audit_record(&record, dir.path()).unwrap();
        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("where", "WHERE")
            .replace("\"q\"", "\"Q\"");
        std::fs::write(&path, tampered).unwrap();

        let err = read_audit_record("q-42", dir.path()).unwrap_err();
        assert!(matches!(err, QsError::DigestMismatch { .. }));
    }
}
