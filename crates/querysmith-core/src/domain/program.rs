//! Candidate programs produced by the code-generation collaborator.

use serde::{Deserialize, Serialize};

/// Marker a code generator emits when the question cannot be answered
/// from the available data.
pub const UNRELATED_MARKER: &str = "unrelated_answer";

/// One attempt at a query-answering routine.
///
/// Holds source text only. Nothing about a candidate is evaluated until the
/// validator has accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateProgram {
    source: String,
}

impl CandidateProgram {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Normalise a raw model reply into a program.
    ///
    /// A fenced block (```` ```rhai ````, ```` ```rust ```` or a bare fence)
    /// is unwrapped; otherwise the whole reply is used. Returns `None` when
    /// nothing but whitespace remains.
    pub fn from_model_response(response: &str) -> Option<Self> {
        let body = extract_fenced_block(response).unwrap_or(response).trim();
        if body.is_empty() {
            None
        } else {
            Some(Self::new(body))
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }

    /// Whether the generator declined the question instead of writing code.
    pub fn is_unrelated_marker(&self) -> bool {
        self.source.contains(UNRELATED_MARKER)
    }

    /// First `max_chars` characters, for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.source.chars().take(max_chars).collect();
        if self.source.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

impl std::fmt::Display for CandidateProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn extract_fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // The rest of the opening line is the language tag.
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = body.find("```").unwrap_or(body.len());
    Some(&body[..close])
}
