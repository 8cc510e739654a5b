//! Prompt templates for the chat-completions collaborator.

use crate::domain::{CandidateProgram, UNRELATED_MARKER};

/// Functions a candidate program may call, as shown to the model.
pub const BINDINGS_REFERENCE: &str = "\
record_ids() -> array of record ids
read_record(id) -> map parsed from the record's JSON
parse_json(text) -> value
table_names() -> array of lookup table names
read_table(name) -> array of row maps (column -> string)
lookup(table, column, value) -> array of matching rows
lookup_one(table, key_column, key, value_column) -> string
parse_datetime(text) -> unix seconds
format_date(secs) / format_datetime(secs) -> string
days_between(from_secs, to_secs) -> integer days";

pub fn system_prompt(entry_point: &str) -> String {
    format!(
        "You write Rhai scripts that answer questions about records.\n\
         Define exactly one function `fn {entry_point}()` taking no arguments that \
         returns the answer as a value (array, map, string, or number).\n\
         There is no file, network, or environment access. Use only these functions:\n\
         {BINDINGS_REFERENCE}\n\
         Reply with the script only, inside one ```rhai code fence.\n\
         If the question cannot be answered from the records, reply with `{UNRELATED_MARKER}`."
    )
}

pub fn generate_prompt(question: &str, schema_context: &str) -> String {
    format!(
        "Question:\n{question}\n\n\
         Data schema:\n{schema_context}\n\n\
         Write the script."
    )
}

pub fn repair_prompt(
    question: &str,
    failing_program: &CandidateProgram,
    failure_message: &str,
) -> String {
    format!(
        "The script below was written to answer this question:\n{question}\n\n\
         Script:\n```rhai\n{}\n```\n\n\
         It failed with:\n```\n{failure_message}\n```\n\n\
         Find the cause and reply with a corrected script. Keep the same entry point.",
        failing_program.source()
    )
}

pub fn review_prompt(question: &str, program: &CandidateProgram) -> String {
    format!(
        "Review this Rhai script for a data query. Do not run it.\n\n\
         Question:\n{question}\n\n\
         Script:\n```rhai\n{}\n```\n\n\
         Check that it plausibly reads records or tables for the question and returns a value.\n\
         Answer `VALID`, or `INVALID - ` followed by one sentence.",
        program.source()
    )
}

pub fn render_prompt(question: &str, data_text: &str) -> String {
    format!(
        "Answer the user's question from the retrieved data. Be brief and conversational.\n\
         If the data is empty, say that nothing matched.\n\n\
         Question:\n{question}\n\n\
         Retrieved data:\n```\n{data_text}\n```"
    )
}

pub fn render_failure_prompt(question: &str, summary: &str) -> String {
    format!(
        "The question below could not be answered because {summary}.\n\
         Explain this politely to a non-technical user in one or two sentences. \
         Do not guess an answer.\n\n\
         Question:\n{question}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names_entry_point_and_marker() {
        let p = system_prompt("run");
        assert!(p.contains("fn run()"));
        assert!(p.contains(UNRELATED_MARKER));
        assert!(p.contains("lookup_one"));
    }

    #[test]
    fn test_repair_prompt_carries_program_and_failure() {
        let program = CandidateProgram::new("fn run() { 1 / 0 }");
        let p = repair_prompt("how many?", &program, "Division by zero");
        assert!(p.contains("fn run() { 1 / 0 }"));
        assert!(p.contains("Division by zero"));
        assert!(p.contains("how many?"));
    }
}
