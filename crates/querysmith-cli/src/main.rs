//! querysmith - guarded code generation for data questions
//!
//! ## Commands
//!
//! - `validate`: Parse a candidate program without running it
//! - `exec`: Run a candidate program in the sandbox against local data
//! - `ask`: Generate, repair, and run a program for a question via a chat model
//! - `audit`: Verify and print a stored audit record

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

use querysmith_core::{
    read_audit_record, CandidateProgram, ChatCompletionsClient, ExecutionContext, Pipeline,
    PipelineError, QuerysmithConfig, SandboxExecutor, SyntaxValidator,
};

#[derive(Parser)]
#[command(name = "querysmith")]
#[command(version = querysmith_core::VERSION)]
#[command(about = "Answer data questions with generated, sandboxed query programs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "QUERYSMITH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Data sources shared by `exec` and `ask`.
#[derive(clap::Args)]
struct DataArgs {
    /// Directory of per-entity JSON records
    #[arg(long)]
    records: PathBuf,

    /// Lookup table binding, NAME=PATH (repeatable)
    #[arg(long = "table", value_parser = parse_table_binding)]
    tables: Vec<(String, PathBuf)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a candidate program's syntax without running it
    Validate {
        /// Program file (Rhai source)
        program: PathBuf,
    },

    /// Run a candidate program in the sandbox and print the outcome
    Exec {
        /// Program file (Rhai source)
        program: PathBuf,

        #[command(flatten)]
        data: DataArgs,
    },

    /// Answer a question end to end
    Ask {
        /// The question, in plain language
        question: String,

        #[command(flatten)]
        data: DataArgs,

        /// File describing the record and table layout for the model
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Print the interpreted payload instead of a rendered answer
        #[arg(long)]
        no_render: bool,
    },

    /// Verify and print a stored audit record
    Audit {
        /// Question ID of the record
        question_id: String,

        /// Audit directory (default: from config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    querysmith_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { program } => cmd_validate(&config, &program),
        Commands::Exec { program, data } => cmd_exec(&config, &program, &data).await,
        Commands::Ask {
            question,
            data,
            schema,
            no_render,
        } => cmd_ask(&config, &question, &data, schema.as_deref(), no_render).await,
        Commands::Audit { question_id, dir } => cmd_audit(&config, &question_id, dir),
    }
}

fn load_config(path: Option<&Path>) -> Result<QuerysmithConfig> {
    let config = match path {
        Some(path) => QuerysmithConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => QuerysmithConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid QUERYSMITH_* environment override")
}

fn parse_table_binding(raw: &str) -> std::result::Result<(String, PathBuf), String> {
    let (name, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("table name is empty in '{raw}'"));
    }
    Ok((name.to_string(), PathBuf::from(path.trim())))
}

/// Resolve CLI paths to the absolute, existing form the core requires.
fn build_context(data: &DataArgs) -> Result<ExecutionContext> {
    let records = std::fs::canonicalize(&data.records)
        .with_context(|| format!("Record directory not found: {:?}", data.records))?;
    let mut ctx = ExecutionContext::new(records);
    for (name, path) in &data.tables {
        let path = std::fs::canonicalize(path)
            .with_context(|| format!("Lookup table '{}' not found: {:?}", name, path))?;
        ctx = ctx.with_table(name.clone(), path);
    }
    ctx.validate().context("Invalid execution context")?;
    Ok(ctx)
}

fn read_program(path: &Path) -> Result<CandidateProgram> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read program {:?}", path))?;
    Ok(CandidateProgram::new(source))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel `token` on Ctrl-C so in-flight runs are aborted cleanly.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

fn cmd_validate(config: &QuerysmithConfig, program: &Path) -> Result<()> {
    let program = read_program(program)?;
    let verdict = SyntaxValidator::new(config.sandbox.clone()).validate(&program);
    print_json(&verdict)?;
    if !verdict.valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_exec(config: &QuerysmithConfig, program: &Path, data: &DataArgs) -> Result<()> {
    let program = read_program(program)?;
    let ctx = build_context(data)?;

    let verdict = SyntaxValidator::new(config.sandbox.clone()).validate(&program);
    if !verdict.valid {
        print_json(&verdict)?;
        std::process::exit(1);
    }

    let executor = SandboxExecutor::new(config.sandbox.clone())
        .with_entry_point(config.entry_point.clone());
    let outcome = executor
        .execute_cancellable(&program, &ctx, &cancel_on_ctrl_c())
        .await
        .context("Sandbox execution did not complete")?;
    print_json(&outcome)?;
    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_ask(
    config: &QuerysmithConfig,
    question: &str,
    data: &DataArgs,
    schema: Option<&Path>,
    no_render: bool,
) -> Result<()> {
    let ctx = build_context(data)?;
    let schema_context = match schema {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema {:?}", path))?,
        None => String::new(),
    };

    let client = Arc::new(
        ChatCompletionsClient::new(config.model.clone(), config.entry_point.clone())
            .context("Failed to create model client")?,
    );
    let mut pipeline = Pipeline::new(client.clone(), config).with_reviewer(client.clone());
    if !no_render {
        pipeline = pipeline.with_renderer(client);
    }

    let answer = match pipeline
        .answer(question, &schema_context, &ctx, &cancel_on_ctrl_c())
        .await
    {
        Ok(answer) => answer,
        Err(PipelineError::Cancelled) => anyhow::bail!("Cancelled"),
        Err(e) => return Err(e).context("Question could not be processed"),
    };

    info!(
        question_id = %answer.question_id,
        repair_rounds = answer.log.result.repair_rounds(),
        "question finished"
    );
    if let Some(path) = &answer.audit_path {
        info!("Audit record written to {:?}", path);
    }

    match answer.rendered {
        Some(text) => println!("{}", text),
        None => print_json(&answer.payload)?,
    }
    Ok(())
}

fn cmd_audit(config: &QuerysmithConfig, question_id: &str, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir
        .or_else(|| config.audit_dir.clone())
        .context("No audit directory: pass --dir or set audit_dir in config")?;
    let record = read_audit_record(question_id, &dir)
        .with_context(|| format!("Failed to verify audit record {}", question_id))?;
    print_json(&record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_binding() {
        assert_eq!(
            parse_table_binding("links=/data/links.csv").unwrap(),
            ("links".to_string(), PathBuf::from("/data/links.csv"))
        );
        assert!(parse_table_binding("links").is_err());
        assert!(parse_table_binding("=/data/x.csv").is_err());
    }

    #[test]
    fn test_cli_parses_exec() {
        let cli = Cli::try_parse_from([
            "querysmith",
            "exec",
            "query.rhai",
            "--records",
            "/data/records",
            "--table",
            "links=/data/links.csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Exec { program, data } => {
                assert_eq!(program, PathBuf::from("query.rhai"));
                assert_eq!(data.tables.len(), 1);
            }
            _ => panic!("expected exec"),
        }
    }

    #[test]
    fn test_build_context_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("links.csv");
        std::fs::write(&table, "email,file\n").unwrap();
        let data = DataArgs {
            records: dir.path().to_path_buf(),
            tables: vec![("links".into(), table)],
        };
        let ctx = build_context(&data).unwrap();
        assert!(ctx.record_dir.is_absolute());
        assert!(ctx.table_path("links").is_some());
    }

    #[test]
    fn test_build_context_missing_records() {
        let data = DataArgs {
            records: PathBuf::from("/definitely/not/here"),
            tables: Vec::new(),
        };
        assert!(build_context(&data).is_err());
    }
}
