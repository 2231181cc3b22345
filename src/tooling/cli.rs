//! CLI Tooling
//!
//! Command-line front end: loads configuration, runs newline-delimited JSON
//! requests through a scheduler, and prints one JSON result per request.

use crate::config::{ConfigLoader, SyscoreConfig};
use crate::error::SyscallError;
use crate::logging::LoggingConfig;
use crate::request::{Payload, Request, RequestHandle};
use crate::scheduler::Scheduler;
use crate::types::{AgentID, RequestKind};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// syscore CLI - multi-resource request scheduler
#[derive(Parser)]
#[command(name = "syscore")]
#[command(about = "Run agent requests through the syscore scheduler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute newline-delimited JSON requests
    Run {
        /// Read requests from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// One input line
#[derive(Debug, Deserialize)]
struct RequestLine {
    kind: RequestKind,
    agent_id: AgentID,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    deadline_ms: Option<u64>,
}

impl RequestLine {
    fn into_request(self) -> Result<(RequestKind, Request), serde_json::Error> {
        let payload: Payload =
            serde_json::from_value(json!({ "kind": self.kind, "payload": self.payload }))?;
        let mut request = Request::new(self.agent_id, payload);
        if let Some(ms) = self.deadline_ms {
            request = request.with_deadline(Duration::from_millis(ms));
        }
        Ok((self.kind, request))
    }
}

/// CLI context: effective configuration plus command dispatch
pub struct CliContext {
    config: SyscoreConfig,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, SyscallError> {
        let config = ConfigLoader::load_optional(config_path.as_deref())?;
        Ok(Self { config })
    }

    pub fn with_config(config: SyscoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyscoreConfig {
        &self.config
    }

    /// Logging configuration with command-line overrides applied
    pub fn logging_config(&self, cli: &Cli) -> LoggingConfig {
        let mut logging = self.config.logging.clone();
        if cli.verbose {
            logging.level = "debug".to_string();
        }
        if let Some(level) = &cli.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &cli.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &cli.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }

    /// Execute a command and return its output
    pub fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        match command {
            Commands::Config => Ok(self.config.to_toml()?),
            Commands::Run { input } => match input {
                Some(path) => {
                    let file = std::fs::File::open(path)
                        .with_context(|| format!("Failed to open input {}", path.display()))?;
                    self.run_requests(std::io::BufReader::new(file))
                }
                None => self.run_requests(std::io::stdin().lock()),
            },
        }
    }

    /// Run every request read from `reader` and render the results.
    pub fn run_requests<R: BufRead>(&self, reader: R) -> anyhow::Result<String> {
        let lines = reader
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read requests")?;

        if tokio::runtime::Handle::try_current().is_ok() {
            anyhow::bail!("Cannot run requests from within an async runtime context");
        }
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to create runtime")?;

        rt.block_on(self.process_lines(lines))
    }

    async fn process_lines(&self, lines: Vec<String>) -> anyhow::Result<String> {
        let scheduler = Scheduler::from_config(&self.config)?;
        scheduler.start()?;
        let started = Instant::now();

        let mut output = Vec::new();
        let mut pending: Vec<(usize, RequestHandle)> = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<RequestLine>(line)
                .and_then(RequestLine::into_request);
            let (kind, request) = match parsed {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(line = line_no, error = %e, "Skipping malformed request line");
                    output.push(json!({ "line": line_no, "error": e.to_string() }));
                    continue;
                }
            };
            match scheduler.enqueue(kind, request) {
                Ok(handle) => pending.push((line_no, handle)),
                Err(e) => output.push(json!({ "line": line_no, "error": e.to_string() })),
            }
        }

        for (line_no, handle) in &pending {
            let outcome = scheduler.await_completion(handle).await;
            output.push(render_outcome(*line_no, handle, outcome));
        }
        scheduler.stop().await?;
        output.sort_by_key(|entry| entry["line"].as_u64().unwrap_or_default());

        info!(
            requests = pending.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Finished request run"
        );

        let mut summary = serde_json::Map::new();
        for kind in RequestKind::ALL {
            let stats = scheduler.stats(kind);
            if stats.completed + stats.failed == 0 {
                continue;
            }
            summary.insert(
                kind.to_string(),
                json!({ "stats": stats, "latency": scheduler.latency(kind) }),
            );
        }
        output.push(json!({ "summary": summary }));

        let rendered = output
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join("\n"))
    }
}

fn render_outcome(
    line_no: usize,
    handle: &RequestHandle,
    outcome: Result<crate::request::Response, SyscallError>,
) -> Value {
    let status = handle.status();
    let millis = |d: Option<Duration>| d.map(|d| d.as_secs_f64() * 1000.0);
    let mut entry = json!({
        "line": line_no,
        "request_id": handle.id().to_string(),
        "kind": handle.kind(),
        "agent_id": handle.agent_id(),
        "status": status.status.to_string(),
        "waiting_ms": millis(status.waiting_time()),
        "turnaround_ms": millis(status.turnaround_time()),
    });
    match outcome {
        Ok(response) => entry["response"] = json!(response),
        Err(e) => entry["error"] = json!(e.to_string()),
    }
    entry
}
