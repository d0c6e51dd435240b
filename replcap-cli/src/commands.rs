//! CLI command implementations

use anyhow::{Context, Result};
use replcap_common::HostMessage;
use replcap_engine::{
    from_parse_failure, instrument, Engine, EngineConfig, ExecutionResult, InProcessRuntime,
    ProcessRuntime, ReplService,
};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Resolve the script source from the positional argument, `--file`, or stdin
pub fn read_source(code: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read script {}", path.display()));
    }
    match code {
        Some(code) if code != "-" => Ok(code),
        _ => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read script from stdin")?;
            Ok(source)
        }
    }
}

fn with_budget(mut config: EngineConfig, budget_ms: Option<u64>) -> Result<EngineConfig> {
    if let Some(ms) = budget_ms {
        config.limits.budget = Duration::from_millis(ms);
    }
    config.validate().context("Invalid execution limits")?;
    Ok(config)
}

/// Run one script and write its result document to stdout in a single write.
///
/// Script errors are part of the document; the process still exits 0.
pub fn execute_run(
    config: &EngineConfig,
    budget_ms: Option<u64>,
    source: &str,
    pretty: bool,
) -> Result<()> {
    let config = with_budget(config.clone(), budget_ms)?;
    let engine = Engine::from_config(&config);

    info!(
        code_len = source.len(),
        budget_ms = config.limits.budget_ms(),
        "running script"
    );
    let result = engine.run(source);
    write_document(&result, pretty)
}

fn write_document(result: &ExecutionResult, pretty: bool) -> Result<()> {
    let mut document = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    document.push('\n');

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(document.as_bytes())
        .context("Failed to write result document")?;
    stdout.flush()?;
    Ok(())
}

/// Print the instrumented source, or the SyntaxError document if it does not parse
pub fn execute_instrument(source: &str) -> Result<()> {
    match instrument(source) {
        Ok(instrumented) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(instrumented.as_bytes())?;
            if !instrumented.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
            Ok(())
        }
        Err(failure) => write_document(
            &ExecutionResult::failed("", from_parse_failure(&failure)),
            false,
        ),
    }
}

/// Serve `code_change` events from stdin until EOF.
///
/// Every event runs independently and concurrently; replies are written as
/// one JSON line each, in completion order.
pub async fn execute_relay(config: EngineConfig, budget_ms: Option<u64>, process: bool) -> Result<()> {
    let config = with_budget(config, budget_ms)?;
    let service = if process {
        ReplService::new(ProcessRuntime::from_config(&config))
    } else {
        ReplService::new(InProcessRuntime::new(Engine::from_config(&config)))
    };
    info!(runtime = service.runtime_name(), "relay started");

    let (reply_tx, mut reply_rx) = mpsc::channel::<HostMessage>(64);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(reply) = reply_rx.recv().await {
            let mut line = match serde_json::to_string(&reply) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to serialize reply");
                    continue;
                }
            };
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let message: HostMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "skipping malformed event");
                continue;
            }
        };

        let service = service.clone();
        let reply_tx = reply_tx.clone();
        tasks.spawn(async move {
            if let Some(reply) = service.handle_message(message).await {
                let _ = reply_tx.send(reply).await;
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "event task failed");
        }
    }
    drop(reply_tx);
    let _ = writer.await;
    debug!("relay finished");
    Ok(())
}
