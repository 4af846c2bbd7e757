//! Console driver for the command pipeline.
//!
//! Each stdin line stands in for one recognized utterance and replies are
//! printed to stdout. A line may carry a language tag (`en: what time is it`);
//! untagged lines keep the last language. `!wake` sends the wake signal the
//! way an external spotter would.
//!
//! Usage: `jarvis-console [config.toml]`
//!
//! All tracing output goes to stderr so stdout carries only replies.

use jarvis::config::AssistantConfig;
use jarvis::dataset::{Dataset, FileDatasetSource};
use jarvis::executor::Executor;
use jarvis::pipeline::coordinator::{PipelineCoordinator, SpeechSink};
use jarvis::pipeline::messages::{Reply, Utterance, WakeSignal};
use jarvis::session::Session;
use jarvis::skills::builtins::{self, NoteBook};
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

const WAKE_COMMAND: &str = "!wake";

/// Prints replies to stdout.
struct ConsoleSink {
    stdout: tokio::io::Stdout,
}

#[async_trait::async_trait]
impl SpeechSink for ConsoleSink {
    async fn speak(&mut self, reply: &Reply) -> jarvis::Result<()> {
        let line = format!("[jarvis/{}] {}\n", reply.language, reply.text);
        self.stdout.write_all(line.as_bytes()).await?;
        self.stdout.flush().await?;
        Ok(())
    }
}

/// One parsed stdin line.
#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput {
    Wake,
    Utterance { language: String, text: String },
}

fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim();
    if line.eq_ignore_ascii_case(WAKE_COMMAND) {
        return ConsoleInput::Wake;
    }
    if let Some((tag, rest)) = line.split_once(':')
        && (2..=3).contains(&tag.len())
        && tag.chars().all(|c| c.is_ascii_alphabetic())
    {
        return ConsoleInput::Utterance {
            language: tag.to_ascii_lowercase(),
            text: rest.trim().to_owned(),
        };
    }
    ConsoleInput::Utterance {
        language: String::new(),
        text: line.to_owned(),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AssistantConfig> {
    let path = path.unwrap_or_else(AssistantConfig::default_config_path);
    if path.exists() {
        tracing::info!(path = %path.display(), "loading config");
        Ok(AssistantConfig::from_file(&path)?)
    } else {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        Ok(AssistantConfig::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("jarvis-console starting");

    let config = load_config(std::env::args_os().nth(1).map(PathBuf::from))?;
    let dataset_path = config.dataset.path.clone();
    let dataset = Dataset::load(&dataset_path)
        .map_err(|e| anyhow::anyhow!("cannot start without a command catalog: {e}"))?;

    let notes = NoteBook::new();
    let skills = builtins::registry(&notes);
    let executor = Executor::from_config(&config, dataset, skills)?
        .with_dataset_source(FileDatasetSource::new(dataset_path))
        .with_skill_factory(move || -> jarvis::Result<_> { Ok(builtins::registry(&notes)) });
    let session = Session::new(&config, executor, Instant::now());

    let (utterance_tx, utterance_rx) = mpsc::channel::<Utterance>(8);
    let (wake_tx, wake_rx) = mpsc::unbounded_channel::<WakeSignal>();

    let coordinator = PipelineCoordinator::new(
        session,
        utterance_rx,
        ConsoleSink {
            stdout: tokio::io::stdout(),
        },
    )
    .with_wake_signals(wake_rx)
    .with_miss_limit(config.assistant.miss_limit);
    let cancel = coordinator.cancel_token();

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read stdin");
                    break;
                }
            };
            let sent = match parse_line(&line) {
                ConsoleInput::Wake => wake_tx.send(WakeSignal).is_ok(),
                ConsoleInput::Utterance { language, text } => utterance_tx
                    .send(Utterance::new(text, language))
                    .await
                    .is_ok(),
            };
            if !sent {
                break;
            }
        }
    });

    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                cancel.cancel();
            }
        })
    };

    coordinator.run().await.map_err(|e| {
        tracing::error!(error = %e, "jarvis-console exited with error");
        anyhow::anyhow!("jarvis-console failed: {e}")
    })?;

    reader.abort();
    ctrl_c.abort();
    tracing::info!("jarvis-console shut down cleanly");
    Ok(())
}
