use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use futures::{stream::FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
    time::timeout,
};

use crate::{
    ai::{CommentGenerator, CommentStyle},
    config::{validate_api_key, AppConfig, RunSettings},
    domain::RunSummary,
    engine::{fresh_seed, EngagementRun},
    infrastructure::{
        shutdown::{Shutdown, ShutdownListener},
        telemetry::EventLog,
    },
    page::FeedPage,
};

use super::types::{Command, EventLine, Request, Response, StatusReport};

pub type GeneratorFactory = Arc<dyn Fn(String) -> Arc<dyn CommentGenerator> + Send + Sync>;

struct ActiveRun {
    stop: Shutdown,
    handle: JoinHandle<()>,
}

pub struct ControlService {
    config: Arc<AppConfig>,
    page: Option<Arc<dyn FeedPage>>,
    generators: GeneratorFactory,
    events: Arc<EventLog>,
    runs_path: PathBuf,
    active: Mutex<Option<ActiveRun>>,
    last_summary: Arc<Mutex<Option<RunSummary>>>,
}

impl ControlService {
    pub fn new(
        config: Arc<AppConfig>,
        page: Option<Arc<dyn FeedPage>>,
        generators: GeneratorFactory,
        events: Arc<EventLog>,
        runs_path: PathBuf,
    ) -> Self {
        Self {
            config,
            page,
            generators,
            events,
            runs_path,
            active: Mutex::new(None),
            last_summary: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Reads request lines until EOF or shutdown and forwards telemetry events as they
    /// happen. `GENERATE_COMMENT` replies are written whenever the provider answers.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
        mut shutdown: ShutdownListener,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut events = self.events.subscribe();
        let mut events_open = true;
        let mut host_closed = false;
        let mut generating = FuturesUnordered::new();
        tracing::info!(target: "control", "control channel ready");

        loop {
            if host_closed && generating.is_empty() {
                break;
            }
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!(
                        target: "control",
                        "shutdown requested; closing control channel"
                    );
                    break;
                }
                line = lines.next_line(), if !host_closed => {
                    let Some(line) = line.context("failed to read control channel")? else {
                        tracing::info!(target: "control", "control channel closed by host");
                        host_closed = true;
                        continue;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_line(&line) {
                        Ok(request) if request.command.awaits_provider() => {
                            generating.push(self.handle(request));
                        }
                        Ok(request) => {
                            let response = self.handle(request).await;
                            write_line(&mut writer, &response).await?;
                        }
                        Err(response) => write_line(&mut writer, &response).await?,
                    }
                }
                Some(response) = generating.next(), if !generating.is_empty() => {
                    write_line(&mut writer, &response).await?;
                }
                event = events.recv(), if events_open => match event {
                    Ok(event) => write_line(&mut writer, &EventLine { event: &event }).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(target: "control", skipped, "event stream lagged");
                    }
                    Err(RecvError::Closed) => events_open = false,
                },
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub async fn handle_line(&self, line: &str) -> Response {
        match parse_line(line) {
            Ok(request) => self.handle(request).await,
            Err(response) => response,
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        let Request { id, command } = request;
        tracing::debug!(target: "control", command = command.label(), "command received");
        match command {
            Command::Start { config } => match self.start(config) {
                Ok(result) => Response::ok(id, result),
                Err(message) => Response::err(id, message),
            },
            Command::Stop => Response::ok(id, json!({ "stopping": self.stop() })),
            Command::Ping => {
                Response::ok(id, json!({ "pong": true, "running": self.is_running() }))
            }
            Command::Status => Response::ok(id, to_value(&self.status())),
            Command::Logs => Response::ok(id, to_value(&self.events.snapshot())),
            Command::GenerateComment {
                content,
                style,
                credentials,
            } => match self.generate_comment(&content, style, credentials).await {
                Ok(result) => Response::ok(id, result),
                Err(message) => Response::err(id, message),
            },
        }
    }

    fn start(&self, settings: RunSettings) -> Result<Value, String> {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|run| !run.handle.is_finished()) {
            return Err("already running".to_string());
        }
        let page = self
            .page
            .clone()
            .ok_or_else(|| "no feed driver attached".to_string())?;
        let config = settings
            .validate(&self.config, fresh_seed())
            .map_err(|err| err.to_string())?;

        let seed = config.seed;
        let generator = (self.generators)(config.api_key.clone().unwrap_or_default());
        let (stop, listener) = Shutdown::new();
        let run = EngagementRun::new(config, page, generator, self.events.clone(), listener);

        let last_summary = self.last_summary.clone();
        let runs_path = self.runs_path.clone();
        let handle = tokio::spawn(async move {
            let summary = run.execute().await;
            if let Err(err) = append_summary(&runs_path, &summary).await {
                tracing::warn!(target: "control", error = %err, "failed to persist run summary");
            }
            *last_summary.lock() = Some(summary);
        });

        tracing::info!(target: "control", seed, "run started");
        *active = Some(ActiveRun { stop, handle });
        Ok(json!({ "started": true, "seed": seed }))
    }

    fn stop(&self) -> bool {
        let active = self.active.lock();
        match active.as_ref() {
            Some(run) if !run.handle.is_finished() => {
                if !run.stop.is_triggered() {
                    self.events.warning("Stop requested; finishing the current action");
                }
                run.stop.trigger();
                true
            }
            _ => false,
        }
    }

    fn status(&self) -> StatusReport {
        StatusReport {
            running: self.is_running(),
            progress: self.events.progress(),
            last_run: self.last_summary.lock().clone(),
        }
    }

    async fn generate_comment(
        &self,
        content: &str,
        style: CommentStyle,
        credentials: Option<String>,
    ) -> Result<Value, String> {
        let key = credentials
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| self.config.provider.api_key.clone())
            .ok_or_else(|| "an API key is required".to_string())?;
        validate_api_key(&key).map_err(|err| err.to_string())?;

        let generator = (self.generators)(key);
        generator
            .generate(content, style)
            .await
            .map(|generation| generation.to_wire())
            .map_err(|err| err.to_string())
    }

    pub async fn shutdown(&self, grace: Duration) {
        let Some(ActiveRun { stop, mut handle }) = self.active.lock().take() else {
            return;
        };
        stop.trigger();
        if timeout(grace, &mut handle).await.is_err() {
            tracing::warn!(
                target: "control",
                "run did not stop within {:?}; aborting",
                grace
            );
            handle.abort();
        }
    }
}

fn parse_line(line: &str) -> Result<Request, Response> {
    let raw: Value = serde_json::from_str(line)
        .map_err(|err| Response::err(None, format!("invalid JSON: {err}")))?;
    let id = raw.get("id").cloned();
    serde_json::from_value::<Request>(raw)
        .map_err(|err| Response::err(id, format!("invalid command: {err}")))
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

async fn write_line<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

async fn append_summary(path: &PathBuf, summary: &RunSummary) -> Result<()> {
    let mut line = serde_json::to_vec(summary)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}
