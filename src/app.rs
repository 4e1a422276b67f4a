use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use reqwest::Client;
use tokio::io::BufReader;

use crate::{
    ai::{CommentGenerator, OpenAiClient},
    config::AppConfig,
    control::{ControlService, GeneratorFactory},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown, telemetry::EventLog},
    page::{FeedPage, SimulatedFeed},
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct EngageBotApp {
    _paths: ResolvedPaths,
    service: ControlService,
    shutdown: Shutdown,
}

impl EngageBotApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let tz: Tz = config.timezone.parse().unwrap_or(chrono_tz::UTC);
        let events = Arc::new(EventLog::new(tz, config.event_log_capacity));

        let http_client = Client::builder()
            .user_agent(format!("engagebot-rust/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        let provider = Arc::new(OpenAiClient::new(http_client, config.provider.clone()));
        let generators: GeneratorFactory = {
            let provider = provider.clone();
            Arc::new(move |api_key| {
                Arc::new(provider.session(api_key)) as Arc<dyn CommentGenerator>
            })
        };

        let page: Option<Arc<dyn FeedPage>> = match &config.feed_fixture {
            Some(path) => {
                let feed = SimulatedFeed::from_path(path).await?;
                tracing::info!(
                    target: "lifecycle",
                    fixture = %path.display(),
                    "simulated feed attached"
                );
                Some(Arc::new(feed))
            }
            None => {
                tracing::warn!(
                    target: "lifecycle",
                    "no feed driver attached; START requests will be rejected"
                );
                None
            }
        };

        let service = ControlService::new(
            config.clone(),
            page,
            generators,
            events,
            paths.runs_path.clone(),
        );

        Ok(Self {
            _paths: paths,
            service,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let EngageBotApp {
            _paths: _,
            service,
            shutdown,
        } = self;

        tracing::info!(target: "lifecycle", "engagement bot started");

        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        let result = service.serve(stdin, stdout, shutdown.subscribe()).await;
        if let Err(err) = &result {
            tracing::error!(target: "lifecycle", error = %err, "control channel failed");
        }

        shutdown.trigger();
        service.shutdown(SHUTDOWN_TIMEOUT).await;

        tracing::info!(target: "lifecycle", "engagement bot stopped");
        result
    }
}
