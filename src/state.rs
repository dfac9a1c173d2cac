use crate::{
    config::AppConfig,
    generation::{StabilityClient, UpstreamConfig},
};
use std::time::Duration;
use url::Url;

#[derive(Clone, Debug)]
pub struct AppState {
    config: AppConfig,
    stability_client: Option<StabilityClient>,
}

impl AppState {
    /// Build the shared state. A missing API key is not an error here: the
    /// server still starts and every generation request reports it instead.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let stability_client = match &config.stability_api_key {
            Some(api_key) => {
                let upstream = UpstreamConfig {
                    api_key: api_key.clone(),
                    api_base: Url::parse(&config.stability_api_base)?,
                    max_attempts: config.max_attempts,
                    backoff_unit: Duration::from_millis(config.backoff_ms),
                    connect_timeout: Duration::from_secs(config.connect_timeout_secs),
                    attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
                };
                Some(StabilityClient::new(upstream)?)
            }
            None => {
                tracing::warn!("STABILITY_KEY is not set, generation requests will fail");
                None
            }
        };

        Ok(Self {
            config,
            stability_client,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn stability_client(&self) -> Option<&StabilityClient> {
        self.stability_client.as_ref()
    }
}
