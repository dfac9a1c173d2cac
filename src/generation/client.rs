use super::payload::{NormalizedPayload, TargetModel};
use reqwest::{header, Client, Response, StatusCode};
use serde_json::{Map, Value};
use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};
use thiserror::Error;
use url::Url;

pub const USER_AGENT: &str = "Tellulu-App/1.0 (stability-proxy)";

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub api_base: Url,
    pub max_attempts: u32,
    pub backoff_unit: Duration,
    pub connect_timeout: Duration,
    pub attempt_timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(api_key: impl Into<String>, api_base: Url) -> Self {
        Self {
            api_key: api_key.into(),
            api_base,
            max_attempts: 3,
            backoff_unit: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(90),
        }
    }

    /// Delay before the retry that follows the `attempt`-th failure (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .checked_mul(attempt)
            .unwrap_or(Duration::MAX)
    }
}

/// Final answer from upstream that is relayed to the caller as is.
#[derive(Clone, Debug, PartialEq)]
pub enum UpstreamResult {
    Success(Value),
    Rejected { status: StatusCode, body: Value },
}

#[derive(Error, Debug)]
pub enum TransientFailure {
    #[error("Stability API Error: {} - {}", .status.as_u16(), .body)]
    Unavailable { status: StatusCode, body: String },
    #[error("{0}")]
    Network(#[source] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("{source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransientFailure,
    },
    #[error("invalid upstream response: {0}")]
    InvalidResponse(#[source] reqwest::Error),
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Success,
    Transient,
    Terminal,
}

/// Only 503 and 504 are worth another attempt, every other failure status is
/// the caller's to deal with.
pub fn classify(status: StatusCode) -> Disposition {
    if status.is_success() {
        Disposition::Success
    } else if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::GATEWAY_TIMEOUT {
        Disposition::Transient
    } else {
        Disposition::Terminal
    }
}

enum AttemptOutcome {
    Done(UpstreamResult),
    Transient(TransientFailure),
}

#[derive(Clone, Debug)]
pub struct StabilityClient {
    client: Client,
    config: UpstreamConfig,
}

impl StabilityClient {
    pub fn new(config: UpstreamConfig) -> anyhow::Result<Self> {
        if config.api_base.cannot_be_a_base() {
            anyhow::bail!("api base {} cannot be used as a base url", config.api_base);
        }

        // binding to an ipv4 local address keeps the resolver from handing out
        // ipv6 addresses that some hosts cannot reach
        let client = Client::builder()
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .connect_timeout(config.connect_timeout)
            .timeout(config.attempt_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn generation_url(&self, model: &TargetModel) -> Result<Url, ForwardError> {
        let mut url = self.config.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ForwardError::InvalidUrl(self.config.api_base.to_string()))?
            .pop_if_empty()
            .extend(["v1", "generation", model.as_str(), "text-to-image"]);
        Ok(url)
    }

    /// Post the payload to the text-to-image endpoint of `model`, retrying
    /// transient failures with a linear backoff.
    #[tracing::instrument(skip_all, fields(model = %model))]
    pub async fn generate(
        &self,
        model: &TargetModel,
        payload: &NormalizedPayload,
    ) -> Result<UpstreamResult, ForwardError> {
        let url = self.generation_url(model)?;
        let mut attempt = 0;

        loop {
            match self.attempt(&url, payload).await? {
                AttemptOutcome::Done(result) => return Ok(result),
                AttemptOutcome::Transient(failure) => {
                    attempt += 1;

                    if attempt >= self.config.max_attempts {
                        tracing::error!("giving up after {} attempts: {}", attempt, failure);
                        return Err(ForwardError::RetriesExhausted {
                            attempts: attempt,
                            source: failure,
                        });
                    }

                    let delay = self.config.backoff_delay(attempt);
                    tracing::warn!(
                        "attempt {} failed: {}. retrying in {}ms",
                        attempt,
                        failure,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        payload: &NormalizedPayload,
    ) -> Result<AttemptOutcome, ForwardError> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .json(payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return Ok(AttemptOutcome::Transient(TransientFailure::Network(e))),
        };

        let status = response.status();
        tracing::debug!("upstream responded with {}", status);

        match classify(status) {
            Disposition::Success => {
                let body = response
                    .json::<Value>()
                    .await
                    .map_err(ForwardError::InvalidResponse)?;
                Ok(AttemptOutcome::Done(UpstreamResult::Success(body)))
            }
            Disposition::Transient => {
                // drain the body so the connection goes back to the pool
                let body = response.text().await.unwrap_or_default();
                Ok(AttemptOutcome::Transient(TransientFailure::Unavailable {
                    status,
                    body,
                }))
            }
            Disposition::Terminal => {
                let body = json_or_empty(response).await;
                tracing::info!("upstream rejected request with {}", status);
                Ok(AttemptOutcome::Done(UpstreamResult::Rejected { status, body }))
            }
        }
    }
}

async fn json_or_empty(response: Response) -> Value {
    response
        .json::<Value>()
        .await
        .unwrap_or_else(|_| Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> StabilityClient {
        StabilityClient::new(UpstreamConfig::new("sk-test", Url::parse(base).unwrap())).unwrap()
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(classify(StatusCode::OK), Disposition::Success);
        assert_eq!(classify(StatusCode::CREATED), Disposition::Success);
        assert_eq!(classify(StatusCode::SERVICE_UNAVAILABLE), Disposition::Transient);
        assert_eq!(classify(StatusCode::GATEWAY_TIMEOUT), Disposition::Transient);
        assert_eq!(classify(StatusCode::BAD_REQUEST), Disposition::Terminal);
        assert_eq!(classify(StatusCode::UNAUTHORIZED), Disposition::Terminal);
        assert_eq!(classify(StatusCode::UNPROCESSABLE_ENTITY), Disposition::Terminal);
        assert_eq!(classify(StatusCode::INTERNAL_SERVER_ERROR), Disposition::Terminal);
        assert_eq!(classify(StatusCode::BAD_GATEWAY), Disposition::Terminal);
    }

    #[test]
    fn backoff_is_linear() {
        let config = UpstreamConfig::new("sk-test", Url::parse("https://api.stability.ai").unwrap());
        assert_eq!(config.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let mut config = UpstreamConfig::new("sk-test", Url::parse("https://api.stability.ai").unwrap());
        config.backoff_unit = Duration::from_millis(u64::MAX);
        assert_eq!(config.backoff_delay(2), Duration::MAX);
    }

    #[test]
    fn builds_generation_url() {
        let url = client("https://api.stability.ai")
            .generation_url(&TargetModel::default())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.stability.ai/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image"
        );
    }

    #[test]
    fn generation_url_keeps_base_path() {
        let url = client("http://127.0.0.1:9000/proxy/")
            .generation_url(&TargetModel::default())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/proxy/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image"
        );
    }

    #[test]
    fn rejects_non_base_url() {
        let config = UpstreamConfig::new("sk-test", Url::parse("mailto:someone@example.com").unwrap());
        assert!(StabilityClient::new(config).is_err());
    }

    #[test]
    fn exhausted_message_is_last_failure() {
        let error = ForwardError::RetriesExhausted {
            attempts: 3,
            source: TransientFailure::Unavailable {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "busy".to_string(),
            },
        };
        assert_eq!(
            error.to_string(),
            "Stability API Error: 503 - busy"
        );
    }
}
