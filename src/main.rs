use stability_proxy::config::AppConfig;
use stability_proxy::run;
use stability_proxy::state::AppState;
use tracing::{debug, error};

#[cfg(debug_assertions)]
use dotenv::dotenv;

#[tokio::main]
async fn main() {
    #[cfg(debug_assertions)]
    dotenv().ok();

    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    debug!(
        "config: host={} port={} api_base={} max_attempts={} key_set={}",
        config.host,
        config.port,
        config.stability_api_base,
        config.max_attempts,
        config.stability_api_key.is_some()
    );

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            error!("failed to initialize app state: {}", e);
            return;
        }
    };

    if let Err(e) = run(state).await {
        error!("failed to start app: {}", e);
    }
}
