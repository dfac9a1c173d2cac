#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use serde_json::Value;
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Instant,
};
use url::Url;

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
    pub at: Instant,
}

struct Shared {
    script: Vec<(StatusCode, String)>,
    recorded: Mutex<Vec<RecordedRequest>>,
}

/// Stand-in for the Stability API that answers with a fixed script of
/// responses, repeating the last one once the script runs out.
pub struct FakeUpstream {
    pub base: Url,
    shared: Arc<Shared>,
}

async fn respond(
    State(shared): State<Arc<Shared>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let index = {
        let mut recorded = shared.recorded.lock().unwrap();
        recorded.push(RecordedRequest {
            path: uri.path().to_string(),
            headers,
            body: serde_json::from_slice(&body).unwrap_or(Value::Null),
            at: Instant::now(),
        });
        recorded.len() - 1
    };

    let (status, body) = shared
        .script
        .get(index)
        .or(shared.script.last())
        .cloned()
        .unwrap_or((StatusCode::OK, "{}".to_string()));

    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

impl FakeUpstream {
    pub async fn start(script: &[(u16, &str)]) -> Self {
        let shared = Arc::new(Shared {
            script: script
                .iter()
                .map(|(status, body)| (StatusCode::from_u16(*status).unwrap(), body.to_string()))
                .collect(),
            recorded: Mutex::new(vec![]),
        });

        let app = Router::new().fallback(respond).with_state(shared.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: Url::parse(&format!("http://{}", addr)).unwrap(),
            shared,
        }
    }

    pub fn hits(&self) -> usize {
        self.shared.recorded.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.recorded.lock().unwrap().clone()
    }
}

/// Base url of a port nothing listens on.
pub fn unreachable_base() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{}", addr)).unwrap()
}
