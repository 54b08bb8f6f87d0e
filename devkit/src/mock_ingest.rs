/*!
Mock ingestion endpoint for relay tests

Stands in for the cloud API: records every JSON body POSTed to
`/api/ingest` and answers with a status code the test scripts
(200 by default). Bodies that are not valid JSON are kept as strings.
*/

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;

pub const INGEST_PATH: &str = "/api/ingest";

struct IngestState {
    status: Mutex<u16>,
    received: Mutex<Vec<Value>>,
}

pub struct MockIngest {
    addr: SocketAddr,
    state: Arc<IngestState>,
    task: JoinHandle<()>,
}

impl MockIngest {
    pub async fn start() -> Result<Self> {
        env_logger::try_init().ok();

        let state = Arc::new(IngestState {
            status: Mutex::new(200),
            received: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route(INGEST_PATH, post(ingest))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("❌ Mock ingest stopped: {}", e);
            }
        });

        log::info!("☁️  Mock ingest listening on {}", addr);
        Ok(Self { addr, state, task })
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, INGEST_PATH)
    }

    /// Status code for every following request.
    pub fn respond_with(&self, status: u16) {
        *self.state.status.lock() = status;
    }

    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.state.received.lock().len()
    }

    pub fn last(&self) -> Option<Value> {
        self.state.received.lock().last().cloned()
    }

    /// Poll until at least `count` bodies arrived or `limit` elapses.
    pub async fn wait_for(&self, count: usize, limit: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < limit {
            if self.count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        log::warn!("⏰ Timeout waiting for {} bodies (got {})", count, self.count());
        false
    }

    /// Assert a dotted field path in the latest body, e.g. `tags.Total_Pecas`.
    pub fn assert_field_equals(&self, field_path: &str, expected: &Value) -> Result<()> {
        let Some(body) = self.last() else {
            anyhow::bail!("No body received yet");
        };
        match get_nested_field(&body, field_path) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => anyhow::bail!(
                "Field '{}' mismatch: expected {:?}, got {:?}",
                field_path,
                expected,
                actual
            ),
            None => anyhow::bail!("Field '{}' not found in latest body", field_path),
        }
    }
}

impl Drop for MockIngest {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn ingest(State(state): State<Arc<IngestState>>, body: String) -> (StatusCode, Json<Value>) {
    let parsed = serde_json::from_str(&body).unwrap_or(Value::String(body));
    state.received.lock().push(parsed);

    let status = StatusCode::from_u16(*state.status.lock()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    log::info!("📥 [MOCK] ingest -> {}", status);
    (status, Json(serde_json::json!({ "ok": status.is_success() })))
}

pub fn get_nested_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(obj) => current = obj.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_field_lookup() {
        let body = json!({"device_id": "X", "tags": {"Health_Score": 95}});
        assert_eq!(get_nested_field(&body, "tags.Health_Score"), Some(&json!(95)));
        assert_eq!(get_nested_field(&body, "tags.Missing"), None);
        assert_eq!(get_nested_field(&body, "device_id.inner"), None);
    }

    #[tokio::test]
    async fn test_mock_captures_and_scripts_status() {
        let mock = MockIngest::start().await.unwrap();
        let client = reqwest::Client::new();

        let ok = client
            .post(mock.url())
            .json(&json!({"api_key": "K", "tags": {"Total_Pecas": 7}}))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status().as_u16(), 200);
        mock.assert_field_equals("tags.Total_Pecas", &json!(7)).unwrap();

        mock.respond_with(500);
        let failed = client.post(mock.url()).body("not json").send().await.unwrap();
        assert_eq!(failed.status().as_u16(), 500);

        assert_eq!(mock.count(), 2);
        assert_eq!(mock.last(), Some(Value::String("not json".to_string())));
        assert!(mock.wait_for(2, Duration::from_millis(100)).await);
    }
}
