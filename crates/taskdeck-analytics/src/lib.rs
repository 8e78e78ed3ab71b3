//! `taskdeck-analytics` — best-effort usage events to Amplitude.
//!
//! Fire-and-forget by contract: a failed emit is logged and dropped, it never
//! blocks or fails the operation that produced it. Without an API key the
//! client is simply not constructed and every call site skips emission.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

const AMPLITUDE_URL: &str = "https://api2.amplitude.com/2/httpapi";

pub struct AnalyticsClient {
    http: reqwest::Client,
    api_key: String,
}

impl AnalyticsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Build from optional config; logs once when analytics is disabled.
    pub fn from_key(api_key: Option<String>) -> Option<Arc<Self>> {
        match api_key {
            Some(key) if !key.trim().is_empty() => Some(Arc::new(Self::new(key))),
            _ => {
                info!("AMPLITUDE_API_KEY not set — analytics disabled");
                None
            }
        }
    }

    /// Send one event. Never returns an error — failures are logged.
    pub async fn track(&self, user_id: i64, event_type: &str, properties: Value) {
        let body = event_body(&self.api_key, user_id, event_type, &properties);
        match self.http.post(AMPLITUDE_URL).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(event = event_type, user_id, "analytics event sent");
            }
            Ok(resp) => {
                warn!(event = event_type, status = %resp.status(), "amplitude rejected event");
            }
            Err(e) => {
                warn!(event = event_type, error = %e, "amplitude unreachable");
            }
        }
    }

    /// Spawn the emit so the caller never waits on analytics I/O.
    pub fn track_detached(self: &Arc<Self>, user_id: i64, event_type: &str, properties: Value) {
        let client = Arc::clone(self);
        let event_type = event_type.to_string();
        tokio::spawn(async move {
            client.track(user_id, &event_type, properties).await;
        });
    }
}

fn event_body(api_key: &str, user_id: i64, event_type: &str, properties: &Value) -> Value {
    json!({
        "api_key": api_key,
        "events": [{
            // Amplitude wants user_id as a string.
            "user_id": user_id.to_string(),
            "event_type": event_type,
            "event_properties": properties,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_body_shape() {
        let body = event_body("key", 42, "task_added", &json!({"source": "command"}));
        assert_eq!(body["api_key"], "key");
        let event = &body["events"][0];
        assert_eq!(event["user_id"], "42");
        assert_eq!(event["event_type"], "task_added");
        assert_eq!(event["event_properties"]["source"], "command");
    }

    #[test]
    fn missing_key_disables_client() {
        assert!(AnalyticsClient::from_key(None).is_none());
        assert!(AnalyticsClient::from_key(Some("  ".into())).is_none());
        assert!(AnalyticsClient::from_key(Some("k".into())).is_some());
    }
}
