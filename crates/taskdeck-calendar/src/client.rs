use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use taskdeck_core::types::GoogleTokens;

use crate::error::{CalendarError, Result};

const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Result of an event insert, carrying a refreshed access token when the
/// stored one had expired — the caller persists it.
#[derive(Debug, Clone)]
pub struct CreatedEvent {
    pub event_id: String,
    pub refreshed_access_token: Option<String>,
}

pub struct CalendarClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl CalendarClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
        }
    }

    /// Build from optional config; logs once when the integration is off.
    pub fn from_config(
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Option<Arc<Self>> {
        match (client_id, client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(Arc::new(Self::new(id, secret)))
            }
            _ => {
                info!("Google client credentials not set — calendar integration disabled");
                None
            }
        }
    }

    /// Insert a one-hour event at `start_utc` into the user's primary
    /// calendar. Retries exactly once after a token refresh on 401.
    pub async fn create_event(
        &self,
        tokens: &GoogleTokens,
        title: &str,
        start_utc: DateTime<Utc>,
        tz: Tz,
    ) -> Result<CreatedEvent> {
        let body = event_body(title, start_utc, tz);

        match self.insert_event(&tokens.access_token, &body).await {
            Ok(event_id) => Ok(CreatedEvent {
                event_id,
                refreshed_access_token: None,
            }),
            Err(CalendarError::AuthExpired) => {
                debug!("access token rejected; attempting refresh");
                let fresh = self.refresh_access_token(&tokens.refresh_token).await?;
                let event_id = self.insert_event(&fresh, &body).await?;
                Ok(CreatedEvent {
                    event_id,
                    refreshed_access_token: Some(fresh),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn insert_event(&self, access_token: &str, body: &Value) -> Result<String> {
        let resp = self
            .http
            .post(EVENTS_URL)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 401 {
            return Err(CalendarError::AuthExpired);
        }
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, body = %message, "calendar insert failed");
            return Err(CalendarError::Api { status, message });
        }

        #[derive(Deserialize)]
        struct Inserted {
            id: String,
        }
        let inserted: Inserted = resp
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))?;
        Ok(inserted.id)
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            // Refresh token revoked or expired — nothing more we can do.
            return Err(CalendarError::AuthExpired);
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CalendarError::Parse(e.to_string()))?;
        Ok(token.access_token)
    }
}

fn event_body(title: &str, start_utc: DateTime<Utc>, tz: Tz) -> Value {
    let end_utc = start_utc + Duration::hours(1);
    json!({
        "summary": title,
        "start": {
            "dateTime": start_utc.to_rfc3339_opts(SecondsFormat::Secs, true),
            "timeZone": tz.name(),
        },
        "end": {
            "dateTime": end_utc.to_rfc3339_opts(SecondsFormat::Secs, true),
            "timeZone": tz.name(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_body_has_one_hour_span_and_tz() {
        let tz: Tz = "Europe/Rome".parse().unwrap();
        let start: DateTime<Utc> = "2025-08-15T12:00:00Z".parse().unwrap();
        let body = event_body("Call mum", start, tz);
        assert_eq!(body["summary"], "Call mum");
        assert_eq!(body["start"]["dateTime"], "2025-08-15T12:00:00Z");
        assert_eq!(body["end"]["dateTime"], "2025-08-15T13:00:00Z");
        assert_eq!(body["start"]["timeZone"], "Europe/Rome");
    }
}
