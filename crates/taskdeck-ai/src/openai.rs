use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::extract::{ExtractError, ExtractedTask, TaskExtractor};

const SYSTEM_PROMPT: &str = "\
You are an assistant for parsing tasks from text. Return STRICTLY valid JSON:
{
    \"is_task\": bool,
    \"summary\": \"brief task title, up to 100 characters\",
    \"start_time\": \"ISO 8601 UTC, e.g. 2025-08-15T12:30:00Z\"
}
Rules:
1. If the message is not a task (greetings, questions, random characters), set is_task to false.
2. A valid task contains an action verb or a clear event description.
3. If no time is given, use tomorrow at 09:00 in the user's timezone.
4. If only a time is given, use today if it has not passed yet, otherwise tomorrow.
5. Convert all times from the user's timezone to UTC.
Return ONLY the JSON object, no markdown, no backticks, no extra text.";

pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: String, base_url: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
            model,
        }
    }
}

#[async_trait]
impl TaskExtractor for OpenAiExtractor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn extract(
        &self,
        text: &str,
        tz_name: &str,
        now_utc: DateTime<Utc>,
    ) -> Result<Option<ExtractedTask>, ExtractError> {
        let now_display = match tz_name.parse::<Tz>() {
            Ok(tz) => now_utc.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string(),
            Err(_) => now_utc.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        };
        let user_prompt = format!(
            "Current local time: {now_display}\nUser timezone: {tz_name}\n\nTask: {text}\n\nReturn JSON with task information."
        );

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": 0.3,
            "response_format": { "type": "json_object" },
        });

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, "sending extraction request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status, body = %message, "extraction API error");
            return Err(ExtractError::Api { status, message });
        }

        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }
        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        let content = api_resp
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ExtractError::Parse("empty choices".to_string()))?;

        parse_extraction(content)
    }
}

/// Parse the oracle's JSON reply, stripping any markdown fencing the model
/// added despite instructions (observed with several models).
pub fn parse_extraction(content: &str) -> Result<Option<ExtractedTask>, ExtractError> {
    let cleaned = strip_code_fence(content);

    #[derive(Deserialize)]
    struct Reply {
        is_task: bool,
        #[serde(default)]
        summary: String,
        #[serde(default)]
        start_time: String,
    }

    let reply: Reply =
        serde_json::from_str(cleaned).map_err(|e| ExtractError::Parse(e.to_string()))?;

    if !reply.is_task {
        return Ok(None);
    }

    let title = reply.summary.trim().to_string();
    if title.is_empty() {
        return Ok(None);
    }

    let due_utc = DateTime::parse_from_rfc3339(&reply.start_time)
        .map_err(|e| ExtractError::Parse(format!("bad start_time {:?}: {e}", reply.start_time)))?
        .with_timezone(&Utc);

    Ok(Some(ExtractedTask { title, due_utc }))
}

fn strip_code_fence(content: &str) -> &str {
    let mut s = content.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_reply() {
        let reply = r#"{"is_task": true, "summary": "Call mum", "start_time": "2025-08-15T12:30:00Z"}"#;
        let task = parse_extraction(reply).unwrap().unwrap();
        assert_eq!(task.title, "Call mum");
        assert_eq!(
            task.due_utc,
            "2025-08-15T12:30:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn fenced_reply_is_stripped() {
        let reply = "```json\n{\"is_task\": true, \"summary\": \"Buy milk\", \"start_time\": \"2025-08-16T07:00:00+00:00\"}\n```";
        let task = parse_extraction(reply).unwrap().unwrap();
        assert_eq!(task.title, "Buy milk");
    }

    #[test]
    fn non_task_returns_none() {
        let reply = r#"{"is_task": false, "summary": "", "start_time": ""}"#;
        assert!(parse_extraction(reply).unwrap().is_none());
    }

    #[test]
    fn empty_summary_is_not_a_task() {
        let reply = r#"{"is_task": true, "summary": "  ", "start_time": "2025-08-15T12:30:00Z"}"#;
        assert!(parse_extraction(reply).unwrap().is_none());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_extraction("the model rambled here"),
            Err(ExtractError::Parse(_))
        ));
        assert!(matches!(
            parse_extraction(r#"{"is_task": true, "summary": "x", "start_time": "not-a-time"}"#),
            Err(ExtractError::Parse(_))
        ));
    }
}
