use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::cost_tracker::CostTracker;
use super::html_cleaner::HtmlCleaner;
use crate::common::error::{IngestError, Result};
use crate::config::MistralSettings;
use crate::metrics::ExtractionMetrics;

const SYSTEM_PROMPT: &str = r#"You extract event listings from HTML pages of German event websites.
Respond with a single JSON object of the form {"events": [...]} and nothing else.
Each event object uses exactly these fields:
- "title" (string, required)
- "description" (string)
- "location" (object, required): {"address": string (required), "lat": number, "lng": number}
- "dailyTimeSlots" (array, required, at least one entry): [{"date": "YYYY-MM-DD" (required), "from": "HH:mm", "to": "HH:mm"}]
  Multi-day events get one entry per day.
- "price" (number or null), "priceString" (string, the price as written on the page)
- "categoryId" (one of: konzert, party, theater, kinder, ausstellung, sport, festival, markt, fuehrung, lesung, comedy, film, workshop, kulinarik)
- "website", "contactEmail", "contactPhone" (strings)
- "socialMedia" (object): {"instagram": string, "facebook": string, "tiktok": string}
- "ticketsNeeded" (boolean)
Omit optional fields you cannot find. Never invent dates or times.
Never extract image URLs and never set promotion flags such as isPromoted.
If the page lists no events, respond with {"events": []}."#;

/// Turns page HTML into raw (unnormalized) event objects.
#[async_trait]
pub trait EventExtractor: Send + Sync {
    fn model(&self) -> &str;

    async fn extract_events(&self, html: &str, source_url: &str) -> Result<Vec<Value>>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Mistral chat-completion client for event extraction
pub struct MistralExtractor {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_input_chars: usize,
    cleaner: HtmlCleaner,
    cost_tracker: Arc<CostTracker>,
}

impl MistralExtractor {
    pub fn new(settings: &MistralSettings, cost_tracker: Arc<CostTracker>) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| IngestError::Config("MISTRAL_API_KEY not set".to_string()))?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_input_chars: settings.max_input_chars,
            cleaner: HtmlCleaner::new(),
            cost_tracker,
        })
    }

    pub fn cost_tracker(&self) -> &Arc<CostTracker> {
        &self.cost_tracker
    }

    async fn chat_completion(&self, user_prompt: &str) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IngestError::LlmApi {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<ChatResponse>().await?)
    }
}

/// Drops a surrounding ```json fence if the model added one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// `events` array of the model's JSON answer; anything else counts as no events.
fn parse_events(content: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| IngestError::LlmMalformed(e.to_string()))?;
    Ok(match value.get("events") {
        Some(Value::Array(events)) => events.clone(),
        _ => Vec::new(),
    })
}

#[async_trait]
impl EventExtractor for MistralExtractor {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, html), fields(model = %self.model, html_len = html.len()))]
    async fn extract_events(&self, html: &str, source_url: &str) -> Result<Vec<Value>> {
        let cleaned = self.cleaner.clean_and_truncate(html, self.max_input_chars);
        debug!(cleaned_len = cleaned.len(), "Cleaned HTML for extraction");
        let prompt = format!(
            "Extract all events from this page.\nSource URL: {}\n\nHTML:\n{}",
            source_url, cleaned
        );

        let response = match self.chat_completion(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                ExtractionMetrics::record_llm_failure();
                warn!(error = %e, "Mistral request failed");
                return Err(e);
            }
        };

        let usage = response.usage.unwrap_or_default();
        let cost = self
            .cost_tracker
            .track_usage(&self.model, usage.prompt_tokens, usage.completion_tokens);
        ExtractionMetrics::record_llm_call(&self.model, usage.prompt_tokens, usage.completion_tokens, cost);

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                ExtractionMetrics::record_llm_failure();
                IngestError::LlmEmptyResponse
            })?;

        let events = parse_events(&content)?;
        info!(events = events.len(), "LLM extraction finished");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn extractor(base_url: &str, tracker: Arc<CostTracker>) -> MistralExtractor {
        let settings = MistralSettings {
            api_key: Some("test-key".to_string()),
            base_url: base_url.to_string(),
            ..Default::default()
        };
        MistralExtractor::new(&settings, tracker).unwrap()
    }

    fn completion(content: &str) -> Value {
        json!({
            "id": "cmpl-1",
            "model": "mistral-small-latest",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1200, "completion_tokens": 300, "total_tokens": 1500}
        })
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let settings = MistralSettings::default();
        let result = MistralExtractor::new(&settings, Arc::new(CostTracker::new()));
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[test]
    fn test_parse_events_defaults_to_empty() {
        assert_eq!(parse_events(r#"{"events": [{"title": "A"}]}"#).unwrap().len(), 1);
        assert!(parse_events(r#"{"events": "none"}"#).unwrap().is_empty());
        assert!(parse_events(r#"{"items": []}"#).unwrap().is_empty());
        assert_eq!(
            parse_events("```json\n{\"events\": [{}]}\n```").unwrap().len(),
            1
        );
        assert!(matches!(parse_events("not json"), Err(IngestError::LlmMalformed(_))));
    }

    #[tokio::test]
    async fn test_extract_events_tracks_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header_matcher("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "mistral-small-latest",
                "temperature": 0.0,
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"events": [{"title": "Jazz im Hof", "location": {"address": "Kulturhof"}, "dailyTimeSlots": [{"date": "2026-10-25"}]}]}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let tracker = Arc::new(CostTracker::new());
        let client = extractor(&server.uri(), tracker.clone());
        let events = client
            .extract_events("<html><script>x()</script><body><h1>Jazz</h1></body></html>", "https://a.test/")
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["title"], "Jazz im Hof");
        let usage = tracker.usage("mistral-small-latest").unwrap();
        assert_eq!(usage.input_tokens, 1200);
        assert_eq!(usage.output_tokens, 300);
    }

    #[tokio::test]
    async fn test_api_error_and_empty_content_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;
        let rate_limited = extractor(&server.uri(), Arc::new(CostTracker::new()));
        let err = rate_limited.extract_events("<p>x</p>", "https://a.test/").await.unwrap_err();
        assert!(matches!(err, IngestError::LlmApi { status: 429, .. }));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;
        let empty = extractor(&server.uri(), Arc::new(CostTracker::new()));
        let err = empty.extract_events("<p>x</p>", "https://a.test/").await.unwrap_err();
        assert!(matches!(err, IngestError::LlmEmptyResponse));
    }
}
