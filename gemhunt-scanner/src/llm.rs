use crate::client::build_client;
use crate::collaborator::{KeywordSuggester, LeafContext, LinkDiscoverer};
use crate::error::{Result, ScanError};
use crate::prompts::{keyword_prompt, link_prompt, sources_prompt};
use crate::result::{LinkRecord, Lookup};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

pub const DEFAULT_OPENROUTER_MODELS: &[&str] = &["openchat/openchat-3.5-0106", "openai/gpt-3.5-turbo"];
pub const DEFAULT_GROQ_MODELS: &[&str] = &["llama3-70b-8192"];

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completion client with an ordered model fallback list.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    models: Vec<String>,
    temperature: Option<f32>,
}

impl ChatClient {
    pub fn new(endpoint: &str, api_key: &str, models: Vec<String>, timeout_secs: u64) -> Result<Self> {
        if api_key.is_empty() {
            return Err(ScanError::MissingCredential("chat completion API key"));
        }
        if models.is_empty() {
            return Err(ScanError::Other("at least one model is required".to_string()));
        }
        Ok(Self {
            client: build_client(timeout_secs)?,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            models,
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    /// Send `prompt` to each model in turn and return the first non-empty reply.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;

        for model in &self.models {
            debug!("Trying model {}", model);
            match self.complete_with(model, prompt).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!("Model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ScanError::Other("no models configured".to_string())))
    }

    async fn complete_with(&self, model: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ScanError::ParseError("response carried no choices".to_string()))
    }
}

/// Find the first JSON array embedded in free text.
///
/// Models like to wrap answers in prose or code fences; every `[` is tried as
/// the start of a JSON value until one parses as an array.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    for (start, _) in text.match_indices('[') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Array(items))) = stream.next() {
            return Some(items);
        }
    }
    None
}

pub fn parse_keywords(text: &str) -> Vec<String> {
    extract_json_array(text)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|kw| !kw.is_empty())
        .map(String::from)
        .collect()
}

pub fn parse_link_records(text: &str) -> Vec<LinkRecord> {
    extract_json_array(text)
        .unwrap_or_default()
        .iter()
        .filter_map(LinkRecord::from_value)
        .collect()
}

pub struct LlmKeywordSuggester {
    chat: ChatClient,
}

impl LlmKeywordSuggester {
    pub fn new(chat: ChatClient) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl KeywordSuggester for LlmKeywordSuggester {
    async fn suggest(&self, context: &LeafContext) -> Lookup<Vec<String>> {
        let reply = match self.chat.complete(&keyword_prompt(context)).await {
            Ok(reply) => reply,
            Err(e) => return Lookup::Transient(e.to_string()),
        };

        let keywords = parse_keywords(&reply);
        if keywords.is_empty() {
            warn!("No keyword array in reply for {}", context.display_path());
        } else {
            info!("{} keywords for {}", keywords.len(), context.display_path());
        }
        Lookup::from_vec(keywords)
    }
}

/// Asks the model directly for link records instead of going through a search engine.
pub struct LlmLinkDiscoverer {
    chat: ChatClient,
    language: String,
    limit: usize,
}

impl LlmLinkDiscoverer {
    pub fn new(chat: ChatClient, language: impl Into<String>, limit: usize) -> Self {
        Self {
            chat,
            language: language.into(),
            limit,
        }
    }
}

#[async_trait]
impl LinkDiscoverer for LlmLinkDiscoverer {
    async fn discover(&self, query: &str) -> Lookup<Vec<LinkRecord>> {
        let prompt = link_prompt(query, &self.language, self.limit);
        match self.chat.complete(&prompt).await {
            Ok(reply) => {
                let mut records = parse_link_records(&reply);
                records.truncate(self.limit);
                Lookup::from_vec(records)
            }
            Err(e) => Lookup::Transient(e.to_string()),
        }
    }
}

/// Ask for rare source sites (url, desc, reason) for a single subject.
pub async fn suggest_sources(chat: &ChatClient, context: &LeafContext) -> Lookup<Vec<LinkRecord>> {
    match chat.complete(&sources_prompt(context)).await {
        Ok(reply) => Lookup::from_vec(parse_link_records(&reply)),
        Err(e) => Lookup::Transient(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    fn chat_body(content: &str) -> Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    fn client_for(server: &MockServer, models: &[&str]) -> ChatClient {
        ChatClient::new(
            &format!("{}/v1/chat/completions", server.uri()),
            "test-key",
            models.iter().map(|m| m.to_string()).collect(),
            5,
        )
        .unwrap()
    }

    #[test]
    fn test_extract_json_array_plain() {
        let items = extract_json_array(r#"["a", "b"]"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_extract_json_array_with_prose() {
        let text = "Sure! Here are some ideas:\n```json\n[\"lens diagrams\", \"optics scrolls\"]\n```\nEnjoy.";
        let keywords = parse_keywords(text);
        assert_eq!(keywords, vec!["lens diagrams", "optics scrolls"]);
    }

    #[test]
    fn test_extract_json_array_first_array_wins() {
        let text = "Note [1]: see below. [\"kept\"]";
        // "[1]" is itself a valid array, so it wins
        assert_eq!(extract_json_array(text).unwrap(), vec![json!(1)]);
        assert!(parse_keywords(text).is_empty());
    }

    #[test]
    fn test_extract_json_array_none() {
        assert!(extract_json_array("no json here").is_none());
        assert!(extract_json_array("[unterminated").is_none());
    }

    #[test]
    fn test_parse_link_records_drops_invalid() {
        let text = r#"Results:
[
  {"url": "https://a.com/x.jpg", "desc": "d", "reason": "rare"},
  {"desc": "missing url"},
  {"url": "", "desc": "empty url"}
]"#;
        let records = parse_link_records(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://a.com/x.jpg");
        assert_eq!(records[0].extra.get("reason"), Some(&json!("rare")));
    }

    #[test]
    fn test_chat_client_requires_key() {
        let result = ChatClient::new(OPENROUTER_ENDPOINT, "", vec!["m".into()], 5);
        assert!(matches!(result, Err(ScanError::MissingCredential(_))));
    }

    #[tokio::test]
    async fn test_keyword_suggester_parses_reply() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("Here you go: [\"lens diagrams\", \"prism charts\"]")),
            )
            .mount(&mock_server)
            .await;

        let suggester = LlmKeywordSuggester::new(client_for(&mock_server, &["model-a"]));
        let ctx = LeafContext::new(vec!["Physics".into(), "Optics".into()], "Arabic");
        let result = suggester.suggest(&ctx).await;

        assert_eq!(
            result,
            Lookup::Found(vec!["lens diagrams".to_string(), "prism charts".to_string()])
        );
    }

    #[tokio::test]
    async fn test_model_fallback_uses_second_model() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"model": "broken"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "rate limited"})))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"model": "working"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("[\"ok\"]")))
            .mount(&mock_server)
            .await;

        let chat = client_for(&mock_server, &["broken", "working"]);
        let reply = chat.complete("prompt").await.unwrap();
        assert_eq!(reply, "[\"ok\"]");
    }

    #[tokio::test]
    async fn test_temperature_is_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"model": "m", "temperature": 0.5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("[]")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let chat = client_for(&mock_server, &["m"]).with_temperature(0.5);
        assert_eq!(chat.complete("prompt").await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_keyword_suggester_transient_on_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let suggester = LlmKeywordSuggester::new(client_for(&mock_server, &["model-a"]));
        let ctx = LeafContext::new(vec!["Physics".into()], "Arabic");
        assert!(matches!(suggester.suggest(&ctx).await, Lookup::Transient(_)));
    }

    #[tokio::test]
    async fn test_keyword_suggester_empty_on_malformed_reply() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("I cannot help with that.")))
            .mount(&mock_server)
            .await;

        let suggester = LlmKeywordSuggester::new(client_for(&mock_server, &["model-a"]));
        let ctx = LeafContext::new(vec!["Physics".into()], "Arabic");
        assert_eq!(suggester.suggest(&ctx).await, Lookup::Empty);
    }

    #[tokio::test]
    async fn test_link_discoverer_truncates() {
        let mock_server = MockServer::start().await;
        let reply = serde_json::to_string(
            &(0..8)
                .map(|i| json!({"url": format!("https://x.com/{}", i), "desc": "d"}))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(&reply)))
            .mount(&mock_server)
            .await;

        let discoverer = LlmLinkDiscoverer::new(client_for(&mock_server, &["m"]), "Arabic", 5);
        match discoverer.discover("lens diagrams").await {
            Lookup::Found(records) => assert_eq!(records.len(), 5),
            other => panic!("expected records, got {:?}", other),
        }
    }
}
