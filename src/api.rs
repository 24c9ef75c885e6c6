use crate::config::ChatConfig;
use crate::error::{FetchError, Outcome};
use crate::http::HttpTransport;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    prompt: String,
}

impl ChatRequest {
    pub fn new(prompt: &str) -> Outcome<Self> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(FetchError::InvalidInput("Please enter your question".to_string()));
        }
        Ok(Self {
            prompt: prompt.to_string(),
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResult {
    pub response_text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default, deserialize_with = "deserialize_content")]
    content: Option<String>,
}

/// `content` is normally a string, but some compatible gateways send a list of parts.
fn deserialize_content<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Part {
        #[serde(default)]
        text: String,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrParts {
        String(String),
        Parts(Vec<Part>),
    }

    match Option::<StringOrParts>::deserialize(deserializer) {
        Ok(Some(StringOrParts::String(s))) => Ok(Some(s)),
        Ok(Some(StringOrParts::Parts(parts))) => {
            Ok(Some(parts.into_iter().map(|p| p.text).collect()))
        }
        Ok(None) => Ok(None),
        Err(_) => Ok(None), // Treat anything else as missing
    }
}

pub struct ChatClient<T: HttpTransport> {
    transport: Arc<T>,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
}

impl<T: HttpTransport> ChatClient<T> {
    pub fn new(transport: Arc<T>, config: &ChatConfig) -> Self {
        Self {
            transport,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn completion_request(&self, request: &ChatRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: self.temperature,
        }
    }

    pub async fn complete(&self, request: &ChatRequest) -> Outcome<ChatResult> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;
        let body = serde_json::to_value(self.completion_request(request))?;

        let raw = self.transport.post_json(&self.api_url, api_key, &body).await?;
        let response: ChatCompletionResponse = serde_json::from_slice(&raw)?;

        debug!("Chat completion returned {} choices", response.choices.len());

        let first = response
            .choices
            .into_iter()
            .next()
            .ok_or(FetchError::NoValidResponse)?;

        first
            .message
            .and_then(|m| m.content)
            .map(|response_text| ChatResult { response_text })
            .ok_or_else(|| FetchError::Parse("first choice has no message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::mock::{MockTransport, Reply};
    use serde_json::json;

    const CHAT_URL: &str = "https://chat.test/v1/chat/completions";

    fn chat_client(
        mock: MockTransport,
        api_key: Option<&str>,
    ) -> (ChatClient<MockTransport>, Arc<MockTransport>) {
        let transport = Arc::new(mock);
        let config = ChatConfig {
            api_url: CHAT_URL.to_string(),
            api_key: api_key.map(str::to_string),
            ..ChatConfig::default()
        };
        (ChatClient::new(transport.clone(), &config), transport)
    }

    fn ask(prompt: &str) -> ChatRequest {
        ChatRequest::new(prompt).unwrap()
    }

    #[tokio::test]
    async fn test_first_choice_content_is_returned() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "X"}},
                {"index": 1, "message": {"role": "assistant", "content": "Y"}}
            ]
        });
        let mock = MockTransport::new().on_text("chat.test", &body.to_string());
        let (client, transport) = chat_client(mock, Some("sk-test"));

        let result = client.complete(&ask("What is a SID?")).await.unwrap();
        assert_eq!(result.response_text, "X");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert_eq!(calls[0].bearer_token.as_deref(), Some("sk-test"));
        assert_eq!(
            calls[0].body.as_ref().unwrap(),
            &json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "What is a SID?"}],
                "temperature": 0.7
            })
        );
    }

    #[tokio::test]
    async fn test_empty_or_missing_choices() {
        for body in [json!({"choices": []}), json!({"object": "chat.completion"})] {
            let mock = MockTransport::new().on_text("chat.test", &body.to_string());
            let (client, _) = chat_client(mock, Some("sk-test"));

            let err = client.complete(&ask("hello")).await.unwrap_err();
            assert!(matches!(err, FetchError::NoValidResponse));
            assert_eq!(err.to_string(), "No valid response received");
        }
    }

    #[tokio::test]
    async fn test_http_error_status() {
        for code in [401u16, 500] {
            let mock = MockTransport::new().on("chat.test", Reply::Status(code));
            let (client, _) = chat_client(mock, Some("sk-test"));

            let err = client.complete(&ask("hello")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Network);
            assert!(err.to_string().contains(&code.to_string()));
        }
    }

    #[tokio::test]
    async fn test_malformed_body_and_missing_content() {
        let mock = MockTransport::new().on_text("chat.test", "<html>bad gateway</html>");
        let (client, _) = chat_client(mock, Some("sk-test"));
        assert_eq!(client.complete(&ask("hi")).await.unwrap_err().kind(), ErrorKind::Parse);

        let body = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
        let mock = MockTransport::new().on_text("chat.test", &body.to_string());
        let (client, _) = chat_client(mock, Some("sk-test"));
        let err = client.complete(&ask("hi")).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_content_parts_are_joined() {
        let body = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "Hello, "},
            {"type": "text", "text": "pilot"}
        ]}}]});
        let mock = MockTransport::new().on_text("chat.test", &body.to_string());
        let (client, _) = chat_client(mock, Some("sk-test"));
        assert_eq!(client.complete(&ask("hi")).await.unwrap().response_text, "Hello, pilot");
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_call() {
        let mock = MockTransport::new().on_text("chat.test", "{}");
        let (client, transport) = chat_client(mock, Some("  "));

        let err = client.complete(&ask("hi")).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingApiKey));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        assert!(ChatRequest::new("   ").is_err());
        assert_eq!(ChatRequest::new("  hi ").unwrap().prompt(), "hi");
    }
}
