//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` over the Ollama HTTP API. Completions go
//! through `/api/chat` with the registry's tools offered in function-calling
//! format; streamed answers arrive as newline-delimited JSON objects.

use std::collections::HashMap;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{
        Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider,
        ModelInfo, ProviderInfo, StreamChunk, TokenUsage,
    },
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// `scheme://host:port`; a bare host gets `http://`
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}:{}", self.port)
        } else {
            format!("http://{host}:{}", self.port)
        }
    }
}

// ---- wire format ----

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    options: WireOptions,
}

#[derive(Debug, Serialize)]
struct WireOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatResponse {
    model: String,
    message: Option<WireMessage>,
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagModel {
    name: String,
    details: Option<TagDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagDetails {
    families: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

fn to_wire(message: &Message) -> WireMessage {
    match message {
        Message::System { content } => WireMessage {
            role: "system".into(),
            content: content.clone(),
            ..Default::default()
        },
        Message::Human { content } => WireMessage {
            role: "user".into(),
            content: content.clone(),
            ..Default::default()
        },
        Message::Ai { content, tool_calls } => WireMessage {
            role: "assistant".into(),
            content: content.clone(),
            tool_calls: tool_calls
                .iter()
                .map(|call| WireToolCall {
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: Value::Object(
                            call.arguments
                                .iter()
                                .map(|(k, v)| (k.clone(), v.clone()))
                                .collect::<Map<_, _>>(),
                        ),
                    },
                })
                .collect(),
            ..Default::default()
        },
        Message::ToolResult(result) => WireMessage {
            role: "tool".into(),
            content: result.output.clone(),
            tool_name: Some(result.name.clone()),
            ..Default::default()
        },
    }
}

fn tool_definition(schema: &ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": schema.name,
            "description": schema.description,
            "parameters": schema.parameters_json_schema(),
        }
    })
}

/// Arguments arrive as an object; some models send a JSON string instead
fn arguments_map(arguments: Value) -> HashMap<String, Value> {
    match arguments {
        Value::Object(map) => map.into_iter().collect(),
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Unparseable tool arguments, passing none");
            HashMap::new()
        }),
        _ => HashMap::new(),
    }
}

fn from_wire_calls(calls: Vec<WireToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|c| ToolCall::new(c.function.name, arguments_map(c.function.arguments)))
        .collect()
}

fn token_usage(prompt: Option<u32>, completion: Option<u32>) -> Option<TokenUsage> {
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    let prompt_tokens = prompt.unwrap_or(0);
    let completion_tokens = completion.unwrap_or(0);
    Some(TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens.saturating_add(completion_tokens),
    })
}

impl ChatResponse {
    fn into_completion(self, requested_model: &str) -> Result<Completion> {
        if let Some(error) = self.error {
            return Err(AgentError::Provider(error));
        }

        let usage = token_usage(self.prompt_eval_count, self.eval_count);
        let message = self.message.unwrap_or_default();
        let tool_calls = from_wire_calls(message.tool_calls);
        let finish_reason = if !tool_calls.is_empty() {
            FinishReason::ToolUse
        } else if self.done_reason.as_deref() == Some("length") {
            FinishReason::Length
        } else {
            FinishReason::Stop
        };

        Ok(Completion {
            content: message.content,
            tool_calls,
            model: if self.model.is_empty() { requested_model.to_string() } else { self.model },
            usage,
            finish_reason: Some(finish_reason),
        })
    }

    fn into_chunk(self) -> Result<StreamChunk> {
        if let Some(error) = self.error {
            return Err(AgentError::Provider(error));
        }

        let usage = if self.done {
            token_usage(self.prompt_eval_count, self.eval_count)
        } else {
            None
        };
        let message = self.message.unwrap_or_default();

        Ok(StreamChunk {
            delta: message.content,
            tool_calls: from_wire_calls(message.tool_calls),
            done: self.done,
            usage,
        })
    }
}

// ---- NDJSON streaming ----

type ByteStream = BoxStream<'static, std::result::Result<Vec<u8>, String>>;

/// Splits a byte stream into lines, carrying partial lines between reads
struct LineReader {
    bytes: ByteStream,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl LineReader {
    async fn next_chunk(&mut self) -> Option<Result<StreamChunk>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                if let Some(chunk) = parse_line(&line) {
                    return Some(chunk);
                }
                continue;
            }

            if self.exhausted {
                let rest = std::mem::take(&mut self.buffer);
                return parse_line(&rest);
            }

            match self.bytes.next().await {
                Some(Ok(bytes)) => self.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    self.exhausted = true;
                    self.buffer.clear();
                    return Some(Err(AgentError::ModelUnavailable(format!(
                        "Ollama stream interrupted: {e}"
                    ))));
                }
                None => self.exhausted = true,
            }
        }
    }
}

fn parse_line(line: &[u8]) -> Option<Result<StreamChunk>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice::<ChatResponse>(line)
            .map_err(|e| AgentError::Provider(format!("Malformed stream chunk: {e}")))
            .and_then(ChatResponse::into_chunk),
    )
}

/// Decode an NDJSON chat body into completion chunks
pub fn ndjson_chunks<S, B, E>(bytes: S) -> CompletionStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let reader = LineReader {
        bytes: bytes
            .map(|item| item.map(|b| b.as_ref().to_vec()).map_err(|e| e.to_string()))
            .boxed(),
        buffer: Vec::new(),
        exhausted: false,
    };

    Box::pin(futures::stream::unfold(reader, |mut reader| async move {
        let chunk = reader.next_chunk().await?;
        Some((chunk, reader))
    }))
}

/// Ollama LLM provider
pub struct OllamaProvider {
    http: reqwest::Client,
    config: OllamaConfig,
    base_url: String,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            config,
        })
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn request<'a>(
        messages: &[Message],
        tools: &[ToolSchema],
        options: &'a GenerationOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &options.model,
            messages: messages.iter().map(to_wire).collect(),
            tools: tools.iter().map(tool_definition).collect(),
            stream,
            options: WireOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.max_tokens,
                stop: options.stop_sequences.clone(),
            },
        }
    }

    async fn post_chat(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(
            model = body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            stream = body.stream,
            "Sending chat request"
        );

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ChatResponse>(&body)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or(body);
        tracing::warn!(%status, %detail, "Ollama rejected chat request");
        Err(AgentError::Provider(format!("Ollama returned {status}: {detail}")))
    }

    async fn version(&self) -> Option<String> {
        let url = format!("{}/api/version", self.base_url);
        let response = self.http.get(&url).send().await.ok()?;
        response.json::<VersionResponse>().await.ok().map(|v| v.version)
    }
}

fn transport_error(e: reqwest::Error) -> AgentError {
    AgentError::ModelUnavailable(format!("Ollama request failed: {e}"))
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "Ollama".into(),
            version: self.version().await,
            models,
            supports_streaming: true,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "Ollama health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::request(messages, tools, options, false);
        let response = self.post_chat(&body).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Malformed Ollama response: {e}")))?;

        parsed.into_completion(&options.model)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let body = Self::request(messages, tools, options, true);
        let response = self.post_chat(&body).await?;

        Ok(ndjson_chunks(response.bytes_stream()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Malformed model list: {e}")))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| {
                let supports_vision = m
                    .details
                    .and_then(|d| d.families)
                    .is_some_and(|f| f.iter().any(|name| name == "clip" || name == "mllama"));
                ModelInfo {
                    id: m.name.clone(),
                    name: m.name,
                    context_length: None,
                    supports_vision,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::provider::collect_stream;
    use agent_core::tool::ParameterSchema;
    use agent_core::ToolResult;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OllamaProvider {
        OllamaProvider::new(OllamaConfig::new("http://127.0.0.1", server.address().port())).unwrap()
    }

    fn search_schema() -> ToolSchema {
        ToolSchema {
            name: "restaurant_search".into(),
            description: "Find restaurants".into(),
            parameters: vec![ParameterSchema {
                name: "cuisine".into(),
                param_type: "string".into(),
                description: "Cuisine".into(),
                required: true,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert_eq!(config.base_url(), "http://localhost:11434");
        assert_eq!(OllamaConfig::new("ollama", 8080).base_url(), "http://ollama:8080");
    }

    #[test]
    fn test_message_conversion() {
        let mut args = HashMap::new();
        args.insert("cuisine".to_string(), json!("sushi"));
        let messages = vec![
            Message::system("You are helpful."),
            Message::human("sushi please"),
            Message::ai_with_tool_calls("", vec![ToolCall::new("restaurant_search", args)]),
            Message::tool(ToolResult::success("restaurant_search", "[]")),
        ];

        let wire: Vec<Value> = messages
            .iter()
            .map(|m| serde_json::to_value(to_wire(m)).unwrap())
            .collect();

        assert_eq!(wire[0], json!({"role": "system", "content": "You are helpful."}));
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[2]["tool_calls"][0]["function"]["arguments"]["cuisine"], "sushi");
        assert_eq!(wire[3], json!({"role": "tool", "content": "[]", "tool_name": "restaurant_search"}));
    }

    #[test]
    fn test_tool_definition_shape() {
        let definition = tool_definition(&search_schema());
        assert_eq!(definition["type"], "function");
        assert_eq!(definition["function"]["name"], "restaurant_search");
        assert_eq!(definition["function"]["parameters"]["required"], json!(["cuisine"]));
    }

    #[test]
    fn test_string_arguments_are_parsed() {
        let args = arguments_map(json!("{\"movie_title\": \"Heat\"}"));
        assert_eq!(args.get("movie_title"), Some(&json!("Heat")));
        assert!(arguments_map(json!("not json")).is_empty());
    }

    #[tokio::test]
    async fn test_complete_with_tool_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": "llama3.2", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{"function": {"name": "restaurant_search", "arguments": {"cuisine": "sushi"}}}]
                },
                "done": true,
                "prompt_eval_count": 10,
                "eval_count": 5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = provider(&server)
            .complete(&[Message::human("sushi")], &[search_schema()], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "restaurant_search");
        assert_eq!(completion.tool_calls[0].str_arg("cuisine"), Some("sushi"));
        assert!(!completion.tool_calls[0].id.is_empty());
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[tokio::test]
    async fn test_unknown_model_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "model \"nope\" not found"})))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&[Message::human("hi")], &[], &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Provider(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_slow_model_hits_configured_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": {"role": "assistant", "content": "late"}, "done": true}))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = OllamaConfig::new("127.0.0.1", server.address().port()).with_timeout_secs(1);
        let err = OllamaProvider::new(config)
            .unwrap()
            .complete(&[Message::human("hi")], &[], &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ModelUnavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_model_unavailable() {
        let provider = OllamaProvider::new(OllamaConfig::new("127.0.0.1", 1)).unwrap();

        let err = provider
            .complete(&[Message::human("hi")], &[], &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ModelUnavailable(_)));
        assert!(!provider.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_streamed_answer_is_collected() {
        let server = MockServer::start().await;
        let body = [
            json!({"message": {"role": "assistant", "content": "Hello"}, "done": false}),
            json!({"message": {"role": "assistant", "content": " there"}, "done": false}),
            json!({"message": {"role": "assistant", "content": ""}, "done": true, "eval_count": 2}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let stream = provider(&server)
            .complete_stream(&[Message::human("hi")], &[], &GenerationOptions::default())
            .await
            .unwrap();
        let completion = collect_stream(stream, "llama3.2").await.unwrap();

        assert_eq!(completion.content, "Hello there");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_ndjson_lines_split_across_reads() {
        let reads: Vec<std::result::Result<&'static [u8], String>> = vec![
            Ok(b"{\"message\":{\"content\":\"Hel".as_slice()),
            Ok(b"lo\"},\"done\":false}\n\n{\"message\":{\"content\":\"!\",\"tool_calls\":".as_slice()),
            Ok(b"[{\"function\":{\"name\":\"get_movie_recommendations\",\"arguments\":{\"movie_title\":\"Heat\"}}}]},\"done\":true}".as_slice()),
        ];

        let completion = collect_stream(ndjson_chunks(futures::stream::iter(reads)), "m")
            .await
            .unwrap();

        assert_eq!(completion.content, "Hello!");
        assert_eq!(completion.tool_calls[0].str_arg("movie_title"), Some("Heat"));
    }

    #[tokio::test]
    async fn test_stream_without_done_is_model_unavailable() {
        let reads: Vec<std::result::Result<&'static [u8], String>> =
            vec![Ok(b"{\"message\":{\"content\":\"partial\"},\"done\":false}\n".as_slice())];

        let err = collect_stream(ndjson_chunks(futures::stream::iter(reads)), "m")
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    {"name": "llama3.2:latest", "details": {"families": ["llama"]}},
                    {"name": "llava:7b", "details": {"families": ["llama", "clip"]}}
                ]
            })))
            .mount(&server)
            .await;

        let models = provider(&server).list_models().await.unwrap();

        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "llama3.2:latest");
        assert!(!models[0].supports_vision);
        assert!(models[1].supports_vision);
    }
}
