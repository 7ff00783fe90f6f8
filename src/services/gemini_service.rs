use std::env;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub args: serde_json::Value,
}

/// Collected model output for one turn: the text body plus any tool calls
/// the model wants executed before it will continue.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// A tool made available to the model: name, purpose, JSON-schema
/// parameters. Carries no execution logic.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Output of one executed tool call, sent back to the model.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub name: String,
    pub content: serde_json::Value,
}

/// One turn of the exchange with the model. Multi-turn conversations are
/// replayed in full on every request.
#[derive(Debug, Clone)]
pub enum ModelMessage {
    User { text: String },
    Assistant { reply: ModelReply },
    ToolResults { outputs: Vec<ToolOutput> },
}

#[derive(Debug)]
pub enum GenerativeError {
    Configuration(String),
    Http(String),
    MalformedResponse(String),
}

impl fmt::Display for GenerativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerativeError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            GenerativeError::Http(msg) => write!(f, "Model request failed: {}", msg),
            GenerativeError::MalformedResponse(msg) => {
                write!(f, "Malformed model response: {}", msg)
            }
        }
    }
}

impl std::error::Error for GenerativeError {}

/// Generative text/tool-call collaborator. The production implementation
/// talks to Gemini; tests substitute scripted replies.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, GenerativeError>;
}

// Wire format for the generateContent endpoint.

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDeclarations>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_call: None,
            function_response: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolDeclarations {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Fails fast when the API key is absent, before any network call.
    pub fn new() -> Result<Self, GenerativeError> {
        let api_key = env::var("GOOGLE_AI_API_KEY").map_err(|_| {
            GenerativeError::Configuration("GOOGLE_AI_API_KEY is not configured".to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GenerativeError::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model: GEMINI_MODEL.to_string(),
        })
    }

    fn build_contents(messages: &[ModelMessage]) -> Vec<Content> {
        let mut contents = Vec::with_capacity(messages.len());
        for message in messages {
            match message {
                ModelMessage::User { text } => contents.push(Content {
                    role: "user".to_string(),
                    parts: vec![Part::text(text.clone())],
                }),
                ModelMessage::Assistant { reply } => {
                    let mut parts = Vec::new();
                    if !reply.text.is_empty() {
                        parts.push(Part::text(reply.text.clone()));
                    }
                    for call in &reply.tool_calls {
                        parts.push(Part {
                            text: None,
                            function_call: Some(FunctionCall {
                                name: call.name.clone(),
                                args: call.args.clone(),
                            }),
                            function_response: None,
                        });
                    }
                    contents.push(Content {
                        role: "model".to_string(),
                        parts,
                    });
                }
                ModelMessage::ToolResults { outputs } => contents.push(Content {
                    role: "user".to_string(),
                    parts: outputs
                        .iter()
                        .map(|output| Part {
                            text: None,
                            function_call: None,
                            function_response: Some(FunctionResponse {
                                name: output.name.clone(),
                                response: output.content.clone(),
                            }),
                        })
                        .collect(),
                }),
            }
        }
        contents
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, GenerativeError> {
        let request = GenerateContentRequest {
            contents: Self::build_contents(messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(vec![ToolDeclarations {
                    function_declarations: tools
                        .iter()
                        .map(|tool| FunctionDeclaration {
                            name: tool.name.clone(),
                            description: tool.description.clone(),
                            parameters: tool.parameters.clone(),
                        })
                        .collect(),
                }])
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE_URL, self.model, self.api_key
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerativeError::Http(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| GenerativeError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerativeError::Http(format!(
                "Gemini API returned {}: {}",
                status, response_text
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerativeError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or_else(|| {
                GenerativeError::MalformedResponse("response contained no candidates".to_string())
            })?;

        let mut reply = ModelReply::default();
        for part in content.parts {
            if let Some(text) = part.text {
                reply.text.push_str(&text);
            }
            if let Some(call) = part.function_call {
                reply.tool_calls.push(ToolCallRequest {
                    name: call.name,
                    args: call.args,
                });
            }
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_results_become_function_responses() {
        let messages = vec![
            ModelMessage::User {
                text: "plan a trip".to_string(),
            },
            ModelMessage::Assistant {
                reply: ModelReply {
                    text: String::new(),
                    tool_calls: vec![ToolCallRequest {
                        name: "validate_place".to_string(),
                        args: json!({"place_name": "Louvre"}),
                    }],
                },
            },
            ModelMessage::ToolResults {
                outputs: vec![ToolOutput {
                    name: "validate_place".to_string(),
                    content: json!({"found": true}),
                }],
            },
        ];

        let contents = GeminiClient::build_contents(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");
        assert!(contents[1].parts[0].function_call.is_some());
        assert_eq!(contents[2].role, "user");
        assert!(contents[2].parts[0].function_response.is_some());
    }

    #[test]
    fn test_response_parsing_collects_text_and_calls() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "checking places"},
                        {"functionCall": {"name": "validate_place", "args": {"place_name": "Uffizi", "location": "Florence", "type": "museum"}}}
                    ]
                }
            }]
        });

        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        let content = parsed.candidates[0].content.as_ref().unwrap();
        assert_eq!(content.parts.len(), 2);
        assert_eq!(
            content.parts[1].function_call.as_ref().unwrap().name,
            "validate_place"
        );
    }
}
