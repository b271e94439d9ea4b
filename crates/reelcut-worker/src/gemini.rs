//! Gemini client for per-frame classification.
//!
//! Each frame is sent as an inline JPEG with a forced `classify_frame`
//! function call, so the answer arrives as structured arguments rather
//! than free text.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use reelcut_models::{FrameAction, FrameAnalysis};

use crate::classifier::FrameClassificationService;
use crate::config::{AnalyzerConfig, CriteriaConfig};
use crate::error::{WorkerError, WorkerResult};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const FUNCTION_NAME: &str = "classify_frame";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClassifier {
    api_key: String,
    client: Client,
    endpoint: String,
    model: String,
    system_instruction: String,
}

impl std::fmt::Debug for GeminiClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClassifier")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    tools: Vec<Tool>,
    tool_config: ToolConfig,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionCallingConfig {
    mode: String,
    allowed_function_names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Arguments of the `classify_frame` call.
#[derive(Debug, Deserialize)]
struct ClassificationArgs {
    action: FrameAction,
    confidence: f64,
    reason: Option<String>,
}

impl GeminiClassifier {
    /// Create a new client; fails on an invalid configuration.
    pub fn new(config: &AnalyzerConfig) -> WorkerResult<Self> {
        config.validate()?;

        Ok(Self {
            api_key: config.api_key.trim().to_string(),
            client: Client::new(),
            endpoint: config
                .endpoint
                .as_deref()
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_instruction: build_system_instruction(&config.criteria),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, image: &[u8], frame_ordinal: u32) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: self.system_instruction.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: BASE64.encode(image),
                        },
                    },
                    Part::Text {
                        text: format!(
                            "Classify sampled frame #{} by calling {}.",
                            frame_ordinal, FUNCTION_NAME
                        ),
                    },
                ],
            }],
            tools: vec![Tool {
                function_declarations: vec![function_declaration()],
            }],
            tool_config: ToolConfig {
                function_calling_config: FunctionCallingConfig {
                    mode: "ANY".to_string(),
                    allowed_function_names: vec![FUNCTION_NAME.to_string()],
                },
            },
            generation_config: GenerationConfig { temperature: 0.0 },
        }
    }

    /// Call the `generateContent` endpoint.
    ///
    /// The key travels in a header and reqwest errors are rendered without
    /// their URL, so failures never carry the credential.
    async fn call_gemini_api(
        &self,
        request: &GenerateContentRequest,
    ) -> WorkerResult<GenerateContentResponse> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                WorkerError::classification_failed(format!(
                    "Gemini API request failed: {}",
                    e.without_url()
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::classification_status(
                status.as_u16(),
                format!("Gemini API returned {}: {}", status, error_text.trim()),
            ));
        }

        response.json().await.map_err(|e| {
            WorkerError::classification_failed(format!(
                "Failed to parse Gemini response: {}",
                e.without_url()
            ))
        })
    }
}

#[async_trait]
impl FrameClassificationService for GeminiClassifier {
    async fn classify(&self, image: &[u8], frame_ordinal: u32) -> WorkerResult<FrameAnalysis> {
        let request = self.build_request(image, frame_ordinal);
        let response = self.call_gemini_api(&request).await?;
        let analysis = parse_classification(response, frame_ordinal)?;

        debug!(
            frame = frame_ordinal,
            action = %analysis.action(),
            confidence = analysis.confidence(),
            "Frame classified"
        );
        Ok(analysis)
    }
}

fn parse_classification(
    response: GenerateContentResponse,
    frame_ordinal: u32,
) -> WorkerResult<FrameAnalysis> {
    let call = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.function_call)
        .find(|call| call.name == FUNCTION_NAME)
        .ok_or_else(|| {
            WorkerError::classification_failed(format!(
                "No {} call in Gemini response",
                FUNCTION_NAME
            ))
        })?;

    let args: ClassificationArgs = serde_json::from_value(call.args).map_err(|e| {
        WorkerError::classification_failed(format!("Malformed {} arguments: {}", FUNCTION_NAME, e))
    })?;

    if !(0.0..=1.0).contains(&args.confidence) {
        return Err(WorkerError::classification_failed(format!(
            "Confidence {} is outside [0, 1]",
            args.confidence
        )));
    }

    Ok(FrameAnalysis::new(
        args.action,
        args.confidence,
        args.reason.filter(|r| !r.trim().is_empty()),
        frame_ordinal,
    ))
}

fn function_declaration() -> serde_json::Value {
    let actions: Vec<&str> = FrameAction::ALL.iter().map(FrameAction::as_str).collect();
    json!({
        "name": FUNCTION_NAME,
        "description": "Record how this frame's interval should be edited.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "action": {
                    "type": "STRING",
                    "enum": actions,
                    "description": "Editing decision for the interval starting at this frame."
                },
                "confidence": {
                    "type": "NUMBER",
                    "description": "Confidence in the decision, from 0.0 to 1.0."
                },
                "reason": {
                    "type": "STRING",
                    "description": "One short sentence explaining the decision."
                }
            },
            "required": ["action", "confidence", "reason"]
        }
    })
}

fn build_system_instruction(criteria: &CriteriaConfig) -> String {
    format!(
        r#"You review frames sampled at a fixed interval from a video that is being shortened.
For every frame, decide what should happen to the footage from this frame until the next one.

- keep: {keep}
- remove: {remove}
- speed_up: {speed_up}

Always answer by calling {function} exactly once. Report a confidence between 0.0 and 1.0."#,
        keep = criteria.text(FrameAction::Keep),
        remove = criteria.text(FrameAction::Remove),
        speed_up = criteria.text(FrameAction::SpeedUp),
        function = FUNCTION_NAME,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ROUTE: &str = "/models/gemini-2.5-flash:generateContent";

    fn config(endpoint: &str) -> AnalyzerConfig {
        let mut config = AnalyzerConfig::new("test-key");
        config.endpoint = Some(endpoint.to_string());
        config
    }

    fn function_call_body(args: serde_json::Value) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "classify_frame", "args": args } }]
                }
            }]
        })
    }

    #[tokio::test]
    async fn test_classify_parses_function_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(function_call_body(json!({
                "action": "speed_up",
                "confidence": 0.85,
                "reason": "Typing on a keyboard"
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(&config(&server.uri())).unwrap();
        let analysis = classifier.classify(b"jpeg", 4).await.unwrap();

        assert_eq!(analysis.action(), FrameAction::SpeedUp);
        assert_eq!(analysis.confidence(), 0.85);
        assert_eq!(analysis.reason(), Some("Typing on a keyboard"));
        assert_eq!(analysis.frame_ordinal(), 4);
    }

    #[tokio::test]
    async fn test_request_forces_function_call() {
        let classifier = GeminiClassifier::new(&config("http://localhost")).unwrap();
        let request = serde_json::to_value(classifier.build_request(b"abc", 1)).unwrap();

        assert_eq!(request["toolConfig"]["functionCallingConfig"]["mode"], "ANY");
        assert_eq!(
            request["toolConfig"]["functionCallingConfig"]["allowedFunctionNames"][0],
            "classify_frame"
        );
        assert_eq!(request["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(request["contents"][0]["parts"][0]["inlineData"]["data"], "YWJj");
        assert_eq!(
            request["tools"][0]["functionDeclarations"][0]["parameters"]["properties"]["action"]["enum"],
            json!(["speed_up", "remove", "keep"])
        );
        assert!(request["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("speed_up:"));
    }

    #[tokio::test]
    async fn test_server_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(&config(&server.uri())).unwrap();
        let err = classifier.classify(b"jpeg", 1).await.unwrap_err();

        assert!(matches!(
            err,
            WorkerError::ClassificationFailed { status: Some(500), .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_function_call_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "keep" }] } }]
            })))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(&config(&server.uri())).unwrap();
        let err = classifier.classify(b"jpeg", 1).await.unwrap_err();
        assert!(err.to_string().contains("No classify_frame call"));
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(ResponseTemplate::new(200).set_body_json(function_call_body(json!({
                "action": "keep",
                "confidence": 1.4,
                "reason": "Speaking to camera"
            }))))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(&config(&server.uri())).unwrap();
        assert!(classifier.classify(b"jpeg", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_action_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(ResponseTemplate::new(200).set_body_json(function_call_body(json!({
                "action": "blur",
                "confidence": 0.9
            }))))
            .mount(&server)
            .await;

        let classifier = GeminiClassifier::new(&config(&server.uri())).unwrap();
        assert!(classifier.classify(b"jpeg", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let mut config = AnalyzerConfig::new("secret-key-123");
        config.endpoint = Some("http://127.0.0.1:1".to_string());

        let classifier = GeminiClassifier::new(&config).unwrap();
        let err = classifier.classify(b"jpeg", 1).await.unwrap_err();

        assert!(matches!(err, WorkerError::ClassificationFailed { .. }));
        assert!(!err.to_string().contains("secret-key-123"));
        assert!(!err.details().to_string().contains("secret-key-123"));
    }

    #[tokio::test]
    async fn test_undecodable_body_does_not_expose_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let mut config = config(&server.uri());
        config.api_key = "secret-key-123".to_string();
        let classifier = GeminiClassifier::new(&config).unwrap();
        let err = classifier.classify(b"jpeg", 1).await.unwrap_err();

        assert!(err.to_string().contains("Failed to parse Gemini response"));
        assert!(!err.to_string().contains("secret-key-123"));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_any_call() {
        let mut config = AnalyzerConfig::new("");
        assert!(matches!(
            GeminiClassifier::new(&config),
            Err(WorkerError::ConfigError(_))
        ));

        config.api_key = "key".to_string();
        config.confidence_threshold = -0.1;
        assert!(GeminiClassifier::new(&config).is_err());
    }
}
