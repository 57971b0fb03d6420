//! Gemini `generateContent` backend for [SubjectExtractor].

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{ExtractedRow, ExtractionError, ImageInput, SubjectExtractor};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const EXTRACTION_PROMPT: &str = "Analyze the provided image, which shows a table of student \
attendance. Extract the following columns for each row: \"Subject code\", \"Subject name\", \
\"Present\" (attended classes), and \"Total\" (total classes). Ignore the 'Percentage' column. \
Return the data as a JSON array of objects.";

pub struct GeminiExtractor {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiExtractor {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
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
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn row_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "subject_code": {
                    "type": "STRING",
                    "description": "The subject code, e.g., CSEN2031"
                },
                "subject_name": {
                    "type": "STRING",
                    "description": "The full name of the subject."
                },
                "present": {
                    "type": "INTEGER",
                    "description": "Number of classes attended."
                },
                "total": {
                    "type": "INTEGER",
                    "description": "Total number of classes held."
                }
            },
            "required": ["subject_code", "subject_name", "present", "total"]
        }
    })
}

fn build_request(image: &ImageInput) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: EXTRACTION_PROMPT.to_string(),
                },
                Part::Image {
                    inline_data: InlineData {
                        mime_type: image.mime_type.to_string(),
                        data: STANDARD.encode(&image.bytes),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: row_schema(),
        },
    }
}

/// Pulls the table out of the first candidate. The model answers with the JSON array as text.
fn parse_rows(response: GenerateResponse) -> Result<Vec<ExtractedRow>, ExtractionError> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| ExtractionError::MalformedResponse("no text in response".to_string()))?;

    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| ExtractionError::MalformedResponse(format!("invalid json: {e}")))?;
    if !value.is_array() {
        return Err(ExtractionError::MalformedResponse(
            "expected a json array".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| ExtractionError::MalformedResponse(format!("unexpected row format: {e}")))
}

#[async_trait]
impl SubjectExtractor for GeminiExtractor {
    #[instrument(skip_all, fields(model = %self.model, bytes = image.bytes.len()))]
    async fn extract(&self, image: &ImageInput) -> Result<Vec<ExtractedRow>, ExtractionError> {
        let api_key = self.api_key.as_ref().ok_or(ExtractionError::MissingApiKey)?;

        let response = self
            .client
            .post(self.generate_content_url())
            .header("x-goog-api-key", api_key)
            .json(&build_request(image))
            .send()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;
        let rows = parse_rows(response)?;
        debug!("Gemini returned {} rows", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::import::{ExtractionError, ImageInput, SubjectExtractor};

    use super::GeminiExtractor;

    fn image() -> ImageInput {
        ImageInput::new(b"fake image".to_vec(), "image/png")
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    fn extractor_for(server: &MockServer) -> GeminiExtractor {
        GeminiExtractor::new(server.uri(), "gemini-test", Some("secret".to_string()))
    }

    #[tokio::test]
    async fn test_extracts_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(
                r#"[{"subject_code": "CSEN2031", "subject_name": "Compilers", "present": 20, "total": 25}]"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let rows = extractor_for(&server).extract(&image()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subject_code, "CSEN2031");
        assert_eq!(rows[0].present.as_i64(), Some(20));
        assert_eq!(rows[0].total.as_i64(), Some(25));
    }

    #[tokio::test]
    async fn test_request_carries_inline_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("[]")))
            .mount(&server)
            .await;

        extractor_for(&server).extract(&image()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "ZmFrZSBpbWFnZQ==");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "ARRAY");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let extractor = GeminiExtractor::new(server.uri(), "gemini-test", Some("  ".to_string()));
        let result = extractor.extract(&image()).await;
        assert!(matches!(result, Err(ExtractionError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_service_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let result = extractor_for(&server).extract(&image()).await;
        match result {
            Err(ExtractionError::Service { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_array_answer_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response(r#"{"subject_code": "CSEN2031"}"#)),
            )
            .mount(&server)
            .await;

        let result = extractor_for(&server).extract(&image()).await;
        assert!(matches!(result, Err(ExtractionError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_empty_candidates_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let result = extractor_for(&server).extract(&image()).await;
        assert!(matches!(result, Err(ExtractionError::MalformedResponse(_))));
    }
}
