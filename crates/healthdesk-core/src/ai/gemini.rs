use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::consult::{medical_prompt, ConsultationMode, Language};
use crate::error::{DeskError, DeskResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Media { inline_data: InlineData },
    Text { text: String },
}

#[derive(Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Deserialize, Default)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, joined.
    fn into_text(self) -> DeskResult<String> {
        let block_reason = self
            .prompt_feedback
            .and_then(|f| f.block_reason);

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(DeskError::Api {
                status: 200,
                body: match block_reason {
                    Some(reason) => format!("prompt blocked: {}", reason),
                    None => "response contained no candidates".to_string(),
                },
            });
        };

        let text: String = candidate
            .content
            .unwrap_or_default()
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(DeskError::Api {
                status: 200,
                body: format!(
                    "empty response (finish reason: {})",
                    candidate.finish_reason.unwrap_or_else(|| "unknown".to_string())
                ),
            });
        }
        Ok(text)
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client for a mock server on loopback; ignores any proxy set in the environment.
    #[cfg(test)]
    pub(crate) fn for_local_server(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::builder().no_proxy().build().unwrap(),
            ..Self::with_base_url(api_key, base_url)
        }
    }

    pub async fn generate(&self, model: &str, prompt: &str) -> DeskResult<String> {
        self.send(model, vec![RequestPart::Text { text: prompt.to_string() }])
            .await
    }

    /// Send a media attachment (audio or image) ahead of the text prompt.
    pub async fn generate_with_media(
        &self,
        model: &str,
        prompt: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> DeskResult<String> {
        debug!("Attaching {} bytes of {}", bytes.len(), mime_type);
        let parts = vec![
            RequestPart::Media {
                inline_data: InlineData {
                    mime_type: mime_type.to_string(),
                    data: base64::engine::general_purpose::STANDARD.encode(bytes),
                },
            },
            RequestPart::Text { text: prompt.to_string() },
        ];
        self.send(model, parts).await
    }

    /// Transcribe speech. An empty string means nothing intelligible was heard.
    pub async fn transcribe(
        &self,
        model: &str,
        audio: &[u8],
        mime_type: &str,
        language: Language,
    ) -> DeskResult<String> {
        let prompt = format!(
            "Transcribe this audio exactly as spoken in {}. Return only the transcription, nothing else. \
             If no speech can be understood, return an empty response.",
            language.display_name()
        );
        match self.generate_with_media(model, &prompt, mime_type, audio).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(DeskError::Api { status: 200, .. }) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Ask a medical-information question. Failures are folded into the returned text.
    pub async fn medical_answer(
        &self,
        model: &str,
        mode: ConsultationMode,
        language: Language,
        question: &str,
    ) -> String {
        let prompt = medical_prompt(mode, language, question);
        match self.generate(model, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Gemini request failed: {}", e);
                fallback_answer(&e)
            }
        }
    }

    async fn send(&self, model: &str, parts: Vec<RequestPart>) -> DeskResult<String> {
        if self.api_key.trim().is_empty() {
            return Err(DeskError::NotConfigured(
                "set GOOGLE_API_KEY or press 'K' to enter a Gemini API key".to_string(),
            ));
        }

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let request = GenerateRequest {
            contents: vec![RequestContent { role: "user", parts }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DeskError::Api { status, body });
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed.into_text()
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.5-pro".to_string(),
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-flash-lite".to_string(),
            "gemini-2.0-flash".to_string(),
        ]
    }
}

pub fn fallback_answer(err: &DeskError) -> String {
    format!(
        "(Gemini error: {})\nI couldn't fetch an AI response. Check API key/network.",
        err
    )
}
