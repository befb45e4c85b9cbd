//! Educational descriptions of medical images through Gemini's multimodal input.

use std::path::Path;

use crate::ai::GeminiClient;
use crate::error::{DeskError, DeskResult};

const IMAGE_PROMPT: &str = "You are a medical information assistant. Describe, in plain language, what is \
visible in this medical image (for example an X-ray, MRI slice or skin photo) and which general features a \
clinician would typically look at. DO NOT diagnose. Remind the user to consult a qualified professional.";

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn mime_for(path: &Path) -> Option<&'static str> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> DeskResult<Self> {
        let mime_type = Self::mime_for(path)
            .ok_or_else(|| DeskError::validation("Upload a JPG or PNG image."))?;
        if !path.is_file() {
            return Err(DeskError::validation(format!("No image at {}", path.display())));
        }
        Ok(Self {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            mime_type,
            bytes: std::fs::read(path)?,
        })
    }
}

pub async fn analyze_image(client: &GeminiClient, model: &str, upload: &ImageUpload) -> DeskResult<String> {
    client
        .generate_with_media(model, IMAGE_PROMPT, upload.mime_type, &upload.bytes)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_image_types() {
        assert_eq!(ImageUpload::mime_for(Path::new("a.JPEG")), Some("image/jpeg"));
        assert_eq!(ImageUpload::mime_for(Path::new("a.png")), Some("image/png"));
        assert_eq!(ImageUpload::mime_for(Path::new("a.gif")), None);
        assert_eq!(ImageUpload::mime_for(Path::new("noext")), None);
    }

    #[test]
    fn test_from_path_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skin.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let upload = ImageUpload::from_path(&path).unwrap();
        assert_eq!(upload.bytes.len(), 4);
        assert_eq!(upload.file_name, "skin.png");
        assert!(ImageUpload::from_path(&dir.path().join("none.png")).is_err());
    }

    #[tokio::test]
    async fn test_analyze_image_sends_inline_png() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "A chest X-ray."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let upload = ImageUpload {
            file_name: "chest.png".to_string(),
            mime_type: "image/png",
            bytes: vec![0x89, b'P', b'N', b'G'],
        };
        let client = GeminiClient::for_local_server("test-key", &server.uri());
        let text = analyze_image(&client, "gemini-2.5-flash", &upload).await.unwrap();
        assert_eq!(text, "A chest X-ray.");

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let parts = &sent["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "image/png");
        assert!(parts[1]["text"].as_str().unwrap().contains("DO NOT diagnose"));
    }
}
