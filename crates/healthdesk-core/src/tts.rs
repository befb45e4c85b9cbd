//! Text-to-speech through the Google Translate TTS endpoint, played back with rodio.

use regex::Regex;
use reqwest::Client;
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::consult::Language;
use crate::error::{DeskError, DeskResult};

const TTS_URL: &str = "https://translate.google.com/translate_tts";

/// The endpoint rejects requests longer than this many characters.
pub const MAX_CHUNK_CHARS: usize = 100;

/// Clause ends. A period or comma only counts when followed by whitespace or
/// the end of the text, so "2.5 mg" and "1,000 IU" stay whole.
fn clause_end_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[.,]+(?:\s|$)|[!?;:\n…。，、]+").expect("clause regex is valid")
    })
}

fn clauses(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for end in clause_end_regex().find_iter(text) {
        out.push(&text[start..end.end()]);
        start = end.end();
    }
    out.push(&text[start..]);
    out
}

/// Break text into pieces no longer than `max` chars, preferring clause boundaries.
pub fn split_for_speech(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut chunks = Vec::new();

    for clause in clauses(text) {
        let mut rest = clause.trim();
        while rest.chars().count() > max {
            let cut = char_boundary(rest, max);
            let head = &rest[..cut];
            // Prefer the last whitespace inside the window
            let split_at = head
                .rfind(char::is_whitespace)
                .filter(|&i| i > 0)
                .unwrap_or(cut);
            let piece = rest[..split_at].trim();
            if is_speakable(piece) {
                chunks.push(piece.to_string());
            }
            rest = rest[split_at..].trim_start();
        }
        if is_speakable(rest) {
            chunks.push(rest.to_string());
        }
    }

    chunks
}

fn is_speakable(s: &str) -> bool {
    s.chars().any(char::is_alphanumeric)
}

fn char_boundary(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

#[derive(Clone)]
pub struct GoogleTts {
    client: Client,
    base_url: String,
}

impl Default for GoogleTts {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleTts {
    pub fn new() -> Self {
        Self::with_base_url(TTS_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Synthesize `text` as MP3. Chunks are fetched in order and concatenated.
    pub async fn synthesize(&self, text: &str, language: Language) -> DeskResult<Vec<u8>> {
        let chunks = split_for_speech(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(DeskError::validation("Nothing to speak."));
        }

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", language.as_str()),
                    ("q", chunk.as_str()),
                    ("idx", idx.as_str()),
                    ("total", total.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(DeskError::Api { status, body });
            }
            audio.extend_from_slice(&response.bytes().await?);
        }

        debug!("Synthesized {} chunks, {} bytes", chunks.len(), audio.len());
        Ok(audio)
    }
}

pub fn save_mp3(bytes: &[u8], path: &Path) -> DeskResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Play MP3 bytes on the default output device, returning when playback ends.
pub async fn play_mp3(bytes: Vec<u8>) -> DeskResult<()> {
    tokio::task::spawn_blocking(move || {
        let (_stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| DeskError::Audio(e.to_string()))?;
        let sink = rodio::Sink::try_new(&handle).map_err(|e| DeskError::Audio(e.to_string()))?;
        let source = rodio::Decoder::new(Cursor::new(bytes))
            .map_err(|e| DeskError::Audio(e.to_string()))?;
        sink.append(source);
        info!("Playing synthesized speech");
        sink.sleep_until_end();
        Ok(())
    })
    .await
    .map_err(|e| DeskError::Audio(format!("playback task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(split_for_speech("Drink water", 100), vec!["Drink water"]);
    }

    #[test]
    fn test_splits_on_clauses() {
        let chunks = split_for_speech("Rest today. Drink fluids, and sleep!", 100);
        assert_eq!(chunks, vec!["Rest today.", "Drink fluids,", "and sleep!"]);
    }

    #[test]
    fn test_long_clause_splits_on_whitespace() {
        let text = "word ".repeat(50);
        let chunks = split_for_speech(&text, 22);
        assert!(chunks.iter().all(|c| c.chars().count() <= 22));
        assert!(chunks.iter().all(|c| !c.starts_with(' ') && !c.ends_with(' ')));
        assert_eq!(chunks.join(" ").split_whitespace().count(), 50);
    }

    #[test]
    fn test_hard_split_without_whitespace() {
        let text = "é".repeat(25);
        let chunks = split_for_speech(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn test_numbers_are_not_clause_breaks() {
        let chunks = split_for_speech("Take 2.5 mg of melatonin, or 1,000 IU of vitamin D3.", 100);
        assert_eq!(chunks, vec!["Take 2.5 mg of melatonin,", "or 1,000 IU of vitamin D3."]);
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(split_for_speech("  \n , ", 100).is_empty());
    }

    /// Points at a local mock server, ignoring any proxy set in the environment.
    fn local_tts(server: &MockServer) -> GoogleTts {
        GoogleTts {
            client: Client::builder().no_proxy().build().unwrap(),
            base_url: format!("{}/translate_tts", server.uri()),
        }
    }

    #[tokio::test]
    async fn test_synthesize_concatenates_chunks_in_order() {
        let server = MockServer::start().await;
        for (idx, q, body) in [("0", "Rest today.", "AAA"), ("1", "Drink water.", "BBB")] {
            Mock::given(method("GET"))
                .and(path("/translate_tts"))
                .and(query_param("ie", "UTF-8"))
                .and(query_param("client", "tw-ob"))
                .and(query_param("tl", "hi"))
                .and(query_param("q", q))
                .and(query_param("idx", idx))
                .and(query_param("total", "2"))
                .and(query_param("textlen", q.chars().count().to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body.as_bytes()))
                .expect(1)
                .mount(&server)
                .await;
        }

        let audio = local_tts(&server)
            .synthesize("Rest today. Drink water.", Language::Hindi)
            .await
            .unwrap();
        assert_eq!(audio, b"AAABBB");
    }

    #[tokio::test]
    async fn test_synthesize_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("quota"))
            .mount(&server)
            .await;

        match local_tts(&server).synthesize("Rest today.", Language::English).await {
            Err(DeskError::Api { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "quota");
            }
            other => panic!("expected API error, got {:?}", other.map(|a| a.len())),
        }
    }

    #[tokio::test]
    async fn test_synthesize_rejects_blank() {
        let tts = GoogleTts::with_base_url("http://127.0.0.1:9");
        assert!(matches!(
            tts.synthesize("   ", Language::English).await,
            Err(DeskError::Validation(_))
        ));
    }

    #[test]
    fn test_save_mp3_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech").join("answer.mp3");
        save_mp3(b"ID3", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3");
    }
}
