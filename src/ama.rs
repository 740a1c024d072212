//! AMA (ask-me-anything) voice reply generation
//!
//! On the working scene the driver asks this module for a spoken reply to
//! recent chat activity: answered messages are loaded from the JSON memory
//! store, the last few minutes are summarized into a prompt, a chat model
//! produces a fenced-JSON reply, and a TTS engine renders it into the voice
//! output directory. The chat model and TTS engine stay behind traits; this
//! module ships HTTP implementations for both.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AmaConfig;
use crate::error::{AmaError, Result};

/// Only messages answered within this window feed the reply prompt
const REPLY_WINDOW_MINUTES: i64 = 5;
/// Cap on how many exchanges the prompt carries
const REPLY_HISTORY_CAP: usize = 30;

/// One answered chat message from the memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsweredMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub agent_reply_text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Load the answered-chat memory store. A missing or malformed file reads as
/// an empty history.
pub fn load_answered_messages(path: &Path) -> Vec<AnsweredMessage> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::debug!("No answered-messages store at {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!("Malformed answered-messages store: {}", e);
            Vec::new()
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatExchange<'a> {
    author: Option<&'a str>,
    message: Option<&'a str>,
    agent_reply_text: &'a str,
}

/// Filter answered messages down to the recent reply window
fn recent_exchanges(messages: &[AnsweredMessage], now: DateTime<Utc>) -> Vec<ChatExchange<'_>> {
    let window = ChronoDuration::minutes(REPLY_WINDOW_MINUTES);
    messages
        .iter()
        .filter_map(|msg| {
            let reply = msg.agent_reply_text.as_deref()?;
            let timestamp = msg.timestamp?;
            if now.signed_duration_since(timestamp) >= window {
                return None;
            }
            Some(ChatExchange {
                author: msg.author.as_deref(),
                message: msg.message.as_deref(),
                agent_reply_text: reply,
            })
        })
        .take(REPLY_HISTORY_CAP)
        .collect()
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F600..=0x1F64F // emoticons
        | 0x1F300..=0x1F5FF // symbols & pictographs
        | 0x1F680..=0x1F6FF // transport & map symbols
        | 0x1F1E0..=0x1F1FF // flags
        | 0x2702..=0x27B0 // dingbats
        | 0x24C2..=0x25FF
    )
}

/// Strip emoji and normalize punctuation that trips up TTS voices
pub fn clean_for_voice(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        if is_emoji(c) {
            continue;
        }
        match c {
            '\u{2018}' | '\u{2019}' => cleaned.push('\''),
            '\u{201C}' | '\u{201D}' => cleaned.push('"'),
            '\u{2013}' | '\u{2014}' => cleaned.push('-'),
            '\u{2026}' => cleaned.push_str("..."),
            '\u{00A0}' => cleaned.push(' '),
            '\u{2022}' => cleaned.push('*'),
            _ => cleaned.push(c),
        }
    }
    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }
    cleaned.trim().to_string()
}

/// Pull the reply text out of a model response: a fenced ```json block when
/// present, the raw content otherwise.
fn extract_reply_text(content: &str) -> Result<String> {
    let json_str = match content.find("```json") {
        Some(start) => {
            let body = &content[start + "```json".len()..];
            match body.find("```") {
                Some(end) => body[..end].trim(),
                None => {
                    return Err(AmaError::MalformedReply(
                        "unterminated fenced block".to_string(),
                    )
                    .into())
                }
            }
        }
        None => content.trim(),
    };

    let value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| AmaError::MalformedReply(format!("not valid JSON: {}", e)))?;
    value
        .get("reply_text")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AmaError::MalformedReply("missing reply_text".to_string()).into())
}

/// An LLM collaborator: prompt in, text out
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String>;
}

/// A TTS collaborator: text in, generated filename (within the voice output
/// directory) out
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, topic: &str) -> Result<String>;
}

/// The collaborator surface the playlist driver consumes
#[async_trait]
pub trait VoiceReplyGenerator: Send + Sync {
    /// Produce a voice reply from answered chat history. `None` means no
    /// reply was warranted; the driver falls back to its default wait.
    async fn generate_reply(&self, answered: &[AnsweredMessage]) -> Result<Option<String>>;
}

const AMA_REPLY_PROMPT: &str = "\
You are the host of a continuous live stream, speaking directly to your chat.

Personality:
{personality}

Recently answered chat messages:
{chat_history}

Write one short spoken reply that picks up on the conversation above. Keep it
under four sentences and do not repeat earlier replies verbatim. Respond with
a JSON object in a fenced code block:
```json
{\"reply_text\": \"...\"}
```";

/// Generates AMA voice replies by chaining a chat model and a TTS engine
pub struct AmaReplyGenerator {
    model: Arc<dyn ChatModel>,
    tts: Arc<dyn SpeechSynthesizer>,
    personality: String,
}

impl AmaReplyGenerator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tts: Arc<dyn SpeechSynthesizer>,
        personality: String,
    ) -> Self {
        Self {
            model,
            tts,
            personality,
        }
    }
}

#[async_trait]
impl VoiceReplyGenerator for AmaReplyGenerator {
    async fn generate_reply(&self, answered: &[AnsweredMessage]) -> Result<Option<String>> {
        let exchanges = recent_exchanges(answered, Utc::now());
        if exchanges.is_empty() {
            tracing::debug!("No recently answered messages, skipping AMA reply");
            return Ok(None);
        }

        let chat_history = serde_json::to_string_pretty(&exchanges)
            .map_err(|e| AmaError::MalformedReply(e.to_string()))?;
        let prompt = AMA_REPLY_PROMPT
            .replace("{personality}", &self.personality)
            .replace("{chat_history}", &chat_history);

        let response = self.model.invoke(&prompt).await?;
        let reply_text = extract_reply_text(&response)?;
        tracing::info!("AMA reply: {}", reply_text);

        let cleaned = clean_for_voice(&reply_text);
        if cleaned.is_empty() {
            return Ok(None);
        }

        let filename = self.tts.synthesize(&cleaned, "AMA").await?;
        tracing::info!("AMA voice generated: {}", filename);
        Ok(Some(filename))
    }
}

/// Chat completion client for any OpenAI-compatible endpoint
pub struct OpenAiChat {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    /// Returns `None` when no API key is configured
    pub fn from_config(config: &AmaConfig) -> Option<Self> {
        let api_key = config.chat_api_key.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            api_base: config.chat_api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.chat_model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AmaError::Model(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AmaError::Model(format!("HTTP {}", response.status())).into());
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AmaError::Model(e.to_string()))?;

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AmaError::MalformedReply("missing message content".to_string()).into())
    }
}

/// ElevenLabs text-to-speech client writing MP3s into the voice directory
pub struct ElevenLabsTts {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    output_dir: PathBuf,
}

impl ElevenLabsTts {
    /// Returns `None` when the API key or voice is not configured
    pub fn from_config(config: &AmaConfig, output_dir: PathBuf) -> Option<Self> {
        let api_key = config.elevenlabs_api_key.clone()?;
        let voice_id = config.elevenlabs_voice_id.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            api_key,
            voice_id,
            model_id: config.elevenlabs_model_id.clone(),
            output_dir,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn synthesize(&self, text: &str, topic: &str) -> Result<String> {
        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice_id
        );
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AmaError::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AmaError::Synthesis(format!("HTTP {}", response.status())).into());
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| AmaError::Synthesis(e.to_string()))?;

        let filename = format!("{}_{}.mp3", topic, Utc::now().format("%Y%m%d_%H%M%S"));
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| AmaError::Synthesis(e.to_string()))?;
        std::fs::write(self.output_dir.join(&filename), &audio)
            .map_err(|e| AmaError::Synthesis(e.to_string()))?;

        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(reply: Option<&str>, age_secs: i64) -> AnsweredMessage {
        AnsweredMessage {
            id: Some("id".to_string()),
            author: Some("viewer".to_string()),
            message: Some("hello?".to_string()),
            agent_reply_text: reply.map(str::to_string),
            timestamp: Some(Utc::now() - ChronoDuration::seconds(age_secs)),
        }
    }

    #[test]
    fn test_recent_exchanges_filters_window_and_missing_replies() {
        let messages = vec![
            message(Some("fresh"), 30),
            message(Some("stale"), 600),
            message(None, 30),
        ];
        let exchanges = recent_exchanges(&messages, Utc::now());
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].agent_reply_text, "fresh");
    }

    #[test]
    fn test_recent_exchanges_caps_history() {
        let messages: Vec<AnsweredMessage> =
            (0..50).map(|_| message(Some("reply"), 10)).collect();
        let exchanges = recent_exchanges(&messages, Utc::now());
        assert_eq!(exchanges.len(), REPLY_HISTORY_CAP);
    }

    #[test]
    fn test_clean_for_voice() {
        let text = "It\u{2019}s \u{201C}live\u{201D} \u{1F600} now \u{2014} enjoy\u{2026}";
        assert_eq!(clean_for_voice(text), "It's \"live\"  now - enjoy...");
    }

    #[test]
    fn test_extract_reply_text_fenced() {
        let content = "Sure!\n```json\n{\"reply_text\": \"hello chat\"}\n```\nDone.";
        assert_eq!(extract_reply_text(content).unwrap(), "hello chat");
    }

    #[test]
    fn test_extract_reply_text_bare_json() {
        let content = "{\"reply_text\": \"hi\"}";
        assert_eq!(extract_reply_text(content).unwrap(), "hi");
    }

    #[test]
    fn test_extract_reply_text_rejects_garbage() {
        assert!(extract_reply_text("no json here").is_err());
        assert!(extract_reply_text("```json\n{\"other\": 1}\n```").is_err());
    }

    #[test]
    fn test_load_answered_messages_missing_file() {
        assert!(load_answered_messages(Path::new("/nonexistent/memory.json")).is_empty());
    }

    struct FixedModel(String);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn invoke(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct RecordingTts;

    #[async_trait]
    impl SpeechSynthesizer for RecordingTts {
        async fn synthesize(&self, text: &str, topic: &str) -> Result<String> {
            assert!(!text.is_empty());
            Ok(format!("{}_test.mp3", topic))
        }
    }

    #[tokio::test]
    async fn test_generate_reply_end_to_end() {
        let generator = AmaReplyGenerator::new(
            Arc::new(FixedModel(
                "```json\n{\"reply_text\": \"thanks for the question!\"}\n```".to_string(),
            )),
            Arc::new(RecordingTts),
            "cheerful radio host".to_string(),
        );

        let messages = vec![message(Some("earlier reply"), 20)];
        let filename = generator.generate_reply(&messages).await.unwrap();
        assert_eq!(filename.as_deref(), Some("AMA_test.mp3"));
    }

    #[tokio::test]
    async fn test_generate_reply_none_without_recent_history() {
        let generator = AmaReplyGenerator::new(
            Arc::new(FixedModel("unused".to_string())),
            Arc::new(RecordingTts),
            String::new(),
        );

        let messages = vec![message(Some("old"), 3600)];
        let filename = generator.generate_reply(&messages).await.unwrap();
        assert!(filename.is_none());
    }
}
