use super::DecodeStrategy;
use super::remote::{Endpoint, RemoteError};
use crate::config::RemoteConfig;
use crate::extract::best_digit_run;
use crate::models::{Frame, StrategyId};
use crate::utils::encode::encode_jpeg;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextRequest {
    image_base64: String,
}

#[derive(Debug, Default, Deserialize)]
struct TextResponse {
    #[serde(default)]
    content: String,
}

/// Text recognition fallback for printed or engraved serials
///
/// Uploads a downscaled JPEG and keeps the longest digit run of the
/// recognized text.
#[derive(Debug, Clone)]
pub struct TextRecognizer {
    endpoint: Endpoint,
    quality: u8,
    max_dim: u32,
    min_digits: usize,
}

impl TextRecognizer {
    /// Recognizer posting to `url`
    pub fn new(client: reqwest::Client, url: String, config: &RemoteConfig, min_digits: usize) -> Self {
        Self {
            endpoint: Endpoint::new(client, url, config),
            quality: config.jpeg_quality,
            max_dim: config.max_text_dim,
            min_digits,
        }
    }

    async fn recognize(&self, frame: &Frame) -> Result<String, RemoteError> {
        let image = encode_jpeg(frame, self.quality, self.max_dim)?;
        let body = TextRequest {
            image_base64: image.to_data_url(),
        };
        let resp: TextResponse = self.endpoint.post(&body).await?;
        Ok(resp.content)
    }

    fn pick(&self, text: &str) -> Option<String> {
        best_digit_run(text, self.min_digits).map(str::to_string)
    }
}

#[async_trait]
impl DecodeStrategy for TextRecognizer {
    fn id(&self) -> StrategyId {
        StrategyId::RemoteText
    }

    async fn decode(&self, frame: &Frame) -> Option<String> {
        if frame.is_empty() {
            return None;
        }
        match self.recognize(frame).await {
            Ok(text) => {
                let picked = self.pick(&text);
                if picked.is_none() {
                    tracing::debug!(frame = frame.seq, chars = text.len(), "no digit run in recognized text");
                }
                picked
            }
            Err(err) => {
                tracing::warn!(url = self.endpoint.url(), error = %err, "text recognition failed");
                None
            }
        }
    }
}
