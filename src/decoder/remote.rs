use super::DecodeStrategy;
use crate::config::RemoteConfig;
use crate::models::{Frame, StrategyId};
use crate::utils::encode::encode_png;
use crate::utils::invert::invert_frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failures talking to a remote capability; never leave the strategy
#[derive(Debug, thiserror::Error)]
pub(crate) enum RemoteError {
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {0}")]
    Status(reqwest::StatusCode),
}

/// Shared HTTP plumbing for the remote strategies
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    token: Option<String>,
}

impl Endpoint {
    pub(crate) fn new(client: reqwest::Client, url: String, config: &RemoteConfig) -> Self {
        Self {
            client,
            url,
            timeout: config.timeout(),
            token: config.token(),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) async fn post<Req, Resp>(&self, body: &Req) -> Result<Resp, RemoteError>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let mut request = self.client.post(&self.url).timeout(self.timeout).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }
}

#[derive(Debug, Serialize)]
struct DecodeRequest {
    images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DecodeResponse {
    #[serde(default)]
    contents: Vec<String>,
}

/// Uploads the snapshot to an image-decoding service
///
/// Sends the identity PNG and, when enabled, the inverted PNG in one request;
/// the service tries them in order.
#[derive(Debug, Clone)]
pub struct RemoteDecoder {
    endpoint: Endpoint,
    include_inverted: bool,
}

impl RemoteDecoder {
    /// Decoder posting to `url`
    pub fn new(
        client: reqwest::Client,
        url: String,
        config: &RemoteConfig,
        include_inverted: bool,
    ) -> Self {
        Self {
            endpoint: Endpoint::new(client, url, config),
            include_inverted,
        }
    }

    fn payload(&self, frame: &Frame) -> Result<DecodeRequest, RemoteError> {
        let mut images = vec![encode_png(frame)?.to_data_url()];
        if self.include_inverted {
            images.push(encode_png(&invert_frame(frame))?.to_data_url());
        }
        Ok(DecodeRequest { images })
    }

    async fn request(&self, frame: &Frame) -> Result<Option<String>, RemoteError> {
        let payload = self.payload(frame)?;
        let resp: DecodeResponse = self.endpoint.post(&payload).await?;
        Ok(first_content(resp.contents))
    }
}

fn first_content(contents: Vec<String>) -> Option<String> {
    contents.into_iter().find(|c| !c.trim().is_empty())
}

#[async_trait]
impl DecodeStrategy for RemoteDecoder {
    fn id(&self) -> StrategyId {
        StrategyId::RemoteDecode
    }

    async fn decode(&self, frame: &Frame) -> Option<String> {
        if frame.is_empty() {
            return None;
        }
        match self.request(frame).await {
            Ok(result) => {
                if result.is_none() {
                    tracing::debug!(frame = frame.seq, "remote decoder found nothing");
                }
                result
            }
            Err(err) => {
                tracing::warn!(url = self.endpoint.url(), error = %err, "remote decode failed");
                None
            }
        }
    }
}
