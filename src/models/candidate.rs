use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Identifies which decoder produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    /// Continuous local decoder driven by frame arrival
    Native,
    /// Local decode of a snapshot (identity and inverted)
    Snapshot,
    /// Remote image-decoding service
    RemoteDecode,
    /// Remote text-recognition service
    RemoteText,
}

impl StrategyId {
    /// Stable lowercase name used in logs and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Native => "native",
            StrategyId::Snapshot => "snapshot",
            StrategyId::RemoteDecode => "remote_decode",
            StrategyId::RemoteText => "remote_text",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of a single strategy invocation against one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeAttempt {
    /// Strategy that ran (or was skipped while in flight)
    pub strategy: StrategyId,
    /// Sequence number of the frame it was given
    pub frame_seq: u64,
    /// Decoded text, if any
    pub result: Option<String>,
    /// Whether the strategy produced a non-empty result
    pub succeeded: bool,
}

impl DecodeAttempt {
    pub(crate) fn new(strategy: StrategyId, frame_seq: u64, result: Option<String>) -> Self {
        let result = result.filter(|text| !text.trim().is_empty());
        Self {
            strategy,
            frame_seq,
            succeeded: result.is_some(),
            result,
        }
    }
}

/// A decoded string proposed by some strategy, not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCode {
    /// Text as returned by the strategy
    pub raw_text: String,
    /// Canonical form after [`crate::extract::extract`]
    pub cleaned: String,
    /// Strategy that produced it
    pub source: StrategyId,
    /// When it was produced
    pub timestamp: Instant,
}

impl CandidateCode {
    /// Build a candidate, cleaning the raw text
    pub fn new(raw_text: impl Into<String>, source: StrategyId) -> Self {
        let raw_text = raw_text.into();
        let cleaned = crate::extract::extract(&raw_text);
        Self {
            raw_text,
            cleaned,
            source,
            timestamp: Instant::now(),
        }
    }

    /// True when the cleaned value is a usable digit code
    pub fn is_usable(&self) -> bool {
        crate::extract::is_usable(&self.cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_blank_result_is_failure() {
        let attempt = DecodeAttempt::new(StrategyId::Snapshot, 3, Some("  ".into()));
        assert!(!attempt.succeeded);
        assert_eq!(attempt.result, None);
    }

    #[test]
    fn test_candidate_cleans_text() {
        let candidate = CandidateCode::new("HTSM1/3SN69801", StrategyId::RemoteText);
        assert_eq!(candidate.cleaned, "69801");
        assert!(candidate.is_usable());
        assert!(!CandidateCode::new("----", StrategyId::Native).is_usable());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(StrategyId::RemoteDecode.to_string(), "remote_decode");
    }
}
