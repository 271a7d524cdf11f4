//! Decode strategies and the fallback chain
//!
//! Strategies are tried in priority order:
//! - Native: continuous local decode driven by frame arrival
//! - Snapshot: local decode of the frame, identity and colour-inverted
//! - RemoteDecode: upload to an image-decoding service
//! - RemoteText: upload to a text-recognition service, keep the best digit run
//!
//! The native decoder lives in the controller's frame loop; the remaining
//! strategies form the [`StrategyChain`] that the fallback loop runs.

/// Local decoding with rqrr
pub mod local;
/// Remote image-decoding client
pub mod remote;
/// Remote text-recognition client
pub mod text;

pub use local::LocalDecoder;
pub use remote::RemoteDecoder;
pub use text::TextRecognizer;

use crate::config::{ScanConfig, StrategyKind};
use crate::models::{CandidateCode, DecodeAttempt, Frame, StrategyId};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single way of turning a frame into text
///
/// Implementations never fail loudly: errors are logged and reported as
/// `None`, so the chain can move on to the next strategy.
#[async_trait]
pub trait DecodeStrategy: Send + Sync {
    /// Which strategy this is
    fn id(&self) -> StrategyId;

    /// Decoded text, or `None` when nothing usable was found
    async fn decode(&self, frame: &Frame) -> Option<String>;
}

/// Result of one pass over the chain
#[derive(Debug, Clone, Default)]
pub struct ChainOutcome {
    /// Every strategy invocation, in the order it happened
    pub attempts: Vec<DecodeAttempt>,
    /// First successful result, if any
    pub hit: Option<CandidateCode>,
}

impl ChainOutcome {
    fn record(&mut self, attempt: DecodeAttempt) -> bool {
        let succeeded = attempt.succeeded;
        if succeeded && self.hit.is_none() {
            if let Some(text) = &attempt.result {
                self.hit = Some(CandidateCode::new(text.clone(), attempt.strategy));
            }
        }
        self.attempts.push(attempt);
        succeeded
    }
}

struct Slot {
    strategy: Arc<dyn DecodeStrategy>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag even if the pass is cancelled mid-await
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ordered list of fallback strategies with first-success short-circuit
///
/// Each slot is single-flight: a strategy still working on an earlier frame
/// is skipped (recorded as an unsuccessful attempt) rather than re-entered.
#[derive(Default)]
pub struct StrategyChain {
    slots: Vec<Slot>,
}

impl StrategyChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy at the lowest priority
    pub fn with(mut self, strategy: Arc<dyn DecodeStrategy>) -> Self {
        self.push(strategy);
        self
    }

    /// Append a strategy at the lowest priority
    pub fn push(&mut self, strategy: Arc<dyn DecodeStrategy>) {
        self.slots.push(Slot {
            strategy,
            in_flight: AtomicBool::new(false),
        });
    }

    /// Build the chain listed in `config.decode.fallback`
    ///
    /// Remote strategies without an endpoint are left out with a warning.
    pub fn from_config(config: &ScanConfig) -> Self {
        let client = reqwest::Client::new();
        let mut chain = Self::new();
        for kind in &config.decode.fallback {
            match kind {
                StrategyKind::Snapshot => chain.push(Arc::new(LocalDecoder::snapshot())),
                StrategyKind::RemoteDecode => match &config.remote.decode_url {
                    Some(url) => chain.push(Arc::new(RemoteDecoder::new(
                        client.clone(),
                        url.clone(),
                        &config.remote,
                        config.decode.include_inverted,
                    ))),
                    None => tracing::warn!(strategy = "remote_decode", "no endpoint configured, skipping"),
                },
                StrategyKind::RemoteText => match &config.remote.text_url {
                    Some(url) => chain.push(Arc::new(TextRecognizer::new(
                        client.clone(),
                        url.clone(),
                        &config.remote,
                        config.decode.min_digits,
                    ))),
                    None => tracing::warn!(strategy = "remote_text", "no endpoint configured, skipping"),
                },
            }
        }
        chain
    }

    /// Strategy ids in priority order
    pub fn ids(&self) -> Vec<StrategyId> {
        self.slots.iter().map(|slot| slot.strategy.id()).collect()
    }

    /// Number of strategies
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no fallback is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Try each strategy in order until one produces text
    pub async fn run(&self, frame: &Frame) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();
        for slot in &self.slots {
            let id = slot.strategy.id();
            if slot
                .in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                tracing::debug!(strategy = %id, frame = frame.seq, "strategy busy, skipped");
                outcome.record(DecodeAttempt::new(id, frame.seq, None));
                continue;
            }

            let result = {
                let _guard = FlightGuard(&slot.in_flight);
                slot.strategy.decode(frame).await
            };
            if outcome.record(DecodeAttempt::new(id, frame.seq, result)) {
                tracing::debug!(strategy = %id, frame = frame.seq, "fallback hit");
                break;
            }
        }
        outcome
    }

    /// Native decoder first, then the chain only if native found nothing
    pub async fn decode_cycle(&self, native: &dyn DecodeStrategy, frame: &Frame) -> ChainOutcome {
        let result = native.decode(frame).await;
        let attempt = DecodeAttempt::new(native.id(), frame.seq, result);
        if attempt.succeeded {
            let mut outcome = ChainOutcome::default();
            outcome.record(attempt);
            return outcome;
        }

        let mut outcome = self.run(frame).await;
        outcome.attempts.insert(0, attempt);
        outcome
    }
}

impl std::fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyChain")
            .field("strategies", &self.ids())
            .finish()
    }
}
