//! Acquisition controller behaviour under a paused tokio clock
//!
//! Strategies are scripted mocks, so every timing assertion is exact:
//! frame loop at 15 fps (66 ms), fallback every second, 300 ms cooldown.

use async_trait::async_trait;
use codescan::controller::{AcquisitionController, EventStream, NoticeKind, ScanEvent, SessionState};
use codescan::decoder::{DecodeStrategy, StrategyChain};
use codescan::error::{FrameUnavailable, ScanError, SourceError, StoreError};
use codescan::models::{CandidateCode, Frame, StrategyId};
use codescan::source::{FrameSource, ReplaySource, StreamInfo, UnavailableSource};
use codescan::store::{AddOutcome, CodeStore, MemoryCodeStore};
use codescan::{ScanConfig, ScanMode};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

const PRODUCT: &str = "tool-head-7";

struct Mock {
    id: StrategyId,
    reply: Option<&'static str>,
    delay: Duration,
    calls: AtomicUsize,
    finished: AtomicUsize,
}

impl Mock {
    fn new(id: StrategyId, reply: Option<&'static str>) -> Arc<Self> {
        Self::slow(id, reply, Duration::ZERO)
    }

    fn slow(id: StrategyId, reply: Option<&'static str>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            reply,
            delay,
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecodeStrategy for Mock {
    fn id(&self) -> StrategyId {
        self.id
    }

    async fn decode(&self, _frame: &Frame) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.reply.map(str::to_string)
    }
}

/// Replay source that reports how often it was stopped
struct CountingSource {
    inner: ReplaySource,
    stops: Arc<AtomicUsize>,
}

impl FrameSource for CountingSource {
    fn start(&mut self) -> Result<StreamInfo, SourceError> {
        self.inner.start()
    }

    fn current_frame(&mut self) -> Result<Frame, FrameUnavailable> {
        self.inner.current_frame()
    }

    fn play(&mut self) {
        self.inner.play()
    }

    fn pause(&mut self) {
        self.inner.pause()
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.stop()
    }
}

struct DownStore;

#[async_trait]
impl CodeStore for DownStore {
    async fn existing_codes(&self, _product: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn add_code(&self, _product: &str, _code: &str) -> Result<AddOutcome, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn soft_delete_code(&self, _product: &str, _code: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn restore_code(&self, _product: &str, _code: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn purge_code(&self, _product: &str, _code: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn deleted_codes(&self, _product: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Fails the first lookup, then behaves like an empty product
struct FlakyStore {
    inner: MemoryCodeStore,
    lookups: AtomicUsize,
}

impl FlakyStore {
    fn new() -> Arc<Self> {
        let inner = MemoryCodeStore::new();
        inner.add_product(PRODUCT);
        Arc::new(Self {
            inner,
            lookups: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CodeStore for FlakyStore {
    async fn existing_codes(&self, product: &str) -> Result<Vec<String>, StoreError> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(StoreError::Unavailable("timed out".into()));
        }
        self.inner.existing_codes(product).await
    }

    async fn add_code(&self, product: &str, code: &str) -> Result<AddOutcome, StoreError> {
        self.inner.add_code(product, code).await
    }

    async fn soft_delete_code(&self, product: &str, code: &str) -> Result<(), StoreError> {
        self.inner.soft_delete_code(product, code).await
    }

    async fn restore_code(&self, product: &str, code: &str) -> Result<(), StoreError> {
        self.inner.restore_code(product, code).await
    }

    async fn purge_code(&self, product: &str, code: &str) -> Result<(), StoreError> {
        self.inner.purge_code(product, code).await
    }

    async fn deleted_codes(&self, product: &str) -> Result<Vec<String>, StoreError> {
        self.inner.deleted_codes(product).await
    }
}

fn replay() -> ReplaySource {
    ReplaySource::new(vec![Frame::from_rgb(vec![128; 4 * 4 * 3], 4, 4, 0).unwrap()])
}

fn counting() -> (Box<dyn FrameSource>, Arc<AtomicUsize>) {
    let stops = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        inner: replay(),
        stops: stops.clone(),
    };
    (Box::new(source), stops)
}

fn empty_store() -> Arc<dyn CodeStore> {
    let store = MemoryCodeStore::new();
    store.add_product(PRODUCT);
    Arc::new(store)
}

fn chain_of(strategies: &[Arc<Mock>]) -> Arc<StrategyChain> {
    let mut chain = StrategyChain::new();
    for strategy in strategies {
        chain.push(strategy.clone());
    }
    Arc::new(chain)
}

fn session(
    config: ScanConfig,
    source: Box<dyn FrameSource>,
    native: Arc<Mock>,
    chain: Arc<StrategyChain>,
    store: Arc<dyn CodeStore>,
) -> (AcquisitionController, EventStream) {
    AcquisitionController::new(config, source, native, chain, store, PRODUCT)
}

fn drain(events: &mut EventStream) -> Vec<ScanEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn candidates(events: &[ScanEvent]) -> Vec<&CandidateCode> {
    events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Candidate(c) => Some(c),
            _ => None,
        })
        .collect()
}

fn notices(events: &[ScanEvent], kind: NoticeKind) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ScanEvent::Notice { kind: k, .. } if *k == kind))
        .count()
}

async fn next_candidate(events: &mut EventStream) -> CandidateCode {
    timeout(Duration::from_secs(30), async {
        loop {
            match events.recv().await {
                Some(ScanEvent::Candidate(candidate)) => return candidate,
                Some(_) => continue,
                None => panic!("event stream closed before a candidate arrived"),
            }
        }
    })
    .await
    .expect("no candidate within 30s")
}

#[tokio::test(start_paused = true)]
async fn native_hit_is_accepted_and_fallback_never_runs() {
    let native = Mock::new(StrategyId::Native, Some("LOT-A/100"));
    let fallback = Mock::new(StrategyId::Snapshot, Some("999"));
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(replay()),
        native.clone(),
        chain_of(&[fallback.clone()]),
        empty_store(),
    );

    ctl.start().await.unwrap();
    let candidate = next_candidate(&mut events).await;
    assert_eq!(candidate.cleaned, "100");
    assert_eq!(candidate.raw_text, "LOT-A/100");
    assert_eq!(candidate.source, StrategyId::Native);
    assert_eq!(ctl.state(), SessionState::Paused);

    sleep(Duration::from_millis(350)).await;
    assert_eq!(ctl.state(), SessionState::Scanning);

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(fallback.calls(), 0);
    assert!(native.calls() > 10);
}

#[tokio::test(start_paused = true)]
async fn fallback_runs_when_native_misses() {
    let native = Mock::new(StrategyId::Native, None);
    let snapshot = Mock::new(StrategyId::Snapshot, Some("SN-777"));
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(replay()),
        native,
        chain_of(&[snapshot.clone()]),
        empty_store(),
    );

    let started = Instant::now();
    ctl.start().await.unwrap();
    let candidate = next_candidate(&mut events).await;
    assert_eq!(candidate.source, StrategyId::Snapshot);
    assert_eq!(candidate.cleaned, "777");
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(snapshot.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn busy_fallback_pass_skips_ticks() {
    let native = Mock::new(StrategyId::Native, None);
    let slow = Mock::slow(StrategyId::RemoteDecode, None, Duration::from_millis(2_500));
    let text = Mock::new(StrategyId::RemoteText, None);
    let (_ctl, _events) = {
        let (ctl, events) = session(
            ScanConfig::default(),
            Box::new(replay()),
            native,
            chain_of(&[slow.clone(), text.clone()]),
            empty_store(),
        );
        ctl.start().await.unwrap();
        (ctl, events)
    };

    // passes start at 1s and 4s; the 2s and 3s ticks find the first pass busy
    sleep(Duration::from_millis(4_500)).await;
    assert_eq!(slow.calls(), 2);
    assert_eq!(text.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn single_shot_waits_for_resume() {
    let mut config = ScanConfig::default();
    config.mode = ScanMode::SingleShot;
    let native = Mock::new(StrategyId::Native, Some("5"));
    let (ctl, mut events) = session(
        config,
        Box::new(replay()),
        native,
        chain_of(&[]),
        empty_store(),
    );

    ctl.start().await.unwrap();
    assert_eq!(next_candidate(&mut events).await.cleaned, "5");
    assert_eq!(ctl.state(), SessionState::Paused);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(ctl.state(), SessionState::Paused);
    assert!(candidates(&drain(&mut events)).is_empty());

    ctl.resume().await.unwrap();
    assert_eq!(next_candidate(&mut events).await.cleaned, "5");
    assert_eq!(ctl.state(), SessionState::Paused);
}

#[tokio::test(start_paused = true)]
async fn duplicate_warning_is_throttled() {
    let store = MemoryCodeStore::new().with_codes(PRODUCT, ["100"]);
    let native = Mock::new(StrategyId::Native, Some("100"));
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(replay()),
        native,
        chain_of(&[]),
        Arc::new(store),
    );

    ctl.start().await.unwrap();
    sleep(Duration::from_millis(5_500)).await;
    let seen = drain(&mut events);
    assert_eq!(notices(&seen, NoticeKind::DuplicateWarning), 1);
    assert!(candidates(&seen).is_empty());
    assert_eq!(ctl.state(), SessionState::Scanning);

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(notices(&drain(&mut events), NoticeKind::DuplicateWarning), 1);
}

#[tokio::test(start_paused = true)]
async fn unusable_text_raises_one_decode_error() {
    let native = Mock::new(StrategyId::Native, Some("----"));
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(replay()),
        native,
        chain_of(&[]),
        empty_store(),
    );

    ctl.start().await.unwrap();
    sleep(Duration::from_millis(2_500)).await;
    let seen = drain(&mut events);
    assert_eq!(notices(&seen, NoticeKind::DecodeError), 1);
    assert!(candidates(&seen).is_empty());
    assert_eq!(ctl.state(), SessionState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn store_failure_drops_candidate_with_notice() {
    let native = Mock::new(StrategyId::Native, Some("123"));
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(replay()),
        native,
        chain_of(&[]),
        Arc::new(DownStore),
    );

    ctl.start().await.unwrap();
    sleep(Duration::from_millis(500)).await;
    let seen = drain(&mut events);
    assert_eq!(notices(&seen, NoticeKind::DecodeError), 1);
    assert!(candidates(&seen).is_empty());
}

#[tokio::test(start_paused = true)]
async fn store_failure_retries_on_next_frame() {
    let native = Mock::new(StrategyId::Native, Some("123"));
    let store = FlakyStore::new();
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(replay()),
        native,
        chain_of(&[]),
        store.clone(),
    );

    let started = Instant::now();
    ctl.start().await.unwrap();
    let candidate = next_candidate(&mut events).await;
    assert_eq!(candidate.cleaned, "123");
    assert!(started.elapsed() < Duration::from_millis(500), "{:?}", started.elapsed());
    assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn close_discards_in_flight_results() {
    let native = Mock::new(StrategyId::Native, None);
    let remote = Mock::slow(StrategyId::RemoteDecode, Some("42"), Duration::from_secs(2));
    let (source, stops) = counting();
    let (ctl, mut events) = session(
        ScanConfig::default(),
        source,
        native,
        chain_of(&[remote.clone()]),
        empty_store(),
    );

    ctl.start().await.unwrap();
    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(remote.calls(), 1);

    ctl.close().await;
    assert_eq!(ctl.state(), SessionState::Terminated);
    assert_eq!(stops.load(Ordering::SeqCst), 1);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(remote.finished(), 1);
    assert!(candidates(&drain(&mut events)).is_empty());

    assert!(matches!(ctl.pause().await, Err(ScanError::Closed)));
    assert!(matches!(ctl.start().await, Err(ScanError::Closed)));
    ctl.close().await;
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn pause_invalidates_in_flight_pass() {
    let native = Mock::new(StrategyId::Native, None);
    let remote = Mock::slow(StrategyId::RemoteDecode, Some("42"), Duration::from_secs(2));
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(replay()),
        native,
        chain_of(&[remote.clone()]),
        empty_store(),
    );

    ctl.start().await.unwrap();
    sleep(Duration::from_millis(1_500)).await;
    ctl.pause().await.unwrap();
    assert_eq!(ctl.generation(), 1);
    ctl.resume().await.unwrap();
    assert_eq!(ctl.state(), SessionState::Scanning);

    // the pass started at 1s lands at 3s with a stale generation
    sleep(Duration::from_millis(2_000)).await;
    assert_eq!(remote.finished(), 1);
    assert!(candidates(&drain(&mut events)).is_empty());

    // a later pass belongs to the current generation
    assert_eq!(next_candidate(&mut events).await.cleaned, "42");
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_releases_the_source() {
    let (source, stops) = counting();
    let (ctl, _events) = session(
        ScanConfig::default(),
        source,
        Mock::new(StrategyId::Native, None),
        chain_of(&[]),
        empty_store(),
    );
    ctl.start().await.unwrap();
    drop(ctl);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn init_failure_terminates_session() {
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(UnavailableSource::new(SourceError::NoDevice("/dev/video0".into()))),
        Mock::new(StrategyId::Native, Some("1")),
        chain_of(&[]),
        empty_store(),
    );

    let err = ctl.start().await.unwrap_err();
    assert!(matches!(err, ScanError::Source(SourceError::NoDevice(_))));
    assert_eq!(ctl.state(), SessionState::Terminated);

    let seen = drain(&mut events);
    assert_eq!(
        seen[..2],
        [
            ScanEvent::StateChanged(SessionState::Initializing),
            ScanEvent::StateChanged(SessionState::Terminated),
        ]
    );
    assert_eq!(notices(&seen, NoticeKind::InitError), 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_pause_during_cooldown_holds() {
    let native = Mock::new(StrategyId::Native, Some("8"));
    let (ctl, mut events) = session(
        ScanConfig::default(),
        Box::new(replay()),
        native,
        chain_of(&[]),
        empty_store(),
    );

    ctl.start().await.unwrap();
    next_candidate(&mut events).await;
    assert_eq!(ctl.state(), SessionState::Paused);
    ctl.pause().await.unwrap();

    sleep(Duration::from_secs(1)).await;
    assert_eq!(ctl.state(), SessionState::Paused);
    ctl.resume().await.unwrap();
    assert_eq!(ctl.state(), SessionState::Scanning);
}
