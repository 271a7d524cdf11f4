//! Acquisition controller
//!
//! One actor task owns the session: state, throttle gate, generation counter
//! and the frame source. Two loops feed it candidates:
//! - the native loop, ticking at the configured frame rate
//! - the fallback loop, running the strategy chain on a fixed interval
//!
//! Every candidate carries the generation that was current when its work
//! started. The generation is bumped on every transition out of `Scanning`,
//! so results that land after a pause, cooldown or close are dropped.

mod state;

pub use state::{NoticeKind, ScanEvent, SessionState, SessionStatus};

use crate::config::{ScanConfig, ScanMode};
use crate::decoder::{DecodeStrategy, StrategyChain};
use crate::error::{FrameUnavailable, Result, ScanError, SourceError};
use crate::gate::{Channel, GateDecision, ThrottleGate};
use crate::models::{CandidateCode, Frame, StrategyId};
use crate::source::FrameSource;
use crate::store::CodeStore;
use crate::validate::{Validation, validate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};

/// Receiving end of a session's events
pub type EventStream = mpsc::UnboundedReceiver<ScanEvent>;

type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

fn lock_source(source: &SharedSource) -> MutexGuard<'_, Box<dyn FrameSource>> {
    source.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Command {
    Start(oneshot::Sender<std::result::Result<(), SourceError>>),
    Candidate {
        generation: u64,
        raw: String,
        strategy: StrategyId,
    },
    CooldownElapsed {
        generation: u64,
    },
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    Close(Option<oneshot::Sender<()>>),
}

/// Handle to a running acquisition session
///
/// Dropping the handle closes the session.
#[derive(Debug)]
pub struct AcquisitionController {
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl AcquisitionController {
    /// Create a session in `Idle`; must be called inside a tokio runtime
    pub fn new(
        config: ScanConfig,
        source: Box<dyn FrameSource>,
        native: Arc<dyn DecodeStrategy>,
        chain: Arc<StrategyChain>,
        store: Arc<dyn CodeStore>,
        product_id: impl Into<String>,
    ) -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        let actor = Actor {
            gate: ThrottleGate::new(config.throttle.windows()),
            config,
            product_id: product_id.into(),
            status: SessionStatus::default(),
            status_tx,
            events: events_tx,
            tx: tx.clone(),
            source: Arc::new(Mutex::new(source)),
            native,
            chain,
            store,
            native_hit: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
            loops: Vec::new(),
            cooldown: None,
        };
        tokio::spawn(actor.run(rx));

        (
            Self {
                tx,
                status: status_rx,
            },
            events_rx,
        )
    }

    /// Acquire the frame source and begin scanning
    ///
    /// A fatal source error terminates the session; an `InitError` notice is
    /// sent as well.
    pub async fn start(&self) -> Result<()> {
        let (ack, reply) = oneshot::channel();
        self.send(Command::Start(ack))?;
        reply.await.map_err(|_| ScanError::Closed)??;
        Ok(())
    }

    /// Stop decoding until [`AcquisitionController::resume`]
    pub async fn pause(&self) -> Result<()> {
        let (ack, reply) = oneshot::channel();
        self.send(Command::Pause(ack))?;
        reply.await.map_err(|_| ScanError::Closed)
    }

    /// Resume decoding after a pause
    pub async fn resume(&self) -> Result<()> {
        let (ack, reply) = oneshot::channel();
        self.send(Command::Resume(ack))?;
        reply.await.map_err(|_| ScanError::Closed)
    }

    /// Terminate the session and release the source; safe to call twice
    pub async fn close(&self) {
        let (ack, reply) = oneshot::channel();
        if self.send(Command::Close(Some(ack))).is_ok() {
            let _ = reply.await;
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        self.status.borrow().generation
    }

    /// Watch state and generation changes
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| ScanError::Closed)
    }
}

impl Drop for AcquisitionController {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Close(None));
    }
}

struct Actor {
    config: ScanConfig,
    product_id: String,
    status: SessionStatus,
    status_tx: watch::Sender<SessionStatus>,
    events: mpsc::UnboundedSender<ScanEvent>,
    tx: mpsc::UnboundedSender<Command>,
    gate: ThrottleGate,
    source: SharedSource,
    native: Arc<dyn DecodeStrategy>,
    chain: Arc<StrategyChain>,
    store: Arc<dyn CodeStore>,
    native_hit: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    loops: Vec<JoinHandle<()>>,
    cooldown: Option<JoinHandle<()>>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Start(ack) => {
                    let _ = ack.send(self.start());
                }
                Command::Candidate {
                    generation,
                    raw,
                    strategy,
                } => self.on_candidate(generation, raw, strategy).await,
                Command::CooldownElapsed { generation } => self.on_cooldown(generation),
                Command::Pause(ack) => {
                    self.pause();
                    let _ = ack.send(());
                }
                Command::Resume(ack) => {
                    if self.status.state == SessionState::Paused {
                        self.resume();
                    }
                    let _ = ack.send(());
                }
                Command::Close(ack) => {
                    self.shutdown();
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    break;
                }
            }
        }
        self.shutdown();
        tracing::debug!(product = %self.product_id, "controller actor stopped");
    }

    fn transition(&mut self, next: SessionState) {
        let current = self.status.state;
        if current == next {
            return;
        }
        if !current.can_transition_to(next) {
            tracing::warn!(from = %current, to = %next, "ignoring invalid transition");
            return;
        }
        if current == SessionState::Scanning {
            self.status.generation += 1;
        }
        self.status.state = next;
        self.status_tx.send_replace(self.status);
        tracing::info!(
            product = %self.product_id,
            state = %next,
            generation = self.status.generation,
            "session state changed"
        );
        self.emit(ScanEvent::StateChanged(next));
    }

    fn emit(&self, event: ScanEvent) {
        // a dropped receiver only means nobody is listening
        let _ = self.events.send(event);
    }

    /// Throttled user-facing notice keyed by `key` on `channel`
    fn notice(&mut self, channel: Channel, kind: NoticeKind, key: &str, message: String) {
        match self.gate.accept(channel, key, Instant::now()) {
            GateDecision::Accepted => self.emit(ScanEvent::Notice { kind, message }),
            GateDecision::Suppressed => {
                tracing::debug!(channel = ?channel, key, "notice suppressed");
            }
        }
    }

    fn start(&mut self) -> std::result::Result<(), SourceError> {
        match self.status.state {
            SessionState::Idle => {}
            SessionState::Terminated => {
                return Err(SourceError::Unsupported("session already terminated".into()));
            }
            other => {
                tracing::warn!(state = %other, "start called on a running session");
                return Ok(());
            }
        }

        self.transition(SessionState::Initializing);
        let started = lock_source(&self.source).start();
        match started {
            Ok(info) => {
                tracing::info!(
                    product = %self.product_id,
                    width = info.width,
                    height = info.height,
                    strategies = ?self.chain.ids(),
                    "frame source started"
                );
                self.transition(SessionState::Scanning);
                self.spawn_loops();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(product = %self.product_id, error = %err, "frame source failed to start");
                self.transition(SessionState::Terminated);
                self.emit(ScanEvent::Notice {
                    kind: NoticeKind::InitError,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn spawn_loops(&mut self) {
        let native = NativeLoop {
            source: self.source.clone(),
            native: self.native.clone(),
            status: self.status_tx.subscribe(),
            tx: self.tx.clone(),
            native_hit: self.native_hit.clone(),
        };
        let fallback = FallbackLoop {
            source: self.source.clone(),
            chain: self.chain.clone(),
            status: self.status_tx.subscribe(),
            tx: self.tx.clone(),
            native_hit: self.native_hit.clone(),
            busy: self.busy.clone(),
        };
        let frame_interval = self.config.frame_interval();
        let fallback_interval = self.config.fallback_interval();
        self.loops.push(tokio::spawn(native.run(frame_interval)));
        if !self.chain.is_empty() {
            self.loops.push(tokio::spawn(fallback.run(fallback_interval)));
        }
    }

    async fn on_candidate(&mut self, generation: u64, raw: String, strategy: StrategyId) {
        if self.status.state != SessionState::Scanning || generation != self.status.generation {
            tracing::debug!(
                strategy = %strategy,
                generation,
                current = self.status.generation,
                state = %self.status.state,
                "dropping stale result"
            );
            return;
        }

        let candidate = CandidateCode::new(raw, strategy);
        if !candidate.is_usable() {
            let message = format!("no usable code in \"{}\"", candidate.raw_text);
            self.notice(Channel::Warning, NoticeKind::DecodeError, &candidate.cleaned, message);
            self.pause_after_decode(false);
            return;
        }

        if self.gate.accept(Channel::Accepted, &candidate.cleaned, Instant::now())
            == GateDecision::Suppressed
        {
            tracing::debug!(code = %candidate.cleaned, strategy = %strategy, "rescan suppressed");
            return;
        }

        let existing = match self.store.existing_codes(&self.product_id).await {
            Ok(codes) => codes,
            Err(err) => {
                // not checked, so the next frame may try again
                self.gate.forget(Channel::Accepted);
                tracing::warn!(product = %self.product_id, error = %err, "duplicate check failed");
                let message = format!("could not check {}: {err}", candidate.cleaned);
                self.notice(Channel::Warning, NoticeKind::DecodeError, "store", message);
                return;
            }
        };

        match validate(&candidate.cleaned, &existing) {
            Validation::DuplicateInProduct => {
                let message = format!("{} already exists in this product", candidate.cleaned);
                let key = candidate.cleaned.clone();
                self.notice(Channel::DuplicateWarning, NoticeKind::DuplicateWarning, &key, message);
                self.pause_after_decode(false);
            }
            Validation::Valid => {
                tracing::info!(
                    product = %self.product_id,
                    code = %candidate.cleaned,
                    strategy = %strategy,
                    generation,
                    "code accepted"
                );
                self.emit(ScanEvent::Candidate(candidate));
                self.pause_after_decode(true);
            }
        }
    }

    /// Single-shot pauses after any decode; continuous cools down after acceptance
    fn pause_after_decode(&mut self, accepted: bool) {
        match self.config.mode {
            ScanMode::SingleShot => {
                lock_source(&self.source).pause();
                self.transition(SessionState::Paused);
            }
            ScanMode::Continuous if accepted => {
                self.transition(SessionState::Paused);
                self.schedule_cooldown();
            }
            ScanMode::Continuous => {}
        }
    }

    fn schedule_cooldown(&mut self) {
        self.cancel_cooldown();
        let generation = self.status.generation;
        let delay = self.config.cooldown();
        let tx = self.tx.clone();
        self.cooldown = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::CooldownElapsed { generation });
        }));
    }

    fn cancel_cooldown(&mut self) {
        if let Some(handle) = self.cooldown.take() {
            handle.abort();
        }
    }

    fn on_cooldown(&mut self, generation: u64) {
        if self.status.state == SessionState::Paused && generation == self.status.generation {
            self.cooldown = None;
            self.resume();
        } else {
            tracing::debug!(generation, "stale cooldown ignored");
        }
    }

    /// Explicit pause; also holds a session that is cooling down
    fn pause(&mut self) {
        match self.status.state {
            SessionState::Scanning => {
                self.cancel_cooldown();
                lock_source(&self.source).pause();
                self.transition(SessionState::Paused);
            }
            SessionState::Paused if self.cooldown.is_some() => {
                self.cancel_cooldown();
                lock_source(&self.source).pause();
                // invalidate a cooldown message that is already queued
                self.status.generation += 1;
                self.status_tx.send_replace(self.status);
            }
            _ => {}
        }
    }

    fn resume(&mut self) {
        self.cancel_cooldown();
        self.native_hit.store(false, Ordering::Release);
        lock_source(&self.source).play();
        self.transition(SessionState::Scanning);
    }

    fn shutdown(&mut self) {
        if self.status.state == SessionState::Terminated && self.loops.is_empty() {
            return;
        }
        self.cancel_cooldown();
        for handle in self.loops.drain(..) {
            handle.abort();
        }
        lock_source(&self.source).stop();
        self.transition(SessionState::Terminated);
    }
}

/// Pulls the current frame, tolerating a stream that is not ready yet
fn grab_frame(source: &SharedSource) -> Option<Frame> {
    match lock_source(source).current_frame() {
        Ok(frame) => Some(frame),
        Err(FrameUnavailable::NotReady) => None,
        Err(FrameUnavailable::Stopped) => {
            tracing::trace!("source stopped, no frame");
            None
        }
    }
}

fn scanning(status: &watch::Receiver<SessionStatus>) -> Option<u64> {
    let status = *status.borrow();
    (status.state == SessionState::Scanning).then_some(status.generation)
}

struct NativeLoop {
    source: SharedSource,
    native: Arc<dyn DecodeStrategy>,
    status: watch::Receiver<SessionStatus>,
    tx: mpsc::UnboundedSender<Command>,
    native_hit: Arc<AtomicBool>,
}

impl NativeLoop {
    async fn run(self, period: std::time::Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(generation) = scanning(&self.status) else {
                continue;
            };
            let Some(frame) = grab_frame(&self.source) else {
                continue;
            };
            let Some(raw) = self.native.decode(&frame).await else {
                continue;
            };
            self.native_hit.store(true, Ordering::Release);
            let command = Command::Candidate {
                generation,
                raw,
                strategy: self.native.id(),
            };
            if self.tx.send(command).is_err() {
                break;
            }
        }
    }
}

struct FallbackLoop {
    source: SharedSource,
    chain: Arc<StrategyChain>,
    status: watch::Receiver<SessionStatus>,
    tx: mpsc::UnboundedSender<Command>,
    native_hit: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
}

/// Releases the busy token when a pass ends, however it ends
struct BusyToken(Arc<AtomicBool>);

impl Drop for BusyToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FallbackLoop {
    async fn run(self, period: std::time::Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if self.tx.is_closed() {
                break;
            }
            let Some(generation) = scanning(&self.status) else {
                continue;
            };
            if self.native_hit.swap(false, Ordering::AcqRel) {
                tracing::debug!("native decoder hit since last tick, fallback skipped");
                continue;
            }
            if self
                .busy
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                tracing::debug!("previous fallback pass still running, skipped");
                continue;
            }
            let token = BusyToken(self.busy.clone());
            let Some(frame) = grab_frame(&self.source) else {
                continue;
            };

            let chain = self.chain.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let outcome = chain.run(&frame).await;
                drop(token);
                if let Some(hit) = outcome.hit {
                    let _ = tx.send(Command::Candidate {
                        generation,
                        raw: hit.raw_text,
                        strategy: hit.source,
                    });
                } else {
                    tracing::debug!(frame = frame.seq, attempts = outcome.attempts.len(), "fallback pass found nothing");
                }
            });
        }
    }
}
