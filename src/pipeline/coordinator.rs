//! Pipeline orchestrator that wires the workers together.
//!
//! ```text
//! recognizer ──► recognizer feed ──► dispatch worker ──► speech worker ──► SpeechSink
//!                  (drops input       (owns Session)       (sets `speaking`
//!                   while speaking,        ▲                 while talking)
//!                   counts misses)         │
//!                          wake signals ───┘
//! ```
//!
//! The pipeline stops when the recognizer channel closes (remaining replies
//! are still spoken) or when the cancellation token fires.

use crate::error::{AssistantError, Result};
use crate::pipeline::messages::{Reply, Utterance, WakeSignal};
use crate::session::Session;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Channel buffer sizes.
const UTTERANCE_CHANNEL_SIZE: usize = 8;
const REPLY_CHANNEL_SIZE: usize = 8;

/// How often the dispatch worker checks the active window when idle.
const DEFAULT_IDLE_TICK: Duration = Duration::from_secs(1);

/// Empty recognitions absorbed before one "nothing heard" prompt is forwarded.
const DEFAULT_MISS_LIMIT: u32 = 3;

/// Speech-output collaborator.
#[async_trait]
pub trait SpeechSink: Send {
    /// Say `reply`. The pipeline treats the assistant as speaking until this returns.
    async fn speak(&mut self, reply: &Reply) -> Result<()>;
}

/// Owns the session and the three workers around it.
pub struct PipelineCoordinator {
    session: Session,
    recognizer_rx: mpsc::Receiver<Utterance>,
    wake_rx: Option<mpsc::UnboundedReceiver<WakeSignal>>,
    sink: Box<dyn SpeechSink>,
    speaking: Arc<AtomicBool>,
    idle_tick: Duration,
    miss_limit: u32,
    cancel: CancellationToken,
}

impl PipelineCoordinator {
    /// Create a coordinator reading utterances from `recognizer_rx` and
    /// speaking replies through `sink`.
    pub fn new(
        session: Session,
        recognizer_rx: mpsc::Receiver<Utterance>,
        sink: impl SpeechSink + 'static,
    ) -> Self {
        Self {
            session,
            recognizer_rx,
            wake_rx: None,
            sink: Box::new(sink),
            speaking: Arc::new(AtomicBool::new(false)),
            idle_tick: DEFAULT_IDLE_TICK,
            miss_limit: DEFAULT_MISS_LIMIT,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach the wake-word spotter's signal channel.
    #[must_use]
    pub fn with_wake_signals(mut self, rx: mpsc::UnboundedReceiver<WakeSignal>) -> Self {
        self.wake_rx = Some(rx);
        self
    }

    /// Override the idle expiry check interval.
    #[must_use]
    pub fn with_idle_tick(mut self, interval: Duration) -> Self {
        self.idle_tick = interval;
        self
    }

    /// How many consecutive empty recognitions the feed swallows before
    /// forwarding one (`assistant.miss_limit`).
    #[must_use]
    pub fn with_miss_limit(mut self, miss_limit: u32) -> Self {
        self.miss_limit = miss_limit;
        self
    }

    /// Flag that is set while the sink is speaking.
    pub fn speaking_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.speaking)
    }

    /// Run until the recognizer channel closes or the pipeline is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker panicked.
    pub async fn run(self) -> Result<()> {
        info!("starting command pipeline");

        let (utterance_tx, utterance_rx) = mpsc::channel::<Utterance>(UTTERANCE_CHANNEL_SIZE);
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>(REPLY_CHANNEL_SIZE);

        let feed_handle = {
            let speaking = Arc::clone(&self.speaking);
            let cancel = self.cancel.clone();
            let rx = self.recognizer_rx;
            let miss_limit = self.miss_limit;
            tokio::spawn(async move {
                run_recognizer_feed(rx, utterance_tx, speaking, miss_limit, cancel).await;
            })
        };

        let dispatch_handle = {
            let cancel = self.cancel.clone();
            let session = self.session;
            let wake_rx = self.wake_rx;
            let idle_tick = self.idle_tick;
            tokio::spawn(async move {
                run_dispatch_stage(session, utterance_rx, wake_rx, reply_tx, idle_tick, cancel)
                    .await;
            })
        };

        let speech_handle = {
            let speaking = Arc::clone(&self.speaking);
            let cancel = self.cancel.clone();
            let sink = self.sink;
            tokio::spawn(async move {
                run_speech_stage(reply_rx, sink, speaking, cancel).await;
            })
        };

        for (name, handle) in [
            ("recognizer feed", feed_handle),
            ("dispatch", dispatch_handle),
            ("speech", speech_handle),
        ] {
            handle
                .await
                .map_err(|e| AssistantError::Pipeline(format!("{name} worker failed: {e}")))?;
        }

        info!("command pipeline stopped");
        Ok(())
    }

    /// Request graceful shutdown of the pipeline.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Get a clone of the cancellation token for external use.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

// -- Worker functions --

/// Forward recognized utterances, dropping any that arrive while the
/// assistant is speaking (they are most likely its own voice).
///
/// Empty recognitions are counted; only every `miss_limit`-th consecutive one
/// is forwarded, as a single "nothing heard" prompt. Real text resets the count.
pub(crate) async fn run_recognizer_feed(
    mut rx: mpsc::Receiver<Utterance>,
    tx: mpsc::Sender<Utterance>,
    speaking: Arc<AtomicBool>,
    miss_limit: u32,
    cancel: CancellationToken,
) {
    let mut misses: u32 = 0;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            utterance = rx.recv() => {
                match utterance {
                    Some(u) => {
                        if speaking.load(Ordering::Acquire) {
                            debug!(text = %u.text, "dropping utterance captured while speaking");
                            continue;
                        }
                        if u.is_empty() {
                            misses += 1;
                            if misses < miss_limit {
                                debug!(misses, miss_limit, "nothing recognized");
                                continue;
                            }
                        }
                        misses = 0;
                        if tx.send(u).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

/// What woke the dispatch worker.
enum DispatchEvent {
    Wake,
    Tick,
    Heard(Utterance),
}

/// Owns the session: one reply per handled utterance, plus wake signals and
/// periodic expiry checks.
///
/// Utterances are handled on the blocking pool since skills and reloads may
/// block; the session moves there and back for each one.
pub(crate) async fn run_dispatch_stage(
    mut session: Session,
    mut rx: mpsc::Receiver<Utterance>,
    mut wake_rx: Option<mpsc::UnboundedReceiver<WakeSignal>>,
    tx: mpsc::Sender<Reply>,
    idle_tick: Duration,
    cancel: CancellationToken,
) {
    let mut idle_check = tokio::time::interval(idle_tick);
    idle_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Resolves to None forever when no spotter is attached.
        let wake_fut = async {
            match &mut wake_rx {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            }
        };

        let event = tokio::select! {
            () = cancel.cancelled() => break,
            Some(WakeSignal) = wake_fut => DispatchEvent::Wake,
            _ = idle_check.tick() => DispatchEvent::Tick,
            utterance = rx.recv() => {
                match utterance {
                    Some(u) => DispatchEvent::Heard(u),
                    None => break,
                }
            }
        };

        let reply = match event {
            DispatchEvent::Wake => session.handle_wake_signal(Instant::now()),
            DispatchEvent::Tick => {
                session.tick(Instant::now());
                None
            }
            DispatchEvent::Heard(u) => {
                let handled = tokio::task::spawn_blocking(move || {
                    let reply = session.handle_utterance(&u, Instant::now());
                    (session, reply)
                })
                .await;
                match handled {
                    Ok((returned, reply)) => {
                        session = returned;
                        reply
                    }
                    Err(e) => {
                        error!("utterance handling failed: {e}");
                        break;
                    }
                }
            }
        };

        if let Some(reply) = reply
            && tx.send(reply).await.is_err()
        {
            break;
        }
    }
    debug!("dispatch worker exiting");
}

/// Drain replies into the sink, holding `speaking` while each one plays.
pub(crate) async fn run_speech_stage(
    mut rx: mpsc::Receiver<Reply>,
    mut sink: Box<dyn SpeechSink>,
    speaking: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            reply = rx.recv() => {
                match reply {
                    Some(reply) => {
                        if reply.text.trim().is_empty() {
                            continue;
                        }
                        speaking.store(true, Ordering::Release);
                        let result = sink.speak(&reply).await;
                        speaking.store(false, Ordering::Release);
                        if let Err(e) = result {
                            error!("speech output failed: {e}");
                        }
                    }
                    None => break,
                }
            }
        }
    }
}
