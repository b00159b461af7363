use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::phase::{Phase, PresentationState};

/// Shared read handle to the live presentation state. The director is the
/// only writer; surfaces take snapshots through this.
pub type StateHandle = Arc<Mutex<PresentationState>>;

/// Drives the presentation through its phases on a wall-clock schedule.
///
/// Exactly one scheduled tick can be pending at any time: the ticker is a
/// single owned task, and `start` aborts it before spawning a replacement,
/// so re-entrant ticks are impossible.
pub struct Director {
    state: StateHandle,
    suppress_tx: watch::Sender<bool>,
    ticker: Option<JoinHandle<()>>,
}

impl Director {
    pub fn new() -> Self {
        let (suppress_tx, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(PresentationState::default())),
            suppress_tx,
            ticker: None,
        }
    }

    /// Snapshot of the current presentation state.
    pub fn state(&self) -> PresentationState {
        self.state.lock().clone()
    }

    /// Shared handle for render surfaces observing the presentation.
    pub fn state_handle(&self) -> StateHandle {
        Arc::clone(&self.state)
    }

    /// Play/Stop toggle. From `Idle` or `Outro` this resets the state,
    /// applies the `Idle -> Ready` transition immediately and begins
    /// self-scheduling. Called mid-sequence it resets to `Idle` and halts,
    /// cancelling the pending tick.
    pub fn start(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }

        let mut state = self.state.lock();
        let was_resting = matches!(state.phase, Phase::Idle | Phase::Outro);
        state.reset();
        if !was_resting {
            tracing::info!("presentation stopped");
            return;
        }
        state.advance();
        drop(state);

        tracing::info!("presentation started");
        self.ticker = Some(self.spawn_ticker());
    }

    /// Stops scheduling and returns the state to `Idle`.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.state.lock().reset();
    }

    /// Suppresses auto-advance for the guard's lifetime. Checked before each
    /// tick is scheduled; a tick already pending when suppression begins is
    /// dropped, and scheduling resumes with a fresh full delay afterwards.
    pub fn suppress_guard(&self) -> SuppressGuard<'_> {
        self.suppress_tx.send_replace(true);
        tracing::debug!("auto-advance suppressed");
        SuppressGuard {
            suppress_tx: &self.suppress_tx,
        }
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let mut suppressed = self.suppress_tx.subscribe();

        tokio::spawn(async move {
            loop {
                // No ticks fire while a capture session holds the guard.
                while *suppressed.borrow_and_update() {
                    if suppressed.changed().await.is_err() {
                        return;
                    }
                }

                let Some(delay) = state.lock().phase.tick_delay() else {
                    return;
                };

                tokio::select! {
                    _ = sleep(delay) => {
                        let mut state = state.lock();
                        state.advance();
                        tracing::debug!(phase = ?state.phase, question = state.question_index, "tick");
                    }
                    changed = suppressed.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        // Pending tick dropped; loop back and wait it out.
                    }
                }
            }
        })
    }
}

impl Drop for Director {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Default for Director {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SuppressGuard<'a> {
    suppress_tx: &'a watch::Sender<bool>,
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.suppress_tx.send_replace(false);
        tracing::debug!("auto-advance resumed");
    }
}
