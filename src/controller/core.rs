use std::sync::Arc;

use tokio::sync::watch;

/// Current value of both flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Signals {
    exit: bool,
    paused: bool,
}

/// Process-wide exit/pause signal shared by every worker.
///
/// Cheap to clone; clones observe the same flags. Every operation is
/// best-effort signalling and never fails.
///
/// # Example
/// ```
/// use flightvisor::Controller;
///
/// let controller = Controller::new();
/// assert!(!controller.is_exit_requested());
///
/// controller.request_exit();
/// controller.request_exit(); // idempotent
/// assert!(controller.is_exit_requested());
///
/// controller.clear_exit();
/// assert!(!controller.is_exit_requested());
/// ```
#[derive(Clone, Debug)]
pub struct Controller {
    signals: Arc<watch::Sender<Signals>>,
}

impl Controller {
    /// Creates a controller with both flags cleared.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Signals::default());
        Self {
            signals: Arc::new(tx),
        }
    }

    /// Sets the exit flag. Repeated calls are no-ops.
    pub fn request_exit(&self) {
        self.signals.send_if_modified(|s| !std::mem::replace(&mut s.exit, true));
    }

    /// Returns true once exit has been requested in this run.
    #[inline]
    pub fn is_exit_requested(&self) -> bool {
        self.signals.borrow().exit
    }

    /// Resets the exit flag so the controller can drive another run.
    ///
    /// The pause flag is left untouched.
    pub fn clear_exit(&self) {
        self.signals.send_if_modified(|s| std::mem::replace(&mut s.exit, false));
    }

    /// Asks every replica to park at its next poll point.
    pub fn request_pause(&self) {
        self.signals.send_if_modified(|s| !std::mem::replace(&mut s.paused, true));
    }

    /// Releases replicas parked in [`check_pause`](Self::check_pause).
    pub fn request_resume(&self) {
        self.signals.send_if_modified(|s| std::mem::replace(&mut s.paused, false));
    }

    /// Returns true while a pause is requested.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.signals.borrow().paused
    }

    /// Parks the caller while the pause flag is set.
    ///
    /// Returns as soon as the pause flag is cleared **or** exit is requested,
    /// whichever happens first; it never waits once exit is set. The return
    /// value tells whether the caller actually had to wait.
    pub async fn check_pause(&self) -> bool {
        let mut rx = self.signals.subscribe();
        if Self::released(&rx.borrow_and_update()) {
            return false;
        }
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(Self::released).await;
        true
    }

    fn released(s: &Signals) -> bool {
        s.exit || !s.paused
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}
