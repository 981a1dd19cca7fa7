//! The input source guard: a small state machine that pins the active
//! keyboard input source to a locked target and reverts external changes.
//!
//! Two independent triggers funnel into one reconciliation routine:
//!
//! 1. **Push**: the [`ChangeNotifier`] collaborator fires on OS-level
//!    source changes. Delivery is best-effort; the guard never relies on
//!    it as sole truth.
//! 2. **Poll**: a fixed-interval worker thread fires unconditionally while
//!    the guard is running. This is the correctness backstop: even with
//!    push entirely absent, drift is corrected within one interval.
//!
//! Reconciliation is naturally idempotent (`current == target`
//! short-circuits), so the guard's own corrective switch needs no
//! debouncing: a feedback notification triggers one extra pass that
//! immediately no-ops.
//!
//! # Example
//!
//! ```no_run
//! use sourcelock::InputSourceGuard;
//!
//! let mut guard = InputSourceGuard::system();
//! guard.start();
//! let target = guard.lock()?;
//! println!("pinned to {target}");
//! # Ok::<(), sourcelock::Error>(())
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::source::{ChangeCallback, ChangeNotifier, InputSourceDirectory, SourceId};

/// Default interval of the polling backstop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Observer interface for the presentation layer.
///
/// Registered as a [`Weak`] reference: the guard never keeps its observer
/// alive, mirroring a non-owning delegate. Both callbacks are
/// fire-and-forget and run on whichever thread detected the event, so they
/// must return promptly and must not block.
pub trait GuardDelegate: Send + Sync {
    /// The guard's lock state changed (a `lock()` succeeded or an
    /// `unlock()` released a held lock). Cosmetic; suitable for refreshing
    /// an icon or menu.
    fn state_changed(&self) {}

    /// Drift was detected and a restore was attempted. Fired once per
    /// detecting reconciliation pass, on detection rather than on
    /// confirmed restoration.
    fn restored_after_drift(&self) {}
}

/// Lock state of the guard.
///
/// The target identifier exists exactly while locked; the representation
/// makes a locked-without-target (or vice versa) state unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No target is held; triggers are no-ops.
    Unlocked,
    /// The active source is pinned to `target`.
    Locked {
        /// Identifier captured from the directory at lock time.
        target: SourceId,
    },
}

impl LockState {
    /// Whether a target is currently held.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    /// The held target, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&SourceId> {
        match self {
            Self::Locked { target } => Some(target),
            Self::Unlocked => None,
        }
    }
}

struct GuardState {
    started: bool,
    lock: LockState,
}

/// State shared between the guard handle, the poll worker, and the push
/// callback. All mutation happens under the one `state` mutex, which
/// serializes `reconcile` against `lock()`/`unlock()` and against itself.
struct GuardInner<D> {
    directory: D,
    state: Mutex<GuardState>,
    // Wakes the poll worker early so stop() never waits a full interval.
    wake: Condvar,
    delegate: Mutex<Option<Weak<dyn GuardDelegate>>>,
}

impl<D> GuardInner<D> {
    fn state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: impl Fn(&dyn GuardDelegate)) {
        let delegate = {
            let slot = self.delegate.lock().unwrap_or_else(PoisonError::into_inner);
            slot.as_ref().and_then(Weak::upgrade)
        };
        if let Some(delegate) = delegate {
            event(delegate.as_ref());
        }
    }
}

impl<D: InputSourceDirectory> GuardInner<D> {
    /// Single entry point for both triggers. Delegate notification happens
    /// after the state mutex is released, so a delegate may call back into
    /// the guard without deadlocking.
    fn reconcile(&self) {
        let drifted = {
            let state = self.state();
            // Stale trigger racing teardown; drop it.
            if !state.started {
                return;
            }
            self.check_and_restore(&state)
        };
        if drifted {
            self.notify(|delegate| delegate.restored_after_drift());
        }
    }

    /// The reconciliation check. Runs with the state mutex held; returns
    /// `true` when drift was detected and a restore was attempted.
    fn check_and_restore(&self, state: &GuardState) -> bool {
        let LockState::Locked { target } = &state.lock else {
            return false;
        };
        let Ok(current) = self.directory.current_id() else {
            // Transient query failure; the next trigger retries.
            return false;
        };
        if current == *target {
            return false;
        }
        debug!(from = %current, to = %target, "input source drifted, restoring");
        if let Err(err) = self.directory.activate(target) {
            // Fire-and-forget: the next trigger re-detects remaining
            // drift, so no retry bookkeeping is kept here.
            warn!(source = %target, %err, "restore attempt failed");
        }
        true
    }
}

/// Guard that pins the active keyboard input source to a locked target.
///
/// Construct once, [`start`](Self::start) it, and hand out `lock()` /
/// `unlock()` to the UI. Dropping the guard stops it.
///
/// Generic over its two collaborators so tests can substitute in-memory
/// fakes; [`InputSourceGuard::system`] wires up the real OS
/// implementations.
pub struct InputSourceGuard<D, N: ChangeNotifier> {
    inner: Arc<GuardInner<D>>,
    notifier: N,
    poll_interval: Duration,
    subscription: Option<N::Subscription>,
    poll_worker: Option<JoinHandle<()>>,
}

impl<D, N> InputSourceGuard<D, N>
where
    D: InputSourceDirectory + Send + Sync + 'static,
    N: ChangeNotifier,
{
    /// Create a stopped, unlocked guard over the given collaborators.
    pub fn new(directory: D, notifier: N) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                directory,
                state: Mutex::new(GuardState {
                    started: false,
                    lock: LockState::Unlocked,
                }),
                wake: Condvar::new(),
                delegate: Mutex::new(None),
            }),
            notifier,
            poll_interval: DEFAULT_POLL_INTERVAL,
            subscription: None,
            poll_worker: None,
        }
    }

    /// Override the polling backstop interval (default 1 s).
    ///
    /// Takes effect on the next [`start`](Self::start).
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Register the presentation-layer observer.
    ///
    /// The guard holds only the weak reference; once the observer is
    /// dropped, notifications silently stop.
    pub fn set_delegate(&self, delegate: Weak<dyn GuardDelegate>) {
        let mut slot = self
            .inner
            .delegate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(delegate);
    }

    /// Current lock state snapshot.
    #[must_use]
    pub fn lock_state(&self) -> LockState {
        self.inner.state().lock.clone()
    }

    /// Whether a target is currently held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.state().lock.is_locked()
    }

    /// The locked target, if any.
    #[must_use]
    pub fn target(&self) -> Option<SourceId> {
        self.inner.state().lock.target().cloned()
    }

    /// Pin the currently active input source.
    ///
    /// Captures the active identifier at this instant and transitions to
    /// locked. Callable whether or not the guard is started and whether or
    /// not it is already locked (re-locking captures a fresh target).
    ///
    /// # Errors
    ///
    /// [`crate::Error::QueryUnavailable`] when the active source reports
    /// no valid identifier; the state is left unchanged.
    #[instrument(level = "debug", skip(self))]
    pub fn lock(&self) -> Result<SourceId> {
        let current = self.inner.directory.current_id()?;
        {
            let mut state = self.inner.state();
            state.lock = LockState::Locked {
                target: current.clone(),
            };
        }
        debug!(source = %current, "input source locked");
        self.inner.notify(|delegate| delegate.state_changed());
        Ok(current)
    }

    /// Release the lock. Idempotent: when already unlocked this touches
    /// nothing and notifies nobody.
    #[instrument(level = "debug", skip(self))]
    pub fn unlock(&self) {
        let was_locked = {
            let mut state = self.inner.state();
            let was_locked = state.lock.is_locked();
            state.lock = LockState::Unlocked;
            was_locked
        };
        if was_locked {
            debug!("input source unlocked");
            self.inner.notify(|delegate| delegate.state_changed());
        }
    }

    /// Begin monitoring: subscribe to the push notifier and spawn the poll
    /// worker. Idempotent; a started guard stays as it is.
    #[instrument(level = "debug", skip(self))]
    pub fn start(&mut self) {
        {
            let mut state = self.inner.state();
            if state.started {
                return;
            }
            state.started = true;
        }

        let push_target = Arc::clone(&self.inner);
        let callback: ChangeCallback = Box::new(move || push_target.reconcile());
        self.subscription = Some(self.notifier.subscribe(callback));

        let poll_target = Arc::clone(&self.inner);
        let interval = self.poll_interval;
        self.poll_worker = Some(thread::spawn(move || poll_loop(&poll_target, interval)));
        debug!(?interval, "guard started");
    }

    /// Stop monitoring: unsubscribe, wake and join the poll worker.
    ///
    /// Idempotent. After this returns no further reconciliation can fire:
    /// a trigger already racing teardown sees the cleared `started` flag
    /// at entry and drops itself.
    #[instrument(level = "debug", skip(self))]
    pub fn stop(&mut self) {
        self.shutdown();
    }
}

impl<D, N: ChangeNotifier> InputSourceGuard<D, N> {
    fn shutdown(&mut self) {
        {
            let mut state = self.inner.state();
            state.started = false;
        }
        if let Some(subscription) = self.subscription.take() {
            self.notifier.unsubscribe(subscription);
        }
        self.inner.wake.notify_all();
        if let Some(worker) = self.poll_worker.take() {
            let _ = worker.join();
        }
        debug!("guard stopped");
    }
}

impl<D, N: ChangeNotifier> Drop for InputSourceGuard<D, N> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll worker body: park on the condvar for one interval, then run the
/// reconciliation check under the same mutex acquisition. `stop()` clears
/// `started` and signals the condvar, so shutdown never waits out a full
/// interval.
fn poll_loop<D: InputSourceDirectory>(inner: &GuardInner<D>, interval: Duration) {
    loop {
        let drifted = {
            let state = inner.state();
            if !state.started {
                break;
            }
            let (state, _timed_out) = inner
                .wake
                .wait_timeout(state, interval)
                .unwrap_or_else(PoisonError::into_inner);
            if !state.started {
                break;
            }
            inner.check_and_restore(&state)
        };
        if drifted {
            inner.notify(|delegate| delegate.restored_after_drift());
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory directory whose active source the test mutates directly.
    #[derive(Clone, Default)]
    struct FakeDirectory {
        shared: Arc<Mutex<FakeDirectoryState>>,
    }

    #[derive(Default)]
    struct FakeDirectoryState {
        current: Option<SourceId>,
        activations: Vec<SourceId>,
        queries: usize,
    }

    impl FakeDirectory {
        fn set_current(&self, id: &str) {
            self.shared.lock().unwrap().current = Some(SourceId::from(id));
        }

        fn activations(&self) -> Vec<SourceId> {
            self.shared.lock().unwrap().activations.clone()
        }

        fn queries(&self) -> usize {
            self.shared.lock().unwrap().queries
        }
    }

    impl InputSourceDirectory for FakeDirectory {
        fn current_id(&self) -> Result<SourceId> {
            let mut state = self.shared.lock().unwrap();
            state.queries += 1;
            state.current.clone().ok_or(Error::QueryUnavailable)
        }

        fn list(&self) -> Result<Vec<SourceId>> {
            Ok(self.shared.lock().unwrap().current.clone().into_iter().collect())
        }

        fn activate(&self, id: &SourceId) -> Result<()> {
            let mut state = self.shared.lock().unwrap();
            state.activations.push(id.clone());
            state.current = Some(id.clone());
            Ok(())
        }
    }

    /// Notifier that hands the registered callback back to the test.
    #[derive(Clone, Default)]
    struct FakeNotifier {
        callback: Arc<Mutex<Option<ChangeCallback>>>,
    }

    impl FakeNotifier {
        fn fire(&self) {
            let slot = self.callback.lock().unwrap();
            if let Some(callback) = slot.as_ref() {
                callback();
            }
        }
    }

    impl ChangeNotifier for FakeNotifier {
        type Subscription = ();

        fn subscribe(&self, callback: ChangeCallback) {
            *self.callback.lock().unwrap() = Some(callback);
        }

        fn unsubscribe(&self, (): ()) {
            *self.callback.lock().unwrap() = None;
        }
    }

    #[derive(Default)]
    struct CountingDelegate {
        state_changes: AtomicUsize,
        restores: AtomicUsize,
    }

    impl GuardDelegate for CountingDelegate {
        fn state_changed(&self) {
            self.state_changes.fetch_add(1, Ordering::SeqCst);
        }

        fn restored_after_drift(&self) {
            self.restores.fetch_add(1, Ordering::SeqCst);
        }
    }

    // Long interval keeps the poll worker out of push-driven tests.
    const IDLE: Duration = Duration::from_secs(3600);

    fn guard(
        directory: &FakeDirectory,
        notifier: &FakeNotifier,
    ) -> InputSourceGuard<FakeDirectory, FakeNotifier> {
        InputSourceGuard::new(directory.clone(), notifier.clone()).with_poll_interval(IDLE)
    }

    #[test]
    fn test_lock_state_accessors() {
        assert!(!LockState::Unlocked.is_locked());
        assert!(LockState::Unlocked.target().is_none());

        let locked = LockState::Locked {
            target: SourceId::from("com.apple.keylayout.US"),
        };
        assert!(locked.is_locked());
        assert_eq!(
            locked.target(),
            Some(&SourceId::from("com.apple.keylayout.US"))
        );
    }

    #[test]
    fn test_lock_captures_current_id() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        directory.set_current("com.apple.keylayout.US");
        let guard = guard(&directory, &notifier);

        let captured = guard.lock().unwrap();
        assert_eq!(captured, SourceId::from("com.apple.keylayout.US"));

        // A later external change must not move the captured target.
        directory.set_current("com.apple.keylayout.ABC");
        assert_eq!(guard.target(), Some(SourceId::from("com.apple.keylayout.US")));
    }

    #[test]
    fn test_lock_fails_when_query_unavailable() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        let guard = guard(&directory, &notifier);

        assert_eq!(guard.lock(), Err(Error::QueryUnavailable));
        assert!(!guard.is_locked());
        assert!(guard.target().is_none());
    }

    #[test]
    fn test_unlock_is_idempotent_and_silent() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        let guard = guard(&directory, &notifier);
        let delegate = Arc::new(CountingDelegate::default());
        guard.set_delegate(Arc::<CountingDelegate>::downgrade(&delegate));

        guard.unlock();
        guard.unlock();

        assert!(!guard.is_locked());
        assert_eq!(directory.queries(), 0);
        assert_eq!(delegate.state_changes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_push_trigger_restores_drift() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        directory.set_current("com.apple.keylayout.US");
        let mut guard = guard(&directory, &notifier);
        let delegate = Arc::new(CountingDelegate::default());
        guard.set_delegate(Arc::<CountingDelegate>::downgrade(&delegate));

        guard.start();
        guard.lock().unwrap();

        directory.set_current("com.apple.keylayout.ABC");
        notifier.fire();

        assert_eq!(
            directory.activations(),
            vec![SourceId::from("com.apple.keylayout.US")]
        );
        assert_eq!(delegate.restores.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reconcile_noop_without_drift() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        directory.set_current("com.apple.keylayout.US");
        let mut guard = guard(&directory, &notifier);

        guard.start();
        guard.lock().unwrap();
        for _ in 0..10 {
            notifier.fire();
        }

        assert!(directory.activations().is_empty());
    }

    #[test]
    fn test_triggers_after_stop_are_dropped() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        directory.set_current("com.apple.keylayout.US");
        let mut guard = guard(&directory, &notifier);

        guard.start();
        guard.lock().unwrap();
        guard.stop();

        directory.set_current("com.apple.keylayout.ABC");
        // The real notifier cannot fire after unsubscribe; simulate a
        // stale in-flight callback by re-registering and firing.
        let stale = Arc::clone(&guard.inner);
        let reconcile: ChangeCallback = Box::new(move || stale.reconcile());
        reconcile();

        assert!(directory.activations().is_empty());
    }

    #[test]
    fn test_start_is_idempotent() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        let mut guard = guard(&directory, &notifier);
        guard.start();
        guard.start();
        guard.stop();
    }

    #[test]
    fn test_dropped_delegate_silences_notifications() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        directory.set_current("com.apple.keylayout.US");
        let mut guard = guard(&directory, &notifier);
        let delegate = Arc::new(CountingDelegate::default());
        guard.set_delegate(Arc::<CountingDelegate>::downgrade(&delegate));
        drop(delegate);

        guard.start();
        guard.lock().unwrap();
        directory.set_current("com.apple.keylayout.ABC");
        // Must not panic with a dead observer; the restore still happens.
        notifier.fire();

        assert_eq!(
            directory.activations(),
            vec![SourceId::from("com.apple.keylayout.US")]
        );
    }

    #[test]
    fn test_poll_backstop_corrects_drift() {
        let directory = FakeDirectory::default();
        let notifier = FakeNotifier::default();
        directory.set_current("com.apple.keylayout.US");
        let mut guard = InputSourceGuard::new(directory.clone(), notifier)
            .with_poll_interval(Duration::from_millis(10));

        guard.start();
        guard.lock().unwrap();
        directory.set_current("com.apple.keylayout.ABC");

        // Push never fires; only the poll worker can correct this.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while directory.activations().is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        guard.stop();

        assert_eq!(
            directory.activations(),
            vec![SourceId::from("com.apple.keylayout.US")]
        );
    }
}
