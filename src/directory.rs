//! System-backed implementations of the collaborator traits.
//!
//! [`SystemDirectory`] and [`SystemNotifier`] wire the guard to the Carbon
//! Text Input Source registry and to the distributed notification center.
//! Off macOS both degrade gracefully: queries report
//! [`crate::Error::QueryUnavailable`] and the notifier never fires.

use crate::error::{Error, Result};
use crate::ffi;
use crate::guard::InputSourceGuard;
use crate::source::{ChangeCallback, ChangeNotifier, InputSourceDirectory, SourceId};

/// The OS input source registry.
///
/// Stateless: every call reads the registry fresh, so no staleness can
/// leak into restore decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDirectory;

impl SystemDirectory {
    /// Create a handle to the system registry.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl InputSourceDirectory for SystemDirectory {
    fn current_id(&self) -> Result<SourceId> {
        ffi::tis::current_source_id()
            .map(SourceId::from)
            .ok_or(Error::QueryUnavailable)
    }

    fn list(&self) -> Result<Vec<SourceId>> {
        ffi::tis::list_source_ids()
            .map(|ids| ids.into_iter().map(SourceId::from).collect())
            .ok_or(Error::QueryUnavailable)
    }

    fn activate(&self, id: &SourceId) -> Result<()> {
        ffi::tis::select_source(id.as_str())
    }
}

/// Push notifications from the OS selection-change broadcast.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNotifier;

impl SystemNotifier {
    /// Create a handle to the distributed notification center.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Live push registration held between `subscribe` and `unsubscribe`.
///
/// Dropping the handle tears the OS observer down.
pub struct SystemSubscription(#[allow(dead_code)] ffi::notify::SelectionObserver);

impl ChangeNotifier for SystemNotifier {
    type Subscription = SystemSubscription;

    fn subscribe(&self, callback: ChangeCallback) -> Self::Subscription {
        SystemSubscription(ffi::notify::observe_selection_changes(callback))
    }

    fn unsubscribe(&self, subscription: Self::Subscription) {
        drop(subscription);
    }
}

/// Guard wired to the real OS collaborators.
pub type SystemGuard = InputSourceGuard<SystemDirectory, SystemNotifier>;

impl SystemGuard {
    /// Create a guard over the system registry and notification center.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemDirectory::new(), SystemNotifier::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_id_graceful() {
        let directory = SystemDirectory::new();
        // Hardware/session dependent; must not panic either way.
        match directory.current_id() {
            Ok(id) => assert!(!id.as_str().is_empty()),
            Err(err) => assert!(err.is_query_unavailable()),
        }
    }

    #[test]
    fn test_list_graceful() {
        let directory = SystemDirectory::new();
        if let Ok(ids) = directory.list() {
            assert!(ids.iter().all(|id| !id.as_str().is_empty()));
        }
    }

    #[test]
    fn test_activate_unknown_source_fails() {
        let directory = SystemDirectory::new();
        let bogus = SourceId::from("dev.sourcelock.does-not-exist");
        assert!(directory.activate(&bogus).is_err());
    }

    #[test]
    fn test_system_guard_constructs() {
        let guard = SystemGuard::system();
        assert!(!guard.is_locked());
    }
}
