//! Input source identity and the collaborator seams the guard consumes.
//!
//! The guard never talks to the OS directly. It sees the world through two
//! narrow traits: [`InputSourceDirectory`] (query / enumerate / activate)
//! and [`ChangeNotifier`] (best-effort push notification of source
//! changes). The system implementations live in [`crate::directory`]; tests
//! substitute in-memory fakes.

use std::fmt;

use crate::error::Result;

/// Stable, opaque identifier of a keyboard input source.
///
/// On macOS these are reverse-DNS strings such as
/// `com.apple.keylayout.US` or `com.apple.inputmethod.SCIM.ITABC`. The
/// guard treats them as opaque: equality is the only operation drift
/// detection needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    /// Create an identifier from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Query and selection surface of the OS input source registry.
///
/// The active source id is deliberately never cached by callers: it is
/// re-read on every reconciliation, because a stale value would produce
/// wrong restore decisions.
pub trait InputSourceDirectory {
    /// Identifier of the currently active keyboard input source.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryUnavailable`] when no source reports a
    /// valid identifier.
    fn current_id(&self) -> Result<SourceId>;

    /// Identifiers of all selectable keyboard input sources.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryUnavailable`] when the registry cannot
    /// be enumerated.
    fn list(&self) -> Result<Vec<SourceId>>;

    /// Make the source with the given identifier active.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceNotFound`] when no installed source
    /// matches, or [`crate::Error::ActivationFailed`] when the OS rejects
    /// the selection.
    fn activate(&self, id: &SourceId) -> Result<()>;
}

/// Callback invoked when the OS reports an input source change.
pub type ChangeCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Best-effort push notification of input source changes.
///
/// Delivery is at-most-effort: notifications can be coalesced, delayed, or
/// dropped entirely. Consumers must treat a callback as a low-latency hint
/// and keep an independent polling backstop.
pub trait ChangeNotifier {
    /// Token returned by [`subscribe`](Self::subscribe), consumed by
    /// [`unsubscribe`](Self::unsubscribe).
    type Subscription;

    /// Register `callback` to run on every reported source change.
    fn subscribe(&self, callback: ChangeCallback) -> Self::Subscription;

    /// Tear down a registration. Callbacks already in flight may still
    /// complete; none start after this returns.
    fn unsubscribe(&self, subscription: Self::Subscription);
}
