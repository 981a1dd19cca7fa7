//! FFI quarantine zone - all unsafe code isolated here.
//!
//! The public API in `src/lib.rs` uses `#![deny(unsafe_code)]`; only this
//! module may contain unsafe blocks, and it is not exported. Safe wrappers
//! in [`crate::directory`] are the only consumers.
//!
//! Rules:
//!
//! - Every `unsafe` block has a `// SAFETY:` comment.
//! - No raw pointers escape this module.
//! - `CFRelease` is called for every reference obtained under the copy or
//!   create rule (RAII wrappers).
//!
//! ```text
//! ffi/
//! ├── mod.rs       # This file - module router + non-macOS stubs
//! ├── tis.rs       # Carbon Text Input Source bindings
//! └── notify.rs    # Distributed CFNotificationCenter observer
//! ```

// Allow unsafe in this module only - quarantine zone
#![allow(unsafe_code)]

#[cfg(target_os = "macos")]
pub mod tis;

#[cfg(target_os = "macos")]
pub mod notify;

// Stub modules for non-macOS platforms. The guard and its tests are
// platform-independent; only the system collaborators degrade.
#[cfg(not(target_os = "macos"))]
pub mod tis {
    //! Stub Text Input Source module for non-macOS platforms.

    use crate::error::{Error, Result};

    /// Stub: no active source is readable off macOS.
    pub fn current_source_id() -> Option<String> {
        None
    }

    /// Stub: no source registry off macOS.
    pub fn list_source_ids() -> Option<Vec<String>> {
        None
    }

    /// Stub: selection always unavailable off macOS.
    pub fn select_source(_id: &str) -> Result<()> {
        Err(Error::QueryUnavailable)
    }
}

#[cfg(not(target_os = "macos"))]
pub mod notify {
    //! Stub notification module for non-macOS platforms.

    use crate::source::ChangeCallback;

    /// Stub observer handle; never fires.
    pub struct SelectionObserver;

    /// Stub: accepts and discards the callback.
    pub fn observe_selection_changes(_callback: ChangeCallback) -> SelectionObserver {
        SelectionObserver
    }
}
