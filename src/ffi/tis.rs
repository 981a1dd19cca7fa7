//! Carbon Text Input Source bindings.
//!
//! # Safety
//!
//! This module contains unsafe FFI code. All unsafe blocks carry SAFETY
//! comments. TIS references obtained under the copy/create rule are held
//! in RAII wrappers that release on drop.
//!
//! # Thread Safety
//!
//! The TIS calls used here are safe to issue from any thread; each call
//! stands alone and no TIS reference outlives the function that made it.

use std::ffi::c_void;
use std::ptr;

use core_foundation::base::TCFType;
use core_foundation::string::CFString;
use core_foundation_sys::array::{CFArrayGetCount, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation_sys::base::CFRelease;
use core_foundation_sys::dictionary::CFDictionaryRef;
use core_foundation_sys::string::CFStringRef;

use crate::error::{Error, Result};

/// Opaque Carbon input source object.
#[repr(C)]
struct OpaqueTISInputSource {
    _private: [u8; 0],
}

type TISInputSourceRef = *mut OpaqueTISInputSource;

#[link(name = "Carbon", kind = "framework")]
extern "C" {
    static kTISPropertyInputSourceID: CFStringRef;

    fn TISCopyCurrentKeyboardInputSource() -> TISInputSourceRef;
    fn TISCreateInputSourceList(
        properties: CFDictionaryRef,
        include_all_installed: u8,
    ) -> CFArrayRef;
    fn TISGetInputSourceProperty(source: TISInputSourceRef, key: CFStringRef) -> *const c_void;
    fn TISSelectInputSource(source: TISInputSourceRef) -> i32;
}

/// RAII wrapper for a retained `TISInputSourceRef` (copy rule).
struct RetainedSource(TISInputSourceRef);

impl Drop for RetainedSource {
    fn drop(&mut self) {
        // SAFETY: self.0 is a valid retained TIS reference obtained from
        // TISCopyCurrentKeyboardInputSource; releasing once balances it.
        unsafe { CFRelease(self.0.cast()) };
    }
}

/// RAII wrapper for a created `CFArrayRef` (create rule).
struct RetainedList(CFArrayRef);

impl Drop for RetainedList {
    fn drop(&mut self) {
        // SAFETY: self.0 is a valid CFArray created by
        // TISCreateInputSourceList; releasing once balances the create.
        unsafe { CFRelease(self.0.cast()) };
    }
}

/// Identifier of the currently active keyboard input source.
///
/// Returns `None` when the source is missing or reports no identifier.
pub fn current_source_id() -> Option<String> {
    // SAFETY: TISCopyCurrentKeyboardInputSource follows the copy rule; a
    // non-null result is released by the RetainedSource wrapper.
    let source = unsafe { TISCopyCurrentKeyboardInputSource() };
    if source.is_null() {
        return None;
    }
    let source = RetainedSource(source);
    source_id_of(source.0)
}

/// Identifiers of all enabled keyboard input sources, in registry order.
///
/// Returns `None` when the registry cannot be enumerated.
pub fn list_source_ids() -> Option<Vec<String>> {
    let list = enabled_sources()?;
    let mut ids = Vec::new();
    // SAFETY: list.0 is a valid CFArray for the lifetime of the wrapper.
    let count = unsafe { CFArrayGetCount(list.0) };
    for index in 0..count {
        // SAFETY: index is in bounds; the array owns its elements, which
        // are TISInputSourceRefs valid while the array is alive.
        let source = unsafe { CFArrayGetValueAtIndex(list.0, index) } as TISInputSourceRef;
        if let Some(id) = source_id_of(source) {
            ids.push(id);
        }
    }
    Some(ids)
}

/// Select the enabled input source with the given identifier.
///
/// Walks the enabled source list and selects the first match, as the
/// identifier itself cannot be handed to the selection call.
///
/// # Errors
///
/// - [`Error::QueryUnavailable`] when the registry cannot be enumerated.
/// - [`Error::SourceNotFound`] when no enabled source matches.
/// - [`Error::ActivationFailed`] when the OS rejects the selection.
pub fn select_source(id: &str) -> Result<()> {
    let list = enabled_sources().ok_or(Error::QueryUnavailable)?;
    // SAFETY: list.0 is a valid CFArray for the lifetime of the wrapper.
    let count = unsafe { CFArrayGetCount(list.0) };
    for index in 0..count {
        // SAFETY: index is in bounds; elements remain valid while the
        // array is alive.
        let source = unsafe { CFArrayGetValueAtIndex(list.0, index) } as TISInputSourceRef;
        if source_id_of(source).as_deref() != Some(id) {
            continue;
        }
        // SAFETY: source is a valid element of the live array.
        let status = unsafe { TISSelectInputSource(source) };
        return if status == 0 {
            Ok(())
        } else {
            Err(Error::activation_failed(status))
        };
    }
    Err(Error::source_not_found(id))
}

fn enabled_sources() -> Option<RetainedList> {
    // SAFETY: TISCreateInputSourceList follows the create rule; a non-null
    // result is released by the RetainedList wrapper. Null properties and
    // false include_all_installed yield the enabled sources only.
    let list = unsafe { TISCreateInputSourceList(ptr::null(), 0) };
    if list.is_null() {
        None
    } else {
        Some(RetainedList(list))
    }
}

/// Read `kTISPropertyInputSourceID` off a source still owned elsewhere.
fn source_id_of(source: TISInputSourceRef) -> Option<String> {
    if source.is_null() {
        return None;
    }
    // SAFETY: source is a valid TIS reference owned by the caller; the
    // property is returned under the get rule (unretained) and the key is
    // a framework constant.
    let id_ptr = unsafe { TISGetInputSourceProperty(source, kTISPropertyInputSourceID) };
    if id_ptr.is_null() {
        return None;
    }
    // SAFETY: the kTISPropertyInputSourceID property is a CFString;
    // wrap_under_get_rule retains it so the conversion owns its reference.
    let id = unsafe { CFString::wrap_under_get_rule(id_ptr as CFStringRef) };
    Some(id.to_string())
}
