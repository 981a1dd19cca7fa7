//! Distributed notification observer for input source changes.
//!
//! Wraps the `CFNotificationCenter` distributed-center observer for
//! `kTISNotifySelectedKeyboardInputSourceChanged` behind a typed callback
//! registration. The opaque-pointer trampoline stays inside this module;
//! callers see only [`observe_selection_changes`] and the returned handle.
//!
//! Delivery runs on the run loop of the registering thread. Processes
//! without a run loop simply never receive the push hint, which the
//! guard's polling backstop covers.

use std::ffi::c_void;
use std::ptr;

use core_foundation_sys::dictionary::CFDictionaryRef;
use core_foundation_sys::string::CFStringRef;

use crate::source::ChangeCallback;

type CFNotificationCenterRef = *mut c_void;

type CFNotificationCallback = extern "C" fn(
    center: CFNotificationCenterRef,
    observer: *mut c_void,
    name: CFStringRef,
    object: *const c_void,
    user_info: CFDictionaryRef,
);

// CFNotificationSuspensionBehaviorDeliverImmediately
const DELIVER_IMMEDIATELY: isize = 4;

#[link(name = "Carbon", kind = "framework")]
extern "C" {
    static kTISNotifySelectedKeyboardInputSourceChanged: CFStringRef;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFNotificationCenterGetDistributedCenter() -> CFNotificationCenterRef;
    fn CFNotificationCenterAddObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        callback: CFNotificationCallback,
        name: CFStringRef,
        object: *const c_void,
        suspension_behavior: isize,
    );
    fn CFNotificationCenterRemoveObserver(
        center: CFNotificationCenterRef,
        observer: *const c_void,
        name: CFStringRef,
        object: *const c_void,
    );
}

struct ObserverContext {
    callback: ChangeCallback,
}

extern "C" fn trampoline(
    _center: CFNotificationCenterRef,
    observer: *mut c_void,
    _name: CFStringRef,
    _object: *const c_void,
    _user_info: CFDictionaryRef,
) {
    if observer.is_null() {
        return;
    }
    // SAFETY: observer is the ObserverContext pointer registered in
    // observe_selection_changes; it stays allocated until the handle
    // removes the observer and reclaims it in drop.
    let context = unsafe { &*observer.cast::<ObserverContext>() };
    (context.callback)();
}

/// Live registration for selection-change notifications.
///
/// Dropping the handle removes the observer and frees the callback.
pub struct SelectionObserver {
    context: *mut ObserverContext,
}

// SAFETY: the context pointer is dereferenced only by the trampoline while
// the registration is live, and freed exactly once in drop; the callback
// itself is Send + Sync. Moving the handle between threads is sound.
unsafe impl Send for SelectionObserver {}

/// Register `callback` to run whenever the selected keyboard input source
/// changes.
pub fn observe_selection_changes(callback: ChangeCallback) -> SelectionObserver {
    let context = Box::into_raw(Box::new(ObserverContext { callback }));
    // SAFETY: the distributed center is a process-global singleton; the
    // context pointer is valid until the matching RemoveObserver in drop,
    // and the notification name is a framework constant.
    unsafe {
        CFNotificationCenterAddObserver(
            CFNotificationCenterGetDistributedCenter(),
            context.cast(),
            trampoline,
            kTISNotifySelectedKeyboardInputSourceChanged,
            ptr::null(),
            DELIVER_IMMEDIATELY,
        );
    }
    SelectionObserver { context }
}

impl Drop for SelectionObserver {
    fn drop(&mut self) {
        // SAFETY: removes the observer registered with this context, then
        // reclaims the Box allocated in observe_selection_changes. After
        // RemoveObserver returns the trampoline can no longer run for it.
        unsafe {
            CFNotificationCenterRemoveObserver(
                CFNotificationCenterGetDistributedCenter(),
                self.context.cast(),
                kTISNotifySelectedKeyboardInputSourceChanged,
                ptr::null(),
            );
            drop(Box::from_raw(self.context));
        }
    }
}
