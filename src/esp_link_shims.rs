//! ESP-IDF runtime symbol providers for third-party crates.
//!
//! `embassy-sync`'s `CriticalSectionRawMutex` (the inbound MQTT queue)
//! links against the `critical-section` 1.x ABI.  On device the MQTT event
//! thread and the run loop are both FreeRTOS tasks, so a process-wide
//! reentrant lock is enough.

#[cfg(target_os = "espidf")]
use core::cell::{Cell, RefCell};
#[cfg(target_os = "espidf")]
use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(target_os = "espidf")]
static SECTION_LOCK: Mutex<()> = Mutex::new(());

#[cfg(target_os = "espidf")]
thread_local! {
    static DEPTH: Cell<u8> = const { Cell::new(0) };
    static GUARD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    DEPTH.with(|depth| {
        let d = depth.get();
        if d == 0 {
            // A panic inside a section leaves nothing half-written for `()`.
            let lock = SECTION_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            GUARD.with(|g| *g.borrow_mut() = Some(lock));
        }
        depth.set(d.saturating_add(1));
        d
    })
}

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(restore: u8) {
    DEPTH.with(|depth| {
        depth.set(restore);
        if restore == 0 {
            GUARD.with(|g| *g.borrow_mut() = None);
        }
    });
}
