//! RAII guard for COM initialization/teardown.

use std::marker::PhantomData;

use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{COINIT_MULTITHREADED, CoInitializeEx, CoUninitialize};

use crate::errors::ComUtilResult;

/// Drop guard for per-thread COM initialization.
///
/// [`ComGuard::new`] joins the Multi-Threaded Apartment; dropping the
/// guard uninitializes COM exactly once for that successful
/// initialization. A thread already initialized in a different apartment
/// model is tolerated — the guard then leaves teardown to whoever owns
/// the original initialization.
///
/// `ComGuard` is `!Send` and `!Sync`: COM initialization is per-thread
/// and the guard must be dropped on the thread that created it.
#[derive(Debug)]
pub struct ComGuard {
    uninit_on_drop: bool,
    /// Prevents `Send + Sync` auto-derivation.
    _not_send: PhantomData<*mut ()>,
}

impl ComGuard {
    /// Initializes COM in MTA mode on the current thread.
    pub fn new() -> ComUtilResult<Self> {
        // SAFETY: standard Win32 FFI call; the result is checked below and
        // teardown is paired via Drop on the same thread (!Send).
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };

        match hr.ok() {
            Ok(()) => {
                tracing::debug!("COM MTA initialized");
                Ok(Self {
                    uninit_on_drop: true,
                    _not_send: PhantomData,
                })
            }
            Err(e) if e.code() == RPC_E_CHANGED_MODE => {
                // Thread already lives in an STA; usable as-is.
                tracing::debug!("COM already initialized in a different apartment model");
                Ok(Self {
                    uninit_on_drop: false,
                    _not_send: PhantomData,
                })
            }
            Err(e) => {
                tracing::error!(error = ?e, "COM initialization failed");
                Err(e.into())
            }
        }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.uninit_on_drop {
            tracing::debug!("COM MTA teardown");
            // SAFETY: paired with the successful `CoInitializeEx` in
            // `new()`, on the creating thread.
            unsafe {
                CoUninitialize();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn com_guard_constructs_and_drops() {
        let guard = ComGuard::new();
        assert!(guard.is_ok(), "ComGuard::new() should succeed: {guard:?}");
        // Guard drops here — CoUninitialize runs.
    }
}
