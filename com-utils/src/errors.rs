use thiserror::Error;

/// Result type alias for COM diagnostic operations.
pub type ComUtilResult<T> = Result<T, ComUtilError>;

/// Centralized error enum for the COM diagnostic utilities.
///
/// Registry lookups that come up empty are *not* errors — they surface as
/// `false` / `None` from the resolver functions. The variants here cover
/// conditions the caller must act on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComUtilError {
    /// A broken interop binding or registration: a co-class redirection with
    /// no determinable target, or an object that does not expose the base
    /// unknown identity. Fix the binding; retrying will not help.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The running object table could not produce an enumerator, or a
    /// registered moniker failed to resolve mid-pass. Fatal for the current
    /// pass only — the table is mutated concurrently by other processes and
    /// a later pass may succeed.
    #[error("enumeration unavailable: {0}")]
    Enumeration(String),

    /// Standard Windows COM error, with a friendly hint for the HRESULT
    /// codes that show up in ROT/registry diagnostics.
    #[cfg(feature = "com-backend")]
    #[error("COM error: {source} ({})", friendly_hresult_hint(.source.code()).unwrap_or("no hint available"))]
    Com {
        #[from]
        source: windows::core::Error,
    },
}

/// Maps known COM error codes to actionable user hints.
#[cfg(feature = "com-backend")]
pub fn friendly_hresult_hint(hr: windows::core::HRESULT) -> Option<&'static str> {
    match hr.0 as u32 {
        0x8004_0154 => Some("Class is not registered on this machine"),
        0x8007_0005 => Some("Access denied — check registry/DCOM permissions for this user"),
        0x8000_4002 => Some("Object does not expose the requested interface (E_NOINTERFACE)"),
        0x8000_4003 => Some("Invalid pointer (E_POINTER)"),
        0x8004_01E3 => Some("No running object is registered under this moniker (MK_E_UNAVAILABLE)"),
        0x8004_01F0 => Some("COM is not initialized on this thread (CO_E_NOTINITIALIZED)"),
        0x8001_0108 => Some("The object was disconnected from its server (RPC_E_DISCONNECTED)"),
        0x8007_06BA => Some("RPC server unavailable — the hosting process may have exited"),
        _ => None,
    }
}
