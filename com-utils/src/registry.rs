//! Read-only view over the hierarchical registry namespace.
//!
//! The resolver and the moniker name lookup only ever *read* — key
//! existence, default values, subkey names. Everything else about the
//! registry (bitness, open flags, handle lifetime) is an implementation
//! concern of the backend behind this trait.

#[cfg(any(test, feature = "test-support"))]
use mockall::automock;

/// The two registry roots the diagnostics consult.
///
/// Both are accessed through the 32-bit registry view: the COM servers
/// being diagnosed may be 32-bit components regardless of host bitness,
/// and their registrations live in the WOW6432 branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryRoot {
    /// `HKEY_LOCAL_MACHINE`.
    LocalMachine,
    /// `HKEY_CLASSES_ROOT`.
    ClassesRoot,
}

/// Read-only registry queries.
///
/// Absence and malformed data are expected, common outcomes — every method
/// reports them as a negative result (`false`, `None`, empty), never as an
/// error.
#[cfg_attr(any(test, feature = "test-support"), automock)]
pub trait RegistryView {
    /// Whether a key exists at `path` under `root`.
    fn key_exists(&self, root: RegistryRoot, path: &str) -> bool;

    /// The default (unnamed) string value of the key at `path`, if the key
    /// exists and carries one.
    fn default_value(&self, root: RegistryRoot, path: &str) -> Option<String>;

    /// The names of the immediate subkeys of `path`, empty when the key is
    /// absent or unreadable.
    fn subkey_names(&self, root: RegistryRoot, path: &str) -> Vec<String>;
}
