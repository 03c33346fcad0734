//! # com-utils
//!
//! Diagnostic and interoperability utilities for COM objects on Windows:
//! whether a class is installed, which binary serves a ProgID, what is
//! currently published in the Running Object Table, and a manual
//! reference-count workaround for hosts that die when their object is
//! released.
//!
//! The core is written against three trait seams — [`RegistryView`],
//! [`ObjectTable`], and [`ComIdentity`] — with the live Windows
//! implementations provided by the default-on `com-backend` feature.
//!
//! ## Features
//! - `com-backend` (default): `windows`/`windows-sys` implementations of
//!   the registry and COM runtime seams
//! - `test-support`: exports the in-memory doubles in [`testing`] and a
//!   `mockall` mock of [`RegistryView`]

mod clsid;
mod errors;
mod guard;
mod registry;
mod resolver;
mod rot;

#[cfg(feature = "com-backend")]
mod backend;
#[cfg(feature = "com-backend")]
mod com_guard;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Stable public API
pub use clsid::Clsid;
pub use errors::{ComUtilError, ComUtilResult};
pub use guard::{ComIdentity, ObjectId, RefCountGuard};
pub use registry::{RegistryRoot, RegistryView};
pub use resolver::{
    ClassDescriptor, CoClassTarget, get_file_from_progid, is_class_registered, is_clsid_registered,
};
pub use rot::{Entries, MonikerKind, ObjectTable, RotEntry, RunningObjects, TableCursor, TableMoniker};

// Backend re-exports (conditional)
#[cfg(feature = "com-backend")]
pub use backend::{ComCursor, ComMoniker, ComObjectTable, WindowsRegistry};
#[cfg(feature = "com-backend")]
pub use com_guard::ComGuard;
#[cfg(feature = "com-backend")]
pub use errors::friendly_hresult_hint;

// Test support re-export
#[cfg(any(test, feature = "test-support"))]
pub use registry::MockRegistryView;
