//! Windows implementations of the registry and COM runtime seams.

mod identity;
mod registry;
mod rot;

pub use registry::WindowsRegistry;
pub use rot::{ComCursor, ComMoniker, ComObjectTable};
