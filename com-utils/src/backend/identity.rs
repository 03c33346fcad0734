//! Base-unknown surface of `windows` interface pointers.

use windows::core::{IUnknown, Interface};

use crate::errors::{ComUtilError, ComUtilResult};
use crate::guard::{ComIdentity, ObjectId};

impl ComIdentity for IUnknown {
    fn base_identity(&self) -> ComUtilResult<ObjectId> {
        // COM identity rule: querying any interface of an object for
        // IUnknown yields one canonical pointer.
        let canonical: IUnknown = self.cast().map_err(|e| {
            ComUtilError::Configuration(format!("object does not expose a base COM identity: {e}"))
        })?;
        Ok(ObjectId::new(canonical.as_raw() as usize))
    }

    fn add_ref(&self) -> u32 {
        // SAFETY: raw vtable call on a live interface pointer; the count
        // is raised by exactly one and observed from the return value.
        unsafe { (Interface::vtable(self).AddRef)(Interface::as_raw(self)) }
    }

    fn release(&self) -> u32 {
        // SAFETY: raw vtable call on a live interface pointer. The caller
        // owns the releases it issues; `RefCountGuard::decrease` defuses
        // the wrapper afterwards so Drop cannot release again.
        unsafe { (Interface::vtable(self).Release)(Interface::as_raw(self)) }
    }

    fn defuse(self) {
        // The underlying reference is gone; skip the wrapper's Drop.
        std::mem::forget(self);
    }
}
