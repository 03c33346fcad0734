//! COM interop for the process-wide Running Object Table.

use windows::Win32::Foundation::S_OK;
use windows::Win32::System::Com::{
    CoTaskMemFree, CreateBindCtx, GetRunningObjectTable, IBindCtx, IEnumMoniker, IMoniker,
    IRunningObjectTable,
};
use windows::core::{GUID, IUnknown};

use crate::clsid::Clsid;
use crate::errors::{ComUtilError, ComUtilResult};
use crate::rot::{ObjectTable, TableCursor, TableMoniker};

/// [`ObjectTable`] over the live Running Object Table.
pub struct ComObjectTable {
    rot: IRunningObjectTable,
}

impl ComObjectTable {
    /// Obtains a handle to the process-wide table.
    ///
    /// Requires COM to be initialized on the calling thread (see
    /// [`crate::ComGuard`]).
    pub fn open() -> ComUtilResult<Self> {
        // SAFETY: standard Win32 FFI call; the reserved argument must be 0.
        let rot = unsafe { GetRunningObjectTable(0) }?;
        Ok(Self { rot })
    }
}

impl ObjectTable for ComObjectTable {
    type Moniker = ComMoniker;
    type Object = IUnknown;
    type Cursor = ComCursor;

    fn open_cursor(&self) -> ComUtilResult<Option<ComCursor>> {
        // SAFETY: `self.rot` is a live interface obtained in `open()`.
        let Ok(iter) = (unsafe { self.rot.EnumRunning() }) else {
            // The runtime handed back no enumerator; the enumerator layer
            // reports this pass as unavailable.
            return Ok(None);
        };
        // SAFETY: standard Win32 FFI call; the reserved argument must be 0.
        let ctx = unsafe { CreateBindCtx(0) }?;
        Ok(Some(ComCursor {
            iter,
            pinned: None,
            ctx,
        }))
    }

    fn resolve_object(&self, moniker: &ComMoniker) -> ComUtilResult<IUnknown> {
        // SAFETY: both interfaces are live; a failure here means the table
        // holds a registration with no resolvable object.
        unsafe { self.rot.GetObject(&moniker.moniker) }.map_err(ComUtilError::from)
    }
}

/// One pass's cursor: the table enumerator plus the binding context used
/// for display-name resolution.
pub struct ComCursor {
    iter: IEnumMoniker,
    /// Extra reference held while a pass is in flight, so the enumerator
    /// cannot be released underneath the traversal.
    pinned: Option<IEnumMoniker>,
    ctx: IBindCtx,
}

impl TableCursor for ComCursor {
    type Moniker = ComMoniker;

    fn pin(&mut self) {
        self.pinned = Some(self.iter.clone());
    }

    fn unpin(&mut self) {
        self.pinned = None;
    }

    fn next_moniker(&mut self) -> Option<ComMoniker> {
        let mut slot: [Option<IMoniker>; 1] = [None];
        let mut fetched = 0u32;
        // SAFETY: `slot` provides room for exactly the one element
        // requested; `fetched` receives the element count.
        let hr = unsafe { self.iter.Next(&mut slot, Some(&mut fetched)) };
        if hr != S_OK {
            return None;
        }
        slot[0].take().map(|moniker| ComMoniker {
            moniker,
            ctx: self.ctx.clone(),
        })
    }
}

/// A moniker yielded by [`ComCursor`], bound to the pass's context.
pub struct ComMoniker {
    moniker: IMoniker,
    ctx: IBindCtx,
}

impl TableMoniker for ComMoniker {
    fn display_name(&self) -> ComUtilResult<String> {
        // SAFETY: `GetDisplayName` allocates the returned string via the
        // COM allocator; it is copied and freed before returning, and the
        // pointer is not used after the free.
        unsafe {
            let pwstr = self.moniker.GetDisplayName(&self.ctx, None)?;
            let text = pwstr
                .to_string()
                .map_err(|e| ComUtilError::Enumeration(format!("display name not UTF-16: {e}")));
            if !pwstr.is_null() {
                CoTaskMemFree(Some(pwstr.as_ptr() as *const _));
            }
            text
        }
    }

    fn class_id(&self) -> ComUtilResult<Clsid> {
        // SAFETY: `self.moniker` is a live interface.
        let guid = unsafe { self.moniker.GetClassID() }?;
        Ok(clsid_from_guid(&guid))
    }

    fn system_kind(&self) -> Option<i32> {
        // SAFETY: `self.moniker` is a live interface.
        match unsafe { self.moniker.IsSystemMoniker() } {
            Ok(kind) if kind.0 != 0 => Some(kind.0),
            _ => None,
        }
    }
}

fn clsid_from_guid(guid: &GUID) -> Clsid {
    Clsid::new(format!(
        "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        guid.data1,
        guid.data2,
        guid.data3,
        guid.data4[0],
        guid.data4[1],
        guid.data4[2],
        guid.data4[3],
        guid.data4[4],
        guid.data4[5],
        guid.data4[6],
        guid.data4[7],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_formats_to_braced_uppercase() {
        let guid = GUID::from_u128(0x0002_4500_0000_0000_C000_0000_0000_0046);
        assert_eq!(
            clsid_from_guid(&guid).as_str(),
            "{00024500-0000-0000-C000-000000000046}"
        );
    }

    #[test]
    fn zeroed_guid_formats_to_the_null_clsid() {
        assert_eq!(
            clsid_from_guid(&GUID::zeroed()).as_str(),
            "{00000000-0000-0000-0000-000000000000}"
        );
    }
}
