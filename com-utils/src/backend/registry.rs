//! Raw registry access through `advapi32`.
//!
//! Every open goes through the 32-bit registry view (`KEY_WOW64_32KEY`):
//! the COM servers being diagnosed may be 32-bit components regardless of
//! host process bitness, and their registrations live in that branch.

use windows_sys::Win32::Foundation::ERROR_SUCCESS;
use windows_sys::Win32::System::Registry::{
    HKEY, HKEY_CLASSES_ROOT, HKEY_LOCAL_MACHINE, KEY_ENUMERATE_SUB_KEYS, KEY_QUERY_VALUE,
    KEY_WOW64_32KEY, REG_EXPAND_SZ, REG_SZ, RegCloseKey, RegEnumKeyExW, RegOpenKeyExW,
    RegQueryValueExW,
};

use crate::registry::{RegistryRoot, RegistryView};

/// Longest registry key name plus terminator.
const MAX_KEY_NAME: usize = 256;

/// [`RegistryView`] over the live Windows registry (32-bit view).
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsRegistry;

impl RegistryView for WindowsRegistry {
    fn key_exists(&self, root: RegistryRoot, path: &str) -> bool {
        RegKey::open(root, path, KEY_QUERY_VALUE).is_some()
    }

    fn default_value(&self, root: RegistryRoot, path: &str) -> Option<String> {
        RegKey::open(root, path, KEY_QUERY_VALUE)?.default_value()
    }

    fn subkey_names(&self, root: RegistryRoot, path: &str) -> Vec<String> {
        RegKey::open(root, path, KEY_ENUMERATE_SUB_KEYS)
            .map(|key| key.subkey_names())
            .unwrap_or_default()
    }
}

fn root_handle(root: RegistryRoot) -> HKEY {
    match root {
        RegistryRoot::LocalMachine => HKEY_LOCAL_MACHINE,
        RegistryRoot::ClassesRoot => HKEY_CLASSES_ROOT,
    }
}

fn to_wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}

/// An open registry key handle, closed on drop.
struct RegKey(HKEY);

impl RegKey {
    fn open(root: RegistryRoot, path: &str, access: u32) -> Option<Self> {
        let wide = to_wide(path);
        let mut handle: HKEY = std::ptr::null_mut();
        // SAFETY: `wide` is a null-terminated UTF-16 buffer that outlives
        // the call; `handle` receives a key handle only on ERROR_SUCCESS,
        // and ownership of that handle moves into the returned RegKey.
        let status = unsafe {
            RegOpenKeyExW(
                root_handle(root),
                wide.as_ptr(),
                0,
                access | KEY_WOW64_32KEY,
                &mut handle,
            )
        };
        if status == ERROR_SUCCESS {
            Some(Self(handle))
        } else {
            None
        }
    }

    /// The key's default (unnamed) value, when present and string-typed.
    fn default_value(&self) -> Option<String> {
        let mut value_type = 0u32;
        let mut size = 0u32;
        // SAFETY: null value name selects the default value; null data with
        // a zeroed size only queries type and required size.
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                std::ptr::null(),
                std::ptr::null_mut(),
                &mut value_type,
                std::ptr::null_mut(),
                &mut size,
            )
        };
        if status != ERROR_SUCCESS || (value_type != REG_SZ && value_type != REG_EXPAND_SZ) {
            return None;
        }

        let mut data = vec![0u8; size as usize];
        let mut read = size;
        // SAFETY: `data` is a writable buffer of exactly the size the
        // previous query reported; `read` is updated to the bytes written.
        let status = unsafe {
            RegQueryValueExW(
                self.0,
                std::ptr::null(),
                std::ptr::null_mut(),
                &mut value_type,
                data.as_mut_ptr(),
                &mut read,
            )
        };
        if status != ERROR_SUCCESS {
            return None;
        }

        let units: Vec<u16> = data[..read as usize]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
        Some(String::from_utf16_lossy(&units[..end]))
    }

    /// Names of the key's immediate subkeys, in enumeration order.
    fn subkey_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut index = 0u32;
        loop {
            let mut buffer = [0u16; MAX_KEY_NAME];
            let mut length = buffer.len() as u32;
            // SAFETY: `buffer` holds the longest permitted key name;
            // `length` is in/out — capacity in, characters written out.
            let status = unsafe {
                RegEnumKeyExW(
                    self.0,
                    index,
                    buffer.as_mut_ptr(),
                    &mut length,
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                    std::ptr::null_mut(),
                )
            };
            if status != ERROR_SUCCESS {
                break;
            }
            names.push(String::from_utf16_lossy(&buffer[..length as usize]));
            index += 1;
        }
        names
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        // SAFETY: the handle was opened by RegOpenKeyExW and is closed
        // exactly once here.
        unsafe {
            RegCloseKey(self.0);
        }
    }
}
