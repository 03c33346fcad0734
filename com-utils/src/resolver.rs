//! Registry-backed ProgID ⇄ CLSID ⇄ server-path resolution.

use crate::clsid::Clsid;
use crate::errors::{ComUtilError, ComUtilResult};
use crate::registry::{RegistryRoot, RegistryView};

/// Identity metadata for a COM class binding, as seen from the interop
/// layer.
///
/// A descriptor may stand in for the real coclass (an interop proxy): in
/// that case it carries a [`CoClassTarget`] redirection that must be
/// followed before any identity is read off it.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    name: String,
    clsid: Option<String>,
    alt_clsid: Option<String>,
    co_class: Option<CoClassTarget>,
}

/// Where a proxy descriptor redirects to.
#[derive(Debug, Clone)]
pub enum CoClassTarget {
    /// The implementing coclass.
    Descriptor(Box<ClassDescriptor>),
    /// A redirection is declared but its target cannot be determined —
    /// typically an interop binding compiled with embedded types.
    Undetermined,
}

impl ClassDescriptor {
    /// A descriptor with no identity metadata; compose with the `with_*`
    /// builders.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clsid: None,
            alt_clsid: None,
            co_class: None,
        }
    }

    /// Primary class identifier (braces optional).
    pub fn with_clsid(mut self, clsid: impl Into<String>) -> Self {
        self.clsid = Some(clsid.into());
        self
    }

    /// Alternate identifier, consulted only when the primary is absent.
    pub fn with_alt_clsid(mut self, clsid: impl Into<String>) -> Self {
        self.alt_clsid = Some(clsid.into());
        self
    }

    /// Declares this descriptor a proxy for `target`.
    pub fn with_co_class(mut self, target: ClassDescriptor) -> Self {
        self.co_class = Some(CoClassTarget::Descriptor(Box::new(target)));
        self
    }

    /// Declares a redirection whose target could not be resolved.
    pub fn with_undetermined_co_class(mut self) -> Self {
        self.co_class = Some(CoClassTarget::Undetermined);
        self
    }

    /// The descriptor's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn effective_clsid(&self) -> Option<&str> {
        self.clsid.as_deref().or(self.alt_clsid.as_deref())
    }
}

/// Whether the class behind `descriptor` is registered on this machine.
///
/// Follows a declared co-class redirection first; a redirection with no
/// determinable target is a broken interop binding and fails with
/// [`ComUtilError::Configuration`] rather than reporting "not registered".
/// A descriptor with no extractable CLSID yields `Ok(false)`.
pub fn is_class_registered<R: RegistryView>(
    registry: &R,
    descriptor: &ClassDescriptor,
) -> ComUtilResult<bool> {
    let resolved = match &descriptor.co_class {
        Some(CoClassTarget::Descriptor(target)) => target.as_ref(),
        Some(CoClassTarget::Undetermined) => {
            return Err(ComUtilError::Configuration(format!(
                "could not determine the implementing coclass for {} — embedded interop types used for reference?",
                descriptor.name
            )));
        }
        None => descriptor,
    };

    let Some(clsid) = resolved.effective_clsid() else {
        tracing::debug!(class = %descriptor.name, "no class identifier on descriptor");
        return Ok(false);
    };

    Ok(is_clsid_registered(registry, clsid))
}

/// Whether a key exists for `clsid` under the local machine's class
/// registration namespace (32-bit view). Empty input is never registered.
pub fn is_clsid_registered<R: RegistryView>(registry: &R, clsid: &str) -> bool {
    if clsid.is_empty() {
        return false;
    }
    let clsid = Clsid::new(clsid);
    registry.key_exists(
        RegistryRoot::LocalMachine,
        &format!(r"Software\Classes\CLSID\{clsid}"),
    )
}

/// Resolves a ProgID to the path of its registered server binary.
///
/// Tries the direct route first — `progid\CLSID` then that class's
/// `LocalServer32` — and falls back to a reverse scan of every `CLSID`
/// subkey whose `ProgID` value matches, reading `InprocServer32` instead.
/// Some registrations only populate one direction of the ProgID/CLSID
/// mapping, so both routes are needed. Quotes are stripped from the
/// stored value; `None` when neither route finds a path.
pub fn get_file_from_progid<R: RegistryView>(registry: &R, prog_id: &str) -> Option<String> {
    if let Some(clsid) = registry.default_value(RegistryRoot::ClassesRoot, &format!(r"{prog_id}\CLSID"))
    {
        if !clsid.is_empty() {
            if let Some(server) = registry
                .default_value(RegistryRoot::ClassesRoot, &format!(r"CLSID\{clsid}\LocalServer32"))
            {
                return Some(strip_quotes(&server));
            }
        }
    }

    // Registrations without a usable ProgID -> CLSID link still carry the
    // reverse link on the class key itself.
    tracing::debug!(prog_id, "direct CLSID route failed, scanning CLSID subkeys");
    for subkey in registry.subkey_names(RegistryRoot::ClassesRoot, "CLSID") {
        let declared = registry.default_value(RegistryRoot::ClassesRoot, &format!(r"CLSID\{subkey}\ProgID"));
        if declared.as_deref() == Some(prog_id) {
            if let Some(server) = registry
                .default_value(RegistryRoot::ClassesRoot, &format!(r"CLSID\{subkey}\InprocServer32"))
            {
                return Some(strip_quotes(&server));
            }
        }
    }

    None
}

/// Quotes in a stored server path will do no good for further uses.
fn strip_quotes(value: &str) -> String {
    value.replace('"', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRegistry;

    const CLSID: &str = "{11111111-2222-3333-4444-555555555555}";

    fn registry_with_class() -> MemoryRegistry {
        let mut registry = MemoryRegistry::new();
        registry.add_key(
            RegistryRoot::LocalMachine,
            &format!(r"Software\Classes\CLSID\{CLSID}"),
        );
        registry
    }

    #[test]
    fn clsid_registered_when_key_exists() {
        let registry = registry_with_class();
        assert!(is_clsid_registered(&registry, CLSID));
        // Lookup normalizes the bare form onto the same key path.
        assert!(is_clsid_registered(
            &registry,
            CLSID.trim_matches(['{', '}'])
        ));
    }

    #[test]
    fn clsid_not_registered_when_key_absent() {
        let registry = MemoryRegistry::new();
        assert!(!is_clsid_registered(&registry, CLSID));
        assert!(!is_clsid_registered(&registry, ""));
    }

    #[test]
    fn class_registered_via_primary_identity() {
        let registry = registry_with_class();
        let descriptor = ClassDescriptor::new("Widget.Application").with_clsid(CLSID);
        assert!(is_class_registered(&registry, &descriptor).unwrap());
    }

    #[test]
    fn class_registered_via_alternate_identity() {
        let registry = registry_with_class();
        let descriptor = ClassDescriptor::new("Widget.Application").with_alt_clsid(CLSID);
        assert!(is_class_registered(&registry, &descriptor).unwrap());
    }

    #[test]
    fn class_without_identity_is_not_registered() {
        let registry = registry_with_class();
        let descriptor = ClassDescriptor::new("Widget.Application");
        assert!(!is_class_registered(&registry, &descriptor).unwrap());
    }

    #[test]
    fn co_class_redirection_is_followed() {
        let registry = registry_with_class();
        let descriptor = ClassDescriptor::new("IWidget")
            .with_co_class(ClassDescriptor::new("Widget").with_clsid(CLSID));
        assert!(is_class_registered(&registry, &descriptor).unwrap());
    }

    #[test]
    fn undetermined_co_class_is_a_configuration_error() {
        let registry = registry_with_class();
        let descriptor = ClassDescriptor::new("IWidget")
            .with_clsid(CLSID)
            .with_undetermined_co_class();
        let err = is_class_registered(&registry, &descriptor).unwrap_err();
        assert!(matches!(err, ComUtilError::Configuration(_)), "got: {err}");
    }

    #[test]
    fn progid_resolves_via_local_server_with_quotes_stripped() {
        let mut registry = MemoryRegistry::new();
        registry.set_default_value(RegistryRoot::ClassesRoot, r"Widget.Application\CLSID", CLSID);
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{CLSID}\LocalServer32"),
            r#""C:\Program Files\Widget\widget.exe" /automation"#,
        );

        assert_eq!(
            get_file_from_progid(&registry, "Widget.Application").as_deref(),
            Some(r"C:\Program Files\Widget\widget.exe /automation"),
        );
    }

    #[test]
    fn progid_falls_back_to_reverse_scan() {
        let mut registry = MemoryRegistry::new();
        // No Widget.Application\CLSID key at all; the class key carries the
        // reverse ProgID link instead.
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{CLSID}\ProgID"),
            "Widget.Application",
        );
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{CLSID}\InprocServer32"),
            r#""C:\Windows\SysWOW64\widget.dll""#,
        );

        assert_eq!(
            get_file_from_progid(&registry, "Widget.Application").as_deref(),
            Some(r"C:\Windows\SysWOW64\widget.dll"),
        );
    }

    #[test]
    fn direct_route_without_server_key_still_falls_back() {
        let mut registry = MemoryRegistry::new();
        registry.set_default_value(RegistryRoot::ClassesRoot, r"Widget.Application\CLSID", CLSID);
        // LocalServer32 missing; reverse link present on another class.
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{CLSID}\ProgID"),
            "Widget.Application",
        );
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{CLSID}\InprocServer32"),
            r"C:\widget.dll",
        );

        assert_eq!(
            get_file_from_progid(&registry, "Widget.Application").as_deref(),
            Some(r"C:\widget.dll"),
        );
    }

    #[test]
    fn unknown_progid_resolves_to_none() {
        let registry = MemoryRegistry::new();
        assert_eq!(get_file_from_progid(&registry, "No.Such.ProgID"), None);
    }

    #[test]
    fn reverse_scan_skips_non_matching_classes() {
        let mut registry = MemoryRegistry::new();
        let other = "{99999999-8888-7777-6666-555555555555}";
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{other}\ProgID"),
            "Other.Application",
        );
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{other}\InprocServer32"),
            r"C:\other.dll",
        );
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{CLSID}\ProgID"),
            "Widget.Application",
        );
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{CLSID}\InprocServer32"),
            r"C:\widget.dll",
        );

        assert_eq!(
            get_file_from_progid(&registry, "Widget.Application").as_deref(),
            Some(r"C:\widget.dll"),
        );
    }
}
