use std::fmt;

/// A COM class identifier in its canonical brace-delimited textual form.
///
/// Registry key paths under `CLSID` always use the braced form, while
/// identity metadata frequently stores the bare hex form. Construction
/// normalizes the missing braces so every lookup path is built from the
/// same spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clsid(String);

impl Clsid {
    /// Wraps `raw` in braces where they are missing. Idempotent: an
    /// already-braced identifier is returned unchanged.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        let mut text = String::with_capacity(raw.len() + 2);
        if !raw.starts_with('{') {
            text.push('{');
        }
        text.push_str(raw);
        if !raw.ends_with('}') {
            text.push('}');
        }
        Self(text)
    }

    /// The brace-delimited textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Clsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Clsid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = "00024500-0000-0000-C000-000000000046";
    const BRACED: &str = "{00024500-0000-0000-C000-000000000046}";

    #[test]
    fn bare_identifier_gains_exactly_one_brace_pair() {
        assert_eq!(Clsid::new(BARE).as_str(), BRACED);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = Clsid::new(BARE);
        let twice = Clsid::new(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn half_braced_forms_are_completed() {
        assert_eq!(Clsid::new(format!("{{{BARE}")).as_str(), BRACED);
        assert_eq!(Clsid::new(format!("{BARE}}}")).as_str(), BRACED);
    }

    #[test]
    fn display_matches_as_str() {
        let clsid = Clsid::new(BARE);
        assert_eq!(clsid.to_string(), clsid.as_str());
    }
}
