//! Enumeration of the COM Running Object Table.
//!
//! A pass over the table is a strict Acquire → Pin → Iterate → Release
//! cycle. The entry sequence is produced lazily — each entry is computed
//! when the consumer asks for the next one — and is not restartable: a new
//! pass sees the table's *current* state, which other processes mutate
//! concurrently. The pinned cursor reference is released exactly once, on
//! every exit path.

use std::cell::OnceCell;
use std::fmt;

use crate::clsid::Clsid;
use crate::errors::{ComUtilError, ComUtilResult};
use crate::registry::{RegistryRoot, RegistryView};

/// Category of a moniker registered in the table.
///
/// Mapped from the numeric subtype reported by the system-moniker query;
/// a failed or negative query maps to [`MonikerKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonikerKind {
    Custom,
    GenericComposite,
    File,
    Anti,
    Item,
    Pointer,
    Class,
    ObjRef,
    Session,
    Elevation,
    Unknown,
}

impl MonikerKind {
    /// Maps the reported numeric subtype onto a category.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Custom,
            1 => Self::GenericComposite,
            2 => Self::File,
            3 => Self::Anti,
            4 => Self::Item,
            5 => Self::Pointer,
            6 => Self::Class,
            7 => Self::ObjRef,
            8 => Self::Session,
            9 => Self::Elevation,
            _ => Self::Unknown,
        }
    }

    /// Category for a system-moniker query result; `None` (query failed or
    /// not a system moniker) is [`MonikerKind::Unknown`].
    pub fn from_system(kind: Option<i32>) -> Self {
        kind.map_or(Self::Unknown, Self::from_raw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Custom => "Custom",
            Self::GenericComposite => "GenericComposite",
            Self::File => "File",
            Self::Anti => "Anti",
            Self::Item => "Item",
            Self::Pointer => "Pointer",
            Self::Class => "Class",
            Self::ObjRef => "ObjRef",
            Self::Session => "Session",
            Self::Elevation => "Elevation",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MonikerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One moniker handed out by a table cursor.
pub trait TableMoniker {
    /// Display name resolved through the pass's binding context.
    fn display_name(&self) -> ComUtilResult<String>;

    /// The moniker's declared class identifier.
    fn class_id(&self) -> ComUtilResult<Clsid>;

    /// Numeric system-moniker subtype, `None` when the moniker is not a
    /// system moniker or the query itself fails.
    fn system_kind(&self) -> Option<i32>;
}

/// A single-pass cursor over the table.
pub trait TableCursor {
    type Moniker;

    /// Takes a defensive extra reference on the cursor for the duration of
    /// the pass.
    fn pin(&mut self);

    /// Releases the pinned reference. Called exactly once per pass.
    fn unpin(&mut self);

    /// The next single moniker; `None` when the cursor is exhausted or can
    /// no longer advance.
    fn next_moniker(&mut self) -> Option<Self::Moniker>;
}

/// The COM runtime surface for the running object table.
pub trait ObjectTable {
    type Moniker: TableMoniker;
    type Object;
    type Cursor: TableCursor<Moniker = Self::Moniker>;

    /// A fresh cursor over the table's current registrations, or `None`
    /// when the runtime hands back no enumerator.
    fn open_cursor(&self) -> ComUtilResult<Option<Self::Cursor>>;

    /// The live object currently registered under `moniker`. A registered
    /// moniker that fails to resolve indicates table corruption, not a
    /// per-entry condition.
    fn resolve_object(&self, moniker: &Self::Moniker) -> ComUtilResult<Self::Object>;
}

/// One live registration, snapshotted at the moment it was yielded.
///
/// Entries hold a live reference to the registered object via `O`; no
/// guarantee of continued table registration survives past the yield.
#[derive(Debug)]
pub struct RotEntry<O> {
    object: O,
    class_id: Clsid,
    kind: MonikerKind,
    raw_name: String,
    resolved_name: OnceCell<String>,
}

impl<O> RotEntry<O> {
    pub(crate) fn new(object: O, raw_name: String, class_id: Clsid, kind: MonikerKind) -> Self {
        Self {
            object,
            class_id,
            kind,
            raw_name,
            resolved_name: OnceCell::new(),
        }
    }

    /// The registered object's handle.
    pub fn object(&self) -> &O {
        &self.object
    }

    /// Consumes the entry, keeping only the object handle.
    pub fn into_object(self) -> O {
        self.object
    }

    /// The moniker's declared class identifier.
    pub fn class_id(&self) -> &Clsid {
        &self.class_id
    }

    /// The moniker's category.
    pub fn kind(&self) -> MonikerKind {
        self.kind
    }

    /// The display name exactly as the moniker reported it.
    pub fn raw_display_name(&self) -> &str {
        &self.raw_name
    }

    /// A human-friendly display name.
    ///
    /// Item monikers frequently carry a CLSID as their display name
    /// (`!{...}`); those are translated through the classes-root registry,
    /// keeping the marker-stripped string when the class key is absent.
    /// Resolution happens at most once — the first result is cached and
    /// returned unchanged thereafter, even if the registry changes.
    pub fn display_name<R: RegistryView>(&self, registry: &R) -> &str {
        self.resolved_name
            .get_or_init(|| resolve_display_name(registry, self.kind, &self.raw_name))
    }
}

fn resolve_display_name<R: RegistryView>(registry: &R, kind: MonikerKind, raw: &str) -> String {
    if kind == MonikerKind::Item {
        if let Some(stripped) = raw.strip_prefix('!') {
            if stripped.starts_with('{') {
                return registry
                    .default_value(RegistryRoot::ClassesRoot, &format!(r"CLSID\{stripped}"))
                    .unwrap_or_else(|| stripped.to_string());
            }
        }
    }
    raw.to_string()
}

/// Entry point for enumeration passes over a table.
pub struct RunningObjects<T: ObjectTable> {
    table: T,
}

impl<T: ObjectTable> RunningObjects<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Starts a fresh pass: acquires and pins a cursor, returning the lazy
    /// entry sequence.
    ///
    /// # Errors
    ///
    /// [`ComUtilError::Enumeration`] when the table hands back no cursor;
    /// the condition may be transient and a later pass may succeed.
    pub fn entries(&self) -> ComUtilResult<Entries<'_, T>> {
        let Some(mut cursor) = self.table.open_cursor()? else {
            return Err(ComUtilError::Enumeration(
                "could not get the running object table enumerator".into(),
            ));
        };
        cursor.pin();
        tracing::trace!("enumeration pass started");
        Ok(Entries {
            table: &self.table,
            cursor,
            finished: false,
        })
    }
}

/// Lazy entry sequence for one enumeration pass.
///
/// The first mid-pass failure is yielded as an error and ends the pass.
/// Dropping the sequence — exhausted, abandoned, or errored — unpins the
/// cursor exactly once.
pub struct Entries<'t, T: ObjectTable> {
    table: &'t T,
    cursor: T::Cursor,
    finished: bool,
}

impl<T: ObjectTable> fmt::Debug for Entries<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entries")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<T: ObjectTable> Iterator for Entries<'_, T> {
    type Item = ComUtilResult<RotEntry<T::Object>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let Some(moniker) = self.cursor.next_moniker() else {
            self.finished = true;
            return None;
        };

        let result = self.build_entry(&moniker);
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

impl<T: ObjectTable> Entries<'_, T> {
    fn build_entry(&self, moniker: &T::Moniker) -> ComUtilResult<RotEntry<T::Object>> {
        let object = self.table.resolve_object(moniker)?;
        let raw_name = moniker.display_name()?;
        let class_id = moniker.class_id()?;
        let kind = MonikerKind::from_system(moniker.system_kind());
        Ok(RotEntry::new(object, raw_name, class_id, kind))
    }
}

impl<T: ObjectTable> Drop for Entries<'_, T> {
    fn drop(&mut self) {
        self.cursor.unpin();
        tracing::trace!("enumeration pass released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MockRegistryView;
    use crate::testing::{MemoryRegistry, ScriptedMoniker, ScriptedTable};

    const NULL_CLSID: &str = "{00000000-0000-0000-0000-000000000000}";

    #[test]
    fn kind_mapping_covers_the_category_range() {
        assert_eq!(MonikerKind::from_raw(0), MonikerKind::Custom);
        assert_eq!(MonikerKind::from_raw(4), MonikerKind::Item);
        assert_eq!(MonikerKind::from_raw(9), MonikerKind::Elevation);
        assert_eq!(MonikerKind::from_raw(10), MonikerKind::Unknown);
        assert_eq!(MonikerKind::from_raw(-1), MonikerKind::Unknown);
        assert_eq!(MonikerKind::from_system(None), MonikerKind::Unknown);
    }

    #[test]
    fn empty_table_yields_an_empty_sequence() {
        let table = ScriptedTable::new(vec![]);
        let objects = RunningObjects::new(table);

        let entries: Vec<_> = objects.entries().unwrap().collect();
        assert!(entries.is_empty());
        assert!(objects.table().pins_balanced());
    }

    #[test]
    fn entries_carry_name_class_and_kind() {
        let table = ScriptedTable::new(vec![
            ScriptedMoniker::new("!WidgetDocument", NULL_CLSID, Some(4)),
            ScriptedMoniker::new(r"C:\data\report.wdg", NULL_CLSID, Some(2)),
            ScriptedMoniker::new("custom", NULL_CLSID, None),
        ]);
        let objects = RunningObjects::new(table);

        let entries: Vec<_> = objects
            .entries()
            .unwrap()
            .collect::<ComUtilResult<_>>()
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].raw_display_name(), "!WidgetDocument");
        assert_eq!(entries[0].kind(), MonikerKind::Item);
        assert_eq!(entries[0].class_id().as_str(), NULL_CLSID);
        assert_eq!(entries[1].kind(), MonikerKind::File);
        assert_eq!(entries[2].kind(), MonikerKind::Unknown);
        assert_eq!(entries[0].object().name, "!WidgetDocument");
        assert!(objects.table().pins_balanced());
    }

    #[test]
    fn missing_cursor_is_an_enumeration_error_without_dangling_pins() {
        let table = ScriptedTable::without_cursor();
        let objects = RunningObjects::new(table);

        let err = objects.entries().unwrap_err();
        assert!(matches!(err, ComUtilError::Enumeration(_)), "got: {err}");
        assert_eq!(objects.table().pin_count(), 0);
        assert!(objects.table().pins_balanced());
    }

    #[test]
    fn resolution_failure_ends_the_pass_and_unpins() {
        let table = ScriptedTable::new(vec![
            ScriptedMoniker::new("first", NULL_CLSID, Some(4)),
            ScriptedMoniker::new("broken", NULL_CLSID, Some(4)),
            ScriptedMoniker::new("never-reached", NULL_CLSID, Some(4)),
        ])
        .failing_resolution_for("broken");
        let objects = RunningObjects::new(table);

        {
            let mut entries = objects.entries().unwrap();
            assert!(entries.next().unwrap().is_ok());
            assert!(entries.next().unwrap().is_err());
            // Pass is over; nothing further is produced.
            assert!(entries.next().is_none());
        }

        assert_eq!(objects.table().pin_count(), 1);
        assert!(objects.table().pins_balanced());
    }

    #[test]
    fn abandoning_a_pass_midway_still_unpins() {
        let table = ScriptedTable::new(vec![
            ScriptedMoniker::new("first", NULL_CLSID, Some(4)),
            ScriptedMoniker::new("second", NULL_CLSID, Some(4)),
        ]);
        let objects = RunningObjects::new(table);

        {
            let mut entries = objects.entries().unwrap();
            let _ = entries.next();
            // Dropped with one entry unconsumed.
        }

        assert!(objects.table().pins_balanced());
    }

    #[test]
    fn passes_are_independent() {
        let table = ScriptedTable::new(vec![ScriptedMoniker::new("one", NULL_CLSID, Some(4))]);
        let objects = RunningObjects::new(table);

        assert_eq!(objects.entries().unwrap().count(), 1);
        assert_eq!(objects.entries().unwrap().count(), 1);
        assert_eq!(objects.table().pin_count(), 2);
        assert!(objects.table().pins_balanced());
    }

    #[test]
    fn item_clsid_name_resolves_through_the_registry() {
        let mut registry = MemoryRegistry::new();
        registry.set_default_value(
            RegistryRoot::ClassesRoot,
            &format!(r"CLSID\{NULL_CLSID}"),
            "Widget Document",
        );

        let entry = RotEntry::new(
            (),
            format!("!{NULL_CLSID}"),
            Clsid::new(NULL_CLSID),
            MonikerKind::Item,
        );
        assert_eq!(entry.display_name(&registry), "Widget Document");
    }

    #[test]
    fn item_name_falls_back_to_the_stripped_string() {
        let registry = MemoryRegistry::new();
        let entry = RotEntry::new(
            (),
            format!("!{NULL_CLSID}"),
            Clsid::new(NULL_CLSID),
            MonikerKind::Item,
        );
        assert_eq!(entry.display_name(&registry), NULL_CLSID);
    }

    #[test]
    fn non_marker_item_names_pass_through() {
        let registry = MemoryRegistry::new();
        let entry = RotEntry::new(
            (),
            "!WidgetDocument".to_string(),
            Clsid::new(NULL_CLSID),
            MonikerKind::Item,
        );
        assert_eq!(entry.display_name(&registry), "!WidgetDocument");
    }

    #[test]
    fn non_item_names_are_never_rewritten() {
        let registry = MemoryRegistry::new();
        let entry = RotEntry::new(
            (),
            format!("!{NULL_CLSID}"),
            Clsid::new(NULL_CLSID),
            MonikerKind::File,
        );
        assert_eq!(entry.display_name(&registry), format!("!{NULL_CLSID}"));
    }

    #[test]
    fn display_name_is_resolved_at_most_once() {
        let mut registry = MockRegistryView::new();
        registry
            .expect_default_value()
            .withf(|root, path| {
                *root == RegistryRoot::ClassesRoot && path == format!(r"CLSID\{NULL_CLSID}")
            })
            .times(1)
            .return_const(Some("Widget Document".to_string()));

        let entry = RotEntry::new(
            (),
            format!("!{NULL_CLSID}"),
            Clsid::new(NULL_CLSID),
            MonikerKind::Item,
        );

        assert_eq!(entry.display_name(&registry), "Widget Document");
        // Second read serves the cache; the mock would panic on a re-query.
        assert_eq!(entry.display_name(&registry), "Widget Document");
    }
}
