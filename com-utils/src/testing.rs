//! In-memory doubles for the registry, the running object table, and the
//! base-unknown surface.
//!
//! Compiled for this crate's own tests and exported under the
//! `test-support` feature so downstream crates can exercise consumers of
//! the traits without a COM runtime.

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::clsid::Clsid;
use crate::errors::{ComUtilError, ComUtilResult};
use crate::guard::{ComIdentity, ObjectId};
use crate::registry::{RegistryRoot, RegistryView};
use crate::rot::{ObjectTable, TableCursor, TableMoniker};

// ── Registry ────────────────────────────────────────────────────────

/// Hierarchical key/value store with registry semantics (paths are
/// case-insensitive, keys may carry a default value).
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    keys: HashSet<(RegistryRoot, String)>,
    values: HashMap<(RegistryRoot, String), String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an (empty) key at `path`.
    pub fn add_key(&mut self, root: RegistryRoot, path: &str) {
        self.keys.insert((root, normalize(path)));
    }

    /// Records a key at `path` with the given default value.
    pub fn set_default_value(&mut self, root: RegistryRoot, path: &str, value: &str) {
        self.keys.insert((root, normalize(path)));
        self.values.insert((root, normalize(path)), value.to_string());
    }
}

fn normalize(path: &str) -> String {
    path.to_ascii_lowercase()
}

impl RegistryView for MemoryRegistry {
    fn key_exists(&self, root: RegistryRoot, path: &str) -> bool {
        self.keys.contains(&(root, normalize(path)))
    }

    fn default_value(&self, root: RegistryRoot, path: &str) -> Option<String> {
        self.values.get(&(root, normalize(path))).cloned()
    }

    fn subkey_names(&self, root: RegistryRoot, path: &str) -> Vec<String> {
        let prefix = format!("{}\\", normalize(path));
        let mut names = BTreeSet::new();
        for (key_root, key_path) in &self.keys {
            if *key_root == root {
                if let Some(rest) = key_path.strip_prefix(&prefix) {
                    let segment = rest.split('\\').next().unwrap_or(rest);
                    if !segment.is_empty() {
                        names.insert(segment.to_string());
                    }
                }
            }
        }
        names.into_iter().collect()
    }
}

// ── Base-unknown surface ────────────────────────────────────────────

#[derive(Debug)]
struct CountedState {
    refs: AtomicU32,
    release_calls: AtomicU32,
    defused: AtomicBool,
    sticky: bool,
    has_identity: bool,
}

/// A reference-counted object double. Clones share one count, the way COM
/// interface pointers to a single object do.
#[derive(Debug, Clone)]
pub struct CountedObject {
    state: Arc<CountedState>,
}

impl CountedObject {
    /// An object holding a single live reference.
    pub fn new() -> Self {
        Self::with_ref_count(1)
    }

    /// An object holding `refs` live references.
    pub fn with_ref_count(refs: u32) -> Self {
        Self::build(refs, false, true)
    }

    /// An object whose release never reports zero — simulates malformed
    /// reference counting in an external host.
    pub fn sticky() -> Self {
        Self::build(1, true, true)
    }

    /// An object whose base-identity query fails.
    pub fn without_identity() -> Self {
        Self::build(1, false, false)
    }

    fn build(refs: u32, sticky: bool, has_identity: bool) -> Self {
        Self {
            state: Arc::new(CountedState {
                refs: AtomicU32::new(refs),
                release_calls: AtomicU32::new(0),
                defused: AtomicBool::new(false),
                sticky,
                has_identity,
            }),
        }
    }

    pub fn ref_count(&self) -> u32 {
        self.state.refs.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> u32 {
        self.state.release_calls.load(Ordering::SeqCst)
    }

    pub fn defused(&self) -> bool {
        self.state.defused.load(Ordering::SeqCst)
    }
}

impl Default for CountedObject {
    fn default() -> Self {
        Self::new()
    }
}

impl ComIdentity for CountedObject {
    fn base_identity(&self) -> ComUtilResult<ObjectId> {
        if !self.state.has_identity {
            return Err(ComUtilError::Configuration(
                "object does not support the base COM identity".into(),
            ));
        }
        Ok(ObjectId::new(Arc::as_ptr(&self.state) as usize))
    }

    fn add_ref(&self) -> u32 {
        self.state.refs.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn release(&self) -> u32 {
        self.state.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.sticky {
            return 1;
        }
        let previous = self
            .state
            .refs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    fn defuse(self) {
        self.state.defused.store(true, Ordering::SeqCst);
    }
}

// ── Running object table ────────────────────────────────────────────

/// Pin/unpin bookkeeping shared between a table and its cursors.
#[derive(Debug, Default)]
pub struct PinLedger {
    pins: Cell<usize>,
    unpins: Cell<usize>,
}

/// The object handle a [`ScriptedTable`] resolves monikers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedObject {
    pub name: String,
}

/// A scripted moniker with fixed answers.
#[derive(Debug, Clone)]
pub struct ScriptedMoniker {
    name: String,
    clsid: String,
    system_kind: Option<i32>,
}

impl ScriptedMoniker {
    pub fn new(name: impl Into<String>, clsid: impl Into<String>, system_kind: Option<i32>) -> Self {
        Self {
            name: name.into(),
            clsid: clsid.into(),
            system_kind,
        }
    }
}

impl TableMoniker for ScriptedMoniker {
    fn display_name(&self) -> ComUtilResult<String> {
        Ok(self.name.clone())
    }

    fn class_id(&self) -> ComUtilResult<Clsid> {
        Ok(Clsid::new(&self.clsid))
    }

    fn system_kind(&self) -> Option<i32> {
        self.system_kind
    }
}

/// Cursor over a scripted moniker sequence.
#[derive(Debug)]
pub struct ScriptedCursor {
    queue: VecDeque<ScriptedMoniker>,
    ledger: Rc<PinLedger>,
}

impl TableCursor for ScriptedCursor {
    type Moniker = ScriptedMoniker;

    fn pin(&mut self) {
        self.ledger.pins.set(self.ledger.pins.get() + 1);
    }

    fn unpin(&mut self) {
        self.ledger.unpins.set(self.ledger.unpins.get() + 1);
    }

    fn next_moniker(&mut self) -> Option<ScriptedMoniker> {
        self.queue.pop_front()
    }
}

/// An in-memory running object table with scripted contents.
#[derive(Debug)]
pub struct ScriptedTable {
    monikers: Vec<ScriptedMoniker>,
    cursor_available: bool,
    failing_name: Option<String>,
    ledger: Rc<PinLedger>,
}

impl ScriptedTable {
    /// A table whose passes yield the given monikers.
    pub fn new(monikers: Vec<ScriptedMoniker>) -> Self {
        Self {
            monikers,
            cursor_available: true,
            failing_name: None,
            ledger: Rc::new(PinLedger::default()),
        }
    }

    /// A table whose runtime hands back no enumerator.
    pub fn without_cursor() -> Self {
        let mut table = Self::new(vec![]);
        table.cursor_available = false;
        table
    }

    /// Makes object resolution fail for the moniker named `name`.
    pub fn failing_resolution_for(mut self, name: impl Into<String>) -> Self {
        self.failing_name = Some(name.into());
        self
    }

    /// Number of pins taken across all passes so far.
    pub fn pin_count(&self) -> usize {
        self.ledger.pins.get()
    }

    /// Number of unpins across all passes so far.
    pub fn unpin_count(&self) -> usize {
        self.ledger.unpins.get()
    }

    /// Whether every pin has been matched by exactly one unpin.
    pub fn pins_balanced(&self) -> bool {
        self.pin_count() == self.unpin_count()
    }
}

impl ObjectTable for ScriptedTable {
    type Moniker = ScriptedMoniker;
    type Object = ScriptedObject;
    type Cursor = ScriptedCursor;

    fn open_cursor(&self) -> ComUtilResult<Option<ScriptedCursor>> {
        if !self.cursor_available {
            return Ok(None);
        }
        Ok(Some(ScriptedCursor {
            queue: self.monikers.iter().cloned().collect(),
            ledger: Rc::clone(&self.ledger),
        }))
    }

    fn resolve_object(&self, moniker: &ScriptedMoniker) -> ComUtilResult<ScriptedObject> {
        if self.failing_name.as_deref() == Some(moniker.name.as_str()) {
            return Err(ComUtilError::Enumeration(format!(
                "no object is registered under '{}'",
                moniker.name
            )));
        }
        Ok(ScriptedObject {
            name: moniker.name.clone(),
        })
    }
}
