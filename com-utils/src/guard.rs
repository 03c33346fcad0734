//! Manual reference-count workaround for misbehaving COM hosts.
//!
//! Certain external COM hosts drop their own last reference and terminate
//! their process as soon as a client releases the object it handed out.
//! Holding one artificial extra reference keeps the host's copy alive from
//! its perspective; [`RefCountGuard`] tracks which objects carry that extra
//! reference and offers the balancing teardown.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::errors::ComUtilResult;

/// Canonical base-unknown identity of a COM object.
///
/// COM guarantees that querying any interface of an object for its base
/// unknown interface yields the same pointer; that pointer value is the
/// object's identity for set membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Wraps a canonical base-unknown pointer value.
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }
}

/// The base-unknown surface of an object handle, as the guard needs it.
///
/// Implemented for `windows::core::IUnknown` by the backend; tests provide
/// counting doubles.
pub trait ComIdentity {
    /// The canonical base identity. Fails with
    /// [`crate::ComUtilError::Configuration`] when the handle does not
    /// genuinely support the base COM identity query.
    fn base_identity(&self) -> ComUtilResult<ObjectId>;

    /// Issues one reference increment, returning the reported count.
    fn add_ref(&self) -> u32;

    /// Issues one reference release, returning the reported count.
    fn release(&self) -> u32;

    /// Consumes the handle without touching the underlying reference.
    ///
    /// After a release loop has driven the count to zero the wrapper must
    /// not attempt any further cleanup of its own.
    fn defuse(self);
}

/// Tracks the objects whose reference count this process has raised.
///
/// One instance per process is the intended shape — inject it wherever the
/// workaround is needed. All membership bookkeeping happens under a single
/// lock, so concurrent callers cannot race the check-then-increment.
#[derive(Debug)]
pub struct RefCountGuard {
    held: Mutex<HashSet<ObjectId>>,
    max_release_attempts: u32,
}

impl RefCountGuard {
    /// Ceiling on release attempts in [`Self::decrease`]. Malformed
    /// reference counting elsewhere could otherwise spin the loop forever;
    /// the value is a defensive bound, not derived from anything.
    pub const DEFAULT_MAX_RELEASE_ATTEMPTS: u32 = 100;

    /// A guard with the default release ceiling.
    pub fn new() -> Self {
        Self::with_max_release_attempts(Self::DEFAULT_MAX_RELEASE_ATTEMPTS)
    }

    /// A guard with a custom release ceiling.
    pub fn with_max_release_attempts(max_release_attempts: u32) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            max_release_attempts,
        }
    }

    /// Adds one artificial reference to `obj`, at most once per object.
    ///
    /// A second call for an object already in the set is a no-op, so the
    /// underlying count only ever rises by one regardless of how many
    /// times a caller re-registers the same object.
    pub fn increase<T: ComIdentity>(&self, obj: &T) -> ComUtilResult<()> {
        let id = obj.base_identity()?;
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(id) {
            tracing::trace!(?id, "reference already raised, skipping");
            return Ok(());
        }
        let count = obj.add_ref();
        tracing::debug!(?id, count, "raised reference count");
        Ok(())
    }

    /// Releases `obj` until its reported count reaches zero, then forgets
    /// the handle.
    ///
    /// Membership in the set is *not* required: objects picked up through
    /// table enumeration carry live references from elsewhere and still
    /// need releasing under the general COM rules. The loop stops after
    /// the configured ceiling even if the reported count never reaches
    /// zero. The handle is defused afterwards — its underlying reference
    /// is gone and must not be released again on drop — and the object is
    /// removed from the set regardless of prior membership.
    pub fn decrease<T: ComIdentity>(&self, obj: T) -> ComUtilResult<()> {
        let id = obj.base_identity()?;

        let mut attempts = 0;
        while attempts < self.max_release_attempts {
            attempts += 1;
            if obj.release() == 0 {
                break;
            }
        }
        tracing::debug!(?id, attempts, "released object");

        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        obj.defuse();
        Ok(())
    }

    /// Whether `id` currently carries an artificial reference.
    pub fn holds(&self, id: ObjectId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Number of objects currently carrying an artificial reference.
    pub fn held_count(&self) -> usize {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for RefCountGuard {
    fn default() -> Self {
        Self::new()
    }
}
