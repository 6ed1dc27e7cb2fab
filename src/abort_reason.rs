//! Opaque abort payload.
//!
//! `abort_args` in the data model are "opaque values" — independent of a
//! node's success (`T`) or error (`E`) type. That independence is load
//! bearing in this Rust port: `abort_branch()`/`abort_all()` resolve through
//! the type-erased `root`/`branch` back-pointers (see `node.rs`) to an
//! ancestor whose `T`/`E` are statically unrelated to the node the call was
//! made on, so the payload carried through that path cannot be `T`. A single
//! opaque reason type keeps `abort()`, `abort_branch()`, and `abort_all()`
//! uniform.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// The payload passed to `abort()` and observed by `on_abort` listeners.
///
/// Construct with [`AbortReason::new`] from any `'static` value, or use
/// [`AbortReason::empty`] for the no-payload case (`abort_branch`/`abort_all`
/// use this since the distilled spec gives them no argument list).
#[derive(Clone)]
pub struct AbortReason(Rc<dyn Any>);

impl AbortReason {
    pub fn new<V: Any>(value: V) -> Self {
        AbortReason(Rc::new(value))
    }

    pub fn empty() -> Self {
        AbortReason(Rc::new(()))
    }

    /// Borrow the payload as a concrete type, if it was constructed as one.
    pub fn downcast_ref<V: Any>(&self) -> Option<&V> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AbortReason").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_typed_payload() {
        let reason = AbortReason::new("shutdown".to_string());
        assert_eq!(reason.downcast_ref::<String>().unwrap(), "shutdown");
        assert!(reason.downcast_ref::<i32>().is_none());
    }

    #[test]
    fn empty_has_no_meaningful_payload() {
        let reason = AbortReason::empty();
        assert!(reason.downcast_ref::<String>().is_none());
        assert!(reason.downcast_ref::<()>().is_some());
    }

    #[test]
    fn clone_shares_payload() {
        let reason = AbortReason::new(42i32);
        let cloned = reason.clone();
        assert_eq!(cloned.downcast_ref::<i32>(), Some(&42));
    }
}
