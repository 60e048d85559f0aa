//! Self-observation: letting an object that is already owned by a
//! [`SharedPtr`] hand out more [`SharedPtr`]s and [`WeakPtr`]s to itself.
//!
//! The object embeds a [`WeakThis`] slot and implements
//! [`EnableSharedFromThis`] to expose it. The slot is filled with a weak
//! back-reference when the object is put under management by
//! [`SharedPtr::new_enabled`] or [`SharedPtr::from_box_enabled`]; after that,
//! [`EnableSharedFromThis::shared_from_this`] joins the existing ownership group
//! instead of starting a new one.
//!
//! Calling `shared_from_this` on an object that was never managed that way
//! (e.g. one on the stack) reports [`ExpiredError`].
use crate::{error::ExpiredError, shared::SharedPtr, weak::WeakPtr};
use alloc::boxed::Box;
use core::{cell::OnceCell, fmt};

/// Weak back-reference slot embedded in a self-observing object.
pub struct WeakThis<T: ?Sized> {
    slot: OnceCell<WeakPtr<T>>,
}

impl<T: ?Sized> WeakThis<T> {
    /// An empty slot, filled in once the owning object becomes managed.
    pub const fn new() -> WeakThis<T> {
        WeakThis {
            slot: OnceCell::new(),
        }
    }

    /// True once the object has been put under management.
    pub fn is_attached(&self) -> bool {
        self.slot.get().is_some()
    }

    fn weak(&self) -> WeakPtr<T> {
        self.slot.get().cloned().unwrap_or_default()
    }

    fn attach(&self, weak: WeakPtr<T>) {
        // an object is only ever managed by one group
        let fresh = self.slot.set(weak).is_ok();
        debug_assert!(fresh, "object is already managed by a SharedPtr");
    }
}

impl<T: ?Sized> Default for WeakThis<T> {
    fn default() -> Self {
        WeakThis::new()
    }
}

/// A copy of an object is a different object, so it starts unmanaged.
impl<T: ?Sized> Clone for WeakThis<T> {
    fn clone(&self) -> Self {
        WeakThis::new()
    }
}

impl<T: ?Sized> fmt::Debug for WeakThis<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakThis")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Implemented by types that can produce pointers to themselves.
///
/// ```
/// use sharedptr::{EnableSharedFromThis, SharedPtr, WeakThis};
///
/// struct Session {
///     this: WeakThis<Session>,
/// }
///
/// impl EnableSharedFromThis for Session {
///     fn weak_this(&self) -> &WeakThis<Session> {
///         &self.this
///     }
/// }
///
/// let on_stack = Session { this: WeakThis::new() };
/// assert!(on_stack.shared_from_this().is_err());
///
/// let managed = SharedPtr::new_enabled(Session { this: WeakThis::new() });
/// let w = managed.weak_from_this();
/// assert_eq!(w.use_count(), 1);
/// ```
pub trait EnableSharedFromThis {
    /// The slot the back-reference is stored in.
    fn weak_this(&self) -> &WeakThis<Self>;

    /// A new owner in the group that manages `self`.
    fn shared_from_this(&self) -> Result<SharedPtr<Self>, ExpiredError> {
        SharedPtr::<Self>::try_from(&self.weak_from_this())
    }

    /// A new observer of the group that manages `self`. Empty if `self` is not
    /// managed.
    fn weak_from_this(&self) -> WeakPtr<Self> {
        self.weak_this().weak()
    }
}

impl<T: EnableSharedFromThis> SharedPtr<T> {
    /// Like [`SharedPtr::new`], and also fills in `value`'s [`WeakThis`] slot.
    pub fn new_enabled(value: T) -> SharedPtr<T> {
        let this = SharedPtr::new(value);
        enable(&this);
        this
    }
}

impl<T: ?Sized + EnableSharedFromThis> SharedPtr<T> {
    /// Like [`SharedPtr::from_box`], and also fills in `value`'s [`WeakThis`]
    /// slot.
    pub fn from_box_enabled(value: Box<T>) -> SharedPtr<T> {
        let this = SharedPtr::from_box(value);
        enable(&this);
        this
    }
}

fn enable<T: ?Sized + EnableSharedFromThis>(this: &SharedPtr<T>) {
    if let Some(value) = SharedPtr::get(this) {
        value.weak_this().attach(SharedPtr::downgrade(this));
    }
}
