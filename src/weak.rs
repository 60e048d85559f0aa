//! `WeakPtr<T>` observes the object of a [`SharedPtr`] group without keeping it
//! alive. It only holds the control block, so it can tell whether the object
//! still exists and promote itself back into a `SharedPtr` while it does.
//!
//! ```
//! use sharedptr::{SharedPtr, WeakPtr};
//!
//! let p = SharedPtr::new(1);
//! let w = SharedPtr::downgrade(&p);
//! assert_eq!(w.use_count(), 1);
//!
//! let q = w.lock();
//! assert_eq!(SharedPtr::use_count(&q), 2);
//!
//! drop(p);
//! drop(q);
//! assert!(w.expired());
//! assert!(SharedPtr::is_null(&w.lock()));
//! ```
use crate::{
    block::Header,
    shared::{addr, SharedPtr},
};
use core::{fmt, marker::PhantomData, mem, ptr::NonNull};

/// A non-owning pointer. See the [module docs](self).
pub struct WeakPtr<T: ?Sized> {
    pub(crate) block: Option<NonNull<Header>>,
    // Dangling once the object is gone; only ever dereferenced through a
    // successful upgrade.
    pub(crate) ptr: Option<NonNull<T>>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// A weak pointer that observes nothing. It is always expired.
    pub const fn new() -> WeakPtr<T> {
        WeakPtr {
            block: None,
            ptr: None,
        }
    }

    /// Promotes to a [`SharedPtr`], or `None` if the object is gone.
    pub fn upgrade(&self) -> Option<SharedPtr<T>> {
        let h = self.header()?;
        if !h.increment_strong_if_nonzero() {
            return None;
        }
        Some(SharedPtr {
            block: self.block,
            ptr: self.ptr,
            phantom: PhantomData,
        })
    }

    /// Promotes to a [`SharedPtr`]. Once the object is gone this returns an
    /// empty pointer rather than failing.
    pub fn lock(&self) -> SharedPtr<T> {
        self.upgrade().unwrap_or_else(SharedPtr::null)
    }

    /// Returns true if all strong pointers have been dropped (or there never
    /// were any), so `upgrade` will return `None`.
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Get the current strong count of the observed group.
    pub fn use_count(&self) -> usize {
        self.header().map_or(0, Header::strong_count)
    }

    /// Get the number of weak pointers observing the group, this one included.
    pub fn weak_count(&self) -> usize {
        self.header().map_or(0, Header::weak_count)
    }

    /// Stops observing, leaving `self` empty.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Moves the contents out, leaving `self` empty. Counts don't change.
    pub fn take(&mut self) -> WeakPtr<T> {
        mem::replace(self, WeakPtr::new())
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Return a `WeakPtr<U>` for any `U` reachable from `T`, in the same
    /// control block. See [`SharedPtr::project`].
    ///
    /// `f` can only run while the object is alive. Returns `None` if it
    /// isn't, which includes the time before [`SharedPtr::new_cyclic`]'s
    /// closure has returned.
    pub fn project<U: ?Sized, F: FnOnce(&T) -> &U>(&self, f: F) -> Option<WeakPtr<U>>
    where
        T: 'static,
    {
        let strong = self.upgrade()?;
        let ptr = NonNull::from(f(SharedPtr::get(&strong)?));
        Some(SharedPtr::downgrade(&SharedPtr::projected(strong, Some(ptr))))
    }

    /// Returns true if both point to the same address. See
    /// [`SharedPtr::ptr_eq`].
    pub fn ptr_eq<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool {
        addr(self.ptr) == addr(other.ptr)
    }

    /// Returns true if both observe the same control block.
    pub fn root_ptr_eq<U: ?Sized>(&self, other: &WeakPtr<U>) -> bool {
        self.block == other.block
    }

    fn header(&self) -> Option<&Header> {
        // Safety: we hold a weak reference, so the block is still allocated
        self.block.map(|h| unsafe { &*h.as_ptr() })
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(h) = self.header() {
            h.increment_weak();
        }
        WeakPtr {
            block: self.block,
            ptr: self.ptr,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.block == source.block && self.ptr == source.ptr {
            return;
        }
        *self = source.clone();
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block {
            // Safety: we own one weak reference
            unsafe { Header::release_weak(block) }
        }
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    fn default() -> Self {
        WeakPtr::new()
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        SharedPtr::downgrade(shared)
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(WeakPtr)")
    }
}
