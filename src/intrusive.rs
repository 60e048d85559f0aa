//! `IntrusivePtr<T>` keeps its reference count inside the pointee rather than in
//! a separate control block. There is a single count and no weak pointers.
//! The object is freed as soon as that count reaches zero.
//!
//! Because the count travels with the object, a raw pointer that is already
//! managed can be turned back into an `IntrusivePtr` and joins the existing
//! owners. This is the opposite of [`SharedPtr::from_raw`], which always starts
//! a new ownership group.
//!
//! ```
//! use sharedptr::{IntrusivePtr, RefCount, RefCounted};
//!
//! struct Texture {
//!     rc: RefCount,
//!     id: u32,
//! }
//!
//! impl RefCounted for Texture {
//!     fn ref_count(&self) -> &RefCount {
//!         &self.rc
//!     }
//! }
//!
//! let a = IntrusivePtr::new(Texture { rc: RefCount::new(), id: 3 });
//! let raw = IntrusivePtr::as_ptr(&a) as *mut Texture;
//!
//! // Safety: `raw` is owned by `a`, so the count is shared
//! let b = unsafe { IntrusivePtr::from_raw(raw) };
//! assert_eq!(IntrusivePtr::use_count(&b), 2);
//! assert_eq!(b.id, 3);
//! ```
//!
//! [`SharedPtr::from_raw`]: crate::SharedPtr::from_raw
use alloc::boxed::Box;
use core::{cell::Cell, fmt, marker::PhantomData, mem, ops::Deref, ptr::NonNull};

/// The embedded counter.
pub struct RefCount {
    count: Cell<usize>,
}

impl RefCount {
    pub const fn new() -> RefCount {
        RefCount {
            count: Cell::new(0),
        }
    }

    /// Number of `IntrusivePtr`s currently owning the object.
    pub fn get(&self) -> usize {
        self.count.get()
    }

    fn increment(&self) -> usize {
        let c = crate::block::increment(self.count.get());
        self.count.set(c);
        c
    }

    fn decrement(&self) -> usize {
        let c = self.count.get();
        debug_assert!(c > 0, "intrusive count underflow");
        self.count.set(c - 1);
        c - 1
    }
}

impl Default for RefCount {
    fn default() -> Self {
        RefCount::new()
    }
}

/// Copying an object doesn't copy its owners.
impl Clone for RefCount {
    fn clone(&self) -> Self {
        RefCount::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount").field(&self.get()).finish()
    }
}

/// Types that carry their own [`RefCount`].
pub trait RefCounted {
    fn ref_count(&self) -> &RefCount;
}

/// A pointer whose count lives inside `T`. See the [module docs](self).
pub struct IntrusivePtr<T: ?Sized + RefCounted> {
    ptr: Option<NonNull<T>>,
    phantom: PhantomData<T>,
}

impl<T: RefCounted> IntrusivePtr<T> {
    /// Moves `value` to the heap and takes the first reference to it.
    pub fn new(value: T) -> IntrusivePtr<T> {
        IntrusivePtr::from_box(Box::new(value))
    }

    /// Returns the pointer, or null.
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr
            .map_or(core::ptr::null(), |p| p.as_ptr() as *const T)
    }
}

impl<T: ?Sized + RefCounted> IntrusivePtr<T> {
    pub const fn null() -> IntrusivePtr<T> {
        IntrusivePtr {
            ptr: None,
            phantom: PhantomData,
        }
    }

    pub fn from_box(value: Box<T>) -> IntrusivePtr<T> {
        let ptr = NonNull::from(Box::leak(value));
        unsafe { ptr.as_ref() }.ref_count().increment();
        IntrusivePtr {
            ptr: Some(ptr),
            phantom: PhantomData,
        }
    }

    /// Adds a reference to the object at `ptr`. A null pointer gives an empty
    /// `IntrusivePtr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from [`Box::into_raw`], or from
    /// [`IntrusivePtr::as_ptr`]/[`IntrusivePtr::into_raw`] of a pointer whose
    /// reference is still counted.
    pub unsafe fn from_raw(ptr: *mut T) -> IntrusivePtr<T> {
        let ptr = NonNull::new(ptr);
        if let Some(p) = ptr {
            unsafe { p.as_ref() }.ref_count().increment();
        }
        IntrusivePtr {
            ptr,
            phantom: PhantomData,
        }
    }

    /// Gives up the handle without releasing its reference.
    pub fn into_raw(this: Self) -> *mut T
    where
        T: Sized,
    {
        let p = IntrusivePtr::as_ptr(&this) as *mut T;
        mem::forget(this);
        p
    }

    pub fn get(this: &Self) -> Option<&T> {
        // Safety: our reference keeps the object alive
        this.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    pub fn is_null(this: &Self) -> bool {
        this.ptr.is_none()
    }

    /// The embedded count, or zero if empty.
    pub fn use_count(this: &Self) -> usize {
        IntrusivePtr::get(this).map_or(0, |v| v.ref_count().get())
    }

    pub fn reset(this: &mut Self) {
        drop(mem::replace(this, IntrusivePtr::null()));
    }

    /// Releases the current reference and takes the first one to `value`.
    pub fn reset_box(this: &mut Self, value: Box<T>) {
        IntrusivePtr::reset(this);
        *this = IntrusivePtr::from_box(value);
    }

    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        crate::shared::addr(this.ptr) == crate::shared::addr(other.ptr)
    }
}

impl<T: ?Sized + RefCounted> Clone for IntrusivePtr<T> {
    fn clone(&self) -> Self {
        if let Some(v) = IntrusivePtr::get(self) {
            v.ref_count().increment();
        }
        IntrusivePtr {
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if IntrusivePtr::ptr_eq(self, source) {
            return;
        }
        *self = source.clone();
    }
}

impl<T: ?Sized + RefCounted> Drop for IntrusivePtr<T> {
    fn drop(&mut self) {
        let Some(p) = self.ptr else {
            return;
        };
        if unsafe { p.as_ref() }.ref_count().decrement() != 0 {
            return;
        }
        crate::trace!("freeing intrusively counted object {:p}", p);
        // Safety: the count reached zero, so ours was the last reference to a
        // box-allocated object
        drop(unsafe { Box::from_raw(p.as_ptr()) });
    }
}

impl<T: ?Sized + RefCounted> Deref for IntrusivePtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match IntrusivePtr::get(self) {
            Some(v) => v,
            None => panic!("dereferenced an empty IntrusivePtr"),
        }
    }
}

impl<T: ?Sized + RefCounted> Default for IntrusivePtr<T> {
    fn default() -> Self {
        IntrusivePtr::null()
    }
}

impl<T: ?Sized + RefCounted> PartialEq for IntrusivePtr<T> {
    fn eq(&self, other: &Self) -> bool {
        IntrusivePtr::ptr_eq(self, other)
    }
}

impl<T: ?Sized + RefCounted> Eq for IntrusivePtr<T> {}

impl<T: ?Sized + RefCounted + fmt::Debug> fmt::Debug for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match IntrusivePtr::get(self) {
            Some(v) => fmt::Debug::fmt(v, f),
            None => f.write_str("(null)"),
        }
    }
}
