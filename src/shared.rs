//! `SharedPtr<T>` is a shared-ownership pointer in the style of C++'s
//! `shared_ptr`: a typed access pointer plus a reference to the control block
//! of the ownership group it belongs to.
//!
//! Unlike `std::rc::Rc<T>`, the access pointer and the owned object are
//! decoupled. A `SharedPtr<U>` can point at a field of the `T` that its block
//! owns (see [`SharedPtr::project`]), and a `SharedPtr` can be empty.
//!
//! Most operations are associated functions rather than methods, so they can't
//! shadow methods of `T` reached through `Deref`.
use crate::{
    block::{self, BlockKind, Header},
    error::ExpiredError,
    weak::WeakPtr,
};
use alloc::boxed::Box;
use core::{
    fmt, hash,
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::{self, NonNull},
};

/// A shared-ownership pointer. See the [module docs](self).
pub struct SharedPtr<T: ?Sized> {
    pub(crate) block: Option<NonNull<Header>>,
    pub(crate) ptr: Option<NonNull<T>>,
    pub(crate) phantom: PhantomData<T>,
}

impl<T> SharedPtr<T> {
    /// Constructs `value` inside a new control block.
    ///
    /// Block and value share a single heap allocation.
    ///
    /// This doesn't fill in the [`WeakThis`] slot of an
    /// [`EnableSharedFromThis`] type; use [`SharedPtr::new_enabled`] for that.
    ///
    /// [`WeakThis`]: crate::WeakThis
    /// [`EnableSharedFromThis`]: crate::EnableSharedFromThis
    ///
    /// ```
    /// use sharedptr::{BlockKind, SharedPtr};
    /// let p = SharedPtr::new(5);
    /// assert_eq!(*p, 5);
    /// assert_eq!(SharedPtr::block_kind(&p), Some(BlockKind::Emplaced));
    /// ```
    pub fn new(value: T) -> SharedPtr<T> {
        let (block, ptr) = block::emplace(value);
        SharedPtr {
            block: Some(block),
            ptr: Some(ptr),
            phantom: PhantomData,
        }
    }

    /// Constructs a new `SharedPtr<T>` while giving you a `WeakPtr<T>` to the
    /// allocation, to allow you to construct a `T` which holds a weak pointer
    /// to itself.
    ///
    /// The weak pointer can't be upgraded until `data_fn` returns.
    ///
    /// ```
    /// use sharedptr::{SharedPtr, WeakPtr};
    /// struct Cyclic(WeakPtr<Cyclic>);
    /// let x = SharedPtr::new_cyclic(|w| {
    ///     assert!(w.upgrade().is_none());
    ///     Cyclic(w.clone())
    /// });
    /// assert!(SharedPtr::ptr_eq(&x, &x.0.lock()));
    /// ```
    pub fn new_cyclic<F>(data_fn: F) -> SharedPtr<T>
    where
        F: FnOnce(&WeakPtr<T>) -> T,
    {
        // Start with strong=0 and a single weak reference, so that if
        // `data_fn` panics the block is freed without dropping the
        // uninitialized value.
        let (block, ptr) = block::emplace_uninit::<T>();
        let weak = WeakPtr {
            block: Some(block),
            ptr: Some(ptr),
        };

        // Safety: the storage is uninitialized, and nothing can read it while
        // the strong count is zero
        unsafe { ptr.as_ptr().write(data_fn(&weak)) };

        let h = unsafe { block.as_ref() };
        debug_assert_eq!(
            h.strong_count(),
            0,
            "No prior strong references should exist"
        );
        h.increment_strong();

        // Strong references collectively own a shared weak reference, so don't
        // run the destructor for our old weak reference.
        mem::forget(weak);
        SharedPtr {
            block: Some(block),
            ptr: Some(ptr),
            phantom: PhantomData,
        }
    }

    /// Returns the access pointer, or null if there is none.
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.map_or(ptr::null(), |p| p.as_ptr() as *const T)
    }
}

impl<T: ?Sized> SharedPtr<T> {
    /// An empty pointer: no object, no control block, no allocation.
    pub const fn null() -> SharedPtr<T> {
        SharedPtr {
            block: None,
            ptr: None,
            phantom: PhantomData,
        }
    }

    /// Takes ownership of a boxed value. The box is reused as-is and a
    /// separate, small control block is allocated to point at it.
    ///
    /// Like [`new`](SharedPtr::new), this leaves a [`WeakThis`] slot empty;
    /// see [`SharedPtr::from_box_enabled`].
    ///
    /// [`WeakThis`]: crate::WeakThis
    ///
    /// ```
    /// use sharedptr::{BlockKind, SharedPtr};
    /// let p: SharedPtr<[u8]> = SharedPtr::from_box(vec![1, 2, 3].into());
    /// assert_eq!(&*p, &[1, 2, 3]);
    /// assert_eq!(SharedPtr::block_kind(&p), Some(BlockKind::Pointing));
    /// ```
    pub fn from_box(value: Box<T>) -> SharedPtr<T> {
        let ptr = NonNull::from(Box::leak(value));
        // Safety: `ptr` was just leaked from a box we owned
        let block = unsafe { block::point(ptr) };
        SharedPtr {
            block: Some(block),
            ptr: Some(ptr),
            phantom: PhantomData,
        }
    }

    /// Takes ownership of a raw pointer. A null pointer gives an empty
    /// `SharedPtr` and allocates nothing.
    ///
    /// Every call allocates a new control block, even for a pointer that is
    /// already managed: the results are unrelated ownership groups.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from [`Box::into_raw`], and nothing else may
    /// own it, including another `SharedPtr` made from the same address.
    pub unsafe fn from_raw(ptr: *mut T) -> SharedPtr<T> {
        match NonNull::new(ptr) {
            Some(ptr) => SharedPtr {
                block: Some(unsafe { block::point(ptr) }),
                ptr: Some(ptr),
                phantom: PhantomData,
            },
            None => SharedPtr::null(),
        }
    }

    /// Return a `SharedPtr<U>` for any `U` reachable from `T`, e.g. a field, an
    /// element of a slice, or a `&dyn` view of the object. The result shares
    /// the control block of `this`, so it keeps the whole object alive.
    ///
    /// An empty `this` gives an empty result without calling `f`.
    pub fn project<U: ?Sized, F: FnOnce(&T) -> &U>(this: Self, f: F) -> SharedPtr<U>
    where
        T: 'static,
    {
        let ptr = SharedPtr::get(&this).map(|v| NonNull::from(f(v)));
        Self::projected(this, ptr)
    }

    /// Fallible version of [`project`][SharedPtr::project]. If `f` returns
    /// `None` the reference held by `this` is released.
    pub fn try_project<U: ?Sized, F: FnOnce(&T) -> Option<&U>>(
        this: Self,
        f: F,
    ) -> Option<SharedPtr<U>>
    where
        T: 'static,
    {
        let v = SharedPtr::get(&this)?;
        let ptr = NonNull::from(f(v)?);
        Some(Self::projected(this, Some(ptr)))
    }

    pub(crate) fn projected<U: ?Sized>(this: Self, ptr: Option<NonNull<U>>) -> SharedPtr<U> {
        let u = SharedPtr {
            block: this.block,
            ptr,
            phantom: PhantomData,
        };
        // Forget `this` so it doesn't adjust the refcount, since we moved it
        // into `u`.
        mem::forget(this);
        u
    }

    /// Aliasing constructor: a new `SharedPtr<T>` that shares ownership with
    /// `owner` but points at whatever `f` returns. Like [`project`], but
    /// `owner` is left in place and the strong count goes up by one.
    ///
    /// [`project`]: SharedPtr::project
    pub fn aliasing<O, F>(owner: &SharedPtr<O>, f: F) -> SharedPtr<T>
    where
        O: ?Sized + 'static,
        F: FnOnce(&O) -> &T,
    {
        SharedPtr::project(owner.clone(), f)
    }

    /// Aliasing constructor taking the access pointer directly. The result
    /// shares `owner`'s control block (if any) and points at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or stay valid for as long as the object managed by
    /// `owner`'s block is alive, or forever if `owner` is empty.
    pub unsafe fn aliasing_raw<O: ?Sized>(owner: &SharedPtr<O>, ptr: *const T) -> SharedPtr<T> {
        if let Some(h) = owner.header() {
            h.increment_strong();
        }
        SharedPtr {
            block: owner.block,
            ptr: NonNull::new(ptr as *mut T),
            phantom: PhantomData,
        }
    }

    /// Convert `SharedPtr<T>` to `SharedPtr<U>`, as long as `&T` converts to
    /// `&U`. This is how a pointer to a derived type becomes a pointer to its
    /// base, while staying in the same ownership group.
    ///
    /// This should be spelled `from()`, but that conflicts with the blanket
    /// impl converting T->T.
    pub fn cast<U: ?Sized>(this: Self) -> SharedPtr<U>
    where
        T: 'static,
        for<'u> &'u U: From<&'u T>,
    {
        SharedPtr::project(this, |x| From::from(x))
    }

    /// Return a [`WeakPtr`] observing the same object.
    pub fn downgrade(this: &Self) -> WeakPtr<T> {
        if let Some(h) = this.header() {
            h.increment_weak();
        }
        WeakPtr {
            block: this.block,
            ptr: this.ptr,
        }
    }

    /// Releases this pointer's ownership, leaving it empty. If it was the last
    /// owner the object is destroyed now.
    pub fn reset(this: &mut Self) {
        drop(SharedPtr::take(this));
    }

    /// Releases current ownership, then takes ownership of `value` as
    /// [`from_box`][SharedPtr::from_box] would.
    pub fn reset_box(this: &mut Self, value: Box<T>) {
        SharedPtr::reset(this);
        *this = SharedPtr::from_box(value);
    }

    /// Releases current ownership, then takes ownership of `ptr` as
    /// [`from_raw`][SharedPtr::from_raw] would.
    ///
    /// # Safety
    ///
    /// Same as [`from_raw`][SharedPtr::from_raw].
    pub unsafe fn reset_raw(this: &mut Self, ptr: *mut T) {
        SharedPtr::reset(this);
        *this = unsafe { SharedPtr::from_raw(ptr) };
    }

    /// Moves the contents out, leaving `this` empty. Counts don't change.
    pub fn take(this: &mut Self) -> SharedPtr<T> {
        mem::replace(this, SharedPtr::null())
    }

    /// Exchanges access pointers and blocks. Counts don't change.
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    /// The object pointed at, if any.
    pub fn get(this: &Self) -> Option<&T> {
        // Safety: the block keeps the pointee alive while we hold a strong
        // reference (or the aliasing_raw caller promised so)
        this.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    /// True if there is no access pointer.
    pub fn is_null(this: &Self) -> bool {
        this.ptr.is_none()
    }

    /// Get the current strong count of this pointer. Zero if it has no block.
    pub fn use_count(this: &Self) -> usize {
        this.header().map_or(0, Header::strong_count)
    }

    /// Get the number of `WeakPtr`s observing this pointer's block.
    pub fn weak_count(this: &Self) -> usize {
        this.header().map_or(0, Header::weak_count)
    }

    /// Which kind of control block owns the object, or `None` if empty.
    pub fn block_kind(this: &Self) -> Option<BlockKind> {
        this.header().map(Header::kind)
    }

    /// Returns true if two pointers point to the same address. This is
    /// not the same as sharing a control block: both might point to
    /// different subobjects of the same root, or to the same static object
    /// from unrelated groups.
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &SharedPtr<U>) -> bool {
        addr(this.ptr) == addr(other.ptr)
    }

    /// Returns true if two pointers share the same control block, i.e. the
    /// same reference counts. They may point to different subobjects.
    pub fn root_ptr_eq<U: ?Sized>(this: &Self, other: &SharedPtr<U>) -> bool {
        this.block == other.block
    }

    pub(crate) fn header(&self) -> Option<&Header> {
        // Safety: we hold a strong reference, so the block is allocated
        self.block.map(|h| unsafe { &*h.as_ptr() })
    }
}

pub(crate) fn addr<T: ?Sized>(ptr: Option<NonNull<T>>) -> *const () {
    ptr.map_or(ptr::null(), |p| p.as_ptr() as *const ())
}

/// Construct a `SharedPtr` directly from a weak one. Fails if the object is
/// already gone; see [`WeakPtr::lock`] for the non-failing variant.
impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = ExpiredError;

    fn try_from(weak: &WeakPtr<T>) -> Result<Self, ExpiredError> {
        weak.upgrade().ok_or(ExpiredError)
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        if let Some(h) = self.header() {
            h.increment_strong();
        }
        SharedPtr {
            block: self.block,
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.block == source.block && self.ptr == source.ptr {
            return;
        }
        *self = source.clone();
    }
}

impl<T: ?Sized> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        if let Some(block) = self.block {
            // Safety: we own one strong reference
            unsafe { Header::release_strong(block) }
        }
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match SharedPtr::get(self) {
            Some(v) => v,
            None => panic!("dereferenced an empty SharedPtr"),
        }
    }
}

impl<T: ?Sized> AsRef<T> for SharedPtr<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    fn default() -> Self {
        SharedPtr::null()
    }
}

impl<T> From<T> for SharedPtr<T> {
    fn from(value: T) -> Self {
        SharedPtr::new(value)
    }
}

impl<T: ?Sized> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        SharedPtr::from_box(value)
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<SharedPtr<U>> for SharedPtr<T> {
    #[inline]
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        SharedPtr::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized> hash::Hash for SharedPtr<T> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        hash::Hash::hash(&addr(self.ptr), state)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match SharedPtr::get(self) {
            Some(v) => fmt::Display::fmt(v, f),
            None => f.write_str("(null)"),
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match SharedPtr::get(self) {
            Some(v) => fmt::Debug::fmt(v, f),
            None => f.write_str("(null)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&addr(self.ptr), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, format, rc::Rc, string::String, vec};

    fn counts<T: ?Sized>(x: &SharedPtr<T>) -> (usize, usize) {
        (SharedPtr::use_count(x), SharedPtr::weak_count(x))
    }

    struct DropCounter<T>(T, Rc<Cell<usize>>);
    impl<T> Drop for DropCounter<T> {
        fn drop(&mut self) {
            self.1.set(self.1.get() + 1);
        }
    }

    #[test]
    fn test_simple() {
        let x = SharedPtr::new(2);
        let y = x.clone();
        assert_eq!(*x, 2);
        assert_eq!(SharedPtr::as_ptr(&x), SharedPtr::as_ptr(&y));
        drop(x);
        assert_eq!(*y, 2);
        assert_eq!(counts(&y), (1, 0));
    }

    #[test]
    fn test_empty() {
        let a: SharedPtr<i32> = SharedPtr::null();
        let mut b: SharedPtr<i32> = SharedPtr::default();
        b.clone_from(&a);
        let c = a.clone();
        let b = c;
        assert!(SharedPtr::is_null(&a));
        assert!(SharedPtr::is_null(&b));
        assert!(SharedPtr::as_ptr(&a).is_null());
        assert_eq!(counts(&a), (0, 0));
        assert_eq!(SharedPtr::block_kind(&a), None);
        assert!(SharedPtr::get(&a).is_none());
        assert_eq!(format!("{:?}", a), "(null)");
    }

    #[test]
    #[should_panic(expected = "empty SharedPtr")]
    fn test_deref_empty() {
        let a: SharedPtr<i32> = SharedPtr::null();
        let _x: i32 = *a;
    }

    #[test]
    fn test_copies_share_count() {
        let a = SharedPtr::new(String::from("aba"));
        let b = a.clone();
        let c = a.clone();
        assert_eq!(SharedPtr::use_count(&a), 3);
        drop(b);
        assert_eq!(SharedPtr::use_count(&a), 2);
        assert_eq!(SharedPtr::use_count(&c), 2);
        drop(c);
        assert_eq!(SharedPtr::use_count(&a), 1);
        assert_eq!(*a, "aba");
    }

    #[test]
    fn test_copy_move() {
        let mut a = SharedPtr::from_box(Box::new(String::from("aba")));
        let ptr;
        {
            let _b = a.clone();
            let c = a.clone();
            ptr = SharedPtr::as_ptr(&c);
        }
        assert_eq!(ptr, SharedPtr::as_ptr(&a));
        assert_eq!(*a, "aba");

        let mut b = SharedPtr::from_box(Box::new(String::from("caba")));
        {
            let c = b.clone();
            let mut d = b.clone();
            assert_eq!(SharedPtr::use_count(&d), 3);
            d = SharedPtr::take(&mut a);
            assert!(SharedPtr::is_null(&a));
            assert_eq!(*c, "caba");
            assert_eq!(*d, "aba");
            SharedPtr::reset_box(&mut b, Box::new(String::from("test")));
            assert_eq!(*c, "caba");
            assert_eq!(SharedPtr::use_count(&c), 1);
        }
        assert_eq!(*b, "test");

        let mut end: SharedPtr<String> = SharedPtr::null();
        {
            let mut d = SharedPtr::new(String::from("delete"));
            d.clone_from(&b);
            let mut c = SharedPtr::take(&mut b);
            assert_eq!(*d, "test");
            assert_eq!(*c, "test");
            let same = d.clone();
            d.clone_from(&same);
            assert_eq!(SharedPtr::use_count(&d), 3);
            drop(same);
            c.clone_from(&end);
            assert!(SharedPtr::is_null(&c));
            SharedPtr::reset_box(&mut d, Box::new(String::from("delete")));
            end.clone_from(&d);
        }
        assert_eq!(*end, "delete");
        assert_eq!(SharedPtr::use_count(&end), 1);
    }

    #[test]
    fn test_self_assign() {
        let mut a = SharedPtr::new(1);
        let b = a.clone();
        let before = SharedPtr::as_ptr(&a);
        a.clone_from(&b);
        assert_eq!(SharedPtr::use_count(&a), 2);
        assert_eq!(SharedPtr::as_ptr(&a), before);
        a = a.clone();
        assert_eq!(SharedPtr::use_count(&a), 2);
        assert_eq!(SharedPtr::as_ptr(&a), before);
    }

    #[test]
    fn test_reset() {
        let n = Rc::new(Cell::new(0));
        let mut p = SharedPtr::from_box(Box::new(DropCounter((), n.clone())));
        SharedPtr::reset(&mut p);
        assert_eq!(n.get(), 1);
        assert_eq!(SharedPtr::use_count(&p), 0);
        assert!(SharedPtr::is_null(&p));

        let mut p: SharedPtr<DropCounter<()>> = SharedPtr::null();
        SharedPtr::reset(&mut p);
        assert_eq!(SharedPtr::use_count(&p), 0);

        let m = Rc::new(Cell::new(0));
        let raw = Box::into_raw(Box::new(DropCounter((), m.clone())));
        unsafe { SharedPtr::reset_raw(&mut p, raw) };
        assert_eq!(SharedPtr::use_count(&p), 1);
        assert_eq!(SharedPtr::as_ptr(&p), raw as *const _);
        drop(p);
        assert_eq!(m.get(), 1);
    }

    #[test]
    fn test_reset_keeps_other_owners() {
        let n = Rc::new(Cell::new(0));
        let mut p = SharedPtr::new(DropCounter(1, n.clone()));
        let q = p.clone();
        SharedPtr::reset_box(&mut p, Box::new(DropCounter(2, n.clone())));
        assert_eq!(n.get(), 0);
        assert_eq!(q.0, 1);
        assert_eq!(p.0, 2);
        assert!(!SharedPtr::root_ptr_eq(&p, &q));
        drop(q);
        assert_eq!(n.get(), 1);
    }

    #[test]
    fn test_from_raw_null() {
        let p: SharedPtr<i32> = unsafe { SharedPtr::from_raw(ptr::null_mut()) };
        assert!(SharedPtr::is_null(&p));
        assert_eq!(SharedPtr::use_count(&p), 0);
    }

    #[test]
    fn test_swap() {
        let n = Rc::new(Cell::new(0));
        let mut p1 = SharedPtr::new(DropCounter(1, n.clone()));
        let ptr1 = SharedPtr::as_ptr(&p1);
        {
            let mut p2 = SharedPtr::from_box(Box::new(DropCounter(2, n.clone())));
            let ptr2 = SharedPtr::as_ptr(&p2);
            SharedPtr::swap(&mut p1, &mut p2);
            assert_eq!(SharedPtr::as_ptr(&p1), ptr2);
            assert_eq!(SharedPtr::as_ptr(&p2), ptr1);
            assert_eq!(counts(&p1), (1, 0));
            assert_eq!(counts(&p2), (1, 0));
        }
        assert_eq!(n.get(), 1);
        assert_eq!(p1.0, 2);

        let mut empty = SharedPtr::null();
        SharedPtr::swap(&mut p1, &mut empty);
        assert!(SharedPtr::is_null(&p1));
        assert_eq!(SharedPtr::use_count(&p1), 0);
        assert_eq!(SharedPtr::use_count(&empty), 1);
        drop(empty);
        assert_eq!(n.get(), 2);
    }

    #[test]
    fn test_derived() {
        let n = Rc::new(Cell::new(0));
        {
            let x = SharedPtr::new(DropCounter((1, 2), n.clone()));
            let y = SharedPtr::project(x.clone(), |x| &x.0 .0);
            let z = SharedPtr::project(x.clone(), |x| &x.0 .1);
            assert_eq!(*y, 1);
            assert_eq!(*z, 2);
            assert_eq!(counts(&z), (3, 0));
            drop(x);
            drop(y);
            assert_eq!(counts(&z), (1, 0));
            assert_eq!(n.get(), 0);
            drop(z);
        }
        assert_eq!(n.get(), 1);
    }

    #[test]
    fn test_aliasing_keeps_owner_alive() {
        struct Owner {
            name: String,
            value: DropCounter<i32>,
        }
        let n = Rc::new(Cell::new(0));
        let owner = SharedPtr::new(Owner {
            name: String::from("owner"),
            value: DropCounter(42, n.clone()),
        });
        let sub: SharedPtr<i32> = SharedPtr::aliasing(&owner, |o| &o.value.0);
        let name: SharedPtr<str> = SharedPtr::aliasing(&owner, |o| o.name.as_str());
        assert_eq!(SharedPtr::use_count(&sub), 3);
        assert!(SharedPtr::root_ptr_eq(&sub, &owner));
        assert!(!SharedPtr::ptr_eq(&sub, &owner));

        drop(owner);
        assert_eq!(n.get(), 0);
        assert_eq!(*sub, 42);
        assert_eq!(&*name, "owner");
        assert_eq!(SharedPtr::use_count(&sub), 2);
        drop(name);
        drop(sub);
        assert_eq!(n.get(), 1);
    }

    #[test]
    fn test_aliasing_raw() {
        static OTHER: i32 = 9;
        let owner = SharedPtr::new(1);
        let p: SharedPtr<i32> = unsafe { SharedPtr::aliasing_raw(&owner, &OTHER) };
        assert_eq!(*p, 9);
        assert_eq!(SharedPtr::use_count(&owner), 2);

        // aliasing an empty owner: a non-null pointer with no block
        let empty: SharedPtr<i32> = SharedPtr::null();
        let q: SharedPtr<i32> = unsafe { SharedPtr::aliasing_raw(&empty, &OTHER) };
        assert!(!SharedPtr::is_null(&q));
        assert_eq!(SharedPtr::use_count(&q), 0);
        assert_eq!(*q, 9);
    }

    #[test]
    fn test_try_project() {
        let x = SharedPtr::new(Some(3));
        let y = SharedPtr::try_project(x.clone(), |x| x.as_ref()).unwrap();
        assert_eq!(*y, 3);
        assert_eq!(SharedPtr::use_count(&x), 2);
        let z: Option<SharedPtr<i32>> = SharedPtr::try_project(x.clone(), |_| None);
        assert!(z.is_none());
        assert_eq!(SharedPtr::use_count(&x), 2);
    }

    #[test]
    fn test_project_empty() {
        let x: SharedPtr<(i32, i32)> = SharedPtr::null();
        let y = SharedPtr::project(x, |x| &x.0);
        assert!(SharedPtr::is_null(&y));
    }

    #[test]
    fn test_trait_obj() {
        let x = SharedPtr::new(2);
        let d = SharedPtr::project(x.clone(), |p| p as &dyn fmt::Debug);
        assert_eq!(format!("{:?}", d), "2");
        assert_eq!(d, x);
    }

    #[test]
    fn test_array_to_slice() {
        let x: SharedPtr<[i32; 3]> = SharedPtr::new([1, 2, 3]);
        let y: SharedPtr<[i32]> = SharedPtr::project(x.clone(), |p| &p[..]);
        let z: SharedPtr<i32> = SharedPtr::project(y.clone(), |p| &p[1]);
        assert_eq!(format!("{:?}", y), "[1, 2, 3]");
        assert_eq!(format!("{}", z), "2");
    }

    #[test]
    fn test_vec_to_slice() {
        // from_box reuses the existing allocation and points at it
        let x: SharedPtr<[i32]> = SharedPtr::from_box(vec![1, 2, 3].into_boxed_slice());
        let z: SharedPtr<i32> = SharedPtr::project(x.clone(), |p| &p[1]);
        assert_eq!(SharedPtr::block_kind(&z), Some(BlockKind::Pointing));
        assert_eq!(*z, 2);
    }

    #[test]
    fn test_cast_to_base() {
        struct Base {
            id: u32,
        }
        struct Derived {
            base: Base,
            extra: u32,
        }
        impl<'a> From<&'a Derived> for &'a Base {
            fn from(d: &'a Derived) -> &'a Base {
                &d.base
            }
        }

        let d = SharedPtr::new(Derived {
            base: Base { id: 1 },
            extra: 2,
        });
        assert_eq!(d.extra, 2);
        let b: SharedPtr<Base> = SharedPtr::cast(d.clone());
        assert_eq!(b.id, 1);
        assert!(SharedPtr::root_ptr_eq(&b, &d));
        assert_eq!(SharedPtr::use_count(&b), 2);
        assert_eq!(SharedPtr::as_ptr(&b), &d.base as *const Base);
    }

    #[test]
    fn test_equality_by_address() {
        let a = SharedPtr::new(1);
        let b = SharedPtr::new(1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        let e1: SharedPtr<i32> = SharedPtr::null();
        let e2: SharedPtr<i32> = SharedPtr::null();
        assert_eq!(e1, e2);
    }

    #[test]
    fn test_try_from_weak() {
        let p = SharedPtr::new(4);
        let w = SharedPtr::downgrade(&p);
        let q: SharedPtr<i32> = SharedPtr::try_from(&w).unwrap();
        assert_eq!(SharedPtr::use_count(&q), 2);
        assert_eq!(q, p);
        drop(p);
        drop(q);
        assert_eq!(SharedPtr::<i32>::try_from(&w), Err(ExpiredError));

        let empty: WeakPtr<i32> = WeakPtr::new();
        assert_eq!(SharedPtr::<i32>::try_from(&empty), Err(ExpiredError));
    }

    #[test]
    fn test_use_count_tracks_group() {
        let a = SharedPtr::new(0u8);
        let mut group = vec![a.clone(), a.clone(), a.clone()];
        assert_eq!(SharedPtr::use_count(&a), 4);
        let moved = group.pop().unwrap();
        assert_eq!(SharedPtr::use_count(&moved), 4);
        SharedPtr::reset(&mut group[0]);
        assert_eq!(SharedPtr::use_count(&a), 3);
        group.push(moved.clone());
        assert_eq!(SharedPtr::use_count(&a), 4);
        drop(group);
        assert_eq!(SharedPtr::use_count(&moved), 2);
    }

    #[test]
    fn test_from_conversions() {
        let a: SharedPtr<i32> = 5.into();
        let b: SharedPtr<i32> = Box::new(6).into();
        assert_eq!(SharedPtr::block_kind(&a), Some(BlockKind::Emplaced));
        assert_eq!(SharedPtr::block_kind(&b), Some(BlockKind::Pointing));
        assert_eq!(*a + *b, 11);
    }
}
