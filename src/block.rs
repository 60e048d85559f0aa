//! Control blocks: the counts shared by every [`SharedPtr`] and [`WeakPtr`] in
//! one ownership group, plus the knowledge of how to destroy what they manage.
//!
//! A block is one of two kinds:
//!
//! * [`BlockKind::Pointing`] wraps an object that was allocated separately (a
//!   `Box<T>`). Destroying the payload frees that box; the block is a second,
//!   small allocation.
//! * [`BlockKind::Emplaced`] stores the object inline, so block and object come
//!   from a single allocation. Destroying the payload runs the destructor in
//!   place; the storage is reclaimed together with the block.
//!
//! The payload is destroyed when the strong count reaches zero. The block is
//! freed when both counts have reached zero. Both happen only in
//! [`Header::release_strong`] and [`Header::release_weak`].
//!
//! [`SharedPtr`]: crate::SharedPtr
//! [`WeakPtr`]: crate::WeakPtr
use alloc::boxed::Box;
use core::{
    cell::Cell,
    mem::MaybeUninit,
    ptr::{self, NonNull},
};

/// Which kind of control block manages an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// The object lives in its own allocation and the block points at it.
    Pointing,
    /// The object was constructed inside the block's own allocation.
    Emplaced,
}

// Counts and destructors for one ownership group. Every concrete block is
// `#[repr(C)]` with a `Header` first, so the functions stored here can cast the
// header pointer back to the full block.
pub(crate) struct Header {
    strong: Cell<usize>,
    // While `strong > 0` the strong pointers collectively hold one extra weak
    // reference, released after the payload is destroyed.
    weak: Cell<usize>,
    kind: BlockKind,
    destroy_payload: unsafe fn(NonNull<Header>),
    free_block: unsafe fn(NonNull<Header>),
}

#[repr(C)]
struct PointingBlock<T: ?Sized> {
    header: Header,
    ptr: NonNull<T>,
}

#[repr(C)]
struct EmplacedBlock<T> {
    header: Header,
    value: MaybeUninit<T>,
}

/// Allocates a pointing block that takes ownership of `ptr`, with a strong
/// count of one.
///
/// # Safety
///
/// `ptr` must come from `Box::into_raw` (or `Box::leak`) and must not be owned
/// by anything else: it is freed through `Box::from_raw` when the strong count
/// reaches zero.
pub(crate) unsafe fn point<T: ?Sized>(ptr: NonNull<T>) -> NonNull<Header> {
    let b = Box::into_raw(Box::new(PointingBlock {
        header: Header::new(
            BlockKind::Pointing,
            1,
            destroy_pointed::<T>,
            free_pointing::<T>,
        ),
        ptr,
    }));
    // Safety: Box::into_raw never returns null
    unsafe { NonNull::new_unchecked(b as *mut Header) }
}

/// Allocates an emplaced block holding `value`, with a strong count of one.
/// Returns the block and a pointer to the value inside it.
pub(crate) fn emplace<T>(value: T) -> (NonNull<Header>, NonNull<T>) {
    emplace_with(MaybeUninit::new(value), 1)
}

/// Allocates an emplaced block whose value is not yet written. The strong
/// count starts at zero and the weak count at one, so the single reference
/// the caller holds is a weak one. Dropping it frees the block without
/// touching the value.
pub(crate) fn emplace_uninit<T>() -> (NonNull<Header>, NonNull<T>) {
    emplace_with(MaybeUninit::uninit(), 0)
}

fn emplace_with<T>(value: MaybeUninit<T>, strong: usize) -> (NonNull<Header>, NonNull<T>) {
    let b = Box::into_raw(Box::new(EmplacedBlock {
        header: Header::new(
            BlockKind::Emplaced,
            strong,
            destroy_emplaced::<T>,
            free_emplaced::<T>,
        ),
        value,
    }));
    // Safety: Box::into_raw never returns null, and both pointers are derived
    // from it so they keep provenance over the whole block.
    unsafe {
        let v = ptr::addr_of_mut!((*b).value) as *mut T;
        (
            NonNull::new_unchecked(b as *mut Header),
            NonNull::new_unchecked(v),
        )
    }
}

impl Header {
    fn new(
        kind: BlockKind,
        strong: usize,
        destroy_payload: unsafe fn(NonNull<Header>),
        free_block: unsafe fn(NonNull<Header>),
    ) -> Header {
        Header {
            strong: Cell::new(strong),
            weak: Cell::new(1),
            kind,
            destroy_payload,
            free_block,
        }
    }

    pub(crate) fn kind(&self) -> BlockKind {
        self.kind
    }

    pub(crate) fn increment_strong(&self) {
        self.strong.set(increment(self.strong.get()));
    }

    /// Adds a strong reference unless the payload is already gone.
    pub(crate) fn increment_strong_if_nonzero(&self) -> bool {
        let s = self.strong.get();
        if s == 0 {
            return false;
        }
        self.strong.set(increment(s));
        true
    }

    pub(crate) fn decrement_strong(&self) -> usize {
        let s = self.strong.get();
        debug_assert!(s > 0, "strong count underflow");
        self.strong.set(s - 1);
        s - 1
    }

    pub(crate) fn increment_weak(&self) {
        self.weak.set(increment(self.weak.get()));
    }

    pub(crate) fn decrement_weak(&self) -> usize {
        let w = self.weak.get();
        debug_assert!(w > 0, "weak count underflow");
        self.weak.set(w - 1);
        w - 1
    }

    pub(crate) fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// Number of live weak pointers, not counting the reference held on behalf
    /// of the strong pointers.
    pub(crate) fn weak_count(&self) -> usize {
        self.weak.get() - (self.strong.get() != 0) as usize
    }

    /// Runs the payload's destructor (and frees its allocation for a pointing
    /// block) without freeing the block.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, after the strong count has dropped to
    /// zero, on a block that is still allocated.
    pub(crate) unsafe fn destroy_payload(this: NonNull<Header>) {
        let f = unsafe { this.as_ref() }.destroy_payload;
        unsafe { f(this) }
    }

    /// Gives up one strong reference. The last one destroys the payload and
    /// then drops the weak reference the strong pointers held together.
    ///
    /// # Safety
    ///
    /// The caller must own a strong reference on `this`, and must not use it
    /// again afterwards.
    pub(crate) unsafe fn release_strong(this: NonNull<Header>) {
        let h = unsafe { this.as_ref() };
        if h.decrement_strong() != 0 {
            return;
        }
        crate::trace!("destroying {:?} payload of block {:p}", h.kind, this);
        unsafe {
            Header::destroy_payload(this);
            Header::release_weak(this);
        }
    }

    /// Gives up one weak reference. The last one frees the block.
    ///
    /// # Safety
    ///
    /// The caller must own a weak reference on `this`, and must not use it
    /// again afterwards.
    pub(crate) unsafe fn release_weak(this: NonNull<Header>) {
        let h = unsafe { this.as_ref() };
        if h.decrement_weak() != 0 {
            return;
        }
        debug_assert_eq!(h.strong.get(), 0);
        crate::trace!("freeing {:?} block {:p}", h.kind, this);
        let f = h.free_block;
        unsafe { f(this) }
    }
}

/// Panics instead of wrapping, leaving the count untouched.
pub(crate) fn increment(count: usize) -> usize {
    match count.checked_add(1) {
        Some(c) => c,
        None => panic!("reference count overflow"),
    }
}

unsafe fn destroy_pointed<T: ?Sized>(header: NonNull<Header>) {
    let block = header.cast::<PointingBlock<T>>();
    // Safety: `ptr` came from Box::into_raw and this runs once
    unsafe {
        let ptr = block.as_ref().ptr;
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

unsafe fn free_pointing<T: ?Sized>(header: NonNull<Header>) {
    drop(unsafe { Box::from_raw(header.cast::<PointingBlock<T>>().as_ptr()) });
}

unsafe fn destroy_emplaced<T>(header: NonNull<Header>) {
    let block = header.cast::<EmplacedBlock<T>>().as_ptr();
    unsafe {
        let value = ptr::addr_of_mut!((*block).value) as *mut T;
        ptr::drop_in_place(value);
    }
}

unsafe fn free_emplaced<T>(header: NonNull<Header>) {
    // `value` is MaybeUninit, so this only releases the storage
    drop(unsafe { Box::from_raw(header.cast::<EmplacedBlock<T>>().as_ptr()) });
}
