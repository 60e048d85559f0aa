/*!
Reference-counted pointers built the way C++'s `shared_ptr` and `weak_ptr`
are: every ownership group has a separately tracked *control block* with a
strong and a weak count, and each handle carries its own access pointer.

```rust
    use sharedptr::{SharedPtr, WeakPtr};

    let a = SharedPtr::new(String::from("aba"));
    let b = a.clone();
    let w: WeakPtr<String> = SharedPtr::downgrade(&a);

    assert_eq!(SharedPtr::use_count(&a), 2);
    drop(b);
    assert_eq!(SharedPtr::use_count(&a), 1);

    // dropping the last owner destroys the string right away
    drop(a);
    assert!(w.expired());
    assert!(SharedPtr::is_null(&w.lock()));
```

# Control blocks

A block comes into existence in one of two ways, and these are the only two:

* [`SharedPtr::new`] (and [`SharedPtr::new_cyclic`]) constructs the value
  inside the block. Block and value share a single allocation.
* [`SharedPtr::from_box`] (and the unsafe [`SharedPtr::from_raw`]) wraps an
  object that was already allocated. The block is a second, small allocation
  that points at it.

All other operations copy, move or release references to an existing block.
The value is destroyed as soon as the last [`SharedPtr`] goes away, even while
[`WeakPtr`]s remain. The block itself lives until the last handle of either
kind is gone.

Note that wrapping the same raw pointer twice with [`SharedPtr::from_raw`]
creates two unrelated ownership groups, each of which will try to free it.
[`SharedPtr::from_box`] makes that impossible in safe code.

# Aliasing

A `SharedPtr<U>` can point at anything that the object owned by its block
keeps alive. [`SharedPtr::project`] is the safe way to get one:

```rust
    use sharedptr::SharedPtr;

    struct Pair {
        name: String,
        value: i32,
    }

    let owner = SharedPtr::new(Pair { name: "x".into(), value: 5 });
    let sub: SharedPtr<i32> = SharedPtr::aliasing(&owner, |p| &p.value);

    assert_eq!(SharedPtr::use_count(&sub), 2);
    drop(owner);

    // `sub` keeps the whole `Pair` alive
    assert_eq!(*sub, 5);
    assert_eq!(SharedPtr::use_count(&sub), 1);
```

The same mechanism converts to slices or trait objects:

```rust
    use sharedptr::SharedPtr;
    use std::fmt::Debug;

    let a: SharedPtr<[i32; 3]> = SharedPtr::new([1, 2, 3]);
    let b: SharedPtr<[i32]> = SharedPtr::project(a.clone(), |x| &x[..]);
    let c: SharedPtr<dyn Debug> = SharedPtr::project(a, |x| x as &dyn Debug);
    assert_eq!(b.len(), 3);
    assert_eq!(format!("{:?}", c), "[1, 2, 3]");
```

Equality compares access pointers, not values and not blocks; use
[`SharedPtr::root_ptr_eq`] to ask whether two pointers share a block.

# Promotion

A [`WeakPtr`] can be turned back into a [`SharedPtr`] in two ways.
[`WeakPtr::lock`] never fails and returns an empty pointer once the value is
gone. `SharedPtr::try_from(&weak)` reports [`ExpiredError`] instead.

# Self-observation

Types that embed a [`WeakThis`] and implement [`EnableSharedFromThis`] can hand
out more pointers to themselves from their own methods, as long as they were
created with [`SharedPtr::new_enabled`] or [`SharedPtr::from_box_enabled`]:

```rust
    use sharedptr::{EnableSharedFromThis, SharedPtr, WeakThis};

    struct Node {
        this: WeakThis<Node>,
        id: u32,
    }

    impl EnableSharedFromThis for Node {
        fn weak_this(&self) -> &WeakThis<Node> {
            &self.this
        }
    }

    let node = SharedPtr::new_enabled(Node { this: WeakThis::new(), id: 7 });
    let again = node.shared_from_this().unwrap();
    assert!(SharedPtr::root_ptr_eq(&node, &again));
    assert_eq!(SharedPtr::use_count(&node), 2);
```

# Intrusive pointers

[`IntrusivePtr`] is the simpler single-count variant: the count lives inside
the object (see [`RefCounted`]), there is no control block and no weak
pointer.

# Overflow

Leaking enough handles to overflow a count panics with "reference count
overflow" rather than aborting, because there is no `abort()` in `no_std`.
The count is left as it was, so the object is leaked instead of freed early.

# Threads

None of the counts are atomic. The handles are neither `Send` nor `Sync`, so
the compiler keeps every ownership group on one thread.

# Features

* `std` (default): implements `std::error::Error` for [`ExpiredError`].
* `log`: emits `trace`-level records through the `log` crate when a payload
  is destroyed or a block is freed.
*/
#![no_std]
#[cfg(any(test, feature = "std"))]
extern crate std;

extern crate alloc;

#[cfg(feature = "log")]
macro_rules! trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

pub(crate) use trace;

mod block;
pub mod error;
pub mod intrusive;
pub mod shared;
pub mod this;
pub mod weak;

pub use self::block::BlockKind;
pub use self::error::ExpiredError;
pub use self::intrusive::{IntrusivePtr, RefCount, RefCounted};
pub use self::shared::SharedPtr;
pub use self::this::{EnableSharedFromThis, WeakThis};
pub use self::weak::WeakPtr;
