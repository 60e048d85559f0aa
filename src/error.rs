use core::fmt;

/// Returned when a [`SharedPtr`][crate::SharedPtr] is constructed directly from
/// a [`WeakPtr`][crate::WeakPtr] whose value has already been destroyed (or
/// that never referred to one).
///
/// [`WeakPtr::lock`][crate::WeakPtr::lock] is the non-failing alternative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ExpiredError;

impl fmt::Display for ExpiredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("weak pointer has expired")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ExpiredError {}
