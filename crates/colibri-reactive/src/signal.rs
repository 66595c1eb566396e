//! Read/write access shared by [`Ref`](crate::Ref) and
//! [`Computed`](crate::Computed).

use crate::error::ReactiveError;

/// A tracked, readable reactive value.
pub trait Readable<T> {
    /// Borrow the current value, registering a dependency on the active run.
    fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R;

    /// Clone the current value out, registering a dependency.
    fn get_value(&self) -> T
    where
        T: Clone,
    {
        self.with_value(T::clone)
    }
}

/// A reactive value that may accept writes.
pub trait Writable<T> {
    /// Store `value`. Derived values refuse with [`ReactiveError::ReadOnly`].
    fn try_set(&self, value: T) -> Result<(), ReactiveError>;
}
