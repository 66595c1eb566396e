use thiserror::Error;

/// Errors raised by reactive primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A write was attempted on a derived (`Computed`) value.
    #[error("computed values are read-only")]
    ReadOnly,

    /// The effect was already stopped. Callers may treat this as a no-op.
    #[error("effect has been disposed")]
    Disposed,
}
