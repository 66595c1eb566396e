#![forbid(unsafe_code)]

//! Test fixtures for Colibri.
//!
//! [`MemoryHost`] is a host adapter backed by an in-memory node table. It
//! journals every adapter call, renders to HTML, and dispatches events to
//! handler props the way a browser event loop would, flushing the reactive
//! scheduler after each one.

pub mod memory;

pub use memory::{HostCall, MemoryHost};
