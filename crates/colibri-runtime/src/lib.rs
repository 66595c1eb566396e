#![forbid(unsafe_code)]

//! Component runtime for Colibri.
//!
//! Connects the reactive core to the reconciler: a mounted component is a
//! scope owning one render effect, and every run of that effect renders a
//! new snapshot, diffs it against the last one and commits the edits to the
//! host.
//!
//! # Example
//!
//! ```
//! use colibri_harness::MemoryHost;
//! use colibri_reactive::{Ref, flush};
//! use colibri_runtime::{RenderError, mount};
//! use colibri_vdom::{Props, h};
//!
//! let host = MemoryHost::shared();
//! let root = host.borrow_mut().create_container("app");
//!
//! let count = Ref::new(0);
//! let c = count.clone();
//! let handle = mount(host.clone(), root, move || {
//!     Ok::<_, RenderError>(h("p", Props::new(), format!("count: {}", c.get())))
//! });
//! assert_eq!(host.borrow().inner_html(root), "<p>count: 0</p>");
//!
//! count.set(1);
//! flush();
//! assert_eq!(host.borrow().inner_html(root), "<p>count: 1</p>");
//!
//! handle.unmount();
//! assert_eq!(host.borrow().inner_html(root), "");
//! ```

pub mod app;
pub mod component;
pub mod emitter;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod mount;
pub mod options;

pub use app::{App, Plugin};
pub use component::{InstanceId, Phase, current_instance};
pub use emitter::{EventEmitter, ListenerId, Subscription};
pub use error::{RenderError, Result, RuntimeError};
pub use hooks::{
    MutableRef, Setter, use_callback, use_context, use_effect, use_memo, use_ref, use_state,
};
pub use lifecycle::{on_mounted, on_unmounted, on_updated};
pub use mount::{MountHandle, mount, mount_component, mount_with};
pub use options::{DEFAULT_COMPONENT_NAME, ErrorHook, MountOptions};
