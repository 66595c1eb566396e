#![forbid(unsafe_code)]

//! Colibri public facade crate.
//!
//! Re-exports the member crates under short names and gathers the items most
//! components need in [`prelude`].
//!
//! ```
//! use colibri::prelude::*;
//! use colibri_harness::MemoryHost;
//!
//! let host = MemoryHost::shared();
//! host.borrow_mut().create_container("app");
//!
//! let mut app = App::new(|| {
//!     let (count, _set) = use_state(2);
//!     move || Ok::<_, RenderError>(h("p", Props::new(), format!("{}", count.get())))
//! });
//! let handle = app.mount(host.clone(), "#app").expect("mount");
//! assert_eq!(host.borrow().inner_html(handle.container()), "<p>2</p>");
//! ```

pub use colibri_reactive as reactive;
pub use colibri_vdom as vdom;

#[cfg(feature = "runtime")]
pub use colibri_runtime as runtime;

#[cfg(feature = "harness")]
pub use colibri_harness as harness;

pub mod prelude {
    pub use colibri_reactive::{
        Computed, EffectHandle, Ref, Scope, batch, effect, flush, on_cleanup, untrack,
    };
    pub use colibri_vdom::{
        Child, Event, EventHandler, HostAdapter, HostNode, HostNodeKind, Key, PropValue, Props,
        VNode, VNodeRef, fragment, h, keyed_fragment, text,
    };

    #[cfg(feature = "runtime")]
    pub use colibri_runtime::{
        App, MountHandle, MountOptions, Phase, Plugin, RenderError, RuntimeError, mount,
        mount_component, mount_with, on_mounted, on_unmounted, on_updated, use_callback,
        use_context, use_effect, use_memo, use_ref, use_state,
    };
}
