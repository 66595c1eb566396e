//! Lifecycle, failure isolation and application-shell scenarios.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use colibri_harness::MemoryHost;
use colibri_reactive::{Ref, effect, flush};
use colibri_runtime::{
    App, MountHandle, MountOptions, Phase, Plugin, RenderError, RuntimeError, current_instance, mount,
    mount_component, mount_with, on_mounted, on_unmounted, on_updated, use_context, use_effect,
};
use colibri_vdom::{DiffError, DiffOptions, HostNode, Key, Props, VNodeRef, h};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

type Host = Rc<RefCell<MemoryHost>>;
type Log = Rc<RefCell<Vec<String>>>;

fn host_with_root() -> (Host, HostNode) {
    let host = MemoryHost::shared();
    let root = host.borrow_mut().create_container("app");
    (host, root)
}

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

fn drain(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

// ── Lifecycle hooks ─────────────────────────────────────────────────────

#[test]
fn hooks_run_in_lifecycle_order() {
    let (host, root) = host_with_root();
    let events = log();
    let state = Ref::new(0);

    let (ev, s) = (Rc::clone(&events), state.clone());
    let handle = mount_component(host, root, MountOptions::default(), move || {
        push(&ev, "setup");
        let e = Rc::clone(&ev);
        on_mounted(move || push(&e, "mounted"));
        let e = Rc::clone(&ev);
        on_updated(move || push(&e, "updated"));
        let e = Rc::clone(&ev);
        on_unmounted(move || push(&e, "unmounted"));
        move || {
            push(&ev, format!("render {}", s.get()));
            Ok::<_, RenderError>(h("p", Props::new(), s.get().to_string()))
        }
    });
    assert_eq!(drain(&events), ["setup", "render 0", "mounted"]);

    state.set(1);
    flush();
    assert_eq!(drain(&events), ["render 1", "updated"]);

    handle.unmount();
    assert_eq!(drain(&events), ["unmounted"]);
}

#[test]
fn hooks_reading_state_do_not_subscribe() {
    let (host, root) = host_with_root();
    let watched = Ref::new(0);

    let w = watched.clone();
    let handle = mount_component(host, root, MountOptions::default(), move || {
        on_mounted(move || {
            let _ = w.get();
        });
        || Ok::<_, RenderError>(h("p", Props::new(), "static"))
    });

    watched.set(1);
    assert_eq!(flush().runs, 0);
    assert_eq!(handle.render_count(), 1);
}

#[test]
fn hooks_outside_a_component_are_rejected() {
    assert!(!on_mounted(|| {}));
    assert!(!on_updated(|| {}));
    assert!(!on_unmounted(|| {}));
    assert!(current_instance().is_none());
}

#[test]
fn current_instance_is_set_during_setup_only() {
    let (host, root) = host_with_root();
    let seen = Rc::new(Cell::new(None));
    let in_later_render = Rc::new(Cell::new(None));
    let bump = Ref::new(0);

    let (s, later, b) = (Rc::clone(&seen), Rc::clone(&in_later_render), bump.clone());
    let handle = mount_component(host, root, MountOptions::default(), move || {
        s.set(current_instance());
        move || {
            if b.get() > 0 {
                later.set(Some(current_instance()));
            }
            Ok::<_, RenderError>(h("p", Props::new(), ""))
        }
    });
    assert_eq!(seen.get(), Some(handle.id()));
    assert!(current_instance().is_none());

    bump.set(1);
    flush();
    assert_eq!(in_later_render.get(), Some(None));
}

// ── Nested components ───────────────────────────────────────────────────

struct Nested {
    host: Host,
    inner: HostNode,
    tick: Ref<i32>,
    child_state: Ref<i32>,
    parent: MountHandle,
    child: Rc<RefCell<Option<MountHandle>>>,
    child_unmounted: Rc<Cell<bool>>,
}

/// A parent whose first render mounts a child into a second container.
fn nested() -> Nested {
    let host = MemoryHost::shared();
    let (outer, inner) = {
        let mut host = host.borrow_mut();
        (host.create_container("outer"), host.create_container("inner"))
    };
    let tick = Ref::new(0);
    let child_state = Ref::new(0);
    let child: Rc<RefCell<Option<MountHandle>>> = Rc::new(RefCell::new(None));
    let child_unmounted = Rc::new(Cell::new(false));

    let (t, slot, state, gone, child_host) = (
        tick.clone(),
        Rc::clone(&child),
        child_state.clone(),
        Rc::clone(&child_unmounted),
        host.clone(),
    );
    let parent = mount(host.clone(), outer, move || {
        let n = t.get();
        if slot.borrow().is_none() {
            let (s, g) = (state.clone(), Rc::clone(&gone));
            let options = MountOptions::new().with_name("Child");
            let handle = mount_component(child_host.clone(), inner, options, move || {
                on_unmounted(move || g.set(true));
                move || Ok::<_, RenderError>(h("span", Props::new(), s.get().to_string()))
            });
            *slot.borrow_mut() = Some(handle);
        }
        Ok::<_, RenderError>(h("p", Props::new(), n.to_string()))
    });
    flush();

    Nested {
        host,
        inner,
        tick,
        child_state,
        parent,
        child,
        child_unmounted,
    }
}

impl Nested {
    fn child(&self) -> MountHandle {
        self.child.borrow().clone().expect("child mounted")
    }
}

#[test]
fn child_mounted_by_a_render_is_live_after_flush() {
    let n = nested();
    assert_eq!(n.child().phase(), Phase::Mounted);
    assert_eq!(n.host.borrow().inner_html(n.inner), "<span>0</span>");

    n.child_state.set(3);
    flush();
    assert_eq!(n.host.borrow().inner_html(n.inner), "<span>3</span>");
}

#[test]
fn parent_rerender_unmounts_the_child_it_owned() {
    let n = nested();

    n.tick.set(1);
    flush();

    let child = n.child();
    assert_eq!(child.phase(), Phase::Unmounted);
    assert!(n.child_unmounted.get());
    assert_eq!(n.host.borrow().inner_html(n.inner), "");

    n.child_state.set(5);
    flush();
    assert_eq!(n.host.borrow().inner_html(n.inner), "");
    assert_eq!(child.render_count(), 1);
    assert_eq!(n.parent.phase(), Phase::Mounted);
}

#[test]
fn parent_unmount_unmounts_the_child() {
    let n = nested();

    n.parent.unmount();

    assert_eq!(n.child().phase(), Phase::Unmounted);
    assert!(n.child_unmounted.get());
    assert_eq!(n.host.borrow().inner_html(n.inner), "");
}

// ── Effects ─────────────────────────────────────────────────────────────

#[test]
fn use_effect_waits_for_first_commit_then_tracks() {
    let (host, root) = host_with_root();
    let seen = log();
    let source = Ref::new("a".to_string());

    let (out, src, h_) = (Rc::clone(&seen), source.clone(), host.clone());
    let handle = mount_component(host.clone(), root, MountOptions::default(), move || {
        let host = h_;
        use_effect(move || {
            let html = host.borrow().inner_html(root);
            push(&out, format!("{} {html}", src.get()));
        });
        || Ok::<_, RenderError>(h("p", Props::new(), "x"))
    });
    assert!(seen.borrow().is_empty());

    flush();
    assert_eq!(drain(&seen), ["a <p>x</p>"]);

    source.set("b".to_string());
    flush();
    assert_eq!(drain(&seen), ["b <p>x</p>"]);

    handle.unmount();
    source.set("c".to_string());
    flush();
    assert!(seen.borrow().is_empty());
}

#[test]
fn effects_created_during_render_are_deferred_and_replaced() {
    let (host, root) = host_with_root();
    let runs = log();
    let version = Ref::new(1);

    let (out, v) = (Rc::clone(&runs), version.clone());
    let _handle = mount(host, root, move || {
        let n = v.get();
        let out = Rc::clone(&out);
        effect(move || push(&out, format!("effect {n}")));
        Ok::<_, RenderError>(h("p", Props::new(), n.to_string()))
    });
    assert!(runs.borrow().is_empty());

    flush();
    assert_eq!(drain(&runs), ["effect 1"]);

    version.set(2);
    flush();
    assert_eq!(drain(&runs), ["effect 2"]);
}

#[test]
fn render_writing_its_own_state_converges() {
    let (host, root) = host_with_root();
    let count = Ref::new(0u32);

    let c = count.clone();
    let handle = mount(host.clone(), root, move || {
        let n = c.get();
        if n < 3 {
            c.set(n + 1);
        }
        Ok::<_, RenderError>(h("p", Props::new(), n.to_string()))
    });

    let stats = flush();
    assert!(!stats.exhausted);
    assert_eq!(count.get(), 3);
    assert_eq!(handle.render_count(), 4);
    assert_eq!(host.borrow().inner_html(root), "<p>3</p>");
}

// ── Failures ────────────────────────────────────────────────────────────

#[test]
fn render_error_tears_down_only_the_failing_component() {
    let host = MemoryHost::shared();
    let (left, right) = {
        let mut host = host.borrow_mut();
        (host.create_container("left"), host.create_container("right"))
    };
    let broken = Ref::new(false);
    let tick = Ref::new(0);
    let errors: Rc<RefCell<Vec<RuntimeError>>> = Rc::new(RefCell::new(Vec::new()));
    let unmounted = Rc::new(Cell::new(false));

    let t = tick.clone();
    let healthy = mount(host.clone(), left, move || {
        Ok::<_, RenderError>(h("p", Props::new(), t.get().to_string()))
    });

    let (b, t, errs, gone) = (
        broken.clone(),
        tick.clone(),
        Rc::clone(&errors),
        Rc::clone(&unmounted),
    );
    let options = MountOptions::new()
        .with_name("Fragile")
        .on_error(move |err| errs.borrow_mut().push(err.clone()));
    let fragile = mount_component(host.clone(), right, options, move || {
        on_unmounted(move || gone.set(true));
        move || {
            if b.get() {
                return Err(RenderError::new("boom"));
            }
            Ok(h("p", Props::new(), t.get().to_string()))
        }
    });

    broken.set(true);
    tick.set(1);
    flush();

    assert_eq!(fragile.phase(), Phase::Failed);
    assert!(unmounted.get());
    assert_eq!(host.borrow().inner_html(right), "");
    let expected = RuntimeError::Render(RenderError::new("boom").in_component("Fragile"));
    assert_eq!(*errors.borrow(), vec![expected.clone()]);
    assert_eq!(fragile.error(), Some(expected));

    assert_eq!(healthy.phase(), Phase::Mounted);
    assert_eq!(host.borrow().inner_html(left), "<p>1</p>");
    tick.set(2);
    flush();
    assert_eq!(host.borrow().inner_html(left), "<p>2</p>");
    assert_eq!(fragile.render_count(), 1);
}

#[test]
fn failed_first_render_leaves_container_untouched() {
    let (host, root) = host_with_root();
    let handle = mount(host.clone(), root, || {
        Err::<VNodeRef, _>(RenderError::new("no data"))
    });

    assert_eq!(handle.phase(), Phase::Failed);
    assert_eq!(handle.render_count(), 0);
    assert!(host.borrow().journal().is_empty());
    assert!(matches!(handle.error(), Some(RuntimeError::Render(_))));
}

fn keyed(items: &[i64]) -> VNodeRef {
    let rows: Vec<VNodeRef> = items
        .iter()
        .map(|id| h("li", Props::new().key(*id), id.to_string()))
        .collect();
    h("ul", Props::new(), rows)
}

#[test]
fn checked_duplicate_keys_fail_the_component() {
    let (host, root) = host_with_root();
    let items = Ref::new(vec![1i64, 2]);
    let source = items.clone();
    let options = MountOptions::new()
        .with_diff(DiffOptions::default().with_checked(true))
        .on_error(|_| {});
    let handle = mount_with(host.clone(), root, options, move || {
        Ok::<_, RenderError>(source.with(|items| keyed(items)))
    });

    items.set(vec![1, 1]);
    flush();

    assert_eq!(handle.phase(), Phase::Failed);
    assert_eq!(
        handle.error(),
        Some(RuntimeError::Diff(DiffError::DuplicateKey { key: Key::Int(1) }))
    );
    assert_eq!(host.borrow().inner_html(root), "");
}

#[test]
fn unchecked_duplicate_keys_still_render() {
    let (host, root) = host_with_root();
    let items = Ref::new(vec![1i64, 2]);
    let source = items.clone();
    let options = MountOptions::new().with_diff(DiffOptions::default().with_checked(false));
    let handle = mount_with(host.clone(), root, options, move || {
        Ok::<_, RenderError>(source.with(|items| keyed(items)))
    });

    items.set(vec![1, 1, 3]);
    flush();

    assert_eq!(handle.phase(), Phase::Mounted);
    assert_eq!(
        host.borrow().inner_html(root),
        "<ul><li>1</li><li>1</li><li>3</li></ul>"
    );
}

// ── Logging ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct FailureTrace {
    messages: Vec<String>,
    components: Vec<String>,
}

struct FailureCapture {
    state: Arc<Mutex<FailureTrace>>,
}

impl<S> Layer<S> for FailureCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        #[derive(Default)]
        struct Fields {
            message: Option<String>,
            component: Option<String>,
        }
        impl tracing::field::Visit for Fields {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                match field.name() {
                    "message" => self.message = Some(value.to_string()),
                    "component" => self.component = Some(value.to_string()),
                    _ => {}
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                let text = format!("{value:?}").trim_matches('"').to_string();
                match field.name() {
                    "message" => self.message = Some(text),
                    "component" => self.component = Some(text),
                    _ => {}
                }
            }
        }
        let mut fields = Fields::default();
        event.record(&mut fields);
        let mut state = self.state.lock().expect("trace lock");
        if let Some(message) = fields.message {
            state.messages.push(message);
        }
        if let Some(component) = fields.component {
            state.components.push(component);
        }
    }
}

#[test]
fn unhandled_render_failure_is_logged() {
    let state = Arc::new(Mutex::new(FailureTrace::default()));
    let subscriber = tracing_subscriber::registry().with(FailureCapture {
        state: Arc::clone(&state),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let (host, root) = host_with_root();
    let handle = mount_with(host, root, MountOptions::new().with_name("Loud"), || {
        Err::<VNodeRef, _>(RenderError::new("nope"))
    });
    assert_eq!(handle.phase(), Phase::Failed);

    let trace = state.lock().expect("trace lock");
    assert!(
        trace.messages.iter().any(|m| m == "runtime.render_failed"),
        "expected runtime.render_failed, got {:?}",
        trace.messages
    );
    assert!(trace.components.iter().any(|c| c == "Loud"));
}

#[test]
fn handled_render_failure_is_not_logged_as_error() {
    let state = Arc::new(Mutex::new(FailureTrace::default()));
    let subscriber = tracing_subscriber::registry().with(FailureCapture {
        state: Arc::clone(&state),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let (host, root) = host_with_root();
    let _handle = mount_with(host, root, MountOptions::new().on_error(|_| {}), || {
        Err::<VNodeRef, _>(RenderError::new("quiet"))
    });

    let trace = state.lock().expect("trace lock");
    assert!(!trace.messages.iter().any(|m| m == "runtime.render_failed"));
}

// ── App ─────────────────────────────────────────────────────────────────

struct Theme(&'static str);

struct ThemePlugin;

impl Plugin for ThemePlugin {
    fn name(&self) -> &str {
        "theme"
    }

    fn install(&self, app: &mut App) {
        app.provide(Theme("dark"));
    }
}

fn themed_app() -> App {
    App::new(|| {
        let theme = use_context::<Theme>().map_or("none", |t| t.0);
        move || Ok::<_, RenderError>(h("main", Props::new().set("class", theme), "hello"))
    })
}

#[test]
fn app_mounts_by_selector_with_plugin_context() {
    let (host, root) = host_with_root();
    let mut app = themed_app();
    app.use_plugin(ThemePlugin);

    let handle = app.mount(host.clone(), "#app").expect("mount");

    assert!(app.is_mounted());
    assert_eq!(handle.container(), root);
    assert_eq!(
        host.borrow().inner_html(root),
        r#"<main class="dark">hello</main>"#
    );
}

#[test]
fn app_without_provider_sees_no_context() {
    let (host, root) = host_with_root();
    let mut app = themed_app();
    app.mount(host.clone(), "#app").expect("mount");
    assert_eq!(
        host.borrow().inner_html(root),
        r#"<main class="none">hello</main>"#
    );
}

#[test]
fn app_missing_container_is_an_error() {
    let (host, _root) = host_with_root();
    let mut app = themed_app();

    let err = app.mount(host.clone(), "#nowhere").unwrap_err();

    assert_eq!(
        err,
        RuntimeError::ContainerNotFound {
            selector: "#nowhere".to_string()
        }
    );
    assert!(!app.is_mounted());
    assert!(host.borrow().journal().is_empty());
}

#[test]
fn app_rejects_second_mount_and_allows_remount() {
    let (host, root) = host_with_root();
    let mut app = themed_app();
    let first = app.mount(host.clone(), "#app").expect("mount");

    assert_eq!(
        app.mount(host.clone(), "#app").unwrap_err(),
        RuntimeError::AlreadyMounted
    );

    app.unmount();
    assert_eq!(first.phase(), Phase::Unmounted);
    assert_eq!(host.borrow().inner_html(root), "");

    let second = app.mount(host.clone(), "#app").expect("remount");
    assert_ne!(first.id(), second.id());
    assert_eq!(host.borrow().text_content(root), "hello");
}

#[test]
fn app_surfaces_first_render_failure() {
    let (host, _root) = host_with_root();
    let mut app = App::new(|| || Err::<VNodeRef, _>(RenderError::new("cold start")))
        .with_options(MountOptions::new().with_name("Root").on_error(|_| {}));

    let err = app.mount(host, "#app").unwrap_err();

    assert_eq!(
        err,
        RuntimeError::Render(RenderError::new("cold start").in_component("Root"))
    );
    assert!(!app.is_mounted());
}
