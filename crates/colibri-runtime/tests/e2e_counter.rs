//! End-to-end tests: components mounted into a [`MemoryHost`], driven by
//! dispatched events and explicit flushes.
//!
//! Each test runs on its own thread, so the reactive runtime and the
//! instance stack start empty.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use colibri_harness::{HostCall, MemoryHost};
use colibri_reactive::{Ref, flush, live_nodes, pending_effects};
use colibri_runtime::{
    MountHandle, MountOptions, Phase, RenderError, mount, mount_component, use_callback,
    use_effect, use_memo, use_state,
};
use colibri_vdom::{HostNode, Props, VNodeRef, h};

// ── Helpers ─────────────────────────────────────────────────────────────

type Host = Rc<RefCell<MemoryHost>>;

fn host_with_root() -> (Host, HostNode) {
    let host = MemoryHost::shared();
    let root = host.borrow_mut().create_container("app");
    (host, root)
}

fn first(host: &Host, selector: &str) -> HostNode {
    host.borrow()
        .query_all(selector)
        .first()
        .copied()
        .unwrap_or_else(|| panic!("no node matches {selector}"))
}

/// A counter: `<div><span id="value">N</span><button>+</button></div>`.
fn counter(host: &Host, root: HostNode) -> MountHandle {
    mount_component(
        host.clone(),
        root,
        MountOptions::new().with_name("Counter"),
        || {
            let (count, set) = use_state(0u32);
            let increment = use_callback(move |_| set.update(|n| *n += 1));
            move || {
                Ok::<_, RenderError>(h(
                    "div",
                    Props::new(),
                    vec![
                        h("span", Props::new().set("id", "value"), count.get().to_string()),
                        h("button", Props::new().on_handler("click", increment.clone()), "+"),
                    ],
                ))
            }
        },
    )
}

// ── Counter ─────────────────────────────────────────────────────────────

#[test]
fn counter_renders_initial_state() {
    let (host, root) = host_with_root();
    let handle = counter(&host, root);

    assert_eq!(handle.phase(), Phase::Mounted);
    assert_eq!(handle.name(), "Counter");
    assert_eq!(handle.render_count(), 1);
    assert_eq!(
        host.borrow().inner_html(root),
        r#"<div><span id="value">0</span><button>+</button></div>"#
    );
}

#[test]
fn click_updates_only_the_text_node() {
    let (host, root) = host_with_root();
    let handle = counter(&host, root);
    let button = first(&host, "button");
    let label = host.borrow().children(first(&host, "#value"))[0];
    host.borrow_mut().clear_journal();

    assert!(MemoryHost::click(&host, button));

    assert_eq!(
        host.borrow().journal(),
        &[HostCall::SetText {
            node: label,
            content: "1".to_string(),
        }]
    );
    assert_eq!(handle.render_count(), 2);
    assert_eq!(host.borrow().text_content(root), "1+");
}

#[test]
fn repeated_clicks_between_flushes_render_once_each() {
    let (host, root) = host_with_root();
    let handle = counter(&host, root);
    let button = first(&host, "button");

    for _ in 0..3 {
        MemoryHost::click(&host, button);
    }

    assert_eq!(handle.render_count(), 4);
    assert_eq!(host.borrow().text_content(first(&host, "#value")), "3");
}

#[test]
fn writing_the_same_value_does_not_rerender() {
    let (host, root) = host_with_root();
    let count = Ref::new(7);
    let c = count.clone();
    let handle = mount(host.clone(), root, move || {
        Ok::<_, RenderError>(h("p", Props::new(), c.get().to_string()))
    });
    host.borrow_mut().clear_journal();

    count.set(7);
    assert_eq!(pending_effects(), 0);
    flush();

    assert_eq!(handle.render_count(), 1);
    assert!(host.borrow().journal().is_empty());
}

#[test]
fn writes_wait_for_flush() {
    let (host, root) = host_with_root();
    let count = Ref::new(0);
    let c = count.clone();
    let _handle = mount(host.clone(), root, move || {
        Ok::<_, RenderError>(h("p", Props::new(), c.get().to_string()))
    });

    count.set(1);
    count.set(2);
    assert_eq!(host.borrow().inner_html(root), "<p>0</p>");
    assert_eq!(pending_effects(), 1);

    let stats = flush();
    assert_eq!(stats.runs, 1);
    assert_eq!(host.borrow().inner_html(root), "<p>2</p>");
}

// ── Keyed lists ─────────────────────────────────────────────────────────

fn list(items: &[u32]) -> VNodeRef {
    let rows: Vec<VNodeRef> = items
        .iter()
        .map(|id| h("li", Props::new().key(*id), format!("item {id}")))
        .collect();
    h("ul", Props::new(), rows)
}

#[test]
fn rotating_a_keyed_list_moves_one_node() {
    let (host, root) = host_with_root();
    let items = Ref::new(vec![1u32, 2, 3, 4, 5]);
    let source = items.clone();
    let _handle = mount(host.clone(), root, move || {
        Ok::<_, RenderError>(source.with(|items| list(items)))
    });
    let before: Vec<HostNode> = host.borrow().children(first(&host, "ul")).to_vec();
    host.borrow_mut().clear_journal();

    items.set(vec![5, 1, 2, 3, 4]);
    flush();

    let host = host.borrow();
    assert_eq!(host.count("insert_before"), 1);
    assert_eq!(host.count("create_node"), 0);
    assert_eq!(host.count("remove_child"), 0);
    assert_eq!(host.journal().len(), 1);

    let ul = first_in(&host, "ul");
    let after = host.children(ul);
    assert_eq!(after[0], before[4]);
    assert_eq!(&after[1..], &before[..4]);
}

fn first_in(host: &MemoryHost, selector: &str) -> HostNode {
    host.query_all(selector)[0]
}

#[test]
fn keyed_rows_keep_their_host_nodes_across_inserts() {
    let (host, root) = host_with_root();
    let items = Ref::new(vec![1u32, 3]);
    let source = items.clone();
    let _handle = mount(host.clone(), root, move || {
        Ok::<_, RenderError>(source.with(|items| list(items)))
    });
    let before: Vec<HostNode> = host.borrow().children(first(&host, "ul")).to_vec();

    items.set(vec![1, 2, 3]);
    flush();

    let host = host.borrow();
    let after = host.children(first_in(&host, "ul")).to_vec();
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[1]);
    assert_eq!(host.text_content(after[1]), "item 2");
}

// ── Unmount ─────────────────────────────────────────────────────────────

#[test]
fn unmount_empties_container_and_releases_graph_nodes() {
    let baseline = live_nodes();
    let (host, root) = host_with_root();
    let effect_runs = Rc::new(Cell::new(0));

    let runs = Rc::clone(&effect_runs);
    let handle = mount_component(host.clone(), root, MountOptions::default(), move || {
        let (count, set) = use_state(0u32);
        let doubled = {
            let count = count.clone();
            use_memo(move || count.get() * 2)
        };
        {
            let count = count.clone();
            use_effect(move || {
                let _ = count.get();
                runs.set(runs.get() + 1);
            });
        }
        let increment = use_callback(move |_| set.update(|n| *n += 1));
        move || {
            Ok::<_, RenderError>(h(
                "button",
                Props::new().on_handler("click", increment.clone()),
                format!("{} and {}", count.get(), doubled.get()),
            ))
        }
    });
    flush();
    MemoryHost::click(&host, first(&host, "button"));
    assert_eq!(host.borrow().inner_html(root), "<button>1 and 2</button>");
    assert_eq!(effect_runs.get(), 2);
    assert!(live_nodes() > baseline);

    handle.unmount();

    assert_eq!(handle.phase(), Phase::Unmounted);
    assert!(!handle.is_mounted());
    assert_eq!(host.borrow().inner_html(root), "");
    assert_eq!(live_nodes(), baseline);
    assert_eq!(pending_effects(), 0);
    assert!(handle.subtree().is_none());
}

#[test]
fn unmount_is_idempotent() {
    let (host, root) = host_with_root();
    let handle = counter(&host, root);
    handle.unmount();
    host.borrow_mut().clear_journal();

    handle.unmount();

    assert!(host.borrow().journal().is_empty());
    assert_eq!(handle.phase(), Phase::Unmounted);
}

#[test]
fn state_written_after_unmount_schedules_nothing() {
    let (host, root) = host_with_root();
    let count = Ref::new(0);
    let c = count.clone();
    let handle = mount(host.clone(), root, move || {
        Ok::<_, RenderError>(h("p", Props::new(), c.get().to_string()))
    });
    handle.unmount();

    count.set(1);

    assert_eq!(pending_effects(), 0);
    assert_eq!(flush().runs, 0);
    assert_eq!(handle.render_count(), 1);
    assert!(handle.request_render().is_err());
}

#[test]
fn journal_serializes_one_call_per_line() {
    let (host, root) = host_with_root();
    let _handle = counter(&host, root);

    let host = host.borrow();
    let jsonl = host.journal_to_jsonl();
    let lines: Vec<serde_json::Value> = jsonl
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect();
    assert_eq!(lines.len(), host.journal().len());
    assert_eq!(lines[0]["call"], "create_node");
    assert!(
        lines
            .iter()
            .any(|line| line["call"] == "append_child" && line["parent"] == root.raw())
    );
}
