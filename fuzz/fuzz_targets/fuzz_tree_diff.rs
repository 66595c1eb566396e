#![no_main]

use arbitrary::Arbitrary;
use colibri_harness::MemoryHost;
use colibri_vdom::{DiffOptions, Props, Reconciler, VNodeRef, commit, fragment, h, text};
use libfuzzer_sys::fuzz_target;

/// A small arbitrary tree, bounded in depth when converted.
#[derive(Arbitrary, Debug)]
enum Shape {
    Text(u8),
    Element { tag: u8, key: Option<u8>, children: Vec<Shape> },
    Fragment(Vec<Shape>),
}

const TAGS: [&str; 3] = ["div", "span", "p"];

fn build(shape: &Shape, depth: usize) -> VNodeRef {
    match shape {
        Shape::Text(n) => text(format!("t{n}")),
        _ if depth > 4 => text("leaf"),
        Shape::Element { tag, key, children } => {
            let mut props = Props::new().set("data-n", i64::from(*tag));
            if let Some(key) = key {
                props = props.key(format!("{key}"));
            }
            let kids: Vec<VNodeRef> = children.iter().take(8).map(|c| build(c, depth + 1)).collect();
            h(TAGS[usize::from(*tag) % TAGS.len()], props, kids)
        }
        Shape::Fragment(children) => {
            let kids: Vec<VNodeRef> = children.iter().take(8).map(|c| build(c, depth + 1)).collect();
            fragment(kids)
        }
    }
}

fuzz_target!(|input: (Shape, Shape)| {
    let (before, after) = input;
    // Duplicate sibling keys are allowed; unchecked mode falls back to
    // positional diffing for them.
    let reconciler = Reconciler::with_options(DiffOptions::default().with_checked(false));
    let mut host = MemoryHost::new();
    let root = host.create_container("root");

    let old = h("main", Props::new(), build(&before, 0));
    let ops = reconciler.diff(None, &old, root).expect("initial diff");
    commit(&mut host, ops).expect("initial commit");

    let new = h("main", Props::new(), build(&after, 0));
    let ops = reconciler.diff(Some(&old), &new, root).expect("unchecked diff");
    commit(&mut host, ops).expect("update commit");

    let mut fresh = MemoryHost::new();
    let fresh_root = fresh.create_container("root");
    let ops = reconciler.diff(None, &new, fresh_root).expect("fresh diff");
    commit(&mut fresh, ops).expect("fresh commit");

    assert_eq!(host.inner_html(root), fresh.inner_html(fresh_root));
});
