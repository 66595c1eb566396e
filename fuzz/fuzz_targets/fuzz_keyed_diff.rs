#![no_main]

use colibri_harness::MemoryHost;
use colibri_vdom::{DiffOptions, Props, Reconciler, VNodeRef, commit, h};
use libfuzzer_sys::fuzz_target;

fn list(keys: &[u8]) -> VNodeRef {
    let mut seen = [false; 256];
    let rows: Vec<VNodeRef> = keys
        .iter()
        .filter(|k| !std::mem::replace(&mut seen[usize::from(**k)], true))
        .map(|k| h("li", Props::new().key(u32::from(*k)), format!("{k}")))
        .collect();
    h("ul", Props::new(), rows)
}

fn labels(host: &MemoryHost, ul: colibri_vdom::HostNode) -> Vec<String> {
    host.children(ul)
        .iter()
        .map(|li| host.text_content(*li))
        .collect()
}

fuzz_target!(|input: (Vec<u8>, Vec<u8>)| {
    let (before, after) = input;
    if before.len() > 256 || after.len() > 256 {
        return;
    }
    let reconciler = Reconciler::with_options(DiffOptions::default().with_checked(true));
    let mut host = MemoryHost::new();
    let root = host.create_container("root");

    let old = list(&before);
    let ops = reconciler.diff(None, &old, root).expect("initial diff");
    commit(&mut host, ops).expect("initial commit");

    let new = list(&after);
    let ops = reconciler.diff(Some(&old), &new, root).expect("unique keys");
    commit(&mut host, ops).expect("update commit");

    let ul = new.host().expect("root committed");
    let expected: Vec<String> = new
        .children()
        .iter()
        .map(|li| li.children()[0].text().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(labels(&host, ul), expected);
});
