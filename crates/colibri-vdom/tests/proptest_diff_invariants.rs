//! Property-based invariant tests for the keyed reconciler.
//!
//! These tests verify invariants of `diff` + `commit` that must hold for
//! **any** pair of child lists:
//!
//! 1. Identical snapshots produce zero operations.
//! 2. After commit, the host children appear in the new order.
//! 3. Nodes whose key survives keep their host node (no remount).
//! 4. A pure permutation never creates or removes, and moves exactly
//!    `n - LIS` nodes.
//! 5. Unkeyed lists converge positionally.
//! 6. Label-only changes produce only `SetText`.

use std::collections::HashMap;

use colibri_harness::MemoryHost;
use colibri_vdom::{
    DiffOptions, EditKind, EditOp, HostNode, Props, Reconciler, VNodeRef, commit, h,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn reconciler() -> Reconciler {
    Reconciler::with_options(DiffOptions::default().with_checked(true))
}

/// Unique keys in random order.
fn keys() -> impl Strategy<Value = Vec<u32>> {
    proptest::sample::subsequence((0u32..24).collect::<Vec<_>>(), 0..=24).prop_shuffle()
}

fn labelled(keys: &[u32], label: &str) -> VNodeRef {
    let items: Vec<VNodeRef> = keys
        .iter()
        .map(|k| h("li", Props::new().key(*k), format!("{label} {k}")))
        .collect();
    h("ul", Props::new(), items)
}

fn list(keys: &[u32]) -> VNodeRef {
    labelled(keys, "item")
}

fn mount(tree: &VNodeRef) -> (MemoryHost, HostNode) {
    let mut host = MemoryHost::new();
    let root = host.create_container("app");
    let ops = reconciler().diff(None, tree, root).expect("diff");
    commit(&mut host, ops).expect("commit");
    host.clear_journal();
    (host, root)
}

fn update(host: &mut MemoryHost, root: HostNode, old: &VNodeRef, new: &VNodeRef) -> Vec<EditKind> {
    let ops: Vec<EditOp> = reconciler().diff(Some(old), new, root).expect("diff");
    let kinds = ops.iter().map(EditOp::kind).collect();
    commit(host, ops).expect("commit");
    kinds
}

fn rendered(host: &MemoryHost, root: HostNode) -> Vec<String> {
    let ul = host.children(root)[0];
    host.children(ul)
        .iter()
        .map(|li| host.text_content(*li))
        .collect()
}

fn expected(keys: &[u32], label: &str) -> Vec<String> {
    keys.iter().map(|k| format!("{label} {k}")).collect()
}

fn count(kinds: &[EditKind], kind: EditKind) -> usize {
    kinds.iter().filter(|k| **k == kind).count()
}

/// Reference O(n²) LIS length.
fn lis_len(seq: &[usize]) -> usize {
    let mut best = vec![1usize; seq.len()];
    for i in 0..seq.len() {
        for j in 0..i {
            if seq[j] < seq[i] {
                best[i] = best[i].max(best[j] + 1);
            }
        }
    }
    best.into_iter().max().unwrap_or(0)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Identical snapshots produce zero operations
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn identical_lists_produce_no_ops(order in keys()) {
        let old = list(&order);
        let (mut host, root) = mount(&old);
        let kinds = update(&mut host, root, &old, &list(&order));
        prop_assert!(kinds.is_empty(), "expected no ops, got {:?}", kinds);
        prop_assert!(host.journal().is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2 + 3. Order converges and surviving keys keep their host node
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn any_update_converges(before in keys(), after in keys()) {
        let old = list(&before);
        let (mut host, root) = mount(&old);
        let identity: HashMap<u32, HostNode> = before
            .iter()
            .zip(old.children()[..].iter())
            .filter_map(|(k, node)| node.host().map(|h| (*k, h)))
            .collect();

        let new = list(&after);
        update(&mut host, root, &old, &new);

        prop_assert_eq!(rendered(&host, root), expected(&after, "item"));
        for (k, node) in after.iter().zip(new.children()) {
            if let Some(previous) = identity.get(k) {
                prop_assert_eq!(node.host(), Some(*previous), "key {} was remounted", k);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Permutations move exactly n - LIS nodes
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn permutation_moves_outside_lis(order in keys(), seed in any::<u64>()) {
        let mut shuffled = order.clone();
        // Deterministic rotation plus swap driven by the seed.
        if !shuffled.is_empty() {
            let n = shuffled.len();
            shuffled.rotate_left((seed as usize) % n);
            shuffled.swap(0, (seed as usize / 7) % n);
        }

        let old = list(&order);
        let (mut host, root) = mount(&old);
        let kinds = update(&mut host, root, &old, &list(&shuffled));

        let old_index: HashMap<u32, usize> =
            order.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        let sources: Vec<usize> = shuffled.iter().map(|k| old_index[k]).collect();

        prop_assert_eq!(count(&kinds, EditKind::Create), 0);
        prop_assert_eq!(count(&kinds, EditKind::Remove), 0);
        prop_assert_eq!(count(&kinds, EditKind::Move), shuffled.len() - lis_len(&sources));
        prop_assert_eq!(rendered(&host, root), expected(&shuffled, "item"));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Unkeyed lists converge positionally
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unkeyed_lists_converge(
        before in proptest::collection::vec("[a-z]{1,4}", 0..16),
        after in proptest::collection::vec("[a-z]{1,4}", 0..16),
    ) {
        let render = |items: &[String]| {
            let children: Vec<VNodeRef> =
                items.iter().map(|s| h("li", Props::new(), s.clone())).collect();
            h("ul", Props::new(), children)
        };
        let old = render(&before);
        let (mut host, root) = mount(&old);
        let kinds = update(&mut host, root, &old, &render(&after));

        prop_assert_eq!(rendered(&host, root), after.clone());
        prop_assert_eq!(count(&kinds, EditKind::Move), 0);
        prop_assert_eq!(
            count(&kinds, EditKind::Create),
            after.len().saturating_sub(before.len())
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Label-only changes are text edits
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn relabel_is_set_text_only(order in keys()) {
        let old = labelled(&order, "old");
        let (mut host, root) = mount(&old);
        let kinds = update(&mut host, root, &old, &labelled(&order, "new"));

        prop_assert_eq!(kinds.len(), order.len());
        prop_assert!(kinds.iter().all(|k| *k == EditKind::SetText));
        prop_assert_eq!(host.count("set_text"), order.len());
        prop_assert_eq!(rendered(&host, root), expected(&order, "new"));
    }
}
