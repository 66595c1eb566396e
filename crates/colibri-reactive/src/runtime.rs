#![forbid(unsafe_code)]

//! Thread-local reactive runtime.
//!
//! The runtime owns three pieces of shared state:
//!
//! - the **graph**: a slotmap arena of [`Node`]s. Sources (`Ref`), derived
//!   values (`Computed`), effects and scopes all live here, connected by
//!   adjacency lists of [`NodeId`]s instead of pointers, so there are no
//!   reference cycles and dropping a run's edges is a pair of `retain` calls;
//! - the **observer stack**: the tracked context that reads register against,
//!   plus a parallel **owner stack** deciding which effect or scope adopts a
//!   newly registered effect;
//! - the **queue** of effects waiting for the next flush.
//!
//! # Invariants
//!
//! 1. An edge `source -> dependent` exists iff the dependent read the source
//!    during its most recent run. Edges are dropped before every rerun.
//! 2. An effect is in the queue at most once (`queued` flag).
//! 3. User closures are never invoked while the graph is borrowed; nodes that
//!    carry closures are removed from the arena first and dropped afterwards.
//! 4. A disposed effect is absent from the arena, so queued ids that no longer
//!    resolve are skipped when the flush reaches them.
//! 5. Queued work never runs inside an effect body. `flush` and `batch` called
//!    while an effect runs leave the queue for the enclosing or next flush.
//! 6. Every id with `queued` set is in the queue, including after an effect
//!    panics mid-cycle.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::config::ReactiveConfig;

new_key_type! {
    /// Stable identity of a node in the dependency graph.
    pub struct NodeId;
}

/// Role of a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A writable cell (`Ref`).
    Source,
    /// A cached derived value (`Computed`). Both a dependency and a dependent.
    Derived,
    /// A tracked side-effecting function.
    Effect,
    /// An ownership group of effects.
    Scope,
}

pub(crate) type RunFn = Rc<RefCell<dyn FnMut()>>;
pub(crate) type CleanupFn = Box<dyn FnOnce()>;

struct Node {
    kind: NodeKind,
    subscribers: SmallVec<[NodeId; 4]>,
    sources: SmallVec<[NodeId; 4]>,
    dirty: bool,
    queued: bool,
    running: bool,
    owner: Option<NodeId>,
    children: Vec<NodeId>,
    run: Option<RunFn>,
    cleanups: Vec<CleanupFn>,
}

impl Node {
    fn new(kind: NodeKind, owner: Option<NodeId>) -> Self {
        Self {
            kind,
            subscribers: SmallVec::new(),
            sources: SmallVec::new(),
            dirty: kind == NodeKind::Derived,
            queued: false,
            running: false,
            owner,
            children: Vec::new(),
            run: None,
            cleanups: Vec::new(),
        }
    }
}

type Graph = SlotMap<NodeId, Node>;

/// Counters describing one call to [`flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Number of queue generations processed.
    pub cycles: usize,
    /// Effects that actually ran.
    pub runs: usize,
    /// Queue entries dropped because their effect was disposed (or busy).
    pub skipped: usize,
    /// The cycle budget ran out and work was left queued.
    pub exhausted: bool,
}

struct Runtime {
    graph: RefCell<Graph>,
    observers: RefCell<Vec<Option<NodeId>>>,
    owners: RefCell<Vec<NodeId>>,
    queue: RefCell<Vec<NodeId>>,
    /// Ids released while the graph was borrowed; reclaimed on next access.
    released: RefCell<Vec<NodeId>>,
    effect_depth: Cell<usize>,
    flushing: Cell<bool>,
    batch_depth: Cell<usize>,
    config: Cell<ReactiveConfig>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            graph: RefCell::new(SlotMap::with_key()),
            observers: RefCell::new(Vec::new()),
            owners: RefCell::new(Vec::new()),
            queue: RefCell::new(Vec::new()),
            released: RefCell::new(Vec::new()),
            effect_depth: Cell::new(0),
            flushing: Cell::new(false),
            batch_depth: Cell::new(0),
            config: Cell::new(ReactiveConfig::default()),
        }
    }

    fn with_graph<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        let mut graph = self.graph.borrow_mut();
        let released = std::mem::take(&mut *self.released.borrow_mut());
        for id in released {
            // Source/derived nodes carry no closures, so dropping here is safe.
            let _ = unlink(&mut graph, id);
        }
        f(&mut graph)
    }

    fn schedule_locked(&self, graph: &mut Graph, id: NodeId) -> bool {
        match graph.get_mut(id) {
            Some(node) if node.kind == NodeKind::Effect && !node.queued => {
                node.queued = true;
                self.queue.borrow_mut().push(id);
                true
            }
            _ => false,
        }
    }
}

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// Remove `id` from the arena together with every edge touching it.
fn unlink(graph: &mut Graph, id: NodeId) -> Option<Node> {
    let node = graph.remove(id)?;
    for source in &node.sources {
        if let Some(source) = graph.get_mut(*source) {
            source.subscribers.retain(|s| *s != id);
        }
    }
    for dependent in &node.subscribers {
        if let Some(dependent) = graph.get_mut(*dependent) {
            dependent.sources.retain(|s| *s != id);
        }
    }
    if let Some(owner) = node.owner.and_then(|owner| graph.get_mut(owner)) {
        owner.children.retain(|c| *c != id);
    }
    Some(node)
}

fn drop_sources(graph: &mut Graph, id: NodeId, sources: &[NodeId]) {
    for source in sources {
        if let Some(source) = graph.get_mut(*source) {
            source.subscribers.retain(|s| *s != id);
        }
    }
}

// ---------------------------------------------------------------------------
// Node lifecycle
// ---------------------------------------------------------------------------

/// Allocate a source or derived node. These are never owned.
pub(crate) fn create_node(kind: NodeKind) -> NodeId {
    RUNTIME.with(|rt| rt.with_graph(|graph| graph.insert(Node::new(kind, None))))
}

/// Allocate an owned node (effect or scope) under the current owner.
fn create_owned(kind: NodeKind, run: Option<RunFn>) -> NodeId {
    RUNTIME.with(|rt| {
        let owner = rt.owners.borrow().last().copied();
        rt.with_graph(|graph| {
            let owner = owner.filter(|owner| graph.contains_key(*owner));
            let mut node = Node::new(kind, owner);
            node.run = run;
            let id = graph.insert(node);
            if let Some(owner) = owner.and_then(|owner| graph.get_mut(owner)) {
                owner.children.push(id);
            }
            id
        })
    })
}

pub(crate) fn create_scope() -> NodeId {
    create_owned(NodeKind::Scope, None)
}

/// Register an effect. The first run happens now, unless `defer` is set or an
/// effect is currently running; then it waits for the next flush cycle.
pub(crate) fn create_effect(run: RunFn, defer: bool) -> NodeId {
    let id = create_owned(NodeKind::Effect, Some(run));
    let inside_run = RUNTIME.with(|rt| rt.effect_depth.get() > 0);
    if defer || inside_run {
        schedule(id);
    } else {
        run_effect(id);
    }
    id
}

/// Release a source or derived node whose last handle was dropped.
pub(crate) fn release(id: NodeId) {
    let _ = RUNTIME.try_with(|rt| match rt.graph.try_borrow_mut() {
        Ok(mut graph) => {
            let _ = unlink(&mut graph, id);
        }
        Err(_) => rt.released.borrow_mut().push(id),
    });
}

/// Dispose an effect or scope and everything it owns.
///
/// Cleanups run after the graph borrow is released, children before parents.
/// Returns `false` if the node was already gone.
pub(crate) fn dispose(id: NodeId) -> bool {
    let mut removed = RUNTIME.with(|rt| {
        rt.with_graph(|graph| {
            let mut removed = Vec::new();
            let mut stack = vec![id];
            while let Some(next) = stack.pop() {
                if let Some(node) = unlink(graph, next) {
                    stack.extend(node.children.iter().copied());
                    removed.push(node);
                }
            }
            removed
        })
    });
    if removed.is_empty() {
        return false;
    }
    tracing::trace!(message = "reactive.dispose", nodes = removed.len());
    for node in removed.iter_mut().rev() {
        for cleanup in std::mem::take(&mut node.cleanups) {
            cleanup();
        }
    }
    drop(removed);
    true
}

pub(crate) fn contains(id: NodeId) -> bool {
    RUNTIME.with(|rt| rt.with_graph(|graph| graph.contains_key(id)))
}

pub(crate) fn subscriber_count(id: NodeId) -> usize {
    RUNTIME.with(|rt| rt.with_graph(|graph| graph.get(id).map_or(0, |n| n.subscribers.len())))
}

pub(crate) fn source_count(id: NodeId) -> usize {
    RUNTIME.with(|rt| rt.with_graph(|graph| graph.get(id).map_or(0, |n| n.sources.len())))
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Pops the observer (and owner, for effects) pushed by a tracked run.
struct RunGuard {
    id: Option<NodeId>,
    owner: bool,
    effect: bool,
}

impl RunGuard {
    fn observe(id: Option<NodeId>) -> Self {
        RUNTIME.with(|rt| rt.observers.borrow_mut().push(id));
        Self {
            id,
            owner: false,
            effect: false,
        }
    }

    fn effect(id: NodeId) -> Self {
        RUNTIME.with(|rt| {
            rt.observers.borrow_mut().push(Some(id));
            rt.owners.borrow_mut().push(id);
            rt.effect_depth.set(rt.effect_depth.get() + 1);
        });
        Self {
            id: Some(id),
            owner: true,
            effect: true,
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|rt| {
            rt.observers.borrow_mut().pop();
            if self.owner {
                rt.owners.borrow_mut().pop();
            }
            if self.effect {
                rt.effect_depth.set(rt.effect_depth.get().saturating_sub(1));
                if let Some(id) = self.id {
                    rt.with_graph(|graph| {
                        if let Some(node) = graph.get_mut(id) {
                            node.running = false;
                        }
                    });
                }
            }
        });
    }
}

/// Pushes an owner without touching tracking (used by `Scope::run`).
pub(crate) struct OwnerGuard;

impl OwnerGuard {
    pub(crate) fn push(id: NodeId) -> Self {
        RUNTIME.with(|rt| rt.owners.borrow_mut().push(id));
        Self
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|rt| rt.owners.borrow_mut().pop());
    }
}

/// Record that the active observer read `source`.
pub(crate) fn track(source: NodeId) {
    RUNTIME.with(|rt| {
        let Some(observer) = rt.observers.borrow().last().copied().flatten() else {
            return;
        };
        if observer == source {
            return;
        }
        rt.with_graph(|graph| {
            if !graph.contains_key(observer) {
                return;
            }
            let Some(node) = graph.get_mut(source) else {
                return;
            };
            if !node.subscribers.contains(&observer) {
                node.subscribers.push(observer);
            }
            if let Some(observer) = graph.get_mut(observer)
                && !observer.sources.contains(&source)
            {
                observer.sources.push(source);
            }
        });
    });
}

/// Run `f` with no active observer.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _guard = RunGuard::observe(None);
    f()
}

/// Whether `id` is a derived node whose cache is stale.
pub(crate) fn is_dirty(id: NodeId) -> bool {
    RUNTIME.with(|rt| rt.with_graph(|graph| graph.get(id).is_some_and(|n| n.dirty)))
}

/// Re-run a derived node's getter, rebuilding its edges.
///
/// The dirty flag is cleared only after `compute` returns, so a panicking
/// getter leaves the node dirty for the next read to retry.
pub(crate) fn recompute<T>(id: NodeId, compute: impl FnOnce() -> T) -> T {
    RUNTIME.with(|rt| {
        rt.with_graph(|graph| {
            if let Some(node) = graph.get_mut(id) {
                let sources = std::mem::take(&mut node.sources);
                drop_sources(graph, id, &sources);
            }
        })
    });
    let value = {
        let _guard = RunGuard::observe(Some(id));
        compute()
    };
    RUNTIME.with(|rt| {
        rt.with_graph(|graph| {
            if let Some(node) = graph.get_mut(id) {
                node.dirty = false;
            }
        })
    });
    value
}

// ---------------------------------------------------------------------------
// Triggering and scheduling
// ---------------------------------------------------------------------------

/// Notify everything downstream of `source` that it changed.
///
/// Derived nodes are marked dirty (propagating further only on the clean to
/// dirty transition); effects are queued.
pub(crate) fn trigger(source: NodeId) {
    RUNTIME.with(|rt| {
        rt.with_graph(|graph| {
            let mut pending: SmallVec<[NodeId; 8]> = SmallVec::new();
            // Reversed so popping visits subscribers in registration order.
            if let Some(node) = graph.get(source) {
                pending.extend(node.subscribers.iter().rev().copied());
            }
            let mut scheduled = 0usize;
            while let Some(id) = pending.pop() {
                let Some(kind) = graph.get(id).map(|n| n.kind) else {
                    continue;
                };
                match kind {
                    NodeKind::Derived => {
                        let Some(node) = graph.get_mut(id) else {
                            continue;
                        };
                        if !node.dirty {
                            node.dirty = true;
                            pending.extend(node.subscribers.iter().rev().copied());
                        }
                    }
                    NodeKind::Effect => {
                        if rt.schedule_locked(graph, id) {
                            scheduled += 1;
                        }
                    }
                    _ => {}
                }
            }
            tracing::trace!(message = "reactive.trigger", source = ?source, scheduled);
        })
    });
}

/// Mark a derived node dirty and notify its dependents.
pub(crate) fn invalidate(id: NodeId) {
    RUNTIME.with(|rt| {
        rt.with_graph(|graph| {
            if let Some(node) = graph.get_mut(id) {
                node.dirty = true;
            }
        })
    });
    trigger(id);
}

/// Queue an effect for the next flush cycle. Returns `false` if it is gone.
pub(crate) fn schedule(id: NodeId) -> bool {
    RUNTIME.with(|rt| {
        rt.with_graph(|graph| {
            if !graph.contains_key(id) {
                return false;
            }
            rt.schedule_locked(graph, id);
            true
        })
    })
}

/// Run one effect now. Returns `false` if it was disposed or already running.
pub(crate) fn run_effect(id: NodeId) -> bool {
    let prepared = RUNTIME.with(|rt| {
        rt.with_graph(|graph| {
            let node = graph.get_mut(id)?;
            node.queued = false;
            let running = node.running;
            if running {
                // Self-trigger mid-run: defer to the next cycle instead of
                // re-entering the closure.
                rt.schedule_locked(graph, id);
                return None;
            }
            let node = graph.get_mut(id)?;
            let run = node.run.clone()?;
            node.running = true;
            let sources = std::mem::take(&mut node.sources);
            let children = std::mem::take(&mut node.children);
            let cleanups = std::mem::take(&mut node.cleanups);
            drop_sources(graph, id, &sources);
            Some((run, children, cleanups))
        })
    });
    let Some((run, children, cleanups)) = prepared else {
        return false;
    };

    for child in children {
        dispose(child);
    }
    for cleanup in cleanups {
        cleanup();
    }

    let _guard = RunGuard::effect(id);
    match run.try_borrow_mut() {
        Ok(mut body) => {
            (*body)();
            true
        }
        Err(_) => {
            tracing::warn!(message = "reactive.effect.reentrant", effect = ?id);
            false
        }
    }
}

/// Register a cleanup on the current owner. Returns `false` outside any owner.
pub(crate) fn add_cleanup(cleanup: CleanupFn) -> bool {
    RUNTIME.with(|rt| {
        let Some(owner) = rt.owners.borrow().last().copied() else {
            return false;
        };
        rt.with_graph(|graph| match graph.get_mut(owner) {
            Some(node) => {
                node.cleanups.push(cleanup);
                true
            }
            None => false,
        })
    })
}

// ---------------------------------------------------------------------------
// Flush
// ---------------------------------------------------------------------------

struct FlushGuard;

/// The unprocessed tail of one flush cycle. If an effect panics, the tail is
/// put back at the front of the queue so its `queued` flags stay truthful.
struct CycleGuard {
    rest: std::vec::IntoIter<NodeId>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        let rest: Vec<NodeId> = self.rest.by_ref().collect();
        if rest.is_empty() {
            return;
        }
        let _ = RUNTIME.try_with(|rt| {
            let mut queue = rt.queue.borrow_mut();
            let later = std::mem::replace(&mut *queue, rest);
            queue.extend(later);
        });
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|rt| rt.flushing.set(false));
    }
}

/// Run every queued effect.
///
/// Effects run in first-scheduled order. Effects queued while a cycle runs
/// form the next cycle. Each entry is re-checked for disposal immediately
/// before it runs. Calling `flush` from inside a flush, or from inside any
/// running effect, is a no-op: the work waits until that effect returns.
pub fn flush() -> FlushStats {
    RUNTIME.with(|rt| {
        if rt.effect_depth.get() > 0 {
            tracing::trace!(message = "reactive.flush.deferred", pending = rt.queue.borrow().len());
            return FlushStats::default();
        }
        if rt.flushing.replace(true) {
            return FlushStats::default();
        }
        let _guard = FlushGuard;
        let max_cycles = rt.config.get().max_flush_cycles;
        let mut stats = FlushStats::default();

        let span = tracing::debug_span!(
            "reactive.flush",
            cycles = tracing::field::Empty,
            runs = tracing::field::Empty
        );
        let _enter = span.enter();

        loop {
            let pending = std::mem::take(&mut *rt.queue.borrow_mut());
            if pending.is_empty() {
                break;
            }
            if stats.cycles >= max_cycles {
                let mut queue = rt.queue.borrow_mut();
                let later = std::mem::replace(&mut *queue, pending);
                queue.extend(later);
                stats.exhausted = true;
                tracing::warn!(
                    message = "reactive.flush.exhausted",
                    max_cycles,
                    pending = queue.len()
                );
                break;
            }
            stats.cycles += 1;
            let mut cycle = CycleGuard {
                rest: pending.into_iter(),
            };
            while let Some(id) = cycle.rest.next() {
                if run_effect(id) {
                    stats.runs += 1;
                } else {
                    stats.skipped += 1;
                }
            }
        }

        span.record("cycles", stats.cycles);
        span.record("runs", stats.runs);
        stats
    })
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|rt| rt.batch_depth.set(rt.batch_depth.get().saturating_sub(1)));
    }
}

/// Run `f` as one synchronous burst; flush when the outermost batch returns.
///
/// Inside a running effect the burst is still coalesced, but the flush is
/// left to whoever runs that effect.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    RUNTIME.with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
    let result = {
        let _guard = BatchGuard;
        f()
    };
    let outermost = RUNTIME.with(|rt| {
        rt.batch_depth.get() == 0 && !rt.flushing.get() && rt.effect_depth.get() == 0
    });
    if outermost {
        flush();
    }
    result
}

// ---------------------------------------------------------------------------
// Configuration and diagnostics
// ---------------------------------------------------------------------------

/// Install the runtime configuration for the current thread.
pub fn configure(config: ReactiveConfig) {
    RUNTIME.with(|rt| rt.config.set(config));
}

/// The configuration active on the current thread.
#[must_use]
pub fn current_config() -> ReactiveConfig {
    RUNTIME.with(|rt| rt.config.get())
}

/// Number of effects waiting for the next flush.
#[must_use]
pub fn pending_effects() -> usize {
    RUNTIME.with(|rt| rt.queue.borrow().len())
}

/// Number of live graph nodes on this thread.
#[must_use]
pub fn live_nodes() -> usize {
    RUNTIME.with(|rt| rt.with_graph(|graph| graph.len()))
}

/// Whether a flush is in progress on this thread.
#[must_use]
pub fn is_flushing() -> bool {
    RUNTIME.with(|rt| rt.flushing.get())
}
