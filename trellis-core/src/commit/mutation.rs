//! Mutation effects.

use std::rc::Rc;

use tracing::{error, trace};

use super::RefOps;
use crate::error::{ReconcilerError, UsageError};
use crate::fiber::{FiberArena, FiberId, FiberUpdateQueue, Flags, OffscreenMode, StateNode, WorkTag};
use crate::hooks::EffectRecord;
use crate::host::{HostAdapter, HostNodeId, HostUpdate};
use crate::root::FiberRoot;

/// Counts reported by the commit log.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct MutationStats {
    pub placements: usize,
    pub updates: usize,
    pub deletions: usize,
}

const COMMIT_MASK: Flags = Flags::MUTATION_MASK
    .union(Flags::PASSIVE_MASK)
    .union(Flags::LAYOUT_MASK);

/// Walk the finished tree depth-first, descending only into subtrees that
/// carry commit flags, and apply each node's effects on the way up.
pub(super) fn commit_mutation_effects(
    root: &mut FiberRoot,
    host: &mut dyn HostAdapter,
    finished: FiberId,
    refs: &mut RefOps,
) -> MutationStats {
    let mut stats = MutationStats::default();
    let mut next = Some(finished);

    while let Some(id) = next {
        let node = &root.arena[id];
        if node.subtree_flags.intersects(COMMIT_MASK) {
            if let Some(child) = node.child {
                root.arena[child].return_fiber = Some(id);
                next = Some(child);
                continue;
            }
        }

        let mut cursor = Some(id);
        next = None;
        while let Some(id) = cursor {
            commit_mutation_effects_on_fiber(root, host, id, refs, &mut stats);
            if let Some(sibling) = root.arena[id].sibling {
                let parent = root.arena[id].return_fiber;
                root.arena[sibling].return_fiber = parent;
                next = Some(sibling);
                break;
            }
            cursor = root.arena[id].return_fiber;
        }
    }

    stats
}

fn commit_mutation_effects_on_fiber(
    root: &mut FiberRoot,
    host: &mut dyn HostAdapter,
    id: FiberId,
    refs: &mut RefOps,
    stats: &mut MutationStats,
) {
    let flags = root.arena[id].flags;

    if flags.contains(Flags::PLACEMENT) {
        commit_placement(root, host, id);
        stats.placements += 1;
    }

    if flags.contains(Flags::UPDATE) {
        commit_update(&root.arena, host, id);
        stats.updates += 1;
    }

    if flags.contains(Flags::CHILD_DELETION) {
        let deletions = std::mem::take(&mut root.arena[id].deletions);
        for deleted in deletions {
            if let Some(node) = root.arena.get_mut(deleted) {
                node.return_fiber = Some(id);
            }
            commit_deletion(root, host, deleted, refs);
            stats.deletions += 1;
        }
    }

    if flags.contains(Flags::PASSIVE_EFFECT) {
        if let FiberUpdateQueue::Effects(effects) = &root.arena[id].update_queue {
            root.pending_passive_effects.update.push(Rc::clone(effects));
        }
    }

    if flags.contains(Flags::REF) {
        commit_ref(&root.arena, id, refs);
    }

    if flags.contains(Flags::VISIBILITY) {
        // A hidden wrapper is not begun, so its new mode is only in the
        // pending props.
        let hidden = root.arena[id].pending_props.offscreen_mode() == Some(OffscreenMode::Hidden);
        hide_or_unhide_all_children(&root.arena, host, id, hidden);
    }

    let node = &mut root.arena[id];
    node.flags.remove(COMMIT_MASK);
    node.subtree_flags = Flags::NONE;
}

fn commit_update(arena: &FiberArena, host: &mut dyn HostAdapter, id: FiberId) {
    let node = &arena[id];
    let Some(instance) = node.state_node.host() else {
        return;
    };
    match node.tag {
        WorkTag::HostComponent => {
            if let Some(props) = node.memoized_props.as_props() {
                let tag = node.host_tag().unwrap_or_default();
                host.commit_update(HostUpdate::Instance { instance, tag, props });
            }
        }
        WorkTag::HostText => {
            let content = node.memoized_props.text().unwrap_or_default();
            host.commit_update(HostUpdate::Text { instance, content });
        }
        _ => {}
    }
}

/// Detach the ref the committed copy held. The new one is attached once the
/// tree is swapped.
fn commit_ref(arena: &FiberArena, id: FiberId, refs: &mut RefOps) {
    let node = &arena[id];
    let current = node.alternate.and_then(|alt| arena.get(alt));
    if let Some(old) = current.and_then(|current| current.node_ref.clone()) {
        refs.detach.push(old);
    }
    if let (Some(node_ref), Some(instance)) = (&node.node_ref, node.state_node.host()) {
        refs.attach.push((node_ref.clone(), instance));
    }
}

fn is_host_parent(arena: &FiberArena, id: FiberId) -> bool {
    matches!(arena[id].tag, WorkTag::HostComponent | WorkTag::HostRoot)
}

/// Host instance (or container) the host content of `id` lives in.
fn get_host_parent(arena: &FiberArena, id: FiberId) -> Option<HostNodeId> {
    let mut parent = arena[id].return_fiber;
    while let Some(p) = parent {
        let node = arena.get(p)?;
        match (node.tag, node.state_node) {
            (WorkTag::HostComponent, StateNode::Host(instance)) => return Some(instance),
            (WorkTag::HostRoot, StateNode::Root(container)) => return Some(container),
            _ => parent = node.return_fiber,
        }
    }
    None
}

/// The first host node after `id` that is already in place, to insert
/// before. `None` means append.
///
/// Return links of the nodes it descends into are repaired on the way, so
/// climbing back out never lands on a stale copy.
fn get_host_sibling(arena: &mut FiberArena, id: FiberId) -> Option<HostNodeId> {
    let mut node = id;

    'siblings: loop {
        let sibling = loop {
            if let Some(sibling) = arena[node].sibling {
                break sibling;
            }
            match arena[node].return_fiber {
                Some(parent) if !is_host_parent(arena, parent) => node = parent,
                _ => return None,
            }
        };
        node = sibling;

        while !arena[node].tag.is_host() {
            // A moving node has no stable position yet.
            if arena[node].flags.contains(Flags::PLACEMENT) {
                continue 'siblings;
            }
            match arena[node].child {
                Some(child) => {
                    arena[child].return_fiber = Some(node);
                    node = child;
                }
                None => continue 'siblings,
            }
        }

        if !arena[node].flags.contains(Flags::PLACEMENT) {
            if let Some(instance) = arena[node].state_node.host() {
                return Some(instance);
            }
        }
    }
}

fn commit_placement(root: &mut FiberRoot, host: &mut dyn HostAdapter, id: FiberId) {
    let Some(parent) = get_host_parent(&root.arena, id) else {
        error!(fiber = ?id, "placement without a host parent");
        root.error = Some(ReconcilerError::Usage(UsageError::HostParentNotFound { fiber: id }));
        return;
    };
    let before = get_host_sibling(&mut root.arena, id);
    trace!(fiber = ?id, ?parent, ?before, "placing");
    insert_or_append_placement_node(&root.arena, host, id, parent, before);
}

fn insert_or_append_placement_node(
    arena: &FiberArena,
    host: &mut dyn HostAdapter,
    id: FiberId,
    parent: HostNodeId,
    before: Option<HostNodeId>,
) {
    let node = &arena[id];
    if node.tag.is_host() {
        if let Some(instance) = node.state_node.host() {
            match before {
                Some(before) => host.insert_child_to_container(instance, parent, before),
                None => host.append_child_to_container(parent, instance),
            }
        }
        return;
    }

    let mut child = node.child;
    while let Some(id) = child {
        insert_or_append_placement_node(arena, host, id, parent, before);
        child = arena[id].sibling;
    }
}

/// Host nodes at the top of the subtree rooted at `id`, in tree order.
/// Nodes below another host node are reached through their parent instance.
fn top_host_nodes(arena: &FiberArena, id: FiberId) -> Vec<FiberId> {
    let mut found = Vec::new();
    let mut stack = vec![id];
    while let Some(id) = stack.pop() {
        let node = &arena[id];
        if node.tag.is_host() {
            found.push(id);
            continue;
        }
        let first = stack.len();
        let mut child = node.child;
        while let Some(c) = child {
            stack.push(c);
            child = arena[c].sibling;
        }
        stack[first..].reverse();
    }
    found
}

/// Remove `deleted` from the host, and hand its components' effects and its
/// host refs over for cleanup.
fn commit_deletion(root: &mut FiberRoot, host: &mut dyn HostAdapter, deleted: FiberId, refs: &mut RefOps) {
    if !root.arena.contains(deleted) {
        return;
    }

    let mut stack = vec![deleted];
    while let Some(id) = stack.pop() {
        let node = &root.arena[id];
        match node.tag {
            WorkTag::HostComponent => {
                if let Some(node_ref) = &node.node_ref {
                    refs.detach.push(node_ref.clone());
                }
            }
            WorkTag::FunctionComponent | WorkTag::MemoComponent => {
                if let FiberUpdateQueue::Effects(effects) = &node.update_queue {
                    let effects: &[Rc<EffectRecord>] = effects;
                    root.pending_passive_effects.unmount.extend(effects.iter().cloned());
                }
            }
            _ => {}
        }
        let mut child = node.child;
        while let Some(c) = child {
            stack.push(c);
            child = root.arena[c].sibling;
        }
    }

    let Some(parent) = get_host_parent(&root.arena, deleted) else {
        error!(fiber = ?deleted, "deletion without a host parent");
        root.error = Some(ReconcilerError::Usage(UsageError::HostParentNotFound { fiber: deleted }));
        return;
    };
    for id in top_host_nodes(&root.arena, deleted) {
        if let Some(instance) = root.arena[id].state_node.host() {
            host.remove_child(instance, parent);
        }
    }

    let node = &mut root.arena[deleted];
    node.return_fiber = None;
    if let Some(alt) = node.alternate.and_then(|alt| root.arena.get_mut(alt)) {
        alt.return_fiber = None;
    }
}

fn hide_or_unhide_all_children(arena: &FiberArena, host: &mut dyn HostAdapter, offscreen: FiberId, hidden: bool) {
    let Some(first) = arena[offscreen].child else {
        return;
    };
    let mut roots = Vec::new();
    let mut child = Some(first);
    while let Some(c) = child {
        roots.extend(top_host_nodes(arena, c));
        child = arena[c].sibling;
    }

    for id in roots {
        let node = &arena[id];
        let Some(instance) = node.state_node.host() else {
            continue;
        };
        match (node.tag, hidden) {
            (WorkTag::HostComponent, true) => host.hide_instance(instance),
            (WorkTag::HostComponent, false) => host.unhide_instance(instance),
            (WorkTag::HostText, true) => host.hide_text_instance(instance),
            (WorkTag::HostText, false) => {
                let content = node.memoized_props.text().unwrap_or_default();
                host.unhide_text_instance(instance, content);
            }
            _ => {}
        }
    }
}
