//! Complete step: host instances and bubbling.

use std::rc::Rc;

use crate::element::ElementType;
use crate::fiber::{FiberArena, FiberId, Flags, OffscreenMode, StateNode, WorkTag};
use crate::host::{HostAdapter, HostNodeId};
use crate::lanes::Lanes;
use crate::root::{FiberRoot, RootCell};

pub(super) fn complete_work(root: &mut FiberRoot, cell: &Rc<RootCell>, wip: FiberId) {
    let current = root.arena[wip].alternate.filter(|id| root.arena.contains(*id));

    match root.arena[wip].tag {
        WorkTag::HostRoot
        | WorkTag::FunctionComponent
        | WorkTag::MemoComponent
        | WorkTag::Fragment
        | WorkTag::OffscreenComponent => {}
        WorkTag::ContextProvider => {
            if let Some(ElementType::Provider(handle)) = &root.arena[wip].element_type {
                let id = handle.id();
                root.session.providers.pop(id);
            }
        }
        WorkTag::HostComponent => complete_host_component(root, cell, wip, current),
        WorkTag::HostText => complete_host_text(root, cell, wip, current),
        WorkTag::SuspenseComponent => {
            root.session.suspense_handlers.pop();
            mark_visibility_change(&mut root.arena, wip);
        }
    }

    bubble_properties(&mut root.arena, wip);
}

fn complete_host_component(root: &mut FiberRoot, cell: &Rc<RootCell>, wip: FiberId, current: Option<FiberId>) {
    let arena = &mut root.arena;
    let existing = current.filter(|_| arena[wip].state_node.host().is_some());

    match existing {
        Some(current) => {
            let changed = match (arena[current].memoized_props.as_props(), arena[wip].memoized_props.as_props()) {
                (Some(old), Some(new)) => !old.attrs_equal(new),
                _ => true,
            };
            if changed {
                arena[wip].flags |= Flags::UPDATE;
            }
            if arena[current].node_ref != arena[wip].node_ref {
                arena[wip].flags |= Flags::REF;
            }
        }
        None => {
            let Some(props) = arena[wip].memoized_props.as_props().cloned() else {
                return;
            };
            let tag = arena[wip].host_tag().unwrap_or_default().to_owned();

            let mut host = cell.reconciler.host().borrow_mut();
            let instance = host.create_instance(&tag, &props);
            append_all_children(&mut *host, arena, instance, wip);
            drop(host);

            let node = &mut arena[wip];
            node.state_node = StateNode::Host(instance);
            if node.node_ref.is_some() {
                node.flags |= Flags::REF;
            }
        }
    }
}

fn complete_host_text(root: &mut FiberRoot, cell: &Rc<RootCell>, wip: FiberId, current: Option<FiberId>) {
    let arena = &mut root.arena;
    let existing = current.filter(|_| arena[wip].state_node.host().is_some());

    match existing {
        Some(current) => {
            if arena[current].memoized_props.text() != arena[wip].memoized_props.text() {
                arena[wip].flags |= Flags::UPDATE;
            }
        }
        None => {
            let content = arena[wip].memoized_props.text().unwrap_or_default().to_owned();
            let instance = cell.reconciler.host().borrow_mut().create_text_instance(&content);
            arena[wip].state_node = StateNode::Host(instance);
        }
    }
}

/// Append the top-most host nodes below `wip` to the fresh `parent`
/// instance. Deeper host nodes were already appended to their own parents.
fn append_all_children(host: &mut dyn HostAdapter, arena: &mut FiberArena, parent: HostNodeId, wip: FiberId) {
    let mut node = arena[wip].child;

    while let Some(id) = node {
        let tag = arena[id].tag;
        if tag.is_host() {
            if let Some(child) = arena[id].state_node.host() {
                host.append_initial_child(parent, child);
            }
        } else if let Some(child) = arena[id].child {
            arena[child].return_fiber = Some(id);
            node = Some(child);
            continue;
        }

        if id == wip {
            return;
        }

        let mut cursor = id;
        loop {
            if let Some(sibling) = arena[cursor].sibling {
                let parent_fiber = arena[cursor].return_fiber;
                arena[sibling].return_fiber = parent_fiber;
                node = Some(sibling);
                break;
            }
            match arena[cursor].return_fiber {
                Some(parent_fiber) if parent_fiber != wip => cursor = parent_fiber,
                _ => return,
            }
        }
    }
}

/// Flag the offscreen wrapper of a suspense boundary when its mode flipped
/// in this pass.
fn mark_visibility_change(arena: &mut FiberArena, wip: FiberId) {
    let Some(offscreen) = arena[wip].child else {
        return;
    };
    // A bailed-out boundary still shares its committed children.
    let current = arena[wip].alternate.filter(|id| arena.contains(*id));
    if current.is_some_and(|current| arena[current].child == Some(offscreen)) {
        return;
    }
    if arena[offscreen].tag != WorkTag::OffscreenComponent {
        return;
    }

    let is_hidden = arena[offscreen].pending_props.offscreen_mode() == Some(OffscreenMode::Hidden);
    let was_hidden = arena[offscreen]
        .alternate
        .filter(|id| arena.contains(*id))
        .map(|current| arena[current].pending_props.offscreen_mode() == Some(OffscreenMode::Hidden));

    let flipped = match was_hidden {
        Some(was_hidden) => was_hidden != is_hidden,
        None => is_hidden,
    };
    if flipped {
        // Folded into the boundary by its own bubbling step.
        arena[offscreen].flags |= Flags::VISIBILITY;
    }
}

/// Fold the children's flags and lanes into `wip`.
pub(crate) fn bubble_properties(arena: &mut FiberArena, wip: FiberId) {
    let mut subtree_flags = Flags::NONE;
    let mut child_lanes = Lanes::NONE;

    let mut child = arena[wip].child;
    while let Some(id) = child {
        let node = &mut arena[id];
        subtree_flags |= node.subtree_flags | node.flags;
        child_lanes |= node.lanes | node.child_lanes;
        child = node.sibling;
    }

    let node = &mut arena[wip];
    node.subtree_flags |= subtree_flags;
    node.child_lanes = child_lanes;
}
