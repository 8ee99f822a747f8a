//! Node construction and double buffering.

use std::cell::RefCell;
use std::rc::Rc;

use super::{
    FiberArena, FiberId, FiberNode, FiberProps, FiberUpdateQueue, Flags, MemoizedState,
    OffscreenProps, StateNode, WorkTag,
};
use crate::element::{Child, Element, ElementType, Key};
use crate::host::HostNodeId;
use crate::update_queue::{StateRecord, UpdateQueue};

/// Get (or create) the work-in-progress copy of `current`, reset to a
/// structural clone of it with `pending_props` as its new input.
///
/// The pair is allocated once and recycled by every later render.
pub(crate) fn create_work_in_progress(
    arena: &mut FiberArena,
    current: FiberId,
    pending_props: FiberProps,
) -> FiberId {
    let existing = arena[current].alternate.filter(|id| arena.contains(*id));

    let wip = match existing {
        Some(wip) => {
            let node = &mut arena[wip];
            node.pending_props = pending_props;
            node.flags = Flags::NONE;
            node.subtree_flags = Flags::NONE;
            node.deletions.clear();
            wip
        }
        None => {
            let source = &arena[current];
            let mut node = FiberNode::new(source.tag, pending_props, source.key.clone());
            node.alternate = Some(current);
            let wip = arena.insert(node);
            arena[current].alternate = Some(wip);
            wip
        }
    };

    let source = &arena[current];
    let element_type = source.element_type.clone();
    let state_node = source.state_node;
    let update_queue = source.update_queue.clone();
    let child = source.child;
    let sibling = source.sibling;
    let index = source.index;
    let memoized_props = source.memoized_props.clone();
    let memoized_state = source.memoized_state.clone();
    let node_ref = source.node_ref.clone();
    let lanes = source.lanes;
    let child_lanes = source.child_lanes;
    let dependencies = source.dependencies.clone();

    let node = &mut arena[wip];
    node.element_type = element_type;
    node.state_node = state_node;
    node.update_queue = update_queue;
    node.child = child;
    node.sibling = sibling;
    node.index = index;
    node.memoized_props = memoized_props;
    node.memoized_state = memoized_state;
    node.node_ref = node_ref;
    node.lanes = lanes;
    node.child_lanes = child_lanes;
    node.dependencies = dependencies;

    wip
}

/// The root node of a fresh tree, rendering into `container`.
pub(crate) fn create_host_root_fiber(arena: &mut FiberArena, container: HostNodeId) -> FiberId {
    let mut node = FiberNode::new(WorkTag::HostRoot, FiberProps::Empty, None);
    node.state_node = StateNode::Root(container);
    node.memoized_state = MemoizedState::Root(Rc::new(StateRecord::new(
        Child::Empty,
        Rc::new(RefCell::new(UpdateQueue::new())),
    )));
    if let MemoizedState::Root(record) = &node.memoized_state {
        node.update_queue = FiberUpdateQueue::Root(Rc::clone(&record.queue));
    }
    arena.insert(node)
}

pub(crate) fn create_fiber_from_element(arena: &mut FiberArena, element: &Element) -> FiberId {
    let props = element.props().clone();
    let (tag, pending_props) = match element.element_type() {
        ElementType::Host(_) => (WorkTag::HostComponent, FiberProps::Element(props)),
        ElementType::Component(_) => (WorkTag::FunctionComponent, FiberProps::Element(props)),
        ElementType::Fragment => (
            WorkTag::Fragment,
            FiberProps::Fragment(props.children().clone()),
        ),
        ElementType::Provider(_) => (WorkTag::ContextProvider, FiberProps::Element(props)),
        ElementType::Suspense => (WorkTag::SuspenseComponent, FiberProps::Element(props)),
        ElementType::Memo(_) => (WorkTag::MemoComponent, FiberProps::Element(props)),
    };

    let mut node = FiberNode::new(tag, pending_props, element.key().cloned());
    node.element_type = Some(element.element_type().clone());
    node.node_ref = element.node_ref().cloned();
    arena.insert(node)
}

pub(crate) fn create_fiber_from_fragment(
    arena: &mut FiberArena,
    children: Child,
    key: Option<Key>,
) -> FiberId {
    let mut node = FiberNode::new(WorkTag::Fragment, FiberProps::Fragment(children), key);
    node.element_type = Some(ElementType::Fragment);
    arena.insert(node)
}

pub(crate) fn create_fiber_from_text(arena: &mut FiberArena, content: Rc<str>) -> FiberId {
    arena.insert(FiberNode::new(WorkTag::HostText, FiberProps::Text(content), None))
}

pub(crate) fn create_fiber_from_offscreen(arena: &mut FiberArena, props: OffscreenProps) -> FiberId {
    arena.insert(FiberNode::new(
        WorkTag::OffscreenComponent,
        FiberProps::Offscreen(Rc::new(props)),
        None,
    ))
}
