//! Begin step: bail out or render a node and reconcile its children.

use std::any::Any;
use std::rc::Rc;

use crate::context::{propagate_context_change, ContextHandle};
use crate::element::{Child, Component, ElementType, Props};
use crate::error::RenderResult;
use crate::fiber::{
    create_fiber_from_fragment, create_fiber_from_offscreen, create_work_in_progress, FiberArena,
    FiberId, FiberProps, Flags, MemoizedState, OffscreenMode, OffscreenProps, WorkTag,
};
use crate::hooks::{bailout_hook, render_with_hooks};
use crate::lanes::{Lane, Lanes};
use crate::reconcile::ChildReconciler;
use crate::root::{FiberRoot, RootCell};

/// Begin `wip`, returning the next node to begin (its first child), or
/// `None` when it has no children to work on.
pub(super) fn begin_work(
    root: &mut FiberRoot,
    cell: &Rc<RootCell>,
    wip: FiberId,
    render_lane: Lane,
) -> RenderResult<Option<FiberId>> {
    let mut did_receive_update = false;

    if let Some(current) = current_of(&root.arena, wip) {
        let old_props = &root.arena[current].memoized_props;
        let new_props = &root.arena[wip].pending_props;
        if !old_props.is_same(new_props) {
            did_receive_update = true;
        } else if !root.arena[current].lanes.intersects(render_lane)
            && !root.arena[wip].flags.contains(Flags::DID_CAPTURE)
        {
            push_bailout_stacks(root, wip);
            return Ok(bailout_on_already_finished_work(&mut root.arena, wip, render_lane));
        }
    }

    root.arena[wip].lanes = Lanes::NONE;

    match root.arena[wip].tag {
        WorkTag::HostRoot => update_host_root(root, cell, wip, render_lane),
        WorkTag::HostComponent => {
            let children = root.arena[wip].pending_props.children();
            reconcile_children(root, cell, wip, &children);
            Ok(root.arena[wip].child)
        }
        WorkTag::HostText => Ok(None),
        WorkTag::FunctionComponent => {
            let component = match &root.arena[wip].element_type {
                Some(ElementType::Component(component)) => component.clone(),
                _ => return Ok(None),
            };
            update_function_component(root, cell, wip, &component, did_receive_update, render_lane)
        }
        WorkTag::MemoComponent => update_memo_component(root, cell, wip, did_receive_update, render_lane),
        WorkTag::Fragment | WorkTag::OffscreenComponent => {
            let children = root.arena[wip].pending_props.children();
            reconcile_children(root, cell, wip, &children);
            Ok(root.arena[wip].child)
        }
        WorkTag::ContextProvider => update_context_provider(root, cell, wip, render_lane),
        WorkTag::SuspenseComponent => Ok(update_suspense_component(root, wip)),
    }
}

fn current_of(arena: &FiberArena, wip: FiberId) -> Option<FiberId> {
    arena[wip].alternate.filter(|id| arena.contains(*id))
}

/// A bailed-out node still completes, which pops what its begin would
/// have pushed.
fn push_bailout_stacks(root: &mut FiberRoot, wip: FiberId) {
    match root.arena[wip].tag {
        WorkTag::ContextProvider => {
            let node = &root.arena[wip];
            if let Some((handle, value)) = provider_value(&node.memoized_props, &node.element_type) {
                root.session.providers.push(handle.id(), value);
            }
        }
        WorkTag::SuspenseComponent => root.session.suspense_handlers.push(wip),
        _ => {}
    }
}

fn provider_value(props: &FiberProps, element_type: &Option<ElementType>) -> Option<(ContextHandle, Rc<dyn Any>)> {
    let Some(ElementType::Provider(handle)) = element_type else {
        return None;
    };
    let value = props
        .as_props()
        .and_then(Props::provider_value)
        .cloned()
        .unwrap_or_else(|| Rc::clone(handle.default_value()));
    Some((handle.clone(), value))
}

/// Nothing changed at `wip`. Reuse the current children, or skip the whole
/// subtree when none of them has work at `render_lane`.
fn bailout_on_already_finished_work(arena: &mut FiberArena, wip: FiberId, render_lane: Lane) -> Option<FiberId> {
    if !arena[wip].child_lanes.intersects(render_lane) {
        return None;
    }
    clone_child_fibers(arena, wip);
    arena[wip].child
}

fn clone_child_fibers(arena: &mut FiberArena, wip: FiberId) {
    let Some(first) = arena[wip].child else {
        return;
    };

    let mut current_child = first;
    let props = arena[current_child].pending_props.clone();
    let mut new_child = create_work_in_progress(arena, current_child, props);
    arena[wip].child = Some(new_child);
    arena[new_child].return_fiber = Some(wip);

    while let Some(next) = arena[current_child].sibling {
        current_child = next;
        let props = arena[current_child].pending_props.clone();
        let cloned = create_work_in_progress(arena, current_child, props);
        arena[cloned].return_fiber = Some(wip);
        arena[new_child].sibling = Some(cloned);
        new_child = cloned;
    }
    arena[new_child].sibling = None;
}

fn reconcile_children(root: &mut FiberRoot, cell: &Rc<RootCell>, wip: FiberId, children: &Child) {
    let dev_warnings = cell.reconciler.config().dev_warnings;
    let current = current_of(&root.arena, wip);
    let child = match current {
        Some(current) => {
            let current_first = root.arena[current].child;
            ChildReconciler::update(dev_warnings).reconcile(&mut root.arena, wip, current_first, children)
        }
        None => ChildReconciler::mount(dev_warnings).reconcile(&mut root.arena, wip, None, children),
    };
    root.arena[wip].child = child;
}

fn update_host_root(
    root: &mut FiberRoot,
    cell: &Rc<RootCell>,
    wip: FiberId,
    render_lane: Lane,
) -> RenderResult<Option<FiberId>> {
    let MemoizedState::Root(record) = root.arena[wip].memoized_state.clone() else {
        return Ok(None);
    };

    let mut skipped = Lanes::NONE;
    let next = record.process(render_lane, |update| skipped |= update.lane);
    let unchanged = next.memoized_state.same(&record.memoized_state);
    let children = next.memoized_state.clone();

    let node = &mut root.arena[wip];
    node.lanes |= skipped;
    node.memoized_state = MemoizedState::Root(Rc::new(next));

    if unchanged {
        return Ok(bailout_on_already_finished_work(&mut root.arena, wip, render_lane));
    }
    reconcile_children(root, cell, wip, &children);
    Ok(root.arena[wip].child)
}

fn update_function_component(
    root: &mut FiberRoot,
    cell: &Rc<RootCell>,
    wip: FiberId,
    component: &Component,
    did_receive_update: bool,
    render_lane: Lane,
) -> RenderResult<Option<FiberId>> {
    let props = root.arena[wip]
        .pending_props
        .as_props()
        .cloned()
        .unwrap_or_default();

    let output = render_with_hooks(
        &mut root.arena,
        &root.session.providers,
        cell,
        wip,
        component,
        &props,
        render_lane,
    )?;

    if current_of(&root.arena, wip).is_some() && !did_receive_update && !output.did_receive_update {
        bailout_hook(&mut root.arena, wip, render_lane);
        return Ok(bailout_on_already_finished_work(&mut root.arena, wip, render_lane));
    }

    reconcile_children(root, cell, wip, &output.children);
    Ok(root.arena[wip].child)
}

fn update_memo_component(
    root: &mut FiberRoot,
    cell: &Rc<RootCell>,
    wip: FiberId,
    mut did_receive_update: bool,
    render_lane: Lane,
) -> RenderResult<Option<FiberId>> {
    let memo = match &root.arena[wip].element_type {
        Some(ElementType::Memo(memo)) => memo.clone(),
        _ => return Ok(None),
    };

    if let Some(current) = current_of(&root.arena, wip) {
        let prev = root.arena[current].memoized_props.as_props().cloned();
        let next = root.arena[wip].pending_props.as_props().cloned();
        let same_ref = root.arena[current].node_ref == root.arena[wip].node_ref;
        if let (Some(prev), Some(next)) = (prev, next) {
            if same_ref && memo.props_equal(&prev, &next) {
                did_receive_update = false;
                root.arena[wip].pending_props = FiberProps::Element(prev);
                if !root.arena[current].lanes.intersects(render_lane) {
                    root.arena[wip].lanes = root.arena[current].lanes;
                    return Ok(bailout_on_already_finished_work(&mut root.arena, wip, render_lane));
                }
            }
        }
    }

    update_function_component(root, cell, wip, memo.component(), did_receive_update, render_lane)
}

fn update_context_provider(
    root: &mut FiberRoot,
    cell: &Rc<RootCell>,
    wip: FiberId,
    render_lane: Lane,
) -> RenderResult<Option<FiberId>> {
    let node = &root.arena[wip];
    let Some((handle, new_value)) = provider_value(&node.pending_props, &node.element_type) else {
        return Ok(None);
    };
    let old = provider_value(&node.memoized_props, &node.element_type)
        .filter(|_| node.memoized_props.as_props().is_some())
        .map(|(_, value)| value);
    let new_children = node.pending_props.children();
    let old_children = node.memoized_props.children();

    root.session.providers.push(handle.id(), Rc::clone(&new_value));

    if let Some(old_value) = old {
        if handle.values_equal(&*old_value, &*new_value) && old_children.same(&new_children) {
            return Ok(bailout_on_already_finished_work(&mut root.arena, wip, render_lane));
        }
        propagate_context_change(&mut root.arena, wip, handle.id(), render_lane);
    }

    reconcile_children(root, cell, wip, &new_children);
    Ok(root.arena[wip].child)
}

/// Suspense renders its primary children inside an offscreen wrapper. When
/// a child suspended in this pass the wrapper is hidden and the fallback is
/// rendered next to it; the next node to begin is then the fallback.
fn update_suspense_component(root: &mut FiberRoot, wip: FiberId) -> Option<FiberId> {
    let current = current_of(&root.arena, wip);
    let show_fallback = root.arena[wip].flags.contains(Flags::DID_CAPTURE);
    let props = root.arena[wip].pending_props.as_props().cloned().unwrap_or_default();
    let primary = props.children().clone();
    let fallback = props.fallback().clone();

    root.session.suspense_handlers.push(wip);

    let current_offscreen = current.and_then(|current| root.arena[current].child);
    let arena = &mut root.arena;
    let next = match (current_offscreen, show_fallback) {
        (None, false) => mount_suspense_primary_children(arena, wip, primary),
        (None, true) => mount_suspense_fallback_children(arena, wip, primary, fallback, current.is_some()),
        (Some(offscreen), false) => update_suspense_primary_children(arena, wip, offscreen, primary),
        (Some(offscreen), true) => update_suspense_fallback_children(arena, wip, offscreen, primary, fallback),
    };
    Some(next)
}

fn offscreen_props(mode: OffscreenMode, children: Child) -> OffscreenProps {
    OffscreenProps { mode, children }
}

fn mount_suspense_primary_children(arena: &mut FiberArena, wip: FiberId, primary: Child) -> FiberId {
    let offscreen = create_fiber_from_offscreen(arena, offscreen_props(OffscreenMode::Visible, primary));
    arena[offscreen].return_fiber = Some(wip);
    arena[wip].child = Some(offscreen);
    offscreen
}

fn mount_suspense_fallback_children(
    arena: &mut FiberArena,
    wip: FiberId,
    primary: Child,
    fallback: Child,
    boundary_mounted: bool,
) -> FiberId {
    let offscreen = create_fiber_from_offscreen(arena, offscreen_props(OffscreenMode::Hidden, primary));
    let fallback = create_fiber_from_fragment(arena, fallback, None);
    if boundary_mounted {
        arena[fallback].flags |= Flags::PLACEMENT;
    }

    arena[offscreen].return_fiber = Some(wip);
    arena[offscreen].sibling = Some(fallback);
    arena[fallback].return_fiber = Some(wip);
    arena[wip].child = Some(offscreen);
    fallback
}

fn update_suspense_primary_children(
    arena: &mut FiberArena,
    wip: FiberId,
    current_offscreen: FiberId,
    primary: Child,
) -> FiberId {
    let current_fallback = arena[current_offscreen].sibling;
    let props = FiberProps::Offscreen(Rc::new(offscreen_props(OffscreenMode::Visible, primary)));
    let offscreen = create_work_in_progress(arena, current_offscreen, props);

    let node = &mut arena[offscreen];
    node.return_fiber = Some(wip);
    node.sibling = None;
    arena[wip].child = Some(offscreen);

    if let Some(fallback) = current_fallback {
        let boundary = &mut arena[wip];
        boundary.deletions.push(fallback);
        boundary.flags |= Flags::CHILD_DELETION;
    }
    offscreen
}

fn update_suspense_fallback_children(
    arena: &mut FiberArena,
    wip: FiberId,
    current_offscreen: FiberId,
    primary: Child,
    fallback: Child,
) -> FiberId {
    let current_fallback = arena[current_offscreen].sibling;
    let props = FiberProps::Offscreen(Rc::new(offscreen_props(OffscreenMode::Hidden, primary)));
    let offscreen = create_work_in_progress(arena, current_offscreen, props);

    let fallback = match current_fallback {
        Some(current) => create_work_in_progress(arena, current, FiberProps::Fragment(fallback)),
        None => {
            let created = create_fiber_from_fragment(arena, fallback, None);
            arena[created].flags |= Flags::PLACEMENT;
            created
        }
    };

    arena[fallback].return_fiber = Some(wip);
    arena[fallback].sibling = None;
    arena[offscreen].return_fiber = Some(wip);
    arena[offscreen].sibling = Some(fallback);
    arena[wip].child = Some(offscreen);
    fallback
}
