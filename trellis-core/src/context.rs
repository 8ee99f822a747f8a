//! Context Propagation
//!
//! A context carries a value from a provider down to every descendant that
//! reads it, without threading it through props.
//!
//! # How It Works
//!
//! 1. The begin step of a provider pushes its value onto the
//!    [`ProviderStack`]; the complete (or unwind) step pops it. Because the
//!    traversal is depth-first, the top entry for a context is always the
//!    nearest enclosing provider.
//!
//! 2. A component reading a context records the context id in its node's
//!    dependencies.
//!
//! 3. When a provider's value changes, [`propagate_context_change`] walks
//!    the provider's subtree and schedules work on every node that depends
//!    on the context, so the bail-out check does not skip them.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::element::{ElementBuilder, ElementType, PropValue, PROVIDER_VALUE};
use crate::fiber::{FiberArena, FiberId, WorkTag};
use crate::lanes::Lane;

/// Unique identifier of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type SameValueFn = fn(&dyn Any, &dyn Any) -> bool;

fn same_value<T: PartialEq + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Type-erased context, as stored in provider element types.
#[derive(Clone)]
pub struct ContextHandle {
    id: ContextId,
    default: Rc<dyn Any>,
    same_value: SameValueFn,
}

impl ContextHandle {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn default_value(&self) -> &Rc<dyn Any> {
        &self.default
    }

    /// Value equality between two provider values of this context.
    pub(crate) fn values_equal(&self, a: &dyn Any, b: &dyn Any) -> bool {
        (self.same_value)(a, b)
    }
}

impl PartialEq for ContextHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextHandle").field(&self.id).finish()
    }
}

/// A typed context with a default value for readers outside any provider.
pub struct Context<T> {
    handle: ContextHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + PartialEq + 'static> Context<T> {
    pub fn new(default: T) -> Self {
        Self {
            handle: ContextHandle {
                id: ContextId::new(),
                default: Rc::new(default),
                same_value: same_value::<T>,
            },
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> ContextId {
        self.handle.id
    }

    pub fn handle(&self) -> &ContextHandle {
        &self.handle
    }

    /// A provider element exposing `value` to its children.
    pub fn provider(&self, value: T) -> ElementBuilder {
        ElementBuilder::new(ElementType::Provider(self.handle.clone()))
            .attr(PROVIDER_VALUE, PropValue::Any(Rc::new(value)))
    }

    /// Downcast a value read from the provider stack.
    pub(crate) fn unwrap_value(&self, value: &Rc<dyn Any>) -> T {
        match value.downcast_ref::<T>() {
            Some(value) => value.clone(),
            None => self.default(),
        }
    }

    pub fn default(&self) -> T {
        match self.handle.default.downcast_ref::<T>() {
            Some(value) => value.clone(),
            None => unreachable!("context default has the context's type"),
        }
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Context").field(&self.handle.id).finish()
    }
}

/// Visible provider values during one render pass.
#[derive(Default)]
pub(crate) struct ProviderStack {
    values: HashMap<ContextId, Rc<dyn Any>>,
    saved: Vec<(ContextId, Option<Rc<dyn Any>>)>,
}

impl ProviderStack {
    pub fn push(&mut self, context: ContextId, value: Rc<dyn Any>) {
        let previous = self.values.insert(context, value);
        self.saved.push((context, previous));
    }

    pub fn pop(&mut self, context: ContextId) {
        let Some((id, previous)) = self.saved.pop() else {
            tracing::warn!(?context, "provider stack underflow");
            return;
        };
        debug_assert_eq!(id, context, "provider push/pop out of order");
        match previous {
            Some(value) => {
                self.values.insert(id, value);
            }
            None => {
                self.values.remove(&id);
            }
        }
    }

    pub fn read(&self, context: ContextId) -> Option<&Rc<dyn Any>> {
        self.values.get(&context)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.saved.clear();
    }
}

/// Mark every node below `provider` that depends on `context` as having
/// work at `render_lane`, along with the path back up to `provider`.
///
/// Nested providers of the same context shadow it, so their subtrees are
/// skipped. The walk keeps its own ancestor path: the nodes below
/// `provider` may still be committed ones, whose links are left untouched.
pub(crate) fn propagate_context_change(
    arena: &mut FiberArena,
    provider: FiberId,
    context: ContextId,
    render_lane: Lane,
) {
    // Ancestors of the node being visited, nearest last.
    let mut path: Vec<FiberId> = Vec::new();
    let mut stack: Vec<(FiberId, usize)> = Vec::new();
    push_children(arena, provider, 0, &mut stack);

    while let Some((id, depth)) = stack.pop() {
        path.truncate(depth);
        let node = &arena[id];

        let depends = node
            .dependencies
            .as_ref()
            .is_some_and(|deps| deps.contexts.contains(&context));
        let shadows = node.tag == WorkTag::ContextProvider
            && matches!(
                &node.element_type,
                Some(ElementType::Provider(handle)) if handle.id() == context
            );

        if depends {
            let alternate = node.alternate;
            let node = &mut arena[id];
            node.lanes |= render_lane;
            if let Some(deps) = node.dependencies.as_mut() {
                deps.lanes |= render_lane;
            }
            if let Some(alt) = alternate.and_then(|alt| arena.get_mut(alt)) {
                alt.lanes |= render_lane;
            }
            for ancestor in path.iter().rev().chain(std::iter::once(&provider)) {
                mark_child_lanes(arena, *ancestor, render_lane);
            }
        } else if shadows {
            continue;
        }

        path.push(id);
        push_children(arena, id, depth + 1, &mut stack);
    }
}

fn push_children(arena: &FiberArena, parent: FiberId, depth: usize, stack: &mut Vec<(FiberId, usize)>) {
    let mut child = arena[parent].child;
    while let Some(id) = child {
        stack.push((id, depth));
        child = arena[id].sibling;
    }
}

fn mark_child_lanes(arena: &mut FiberArena, id: FiberId, lane: Lane) {
    let fiber = &mut arena[id];
    fiber.child_lanes |= lane;
    let alternate = fiber.alternate;
    if let Some(alt) = alternate.and_then(|alt| arena.get_mut(alt)) {
        alt.child_lanes |= lane;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::{Dependencies, FiberNode, FiberProps};
    use crate::lanes::Lanes;

    fn insert(arena: &mut FiberArena, tag: WorkTag) -> FiberId {
        arena.insert(FiberNode::new(tag, FiberProps::Empty, None))
    }

    fn link(arena: &mut FiberArena, parent: FiberId, children: &[FiberId]) {
        arena[parent].child = children.first().copied();
        for pair in children.windows(2) {
            arena[pair[0]].sibling = Some(pair[1]);
        }
        for child in children {
            arena[*child].return_fiber = Some(parent);
        }
    }

    #[test]
    fn stack_restores_outer_value() {
        let ctx = Context::new(0);
        let mut stack = ProviderStack::default();
        stack.push(ctx.id(), Rc::new(1));
        stack.push(ctx.id(), Rc::new(2));
        assert_eq!(ctx.unwrap_value(stack.read(ctx.id()).unwrap()), 2);
        stack.pop(ctx.id());
        assert_eq!(ctx.unwrap_value(stack.read(ctx.id()).unwrap()), 1);
        stack.pop(ctx.id());
        assert!(stack.read(ctx.id()).is_none());
    }

    #[test]
    fn handle_compares_values() {
        let ctx = Context::new(String::from("a"));
        let handle = ctx.handle();
        assert!(handle.values_equal(&String::from("x"), &String::from("x")));
        assert!(!handle.values_equal(&String::from("x"), &String::from("y")));
        assert!(!handle.values_equal(&1u8, &1u8));
    }

    #[test]
    fn propagation_marks_consumers_and_their_path() {
        let ctx = Context::new(0);
        let mut arena = FiberArena::new();
        let provider = insert(&mut arena, WorkTag::ContextProvider);
        let wrapper = insert(&mut arena, WorkTag::HostComponent);
        let consumer = insert(&mut arena, WorkTag::FunctionComponent);
        let bystander = insert(&mut arena, WorkTag::FunctionComponent);
        link(&mut arena, provider, &[wrapper, bystander]);
        link(&mut arena, wrapper, &[consumer]);

        let mut deps = Dependencies::default();
        deps.contexts.push(ctx.id());
        arena[consumer].dependencies = Some(deps);

        propagate_context_change(&mut arena, provider, ctx.id(), Lanes::DEFAULT);

        assert_eq!(arena[consumer].lanes, Lanes::DEFAULT);
        assert_eq!(arena[wrapper].child_lanes, Lanes::DEFAULT);
        assert_eq!(arena[provider].child_lanes, Lanes::DEFAULT);
        assert_eq!(arena[bystander].lanes, Lanes::NONE);
        assert_eq!(
            arena[consumer].dependencies.as_ref().map(|d| d.lanes),
            Some(Lanes::DEFAULT)
        );
    }

    #[test]
    fn nested_provider_of_same_context_shadows() {
        let ctx = Context::new(0);
        let mut arena = FiberArena::new();
        let provider = insert(&mut arena, WorkTag::ContextProvider);
        let inner = insert(&mut arena, WorkTag::ContextProvider);
        arena[inner].element_type = Some(ElementType::Provider(ctx.handle().clone()));
        let consumer = insert(&mut arena, WorkTag::FunctionComponent);
        link(&mut arena, provider, &[inner]);
        link(&mut arena, inner, &[consumer]);

        let mut deps = Dependencies::default();
        deps.contexts.push(ctx.id());
        arena[consumer].dependencies = Some(deps);

        propagate_context_change(&mut arena, provider, ctx.id(), Lanes::SYNC);
        assert_eq!(arena[consumer].lanes, Lanes::NONE);
    }

    #[test]
    fn propagation_leaves_child_links_alone() {
        let ctx = Context::new(0);
        let mut arena = FiberArena::new();
        let provider = insert(&mut arena, WorkTag::ContextProvider);
        let wrapper = insert(&mut arena, WorkTag::HostComponent);
        let consumer = insert(&mut arena, WorkTag::FunctionComponent);
        link(&mut arena, provider, &[wrapper]);
        link(&mut arena, wrapper, &[consumer]);

        // Committed children still pointing at the other copy of their parent.
        let stale = insert(&mut arena, WorkTag::ContextProvider);
        arena[wrapper].return_fiber = Some(stale);
        arena[consumer].return_fiber = None;

        let mut deps = Dependencies::default();
        deps.contexts.push(ctx.id());
        arena[consumer].dependencies = Some(deps);

        propagate_context_change(&mut arena, provider, ctx.id(), Lanes::TRANSITION);

        assert_eq!(arena[consumer].lanes, Lanes::TRANSITION);
        assert_eq!(arena[wrapper].child_lanes, Lanes::TRANSITION);
        assert_eq!(arena[provider].child_lanes, Lanes::TRANSITION);
        assert!(arena[stale].child_lanes.is_empty());
        assert_eq!(arena[wrapper].return_fiber, Some(stale));
        assert_eq!(arena[consumer].return_fiber, None);
    }
}
