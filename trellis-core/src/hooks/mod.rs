//! Hook State Machine
//!
//! Function components keep state across renders through hooks. Each hook
//! call claims the next record in the component's hook list; records are
//! matched to the previous render's list purely by position, so the call
//! order must be the same on every render.
//!
//! # How It Works
//!
//! 1. Before a component runs, the work loop builds a [`RenderCx`] holding
//!    the previous render's hook list (if the node was rendered before) and
//!    an empty list for this render.
//!
//! 2. On the first render every hook *mounts*: it appends a fresh record.
//!    On later renders every hook *updates*: it reads the record at the same
//!    position from the previous list and appends its successor.
//!
//! 3. When the component returns, the new list, the effect list and any
//!    flags the hooks raised are written back to the work-in-progress node.
//!
//! Hooks are methods on [`RenderCx`], which only exists while a component
//! runs. A hook can therefore not be called outside a render.

mod effect;
mod memo;
mod state;
mod transition;

pub use effect::{cleanup, Cleanup};
pub(crate) use effect::EffectRecord;
pub use memo::RefObject;
pub use state::SetState;
pub use transition::StartTransition;

use std::any::Any;
use std::rc::Rc;

use smallvec::smallvec;

use crate::context::{Context, ProviderStack};
use crate::element::{Child, Component, Props};
use crate::error::{RenderError, RenderResult, SuspendSignal, ThrownError, UsageError};
use crate::fiber::{Dependencies, FiberArena, FiberId, FiberUpdateQueue, Flags, MemoizedState};
use crate::lanes::Lane;
use crate::root::RootCell;
use crate::thenable::{Thenable, ThenableState};

/// One positional hook record.
#[derive(Clone)]
pub(crate) enum Hook {
    State(Rc<dyn Any>),
    Effect(Rc<effect::EffectHook>),
    Memo(Rc<memo::MemoRecord>),
    Ref(Rc<dyn Any>),
}

impl Hook {
    fn kind(&self) -> &'static str {
        match self {
            Hook::State(_) => "state",
            Hook::Effect(_) => "effect",
            Hook::Memo(_) => "memo",
            Hook::Ref(_) => "ref",
        }
    }
}

/// Render context handed to a function component.
pub struct RenderCx<'a> {
    arena: &'a mut FiberArena,
    providers: &'a ProviderStack,
    root: &'a Rc<RootCell>,
    wip: FiberId,
    render_lane: Lane,
    current_hooks: Option<Rc<[Hook]>>,
    hooks: Vec<Hook>,
    effects: Vec<Rc<EffectRecord>>,
    flags: Flags,
    did_receive_update: bool,
    read_any_context: bool,
}

/// What a component render produced.
pub(crate) struct RenderOutput {
    pub children: Child,
    pub did_receive_update: bool,
}

impl<'a> RenderCx<'a> {
    fn mismatch(&self, expected: &'static str, found: &Hook) -> RenderError {
        UsageError::HookMismatch {
            index: self.hooks.len(),
            expected,
            found: found.kind(),
        }
        .into()
    }

    /// The previous render's record at the position of the next hook, or
    /// `None` when mounting.
    fn current_hook(&self) -> RenderResult<Option<Hook>> {
        let Some(list) = &self.current_hooks else {
            return Ok(None);
        };
        let index = self.hooks.len();
        match list.get(index) {
            Some(hook) => Ok(Some(hook.clone())),
            None => Err(UsageError::MoreHooksThanPreviousRender { count: index + 1 }.into()),
        }
    }

    /// Read the nearest provided value of `context`, subscribing this
    /// component to changes of it.
    pub fn use_context<T: Clone + PartialEq + 'static>(&mut self, context: &Context<T>) -> T {
        let id = context.id();
        let node = &mut self.arena[self.wip];
        if !self.read_any_context {
            self.read_any_context = true;
            node.dependencies = Some(Dependencies {
                lanes: Lane::NONE,
                contexts: smallvec![id],
            });
        } else if let Some(deps) = node.dependencies.as_mut() {
            if !deps.contexts.contains(&id) {
                deps.contexts.push(id);
            }
        }

        match self.providers.read(id) {
            Some(value) => context.unwrap_value(value),
            None => context.default(),
        }
    }

    /// Unwrap a settled thenable, or suspend the render until it settles.
    pub fn use_thenable<T: Clone + 'static>(&mut self, thenable: &Thenable<T>) -> RenderResult<T> {
        match thenable.state() {
            ThenableState::Fulfilled(value) => Ok(value),
            ThenableState::Rejected(reason) => Err(ThrownError::new(reason).into()),
            ThenableState::Pending => Err(RenderError::Suspended(SuspendSignal::new(
                thenable.as_wakeable(),
            ))),
        }
    }
}

/// Run `component` for the work-in-progress node `wip` and write the
/// resulting hook list, effect list and flags back onto it.
pub(crate) fn render_with_hooks(
    arena: &mut FiberArena,
    providers: &ProviderStack,
    root: &Rc<RootCell>,
    wip: FiberId,
    component: &Component,
    props: &Props,
    render_lane: Lane,
) -> RenderResult<RenderOutput> {
    let current = arena[wip].alternate.filter(|id| arena.contains(*id));
    let current_hooks = current.and_then(|id| match &arena[id].memoized_state {
        MemoizedState::Hooks(hooks) => Some(Rc::clone(hooks)),
        _ => None,
    });

    // Context dependencies are rebuilt by this render's reads.
    let mut did_receive_update = false;
    if let Some(deps) = arena[wip].dependencies.as_mut() {
        if deps.lanes.intersects(render_lane) {
            did_receive_update = true;
        }
        deps.lanes = Lane::NONE;
        deps.contexts.clear();
    }

    let node = &mut arena[wip];
    node.memoized_state = MemoizedState::None;
    node.update_queue = FiberUpdateQueue::None;

    let mut cx = RenderCx {
        arena,
        providers,
        root,
        wip,
        render_lane,
        current_hooks,
        hooks: Vec::new(),
        effects: Vec::new(),
        flags: Flags::NONE,
        did_receive_update,
        read_any_context: false,
    };

    let children = component.render(&mut cx, props)?;

    if let Some(previous) = &cx.current_hooks {
        if cx.hooks.len() < previous.len() {
            return Err(UsageError::FewerHooksThanPreviousRender {
                rendered: cx.hooks.len(),
                previous: previous.len(),
            }
            .into());
        }
    }

    let RenderCx {
        arena,
        hooks,
        effects,
        flags,
        did_receive_update,
        ..
    } = cx;

    let node = &mut arena[wip];
    node.memoized_state = MemoizedState::Hooks(hooks.into());
    node.update_queue = FiberUpdateQueue::Effects(effects.into());
    node.flags |= flags;

    Ok(RenderOutput {
        children,
        did_receive_update,
    })
}

/// A component rendered but nothing it reads changed: keep the committed
/// effect list, drop the effects this render scheduled, and clear the lane
/// that brought it here.
pub(crate) fn bailout_hook(arena: &mut FiberArena, wip: FiberId, render_lane: Lane) {
    let Some(current) = arena[wip].alternate.filter(|id| arena.contains(*id)) else {
        return;
    };
    let queue = arena[current].update_queue.clone();

    let node = &mut arena[wip];
    node.update_queue = queue;
    node.flags.remove(Flags::PASSIVE_EFFECT);

    let current = &mut arena[current];
    current.lanes = current.lanes.remove(render_lane);
}
