//! Work Nodes
//!
//! A work node (fiber) is the persistent record the reconciler keeps for
//! every position in the UI tree. Each logical position owns up to two
//! nodes: the *current* one, reachable from the root's `current` pointer
//! and describing what is on screen, and its *alternate*, the
//! work-in-progress copy a render pass mutates. Commit flips which of the
//! two is current.
//!
//! # Layout
//!
//! Nodes live in a per-root [`FiberArena`] and link to each other by
//! [`FiberId`]:
//!
//! ```text
//!   parent ──child──▶ first ──sibling──▶ second ──sibling──▶ third
//!      ▲                │                  │                   │
//!      └────return──────┴──────────────────┴───────────────────┘
//! ```
//!
//! `alternate` links the two copies of the same position.

mod arena;
mod flags;
mod work_in_progress;

pub(crate) use arena::FiberArena;
pub use flags::Flags;
pub(crate) use work_in_progress::{
    create_fiber_from_element, create_fiber_from_fragment, create_fiber_from_offscreen,
    create_fiber_from_text, create_host_root_fiber, create_work_in_progress,
};

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::context::ContextId;
use crate::element::{Child, ElementRef, ElementType, Key, Props};
use crate::hooks::{EffectRecord, Hook};
use crate::host::HostNodeId;
use crate::lanes::Lanes;
use crate::update_queue::{SharedQueue, StateRecord};

/// Address of a work node inside its root's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fiber({}v{})", self.index, self.generation)
    }
}

/// Variant of a work node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkTag {
    FunctionComponent,
    HostRoot,
    HostComponent,
    HostText,
    Fragment,
    ContextProvider,
    SuspenseComponent,
    OffscreenComponent,
    MemoComponent,
}

impl WorkTag {
    pub fn is_host(self) -> bool {
        matches!(self, WorkTag::HostComponent | WorkTag::HostText)
    }
}

/// Host-side handle associated with a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateNode {
    #[default]
    None,
    /// Instance or text node.
    Host(HostNodeId),
    /// The root's container.
    Root(HostNodeId),
}

impl StateNode {
    pub fn host(self) -> Option<HostNodeId> {
        match self {
            StateNode::Host(id) => Some(id),
            _ => None,
        }
    }
}

/// Whether an offscreen subtree is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffscreenMode {
    Visible,
    Hidden,
}

/// Props of the offscreen wrapper a suspense boundary puts around its
/// primary children.
#[derive(Debug)]
pub struct OffscreenProps {
    pub mode: OffscreenMode,
    pub children: Child,
}

/// Props as seen by a work node. Compared by identity.
#[derive(Clone, Default)]
pub enum FiberProps {
    #[default]
    Empty,
    Element(Props),
    Text(Rc<str>),
    /// A fragment's props are its children.
    Fragment(Child),
    Offscreen(Rc<OffscreenProps>),
}

impl FiberProps {
    /// Identity comparison used by the bail-out check.
    pub fn is_same(&self, other: &FiberProps) -> bool {
        match (self, other) {
            (FiberProps::Empty, FiberProps::Empty) => true,
            (FiberProps::Element(a), FiberProps::Element(b)) => Props::ptr_eq(a, b),
            (FiberProps::Text(a), FiberProps::Text(b)) => a == b,
            (FiberProps::Fragment(a), FiberProps::Fragment(b)) => a.same(b),
            (FiberProps::Offscreen(a), FiberProps::Offscreen(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_props(&self) -> Option<&Props> {
        match self {
            FiberProps::Element(props) => Some(props),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            FiberProps::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn offscreen_mode(&self) -> Option<OffscreenMode> {
        match self {
            FiberProps::Offscreen(props) => Some(props.mode),
            _ => None,
        }
    }

    /// Children described by these props.
    pub fn children(&self) -> Child {
        match self {
            FiberProps::Element(props) => props.children().clone(),
            FiberProps::Fragment(children) => children.clone(),
            FiberProps::Offscreen(props) => props.children.clone(),
            FiberProps::Empty | FiberProps::Text(_) => Child::Empty,
        }
    }
}

impl fmt::Debug for FiberProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiberProps::Empty => f.write_str("Empty"),
            FiberProps::Element(props) => props.fmt(f),
            FiberProps::Text(text) => write!(f, "{text:?}"),
            FiberProps::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            FiberProps::Offscreen(props) => f.debug_tuple("Offscreen").field(&props.mode).finish(),
        }
    }
}

/// State persisted on a node between renders.
#[derive(Clone, Default)]
pub(crate) enum MemoizedState {
    #[default]
    None,
    /// The root's element state.
    Root(Rc<StateRecord<Child>>),
    /// A function component's hook list, positionally matched.
    Hooks(Rc<[Hook]>),
}

/// Update queue slot of a node.
#[derive(Clone, Default)]
pub(crate) enum FiberUpdateQueue {
    #[default]
    None,
    /// Pending top-level renders of a root.
    Root(SharedQueue<Child>),
    /// A function component's effect list from its last render.
    Effects(Rc<[Rc<EffectRecord>]>),
}

/// Contexts a node read during its last render.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    /// Lanes at which a provider above changed one of `contexts`.
    pub lanes: Lanes,
    pub contexts: SmallVec<[ContextId; 2]>,
}

/// One work node.
pub(crate) struct FiberNode {
    pub tag: WorkTag,
    pub element_type: Option<ElementType>,
    pub key: Option<Key>,
    pub state_node: StateNode,

    pub return_fiber: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,
    pub index: usize,

    pub pending_props: FiberProps,
    pub memoized_props: FiberProps,
    pub memoized_state: MemoizedState,
    pub update_queue: FiberUpdateQueue,
    pub dependencies: Option<Dependencies>,
    pub node_ref: Option<ElementRef>,

    pub flags: Flags,
    pub subtree_flags: Flags,
    pub deletions: SmallVec<[FiberId; 2]>,
    pub lanes: Lanes,
    pub child_lanes: Lanes,

    pub alternate: Option<FiberId>,
}

impl FiberNode {
    pub fn new(tag: WorkTag, pending_props: FiberProps, key: Option<Key>) -> Self {
        Self {
            tag,
            element_type: None,
            key,
            state_node: StateNode::None,
            return_fiber: None,
            child: None,
            sibling: None,
            index: 0,
            pending_props,
            memoized_props: FiberProps::Empty,
            memoized_state: MemoizedState::None,
            update_queue: FiberUpdateQueue::None,
            dependencies: None,
            node_ref: None,
            flags: Flags::NONE,
            subtree_flags: Flags::NONE,
            deletions: SmallVec::new(),
            lanes: Lanes::NONE,
            child_lanes: Lanes::NONE,
            alternate: None,
        }
    }

    /// Host tag of a host component.
    pub fn host_tag(&self) -> Option<&str> {
        match &self.element_type {
            Some(ElementType::Host(tag)) => Some(tag),
            _ => None,
        }
    }
}

impl fmt::Debug for FiberNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("FiberNode");
        s.field("tag", &self.tag);
        if let Some(ty) = &self.element_type {
            s.field("type", ty);
        }
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        s.field("flags", &self.flags)
            .field("subtree_flags", &self.subtree_flags)
            .field("lanes", &self.lanes)
            .field("child_lanes", &self.child_lanes)
            .finish()
    }
}
