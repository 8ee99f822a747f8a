//! Host Adapter Interface
//!
//! The reconciler computes mutations; a host adapter applies them to a
//! concrete tree (a DOM, a native view hierarchy, an in-memory test tree).
//! Host nodes are opaque to the core and addressed by [`HostNodeId`].

use crate::element::Props;

/// Opaque handle to a host node: a container, an instance or a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNodeId(u64);

impl HostNodeId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// A task queued for the host's microtask checkpoint.
pub type Microtask = Box<dyn FnOnce()>;

/// Payload of a committed update.
#[derive(Debug, Clone, Copy)]
pub enum HostUpdate<'a> {
    /// An element's attributes changed. `props` are the new committed props.
    Instance {
        instance: HostNodeId,
        tag: &'a str,
        props: &'a Props,
    },
    /// A text node's content changed.
    Text {
        instance: HostNodeId,
        content: &'a str,
    },
}

/// Operations the reconciler performs on the host tree.
///
/// The reconciler calls these only from the complete step (instance creation
/// and initial appends into detached instances) and from commit.
pub trait HostAdapter {
    fn create_instance(&mut self, tag: &str, props: &Props) -> HostNodeId;

    fn create_text_instance(&mut self, content: &str) -> HostNodeId;

    /// Append into a parent that is not attached yet.
    fn append_initial_child(&mut self, parent: HostNodeId, child: HostNodeId);

    /// Append as the last child of `container`, moving it if already attached.
    fn append_child_to_container(&mut self, container: HostNodeId, child: HostNodeId);

    /// Insert `child` right before `before`, moving it if already attached.
    fn insert_child_to_container(
        &mut self,
        child: HostNodeId,
        container: HostNodeId,
        before: HostNodeId,
    );

    fn remove_child(&mut self, child: HostNodeId, container: HostNodeId);

    fn commit_update(&mut self, update: HostUpdate<'_>);

    fn hide_instance(&mut self, instance: HostNodeId);

    fn unhide_instance(&mut self, instance: HostNodeId);

    fn hide_text_instance(&mut self, text: HostNodeId);

    fn unhide_text_instance(&mut self, text: HostNodeId, content: &str);

    /// Run `task` at the next microtask checkpoint, before any further
    /// scheduler task.
    fn schedule_microtask(&mut self, task: Microtask);
}
