//! In-memory host tree with an operation log.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::warn;

use super::MicrotaskQueue;
use crate::element::{Callback, PropValue, Props};
use crate::host::{HostAdapter, HostNodeId, HostUpdate, Microtask};

/// One call the reconciler made on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateInstance { id: u64, tag: String },
    CreateText { id: u64, content: String },
    AppendInitial { parent: u64, child: u64 },
    Append { parent: u64, child: u64 },
    Insert { parent: u64, child: u64, before: u64 },
    Remove { parent: u64, child: u64 },
    UpdateInstance { id: u64 },
    UpdateText { id: u64, content: String },
    Hide { id: u64 },
    Unhide { id: u64 },
}

impl HostOp {
    pub fn is_mutation_of_attached_tree(&self) -> bool {
        !matches!(
            self,
            HostOp::CreateInstance { .. } | HostOp::CreateText { .. } | HostOp::AppendInitial { .. }
        )
    }
}

#[derive(Debug)]
enum NodeKind {
    Container,
    Element { tag: String, props: Props },
    Text(String),
}

#[derive(Debug)]
struct HostNode {
    kind: NodeKind,
    parent: Option<HostNodeId>,
    children: Vec<HostNodeId>,
    hidden: bool,
}

/// A [`HostAdapter`] keeping its tree in memory.
///
/// Every adapter call is recorded as a [`HostOp`]. Microtasks go to the
/// shared [`MicrotaskQueue`].
pub struct MemoryHost {
    nodes: HashMap<HostNodeId, HostNode>,
    next_id: u64,
    ops: Vec<HostOp>,
    microtasks: MicrotaskQueue,
}

impl MemoryHost {
    pub fn new(microtasks: MicrotaskQueue) -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 0,
            ops: Vec::new(),
            microtasks,
        }
    }

    fn allocate(&mut self, kind: NodeKind) -> HostNodeId {
        self.next_id += 1;
        let id = HostNodeId::new(self.next_id);
        self.nodes.insert(
            id,
            HostNode {
                kind,
                parent: None,
                children: Vec::new(),
                hidden: false,
            },
        );
        id
    }

    /// A fresh root container.
    pub fn create_container(&mut self) -> HostNodeId {
        self.allocate(NodeKind::Container)
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// The op log as JSON, for snapshot-style assertions.
    pub fn ops_json(&self) -> String {
        serde_json::to_string_pretty(&self.ops).unwrap_or_default()
    }

    pub fn contains(&self, id: HostNodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn children(&self, id: HostNodeId) -> &[HostNodeId] {
        self.nodes.get(&id).map_or(&[], |node| node.children.as_slice())
    }

    pub fn parent(&self, id: HostNodeId) -> Option<HostNodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn is_hidden(&self, id: HostNodeId) -> bool {
        self.nodes.get(&id).is_some_and(|node| node.hidden)
    }

    pub fn tag(&self, id: HostNodeId) -> Option<&str> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn props(&self, id: HostNodeId) -> Option<&Props> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Element { props, .. } => Some(props),
            _ => None,
        }
    }

    pub fn text(&self, id: HostNodeId) -> Option<&str> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Text(content) => Some(content),
            _ => None,
        }
    }

    /// The callback attribute `name` of element `id`.
    pub fn callback(&self, id: HostNodeId, name: &str) -> Option<Callback> {
        self.props(id)?.callback(name)
    }

    /// First element below `root` (depth-first) whose `id` attribute is
    /// `value`.
    pub fn find_by_id(&self, root: HostNodeId, value: &str) -> Option<HostNodeId> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.props(id).and_then(|props| props.get_str("id")) == Some(value) {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev());
        }
        None
    }

    /// Markup of the visible content below `root`. Hidden nodes are left
    /// out.
    pub fn dump(&self, root: HostNodeId) -> String {
        let mut out = String::new();
        for &child in self.children(root) {
            self.write_node(&mut out, child, false);
        }
        out
    }

    /// Like [`dump`](Self::dump), with hidden nodes marked `hidden`.
    pub fn dump_all(&self, root: HostNodeId) -> String {
        let mut out = String::new();
        for &child in self.children(root) {
            self.write_node(&mut out, child, true);
        }
        out
    }

    fn write_node(&self, out: &mut String, id: HostNodeId, with_hidden: bool) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.hidden && !with_hidden {
            return;
        }
        match &node.kind {
            NodeKind::Text(content) if node.hidden => {
                let _ = write!(out, "[hidden:{content}]");
            }
            NodeKind::Text(content) => out.push_str(content),
            NodeKind::Element { tag, props } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in props.attrs() {
                    if matches!(value, PropValue::Callback(_) | PropValue::Any(_)) {
                        continue;
                    }
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                if node.hidden {
                    out.push_str(" hidden");
                }
                out.push('>');
                for &child in &node.children {
                    self.write_node(out, child, with_hidden);
                }
                let _ = write!(out, "</{tag}>");
            }
            NodeKind::Container => {
                for &child in &node.children {
                    self.write_node(out, child, with_hidden);
                }
            }
        }
    }

    fn detach(&mut self, child: HostNodeId) {
        let Some(parent) = self.nodes.get_mut(&child).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|id| *id != child);
        }
    }

    fn attach(&mut self, parent: HostNodeId, child: HostNodeId, before: Option<HostNodeId>) {
        self.detach(child);
        let Some(node) = self.nodes.get_mut(&parent) else {
            warn!(?parent, "append into unknown host node");
            return;
        };
        let position = before
            .and_then(|before| node.children.iter().position(|id| *id == before))
            .unwrap_or(node.children.len());
        node.children.insert(position, child);
        if let Some(child) = self.nodes.get_mut(&child) {
            child.parent = Some(parent);
        }
    }

    fn set_hidden(&mut self, id: HostNodeId, hidden: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.hidden = hidden;
        }
    }

    /// Drop `id` and everything below it from the node table.
    fn forget(&mut self, id: HostNodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                stack.extend(node.children);
            }
        }
    }
}

impl HostAdapter for MemoryHost {
    fn create_instance(&mut self, tag: &str, props: &Props) -> HostNodeId {
        let id = self.allocate(NodeKind::Element {
            tag: tag.to_owned(),
            props: props.clone(),
        });
        self.ops.push(HostOp::CreateInstance {
            id: id.raw(),
            tag: tag.to_owned(),
        });
        id
    }

    fn create_text_instance(&mut self, content: &str) -> HostNodeId {
        let id = self.allocate(NodeKind::Text(content.to_owned()));
        self.ops.push(HostOp::CreateText {
            id: id.raw(),
            content: content.to_owned(),
        });
        id
    }

    fn append_initial_child(&mut self, parent: HostNodeId, child: HostNodeId) {
        self.ops.push(HostOp::AppendInitial {
            parent: parent.raw(),
            child: child.raw(),
        });
        self.attach(parent, child, None);
    }

    fn append_child_to_container(&mut self, container: HostNodeId, child: HostNodeId) {
        self.ops.push(HostOp::Append {
            parent: container.raw(),
            child: child.raw(),
        });
        self.attach(container, child, None);
    }

    fn insert_child_to_container(&mut self, child: HostNodeId, container: HostNodeId, before: HostNodeId) {
        self.ops.push(HostOp::Insert {
            parent: container.raw(),
            child: child.raw(),
            before: before.raw(),
        });
        self.attach(container, child, Some(before));
    }

    fn remove_child(&mut self, child: HostNodeId, container: HostNodeId) {
        self.ops.push(HostOp::Remove {
            parent: container.raw(),
            child: child.raw(),
        });
        if self.parent(child) != Some(container) {
            warn!(?child, ?container, "removing a node from a parent it is not in");
        }
        self.detach(child);
        self.forget(child);
    }

    fn commit_update(&mut self, update: HostUpdate<'_>) {
        match update {
            HostUpdate::Instance { instance, props, .. } => {
                self.ops.push(HostOp::UpdateInstance { id: instance.raw() });
                if let Some(HostNode {
                    kind: NodeKind::Element { props: current, .. },
                    ..
                }) = self.nodes.get_mut(&instance)
                {
                    *current = props.clone();
                }
            }
            HostUpdate::Text { instance, content } => {
                self.ops.push(HostOp::UpdateText {
                    id: instance.raw(),
                    content: content.to_owned(),
                });
                if let Some(HostNode {
                    kind: NodeKind::Text(current),
                    ..
                }) = self.nodes.get_mut(&instance)
                {
                    *current = content.to_owned();
                }
            }
        }
    }

    fn hide_instance(&mut self, instance: HostNodeId) {
        self.ops.push(HostOp::Hide { id: instance.raw() });
        self.set_hidden(instance, true);
    }

    fn unhide_instance(&mut self, instance: HostNodeId) {
        self.ops.push(HostOp::Unhide { id: instance.raw() });
        self.set_hidden(instance, false);
    }

    fn hide_text_instance(&mut self, text: HostNodeId) {
        self.ops.push(HostOp::Hide { id: text.raw() });
        self.set_hidden(text, true);
    }

    fn unhide_text_instance(&mut self, text: HostNodeId, content: &str) {
        self.ops.push(HostOp::Unhide { id: text.raw() });
        self.set_hidden(text, false);
        if let Some(HostNode {
            kind: NodeKind::Text(current),
            ..
        }) = self.nodes.get_mut(&text)
        {
            *current = content.to_owned();
        }
    }

    fn schedule_microtask(&mut self, task: Microtask) {
        self.microtasks.push(task);
    }
}
