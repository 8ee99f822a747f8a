//! Child Reconciliation
//!
//! Diffs the children a node rendered against the current children of the
//! same node, reusing work nodes where the identity (type and key) matches,
//! creating nodes for new children and scheduling deletion of the rest.
//!
//! # How It Works
//!
//! 1. A single element or text child is matched against the current
//!    siblings in order. The first sibling with the same key is reused if
//!    its type matches; every other sibling is deleted.
//!
//! 2. A list is matched through a map of the current children keyed by key
//!    (or index when unkeyed). Each matched child's previous index is
//!    compared with the highest previous index placed so far
//!    (`last_placed_index`): a child that used to sit before an already
//!    placed one has moved and gets a placement. Unmatched current children
//!    are deleted afterwards.
//!
//! Mounting a subtree for the first time runs the same code without
//! tracking effects: the whole subtree is placed by its root.

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::element::{Child, Element, ElementType, Key};
use crate::fiber::{
    create_fiber_from_element, create_fiber_from_fragment, create_fiber_from_text,
    create_work_in_progress, FiberArena, FiberId, FiberProps, Flags, WorkTag,
};

/// Lookup key of a current child during list reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MapKey {
    Key(Key),
    Index(usize),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildReconciler {
    should_track_effects: bool,
    dev_warnings: bool,
}

impl ChildReconciler {
    /// Reconciler for nodes with a current copy: records placements and
    /// deletions.
    pub fn update(dev_warnings: bool) -> Self {
        Self {
            should_track_effects: true,
            dev_warnings,
        }
    }

    /// Reconciler for nodes mounting for the first time.
    pub fn mount(dev_warnings: bool) -> Self {
        Self {
            should_track_effects: false,
            dev_warnings,
        }
    }

    /// Reconcile `new_child` against the current children starting at
    /// `current_first`, returning the first new child of `return_fiber`.
    pub fn reconcile(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
        new_child: &Child,
    ) -> Option<FiberId> {
        // An unkeyed top-level fragment is transparent.
        let unwrapped;
        let new_child = match new_child {
            Child::Element(element)
                if *element.element_type() == ElementType::Fragment && element.key().is_none() =>
            {
                unwrapped = element.props().children().clone();
                &unwrapped
            }
            other => other,
        };

        match new_child {
            Child::Element(element) => {
                let fiber = self.reconcile_single_element(arena, return_fiber, current_first, element);
                Some(self.place_single_child(arena, fiber))
            }
            Child::Text(content) => {
                let fiber = self.reconcile_single_text(arena, return_fiber, current_first, content);
                Some(self.place_single_child(arena, fiber))
            }
            Child::List(children) => {
                self.reconcile_children_array(arena, return_fiber, current_first, children)
            }
            Child::Empty => {
                self.delete_remaining_children(arena, return_fiber, current_first);
                None
            }
        }
    }

    fn delete_child(&self, arena: &mut FiberArena, return_fiber: FiberId, child: FiberId) {
        if !self.should_track_effects {
            return;
        }
        let parent = &mut arena[return_fiber];
        parent.deletions.push(child);
        parent.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining_children(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
    ) {
        if !self.should_track_effects {
            return;
        }
        let mut child = current_first;
        while let Some(id) = child {
            self.delete_child(arena, return_fiber, id);
            child = arena[id].sibling;
        }
    }

    fn reconcile_single_element(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
        element: &Element,
    ) -> FiberId {
        let key = element.key();
        let mut current = current_first;

        while let Some(id) = current {
            if arena[id].key.as_ref() != key {
                // Different key: this one cannot be reused, look further.
                self.delete_child(arena, return_fiber, id);
                current = arena[id].sibling;
                continue;
            }

            if arena[id].element_type.as_ref() == Some(element.element_type()) {
                let sibling = arena[id].sibling;
                let existing = use_fiber(arena, id, element_props(element));
                let node = &mut arena[existing];
                node.return_fiber = Some(return_fiber);
                node.node_ref = element.node_ref().cloned();
                self.delete_remaining_children(arena, return_fiber, sibling);
                return existing;
            }

            // Same key, different type: nothing left is reusable.
            self.delete_remaining_children(arena, return_fiber, Some(id));
            break;
        }

        let fiber = create_fiber_from_element(arena, element);
        arena[fiber].return_fiber = Some(return_fiber);
        fiber
    }

    fn reconcile_single_text(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
        content: &Rc<str>,
    ) -> FiberId {
        let mut current = current_first;

        while let Some(id) = current {
            if arena[id].tag == WorkTag::HostText {
                let sibling = arena[id].sibling;
                let existing = use_fiber(arena, id, FiberProps::Text(Rc::clone(content)));
                arena[existing].return_fiber = Some(return_fiber);
                self.delete_remaining_children(arena, return_fiber, sibling);
                return existing;
            }
            self.delete_child(arena, return_fiber, id);
            current = arena[id].sibling;
        }

        let fiber = create_fiber_from_text(arena, Rc::clone(content));
        arena[fiber].return_fiber = Some(return_fiber);
        fiber
    }

    fn place_single_child(&self, arena: &mut FiberArena, fiber: FiberId) -> FiberId {
        if self.should_track_effects && arena[fiber].alternate.is_none() {
            arena[fiber].flags |= Flags::PLACEMENT;
        }
        fiber
    }

    fn reconcile_children_array(
        &self,
        arena: &mut FiberArena,
        return_fiber: FiberId,
        current_first: Option<FiberId>,
        children: &[Child],
    ) -> Option<FiberId> {
        let mut last_placed_index = 0;
        let mut first_new: Option<FiberId> = None;
        let mut last_new: Option<FiberId> = None;

        let mut existing: IndexMap<MapKey, FiberId> = IndexMap::new();
        let mut current = current_first;
        while let Some(id) = current {
            let node = &arena[id];
            let key = match &node.key {
                Some(key) => MapKey::Key(key.clone()),
                None => MapKey::Index(node.index),
            };
            existing.insert(key, id);
            current = node.sibling;
        }

        if self.dev_warnings {
            warn_duplicate_keys(children);
        }

        for (index, child) in children.iter().enumerate() {
            let Some(new_fiber) = self.update_from_map(arena, &mut existing, index, child) else {
                continue;
            };

            let node = &mut arena[new_fiber];
            node.index = index;
            node.return_fiber = Some(return_fiber);
            let alternate = node.alternate;

            match last_new {
                Some(last) => arena[last].sibling = Some(new_fiber),
                None => first_new = Some(new_fiber),
            }
            last_new = Some(new_fiber);

            if !self.should_track_effects {
                continue;
            }

            match alternate {
                Some(current) => {
                    let old_index = arena[current].index;
                    if old_index < last_placed_index {
                        arena[new_fiber].flags |= Flags::PLACEMENT;
                    } else {
                        last_placed_index = old_index;
                    }
                }
                None => arena[new_fiber].flags |= Flags::PLACEMENT,
            }
        }

        for (_, fiber) in existing {
            self.delete_child(arena, return_fiber, fiber);
        }

        first_new
    }

    fn update_from_map(
        &self,
        arena: &mut FiberArena,
        existing: &mut IndexMap<MapKey, FiberId>,
        index: usize,
        child: &Child,
    ) -> Option<FiberId> {
        let map_key = match child {
            Child::Element(element) => match element.key() {
                Some(key) => MapKey::Key(key.clone()),
                None => MapKey::Index(index),
            },
            _ => MapKey::Index(index),
        };
        let before = existing.get(&map_key).copied();

        match child {
            Child::Empty => None,
            Child::Text(content) => {
                if let Some(before) = before.filter(|id| arena[*id].tag == WorkTag::HostText) {
                    existing.shift_remove(&map_key);
                    return Some(use_fiber(arena, before, FiberProps::Text(Rc::clone(content))));
                }
                Some(create_fiber_from_text(arena, Rc::clone(content)))
            }
            Child::List(_) => Some(update_fragment(
                arena,
                existing,
                &map_key,
                before,
                child.clone(),
                None,
            )),
            Child::Element(element) if *element.element_type() == ElementType::Fragment => {
                Some(update_fragment(
                    arena,
                    existing,
                    &map_key,
                    before,
                    element.props().children().clone(),
                    element.key().cloned(),
                ))
            }
            Child::Element(element) => {
                let reusable = before
                    .filter(|id| arena[*id].element_type.as_ref() == Some(element.element_type()));
                if let Some(before) = reusable {
                    existing.shift_remove(&map_key);
                    let fiber = use_fiber(arena, before, element_props(element));
                    arena[fiber].node_ref = element.node_ref().cloned();
                    return Some(fiber);
                }
                Some(create_fiber_from_element(arena, element))
            }
        }
    }
}

/// Work-in-progress copy of `fiber`, detached from its old siblings.
fn use_fiber(arena: &mut FiberArena, fiber: FiberId, pending_props: FiberProps) -> FiberId {
    let clone = create_work_in_progress(arena, fiber, pending_props);
    let node = &mut arena[clone];
    node.index = 0;
    node.sibling = None;
    clone
}

fn update_fragment(
    arena: &mut FiberArena,
    existing: &mut IndexMap<MapKey, FiberId>,
    map_key: &MapKey,
    current: Option<FiberId>,
    children: Child,
    key: Option<Key>,
) -> FiberId {
    match current.filter(|id| arena[*id].tag == WorkTag::Fragment) {
        Some(current) => {
            existing.shift_remove(map_key);
            use_fiber(arena, current, FiberProps::Fragment(children))
        }
        None => create_fiber_from_fragment(arena, children, key),
    }
}

fn element_props(element: &Element) -> FiberProps {
    match element.element_type() {
        ElementType::Fragment => FiberProps::Fragment(element.props().children().clone()),
        _ => FiberProps::Element(element.props().clone()),
    }
}

fn warn_duplicate_keys(children: &[Child]) {
    let mut seen = HashSet::new();
    for child in children {
        if let Child::Element(element) = child {
            if let Some(key) = element.key() {
                if !seen.insert(key) {
                    warn!(key = key.as_str(), "duplicate key among siblings");
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::h;
    use crate::fiber::FiberNode;

    /// A committed parent with one current child per key.
    fn committed(arena: &mut FiberArena, keys: &[&str]) -> (FiberId, Vec<FiberId>) {
        let parent = arena.insert(FiberNode::new(WorkTag::HostComponent, FiberProps::Empty, None));
        let mut ids = Vec::new();
        for (index, key) in keys.iter().enumerate() {
            let element = h("li").key(*key).build();
            let id = create_fiber_from_element(arena, &element);
            arena[id].index = index;
            arena[id].return_fiber = Some(parent);
            if let Some(prev) = ids.last() {
                arena[*prev].sibling = Some(id);
            }
            ids.push(id);
        }
        arena[parent].child = ids.first().copied();
        (parent, ids)
    }

    fn keyed(keys: &[&str]) -> Child {
        Child::list(keys.iter().map(|key| h("li").key(*key).build()))
    }

    fn collect(arena: &FiberArena, first: Option<FiberId>) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut cursor = first;
        while let Some(id) = cursor {
            out.push(id);
            cursor = arena[id].sibling;
        }
        out
    }

    #[test]
    fn reorder_places_only_moved_children() {
        let mut arena = FiberArena::new();
        let (parent, _) = committed(&mut arena, &["a", "b", "c"]);
        let first = arena[parent].child;

        let reconciler = ChildReconciler::update(true);
        let new_first = reconciler.reconcile(&mut arena, parent, first, &keyed(&["b", "c", "a"]));
        let children = collect(&arena, new_first);

        assert_eq!(children.len(), 3);
        let placed: Vec<bool> = children
            .iter()
            .map(|id| arena[*id].flags.contains(Flags::PLACEMENT))
            .collect();
        assert_eq!(placed, vec![false, false, true]);
        assert!(arena[parent].deletions.is_empty());
    }

    #[test]
    fn unmatched_children_are_deleted() {
        let mut arena = FiberArena::new();
        let (parent, ids) = committed(&mut arena, &["a", "b", "c"]);
        let first = arena[parent].child;

        let reconciler = ChildReconciler::update(true);
        let new_first = reconciler.reconcile(&mut arena, parent, first, &keyed(&["c", "d"]));

        assert_eq!(collect(&arena, new_first).len(), 2);
        assert_eq!(arena[parent].deletions.as_slice(), &[ids[0], ids[1]]);
        assert!(arena[parent].flags.contains(Flags::CHILD_DELETION));
    }

    #[test]
    fn single_element_with_other_type_replaces() {
        let mut arena = FiberArena::new();
        let (parent, ids) = committed(&mut arena, &["a"]);
        let first = arena[parent].child;

        let reconciler = ChildReconciler::update(true);
        let next = Child::from(h("p").key("a").build());
        let new_first = reconciler.reconcile(&mut arena, parent, first, &next);

        let new_first = new_first.expect("child");
        assert_ne!(Some(new_first), arena[ids[0]].alternate);
        assert!(arena[new_first].flags.contains(Flags::PLACEMENT));
        assert_eq!(arena[parent].deletions.as_slice(), &[ids[0]]);
    }

    #[test]
    fn mount_does_not_track_effects() {
        let mut arena = FiberArena::new();
        let parent = arena.insert(FiberNode::new(WorkTag::HostComponent, FiberProps::Empty, None));

        let reconciler = ChildReconciler::mount(true);
        let first = reconciler.reconcile(&mut arena, parent, None, &keyed(&["a", "b"]));

        for id in collect(&arena, first) {
            assert_eq!(arena[id].flags, Flags::NONE);
            assert_eq!(arena[id].return_fiber, Some(parent));
        }
    }

    #[test]
    fn unkeyed_top_level_fragment_is_unwrapped() {
        let mut arena = FiberArena::new();
        let parent = arena.insert(FiberNode::new(WorkTag::HostComponent, FiberProps::Empty, None));
        let child = Child::from(crate::element::fragment().child(h("a")).child(h("b")).build());

        let reconciler = ChildReconciler::mount(true);
        let first = reconciler.reconcile(&mut arena, parent, None, &child);
        let children = collect(&arena, first);

        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|id| arena[*id].tag == WorkTag::HostComponent));
    }

    #[test]
    fn text_child_reuses_text_node() {
        let mut arena = FiberArena::new();
        let parent = arena.insert(FiberNode::new(WorkTag::HostComponent, FiberProps::Empty, None));
        let text = create_fiber_from_text(&mut arena, "old".into());
        arena[parent].child = Some(text);

        let reconciler = ChildReconciler::update(true);
        let first = reconciler
            .reconcile(&mut arena, parent, Some(text), &Child::from("new"))
            .expect("child");

        assert_eq!(arena[first].alternate, Some(text));
        assert_eq!(arena[first].pending_props.text(), Some("new"));
        assert!(!arena[first].flags.contains(Flags::PLACEMENT));
    }
}
