//! Generational arena of work nodes.
//!
//! Work nodes reference each other (parent, child, sibling, alternate) by
//! [`FiberId`] instead of by pointer. A slot is reused after its node is
//! freed, with a bumped generation, so a stale id never resolves to the new
//! occupant.
//!
//! Nodes are reclaimed in bulk after each commit by [`FiberArena::sweep`],
//! which keeps the committed tree plus each committed node's alternate.

use std::ops::{Index, IndexMut};

use super::{FiberId, FiberNode};

struct Slot {
    generation: u32,
    node: Option<FiberNode>,
}

/// Storage for every work node of one root.
#[derive(Default)]
pub(crate) struct FiberArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl FiberArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node and return its id.
    pub fn insert(&mut self, node: FiberNode) -> FiberId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return FiberId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        FiberId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: FiberId) -> Option<&FiberNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut FiberNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.get(id).is_some()
    }

    /// Free a node. Returns it if the id was live.
    pub fn remove(&mut self, id: FiberId) -> Option<FiberNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Free every node not reachable from `root` through `child` and
    /// `sibling` links, keeping the alternate of each reachable node.
    ///
    /// Returns the number of freed nodes.
    pub fn sweep(&mut self, root: FiberId) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            if std::mem::replace(&mut marked[id.index as usize], true) {
                continue;
            }
            if let Some(alternate) = node.alternate {
                if self.contains(alternate) {
                    marked[alternate.index as usize] = true;
                }
            }
            stack.extend(node.child);
            stack.extend(node.sibling);
        }

        let mut freed = 0;
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if slot.node.is_some() && !marked[index] {
                let id = FiberId {
                    index: index as u32,
                    generation: slot.generation,
                };
                self.remove(id);
                freed += 1;
            }
        }
        freed
    }
}

impl Index<FiberId> for FiberArena {
    type Output = FiberNode;

    fn index(&self, id: FiberId) -> &FiberNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale fiber id {id:?}"),
        }
    }
}

impl IndexMut<FiberId> for FiberArena {
    fn index_mut(&mut self, id: FiberId) -> &mut FiberNode {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale fiber id {id:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::{FiberProps, WorkTag};

    fn node() -> FiberNode {
        FiberNode::new(WorkTag::Fragment, FiberProps::Empty, None)
    }

    #[test]
    fn stale_ids_do_not_resolve() {
        let mut arena = FiberArena::new();
        let a = arena.insert(node());
        assert!(arena.remove(a).is_some());

        let b = arena.insert(node());
        assert_eq!(a.index, b.index);
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_some());
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn sweep_keeps_tree_and_alternates() {
        let mut arena = FiberArena::new();
        let root = arena.insert(node());
        let child = arena.insert(node());
        let sibling = arena.insert(node());
        let alternate = arena.insert(node());
        let orphan = arena.insert(node());

        arena[root].child = Some(child);
        arena[child].sibling = Some(sibling);
        arena[child].alternate = Some(alternate);
        arena[alternate].alternate = Some(child);
        // Alternates' own children are not retained.
        arena[alternate].child = Some(orphan);

        assert_eq!(arena.sweep(root), 1);
        assert!(arena.contains(root));
        assert!(arena.contains(child));
        assert!(arena.contains(sibling));
        assert!(arena.contains(alternate));
        assert!(!arena.contains(orphan));
    }

    #[test]
    #[should_panic(expected = "stale fiber id")]
    fn indexing_a_freed_node_panics() {
        let mut arena = FiberArena::new();
        let id = arena.insert(node());
        arena.remove(id);
        let _ = &arena[id];
    }
}
