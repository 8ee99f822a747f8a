//! Effect flags.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Side effects a work node carries into commit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Insert (or move) the node's host content.
    pub const PLACEMENT: Flags = Flags(1 << 0);
    /// Host attributes or text content changed.
    pub const UPDATE: Flags = Flags(1 << 1);
    /// `deletions` holds children to remove.
    pub const CHILD_DELETION: Flags = Flags(1 << 2);
    /// A function component has effects to run after commit.
    pub const PASSIVE_EFFECT: Flags = Flags(1 << 3);
    /// A host element's ref must be detached and re-attached.
    pub const REF: Flags = Flags(1 << 4);
    /// An offscreen subtree flipped between hidden and visible.
    pub const VISIBILITY: Flags = Flags(1 << 5);
    /// A suspense boundary is rendering its fallback for a captured suspend.
    pub const DID_CAPTURE: Flags = Flags(1 << 6);
    /// A suspense boundary was asked to capture during unwind.
    pub const SHOULD_CAPTURE: Flags = Flags(1 << 7);

    pub const MUTATION_MASK: Flags = Flags(
        Self::PLACEMENT.0 | Self::UPDATE.0 | Self::CHILD_DELETION.0 | Self::REF.0 | Self::VISIBILITY.0,
    );
    pub const PASSIVE_MASK: Flags = Flags(Self::PASSIVE_EFFECT.0 | Self::CHILD_DELETION.0);
    pub const LAYOUT_MASK: Flags = Self::REF;

    pub const fn union(self, other: Flags) -> Flags {
        Flags(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` when all of `other` is set.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` when any of `other` is set.
    pub const fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flags {
    type Output = Flags;

    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

impl Not for Flags {
    type Output = Flags;

    fn not(self) -> Flags {
        Flags(!self.0)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Flags, &str); 8] = [
            (Flags::PLACEMENT, "Placement"),
            (Flags::UPDATE, "Update"),
            (Flags::CHILD_DELETION, "ChildDeletion"),
            (Flags::PASSIVE_EFFECT, "PassiveEffect"),
            (Flags::REF, "Ref"),
            (Flags::VISIBILITY, "Visibility"),
            (Flags::DID_CAPTURE, "DidCapture"),
            (Flags::SHOULD_CAPTURE, "ShouldCapture"),
        ];

        if self.is_empty() {
            return f.write_str("NoFlags");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks() {
        assert!(Flags::MUTATION_MASK.contains(Flags::PLACEMENT | Flags::VISIBILITY));
        assert!(!Flags::MUTATION_MASK.intersects(Flags::PASSIVE_EFFECT));
        assert!(Flags::PASSIVE_MASK.intersects(Flags::CHILD_DELETION));
        assert_eq!(Flags::LAYOUT_MASK, Flags::REF);
    }

    #[test]
    fn union_and_remove() {
        let mut flags = Flags::NONE;
        flags |= Flags::UPDATE | Flags::REF;
        flags.remove(Flags::UPDATE);
        assert_eq!(flags, Flags::REF);
        assert_eq!(format!("{:?}", flags | Flags::PLACEMENT), "Placement | Ref");
        assert_eq!(format!("{:?}", Flags::NONE), "NoFlags");
    }
}
