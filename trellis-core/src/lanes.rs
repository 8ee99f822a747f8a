//! Lane Model
//!
//! A lane is a single-bit priority token attached to every update. A set of
//! lanes is the bitwise union of several tokens. Lower bit positions carry
//! higher priority, so the highest-priority lane of a set is always its
//! lowest set bit.
//!
//! # How Lanes Are Used
//!
//! 1. Every dispatched update is tagged with exactly one lane.
//!
//! 2. The lane is unioned into the owning node's `lanes`, into every
//!    ancestor's `child_lanes`, and into the root's `pending_lanes`.
//!
//! 3. The driver picks the next lane to render with [`next_lane`], and the
//!    render pass only applies updates whose lane is part of that selection.
//!
//! 4. Suspended lanes are parked until a ping marks them eligible again.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use crate::scheduler::Priority;

/// A bitset of priority lanes.
///
/// `Lanes` doubles as the type of a single lane; a single lane is simply a
/// set with one bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Lanes(u32);

/// A single lane. Same representation as a lane set.
pub type Lane = Lanes;

impl Lanes {
    /// The empty set. Also used as the "no lane" marker for updates that
    /// must be recorded but never force a render.
    pub const NONE: Lanes = Lanes(0);
    pub const SYNC: Lanes = Lanes(0b00001);
    pub const INPUT_CONTINUOUS: Lanes = Lanes(0b00010);
    pub const DEFAULT: Lanes = Lanes(0b00100);
    pub const TRANSITION: Lanes = Lanes(0b01000);
    pub const IDLE: Lanes = Lanes(0b10000);

    /// Build a lane set from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit representation.
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Union of two lane sets.
    pub const fn merge(self, other: Lanes) -> Lanes {
        Lanes(self.0 | other.0)
    }

    /// The highest-priority lane in this set (its lowest set bit).
    pub const fn highest_priority(self) -> Lane {
        Lanes(self.0 & self.0.wrapping_neg())
    }

    /// `true` when every bit of `subset` is also in `self`.
    ///
    /// The empty set is a subset of everything, which is what lets
    /// updates tagged with [`Lanes::NONE`] apply in any render pass.
    pub const fn contains(self, subset: Lanes) -> bool {
        self.0 & subset.0 == subset.0
    }

    /// `true` when the two sets share at least one lane.
    pub const fn intersects(self, other: Lanes) -> bool {
        self.0 & other.0 != 0
    }

    /// Set difference.
    pub const fn remove(self, other: Lanes) -> Lanes {
        Lanes(self.0 & !other.0)
    }

    /// Scheduler priority used when this lane is handed to the cooperative
    /// scheduler.
    pub fn to_priority(self) -> Priority {
        let lane = self.highest_priority();
        if lane == Lanes::SYNC {
            Priority::Immediate
        } else if lane == Lanes::INPUT_CONTINUOUS {
            Priority::UserBlocking
        } else if lane == Lanes::DEFAULT {
            Priority::Normal
        } else {
            Priority::Idle
        }
    }

    /// Lane assigned to an update dispatched while the scheduler runs at
    /// `priority`.
    pub fn from_priority(priority: Priority) -> Lane {
        match priority {
            Priority::Immediate => Lanes::SYNC,
            Priority::UserBlocking => Lanes::INPUT_CONTINUOUS,
            Priority::Normal => Lanes::DEFAULT,
            Priority::Low | Priority::Idle => Lanes::IDLE,
        }
    }
}

impl BitOr for Lanes {
    type Output = Lanes;

    fn bitor(self, rhs: Lanes) -> Lanes {
        self.merge(rhs)
    }
}

impl BitOrAssign for Lanes {
    fn bitor_assign(&mut self, rhs: Lanes) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Lanes {
    type Output = Lanes;

    fn bitand(self, rhs: Lanes) -> Lanes {
        Lanes(self.0 & rhs.0)
    }
}

impl BitAndAssign for Lanes {
    fn bitand_assign(&mut self, rhs: Lanes) {
        self.0 &= rhs.0;
    }
}

impl Not for Lanes {
    type Output = Lanes;

    fn not(self) -> Lanes {
        Lanes(!self.0)
    }
}

impl fmt::Debug for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lanes({:#07b})", self.0)
    }
}

/// Root-level lane bookkeeping, split out so the selection policy can be
/// exercised without a full root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootLanes {
    pub pending: Lanes,
    pub suspended: Lanes,
    pub pinged: Lanes,
}

impl RootLanes {
    /// Record a new update at `lane`. A fresh update may no longer suspend,
    /// so the lane becomes eligible again.
    pub fn mark_updated(&mut self, lane: Lane) {
        self.pending |= lane;
        self.suspended = self.suspended.remove(lane);
        self.pinged = self.pinged.remove(lane);
    }

    /// Park `lane` until something pings it.
    pub fn mark_suspended(&mut self, lane: Lane) {
        self.suspended |= lane;
        self.pinged = self.pinged.remove(lane);
    }

    /// A dependency awaited by `lane` settled.
    pub fn mark_pinged(&mut self, lane: Lane) {
        self.pinged |= self.suspended & lane;
    }

    /// A commit at `lane` succeeded. Suspension bookkeeping from earlier
    /// passes no longer applies.
    pub fn mark_finished(&mut self, lane: Lane) {
        self.pending = self.pending.remove(lane);
        self.suspended = Lanes::NONE;
        self.pinged = Lanes::NONE;
    }

    /// Pick the lane the next render pass should service.
    pub fn next_lane(&self) -> Lane {
        next_lane(self.pending, self.suspended, self.pinged)
    }
}

/// Lane selection policy.
///
/// Unsuspended pending work wins; pinged lanes are retried only when
/// nothing else is eligible.
pub fn next_lane(pending: Lanes, suspended: Lanes, pinged: Lanes) -> Lane {
    if pending.is_empty() {
        return Lanes::NONE;
    }

    let unsuspended = pending.remove(suspended);
    if !unsuspended.is_empty() {
        return unsuspended.highest_priority();
    }

    (pending & pinged).highest_priority()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
