use std::fmt;
use std::ops;

/// Memory event types. Native kinds and aggregate kinds occupy disjoint bit ranges.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Mmap = 1 << 0,
    Munmap = 1 << 1,
    Mremap = 1 << 2,
    Shmat = 1 << 3,
    Shmdt = 1 << 4,
    Sbrk = 1 << 5,

    VmMapped = 1 << 16,
    VmUnmapped = 1 << 17,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Mmap,
        EventKind::Munmap,
        EventKind::Mremap,
        EventKind::Shmat,
        EventKind::Shmdt,
        EventKind::Sbrk,
        EventKind::VmMapped,
        EventKind::VmUnmapped,
    ];

    pub const fn bit(self) -> u32 {
        self as u32
    }

    /// Aggregate kinds are read-only notifications derived from the native ones.
    pub const fn is_aggregate(self) -> bool {
        matches!(self, EventKind::VmMapped | EventKind::VmUnmapped)
    }

    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Mmap => "MMAP",
            EventKind::Munmap => "MUNMAP",
            EventKind::Mremap => "MREMAP",
            EventKind::Shmat => "SHMAT",
            EventKind::Shmdt => "SHMDT",
            EventKind::Sbrk => "SBRK",
            EventKind::VmMapped => "VM_MAPPED",
            EventKind::VmUnmapped => "VM_UNMAPPED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bit-mask of event kinds, as used for handler subscriptions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventSet {
    bits: u32,
}

impl EventSet {
    pub const EMPTY: EventSet = EventSet { bits: 0 };

    pub const NATIVE: EventSet = EventSet {
        bits: EventKind::Mmap.bit()
            | EventKind::Munmap.bit()
            | EventKind::Mremap.bit()
            | EventKind::Shmat.bit()
            | EventKind::Shmdt.bit()
            | EventKind::Sbrk.bit(),
    };

    pub const AGGREGATE: EventSet = EventSet {
        bits: EventKind::VmMapped.bit() | EventKind::VmUnmapped.bit(),
    };

    pub const ALL: EventSet = EventSet {
        bits: Self::NATIVE.bits | Self::AGGREGATE.bits,
    };

    /// Returns `None` if `bits` names anything besides known event kinds.
    pub const fn from_bits(bits: u32) -> Option<EventSet> {
        if bits & !Self::ALL.bits != 0 {
            return None;
        }

        Some(EventSet { bits })
    }

    pub const fn from_bits_truncate(bits: u32) -> EventSet {
        EventSet { bits: bits & Self::ALL.bits }
    }

    pub const fn bits(self) -> u32 {
        self.bits
    }

    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub const fn contains(self, kind: EventKind) -> bool {
        self.bits & kind.bit() != 0
    }

    pub const fn union(self, other: EventSet) -> EventSet {
        EventSet { bits: self.bits | other.bits }
    }

    pub const fn difference(self, other: EventSet) -> EventSet {
        EventSet { bits: self.bits & !other.bits }
    }

    pub const fn intersection(self, other: EventSet) -> EventSet {
        EventSet { bits: self.bits & other.bits }
    }

    pub fn iter(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }
}

impl From<EventKind> for EventSet {
    fn from(kind: EventKind) -> Self {
        EventSet { bits: kind.bit() }
    }
}

impl ops::BitOr for EventKind {
    type Output = EventSet;

    fn bitor(self, rhs: EventKind) -> Self::Output {
        EventSet::from(self).union(rhs.into())
    }
}

impl ops::BitOr for EventSet {
    type Output = EventSet;

    fn bitor(self, rhs: EventSet) -> Self::Output {
        self.union(rhs)
    }
}

impl ops::BitOr<EventKind> for EventSet {
    type Output = EventSet;

    fn bitor(self, rhs: EventKind) -> Self::Output {
        self.union(rhs.into())
    }
}

impl ops::BitOrAssign for EventSet {
    fn bitor_assign(&mut self, rhs: EventSet) {
        *self = self.union(rhs);
    }
}

impl ops::Sub for EventSet {
    type Output = EventSet;

    fn sub(self, rhs: EventSet) -> Self::Output {
        self.difference(rhs)
    }
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventSet(")?;
        for (index, kind) in self.iter().enumerate() {
            if index != 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", kind)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use crate::kind::{EventKind, EventSet};

    #[test]
    fn kinds_keep_their_bit_values() {
        assert_eq!(EventKind::Mmap.bit(), 0x1);
        assert_eq!(EventKind::Sbrk.bit(), 0x20);
        assert_eq!(EventKind::VmMapped.bit(), 0x10000);
        assert_eq!(EventKind::VmUnmapped.bit(), 0x20000);
    }

    #[test]
    fn native_and_aggregate_sets_are_disjoint() {
        assert!(EventSet::NATIVE.intersection(EventSet::AGGREGATE).is_empty());
        assert_eq!(EventSet::NATIVE | EventSet::AGGREGATE, EventSet::ALL);

        for kind in EventKind::ALL {
            assert_eq!(EventSet::AGGREGATE.contains(kind), kind.is_aggregate());
        }
    }

    #[test]
    fn unknown_bits_are_rejected_or_truncated() {
        assert_eq!(EventSet::from_bits(0x40), None);
        assert_eq!(EventSet::from_bits(0x3), Some(EventKind::Mmap | EventKind::Munmap));
        assert_eq!(EventSet::from_bits_truncate(0x41), EventKind::Mmap.into());
    }

    #[test]
    fn we_can_remove_kinds_from_a_set() {
        let set = EventKind::Mmap | EventKind::Munmap | EventKind::VmMapped;
        let remaining = set - EventKind::Mmap.into();

        assert!(!remaining.contains(EventKind::Mmap));
        assert!(remaining.contains(EventKind::Munmap));
        assert!(remaining.contains(EventKind::VmMapped));
        assert_eq!(remaining.iter().count(), 2);
    }

    #[test]
    fn debug_output_lists_the_kinds() {
        let set = EventKind::Mmap | EventKind::VmUnmapped;

        assert_eq!(format!("{:?}", set), "EventSet(MMAP | VM_UNMAPPED)");
        assert_eq!(format!("{:?}", EventSet::EMPTY), "EventSet()");
    }
}
