//! Pending change kinds and how a newer change supersedes an older one.

use serde::{Deserialize, Serialize};

/// What happened to an item since the last session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChangeKind {
    Added = 1,
    Modified = 2,
    Deleted = 3,
    SoftDeleted = 4,
}

impl ChangeKind {
    /// Convert to u8 for storage.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Added),
            2 => Some(Self::Modified),
            3 => Some(Self::Deleted),
            4 => Some(Self::SoftDeleted),
            _ => None,
        }
    }

    pub fn is_delete(self) -> bool {
        matches!(self, Self::Deleted | Self::SoftDeleted)
    }

    /// Combine a pending change with a newer one for the same item.
    ///
    /// Returns `None` when the two cancel out: an item added and deleted
    /// before the peer ever saw it needs no change at all.
    pub fn supersede(previous: ChangeKind, next: ChangeKind) -> Option<ChangeKind> {
        match (previous, next) {
            (Self::Added, Self::Modified) => Some(Self::Added),
            (Self::Added, n) if n.is_delete() => None,
            (p, Self::Added) if p.is_delete() => Some(Self::Modified),
            (_, n) => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_supersede_rules() {
        use ChangeKind::*;
        assert_eq!(ChangeKind::supersede(Added, Modified), Some(Added));
        assert_eq!(ChangeKind::supersede(Added, Deleted), None);
        assert_eq!(ChangeKind::supersede(Added, SoftDeleted), None);
        assert_eq!(ChangeKind::supersede(Deleted, Added), Some(Modified));
        assert_eq!(ChangeKind::supersede(Modified, Deleted), Some(Deleted));
        assert_eq!(ChangeKind::supersede(Modified, Modified), Some(Modified));
        assert_eq!(ChangeKind::supersede(SoftDeleted, Deleted), Some(Deleted));
    }

    #[test]
    fn test_u8_roundtrip() {
        for kind in [
            ChangeKind::Added,
            ChangeKind::Modified,
            ChangeKind::Deleted,
            ChangeKind::SoftDeleted,
        ] {
            assert_eq!(ChangeKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(ChangeKind::from_u8(0), None);
    }

    fn kind() -> impl Strategy<Value = ChangeKind> {
        prop_oneof![
            Just(ChangeKind::Added),
            Just(ChangeKind::Modified),
            Just(ChangeKind::Deleted),
            Just(ChangeKind::SoftDeleted),
        ]
    }

    proptest! {
        #[test]
        fn later_delete_always_wins_or_cancels(prev in kind(), next in kind()) {
            if let Some(merged) = ChangeKind::supersede(prev, next) {
                if next.is_delete() {
                    prop_assert_eq!(merged, next);
                }
            } else {
                prop_assert_eq!(prev, ChangeKind::Added);
                prop_assert!(next.is_delete());
            }
        }
    }
}
