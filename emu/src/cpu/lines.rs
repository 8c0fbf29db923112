use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// External (virtual) lines of the core.
///
/// These resemble the physical pins but without high/low fidelity: a set bit
/// always means "the function is active".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lines(u8);

impl Lines {
    pub const NONE: Self = Self(0);
    pub const FIQ: Self = Self(1 << 0);
    pub const IRQ: Self = Self(1 << 1);
    pub const HALT: Self = Self(1 << 2);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for Lines {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_set_operations() {
        let mut lines = Lines::NONE;
        lines.insert(Lines::IRQ | Lines::HALT);

        assert!(lines.contains(Lines::IRQ));
        assert!(lines.intersects(Lines::FIQ | Lines::HALT));
        assert!(!lines.contains(Lines::FIQ | Lines::HALT));

        lines.remove(Lines::HALT);
        assert_eq!(lines, Lines::IRQ);
    }
}
