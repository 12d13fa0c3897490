//! Byte and row/column position arithmetic.
//!
//! Every position in this crate is tracked in two coordinate systems at once:
//! a byte offset and a [`Point`] (row plus column-in-bytes). A [`Length`]
//! bundles the two so that spans can be added and subtracted without
//! re-scanning the source text.

use std::ops::{Add, AddAssign, Sub};

/// A row/column position. Columns are measured in bytes from the start of
/// the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const ZERO: Self = Self { row: 0, column: 0 };

    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Saturating relative subtraction: the result is `self` expressed
    /// relative to `other`, assuming `other` does not come after `self`.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if self.row > other.row {
            Self::new(self.row - other.row, self.column)
        } else {
            Self::new(0, self.column.saturating_sub(other.column))
        }
    }
}

impl Add for Point {
    type Output = Self;

    /// Relative addition: `other` is interpreted as an extent starting at
    /// `self`, so a multi-row extent resets the column.
    fn add(self, other: Self) -> Self {
        if other.row > 0 {
            Self::new(self.row + other.row, other.column)
        } else {
            Self::new(self.row, self.column + other.column)
        }
    }
}

/// A span length: a byte count paired with its row/column extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Length {
    pub bytes: u32,
    pub extent: Point,
}

impl Length {
    pub const ZERO: Self = Self {
        bytes: 0,
        extent: Point::ZERO,
    };

    #[must_use]
    pub const fn new(bytes: u32, extent: Point) -> Self {
        Self { bytes, extent }
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.bytes == 0
    }

    /// Saturating subtraction, used when an edit may extend past the span
    /// it is being clamped against.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            bytes: self.bytes.saturating_sub(other.bytes),
            extent: self.extent.saturating_sub(other.extent),
        }
    }
}

impl Add for Length {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            bytes: self.bytes + other.bytes,
            extent: self.extent + other.extent,
        }
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Length {
    type Output = Self;

    /// `other` must be a prefix of `self`.
    fn sub(self, other: Self) -> Self {
        Self {
            bytes: self.bytes - other.bytes,
            extent: self.extent.saturating_sub(other.extent),
        }
    }
}
