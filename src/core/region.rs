//! Coarse rectangular chunk areas.

use serde::{Serialize, Deserialize};

/// Inclusive rectangle of chunk columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkArea {
    /// Lowest chunk X.
    pub min_x: i32,
    /// Lowest chunk Z.
    pub min_z: i32,
    /// Highest chunk X (inclusive).
    pub max_x: i32,
    /// Highest chunk Z (inclusive).
    pub max_z: i32,
}

impl ChunkArea {
    /// Build an area from two corners in any order.
    pub const fn new(x1: i32, z1: i32, x2: i32, z2: i32) -> Self {
        Self {
            min_x: if x1 < x2 { x1 } else { x2 },
            min_z: if z1 < z2 { z1 } else { z2 },
            max_x: if x1 < x2 { x2 } else { x1 },
            max_z: if z1 < z2 { z2 } else { z1 },
        }
    }

    /// Whether chunk `(x, z)` lies inside the area.
    #[inline]
    pub fn contains(&self, x: i32, z: i32) -> bool {
        x >= self.min_x && x <= self.max_x && z >= self.min_z && z <= self.max_z
    }
}

/// Evaluate a list of active areas; an empty list leaves everything active.
pub fn is_active(areas: &[ChunkArea], x: i32, z: i32) -> bool {
    areas.is_empty() || areas.iter().any(|a| a.contains(x, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        let area = ChunkArea::new(-27, -27, -15, -18);
        assert!(area.contains(-27, -27));
        assert!(area.contains(-15, -18));
        assert!(!area.contains(-14, -18));
        assert!(!area.contains(-20, -17));
    }

    #[test]
    fn test_corner_order_normalised() {
        assert_eq!(ChunkArea::new(5, 5, -5, -5), ChunkArea::new(-5, -5, 5, 5));
    }

    #[test]
    fn test_empty_list_is_unrestricted() {
        assert!(is_active(&[], 1000, -1000));
        assert!(!is_active(&[ChunkArea::new(0, 0, 1, 1)], 2, 2));
    }
}
