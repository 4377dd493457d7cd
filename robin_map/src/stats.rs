//! Diagnostic snapshots of a table's occupancy.
use std::fmt;

/// Occupancy snapshot of a [`RobinMap`](crate::RobinMap), see [`stats`](crate::RobinMap::stats).
///
/// Intended for logging and tests, the exact growth and shrink points are not part of the map's
/// contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableStats {
    /// Number of live entries.
    pub members: usize,
    /// Number of deleted slots that still take part in probing.
    pub tombstones: usize,
    /// Number of slots.
    pub capacity: usize,
    /// Number of live entries the table holds before it grows.
    pub max_live: usize,
    /// Current capacity exponent, `capacity == 2 << size_exp`.
    pub size_exp: u32,
    /// Capacity exponent the table never shrinks below.
    pub reserve_exp: u32,
    /// Largest probe distance stored in any occupied slot.
    pub max_probe_distance: u8,
    /// Number of rebuilds since the map was created.
    pub rebuilds: usize,
}

impl TableStats {
    /// Fraction of slots holding live entries.
    pub fn load_factor(&self) -> f64 {
        self.members as f64 / self.capacity as f64
    }

    /// Fraction of slots that are either live or tombstones.
    pub fn occupancy(&self) -> f64 {
        (self.members + self.tombstones) as f64 / self.capacity as f64
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "load:       {:5.1}% ({:.1}% incl. tombstones)",
            self.load_factor() * 100.0,
            self.occupancy() * 100.0
        )?;
        writeln!(f, "members:    {} of {}", self.members, self.max_live)?;
        writeln!(f, "tombstones: {}", self.tombstones)?;
        writeln!(f, "capacity:   {} (size_exp {})", self.capacity, self.size_exp)?;
        writeln!(f, "reserve:    size_exp {}", self.reserve_exp)?;
        writeln!(f, "max probe:  {}", self.max_probe_distance)?;
        write!(f, "rebuilds:   {}", self.rebuilds)
    }
}
