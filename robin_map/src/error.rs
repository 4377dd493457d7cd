//! Errors reported by capacity changes of a [`RobinMap`](crate::RobinMap).
use std::fmt;

use crate::{MAX_SIZE_EXP, MIN_SIZE_EXP};

/// Error cases for operations that change the capacity of a [`RobinMap`](crate::RobinMap).
///
/// When one of these is returned, the map is left unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableError {
    /// The table would have to grow beyond [`MAX_SIZE_EXP`], or beyond what the target's address
    /// space can hold.
    CapacityExhausted {
        /// The capacity exponent that was needed.
        size_exp: u32,
    },
    /// A reservation below [`MIN_SIZE_EXP`] was requested.
    InvalidReservation {
        /// The requested capacity exponent.
        size_exp: u32,
    },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::CapacityExhausted { size_exp } => write!(
                f,
                "capacity exponent {size_exp} exceeds the maximum of {MAX_SIZE_EXP}"
            ),
            TableError::InvalidReservation { size_exp } => write!(
                f,
                "cannot reserve capacity exponent {size_exp}, the minimum is {MIN_SIZE_EXP}"
            ),
        }
    }
}

impl std::error::Error for TableError {}
