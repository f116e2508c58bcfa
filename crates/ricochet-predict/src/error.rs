//! Errors from assembling predictor and property tables.

use std::error::Error;
use std::fmt;

/// Errors from registering species or event sources.
///
/// These are startup-time errors; the engine folds them into its
/// configuration error.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryError {
    /// A name is already registered in the same table.
    DuplicateName {
        /// Which table (`"species"`, `"interaction"`, ...).
        table: &'static str,
        /// The repeated name.
        name: String,
    },
    /// An interaction range is negative or not finite.
    InvalidRange {
        /// Name of the interaction.
        name: String,
        /// The rejected range.
        range: f64,
    },
    /// A species mass is not finite and positive.
    InvalidMass {
        /// Name of the species.
        name: String,
        /// The rejected mass.
        mass: f64,
    },
    /// A table already holds `u32::MAX` entries.
    TableFull {
        /// Which table.
        table: &'static str,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { table, name } => {
                write!(f, "{table} '{name}' is already registered")
            }
            Self::InvalidRange { name, range } => {
                write!(f, "interaction '{name}' has invalid range {range}")
            }
            Self::InvalidMass { name, mass } => {
                write!(f, "species '{name}' has invalid mass {mass}")
            }
            Self::TableFull { table } => write!(f, "{table} table is full"),
        }
    }
}

impl Error for RegistryError {}
