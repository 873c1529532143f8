//! Core types for coalescent simulation
//! with tree sequence recording.
//!
//! Coordinates, times, and identifiers that the
//! other crates of the workspace pass around.

use thiserror::Error;

mod macros;
mod newtypes;
mod position;
mod time;

pub use newtypes::NodeId;
pub use newtypes::PopulationId;
pub use position::Position;
pub use time::Time;

/// Error type for conversions between
/// the newtypes and their raw representations.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    /// A position value was negative.
    #[error("invalid position: {0:?}")]
    PositionError(i64),
    /// A time value was negative or not finite.
    #[error("invalid time: {0:?}")]
    TimeError(f64),
    /// An identifier could not be converted.
    #[error("{0}")]
    ConversionError(String),
}
