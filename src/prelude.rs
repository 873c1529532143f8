//! The crate prelude
//!
//! # Example
//! ```
//! use coalrustts::prelude::*;
//! ```

pub use crate::{
    CoalescenceRecord, CoalrusttsError, ConfigurationError, DemographicEvent, NodeId,
    PopulationConfiguration, PopulationId, Position, RecombinationMap, RunOutcome, Sample,
    SimulationBuilder, SimulationFlags, SimulationModel, SimulationOutput, Time,
};
