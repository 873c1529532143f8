#![warn(missing_docs)]

//! Coalescent simulation with recombination.
//!
//! # Overview
//!
//! This crate simulates the ancestry of a sample of
//! chromosomes backwards in time.  The output is a stream
//! of coalescence records that together describe the
//! genealogical trees along the chromosome.
//!
//! Three models are available: the exact coalescent with
//! recombination (`hudson`) and two sequentially Markov
//! approximations (`smc` and `smc_prime`).  Populations may
//! change size, grow exponentially, exchange migrants, and
//! pass through bottlenecks.
//!
//! # Example
//!
//! ```
//! use coalrustts::prelude::*;
//!
//! let output = SimulationBuilder::new()
//!     .sample_size(10)
//!     .recombination_rate(5.0)
//!     .seed(1)
//!     .build()
//!     .unwrap()
//!     .simulate()
//!     .unwrap();
//! assert!(output.check_records().is_ok());
//! ```
//!
//! # Units
//!
//! Times are in generations, rates are per generation, and
//! population sizes are absolute.  Internally, time is measured
//! in units of `4Ne` generations, where `Ne` is the reference
//! effective population size.
//!
//! # Logging
//!
//! Progress is reported through the [`log`] crate.
//! No logger is installed by this crate.

mod ancestry;
mod demography;
mod error;
mod fenwick;
mod model;
mod overlap;
mod params;
mod population;
pub mod prelude;
mod records;
mod replicates;
mod segments;
mod simulator;

pub use ancestry::AncestryState;
pub use coalrustts_core::{NodeId, PopulationId, Position, Time};
pub use coalrustts_genetics::{
    RecombinationMap, RecombinationMapBuilder, RecombinationMapError, RecombinationRegion,
};
pub use demography::{DemographicEvent, DemographicEventKind, DemographicEventQueue};
pub use error::{CoalrusttsError, CoalrusttsResult, ConfigurationError};
pub use model::SimulationModel;
pub use params::{
    Sample, SimulationBuilder, SimulationFlags, SimulationParams, DEFAULT_SEQUENCE_LENGTH,
};
pub use population::{MigrationMatrix, Population, PopulationConfiguration};
pub use records::{
    validate_records, CoalescenceRecord, CoalescenceRecordSink, EventCounters, MigrationRecord,
    Node, NodeFlags, RecordsError,
};
pub use replicates::Replicates;
pub use simulator::{RunOutcome, SimulationOutput, SimulationStatus, Simulator};

/// Get the coalrustts version number.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
