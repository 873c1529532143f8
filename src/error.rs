//! Error handling
use crate::model::SimulationModel;
use crate::segments::SegmentArenaError;
use coalrustts_core::PopulationId;
use coalrustts_genetics::RecombinationMapError;
use thiserror::Error;

/// Errors detected while validating a configuration.
///
/// These are always returned before any
/// simulation state is created.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigurationError {
    /// The model name is not one of `hudson`, `smc`, or `smc_prime`.
    #[error("unknown simulation model: {name:?}")]
    UnknownModel {
        /// The unrecognized name
        name: String,
    },
    /// A demographic event cannot be used with the chosen model.
    #[error("{kind} events are not supported by the {model} model")]
    UnsupportedDemographicEvent {
        /// The chosen model
        model: SimulationModel,
        /// The event kind
        kind: &'static str,
    },
    /// At least two samples are needed.
    #[error("need at least two samples, found {found}")]
    InsufficientSamples {
        /// Number of samples
        found: usize,
    },
    /// A sample time is negative or not finite.
    #[error("invalid time {time} for sample {sample}")]
    InvalidSampleTime {
        /// Index of the sample
        sample: usize,
        /// The invalid time
        time: f64,
    },
    /// A population id does not refer to a configured population.
    #[error("unknown population: {found}")]
    UnknownPopulation {
        /// The invalid id
        found: PopulationId,
    },
    /// A population size or growth rate is invalid.
    #[error("invalid parameters for population {population}: {reason}")]
    InvalidPopulationParameters {
        /// The population
        population: usize,
        /// What is wrong
        reason: String,
    },
    /// The migration matrix has the wrong shape or bad entries.
    #[error("invalid migration matrix: {reason}")]
    InvalidMigrationMatrix {
        /// What is wrong
        reason: String,
    },
    /// A demographic event has invalid parameters.
    #[error("invalid demographic event {index}: {reason}")]
    InvalidDemographicEvent {
        /// Position of the event in the input list
        index: usize,
        /// What is wrong
        reason: String,
    },
    /// The effective population size must be positive and finite.
    #[error("invalid effective population size: {found}")]
    InvalidEffectiveSize {
        /// The invalid value
        found: f64,
    },
    /// The sequence must contain at least one locus.
    #[error("invalid sequence length: {found}")]
    InvalidSequenceLength {
        /// The invalid value
        found: i64,
    },
    /// A run limit is not positive.
    #[error("invalid run limit: {reason}")]
    InvalidRunLimit {
        /// What is wrong
        reason: String,
    },
    /// A redirection of a [``RecombinationMapError``].
    #[error("{value:?}")]
    RecombinationMapError {
        /// The redirected error
        #[from]
        value: RecombinationMapError,
    },
}

/// Primary error type.
///
/// Some members of this enum implement ``From``
/// in order to redirect other error types.
#[derive(Error, Debug, PartialEq)]
pub enum CoalrusttsError {
    /// A redirection of a [``ConfigurationError``].
    #[error("{value}")]
    ConfigurationError {
        /// The redirected error
        #[from]
        value: ConfigurationError,
    },
    /// Internal state is inconsistent.
    /// The run cannot continue.
    #[error("invariant violation: {value}")]
    InvariantViolation {
        /// What went wrong
        value: String,
    },
    /// Lineages remain but no event can ever occur.
    #[error("infinite waiting time until the next event at time {time}")]
    InfiniteWaitingTime {
        /// Simulated time at which the run got stuck
        time: f64,
    },
}

impl From<SegmentArenaError> for CoalrusttsError {
    fn from(value: SegmentArenaError) -> Self {
        Self::InvariantViolation {
            value: value.to_string(),
        }
    }
}

impl From<coalrustts_core::Error> for CoalrusttsError {
    fn from(value: coalrustts_core::Error) -> Self {
        Self::InvariantViolation {
            value: value.to_string(),
        }
    }
}

pub(crate) fn invariant_violation<T, S: Into<String>>(value: S) -> Result<T, CoalrusttsError> {
    Err(CoalrusttsError::InvariantViolation {
        value: value.into(),
    })
}

/// Result type for simulation operations
pub type CoalrusttsResult<T> = std::result::Result<T, CoalrusttsError>;
