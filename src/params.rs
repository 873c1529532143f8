//! Simulation parameters and their validation.

use bitflags::bitflags;
use coalrustts_core::{PopulationId, Position};
use coalrustts_genetics::RecombinationMap;

use crate::demography::DemographicEvent;
use crate::error::{CoalrusttsResult, ConfigurationError};
use crate::model::SimulationModel;
use crate::population::{MigrationMatrix, Population, PopulationConfiguration};
use crate::simulator::Simulator;

/// Number of loci used when only a
/// total recombination rate is given.
pub const DEFAULT_SEQUENCE_LENGTH: i64 = 1_000_000;

bitflags! {
    /// Modify the behavior of a simulation.
    #[derive(Default)]
    pub struct SimulationFlags: u32
    {
        /// Record a [`MigrationRecord`](crate::MigrationRecord)
        /// for every segment of every lineage that migrates.
        const STORE_MIGRATIONS = 1 << 0;
        /// Check the internal consistency of the
        /// ancestry after every event.  This is slow.
        const VALIDATE_STATE = 1 << 1;
    }
}

/// A sampled chromosome.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sample {
    /// Population the sample is taken from
    pub population: PopulationId,
    /// Sampling time, in generations before the present
    pub time: f64,
}

impl Sample {
    /// A sample from `population`, taken `time` generations ago.
    pub fn new(population: PopulationId, time: f64) -> Self {
        Self { population, time }
    }

    /// A sample taken at time zero.
    pub fn contemporary(population: PopulationId) -> Self {
        Self::new(population, 0.0)
    }
}

/// Input to a simulation.
///
/// Times are in generations and rates are per
/// generation.  Sizes are absolute numbers of
/// individuals, relative to `effective_population_size`.
#[derive(Clone, Debug)]
pub struct SimulationParams {
    /// The sampled chromosomes, in node order.
    pub samples: Vec<Sample>,
    /// If empty, one population of the
    /// reference size is used.
    pub populations: Vec<PopulationConfiguration>,
    /// If `None`, there is no migration.
    pub migration_matrix: Option<Vec<Vec<f64>>>,
    /// Takes precedence over `recombination_rate`
    /// and `sequence_length`.
    pub recombination_map: Option<RecombinationMap>,
    /// Total rate over the whole sequence.
    pub recombination_rate: f64,
    /// Number of loci when no map is given.
    pub sequence_length: i64,
    /// Applied in time order; equal times keep input order.
    pub demographic_events: Vec<DemographicEvent>,
    /// One of `hudson`, `smc`, `smc_prime`, in any case.
    pub model: String,
    /// Seed of the random number generator.
    pub seed: u64,
    /// Reference size `Ne` that sets the time scale.
    pub effective_population_size: f64,
    /// Stop when the next event would happen after this time.
    pub max_time: Option<f64>,
    /// Stop after this many events, rejected ones included.
    pub max_events: Option<u64>,
    /// Behavior switches.
    pub flags: SimulationFlags,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            samples: vec![],
            populations: vec![],
            migration_matrix: None,
            recombination_map: None,
            recombination_rate: 0.0,
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            demographic_events: vec![],
            model: SimulationModel::Hudson.name().to_string(),
            seed: 0,
            effective_population_size: 1.0,
            max_time: None,
            max_events: None,
            flags: SimulationFlags::empty(),
        }
    }
}

/// Validated parameters in coalescent units.
#[derive(Clone, Debug)]
pub(crate) struct SimulationConfig {
    pub(crate) model: SimulationModel,
    pub(crate) flags: SimulationFlags,
    pub(crate) effective_size: f64,
    // (time, population) in input order
    pub(crate) samples: Vec<(f64, usize)>,
    pub(crate) populations: Vec<Population>,
    pub(crate) migration: MigrationMatrix,
    pub(crate) map: RecombinationMap,
    pub(crate) events: Vec<DemographicEvent>,
    pub(crate) max_time: Option<f64>,
    pub(crate) max_events: Option<u64>,
    pub(crate) seed: u64,
}

impl SimulationConfig {
    /// Factor converting coalescent time to generations.
    pub(crate) fn time_scale(&self) -> f64 {
        4.0 * self.effective_size
    }
}

impl SimulationParams {
    /// Check every parameter and convert
    /// to coalescent units.
    pub(crate) fn validate(&self) -> Result<SimulationConfig, ConfigurationError> {
        let model: SimulationModel = self.model.parse()?;

        let ne = self.effective_population_size;
        if !ne.is_finite() || ne <= 0.0 {
            return Err(ConfigurationError::InvalidEffectiveSize { found: ne });
        }
        let time_scale = 4.0 * ne;

        let populations = if self.populations.is_empty() {
            vec![Population::from_configuration(
                0,
                &PopulationConfiguration::default(),
                ne,
            )?]
        } else {
            self.populations
                .iter()
                .enumerate()
                .map(|(i, p)| Population::from_configuration(i, p, ne))
                .collect::<Result<Vec<_>, _>>()?
        };
        let num_populations = populations.len();

        if self.samples.len() < 2 {
            return Err(ConfigurationError::InsufficientSamples {
                found: self.samples.len(),
            });
        }
        let mut samples = Vec::with_capacity(self.samples.len());
        for (i, s) in self.samples.iter().enumerate() {
            if !s.time.is_finite() || s.time < 0.0 {
                return Err(ConfigurationError::InvalidSampleTime {
                    sample: i,
                    time: s.time,
                });
            }
            match usize::try_from(s.population) {
                Ok(p) if p < num_populations => samples.push((s.time / time_scale, p)),
                _ => {
                    return Err(ConfigurationError::UnknownPopulation {
                        found: s.population,
                    })
                }
            }
        }

        let migration = match &self.migration_matrix {
            None => MigrationMatrix::new(num_populations),
            Some(rows) => {
                let m = MigrationMatrix::from_rows(rows.clone())?;
                if m.num_populations() != num_populations {
                    return Err(ConfigurationError::InvalidMigrationMatrix {
                        reason: format!(
                            "{} rows for {} populations",
                            m.num_populations(),
                            num_populations
                        ),
                    });
                }
                m
            }
        };

        let map = match &self.recombination_map {
            Some(map) => map.clone(),
            None => {
                let length = match Position::try_from(self.sequence_length) {
                    Ok(length) if length > 0 => length,
                    _ => {
                        return Err(ConfigurationError::InvalidSequenceLength {
                            found: self.sequence_length,
                        })
                    }
                };
                let per_locus = self.recombination_rate / (self.sequence_length as f64);
                RecombinationMap::uniform(length, per_locus)?
            }
        };
        let map = map.scaled(time_scale)?;

        let mut events = Vec::with_capacity(self.demographic_events.len());
        for (i, e) in self.demographic_events.iter().enumerate() {
            e.validate(i, num_populations, model)?;
            events.push(e.to_coalescent_units(ne));
        }

        let max_time = match self.max_time {
            Some(t) if !t.is_finite() || t <= 0.0 => {
                return Err(ConfigurationError::InvalidRunLimit {
                    reason: format!("max_time must be positive and finite, found {}", t),
                })
            }
            Some(t) => Some(t / time_scale),
            None => None,
        };
        if self.max_events == Some(0) {
            return Err(ConfigurationError::InvalidRunLimit {
                reason: "max_events must be positive".to_string(),
            });
        }

        Ok(SimulationConfig {
            model,
            flags: self.flags,
            effective_size: ne,
            samples,
            populations,
            migration: migration.scaled(time_scale),
            map,
            events,
            max_time,
            max_events: self.max_events,
            seed: self.seed,
        })
    }
}

/// Build a [`Simulator`] step by step.
///
/// # Example
///
/// ```
/// use coalrustts::SimulationBuilder;
///
/// let mut sim = SimulationBuilder::new()
///     .sample_size(10)
///     .recombination_rate(1.0)
///     .model("SMC")
///     .seed(42)
///     .build()
///     .unwrap();
/// sim.run().unwrap();
/// assert!(sim.counters().num_common_ancestor_events() >= 9);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SimulationBuilder {
    params: SimulationParams,
}

impl From<SimulationParams> for SimulationBuilder {
    fn from(params: SimulationParams) -> Self {
        Self { params }
    }
}

impl SimulationBuilder {
    /// A builder with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// `n` contemporary samples from population 0.
    pub fn sample_size(mut self, n: usize) -> Self {
        self.params.samples = vec![Sample::contemporary(PopulationId::default()); n];
        self
    }

    /// Replace the samples.
    pub fn samples(mut self, samples: Vec<Sample>) -> Self {
        self.params.samples = samples;
        self
    }

    /// Set the initial state of each population.
    pub fn populations(mut self, populations: Vec<PopulationConfiguration>) -> Self {
        self.params.populations = populations;
        self
    }

    /// Migration rates per generation, indexed `[source][dest]`.
    pub fn migration_matrix(mut self, rows: Vec<Vec<f64>>) -> Self {
        self.params.migration_matrix = Some(rows);
        self
    }

    /// Use `map` instead of a uniform rate.
    pub fn recombination_map(mut self, map: RecombinationMap) -> Self {
        self.params.recombination_map = Some(map);
        self
    }

    /// Total recombination rate per generation, spread
    /// uniformly over [`Self::sequence_length`] loci.
    pub fn recombination_rate(mut self, rate: f64) -> Self {
        self.params.recombination_rate = rate;
        self
    }

    /// Number of loci used with [`Self::recombination_rate`].
    pub fn sequence_length(mut self, length: i64) -> Self {
        self.params.sequence_length = length;
        self
    }

    /// Replace the demographic events.
    pub fn demographic_events(mut self, events: Vec<DemographicEvent>) -> Self {
        self.params.demographic_events = events;
        self
    }

    /// Select the model by name.  Checked when building.
    pub fn model<S: Into<String>>(mut self, name: S) -> Self {
        self.params.model = name.into();
        self
    }

    /// Seed of the random number generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    /// The reference size `Ne`.
    pub fn effective_population_size(mut self, size: f64) -> Self {
        self.params.effective_population_size = size;
        self
    }

    /// Stop at `time` generations.
    pub fn max_time(mut self, time: f64) -> Self {
        self.params.max_time = Some(time);
        self
    }

    /// Stop after `events` events.
    pub fn max_events(mut self, events: u64) -> Self {
        self.params.max_events = Some(events);
        self
    }

    /// Set the [`SimulationFlags`].
    pub fn flags(mut self, flags: SimulationFlags) -> Self {
        self.params.flags = flags;
        self
    }

    /// The parameters collected so far.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Check the configuration without building anything.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.params.validate().map(|_| ())
    }

    /// Validate the configuration and create a simulator.
    ///
    /// # Errors
    ///
    /// [`CoalrusttsError::ConfigurationError`](crate::CoalrusttsError::ConfigurationError)
    /// for any invalid parameter.  No simulation state
    /// exists when this happens.
    pub fn build(self) -> CoalrusttsResult<Simulator> {
        let config = self.params.validate()?;
        Simulator::new(config)
    }
}
