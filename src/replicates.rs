//! Independent replicate runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{CoalrusttsResult, ConfigurationError};
use crate::params::{SimulationBuilder, SimulationConfig};
use crate::simulator::Simulator;

/// Creates independent simulators for one configuration.
///
/// The seed of each replicate is drawn from a generator
/// seeded with the configured seed, so a sequence of
/// replicates is reproducible.  Replicates share no state
/// and may be run on separate threads.
///
/// ```
/// use coalrustts::{Replicates, SimulationBuilder};
///
/// let builder = SimulationBuilder::new().sample_size(4).seed(11);
/// let replicates = Replicates::new(builder, 3).unwrap();
/// let outputs = replicates
///     .map(|sim| sim.and_then(|s| s.simulate()))
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
/// assert_eq!(outputs.len(), 3);
/// ```
pub struct Replicates {
    config: SimulationConfig,
    seeds: StdRng,
    remaining: usize,
}

impl Replicates {
    /// Validate `builder` once and prepare
    /// `num_replicates` runs.
    pub fn new(builder: SimulationBuilder, num_replicates: usize) -> Result<Self, ConfigurationError> {
        let config = builder.params().validate()?;
        let seeds = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            seeds,
            remaining: num_replicates,
        })
    }
}

impl Iterator for Replicates {
    type Item = CoalrusttsResult<Simulator>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let mut config = self.config.clone();
        config.seed = self.seeds.gen();
        Some(Simulator::new(config))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Replicates {}
