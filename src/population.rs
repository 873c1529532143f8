//! Population parameters and migration rates.
//!
//! Values stored here are in coalescent units:
//! times in units of `4Ne` generations, sizes
//! relative to `Ne`, rates multiplied by `4Ne`.

use crate::error::ConfigurationError;

/// User-facing parameters of one population.
///
/// `initial_size` is an absolute size and
/// `growth_rate` is per generation.  A size of
/// `None` means the reference effective size.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct PopulationConfiguration {
    /// Size at time zero
    pub initial_size: Option<f64>,
    /// Exponential growth rate
    pub growth_rate: f64,
}

impl PopulationConfiguration {
    /// A population of `initial_size` with no growth.
    pub fn new(initial_size: f64) -> Self {
        Self {
            initial_size: Some(initial_size),
            growth_rate: 0.0,
        }
    }

    /// Set the growth rate.
    pub fn growth_rate(self, growth_rate: f64) -> Self {
        Self {
            growth_rate,
            ..self
        }
    }
}

/// The state of a population during a run.
///
/// The size at time `t` is
/// `initial_size * exp(-growth_rate * (t - start_time))`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Population {
    pub(crate) initial_size: f64,
    pub(crate) growth_rate: f64,
    pub(crate) start_time: f64,
}

impl Population {
    pub(crate) fn from_configuration(
        index: usize,
        config: &PopulationConfiguration,
        effective_size: f64,
    ) -> Result<Self, ConfigurationError> {
        let size = config.initial_size.unwrap_or(effective_size);
        validate_size(index, size)?;
        validate_growth_rate(index, config.growth_rate)?;
        Ok(Self {
            initial_size: size / effective_size,
            growth_rate: config.growth_rate * 4.0 * effective_size,
            start_time: 0.0,
        })
    }

    /// Relative size at (scaled) time `t`.
    pub fn size_at(&self, t: f64) -> f64 {
        self.initial_size * (-self.growth_rate * (t - self.start_time)).exp()
    }

    /// Relative size when the current parameters took effect.
    pub fn initial_size(&self) -> f64 {
        self.initial_size
    }

    /// Growth rate, in coalescent units.
    pub fn growth_rate(&self) -> f64 {
        self.growth_rate
    }

    /// Change parameters at time `t`.
    ///
    /// When no new size is given, the size the
    /// population has reached at `t` is kept so
    /// that the size trajectory stays continuous.
    pub(crate) fn set_parameters(&mut self, t: f64, size: Option<f64>, growth_rate: Option<f64>) {
        self.initial_size = match size {
            Some(s) => s,
            None => self.size_at(t),
        };
        if let Some(g) = growth_rate {
            self.growth_rate = g;
        }
        self.start_time = t;
    }

    /// Waiting time from `t` until the next common ancestor
    /// event given an exponential draw `u` with mean `1/lambda`,
    /// where `lambda` is the number of lineage pairs.
    ///
    /// Returns `f64::INFINITY` if, under shrinking
    /// backwards in time, no event ever happens.
    pub(crate) fn common_ancestor_waiting_time(&self, t: f64, u: f64) -> f64 {
        if self.growth_rate == 0.0 {
            self.initial_size * u
        } else {
            let dt = t - self.start_time;
            let z = 1.0
                + self.growth_rate * self.initial_size * (-self.growth_rate * dt).exp() * u;
            if z > 0.0 {
                z.ln() / self.growth_rate
            } else {
                f64::INFINITY
            }
        }
    }
}

pub(crate) fn validate_size(index: usize, size: f64) -> Result<(), ConfigurationError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(ConfigurationError::InvalidPopulationParameters {
            population: index,
            reason: format!("size must be positive and finite, found {}", size),
        });
    }
    Ok(())
}

pub(crate) fn validate_growth_rate(index: usize, rate: f64) -> Result<(), ConfigurationError> {
    if !rate.is_finite() {
        return Err(ConfigurationError::InvalidPopulationParameters {
            population: index,
            reason: format!("growth rate must be finite, found {}", rate),
        });
    }
    Ok(())
}

/// Square matrix of migration rates.
///
/// Entry `(j, k)` is the rate at which a lineage in
/// population `j` moves to population `k`, looking
/// backwards in time.  Diagonal entries are zero.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MigrationMatrix {
    num_populations: usize,
    rates: Vec<f64>,
}

impl MigrationMatrix {
    /// All rates zero.
    pub fn new(num_populations: usize) -> Self {
        Self {
            num_populations,
            rates: vec![0.0; num_populations * num_populations],
        }
    }

    /// Build from rows.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidMigrationMatrix`] if the matrix is
    /// not square, has a non-zero diagonal, or contains
    /// negative or non-finite rates.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ConfigurationError> {
        let n = rows.len();
        let mut rates = Vec::with_capacity(n * n);
        for (j, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(ConfigurationError::InvalidMigrationMatrix {
                    reason: format!("row {} has {} entries, expected {}", j, row.len(), n),
                });
            }
            for (k, rate) in row.into_iter().enumerate() {
                validate_migration_rate(j, k, rate)?;
                if j == k && rate != 0.0 {
                    return Err(ConfigurationError::InvalidMigrationMatrix {
                        reason: format!("diagonal entry {} is non-zero", j),
                    });
                }
                rates.push(rate);
            }
        }
        Ok(Self {
            num_populations: n,
            rates,
        })
    }

    /// Number of rows (and columns).
    pub fn num_populations(&self) -> usize {
        self.num_populations
    }

    /// Rate of moving from `source` to `dest`.
    pub fn get(&self, source: usize, dest: usize) -> f64 {
        self.rates[source * self.num_populations + dest]
    }

    pub(crate) fn set(&mut self, source: usize, dest: usize, rate: f64) {
        self.rates[source * self.num_populations + dest] = rate;
    }

    /// Set every off-diagonal entry.
    pub(crate) fn set_all(&mut self, rate: f64) {
        for j in 0..self.num_populations {
            for k in 0..self.num_populations {
                if j != k {
                    self.set(j, k, rate);
                }
            }
        }
    }

    pub(crate) fn scaled(&self, factor: f64) -> Self {
        Self {
            num_populations: self.num_populations,
            rates: self.rates.iter().map(|r| r * factor).collect(),
        }
    }

    /// Non-zero entries as `(source, dest, rate)`,
    /// in row-major order.
    pub(crate) fn nonzero(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let n = self.num_populations;
        self.rates
            .iter()
            .enumerate()
            .filter(|(_, r)| **r > 0.0)
            .map(move |(i, r)| (i / n, i % n, *r))
    }
}

pub(crate) fn validate_migration_rate(
    source: usize,
    dest: usize,
    rate: f64,
) -> Result<(), ConfigurationError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(ConfigurationError::InvalidMigrationMatrix {
            reason: format!("invalid rate {} for entry ({}, {})", rate, source, dest),
        });
    }
    Ok(())
}

/// Population parameters and the current time
/// of one run.  Nothing here is shared between runs.
#[derive(Clone, Debug)]
pub(crate) struct RunContext {
    pub(crate) time: f64,
    pub(crate) populations: Vec<Population>,
    pub(crate) migration: MigrationMatrix,
}
