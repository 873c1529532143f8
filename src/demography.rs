//! Demographic events and the queue that
//! releases them in time order.

use std::collections::VecDeque;

use coalrustts_core::{PopulationId, Time};
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Exp;

use crate::ancestry::{AncestryState, LineageId};
use crate::error::{invariant_violation, CoalrusttsResult, ConfigurationError};
use crate::model::SimulationModel;
use crate::population::{validate_growth_rate, validate_migration_rate, validate_size, RunContext};
use crate::records::CoalescenceRecordSink;

/// The kinds of [`DemographicEvent`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DemographicEventKind {
    /// See [`DemographicEvent::PopulationParametersChange`]
    PopulationParametersChange,
    /// See [`DemographicEvent::MigrationRateChange`]
    MigrationRateChange,
    /// See [`DemographicEvent::MassMigration`]
    MassMigration,
    /// See [`DemographicEvent::SimpleBottleneck`]
    SimpleBottleneck,
    /// See [`DemographicEvent::InstantaneousBottleneck`]
    InstantaneousBottleneck,
}

impl DemographicEventKind {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::PopulationParametersChange => "population_parameters_change",
            Self::MigrationRateChange => "migration_rate_change",
            Self::MassMigration => "mass_migration",
            Self::SimpleBottleneck => "simple_bottleneck",
            Self::InstantaneousBottleneck => "instantaneous_bottleneck",
        }
    }
}

impl std::fmt::Display for DemographicEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A change to the demography at a fixed time.
///
/// Times are in generations before the present,
/// sizes are absolute, and rates are per generation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DemographicEvent {
    /// Change the size and/or growth rate of one
    /// population, or of all populations if
    /// `population` is `None`.
    PopulationParametersChange {
        /// When the change happens
        time: f64,
        /// The affected population
        population: Option<PopulationId>,
        /// New size.  If `None`, the size reached
        /// at `time` is kept.
        initial_size: Option<f64>,
        /// New growth rate.  If `None`, unchanged.
        growth_rate: Option<f64>,
    },
    /// Change entry `(source, dest)` of the migration
    /// matrix, or all off-diagonal entries if
    /// `matrix_index` is `None`.
    MigrationRateChange {
        /// When the change happens
        time: f64,
        /// `(source, dest)`
        matrix_index: Option<(PopulationId, PopulationId)>,
        /// The new rate
        rate: f64,
    },
    /// Each lineage in `source` moves to `dest`
    /// with probability `proportion`.
    MassMigration {
        /// When the event happens
        time: f64,
        /// Population lineages leave
        source: PopulationId,
        /// Population lineages enter
        dest: PopulationId,
        /// Probability that a lineage moves
        proportion: f64,
    },
    /// Each lineage in `population` is chosen with
    /// probability `proportion` and all chosen lineages
    /// merge into a single common ancestor.
    SimpleBottleneck {
        /// When the event happens
        time: f64,
        /// The affected population
        population: PopulationId,
        /// Probability that a lineage takes part
        proportion: f64,
    },
    /// Lineages in `population` coalesce as in a
    /// Kingman coalescent run for `strength` generations,
    /// all at the instant of the event.
    InstantaneousBottleneck {
        /// When the event happens
        time: f64,
        /// The affected population
        population: PopulationId,
        /// Length of the compressed coalescent, in generations
        strength: f64,
    },
}

fn population_index(
    index: usize,
    population: PopulationId,
    num_populations: usize,
) -> Result<usize, ConfigurationError> {
    match usize::try_from(population) {
        Ok(p) if p < num_populations => Ok(p),
        _ => Err(ConfigurationError::InvalidDemographicEvent {
            index,
            reason: format!("unknown population {}", population),
        }),
    }
}

fn validate_proportion(index: usize, proportion: f64) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&proportion) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidDemographicEvent {
            index,
            reason: format!("proportion must be in [0, 1], found {}", proportion),
        })
    }
}

impl DemographicEvent {
    /// Time of the event, in generations.
    pub fn time(&self) -> f64 {
        match self {
            Self::PopulationParametersChange { time, .. } => *time,
            Self::MigrationRateChange { time, .. } => *time,
            Self::MassMigration { time, .. } => *time,
            Self::SimpleBottleneck { time, .. } => *time,
            Self::InstantaneousBottleneck { time, .. } => *time,
        }
    }

    /// The kind of this event.
    pub fn kind(&self) -> DemographicEventKind {
        match self {
            Self::PopulationParametersChange { .. } => {
                DemographicEventKind::PopulationParametersChange
            }
            Self::MigrationRateChange { .. } => DemographicEventKind::MigrationRateChange,
            Self::MassMigration { .. } => DemographicEventKind::MassMigration,
            Self::SimpleBottleneck { .. } => DemographicEventKind::SimpleBottleneck,
            Self::InstantaneousBottleneck { .. } => DemographicEventKind::InstantaneousBottleneck,
        }
    }

    /// Check the event's parameters.
    ///
    /// `index` is the event's position in the user's
    /// list and is only used for error reporting.
    pub(crate) fn validate(
        &self,
        index: usize,
        num_populations: usize,
        model: SimulationModel,
    ) -> Result<(), ConfigurationError> {
        if !model.supports(self.kind()) {
            return Err(ConfigurationError::UnsupportedDemographicEvent {
                model,
                kind: self.kind().name(),
            });
        }
        let time = self.time();
        if !time.is_finite() || time < 0.0 {
            return Err(ConfigurationError::InvalidDemographicEvent {
                index,
                reason: format!("invalid time {}", time),
            });
        }
        let bad = |reason: String| ConfigurationError::InvalidDemographicEvent { index, reason };
        match *self {
            Self::PopulationParametersChange {
                population,
                initial_size,
                growth_rate,
                ..
            } => {
                let p = match population {
                    Some(p) => population_index(index, p, num_populations)?,
                    None => 0,
                };
                if let Some(size) = initial_size {
                    validate_size(p, size).map_err(|e| bad(e.to_string()))?;
                }
                if let Some(rate) = growth_rate {
                    validate_growth_rate(p, rate).map_err(|e| bad(e.to_string()))?;
                }
                if initial_size.is_none() && growth_rate.is_none() {
                    return Err(bad("neither size nor growth rate given".to_string()));
                }
            }
            Self::MigrationRateChange {
                matrix_index, rate, ..
            } => match matrix_index {
                Some((source, dest)) => {
                    let j = population_index(index, source, num_populations)?;
                    let k = population_index(index, dest, num_populations)?;
                    if j == k {
                        return Err(bad("cannot set a diagonal migration rate".to_string()));
                    }
                    validate_migration_rate(j, k, rate).map_err(|e| bad(e.to_string()))?;
                }
                None => validate_migration_rate(0, 0, rate).map_err(|e| bad(e.to_string()))?,
            },
            Self::MassMigration {
                source,
                dest,
                proportion,
                ..
            } => {
                let j = population_index(index, source, num_populations)?;
                let k = population_index(index, dest, num_populations)?;
                if j == k {
                    return Err(bad("source and destination are equal".to_string()));
                }
                validate_proportion(index, proportion)?;
            }
            Self::SimpleBottleneck {
                population,
                proportion,
                ..
            } => {
                population_index(index, population, num_populations)?;
                validate_proportion(index, proportion)?;
            }
            Self::InstantaneousBottleneck {
                population,
                strength,
                ..
            } => {
                population_index(index, population, num_populations)?;
                if !strength.is_finite() || strength < 0.0 {
                    return Err(bad(format!("invalid strength {}", strength)));
                }
            }
        }
        Ok(())
    }

    /// Convert to coalescent units, given the
    /// reference effective size.
    pub(crate) fn to_coalescent_units(self, effective_size: f64) -> Self {
        let time_scale = 4.0 * effective_size;
        match self {
            Self::PopulationParametersChange {
                time,
                population,
                initial_size,
                growth_rate,
            } => Self::PopulationParametersChange {
                time: time / time_scale,
                population,
                initial_size: initial_size.map(|s| s / effective_size),
                growth_rate: growth_rate.map(|g| g * time_scale),
            },
            Self::MigrationRateChange {
                time,
                matrix_index,
                rate,
            } => Self::MigrationRateChange {
                time: time / time_scale,
                matrix_index,
                rate: rate * time_scale,
            },
            Self::MassMigration {
                time,
                source,
                dest,
                proportion,
            } => Self::MassMigration {
                time: time / time_scale,
                source,
                dest,
                proportion,
            },
            Self::SimpleBottleneck {
                time,
                population,
                proportion,
            } => Self::SimpleBottleneck {
                time: time / time_scale,
                population,
                proportion,
            },
            Self::InstantaneousBottleneck {
                time,
                population,
                strength,
            } => Self::InstantaneousBottleneck {
                time: time / time_scale,
                population,
                strength: strength / time_scale,
            },
        }
    }
}

/// Demographic events, in the order they will be applied.
///
/// Events are sorted by time.  The sort is stable, so
/// events at the same time are applied in input order.
#[derive(Clone, Debug, Default)]
pub struct DemographicEventQueue {
    events: VecDeque<DemographicEvent>,
}

impl DemographicEventQueue {
    /// Create a queue from events in any order.
    pub fn new(mut events: Vec<DemographicEvent>) -> Self {
        events.sort_by(|a, b| a.time().total_cmp(&b.time()));
        Self {
            events: events.into(),
        }
    }

    /// Time of the next event, without removing it.
    pub fn next_event_time(&self) -> Option<f64> {
        self.events.front().map(|e| e.time())
    }

    /// Remove and return the next event.
    pub fn pop_next(&mut self) -> Option<DemographicEvent> {
        self.events.pop_front()
    }

    /// Number of events not yet applied.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` if every event has been applied.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Everything an event may modify.
pub(crate) struct EventTarget<'a> {
    pub(crate) run: &'a mut RunContext,
    pub(crate) ancestry: &'a mut AncestryState,
    pub(crate) sink: &'a mut CoalescenceRecordSink,
    pub(crate) rng: &'a mut StdRng,
    pub(crate) model: SimulationModel,
    pub(crate) store_migrations: bool,
}

fn index_of(population: PopulationId) -> CoalrusttsResult<usize> {
    Ok(usize::try_from(population)?)
}

/// Apply `event` at the current time of `target.run`.
///
/// Event parameters were validated at configuration
/// time, so bad indexes here are invariant violations.
pub(crate) fn apply_event(event: &DemographicEvent, target: EventTarget) -> CoalrusttsResult<()> {
    let t = target.run.time;
    debug!("applying {} at time {}", event.kind(), t);
    match *event {
        DemographicEvent::PopulationParametersChange {
            population,
            initial_size,
            growth_rate,
            ..
        } => {
            let num_populations = target.run.populations.len();
            let range = match population {
                Some(p) => {
                    let p = index_of(p)?;
                    if p >= num_populations {
                        return invariant_violation(format!("population {} out of range", p));
                    }
                    p..p + 1
                }
                None => 0..num_populations,
            };
            for p in &mut target.run.populations[range] {
                p.set_parameters(t, initial_size, growth_rate);
            }
        }
        DemographicEvent::MigrationRateChange {
            matrix_index, rate, ..
        } => match matrix_index {
            Some((source, dest)) => {
                target
                    .run
                    .migration
                    .set(index_of(source)?, index_of(dest)?, rate)
            }
            None => target.run.migration.set_all(rate),
        },
        DemographicEvent::MassMigration {
            source,
            dest,
            proportion,
            ..
        } => mass_migration(index_of(source)?, index_of(dest)?, proportion, target)?,
        DemographicEvent::SimpleBottleneck {
            population,
            proportion,
            ..
        } => simple_bottleneck(index_of(population)?, proportion, target)?,
        DemographicEvent::InstantaneousBottleneck {
            population,
            strength,
            ..
        } => instantaneous_bottleneck(index_of(population)?, strength, target)?,
    }
    Ok(())
}

/// Move one lineage, recording its material
/// if migrations are being stored.
pub(crate) fn migrate_lineage(
    lineage: LineageId,
    dest: usize,
    time: Time,
    ancestry: &mut AncestryState,
    sink: &mut CoalescenceRecordSink,
    store_migrations: bool,
) -> CoalrusttsResult<()> {
    let source = ancestry.move_lineage(lineage, dest)?;
    if store_migrations {
        for segment in ancestry.segments(lineage)? {
            sink.record_migration(crate::records::MigrationRecord {
                left: segment.left,
                right: segment.right,
                node: segment.node,
                source: PopulationId::try_from(source)?,
                dest: PopulationId::try_from(dest)?,
                time,
            });
        }
    }
    Ok(())
}

fn mass_migration(
    source: usize,
    dest: usize,
    proportion: f64,
    target: EventTarget,
) -> CoalrusttsResult<()> {
    let time = Time::try_from(target.run.time)?;
    let candidates = target.ancestry.lineages_in(source)?.to_vec();
    let mut moved = 0;
    for lineage in candidates {
        if target.rng.gen::<f64>() < proportion {
            migrate_lineage(
                lineage,
                dest,
                time,
                target.ancestry,
                target.sink,
                target.store_migrations,
            )?;
            moved += 1;
        }
    }
    debug!("mass migration moved {} lineages from {} to {}", moved, source, dest);
    Ok(())
}

fn simple_bottleneck(
    population: usize,
    proportion: f64,
    target: EventTarget,
) -> CoalrusttsResult<()> {
    let chosen = target
        .ancestry
        .lineages_in(population)?
        .to_vec()
        .into_iter()
        .filter(|_| target.rng.gen::<f64>() < proportion)
        .collect::<Vec<_>>();
    debug!("simple bottleneck merges {} lineages", chosen.len());
    if chosen.len() > 1 {
        let time = Time::try_from(target.run.time)?;
        target
            .ancestry
            .merge(
                &chosen,
                population,
                time,
                target.model.splits_disjoint_coalescences(),
                target.sink,
            )?;
    }
    Ok(())
}

// Run a Kingman coalescent over sets of lineages until its
// clock passes `strength`, then merge every set of size > 1.
fn instantaneous_bottleneck(
    population: usize,
    strength: f64,
    target: EventTarget,
) -> CoalrusttsResult<()> {
    let mut sets = target
        .ancestry
        .lineages_in(population)?
        .iter()
        .map(|l| vec![*l])
        .collect::<Vec<_>>();
    let mut elapsed = 0.0;
    while sets.len() > 1 {
        let j = sets.len() as f64;
        let exp = match Exp::new(j * (j - 1.0) / 2.0) {
            Ok(e) => e,
            Err(e) => return invariant_violation(format!("{}", e)),
        };
        elapsed += target.rng.sample(exp);
        if elapsed > strength {
            break;
        }
        let (a, b) = target.model.propose_pair(sets.len(), &mut *target.rng);
        let (keep, remove) = if a < b { (a, b) } else { (b, a) };
        let removed = sets.swap_remove(remove);
        sets[keep].extend(removed);
    }
    let time = Time::try_from(target.run.time)?;
    let mut merged = 0;
    for set in sets.into_iter().filter(|s| s.len() > 1) {
        target
            .ancestry
            .merge(
                &set,
                population,
                time,
                target.model.splits_disjoint_coalescences(),
                target.sink,
            )?;
        merged += 1;
    }
    debug!("instantaneous bottleneck created {} ancestors", merged);
    Ok(())
}
