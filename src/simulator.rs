//! The event loop.

use std::collections::VecDeque;

use coalrustts_core::{NodeId, PopulationId, Position, Time};
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp;

use crate::ancestry::AncestryState;
use crate::demography::{apply_event, migrate_lineage, DemographicEventQueue, EventTarget};
use crate::error::{invariant_violation, CoalrusttsError, CoalrusttsResult};
use crate::model::SimulationModel;
use crate::params::{SimulationConfig, SimulationFlags};
use crate::population::RunContext;
use crate::records::{
    validate_records, CoalescenceRecord, CoalescenceRecordSink, EventCounters, MigrationRecord,
    Node, NodeFlags, RecordsError,
};

/// Why a run stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// All ancestry has coalesced.
    Completed,
    /// The next event would happen after the time limit.
    ReachedMaxTime,
    /// The event limit was reached.
    ReachedMaxEvents,
}

/// State of the [`Simulator`] after a step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimulationStatus {
    /// More events remain.
    Running,
    /// The run has stopped and further steps do nothing.
    Finished(RunOutcome),
}

#[derive(Copy, Clone, Debug)]
enum StochasticEvent {
    Recombination,
    CommonAncestor(usize),
    Migration(usize, usize),
}

#[derive(Copy, Clone, Debug)]
struct PendingSample {
    time: f64,
    node: NodeId,
    population: usize,
}

/// Simulates the ancestry of a sample.
///
/// Created by [`SimulationBuilder::build`](crate::SimulationBuilder::build).
/// Each simulator owns its state and random number
/// generator, so independent runs may be moved to
/// other threads.
pub struct Simulator {
    model: SimulationModel,
    // one node per contiguous coalesced run
    split_runs: bool,
    flags: SimulationFlags,
    time_scale: f64,
    max_time: Option<f64>,
    max_events: Option<u64>,
    run: RunContext,
    ancestry: AncestryState,
    sink: CoalescenceRecordSink,
    demography: DemographicEventQueue,
    pending_samples: VecDeque<PendingSample>,
    rng: StdRng,
    outcome: Option<RunOutcome>,
}

/// The product of a simulation, with all
/// times converted back to generations.
#[derive(Clone, Debug)]
pub struct SimulationOutput {
    /// Sample nodes first, then ancestral nodes in order of creation
    pub nodes: Vec<Node>,
    /// In the order they were emitted
    pub records: Vec<CoalescenceRecord>,
    /// Empty unless migrations were stored
    pub migrations: Vec<MigrationRecord>,
    /// Event counts
    pub counters: EventCounters,
    /// `None` if the run was not finished.
    pub outcome: Option<RunOutcome>,
    /// Time when the run stopped
    pub time: f64,
    /// Number of loci
    pub sequence_length: Position,
}

impl SimulationOutput {
    /// Check that the records form a valid genealogy.
    pub fn check_records(&self) -> Result<(), RecordsError> {
        validate_records(&self.nodes, &self.records)
    }
}

fn draw_exponential(rng: &mut StdRng, rate: f64) -> CoalrusttsResult<f64> {
    match Exp::new(rate) {
        Ok(exp) => Ok(rng.sample(exp)),
        Err(e) => invariant_violation(format!("invalid rate {}: {}", rate, e)),
    }
}

impl Simulator {
    pub(crate) fn new(config: SimulationConfig) -> CoalrusttsResult<Self> {
        let num_samples = u32::try_from(config.samples.len())
            .map_err(|_| CoalrusttsError::InvariantViolation {
                value: "too many samples".to_string(),
            })?;
        let mut ancestry =
            AncestryState::new(config.map.clone(), config.populations.len(), num_samples);
        let mut sink = CoalescenceRecordSink::new();
        let mut pending = vec![];
        for (time, population) in config.samples.iter() {
            let node = sink.add_node(
                Time::try_from(*time)?,
                PopulationId::try_from(*population)?,
                NodeFlags::IS_SAMPLE,
            )?;
            if *time > 0.0 {
                pending.push(PendingSample {
                    time: *time,
                    node,
                    population: *population,
                });
            } else {
                ancestry.add_sample_lineage(node, *population)?;
            }
        }
        pending.sort_by(|a, b| a.time.total_cmp(&b.time));
        info!(
            "{} simulation of {} samples in {} populations, sequence length {}, seed {}",
            config.model,
            config.samples.len(),
            config.populations.len(),
            config.map.sequence_length(),
            config.seed
        );
        Ok(Self {
            model: config.model,
            split_runs: config.model.splits_disjoint_coalescences(),
            flags: config.flags,
            time_scale: config.time_scale(),
            max_time: config.max_time,
            max_events: config.max_events,
            run: RunContext {
                time: 0.0,
                populations: config.populations,
                migration: config.migration,
            },
            ancestry,
            sink,
            demography: DemographicEventQueue::new(config.events),
            pending_samples: pending.into(),
            rng: StdRng::seed_from_u64(config.seed),
            outcome: None,
        })
    }

    /// The model being simulated.
    pub fn model(&self) -> SimulationModel {
        self.model
    }

    /// Current time, in generations.
    pub fn time(&self) -> f64 {
        self.run.time * self.time_scale
    }

    /// Event counts so far.
    pub fn counters(&self) -> EventCounters {
        self.sink.counters()
    }

    /// The live lineages.
    pub fn ancestry(&self) -> &AncestryState {
        &self.ancestry
    }

    /// Records emitted so far.  Times are in coalescent units.
    pub fn records(&self) -> &[CoalescenceRecord] {
        self.sink.records()
    }

    /// `None` while the run is going.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    fn num_events(&self) -> u64 {
        let c = self.sink.counters();
        c.common_ancestor_events
            + c.rejected_common_ancestor_events
            + c.recombination_events
            + c.migration_events
    }

    fn finish(&mut self, outcome: RunOutcome) -> SimulationStatus {
        self.outcome = Some(outcome);
        let c = self.sink.counters();
        info!(
            "finished ({:?}) at time {}: {} common ancestor events ({} rejected), {} recombination events, {} migration events, {} records",
            outcome,
            self.time(),
            c.num_common_ancestor_events(),
            c.num_rejected_common_ancestor_events(),
            c.num_recombination_events(),
            c.num_migration_events(),
            self.sink.records().len()
        );
        SimulationStatus::Finished(outcome)
    }

    // The earliest sampling or demographic boundary.
    // `true` means a sampling event, which wins ties.
    fn next_boundary(&self) -> Option<(f64, bool)> {
        let sample = self.pending_samples.front().map(|s| s.time);
        let event = self.demography.next_event_time();
        match (sample, event) {
            (Some(s), Some(e)) if s <= e => Some((s, true)),
            (Some(s), None) => Some((s, true)),
            (_, Some(e)) => Some((e, false)),
            (None, None) => None,
        }
    }

    /// Advance to and apply the next event.
    ///
    /// # Errors
    ///
    /// * [`CoalrusttsError::InfiniteWaitingTime`] if lineages
    ///   remain but no event can ever happen.
    /// * [`CoalrusttsError::InvariantViolation`] if the state
    ///   is found to be inconsistent.
    pub fn step(&mut self) -> CoalrusttsResult<SimulationStatus> {
        if let Some(outcome) = self.outcome {
            return Ok(SimulationStatus::Finished(outcome));
        }
        if self.ancestry.num_lineages() == 0 && self.pending_samples.is_empty() {
            return Ok(self.finish(RunOutcome::Completed));
        }
        if let Some(limit) = self.max_events {
            if self.num_events() >= limit {
                return Ok(self.finish(RunOutcome::ReachedMaxEvents));
            }
        }

        let t = self.run.time;
        let mut wait = f64::INFINITY;
        let mut next = None;
        let recombination_mass = self.ancestry.recombination_mass();
        if recombination_mass > 0.0 {
            wait = draw_exponential(&mut self.rng, recombination_mass)?;
            next = Some(StochasticEvent::Recombination);
        }
        for (p, population) in self.run.populations.iter().enumerate() {
            let pairs = self.ancestry.common_ancestor_pairs(p);
            if pairs > 0.0 {
                let u = draw_exponential(&mut self.rng, pairs)?;
                let w = population.common_ancestor_waiting_time(t, u);
                if w < wait {
                    wait = w;
                    next = Some(StochasticEvent::CommonAncestor(p));
                }
            }
        }
        for (source, dest, rate) in self.run.migration.nonzero() {
            let n = self.ancestry.num_lineages_in(source);
            if n > 0 {
                let w = draw_exponential(&mut self.rng, rate * n as f64)?;
                if w < wait {
                    wait = w;
                    next = Some(StochasticEvent::Migration(source, dest));
                }
            }
        }

        let event_time = t + wait;
        if let Some((boundary, is_sample)) = self.next_boundary() {
            if boundary <= event_time {
                if let Some(max) = self.max_time {
                    if boundary > max {
                        self.run.time = max;
                        return Ok(self.finish(RunOutcome::ReachedMaxTime));
                    }
                }
                self.run.time = boundary;
                if is_sample {
                    self.add_samples()?;
                } else {
                    self.apply_demographic_event()?;
                }
                self.validate_state()?;
                return Ok(SimulationStatus::Running);
            }
        }
        let next = match next {
            Some(n) if event_time.is_finite() => n,
            _ => {
                return Err(CoalrusttsError::InfiniteWaitingTime {
                    time: t * self.time_scale,
                })
            }
        };
        if let Some(max) = self.max_time {
            if event_time > max {
                self.run.time = max;
                return Ok(self.finish(RunOutcome::ReachedMaxTime));
            }
        }
        self.run.time = event_time;
        match next {
            StochasticEvent::Recombination => self.recombination_event()?,
            StochasticEvent::CommonAncestor(p) => self.common_ancestor_event(p)?,
            StochasticEvent::Migration(source, dest) => self.migration_event(source, dest)?,
        }
        self.validate_state()?;
        Ok(SimulationStatus::Running)
    }

    /// Step until the run finishes.
    pub fn run(&mut self) -> CoalrusttsResult<RunOutcome> {
        loop {
            if let SimulationStatus::Finished(outcome) = self.step()? {
                return Ok(outcome);
            }
        }
    }

    /// Run to the end and return the output.
    pub fn simulate(mut self) -> CoalrusttsResult<SimulationOutput> {
        self.run()?;
        self.into_output()
    }

    /// Convert the current state to output,
    /// whether or not the run has finished.
    pub fn into_output(self) -> CoalrusttsResult<SimulationOutput> {
        let scale = self.time_scale;
        let rescale = |t: Time| -> CoalrusttsResult<Time> {
            match t.scaled(scale) {
                Some(t) => Ok(t),
                None => invariant_violation(format!("cannot rescale time {}", t)),
            }
        };
        let time = self.time();
        let sequence_length = self.ancestry.sequence_length();
        let (mut nodes, mut records, mut migrations, counters) = self.sink.into_parts();
        for n in nodes.iter_mut() {
            n.time = rescale(n.time)?;
        }
        for r in records.iter_mut() {
            r.time = rescale(r.time)?;
        }
        for m in migrations.iter_mut() {
            m.time = rescale(m.time)?;
        }
        Ok(SimulationOutput {
            nodes,
            records,
            migrations,
            counters,
            outcome: self.outcome,
            time,
            sequence_length,
        })
    }

    fn validate_state(&self) -> CoalrusttsResult<()> {
        if self.flags.contains(SimulationFlags::VALIDATE_STATE) {
            let pending = u32::try_from(self.pending_samples.len()).map_err(|_| {
                CoalrusttsError::InvariantViolation {
                    value: "too many pending samples".to_string(),
                }
            })?;
            self.ancestry.check_invariants(pending)?;
        }
        Ok(())
    }

    fn add_samples(&mut self) -> CoalrusttsResult<()> {
        while let Some(sample) = self.pending_samples.front().copied() {
            if sample.time > self.run.time {
                break;
            }
            self.pending_samples.pop_front();
            debug!(
                "adding sample node {} to population {} at time {}",
                sample.node,
                sample.population,
                self.time()
            );
            self.ancestry
                .add_sample_lineage(sample.node, sample.population)?;
        }
        Ok(())
    }

    fn apply_demographic_event(&mut self) -> CoalrusttsResult<()> {
        let event = match self.demography.pop_next() {
            Some(e) => e,
            None => return invariant_violation("no demographic event to apply"),
        };
        apply_event(
            &event,
            EventTarget {
                run: &mut self.run,
                ancestry: &mut self.ancestry,
                sink: &mut self.sink,
                rng: &mut self.rng,
                model: self.model,
                store_migrations: self.flags.contains(SimulationFlags::STORE_MIGRATIONS),
            },
        )
    }

    fn recombination_event(&mut self) -> CoalrusttsResult<()> {
        let (lineage, new, breakpoint) = self.ancestry.recombine(&mut self.rng)?;
        self.sink.counters_mut().recombination_events += 1;
        trace!(
            "recombination at {} splits lineage {} into {} at time {}",
            breakpoint,
            lineage,
            new,
            self.run.time
        );
        Ok(())
    }

    fn common_ancestor_event(&mut self, population: usize) -> CoalrusttsResult<()> {
        let members = self.ancestry.lineages_in(population)?;
        let k = members.len();
        if k < 2 {
            return invariant_violation(format!(
                "common ancestor event in population {} with {} lineages",
                population, k
            ));
        }
        let (i, j) = self.model.propose_pair(k, &mut self.rng);
        let (a, b) = (members[i], members[j]);
        if self.model.minimum_overlap().is_some() {
            let accepted = self
                .model
                .accepts(&self.ancestry.intervals(a)?, &self.ancestry.intervals(b)?);
            if !accepted {
                self.sink.counters_mut().rejected_common_ancestor_events += 1;
                trace!(
                    "rejected common ancestor of lineages {} and {} at time {}",
                    a,
                    b,
                    self.run.time
                );
                return Ok(());
            }
        }
        self.sink.counters_mut().common_ancestor_events += 1;
        trace!(
            "common ancestor of lineages {} and {} in population {} at time {}",
            a,
            b,
            population,
            self.run.time
        );
        let time = Time::try_from(self.run.time)?;
        self.ancestry
            .merge(&[a, b], population, time, self.split_runs, &mut self.sink)?;
        Ok(())
    }

    fn migration_event(&mut self, source: usize, dest: usize) -> CoalrusttsResult<()> {
        let members = self.ancestry.lineages_in(source)?;
        if members.is_empty() {
            return invariant_violation(format!("migration from empty population {}", source));
        }
        let lineage = members[self.rng.gen_range(0..members.len())];
        self.sink.counters_mut().migration_events += 1;
        trace!(
            "lineage {} migrates from {} to {} at time {}",
            lineage,
            source,
            dest,
            self.run.time
        );
        migrate_lineage(
            lineage,
            dest,
            Time::try_from(self.run.time)?,
            &mut self.ancestry,
            &mut self.sink,
            self.flags.contains(SimulationFlags::STORE_MIGRATIONS),
        )
    }
}
