//! Simulation models and the common ancestor acceptance policy.

use coalrustts_core::Position;
use rand::Rng;

use crate::demography::DemographicEventKind;
use crate::error::ConfigurationError;

/// The ancestral process being simulated.
///
/// The set of models is closed: every model
/// decides which common ancestor events are
/// accepted and which demographic events are legal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum SimulationModel {
    /// The exact coalescent with recombination.
    /// Any two lineages in a population may coalesce.
    #[default]
    Hudson,
    /// Sequentially Markov coalescent.
    /// Lineages must share ancestral material.
    Smc,
    /// SMC', which also allows lineages whose
    /// ancestral material abuts to coalesce.
    SmcPrime,
}

impl SimulationModel {
    /// All models, in canonical order.
    pub const ALL: [SimulationModel; 3] = [Self::Hudson, Self::Smc, Self::SmcPrime];

    /// The canonical, lower-case identifier.
    ///
    /// ```
    /// use coalrustts::SimulationModel;
    ///
    /// let model: SimulationModel = "SMC_PRIME".parse().unwrap();
    /// assert_eq!(model.name(), "smc_prime");
    /// ```
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hudson => "hudson",
            Self::Smc => "smc",
            Self::SmcPrime => "smc_prime",
        }
    }

    /// Minimum number of shared loci required for a common
    /// ancestor event to be accepted, or `None` if any pair
    /// of lineages is accepted.
    ///
    /// A value of zero means that abutting material,
    /// `[a, x)` and `[x, b)`, is sufficient.
    pub fn minimum_overlap(&self) -> Option<i64> {
        match self {
            Self::Hudson => None,
            Self::Smc => Some(1),
            Self::SmcPrime => Some(0),
        }
    }

    /// Decide if two lineages, given by their segments in
    /// left-to-right order, may have a common ancestor.
    ///
    /// Rejected proposals are not errors: the scheduler
    /// counts them and draws a new waiting time.
    pub fn accepts(&self, a: &[(Position, Position)], b: &[(Position, Position)]) -> bool {
        let min_overlap = match self.minimum_overlap() {
            None => return true,
            Some(m) => m,
        };
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            // x starts no later than y
            let (x, y) = if a[i].0 <= b[j].0 {
                (a[i], b[j])
            } else {
                (b[j], a[i])
            };
            if y.0.distance_to(x.1) >= min_overlap {
                return true;
            }
            // advance whichever segment ends first
            if a[i].1 <= b[j].1 {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// `true` if the model can apply events of this kind.
    ///
    /// Bottlenecks coalesce many lineages at once
    /// without regard to shared material, which
    /// the SMC variants do not allow.
    pub fn supports(&self, kind: DemographicEventKind) -> bool {
        match self {
            Self::Hudson => true,
            Self::Smc | Self::SmcPrime => !matches!(
                kind,
                DemographicEventKind::SimpleBottleneck
                    | DemographicEventKind::InstantaneousBottleneck
            ),
        }
    }

    /// If `true`, a common ancestor event whose coalescing
    /// intervals are not contiguous produces one node per
    /// contiguous run rather than a single node.
    pub(crate) fn splits_disjoint_coalescences(&self) -> bool {
        !matches!(self, Self::Hudson)
    }

    /// Draw two distinct indexes uniformly from `0..k`.
    ///
    /// `k` must be at least two.
    pub(crate) fn propose_pair<R: Rng>(&self, k: usize, rng: &mut R) -> (usize, usize) {
        let i = rng.gen_range(0..k);
        let mut j = rng.gen_range(0..k - 1);
        if j >= i {
            j += 1;
        }
        (i, j)
    }
}

impl std::fmt::Display for SimulationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SimulationModel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownModel {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(v: &[(i64, i64)]) -> Vec<(Position, Position)> {
        v.iter()
            .map(|(l, r)| (Position::new_valid(*l), Position::new_valid(*r)))
            .collect()
    }

    #[test]
    fn test_parse_models() {
        for model in SimulationModel::ALL {
            let name = model.name();
            assert_eq!(name.parse::<SimulationModel>().unwrap(), model);
            assert_eq!(name.to_uppercase().parse::<SimulationModel>().unwrap(), model);
            let mut title = name.to_string();
            title[..1].make_ascii_uppercase();
            assert_eq!(title.parse::<SimulationModel>().unwrap(), model);
        }
    }

    #[test]
    fn test_parse_bad_models() {
        for bad in ["NOT", "", "MODEL", "smc-prime", " hudson"] {
            assert_eq!(
                bad.parse::<SimulationModel>(),
                Err(ConfigurationError::UnknownModel {
                    name: bad.to_string()
                })
            );
        }
    }

    #[test]
    fn test_propose_pair_is_distinct_and_uniform() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut counts = [0_u32; 4];
        for _ in 0..4000 {
            let (i, j) = SimulationModel::Hudson.propose_pair(4, &mut rng);
            assert_ne!(i, j);
            counts[i] += 1;
            counts[j] += 1;
        }
        for c in counts {
            assert!((1700..2300).contains(&c), "{:?}", counts);
        }
        let (i, j) = SimulationModel::Smc.propose_pair(2, &mut rng);
        assert_eq!(i + j, 1);
    }

    #[test]
    fn test_hudson_accepts_disjoint() {
        let a = segs(&[(0, 10)]);
        let b = segs(&[(20, 30)]);
        assert!(SimulationModel::Hudson.accepts(&a, &b));
    }

    #[test]
    fn test_smc_acceptance() {
        let a = segs(&[(0, 10), (40, 50)]);
        let overlapping = segs(&[(20, 30), (45, 60)]);
        let abutting = segs(&[(10, 20)]);
        let disjoint = segs(&[(15, 35), (55, 60)]);
        for model in [SimulationModel::Smc, SimulationModel::SmcPrime] {
            assert!(model.accepts(&a, &overlapping));
            assert!(model.accepts(&overlapping, &a));
            assert!(!model.accepts(&a, &disjoint));
            assert!(!model.accepts(&disjoint, &a));
        }
        assert!(!SimulationModel::Smc.accepts(&a, &abutting));
        assert!(SimulationModel::SmcPrime.accepts(&a, &abutting));
        assert!(SimulationModel::SmcPrime.accepts(&abutting, &a));
    }

    #[test]
    fn test_nested_segments_overlap() {
        let a = segs(&[(0, 100)]);
        let b = segs(&[(10, 20), (30, 40)]);
        assert!(SimulationModel::Smc.accepts(&a, &b));
        assert!(SimulationModel::Smc.accepts(&b, &a));
    }

    #[test]
    fn test_bottlenecks_unsupported() {
        for model in [SimulationModel::Smc, SimulationModel::SmcPrime] {
            assert!(!model.supports(DemographicEventKind::SimpleBottleneck));
            assert!(!model.supports(DemographicEventKind::InstantaneousBottleneck));
            assert!(model.supports(DemographicEventKind::MassMigration));
        }
        assert!(SimulationModel::Hudson.supports(DemographicEventKind::SimpleBottleneck));
    }
}
