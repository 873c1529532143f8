use rand::Rng;
use thiserror::Error;

use coalrustts_core::Position;

/// Error type for building a [`RecombinationMap`].
#[derive(Error, Debug, PartialEq)]
pub enum RecombinationMapError {
    /// Fewer than two positions were given.
    #[error("a recombination map needs at least two positions")]
    EmptyMap,
    /// The first position is not zero.
    #[error("first position must be zero, found {found}")]
    FirstPositionNotZero {
        /// The offending position
        found: Position,
    },
    /// Positions must be strictly increasing.
    #[error("positions not strictly increasing at index {index}")]
    PositionsNotIncreasing {
        /// Index of the first out-of-order position
        index: usize,
    },
    /// There must be one rate per interval.
    #[error("found {positions} positions but {rates} rates")]
    LengthMismatch {
        /// Number of positions
        positions: usize,
        /// Number of rates
        rates: usize,
    },
    /// A rate is negative or not finite.
    #[error("invalid rate {rate} for interval {index}")]
    InvalidRate {
        /// Index of the interval
        index: usize,
        /// The invalid rate
        rate: f64,
    },
    /// Returned when a builder does not validate.
    #[error("invalid recombination map builder: {0:?}")]
    InvalidBuilder(RecombinationMapStatus),
}

/// A half-open interval `[left, right)` with a constant
/// recombination rate per unit of length.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RecombinationRegion {
    left: Position,
    right: Position,
    rate: f64,
}

impl RecombinationRegion {
    /// # Returns
    ///
    /// `None` if the interval is empty or reversed,
    /// if either end is negative, or if `rate` is
    /// negative or not finite.
    pub fn new<L, R>(left: L, right: R, rate: f64) -> Option<Self>
    where
        L: TryInto<Position>,
        R: TryInto<Position>,
    {
        let left = left.try_into().ok()?;
        let right = right.try_into().ok()?;
        if right <= left || !rate.is_finite() || rate < 0.0 {
            None
        } else {
            Some(Self { left, right, rate })
        }
    }

    /// Start of the region
    pub fn left(&self) -> Position {
        self.left
    }
    /// End of the region (exclusive)
    pub fn right(&self) -> Position {
        self.right
    }
    /// Rate per locus
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

/// Collects [`RecombinationRegion`]s before building
/// a [`RecombinationMap`].
///
/// Loci not covered by any region recombine at rate zero.
#[derive(Default, Debug, Clone)]
pub struct RecombinationMapBuilder {
    regions: Vec<RecombinationRegion>,
    sequence_length: Option<Position>,
}

/// Result of [`RecombinationMapBuilder::validate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecombinationMapStatus {
    /// The regions can be turned into a map.
    Valid,
    /// No regions were added.
    Empty,
    /// Two regions share loci.
    OverlappingRegions,
    /// A region ends after the set sequence length.
    RegionBeyondSequenceEnd,
}

impl RecombinationMapBuilder {
    /// Add several regions.
    pub fn extend_regions(mut self, regions: &[RecombinationRegion]) -> Self {
        self.regions.extend_from_slice(regions);
        self
    }

    /// Set the chromosome length.
    /// If unset, the right end of the right-most region is used.
    pub fn sequence_length<P: Into<Position>>(mut self, length: P) -> Self {
        self.sequence_length = Some(length.into());
        self
    }

    /// The regions added so far.
    pub fn regions(&self) -> &[RecombinationRegion] {
        &self.regions
    }

    fn sorted_regions(&self) -> Vec<RecombinationRegion> {
        let mut regions = self.regions.clone();
        regions.sort_by_key(|r| r.left);
        regions
    }

    /// Check the regions for overlaps and bad bounds.
    pub fn validate(&self) -> RecombinationMapStatus {
        let regions = self.sorted_regions();
        if regions.is_empty() && self.sequence_length.map_or(true, |l| l <= 0) {
            return RecombinationMapStatus::Empty;
        }
        if regions.windows(2).any(|w| w[1].left < w[0].right) {
            return RecombinationMapStatus::OverlappingRegions;
        }
        if let (Some(length), Some(last)) = (self.sequence_length, regions.last()) {
            if last.right > length {
                return RecombinationMapStatus::RegionBeyondSequenceEnd;
            }
        }
        RecombinationMapStatus::Valid
    }
}

/// Piecewise-constant recombination rates along a chromosome.
///
/// The map is a set of `positions` `0 = p_0 < p_1 < ... < p_k = L`
/// and one rate per interval `[p_i, p_{i+1})`.  It is used
/// as a cumulative distribution over the chromosome:
/// [`RecombinationMap::cumulative_rate`] is the rate mass
/// to the left of a position, and [`RecombinationMap::position_at`]
/// is its inverse.
///
/// Breakpoints fall between loci.  Breakpoint `x`
/// separates the loci `< x` from the loci `>= x`,
/// and has the rate mass of the unit interval `[x - 1, x)`.
#[derive(Debug, Clone)]
pub struct RecombinationMap {
    positions: Vec<Position>,
    rates: Vec<f64>,
    cumulative: Vec<f64>,
}

impl RecombinationMap {
    /// Create a map from interval boundaries and rates.
    ///
    /// ```
    /// use coalrustts_core::Position;
    /// use coalrustts_genetics::RecombinationMap;
    ///
    /// let positions = vec![0, 10, 20]
    ///     .into_iter()
    ///     .map(Position::new_valid)
    ///     .collect::<Vec<_>>();
    /// let map = RecombinationMap::new(positions, vec![1e-3, 0.0]).unwrap();
    /// assert_eq!(map.sequence_length(), 20);
    /// assert!((map.total_rate() - 1e-2).abs() < 1e-12);
    /// ```
    pub fn new(positions: Vec<Position>, rates: Vec<f64>) -> Result<Self, RecombinationMapError> {
        if positions.len() < 2 {
            return Err(RecombinationMapError::EmptyMap);
        }
        if positions[0] != 0 {
            return Err(RecombinationMapError::FirstPositionNotZero {
                found: positions[0],
            });
        }
        if let Some(index) = positions.windows(2).position(|w| w[1] <= w[0]) {
            return Err(RecombinationMapError::PositionsNotIncreasing { index: index + 1 });
        }
        if rates.len() != positions.len() - 1 {
            return Err(RecombinationMapError::LengthMismatch {
                positions: positions.len(),
                rates: rates.len(),
            });
        }
        if let Some(index) = rates.iter().position(|r| !r.is_finite() || *r < 0.0) {
            return Err(RecombinationMapError::InvalidRate {
                index,
                rate: rates[index],
            });
        }
        let mut cumulative = Vec::with_capacity(positions.len());
        cumulative.push(0.0);
        let mut sum = 0.0;
        for (w, rate) in positions.windows(2).zip(rates.iter()) {
            sum += (w[0].distance_to(w[1]) as f64) * rate;
            cumulative.push(sum);
        }
        Ok(Self {
            positions,
            rates,
            cumulative,
        })
    }

    /// A constant `rate` per unit length over `[0, sequence_length)`.
    pub fn uniform<P: Into<Position>>(
        sequence_length: P,
        rate: f64,
    ) -> Result<Self, RecombinationMapError> {
        Self::new(vec![Position::ZERO, sequence_length.into()], vec![rate])
    }

    /// Build a map from rate regions.  Loci not covered
    /// by a region get rate zero.
    pub fn new_from_builder(
        builder: RecombinationMapBuilder,
    ) -> Result<Self, RecombinationMapError> {
        let status = builder.validate();
        if status != RecombinationMapStatus::Valid {
            return Err(RecombinationMapError::InvalidBuilder(status));
        }
        let regions = builder.sorted_regions();
        let mut positions = vec![Position::ZERO];
        let mut rates = vec![];
        for r in regions {
            let last = positions[positions.len() - 1];
            if r.left > last {
                rates.push(0.0);
                positions.push(r.left);
            }
            rates.push(r.rate);
            positions.push(r.right);
        }
        if let Some(length) = builder.sequence_length {
            if length > positions[positions.len() - 1] {
                rates.push(0.0);
                positions.push(length);
            }
        }
        Self::new(positions, rates)
    }

    /// Multiply every rate by `factor`.
    ///
    /// # Errors
    ///
    /// [`RecombinationMapError::InvalidRate`] if `factor` is
    /// negative or not finite.
    pub fn scaled(&self, factor: f64) -> Result<Self, RecombinationMapError> {
        Self::new(
            self.positions.clone(),
            self.rates.iter().map(|r| r * factor).collect(),
        )
    }

    /// Number of loci.
    pub fn sequence_length(&self) -> Position {
        self.positions[self.positions.len() - 1]
    }

    /// Total rate mass over the whole map.
    pub fn total_rate(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Region boundaries, starting at zero.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Rate per locus of each region.
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    /// Rate mass over `[0, position)`.
    /// Positions past the end of the map are clamped.
    pub fn cumulative_rate(&self, position: Position) -> f64 {
        if position >= self.sequence_length() {
            return self.total_rate();
        }
        let i = self.positions.partition_point(|p| *p <= position) - 1;
        self.cumulative[i] + (self.positions[i].distance_to(position) as f64) * self.rates[i]
    }

    /// Inverse of [`RecombinationMap::cumulative_rate`].
    ///
    /// Where the cumulative rate is flat, the right
    /// end of the flat stretch is returned, so that
    /// zero-rate regions are skipped.
    pub fn position_at(&self, mass: f64) -> f64 {
        let (i, x) = self.locate(mass);
        match i {
            Some(_) => x,
            None => self.sequence_length().raw() as f64,
        }
    }

    // Interval index and continuous coordinate for a rate mass.
    // The interval always has a positive rate.
    fn locate(&self, mass: f64) -> (Option<usize>, f64) {
        let mass = mass.max(0.0);
        let idx = self.cumulative.partition_point(|c| *c <= mass);
        if idx >= self.cumulative.len() {
            return (None, self.sequence_length().raw() as f64);
        }
        let i = idx - 1;
        let x = self.positions[i].raw() as f64 + (mass - self.cumulative[i]) / self.rates[i];
        (Some(i), x)
    }

    // The breakpoint whose unit interval [x - 1, x) contains `mass`.
    fn breakpoint_at(&self, mass: f64) -> Position {
        match self.locate(mass) {
            (Some(i), x) => {
                let lo = self.positions[i].raw() + 1;
                let hi = self.positions[i + 1].raw();
                Position::new_valid(((x.floor() as i64) + 1).clamp(lo, hi))
            }
            (None, _) => self.sequence_length(),
        }
    }

    /// Rate mass of the breakpoints that split `[left, right)`
    /// into two non-empty parts, i.e. breakpoints `left + 1 ..= right - 1`.
    pub fn link_rate(&self, left: Position, right: Position) -> f64 {
        if left.distance_to(right) < 2 {
            return 0.0;
        }
        let last = Position::new_valid(right.raw() - 1);
        (self.cumulative_rate(last) - self.cumulative_rate(left)).max(0.0)
    }

    /// Map `u` in `[0, 1)` to a breakpoint strictly inside
    /// `[left, right)` by inverting the cumulative rate.
    ///
    /// The mapping is monotonic in `u`.
    ///
    /// # Returns
    ///
    /// `None` if no breakpoint inside the interval has
    /// a positive rate.
    pub fn draw_breakpoint_between(
        &self,
        left: Position,
        right: Position,
        u: f64,
    ) -> Option<Position> {
        let mass = self.link_rate(left, right);
        if mass <= 0.0 {
            return None;
        }
        let target = self.cumulative_rate(left) + u.clamp(0.0, 1.0) * mass;
        let x = self.breakpoint_at(target);
        Some(Position::new_valid(
            x.raw().clamp(left.raw() + 1, right.raw() - 1),
        ))
    }

    /// [`RecombinationMap::draw_breakpoint_between`] over the whole map.
    ///
    /// ```
    /// use coalrustts_genetics::RecombinationMap;
    ///
    /// let map = RecombinationMap::uniform(coalrustts_core::Position::new_valid(100), 1e-2).unwrap();
    /// let a = map.draw_breakpoint(0.25).unwrap();
    /// let b = map.draw_breakpoint(0.75).unwrap();
    /// assert!(a < b);
    /// ```
    pub fn draw_breakpoint(&self, u: f64) -> Option<Position> {
        self.draw_breakpoint_between(Position::ZERO, self.sequence_length(), u)
    }

    /// Draw a breakpoint inside `[left, right)` using `rng`.
    pub fn sample_breakpoint_between<T: Rng>(
        &self,
        left: Position,
        right: Position,
        rng: &mut T,
    ) -> Option<Position> {
        let u: f64 = rng.gen();
        self.draw_breakpoint_between(left, right, u)
    }
}
