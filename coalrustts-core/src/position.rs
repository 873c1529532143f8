/// A position/coordinate within a genome.
///
/// Coordinates are discrete loci: a chromosome of
/// length `L` contains the loci `0..L`, and a half-open
/// interval `[left, right)` contains `right - left` loci.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, std::hash::Hash)]
#[repr(transparent)]
pub struct Position(i64);

impl Position {
    /// The first locus of every chromosome.
    pub const ZERO: Position = Position(0);

    /// Create a new Position
    ///
    /// # Returns
    ///
    /// * `Some` if `position` is non-negative
    /// * `None` otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// let p = coalrustts_core::Position::new(10).unwrap();
    /// assert_eq!(p, 10);
    /// # assert_eq!(10, p);
    /// # assert!(p > 0);
    /// # assert!(0 < p);
    /// assert!(coalrustts_core::Position::new(-1).is_none());
    /// ```
    pub fn new(position: i64) -> Option<Self> {
        if position >= 0 {
            Some(Self(position))
        } else {
            None
        }
    }

    /// Create a new position from a non-negative integer
    ///
    /// # Panics
    ///
    /// Will panic if `position` < 0.
    ///
    /// ```should_panic
    /// let p = coalrustts_core::Position::new_valid(-1);
    /// ```
    pub fn new_valid(position: i64) -> Self {
        match Self::new(position) {
            Some(p) => p,
            None => panic!("invalid position: {}", position),
        }
    }

    /// Number of loci in `[self, right)`.
    /// Negative if `right` is to the left of `self`.
    ///
    /// ```
    /// # use coalrustts_core::Position;
    /// let a = Position::new_valid(3);
    /// let b = Position::new_valid(10);
    /// assert_eq!(a.distance_to(b), 7);
    /// ```
    pub fn distance_to(self, right: Position) -> i64 {
        right.0 - self.0
    }

    /// Get the underlying integer
    pub fn raw(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<i64> for Position {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<Position> for i64 {
    fn eq(&self, other: &Position) -> bool {
        *self == other.0
    }
}

impl PartialOrd<i64> for Position {
    fn partial_cmp(&self, other: &i64) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

impl PartialOrd<Position> for i64 {
    fn partial_cmp(&self, other: &Position) -> Option<std::cmp::Ordering> {
        self.partial_cmp(&other.0)
    }
}

impl TryFrom<i64> for Position {
    type Error = crate::Error;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(crate::Error::PositionError(value))
    }
}

impl From<Position> for i64 {
    fn from(value: Position) -> Self {
        value.0
    }
}
