/// A time value, measured backwards from the present.
///
/// Times are always finite and non-negative.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Time(f64);

impl Time {
    /// The present, where contemporary samples live.
    pub const ZERO: Time = Time(0.0);

    /// Create a new time.
    ///
    /// # Returns
    ///
    /// * `None` if `value` is negative or not finite.
    ///
    /// ```
    /// # use coalrustts_core::Time;
    /// assert!(Time::new(0.5).is_some());
    /// assert!(Time::new(-0.5).is_none());
    /// assert!(Time::new(f64::NAN).is_none());
    /// assert!(Time::new(f64::INFINITY).is_none());
    /// ```
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Get the underlying value
    pub fn raw(self) -> f64 {
        self.0
    }

    /// Multiply by a finite, non-negative `factor`.
    ///
    /// Used to convert between generations and
    /// coalescent time units.
    pub fn scaled(self, factor: f64) -> Option<Self> {
        Self::new(self.0 * factor)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Time {
    type Error = crate::Error;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(crate::Error::TimeError(value))
    }
}

impl From<Time> for f64 {
    fn from(value: Time) -> Self {
        value.0
    }
}

impl PartialEq<f64> for Time {
    fn eq(&self, other: &f64) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<Time> for Time {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.0.partial_cmp(&other.0) {
            None => panic!("fatal: partial_cmp for Time received non-finite values"),
            Some(x) => Some(x),
        }
    }
}

impl PartialOrd<f64> for Time {
    fn partial_cmp(&self, other: &f64) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}
