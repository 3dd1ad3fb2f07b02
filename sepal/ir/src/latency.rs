/// Clock-cycle latency between a component's go and an exit's done.
///
/// `max` of `None` means the latency is open: the exit completes after an
/// unknowable number of cycles (a blocking fifo access, an unbounded loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Latency {
    min: u64,
    max: Option<u64>,
}

impl Latency {
    pub const ZERO: Latency = Latency {
        min: 0,
        max: Some(0),
    };
    pub const ONE: Latency = Latency {
        min: 1,
        max: Some(1),
    };

    pub fn new(min: u64, max: u64) -> Self {
        assert!(min <= max, "min latency must not exceed max");
        Self {
            min,
            max: Some(max),
        }
    }

    /// A latency with a known lower bound but no upper bound.
    pub fn open(min: u64) -> Self {
        Self { min, max: None }
    }

    pub fn min_clocks(&self) -> u64 {
        self.min
    }

    pub fn max_clocks(&self) -> Option<u64> {
        self.max
    }

    pub fn is_open(&self) -> bool {
        self.max.is_none()
    }

    /// True when this latency consumes at least one cycle on every path.
    /// Open latencies count: an unbounded wait is never combinational.
    pub fn is_nonzero(&self) -> bool {
        self.min > 0 || self.is_open()
    }

    /// True when `self` is strictly greater than `other` on every path both
    /// could take. Indeterminate when either side is open.
    pub fn is_gt(&self, other: &Latency) -> bool {
        match other.max {
            Some(other_max) => self.min > other_max,
            None => false,
        }
    }
}

impl std::fmt::Display for Latency {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Latency;

    #[test]
    fn ordering() {
        assert!(Latency::ONE.is_gt(&Latency::ZERO));
        assert!(!Latency::ZERO.is_gt(&Latency::ZERO));
        assert!(!Latency::new(1, 4).is_gt(&Latency::new(2, 3)));
        assert!(Latency::new(4, 8).is_gt(&Latency::new(2, 3)));
        // Open latencies compare indeterminate on the right.
        assert!(!Latency::new(9, 9).is_gt(&Latency::open(0)));
    }

    #[test]
    fn nonzero() {
        assert!(!Latency::ZERO.is_nonzero());
        assert!(Latency::ONE.is_nonzero());
        assert!(Latency::open(0).is_nonzero());
    }

    #[test]
    fn bounds_and_rendering() {
        let lat = Latency::new(2, 5);
        assert_eq!(lat.min_clocks(), 2);
        assert_eq!(lat.max_clocks(), Some(5));
        assert!(!lat.is_open());

        let open = Latency::open(3);
        assert_eq!(open.min_clocks(), 3);
        assert_eq!(open.max_clocks(), None);

        assert_eq!(Latency::ZERO.to_string(), "0");
        assert_eq!(Latency::new(1, 4).to_string(), "1..4");
        assert_eq!(open.to_string(), "3..*");
    }
}
