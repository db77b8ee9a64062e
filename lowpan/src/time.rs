/*! Simulated time.

The adaptation layer never reads a clock. Every entry point that depends on time is handed the
current simulated [Instant] by the host, and relative spans (fragment expiry, context lifetimes,
forwarding jitter) are plain [Duration]s.

 - [Instant] is a point on the simulation clock.
 - [Duration] is a relative span, the one from `core`.
 - [Expiration] is a deadline that may also never occur.

[Instant]: struct.Instant.html
[Duration]: https://doc.rust-lang.org/core/time/struct.Duration.html
[Expiration]: enum.Expiration.html
*/
use core::{cmp, fmt, ops};
pub use core::time::Duration;

/// A point on the simulation clock.
///
/// The `Instant` type is a wrapper around a `i64` value that represents a number of milliseconds
/// since the start of the simulation.
///
/// * A value of `0` is the start of the simulation.
/// * A value less than `0` indicates a time before the starting point. Some tests use this to
///   construct already expired state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant {
    /// Milliseconds since the start of the simulation.
    pub millis: i64,
}

/// A deadline, inversion of `Option` that orders `Never` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Something needs to happen at the given instant.
    When(Instant),
    /// Nothing is scheduled.
    Never,
}

use Expiration::{When, Never};

impl Instant {
    /// The start of the simulation.
    pub const ZERO: Instant = Instant { millis: 0 };

    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// The fractional number of milliseconds that have passed
    /// since the start of the simulation.
    pub fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds that have passed since the
    /// start of the simulation.
    pub fn secs(&self) -> i64 {
        self.millis / 1000
    }

    /// The total number of milliseconds that have passed since
    /// the start of the simulation.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.secs(), self.millis().abs())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis.saturating_add(clamp_millis(rhs)))
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis.saturating_sub(clamp_millis(rhs)))
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis((self.millis - rhs.millis).unsigned_abs())
    }
}

/// Lifetimes are user supplied, `Duration::MAX` is a valid way of saying 'forever'.
fn clamp_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl Expiration {
    /// The earlier of two deadlines.
    pub fn min(self, other: Self) -> Self {
        cmp::min(self, other)
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl From<Option<Instant>> for Expiration {
    fn from(opt: Option<Instant>) -> Self {
        match opt {
            Some(instant) => When(instant),
            None => Never,
        }
    }
}

impl From<Expiration> for Option<Instant> {
    fn from(opt: Expiration) -> Self {
        match opt {
            When(instant) => Some(instant),
            Never => None,
        }
    }
}

impl cmp::PartialOrd<Self> for Expiration {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Expiration {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (*self, *other) {
            (Never, Never) => cmp::Ordering::Equal,
            (Never, When(_)) => cmp::Ordering::Greater,
            (When(_), Never) => cmp::Ordering::Less,
            (When(ref a), When(ref b)) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_instant_ops() {
        // std::ops::Add
        assert_eq!(Instant::from_millis(4) + Duration::from_millis(6), Instant::from_millis(10));
        // std::ops::Sub
        assert_eq!(Instant::from_millis(7) - Duration::from_millis(5), Instant::from_millis(2));
        assert_eq!(Instant::from_millis(7) - Instant::from_millis(2), Duration::from_millis(5));
    }

    #[test]
    fn test_instant_saturates() {
        let forever = Instant::from_secs(1) + Duration::MAX;
        assert_eq!(forever, Instant::from_millis(i64::MAX));
        assert!(forever > Instant::from_secs(1_000_000));
    }

    #[test]
    fn test_instant_getters() {
        let instant = Instant::from_millis(5674);
        assert_eq!(instant.secs(), 5);
        assert_eq!(instant.millis(), 674);
        assert_eq!(instant.total_millis(), 5674);
    }

    #[test]
    fn test_instant_display() {
        assert_eq!(format!("{}", Instant::from_millis(5674)), "5.674s");
        assert_eq!(format!("{}", Instant::from_millis(5000)), "5.000s");
        assert_eq!(format!("{}", Instant::from_millis(60_007)), "60.007s");
    }

    #[test]
    fn test_expiration_order() {
        let soon = Expiration::When(Instant::from_millis(10));
        let later = Expiration::When(Instant::from_millis(20));
        assert_eq!(soon.min(later), soon);
        assert_eq!(Expiration::Never.min(later), later);
        assert_eq!(Expiration::Never.min(Expiration::Never), Expiration::Never);
        assert!(later < Expiration::Never);
    }
}
