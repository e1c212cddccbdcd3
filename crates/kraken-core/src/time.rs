//! Epoch-second timestamps, per the broker's binary-JSON serialisation contract
//! (§6: "support for timestamps as integer epoch seconds").

use derive_more::{Display, From};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A point in time, serialized as an integer epoch-second count rather than
/// jiff's default RFC 3339 string, to match the task dispatcher's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From)]
pub struct Timestamp(jiff::Timestamp);

impl Timestamp {
    /// Returns the current time.
    #[must_use]
    pub fn now() -> Self {
        Self(jiff::Timestamp::now())
    }

    /// Builds a [`Timestamp`] from an integer epoch-second count.
    pub fn from_second(seconds: i64) -> Self {
        Self(jiff::Timestamp::from_second(seconds).unwrap_or(jiff::Timestamp::UNIX_EPOCH))
    }

    /// Returns the integer epoch-second count.
    #[must_use]
    pub fn as_second(self) -> i64 {
        self.0.as_second()
    }

    /// Returns the inner [`jiff::Timestamp`].
    #[must_use]
    pub const fn inner(self) -> jiff::Timestamp {
        self.0
    }

    /// Returns the duration between two timestamps, as a non-negative
    /// `f64` number of seconds (`self - earlier`, clamped to zero).
    #[must_use]
    pub fn seconds_since(self, earlier: Self) -> f64 {
        let delta = self.0.as_second() - earlier.0.as_second();
        delta.max(0) as f64
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.0.as_second())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = i64::deserialize(deserializer)?;
        Ok(Self::from_second(seconds))
    }
}

#[cfg(test)]
mod test {
    use super::Timestamp;

    #[test]
    fn round_trips_through_seconds() {
        let ts = Timestamp::from_second(1_700_000_000);
        assert_eq!(ts.as_second(), 1_700_000_000);
    }

    #[test]
    fn seconds_since_is_non_negative() {
        let earlier = Timestamp::from_second(1_000);
        let later = Timestamp::from_second(1_356);
        assert_eq!(later.seconds_since(earlier), 356.0);
        assert_eq!(earlier.seconds_since(later), 0.0);
    }
}
