use anyhow::{Error, ensure};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

// Bounds of the position domain. `minimum` is the fully decreased (closed)
// extreme, `maximum` the fully increased (open) one.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(try_from = "PositionRangeSerde")]
#[serde(into = "PositionRangeSerde")]
pub struct PositionRange {
    minimum: f64,
    maximum: f64,
}
impl PositionRange {
    pub const MINIMUM_DEFAULT: f64 = 0.0;
    pub const MAXIMUM_DEFAULT: f64 = 100.0;

    pub fn new(
        minimum: f64,
        maximum: f64,
    ) -> Result<Self, Error> {
        ensure!(minimum.is_finite(), "minimum must be finite");
        ensure!(maximum.is_finite(), "maximum must be finite");
        ensure!(
            minimum < maximum,
            "minimum ({}) must be lower than maximum ({})",
            minimum,
            maximum
        );

        Ok(Self { minimum, maximum })
    }

    pub fn minimum(&self) -> f64 {
        self.minimum
    }
    pub fn maximum(&self) -> f64 {
        self.maximum
    }
    pub fn span(&self) -> f64 {
        self.maximum - self.minimum
    }

    pub fn contains(
        &self,
        position: f64,
    ) -> bool {
        (self.minimum..=self.maximum).contains(&position)
    }
    pub fn clamp(
        &self,
        position: f64,
    ) -> f64 {
        position.clamp(self.minimum, self.maximum)
    }

    // distance covered in `elapsed` when full range takes `travel_time`.
    // ratio of durations goes first, so elapsed == travel_time gives exactly
    // `span()`
    pub fn offset_for(
        &self,
        elapsed: Duration,
        travel_time: Duration,
    ) -> f64 {
        self.span() * elapsed.div_duration_f64(travel_time)
    }

    // time needed to cover `offset` (either sign), never more than
    // `travel_time`. offset must not be NaN
    pub fn duration_for(
        &self,
        offset: f64,
        travel_time: Duration,
    ) -> Duration {
        travel_time.mul_f64(offset.abs().min(self.span()) / self.span())
    }
}
impl Default for PositionRange {
    fn default() -> Self {
        Self {
            minimum: Self::MINIMUM_DEFAULT,
            maximum: Self::MAXIMUM_DEFAULT,
        }
    }
}
impl fmt::Display for PositionRange {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}..={}", self.minimum, self.maximum)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PositionRangeSerde {
    minimum: f64,
    maximum: f64,
}
impl TryFrom<PositionRangeSerde> for PositionRange {
    type Error = Error;

    fn try_from(value: PositionRangeSerde) -> Result<Self, Self::Error> {
        Self::new(value.minimum, value.maximum)
    }
}
impl From<PositionRange> for PositionRangeSerde {
    fn from(value: PositionRange) -> Self {
        PositionRangeSerde {
            minimum: value.minimum,
            maximum: value.maximum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PositionRange;
    use approx::assert_relative_eq;
    use std::time::Duration;

    #[test]
    fn rejects_inverted_and_empty() {
        assert!(PositionRange::new(100.0, 0.0).is_err());
        assert!(PositionRange::new(50.0, 50.0).is_err());
        assert!(PositionRange::new(f64::NAN, 100.0).is_err());
        assert!(PositionRange::new(0.0, f64::INFINITY).is_err());
        assert!(PositionRange::new(-10.0, 10.0).is_ok());
    }

    #[test]
    fn full_travel_covers_exact_span() {
        let range = PositionRange::default();
        let travel_time = Duration::from_millis(30000);

        assert_eq!(range.offset_for(travel_time, travel_time), 100.0);
        assert_eq!(
            range.offset_for(Duration::from_millis(15000), travel_time),
            50.0
        );
        assert_eq!(range.offset_for(Duration::ZERO, travel_time), 0.0);
    }

    #[test]
    fn duration_for_is_sign_agnostic() {
        let range = PositionRange::new(20.0, 70.0).unwrap();
        let travel_time = Duration::from_secs(10);

        assert_eq!(range.duration_for(25.0, travel_time), Duration::from_secs(5));
        assert_eq!(
            range.duration_for(-25.0, travel_time),
            Duration::from_secs(5)
        );
        assert_relative_eq!(
            range.duration_for(10.0, travel_time).as_secs_f64(),
            2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn duration_for_is_capped_at_travel_time() {
        let range = PositionRange::default();
        let travel_time = Duration::from_secs(60);

        assert_eq!(range.duration_for(150.0, travel_time), travel_time);
        assert_eq!(range.duration_for(1e20, travel_time), travel_time);
        assert_eq!(range.duration_for(f64::INFINITY, travel_time), travel_time);
        assert_eq!(
            range.duration_for(f64::NEG_INFINITY, travel_time),
            travel_time
        );
    }

    #[test]
    fn clamp_and_contains() {
        let range = PositionRange::default();

        assert_eq!(range.clamp(-5.0), 0.0);
        assert_eq!(range.clamp(105.0), 100.0);
        assert_eq!(range.clamp(42.5), 42.5);
        assert!(range.contains(0.0));
        assert!(range.contains(100.0));
        assert!(!range.contains(100.5));
    }

    #[test]
    fn deserialize_validates() {
        let range: PositionRange =
            serde_json::from_str(r#"{"minimum": 0, "maximum": 10}"#).unwrap();
        assert_eq!(range.span(), 10.0);

        assert!(serde_json::from_str::<PositionRange>(r#"{"minimum": 10, "maximum": 0}"#).is_err());
    }
}
