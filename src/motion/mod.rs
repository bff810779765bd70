pub mod commands;
pub mod controller;
pub mod model;

use crate::datatypes::position_range::PositionRange;
use anyhow::{Error, bail, ensure};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::{fmt, str::FromStr, time::Duration};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Stopped,
    Increasing,
    Decreasing,
}
impl State {
    pub fn is_moving(&self) -> bool {
        *self != State::Stopped
    }
}
impl fmt::Display for State {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            State::Stopped => "STOPPED",
            State::Increasing => "INCREASING",
            State::Decreasing => "DECREASING",
        };
        write!(f, "{}", name)
    }
}
impl FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s {
            "STOPPED" => State::Stopped,
            "INCREASING" => State::Increasing,
            "DECREASING" => State::Decreasing,
            _ => bail!("unrecognized state: {:?}", s),
        };

        Ok(state)
    }
}

#[serde_as]
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Configuration {
    // time to run from one extreme of `range` to the other one
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "travel_time_ms")]
    pub travel_time: Duration,

    #[serde(default)]
    pub range: PositionRange,
}
impl Configuration {
    pub const DEFAULT_TRAVEL_TIME: Duration = Duration::from_secs(60);
    pub const UPDATE_INTERVAL_MIN: Duration = Duration::from_millis(250);

    pub fn new(travel_time: Duration) -> Self {
        Self {
            travel_time,
            range: PositionRange::default(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        ensure!(
            self.travel_time > Duration::ZERO,
            "travel time must be greater than zero"
        );

        Ok(())
    }

    // how often to report position while moving, ideally once per position
    // unit, but not more often than UPDATE_INTERVAL_MIN
    pub fn update_interval(&self) -> Duration {
        (self.travel_time / 100).max(Self::UPDATE_INTERVAL_MIN)
    }
}
impl Default for Configuration {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TRAVEL_TIME)
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Summary {
    pub position: f64,
    pub position_rounded: i64,
    pub state: State,
    pub target_position: f64,
}

#[cfg(test)]
mod tests {
    use super::{Configuration, State};
    use std::time::Duration;

    #[test]
    fn state_names() {
        for state in [State::Stopped, State::Increasing, State::Decreasing] {
            assert_eq!(state.to_string().parse::<State>().unwrap(), state);
        }
        assert!("UP".parse::<State>().is_err());
        assert!("stopped".parse::<State>().is_err());
    }

    #[test]
    fn configuration_validation() {
        assert!(Configuration::new(Duration::ZERO).validate().is_err());
        assert!(Configuration::new(Duration::from_millis(1)).validate().is_ok());
    }

    #[test]
    fn update_interval() {
        let configuration = Configuration::new(Duration::from_secs(30));
        assert_eq!(configuration.update_interval(), Duration::from_millis(300));

        let configuration = Configuration::new(Duration::from_secs(10));
        assert_eq!(
            configuration.update_interval(),
            Configuration::UPDATE_INTERVAL_MIN
        );
    }

    #[test]
    fn configuration_deserialize() {
        let configuration: Configuration =
            serde_json::from_str(r#"{"travel_time_ms": 30000}"#).unwrap();
        assert_eq!(configuration.travel_time, Duration::from_secs(30));
        assert_eq!(configuration.range.maximum(), 100.0);

        let configuration: Configuration = serde_json::from_str(
            r#"{"travel_time_ms": 1000, "range": {"minimum": -1, "maximum": 1}}"#,
        )
        .unwrap();
        assert_eq!(configuration.range.span(), 2.0);
    }
}
