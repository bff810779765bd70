use super::{Configuration, State};
use crate::datatypes::position_range::PositionRange;
use anyhow::{Context, Error};
use std::time::Duration;
use tokio::time::Instant;

// Open loop model of the covering. Position is integrated lazily from the
// time elapsed since `last_update`, so it is valid only right after
// `update()`. Every public reader goes through `update()` first.
#[derive(Debug)]
pub struct Model {
    configuration: Configuration,

    position: f64,
    state: State,
    last_update: Instant,
}
impl Model {
    pub fn new(configuration: Configuration) -> Result<Self, Error> {
        configuration.validate().context("validate")?;

        let position = configuration.range.minimum();

        Ok(Self {
            configuration,
            position,
            state: State::Stopped,
            last_update: Instant::now(),
        })
    }

    pub fn range(&self) -> &PositionRange {
        &self.configuration.range
    }
    pub fn travel_time(&self) -> Duration {
        self.configuration.travel_time
    }
    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    pub fn current_position(&mut self) -> f64 {
        self.update(Instant::now());
        self.position
    }
    pub fn current_state(&mut self) -> State {
        self.update(Instant::now());
        self.state
    }

    // Overwrites position, eg. to seed or correct the model. Keeps the state.
    pub fn set_current_position(
        &mut self,
        position: f64,
    ) {
        log::trace!("position overwritten: {} -> {}", self.position, position);

        self.position = position;
        self.last_update = Instant::now();
    }

    // Applies a transition, either commanded or reported by feedback.
    pub fn set_current_state(
        &mut self,
        state: State,
    ) {
        if self.state == state {
            return;
        }

        // finish movement made in the old state
        let now = Instant::now();
        self.update(now);
        self.last_update = now;

        let rejected = match state {
            State::Increasing => self.position >= self.configuration.range.maximum(),
            State::Decreasing => self.position <= self.configuration.range.minimum(),
            State::Stopped => false,
        };
        if rejected {
            log::debug!(
                "rejecting {} at position {}, already at the bound",
                state,
                self.position
            );
            return;
        }

        log::trace!(
            "state: {} -> {} at position {}",
            self.state,
            state,
            self.position
        );
        self.state = state;
    }

    pub fn set_current_state_by_name(
        &mut self,
        name: &str,
    ) {
        match name.parse::<State>() {
            Ok(state) => self.set_current_state(state),
            Err(error) => log::warn!("ignoring state change: {:?}", error),
        }
    }

    fn update(
        &mut self,
        now: Instant,
    ) {
        let range = self.configuration.range;
        let elapsed = now.saturating_duration_since(self.last_update);
        let offset = range.offset_for(elapsed, self.configuration.travel_time);

        // position after the move and the bound it hit, if any
        let (position, bound) = match self.state {
            State::Stopped => return,
            State::Increasing => {
                let position = self.position + offset;
                (position, (position >= range.maximum()).then_some(range.maximum()))
            }
            State::Decreasing => {
                let position = self.position - offset;
                (position, (position <= range.minimum()).then_some(range.minimum()))
            }
        };
        self.last_update = now;

        match bound {
            Some(bound) => {
                log::trace!("reached bound {}, stopping", bound);
                self.position = bound;
                self.state = State::Stopped;
            }
            None => {
                self.position = position;
            }
        }
    }
}
