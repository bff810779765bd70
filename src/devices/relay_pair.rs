use crate::motion::{State, commands::Commands, model::Model};
use anyhow::{Error, ensure};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{fmt, mem, sync::Arc};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayId(pub u16);
impl fmt::Display for RelayId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "relay#{}", self.0)
    }
}

// Bridge to the relay hardware. Level changes are reported back
// asynchronously, through `RelayPair::feedback`.
pub trait RelayBus: Send + Sync + fmt::Debug {
    fn turn_on(
        &self,
        relay: RelayId,
    );
    fn turn_off(
        &self,
        relay: RelayId,
    );
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Configuration {
    pub increase: RelayId,
    pub decrease: RelayId,
}
impl Configuration {
    pub fn validate(&self) -> Result<(), Error> {
        ensure!(
            self.increase != self.decrease,
            "increase and decrease must use different relays"
        );

        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize)]
pub struct Relays {
    pub increase: bool,
    pub decrease: bool,
}

// Drives a covering with two relays, one per direction. Both relays are never
// commanded on together: energizing one direction releases the other first.
#[derive(Debug)]
pub struct RelayPair {
    configuration: Configuration,
    bus: Arc<dyn RelayBus>,
    model: Arc<Mutex<Model>>,

    relays: Mutex<Relays>,
}
impl RelayPair {
    pub fn new(
        configuration: Configuration,
        bus: Arc<dyn RelayBus>,
        model: Arc<Mutex<Model>>,
    ) -> Result<Self, Error> {
        configuration.validate()?;

        Ok(Self {
            configuration,
            bus,
            model,

            relays: Mutex::new(Relays::default()),
        })
    }

    pub fn relays(&self) -> Relays {
        *self.relays.lock()
    }

    // Relay level reported by the bus, no matter who changed it. This is the
    // way state changes get into the model. Returns (previous, current) model
    // state, None if the relay is not ours.
    pub fn feedback(
        &self,
        relay: RelayId,
        is_on: bool,
    ) -> Option<(State, State)> {
        let state = {
            let mut relays = self.relays.lock();

            if relay == self.configuration.increase {
                relays.increase = is_on;
            } else if relay == self.configuration.decrease {
                relays.decrease = is_on;
            } else {
                log::debug!("feedback for foreign {}, ignoring", relay);
                return None;
            }

            Self::state_resolve(&relays, relay == self.configuration.increase, is_on)
        };

        let mut model = self.model.lock();
        let state_previous = model.current_state();
        model.set_current_state(state);
        let state_current = model.current_state();
        drop(model);

        log::debug!(
            "{} is {}: {} -> {}",
            relay,
            if is_on { "on" } else { "off" },
            state_previous,
            state_current
        );

        Some((state_previous, state_current))
    }

    fn state_resolve(
        relays: &Relays,
        increase: bool,
        is_on: bool,
    ) -> State {
        match (increase, is_on) {
            (true, true) => State::Increasing,
            (false, true) => State::Decreasing,
            // switched off, the other one may still be running
            (_, false) => {
                if relays.increase {
                    State::Increasing
                } else if relays.decrease {
                    State::Decreasing
                } else {
                    State::Stopped
                }
            }
        }
    }

    // relay flags are updated under the lock, bus is called after releasing it
    fn energize(
        &self,
        increase: bool,
    ) {
        let (relay_on, relay_off) = if increase {
            (self.configuration.increase, self.configuration.decrease)
        } else {
            (self.configuration.decrease, self.configuration.increase)
        };

        let release = {
            let mut relays = self.relays.lock();
            let relays = &mut *relays;
            let (relay_on_flag, relay_off_flag) = if increase {
                (&mut relays.increase, &mut relays.decrease)
            } else {
                (&mut relays.decrease, &mut relays.increase)
            };

            if *relay_on_flag {
                return;
            }
            *relay_on_flag = true;
            mem::take(relay_off_flag)
        };

        if release {
            self.bus.turn_off(relay_off);
        }
        self.bus.turn_on(relay_on);
    }
}
impl Commands for RelayPair {
    fn increase(&self) {
        self.energize(true);
    }
    fn decrease(&self) {
        self.energize(false);
    }
    fn stop(&self) {
        let (increase, decrease) = {
            let mut relays = self.relays.lock();
            (mem::take(&mut relays.increase), mem::take(&mut relays.decrease))
        };

        if increase {
            self.bus.turn_off(self.configuration.increase);
        }
        if decrease {
            self.bus.turn_off(self.configuration.decrease);
        }
    }
}
