use super::{State, Summary, commands::Commands, model::Model};
use crate::util::timer::Timer;
use anyhow::{Error, ensure};
use parking_lot::Mutex;
use std::sync::Arc;

// Drives `Commands` so that the model reaches the requested target position.
//
// Every decision reads the model first. The model is never written here
// directly, changes come back through the commands (or feedback reported by
// their environment). At most one stop is pending at any time, it is
// cancelled before anything else happens in `set_target_position`.
//
// Each plan bumps `plan_generation`. The stop task checks its generation
// under the same lock, so a stop that was already running when a new plan
// was made either completes before the new plan or does nothing.
//
// Scheduling the stop needs a tokio runtime.
#[derive(Debug)]
pub struct Controller {
    model: Arc<Mutex<Model>>,
    commands: Arc<dyn Commands>,

    target_position: f64,
    plan_generation: Arc<Mutex<u64>>,
    stop_timer: Timer,
}
impl Controller {
    // smaller offsets are not worth a correction
    pub const DEAD_BAND: f64 = 1.0;

    pub fn new(
        model: Arc<Mutex<Model>>,
        commands: Arc<dyn Commands>,
    ) -> Self {
        let target_position = model.lock().current_position();

        Self {
            model,
            commands,

            target_position,
            plan_generation: Arc::new(Mutex::new(0)),
            stop_timer: Timer::new(),
        }
    }

    pub fn model(&self) -> &Arc<Mutex<Model>> {
        &self.model
    }

    pub fn target_position(&self) -> f64 {
        self.target_position
    }

    // Target is not clamped, the model stops on its own at the bound and the
    // late stop is harmless. NaN targets are ignored.
    pub fn set_target_position(
        &mut self,
        target_position: f64,
    ) {
        if target_position.is_nan() {
            log::warn!("ignoring NaN target position");
            return;
        }

        // held until the new plan is in place
        let mut plan_generation = self.plan_generation.lock();
        *plan_generation = plan_generation.wrapping_add(1);

        if self.stop_timer.cancel() {
            log::trace!("pending stop cancelled");
        }

        self.target_position = target_position;

        // model lock is not held while running commands, they may need it
        let (position, state, range, travel_time) = {
            let mut model = self.model.lock();
            let position = model.current_position();
            let state = model.current_state();
            (position, state, *model.range(), model.travel_time())
        };

        let offset = target_position - position;
        if offset.abs() < Self::DEAD_BAND {
            log::debug!(
                "target {} within dead band of position {}",
                target_position,
                position
            );
            if state.is_moving() {
                self.commands.stop();
            }
            return;
        }

        let duration = range.duration_for(offset, travel_time);

        if offset > 0.0 {
            if state != State::Increasing {
                log::debug!("increasing {} -> {}", position, target_position);
                self.commands.increase();
            }
        } else if state != State::Decreasing {
            log::debug!("decreasing {} -> {}", position, target_position);
            self.commands.decrease();
        }

        log::trace!("stop scheduled in {:?}", duration);

        let generation = *plan_generation;
        let plan_generation_stop = self.plan_generation.clone();
        let commands = self.commands.clone();
        self.stop_timer.schedule(duration, move || {
            let plan_generation = plan_generation_stop.lock();
            if *plan_generation != generation {
                log::trace!("stop superseded by a newer plan");
                return;
            }
            log::trace!("stop timer fired");
            commands.stop();
        });
    }

    // Only valid while stopped.
    pub fn sync_target_position_with_current_position(&mut self) -> Result<(), Error> {
        let (state, position) = {
            let mut model = self.model.lock();
            (model.current_state(), model.current_position())
        };
        ensure!(
            state == State::Stopped,
            "cannot sync target position while {}",
            state
        );

        self.set_target_position(position);

        Ok(())
    }

    pub fn has_pending_stop(&self) -> bool {
        self.stop_timer.is_pending()
    }

    pub fn summary(&self) -> Summary {
        let mut model = self.model.lock();
        let position = model.current_position();
        let state = model.current_state();

        Summary {
            position,
            position_rounded: position.round() as i64,
            state,
            target_position: self.target_position,
        }
    }
}
