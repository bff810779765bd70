use super::{State, model::Model};
use parking_lot::Mutex;
use std::{fmt, sync::Arc};

// Actuator capabilities the controller drives. Implementations are
// responsible for never energizing both directions at once (`increase`
// releases `decrease` first and the other way round) and `stop` must be safe
// to call when already stopped.
pub trait Commands: Send + Sync + fmt::Debug {
    fn increase(&self);
    fn decrease(&self);
    fn stop(&self);
}

// Adapts three closures into `Commands`.
pub struct CommandsFn<I, D, S>
where
    I: Fn() + Send + Sync,
    D: Fn() + Send + Sync,
    S: Fn() + Send + Sync,
{
    increase: I,
    decrease: D,
    stop: S,
}
impl<I, D, S> CommandsFn<I, D, S>
where
    I: Fn() + Send + Sync,
    D: Fn() + Send + Sync,
    S: Fn() + Send + Sync,
{
    pub fn new(
        increase: I,
        decrease: D,
        stop: S,
    ) -> Self {
        Self {
            increase,
            decrease,
            stop,
        }
    }
}
impl<I, D, S> Commands for CommandsFn<I, D, S>
where
    I: Fn() + Send + Sync,
    D: Fn() + Send + Sync,
    S: Fn() + Send + Sync,
{
    fn increase(&self) {
        (self.increase)()
    }
    fn decrease(&self) {
        (self.decrease)()
    }
    fn stop(&self) {
        (self.stop)()
    }
}
impl<I, D, S> fmt::Debug for CommandsFn<I, D, S>
where
    I: Fn() + Send + Sync,
    D: Fn() + Send + Sync,
    S: Fn() + Send + Sync,
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CommandsFn").finish_non_exhaustive()
    }
}

// Commands for a covering without any feedback: each command is applied to
// the model right away, as if the relay reported the change instantly.
#[derive(Debug)]
pub struct SimulatedCommands {
    model: Arc<Mutex<Model>>,
}
impl SimulatedCommands {
    pub fn new(model: Arc<Mutex<Model>>) -> Self {
        Self { model }
    }
}
impl Commands for SimulatedCommands {
    fn increase(&self) {
        self.model.lock().set_current_state(State::Increasing);
    }
    fn decrease(&self) {
        self.model.lock().set_current_state(State::Decreasing);
    }
    fn stop(&self) {
        self.model.lock().set_current_state(State::Stopped);
    }
}
