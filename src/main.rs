use anyhow::{Context, Error, bail, ensure};
use clap::Parser;
use futures::{future::FutureExt, pin_mut, select};
use parking_lot::Mutex;
use shutter_motion::{
    datatypes::position_range::PositionRange,
    devices::relay_pair::{self, RelayBus, RelayId, RelayPair},
    motion::{
        self, State,
        commands::{Commands, SimulatedCommands},
        controller::Controller,
        model::Model,
    },
    util::logging,
};
use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

#[derive(Debug, Clone)]
struct ArgumentsTravelTime(Duration);
impl FromStr for ArgumentsTravelTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // bare number is milliseconds
        let (value, unit) = match s.find(|c: char| c.is_ascii_alphabetic()) {
            Some(index) => s.split_at(index),
            None => (s, "ms"),
        };

        let value = f64::from_str(value.trim()).context("from_str")?;
        let milliseconds = match unit.trim() {
            "ms" => value,
            "s" | "sec" => value * 1000.0,
            "m" | "min" => value * 60_000.0,
            _ => bail!("unsupported unit. supported units: ms, s, m"),
        };
        let duration =
            Duration::try_from_secs_f64(milliseconds / 1000.0).context("try_from_secs_f64")?;

        Ok(Self(duration))
    }
}

#[derive(Debug, Parser)]
#[clap(name = "shutter-motion")]
struct Arguments {
    // json file with motion configuration, overrides travel time and bounds
    #[clap(long)]
    configuration: Option<PathBuf>,

    #[clap(long, default_value = "60s")]
    travel_time: ArgumentsTravelTime,

    #[clap(long, default_value_t = PositionRange::MINIMUM_DEFAULT, allow_hyphen_values = true)]
    minimum: f64,

    #[clap(long, default_value_t = PositionRange::MAXIMUM_DEFAULT, allow_hyphen_values = true)]
    maximum: f64,

    #[clap(long, allow_hyphen_values = true)]
    initial_position: Option<f64>,

    // drive two relays over an echoing bus instead of writing the model directly
    #[clap(long)]
    relays: bool,

    #[clap(long)]
    verbose: bool,
}
impl Arguments {
    fn motion_configuration(&self) -> Result<motion::Configuration, Error> {
        let configuration = match &self.configuration {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("read_to_string {}", path.display()))?;
                serde_json::from_str::<motion::Configuration>(&content).context("from_str")?
            }
            None => motion::Configuration {
                travel_time: self.travel_time.0,
                range: PositionRange::new(self.minimum, self.maximum).context("range")?,
            },
        };
        configuration.validate().context("validate")?;

        Ok(configuration)
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Target(f64),
    Sync,
    State(String),
    Position(f64),
    Status,
    Quit,
}
impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let name = parts.next().context("empty command")?;
        let argument = parts.next();
        ensure!(parts.next().is_none(), "too many arguments");

        let position = || -> Result<f64, Error> {
            let argument = argument.context("missing position")?;
            let position = f64::from_str(argument).context("from_str")?;
            ensure!(position.is_finite(), "position must be finite");
            Ok(position)
        };

        let command = match name {
            "target" => Command::Target(position()?),
            "position" => Command::Position(position()?),
            "state" => Command::State(argument.context("missing state")?.to_owned()),
            "sync" => Command::Sync,
            "status" => Command::Status,
            "quit" => Command::Quit,
            _ => bail!("unknown command. supported: target, position, state, sync, status, quit"),
        };

        Ok(command)
    }
}

// Hands every relay change back as feedback, like a bridge acknowledging it.
#[derive(Debug)]
struct EchoBus {
    sender: mpsc::UnboundedSender<(RelayId, bool)>,
}
impl EchoBus {
    fn send(
        &self,
        relay: RelayId,
        is_on: bool,
    ) {
        log::debug!("{} -> {}", relay, if is_on { "on" } else { "off" });
        if self.sender.send((relay, is_on)).is_err() {
            log::warn!("feedback receiver is gone, {} change lost", relay);
        }
    }
}
impl RelayBus for EchoBus {
    fn turn_on(
        &self,
        relay: RelayId,
    ) {
        self.send(relay, true);
    }
    fn turn_off(
        &self,
        relay: RelayId,
    ) {
        self.send(relay, false);
    }
}

// Ok(false) once no more commands should be read
fn command_execute(
    controller: &Mutex<Controller>,
    range: &PositionRange,
    command: Command,
) -> Result<bool, Error> {
    match command {
        Command::Target(target_position) => {
            let target_position_clamped = range.clamp(target_position);
            if target_position_clamped != target_position {
                log::warn!(
                    "target {} outside of {}, using {}",
                    target_position,
                    range,
                    target_position_clamped
                );
            }
            controller
                .lock()
                .set_target_position(target_position_clamped);
        }
        Command::Sync => {
            controller
                .lock()
                .sync_target_position_with_current_position()?;
        }
        Command::State(name) => {
            controller
                .lock()
                .model()
                .lock()
                .set_current_state_by_name(&name);
        }
        Command::Position(position) => {
            ensure!(
                range.contains(position),
                "position {} outside of {}",
                position,
                range
            );
            controller.lock().model().lock().set_current_position(position);
        }
        Command::Status => {
            let summary = controller.lock().summary();
            println!("{}", serde_json::to_string(&summary).context("to_string")?);
        }
        Command::Quit => return Ok(false),
    }

    Ok(true)
}

async fn commands_run(
    controller: &Mutex<Controller>,
    range: &PositionRange,
) -> Result<(), Error> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("next_line")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(error) => {
                log::warn!("{:?}: {:?}", line, error);
                continue;
            }
        };
        match command_execute(controller, range, command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => log::error!("{:?}: {:?}", line, error),
        }
    }

    Ok(())
}

async fn report_run(
    controller: &Mutex<Controller>,
    update_interval: Duration,
) {
    let mut interval = tokio::time::interval(update_interval);
    let mut state_last = State::Stopped;

    loop {
        interval.tick().await;

        let summary = controller.lock().summary();
        if summary.state.is_moving() {
            log::info!(
                "{} at {} (target {})",
                summary.state,
                summary.position_rounded,
                summary.target_position
            );
        } else if state_last.is_moving() {
            log::info!(
                "stopped at {:.2} (target {})",
                summary.position,
                summary.target_position
            );
        }
        state_last = summary.state;
    }
}

async fn feedback_run(
    relay_pair: &RelayPair,
    mut receiver: mpsc::UnboundedReceiver<(RelayId, bool)>,
) {
    while let Some((relay, is_on)) = receiver.recv().await {
        relay_pair.feedback(relay, is_on);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let arguments = Arguments::parse();

    logging::configure(module_path!(), arguments.verbose);

    let configuration = arguments.motion_configuration()?;
    let range = configuration.range;
    let update_interval = configuration.update_interval();

    let mut model = Model::new(configuration).context("model")?;
    if let Some(initial_position) = arguments.initial_position {
        ensure!(
            range.contains(initial_position),
            "initial position {} outside of {}",
            initial_position,
            range
        );
        model.set_current_position(initial_position);
    }
    let model = Arc::new(Mutex::new(model));

    let (feedback_sender, feedback_receiver) = mpsc::unbounded_channel();
    let relay_pair = if arguments.relays {
        let relay_pair = RelayPair::new(
            relay_pair::Configuration {
                increase: RelayId(1),
                decrease: RelayId(2),
            },
            Arc::new(EchoBus {
                sender: feedback_sender,
            }),
            model.clone(),
        )
        .context("relay_pair")?;
        Some(Arc::new(relay_pair))
    } else {
        None
    };

    let commands: Arc<dyn Commands> = match &relay_pair {
        Some(relay_pair) => relay_pair.clone(),
        None => Arc::new(SimulatedCommands::new(model.clone())),
    };
    let controller = Mutex::new(Controller::new(model, commands));

    log::info!(
        "travel time {:?}, range {}, {}",
        configuration.travel_time,
        range,
        if relay_pair.is_some() {
            "relays"
        } else {
            "simulated"
        }
    );

    let commands_future = commands_run(&controller, &range).fuse();
    pin_mut!(commands_future);

    let report_future = report_run(&controller, update_interval).fuse();
    pin_mut!(report_future);

    let feedback_future = async {
        match &relay_pair {
            Some(relay_pair) => feedback_run(relay_pair, feedback_receiver).await,
            None => futures::future::pending().await,
        }
    }
    .fuse();
    pin_mut!(feedback_future);

    select! {
        result = commands_future => result?,
        () = report_future => {},
        () = feedback_future => {},
    }

    let summary = controller.lock().summary();
    println!("{}", serde_json::to_string(&summary).context("to_string")?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ArgumentsTravelTime, Command, command_execute};
    use parking_lot::Mutex;
    use shutter_motion::motion::{
        Configuration, commands::SimulatedCommands, controller::Controller, model::Model,
    };
    use std::{sync::Arc, time::Duration};

    #[test]
    fn travel_time_units() {
        let parse = |s: &str| s.parse::<ArgumentsTravelTime>().unwrap().0;

        assert_eq!(parse("30000"), Duration::from_secs(30));
        assert_eq!(parse("1500ms"), Duration::from_millis(1500));
        assert_eq!(parse("30s"), Duration::from_secs(30));
        assert_eq!(parse("30 sec"), Duration::from_secs(30));
        assert_eq!(parse("1.5m"), Duration::from_secs(90));
        assert!("30h".parse::<ArgumentsTravelTime>().is_err());
        assert!("-5s".parse::<ArgumentsTravelTime>().is_err());
    }

    #[test]
    fn commands() {
        assert_eq!("target 50".parse::<Command>().unwrap(), Command::Target(50.0));
        assert_eq!(
            "state INCREASING".parse::<Command>().unwrap(),
            Command::State("INCREASING".to_owned())
        );
        assert_eq!(
            "position -2.5".parse::<Command>().unwrap(),
            Command::Position(-2.5)
        );
        assert_eq!("sync".parse::<Command>().unwrap(), Command::Sync);
        assert!("target".parse::<Command>().is_err());
        assert!("target NaN".parse::<Command>().is_err());
        assert!("target 1 2".parse::<Command>().is_err());
        assert!("jump".parse::<Command>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn position_outside_range_is_rejected() {
        let configuration = Configuration::new(Duration::from_secs(30));
        let range = configuration.range;
        let model = Arc::new(Mutex::new(Model::new(configuration).unwrap()));
        let controller = Mutex::new(Controller::new(
            model.clone(),
            Arc::new(SimulatedCommands::new(model.clone())),
        ));

        assert!(command_execute(&controller, &range, Command::Position(150.0)).is_err());
        assert!(command_execute(&controller, &range, Command::Position(-1.0)).is_err());
        assert_eq!(model.lock().current_position(), 0.0);

        assert!(command_execute(&controller, &range, Command::Position(42.0)).unwrap());
        assert_eq!(model.lock().current_position(), 42.0);
    }
}
