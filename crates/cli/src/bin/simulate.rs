use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::info;
use world_transfer::config::load_world;
use world_transfer::dynamics::{RocketDynamics, Scheme, Simulator, fuel_used};
use world_transfer::export::{trajectory as trajectory_csv, writer_for_path};
use world_transfer::trajopt::world;
use world_transfer::{State, World, vector};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Replay a control tape (or coast) and write the trajectory as CSV"
)]
struct Cli {
    /// Initial state as x,y,vx,vy (defaults to the first row of --controls)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    initial: Option<Vec<f64>>,

    /// Trajectory CSV whose time stamps and controls are replayed
    #[arg(long)]
    controls: Option<PathBuf>,

    /// Coast duration when no control tape is given
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Number of output intervals when coasting
    #[arg(long, default_value_t = 200)]
    steps: usize,

    /// Sub-steps per interval
    #[arg(long, default_value_t = 4)]
    substeps: usize,

    #[arg(long, value_enum, default_value_t = SchemeMode::Rk4)]
    scheme: SchemeMode,

    /// World definition (defaults to the standard two-world system)
    #[arg(long)]
    world: Option<PathBuf>,

    /// Trajectory CSV path (`-` for stdout)
    #[arg(long, default_value = "-")]
    output: PathBuf,
}

#[derive(Copy, Clone, ValueEnum, Debug)]
enum SchemeMode {
    Euler,
    Rk4,
}

fn main() -> anyhow::Result<()> {
    world_transfer::init_tracing();
    let cli = Cli::parse();

    let world = match &cli.world {
        Some(path) => world::from_config(&load_world(path)?)?,
        None => World::standard(),
    };
    let scheme = match cli.scheme {
        SchemeMode::Euler => Scheme::Euler,
        SchemeMode::Rk4 => Scheme::RungeKutta4,
    };
    let simulator = Simulator::new(RocketDynamics::new(world))
        .with_scheme(scheme)
        .with_substeps(cli.substeps);

    let initial = match &cli.initial {
        Some(values) => {
            let &[x, y, vx, vy] = values.as_slice() else {
                bail!("--initial needs exactly four values (x,y,vx,vy), got {}", values.len());
            };
            Some(State::new(x, y, vx, vy))
        }
        None => None,
    };

    let trajectory = match &cli.controls {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening control tape {}", path.display()))?;
            let tape = trajectory_csv::read_trajectory(file)?;
            let start = initial.unwrap_or(*tape.initial_state());
            simulator.simulate_states_over_time(&start, tape.times(), tape.controls())?
        }
        None => {
            let Some(start) = initial else {
                bail!("--initial is required when no --controls tape is given");
            };
            if !(cli.duration > 0.0) || cli.steps == 0 {
                bail!("--duration must be positive and --steps at least 1");
            }
            let times = vector::linspace(0.0, cli.duration, cli.steps + 1);
            simulator.simulate_states_over_time_passive(&start, &times)?
        }
    };

    info!(
        samples = trajectory.len(),
        duration = trajectory.duration(),
        fuel = fuel_used(&trajectory, 1.0),
        "simulation finished"
    );
    let mut writer = writer_for_path(&cli.output)?;
    trajectory_csv::write_trajectory(writer.as_mut(), &trajectory)?;
    Ok(())
}
