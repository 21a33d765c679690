use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::info;
use world_transfer::config::{ScenarioExpectation, find_scenario, load_scenarios, load_world};
use world_transfer::export::summary::{CheckRecord, SolverRecord, TransferSummary, write_summary};
use world_transfer::export::{trajectory as trajectory_csv, writer_for_path};
use world_transfer::trajopt::{
    Collocation, FuelPolicy, SolvedTransfer, TransferReport, TransferRequest, scenario, world,
};
use world_transfer::{State, World, plan_transfer, verify};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Optimize a low-thrust transfer into orbit around the destination world"
)]
struct Cli {
    /// Scenario name from the catalog (case-insensitive)
    #[arg(long, conflicts_with = "initial")]
    scenario: Option<String>,

    /// Scenario catalog: a YAML list, a TOML file or a directory of TOML files
    #[arg(long, default_value = "configs/scenarios")]
    scenarios: PathBuf,

    /// World definition (defaults to the standard two-world system)
    #[arg(long)]
    world: Option<PathBuf>,

    /// Initial state as x,y,vx,vy
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    initial: Option<Vec<f64>>,

    /// Earliest arrival time
    #[arg(long)]
    min_time: Option<f64>,

    /// Latest arrival time
    #[arg(long)]
    max_time: Option<f64>,

    /// Number of knot intervals
    #[arg(long)]
    knots: Option<usize>,

    #[arg(long, value_enum)]
    fuel_mode: Option<FuelMode>,

    #[arg(long, value_enum)]
    collocation: Option<CollocationMode>,

    /// Wall-clock limit for the solver in seconds (0 for none)
    #[arg(long)]
    time_limit: Option<f64>,

    /// Trajectory CSV path (`-` for stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON summary path
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Copy, Clone, ValueEnum, Debug)]
enum FuelMode {
    Constraint,
    Report,
}

#[derive(Copy, Clone, ValueEnum, Debug)]
enum CollocationMode {
    Trapezoidal,
    HermiteSimpson,
}

fn main() -> anyhow::Result<()> {
    world_transfer::init_tracing();
    let cli = Cli::parse();

    let world = match &cli.world {
        Some(path) => world::from_config(&load_world(path)?)?,
        None => World::standard(),
    };
    let (name, mut request, expectation) = build_request(&cli)?;
    apply_overrides(&cli, &mut request);

    println!("=== Transfer Request ===");
    println!("Scenario        : {name}");
    println!("Initial state   : {}", format_state(&request.initial_state));
    println!(
        "Time window     : [{}, {}]",
        request.minimum_time, request.maximum_time
    );
    println!(
        "Knots           : {} ({:?})",
        request.options.knots, request.options.collocation
    );

    let solved = match plan_transfer(&world, &request) {
        Ok(solved) => solved,
        Err(err) => {
            if let Some(attempt) = err.attempt() {
                eprintln!(
                    "best attempt: T = {:.4}, violation = {:.3e}, {} outer / {} inner iterations",
                    attempt.trajectory.duration(),
                    attempt.stats.violation,
                    attempt.stats.outer_iterations,
                    attempt.stats.inner_iterations
                );
            }
            if expectation == ScenarioExpectation::Infeasible {
                eprintln!("scenario '{name}' is expected to be infeasible");
            }
            return Err(err).context(format!("transfer '{name}' failed"));
        }
    };

    let report = verify(&world, &request, &solved.trajectory);
    print_report(&request, &solved, &report);

    if let Some(path) = &cli.output {
        let mut writer = writer_for_path(path)?;
        trajectory_csv::write_trajectory(writer.as_mut(), &solved.trajectory)?;
        info!(path = %path.display(), "wrote trajectory");
    }
    if let Some(path) = &cli.summary {
        let mut writer = writer_for_path(path)?;
        write_summary(writer.as_mut(), &summarize(&name, &request, &solved, &report))?;
        info!(path = %path.display(), "wrote summary");
    }

    if !report.passed() {
        let failed: Vec<&str> = report.failures().iter().map(|c| c.name).collect();
        bail!("verification failed: {}", failed.join(", "));
    }
    Ok(())
}

fn build_request(cli: &Cli) -> anyhow::Result<(String, TransferRequest, ScenarioExpectation)> {
    if let Some(wanted) = &cli.scenario {
        let catalog = load_scenarios(&cli.scenarios)
            .with_context(|| format!("loading scenarios from {}", cli.scenarios.display()))?;
        let config = find_scenario(&catalog, wanted)?;
        let mut request = scenario::from_config(config);
        if let Some(min) = cli.min_time {
            request.minimum_time = min;
        }
        if let Some(max) = cli.max_time {
            request.maximum_time = max;
        }
        return Ok((config.name.clone(), request, config.expect));
    }

    let Some(values) = &cli.initial else {
        bail!("either --scenario or --initial must be given");
    };
    let &[x, y, vx, vy] = values.as_slice() else {
        bail!("--initial needs exactly four values (x,y,vx,vy), got {}", values.len());
    };
    let (Some(min), Some(max)) = (cli.min_time, cli.max_time) else {
        bail!("--min-time and --max-time are required with --initial");
    };
    Ok((
        "custom".to_string(),
        TransferRequest::new(State::new(x, y, vx, vy), min, max),
        ScenarioExpectation::Feasible,
    ))
}

fn apply_overrides(cli: &Cli, request: &mut TransferRequest) {
    let options = &mut request.options;
    if let Some(knots) = cli.knots {
        options.knots = knots;
    }
    if let Some(mode) = cli.fuel_mode {
        options.fuel_policy = match mode {
            FuelMode::Constraint => FuelPolicy::Constraint,
            FuelMode::Report => FuelPolicy::Report,
        };
    }
    if let Some(mode) = cli.collocation {
        options.collocation = match mode {
            CollocationMode::Trapezoidal => Collocation::Trapezoidal,
            CollocationMode::HermiteSimpson => Collocation::HermiteSimpson,
        };
    }
    if let Some(seconds) = cli.time_limit {
        options.solver.time_limit = scenario::time_limit(seconds);
    }
}

fn print_report(request: &TransferRequest, solved: &SolvedTransfer, report: &TransferReport) {
    let stats = &solved.stats;
    let final_state = solved.trajectory.final_state();
    println!("=== Transfer ===");
    println!("Time of flight  : {:.4}", report.time_of_flight);
    println!(
        "Fuel used       : {:.4} / {:.1} ({})",
        report.fuel_used,
        request.options.fuel_budget,
        if report.within_budget {
            "within budget"
        } else {
            "over budget"
        }
    );
    println!("Final state     : {}", format_state(final_state));
    println!(
        "Solver          : {} outer / {} inner iterations in {:.2?}, violation {:.2e}",
        stats.outer_iterations, stats.inner_iterations, stats.elapsed, stats.violation
    );
    println!("Max defect      : {:.3e}", report.max_defect);
    println!("RK4 drift       : {:.3e}", report.resimulation_drift);
    println!("=== Checks ===");
    for check in &report.checks {
        println!("{check}");
    }
}

fn summarize(
    name: &str,
    request: &TransferRequest,
    solved: &SolvedTransfer,
    report: &TransferReport,
) -> TransferSummary {
    let s = &request.initial_state;
    TransferSummary {
        scenario: name.to_string(),
        initial_state: [s[0], s[1], s[2], s[3]],
        minimum_time: request.minimum_time,
        maximum_time: request.maximum_time,
        knots: request.options.knots,
        time_of_flight: report.time_of_flight,
        fuel_used: report.fuel_used,
        fuel_budget: request.options.fuel_budget,
        within_budget: report.within_budget,
        max_defect: report.max_defect,
        resimulation_drift: report.resimulation_drift,
        passed: report.passed(),
        checks: report
            .checks
            .iter()
            .map(|c| CheckRecord {
                name: c.name.to_string(),
                value: c.value,
                limit: c.limit,
                passed: c.passed,
            })
            .collect(),
        solver: SolverRecord {
            status: "converged".to_string(),
            outer_iterations: solved.stats.outer_iterations,
            inner_iterations: solved.stats.inner_iterations,
            elapsed_seconds: solved.stats.elapsed.as_secs_f64(),
            violation: solved.stats.violation,
            objective: solved.stats.objective,
        },
    }
}

fn format_state(x: &State) -> String {
    format!(
        "x = {:.4}, y = {:.4}, vx = {:.4}, vy = {:.4}",
        x[0], x[1], x[2], x[3]
    )
}
