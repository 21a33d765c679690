use assert_cmd::Command;
use std::fs;

use world_transfer::dynamics::{simulate_states_over_time, simulate_states_over_time_passive};
use world_transfer::export::{trajectory::write_trajectory, writer_for_path};
use world_transfer::{Control, State, Trajectory, World, vector};

fn render(dir: &std::path::Path, name: &str, trajectory: &Trajectory) -> u64 {
    let csv_path = dir.join(format!("{name}.csv"));
    let png_path = dir.join(format!("{name}.png"));
    let mut writer = writer_for_path(&csv_path).expect("csv create");
    write_trajectory(writer.as_mut(), trajectory).expect("csv write");
    drop(writer);

    Command::cargo_bin("trajectory_plot")
        .expect("trajectory_plot bin")
        .args([
            "--input",
            csv_path.to_str().unwrap(),
            "--output",
            png_path.to_str().unwrap(),
            "--width",
            "400",
            "--height",
            "300",
            "--no-labels",
        ])
        .assert()
        .success();

    fs::metadata(png_path).expect("png metadata").len()
}

#[test]
fn trajectory_plot_renders_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let times = vector::linspace(0.0, 1.5, 31);
    let coast = simulate_states_over_time_passive(
        &World::standard(),
        &State::new(-2.0, 0.1, 0.1, 3.0),
        &times,
    )
    .expect("simulate");
    assert!(render(dir.path(), "coast", &coast) > 0, "PNG output should not be empty");
}

#[test]
fn thrust_arrows_render_along_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let times = vector::linspace(0.0, 1.0, 21);
    let controls = vec![Control::new(1.5, -0.5); 20];
    let burn = simulate_states_over_time(
        &World::standard(),
        &State::new(-2.0, 0.1, 0.1, 3.0),
        &times,
        &controls,
    )
    .expect("simulate");
    assert!(render(dir.path(), "burn", &burn) > 0, "PNG output should not be empty");
}
