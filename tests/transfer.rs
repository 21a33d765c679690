use world_transfer::trajopt::{FuelPolicy, InputError, TransferRequest};
use world_transfer::{
    Control, State, Trajectory, TransferError, World, compute_trajectory_to_other_world,
    plan_transfer, verify,
};

#[test]
fn example_transfers_reach_the_target_orbit() {
    let world = World::standard();
    for vy in [0.1, -0.1] {
        let initial = State::new(-2.0, 0.1, vy, 3.0);
        let trajectory = compute_trajectory_to_other_world(initial, 5.0, 15.0)
            .unwrap_or_else(|err| panic!("transfer from vy = {vy} failed: {err}"));

        assert_eq!(trajectory.initial_state(), &initial);
        assert_eq!(trajectory.times()[0], 0.0);
        let tof = trajectory.duration();
        assert!((5.0..=15.0).contains(&tof), "time of flight {tof}");

        let request = TransferRequest::new(initial, 5.0, 15.0);
        let report = verify(&world, &request, &trajectory);
        assert!(report.passed(), "failed checks: {:?}", report.failures());
        assert!(report.fuel_used <= 20.0);
    }
}

#[test]
fn report_mode_still_reports_fuel() {
    let world = World::standard();
    let mut request = TransferRequest::new(State::new(-2.0, 0.1, 0.1, 3.0), 5.0, 15.0);
    request.options.fuel_policy = FuelPolicy::Report;
    request.options.knots = 60;
    let solved = plan_transfer(&world, &request).expect("transfer");
    assert!(solved.within_budget);
    assert!(solved.fuel_used > 0.0);
    let report = verify(&world, &request, &solved.trajectory);
    assert!(report.passed(), "failed checks: {:?}", report.failures());
}

#[test]
fn coarse_solution_warm_starts_a_finer_grid() {
    let world = World::standard();
    let initial = State::new(-2.0, 0.1, 0.1, 3.0);
    let mut coarse = TransferRequest::new(initial, 5.0, 15.0);
    coarse.options.knots = 30;
    let coarse = plan_transfer(&world, &coarse).expect("coarse transfer");

    // resampled onto the default grid; may settle in a different local minimum
    let request = TransferRequest::new(initial, 5.0, 15.0).with_warm_start(coarse.trajectory);
    let solved = plan_transfer(&world, &request).expect("warm-started transfer");
    assert_eq!(solved.trajectory.intervals(), request.options.knots);
    let report = verify(&world, &request, &solved.trajectory);
    assert!(report.passed(), "failed checks: {:?}", report.failures());
}

#[test]
fn single_sample_warm_start_is_rejected() {
    let initial = State::new(-2.0, 0.1, 0.1, 3.0);
    let lone = Trajectory::new(vec![initial], Vec::<Control>::new(), vec![0.0]).unwrap();
    let request = TransferRequest::new(initial, 5.0, 15.0).with_warm_start(lone);
    assert!(matches!(
        plan_transfer(&World::standard(), &request),
        Err(TransferError::InvalidInput(InputError::WarmStartTooShort))
    ));
}

#[test]
fn impossible_window_is_not_reported_as_success() {
    let result = compute_trajectory_to_other_world(State::new(-2.0, 0.1, 0.1, 3.0), 0.05, 0.1);
    match result {
        Err(TransferError::Infeasible { violation, .. })
        | Err(TransferError::NotConverged { violation, .. }) => assert!(violation > 1e-3),
        other => panic!("expected infeasible or not converged, got {other:?}"),
    }
}

#[test]
fn invalid_inputs_are_rejected() {
    let state = State::new(-2.0, 0.1, 0.1, 3.0);
    assert!(matches!(
        compute_trajectory_to_other_world(state, 10.0, 5.0),
        Err(TransferError::InvalidInput(InputError::InvalidWindow { .. }))
    ));
    assert!(matches!(
        compute_trajectory_to_other_world(State::new(f64::NAN, 0.0, 0.0, 0.0), 5.0, 15.0),
        Err(TransferError::InvalidInput(InputError::NonFiniteState))
    ));
    assert!(matches!(
        compute_trajectory_to_other_world(State::new(2.5, 0.1, 0.0, 0.0), 5.0, 15.0),
        Err(TransferError::InvalidInput(InputError::StateAtBody(_)))
    ));
}
