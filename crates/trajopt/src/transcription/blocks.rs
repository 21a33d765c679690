//! Constraint and objective blocks of the transcribed transfer.

use transfer_core::{Vector2, state};
use transfer_dynamics::{Collocation, RocketDynamics};
use transfer_nlp::{Function, Rows};
use transfer_orbits::TargetOrbit;

use super::layout::Layout;

/// Collocation defects of every interval (4 rows each).
pub struct DynamicsDefects {
    pub layout: Layout,
    pub dynamics: RocketDynamics,
    pub scheme: Collocation,
}

impl Function for DynamicsDefects {
    fn rows(&self) -> usize {
        4 * self.layout.intervals()
    }

    fn columns(&self) -> usize {
        self.layout.variable_count()
    }

    fn evaluate(&self, x: &[f64], out: &mut Rows) {
        let layout = &self.layout;
        let n = layout.intervals();
        let h = layout.step(x);
        let time = layout.time_column();
        for i in 0..n {
            let start = layout.state(x, i);
            let end = layout.state(x, i + 1);
            let control = layout.control(x, i);
            let (defect, jac) =
                self.scheme
                    .defect_with_jacobian(&self.dynamics, &start, &end, &control, h);
            let (a, b, g) = (&jac.start, &jac.end, &jac.control);
            let start_col = layout.state_column(i);
            let end_col = layout.state_column(i + 1);
            let control_col = layout.control_column(i);
            for r in 0..4 {
                let start_terms = start_col
                    .into_iter()
                    .flat_map(move |c| (0..4).map(move |k| (c + k, a[(r, k)])));
                let end_terms = end_col
                    .into_iter()
                    .flat_map(move |c| (0..4).map(move |k| (c + k, b[(r, k)])));
                let control_terms = (0..2).map(move |k| (control_col + k, g[(r, k)]));
                // dh/dT = 1/N
                let time_terms = time.map(|c| (c, jac.step[r] / n as f64));
                out.push(
                    defect[r],
                    start_terms
                        .chain(control_terms)
                        .chain(end_terms)
                        .chain(time_terms),
                );
            }
        }
    }

    fn name(&self) -> &str {
        "dynamics defects"
    }
}

/// Final knot on the target circle, tangential at circular speed (3 rows).
pub struct TerminalOrbit {
    pub layout: Layout,
    pub orbit: TargetOrbit,
}

impl Function for TerminalOrbit {
    fn rows(&self) -> usize {
        3
    }

    fn columns(&self) -> usize {
        self.layout.variable_count()
    }

    fn evaluate(&self, x: &[f64], out: &mut Rows) {
        let knot = self.layout.intervals();
        let terminal = self.layout.state(x, knot);
        let residuals = self.orbit.residuals(&terminal);
        let jac = &self.orbit.residual_jacobian(&terminal);
        let column = self.layout.state_column(knot);
        for r in 0..3 {
            out.push(
                residuals[r],
                column
                    .into_iter()
                    .flat_map(move |c| (0..4).map(move |k| (c + k, jac[(r, k)])))
                    .filter(|(_, v)| *v != 0.0),
            );
        }
    }

    fn name(&self) -> &str {
        "terminal orbit"
    }
}

/// `clearance^2 - |p - b|^2 <= 0` for every free knot and every body.
pub struct Clearance {
    pub layout: Layout,
    pub centers: Vec<Vector2>,
    pub clearance: f64,
}

impl Function for Clearance {
    fn rows(&self) -> usize {
        self.layout.intervals() * self.centers.len()
    }

    fn columns(&self) -> usize {
        self.layout.variable_count()
    }

    fn evaluate(&self, x: &[f64], out: &mut Rows) {
        let limit = self.clearance * self.clearance;
        for knot in 1..=self.layout.intervals() {
            let Some(c) = self.layout.state_column(knot) else {
                continue;
            };
            let p = state::position(&self.layout.state(x, knot));
            for center in &self.centers {
                let r = p - center;
                out.push(
                    limit - r.norm_squared(),
                    [(c, -2.0 * r.x), (c + 1, -2.0 * r.y)],
                );
            }
        }
    }

    fn name(&self) -> &str {
        "body clearance"
    }
}

/// `|p|^2 - max_distance^2 <= 0` for every free knot.
pub struct Containment {
    pub layout: Layout,
    pub max_distance: f64,
}

impl Function for Containment {
    fn rows(&self) -> usize {
        self.layout.intervals()
    }

    fn columns(&self) -> usize {
        self.layout.variable_count()
    }

    fn evaluate(&self, x: &[f64], out: &mut Rows) {
        let limit = self.max_distance * self.max_distance;
        for knot in 1..=self.layout.intervals() {
            let Some(c) = self.layout.state_column(knot) else {
                continue;
            };
            let p = state::position(&self.layout.state(x, knot));
            out.push(
                p.norm_squared() - limit,
                [(c, 2.0 * p.x), (c + 1, 2.0 * p.y)],
            );
        }
    }

    fn name(&self) -> &str {
        "containment"
    }
}

/// `|u_i|^2 - cap^2 <= 0` for every interval.
pub struct ThrustCap {
    pub layout: Layout,
    pub max_thrust: f64,
}

impl Function for ThrustCap {
    fn rows(&self) -> usize {
        self.layout.intervals()
    }

    fn columns(&self) -> usize {
        self.layout.variable_count()
    }

    fn evaluate(&self, x: &[f64], out: &mut Rows) {
        let limit = self.max_thrust * self.max_thrust;
        for i in 0..self.layout.intervals() {
            let c = self.layout.control_column(i);
            let u = self.layout.control(x, i);
            out.push(
                u.norm_squared() - limit,
                [(c, 2.0 * u.x), (c + 1, 2.0 * u.y)],
            );
        }
    }

    fn name(&self) -> &str {
        "thrust cap"
    }
}

/// Sum of `|u_i|^2` and its gradient entries scaled by `scale`.
fn control_energy(layout: &Layout, x: &[f64], scale: f64) -> (f64, Vec<(usize, f64)>) {
    let mut total = 0.0;
    let mut entries = Vec::with_capacity(2 * layout.intervals() + 1);
    for i in 0..layout.intervals() {
        let c = layout.control_column(i);
        let u = layout.control(x, i);
        total += u.norm_squared();
        entries.push((c, 2.0 * scale * u.x));
        entries.push((c + 1, 2.0 * scale * u.y));
    }
    (total, entries)
}

/// Normalized budget row `(k h sum|u|^2 - budget) / budget <= 0`.
///
/// This row touches every control, so the solver handles it as a dense update.
pub struct FuelBudget {
    pub layout: Layout,
    pub coefficient: f64,
    pub budget: f64,
}

impl Function for FuelBudget {
    fn rows(&self) -> usize {
        1
    }

    fn columns(&self) -> usize {
        self.layout.variable_count()
    }

    fn evaluate(&self, x: &[f64], out: &mut Rows) {
        let h = self.layout.step(x);
        let scale = self.coefficient * h / self.budget;
        let (total, mut entries) = control_energy(&self.layout, x, scale);
        if let Some(c) = self.layout.time_column() {
            let n = self.layout.intervals() as f64;
            entries.push((c, self.coefficient * total / (n * self.budget)));
        }
        out.push((self.coefficient * h * total - self.budget) / self.budget, entries);
    }

    fn name(&self) -> &str {
        "fuel budget"
    }
}

/// Fuel proxy as residuals `sqrt(2 k h) * u`, so that `0.5 * sum(r^2) = k h sum|u|^2`.
pub struct FuelObjective {
    pub layout: Layout,
    pub coefficient: f64,
}

impl Function for FuelObjective {
    fn rows(&self) -> usize {
        2 * self.layout.intervals()
    }

    fn columns(&self) -> usize {
        self.layout.variable_count()
    }

    fn evaluate(&self, x: &[f64], out: &mut Rows) {
        let n = self.layout.intervals() as f64;
        let duration = self.layout.duration(x);
        let weight = (2.0 * self.coefficient * duration / n).sqrt();
        let time = self.layout.time_column();
        // d weight / dT
        let slope = 0.5 * weight / duration;
        for i in 0..self.layout.intervals() {
            let c = self.layout.control_column(i);
            let u = self.layout.control(x, i);
            for k in 0..2 {
                out.push(
                    weight * u[k],
                    std::iter::once((c + k, weight)).chain(time.map(|t| (t, slope * u[k]))),
                );
            }
        }
    }

    fn name(&self) -> &str {
        "fuel objective"
    }
}

/// `sqrt(w) * (T - minimum_time)`, a mild preference for short transfers.
pub struct TimeObjective {
    pub layout: Layout,
    pub minimum_time: f64,
    pub weight: f64,
}

impl Function for TimeObjective {
    fn rows(&self) -> usize {
        usize::from(self.layout.time_column().is_some())
    }

    fn columns(&self) -> usize {
        self.layout.variable_count()
    }

    fn evaluate(&self, x: &[f64], out: &mut Rows) {
        if let Some(c) = self.layout.time_column() {
            let w = self.weight.sqrt();
            out.push(w * (x[c] - self.minimum_time), [(c, w)]);
        }
    }

    fn name(&self) -> &str {
        "time objective"
    }
}
