//! Export helpers for CSV and JSON artifacts.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Create a writer for the target path, handling stdout (`-`) by convention.
pub fn writer_for_path(path: &Path) -> io::Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

pub mod trajectory {
    use std::io::{self, Read, Write};

    use thiserror::Error;
    use transfer_core::{Control, ShapeError, State, Trajectory};

    pub const HEADER: &str = "t,x,y,vx,vy,ux,uy";
    const COLUMNS: usize = 7;

    /// Errors raised while reading a trajectory CSV.
    #[derive(Debug, Error)]
    pub enum ReadError {
        #[error("failed to read CSV: {0}")]
        Csv(#[from] csv::Error),
        #[error("CSV header must be 't,x,y,vx,vy,ux,uy' (got '{0}')")]
        Header(String),
        #[error("row {row}: expected 7 columns, got {got}")]
        Columns { row: usize, got: usize },
        #[error("row {row}, column '{column}': cannot parse '{value}'")]
        Value {
            row: usize,
            column: &'static str,
            value: String,
        },
        #[error("row {row}: control missing before the final sample")]
        MissingControl { row: usize },
        #[error(transparent)]
        Shape(#[from] ShapeError),
    }

    /// Write the standard trajectory CSV header.
    pub fn write_header(writer: &mut dyn Write) -> io::Result<()> {
        writeln!(writer, "{HEADER}")
    }

    /// One row per knot; the final knot carries no control.
    pub fn write_trajectory(writer: &mut dyn Write, trajectory: &Trajectory) -> io::Result<()> {
        write_header(writer)?;
        let controls = trajectory.controls();
        for (i, (t, x)) in trajectory.times().iter().zip(trajectory.states()).enumerate() {
            write!(writer, "{t:.9},{:.9},{:.9},{:.9},{:.9},", x[0], x[1], x[2], x[3])?;
            match controls.get(i) {
                Some(u) => writeln!(writer, "{:.9},{:.9}", u[0], u[1])?,
                None => writeln!(writer, ",")?,
            }
        }
        writer.flush()
    }

    /// Parse a trajectory written by [`write_trajectory`].
    pub fn read_trajectory<R: Read>(reader: R) -> Result<Trajectory, ReadError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        let names: Vec<&str> = headers.iter().collect();
        if names.join(",") != HEADER {
            return Err(ReadError::Header(names.join(",")));
        }

        let mut rows = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() != COLUMNS {
                return Err(ReadError::Columns {
                    row,
                    got: record.len(),
                });
            }
            rows.push(record);
        }

        let mut times = Vec::with_capacity(rows.len());
        let mut states = Vec::with_capacity(rows.len());
        let mut controls = Vec::with_capacity(rows.len().saturating_sub(1));
        let last = rows.len().saturating_sub(1);
        let names = ["t", "x", "y", "vx", "vy", "ux", "uy"];
        for (row, record) in rows.iter().enumerate() {
            let field = |index: usize| -> Result<Option<f64>, ReadError> {
                let raw = &record[index];
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse().map(Some).map_err(|_| ReadError::Value {
                    row,
                    column: names[index],
                    value: raw.to_string(),
                })
            };
            let required = |index: usize| -> Result<f64, ReadError> {
                field(index)?.ok_or(ReadError::Value {
                    row,
                    column: names[index],
                    value: String::new(),
                })
            };
            times.push(required(0)?);
            states.push(State::new(
                required(1)?,
                required(2)?,
                required(3)?,
                required(4)?,
            ));
            match (field(5)?, field(6)?) {
                (Some(ux), Some(uy)) if row < last => controls.push(Control::new(ux, uy)),
                _ if row == last => {}
                _ => return Err(ReadError::MissingControl { row }),
            }
        }
        Ok(Trajectory::new(states, controls, times)?)
    }
}

pub mod summary {
    use std::io::{self, Write};

    use serde::Serialize;
    use serde_json::to_writer_pretty;

    /// One verification check as exported.
    #[derive(Debug, Clone, Serialize)]
    pub struct CheckRecord {
        pub name: String,
        pub value: f64,
        pub limit: f64,
        pub passed: bool,
    }

    /// Solver counters as exported.
    #[derive(Debug, Clone, Serialize)]
    pub struct SolverRecord {
        pub status: String,
        pub outer_iterations: usize,
        pub inner_iterations: usize,
        pub elapsed_seconds: f64,
        pub violation: f64,
        pub objective: f64,
    }

    /// JSON sidecar describing one optimized transfer.
    #[derive(Debug, Clone, Serialize)]
    pub struct TransferSummary {
        pub scenario: String,
        pub initial_state: [f64; 4],
        pub minimum_time: f64,
        pub maximum_time: f64,
        pub knots: usize,
        pub time_of_flight: f64,
        pub fuel_used: f64,
        pub fuel_budget: f64,
        pub within_budget: bool,
        pub max_defect: f64,
        pub resimulation_drift: f64,
        pub passed: bool,
        pub checks: Vec<CheckRecord>,
        pub solver: SolverRecord,
    }

    #[derive(Serialize)]
    struct Sidecar<'a> {
        generated_utc: String,
        #[serde(flatten)]
        summary: &'a TransferSummary,
    }

    /// Write `summary` as pretty JSON, stamped with the current UTC time.
    pub fn write_summary(writer: &mut dyn Write, summary: &TransferSummary) -> io::Result<()> {
        let sidecar = Sidecar {
            generated_utc: chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
            summary,
        };
        to_writer_pretty(&mut *writer, &sidecar)?;
        writeln!(writer)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::trajectory::{ReadError, read_trajectory, write_trajectory};
    use transfer_core::{Control, State, Trajectory};

    fn sample() -> Trajectory {
        Trajectory::new(
            vec![
                State::new(-2.0, 0.1, 0.1, 3.0),
                State::new(-1.5, 0.4, 0.2, 2.5),
                State::new(-1.0, 0.6, 0.3, 2.0),
            ],
            vec![Control::new(0.5, -0.25), Control::new(0.0, 1.0)],
            vec![0.0, 0.5, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn final_row_has_empty_controls() {
        let mut buffer = Vec::new();
        write_trajectory(&mut buffer, &sample()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "t,x,y,vx,vy,ux,uy");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].ends_with(",,"));
    }

    #[test]
    fn written_csv_reads_back() {
        let mut buffer = Vec::new();
        write_trajectory(&mut buffer, &sample()).unwrap();
        let parsed = read_trajectory(buffer.as_slice()).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.controls()[0], Control::new(0.5, -0.25));
        assert!((parsed.states()[2] - sample().states()[2]).amax() < 1e-9);
    }

    #[test]
    fn missing_control_is_reported() {
        let text = "t,x,y,vx,vy,ux,uy\n0,0,0,0,0,,\n1,1,0,0,0,,\n";
        assert!(matches!(
            read_trajectory(text.as_bytes()),
            Err(ReadError::MissingControl { row: 0 })
        ));
    }

    #[test]
    fn summary_carries_a_timestamp() {
        use super::summary::{SolverRecord, TransferSummary, write_summary};
        let summary = TransferSummary {
            scenario: "demo".into(),
            initial_state: [-2.0, 0.1, 0.1, 3.0],
            minimum_time: 5.0,
            maximum_time: 15.0,
            knots: 80,
            time_of_flight: 12.0,
            fuel_used: 1.2,
            fuel_budget: 20.0,
            within_budget: true,
            max_defect: 1e-7,
            resimulation_drift: 0.4,
            passed: true,
            checks: Vec::new(),
            solver: SolverRecord {
                status: "converged".into(),
                outer_iterations: 8,
                inner_iterations: 120,
                elapsed_seconds: 0.5,
                violation: 1e-7,
                objective: 1.2,
            },
        };
        let mut buffer = Vec::new();
        write_summary(&mut buffer, &summary).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["scenario"], "demo");
        assert!(value["generated_utc"].as_str().unwrap().ends_with('Z'));
    }
}
