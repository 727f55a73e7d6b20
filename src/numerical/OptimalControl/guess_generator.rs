//! Initial guess construction for the decision vector.
//!
//! Six modes: the linear family interpolates the state linearly between the
//! configured initial and final guesses over the discretization times with
//! constant control (zero or unity); GuessArrays and OCHFile interpolate
//! user-supplied (time, state, control) samples onto the discretization
//! times; UserGuessClass delegates sample production to a user trait. Guess
//! sample times must be strictly increasing - malformed data is a
//! recoverable error, never silently reordered.
use log::info;
use nalgebra::{DMatrix, DVector};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum InitialGuessMode {
    LinearNoControl,
    LinearUnityControl,
    LinearCoast,
    UserGuessClass,
    OCHFile,
    GuessArrays,
}

/// Raw (time, state, control) samples a guess is interpolated from.
#[derive(Debug, Clone)]
pub struct TrajectoryGuessData {
    pub times: DVector<f64>,
    pub states: DMatrix<f64>,
    pub controls: DMatrix<f64>,
}

/// Object-safe clone support for boxed guess sources.
pub trait TrajectoryGuessSourceClone {
    fn clone_box(&self) -> Box<dyn TrajectoryGuessSource>;
}

impl<T> TrajectoryGuessSourceClone for T
where
    T: 'static + TrajectoryGuessSource + Clone,
{
    fn clone_box(&self) -> Box<dyn TrajectoryGuessSource> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn TrajectoryGuessSource> {
    fn clone(&self) -> Box<dyn TrajectoryGuessSource> {
        self.clone_box()
    }
}

/// User-implemented guess source for the UserGuessClass mode.
pub trait TrajectoryGuessSource: TrajectoryGuessSourceClone {
    fn guess_data(&self) -> Result<TrajectoryGuessData, String>;
}

#[derive(Debug, Clone)]
pub struct GuessGenerator {
    time_vector: DVector<f64>,
    num_state_vars: usize,
    num_state_points: usize,
    num_control_vars: usize,
    num_control_points: usize,
    mode: InitialGuessMode,
}

impl Default for GuessGenerator {
    fn default() -> Self {
        GuessGenerator {
            time_vector: DVector::zeros(0),
            num_state_vars: 0,
            num_state_points: 0,
            num_control_vars: 0,
            num_control_points: 0,
            mode: InitialGuessMode::LinearNoControl,
        }
    }
}

impl GuessGenerator {
    pub fn new() -> GuessGenerator {
        GuessGenerator::default()
    }

    pub fn initialize(
        &mut self,
        time_vector: &DVector<f64>,
        num_state_vars: usize,
        num_state_points: usize,
        num_control_vars: usize,
        num_control_points: usize,
        mode: InitialGuessMode,
    ) {
        if time_vector.len() < num_state_points {
            panic!(
                "GuessGenerator::initialize: the time vector has {} entries but {} state \
                 points were declared",
                time_vector.len(),
                num_state_points
            );
        }
        self.time_vector = time_vector.clone();
        self.num_state_vars = num_state_vars;
        self.num_state_points = num_state_points;
        self.num_control_vars = num_control_vars;
        self.num_control_points = num_control_points;
        self.mode = mode;
    }

    /// Straight-line state guess from the initial to the final configured
    /// state; controls all zero (LinearNoControl / LinearCoast) or all one
    /// (LinearUnityControl).
    pub fn compute_linear_guess(
        &self,
        initial_state: &DVector<f64>,
        final_state: &DVector<f64>,
    ) -> (DMatrix<f64>, DMatrix<f64>) {
        if initial_state.len() != self.num_state_vars || final_state.len() != self.num_state_vars {
            panic!(
                "GuessGenerator::compute_linear_guess: the initial/final state guesses must \
                 have numStateVars entries"
            );
        }
        let t_start = self.time_vector[0];
        let t_end = self.time_vector[self.num_state_points - 1];
        let span = t_end - t_start;

        let mut state_guess = DMatrix::zeros(self.num_state_points, self.num_state_vars);
        for row in 0..self.num_state_points {
            let fraction = if span != 0.0 {
                (self.time_vector[row] - t_start) / span
            } else {
                0.0
            };
            for var in 0..self.num_state_vars {
                state_guess[(row, var)] = initial_state[var]
                    + fraction * (final_state[var] - initial_state[var]);
            }
        }

        let control_value = match self.mode {
            InitialGuessMode::LinearUnityControl => 1.0,
            _ => 0.0,
        };
        let control_guess = DMatrix::from_element(
            self.num_control_points,
            self.num_control_vars,
            control_value,
        );
        (state_guess, control_guess)
    }

    /// Interpolate user samples onto the discretization times.
    pub fn compute_guess_from_array_data(
        &self,
        guess_data: &TrajectoryGuessData,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>), String> {
        validate_guess_data(guess_data, self.num_state_vars, self.num_control_vars)?;

        let mut state_guess = DMatrix::zeros(self.num_state_points, self.num_state_vars);
        for row in 0..self.num_state_points {
            let t = self.time_vector[row];
            for var in 0..self.num_state_vars {
                state_guess[(row, var)] =
                    interp_column(&guess_data.times, &guess_data.states, var, t);
            }
        }
        let mut control_guess = DMatrix::zeros(self.num_control_points, self.num_control_vars);
        for row in 0..self.num_control_points {
            let t = self.time_vector[row];
            for var in 0..self.num_control_vars {
                control_guess[(row, var)] =
                    interp_column(&guess_data.times, &guess_data.controls, var, t);
            }
        }
        Ok((state_guess, control_guess))
    }

    /// Read a trajectory guess file and interpolate it onto the
    /// discretization times.
    pub fn compute_guess_from_och_file(
        &self,
        file_name: &str,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>), String> {
        let guess_data =
            read_guess_file(file_name, self.num_state_vars, self.num_control_vars)?;
        info!(
            "guess file {} provided {} samples",
            file_name,
            guess_data.times.len()
        );
        self.compute_guess_from_array_data(&guess_data)
    }

    /// Pull samples from a user guess object and interpolate them.
    pub fn compute_user_function_guess(
        &self,
        guess_source: &dyn TrajectoryGuessSource,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>), String> {
        let guess_data = guess_source.guess_data()?;
        self.compute_guess_from_array_data(&guess_data)
    }
}

fn validate_guess_data(
    guess_data: &TrajectoryGuessData,
    num_state_vars: usize,
    num_control_vars: usize,
) -> Result<(), String> {
    let n = guess_data.times.len();
    if n < 2 {
        return Err("guess data must contain at least two time samples".to_string());
    }
    for i in 1..n {
        if guess_data.times[i] <= guess_data.times[i - 1] {
            return Err("data points are not in the correct temporal order".to_string());
        }
    }
    if guess_data.states.nrows() != n || guess_data.states.ncols() != num_state_vars {
        return Err(format!(
            "guess state array is {}x{} but {}x{} was expected",
            guess_data.states.nrows(),
            guess_data.states.ncols(),
            n,
            num_state_vars
        ));
    }
    if num_control_vars > 0
        && (guess_data.controls.nrows() != n || guess_data.controls.ncols() != num_control_vars)
    {
        return Err(format!(
            "guess control array is {}x{} but {}x{} was expected",
            guess_data.controls.nrows(),
            guess_data.controls.ncols(),
            n,
            num_control_vars
        ));
    }
    Ok(())
}

/// Piecewise-linear interpolation of one sample column, constant beyond the
/// sample range.
fn interp_column(times: &DVector<f64>, samples: &DMatrix<f64>, col: usize, t: f64) -> f64 {
    let n = times.len();
    if t <= times[0] {
        return samples[(0, col)];
    }
    if t >= times[n - 1] {
        return samples[(n - 1, col)];
    }
    let mut seg = 0;
    while seg < n - 2 && times[seg + 1] <= t {
        seg += 1;
    }
    let weight = (t - times[seg]) / (times[seg + 1] - times[seg]);
    (1.0 - weight) * samples[(seg, col)] + weight * samples[(seg + 1, col)]
}

/// Read a trajectory guess file: one sample per line,
/// time, state..., control..., comma separated (whitespace tolerated),
/// '#' comments. The time column must be strictly increasing.
pub fn read_guess_file(
    file_name: &str,
    num_state_vars: usize,
    num_control_vars: usize,
) -> Result<TrajectoryGuessData, String> {
    let raw = std::fs::read_to_string(file_name)
        .map_err(|e| format!("failed to read guess file {}: {}", file_name, e))?;
    // purely whitespace-separated lines become comma-separated; lines that
    // already carry commas go through untouched (field trimming handles the
    // surrounding spaces)
    let normalized: String = raw
        .lines()
        .map(|line| {
            if line.contains(',') {
                line.to_string()
            } else {
                line.split_whitespace().collect::<Vec<_>>().join(",")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(normalized.as_bytes());

    let expected_cols = 1 + num_state_vars + num_control_vars;
    let mut times: Vec<f64> = Vec::new();
    let mut state_rows: Vec<Vec<f64>> = Vec::new();
    let mut control_rows: Vec<Vec<f64>> = Vec::new();

    for (line_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("failed to parse guess file: {}", e))?;
        if record.is_empty() || (record.len() == 1 && record[0].is_empty()) {
            continue;
        }
        if record.len() != expected_cols {
            return Err(format!(
                "guess file line {} has {} columns but {} were expected \
                 (time + {} states + {} controls)",
                line_idx + 1,
                record.len(),
                expected_cols,
                num_state_vars,
                num_control_vars
            ));
        }
        let mut values = Vec::with_capacity(expected_cols);
        for field in record.iter() {
            values.push(
                f64::from_str(field)
                    .map_err(|e| format!("guess file line {}: bad number {:?}: {}", line_idx + 1, field, e))?,
            );
        }
        times.push(values[0]);
        state_rows.push(values[1..1 + num_state_vars].to_vec());
        control_rows.push(values[1 + num_state_vars..].to_vec());
    }

    let n = times.len();
    if n < 2 {
        return Err("guess file must contain at least two samples".to_string());
    }
    for i in 1..n {
        if times[i] <= times[i - 1] {
            return Err("data points are not in the correct temporal order".to_string());
        }
    }

    let states = DMatrix::from_fn(n, num_state_vars, |r, c| state_rows[r][c]);
    let controls = DMatrix::from_fn(n, num_control_vars, |r, c| control_rows[r][c]);
    Ok(TrajectoryGuessData {
        times: DVector::from_vec(times),
        states,
        controls,
    })
}
