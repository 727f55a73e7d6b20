//! report tables for phase data, rendered with tabled
//!
//! These take plain vectors/matrices so they stay decoupled from the phase
//! type; the phase exposes thin wrappers that gather its own data and log
//! the rendered tables at info level.
use nalgebra::{DMatrix, DVector};
use tabled::builder::Builder;
use tabled::settings::Style;

/// Bounds table: one column per state/control/static variable plus a time
/// row pair at the bottom.
pub fn bounds_report(
    state_lower: &DVector<f64>,
    state_upper: &DVector<f64>,
    control_lower: &DVector<f64>,
    control_upper: &DVector<f64>,
    static_lower: &DVector<f64>,
    static_upper: &DVector<f64>,
    time_lower: f64,
    time_upper: f64,
) -> String {
    let mut builder = Builder::default();
    let mut header: Vec<String> = vec!["".to_string()];
    for ii in 0..state_lower.len() {
        header.push(format!("STATE{:02}", ii));
    }
    for ii in 0..control_lower.len() {
        header.push(format!("CNTRL{:02}", ii));
    }
    for ii in 0..static_lower.len() {
        header.push(format!("STATIC{:02}", ii));
    }
    header.push("TIME".to_string());
    builder.push_record(header);

    let mut lower_row: Vec<String> = vec!["Lower Bounds".to_string()];
    for v in state_lower.iter().chain(control_lower.iter()).chain(static_lower.iter()) {
        lower_row.push(format!("{:.7}", v));
    }
    lower_row.push(format!("{:.7}", time_lower));
    builder.push_record(lower_row);

    let mut upper_row: Vec<String> = vec!["Upper Bounds".to_string()];
    for v in state_upper.iter().chain(control_upper.iter()).chain(static_upper.iter()) {
        upper_row.push(format!("{:.7}", v));
    }
    upper_row.push(format!("{:.7}", time_upper));
    builder.push_record(upper_row);

    let mut table = builder.build();
    table.with(Style::modern_rounded());
    table.to_string()
}

/// Decision vector table: point index, time, state row and (when the point
/// carries one) control row. `has_state` / `has_control` flag per time point
/// which blocks are present.
pub fn decision_vector_report(
    times: &DVector<f64>,
    state_array: &DMatrix<f64>,
    control_array: &DMatrix<f64>,
    has_state: &[bool],
    has_control: &[bool],
    static_vector: &DVector<f64>,
) -> String {
    let mut builder = Builder::default();
    let mut header: Vec<String> = vec!["Point".to_string(), "TIME".to_string()];
    for ii in 0..state_array.ncols() {
        header.push(format!("STATE{:02}", ii));
    }
    for ii in 0..control_array.ncols() {
        header.push(format!("CNTRL{:02}", ii));
    }
    builder.push_record(header);

    let mut state_idx = 0;
    let mut control_idx = 0;
    for pt in 0..times.len() {
        let mut row: Vec<String> = vec![format!("{}", pt), format!("{:.7}", times[pt])];
        if has_state[pt] {
            for jj in 0..state_array.ncols() {
                row.push(format!("{:.7}", state_array[(state_idx, jj)]));
            }
            state_idx += 1;
        } else {
            for _ in 0..state_array.ncols() {
                row.push("".to_string());
            }
        }
        if has_control[pt] {
            for jj in 0..control_array.ncols() {
                row.push(format!("{:.7}", control_array[(control_idx, jj)]));
            }
            control_idx += 1;
        }
        builder.push_record(row);
    }

    if static_vector.len() > 0 {
        let mut row: Vec<String> = vec!["static".to_string(), "".to_string()];
        for v in static_vector.iter() {
            row.push(format!("{:.7}", v));
        }
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());
    table.to_string()
}

/// Defect constraint table: one row per collocation point carrying defects.
pub fn defect_constraint_report(defect_con_vec: &DVector<f64>, num_states: usize) -> String {
    let mut builder = Builder::default();
    let mut header: Vec<String> = vec!["Intrvl".to_string()];
    for ii in 0..num_states {
        header.push(format!("DEFECT{:02}", ii));
    }
    builder.push_record(header);

    let num_rows = defect_con_vec.len() / num_states;
    for point in 0..num_rows {
        let mut row: Vec<String> = vec![format!("{}", point)];
        for jj in 0..num_states {
            row.push(format!("{:.7e}", defect_con_vec[point * num_states + jj]));
        }
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tables_render_all_sections() {
        let bounds = bounds_report(
            &DVector::from_vec(vec![-1.0, -2.0]),
            &DVector::from_vec(vec![1.0, 2.0]),
            &DVector::from_vec(vec![-0.5]),
            &DVector::from_vec(vec![0.5]),
            &DVector::zeros(0),
            &DVector::zeros(0),
            0.0,
            10.0,
        );
        assert!(bounds.contains("STATE00"));
        assert!(bounds.contains("CNTRL00"));
        assert!(bounds.contains("Lower Bounds"));

        let times = DVector::from_vec(vec![0.0, 1.0, 2.0]);
        let states = DMatrix::from_row_slice(3, 1, &[0.0, 0.5, 1.0]);
        let controls = DMatrix::from_row_slice(2, 1, &[0.1, 0.2]);
        let table = decision_vector_report(
            &times,
            &states,
            &controls,
            &[true, true, true],
            &[true, true, false],
            &DVector::zeros(0),
        );
        assert!(table.contains("TIME"));
        assert!(table.contains("0.5000000"));

        let defects = defect_constraint_report(&DVector::from_vec(vec![1.0e-9, -2.0e-9]), 1);
        assert!(defects.contains("DEFECT00"));
    }
}
