use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::{DMatrix, DVector};
use RustedColloc::numerical::Collocation::Coll_traits::Transcription;
use RustedColloc::numerical::Collocation::Radau_main::RadauTranscription;
use RustedColloc::numerical::OptimalControl::decision_vector::DecisionVector;
use RustedColloc::numerical::OptimalControl::function_data::FunctionOutputData;
use RustedColloc::numerical::OptimalControl::problem_characteristics::ProblemCharacteristics;
use RustedColloc::numerical::OptimalControl::user_functions::{
    JacobianType, UserFunctionProperties,
};

/// Degree-7 Radau mesh with 4 intervals, 3 states, 2 controls; one full
/// defect function + Jacobian assembly per iteration.
fn setup() -> (
    RadauTranscription,
    ProblemCharacteristics,
    DecisionVector,
    Vec<FunctionOutputData>,
) {
    let mut config = ProblemCharacteristics::new();
    config.set_num_state_vars(3);
    config.set_num_control_vars(2);
    config.set_mesh_interval_fractions(&DVector::from_vec(vec![-1.0, -0.5, 0.0, 0.5, 1.0]));
    config.set_mesh_interval_num_points(&[7, 7, 7, 7]);
    config.set_has_defect_cons(true);

    let mut trans = RadauTranscription::new(3, 10);
    trans.initialize(&mut config);
    trans.set_time_vector(0.0, 2.0);

    let mut dec_vector = DecisionVector::new();
    dec_vector.initialize(3, 2, 0, 0, 29, 28, 0, 0);
    let n = dec_vector.num_decision_params();
    dec_vector.set_decision_vector(&DVector::from_iterator(
        n,
        (0..n).map(|i| (i as f64 * 0.37).sin()),
    ));

    let mut props = UserFunctionProperties::new();
    props.set_jacobian_pattern(JacobianType::State, DMatrix::from_element(3, 3, 1.0));
    props.set_jacobian_pattern(JacobianType::Control, DMatrix::from_element(3, 2, 1.0));
    props.set_jacobian_pattern(JacobianType::Time, DMatrix::zeros(3, 1));
    props.set_jacobian_pattern(JacobianType::Static, DMatrix::zeros(3, 0));
    props.set_num_functions(3);
    props.set_has_state_vars(true);
    props.set_has_control_vars(true);

    let mut dyn_data = Vec::new();
    for point in 0..trans.num_time_points() {
        let mut data = FunctionOutputData::new();
        data.set_functions(&DVector::from_vec(vec![
            (point as f64).sin(),
            (point as f64).cos(),
            0.5,
        ]));
        data.set_jacobian(JacobianType::State, &DMatrix::from_element(3, 3, 0.1));
        data.set_jacobian(JacobianType::Control, &DMatrix::from_element(3, 2, -0.2));
        data.set_jacobian(JacobianType::Time, &DMatrix::zeros(3, 1));
        data.set_jacobian(JacobianType::Static, &DMatrix::zeros(3, 0));
        let state_idxs = dec_vector.state_idxs_at_mesh_point(point, 0);
        let control_idxs = dec_vector.control_idxs_at_mesh_point(point, 0);
        data.set_nlp_data(point, 0, state_idxs, control_idxs, Vec::new());
        dyn_data.push(data);
    }
    trans.prepare_to_optimize(&props, &dyn_data, None, None, &config);
    (trans, config, dec_vector, dyn_data)
}

fn bench_defect_fun_and_jac(c: &mut Criterion) {
    let (trans, config, dec_vector, dyn_data) = setup();
    c.bench_function("radau defect fun and jac, 28 collocation points", |b| {
        b.iter(|| {
            trans.compute_defect_fun_and_jac(black_box(&dyn_data), &dec_vector, &config)
        })
    });
}

criterion_group!(benches, bench_defect_fun_and_jac);
criterion_main!(benches);
