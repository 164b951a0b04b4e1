//! Behavioural properties of the two-phase optimizer.

use approx::assert_abs_diff_eq;
use ndarray::{Array1, array};
use rstest::{fixture, rstest};
use tangent_optimize::{
    RiskCeiling, SolverError, TwoPhaseOptimizer, TwoPhaseOutcome, WeightBounds,
};
use tangent_risk::{ReturnModel, RiskFreeRate, performance, portfolio_volatility};

#[fixture]
fn four_assets() -> ReturnModel {
    ReturnModel::new(
        vec!["AAA".into(), "BBB".into(), "CCC".into(), "DDD".into()],
        array![0.14, 0.10, 0.07, 0.05],
        array![
            [0.0900, 0.0180, 0.0060, 0.0020],
            [0.0180, 0.0400, 0.0080, 0.0030],
            [0.0060, 0.0080, 0.0225, 0.0040],
            [0.0020, 0.0030, 0.0040, 0.0100]
        ],
    )
    .unwrap()
}

fn rf() -> RiskFreeRate {
    RiskFreeRate::from_fraction(0.03).unwrap()
}

fn sharpe(model: &ReturnModel, weights: &Array1<f64>) -> f64 {
    let perf = performance(weights, model.expected_returns(), model.covariance()).unwrap();
    perf.sharpe_ratio(rf()).unwrap()
}

#[rstest]
#[case(1.0, RiskCeiling::Unbounded)]
#[case(0.5, RiskCeiling::Unbounded)]
#[case(0.3, RiskCeiling::Unbounded)]
#[case(0.25, RiskCeiling::Unbounded)]
#[case(1.0, RiskCeiling::AtMost(0.15))]
#[case(0.4, RiskCeiling::AtMost(0.12))]
fn weights_are_a_capped_allocation(
    four_assets: ReturnModel,
    #[case] max_weight: f64,
    #[case] ceiling: RiskCeiling,
) {
    let solution = TwoPhaseOptimizer::default()
        .optimize(&four_assets, rf(), max_weight, ceiling)
        .unwrap();

    assert_abs_diff_eq!(solution.weights.sum(), 1.0, epsilon = 1e-8);
    for &w in &solution.weights {
        assert!(w >= -1e-8, "negative weight {w}");
        assert!(w <= max_weight + 1e-8, "weight {w} above cap {max_weight}");
    }
}

#[rstest]
#[case(RiskCeiling::Unbounded)]
#[case(RiskCeiling::AtMost(0.12))]
#[case(RiskCeiling::AtMost(0.2))]
fn volatility_never_beats_minimum_variance(
    four_assets: ReturnModel,
    #[case] ceiling: RiskCeiling,
) {
    let solution = TwoPhaseOptimizer::default()
        .optimize(&four_assets, rf(), 1.0, ceiling)
        .unwrap();
    let perf = performance(
        &solution.weights,
        four_assets.expected_returns(),
        four_assets.covariance(),
    )
    .unwrap();

    assert!(perf.volatility >= solution.minimum_variance.volatility - 1e-8);
    if let Some(max) = ceiling.limit() {
        assert!(perf.volatility <= max + 1e-8);
    }
}

/// Feasible allocations under `cap`: equal weights, the vertices reachable by
/// projecting each corner, and projections of a fixed spread of points.
fn feasible_allocations(n: usize, cap: f64) -> Vec<Array1<f64>> {
    let bounds = WeightBounds::new(n, cap).unwrap();
    let mut points = vec![bounds.equal_weights()];
    for i in 0..n {
        let mut corner = Array1::zeros(n);
        corner[i] = 10.0;
        points.push(bounds.project(&corner));
    }
    for k in 0..40 {
        let raw = Array1::from_shape_fn(n, |i| ((k * 7 + i * 13) as f64 * 0.618).sin() * 2.0);
        points.push(bounds.project(&raw));
    }
    points
}

#[rstest]
#[case(1.0)]
#[case(0.4)]
fn minimum_variance_is_a_lower_bound(four_assets: ReturnModel, #[case] cap: f64) {
    let covariance = four_assets.covariance();
    let minimum = TwoPhaseOptimizer::default()
        .minimum_variance(covariance, cap)
        .unwrap();

    for weights in feasible_allocations(4, cap) {
        assert_abs_diff_eq!(weights.sum(), 1.0, epsilon = 1e-9);
        assert!(weights.iter().all(|w| *w >= -1e-12 && *w <= cap + 1e-9));
        let volatility = portfolio_volatility(&weights, covariance).unwrap();
        assert!(
            minimum.volatility <= volatility + 1e-8,
            "{} beats minimum {} at {}",
            volatility,
            minimum.volatility,
            weights
        );
    }
}

#[rstest]
fn tighter_ceiling_never_improves_sharpe(four_assets: ReturnModel) {
    let optimizer = TwoPhaseOptimizer::default();
    let sharpes: Vec<f64> = [0.25, 0.16, 0.13, 0.11]
        .iter()
        .map(|&max| {
            let solution = optimizer
                .optimize(&four_assets, rf(), 1.0, RiskCeiling::AtMost(max))
                .unwrap();
            assert!(!solution.fell_back());
            sharpe(&four_assets, &solution.weights)
        })
        .collect();

    for pair in sharpes.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-6, "sharpe rose: {:?}", sharpes);
    }
}

#[rstest]
fn tighter_cap_never_lowers_minimum_volatility(four_assets: ReturnModel) {
    let optimizer = TwoPhaseOptimizer::default();
    let vols: Vec<f64> = [1.0, 0.6, 0.4, 0.3, 0.25]
        .iter()
        .map(|&cap| {
            optimizer
                .minimum_variance(four_assets.covariance(), cap)
                .unwrap()
                .volatility
        })
        .collect();

    for pair in vols.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-9, "volatility fell: {:?}", vols);
    }
}

#[rstest]
fn repeated_calls_agree(four_assets: ReturnModel) {
    let optimizer = TwoPhaseOptimizer::default();
    let first = optimizer
        .optimize(&four_assets, rf(), 0.5, RiskCeiling::AtMost(0.14))
        .unwrap();
    let second = optimizer
        .optimize(&four_assets, rf(), 0.5, RiskCeiling::AtMost(0.14))
        .unwrap();

    for (a, b) in first.weights.iter().zip(second.weights.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-4);
    }
}

#[test]
fn single_asset_takes_everything() {
    let model = ReturnModel::new(vec!["ONLY".into()], array![0.08], array![[0.0625]]).unwrap();
    let solution = TwoPhaseOptimizer::default()
        .optimize(&model, rf(), 1.0, RiskCeiling::Unbounded)
        .unwrap();

    assert_abs_diff_eq!(solution.weights[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(solution.minimum_variance.volatility, 0.25, epsilon = 1e-12);
}

#[test]
fn ceiling_below_minimum_returns_phase_one_weights() {
    // Equal uncorrelated variances: minimum variance is 1/3 each with volatility 0.15
    let model = ReturnModel::new(
        vec!["A".into(), "B".into(), "C".into()],
        array![0.12, 0.08, 0.05],
        array![[0.0675, 0.0, 0.0], [0.0, 0.0675, 0.0], [0.0, 0.0, 0.0675]],
    )
    .unwrap();

    let solution = TwoPhaseOptimizer::default()
        .optimize(&model, rf(), 1.0, RiskCeiling::AtMost(0.10))
        .unwrap();

    assert_eq!(solution.outcome, TwoPhaseOutcome::CeilingInfeasible);
    assert_abs_diff_eq!(solution.minimum_variance.volatility, 0.15, epsilon = 1e-8);
    for &w in &solution.weights {
        assert_abs_diff_eq!(w, 1.0 / 3.0, epsilon = 1e-6);
    }
    let perf =
        performance(&solution.weights, model.expected_returns(), model.covariance()).unwrap();
    assert_abs_diff_eq!(
        perf.volatility,
        solution.minimum_variance.volatility,
        epsilon = 1e-12
    );
}

#[test]
fn cap_too_small_is_infeasible() {
    let model = ReturnModel::new(
        vec!["A".into(), "B".into(), "C".into(), "D".into()],
        array![0.1, 0.1, 0.1, 0.1],
        ndarray::Array2::eye(4) * 0.04,
    )
    .unwrap();

    let result = TwoPhaseOptimizer::default().optimize(&model, rf(), 0.2, RiskCeiling::Unbounded);
    assert!(matches!(result, Err(SolverError::Infeasible(_))));
}
