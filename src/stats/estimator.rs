// src/stats/estimator.rs
//
// Pass-probability estimator: Wilson score interval over the user's
// lifetime answer history, converted into a probability of scoring at
// least 75% on an exam of the same length via the binomial tail.

use serde::Serialize;

/// Fraction of questions that must be answered correctly to pass.
pub const PASS_THRESHOLD: f64 = 0.75;

/// z-value for a 95% confidence interval.
const Z_95: f64 = 1.96;

/// Derived probabilistic summary of a user's answer history.
/// Computed fresh on every dashboard view; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProbabilityEstimate {
    /// Pass probability at the observed success rate.
    pub pass_probability: f64,
    /// Pass probability at the pessimistic (lower) Wilson bound.
    pub pass_probability_lower: f64,
    /// Pass probability at the optimistic (upper) Wilson bound.
    pub pass_probability_upper: f64,
    pub margin_of_error: f64,
    /// Lower bound of the 95% Wilson interval on the success rate.
    pub lower: f64,
    /// Upper bound of the 95% Wilson interval on the success rate.
    pub upper: f64,
}

/// Computes the full estimate from lifetime answer counts.
///
/// Preconditions: `correct <= total`. Zero history is the defined
/// no-data case and yields the all-zero estimate rather than an error.
pub fn estimate(total: u64, correct: u64) -> ProbabilityEstimate {
    if total == 0 {
        return ProbabilityEstimate::default();
    }

    let n = total as f64;
    let p_hat = correct as f64 / n;

    let (lower, upper, margin_of_error) = wilson_interval(p_hat, n);

    let required = (PASS_THRESHOLD * n).ceil() as u64;

    ProbabilityEstimate {
        pass_probability: pass_probability(p_hat, total, required),
        pass_probability_lower: pass_probability(lower, total, required),
        pass_probability_upper: pass_probability(upper, total, required),
        margin_of_error,
        lower,
        upper,
    }
}

/// 95% Wilson score interval for a binomial proportion.
///
/// Preferred over the normal approximation because it stays well-behaved
/// at proportions near 0 and 1, which are common for small early-session
/// sample sizes. Returns (lower, upper, margin).
fn wilson_interval(p_hat: f64, n: f64) -> (f64, f64, f64) {
    let z2 = Z_95 * Z_95;
    let denominator = 1.0 + z2 / n;
    let center = (p_hat + z2 / (2.0 * n)) / denominator;
    let margin =
        (Z_95 * (p_hat * (1.0 - p_hat) / n + z2 / (4.0 * n * n)).sqrt()) / denominator;

    let lower = (center - margin).clamp(0.0, 1.0);
    let upper = (center + margin).clamp(0.0, 1.0);
    (lower, upper, margin)
}

/// Probability of at least `required` successes in `n` Bernoulli(p) trials.
///
/// Degenerate inputs are resolved to sentinels instead of propagating
/// non-finite values to the dashboard: p at or below 0 cannot pass, p at
/// or above 1 always passes, and a non-finite tail evaluates to 0.
fn pass_probability(p: f64, n: u64, required: u64) -> f64 {
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    let tail = binomial_tail(n, required, p);
    if !tail.is_finite() {
        return 0.0;
    }
    tail.clamp(0.0, 1.0)
}

/// Upper binomial tail P(X >= k_min) for X ~ Binomial(n, p), 0 < p < 1.
///
/// Summation runs in log space with incrementally updated log binomial
/// coefficients, which keeps the evaluation finite and accurate for n in
/// the thousands where naive factorials would overflow.
fn binomial_tail(n: u64, k_min: u64, p: f64) -> f64 {
    if k_min == 0 {
        return 1.0;
    }
    if k_min > n {
        return 0.0;
    }

    let ln_p = p.ln();
    let ln_q = (1.0 - p).ln();

    // ln C(n, k_min)
    let mut ln_coef = 0.0;
    for i in 0..k_min {
        ln_coef += ((n - i) as f64).ln() - ((i + 1) as f64).ln();
    }

    let mut ln_term = ln_coef + k_min as f64 * ln_p + (n - k_min) as f64 * ln_q;
    let mut sum = ln_term.exp();

    for k in k_min..n {
        // C(n, k+1) = C(n, k) * (n - k) / (k + 1)
        ln_term += ((n - k) as f64).ln() - ((k + 1) as f64).ln() + ln_p - ln_q;
        sum += ln_term.exp();
    }

    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} within {} of {}",
            actual,
            tolerance,
            expected
        );
    }

    #[test]
    fn zero_history_yields_zero_estimate() {
        let est = estimate(0, 0);
        assert_eq!(est, ProbabilityEstimate::default());
    }

    #[test]
    fn all_fields_stay_in_unit_interval() {
        for n in [1u64, 2, 7, 30, 100, 999] {
            for c in [0, n / 3, n / 2, n.saturating_sub(1), n] {
                let est = estimate(n, c);
                for value in [
                    est.pass_probability,
                    est.pass_probability_lower,
                    est.pass_probability_upper,
                    est.margin_of_error,
                    est.lower,
                    est.upper,
                ] {
                    assert!(
                        (0.0..=1.0).contains(&value),
                        "field out of range for n={}, c={}: {}",
                        n,
                        c,
                        value
                    );
                }
            }
        }
    }

    #[test]
    fn wilson_interval_regression_24_of_30() {
        // Standard Wilson 95% interval for 24/30 at z = 1.96.
        let est = estimate(30, 24);
        assert_close(est.lower, 0.6269, 0.002);
        assert_close(est.upper, 0.9049, 0.002);
    }

    #[test]
    fn pass_probability_monotone_in_correct_count() {
        let n = 40u64;
        let mut previous = 0.0;
        for c in 0..=n {
            let est = estimate(n, c);
            assert!(
                est.pass_probability >= previous - 1e-12,
                "pass probability decreased at c={}",
                c
            );
            previous = est.pass_probability;
        }
    }

    #[test]
    fn all_wrong_triggers_zero_guard() {
        let est = estimate(10, 0);
        assert_eq!(est.lower, 0.0);
        assert_eq!(est.pass_probability, 0.0);
        assert_eq!(est.pass_probability_lower, 0.0);
    }

    #[test]
    fn perfect_record_hits_upper_sentinel() {
        // p-hat = 1 and the Wilson upper bound collapses to exactly 1.
        let est = estimate(20, 20);
        assert_eq!(est.pass_probability, 1.0);
        assert_close(est.upper, 1.0, 1e-12);
        assert_close(est.pass_probability_upper, 1.0, 1e-9);
    }

    #[test]
    fn bounds_bracket_point_estimate() {
        let est = estimate(50, 41);
        assert!(est.lower <= 41.0 / 50.0);
        assert!(est.upper >= 41.0 / 50.0);
        assert!(est.pass_probability_lower <= est.pass_probability);
        assert!(est.pass_probability <= est.pass_probability_upper);
    }

    #[test]
    fn binomial_tail_matches_hand_computed_small_case() {
        // P(X >= 2) for X ~ Binomial(3, 0.5) = (3 + 1) / 8 = 0.5
        assert_close(binomial_tail(3, 2, 0.5), 0.5, 1e-12);
        // P(X >= 1) for X ~ Binomial(2, 0.3) = 1 - 0.49 = 0.51
        assert_close(binomial_tail(2, 1, 0.3), 0.51, 1e-12);
    }

    #[test]
    fn binomial_tail_stays_finite_for_large_n() {
        // A heavy user with thousands of answers must not overflow.
        let est = estimate(5000, 4000);
        assert!(est.pass_probability.is_finite());
        assert!(est.pass_probability > 0.99);
        let struggling = estimate(5000, 3000);
        assert!(struggling.pass_probability.is_finite());
        assert!(struggling.pass_probability < 0.01);
    }

    #[test]
    fn required_count_rounds_up() {
        // n = 10 requires ceil(7.5) = 8 correct. With p-hat = 0.7 the
        // point estimate must equal P(X >= 8), not P(X >= 7).
        let est = estimate(10, 7);
        let expected = binomial_tail(10, 8, 0.7);
        assert_close(est.pass_probability, expected, 1e-12);
    }
}
