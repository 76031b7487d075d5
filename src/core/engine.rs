use log::debug;

use super::error::{SimulationError, SimulationOutcome};
use super::mortgage::{monthly_payment, principal_fraction_remaining, whole_months};
use super::types::{
    ChartMarkers, MonthlyRecord, SimulationParameters, SimulationResult, SimulationSummary,
};

const MONTHS_PER_YEAR: f64 = 12.0;
/// Longest horizon a single run may cover, in years.
pub const MAX_SIMULATION_YEARS: f64 = 200.0;

#[derive(Debug, Clone, Copy)]
struct Horizon {
    loan_months: u32,
    total_months: u32,
}

pub fn run_simulation(params: &SimulationParameters) -> SimulationOutcome<SimulationResult> {
    let horizon = validate(params)?;
    let summary = summarize(params)?;
    let records = project(params, &summary, horizon)?;
    let markers = chart_markers(&records)
        .ok_or_else(|| SimulationError::numeric("chart markers of an empty series"))?;

    debug!(
        "simulated {} months: payment {:.2}, contribution {:.2}, break-even month {:?}",
        horizon.total_months,
        summary.monthly_payment,
        summary.monthly_investment_contribution,
        markers.break_even_month
    );

    Ok(SimulationResult {
        summary,
        markers,
        records,
    })
}

/// Month-by-month net worth of renting (and investing the difference) against owning.
pub fn simulate(params: &SimulationParameters) -> SimulationOutcome<Vec<MonthlyRecord>> {
    let horizon = validate(params)?;
    let summary = summarize(params)?;
    project(params, &summary, horizon)
}

pub fn summarize(params: &SimulationParameters) -> SimulationOutcome<SimulationSummary> {
    let initial_capital = params.house_price * params.down_payment_fraction;
    let loan_amount = params.house_price - initial_capital;
    let payment = monthly_payment(
        loan_amount,
        params.loan_duration_years,
        params.annual_interest_rate,
    )?;
    let total_ownership_cost = payment + params.monthly_maintenance;

    Ok(SimulationSummary {
        initial_capital,
        loan_amount,
        monthly_payment: payment,
        total_ownership_cost,
        monthly_investment_contribution: total_ownership_cost - params.monthly_rent,
    })
}

/// Break-even, loan-payoff and end-of-horizon points of a simulated series.
pub fn chart_markers(records: &[MonthlyRecord]) -> Option<ChartMarkers> {
    let last = records.last()?;

    let break_even = records
        .iter()
        .skip(1)
        .map(|r| (r, (r.investments - r.house_net).abs()))
        .fold(None::<(&MonthlyRecord, f64)>, |best, (r, gap)| match best {
            Some((_, best_gap)) if best_gap <= gap => best,
            _ => Some((r, gap)),
        })
        .map(|(r, _)| r);

    let loan_end = records.iter().find(|r| r.loan_balance == 0.0);

    Some(ChartMarkers {
        break_even_month: break_even.map(|r| r.month),
        break_even_net_worth: break_even.map(|r| r.investments),
        loan_end_month: loan_end.map(|r| r.month),
        renting_at_loan_end: loan_end.map(|r| r.investments),
        owning_at_loan_end: loan_end.map(|r| r.house_net),
        final_month: last.month,
        renting_at_end: last.investments,
        owning_at_end: last.house_net,
    })
}

fn validate(params: &SimulationParameters) -> SimulationOutcome<Horizon> {
    if !params.house_price.is_finite() || params.house_price <= 0.0 {
        return Err(SimulationError::domain("house price", "must be > 0"));
    }
    for (field, value) in [
        ("monthly rent", params.monthly_rent),
        ("monthly maintenance", params.monthly_maintenance),
        ("interest rate", params.annual_interest_rate),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(SimulationError::domain(field, "must be >= 0"));
        }
    }
    if !(0.0..1.0).contains(&params.down_payment_fraction) {
        return Err(SimulationError::domain(
            "down payment",
            "must be in [0, 1)",
        ));
    }
    for (field, value) in [
        ("house appreciation", params.annual_house_appreciation),
        ("investment return", params.annual_investment_return),
    ] {
        if !value.is_finite() || value <= -1.0 {
            return Err(SimulationError::domain(field, "must be > -100%"));
        }
    }
    if !params.loan_duration_years.is_finite() || params.loan_duration_years <= 0.0 {
        return Err(SimulationError::domain("loan duration", "must be > 0"));
    }
    if !params.simulation_duration_years.is_finite()
        || params.simulation_duration_years < params.loan_duration_years
    {
        return Err(SimulationError::domain(
            "simulation duration",
            "must be >= loan duration",
        ));
    }
    if params.simulation_duration_years > MAX_SIMULATION_YEARS {
        return Err(SimulationError::domain(
            "simulation duration",
            format!("must be <= {MAX_SIMULATION_YEARS} years"),
        ));
    }

    let loan_months = whole_months("loan duration", params.loan_duration_years)?;
    let total_months = whole_months("simulation duration", params.simulation_duration_years)?;
    Ok(Horizon {
        loan_months,
        total_months,
    })
}

fn project(
    params: &SimulationParameters,
    summary: &SimulationSummary,
    horizon: Horizon,
) -> SimulationOutcome<Vec<MonthlyRecord>> {
    let investment_growth = 1.0 + params.annual_investment_return / MONTHS_PER_YEAR;
    let house_growth = 1.0 + params.annual_house_appreciation / MONTHS_PER_YEAR;

    let mut records = Vec::with_capacity(horizon.total_months as usize + 1);
    let mut prev = MonthlyRecord {
        month: 0,
        investments: summary.initial_capital,
        house_price: params.house_price,
        loan_balance: summary.loan_amount,
        house_net: summary.initial_capital,
        post_payoff_investments: 0.0,
    };
    records.push(prev);

    for month in 1..=horizon.total_months {
        let investments =
            prev.investments * investment_growth + summary.monthly_investment_contribution;
        let house_price = prev.house_price * house_growth;

        let next = if month <= horizon.loan_months {
            let loan_balance = summary.loan_amount
                * principal_fraction_remaining(
                    params.loan_duration_years,
                    params.annual_interest_rate,
                    month,
                )?;
            MonthlyRecord {
                month,
                investments,
                house_price,
                loan_balance,
                house_net: house_price - loan_balance,
                post_payoff_investments: 0.0,
            }
        } else {
            let post_payoff_investments =
                prev.post_payoff_investments * investment_growth + summary.monthly_payment;
            MonthlyRecord {
                month,
                investments,
                house_price,
                loan_balance: 0.0,
                house_net: house_price + post_payoff_investments,
                post_payoff_investments,
            }
        };

        if !is_finite_record(&next) {
            return Err(SimulationError::numeric(format!("month {month}")));
        }
        records.push(next);
        prev = next;
    }

    Ok(records)
}

fn is_finite_record(record: &MonthlyRecord) -> bool {
    [
        record.investments,
        record.house_price,
        record.loan_balance,
        record.house_net,
        record.post_payoff_investments,
    ]
    .iter()
    .all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn scenario_a() -> SimulationParameters {
        SimulationParameters {
            annual_interest_rate: 0.02961,
            house_price: 469_400.0,
            monthly_rent: 1_290.0,
            monthly_maintenance: 320.35,
            down_payment_fraction: 0.10,
            annual_house_appreciation: 0.025,
            annual_investment_return: 0.07,
            loan_duration_years: 30.0,
            simulation_duration_years: 40.0,
        }
    }

    // 1-year interest-free loan of 1200 with 1% monthly growth on both assets.
    fn oracle_params() -> SimulationParameters {
        SimulationParameters {
            annual_interest_rate: 0.0,
            house_price: 1_200.0,
            monthly_rent: 80.0,
            monthly_maintenance: 0.0,
            down_payment_fraction: 0.0,
            annual_house_appreciation: 0.12,
            annual_investment_return: 0.12,
            loan_duration_years: 1.0,
            simulation_duration_years: 1.25,
        }
    }

    fn record(month: u32, investments: f64, house_net: f64, loan_balance: f64) -> MonthlyRecord {
        MonthlyRecord {
            month,
            investments,
            house_price: 0.0,
            loan_balance,
            house_net,
            post_payoff_investments: 0.0,
        }
    }

    #[test]
    fn scenario_a_month_zero_and_payoff() {
        let records = simulate(&scenario_a()).expect("valid parameters");
        assert_eq!(records.len(), 481);

        let first = records[0];
        assert_eq!(first.month, 0);
        assert_relative_eq!(first.investments, 46_940.0, max_relative = 1e-12);
        assert_relative_eq!(first.loan_balance, 422_460.0, max_relative = 1e-12);
        assert_relative_eq!(first.house_net, 46_940.0, max_relative = 1e-12);
        assert_relative_eq!(first.house_price, 469_400.0, max_relative = 1e-12);

        assert!(records[360].loan_balance.abs() <= 1e-6 * 422_460.0);
        assert!(records[359].loan_balance > 0.0);
        assert!(records[361..].iter().all(|r| r.loan_balance == 0.0));
    }

    #[test]
    fn scenario_a_post_payoff_redirects_mortgage_payment() {
        let params = scenario_a();
        let records = simulate(&params).expect("valid parameters");
        let summary = summarize(&params).expect("valid parameters");

        assert_eq!(records[360].post_payoff_investments, 0.0);
        assert_relative_eq!(
            records[361].post_payoff_investments,
            summary.monthly_payment,
            max_relative = 1e-12
        );
        let r = &records[361];
        assert_relative_eq!(
            r.house_net,
            r.house_price + r.post_payoff_investments,
            max_relative = 1e-12
        );
    }

    #[test]
    fn scenario_c_no_down_payment_starts_from_zero() {
        let mut params = scenario_a();
        params.down_payment_fraction = 0.0;
        let records = simulate(&params).expect("valid parameters");
        assert_eq!(records[0].investments, 0.0);
        assert_eq!(records[0].house_net, 0.0);
        assert_eq!(records[0].loan_balance, 469_400.0);
    }

    #[test]
    fn oracle_zero_rate_path_matches_hand_calculation() {
        let records = simulate(&oracle_params()).expect("valid parameters");
        assert_eq!(records.len(), 16);

        // Payment 100/month, contribution 100 - 80 = 20.
        assert_abs_diff_eq!(records[1].investments, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(records[2].investments, 40.2, epsilon = 1e-9);
        assert_abs_diff_eq!(records[1].house_price, 1_212.0, epsilon = 1e-9);
        assert_abs_diff_eq!(records[1].loan_balance, 1_100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(records[1].house_net, 112.0, epsilon = 1e-9);
        assert_abs_diff_eq!(records[6].loan_balance, 600.0, epsilon = 1e-9);
        assert_eq!(records[12].loan_balance, 0.0);

        let house_12 = 1_200.0 * 1.01_f64.powi(12);
        assert_abs_diff_eq!(records[12].house_net, house_12, epsilon = 1e-9);

        assert_abs_diff_eq!(records[13].post_payoff_investments, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(records[14].post_payoff_investments, 201.0, epsilon = 1e-9);
        assert_abs_diff_eq!(records[15].post_payoff_investments, 303.01, epsilon = 1e-9);
        assert_abs_diff_eq!(
            records[15].house_net,
            1_200.0 * 1.01_f64.powi(15) + 303.01,
            epsilon = 1e-9
        );
    }

    #[test]
    fn negative_contribution_drains_renting_portfolio() {
        let mut params = oracle_params();
        params.monthly_rent = 150.0;
        params.annual_investment_return = 0.0;
        let summary = summarize(&params).expect("valid parameters");
        assert_abs_diff_eq!(summary.monthly_investment_contribution, -50.0, epsilon = 1e-9);

        let records = simulate(&params).expect("valid parameters");
        assert_abs_diff_eq!(records[2].investments, -100.0, epsilon = 1e-9);
    }

    #[test]
    fn summary_reports_derived_monthly_figures() {
        let summary = summarize(&oracle_params()).expect("valid parameters");
        assert_abs_diff_eq!(summary.monthly_payment, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.total_ownership_cost, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.monthly_investment_contribution, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.loan_amount, 1_200.0, epsilon = 1e-9);
        assert_eq!(summary.initial_capital, 0.0);
    }

    #[test]
    fn loan_term_equal_to_horizon_has_no_post_payoff_months() {
        let mut params = oracle_params();
        params.simulation_duration_years = 1.0;
        let records = simulate(&params).expect("valid parameters");
        assert_eq!(records.len(), 13);
        assert!(records.iter().all(|r| r.post_payoff_investments == 0.0));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let cases: [(&str, fn(&mut SimulationParameters)); 9] = [
            ("simulation duration", |p| p.simulation_duration_years = 20.0),
            ("down payment", |p| p.down_payment_fraction = 1.0),
            ("down payment", |p| p.down_payment_fraction = -0.1),
            ("house price", |p| p.house_price = 0.0),
            ("monthly rent", |p| p.monthly_rent = -1.0),
            ("monthly maintenance", |p| p.monthly_maintenance = f64::NAN),
            ("interest rate", |p| p.annual_interest_rate = -0.01),
            ("loan duration", |p| p.loan_duration_years = 0.0),
            ("loan duration", |p| p.loan_duration_years = 30.05),
        ];
        for (expected_field, mutate) in cases {
            let mut params = scenario_a();
            mutate(&mut params);
            match simulate(&params) {
                Err(SimulationError::Domain { field, .. }) => assert_eq!(field, expected_field),
                other => panic!("expected domain error on {expected_field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_horizon_beyond_limit_before_allocating() {
        let mut params = scenario_a();
        params.loan_duration_years = 3e8;
        params.simulation_duration_years = 3e8;
        match simulate(&params) {
            Err(SimulationError::Domain { field, .. }) => assert_eq!(field, "simulation duration"),
            other => panic!("expected domain error, got {other:?}"),
        }

        params.loan_duration_years = 30.0;
        params.simulation_duration_years = MAX_SIMULATION_YEARS + 1.0;
        assert!(matches!(
            run_simulation(&params),
            Err(SimulationError::Domain { field: "simulation duration", .. })
        ));

        params.simulation_duration_years = MAX_SIMULATION_YEARS;
        let records = simulate(&params).expect("limit itself is allowed");
        assert_eq!(records.len(), 200 * 12 + 1);
    }

    #[test]
    fn overflowing_growth_reports_numeric_error() {
        let mut params = scenario_a();
        params.annual_investment_return = 1e308;
        let err = simulate(&params).expect_err("growth overflows");
        assert!(matches!(err, SimulationError::Numeric { .. }));
    }

    #[test]
    fn chart_markers_pick_closest_month_after_start() {
        let records = [
            record(0, 10.0, 10.0, 5.0),
            record(1, 20.0, 35.0, 4.0),
            record(2, 30.0, 33.0, 0.0),
            record(3, 40.0, 37.0, 0.0),
            record(4, 50.0, 45.0, 0.0),
        ];
        let markers = chart_markers(&records).expect("non-empty series");
        assert_eq!(markers.break_even_month, Some(2));
        assert_eq!(markers.break_even_net_worth, Some(30.0));
        assert_eq!(markers.loan_end_month, Some(2));
        assert_eq!(markers.renting_at_loan_end, Some(30.0));
        assert_eq!(markers.owning_at_loan_end, Some(33.0));
        assert_eq!(markers.final_month, 4);
        assert_eq!(markers.renting_at_end, 50.0);
        assert_eq!(markers.owning_at_end, 45.0);
    }

    #[test]
    fn chart_markers_handle_degenerate_series() {
        assert!(chart_markers(&[]).is_none());
        let markers = chart_markers(&[record(0, 1.0, 1.0, 1.0)]).expect("one record");
        assert_eq!(markers.break_even_month, None);
        assert_eq!(markers.loan_end_month, None);
        assert_eq!(markers.final_month, 0);
    }

    #[test]
    fn run_simulation_bundles_summary_markers_and_records() {
        let params = scenario_a();
        let result = run_simulation(&params).expect("valid parameters");
        assert_eq!(result.records, simulate(&params).expect("valid parameters"));
        assert_eq!(result.summary, summarize(&params).expect("valid parameters"));
        assert_eq!(result.markers.loan_end_month, Some(360));
        assert_eq!(result.markers.final_month, 480);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_series_shape_and_payoff(
            house_price in 50_000u32..2_000_000,
            down_bp in 0u32..9_000,
            rate_bp in 0u32..1_200,
            loan_years in 1u32..36,
            extra_years in 0u32..16,
            rent in 0u32..5_000,
            maintenance in 0u32..1_000,
            appreciation_bp in -300i32..800,
            return_bp in -300i32..1_200
        ) {
            let params = SimulationParameters {
                annual_interest_rate: f64::from(rate_bp) / 10_000.0,
                house_price: f64::from(house_price),
                monthly_rent: f64::from(rent),
                monthly_maintenance: f64::from(maintenance),
                down_payment_fraction: f64::from(down_bp) / 10_000.0,
                annual_house_appreciation: f64::from(appreciation_bp) / 10_000.0,
                annual_investment_return: f64::from(return_bp) / 10_000.0,
                loan_duration_years: f64::from(loan_years),
                simulation_duration_years: f64::from(loan_years + extra_years),
            };
            let records = simulate(&params).expect("valid parameters");
            prop_assert_eq!(records.len(), ((loan_years + extra_years) * 12 + 1) as usize);

            let loan_amount = records[0].loan_balance;
            let term = (loan_years * 12) as usize;
            prop_assert!(records[term].loan_balance.abs() <= 1e-6 * loan_amount);
            for pair in records.windows(2) {
                prop_assert!(pair[1].loan_balance <= pair[0].loan_balance);
                prop_assert_eq!(pair[1].month, pair[0].month + 1);
            }

            let again = simulate(&params).expect("valid parameters");
            prop_assert_eq!(records, again);
        }

        #[test]
        fn prop_non_negative_growth_is_monotonic(
            rate_bp in 0u32..1_000,
            appreciation_bp in 0u32..800,
            return_bp in 0u32..1_200,
            rent in 0u32..800,
            loan_years in 1u32..31
        ) {
            let params = SimulationParameters {
                annual_interest_rate: f64::from(rate_bp) / 10_000.0,
                house_price: 300_000.0,
                monthly_rent: f64::from(rent),
                monthly_maintenance: 200.0,
                down_payment_fraction: 0.2,
                annual_house_appreciation: f64::from(appreciation_bp) / 10_000.0,
                annual_investment_return: f64::from(return_bp) / 10_000.0,
                loan_duration_years: f64::from(loan_years),
                simulation_duration_years: f64::from(loan_years + 5),
            };
            let summary = summarize(&params).expect("valid parameters");
            prop_assert!(summary.monthly_investment_contribution >= 0.0);

            let records = simulate(&params).expect("valid parameters");
            for pair in records.windows(2) {
                prop_assert!(pair[1].investments >= pair[0].investments);
                prop_assert!(pair[1].house_price >= pair[0].house_price);
                prop_assert!(pair[1].post_payoff_investments >= pair[0].post_payoff_investments);
            }
        }
    }
}
