use super::error::{SimulationError, SimulationOutcome};

const MONTHS_PER_YEAR: f64 = 12.0;
const ZERO_RATE_EPS: f64 = 1e-12;
const WHOLE_MONTH_TOL: f64 = 1e-9;

/// Constant monthly payment that retires `loan_amount` over `duration_years`
/// using the continuous-compounding annuity factor `r*d / (1 - e^(-r*d))`.
pub fn monthly_payment(
    loan_amount: f64,
    duration_years: f64,
    annual_interest_rate: f64,
) -> SimulationOutcome<f64> {
    if !loan_amount.is_finite() || loan_amount < 0.0 {
        return Err(SimulationError::domain("loan amount", "must be >= 0"));
    }
    check_duration(duration_years)?;
    check_rate(annual_interest_rate)?;

    let base_payment = loan_amount / (duration_years * MONTHS_PER_YEAR);
    let payment = base_payment * annuity_factor(annual_interest_rate * duration_years);
    if !payment.is_finite() {
        return Err(SimulationError::numeric("monthly payment"));
    }
    Ok(payment)
}

/// Share of the original principal still owed after `months_elapsed` payments.
pub fn principal_fraction_remaining(
    duration_years: f64,
    annual_interest_rate: f64,
    months_elapsed: u32,
) -> SimulationOutcome<f64> {
    check_duration(duration_years)?;
    check_rate(annual_interest_rate)?;

    let remaining_years = duration_years - f64::from(months_elapsed) / MONTHS_PER_YEAR;
    if remaining_years < -WHOLE_MONTH_TOL {
        return Err(SimulationError::domain(
            "months elapsed",
            format!("{months_elapsed} exceeds the loan term of {duration_years} years"),
        ));
    }
    if remaining_years <= 0.0 {
        return Ok(0.0);
    }

    let fraction = if annual_interest_rate.abs() < ZERO_RATE_EPS {
        remaining_years / duration_years
    } else {
        let owed = -(-annual_interest_rate * remaining_years).exp_m1();
        let total = -(-annual_interest_rate * duration_years).exp_m1();
        owed / total
    };
    if !fraction.is_finite() {
        return Err(SimulationError::numeric(format!(
            "principal fraction at month {months_elapsed}"
        )));
    }
    Ok(fraction.clamp(0.0, 1.0))
}

/// Number of months in `years`, which must be a whole number of months.
pub(crate) fn whole_months(field: &'static str, years: f64) -> SimulationOutcome<u32> {
    if !years.is_finite() || years < 0.0 {
        return Err(SimulationError::domain(field, "must be a finite number >= 0"));
    }
    let months = years * MONTHS_PER_YEAR;
    let rounded = months.round();
    if (months - rounded).abs() > WHOLE_MONTH_TOL {
        return Err(SimulationError::domain(
            field,
            format!("{years} years is not a whole number of months"),
        ));
    }
    if rounded > f64::from(u32::MAX) {
        return Err(SimulationError::domain(field, "too many months"));
    }
    Ok(rounded as u32)
}

// x / (1 - e^(-x)), tending to 1 as x -> 0.
fn annuity_factor(x: f64) -> f64 {
    if x.abs() < ZERO_RATE_EPS {
        return 1.0;
    }
    x / -(-x).exp_m1()
}

fn check_duration(duration_years: f64) -> SimulationOutcome<()> {
    if !duration_years.is_finite() || duration_years <= 0.0 {
        return Err(SimulationError::domain("loan duration", "must be > 0"));
    }
    Ok(())
}

fn check_rate(annual_interest_rate: f64) -> SimulationOutcome<()> {
    if !annual_interest_rate.is_finite() || annual_interest_rate < 0.0 {
        return Err(SimulationError::domain("interest rate", "must be >= 0"));
    }
    Ok(())
}
