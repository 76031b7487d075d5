use serde::Serialize;

/// Inputs for one rent-vs-own projection. Every rate is a fraction, not a percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub annual_interest_rate: f64,
    pub house_price: f64,
    pub monthly_rent: f64,
    pub monthly_maintenance: f64,
    pub down_payment_fraction: f64,
    /// Inflation adjusted.
    pub annual_house_appreciation: f64,
    /// Inflation adjusted.
    pub annual_investment_return: f64,
    pub loan_duration_years: f64,
    /// Years past `loan_duration_years` model investing after payoff.
    pub simulation_duration_years: f64,
}

/// Snapshot of both strategies at the end of one month. Month 0 is the purchase date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub month: u32,
    /// Renting: down payment invested as a lump sum plus the monthly cash-flow difference.
    pub investments: f64,
    pub house_price: f64,
    pub loan_balance: f64,
    /// Owning: house minus loan while the loan runs, house plus
    /// `post_payoff_investments` once it is retired.
    pub house_net: f64,
    pub post_payoff_investments: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub initial_capital: f64,
    pub loan_amount: f64,
    pub monthly_payment: f64,
    pub total_ownership_cost: f64,
    /// Negative when renting costs more per month than owning.
    pub monthly_investment_contribution: f64,
}

/// Reference points a chart draws on top of the two net-worth curves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMarkers {
    pub break_even_month: Option<u32>,
    pub break_even_net_worth: Option<f64>,
    pub loan_end_month: Option<u32>,
    pub renting_at_loan_end: Option<f64>,
    pub owning_at_loan_end: Option<f64>,
    pub final_month: u32,
    pub renting_at_end: f64,
    pub owning_at_end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub summary: SimulationSummary,
    pub markers: ChartMarkers,
    pub records: Vec<MonthlyRecord>,
}
