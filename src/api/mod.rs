use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    MAX_SIMULATION_YEARS, SimulationError, SimulationParameters, SimulationResult,
    run_simulation,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    house_price: Option<f64>,
    monthly_rent: Option<f64>,
    monthly_maintenance: Option<f64>,
    down_payment: Option<f64>,
    interest_rate: Option<f64>,
    house_appreciation: Option<f64>,
    investment_return: Option<f64>,
    loan_years: Option<f64>,
    years_after_payoff: Option<f64>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rent-vs-own",
    about = "Month-by-month net worth of buying with a mortgage vs renting and investing the difference",
    after_help = "Run `rent-vs-own serve [port]` to start the HTTP dashboard instead."
)]
pub struct Cli {
    #[arg(long, default_value_t = 469_400.0, help = "House purchase price")]
    house_price: f64,
    #[arg(long, default_value_t = 1_290.0, help = "Rent for a comparable home, per month")]
    monthly_rent: f64,
    #[arg(long, default_value_t = 320.35, help = "Ownership upkeep cost, per month")]
    monthly_maintenance: f64,
    #[arg(long, default_value_t = 10.0, help = "Down payment in percent of the house price")]
    down_payment: f64,
    #[arg(long, default_value_t = 3.27, help = "Annual loan interest rate in percent")]
    interest_rate: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Expected inflation-adjusted house appreciation in percent per year"
    )]
    house_appreciation: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Expected inflation-adjusted stock market return in percent per year"
    )]
    investment_return: f64,
    #[arg(long, default_value_t = 30.0, help = "Loan duration in years")]
    loan_years: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Years to keep simulating after the loan is paid off"
    )]
    years_after_payoff: f64,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    #[arg(long, default_value_t = 12, help = "Print every Nth month in table output")]
    every: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    parameters: SimulationParameters,
    #[serde(flatten)]
    result: SimulationResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_parameters(cli: &Cli) -> Result<SimulationParameters, String> {
    if !cli.house_price.is_finite() || cli.house_price <= 0.0 {
        return Err("--house-price must be > 0".to_string());
    }

    for (name, value) in [
        ("--monthly-rent", cli.monthly_rent),
        ("--monthly-maintenance", cli.monthly_maintenance),
        ("--interest-rate", cli.interest_rate),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    if !(0.0..100.0).contains(&cli.down_payment) {
        return Err("--down-payment must be >= 0 and < 100".to_string());
    }

    for (name, value) in [
        ("--house-appreciation", cli.house_appreciation),
        ("--investment-return", cli.investment_return),
    ] {
        if !value.is_finite() || value <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    if !cli.loan_years.is_finite() || cli.loan_years <= 0.0 {
        return Err("--loan-years must be > 0".to_string());
    }

    if !cli.years_after_payoff.is_finite() || cli.years_after_payoff < 0.0 {
        return Err("--years-after-payoff must be >= 0".to_string());
    }

    if cli.loan_years + cli.years_after_payoff > MAX_SIMULATION_YEARS {
        return Err(format!(
            "--loan-years plus --years-after-payoff must be <= {MAX_SIMULATION_YEARS}"
        ));
    }

    Ok(SimulationParameters {
        annual_interest_rate: cli.interest_rate / 100.0,
        house_price: cli.house_price,
        monthly_rent: cli.monthly_rent,
        monthly_maintenance: cli.monthly_maintenance,
        down_payment_fraction: cli.down_payment / 100.0,
        annual_house_appreciation: cli.house_appreciation / 100.0,
        annual_investment_return: cli.investment_return / 100.0,
        loan_duration_years: cli.loan_years,
        simulation_duration_years: cli.loan_years + cli.years_after_payoff,
    })
}

/// Runs one simulation from command-line flags and renders it for stdout.
pub fn run_report(cli: &Cli) -> Result<String, String> {
    if cli.every == 0 {
        return Err("--every must be > 0".to_string());
    }
    let params = build_parameters(cli)?;
    let result = run_simulation(&params).map_err(|e| e.to_string())?;
    match cli.format {
        OutputFormat::Json => {
            let response = SimulateResponse {
                parameters: params,
                result,
            };
            serde_json::to_string_pretty(&response).map_err(|e| e.to_string())
        }
        OutputFormat::Table => render_table(&result, cli.every).map_err(|e| e.to_string()),
    }
}

fn render_table(result: &SimulationResult, every: u32) -> Result<String, std::fmt::Error> {
    let summary = &result.summary;
    let markers = &result.markers;
    let mut out = String::new();

    writeln!(out, "Mortgage payment:                  {:>12.2}", summary.monthly_payment)?;
    writeln!(
        out,
        "Total ownership monthly cost:      {:>12.2}",
        summary.total_ownership_cost
    )?;
    writeln!(
        out,
        "Monthly investments while renting: {:>12.2}",
        summary.monthly_investment_contribution
    )?;
    writeln!(out)?;

    match (markers.break_even_month, markers.break_even_net_worth) {
        (Some(month), Some(net_worth)) => {
            writeln!(out, "Closest net worth at month {month}: {net_worth:.0}")?;
        }
        _ => {
            writeln!(out, "Closest net worth: n/a")?;
        }
    }
    if let (Some(month), Some(renting), Some(owning)) = (
        markers.loan_end_month,
        markers.renting_at_loan_end,
        markers.owning_at_loan_end,
    ) {
        writeln!(
            out,
            "Loan paid out at month {month}: renting {renting:.0}, owning {owning:.0}"
        )?;
    }
    writeln!(
        out,
        "End of simulation at month {}: renting {:.0}, owning {:.0}",
        markers.final_month, markers.renting_at_end, markers.owning_at_end
    )?;
    writeln!(out)?;

    writeln!(
        out,
        "{:>5} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "Month", "Renting", "Owning", "House", "Loan left", "Post-payoff"
    )?;
    writeln!(out, "{}", "-".repeat(80))?;
    for row in result
        .records
        .iter()
        .filter(|r| r.month % every == 0 || r.month == markers.final_month)
    {
        writeln!(
            out,
            "{:>5} {:>14.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2}",
            row.month,
            row.investments,
            row.house_net,
            row.house_price,
            row.loan_balance,
            row.post_payoff_investments
        )?;
    }
    Ok(out)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("rent-vs-own HTTP API listening on http://{addr} (local: http://127.0.0.1:{port}/)");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_response(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_response(payload)
}

fn simulate_response(payload: SimulatePayload) -> Response {
    debug!("simulate request: {payload:?}");
    let params = match parameters_from_payload(payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match run_simulation(&params) {
        Ok(result) => json_response(
            StatusCode::OK,
            SimulateResponse {
                parameters: params,
                result,
            },
        ),
        Err(err @ SimulationError::Domain { .. }) => {
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
        Err(err @ SimulationError::Numeric { .. }) => {
            warn!("simulation failed for {params:?}: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn parameters_from_json(json: &str) -> Result<SimulationParameters, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    parameters_from_payload(payload)
}

fn parameters_from_payload(payload: SimulatePayload) -> Result<SimulationParameters, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.house_price {
        cli.house_price = v;
    }
    if let Some(v) = payload.monthly_rent {
        cli.monthly_rent = v;
    }
    if let Some(v) = payload.monthly_maintenance {
        cli.monthly_maintenance = v;
    }
    if let Some(v) = payload.down_payment {
        cli.down_payment = v;
    }
    if let Some(v) = payload.interest_rate {
        cli.interest_rate = v;
    }
    if let Some(v) = payload.house_appreciation {
        cli.house_appreciation = v;
    }
    if let Some(v) = payload.investment_return {
        cli.investment_return = v;
    }
    if let Some(v) = payload.loan_years {
        cli.loan_years = v;
    }
    if let Some(v) = payload.years_after_payoff {
        cli.years_after_payoff = v;
    }

    build_parameters(&cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        house_price: 469_400.0,
        monthly_rent: 1_290.0,
        monthly_maintenance: 320.35,
        down_payment: 10.0,
        interest_rate: 3.27,
        house_appreciation: 2.5,
        investment_return: 7.0,
        loan_years: 30.0,
        years_after_payoff: 10.0,
        format: OutputFormat::Json,
        every: 12,
    }
}
