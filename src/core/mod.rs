mod engine;
mod error;
mod mortgage;
mod types;

pub use engine::{MAX_SIMULATION_YEARS, chart_markers, run_simulation, simulate, summarize};
pub use error::{SimulationError, SimulationOutcome};
pub use mortgage::{monthly_payment, principal_fraction_remaining};
pub use types::{
    ChartMarkers, MonthlyRecord, SimulationParameters, SimulationResult, SimulationSummary,
};
