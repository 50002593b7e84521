mod analysis;
mod engine;
mod error;
mod holdings;
mod projection;
mod sampler;
mod types;

pub use analysis::{RetirementAnalysis, RetirementGoals, analyze_retirement};
pub use engine::{
    MAX_HORIZON_AGE, MAX_TRIALS, MAX_YEARS_UNTIL_RETIREMENT, accumulate,
    expected_value_at_retirement, run_simulation, simulate_trial, validate_horizon,
    validate_input,
};
pub use error::{SimulationError, SimulationOutcome};
pub use holdings::{
    Account, AssetClassBreakdown, Instrument, Position, asset_allocation, portfolio_value,
};
pub use projection::project_milestones;
pub use sampler::{ReturnSampler, expected_return};
pub use types::{
    AssetAllocation, DEFAULT_ANNUAL_CONTRIBUTION, DEFAULT_TRIALS, ProjectionMilestone,
    ProjectionPhase, RETIREMENT_YEARS, SimulationConfig, SimulationInput, SimulationResult,
    TrialOutcome, WhatIfScenarios,
};
