use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::{round_to, run_simulation, validate_horizon};
use super::error::SimulationOutcome;
use super::holdings::{Account, asset_allocation, portfolio_value};
use super::projection::project_milestones;
use super::types::{
    AssetAllocation, DEFAULT_ANNUAL_CONTRIBUTION, ProjectionMilestone, SimulationConfig,
    SimulationInput, SimulationResult,
};

pub const DEFAULT_CURRENT_AGE: u32 = 40;
pub const DEFAULT_YEARS_UNTIL_RETIREMENT: u32 = 30;
pub const DEFAULT_TARGET_INCOME: f64 = 80_000.0;

/// Retirement goals stored against the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetirementGoals {
    #[serde(alias = "years_until_retirement")]
    pub years_until_retirement: u32,
    #[serde(alias = "target_retirement_income")]
    pub target_retirement_income: f64,
    #[serde(alias = "current_age")]
    pub current_age: u32,
    /// Overrides the default yearly contribution.
    #[serde(alias = "annual_contribution")]
    pub annual_contribution: Option<f64>,
}

impl Default for RetirementGoals {
    fn default() -> Self {
        Self {
            years_until_retirement: DEFAULT_YEARS_UNTIL_RETIREMENT,
            target_retirement_income: DEFAULT_TARGET_INCOME,
            current_age: DEFAULT_CURRENT_AGE,
            annual_contribution: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementAnalysis {
    pub portfolio_value: f64,
    pub allocation: AssetAllocation,
    pub simulation: SimulationResult,
    pub projections: Vec<ProjectionMilestone>,
}

/// Summarises the holdings, then runs the Monte Carlo projection and the
/// deterministic milestone path against the user's goals.
pub fn analyze_retirement<R: Rng>(
    accounts: &[Account],
    goals: RetirementGoals,
    config: SimulationConfig,
    rng: &mut R,
) -> SimulationOutcome<RetirementAnalysis> {
    validate_horizon(goals.current_age, goals.years_until_retirement)?;

    let value = portfolio_value(accounts);
    let allocation = asset_allocation(accounts);
    info!(
        accounts = accounts.len(),
        portfolio_value = value,
        years_until_retirement = goals.years_until_retirement,
        "analyzing retirement readiness"
    );

    let input = SimulationInput {
        current_portfolio_value: value,
        years_until_retirement: goals.years_until_retirement,
        target_annual_income: goals.target_retirement_income,
        annual_contribution: goals
            .annual_contribution
            .unwrap_or(DEFAULT_ANNUAL_CONTRIBUTION),
        allocation,
    };
    let simulation = run_simulation(&input, config, rng)?;
    let projections = project_milestones(&input, goals.current_age);

    Ok(RetirementAnalysis {
        portfolio_value: round_to(value, 2),
        allocation,
        simulation,
        projections,
    })
}
