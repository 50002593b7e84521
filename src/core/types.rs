use serde::{Deserialize, Serialize};

/// Years of retirement income every trial has to fund.
pub const RETIREMENT_YEARS: u32 = 30;

pub const DEFAULT_TRIALS: u32 = 1_000;
pub const DEFAULT_ANNUAL_CONTRIBUTION: f64 = 10_000.0;

/// Fraction of the portfolio held in each asset class.
///
/// Fractions are in `[0, 1]` and need not sum to one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetAllocation {
    pub equity: f64,
    #[serde(alias = "fixed_income", alias = "fixedIncome")]
    pub bonds: f64,
    #[serde(alias = "real_estate")]
    pub real_estate: f64,
    pub commodities: f64,
    pub cash: f64,
}

impl AssetAllocation {
    pub(crate) fn weights(&self) -> [(&'static str, f64); 5] {
        [
            ("equity", self.equity),
            ("bonds", self.bonds),
            ("realEstate", self.real_estate),
            ("commodities", self.commodities),
            ("cash", self.cash),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct SimulationInput {
    pub current_portfolio_value: f64,
    pub years_until_retirement: u32,
    pub target_annual_income: f64,
    pub annual_contribution: f64,
    pub allocation: AssetAllocation,
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub num_trials: u32,
    /// Replay each trial's draw stream in the what-if variants so deltas
    /// reflect the input change rather than sampling noise.
    pub paired_scenarios: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_trials: DEFAULT_TRIALS,
            paired_scenarios: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    pub final_value: f64,
    pub years_lasted: u32,
    pub value_at_retirement: f64,
}

impl TrialOutcome {
    pub fn succeeded(&self) -> bool {
        self.years_lasted == RETIREMENT_YEARS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfScenarios {
    pub delay_two_years_success_rate: f64,
    pub success_rate_delta: f64,
    pub extra_contribution_median_at_retirement: f64,
    pub median_at_retirement_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub num_trials: u32,
    pub success_rate: f64,
    pub percentile_10: f64,
    pub percentile_25: f64,
    pub median_final_value: f64,
    pub percentile_75: f64,
    pub percentile_90: f64,
    pub retirement_value_p25: f64,
    pub retirement_value_median: f64,
    pub retirement_value_p75: f64,
    pub average_years_lasted: f64,
    pub expected_value_at_retirement: f64,
    pub what_if: WhatIfScenarios,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectionPhase {
    Accumulation,
    Retirement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionMilestone {
    pub year: u32,
    pub age: u32,
    pub portfolio_value: f64,
    pub annual_income: f64,
    pub phase: ProjectionPhase,
}
