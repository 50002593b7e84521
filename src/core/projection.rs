use super::engine::{WITHDRAWAL_INFLATION, round_to};
use super::sampler::expected_return;
use super::types::{ProjectionMilestone, ProjectionPhase, RETIREMENT_YEARS, SimulationInput};

pub const MILESTONE_STEP_YEARS: u32 = 5;

/// Deterministic path at the allocation's mean return, reported every
/// `MILESTONE_STEP_YEARS` from today to the end of retirement.
///
/// Years up to and including retirement are accumulation. Each retirement
/// year withdraws the target income inflated from the retirement date; once
/// the balance is gone the reported income is whatever was left.
pub fn project_milestones(input: &SimulationInput, current_age: u32) -> Vec<ProjectionMilestone> {
    let mean_return = expected_return(&input.allocation);
    let retirement_year = input.years_until_retirement;
    let last_year = retirement_year.saturating_add(RETIREMENT_YEARS);

    let mut milestones = Vec::new();
    let mut value = input.current_portfolio_value;
    let mut withdrawal = input.target_annual_income;

    for year in 0..=last_year {
        let mut income = 0.0;
        if year > 0 {
            value *= 1.0 + mean_return;
            if year <= retirement_year {
                value += input.annual_contribution;
            } else {
                withdrawal *= 1.0 + WITHDRAWAL_INFLATION;
                income = withdrawal.min(value.max(0.0));
                value = (value - withdrawal).max(0.0);
            }
        }

        if year % MILESTONE_STEP_YEARS == 0 || year == retirement_year {
            milestones.push(ProjectionMilestone {
                year,
                age: current_age.saturating_add(year),
                portfolio_value: round_to(value, 2),
                annual_income: round_to(income, 2),
                phase: if year <= retirement_year {
                    ProjectionPhase::Accumulation
                } else {
                    ProjectionPhase::Retirement
                },
            });
        }
    }

    milestones
}
