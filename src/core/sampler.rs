use rand::Rng;
use rand::distributions::Distribution;
use statrs::distribution::Normal;

use super::error::{SimulationError, SimulationOutcome};
use super::types::AssetAllocation;

/// Historical mean and volatility for a stochastic asset class.
#[derive(Debug, Clone, Copy)]
pub struct ReturnParams {
    pub mean: f64,
    pub vol: f64,
}

pub const EQUITY_RETURN: ReturnParams = ReturnParams {
    mean: 0.07,
    vol: 0.18,
};
pub const BOND_RETURN: ReturnParams = ReturnParams {
    mean: 0.04,
    vol: 0.05,
};
pub const REAL_ESTATE_RETURN: ReturnParams = ReturnParams {
    mean: 0.06,
    vol: 0.12,
};
pub const CASH_RETURN: f64 = 0.02;

/// Draws blended annual returns for a fixed allocation.
///
/// Every draw consumes exactly three normal variates (equity, bonds, real
/// estate, in that order) so that two paths fed the same generator stay
/// aligned year by year regardless of the weights.
#[derive(Debug, Clone)]
pub struct ReturnSampler {
    allocation: AssetAllocation,
    equity: Normal,
    bonds: Normal,
    real_estate: Normal,
}

impl ReturnSampler {
    pub fn new(allocation: AssetAllocation) -> SimulationOutcome<Self> {
        Ok(Self {
            allocation,
            equity: normal("equity", EQUITY_RETURN)?,
            bonds: normal("bonds", BOND_RETURN)?,
            real_estate: normal("realEstate", REAL_ESTATE_RETURN)?,
        })
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let equity_return = self.equity.sample(rng);
        let bond_return = self.bonds.sample(rng);
        let real_estate_return = self.real_estate.sample(rng);

        self.allocation.equity * equity_return
            + self.allocation.bonds * bond_return
            + self.allocation.real_estate * real_estate_return
            + self.allocation.cash * CASH_RETURN
    }
}

/// Allocation-weighted mean return, with no randomness.
pub fn expected_return(allocation: &AssetAllocation) -> f64 {
    allocation.equity * EQUITY_RETURN.mean
        + allocation.bonds * BOND_RETURN.mean
        + allocation.real_estate * REAL_ESTATE_RETURN.mean
        + allocation.cash * CASH_RETURN
}

fn normal(asset_class: &str, params: ReturnParams) -> SimulationOutcome<Normal> {
    Normal::new(params.mean, params.vol).map_err(|e| SimulationError::Distribution {
        asset_class: asset_class.to_string(),
        reason: e.to_string(),
    })
}
