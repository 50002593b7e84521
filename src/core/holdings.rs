use serde::{Deserialize, Serialize};

use super::types::AssetAllocation;

/// Price used for instruments that have no quote yet.
pub const FALLBACK_PRICE: f64 = 100.0;

/// Percentage breakdown (0-100) of an instrument across asset classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetClassBreakdown {
    pub equity: f64,
    #[serde(alias = "fixed_income")]
    pub fixed_income: f64,
    #[serde(alias = "real_estate")]
    pub real_estate: f64,
    pub commodities: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub name: Option<String>,
    pub current_price: Option<f64>,
    #[serde(alias = "allocation_asset_class")]
    pub allocation_asset_class: Option<AssetClassBreakdown>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub instrument: Instrument,
}

impl Position {
    pub fn market_value(&self) -> f64 {
        self.quantity * self.instrument.current_price.unwrap_or(FALLBACK_PRICE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    #[serde(alias = "cash_balance")]
    pub cash_balance: f64,
    pub positions: Vec<Position>,
}

pub fn portfolio_value(accounts: &[Account]) -> f64 {
    accounts
        .iter()
        .map(|account| {
            account.cash_balance
                + account
                    .positions
                    .iter()
                    .map(Position::market_value)
                    .sum::<f64>()
        })
        .sum()
}

/// Blends every position's asset-class breakdown by market value.
///
/// Cash balances count as cash; positions without a breakdown add to the
/// total but to no asset class.
pub fn asset_allocation(accounts: &[Account]) -> AssetAllocation {
    let mut totals = AssetAllocation::default();
    let mut total_value = 0.0;

    for account in accounts {
        totals.cash += account.cash_balance;
        total_value += account.cash_balance;

        for position in &account.positions {
            let value = position.market_value();
            total_value += value;
            if let Some(breakdown) = position.instrument.allocation_asset_class {
                totals.equity += value * breakdown.equity / 100.0;
                totals.bonds += value * breakdown.fixed_income / 100.0;
                totals.real_estate += value * breakdown.real_estate / 100.0;
                totals.commodities += value * breakdown.commodities / 100.0;
            }
        }
    }

    if total_value == 0.0 {
        return AssetAllocation::default();
    }

    AssetAllocation {
        equity: totals.equity / total_value,
        bonds: totals.bonds / total_value,
        real_estate: totals.real_estate / total_value,
        commodities: totals.commodities / total_value,
        cash: totals.cash / total_value,
    }
}
