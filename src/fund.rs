//! Pension fund asset ledger
//!
//! Holds plan assets in three channels (equity, bonds, other). Premiums and
//! benefits move each channel in proportion to its share of current holdings,
//! and each year every channel earns an independent normally distributed
//! return. Benefits the fund cannot cover come back as a pay-go shortfall.

use std::collections::BTreeMap;

use log::{debug, warn};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;

use crate::error::{ModelError, Result};

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Target split of assets across channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Allocation {
    pub equity: f64,
    pub bonds: f64,
    pub other: f64,
}

impl Default for Allocation {
    fn default() -> Self {
        Self {
            equity: 0.6,
            bonds: 0.3,
            other: 0.1,
        }
    }
}

impl Allocation {
    pub fn new(equity: f64, bonds: f64, other: f64) -> Result<Self> {
        let shares = [equity, bonds, other];
        if shares.iter().any(|s| !(0.0..=1.0).contains(s)) || ((equity + bonds + other) - 1.0).abs() > 1e-9 {
            return Err(ModelError::InvalidDistribution(format!(
                "allocation {}/{}/{} must be non-negative and sum to 1",
                equity, bonds, other
            )));
        }
        Ok(Self { equity, bonds, other })
    }
}

/// Dollar holdings per channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Holdings {
    pub equity: f64,
    pub bonds: f64,
    pub other: f64,
}

impl Holdings {
    pub fn split(total: f64, allocation: &Allocation) -> Self {
        Self {
            equity: round_cents(allocation.equity * total),
            bonds: round_cents(allocation.bonds * total),
            other: round_cents(allocation.other * total),
        }
    }

    pub fn total(&self) -> f64 {
        self.equity + self.bonds + self.other
    }

    /// Channel weights for spreading a flow: current shares, or the target when empty
    fn weights(&self, allocation: &Allocation) -> [f64; 3] {
        let total = self.total();
        if total == 0.0 {
            [allocation.equity, allocation.bonds, allocation.other]
        } else {
            [self.equity / total, self.bonds / total, self.other / total]
        }
    }

    fn channels_mut(&mut self) -> [&mut f64; 3] {
        [&mut self.equity, &mut self.bonds, &mut self.other]
    }
}

/// Normal return distribution for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReturnDistribution {
    pub mean: f64,
    pub std_dev: f64,
}

impl ReturnDistribution {
    fn new(mean: f64, std_dev: f64, channel: &str) -> Result<Self> {
        if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
            return Err(ModelError::InvalidDistribution(format!(
                "{} return N({}, {})",
                channel, mean, std_dev
            )));
        }
        Ok(Self { mean, std_dev })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let z: f64 = StandardNormal.sample(rng);
        self.mean + self.std_dev * z
    }
}

/// Annual return distribution per channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssetReturns {
    pub equity: ReturnDistribution,
    pub bonds: ReturnDistribution,
    pub other: ReturnDistribution,
}

impl AssetReturns {
    /// Each pair is (mean, standard deviation)
    pub fn new(equity: (f64, f64), bonds: (f64, f64), other: (f64, f64)) -> Result<Self> {
        Ok(Self {
            equity: ReturnDistribution::new(equity.0, equity.1, "equity")?,
            bonds: ReturnDistribution::new(bonds.0, bonds.1, "bonds")?,
            other: ReturnDistribution::new(other.0, other.1, "other")?,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        [
            self.equity.sample(rng),
            self.bonds.sample(rng),
            self.other.sample(rng),
        ]
    }

    pub fn means(&self) -> [f64; 3] {
        [self.equity.mean, self.bonds.mean, self.other.mean]
    }
}

impl Default for AssetReturns {
    fn default() -> Self {
        Self {
            equity: ReturnDistribution { mean: 0.06, std_dev: 0.03 },
            bonds: ReturnDistribution { mean: 0.04, std_dev: 0.01 },
            other: ReturnDistribution { mean: 0.06, std_dev: 0.05 },
        }
    }
}

/// Outcome of one year of investment earnings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearReturn {
    /// Portfolio return over the year; zero for an empty fund
    pub rate: f64,
    /// Assets before earnings
    pub starting_assets: f64,
}

/// One row of a fund projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FundYear {
    pub year: i32,
    pub net_flow: f64,
    /// Benefits the fund could not pay
    pub shortfall: f64,
    pub return_rate: f64,
    pub assets: Holdings,
}

/// Invested plan assets with a year-keyed ledger
#[derive(Debug, Clone)]
pub struct PensionFund {
    year: i32,
    allocation: Allocation,
    returns: AssetReturns,
    holdings: Holdings,
    ledger: BTreeMap<i32, Holdings>,
}

impl PensionFund {
    pub fn new(assets: f64, year: i32, allocation: Allocation, returns: AssetReturns) -> Self {
        let holdings = Holdings::split(assets, &allocation);
        Self {
            year,
            allocation,
            returns,
            holdings,
            ledger: BTreeMap::from([(year, holdings)]),
        }
    }

    pub fn with_defaults(assets: f64, year: i32) -> Self {
        Self::new(assets, year, Allocation::default(), AssetReturns::default())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    pub fn total_assets(&self) -> f64 {
        self.holdings.total()
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    pub fn add_premiums(&mut self, premiums: f64) {
        let weights = self.holdings.weights(&self.allocation);
        for (channel, weight) in self.holdings.channels_mut().into_iter().zip(weights) {
            *channel += weight * premiums;
        }
    }

    /// Pay benefits, returning the shortfall the fund could not cover
    pub fn pay_benefits(&mut self, benefits: f64) -> f64 {
        let weights = self.holdings.weights(&self.allocation);
        for (channel, weight) in self.holdings.channels_mut().into_iter().zip(weights) {
            *channel -= weight * benefits;
        }
        self.pay_go()
    }

    /// Zero out overdrawn channels once holdings are negative
    fn pay_go(&mut self) -> f64 {
        if self.holdings.total() >= 0.0 {
            return 0.0;
        }

        let mut shortfall = 0.0;
        for channel in self.holdings.channels_mut() {
            if *channel < 0.0 {
                shortfall -= *channel;
                *channel = 0.0;
            }
        }
        shortfall
    }

    pub fn add_investment_earnings<R: Rng + ?Sized>(&mut self, rng: &mut R) -> YearReturn {
        let starting_assets = self.holdings.total();
        let rates = self.returns.sample(rng);

        for (channel, rate) in self.holdings.channels_mut().into_iter().zip(rates) {
            *channel = round_cents(*channel * (1.0 + rate));
        }

        let rate = if starting_assets == 0.0 {
            0.0
        } else {
            (self.holdings.total() - starting_assets) / starting_assets
        };
        YearReturn { rate, starting_assets }
    }

    /// Record current holdings under `year` and make it the current year
    pub fn update_ledger(&mut self, year: i32) {
        self.year = year;
        self.ledger.insert(year, self.holdings);
    }

    pub fn ledger(&self, year: i32) -> Option<&Holdings> {
        self.ledger.get(&year)
    }

    pub fn ledger_years(&self) -> impl Iterator<Item = (&i32, &Holdings)> {
        self.ledger.iter()
    }

    /// Roll (year, net flow) pairs through the fund
    ///
    /// Positive flows are premiums and negative flows are benefits. Each year
    /// then earns a return and is written to the ledger.
    pub fn project<R: Rng + ?Sized>(&mut self, flows: &[(i32, f64)], rng: &mut R) -> Vec<FundYear> {
        let mut rows = Vec::with_capacity(flows.len());
        let mut total_shortfall = 0.0;

        for &(year, net_flow) in flows {
            let shortfall = if net_flow >= 0.0 {
                self.add_premiums(net_flow);
                0.0
            } else {
                self.pay_benefits(-net_flow)
            };
            total_shortfall += shortfall;

            let earned = self.add_investment_earnings(rng);
            self.update_ledger(year);
            rows.push(FundYear {
                year,
                net_flow,
                shortfall,
                return_rate: earned.rate,
                assets: self.holdings,
            });
        }

        if total_shortfall > 0.0 {
            warn!("Fund required {:.2} of pay-go contributions", total_shortfall);
        }
        debug!("Fund projected through {} with {:.2} in assets", self.year, self.total_assets());
        rows
    }
}
