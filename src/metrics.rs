//! Ratios derived from finished statements.
//!
//! Every metric degrades to an explicit sentinel instead of producing NaN or
//! infinity, so a zero denominator in one period never leaks into display or
//! downstream arithmetic.

use crate::error::Result;
use crate::statement::{LineItem, Statement, StatementKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricValue {
    Value { value: f64 },
    /// The formula divides by zero for this input.
    Undefined { reason: String },
    /// The formula is defined but meaningless for this input (e.g. a CAGR
    /// from a non-positive base).
    NotApplicable { reason: String },
}

impl MetricValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value { value } => Some(*value),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, MetricValue::Value { .. })
    }

    /// `self - base`, e.g. a margin's movement since the anchor period.
    pub fn change_from(&self, base: &MetricValue) -> MetricValue {
        match (self, base) {
            (MetricValue::Value { value }, MetricValue::Value { value: base }) => {
                MetricValue::Value {
                    value: value - base,
                }
            }
            (MetricValue::NotApplicable { reason }, _)
            | (_, MetricValue::NotApplicable { reason }) => MetricValue::NotApplicable {
                reason: reason.clone(),
            },
            (MetricValue::Undefined { reason }, _) | (_, MetricValue::Undefined { reason }) => {
                MetricValue::Undefined {
                    reason: reason.clone(),
                }
            }
        }
    }

    fn undefined(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!("Metric undefined: {}", reason);
        MetricValue::Undefined { reason }
    }

    fn not_applicable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        debug!("Metric not applicable: {}", reason);
        MetricValue::NotApplicable { reason }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Value { value } => write!(f, "{:.1}%", value * 100.0),
            MetricValue::Undefined { .. } => f.write_str("undefined"),
            MetricValue::NotApplicable { .. } => f.write_str("n/a"),
        }
    }
}

pub fn ratio(numerator: f64, denominator: f64, context: &str) -> MetricValue {
    if denominator == 0.0 {
        return MetricValue::undefined(format!("{}: denominator is zero", context));
    }
    let value = numerator / denominator;
    if !value.is_finite() {
        return MetricValue::undefined(format!("{}: result is not finite", context));
    }
    MetricValue::Value { value }
}

/// `(end / start)^(1 / periods) - 1`
pub fn cagr(start: f64, end: f64, periods: usize, context: &str) -> MetricValue {
    if periods == 0 {
        return MetricValue::not_applicable(format!("{}: no periods to compound over", context));
    }
    if start == 0.0 {
        return MetricValue::undefined(format!("{}: starting value is zero", context));
    }
    let growth = end / start;
    if growth < 0.0 {
        return MetricValue::not_applicable(format!(
            "{}: start ({}) and end ({}) have opposite signs",
            context, start, end
        ));
    }
    if start < 0.0 {
        return MetricValue::not_applicable(format!(
            "{}: starting value {} is negative",
            context, start
        ));
    }

    let value = growth.powf(1.0 / periods as f64) - 1.0;
    if !value.is_finite() {
        return MetricValue::undefined(format!("{}: result is not finite", context));
    }
    MetricValue::Value { value }
}

/// The last period's value and its change against the anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub latest: MetricValue,
    pub change: MetricValue,
}

pub fn headline(series: &[MetricValue]) -> Headline {
    match (series.first(), series.last()) {
        (Some(first), Some(last)) => Headline {
            latest: last.clone(),
            change: last.change_from(first),
        },
        _ => {
            let empty = MetricValue::NotApplicable {
                reason: "no periods".to_string(),
            };
            Headline {
                latest: empty.clone(),
                change: empty,
            }
        }
    }
}

fn per_period(
    numerators: &[f64],
    denominators: &[f64],
    statement: &Statement,
    name: &str,
) -> Vec<MetricValue> {
    statement
        .periods()
        .iter()
        .zip(numerators.iter().zip(denominators))
        .map(|(period, (n, d))| ratio(*n, *d, &format!("{} ({})", name, period.label)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitLossMetrics {
    pub gross_margin: Vec<MetricValue>,
    pub net_margin: Vec<MetricValue>,
    pub revenue_cagr: MetricValue,
}

impl ProfitLossMetrics {
    pub fn from_statement(pl: &Statement) -> Result<Self> {
        pl.expect_kind(StatementKind::ProfitLoss)?;
        let revenue = pl.line(LineItem::Revenue)?;
        let gross_profit = pl.line(LineItem::GrossProfit)?;
        let net_profit = pl.line(LineItem::NetProfit)?;

        let horizon = pl.horizon();
        Ok(Self {
            gross_margin: per_period(gross_profit, revenue, pl, "gross margin"),
            net_margin: per_period(net_profit, revenue, pl, "net margin"),
            revenue_cagr: cagr(revenue[0], revenue[horizon], horizon, "revenue CAGR"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheetMetrics {
    pub debt_ratio: Vec<MetricValue>,
    pub fixed_asset_ratio: Vec<MetricValue>,
    pub equity_ratio: Vec<MetricValue>,
}

impl BalanceSheetMetrics {
    pub fn from_statement(bs: &Statement) -> Result<Self> {
        bs.expect_kind(StatementKind::BalanceSheet)?;
        let total_assets = bs.line(LineItem::TotalAssets)?;

        Ok(Self {
            debt_ratio: per_period(
                bs.line(LineItem::TotalLiabilities)?,
                total_assets,
                bs,
                "debt ratio",
            ),
            fixed_asset_ratio: per_period(
                bs.line(LineItem::FixedAssets)?,
                total_assets,
                bs,
                "fixed asset ratio",
            ),
            equity_ratio: per_period(
                bs.line(LineItem::TotalEquity)?,
                total_assets,
                bs,
                "equity ratio",
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowMetrics {
    pub operating_cf_to_net_profit: Vec<MetricValue>,
    pub capex_to_operating_cf: Vec<MetricValue>,
    pub net_cf_cagr: MetricValue,
}

impl CashFlowMetrics {
    pub fn from_statement(cf: &Statement) -> Result<Self> {
        cf.expect_kind(StatementKind::CashFlow)?;
        let operating = cf.line(LineItem::OperatingCashFlow)?;
        let investing = cf.line(LineItem::InvestingCashFlow)?;
        let net_profit = cf.line(LineItem::NetProfit)?;
        let net = cf.line(LineItem::NetCashFlow)?;

        let capex: Vec<f64> = investing.iter().map(|v| -v).collect();
        let horizon = cf.horizon();

        // A fractional power of a non-positive base has no real answer.
        let net_cf_cagr = if net[0] <= 0.0 {
            MetricValue::not_applicable(format!(
                "net cash flow CAGR: base period net cash flow {} is not positive",
                net[0]
            ))
        } else {
            cagr(net[0], net[horizon], horizon, "net cash flow CAGR")
        };

        Ok(Self {
            operating_cf_to_net_profit: per_period(
                operating,
                net_profit,
                cf,
                "operating cash flow / net profit",
            ),
            capex_to_operating_cf: per_period(&capex, operating, cf, "capex / operating cash flow"),
            net_cf_cagr,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub profit_loss: ProfitLossMetrics,
    pub balance_sheet: BalanceSheetMetrics,
    pub cash_flow: CashFlowMetrics,
}

impl ForecastMetrics {
    pub fn from_statements(pl: &Statement, bs: &Statement, cf: &Statement) -> Result<Self> {
        Ok(Self {
            profit_loss: ProfitLossMetrics::from_statement(pl)?,
            balance_sheet: BalanceSheetMetrics::from_statement(bs)?,
            cash_flow: CashFlowMetrics::from_statement(cf)?,
        })
    }
}
