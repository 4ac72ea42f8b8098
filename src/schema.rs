use crate::error::{ForecastError, Result};
use crate::utils::{get_fiscal_year_end_date, validate_historical};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Number of forecast periods in the reference model.
pub const DEFAULT_HORIZON: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Period {
    #[schemars(description = "Position in the timeline. 0 is the historical anchor, 1..=N are forecasts.")]
    pub index: usize,

    #[schemars(description = "Display label, e.g. '2023A' for actuals or '2024E' for estimates.")]
    pub label: String,

    #[schemars(description = "Last day of the fiscal year this period covers.")]
    pub fiscal_year_end: NaiveDate,

    #[schemars(description = "True only for the historical anchor period.")]
    pub is_actual: bool,
}

/// The historical anchor followed by the forecast periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timeline {
    periods: Vec<Period>,
}

impl Timeline {
    pub fn annual(base_year: i32, fiscal_year_end_month: u32, horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ForecastError::InvalidTimeline(
                "at least one forecast period is required".to_string(),
            ));
        }

        let overflow = || {
            ForecastError::InvalidTimeline(format!(
                "horizon {} from base year {} overflows the calendar",
                horizon, base_year
            ))
        };
        let period_count = horizon.checked_add(1).ok_or_else(overflow)?;
        let last_year = i32::try_from(horizon)
            .ok()
            .and_then(|offset| base_year.checked_add(offset))
            .ok_or_else(overflow)?;
        // Rejects horizons past the supported date range before allocating.
        get_fiscal_year_end_date(last_year, fiscal_year_end_month)?;

        let mut periods = Vec::with_capacity(period_count);
        for (index, year) in (base_year..=last_year).enumerate() {
            let fiscal_year_end = get_fiscal_year_end_date(year, fiscal_year_end_month)?;
            let is_actual = index == 0;
            let suffix = if is_actual { 'A' } else { 'E' };

            periods.push(Period {
                index,
                label: format!("{}{}", fiscal_year_end.year(), suffix),
                fiscal_year_end,
                is_actual,
            });
        }

        Ok(Self { periods })
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn anchor(&self) -> &Period {
        &self.periods[0]
    }

    pub fn forecast_periods(&self) -> &[Period] {
        &self.periods[1..]
    }

    /// Number of forecast periods.
    pub fn horizon(&self) -> usize {
        self.periods.len() - 1
    }

    pub fn labels(&self) -> Vec<String> {
        self.periods.iter().map(|p| p.label.clone()).collect()
    }
}

/// A forecast assumption given either once for every forecast period or as one
/// value per forecast period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PeriodAssumption {
    #[schemars(description = "A single value applied to every forecast period.")]
    Uniform(f64),

    #[schemars(description = "Exactly one value per forecast period, in period order.")]
    PerPeriod(Vec<f64>),
}

impl PeriodAssumption {
    /// Expands to one value per forecast period, checking each with `validate`.
    /// Errors name the assumption and the offending period label.
    pub fn resolve(
        &self,
        assumption: &str,
        timeline: &Timeline,
        validate: fn(&str, Option<&str>, f64) -> Result<()>,
    ) -> Result<Vec<f64>> {
        let horizon = timeline.horizon();
        let values = match self {
            PeriodAssumption::Uniform(v) => vec![*v; horizon],
            PeriodAssumption::PerPeriod(values) => {
                if values.len() != horizon {
                    return Err(ForecastError::AssumptionLength {
                        assumption: assumption.to_string(),
                        expected: horizon,
                        actual: values.len(),
                    });
                }
                values.clone()
            }
        };

        for (period, value) in timeline.forecast_periods().iter().zip(&values) {
            validate(assumption, Some(period.label.as_str()), *value)?;
        }

        Ok(values)
    }
}

impl From<f64> for PeriodAssumption {
    fn from(value: f64) -> Self {
        PeriodAssumption::Uniform(value)
    }
}

impl From<Vec<f64>> for PeriodAssumption {
    fn from(values: Vec<f64>) -> Self {
        PeriodAssumption::PerPeriod(values)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProfitLossHistory {
    pub revenue: f64,
    pub cost: f64,
    pub selling_expense: f64,
    pub admin_expense: f64,
    pub financial_expense: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Reported gross profit. Used verbatim when given, otherwise revenue - cost.")]
    pub gross_profit: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Reported net profit. Used verbatim when given, otherwise revenue less cost and all three expense lines.")]
    pub net_profit: Option<f64>,
}

impl ProfitLossHistory {
    pub fn validate(&self) -> Result<()> {
        validate_historical("revenue", self.revenue)?;
        validate_historical("cost", self.cost)?;
        validate_historical("selling_expense", self.selling_expense)?;
        validate_historical("admin_expense", self.admin_expense)?;
        validate_historical("financial_expense", self.financial_expense)?;
        if let Some(v) = self.gross_profit {
            validate_historical("gross_profit", v)?;
        }
        if let Some(v) = self.net_profit {
            validate_historical("net_profit", v)?;
        }
        Ok(())
    }

    pub fn gross_profit(&self) -> f64 {
        self.gross_profit.unwrap_or(self.revenue - self.cost)
    }

    pub fn net_profit(&self) -> f64 {
        self.net_profit.unwrap_or(
            self.revenue
                - self.cost
                - self.selling_expense
                - self.admin_expense
                - self.financial_expense,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BalanceSheetHistory {
    pub cash: f64,
    pub accounts_receivable: f64,
    pub prepayments: f64,
    pub fixed_assets: f64,
    pub accounts_payable: f64,
    pub customer_advances: f64,
    pub share_capital: f64,
    pub retained_earnings: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_assets: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_liabilities: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_equity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_liabilities_and_equity: Option<f64>,
}

impl BalanceSheetHistory {
    pub fn validate(&self) -> Result<()> {
        let lines = [
            ("cash", Some(self.cash)),
            ("accounts_receivable", Some(self.accounts_receivable)),
            ("prepayments", Some(self.prepayments)),
            ("fixed_assets", Some(self.fixed_assets)),
            ("accounts_payable", Some(self.accounts_payable)),
            ("customer_advances", Some(self.customer_advances)),
            ("share_capital", Some(self.share_capital)),
            ("retained_earnings", Some(self.retained_earnings)),
            ("total_assets", self.total_assets),
            ("total_liabilities", self.total_liabilities),
            ("total_equity", self.total_equity),
            (
                "total_liabilities_and_equity",
                self.total_liabilities_and_equity,
            ),
        ];

        for (line, value) in lines {
            if let Some(v) = value {
                validate_historical(line, v)?;
            }
        }
        Ok(())
    }

    pub fn total_assets(&self) -> f64 {
        self.total_assets.unwrap_or(
            self.cash + self.accounts_receivable + self.prepayments + self.fixed_assets,
        )
    }

    pub fn total_liabilities(&self) -> f64 {
        self.total_liabilities
            .unwrap_or(self.accounts_payable + self.customer_advances)
    }

    pub fn total_equity(&self) -> f64 {
        self.total_equity
            .unwrap_or(self.share_capital + self.retained_earnings)
    }

    pub fn total_liabilities_and_equity(&self) -> f64 {
        self.total_liabilities_and_equity
            .unwrap_or(self.total_liabilities() + self.total_equity())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProfitLossAssumptions {
    #[schemars(description = "Year-on-year revenue growth, e.g. 0.15 for 15%.")]
    pub revenue_growth: PeriodAssumption,

    #[schemars(description = "Cost as a share of same-period revenue.")]
    pub cost_ratio: PeriodAssumption,

    #[schemars(description = "Selling expense as a share of same-period revenue.")]
    pub selling_ratio: PeriodAssumption,

    #[schemars(description = "Admin expense as a share of same-period revenue.")]
    pub admin_ratio: PeriodAssumption,

    #[schemars(description = "Financial expense as a share of same-period revenue.")]
    pub financial_ratio: PeriodAssumption,
}

impl Default for ProfitLossAssumptions {
    fn default() -> Self {
        Self {
            revenue_growth: PeriodAssumption::Uniform(0.15),
            cost_ratio: PeriodAssumption::Uniform(0.60),
            selling_ratio: PeriodAssumption::Uniform(0.10),
            admin_ratio: PeriodAssumption::Uniform(0.07),
            financial_ratio: PeriodAssumption::Uniform(0.02),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BalanceSheetAssumptions {
    #[schemars(description = "Accounts receivable as a share of same-period revenue.")]
    pub receivables_ratio: PeriodAssumption,

    #[schemars(description = "Prepayments as a share of same-period cost.")]
    pub prepayment_ratio: PeriodAssumption,

    #[schemars(description = "Accounts payable as a share of same-period cost.")]
    pub payables_ratio: PeriodAssumption,

    #[schemars(description = "Advances from customers as a share of same-period revenue.")]
    pub advance_ratio: PeriodAssumption,

    #[schemars(description = "Annual growth of fixed assets, applied to every forecast period.")]
    pub fixed_asset_growth: f64,

    #[serde(default)]
    #[schemars(
        description = "Share capital injected in a forecast period, keyed by period index (1 = first forecast period). Periods without an entry receive nothing."
    )]
    pub capital_increases: BTreeMap<usize, f64>,
}

impl Default for BalanceSheetAssumptions {
    fn default() -> Self {
        Self {
            receivables_ratio: PeriodAssumption::Uniform(0.11),
            prepayment_ratio: PeriodAssumption::Uniform(0.01),
            payables_ratio: PeriodAssumption::Uniform(0.20),
            advance_ratio: PeriodAssumption::Uniform(0.01),
            fixed_asset_growth: 0.20,
            capital_increases: BTreeMap::from([(1, 325.0)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowAssumptions {
    #[schemars(description = "Depreciation as a share of same-period fixed assets.")]
    pub depreciation_rate: f64,
}

impl Default for CashFlowAssumptions {
    fn default() -> Self {
        Self {
            depreciation_rate: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProfitLossSection {
    pub historical: ProfitLossHistory,
    #[serde(default)]
    pub assumptions: ProfitLossAssumptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BalanceSheetSection {
    pub historical: BalanceSheetHistory,
    #[serde(default)]
    pub assumptions: BalanceSheetAssumptions,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowSection {
    #[serde(default)]
    pub assumptions: CashFlowAssumptions,
}

fn default_horizon() -> usize {
    DEFAULT_HORIZON
}

fn default_fiscal_year_end_month() -> u32 {
    12
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastConfig {
    #[schemars(description = "The legal name of the organization being forecast")]
    pub organization_name: String,

    #[schemars(description = "Fiscal year of the historical anchor period, e.g. 2023.")]
    pub base_year: i32,

    #[serde(default = "default_fiscal_year_end_month")]
    #[schemars(
        description = "The month when the fiscal year ends (1 = January, 12 = December). Defaults to 12."
    )]
    pub fiscal_year_end_month: u32,

    #[serde(default = "default_horizon")]
    #[schemars(description = "Number of forecast periods after the anchor. Defaults to 3.")]
    pub horizon: usize,

    pub profit_loss: ProfitLossSection,
    pub balance_sheet: BalanceSheetSection,
    #[serde(default)]
    pub cash_flow: CashFlowSection,
}

impl ForecastConfig {
    /// The 2023 baseline and default assumptions of the reference model.
    pub fn reference() -> Self {
        Self {
            organization_name: "Reference Company".to_string(),
            base_year: 2023,
            fiscal_year_end_month: 12,
            horizon: DEFAULT_HORIZON,
            profit_loss: ProfitLossSection {
                historical: ProfitLossHistory {
                    revenue: 1000.0,
                    cost: 600.0,
                    selling_expense: 100.0,
                    admin_expense: 80.0,
                    financial_expense: 20.0,
                    gross_profit: Some(400.0),
                    net_profit: Some(200.0),
                },
                assumptions: ProfitLossAssumptions::default(),
            },
            balance_sheet: BalanceSheetSection {
                historical: BalanceSheetHistory {
                    cash: 1260.0,
                    accounts_receivable: 110.0,
                    prepayments: 6.0,
                    fixed_assets: 16.0,
                    accounts_payable: 120.0,
                    customer_advances: 10.0,
                    share_capital: 1333.52,
                    retained_earnings: -71.52,
                    total_assets: Some(1392.0),
                    total_liabilities: Some(130.0),
                    total_equity: Some(1262.0),
                    total_liabilities_and_equity: Some(1392.0),
                },
                assumptions: BalanceSheetAssumptions::default(),
            },
            cash_flow: CashFlowSection::default(),
        }
    }

    pub fn timeline(&self) -> Result<Timeline> {
        Timeline::annual(self.base_year, self.fiscal_year_end_month, self.horizon)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ForecastConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
