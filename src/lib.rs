//! # Financial Forecast Builder
//!
//! A three-statement forecasting library. One period of historical actuals and
//! a small set of ratio assumptions are projected forward into a Profit & Loss
//! statement, a Balance Sheet and a Cash Flow statement that tie out with one
//! another.
//!
//! ## Core Concepts
//!
//! - **Anchor period**: the historical column (e.g. `2023A`), copied verbatim into
//!   every statement
//! - **Forecast periods**: `2024E` onwards, derived purely from assumptions and
//!   upstream statements
//! - **Dependency order**: P&L → Balance Sheet → Cash Flow; regenerating a
//!   statement discards everything built on top of it
//! - **Cash plug**: Cash absorbs whatever keeps Assets = Liabilities + Equity
//! - **Metrics**: margins and ratios that report `undefined` / `n/a` instead of NaN
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_forecast_builder::*;
//!
//! let config = ForecastConfig::reference();
//! let bundle = process_forecast(&config).unwrap();
//!
//! println!("{}", render_table(&bundle.cash_flow));
//! println!("Revenue CAGR: {}", bundle.metrics.profit_loss.revenue_cagr);
//! ```
//!
//! Step-by-step generation goes through [`ForecastSession`]:
//!
//! ```rust,ignore
//! let mut session = ForecastSession::new(config.timeline()?);
//! session.generate_profit_loss(&config.profit_loss.historical, &config.profit_loss.assumptions)?;
//! session.generate_balance_sheet(&config.balance_sheet.historical, &config.balance_sheet.assumptions)?;
//! let cf = session.generate_cash_flow(&config.cash_flow.assumptions)?;
//! ```

pub mod balance_sheet;
pub mod cash_flow;
pub mod error;
pub mod metrics;
pub mod profit_loss;
pub mod report;
pub mod schema;
pub mod session;
pub mod statement;
pub mod utils;

pub use balance_sheet::{
    cash_plug, forecast_balance_sheet, verify_accounting_equation, BalanceSheetForecaster,
};
pub use cash_flow::{
    forecast_cash_flow, reconcile_cash, verify_cash_flow_identity, CashFlowForecaster,
};
pub use error::{ForecastError, Result};
pub use metrics::{
    headline, BalanceSheetMetrics, CashFlowMetrics, ForecastMetrics, Headline, MetricValue,
    ProfitLossMetrics,
};
pub use profit_loss::{forecast_profit_loss, ProfitLossForecaster};
pub use report::{render_table, statement_to_csv, statement_to_json, write_statement_csv};
pub use schema::*;
pub use session::{ForecastSession, StatementSnapshot, StatementStatus};
pub use statement::{LineItem, Statement, StatementKind};
pub use utils::*;

use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;

/// Everything one run of the pipeline produces.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastBundle {
    pub organization_name: String,
    pub timeline: Timeline,
    pub profit_loss: Arc<Statement>,
    pub balance_sheet: Arc<Statement>,
    pub cash_flow: Arc<Statement>,
    pub metrics: ForecastMetrics,
}

pub struct ForecastProcessor;

impl ForecastProcessor {
    pub fn process(config: &ForecastConfig) -> Result<ForecastBundle> {
        info!(
            "Processing forecast for organization: {}",
            config.organization_name
        );

        let timeline = config.timeline()?;
        debug!(
            "Timeline: {} (anchor) plus {} forecast periods",
            timeline.anchor().label,
            timeline.horizon()
        );

        let mut session = ForecastSession::new(timeline.clone());
        let profit_loss = session.generate_profit_loss(
            &config.profit_loss.historical,
            &config.profit_loss.assumptions,
        )?;
        let balance_sheet = session.generate_balance_sheet(
            &config.balance_sheet.historical,
            &config.balance_sheet.assumptions,
        )?;
        let cash_flow = session.generate_cash_flow(&config.cash_flow.assumptions)?;

        let metrics = ForecastMetrics::from_statements(&profit_loss, &balance_sheet, &cash_flow)?;

        Ok(ForecastBundle {
            organization_name: config.organization_name.clone(),
            timeline,
            profit_loss,
            balance_sheet,
            cash_flow,
            metrics,
        })
    }

    /// Runs [`ForecastProcessor::process`] and then re-checks the accounting
    /// equation, the cash flow identity and the cash reconciliation.
    pub fn process_with_verification(
        config: &ForecastConfig,
        tolerance: f64,
    ) -> Result<ForecastBundle> {
        let bundle = Self::process(config)?;

        verify_accounting_equation(&bundle.balance_sheet, tolerance)?;
        verify_cash_flow_identity(&bundle.cash_flow, tolerance)?;
        reconcile_cash(&bundle.balance_sheet, &bundle.cash_flow, tolerance)?;
        debug!("Forecast verified at tolerance {}", tolerance);

        Ok(bundle)
    }
}

pub fn process_forecast(config: &ForecastConfig) -> Result<ForecastBundle> {
    ForecastProcessor::process(config)
}

pub fn process_with_verification(
    config: &ForecastConfig,
    tolerance: f64,
) -> Result<ForecastBundle> {
    ForecastProcessor::process_with_verification(config, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end_processing() {
        let config = ForecastConfig::reference();
        let bundle = process_with_verification(&config, DEFAULT_TOLERANCE).unwrap();

        assert_eq!(bundle.timeline.horizon(), 3);
        assert_eq!(bundle.profit_loss.kind(), StatementKind::ProfitLoss);
        assert_eq!(bundle.balance_sheet.kind(), StatementKind::BalanceSheet);
        assert_eq!(bundle.cash_flow.kind(), StatementKind::CashFlow);

        let cash1 = bundle.balance_sheet.value(LineItem::Cash, 1).unwrap();
        assert!((cash1 - 1825.4).abs() < 1e-9);

        let cagr = bundle.metrics.profit_loss.revenue_cagr.value().unwrap();
        assert!((cagr - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_fails_before_generation() {
        let mut config = ForecastConfig::reference();
        config.fiscal_year_end_month = 13;

        assert!(matches!(
            process_forecast(&config),
            Err(ForecastError::InvalidFiscalYearEndMonth(13))
        ));
    }

    #[test]
    fn test_bundle_serializes() {
        let bundle = process_forecast(&ForecastConfig::reference()).unwrap();
        let json = serde_json::to_value(&bundle).unwrap();

        assert_eq!(json["organization_name"], "Reference Company");
        assert_eq!(json["metrics"]["cash_flow"]["net_cf_cagr"]["status"], "value");
    }
}
