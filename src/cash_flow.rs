use crate::error::{ForecastError, Result};
use crate::schema::{CashFlowAssumptions, Timeline};
use crate::statement::{LineItem, Statement, StatementBuilder, StatementKind};
use crate::utils::{approx_eq, validate_ratio};
use log::{debug, info};

pub struct CashFlowForecaster<'a> {
    timeline: &'a Timeline,
}

impl<'a> CashFlowForecaster<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self { timeline }
    }

    /// Indirect-method cash flow: net profit adjusted for depreciation and
    /// single-step changes in the working-capital, fixed-asset and share
    /// capital lines of the balance sheet.
    pub fn forecast(
        &self,
        pl: &Statement,
        bs: &Statement,
        assumptions: &CashFlowAssumptions,
    ) -> Result<Statement> {
        pl.expect_kind(StatementKind::ProfitLoss)?;
        bs.expect_kind(StatementKind::BalanceSheet)?;
        pl.ensure_timeline(self.timeline)?;
        bs.ensure_timeline(self.timeline)?;

        let rate = assumptions.depreciation_rate;
        validate_ratio("depreciation_rate", None, rate)?;

        let net_profit = pl.line(LineItem::NetProfit)?;
        let fixed_assets = bs.line(LineItem::FixedAssets)?;
        let receivables = bs.line(LineItem::AccountsReceivable)?;
        let prepayments = bs.line(LineItem::Prepayments)?;
        let payables = bs.line(LineItem::AccountsPayable)?;
        let advances = bs.line(LineItem::CustomerAdvances)?;
        let capital = bs.line(LineItem::ShareCapital)?;

        info!(
            "Forecasting Cash Flow over {} periods at a depreciation rate of {}",
            self.timeline.horizon(),
            rate
        );

        let mut builder = StatementBuilder::new(StatementKind::CashFlow, self.timeline);

        // No prior period exists to difference the anchor against.
        let depreciation = fixed_assets[0] * rate;
        let operating = net_profit[0] + depreciation;
        builder.push(LineItem::NetProfit, net_profit[0]);
        builder.push(LineItem::Depreciation, depreciation);
        builder.push(LineItem::ChangeInReceivables, 0.0);
        builder.push(LineItem::ChangeInPrepayments, 0.0);
        builder.push(LineItem::ChangeInPayables, 0.0);
        builder.push(LineItem::ChangeInAdvances, 0.0);
        builder.push(LineItem::OperatingCashFlow, operating);
        builder.push(LineItem::CapitalExpenditure, 0.0);
        builder.push(LineItem::InvestingCashFlow, 0.0);
        builder.push(LineItem::FinancingCashFlow, 0.0);
        builder.push(LineItem::NetCashFlow, operating);

        for period in self.timeline.forecast_periods() {
            let i = period.index;

            let depreciation = fixed_assets[i] * rate;
            let change_in_receivables = receivables[i] - receivables[i - 1];
            let change_in_prepayments = prepayments[i] - prepayments[i - 1];
            let change_in_payables = payables[i] - payables[i - 1];
            let change_in_advances = advances[i] - advances[i - 1];
            let change_in_capital = capital[i] - capital[i - 1];

            let operating = net_profit[i] + depreciation - change_in_receivables
                - change_in_prepayments
                + change_in_payables
                + change_in_advances;
            let capex = fixed_assets[i] - fixed_assets[i - 1] + depreciation;
            let investing = -capex;
            let financing = change_in_capital;
            let net = operating + investing + financing;

            debug!(
                "{}: operating {:.2}, investing {:.2}, financing {:.2}, net {:.2}",
                period.label, operating, investing, financing, net
            );

            builder.push(LineItem::NetProfit, net_profit[i]);
            builder.push(LineItem::Depreciation, depreciation);
            builder.push(LineItem::ChangeInReceivables, change_in_receivables);
            builder.push(LineItem::ChangeInPrepayments, change_in_prepayments);
            builder.push(LineItem::ChangeInPayables, change_in_payables);
            builder.push(LineItem::ChangeInAdvances, change_in_advances);
            builder.push(LineItem::OperatingCashFlow, operating);
            builder.push(LineItem::CapitalExpenditure, capex);
            builder.push(LineItem::InvestingCashFlow, investing);
            builder.push(LineItem::FinancingCashFlow, financing);
            builder.push(LineItem::NetCashFlow, net);
        }

        builder.finish()
    }
}

pub fn forecast_cash_flow(
    timeline: &Timeline,
    pl: &Statement,
    bs: &Statement,
    assumptions: &CashFlowAssumptions,
) -> Result<Statement> {
    CashFlowForecaster::new(timeline).forecast(pl, bs, assumptions)
}

/// Checks Net Cash Flow == Operating + Investing + Financing in every period.
pub fn verify_cash_flow_identity(cf: &Statement, tolerance: f64) -> Result<()> {
    cf.expect_kind(StatementKind::CashFlow)?;
    let operating = cf.line(LineItem::OperatingCashFlow)?;
    let investing = cf.line(LineItem::InvestingCashFlow)?;
    let financing = cf.line(LineItem::FinancingCashFlow)?;
    let net = cf.line(LineItem::NetCashFlow)?;

    for (idx, period) in cf.periods().iter().enumerate() {
        if !approx_eq(net[idx], operating[idx] + investing[idx] + financing[idx], tolerance) {
            return Err(ForecastError::CashFlowIdentityViolation {
                period: period.label.clone(),
                net: net[idx],
                operating: operating[idx],
                investing: investing[idx],
                financing: financing[idx],
            });
        }
    }

    Ok(())
}

/// Checks that each forecast period's net cash flow equals the movement in
/// the balance sheet's Cash line. Holds whenever the anchor balance sheet
/// itself balances.
pub fn reconcile_cash(bs: &Statement, cf: &Statement, tolerance: f64) -> Result<()> {
    bs.expect_kind(StatementKind::BalanceSheet)?;
    cf.expect_kind(StatementKind::CashFlow)?;
    if bs.periods() != cf.periods() {
        return Err(ForecastError::TimelineMismatch {
            statement: StatementKind::CashFlow,
            expected: bs.period_labels(),
            actual: cf.period_labels(),
        });
    }

    let cash = bs.line(LineItem::Cash)?;
    let net = cf.line(LineItem::NetCashFlow)?;

    for period in cf.periods().iter().skip(1) {
        let i = period.index;
        let change_in_cash = cash[i] - cash[i - 1];
        if !approx_eq(net[i], change_in_cash, tolerance) {
            return Err(ForecastError::CashReconciliationViolation {
                period: period.label.clone(),
                net_cash_flow: net[i],
                change_in_cash,
            });
        }
    }

    Ok(())
}
