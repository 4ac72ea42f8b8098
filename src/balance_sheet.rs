use crate::error::{ForecastError, Result};
use crate::schema::{BalanceSheetAssumptions, BalanceSheetHistory, Timeline};
use crate::statement::{LineItem, Statement, StatementBuilder, StatementKind};
use crate::utils::{approx_eq, validate_finite, validate_growth_rate, validate_ratio};
use log::{debug, info, warn};

/// Cash is never forecast directly: it is whatever balances the sheet.
pub fn cash_plug(total_liabilities_and_equity: f64, non_cash_assets: f64) -> f64 {
    total_liabilities_and_equity - non_cash_assets
}

struct ResolvedBalanceSheet {
    receivables_ratio: Vec<f64>,
    prepayment_ratio: Vec<f64>,
    payables_ratio: Vec<f64>,
    advance_ratio: Vec<f64>,
    fixed_asset_growth: f64,
    capital_increases: Vec<f64>,
}

pub struct BalanceSheetForecaster<'a> {
    timeline: &'a Timeline,
}

impl<'a> BalanceSheetForecaster<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self { timeline }
    }

    pub fn forecast(
        &self,
        historical: &BalanceSheetHistory,
        pl: &Statement,
        assumptions: &BalanceSheetAssumptions,
    ) -> Result<Statement> {
        pl.expect_kind(StatementKind::ProfitLoss)?;
        pl.ensure_timeline(self.timeline)?;
        historical.validate()?;
        let resolved = self.resolve(assumptions)?;

        let revenue = pl.line(LineItem::Revenue)?;
        let cost = pl.line(LineItem::Cost)?;
        let net_profit = pl.line(LineItem::NetProfit)?;

        info!(
            "Forecasting Balance Sheet over {} periods with Cash as the balancing plug",
            self.timeline.horizon()
        );

        let mut builder = StatementBuilder::new(StatementKind::BalanceSheet, self.timeline);

        builder.push(LineItem::Cash, historical.cash);
        builder.push(LineItem::AccountsReceivable, historical.accounts_receivable);
        builder.push(LineItem::Prepayments, historical.prepayments);
        builder.push(LineItem::FixedAssets, historical.fixed_assets);
        builder.push(LineItem::TotalAssets, historical.total_assets());
        builder.push(LineItem::AccountsPayable, historical.accounts_payable);
        builder.push(LineItem::CustomerAdvances, historical.customer_advances);
        builder.push(LineItem::TotalLiabilities, historical.total_liabilities());
        builder.push(LineItem::ShareCapital, historical.share_capital);
        builder.push(LineItem::RetainedEarnings, historical.retained_earnings);
        builder.push(LineItem::TotalEquity, historical.total_equity());
        builder.push(
            LineItem::TotalLiabilitiesAndEquity,
            historical.total_liabilities_and_equity(),
        );

        for (offset, period) in self.timeline.forecast_periods().iter().enumerate() {
            let i = period.index;

            // Assets
            let receivables = revenue[i] * resolved.receivables_ratio[offset];
            let prepayments = cost[i] * resolved.prepayment_ratio[offset];
            let fixed_assets =
                builder.latest(LineItem::FixedAssets)? * (1.0 + resolved.fixed_asset_growth);

            // Liabilities
            let payables = cost[i] * resolved.payables_ratio[offset];
            let advances = revenue[i] * resolved.advance_ratio[offset];
            let total_liabilities = payables + advances;

            // Equity
            let capital =
                builder.latest(LineItem::ShareCapital)? + resolved.capital_increases[offset];
            let retained_earnings = builder.latest(LineItem::RetainedEarnings)? + net_profit[i];
            let total_equity = capital + retained_earnings;

            let total_liabilities_and_equity = total_liabilities + total_equity;
            let cash = cash_plug(
                total_liabilities_and_equity,
                receivables + prepayments + fixed_assets,
            );

            if cash < 0.0 {
                warn!(
                    "{}: balancing cash is negative ({:.2}); the forecast implies a financing shortfall",
                    period.label, cash
                );
            }
            debug!(
                "{}: cash plug {:.2}, total liabilities & equity {:.2}",
                period.label, cash, total_liabilities_and_equity
            );

            builder.push(LineItem::Cash, cash);
            builder.push(LineItem::AccountsReceivable, receivables);
            builder.push(LineItem::Prepayments, prepayments);
            builder.push(LineItem::FixedAssets, fixed_assets);
            builder.push(LineItem::TotalAssets, total_liabilities_and_equity);
            builder.push(LineItem::AccountsPayable, payables);
            builder.push(LineItem::CustomerAdvances, advances);
            builder.push(LineItem::TotalLiabilities, total_liabilities);
            builder.push(LineItem::ShareCapital, capital);
            builder.push(LineItem::RetainedEarnings, retained_earnings);
            builder.push(LineItem::TotalEquity, total_equity);
            builder.push(
                LineItem::TotalLiabilitiesAndEquity,
                total_liabilities_and_equity,
            );
        }

        builder.finish()
    }

    fn resolve(&self, assumptions: &BalanceSheetAssumptions) -> Result<ResolvedBalanceSheet> {
        let timeline = self.timeline;

        validate_growth_rate("fixed_asset_growth", None, assumptions.fixed_asset_growth)?;

        let horizon = timeline.horizon();
        let mut capital_increases = vec![0.0; horizon];
        for (&index, &amount) in &assumptions.capital_increases {
            if index == 0 || index > horizon {
                return Err(ForecastError::InvalidAssumption {
                    assumption: "capital_increases".to_string(),
                    period: None,
                    reason: format!(
                        "period index {} is not a forecast period (expected 1..={})",
                        index, horizon
                    ),
                });
            }
            let label = timeline.periods()[index].label.as_str();
            validate_finite("capital_increases", Some(label), amount)?;
            capital_increases[index - 1] = amount;
        }

        Ok(ResolvedBalanceSheet {
            receivables_ratio: assumptions.receivables_ratio.resolve(
                "receivables_ratio",
                timeline,
                validate_ratio,
            )?,
            prepayment_ratio: assumptions.prepayment_ratio.resolve(
                "prepayment_ratio",
                timeline,
                validate_ratio,
            )?,
            payables_ratio: assumptions.payables_ratio.resolve(
                "payables_ratio",
                timeline,
                validate_ratio,
            )?,
            advance_ratio: assumptions.advance_ratio.resolve(
                "advance_ratio",
                timeline,
                validate_ratio,
            )?,
            fixed_asset_growth: assumptions.fixed_asset_growth,
            capital_increases,
        })
    }
}

pub fn forecast_balance_sheet(
    timeline: &Timeline,
    historical: &BalanceSheetHistory,
    pl: &Statement,
    assumptions: &BalanceSheetAssumptions,
) -> Result<Statement> {
    BalanceSheetForecaster::new(timeline).forecast(historical, pl, assumptions)
}

/// Checks Total Assets == Total Liabilities + Total Equity in every period.
pub fn verify_accounting_equation(bs: &Statement, tolerance: f64) -> Result<()> {
    bs.expect_kind(StatementKind::BalanceSheet)?;
    let assets = bs.line(LineItem::TotalAssets)?;
    let liabilities = bs.line(LineItem::TotalLiabilities)?;
    let equity = bs.line(LineItem::TotalEquity)?;

    for (idx, period) in bs.periods().iter().enumerate() {
        if !approx_eq(assets[idx], liabilities[idx] + equity[idx], tolerance) {
            return Err(ForecastError::AccountingEquationViolation {
                period: period.label.clone(),
                assets: assets[idx],
                liabilities: liabilities[idx],
                equity: equity[idx],
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profit_loss::forecast_profit_loss;
    use crate::schema::{ForecastConfig, PeriodAssumption};
    use crate::utils::DEFAULT_TOLERANCE;
    use std::collections::BTreeMap;

    fn reference_pl(config: &ForecastConfig, timeline: &Timeline) -> Statement {
        forecast_profit_loss(
            timeline,
            &config.profit_loss.historical,
            &config.profit_loss.assumptions,
        )
        .unwrap()
    }

    #[test]
    fn test_cash_plug() {
        assert_eq!(cash_plug(1500.0, 1450.0), 50.0);
        assert_eq!(cash_plug(100.0, 120.0), -20.0);
    }

    #[test]
    fn test_reference_first_forecast_period() {
        let config = ForecastConfig::reference();
        let timeline = config.timeline().unwrap();
        let pl = reference_pl(&config, &timeline);

        let bs = forecast_balance_sheet(
            &timeline,
            &config.balance_sheet.historical,
            &pl,
            &config.balance_sheet.assumptions,
        )
        .unwrap();

        let close = |item: LineItem, expected: f64| {
            let actual = bs.value(item, 1).unwrap();
            assert!(
                (actual - expected).abs() < 1e-9,
                "{} expected {}, got {}",
                item,
                expected,
                actual
            );
        };

        close(LineItem::AccountsReceivable, 126.5);
        close(LineItem::Prepayments, 6.9);
        close(LineItem::FixedAssets, 19.2);
        close(LineItem::AccountsPayable, 138.0);
        close(LineItem::CustomerAdvances, 11.5);
        close(LineItem::TotalLiabilities, 149.5);
        close(LineItem::ShareCapital, 1658.52);
        close(LineItem::RetainedEarnings, 169.98);
        close(LineItem::TotalEquity, 1828.5);
        close(LineItem::TotalLiabilitiesAndEquity, 1978.0);
        close(LineItem::Cash, 1825.4);
        close(LineItem::TotalAssets, 1978.0);

        // Capital is injected once; later periods carry it forward unchanged.
        let capital = bs.line(LineItem::ShareCapital).unwrap();
        assert_eq!(capital[2], capital[1]);
        assert_eq!(capital[3], capital[1]);
    }

    #[test]
    fn test_anchor_taken_verbatim() {
        let config = ForecastConfig::reference();
        let timeline = config.timeline().unwrap();
        let pl = reference_pl(&config, &timeline);
        let historical = &config.balance_sheet.historical;

        let bs = forecast_balance_sheet(&timeline, historical, &pl, &config.balance_sheet.assumptions)
            .unwrap();

        assert_eq!(bs.value(LineItem::Cash, 0).unwrap(), 1260.0);
        assert_eq!(bs.value(LineItem::ShareCapital, 0).unwrap(), 1333.52);
        assert_eq!(bs.value(LineItem::RetainedEarnings, 0).unwrap(), -71.52);
        assert_eq!(bs.value(LineItem::TotalEquity, 0).unwrap(), 1262.0);
        assert_eq!(bs.value(LineItem::TotalAssets, 0).unwrap(), 1392.0);
    }

    #[test]
    fn test_identity_holds_every_period() {
        let config = ForecastConfig::reference();
        let timeline = config.timeline().unwrap();
        let pl = reference_pl(&config, &timeline);

        let mut assumptions = config.balance_sheet.assumptions.clone();
        assumptions.receivables_ratio = PeriodAssumption::PerPeriod(vec![0.3, 0.9, 0.05]);
        assumptions.capital_increases = BTreeMap::from([(1, 10.0), (3, -400.0)]);

        let bs =
            forecast_balance_sheet(&timeline, &config.balance_sheet.historical, &pl, &assumptions)
                .unwrap();
        verify_accounting_equation(&bs, DEFAULT_TOLERANCE).unwrap();

        let capital = bs.line(LineItem::ShareCapital).unwrap();
        assert!((capital[1] - 1343.52).abs() < 1e-9);
        assert!((capital[2] - 1343.52).abs() < 1e-9);
        assert!((capital[3] - 943.52).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_asset_growth_is_monotonic() {
        let config = ForecastConfig::reference();
        let timeline = config.timeline().unwrap();
        let pl = reference_pl(&config, &timeline);

        let mut low = config.balance_sheet.assumptions.clone();
        low.fixed_asset_growth = 0.10;
        let mut high = low.clone();
        high.fixed_asset_growth = 0.11;

        let bs_low =
            forecast_balance_sheet(&timeline, &config.balance_sheet.historical, &pl, &low).unwrap();
        let bs_high =
            forecast_balance_sheet(&timeline, &config.balance_sheet.historical, &pl, &high).unwrap();

        let fa_low = bs_low.line(LineItem::FixedAssets).unwrap();
        let fa_high = bs_high.line(LineItem::FixedAssets).unwrap();
        assert_eq!(fa_low[0], fa_high[0]);
        for i in 1..=timeline.horizon() {
            assert!(fa_high[i] > fa_low[i]);
        }
    }

    #[test]
    fn test_rejects_capital_increase_outside_horizon() {
        let config = ForecastConfig::reference();
        let timeline = config.timeline().unwrap();
        let pl = reference_pl(&config, &timeline);

        for index in [0, 4] {
            let mut assumptions = config.balance_sheet.assumptions.clone();
            assumptions.capital_increases = BTreeMap::from([(index, 100.0)]);
            let result = forecast_balance_sheet(
                &timeline,
                &config.balance_sheet.historical,
                &pl,
                &assumptions,
            );
            assert!(matches!(
                result,
                Err(ForecastError::InvalidAssumption { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_wrong_upstream() {
        let config = ForecastConfig::reference();
        let timeline = config.timeline().unwrap();
        let pl = reference_pl(&config, &timeline);
        let bs = forecast_balance_sheet(
            &timeline,
            &config.balance_sheet.historical,
            &pl,
            &config.balance_sheet.assumptions,
        )
        .unwrap();

        let result = forecast_balance_sheet(
            &timeline,
            &config.balance_sheet.historical,
            &bs,
            &config.balance_sheet.assumptions,
        );
        assert!(matches!(
            result,
            Err(ForecastError::WrongStatementKind { .. })
        ));

        let shorter = Timeline::annual(2023, 12, 2).unwrap();
        let result = forecast_balance_sheet(
            &shorter,
            &config.balance_sheet.historical,
            &pl,
            &config.balance_sheet.assumptions,
        );
        assert!(matches!(result, Err(ForecastError::TimelineMismatch { .. })));
    }

    #[test]
    fn test_accounting_equation_violation() {
        let config = ForecastConfig::reference();
        let timeline = config.timeline().unwrap();
        let pl = reference_pl(&config, &timeline);

        let mut historical = config.balance_sheet.historical.clone();
        historical.total_assets = Some(1400.0);

        let bs = forecast_balance_sheet(&timeline, &historical, &pl, &config.balance_sheet.assumptions)
            .unwrap();

        match verify_accounting_equation(&bs, DEFAULT_TOLERANCE) {
            Err(ForecastError::AccountingEquationViolation { period, .. }) => {
                assert_eq!(period, "2023A");
            }
            other => panic!("expected AccountingEquationViolation, got {:?}", other),
        }
    }
}
