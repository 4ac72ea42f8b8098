use crate::error::Result;
use crate::schema::{ProfitLossAssumptions, ProfitLossHistory, Timeline};
use crate::statement::{LineItem, Statement, StatementBuilder, StatementKind};
use crate::utils::{validate_growth_rate, validate_ratio};
use log::{debug, info};

/// Assumptions expanded to one value per forecast period.
struct ResolvedProfitLoss {
    revenue_growth: Vec<f64>,
    cost_ratio: Vec<f64>,
    selling_ratio: Vec<f64>,
    admin_ratio: Vec<f64>,
    financial_ratio: Vec<f64>,
}

pub struct ProfitLossForecaster<'a> {
    timeline: &'a Timeline,
}

impl<'a> ProfitLossForecaster<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self { timeline }
    }

    pub fn forecast(
        &self,
        historical: &ProfitLossHistory,
        assumptions: &ProfitLossAssumptions,
    ) -> Result<Statement> {
        historical.validate()?;
        let resolved = self.resolve(assumptions)?;

        info!(
            "Forecasting P&L over {} periods from {} revenue of {:.2}",
            self.timeline.horizon(),
            self.timeline.anchor().label,
            historical.revenue
        );

        let mut builder = StatementBuilder::new(StatementKind::ProfitLoss, self.timeline);

        builder.push(LineItem::Revenue, historical.revenue);
        builder.push(LineItem::Cost, historical.cost);
        builder.push(LineItem::GrossProfit, historical.gross_profit());
        builder.push(LineItem::SellingExpense, historical.selling_expense);
        builder.push(LineItem::AdminExpense, historical.admin_expense);
        builder.push(LineItem::FinancialExpense, historical.financial_expense);
        builder.push(LineItem::NetProfit, historical.net_profit());

        for (i, period) in self.timeline.forecast_periods().iter().enumerate() {
            let prior_revenue = builder.latest(LineItem::Revenue)?;

            let revenue = prior_revenue * (1.0 + resolved.revenue_growth[i]);
            let cost = revenue * resolved.cost_ratio[i];
            let selling = revenue * resolved.selling_ratio[i];
            let admin = revenue * resolved.admin_ratio[i];
            let financial = revenue * resolved.financial_ratio[i];
            let gross_profit = revenue - cost;
            let net_profit = revenue - cost - selling - admin - financial;

            debug!(
                "{}: revenue {:.2}, gross profit {:.2}, net profit {:.2}",
                period.label, revenue, gross_profit, net_profit
            );

            builder.push(LineItem::Revenue, revenue);
            builder.push(LineItem::Cost, cost);
            builder.push(LineItem::GrossProfit, gross_profit);
            builder.push(LineItem::SellingExpense, selling);
            builder.push(LineItem::AdminExpense, admin);
            builder.push(LineItem::FinancialExpense, financial);
            builder.push(LineItem::NetProfit, net_profit);
        }

        builder.finish()
    }

    fn resolve(&self, assumptions: &ProfitLossAssumptions) -> Result<ResolvedProfitLoss> {
        let timeline = self.timeline;
        Ok(ResolvedProfitLoss {
            revenue_growth: assumptions.revenue_growth.resolve(
                "revenue_growth",
                timeline,
                validate_growth_rate,
            )?,
            cost_ratio: assumptions
                .cost_ratio
                .resolve("cost_ratio", timeline, validate_ratio)?,
            selling_ratio: assumptions
                .selling_ratio
                .resolve("selling_ratio", timeline, validate_ratio)?,
            admin_ratio: assumptions
                .admin_ratio
                .resolve("admin_ratio", timeline, validate_ratio)?,
            financial_ratio: assumptions.financial_ratio.resolve(
                "financial_ratio",
                timeline,
                validate_ratio,
            )?,
        })
    }
}

pub fn forecast_profit_loss(
    timeline: &Timeline,
    historical: &ProfitLossHistory,
    assumptions: &ProfitLossAssumptions,
) -> Result<Statement> {
    ProfitLossForecaster::new(timeline).forecast(historical, assumptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use crate::schema::{ForecastConfig, PeriodAssumption};

    fn reference() -> (Timeline, ProfitLossHistory, ProfitLossAssumptions) {
        let config = ForecastConfig::reference();
        (
            config.timeline().unwrap(),
            config.profit_loss.historical,
            config.profit_loss.assumptions,
        )
    }

    #[test]
    fn test_reference_revenue_path() {
        let (timeline, historical, assumptions) = reference();
        let pl = forecast_profit_loss(&timeline, &historical, &assumptions).unwrap();

        let revenue = pl.line(LineItem::Revenue).unwrap();
        let expected = [1000.0, 1150.0, 1322.5, 1520.875];
        for (actual, expected) in revenue.iter().zip(expected) {
            assert!(
                (actual - expected).abs() < 1e-9,
                "expected {}, got {}",
                expected,
                actual
            );
        }

        let np1 = pl.value(LineItem::NetProfit, 1).unwrap();
        assert!((np1 - 241.5).abs() < 1e-9, "NP[1] should be 241.5, got {}", np1);

        let gp1 = pl.value(LineItem::GrossProfit, 1).unwrap();
        assert!((gp1 - 460.0).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_taken_verbatim() {
        let (timeline, mut historical, assumptions) = reference();
        // A reported net profit that does not follow from the lines above it
        // must still be reproduced exactly.
        historical.net_profit = Some(187.25);
        historical.gross_profit = Some(401.0);

        let pl = forecast_profit_loss(&timeline, &historical, &assumptions).unwrap();
        assert_eq!(pl.value(LineItem::NetProfit, 0).unwrap(), 187.25);
        assert_eq!(pl.value(LineItem::GrossProfit, 0).unwrap(), 401.0);
        assert_eq!(pl.value(LineItem::Revenue, 0).unwrap(), 1000.0);
        assert_eq!(pl.value(LineItem::Cost, 0).unwrap(), 600.0);
    }

    #[test]
    fn test_per_period_assumptions() {
        let (timeline, historical, mut assumptions) = reference();
        assumptions.revenue_growth = PeriodAssumption::PerPeriod(vec![0.10, 0.0, -0.5]);
        assumptions.cost_ratio = PeriodAssumption::PerPeriod(vec![0.5, 0.6, 0.7]);

        let pl = forecast_profit_loss(&timeline, &historical, &assumptions).unwrap();
        let revenue = pl.line(LineItem::Revenue).unwrap();
        assert!((revenue[1] - 1100.0).abs() < 1e-9);
        assert!((revenue[2] - 1100.0).abs() < 1e-9);
        assert!((revenue[3] - 550.0).abs() < 1e-9);

        let cost = pl.line(LineItem::Cost).unwrap();
        assert!((cost[1] - 550.0).abs() < 1e-9);
        assert!((cost[3] - 385.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_wrong_length_sequence() {
        let (timeline, historical, mut assumptions) = reference();
        assumptions.selling_ratio = PeriodAssumption::PerPeriod(vec![0.1, 0.1, 0.1, 0.1]);

        match forecast_profit_loss(&timeline, &historical, &assumptions) {
            Err(ForecastError::AssumptionLength {
                assumption,
                expected,
                actual,
            }) => {
                assert_eq!(assumption, "selling_ratio");
                assert_eq!(expected, 3);
                assert_eq!(actual, 4);
            }
            other => panic!("expected AssumptionLength, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_out_of_bounds_ratio() {
        let (timeline, historical, mut assumptions) = reference();
        assumptions.admin_ratio = PeriodAssumption::PerPeriod(vec![0.07, 1.2, 0.07]);

        match forecast_profit_loss(&timeline, &historical, &assumptions) {
            Err(ForecastError::InvalidAssumption {
                assumption, period, ..
            }) => {
                assert_eq!(assumption, "admin_ratio");
                assert_eq!(period.as_deref(), Some("2025E"));
            }
            other => panic!("expected InvalidAssumption, got {:?}", other),
        }
    }

    #[test]
    fn test_idempotent() {
        let (timeline, historical, assumptions) = reference();
        let first = forecast_profit_loss(&timeline, &historical, &assumptions).unwrap();
        let second = forecast_profit_loss(&timeline, &historical, &assumptions).unwrap();
        assert_eq!(first, second);
    }
}
