use crate::error::{ForecastError, Result};
use crate::schema::{Period, Timeline};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum StatementKind {
    ProfitLoss,
    BalanceSheet,
    CashFlow,
}

impl StatementKind {
    pub const ALL: [StatementKind; 3] = [
        StatementKind::ProfitLoss,
        StatementKind::BalanceSheet,
        StatementKind::CashFlow,
    ];

    /// Statements whose lines this statement reads.
    pub fn dependencies(self) -> &'static [StatementKind] {
        match self {
            StatementKind::ProfitLoss => &[],
            StatementKind::BalanceSheet => &[StatementKind::ProfitLoss],
            StatementKind::CashFlow => &[StatementKind::ProfitLoss, StatementKind::BalanceSheet],
        }
    }

    /// Statements that read this one directly.
    pub fn dependents(self) -> Vec<StatementKind> {
        Self::ALL
            .into_iter()
            .filter(|k| k.dependencies().contains(&self))
            .collect()
    }

    pub fn line_items(self) -> &'static [LineItem] {
        use LineItem::*;
        match self {
            StatementKind::ProfitLoss => &[
                Revenue,
                Cost,
                GrossProfit,
                SellingExpense,
                AdminExpense,
                FinancialExpense,
                NetProfit,
            ],
            StatementKind::BalanceSheet => &[
                Cash,
                AccountsReceivable,
                Prepayments,
                FixedAssets,
                TotalAssets,
                AccountsPayable,
                CustomerAdvances,
                TotalLiabilities,
                ShareCapital,
                RetainedEarnings,
                TotalEquity,
                TotalLiabilitiesAndEquity,
            ],
            StatementKind::CashFlow => &[
                NetProfit,
                Depreciation,
                ChangeInReceivables,
                ChangeInPrepayments,
                ChangeInPayables,
                ChangeInAdvances,
                OperatingCashFlow,
                CapitalExpenditure,
                InvestingCashFlow,
                FinancingCashFlow,
                NetCashFlow,
            ],
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::ProfitLoss => "P&L",
            StatementKind::BalanceSheet => "Balance Sheet",
            StatementKind::CashFlow => "Cash Flow",
        };
        f.write_str(name)
    }
}

/// Every line the three statements can carry, declared in presentation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum LineItem {
    // Profit & Loss
    Revenue,
    Cost,
    GrossProfit,
    SellingExpense,
    AdminExpense,
    FinancialExpense,
    NetProfit,

    // Balance Sheet
    Cash,
    AccountsReceivable,
    Prepayments,
    FixedAssets,
    TotalAssets,
    AccountsPayable,
    CustomerAdvances,
    TotalLiabilities,
    ShareCapital,
    RetainedEarnings,
    TotalEquity,
    TotalLiabilitiesAndEquity,

    // Cash Flow
    Depreciation,
    ChangeInReceivables,
    ChangeInPrepayments,
    ChangeInPayables,
    ChangeInAdvances,
    OperatingCashFlow,
    CapitalExpenditure,
    InvestingCashFlow,
    FinancingCashFlow,
    NetCashFlow,
}

impl LineItem {
    pub fn label(self) -> &'static str {
        match self {
            LineItem::Revenue => "Revenue(A)",
            LineItem::Cost => "Cost(B)",
            LineItem::GrossProfit => "Gross Profit(A-B)",
            LineItem::SellingExpense => "Selling Expense(C)",
            LineItem::AdminExpense => "Admin Expense(D)",
            LineItem::FinancialExpense => "Financial Expense(E)",
            LineItem::NetProfit => "Net Profit(A-B-C-D-E)",
            LineItem::Cash => "Cash(F)",
            LineItem::AccountsReceivable => "Accounts Receivable(G)",
            LineItem::Prepayments => "Prepayments(H)",
            LineItem::FixedAssets => "Fixed Assets(I)",
            LineItem::TotalAssets => "Total Assets(F+G+H+I)",
            LineItem::AccountsPayable => "Accounts Payable(J)",
            LineItem::CustomerAdvances => "Advances from Customers(K)",
            LineItem::TotalLiabilities => "Total Liabilities(J+K)",
            LineItem::ShareCapital => "Share Capital(L)",
            LineItem::RetainedEarnings => "Retained Earnings(M)",
            LineItem::TotalEquity => "Total Equity(L+M)",
            LineItem::TotalLiabilitiesAndEquity => "Total Liabilities & Equity(J+K+L+M)",
            LineItem::Depreciation => "Depreciation",
            LineItem::ChangeInReceivables => "Change in Receivables",
            LineItem::ChangeInPrepayments => "Change in Prepayments",
            LineItem::ChangeInPayables => "Change in Payables",
            LineItem::ChangeInAdvances => "Change in Advances",
            LineItem::OperatingCashFlow => "Operating Cash Flow(N)",
            LineItem::CapitalExpenditure => "Capital Expenditure",
            LineItem::InvestingCashFlow => "Investing Cash Flow(O)",
            LineItem::FinancingCashFlow => "Financing Cash Flow(P)",
            LineItem::NetCashFlow => "Net Cash Flow(N+O+P)",
        }
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One forecaster's output: named line items, each holding one value per
/// period starting with the historical anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStatement")]
pub struct Statement {
    kind: StatementKind,
    periods: Vec<Period>,
    lines: BTreeMap<LineItem, Vec<f64>>,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn period_labels(&self) -> Vec<String> {
        self.periods.iter().map(|p| p.label.clone()).collect()
    }

    /// Number of forecast periods (the anchor is not counted).
    pub fn horizon(&self) -> usize {
        self.periods.len().saturating_sub(1)
    }

    pub fn lines(&self) -> impl Iterator<Item = (LineItem, &[f64])> {
        self.lines.iter().map(|(item, values)| (*item, values.as_slice()))
    }

    pub fn line(&self, item: LineItem) -> Result<&[f64]> {
        self.lines
            .get(&item)
            .map(Vec::as_slice)
            .ok_or(ForecastError::MissingLineItem {
                statement: self.kind,
                line: item,
            })
    }

    pub fn value(&self, item: LineItem, period: usize) -> Result<f64> {
        let values = self.line(item)?;
        values.get(period).copied().ok_or_else(|| {
            ForecastError::InvalidTimeline(format!(
                "period index {} is outside the {} timeline of {} periods",
                period,
                self.kind,
                values.len()
            ))
        })
    }

    pub fn expect_kind(&self, expected: StatementKind) -> Result<()> {
        if self.kind != expected {
            return Err(ForecastError::WrongStatementKind {
                expected,
                actual: self.kind,
            });
        }
        Ok(())
    }

    /// Upstream statements must cover exactly the timeline being forecast.
    pub fn ensure_timeline(&self, timeline: &Timeline) -> Result<()> {
        if self.periods.as_slice() != timeline.periods() {
            return Err(ForecastError::TimelineMismatch {
                statement: self.kind,
                expected: timeline.labels(),
                actual: self.period_labels(),
            });
        }
        Ok(())
    }
}

/// Builds a statement left to right: every line starts at the anchor and each
/// push appends the next period.
pub(crate) struct StatementBuilder {
    kind: StatementKind,
    periods: Vec<Period>,
    lines: BTreeMap<LineItem, Vec<f64>>,
}

impl StatementBuilder {
    pub(crate) fn new(kind: StatementKind, timeline: &Timeline) -> Self {
        let capacity = timeline.periods().len();
        let lines = kind
            .line_items()
            .iter()
            .map(|item| (*item, Vec::with_capacity(capacity)))
            .collect();

        Self {
            kind,
            periods: timeline.periods().to_vec(),
            lines,
        }
    }

    pub(crate) fn push(&mut self, item: LineItem, value: f64) {
        self.lines.entry(item).or_default().push(value);
    }

    /// The most recently pushed value, i.e. the prior period while a new
    /// period is being computed.
    pub(crate) fn latest(&self, item: LineItem) -> Result<f64> {
        self.lines
            .get(&item)
            .and_then(|values| values.last().copied())
            .ok_or(ForecastError::MissingLineItem {
                statement: self.kind,
                line: item,
            })
    }

    pub(crate) fn finish(self) -> Result<Statement> {
        check_shape(self.kind, &self.periods, &self.lines)?;
        Ok(Statement {
            kind: self.kind,
            periods: self.periods,
            lines: self.lines,
        })
    }
}

/// Wire form of a [`Statement`]; only becomes one after [`check_shape`].
#[derive(Deserialize)]
struct RawStatement {
    kind: StatementKind,
    periods: Vec<Period>,
    lines: BTreeMap<LineItem, Vec<f64>>,
}

impl TryFrom<RawStatement> for Statement {
    type Error = ForecastError;

    fn try_from(raw: RawStatement) -> Result<Self> {
        check_shape(raw.kind, &raw.periods, &raw.lines)?;
        Ok(Statement {
            kind: raw.kind,
            periods: raw.periods,
            lines: raw.lines,
        })
    }
}

/// A statement covers an anchor plus at least one forecast period, indexed
/// in order, and carries exactly its kind's lines with one finite value per
/// period.
fn check_shape(
    kind: StatementKind,
    periods: &[Period],
    lines: &BTreeMap<LineItem, Vec<f64>>,
) -> Result<()> {
    if periods.len() < 2 {
        return Err(ForecastError::InvalidTimeline(format!(
            "{} needs an anchor and at least one forecast period, got {} periods",
            kind,
            periods.len()
        )));
    }
    if let Some((position, period)) = periods
        .iter()
        .enumerate()
        .find(|(position, period)| period.index != *position)
    {
        return Err(ForecastError::InvalidTimeline(format!(
            "{} period {} has index {} at position {}",
            kind, period.label, period.index, position
        )));
    }

    if let Some(item) = lines.keys().find(|item| !kind.line_items().contains(*item)) {
        return Err(ForecastError::UnexpectedLineItem {
            statement: kind,
            line: *item,
        });
    }

    for item in kind.line_items() {
        let values = lines.get(item).ok_or(ForecastError::MissingLineItem {
            statement: kind,
            line: *item,
        })?;

        if values.len() != periods.len() {
            return Err(ForecastError::InvalidTimeline(format!(
                "{} line {} has {} values for {} periods",
                kind,
                item,
                values.len(),
                periods.len()
            )));
        }

        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::NonFiniteValue {
                statement: kind,
                line: *item,
                period: periods[idx].label.clone(),
            });
        }
    }

    Ok(())
}
