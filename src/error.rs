use crate::statement::{LineItem, StatementKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Cannot generate {requested}: {} forecast must be generated first", join_kinds(.missing))]
    MissingUpstream {
        requested: StatementKind,
        missing: Vec<StatementKind>,
    },

    #[error("Invalid assumption '{assumption}'{}: {reason}", period_suffix(.period))]
    InvalidAssumption {
        assumption: String,
        period: Option<String>,
        reason: String,
    },

    #[error("Assumption '{assumption}' has {actual} values, expected one per forecast period ({expected})")]
    AssumptionLength {
        assumption: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid historical value for {line}: {reason}")]
    InvalidHistorical { line: String, reason: String },

    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    #[error("Invalid fiscal year end month {0}: must be between 1 and 12")]
    InvalidFiscalYearEndMonth(u32),

    #[error("Expected a {expected} statement, got {actual}")]
    WrongStatementKind {
        expected: StatementKind,
        actual: StatementKind,
    },

    #[error("{statement} covers periods [{}], expected [{}]", .actual.join(", "), .expected.join(", "))]
    TimelineMismatch {
        statement: StatementKind,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("{statement} has no line item {line}")]
    MissingLineItem {
        statement: StatementKind,
        line: LineItem,
    },

    #[error("{statement} does not carry line item {line}")]
    UnexpectedLineItem {
        statement: StatementKind,
        line: LineItem,
    },

    #[error("{statement} produced a non-finite value for {line} in {period}")]
    NonFiniteValue {
        statement: StatementKind,
        line: LineItem,
        period: String,
    },

    #[error("Accounting equation violation in {period}: Assets ({assets}) != Liabilities ({liabilities}) + Equity ({equity})")]
    AccountingEquationViolation {
        period: String,
        assets: f64,
        liabilities: f64,
        equity: f64,
    },

    #[error("Cash flow identity violation in {period}: Net ({net}) != Operating ({operating}) + Investing ({investing}) + Financing ({financing})")]
    CashFlowIdentityViolation {
        period: String,
        net: f64,
        operating: f64,
        investing: f64,
        financing: f64,
    },

    #[error("Cash reconciliation failure in {period}: net cash flow {net_cash_flow} != change in cash {change_in_cash}")]
    CashReconciliationViolation {
        period: String,
        net_cash_flow: f64,
        change_in_cash: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

fn join_kinds(kinds: &[StatementKind]) -> String {
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" and ")
}

fn period_suffix(period: &Option<String>) -> String {
    match period {
        Some(p) => format!(" for {}", p),
        None => String::new(),
    }
}
