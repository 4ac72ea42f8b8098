//! Ordered, invalidation-aware generation of the three statements.
//!
//! A [`ForecastSession`] keeps at most one snapshot per statement. Each
//! snapshot records the version of every upstream snapshot it was computed
//! from, so a statement is only handed out while the inputs it was built on
//! are still the current ones.

use crate::balance_sheet::BalanceSheetForecaster;
use crate::cash_flow::CashFlowForecaster;
use crate::error::{ForecastError, Result};
use crate::profit_loss::ProfitLossForecaster;
use crate::schema::{
    BalanceSheetAssumptions, BalanceSheetHistory, CashFlowAssumptions, ProfitLossAssumptions,
    ProfitLossHistory, Timeline,
};
use crate::statement::{Statement, StatementKind};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct StatementSnapshot {
    pub statement: Arc<Statement>,
    pub version: u64,
    /// Versions of the upstream snapshots read when this one was generated.
    pub upstream: BTreeMap<StatementKind, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatementStatus {
    /// Every upstream statement is available; this one has not been generated.
    Pending,
    Ready { version: u64 },
    Blocked { missing: Vec<StatementKind> },
}

#[derive(Debug)]
pub struct ForecastSession {
    timeline: Timeline,
    snapshots: BTreeMap<StatementKind, StatementSnapshot>,
    next_version: u64,
}

impl ForecastSession {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            snapshots: BTreeMap::new(),
            next_version: 1,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn generate_profit_loss(
        &mut self,
        historical: &ProfitLossHistory,
        assumptions: &ProfitLossAssumptions,
    ) -> Result<Arc<Statement>> {
        let upstream = self.require(StatementKind::ProfitLoss)?;
        let statement =
            ProfitLossForecaster::new(&self.timeline).forecast(historical, assumptions)?;
        Ok(self.store(StatementKind::ProfitLoss, statement, upstream))
    }

    pub fn generate_balance_sheet(
        &mut self,
        historical: &BalanceSheetHistory,
        assumptions: &BalanceSheetAssumptions,
    ) -> Result<Arc<Statement>> {
        let upstream = self.require(StatementKind::BalanceSheet)?;
        let pl = self.upstream_statement(&upstream, StatementKind::ProfitLoss)?;
        let statement =
            BalanceSheetForecaster::new(&self.timeline).forecast(historical, &pl, assumptions)?;
        Ok(self.store(StatementKind::BalanceSheet, statement, upstream))
    }

    pub fn generate_cash_flow(
        &mut self,
        assumptions: &CashFlowAssumptions,
    ) -> Result<Arc<Statement>> {
        let upstream = self.require(StatementKind::CashFlow)?;
        let pl = self.upstream_statement(&upstream, StatementKind::ProfitLoss)?;
        let bs = self.upstream_statement(&upstream, StatementKind::BalanceSheet)?;
        let statement = CashFlowForecaster::new(&self.timeline).forecast(&pl, &bs, assumptions)?;
        Ok(self.store(StatementKind::CashFlow, statement, upstream))
    }

    /// The current snapshot for `kind`, provided every upstream snapshot it
    /// was built from is still current.
    pub fn snapshot(&self, kind: StatementKind) -> Option<&StatementSnapshot> {
        let snapshot = self.snapshots.get(&kind)?;
        let current = snapshot
            .upstream
            .iter()
            .all(|(dep, version)| matches!(self.snapshot(*dep), Some(s) if s.version == *version));
        current.then_some(snapshot)
    }

    pub fn statement(&self, kind: StatementKind) -> Option<Arc<Statement>> {
        self.snapshot(kind).map(|s| Arc::clone(&s.statement))
    }

    pub fn status(&self, kind: StatementKind) -> StatementStatus {
        if let Some(snapshot) = self.snapshot(kind) {
            return StatementStatus::Ready {
                version: snapshot.version,
            };
        }
        let missing = self.missing_upstream(kind);
        if missing.is_empty() {
            StatementStatus::Pending
        } else {
            StatementStatus::Blocked { missing }
        }
    }

    pub fn missing_upstream(&self, kind: StatementKind) -> Vec<StatementKind> {
        kind.dependencies()
            .iter()
            .copied()
            .filter(|dep| self.snapshot(*dep).is_none())
            .collect()
    }

    /// Drops every snapshot. Version numbers keep increasing across resets.
    pub fn reset(&mut self) {
        info!("Resetting forecast session ({} statements cleared)", self.snapshots.len());
        self.snapshots.clear();
    }

    fn require(&self, requested: StatementKind) -> Result<BTreeMap<StatementKind, u64>> {
        let missing = self.missing_upstream(requested);
        if !missing.is_empty() {
            return Err(ForecastError::MissingUpstream { requested, missing });
        }

        Ok(requested
            .dependencies()
            .iter()
            .filter_map(|dep| self.snapshot(*dep).map(|s| (*dep, s.version)))
            .collect())
    }

    fn upstream_statement(
        &self,
        upstream: &BTreeMap<StatementKind, u64>,
        kind: StatementKind,
    ) -> Result<Arc<Statement>> {
        self.snapshot(kind)
            .filter(|s| upstream.get(&kind) == Some(&s.version))
            .map(|s| Arc::clone(&s.statement))
            .ok_or(ForecastError::MissingUpstream {
                requested: kind,
                missing: vec![kind],
            })
    }

    fn store(
        &mut self,
        kind: StatementKind,
        statement: Statement,
        upstream: BTreeMap<StatementKind, u64>,
    ) -> Arc<Statement> {
        let version = self.next_version;
        self.next_version += 1;

        let statement = Arc::new(statement);
        self.snapshots.insert(
            kind,
            StatementSnapshot {
                statement: Arc::clone(&statement),
                version,
                upstream,
            },
        );
        info!("Generated {} (version {})", kind, version);

        self.discard_dependents(kind);
        statement
    }

    fn discard_dependents(&mut self, kind: StatementKind) {
        let mut pending = kind.dependents();
        while let Some(dependent) = pending.pop() {
            if self.snapshots.remove(&dependent).is_some() {
                debug!("Discarded {} after {} was regenerated", dependent, kind);
            }
            pending.extend(dependent.dependents());
        }
    }
}
