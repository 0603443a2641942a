//! Vault accounting: vault lifecycle, investor contributions, and the
//! auto-disbursement transition when a vault fully funds.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::models::{new_id, Event, Investment, InvestmentStatus, Vault, VaultStatus};
use crate::store::{collections, LedgerStore};

impl Vault {
    /// Record one investor contribution against a FUNDING vault.
    ///
    /// Pure in-memory mutation so the funding rules are testable
    /// without a store; the service persists the result in the same
    /// transaction as the Investment record.
    pub fn apply_contribution(
        &mut self,
        investor_address: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        if self.status != VaultStatus::Funding {
            return Err(LedgerError::InvalidState(format!(
                "vault {} is not accepting funding",
                self.vault_id
            )));
        }
        if now >= self.funding_deadline {
            return Err(LedgerError::InvariantViolation(format!(
                "funding deadline for vault {} has passed",
                self.vault_id
            )));
        }
        if amount <= 0 {
            return Err(LedgerError::InvariantViolation(
                "investment amount must be positive".to_string(),
            ));
        }
        // Over-funding is rejected outright, never truncated. Checked
        // addition so an absurd amount cannot wrap past the cap.
        let new_total = self.total_funded.checked_add(amount).ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "investment amount overflows the ledger range for vault {}",
                self.vault_id
            ))
        })?;
        if new_total > self.loan_amount {
            return Err(LedgerError::InvariantViolation(format!(
                "investment exceeds remaining funding needed for vault {}",
                self.vault_id
            )));
        }

        if !self.investors.iter().any(|a| a == investor_address) {
            self.investors.push(investor_address.to_string());
        }
        // Bounded by the cap check above; each bucket stays <= loan_amount.
        *self
            .investor_contributions
            .entry(investor_address.to_string())
            .or_insert(0) += amount;
        self.total_funded = new_total;
        Ok(())
    }

    /// Explicit FUNDING -> ACTIVE transition. Returns true on the one
    /// call that crosses the threshold; the status guard makes a
    /// second activation impossible.
    pub fn activate_if_funded(&mut self) -> bool {
        if self.status == VaultStatus::Funding && self.total_funded >= self.loan_amount {
            self.status = VaultStatus::Active;
            self.total_released = self.loan_amount;
            true
        } else {
            false
        }
    }

    /// Principal plus pro-rata yield; `None` when the arithmetic would
    /// overflow the ledger range.
    pub fn expected_return_for(&self, amount: i64) -> Option<i64> {
        let yield_amount = amount.checked_mul(self.yield_rate_bps as i64)? / 10_000;
        amount.checked_add(yield_amount)
    }
}

pub struct CreateVaultParams {
    pub event_id: String,
    pub organizer_address: String,
    pub loan_amount: i64,
    pub yield_rate_bps: u32,
    pub ltv_ratio: u32,
    pub risk_score: u32,
    pub funding_deadline: DateTime<Utc>,
}

/// Read-only per-vault aggregation. Derived fields are `None` when the
/// related event is missing rather than failing the whole query.
#[derive(Debug, Clone, Serialize)]
pub struct VaultAnalytics {
    pub vault: Vault,
    pub event: Option<Event>,
    pub funding_progress_pct: f64,
    pub days_until_event: Option<i64>,
    pub projected_roi_bps: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestorStats {
    pub total_invested: i64,
    pub active_investments: usize,
    pub total_returns: i64,
    pub average_roi_pct: f64,
    pub portfolio_value: i64,
}

#[derive(Clone)]
pub struct VaultService {
    store: LedgerStore,
}

impl VaultService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Deploy a new vault for an event. The one-vault-per-event
    /// property is the catalog caller's to uphold; this only validates
    /// the loan terms and that the event exists.
    pub async fn create_vault(&self, params: CreateVaultParams) -> LedgerResult<Vault> {
        if params.loan_amount <= 0 {
            return Err(LedgerError::InvariantViolation(
                "loan amount must be positive".to_string(),
            ));
        }
        let now = Utc::now();
        if params.funding_deadline <= now {
            return Err(LedgerError::InvariantViolation(
                "funding deadline must be in the future".to_string(),
            ));
        }
        let event: Option<Event> = self.store.get(collections::EVENTS, &params.event_id).await?;
        if event.is_none() {
            return Err(LedgerError::NotFound(format!(
                "event {} does not exist",
                params.event_id
            )));
        }

        let vault = Vault {
            vault_id: new_id("VLT"),
            event_id: params.event_id,
            organizer_address: params.organizer_address,
            loan_amount: params.loan_amount,
            yield_rate_bps: params.yield_rate_bps,
            ltv_ratio: params.ltv_ratio,
            risk_score: params.risk_score,
            status: VaultStatus::Funding,
            total_funded: 0,
            total_released: 0,
            debt_remaining: params.loan_amount,
            funding_deadline: params.funding_deadline,
            investors: Vec::new(),
            investor_contributions: HashMap::new(),
            created_at: now,
        };
        self.store
            .put(collections::VAULTS, &vault.vault_id, &vault)
            .await?;
        info!(vault_id = %vault.vault_id, loan_amount = vault.loan_amount, "vault created");
        Ok(vault)
    }

    /// Fund a vault. Appends the Investment record, updates the
    /// contribution map, and runs the auto-disbursement transition, all
    /// in one store transaction.
    pub async fn record_investment(
        &self,
        vault_id: &str,
        investor_address: &str,
        amount: i64,
    ) -> LedgerResult<Investment> {
        let now = Utc::now();
        let vault_id = vault_id.to_string();
        let investor_address = investor_address.to_string();

        let (investment, activated) = self
            .store
            .with_txn(|txn| {
                let mut vault: Vault = txn
                    .get(collections::VAULTS, &vault_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("vault {vault_id}")))?;

                vault.apply_contribution(&investor_address, amount, now)?;
                let activated = vault.activate_if_funded();

                let expected_return = vault.expected_return_for(amount).ok_or_else(|| {
                    LedgerError::InvariantViolation(format!(
                        "expected return overflows the ledger range for vault {vault_id}"
                    ))
                })?;
                let investment = Investment {
                    investment_id: new_id("INV"),
                    investor_address: investor_address.clone(),
                    vault_id: vault_id.clone(),
                    amount,
                    expected_return,
                    status: InvestmentStatus::Active,
                    invested_at: now,
                    paid_out_at: None,
                    actual_return: None,
                };

                txn.put(collections::VAULTS, &vault.vault_id, &vault)?;
                txn.put(
                    collections::INVESTMENTS,
                    &investment.investment_id,
                    &investment,
                )?;
                Ok::<_, LedgerError>((investment, activated))
            })
            .await?;

        if activated {
            info!(
                vault_id = %vault_id,
                "vault fully funded, loan auto-disbursed to organizer"
            );
        }
        Ok(investment)
    }

    pub async fn get_vault(&self, vault_id: &str) -> LedgerResult<Vault> {
        self.store
            .get(collections::VAULTS, vault_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("vault {vault_id}")))
    }

    pub async fn list_vaults(&self) -> Result<Vec<Vault>> {
        self.store.list(collections::VAULTS).await
    }

    pub async fn list_vaults_by_status(&self, status: VaultStatus) -> Result<Vec<Vault>> {
        let vaults: Vec<Vault> = self.store.list(collections::VAULTS).await?;
        Ok(vaults.into_iter().filter(|v| v.status == status).collect())
    }

    pub async fn vault_analytics(&self) -> Result<Vec<VaultAnalytics>> {
        let vaults: Vec<Vault> = self.store.list(collections::VAULTS).await?;
        let events: Vec<Event> = self.store.list(collections::EVENTS).await?;
        let events: HashMap<String, Event> = events
            .into_iter()
            .map(|e| (e.event_id.clone(), e))
            .collect();
        let now = Utc::now();

        Ok(vaults
            .into_iter()
            .map(|vault| {
                let event = events.get(&vault.event_id).cloned();
                let funding_progress_pct = if vault.loan_amount > 0 {
                    vault.total_funded as f64 / vault.loan_amount as f64 * 100.0
                } else {
                    0.0
                };
                let days_until_event = event.as_ref().map(|e| {
                    ((e.event_date - now).num_seconds() as f64 / 86_400.0).ceil() as i64
                });
                VaultAnalytics {
                    projected_roi_bps: vault.yield_rate_bps,
                    vault,
                    event,
                    funding_progress_pct,
                    days_until_event,
                }
            })
            .collect())
    }

    pub async fn list_investments_by_vault(&self, vault_id: &str) -> Result<Vec<Investment>> {
        let investments: Vec<Investment> = self.store.list(collections::INVESTMENTS).await?;
        Ok(investments
            .into_iter()
            .filter(|i| i.vault_id == vault_id)
            .collect())
    }

    pub async fn list_investments_by_investor(
        &self,
        investor_address: &str,
    ) -> Result<Vec<Investment>> {
        let investments: Vec<Investment> = self.store.list(collections::INVESTMENTS).await?;
        Ok(investments
            .into_iter()
            .filter(|i| i.investor_address == investor_address)
            .collect())
    }

    pub async fn investor_stats(&self, investor_address: &str) -> Result<InvestorStats> {
        let investments = self.list_investments_by_investor(investor_address).await?;

        let total_invested: i64 = investments.iter().map(|i| i.amount).sum();
        let active_investments = investments
            .iter()
            .filter(|i| i.status == InvestmentStatus::Active)
            .count();
        let total_returns: i64 = investments.iter().filter_map(|i| i.actual_return).sum();
        let average_roi_pct = if investments.is_empty() {
            0.0
        } else {
            investments
                .iter()
                .map(|i| (i.expected_return - i.amount) as f64 / i.amount as f64 * 100.0)
                .sum::<f64>()
                / investments.len() as f64
        };

        Ok(InvestorStats {
            total_invested,
            active_investments,
            total_returns,
            average_roi_pct,
            portfolio_value: total_invested + total_returns,
        })
    }
}
