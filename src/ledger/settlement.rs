//! Settlement engine: one-shot distribution of a vault's escrowed
//! ticket revenue among investors, the platform, and the organizer.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::models::{EscrowBalance, SettlementDistribution, Vault, VaultStatus};
use crate::store::{collections, LedgerStore};

/// Fixed platform cut of total escrowed revenue.
pub const PLATFORM_FEE_BPS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementSplit {
    pub investor_payout: i64,
    pub platform_fee: i64,
    pub organizer_payout: i64,
}

/// Integer split of settlement proceeds.
///
/// Investors are owed principal plus yield regardless of revenue; the
/// platform takes 3% of revenue; the organizer keeps the residual,
/// floored at zero. A shortfall is a valid outcome, not an error.
/// Returns `None` when the basis-point products overflow the ledger
/// range.
pub fn settlement_split(
    loan_amount: i64,
    yield_rate_bps: u32,
    total_revenue: i64,
) -> Option<SettlementSplit> {
    let yield_amount = loan_amount.checked_mul(yield_rate_bps as i64)? / 10_000;
    let investor_payout = loan_amount.checked_add(yield_amount)?;
    let platform_fee = total_revenue.checked_mul(PLATFORM_FEE_BPS)? / 10_000;
    let organizer_payout = total_revenue
        .checked_sub(investor_payout)
        .and_then(|residual| residual.checked_sub(platform_fee))
        .map_or(0, |residual| residual.max(0));
    Some(SettlementSplit {
        investor_payout,
        platform_fee,
        organizer_payout,
    })
}

#[derive(Clone)]
pub struct SettlementService {
    store: LedgerStore,
}

impl SettlementService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Finalize a vault: compute the split over the current escrow
    /// balance, mark the vault SETTLED with debt forgiven, zero the
    /// escrow, and append the settlement record. Strictly one-shot per
    /// vault; all effects commit in one transaction.
    pub async fn distribute_settlement(
        &self,
        vault_id: &str,
    ) -> LedgerResult<SettlementDistribution> {
        let now = Utc::now();
        let vault_id = vault_id.to_string();

        let settlement = self
            .store
            .with_txn(|txn| {
                let mut vault: Vault = txn
                    .get(collections::VAULTS, &vault_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("vault {vault_id}")))?;
                if vault.status != VaultStatus::Active {
                    return Err(LedgerError::InvalidState(format!(
                        "vault {vault_id} must be ACTIVE to settle"
                    )));
                }

                let mut escrow: EscrowBalance = txn
                    .get(collections::ESCROW, &vault_id)?
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!("no escrow balance for vault {vault_id}"))
                    })?;
                if escrow.is_settled {
                    return Err(LedgerError::AlreadyProcessed(format!(
                        "vault {vault_id} escrow already settled"
                    )));
                }

                let total_revenue = escrow.balance;
                let split = settlement_split(vault.loan_amount, vault.yield_rate_bps, total_revenue)
                    .ok_or_else(|| {
                        LedgerError::InvariantViolation(format!(
                            "settlement arithmetic overflows the ledger range for vault {vault_id}"
                        ))
                    })?;

                vault.status = VaultStatus::Settled;
                // Settlement forgives whatever the amortizer left outstanding.
                vault.debt_remaining = 0;
                txn.put(collections::VAULTS, &vault.vault_id, &vault)?;

                escrow.is_settled = true;
                escrow.balance = 0;
                txn.put(collections::ESCROW, &vault_id, &escrow)?;

                let settlement = SettlementDistribution {
                    vault_id: vault_id.clone(),
                    total_revenue,
                    investor_payout: split.investor_payout,
                    platform_fee: split.platform_fee,
                    organizer_payout: split.organizer_payout,
                    distributed_at: now,
                };
                txn.put(collections::SETTLEMENTS, &vault_id, &settlement)?;
                Ok::<_, LedgerError>(settlement)
            })
            .await?;

        info!(
            vault_id = %settlement.vault_id,
            total_revenue = settlement.total_revenue,
            investor_payout = settlement.investor_payout,
            platform_fee = settlement.platform_fee,
            organizer_payout = settlement.organizer_payout,
            "settlement distributed"
        );
        Ok(settlement)
    }

    pub async fn get_settlement(&self, vault_id: &str) -> Result<Option<SettlementDistribution>> {
        self.store.get(collections::SETTLEMENTS, vault_id).await
    }

    pub async fn list_settlements(&self) -> Result<Vec<SettlementDistribution>> {
        self.store.list(collections::SETTLEMENTS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn open_temp_store() -> (LedgerStore, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let store = LedgerStore::open(temp.path().to_str().unwrap()).unwrap();
        (store, temp)
    }

    async fn seed_active_vault(store: &LedgerStore, vault_id: &str, loan: i64, yield_bps: u32) {
        let vault = Vault {
            vault_id: vault_id.to_string(),
            event_id: "EVT-1".to_string(),
            organizer_address: "0xorganizer".to_string(),
            loan_amount: loan,
            yield_rate_bps: yield_bps,
            ltv_ratio: 70,
            risk_score: 40,
            status: VaultStatus::Active,
            total_funded: loan,
            total_released: loan,
            debt_remaining: loan,
            funding_deadline: Utc::now() + Duration::days(30),
            investors: vec!["0xaaa".to_string()],
            investor_contributions: HashMap::from([("0xaaa".to_string(), loan)]),
            created_at: Utc::now(),
        };
        store
            .put(collections::VAULTS, vault_id, &vault)
            .await
            .unwrap();
    }

    async fn seed_escrow(store: &LedgerStore, vault_id: &str, balance: i64) {
        let escrow = EscrowBalance {
            vault_id: vault_id.to_string(),
            balance,
            is_settled: false,
        };
        store
            .put(collections::ESCROW, vault_id, &escrow)
            .await
            .unwrap();
    }

    #[test]
    fn split_matches_reference_vectors() {
        // loan 10000 at 10% yield, revenue 20000
        let split = settlement_split(10_000, 1_000, 20_000).unwrap();
        assert_eq!(split.investor_payout, 11_000);
        assert_eq!(split.platform_fee, 600);
        assert_eq!(split.organizer_payout, 8_400);

        // Insufficient revenue zeroes the organizer, never negative.
        let short = settlement_split(10_000, 1_000, 10_000).unwrap();
        assert_eq!(short.investor_payout, 11_000);
        assert_eq!(short.platform_fee, 300);
        assert_eq!(short.organizer_payout, 0);
    }

    #[test]
    fn split_with_zero_revenue() {
        let split = settlement_split(1_000, 500, 0).unwrap();
        assert_eq!(split.investor_payout, 1_050);
        assert_eq!(split.platform_fee, 0);
        assert_eq!(split.organizer_payout, 0);
    }

    #[test]
    fn split_rejects_amounts_that_overflow() {
        // Yield product overflows i64.
        assert!(settlement_split(i64::MAX, 10_000, 0).is_none());
        // Fee product overflows i64.
        assert!(settlement_split(1_000, 500, i64::MAX).is_none());
        // The extremes alone are fine.
        assert!(settlement_split(i64::MAX, 0, 0).is_some());
    }

    #[tokio::test]
    async fn settlement_finalizes_vault_and_escrow() {
        let (store, _temp) = open_temp_store();
        let service = SettlementService::new(store.clone());
        seed_active_vault(&store, "VLT-1", 10_000, 1_000).await;
        seed_escrow(&store, "VLT-1", 20_000).await;

        let settlement = service.distribute_settlement("VLT-1").await.unwrap();
        assert_eq!(settlement.total_revenue, 20_000);
        assert_eq!(settlement.investor_payout, 11_000);
        assert_eq!(settlement.platform_fee, 600);
        assert_eq!(settlement.organizer_payout, 8_400);

        let vault: Vault = store
            .get(collections::VAULTS, "VLT-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vault.status, VaultStatus::Settled);
        assert_eq!(vault.debt_remaining, 0, "residual debt is forgiven");

        let escrow: EscrowBalance = store
            .get(collections::ESCROW, "VLT-1")
            .await
            .unwrap()
            .unwrap();
        assert!(escrow.is_settled);
        assert_eq!(escrow.balance, 0);
    }

    #[tokio::test]
    async fn settlement_is_one_shot() {
        let (store, _temp) = open_temp_store();
        let service = SettlementService::new(store.clone());
        seed_active_vault(&store, "VLT-1", 10_000, 1_000).await;
        seed_escrow(&store, "VLT-1", 20_000).await;

        service.distribute_settlement("VLT-1").await.unwrap();
        let second = service.distribute_settlement("VLT-1").await;
        // The vault is SETTLED by then, so the status gate fires first.
        assert!(matches!(second, Err(LedgerError::InvalidState(_))));

        let settlements = service.list_settlements().await.unwrap();
        assert_eq!(settlements.len(), 1);
    }

    #[tokio::test]
    async fn settled_escrow_rejects_even_with_active_vault() {
        let (store, _temp) = open_temp_store();
        let service = SettlementService::new(store.clone());
        seed_active_vault(&store, "VLT-1", 10_000, 1_000).await;
        store
            .put(
                collections::ESCROW,
                "VLT-1",
                &EscrowBalance {
                    vault_id: "VLT-1".to_string(),
                    balance: 0,
                    is_settled: true,
                },
            )
            .await
            .unwrap();

        let result = service.distribute_settlement("VLT-1").await;
        assert!(matches!(result, Err(LedgerError::AlreadyProcessed(_))));
    }

    #[tokio::test]
    async fn non_active_vault_rejected() {
        let (store, _temp) = open_temp_store();
        let service = SettlementService::new(store.clone());
        seed_active_vault(&store, "VLT-1", 10_000, 1_000).await;

        let mut vault: Vault = store
            .get(collections::VAULTS, "VLT-1")
            .await
            .unwrap()
            .unwrap();
        vault.status = VaultStatus::Funding;
        store
            .put(collections::VAULTS, "VLT-1", &vault)
            .await
            .unwrap();
        seed_escrow(&store, "VLT-1", 5_000).await;

        let result = service.distribute_settlement("VLT-1").await;
        assert!(matches!(result, Err(LedgerError::InvalidState(_))));

        let missing = service.distribute_settlement("VLT-nope").await;
        assert!(matches!(missing, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn overflowing_split_aborts_settlement() {
        let (store, _temp) = open_temp_store();
        let service = SettlementService::new(store.clone());
        seed_active_vault(&store, "VLT-1", i64::MAX, 10_000).await;
        seed_escrow(&store, "VLT-1", 500).await;

        let result = service.distribute_settlement("VLT-1").await;
        assert!(matches!(result, Err(LedgerError::InvariantViolation(_))));

        let vault: Vault = store
            .get(collections::VAULTS, "VLT-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vault.status, VaultStatus::Active, "rejection must not mutate");
        let escrow: EscrowBalance = store
            .get(collections::ESCROW, "VLT-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(escrow.balance, 500);
        assert!(!escrow.is_settled);
    }

    #[tokio::test]
    async fn vault_without_escrow_cannot_settle() {
        let (store, _temp) = open_temp_store();
        let service = SettlementService::new(store.clone());
        seed_active_vault(&store, "VLT-1", 10_000, 1_000).await;

        let result = service.distribute_settlement("VLT-1").await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));

        let vault: Vault = store
            .get(collections::VAULTS, "VLT-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vault.status, VaultStatus::Active, "rejection must not mutate");
    }
}
