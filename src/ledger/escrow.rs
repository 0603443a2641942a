//! Escrow accounting: per-vault accumulation of ticket-sale revenue.
//!
//! Escrow accumulates independent of vault status; ticket sales may
//! begin before a vault fully funds.

use anyhow::Result;

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::models::EscrowBalance;
use crate::store::{collections, LedgerStore};

#[derive(Clone)]
pub struct EscrowService {
    store: LedgerStore,
}

impl EscrowService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Credit one ticket sale to the vault's escrow, lazily creating
    /// the balance record on first deposit.
    pub async fn deposit_from_ticket_sale(
        &self,
        vault_id: &str,
        amount: i64,
    ) -> LedgerResult<EscrowBalance> {
        if amount <= 0 {
            return Err(LedgerError::InvariantViolation(
                "escrow deposit must be positive".to_string(),
            ));
        }
        let vault_id = vault_id.to_string();
        self.store
            .with_txn(|txn| {
                let mut escrow: EscrowBalance = txn
                    .get(collections::ESCROW, &vault_id)?
                    .unwrap_or_else(|| EscrowBalance::empty(&vault_id));
                escrow.balance = escrow.balance.checked_add(amount).ok_or_else(|| {
                    LedgerError::InvariantViolation(format!(
                        "escrow deposit overflows the balance for vault {vault_id}"
                    ))
                })?;
                txn.put(collections::ESCROW, &vault_id, &escrow)?;
                Ok::<_, LedgerError>(escrow)
            })
            .await
    }

    /// Read-only; a vault with no deposits reads as zero/unsettled
    /// without persisting anything.
    pub async fn get_balance(&self, vault_id: &str) -> Result<EscrowBalance> {
        let escrow: Option<EscrowBalance> = self.store.get(collections::ESCROW, vault_id).await?;
        Ok(escrow.unwrap_or_else(|| EscrowBalance::empty(vault_id)))
    }
}
