//! Ticket catalog: minting, ownership listings, and the purchase flow
//! that feeds escrow.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::models::{new_id, Event, TicketNft, TicketSale, TicketStatus, TicketType};
use crate::store::{collections, LedgerStore};

const MAX_BATCH_MINT: u32 = 10_000;

#[derive(Clone)]
pub struct TicketCatalog {
    store: LedgerStore,
}

impl TicketCatalog {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Mint a batch of tickets for an event. Token ids are assigned
    /// monotonically per event. Tickets start AVAILABLE, held by the
    /// organizer. Returns the minted token ids.
    pub async fn batch_mint(
        &self,
        event_id: &str,
        quantity: u32,
        ticket_type: TicketType,
        price: i64,
        metadata_uri: &str,
    ) -> LedgerResult<Vec<u64>> {
        if quantity == 0 || quantity > MAX_BATCH_MINT {
            return Err(LedgerError::InvariantViolation(format!(
                "mint quantity must be 1-{MAX_BATCH_MINT}"
            )));
        }
        if price <= 0 {
            return Err(LedgerError::InvariantViolation(
                "ticket price must be positive".to_string(),
            ));
        }

        let event_id = event_id.to_string();
        let metadata_uri = metadata_uri.to_string();
        let now = Utc::now();
        let token_ids = self
            .store
            .with_txn(|txn| {
                let event: Event = txn
                    .get(collections::EVENTS, &event_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("event {event_id}")))?;

                let counter = format!("ticket_token_id:{event_id}");
                let mut token_ids = Vec::with_capacity(quantity as usize);
                for _ in 0..quantity {
                    let token_id = txn.next_counter(&counter)? as u64;
                    let ticket = TicketNft {
                        ticket_id: new_id("TKT"),
                        event_id: event_id.clone(),
                        token_id,
                        ticket_type,
                        price,
                        owner_address: event.organizer_id.clone(),
                        status: TicketStatus::Available,
                        metadata_uri: metadata_uri.clone(),
                        minted_at: now,
                    };
                    txn.put(collections::TICKETS, &ticket.ticket_id, &ticket)?;
                    token_ids.push(token_id);
                }
                Ok::<_, LedgerError>(token_ids)
            })
            .await?;

        info!(event_id = %event_id, quantity, "tickets minted");
        Ok(token_ids)
    }

    pub async fn get_ticket(&self, ticket_id: &str) -> LedgerResult<TicketNft> {
        self.store
            .get(collections::TICKETS, ticket_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("ticket {ticket_id}")))
    }

    pub async fn list_tickets_by_event(&self, event_id: &str) -> Result<Vec<TicketNft>> {
        let tickets: Vec<TicketNft> = self.store.list(collections::TICKETS).await?;
        Ok(tickets
            .into_iter()
            .filter(|t| t.event_id == event_id)
            .collect())
    }

    pub async fn list_tickets_by_owner(&self, owner_address: &str) -> Result<Vec<TicketNft>> {
        let tickets: Vec<TicketNft> = self.store.list(collections::TICKETS).await?;
        Ok(tickets
            .into_iter()
            .filter(|t| t.owner_address.eq_ignore_ascii_case(owner_address))
            .collect())
    }

    /// Transfer a ticket to a fan and record the sale. The caller is
    /// responsible for depositing the sale price into the vault's
    /// escrow (see `EscrowService::deposit_from_ticket_sale`).
    pub async fn purchase_ticket(
        &self,
        ticket_id: &str,
        fan_address: &str,
        vault_id: &str,
    ) -> LedgerResult<TicketSale> {
        let ticket_id = ticket_id.to_string();
        let fan_address = fan_address.to_string();
        let vault_id = vault_id.to_string();
        let now = Utc::now();

        self.store
            .with_txn(|txn| {
                let mut ticket: TicketNft = txn
                    .get(collections::TICKETS, &ticket_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("ticket {ticket_id}")))?;
                match ticket.status {
                    TicketStatus::Available | TicketStatus::Listed | TicketStatus::Locked => {}
                    TicketStatus::Owned => {
                        return Err(LedgerError::InvalidState(format!(
                            "ticket {ticket_id} already sold"
                        )));
                    }
                    TicketStatus::Scanned | TicketStatus::Burned => {
                        return Err(LedgerError::InvalidState(format!(
                            "ticket {ticket_id} is no longer purchasable"
                        )));
                    }
                }

                ticket.status = TicketStatus::Owned;
                ticket.owner_address = fan_address.clone();
                txn.put(collections::TICKETS, &ticket.ticket_id, &ticket)?;

                let sale = TicketSale {
                    sale_id: new_id("SAL"),
                    ticket_id: ticket.ticket_id.clone(),
                    fan_address: fan_address.clone(),
                    vault_id: vault_id.clone(),
                    sale_price: ticket.price,
                    purchased_at: now,
                };
                txn.put(collections::SALES, &sale.sale_id, &sale)?;
                Ok::<_, LedgerError>(sale)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventCategory, EventStatus};
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn open_temp_store() -> (LedgerStore, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let store = LedgerStore::open(temp.path().to_str().unwrap()).unwrap();
        (store, temp)
    }

    async fn seed_event(store: &LedgerStore, event_id: &str) {
        let event = Event {
            event_id: event_id.to_string(),
            organizer_id: "USR-org".to_string(),
            name: "Test Night".to_string(),
            venue: "Hall A".to_string(),
            event_date: Utc::now() + Duration::days(30),
            category: EventCategory::Concert,
            total_tickets: 100,
            ticket_price: 400,
            status: EventStatus::Published,
            created_at: Utc::now(),
        };
        store
            .put(collections::EVENTS, event_id, &event)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn batch_mint_assigns_per_event_token_ids() {
        let (store, _temp) = open_temp_store();
        let catalog = TicketCatalog::new(store.clone());
        seed_event(&store, "EVT-1").await;
        seed_event(&store, "EVT-2").await;

        let first = catalog
            .batch_mint("EVT-1", 3, TicketType::Regular, 400, "ipfs://t")
            .await
            .unwrap();
        assert_eq!(first, vec![0, 1, 2]);

        let second = catalog
            .batch_mint("EVT-1", 2, TicketType::Vip, 900, "ipfs://v")
            .await
            .unwrap();
        assert_eq!(second, vec![3, 4]);

        // Independent sequence for another event.
        let other = catalog
            .batch_mint("EVT-2", 2, TicketType::Regular, 400, "ipfs://t")
            .await
            .unwrap();
        assert_eq!(other, vec![0, 1]);

        let tickets = catalog.list_tickets_by_event("EVT-1").await.unwrap();
        assert_eq!(tickets.len(), 5);
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Available));
    }

    #[tokio::test]
    async fn mint_bounds_are_enforced() {
        let (store, _temp) = open_temp_store();
        let catalog = TicketCatalog::new(store.clone());
        seed_event(&store, "EVT-1").await;

        assert!(matches!(
            catalog
                .batch_mint("EVT-1", 0, TicketType::Regular, 400, "ipfs://t")
                .await,
            Err(LedgerError::InvariantViolation(_))
        ));
        assert!(matches!(
            catalog
                .batch_mint("EVT-1", 10_001, TicketType::Regular, 400, "ipfs://t")
                .await,
            Err(LedgerError::InvariantViolation(_))
        ));
        assert!(matches!(
            catalog
                .batch_mint("EVT-1", 1, TicketType::Regular, 0, "ipfs://t")
                .await,
            Err(LedgerError::InvariantViolation(_))
        ));
        assert!(matches!(
            catalog
                .batch_mint("EVT-none", 1, TicketType::Regular, 400, "ipfs://t")
                .await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn purchase_transfers_ownership_and_records_sale() {
        let (store, _temp) = open_temp_store();
        let catalog = TicketCatalog::new(store.clone());
        seed_event(&store, "EVT-1").await;
        catalog
            .batch_mint("EVT-1", 1, TicketType::Regular, 400, "ipfs://t")
            .await
            .unwrap();
        let ticket = catalog.list_tickets_by_event("EVT-1").await.unwrap()[0].clone();

        let sale = catalog
            .purchase_ticket(&ticket.ticket_id, "0xfan", "VLT-1")
            .await
            .unwrap();
        assert_eq!(sale.sale_price, 400);
        assert_eq!(sale.vault_id, "VLT-1");

        let owned = catalog.get_ticket(&ticket.ticket_id).await.unwrap();
        assert_eq!(owned.status, TicketStatus::Owned);
        assert_eq!(owned.owner_address, "0xfan");

        let mine = catalog.list_tickets_by_owner("0xFAN").await.unwrap();
        assert_eq!(mine.len(), 1);

        // A sold ticket cannot be sold again.
        let resold = catalog
            .purchase_ticket(&ticket.ticket_id, "0xother", "VLT-1")
            .await;
        assert!(matches!(resold, Err(LedgerError::InvalidState(_))));
    }
}
