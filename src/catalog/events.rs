//! Event catalog: metadata the ledger reads (ticket price, ticket
//! counts, event-to-vault association) plus sale statistics.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::models::{new_id, Event, EventCategory, EventStatus, TicketNft, TicketSale};
use crate::store::{collections, LedgerStore};

pub struct CreateEventParams {
    pub organizer_id: String,
    pub name: String,
    pub venue: String,
    pub event_date: DateTime<Utc>,
    pub category: EventCategory,
    pub total_tickets: u32,
    pub ticket_price: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketSaleStats {
    pub sold: usize,
    pub total: u32,
    pub revenue: i64,
    pub sold_percentage: f64,
}

#[derive(Clone)]
pub struct EventCatalog {
    store: LedgerStore,
}

impl EventCatalog {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    pub async fn create_event(&self, params: CreateEventParams) -> LedgerResult<Event> {
        if params.ticket_price <= 0 {
            return Err(LedgerError::InvariantViolation(
                "ticket price must be positive".to_string(),
            ));
        }
        if params.total_tickets == 0 {
            return Err(LedgerError::InvariantViolation(
                "event must have at least one ticket".to_string(),
            ));
        }

        let event = Event {
            event_id: new_id("EVT"),
            organizer_id: params.organizer_id,
            name: params.name,
            venue: params.venue,
            event_date: params.event_date,
            category: params.category,
            total_tickets: params.total_tickets,
            ticket_price: params.ticket_price,
            status: EventStatus::Draft,
            created_at: Utc::now(),
        };
        self.store
            .put(collections::EVENTS, &event.event_id, &event)
            .await?;
        info!(event_id = %event.event_id, name = %event.name, "event created");
        Ok(event)
    }

    pub async fn get_event(&self, event_id: &str) -> LedgerResult<Event> {
        self.store
            .get(collections::EVENTS, event_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("event {event_id}")))
    }

    pub async fn list_events(&self) -> Result<Vec<Event>> {
        self.store.list(collections::EVENTS).await
    }

    pub async fn list_events_by_organizer(&self, organizer_id: &str) -> Result<Vec<Event>> {
        let events: Vec<Event> = self.store.list(collections::EVENTS).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.organizer_id == organizer_id)
            .collect())
    }

    pub async fn update_event_status(
        &self,
        event_id: &str,
        status: EventStatus,
    ) -> LedgerResult<Event> {
        let event_id = event_id.to_string();
        self.store
            .with_txn(|txn| {
                let mut event: Event = txn
                    .get(collections::EVENTS, &event_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("event {event_id}")))?;
                event.status = status;
                txn.put(collections::EVENTS, &event_id, &event)?;
                Ok::<_, LedgerError>(event)
            })
            .await
    }

    /// Real sale statistics for an event, derived from the sale audit
    /// records rather than from the ticket statuses.
    pub async fn ticket_sale_stats(&self, event_id: &str) -> LedgerResult<TicketSaleStats> {
        let event = self.get_event(event_id).await?;
        let tickets: Vec<TicketNft> = self.store.list(collections::TICKETS).await?;
        let sales: Vec<TicketSale> = self.store.list(collections::SALES).await?;

        let event_ticket_ids: HashSet<&str> = tickets
            .iter()
            .filter(|t| t.event_id == event_id)
            .map(|t| t.ticket_id.as_str())
            .collect();
        let event_sales: Vec<&TicketSale> = sales
            .iter()
            .filter(|s| event_ticket_ids.contains(s.ticket_id.as_str()))
            .collect();

        let sold = event_sales.len();
        let revenue: i64 = event_sales.iter().map(|s| s.sale_price).sum();
        let sold_percentage = if event.total_tickets > 0 {
            sold as f64 / event.total_tickets as f64 * 100.0
        } else {
            0.0
        };

        Ok(TicketSaleStats {
            sold,
            total: event.total_tickets,
            revenue,
            sold_percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn open_temp_store() -> (LedgerStore, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let store = LedgerStore::open(temp.path().to_str().unwrap()).unwrap();
        (store, temp)
    }

    fn params(organizer: &str) -> CreateEventParams {
        CreateEventParams {
            organizer_id: organizer.to_string(),
            name: "Summer Fest".to_string(),
            venue: "Riverside".to_string(),
            event_date: Utc::now() + Duration::days(60),
            category: EventCategory::Festival,
            total_tickets: 500,
            ticket_price: 400,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_event() {
        let (store, _temp) = open_temp_store();
        let catalog = EventCatalog::new(store);

        let event = catalog.create_event(params("USR-org")).await.unwrap();
        assert_eq!(event.status, EventStatus::Draft);

        let fetched = catalog.get_event(&event.event_id).await.unwrap();
        assert_eq!(fetched.name, "Summer Fest");

        let published = catalog
            .update_event_status(&event.event_id, EventStatus::Published)
            .await
            .unwrap();
        assert_eq!(published.status, EventStatus::Published);

        let mine = catalog.list_events_by_organizer("USR-org").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(catalog
            .list_events_by_organizer("USR-other")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn invalid_event_terms_rejected() {
        let (store, _temp) = open_temp_store();
        let catalog = EventCatalog::new(store);

        let mut bad_price = params("USR-org");
        bad_price.ticket_price = 0;
        assert!(matches!(
            catalog.create_event(bad_price).await,
            Err(LedgerError::InvariantViolation(_))
        ));

        let mut no_tickets = params("USR-org");
        no_tickets.total_tickets = 0;
        assert!(matches!(
            catalog.create_event(no_tickets).await,
            Err(LedgerError::InvariantViolation(_))
        ));

        assert!(matches!(
            catalog.get_event("EVT-missing").await,
            Err(LedgerError::NotFound(_))
        ));
    }
}
