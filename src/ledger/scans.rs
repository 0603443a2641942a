//! Gate-scan debt amortizer.
//!
//! A valid scan burns the ticket, mints an attendance record to the
//! organizer, reduces the vault's outstanding debt by the ticket's
//! face value (floored at zero), and appends a scan audit record. All
//! effects commit in one store transaction: a ticket is never left
//! BURNED without its debt reduction.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::models::{
    new_id, AttendanceRecord, Event, TicketNft, TicketScan, TicketStatus, Vault,
};
use crate::store::{collections, LedgerStore};

const ATTENDANCE_TOKEN_COUNTER: &str = "attendance_token_id";

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub scan_id: String,
    pub attendance_token_id: u64,
    pub debt_reduced: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventScanStats {
    pub total_scans: usize,
    pub vault_id: Option<String>,
    pub organizer_address: Option<String>,
}

#[derive(Clone)]
pub struct ScanService {
    store: LedgerStore,
}

impl ScanService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Burn a ticket at the gate. Only an OWNED ticket is scannable;
    /// tickets are single-use. A ticket whose event has no financing
    /// vault cannot be scanned in this model.
    pub async fn scan_ticket(
        &self,
        ticket_id: &str,
        gate_id: &str,
        scanner_address: &str,
        attendance_metadata_uri: Option<String>,
    ) -> LedgerResult<ScanOutcome> {
        let now = Utc::now();
        let ticket_id = ticket_id.to_string();
        let gate_id = gate_id.to_string();
        let scanner_address = scanner_address.to_string();

        let outcome = self
            .store
            .with_txn(|txn| {
                let mut ticket: TicketNft = txn
                    .get(collections::TICKETS, &ticket_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("ticket {ticket_id}")))?;

                match ticket.status {
                    TicketStatus::Owned => {}
                    TicketStatus::Scanned | TicketStatus::Burned => {
                        return Err(LedgerError::AlreadyProcessed(format!(
                            "ticket {ticket_id} already scanned"
                        )));
                    }
                    _ => {
                        return Err(LedgerError::InvalidState(format!(
                            "ticket {ticket_id} is not owned by an attendee"
                        )));
                    }
                }

                let event: Event = txn
                    .get(collections::EVENTS, &ticket.event_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("event {}", ticket.event_id)))?;

                let vaults: Vec<Vault> = txn.list(collections::VAULTS)?;
                let mut vault = vaults
                    .into_iter()
                    .find(|v| v.event_id == ticket.event_id)
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!("no vault for event {}", ticket.event_id))
                    })?;

                ticket.status = TicketStatus::Burned;
                txn.put(collections::TICKETS, &ticket.ticket_id, &ticket)?;

                let token_id = txn.next_counter(ATTENDANCE_TOKEN_COUNTER)? as u64;
                let scan_id = new_id("SCN");
                let attendance = AttendanceRecord {
                    attendance_id: new_id("ATT"),
                    scan_id: scan_id.clone(),
                    organizer_id: event.organizer_id.clone(),
                    token_id,
                    metadata_uri: attendance_metadata_uri
                        .clone()
                        .unwrap_or_else(|| format!("ipfs://attendance/{}", ticket.token_id)),
                    minted_at: now,
                };
                txn.put(
                    collections::ATTENDANCE,
                    &attendance.attendance_id,
                    &attendance,
                )?;

                // Saturating amortization: over-scanning stops at zero.
                let debt_reduced = vault.debt_remaining.min(ticket.price).max(0);
                vault.debt_remaining -= debt_reduced;
                txn.put(collections::VAULTS, &vault.vault_id, &vault)?;

                let scan = TicketScan {
                    scan_id: scan_id.clone(),
                    ticket_id: ticket.ticket_id.clone(),
                    gate_id: gate_id.clone(),
                    scanner_address: scanner_address.clone(),
                    scanned_at: now,
                };
                txn.put(collections::SCANS, &scan.scan_id, &scan)?;

                Ok::<_, LedgerError>(ScanOutcome {
                    scan_id,
                    attendance_token_id: token_id,
                    debt_reduced,
                })
            })
            .await?;

        info!(
            ticket_id = %ticket_id,
            gate_id = %gate_id,
            debt_reduced = outcome.debt_reduced,
            "ticket burned at gate"
        );
        Ok(outcome)
    }

    pub async fn event_scan_stats(&self, event_id: &str) -> Result<EventScanStats> {
        let tickets: Vec<TicketNft> = self.store.list(collections::TICKETS).await?;
        let scans: Vec<TicketScan> = self.store.list(collections::SCANS).await?;
        let vaults: Vec<Vault> = self.store.list(collections::VAULTS).await?;

        let event_ticket_ids: HashSet<&str> = tickets
            .iter()
            .filter(|t| t.event_id == event_id)
            .map(|t| t.ticket_id.as_str())
            .collect();
        let total_scans = scans
            .iter()
            .filter(|s| event_ticket_ids.contains(s.ticket_id.as_str()))
            .count();
        let vault = vaults.iter().find(|v| v.event_id == event_id);

        Ok(EventScanStats {
            total_scans,
            vault_id: vault.map(|v| v.vault_id.clone()),
            organizer_address: vault.map(|v| v.organizer_address.clone()),
        })
    }
}
