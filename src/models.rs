//! Domain records for the event-financing ledger
//!
//! All monetary amounts are i64 minor currency units; yield and fee
//! rates are basis points (10000 bps = 100%). Settlement math stays in
//! integer space so payouts are exact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Generate a prefixed record id, e.g. `VLT-6f9619ff...`
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

// ===== Events =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Published,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    Concert,
    Conference,
    Sports,
    Festival,
    Exhibition,
    Theater,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub organizer_id: String,
    pub name: String,
    pub venue: String,
    pub event_date: DateTime<Utc>,
    pub category: EventCategory,
    pub total_tickets: u32,
    /// Face price per ticket in minor units
    pub ticket_price: i64,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

// ===== Vaults =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaultStatus {
    Funding,
    Active,
    Settled,
    /// Reserved for an out-of-scope liquidation workflow; no operation
    /// transitions into it.
    Defaulted,
}

/// A financing pool collateralized by one event's ticket revenue.
///
/// Invariants maintained by the vault accounting service:
/// - `total_funded <= loan_amount` at all times
/// - `sum(investor_contributions) == total_funded`
/// - `total_released` flips from 0 to `loan_amount` exactly once, when
///   the vault fully funds and transitions FUNDING -> ACTIVE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault {
    pub vault_id: String,
    pub event_id: String,
    pub organizer_address: String,
    pub loan_amount: i64,
    pub yield_rate_bps: u32,
    /// Loan-to-value percentage. Informational; nothing enforces a ceiling.
    pub ltv_ratio: u32,
    /// 0-100. Informational.
    pub risk_score: u32,
    pub status: VaultStatus,
    pub total_funded: i64,
    pub total_released: i64,
    pub debt_remaining: i64,
    pub funding_deadline: DateTime<Utc>,
    pub investors: Vec<String>,
    pub investor_contributions: HashMap<String, i64>,
    pub created_at: DateTime<Utc>,
}

// ===== Investments =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestmentStatus {
    Active,
    /// Reserved terminal statuses; no operation transitions into them.
    Paid,
    Defaulted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub investment_id: String,
    pub investor_address: String,
    pub vault_id: String,
    pub amount: i64,
    /// Principal plus pro-rata yield at the vault's rate.
    pub expected_return: i64,
    pub status: InvestmentStatus,
    pub invested_at: DateTime<Utc>,
    pub paid_out_at: Option<DateTime<Utc>>,
    pub actual_return: Option<i64>,
}

// ===== Tickets =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    Vip,
    Regular,
    EarlyBird,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Available,
    Locked,
    Owned,
    Listed,
    Scanned,
    Burned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketNft {
    pub ticket_id: String,
    pub event_id: String,
    /// Monotonically assigned per event.
    pub token_id: u64,
    pub ticket_type: TicketType,
    pub price: i64,
    pub owner_address: String,
    pub status: TicketStatus,
    pub metadata_uri: String,
    pub minted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSale {
    pub sale_id: String,
    pub ticket_id: String,
    pub fan_address: String,
    pub vault_id: String,
    pub sale_price: i64,
    pub purchased_at: DateTime<Utc>,
}

// ===== Gate scans =====

/// Append-only audit record; at most one per ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketScan {
    pub scan_id: String,
    pub ticket_id: String,
    pub gate_id: String,
    pub scanner_address: String,
    pub scanned_at: DateTime<Utc>,
}

/// Proof-of-attendance artifact minted to the organizer on a
/// successful scan. Token ids are strictly increasing across all
/// attendance records, not scoped per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub attendance_id: String,
    pub scan_id: String,
    pub organizer_id: String,
    pub token_id: u64,
    pub metadata_uri: String,
    pub minted_at: DateTime<Utc>,
}

// ===== Escrow & settlement =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowBalance {
    pub vault_id: String,
    pub balance: i64,
    pub is_settled: bool,
}

impl EscrowBalance {
    pub fn empty(vault_id: &str) -> Self {
        Self {
            vault_id: vault_id.to_string(),
            balance: 0,
            is_settled: false,
        }
    }
}

/// One-shot final distribution of a vault's escrow balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementDistribution {
    pub vault_id: String,
    /// Escrow balance at settlement time, before zeroing.
    pub total_revenue: i64,
    pub investor_payout: i64,
    pub platform_fee: i64,
    pub organizer_payout: i64,
    pub distributed_at: DateTime<Utc>,
}
