//! Ledger core: vault accounting, escrow accounting, gate-scan debt
//! amortization, and settlement distribution.
//!
//! One service per entity family, each owning its collection in the
//! `LedgerStore` and exposing only the documented operations. Mutating
//! operations are serialized by the store's connection lock and apply
//! their multi-record writes in a single transaction.

pub mod error;
pub mod escrow;
pub mod scans;
pub mod settlement;
pub mod vaults;

pub use error::{LedgerError, LedgerResult};
pub use escrow::EscrowService;
pub use scans::{EventScanStats, ScanOutcome, ScanService};
pub use settlement::{settlement_split, SettlementService, SettlementSplit, PLATFORM_FEE_BPS};
pub use vaults::{CreateVaultParams, InvestorStats, VaultAnalytics, VaultService};
