//! HTTP surface over the ledger services.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::{CreateEventParams, EventCatalog, TicketCatalog, TicketSaleStats};
use crate::ledger::{
    CreateVaultParams, EscrowService, EventScanStats, InvestorStats, LedgerError, ScanOutcome,
    ScanService, SettlementService, VaultAnalytics, VaultService,
};
use crate::models::{
    EscrowBalance, Event, EventCategory, Investment, SettlementDistribution, TicketNft,
    TicketSale, TicketType, Vault, VaultStatus,
};
use crate::store::LedgerStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub events: EventCatalog,
    pub tickets: TicketCatalog,
    pub vaults: VaultService,
    pub escrow: EscrowService,
    pub scans: ScanService,
    pub settlement: SettlementService,
}

impl AppState {
    pub fn new(store: LedgerStore) -> Self {
        Self {
            events: EventCatalog::new(store.clone()),
            tickets: TicketCatalog::new(store.clone()),
            vaults: VaultService::new(store.clone()),
            escrow: EscrowService::new(store.clone()),
            scans: ScanService::new(store.clone()),
            settlement: SettlementService::new(store),
        }
    }
}

/// Create the API router
pub fn create_router(store: LedgerStore) -> Router {
    let state = AppState::new(store);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/events", post(create_event).get(list_events))
        .route("/api/events/:id", get(get_event))
        .route(
            "/api/events/:id/tickets",
            post(batch_mint_tickets).get(list_event_tickets),
        )
        .route("/api/events/:id/sales", get(event_sale_stats))
        .route("/api/events/:id/scan-stats", get(event_scan_stats))
        .route("/api/tickets/:id/purchase", post(purchase_ticket))
        .route("/api/owners/:address/tickets", get(list_owner_tickets))
        .route("/api/tickets/:id/scan", post(scan_ticket))
        .route("/api/vaults", post(create_vault).get(list_vaults))
        .route("/api/vaults/analytics", get(vault_analytics))
        .route("/api/vaults/:id", get(get_vault))
        .route(
            "/api/vaults/:id/investments",
            post(record_investment).get(list_vault_investments),
        )
        .route("/api/vaults/:id/escrow", get(get_escrow_balance))
        .route(
            "/api/vaults/:id/settlement",
            post(distribute_settlement).get(get_settlement),
        )
        .route("/api/settlements", get(list_settlements))
        .route("/api/investors/:id/investments", get(list_investor_investments))
        .route("/api/investors/:id/stats", get(investor_stats))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let event = state
        .events
        .create_event(CreateEventParams {
            organizer_id: req.organizer_id,
            name: req.name,
            venue: req.venue,
            event_date: req.event_date,
            category: req.category,
            total_tickets: req.total_tickets,
            ticket_price: req.ticket_price,
        })
        .await?;
    Ok(Json(event))
}

async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.events.list_events().await?))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.events.get_event(&id).await?))
}

async fn batch_mint_tickets(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BatchMintRequest>,
) -> Result<Json<BatchMintResponse>, ApiError> {
    let token_ids = state
        .tickets
        .batch_mint(&id, req.quantity, req.ticket_type, req.price, &req.metadata_uri)
        .await?;
    Ok(Json(BatchMintResponse { token_ids }))
}

async fn list_event_tickets(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TicketNft>>, ApiError> {
    Ok(Json(state.tickets.list_tickets_by_event(&id).await?))
}

async fn event_sale_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TicketSaleStats>, ApiError> {
    Ok(Json(state.events.ticket_sale_stats(&id).await?))
}

async fn event_scan_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventScanStats>, ApiError> {
    Ok(Json(state.scans.event_scan_stats(&id).await?))
}

/// Purchase flow: transfer the ticket, then credit the sale price to
/// the vault's escrow.
async fn purchase_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let sale = state
        .tickets
        .purchase_ticket(&id, &req.fan_address, &req.vault_id)
        .await?;
    let escrow = state
        .escrow
        .deposit_from_ticket_sale(&sale.vault_id, sale.sale_price)
        .await?;
    Ok(Json(PurchaseResponse { sale, escrow }))
}

async fn list_owner_tickets(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<TicketNft>>, ApiError> {
    Ok(Json(state.tickets.list_tickets_by_owner(&address).await?))
}

async fn scan_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanOutcome>, ApiError> {
    let outcome = state
        .scans
        .scan_ticket(
            &id,
            &req.gate_id,
            &req.scanner_address,
            req.attendance_metadata_uri,
        )
        .await?;
    Ok(Json(outcome))
}

async fn create_vault(
    State(state): State<AppState>,
    Json(req): Json<CreateVaultRequest>,
) -> Result<Json<Vault>, ApiError> {
    let vault = state
        .vaults
        .create_vault(CreateVaultParams {
            event_id: req.event_id,
            organizer_address: req.organizer_address,
            loan_amount: req.loan_amount,
            yield_rate_bps: req.yield_rate_bps,
            ltv_ratio: req.ltv_ratio,
            risk_score: req.risk_score,
            funding_deadline: req.funding_deadline,
        })
        .await?;
    Ok(Json(vault))
}

async fn list_vaults(
    State(state): State<AppState>,
    Query(query): Query<VaultsQuery>,
) -> Result<Json<Vec<Vault>>, ApiError> {
    let vaults = match query.status {
        Some(status) => state.vaults.list_vaults_by_status(status).await?,
        None => state.vaults.list_vaults().await?,
    };
    Ok(Json(vaults))
}

async fn vault_analytics(
    State(state): State<AppState>,
) -> Result<Json<Vec<VaultAnalytics>>, ApiError> {
    Ok(Json(state.vaults.vault_analytics().await?))
}

async fn get_vault(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vault>, ApiError> {
    Ok(Json(state.vaults.get_vault(&id).await?))
}

async fn record_investment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InvestRequest>,
) -> Result<Json<Investment>, ApiError> {
    let investment = state
        .vaults
        .record_investment(&id, &req.investor_address, req.amount)
        .await?;
    Ok(Json(investment))
}

async fn list_vault_investments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Investment>>, ApiError> {
    Ok(Json(state.vaults.list_investments_by_vault(&id).await?))
}

async fn get_escrow_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EscrowBalance>, ApiError> {
    Ok(Json(state.escrow.get_balance(&id).await?))
}

async fn distribute_settlement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SettlementDistribution>, ApiError> {
    Ok(Json(state.settlement.distribute_settlement(&id).await?))
}

async fn get_settlement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SettlementDistribution>, ApiError> {
    state
        .settlement
        .get_settlement(&id)
        .await
        .map_err(ApiError::from)?
        .map(Json)
        .ok_or_else(|| ApiError::from(LedgerError::NotFound(format!("settlement for vault {id}"))))
}

async fn list_settlements(
    State(state): State<AppState>,
) -> Result<Json<Vec<SettlementDistribution>>, ApiError> {
    Ok(Json(state.settlement.list_settlements().await?))
}

async fn list_investor_investments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Investment>>, ApiError> {
    Ok(Json(state.vaults.list_investments_by_investor(&id).await?))
}

async fn investor_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvestorStats>, ApiError> {
    Ok(Json(state.vaults.investor_stats(&id).await?))
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct CreateEventRequest {
    organizer_id: String,
    name: String,
    venue: String,
    event_date: DateTime<Utc>,
    category: EventCategory,
    total_tickets: u32,
    ticket_price: i64,
}

#[derive(Deserialize)]
struct BatchMintRequest {
    quantity: u32,
    ticket_type: TicketType,
    price: i64,
    metadata_uri: String,
}

#[derive(Serialize)]
struct BatchMintResponse {
    token_ids: Vec<u64>,
}

#[derive(Deserialize)]
struct PurchaseRequest {
    fan_address: String,
    vault_id: String,
}

#[derive(Serialize)]
struct PurchaseResponse {
    sale: TicketSale,
    escrow: EscrowBalance,
}

#[derive(Deserialize)]
struct ScanRequest {
    gate_id: String,
    scanner_address: String,
    attendance_metadata_uri: Option<String>,
}

#[derive(Deserialize)]
struct CreateVaultRequest {
    event_id: String,
    organizer_address: String,
    loan_amount: i64,
    yield_rate_bps: u32,
    ltv_ratio: u32,
    risk_score: u32,
    funding_deadline: DateTime<Utc>,
}

#[derive(Deserialize)]
struct InvestRequest {
    investor_address: String,
    amount: i64,
}

#[derive(Deserialize)]
struct VaultsQuery {
    status: Option<VaultStatus>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ===== Error Handling =====

#[derive(Debug)]
pub struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(LedgerError::Storage(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            LedgerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            LedgerError::InvalidState(msg) | LedgerError::AlreadyProcessed(msg) => {
                (StatusCode::CONFLICT, msg.clone())
            }
            LedgerError::InvariantViolation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
            }
            LedgerError::Storage(err) => {
                tracing::error!("storage error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_convert_to_api_errors() {
        let err = anyhow::anyhow!("disk on fire");
        let api_err: ApiError = err.into();
        assert!(matches!(api_err.0, LedgerError::Storage(_)));
    }
}
