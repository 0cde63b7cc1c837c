//! HTTP client for the ledger gateway.
//!
//! The gateway relays transactions to the ledger and returns their settled
//! receipts. Receipts are reduced to the core's confirmation shape here, so
//! the core never sees raw events. A settled transaction whose events cannot
//! be read is still reported as confirmed.

use crate::config::SyncConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use strictly_ledger::{
    AuthoritativeState, GameId, Ledger, LedgerError, MoveReceipt, TransactionReceipt,
    normalize_move_receipt, started_game_id,
};
use tracing::{debug, error, info, instrument};

#[derive(Debug, Serialize)]
struct MoveRequest {
    column: u8,
    row: u8,
}

/// [`Ledger`] backed by the HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayLedger {
    client: reqwest::Client,
    base_url: String,
    contract_address: String,
    player_identity: String,
}

impl GatewayLedger {
    /// Creates a gateway client from configuration.
    #[instrument(skip(config), fields(gateway = %config.gateway_url()))]
    pub fn new(config: &SyncConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LedgerError::new(format!("Failed to build HTTP client: {}", e)))?;
        info!("Created gateway client");
        Ok(Self {
            client,
            base_url: config.gateway_url().trim_end_matches('/').to_string(),
            contract_address: config.contract_address().clone(),
            player_identity: config.player_identity().clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LedgerError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(error = ?e, "Failed to read gateway response");
            LedgerError::new(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            error!(status = %status, response = %body, "Gateway error");
            return Err(LedgerError::new(format!("Gateway error {}: {}", status, body)));
        }

        debug!(response_length = body.len(), "Parsing gateway response");
        serde_json::from_str(&body).map_err(|e| {
            error!(error = ?e, response = %body, "Failed to parse gateway response");
            LedgerError::new(format!("Failed to parse response: {}", e))
        })
    }
}

#[async_trait::async_trait]
impl Ledger for GatewayLedger {
    #[instrument(skip(self))]
    async fn submit_move(
        &self,
        game_id: GameId,
        column: u8,
        row: u8,
    ) -> Result<MoveReceipt, LedgerError> {
        debug!("Submitting move to gateway");
        let response = self
            .client
            .post(self.url(&format!("/games/{}/moves", game_id)))
            .json(&MoveRequest { column, row })
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Move submission failed");
                LedgerError::new(format!("Move submission failed: {}", e))
            })?;

        let receipt: TransactionReceipt = Self::read(response).await?;
        let normalized = normalize_move_receipt(
            &receipt,
            &self.contract_address,
            &self.player_identity,
            game_id,
        );
        info!(
            confirmed = normalized.transaction_confirmed,
            house_move = ?normalized.house_move,
            unreadable = normalized.unreadable_reply.is_some(),
            warnings = normalized.warnings.len(),
            "Move settled"
        );
        Ok(normalized)
    }

    #[instrument(skip(self))]
    async fn fetch_authoritative_state(
        &self,
        game_id: GameId,
    ) -> Result<AuthoritativeState, LedgerError> {
        let response = self
            .client
            .get(self.url(&format!("/games/{}", game_id)))
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "State query failed");
                LedgerError::new(format!("State query failed: {}", e))
            })?;
        Self::read(response).await
    }

    #[instrument(skip(self))]
    async fn start_game(&self) -> Result<GameId, LedgerError> {
        let response = self
            .client
            .post(self.url("/games"))
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Game start failed");
                LedgerError::new(format!("Game start failed: {}", e))
            })?;
        let receipt: TransactionReceipt = Self::read(response).await?;
        let game_id = started_game_id(&receipt, &self.contract_address)
            .map_err(|e| LedgerError::new(format!("Unreadable receipt: {}", e)))?;
        info!(game_id, "Game started on ledger");
        Ok(game_id)
    }
}
