// HTTP surface for the review and send flows.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::flow::{self, FlowFailure, FlowState};
use crate::inpage::{InpageEvent, TransactionRequestEventDetails};
use crate::networks::NetworkConfiguration;
use crate::nonce::{self, NextNonce};
use crate::post_conditions;
use crate::state::{current_timestamp, generate_request_id, AppState};
use crate::transaction_error::{self, TransactionErrorInputs, TransactionErrorReason};
use crate::types::{
    Account, ContractLookup, PendingRequest, PostCondition, TransactionPayload,
    TransactionRequestPayload,
};
use crate::validators::{self, FormChain, TransactionFormValues};
use crate::analytics::{
    EVENT_SUBMIT_FEE_FOR_TRANSACTION, EVENT_VIEW_TRANSACTION_SIGNING, INPAGE_CHANNEL,
};

// ============================================================================
// HEALTH & METRICS
// ============================================================================

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "transaction-request-service",
        "version": "2.0.0",
        "status": "healthy",
        "pendingRequests": state.requests.len(),
        "accounts": state.accounts.len(),
        "currentNetwork": state.networks.current_id().await,
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.read().await;
    Json(json!({
        "totalRequests": metrics.total_requests,
        "totalBroadcast": metrics.total_broadcast,
        "totalFailed": metrics.total_failed,
        "totalRejected": metrics.total_rejected,
        "totalExpired": metrics.total_expired,
        "uptime": current_timestamp() - metrics.start_time,
        "pendingRequests": state.requests.len(),
    }))
}

// ============================================================================
// NONCE & BALANCE
// ============================================================================

pub async fn get_nonce_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let network = state.networks.current().await;
    let snapshot = state.chain.account_nonces(&network, &address).await?;
    let pending = state.chain.mempool_transactions(&network, &address).await?;
    // history is only consulted when the snapshot is unavailable
    let confirmed = if snapshot.is_none() {
        state.chain.confirmed_transactions(&network, &address).await?
    } else {
        Vec::new()
    };

    let next = nonce::resolve_next_nonce(snapshot.as_ref(), &confirmed, &pending, &address);
    if let Some(next) = &next {
        info!(
            "[NONCE] Next nonce for {} is {}{}",
            address,
            next.nonce,
            if next.adjusted_for_pending {
                " (raised past pending)"
            } else {
                ""
            }
        );
    }

    Ok(Json(json!({
        "address": address,
        "ready": next.is_some(),
        "nonce": next.map(|n| n.nonce),
        "adjustedForPending": next.map(|n| n.adjusted_for_pending),
    })))
}

pub async fn get_balance_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let network = state.networks.current().await;
    let balance = state.chain.stx_balance(&network, &address).await?;
    Ok(Json(json!({ "address": address, "balance": balance })))
}

// ============================================================================
// TRANSACTION REQUESTS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequestBody {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(flatten)]
    pub detail: TransactionRequestEventDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InpageEventBody {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(flatten)]
    pub event: InpageEvent,
}

pub async fn register_request_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequestBody>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    register_transaction_request(&state, body.origin, &body.detail).await
}

// Inpage events other than transaction requests belong to flows that live
// elsewhere; they are relayed on the bus untouched.
pub async fn inpage_event_handler(
    State(state): State<AppState>,
    Json(body): Json<InpageEventBody>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    match &body.event {
        InpageEvent::TransactionRequest(detail) => {
            register_transaction_request(&state, body.origin, detail).await
        }
        other => {
            let name = other.name().as_str();
            let mut payload = serde_json::to_value(other)
                .map_err(|e| ServiceError::Other(format!("Undecodable event detail: {}", e)))?;
            payload["origin"] = json!(&body.origin);
            state.analytics.publish(INPAGE_CHANNEL, payload).await;
            info!(
                "[INPAGE] Relayed {} from {}",
                name,
                body.origin.as_deref().unwrap_or("<missing origin>")
            );
            Ok(Json(json!({ "accepted": true, "event": name })))
        }
    }
}

async fn register_transaction_request(
    state: &AppState,
    origin: Option<String>,
    detail: &TransactionRequestEventDetails,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let payload: TransactionRequestPayload = serde_json::from_str(&detail.transaction_request)
        .map_err(|e| ServiceError::InvalidRequest(format!("Undecodable request payload: {}", e)))?;

    let id = generate_request_id();
    let request = PendingRequest {
        id: id.clone(),
        origin: origin.clone(),
        payload,
        created_at: current_timestamp(),
    };

    let mut request_flow = flow::RequestFlow::new();
    request_flow.begin_estimation();
    let network = state.networks.current().await;
    match flow::serialize_payload(&request.payload.tx) {
        Ok((payload_hex, byte_length)) => {
            let estimation = state
                .chain
                .fee_estimation(&network, byte_length, &payload_hex)
                .await;
            request_flow.estimation_resolved(estimation);
        }
        Err(e) => {
            warn!("[REVIEW] Fee estimation skipped for {}: {}", id, e);
            request_flow.estimation_failed();
        }
    }

    info!(
        "[REVIEW] Registered request {} from {}",
        id,
        origin.as_deref().unwrap_or("<missing origin>")
    );
    state.requests.insert(id.clone(), request);
    state.flows.insert(id.clone(), request_flow.clone());

    {
        let mut metrics = state.metrics.write().await;
        metrics.total_requests += 1;
    }
    state
        .analytics
        .track(EVENT_VIEW_TRANSACTION_SIGNING, json!({ "origin": origin }))
        .await;

    Ok(Json(json!({ "requestId": id, "flow": request_flow })))
}

async fn expire_if_stale(state: &AppState, id: &str, request: &PendingRequest) -> Result<(), ServiceError> {
    if current_timestamp().saturating_sub(request.created_at) > state.config.request_ttl.as_secs() {
        state.requests.remove(id);
        state.flows.remove(id);
        let mut metrics = state.metrics.write().await;
        metrics.total_expired += 1;
        return Err(ServiceError::NotFound(format!("Request {} has expired", id)));
    }
    Ok(())
}

async fn contract_lookup(
    state: &AppState,
    network: &NetworkConfiguration,
    payload: &TransactionRequestPayload,
) -> Option<ContractLookup> {
    match &payload.tx {
        TransactionPayload::ContractCall {
            contract_address,
            contract_name,
            ..
        } => match state
            .chain
            .contract_interface(network, contract_address, contract_name)
            .await
        {
            Ok(lookup) => Some(lookup),
            Err(e) => {
                warn!("[REVIEW] Contract lookup failed: {}", e);
                None
            }
        },
        _ => None,
    }
}

pub async fn get_request_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let request = state
        .requests
        .get(&id)
        .map(|entry| entry.clone())
        .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", id)))?;
    expire_if_stale(&state, &id, &request).await?;

    let request_flow = state
        .flows
        .get(&id)
        .map(|entry| entry.clone())
        .unwrap_or_default();

    let network = state.networks.current().await;
    let account = state.selected_account().await;

    let balances = match &account {
        Some(account) => match state.chain.stx_balance(&network, &account.address).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("[REVIEW] Balance unavailable for review: {}", e);
                None
            }
        },
        None => None,
    };

    let lookup = contract_lookup(&state, &network, &request.payload).await;

    // re-evaluated on every read; earlier inputs may have changed
    let error = transaction_error::evaluate(&TransactionErrorInputs {
        request: Some(&request.payload),
        origin: request.origin.as_deref(),
        contract_interface: lookup,
        current_account: account.as_ref(),
        balances: balances.as_ref(),
    });

    let next_nonce = match &account {
        Some(account) => next_nonce_for(&state, &network, &account.address).await,
        None => None,
    };

    let mut summaries = Vec::new();
    if let Some(account) = &account {
        for pc in &request.payload.post_conditions {
            let metadata = match pc {
                PostCondition::Fungible { asset, .. } => {
                    let contract_id = format!("{}.{}", asset.contract_address, asset.contract_name);
                    state
                        .chain
                        .ft_metadata(&network, &contract_id)
                        .await
                        .unwrap_or(None)
                }
                _ => None,
            };
            summaries.push(post_conditions::summarize(
                pc,
                &account.address,
                Some(&request.payload),
                metadata.as_ref(),
            ));
        }
    }

    Ok(Json(json!({
        "request": request,
        "flow": request_flow,
        "error": error,
        "nextNonce": next_nonce,
        "postConditions": summaries,
        "initialValues": TransactionFormValues::initial_review(next_nonce.map(|n| n.nonce)),
    })))
}

async fn next_nonce_for(
    state: &AppState,
    network: &NetworkConfiguration,
    address: &str,
) -> Option<NextNonce> {
    let snapshot = match state.chain.account_nonces(network, address).await {
        Ok(snapshot) => snapshot,
        Err(_) => return None,
    };
    let pending = match state.chain.mempool_transactions(network, address).await {
        Ok(pending) => pending,
        Err(_) => return None,
    };
    let confirmed = if snapshot.is_none() {
        match state.chain.confirmed_transactions(network, address).await {
            Ok(confirmed) => confirmed,
            Err(_) => return None,
        }
    } else {
        Vec::new()
    };
    nonce::resolve_next_nonce(snapshot.as_ref(), &confirmed, &pending, address)
}

pub async fn submit_request_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(values): Json<TransactionFormValues>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let request = state
        .requests
        .get(&id)
        .map(|entry| entry.clone())
        .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", id)))?;
    expire_if_stale(&state, &id, &request).await?;

    let account = state
        .selected_account()
        .await
        .ok_or_else(|| ServiceError::InvalidRequest("No account is selected".to_string()))?;
    let network = state.networks.current().await;
    let balances = state.chain.stx_balance(&network, &account.address).await?;

    // A request is never submitted while review still classifies an error.
    let lookup = contract_lookup(&state, &network, &request.payload).await;
    let review = transaction_error::evaluate(&TransactionErrorInputs {
        request: Some(&request.payload),
        origin: request.origin.as_deref(),
        contract_interface: lookup,
        current_account: Some(&account),
        balances: Some(&balances),
    });
    if let Some(reason) = review {
        if reason == TransactionErrorReason::ExpiredRequest {
            return Err(ServiceError::InvalidRequest(
                "The request origin is gone; the request has expired".to_string(),
            ));
        }
        return Err(ServiceError::InvalidRequest(format!(
            "Request failed review: {}",
            reason.as_str()
        )));
    }

    if let Some(schema) = validators::request_schema(request.payload.sponsored, &balances) {
        let amount_base = match &request.payload.tx {
            TransactionPayload::TokenTransfer { amount, .. } => *amount,
            _ => Decimal::ZERO,
        };
        let errors = schema.validate(&values, amount_base);
        if !errors.is_empty() {
            return Ok(Json(json!({
                "success": false,
                "state": FlowState::ReadyToSign,
                "errors": errors,
            })));
        }
    }

    {
        let mut request_flow = state
            .flows
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", id)))?;
        request_flow.begin_submit()?;
    }

    match account.wallet_kind {
        crate::types::WalletKind::Hardware => {
            match flow::generate_unsigned_transaction(&request, &values, &account) {
                None => {
                    if let Some(mut request_flow) = state.flows.get_mut(&id) {
                        request_flow.generation_failed();
                    }
                    warn!("[REVIEW] Unsigned tx generation failed for {}", id);
                    Ok(Json(json!({
                        "success": false,
                        "state": FlowState::ReadyToSign,
                        "failure": FlowFailure::UnsignedTxGenerationFailure,
                    })))
                }
                Some(tx) => {
                    if let Some(mut request_flow) = state.flows.get_mut(&id) {
                        request_flow.hardware_handoff(tx.clone());
                    }
                    info!("[REVIEW] Request {} handed to the hardware signer", id);
                    Ok(Json(json!({
                        "success": true,
                        "state": FlowState::HardwareSignFlow,
                        "unsignedTransaction": tx,
                    })))
                }
            }
        }
        crate::types::WalletKind::Software => {
            let unsigned = match flow::generate_unsigned_transaction(&request, &values, &account) {
                Some(tx) => tx,
                None => {
                    let message = "Failed to generate unsigned transaction".to_string();
                    if let Some(mut request_flow) = state.flows.get_mut(&id) {
                        request_flow.broadcast_failed(message.clone());
                    }
                    let mut metrics = state.metrics.write().await;
                    metrics.total_failed += 1;
                    return Ok(Json(json!({
                        "success": false,
                        "state": FlowState::Failed,
                        "failure": FlowFailure::BroadcastFailure { message },
                    })));
                }
            };

            match state
                .chain
                .broadcast_transaction(&network, &unsigned.serialized_payload)
                .await
            {
                Ok(txid) => {
                    let fee_calculation = {
                        let mut request_flow = state
                            .flows
                            .get_mut(&id)
                            .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", id)))?;
                        request_flow.broadcast_succeeded(txid.clone());
                        request_flow.fee_calculation
                    };
                    {
                        let mut metrics = state.metrics.write().await;
                        metrics.total_broadcast += 1;
                    }
                    state
                        .analytics
                        .track(
                            EVENT_SUBMIT_FEE_FOR_TRANSACTION,
                            json!({
                                "calculation": fee_calculation,
                                "fee": values.fee,
                                "type": values.fee_type,
                            }),
                        )
                        .await;
                    // fulfilled: the request leaves the store
                    state.requests.remove(&id);
                    state.flows.remove(&id);
                    info!("[REVIEW] Request {} broadcast as {}", id, txid);
                    Ok(Json(json!({
                        "success": true,
                        "state": FlowState::Broadcast,
                        "txid": txid,
                    })))
                }
                Err(ServiceError::Broadcast(message)) | Err(ServiceError::Upstream(message)) => {
                    if let Some(mut request_flow) = state.flows.get_mut(&id) {
                        request_flow.broadcast_failed(message.clone());
                    }
                    let mut metrics = state.metrics.write().await;
                    metrics.total_failed += 1;
                    warn!("[REVIEW] Broadcast failed for {}: {}", id, message);
                    Ok(Json(json!({
                        "success": false,
                        "state": FlowState::Failed,
                        "failure": FlowFailure::BroadcastFailure { message },
                    })))
                }
                Err(e) => Err(e),
            }
        }
    }
}

pub async fn reject_request_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    state
        .requests
        .remove(&id)
        .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", id)))?;
    state.flows.remove(&id);
    let mut metrics = state.metrics.write().await;
    metrics.total_rejected += 1;
    info!("[REVIEW] Request {} rejected", id);
    Ok(Json(json!({ "success": true, "requestId": id })))
}

// ============================================================================
// SEND FORM
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFormBody {
    pub chain: FormChain,
    pub sender: String,
    pub values: TransactionFormValues,
}

pub async fn validate_send_form_handler(
    State(state): State<AppState>,
    Json(body): Json<SendFormBody>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let network = state.networks.current().await;
    let balance = match body.chain {
        FormChain::Bitcoin => state.chain.btc_balance(&body.sender).await?,
        FormChain::Stacks => state.chain.stx_balance(&network, &body.sender).await?,
    };

    let schema = validators::SendFormSchema {
        chain: body.chain,
        balance: &balance,
        btc_network: state.config.bitcoin_network,
    };
    let errors = schema.validate(&body.values);
    info!(
        "[SEND-FORM] Validated a {:?} form for {}: {} error(s)",
        body.chain,
        body.sender,
        errors.len()
    );
    Ok(Json(json!({ "valid": errors.is_empty(), "errors": errors })))
}

// ============================================================================
// NETWORKS
// ============================================================================

pub async fn list_networks_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "networks": state.networks.list().await,
        "currentNetworkId": state.networks.current_id().await,
    }))
}

pub async fn add_network_handler(
    State(state): State<AppState>,
    Json(config): Json<NetworkConfiguration>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    if config.id.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(
            "Network id cannot be empty".to_string(),
        ));
    }
    state.networks.add_network(config.clone()).await;
    Ok(Json(json!({ "success": true, "network": config })))
}

#[derive(Debug, Deserialize)]
pub struct ChangeNetworkBody {
    pub id: String,
}

pub async fn change_network_handler(
    State(state): State<AppState>,
    Json(body): Json<ChangeNetworkBody>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let network = state.networks.change_network(&body.id).await?;
    Ok(Json(json!({ "success": true, "network": network })))
}

pub async fn remove_network_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    state.networks.remove_network(&id).await?;
    Ok(Json(json!({
        "success": true,
        "currentNetworkId": state.networks.current_id().await,
    })))
}

// ============================================================================
// ACCOUNTS
// ============================================================================

pub async fn list_accounts_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut accounts: Vec<Account> = state
        .accounts
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    accounts.sort_by(|a, b| a.address.cmp(&b.address));
    let current = state.current_account_address.read().await.clone();
    Json(json!({
        "accounts": accounts,
        "currentAccountAddress": current,
    }))
}

pub async fn add_account_handler(
    State(state): State<AppState>,
    Json(account): Json<Account>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    if !validators::validate_stacks_address(&account.address) {
        return Err(ServiceError::InvalidRequest(format!(
            "{} is not a valid Stacks address",
            account.address
        )));
    }
    let first = state.accounts.is_empty();
    state.accounts.insert(account.address.clone(), account.clone());
    if first {
        let mut current = state.current_account_address.write().await;
        *current = Some(account.address.clone());
    }
    info!("[ACCOUNTS] Added account {}", account.address);
    Ok(Json(json!({ "success": true, "account": account })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectAccountBody {
    pub address: String,
}

pub async fn select_account_handler(
    State(state): State<AppState>,
    Json(body): Json<SelectAccountBody>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    if !state.accounts.contains_key(&body.address) {
        return Err(ServiceError::NotFound(format!(
            "Account {} not found",
            body.address
        )));
    }
    let mut current = state.current_account_address.write().await;
    *current = Some(body.address.clone());
    info!("[ACCOUNTS] Current account is now {}", body.address);
    Ok(Json(json!({ "success": true, "currentAccountAddress": body.address })))
}
