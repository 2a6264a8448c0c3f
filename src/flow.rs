// Per-request signing flow. Fee estimation, validation, and the
// broadcast-or-hardware-sign branch all hang off this state machine; a
// request is never broadcast from any state but Submitting.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::money;
use crate::types::{
    Account, FeeCalculation, FeeEstimate, FeeEstimation, PendingRequest, TransactionPayload,
};
use crate::validators::TransactionFormValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    Idle,
    Estimating,
    ReadyToSign,
    Submitting,
    Broadcast,
    HardwareSignFlow,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowFailure {
    UnsignedTxGenerationFailure,
    #[serde(rename_all = "camelCase")]
    BroadcastFailure { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub sender: String,
    pub public_key: String,
    pub nonce: u64,
    pub fee: Decimal,
    pub serialized_payload: String,
    pub byte_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFlow {
    pub state: FlowState,
    pub fee_estimates: Vec<FeeEstimate>,
    pub fee_calculation: Option<FeeCalculation>,
    pub last_failure: Option<FlowFailure>,
    pub broadcast_txid: Option<String>,
    pub unsigned_tx: Option<UnsignedTransaction>,
}

impl RequestFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
            fee_estimates: Vec::new(),
            fee_calculation: None,
            last_failure: None,
            broadcast_txid: None,
            unsigned_tx: None,
        }
    }

    pub fn begin_estimation(&mut self) {
        self.state = FlowState::Estimating;
    }

    pub fn estimation_resolved(&mut self, estimation: FeeEstimation) {
        self.fee_estimates = estimation.estimates;
        self.fee_calculation = Some(estimation.calculation);
        self.state = FlowState::ReadyToSign;
    }

    // Estimation failure keeps manual fee entry open; the Unknown tier
    // stays selectable with no estimates to show.
    pub fn estimation_failed(&mut self) {
        self.fee_estimates.clear();
        self.fee_calculation = None;
        self.state = FlowState::ReadyToSign;
    }

    pub fn begin_submit(&mut self) -> Result<(), ServiceError> {
        if self.state != FlowState::ReadyToSign {
            return Err(ServiceError::InvalidRequest(format!(
                "Cannot submit from state {:?}",
                self.state
            )));
        }
        self.state = FlowState::Submitting;
        Ok(())
    }

    // The flow stays signable; the failure is recorded so callers can
    // observe it instead of the request silently going nowhere.
    pub fn generation_failed(&mut self) {
        self.last_failure = Some(FlowFailure::UnsignedTxGenerationFailure);
        self.state = FlowState::ReadyToSign;
    }

    pub fn hardware_handoff(&mut self, tx: UnsignedTransaction) {
        self.unsigned_tx = Some(tx);
        self.last_failure = None;
        self.state = FlowState::HardwareSignFlow;
    }

    pub fn broadcast_succeeded(&mut self, txid: String) {
        self.broadcast_txid = Some(txid);
        self.last_failure = None;
        self.state = FlowState::Broadcast;
    }

    pub fn broadcast_failed(&mut self, message: String) {
        self.last_failure = Some(FlowFailure::BroadcastFailure { message });
        self.state = FlowState::Failed;
    }
}

impl Default for RequestFlow {
    fn default() -> Self {
        Self::new()
    }
}

// Fee estimation and hardware signing are keyed by the serialized unsigned
// payload and its byte length.
pub fn serialize_payload(payload: &TransactionPayload) -> Result<(String, usize), ServiceError> {
    let bytes = serde_json::to_vec(payload)
        .map_err(|e| ServiceError::Other(format!("Payload serialization failed: {}", e)))?;
    Ok((hex::encode(&bytes), bytes.len()))
}

// Returns None when the form state cannot produce a signable transaction:
// no usable fee, no nonce, or no key material for the account.
pub fn generate_unsigned_transaction(
    request: &PendingRequest,
    values: &TransactionFormValues,
    account: &Account,
) -> Option<UnsignedTransaction> {
    if account.public_key.is_empty() {
        return None;
    }
    let fee = if values.fee.trim().is_empty() {
        request.payload.fee?
    } else {
        let display = Decimal::from_str(values.fee.trim()).ok()?;
        money::to_base_units(display, money::STX_DECIMALS)?
    };
    if fee.is_sign_negative() {
        return None;
    }
    let nonce = values.nonce?;
    let (serialized_payload, byte_length) = serialize_payload(&request.payload.tx).ok()?;
    Some(UnsignedTransaction {
        sender: account.address.clone(),
        public_key: account.public_key.clone(),
        nonce,
        fee,
        serialized_payload,
        byte_length,
    })
}
