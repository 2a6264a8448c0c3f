// Domain model shared across the review and send flows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Software,
    Hardware,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    pub btc_address: String,
    pub public_key: String,
    pub wallet_kind: WalletKind,
}

// Amounts are denominated in the asset's smallest unit. A snapshot is
// immutable once fetched; callers re-fetch rather than patch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    pub available: Decimal,
    pub total: Decimal,
    pub symbol: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeType {
    Low,
    Middle,
    High,
    Unknown,
    Sponsored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub fee: Decimal,
    pub tier: FeeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeCalculation {
    Api,
    DefaultSimulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimation {
    pub estimates: Vec<FeeEstimate>,
    pub calculation: FeeCalculation,
}

// The tag values are a fixed contract with requesting sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "txType", rename_all = "snake_case")]
pub enum TransactionPayload {
    #[serde(rename_all = "camelCase")]
    TokenTransfer {
        recipient: String,
        amount: Decimal,
        #[serde(default)]
        memo: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ContractCall {
        contract_address: String,
        contract_name: String,
        function_name: String,
        #[serde(default)]
        function_args: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    SmartContract {
        contract_name: String,
        code_body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequestPayload {
    #[serde(flatten)]
    pub tx: TransactionPayload,
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub sponsored: bool,
    #[serde(default)]
    pub post_conditions: Vec<PostCondition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: String,
    pub origin: Option<String>,
    pub payload: TransactionRequestPayload,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostConditionPrincipal {
    Origin,
    #[serde(rename_all = "camelCase")]
    Standard { address: String },
    #[serde(rename_all = "camelCase")]
    Contract {
        address: String,
        contract_name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountConditionCode {
    SentEq,
    SentGt,
    SentGe,
    SentLt,
    SentLe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFungibleConditionCode {
    Sent,
    NotSent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetId {
    pub contract_address: String,
    pub contract_name: String,
    pub asset_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostCondition {
    #[serde(rename_all = "camelCase")]
    Stx {
        principal: PostConditionPrincipal,
        code: AmountConditionCode,
        amount: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    Fungible {
        principal: PostConditionPrincipal,
        code: AmountConditionCode,
        amount: Decimal,
        asset: AssetId,
    },
    #[serde(rename_all = "camelCase")]
    NonFungible {
        principal: PostConditionPrincipal,
        code: NonFungibleConditionCode,
        asset: AssetId,
        asset_value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractLookup {
    Deployed,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn transaction_payload_uses_the_wire_tag_values() {
        let transfer = TransactionPayload::TokenTransfer {
            recipient: "SP000000000000000000002Q6VF78".to_string(),
            amount: Decimal::from_str("1000000").unwrap(),
            memo: None,
        };
        let json = serde_json::to_value(&transfer).unwrap();
        assert_eq!(json["txType"], "token_transfer");

        let call = TransactionPayload::ContractCall {
            contract_address: "SP000000000000000000002Q6VF78".to_string(),
            contract_name: "pox".to_string(),
            function_name: "stack-stx".to_string(),
            function_args: vec![],
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["txType"], "contract_call");
        assert!(json.get("contractAddress").is_some());

        let deploy = TransactionPayload::SmartContract {
            contract_name: "counter".to_string(),
            code_body: "(define-data-var n int 0)".to_string(),
        };
        let json = serde_json::to_value(&deploy).unwrap();
        assert_eq!(json["txType"], "smart_contract");
    }

    #[test]
    fn request_payload_round_trips_with_envelope_fields() {
        let raw = r#"{
            "txType": "token_transfer",
            "recipient": "SP000000000000000000002Q6VF78",
            "amount": "2500000",
            "sponsored": true,
            "postConditions": []
        }"#;
        let parsed: TransactionRequestPayload = serde_json::from_str(raw).unwrap();
        assert!(parsed.sponsored);
        assert!(parsed.fee.is_none());
        match &parsed.tx {
            TransactionPayload::TokenTransfer { amount, .. } => {
                assert_eq!(*amount, Decimal::from_str("2500000").unwrap());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn amounts_beyond_float_precision_survive_deserialization() {
        let raw = r#"{"txType":"token_transfer","recipient":"SP0","amount":"90071992547409931"}"#;
        let parsed: TransactionRequestPayload = serde_json::from_str(raw).unwrap();
        match &parsed.tx {
            TransactionPayload::TokenTransfer { amount, .. } => {
                assert_eq!(amount.to_string(), "90071992547409931");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
