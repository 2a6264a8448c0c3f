// Human-readable post-condition summaries for the review screen. Every
// variant is matched exhaustively; a new condition code must show up here
// before it can ship.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::money;
use crate::types::{
    AmountConditionCode, FtMetadata, NonFungibleConditionCode, PostCondition,
    PostConditionPrincipal, TransactionPayload, TransactionRequestPayload,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostConditionSummary {
    pub title: String,
    pub message: String,
    pub amount: Option<String>,
    pub ticker: String,
    pub principal: String,
}

pub fn amount_condition_message(code: AmountConditionCode) -> &'static str {
    match code {
        AmountConditionCode::SentEq => "will transfer exactly",
        AmountConditionCode::SentGt => "will transfer more than",
        AmountConditionCode::SentGe => "will transfer at least",
        AmountConditionCode::SentLt => "will transfer less than",
        AmountConditionCode::SentLe => "will transfer no more than",
    }
}

pub fn non_fungible_condition_message(code: NonFungibleConditionCode) -> &'static str {
    match code {
        NonFungibleConditionCode::Sent => "will transfer",
        NonFungibleConditionCode::NotSent => "will keep",
    }
}

pub fn truncate_middle(value: &str, keep: usize) -> String {
    if value.len() <= keep * 2 {
        return value.to_string();
    }
    format!("{}…{}", &value[..keep], &value[value.len() - keep..])
}

fn principal_address<'a>(
    principal: &'a PostConditionPrincipal,
    current_address: &'a str,
) -> &'a str {
    match principal {
        PostConditionPrincipal::Origin => current_address,
        PostConditionPrincipal::Standard { address } => address,
        PostConditionPrincipal::Contract { address, .. } => address,
    }
}

fn principal_display(principal: &PostConditionPrincipal, current_address: &str) -> String {
    match principal {
        PostConditionPrincipal::Origin => truncate_middle(current_address, 4),
        PostConditionPrincipal::Standard { address } => truncate_middle(address, 4),
        PostConditionPrincipal::Contract {
            address,
            contract_name,
        } => format!("{}.{}", truncate_middle(address, 4), contract_name),
    }
}

fn subject(
    principal: &PostConditionPrincipal,
    current_address: &str,
    request: Option<&TransactionRequestPayload>,
) -> &'static str {
    let address = principal_address(principal, current_address);
    let called_contract = match request.map(|r| &r.tx) {
        Some(TransactionPayload::ContractCall {
            contract_address, ..
        }) => contract_address == address,
        _ => false,
    };
    let is_contract = matches!(principal, PostConditionPrincipal::Contract { .. })
        || called_contract
        || address.contains('.');
    if is_contract {
        "The contract"
    } else if address == current_address {
        "You"
    } else {
        "Another address"
    }
}

pub fn summarize(
    pc: &PostCondition,
    current_address: &str,
    request: Option<&TransactionRequestPayload>,
    metadata: Option<&FtMetadata>,
) -> PostConditionSummary {
    match pc {
        PostCondition::Stx {
            principal,
            code,
            amount,
        } => {
            let display = display_amount(*amount, money::STX_DECIMALS);
            let phrase = amount_condition_message(*code);
            PostConditionSummary {
                title: format!("{} {}", subject(principal, current_address, request), phrase),
                message: format!(
                    "{} {} STX or the transaction will abort.",
                    phrase, display
                ),
                amount: Some(display),
                ticker: "STX".to_string(),
                principal: principal_display(principal, current_address),
            }
        }
        PostCondition::Fungible {
            principal,
            code,
            amount,
            asset,
        } => {
            let decimals = metadata.map(|m| m.decimals).unwrap_or(0);
            let ticker = metadata
                .map(|m| m.symbol.clone())
                .unwrap_or_else(|| asset.asset_name.to_uppercase());
            let display = display_amount(*amount, decimals);
            let phrase = amount_condition_message(*code);
            PostConditionSummary {
                title: format!("{} {}", subject(principal, current_address, request), phrase),
                message: format!(
                    "{} {} {} or the transaction will abort.",
                    phrase, display, ticker
                ),
                amount: Some(display),
                ticker,
                principal: principal_display(principal, current_address),
            }
        }
        PostCondition::NonFungible {
            principal,
            code,
            asset,
            asset_value,
        } => {
            let phrase = non_fungible_condition_message(*code);
            PostConditionSummary {
                title: format!("{} {}", subject(principal, current_address, request), phrase),
                message: format!(
                    "{} {} {} or the transaction will abort.",
                    phrase, asset_value, asset.asset_name
                ),
                amount: None,
                ticker: asset.asset_name.clone(),
                principal: principal_display(principal, current_address),
            }
        }
    }
}

fn display_amount(base: Decimal, decimals: u32) -> String {
    money::to_display_units(base, decimals).normalize().to_string()
}
