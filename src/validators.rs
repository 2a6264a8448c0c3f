// Send-form field validation. Each validator is a pure predicate over one
// field value plus its context; schemas compose them and run on submit so
// errors don't flash while the user is still typing.

use std::str::FromStr;

use bitcoin::{Address, Network};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::money;
use crate::types::{AssetBalance, FeeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormChain {
    Bitcoin,
    Stacks,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFormValues {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub fee: String,
    #[serde(default = "default_fee_type")]
    pub fee_type: FeeType,
    #[serde(default)]
    pub nonce: Option<u64>,
}

fn default_fee_type() -> FeeType {
    FeeType::Unknown
}

impl TransactionFormValues {
    pub fn initial_review(next_nonce: Option<u64>) -> Self {
        Self {
            amount: String::new(),
            recipient: String::new(),
            memo: String::new(),
            fee: String::new(),
            fee_type: FeeType::Middle,
            nonce: next_nonce,
        }
    }

}

// An untouched send form: everything empty, fee tier pending estimation.
impl Default for TransactionFormValues {
    fn default() -> Self {
        Self {
            amount: String::new(),
            recipient: String::new(),
            memo: String::new(),
            fee: String::new(),
            fee_type: FeeType::Unknown,
            nonce: None,
        }
    }
}

// ============================================================================
// ADDRESS VALIDATION
// ============================================================================

pub fn validate_bitcoin_address(address: &str, network: Network) -> bool {
    match Address::from_str(address) {
        Ok(parsed) => parsed.network == network,
        Err(_) => false,
    }
}

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

fn c32_value(ch: char) -> Option<u32> {
    let normalized = match ch.to_ascii_uppercase() {
        'O' => '0',
        'L' | 'I' => '1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|&a| a as char == normalized)
        .map(|i| i as u32)
}

fn c32_decode(input: &str) -> Option<Vec<u8>> {
    if input.is_empty() {
        return None;
    }
    let mut out: Vec<u8> = Vec::new();
    let mut carry: u32 = 0;
    let mut carry_bits: u32 = 0;
    for ch in input.chars().rev() {
        carry |= c32_value(ch)? << carry_bits;
        carry_bits += 5;
        while carry_bits >= 8 {
            out.push((carry & 0xff) as u8);
            carry >>= 8;
            carry_bits -= 8;
        }
    }
    if carry > 0 {
        out.push(carry as u8);
    }
    out.reverse();

    // Bit packing leaves high zero bytes; the encoding represents leading
    // zero bytes as explicit '0' characters instead.
    let first_nonzero = out.iter().position(|&b| b != 0).unwrap_or(out.len());
    let significant = out.split_off(first_nonzero);
    let leading_zero_chars = input
        .chars()
        .take_while(|&c| c32_value(c) == Some(0))
        .count();
    let mut bytes = vec![0u8; leading_zero_chars];
    bytes.extend_from_slice(&significant);
    Some(bytes)
}

fn address_checksum(version: u8, hash: &[u8]) -> [u8; 4] {
    let mut preimage = Vec::with_capacity(1 + hash.len());
    preimage.push(version);
    preimage.extend_from_slice(hash);
    let digest = Sha256::digest(Sha256::digest(&preimage));
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&digest[..4]);
    checksum
}

pub fn validate_stacks_address(address: &str) -> bool {
    let Some(rest) = address.strip_prefix('S') else {
        return false;
    };
    let mut chars = rest.chars();
    let Some(version_char) = chars.next() else {
        return false;
    };
    let Some(version) = c32_value(version_char) else {
        return false;
    };
    let data = chars.as_str();
    let Some(decoded) = c32_decode(data) else {
        return false;
    };
    // hash160 plus a 4-byte checksum
    if decoded.len() != 24 {
        return false;
    }
    let (hash, checksum) = decoded.split_at(20);
    let expected = address_checksum(version as u8, hash);
    checksum == &expected[..]
}

// ============================================================================
// FIELD VALIDATORS
// ============================================================================

pub fn validate_recipient(chain: FormChain, address: &str, btc_network: Network) -> Result<(), String> {
    let valid = match chain {
        FormChain::Bitcoin => validate_bitcoin_address(address, btc_network),
        FormChain::Stacks => validate_stacks_address(address),
    };
    if valid {
        Ok(())
    } else {
        match chain {
            FormChain::Bitcoin => Err("Invalid Bitcoin address".to_string()),
            FormChain::Stacks => Err("Invalid Stacks address".to_string()),
        }
    }
}

// Accepts a display-unit string and returns the amount in the asset's
// smallest unit on success.
pub fn validate_amount(raw: &str, balance: &AssetBalance) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Amount is required".to_string());
    }
    let value = Decimal::from_str(trimmed).map_err(|_| "Amount must be a valid number".to_string())?;
    if value.is_sign_negative() {
        return Err("Amount must be positive".to_string());
    }
    if value.is_zero() {
        return Err("Amount must be more than zero".to_string());
    }
    if money::fractional_digits(value) > balance.decimals {
        return Err(format!(
            "{} can only have {} decimal places",
            balance.symbol, balance.decimals
        ));
    }
    let base = money::to_base_units(value, balance.decimals).ok_or_else(|| {
        format!(
            "{} can only have {} decimal places",
            balance.symbol, balance.decimals
        )
    })?;
    if base > balance.available {
        return Err(format!(
            "Insufficient balance. The available balance is {} {}",
            money::to_display_units(balance.available, balance.decimals).normalize(),
            balance.symbol
        ));
    }
    Ok(base)
}

// A fee must leave room for the requested amount. An empty fee with the
// Unknown tier is a valid placeholder while estimation is in flight.
pub fn validate_fee(
    raw_fee: &str,
    fee_type: FeeType,
    amount_base: Decimal,
    balance: &AssetBalance,
) -> Result<Option<Decimal>, String> {
    let trimmed = raw_fee.trim();
    if trimmed.is_empty() {
        if matches!(fee_type, FeeType::Unknown | FeeType::Sponsored) {
            return Ok(None);
        }
        return Err("Fee is required".to_string());
    }
    let value = Decimal::from_str(trimmed).map_err(|_| "Fee must be a valid number".to_string())?;
    if value.is_sign_negative() {
        return Err("Fee cannot be negative".to_string());
    }
    if money::fractional_digits(value) > balance.decimals {
        return Err(format!(
            "Fee can only have {} decimal places",
            balance.decimals
        ));
    }
    let base = money::to_base_units(value, balance.decimals)
        .ok_or_else(|| format!("Fee can only have {} decimal places", balance.decimals))?;
    if base + amount_base > balance.available {
        return Err(format!(
            "Insufficient funds to cover the fee. The available balance is {} {}",
            money::to_display_units(balance.available, balance.decimals).normalize(),
            balance.symbol
        ));
    }
    Ok(Some(base))
}

pub fn validate_nonce(nonce: Option<u64>) -> Result<u64, String> {
    nonce.ok_or_else(|| "Nonce is required".to_string())
}

// ============================================================================
// SCHEMAS
// ============================================================================

pub struct SendFormSchema<'a> {
    pub chain: FormChain,
    pub balance: &'a AssetBalance,
    pub btc_network: Network,
}

impl SendFormSchema<'_> {
    pub fn validate(&self, values: &TransactionFormValues) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Err(message) = validate_recipient(self.chain, &values.recipient, self.btc_network) {
            errors.push(FieldError {
                field: "recipient",
                message,
            });
        }
        let amount_base = match validate_amount(&values.amount, self.balance) {
            Ok(base) => base,
            Err(message) => {
                errors.push(FieldError {
                    field: "amount",
                    message,
                });
                Decimal::ZERO
            }
        };
        if let Err(message) = validate_fee(&values.fee, values.fee_type, amount_base, self.balance) {
            errors.push(FieldError {
                field: "fee",
                message,
            });
        }
        errors
    }
}

pub struct RequestSchema<'a> {
    pub balance: &'a AssetBalance,
}

// Sponsored requests need no fee or nonce from the user, so they carry no
// schema at all.
pub fn request_schema(sponsored: bool, balance: &AssetBalance) -> Option<RequestSchema<'_>> {
    if sponsored {
        None
    } else {
        Some(RequestSchema { balance })
    }
}

impl RequestSchema<'_> {
    pub fn validate(&self, values: &TransactionFormValues, amount_base: Decimal) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if values.fee.trim().is_empty() {
            errors.push(FieldError {
                field: "fee",
                message: "Fee is required".to_string(),
            });
        } else if let Err(message) =
            validate_fee(&values.fee, values.fee_type, amount_base, self.balance)
        {
            errors.push(FieldError {
                field: "fee",
                message,
            });
        }
        if let Err(message) = validate_nonce(values.nonce) {
            errors.push(FieldError {
                field: "nonce",
                message,
            });
        }
        errors
    }
}
