// Review-screen error classification. Pure over its snapshot inputs and
// re-evaluated on every read; earlier checks are prerequisites for later
// ones, so the first match wins.

use serde::Serialize;

use crate::money;
use crate::types::{Account, AssetBalance, ContractLookup, TransactionPayload, TransactionRequestPayload};
use crate::validators;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionErrorReason {
    ExpiredRequest,
    Generic,
    InvalidContractAddress,
    NoContract,
    StxTransferInsufficientFunds,
    FeeInsufficientFunds,
}

impl TransactionErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionErrorReason::ExpiredRequest => "ExpiredRequest",
            TransactionErrorReason::Generic => "Generic",
            TransactionErrorReason::InvalidContractAddress => "InvalidContractAddress",
            TransactionErrorReason::NoContract => "NoContract",
            TransactionErrorReason::StxTransferInsufficientFunds => "StxTransferInsufficientFunds",
            TransactionErrorReason::FeeInsufficientFunds => "FeeInsufficientFunds",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionErrorInputs<'a> {
    pub request: Option<&'a TransactionRequestPayload>,
    pub origin: Option<&'a str>,
    pub contract_interface: Option<ContractLookup>,
    pub current_account: Option<&'a Account>,
    pub balances: Option<&'a AssetBalance>,
}

pub fn evaluate(inputs: &TransactionErrorInputs<'_>) -> Option<TransactionErrorReason> {
    if inputs.origin.is_none() {
        return Some(TransactionErrorReason::ExpiredRequest);
    }

    let (Some(request), Some(balances), Some(_account)) =
        (inputs.request, inputs.balances, inputs.current_account)
    else {
        return Some(TransactionErrorReason::Generic);
    };

    if let TransactionPayload::ContractCall {
        contract_address, ..
    } = &request.tx
    {
        if !validators::validate_stacks_address(contract_address) {
            return Some(TransactionErrorReason::InvalidContractAddress);
        }
        if inputs.contract_interface == Some(ContractLookup::NotFound) {
            return Some(TransactionErrorReason::NoContract);
        }
    }

    let zero_balance = balances.available.is_zero();

    if let TransactionPayload::TokenTransfer { amount, .. } = &request.tx {
        if zero_balance {
            return Some(TransactionErrorReason::StxTransferInsufficientFunds);
        }
        if *amount >= balances.available {
            return Some(TransactionErrorReason::StxTransferInsufficientFunds);
        }
    }

    if !request.sponsored {
        if zero_balance {
            return Some(TransactionErrorReason::FeeInsufficientFunds);
        }
        if let Some(fee) = request.fee {
            // Compared in the balance's display denomination; the
            // conversion is a scale shift and stays exact.
            if money::micro_stx_to_stx(fee) >= money::micro_stx_to_stx(balances.available) {
                return Some(TransactionErrorReason::FeeInsufficientFunds);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::STX_DECIMALS;
    use crate::types::WalletKind;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const ORIGIN: &str = "https://app.example.com";

    fn account() -> Account {
        Account {
            address: "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".to_string(),
            btc_address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
            public_key: "02a1633cafcc01ebfb6d78e39f687a1f0995c62fc95f51ead10a02ee0be551b5dc"
                .to_string(),
            wallet_kind: WalletKind::Software,
        }
    }

    fn balance(available: i64) -> AssetBalance {
        AssetBalance {
            available: Decimal::from(available),
            total: Decimal::from(available),
            symbol: "STX".to_string(),
            decimals: STX_DECIMALS,
        }
    }

    fn transfer(amount: i64) -> TransactionRequestPayload {
        TransactionRequestPayload {
            tx: TransactionPayload::TokenTransfer {
                recipient: "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".to_string(),
                amount: Decimal::from(amount),
                memo: None,
            },
            fee: None,
            nonce: None,
            sponsored: false,
            post_conditions: vec![],
        }
    }

    fn contract_call(contract_address: &str) -> TransactionRequestPayload {
        TransactionRequestPayload {
            tx: TransactionPayload::ContractCall {
                contract_address: contract_address.to_string(),
                contract_name: "amm".to_string(),
                function_name: "swap".to_string(),
                function_args: vec![],
            },
            fee: None,
            nonce: None,
            sponsored: false,
            post_conditions: vec![],
        }
    }

    #[test]
    fn missing_origin_always_means_expired() {
        let request = transfer(10);
        let bal = balance(0);
        let acct = account();
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: None,
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(evaluate(&inputs), Some(TransactionErrorReason::ExpiredRequest));
    }

    #[test]
    fn missing_inputs_classify_as_generic() {
        let inputs = TransactionErrorInputs {
            origin: Some(ORIGIN),
            ..Default::default()
        };
        assert_eq!(evaluate(&inputs), Some(TransactionErrorReason::Generic));
    }

    #[test]
    fn malformed_contract_address_wins_over_balance_checks() {
        let request = contract_call("not-a-contract-address");
        let bal = balance(0);
        let acct = account();
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(
            evaluate(&inputs),
            Some(TransactionErrorReason::InvalidContractAddress)
        );
    }

    #[test]
    fn missing_contract_reports_no_contract() {
        let request = contract_call("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7");
        let bal = balance(5_000_000);
        let acct = account();
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: Some(ContractLookup::NotFound),
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(evaluate(&inputs), Some(TransactionErrorReason::NoContract));
    }

    #[test]
    fn zero_balance_transfer_is_insufficient() {
        let request = transfer(10);
        let bal = balance(0);
        let acct = account();
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(
            evaluate(&inputs),
            Some(TransactionErrorReason::StxTransferInsufficientFunds)
        );
    }

    #[test]
    fn transfer_insufficiency_matches_its_boundary() {
        let acct = account();
        let bal = balance(1_000_000);
        // amount == balance fails, amount < balance passes
        for (amount, expected) in [
            (1_000_000, Some(TransactionErrorReason::StxTransferInsufficientFunds)),
            (1_000_001, Some(TransactionErrorReason::StxTransferInsufficientFunds)),
            (999_999, None),
        ] {
            let request = transfer(amount);
            let inputs = TransactionErrorInputs {
                request: Some(&request),
                origin: Some(ORIGIN),
                contract_interface: None,
                current_account: Some(&acct),
                balances: Some(&bal),
            };
            assert_eq!(evaluate(&inputs), expected, "amount {}", amount);
        }
    }

    #[test]
    fn unsponsored_fee_at_or_above_balance_is_insufficient() {
        let acct = account();
        let bal = balance(1_000_000);
        let mut request = transfer(100);
        request.fee = Some(Decimal::from(1_000_000));
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(
            evaluate(&inputs),
            Some(TransactionErrorReason::FeeInsufficientFunds)
        );

        request.fee = Some(Decimal::from(999_999));
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(evaluate(&inputs), None);
    }

    #[test]
    fn zero_balance_fails_the_fee_check_even_without_a_fee_set() {
        let acct = account();
        let bal = balance(0);
        let request = TransactionRequestPayload {
            tx: TransactionPayload::SmartContract {
                contract_name: "counter".to_string(),
                code_body: "(define-data-var n int 0)".to_string(),
            },
            fee: None,
            nonce: None,
            sponsored: false,
            post_conditions: vec![],
        };
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(
            evaluate(&inputs),
            Some(TransactionErrorReason::FeeInsufficientFunds)
        );
    }

    #[test]
    fn sponsored_requests_skip_the_fee_check() {
        let acct = account();
        let bal = balance(1_000_000);
        let mut request = transfer(100);
        request.sponsored = true;
        request.fee = Some(Decimal::from(50_000_000));
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(evaluate(&inputs), None);
    }

    #[test]
    fn contract_deploy_with_funds_passes_review() {
        let acct = account();
        let bal = balance(1_000_000);
        let request = TransactionRequestPayload {
            tx: TransactionPayload::SmartContract {
                contract_name: "counter".to_string(),
                code_body: "(define-data-var n int 0)".to_string(),
            },
            fee: Some(Decimal::from(3_000)),
            nonce: None,
            sponsored: false,
            post_conditions: vec![],
        };
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        assert_eq!(evaluate(&inputs), None);
    }

    #[test]
    fn classification_uses_exact_arithmetic_for_huge_amounts() {
        let acct = account();
        let bal = AssetBalance {
            available: Decimal::from_str("90071992547409930000001").unwrap(),
            total: Decimal::from_str("90071992547409930000001").unwrap(),
            symbol: "STX".to_string(),
            decimals: STX_DECIMALS,
        };
        let request = TransactionRequestPayload {
            tx: TransactionPayload::TokenTransfer {
                recipient: "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".to_string(),
                amount: Decimal::from_str("90071992547409930000000").unwrap(),
                memo: None,
            },
            fee: None,
            nonce: None,
            sponsored: true,
            post_conditions: vec![],
        };
        let inputs = TransactionErrorInputs {
            request: Some(&request),
            origin: Some(ORIGIN),
            contract_interface: None,
            current_account: Some(&acct),
            balances: Some(&bal),
        };
        // one base unit of headroom is enough; a float comparison would
        // collapse the two values
        assert_eq!(evaluate(&inputs), None);
    }
}
