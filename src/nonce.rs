// Next-nonce resolution. The chain-reported snapshot can lag very recent
// mempool activity, so the reported floor is reconciled against pending
// transactions before it is handed to a form.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountNonces {
    pub possible_next_nonce: u64,
    #[serde(default)]
    pub last_executed_tx_nonce: Option<u64>,
    #[serde(default)]
    pub last_mempool_tx_nonce: Option<u64>,
    #[serde(default)]
    pub detected_missing_nonces: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub sender_address: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextNonce {
    pub nonce: u64,
    pub adjusted_for_pending: bool,
}

// Returns None when no account data is available yet. Callers must treat
// that as "not ready", never as nonce 0.
pub fn resolve_next_nonce(
    snapshot: Option<&AccountNonces>,
    confirmed: &[TransactionSummary],
    pending: &[TransactionSummary],
    sender: &str,
) -> Option<NextNonce> {
    let floor = match snapshot {
        Some(snapshot) => snapshot.possible_next_nonce,
        None => {
            let last_confirmed = confirmed
                .iter()
                .filter(|tx| tx.sender_address == sender)
                .map(|tx| tx.nonce)
                .max()?;
            last_confirmed + 1
        }
    };

    // Mempool entries are unordered; every one of them must be walked
    // before the floor is final.
    let mut next = floor;
    let mut adjusted = false;
    for tx in pending.iter().filter(|tx| tx.sender_address == sender) {
        if tx.nonce >= next {
            next = tx.nonce + 1;
            adjusted = true;
        }
    }

    Some(NextNonce {
        nonce: next,
        adjusted_for_pending: adjusted,
    })
}
