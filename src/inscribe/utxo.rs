//! UTXO gathering for inscription transfers

use super::api::{Utxo, UtxoApi};
use crate::error::{WalletError, WalletResult};
use tracing::debug;

/// Inscription UTXO first, followed by the address's other UTXOs for fees.
///
/// A UTXO carrying several inscriptions is only accepted when `allow_split` is set,
/// since spending it would move all of them.
pub async fn gather_inscription_utxos(
    api: &dyn UtxoApi,
    address: &str,
    inscription_id: &str,
    allow_split: bool,
) -> WalletResult<Vec<Utxo>> {
    let utxo = api
        .inscription_utxo(inscription_id)
        .await?
        .ok_or_else(|| WalletError::UtxoUnavailable("UTXO not found.".to_string()))?;

    if utxo.inscriptions.len() > 1 && !allow_split {
        return Err(WalletError::UtxoUnavailable(
            "Multiple inscriptions are mixed together. Please split them first.".to_string(),
        ));
    }

    let funding = api.address_utxos(address).await?;
    debug!(inscription = inscription_id, funding = funding.len(), "gathered utxos");

    let mut utxos = Vec::with_capacity(funding.len() + 1);
    utxos.push(utxo);
    for candidate in funding {
        if candidate.tx_id == utxos[0].tx_id && candidate.output_index == utxos[0].output_index {
            continue;
        }
        utxos.push(candidate);
    }
    Ok(utxos)
}
