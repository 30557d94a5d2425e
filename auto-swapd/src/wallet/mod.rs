use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use secrecy::ExposeSecret;

use crate::config::{ConfigError, WalletKey, MANDATORY_KEY_SLOTS};

/// A signing wallet. Immutable for the lifetime of the process.
#[derive(Clone)]
pub struct WalletHandle {
    address: Address,
    signer: LocalWallet,
}

impl WalletHandle {
    pub fn from_signer(signer: LocalWallet) -> Self {
        Self {
            address: signer.address(),
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &LocalWallet {
        &self.signer
    }
}

impl std::fmt::Debug for WalletHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletHandle")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Builds one handle per key, preserving key order.
pub fn load_wallets(keys: &[WalletKey]) -> Result<Vec<WalletHandle>, ConfigError> {
    if keys.len() < MANDATORY_KEY_SLOTS {
        return Err(ConfigError::MissingPrivateKeys { found: keys.len() });
    }

    let wallets = keys
        .iter()
        .map(|key| {
            let raw = key.secret.expose_secret();
            raw.trim_start_matches("0x")
                .parse::<LocalWallet>()
                .map(WalletHandle::from_signer)
                .map_err(|_| ConfigError::InvalidPrivateKey { slot: key.slot })
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!("Loaded {} wallets for operations", wallets.len());
    Ok(wallets)
}
