use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::error::SettlementResult;
use crate::ledger::UtxoSource;
use crate::models::Utxo;
use crate::utils::{key_hash_to_address, script_address_with_stake, Network};

/// A named emulator participant.
///
/// Keys are not real: the payment key hash is derived from the name and the
/// ledger trusts whoever claims it as a witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub name: String,
    pub key_hash: String,
    pub address: String,
}

impl Wallet {
    pub fn generate(name: &str, network: Network) -> Result<Self> {
        let digest = Sha256::digest(format!("wallet:{}", name));
        let key_hash = hex::encode(&digest[..28]);
        let address = key_hash_to_address(&key_hash, network)?;
        Ok(Self {
            name: name.to_string(),
            key_hash,
            address,
        })
    }

    /// Address of `script_hash` that keeps this wallet's stake credential.
    pub fn staked_script_address(&self, script_hash: &str, network: Network) -> Result<String> {
        script_address_with_stake(script_hash, &self.key_hash, network)
    }

    pub async fn utxos(&self, ledger: &dyn UtxoSource) -> SettlementResult<Vec<Utxo>> {
        ledger.utxos_at(&self.address).await
    }

    /// Witness list for signing with this wallet alone.
    pub fn witness(&self) -> Vec<String> {
        vec![self.key_hash.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{payment_credential, Credential};

    #[test]
    fn test_generate_is_deterministic() {
        let a = Wallet::generate("alice", Network::Testnet).unwrap();
        let again = Wallet::generate("alice", Network::Testnet).unwrap();
        let b = Wallet::generate("bob", Network::Testnet).unwrap();
        assert_eq!(a, again);
        assert_ne!(a.key_hash, b.key_hash);
        assert_eq!(a.key_hash.len(), 56);
        assert_eq!(
            payment_credential(&a.address).unwrap(),
            Credential::Key(a.key_hash.clone())
        );
    }

    #[test]
    fn test_staked_script_address_pays_to_script() {
        let a = Wallet::generate("alice", Network::Testnet).unwrap();
        let script = "5c".repeat(28);
        let address = a.staked_script_address(&script, Network::Testnet).unwrap();
        assert_eq!(
            payment_credential(&address).unwrap(),
            Credential::Script(script)
        );
    }
}
