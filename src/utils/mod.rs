use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub fn remove_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url[..url.len() - 1].to_string()
    } else {
        url.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Testnet => 0,
        }
    }

    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "addr",
            Network::Testnet => "addr_test",
        }
    }
}

/// Payment part of a Shelley address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Key(String),
    Script(String),
}

impl Credential {
    pub fn hash(&self) -> &str {
        match self {
            Credential::Key(h) | Credential::Script(h) => h,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::Script(_))
    }
}

fn decode_hash28(hash_hex: &str, what: &str) -> Result<Vec<u8>> {
    let hash_bytes =
        hex::decode(hash_hex).map_err(|e| anyhow!("invalid {} hex: {}", what, e))?;
    if hash_bytes.len() != 28 {
        return Err(anyhow!(
            "{} must be 28 bytes, got {}",
            what,
            hash_bytes.len()
        ));
    }
    Ok(hash_bytes)
}

fn encode_address(network: Network, payload: &[u8]) -> Result<String> {
    let hrp = bech32::Hrp::parse(network.hrp()).map_err(|e| anyhow!("bech32 HRP error: {}", e))?;
    bech32::encode::<bech32::Bech32>(hrp, payload)
        .map_err(|e| anyhow!("bech32 encode error: {}", e))
}

/// Convert a Plutus script hash (28 bytes hex) to an enterprise script address.
///
/// Header byte: upper nibble 0111 = type 7 (script credential, no staking),
/// lower nibble = network id.
pub fn script_hash_to_address(script_hash_hex: &str, network: Network) -> Result<String> {
    let hash_bytes = decode_hash28(script_hash_hex, "script hash")?;
    let mut payload = Vec::with_capacity(29);
    payload.push(0x70 | network.id());
    payload.extend_from_slice(&hash_bytes);
    encode_address(network, &payload)
}

/// Enterprise address (type 6) for a payment key hash.
pub fn key_hash_to_address(key_hash_hex: &str, network: Network) -> Result<String> {
    let hash_bytes = decode_hash28(key_hash_hex, "key hash")?;
    let mut payload = Vec::with_capacity(29);
    payload.push(0x60 | network.id());
    payload.extend_from_slice(&hash_bytes);
    encode_address(network, &payload)
}

/// Base address (type 1): script payment credential with a key stake
/// credential, so value locked in the script keeps its owner's delegation.
pub fn script_address_with_stake(
    script_hash_hex: &str,
    stake_key_hash_hex: &str,
    network: Network,
) -> Result<String> {
    let script = decode_hash28(script_hash_hex, "script hash")?;
    let stake = decode_hash28(stake_key_hash_hex, "stake key hash")?;
    let mut payload = Vec::with_capacity(57);
    payload.push(0x10 | network.id());
    payload.extend_from_slice(&script);
    payload.extend_from_slice(&stake);
    encode_address(network, &payload)
}

/// Extract the payment credential of a bech32 Shelley address.
pub fn payment_credential(address: &str) -> Result<Credential> {
    let (_, payload) =
        bech32::decode(address).map_err(|e| anyhow!("invalid address {}: {}", address, e))?;
    if payload.len() < 29 {
        return Err(anyhow!("address {} is too short", address));
    }
    let header = payload[0] >> 4;
    if header > 7 {
        return Err(anyhow!("address {} has no payment credential", address));
    }
    let hash = hex::encode(&payload[1..29]);
    if header & 1 == 1 {
        Ok(Credential::Script(hash))
    } else {
        Ok(Credential::Key(hash))
    }
}

pub fn is_script_address(address: &str) -> bool {
    payment_credential(address)
        .map(|c| c.is_script())
        .unwrap_or(false)
}

pub async fn retry<T, E, F, Fut>(mut retries: u32, base_delay_ms: u64, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if retries == 0 => return Err(e),
            Err(e) => {
                // Exponential backoff: base_delay * 2^attempt, capped at 30s
                let delay = (base_delay_ms * (1u64 << attempt.min(5))).min(30_000);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay,
                    "request failed ({:?}), retrying",
                    e
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                retries -= 1;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c";

    #[test]
    fn test_script_hash_to_address_known_addresses() {
        // Mainnet enterprise script addresses with published script hashes.
        let addr1 = script_hash_to_address(
            "ea07914e72654ca5a5c5e26a95596e6fa0b5c4c317e43e2f92457ea1",
            Network::Mainnet,
        )
        .unwrap();
        assert_eq!(
            addr1,
            "addr1w84q0y2wwfj5efd9ch3x492edeh6pdwycvt7g030jfzhagg5ftr54"
        );

        let addr2 = script_hash_to_address(
            "8c66f1ac8b57debcab9a07b3b9b0a5595a5ad76e3bcae756c82efe4f",
            Network::Mainnet,
        )
        .unwrap();
        assert_eq!(
            addr2,
            "addr1wxxxdudv3dtaa09tngrm8wds54v45kkhdcau4e6keqh0uncksc7pn"
        );
    }

    #[test]
    fn test_script_hash_to_address_invalid_length() {
        assert!(script_hash_to_address("abcd", Network::Testnet).is_err());
    }

    #[test]
    fn test_script_hash_to_address_invalid_hex() {
        assert!(script_hash_to_address(
            "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz",
            Network::Testnet
        )
        .is_err());
    }

    #[test]
    fn test_payment_credential_round_trip() {
        let key_addr = key_hash_to_address(KEY, Network::Testnet).unwrap();
        assert!(key_addr.starts_with("addr_test1v"));
        assert_eq!(
            payment_credential(&key_addr).unwrap(),
            Credential::Key(KEY.to_string())
        );
        assert!(!is_script_address(&key_addr));

        let script_addr = script_hash_to_address(KEY, Network::Testnet).unwrap();
        assert!(is_script_address(&script_addr));
    }

    #[test]
    fn test_base_address_keeps_script_payment() {
        let addr = script_address_with_stake(KEY, KEY, Network::Testnet).unwrap();
        assert!(addr.starts_with("addr_test1z"));
        assert_eq!(
            payment_credential(&addr).unwrap(),
            Credential::Script(KEY.to_string())
        );
    }

    #[test]
    fn test_garbage_is_not_a_script_address() {
        assert!(!is_script_address("Alice"));
    }
}
