use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{SettlementError, SettlementResult};
use crate::ledger::resolve_index;
use crate::models::{Asset, OutputReference};

/// Minting policies the scenarios deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintingPolicy {
    /// Accepts any mint or burn.
    Always { policy_id: String },
    /// Mints only in the transaction that spends `seed`, hence at most once.
    OneShot {
        policy_id: String,
        seed: OutputReference,
    },
}

impl MintingPolicy {
    pub fn policy_id(&self) -> &str {
        match self {
            MintingPolicy::Always { policy_id } | MintingPolicy::OneShot { policy_id, .. } => {
                policy_id
            }
        }
    }

    /// Validator title in the Aiken blueprint.
    pub fn validator_title(&self) -> &'static str {
        match self {
            MintingPolicy::Always { .. } => "mint.always_mint",
            MintingPolicy::OneShot { .. } => "mint.one_shot",
        }
    }

    pub fn unit(&self, asset_name: &str) -> String {
        Asset::from_text(self.policy_id(), asset_name).identifier("")
    }
}

/// Signed quantities keyed by unit for minting (positive) or burning
/// (negative) `assets`, given by readable asset name.
///
/// A one-shot policy needs its seed among `inputs` whenever anything is
/// minted; burns go through without it.
pub fn mint_request(
    policy: &MintingPolicy,
    inputs: &[OutputReference],
    assets: &[(&str, i64)],
) -> SettlementResult<BTreeMap<String, i64>> {
    let mut quantities = BTreeMap::new();
    for (name, quantity) in assets {
        if *quantity == 0 {
            return Err(SettlementError::Overfill(format!("zero quantity for {}", name)));
        }
        *quantities.entry(policy.unit(name)).or_insert(0) += quantity;
    }
    quantities.retain(|_, q| *q != 0);
    if quantities.is_empty() {
        return Err(SettlementError::Overfill("nothing to mint or burn".into()));
    }

    let mints = quantities.values().any(|q| *q > 0);
    if let MintingPolicy::OneShot { seed, .. } = policy {
        if mints {
            resolve_index(inputs, seed)?;
        }
    }
    debug!(policy = policy.policy_id(), ?quantities, "mint request");
    Ok(quantities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::fixtures::POLICY;

    fn seed() -> OutputReference {
        OutputReference::new(&"5e".repeat(32), 0)
    }

    #[test]
    fn test_always_mint_and_burn() {
        let policy = MintingPolicy::Always {
            policy_id: POLICY.to_string(),
        };
        let q = mint_request(&policy, &[], &[("PIZADA1", 10), ("PIZADA2", 20)]).unwrap();
        assert_eq!(q.len(), 2);
        assert_eq!(q[&policy.unit("PIZADA1")], 10);
        let burn = mint_request(&policy, &[], &[("PIZADA1", -10)]).unwrap();
        assert_eq!(burn[&policy.unit("PIZADA1")], -10);
    }

    #[test]
    fn test_one_shot_needs_seed() {
        let policy = MintingPolicy::OneShot {
            policy_id: POLICY.to_string(),
            seed: seed(),
        };
        let other = OutputReference::new(&"aa".repeat(32), 1);
        let err = mint_request(&policy, &[other.clone()], &[("PIZADA", 100)]).unwrap_err();
        assert!(matches!(err, SettlementError::TargetNotFound(_)));

        mint_request(&policy, &[other.clone(), seed()], &[("PIZADA", 100)]).unwrap();
        mint_request(&policy, &[other], &[("PIZADA", -1)]).unwrap();
    }

    #[test]
    fn test_rejects_empty_request() {
        let policy = MintingPolicy::Always {
            policy_id: POLICY.to_string(),
        };
        assert!(mint_request(&policy, &[], &[]).is_err());
        assert!(mint_request(&policy, &[], &[("A", 0)]).is_err());
        assert!(mint_request(&policy, &[], &[("A", 5), ("A", -5)]).is_err());
    }
}
