/// In-memory ledger for end-to-end runs.
///
/// Enforces ledger rules only: inputs must exist and be unique, the validity
/// interval must contain the current time, value must balance, key-locked
/// inputs and declared signers must be witnessed, and every script input must
/// carry a redeemer whose indices point at itself and at an existing output.
/// Validator scripts themselves are never executed.
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::input_order::resolve_index;
use super::{Ledger, UtxoSource};
use crate::error::{SettlementError, SettlementResult};
use crate::models::{OutputReference, TxRequest, Utxo, Value};
use crate::utils::{payment_credential, Credential};

/// Slots are one second and a block is twenty slots.
pub const DEFAULT_BLOCK_MS: u64 = 20_000;

#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    pub start_time_ms: u64,
    pub block_ms: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        let start_time_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            start_time_ms,
            block_ms: DEFAULT_BLOCK_MS,
        }
    }
}

#[derive(Debug)]
struct State {
    utxos: HashMap<OutputReference, Utxo>,
    time_ms: u64,
    submitted: u64,
}

#[derive(Debug)]
pub struct Emulator {
    state: RwLock<State>,
    block_ms: u64,
}

fn reject(reason: impl Into<String>) -> SettlementError {
    SettlementError::ValidationRejected(reason.into())
}

impl Emulator {
    /// Start a ledger where each `(address, value)` owns one genesis UTxO.
    pub fn new(genesis: Vec<(String, Value)>, config: EmulatorConfig) -> Self {
        let mut utxos = HashMap::new();
        for (i, (address, value)) in genesis.into_iter().enumerate() {
            let tx_hash = hex::encode(Sha256::digest(format!("genesis:{}:{}", i, address)));
            let utxo = Utxo {
                address,
                tx_hash: tx_hash.clone(),
                output_index: 0,
                value,
                data_hash: None,
                inline_datum: None,
                reference_script: None,
            };
            utxos.insert(OutputReference::new(&tx_hash, 0), utxo);
        }
        Self {
            state: RwLock::new(State {
                utxos,
                time_ms: config.start_time_ms,
                submitted: 0,
            }),
            block_ms: config.block_ms,
        }
    }

    /// Advance ledger time by `blocks` blocks.
    pub async fn await_block(&self, blocks: u64) {
        let mut state = self.state.write().await;
        state.time_ms += blocks * self.block_ms;
        debug!(time_ms = state.time_ms, "advanced {} block(s)", blocks);
    }

    pub async fn utxo_count(&self) -> usize {
        self.state.read().await.utxos.len()
    }

    fn validate(state: &State, tx: &TxRequest, witnesses: &[String]) -> SettlementResult<()> {
        if tx.inputs.is_empty() {
            return Err(reject("transaction has no inputs"));
        }
        let mut seen = HashSet::new();
        for input in &tx.inputs {
            if !seen.insert(input) {
                return Err(reject(format!("input {} is spent twice", input)));
            }
        }

        let resolved = tx
            .inputs
            .iter()
            .map(|r| {
                state
                    .utxos
                    .get(r)
                    .ok_or_else(|| reject(format!("input {} is unknown or already spent", r)))
            })
            .collect::<SettlementResult<Vec<_>>>()?;

        for r in &tx.reference_inputs {
            if !state.utxos.contains_key(r) {
                return Err(reject(format!("reference input {} is not available", r)));
            }
        }

        if !tx.validity.contains(state.time_ms) {
            return Err(reject(format!(
                "current time {} is outside the validity interval {:?}",
                state.time_ms, tx.validity
            )));
        }

        let witnessed: HashSet<&str> = witnesses.iter().map(String::as_str).collect();
        for signer in &tx.required_signers {
            if !witnessed.contains(signer.as_str()) {
                return Err(reject(format!("missing signature from {}", signer)));
            }
        }

        for utxo in &resolved {
            let reference = utxo.reference();
            match payment_credential(&utxo.address) {
                Ok(Credential::Key(hash)) => {
                    if !witnessed.contains(hash.as_str()) {
                        return Err(reject(format!("input {} is not witnessed", reference)));
                    }
                }
                Ok(Credential::Script(_)) => {
                    let redeemer = tx
                        .redeemer_for(&reference)
                        .ok_or_else(|| reject(format!("script input {} has no redeemer", reference)))?;
                    if let Some(index_input) = redeemer.index_input() {
                        let actual = resolve_index(&tx.inputs, &reference)
                            .map_err(|e| reject(e.to_string()))?;
                        if index_input != actual as u64 {
                            return Err(reject(format!(
                                "redeemer of {} claims input index {}, ledger index is {}",
                                reference, index_input, actual
                            )));
                        }
                    }
                    if let Some(index_output) = redeemer.index_output() {
                        if index_output as usize >= tx.outputs.len() {
                            return Err(reject(format!(
                                "redeemer of {} points at missing output {}",
                                reference, index_output
                            )));
                        }
                    }
                }
                Err(e) => return Err(reject(e.to_string())),
            }
        }

        Self::check_balance(&resolved, tx)
    }

    fn check_balance(inputs: &[&Utxo], tx: &TxRequest) -> SettlementResult<()> {
        let mut balance: BTreeMap<String, i128> = BTreeMap::new();
        for utxo in inputs {
            for (unit, amount) in utxo.value.iter() {
                *balance.entry(unit.to_string()).or_insert(0) += amount as i128;
            }
        }
        for (unit, amount) in &tx.mint {
            *balance.entry(unit.clone()).or_insert(0) += *amount as i128;
        }
        for output in &tx.outputs {
            for (unit, amount) in output.value.iter() {
                *balance.entry(unit.to_string()).or_insert(0) -= amount as i128;
            }
        }
        *balance.entry(crate::models::LOVELACE.to_string()).or_insert(0) -= tx.fee as i128;

        match balance.iter().find(|(_, net)| **net != 0) {
            Some((unit, net)) => Err(reject(format!(
                "value not preserved: {} off by {}",
                unit, net
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UtxoSource for Emulator {
    async fn utxos_at(&self, address: &str) -> SettlementResult<Vec<Utxo>> {
        let state = self.state.read().await;
        let mut utxos: Vec<Utxo> = state
            .utxos
            .values()
            .filter(|u| u.address == address)
            .cloned()
            .collect();
        utxos.sort_by(|a, b| {
            a.tx_hash
                .cmp(&b.tx_hash)
                .then(a.output_index.cmp(&b.output_index))
        });
        Ok(utxos)
    }

    async fn utxos_by_refs(&self, refs: &[OutputReference]) -> SettlementResult<Vec<Utxo>> {
        let state = self.state.read().await;
        refs.iter()
            .map(|r| {
                state
                    .utxos
                    .get(r)
                    .cloned()
                    .ok_or_else(|| SettlementError::TargetNotFound(r.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl Ledger for Emulator {
    async fn submit(&self, tx: &TxRequest, witnesses: &[String]) -> SettlementResult<String> {
        let mut state = self.state.write().await;
        if let Err(e) = Self::validate(&state, tx, witnesses) {
            info!("transaction rejected: {}", e);
            return Err(e);
        }

        state.submitted += 1;
        let body = serde_json::to_vec(tx).map_err(|e| SettlementError::Source(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&body);
        hasher.update(state.submitted.to_be_bytes());
        let tx_hash = hex::encode(hasher.finalize());

        for input in &tx.inputs {
            state.utxos.remove(input);
        }
        for (i, output) in tx.outputs.iter().enumerate() {
            let reference = OutputReference::new(&tx_hash, i as u32);
            state
                .utxos
                .insert(reference.clone(), Utxo::from_output(reference, output.clone()));
        }

        info!(
            tx = %tx_hash,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            "transaction accepted"
        );
        Ok(tx_hash)
    }

    async fn now(&self) -> u64 {
        self.state.read().await.time_ms
    }
}
