use crate::models::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Points at one output of one transaction: `(transaction_id, output_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputReference {
    pub tx_hash: String,
    pub output_index: u32,
}

impl OutputReference {
    pub fn new(tx_hash: &str, output_index: u32) -> Self {
        Self {
            tx_hash: tx_hash.to_lowercase(),
            output_index,
        }
    }

    /// Ledger ordering of transaction inputs: byte-wise on the decoded
    /// transaction id, then numeric on the output index.
    pub fn ledger_cmp(&self, other: &Self) -> Result<Ordering, hex::FromHexError> {
        let a = hex::decode(&self.tx_hash)?;
        let b = hex::decode(&other.tx_hash)?;
        Ok(a.cmp(&b).then(self.output_index.cmp(&other.output_index)))
    }
}

impl fmt::Display for OutputReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.output_index)
    }
}

/// Anything that sits at an address holding a value.
pub trait Holding {
    fn address(&self) -> &str;
    fn value(&self) -> &Value;
}

/// An output a transaction will create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub value: Value,
    /// Inline datum, CBOR hex.
    pub inline_datum: Option<String>,
    pub reference_script: Option<String>,
}

impl TxOutput {
    pub fn new(address: &str, value: Value) -> Self {
        Self {
            address: address.to_string(),
            value,
            inline_datum: None,
            reference_script: None,
        }
    }

    pub fn with_datum(mut self, cbor_hex: String) -> Self {
        self.inline_datum = Some(cbor_hex);
        self
    }

    pub fn with_reference_script(mut self, script_hex: &str) -> Self {
        self.reference_script = Some(script_hex.to_string());
        self
    }
}

impl Holding for TxOutput {
    fn address(&self) -> &str {
        &self.address
    }

    fn value(&self) -> &Value {
        &self.value
    }
}

/// An unspent transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub address: String,
    pub tx_hash: String,
    pub output_index: u32,
    pub value: Value,
    pub data_hash: Option<String>,
    pub inline_datum: Option<String>,
    pub reference_script: Option<String>,
}

impl Utxo {
    pub fn from_output(reference: OutputReference, output: TxOutput) -> Self {
        Self {
            address: output.address,
            tx_hash: reference.tx_hash,
            output_index: reference.output_index,
            value: output.value,
            data_hash: None,
            inline_datum: output.inline_datum,
            reference_script: output.reference_script,
        }
    }

    pub fn reference(&self) -> OutputReference {
        OutputReference::new(&self.tx_hash, self.output_index)
    }

    pub fn has_data_hash(&self) -> bool {
        self.data_hash.is_some()
    }

    pub fn has_reference_script(&self) -> bool {
        self.reference_script.is_some()
    }
}

impl Holding for Utxo {
    fn address(&self) -> &str {
        &self.address
    }

    fn value(&self) -> &Value {
        &self.value
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KupoUtxoResponse {
    pub address: String,
    #[serde(rename = "transaction_id")]
    pub tx_id: String,
    #[serde(rename = "output_index", deserialize_with = "deserialize_output_index")]
    pub output_idx: u32,
    pub value: KupoValue,
    pub datum_hash: Option<String>,
    pub datum_type: Option<String>,
    pub script_hash: Option<String>,
}

fn deserialize_output_index<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum O {
        Num(u32),
        Str(String),
    }
    let o = O::deserialize(deserializer)?;
    match o {
        O::Num(n) => Ok(n),
        O::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KupoValue {
    #[serde(deserialize_with = "deserialize_quantity")]
    pub coins: u64,
    #[serde(default)]
    pub assets: std::collections::HashMap<String, KupoQuantity>,
}

/// Kupo reports quantities either as JSON numbers or as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KupoQuantity(#[serde(deserialize_with = "deserialize_quantity")] pub u64);

fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Q {
        Str(String),
        Num(u64),
    }
    let q = Q::deserialize(deserializer)?;
    match q {
        Q::Str(s) => s.parse().map_err(serde::de::Error::custom),
        Q::Num(n) => Ok(n),
    }
}

impl KupoUtxoResponse {
    pub fn into_utxo(self) -> Utxo {
        let mut value = Value::lovelace(self.value.coins);
        for (unit, qty) in self.value.assets {
            value.add(&unit.replace('.', ""), qty.0);
        }
        Utxo {
            address: self.address,
            tx_hash: self.tx_id,
            output_index: self.output_idx,
            value,
            data_hash: self.datum_hash,
            inline_datum: None,
            reference_script: self.script_hash,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KupoDatumResponse {
    pub datum: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_cmp_is_bytewise_then_index() {
        let a = OutputReference::new("aa00", 5);
        let b = OutputReference::new("bb00", 0);
        assert_eq!(a.ledger_cmp(&b).unwrap(), Ordering::Less);
        let a1 = OutputReference::new("AA00", 1);
        assert_eq!(a1.ledger_cmp(&a).unwrap(), Ordering::Less);
        assert!(OutputReference::new("zz", 0).ledger_cmp(&a).is_err());
    }

    #[test]
    fn test_kupo_response_into_utxo() {
        let raw = r#"{
            "address": "addr_test1wq",
            "transaction_id": "aa",
            "output_index": "2",
            "value": {"coins": 1500000, "assets": {"abcd.5049": "42"}},
            "datum_hash": "dd",
            "datum_type": "inline",
            "script_hash": null
        }"#;
        let parsed: KupoUtxoResponse = serde_json::from_str(raw).unwrap();
        let utxo = parsed.into_utxo();
        assert_eq!(utxo.output_index, 2);
        assert_eq!(utxo.value.coins(), 1_500_000);
        assert_eq!(utxo.value.get("abcd5049"), 42);
        assert!(utxo.has_data_hash());
    }
}
