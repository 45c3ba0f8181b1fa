/// Plutus data CBOR helpers shared by every datum and redeemer.
use anyhow::{anyhow, Result};
use ciborium::value::Value;

const CONSTR_SMALL_BASE: u64 = 121;
const CONSTR_LARGE_BASE: u64 = 1280;
const CONSTR_GENERAL: u64 = 102;

/// Types with a Plutus data shape understood by the validators.
pub trait PlutusData: Sized {
    fn to_plutus(&self) -> Value;
    fn from_plutus(v: &Value) -> Result<Self>;

    fn to_cbor_hex(&self) -> String {
        encode_cbor(&self.to_plutus())
    }

    fn from_cbor_hex(cbor_hex: &str) -> Result<Self> {
        Self::from_plutus(&decode_cbor(cbor_hex)?)
    }
}

/// Build the CBOR tag for Plutus constructor `alt`.
pub fn constr(alt: u64, fields: Vec<Value>) -> Value {
    match alt {
        0..=6 => Value::Tag(CONSTR_SMALL_BASE + alt, Box::new(Value::Array(fields))),
        7..=127 => Value::Tag(CONSTR_LARGE_BASE + alt - 7, Box::new(Value::Array(fields))),
        _ => Value::Tag(
            CONSTR_GENERAL,
            Box::new(Value::Array(vec![
                Value::Integer(alt.into()),
                Value::Array(fields),
            ])),
        ),
    }
}

/// Constructor index of a tagged value.
pub fn constr_index(v: &Value) -> Result<u64> {
    match v {
        Value::Tag(tag @ 121..=127, _) => Ok(tag - CONSTR_SMALL_BASE),
        Value::Tag(tag @ 1280..=1400, _) => Ok(tag - CONSTR_LARGE_BASE + 7),
        Value::Tag(CONSTR_GENERAL, inner) => match inner.as_ref() {
            Value::Array(items) if items.len() == 2 => value_to_u64(&items[0]),
            _ => Err(anyhow!("Malformed general constr")),
        },
        _ => Err(anyhow!("Expected CBOR tag for constr, got {:?}", v)),
    }
}

/// Extract the inner field array from a Plutus constructor tag.
pub fn constr_fields(v: &Value) -> Result<&Vec<Value>> {
    match v {
        Value::Tag(CONSTR_GENERAL, inner) => match inner.as_ref() {
            Value::Array(items) if items.len() == 2 => match &items[1] {
                Value::Array(fields) => Ok(fields),
                _ => Err(anyhow!("Expected array inside general constr")),
            },
            _ => Err(anyhow!("Malformed general constr")),
        },
        Value::Tag(_, inner) => match inner.as_ref() {
            Value::Array(fields) => Ok(fields),
            _ => Err(anyhow!("Expected array inside constr tag")),
        },
        _ => Err(anyhow!("Expected CBOR tag for constr, got {:?}", v)),
    }
}

/// Fields of constructor 0 with exactly `n` entries.
pub fn expect_record(v: &Value, n: usize, what: &str) -> Result<Vec<Value>> {
    let idx = constr_index(v)?;
    if idx != 0 {
        return Err(anyhow!("{}: expected constr 0, got constr {}", what, idx));
    }
    let fields = constr_fields(v)?;
    if fields.len() != n {
        return Err(anyhow!(
            "{}: expected {} fields, got {}",
            what,
            n,
            fields.len()
        ));
    }
    Ok(fields.clone())
}

pub fn int(n: impl Into<ciborium::value::Integer>) -> Value {
    Value::Integer(n.into())
}

pub fn bytes_hex(hex_str: &str) -> Result<Value> {
    Ok(Value::Bytes(hex::decode(hex_str)?))
}

pub fn boolean(b: bool) -> Value {
    constr(if b { 1 } else { 0 }, vec![])
}

pub fn nullable(v: Option<Value>) -> Value {
    match v {
        Some(inner) => constr(0, vec![inner]),
        None => constr(1, vec![]),
    }
}

pub fn value_to_bool(v: &Value) -> Result<bool> {
    match constr_index(v)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(anyhow!("Expected bool constr, got constr {}", other)),
    }
}

/// Decode a nullable field: `Constr(0,[x])` is `Some(x)`, `Constr(1,[])` is `None`.
pub fn value_to_nullable(v: &Value) -> Result<Option<&Value>> {
    let fields = constr_fields(v)?;
    match constr_index(v)? {
        0 if fields.len() == 1 => Ok(Some(&fields[0])),
        1 if fields.is_empty() => Ok(None),
        other => Err(anyhow!("Expected nullable constr, got constr {}", other)),
    }
}

pub fn value_to_array(v: &Value) -> Result<&Vec<Value>> {
    match v {
        Value::Array(items) => Ok(items),
        _ => Err(anyhow!("Expected array, got {:?}", v)),
    }
}

/// Read a u64 from a ciborium Integer value.
pub fn value_to_u64(v: &Value) -> Result<u64> {
    match v {
        Value::Integer(i) => {
            let n: i128 = (*i).into();
            if n < 0 {
                Err(anyhow!("Negative integer where u64 expected: {}", n))
            } else {
                u64::try_from(n).map_err(|_| anyhow!("Integer too large for u64: {}", n))
            }
        }
        _ => Err(anyhow!("Expected integer, got {:?}", v)),
    }
}

/// Read a possibly-negative i64 from a ciborium Integer value.
pub fn value_to_i64(v: &Value) -> Result<i64> {
    match v {
        Value::Integer(i) => {
            let n: i128 = (*i).into();
            i64::try_from(n).map_err(|_| anyhow!("Integer out of i64 range: {}", n))
        }
        _ => Err(anyhow!("Expected integer, got {:?}", v)),
    }
}

/// Read bytes from a ciborium Bytes value and return them as a lowercase hex string.
pub fn value_to_hex(v: &Value) -> Result<String> {
    match v {
        Value::Bytes(b) => Ok(hex::encode(b)),
        _ => Err(anyhow!("Expected bytes, got {:?}", v)),
    }
}

/// Decode a CBOR hex string into a ciborium Value.
pub fn decode_cbor(cbor_hex: &str) -> Result<Value> {
    let bytes = hex::decode(cbor_hex)?;
    ciborium::de::from_reader(bytes.as_slice()).map_err(|e| anyhow!("CBOR decode error: {}", e))
}

/// Encode a ciborium Value as CBOR hex.
pub fn encode_cbor(v: &Value) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail for a well-formed Value.
    if let Err(e) = ciborium::ser::into_writer(v, &mut buf) {
        tracing::warn!("CBOR encode error: {}", e);
    }
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constr_tags() {
        assert!(matches!(constr(0, vec![]), Value::Tag(121, _)));
        assert!(matches!(constr(6, vec![]), Value::Tag(127, _)));
        assert!(matches!(constr(7, vec![]), Value::Tag(1280, _)));
        assert!(matches!(constr(200, vec![]), Value::Tag(102, _)));
        for alt in [0, 3, 7, 90, 200] {
            assert_eq!(constr_index(&constr(alt, vec![int(1)])).unwrap(), alt);
            assert_eq!(constr_fields(&constr(alt, vec![int(1)])).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_void_encoding_matches_plutus() {
        // Data.void() in the off-chain tooling is d87980
        assert_eq!(encode_cbor(&constr(0, vec![])), "d87980");
    }

    #[test]
    fn test_decodes_indefinite_arrays() {
        // Constr0 [42] written with an indefinite-length array.
        let v = decode_cbor("d8799f182aff").unwrap();
        let fields = constr_fields(&v).unwrap();
        assert_eq!(value_to_u64(&fields[0]).unwrap(), 42);
    }

    #[test]
    fn test_bool_and_nullable() {
        assert!(value_to_bool(&boolean(true)).unwrap());
        assert!(!value_to_bool(&boolean(false)).unwrap());
        assert!(value_to_nullable(&nullable(None)).unwrap().is_none());
        let some = nullable(Some(int(7)));
        assert_eq!(value_to_u64(value_to_nullable(&some).unwrap().unwrap()).unwrap(), 7);
    }

    #[test]
    fn test_negative_integers() {
        assert_eq!(value_to_i64(&int(-1_000_000i64)).unwrap(), -1_000_000);
        assert!(value_to_u64(&int(-1i64)).is_err());
    }
}
