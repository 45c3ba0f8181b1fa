use anyhow::{anyhow, Result};
use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::cbor::{boolean, constr, constr_fields, constr_index, int, value_to_bool, value_to_u64, PlutusData};

/// Spending redeemers understood by the order validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Redeemer {
    /// `Data.void()`: vault, always-succeed and minting.
    Void,
    /// Position of the order's own input among the sorted transaction inputs,
    /// and of the output that continues it.
    Indexed {
        index_input: u64,
        index_output: u64,
    },
    /// Limit order fill; `partial` separates a partial from a terminal fill.
    LimitFill {
        index_input: u64,
        index_output: u64,
        partial: bool,
    },
}

impl Redeemer {
    pub fn index_input(&self) -> Option<u64> {
        match self {
            Redeemer::Void => None,
            Redeemer::Indexed { index_input, .. } | Redeemer::LimitFill { index_input, .. } => {
                Some(*index_input)
            }
        }
    }

    pub fn index_output(&self) -> Option<u64> {
        match self {
            Redeemer::Void => None,
            Redeemer::Indexed { index_output, .. } | Redeemer::LimitFill { index_output, .. } => {
                Some(*index_output)
            }
        }
    }
}

impl PlutusData for Redeemer {
    fn to_plutus(&self) -> Value {
        match self {
            Redeemer::Void => constr(0, vec![]),
            Redeemer::Indexed {
                index_input,
                index_output,
            } => constr(0, vec![int(*index_input), int(*index_output)]),
            Redeemer::LimitFill {
                index_input,
                index_output,
                partial,
            } => constr(
                0,
                vec![int(*index_input), int(*index_output), boolean(*partial)],
            ),
        }
    }

    fn from_plutus(v: &Value) -> Result<Self> {
        if constr_index(v)? != 0 {
            return Err(anyhow!("redeemer must be constr 0"));
        }
        let f = constr_fields(v)?;
        match f.len() {
            0 => Ok(Redeemer::Void),
            2 => Ok(Redeemer::Indexed {
                index_input: value_to_u64(&f[0])?,
                index_output: value_to_u64(&f[1])?,
            }),
            3 => Ok(Redeemer::LimitFill {
                index_input: value_to_u64(&f[0])?,
                index_output: value_to_u64(&f[1])?,
                partial: value_to_bool(&f[2])?,
            }),
            n => Err(anyhow!("unexpected redeemer with {} fields", n)),
        }
    }
}
