//! Resting order state attached to script UTxOs.
//!
//! Every order kind is a constructor-0 record, so decoding a raw datum needs to
//! know which validator it belongs to ([`OrderKind`]).
use anyhow::{anyhow, Result};
use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::cbor::{
    boolean, bytes_hex, constr, expect_record, int, nullable, value_to_array, value_to_bool,
    value_to_hex, value_to_i64, value_to_nullable, value_to_u64, PlutusData,
};
use crate::error::{SettlementError, SettlementResult};
use crate::models::{OutputReference, Rational, Token};

/// Bytes in a payment key hash or a policy id.
const HASH_LEN: usize = 28;
const TX_ID_LEN: usize = 32;
const MAX_ASSET_NAME_LEN: usize = 32;

/// The validator an order UTxO is locked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Vault,
    GridOrder,
    LimitOrder,
    SlidingOrder,
    LiquidityBin,
}

impl OrderKind {
    /// Validator title in the Aiken blueprint.
    pub fn validator_title(&self) -> &'static str {
        match self {
            OrderKind::Vault => "vault.vault",
            OrderKind::GridOrder => "grid_order.grid_order",
            OrderKind::LimitOrder => "limit_order.full_limit_order",
            OrderKind::SlidingOrder => "sliding_order.sliding_order",
            OrderKind::LiquidityBin => "liquidity_bin.liquidity_bin",
        }
    }
}

impl PlutusData for OutputReference {
    fn to_plutus(&self) -> Value {
        let tx_id = bytes_hex(&self.tx_hash).unwrap_or(Value::Bytes(vec![]));
        constr(0, vec![constr(0, vec![tx_id]), int(self.output_index)])
    }

    fn from_plutus(v: &Value) -> Result<Self> {
        let fields = expect_record(v, 2, "OutputReference")?;
        let tx_id = expect_record(&fields[0], 1, "TransactionId")?;
        let tx_hash = value_to_hex(&tx_id[0])?;
        let index = value_to_u64(&fields[1])?;
        let output_index =
            u32::try_from(index).map_err(|_| anyhow!("output index {} out of range", index))?;
        Ok(OutputReference::new(&tx_hash, output_index))
    }
}

/// `what` must be hex of exactly `len` bytes, or at most `max` bytes.
fn check_hex(what: &str, s: &str, len: Option<usize>, max: usize) -> SettlementResult<()> {
    let bytes = hex::decode(s)
        .map_err(|e| SettlementError::DatumMismatch(format!("{} {:?} is not hex: {}", what, s, e)))?;
    let fits = match len {
        Some(len) => bytes.len() == len,
        None => bytes.len() <= max,
    };
    if !fits {
        return Err(SettlementError::DatumMismatch(format!(
            "{} {:?} has {} bytes",
            what,
            s,
            bytes.len()
        )));
    }
    Ok(())
}

fn check_owner(owner: &str) -> SettlementResult<()> {
    check_hex("owner", owner, Some(HASH_LEN), HASH_LEN)
}

fn check_token(token: &Token) -> SettlementResult<()> {
    match token {
        Token::Lovelace => Ok(()),
        Token::Asset(a) => {
            check_hex("policy id", &a.policy_id, Some(HASH_LEN), HASH_LEN)?;
            check_hex("asset name", &a.name_hex, None, MAX_ASSET_NAME_LEN)
        }
    }
}

impl OutputReference {
    pub fn validate(&self) -> SettlementResult<()> {
        check_hex("transaction id", &self.tx_hash, Some(TX_ID_LEN), TX_ID_LEN)
    }

    /// Inline datum form of this reference, for payments tagged with the order
    /// they settle.
    pub fn encode(&self) -> SettlementResult<String> {
        self.validate()?;
        Ok(self.to_cbor_hex())
    }
}

fn check_link(link: &Option<OutputReference>) -> SettlementResult<()> {
    link.as_ref().map_or(Ok(()), OutputReference::validate)
}

fn token_to_plutus(token: &Token) -> Vec<Value> {
    let (policy, name) = token.parts();
    vec![
        bytes_hex(&policy).unwrap_or(Value::Bytes(vec![])),
        bytes_hex(&name).unwrap_or(Value::Bytes(vec![])),
    ]
}

fn token_from_fields(policy: &Value, name: &Value) -> Result<Token> {
    Ok(Token::from_parts(&value_to_hex(policy)?, &value_to_hex(name)?))
}

fn token_from_plutus(v: &Value) -> Result<Token> {
    let items = value_to_array(v)?;
    if items.len() != 2 {
        return Err(anyhow!("asset tuple expected 2 items, got {}", items.len()));
    }
    token_from_fields(&items[0], &items[1])
}

fn rational_to_plutus(r: &Rational) -> Value {
    Value::Array(vec![int(r.numerator), int(r.denominator)])
}

fn rational_from_plutus(v: &Value) -> Result<Rational> {
    let items = value_to_array(v)?;
    if items.len() != 2 {
        return Err(anyhow!("ratio tuple expected 2 items, got {}", items.len()));
    }
    Rational::new(value_to_i64(&items[0])?, value_to_i64(&items[1])?)
        .map_err(|e| anyhow!("{}", e))
}

fn link_to_plutus(link: &Option<OutputReference>) -> Value {
    nullable(link.as_ref().map(|r| r.to_plutus()))
}

fn link_from_plutus(v: &Value) -> Result<Option<OutputReference>> {
    value_to_nullable(v)?
        .map(OutputReference::from_plutus)
        .transpose()
}

fn owner_to_plutus(owner: &str) -> Value {
    bytes_hex(owner).unwrap_or(Value::Bytes(vec![]))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultDatum {
    /// Payment key hash allowed to spend the vault.
    pub owner: String,
}

impl PlutusData for VaultDatum {
    fn to_plutus(&self) -> Value {
        constr(0, vec![owner_to_plutus(&self.owner)])
    }

    fn from_plutus(v: &Value) -> Result<Self> {
        let f = expect_record(v, 1, "VaultDatum")?;
        Ok(Self {
            owner: value_to_hex(&f[0])?,
        })
    }
}

/// A two-sided order that alternates between holding `asset_1` and `asset_2`.
///
/// Both ratios are expressed as `asset_1` per unit of `asset_2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridOrderDatum {
    pub owner: String,
    pub grid_id: u64,
    pub asset_1: Token,
    pub asset_2: Token,
    pub ratio_buy_1: Rational,
    pub ratio_sell_1: Rational,
    pub hold_1: bool,
    pub from_utxo: Option<OutputReference>,
}

impl PlutusData for GridOrderDatum {
    fn to_plutus(&self) -> Value {
        constr(
            0,
            vec![
                owner_to_plutus(&self.owner),
                int(self.grid_id),
                Value::Array(token_to_plutus(&self.asset_1)),
                Value::Array(token_to_plutus(&self.asset_2)),
                rational_to_plutus(&self.ratio_buy_1),
                rational_to_plutus(&self.ratio_sell_1),
                boolean(self.hold_1),
                link_to_plutus(&self.from_utxo),
            ],
        )
    }

    fn from_plutus(v: &Value) -> Result<Self> {
        let f = expect_record(v, 8, "GridOrderDatum")?;
        Ok(Self {
            owner: value_to_hex(&f[0])?,
            grid_id: value_to_u64(&f[1])?,
            asset_1: token_from_plutus(&f[2])?,
            asset_2: token_from_plutus(&f[3])?,
            ratio_buy_1: rational_from_plutus(&f[4])?,
            ratio_sell_1: rational_from_plutus(&f[5])?,
            hold_1: value_to_bool(&f[6])?,
            from_utxo: link_from_plutus(&f[7])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrderDatum {
    pub owner: String,
    pub sell_asset: Token,
    pub buy_asset: Token,
    pub sell_amount: u64,
    pub buy_amount: u64,
    pub from_utxo: Option<OutputReference>,
}

impl PlutusData for LimitOrderDatum {
    fn to_plutus(&self) -> Value {
        constr(
            0,
            vec![
                owner_to_plutus(&self.owner),
                Value::Array(token_to_plutus(&self.sell_asset)),
                Value::Array(token_to_plutus(&self.buy_asset)),
                int(self.sell_amount),
                int(self.buy_amount),
                link_to_plutus(&self.from_utxo),
            ],
        )
    }

    fn from_plutus(v: &Value) -> Result<Self> {
        let f = expect_record(v, 6, "LimitOrderDatum")?;
        Ok(Self {
            owner: value_to_hex(&f[0])?,
            sell_asset: token_from_plutus(&f[1])?,
            buy_asset: token_from_plutus(&f[2])?,
            sell_amount: value_to_u64(&f[3])?,
            buy_amount: value_to_u64(&f[4])?,
            from_utxo: link_from_plutus(&f[5])?,
        })
    }
}

/// A sell order whose asking price moves linearly with time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidingOrderDatum {
    pub owner: String,
    pub sell_asset: Token,
    pub buy_asset: Token,
    pub sell_amount: u64,
    pub buy_amount_start: u64,
    pub buy_amount_slope_per_ms: Rational,
    /// POSIX time in milliseconds.
    pub start_time: i64,
}

impl PlutusData for SlidingOrderDatum {
    fn to_plutus(&self) -> Value {
        constr(
            0,
            vec![
                owner_to_plutus(&self.owner),
                Value::Array(token_to_plutus(&self.sell_asset)),
                Value::Array(token_to_plutus(&self.buy_asset)),
                int(self.sell_amount),
                int(self.buy_amount_start),
                rational_to_plutus(&self.buy_amount_slope_per_ms),
                int(self.start_time),
            ],
        )
    }

    fn from_plutus(v: &Value) -> Result<Self> {
        let f = expect_record(v, 7, "SlidingOrderDatum")?;
        Ok(Self {
            owner: value_to_hex(&f[0])?,
            sell_asset: token_from_plutus(&f[1])?,
            buy_asset: token_from_plutus(&f[2])?,
            sell_amount: value_to_u64(&f[3])?,
            buy_amount_start: value_to_u64(&f[4])?,
            buy_amount_slope_per_ms: rational_from_plutus(&f[5])?,
            start_time: value_to_i64(&f[6])?,
        })
    }
}

/// One leg of a liquidity bin's fixed swap rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLeg {
    pub asset: Token,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityBinDatum {
    pub owner: String,
    pub swap_rate: (SwapLeg, SwapLeg),
    pub from_utxo: Option<OutputReference>,
}

fn leg_to_plutus(leg: &SwapLeg) -> Value {
    let mut items = token_to_plutus(&leg.asset);
    items.push(int(leg.weight));
    Value::Array(items)
}

fn leg_from_plutus(v: &Value) -> Result<SwapLeg> {
    let items = value_to_array(v)?;
    if items.len() != 3 {
        return Err(anyhow!("swap leg expected 3 items, got {}", items.len()));
    }
    let weight = value_to_u64(&items[2])?;
    if weight == 0 {
        return Err(anyhow!("swap leg weight must be positive"));
    }
    Ok(SwapLeg {
        asset: token_from_fields(&items[0], &items[1])?,
        weight,
    })
}

impl PlutusData for LiquidityBinDatum {
    fn to_plutus(&self) -> Value {
        constr(
            0,
            vec![
                owner_to_plutus(&self.owner),
                Value::Array(vec![
                    leg_to_plutus(&self.swap_rate.0),
                    leg_to_plutus(&self.swap_rate.1),
                ]),
                link_to_plutus(&self.from_utxo),
            ],
        )
    }

    fn from_plutus(v: &Value) -> Result<Self> {
        let f = expect_record(v, 3, "LiquidityBinDatum")?;
        let legs = value_to_array(&f[1])?;
        if legs.len() != 2 {
            return Err(anyhow!("swap rate expected 2 legs, got {}", legs.len()));
        }
        Ok(Self {
            owner: value_to_hex(&f[0])?,
            swap_rate: (leg_from_plutus(&legs[0])?, leg_from_plutus(&legs[1])?),
            from_utxo: link_from_plutus(&f[2])?,
        })
    }
}

/// Resting on-chain state of any supported order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDatum {
    Vault(VaultDatum),
    GridOrder(GridOrderDatum),
    LimitOrder(LimitOrderDatum),
    SlidingOrder(SlidingOrderDatum),
    LiquidityBin(LiquidityBinDatum),
}

impl OrderDatum {
    pub fn kind(&self) -> OrderKind {
        match self {
            OrderDatum::Vault(_) => OrderKind::Vault,
            OrderDatum::GridOrder(_) => OrderKind::GridOrder,
            OrderDatum::LimitOrder(_) => OrderKind::LimitOrder,
            OrderDatum::SlidingOrder(_) => OrderKind::SlidingOrder,
            OrderDatum::LiquidityBin(_) => OrderKind::LiquidityBin,
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            OrderDatum::Vault(d) => &d.owner,
            OrderDatum::GridOrder(d) => &d.owner,
            OrderDatum::LimitOrder(d) => &d.owner,
            OrderDatum::SlidingOrder(d) => &d.owner,
            OrderDatum::LiquidityBin(d) => &d.owner,
        }
    }

    /// The previous UTxO in this order's chain, if the kind keeps one.
    pub fn from_utxo(&self) -> Option<&OutputReference> {
        match self {
            OrderDatum::GridOrder(d) => d.from_utxo.as_ref(),
            OrderDatum::LimitOrder(d) => d.from_utxo.as_ref(),
            OrderDatum::LiquidityBin(d) => d.from_utxo.as_ref(),
            OrderDatum::Vault(_) | OrderDatum::SlidingOrder(_) => None,
        }
    }

    /// Byte-string fields must be hex of the expected length.
    pub fn validate(&self) -> SettlementResult<()> {
        check_owner(self.owner())?;
        match self {
            OrderDatum::Vault(_) => Ok(()),
            OrderDatum::GridOrder(d) => {
                check_token(&d.asset_1)?;
                check_token(&d.asset_2)?;
                check_link(&d.from_utxo)
            }
            OrderDatum::LimitOrder(d) => {
                check_token(&d.sell_asset)?;
                check_token(&d.buy_asset)?;
                check_link(&d.from_utxo)
            }
            OrderDatum::SlidingOrder(d) => {
                check_token(&d.sell_asset)?;
                check_token(&d.buy_asset)
            }
            OrderDatum::LiquidityBin(d) => {
                check_token(&d.swap_rate.0.asset)?;
                check_token(&d.swap_rate.1.asset)?;
                check_link(&d.from_utxo)
            }
        }
    }

    /// Validated inline datum CBOR.
    pub fn encode(&self) -> SettlementResult<String> {
        self.validate()?;
        Ok(self.to_cbor_hex())
    }

    fn to_cbor_hex(&self) -> String {
        match self {
            OrderDatum::Vault(d) => d.to_cbor_hex(),
            OrderDatum::GridOrder(d) => d.to_cbor_hex(),
            OrderDatum::LimitOrder(d) => d.to_cbor_hex(),
            OrderDatum::SlidingOrder(d) => d.to_cbor_hex(),
            OrderDatum::LiquidityBin(d) => d.to_cbor_hex(),
        }
    }

    pub fn decode(kind: OrderKind, cbor_hex: &str) -> Result<Self> {
        Ok(match kind {
            OrderKind::Vault => OrderDatum::Vault(VaultDatum::from_cbor_hex(cbor_hex)?),
            OrderKind::GridOrder => OrderDatum::GridOrder(GridOrderDatum::from_cbor_hex(cbor_hex)?),
            OrderKind::LimitOrder => {
                OrderDatum::LimitOrder(LimitOrderDatum::from_cbor_hex(cbor_hex)?)
            }
            OrderKind::SlidingOrder => {
                OrderDatum::SlidingOrder(SlidingOrderDatum::from_cbor_hex(cbor_hex)?)
            }
            OrderKind::LiquidityBin => {
                OrderDatum::LiquidityBin(LiquidityBinDatum::from_cbor_hex(cbor_hex)?)
            }
        })
    }
}
