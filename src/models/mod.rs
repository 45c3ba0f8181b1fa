pub mod asset;
pub mod datum;
pub mod rational;
pub mod redeemer;
pub mod tx;
pub mod utxo;
pub mod value;

pub use asset::{token_identifier, token_name, Asset, Token, LOVELACE};
pub use datum::{
    GridOrderDatum, LimitOrderDatum, LiquidityBinDatum, OrderDatum, OrderKind, SlidingOrderDatum,
    SwapLeg, VaultDatum,
};
pub use rational::Rational;
pub use redeemer::Redeemer;
pub use tx::{ScriptSpend, TxRequest, ValidityInterval};
pub use utxo::{
    Holding, KupoDatumResponse, KupoQuantity, KupoUtxoResponse, KupoValue, OutputReference,
    TxOutput, Utxo,
};
pub use value::Value;
