//! # plutus-orders-rs
//!
//! Off-chain settlement for a family of Cardano order validators: vaults,
//! limit orders, grid orders, sliding (price-decaying) orders and liquidity
//! bins, plus one-shot and always-mint policies.
//!
//! Every settlement is computed the way the validators check it: script
//! inputs are addressed by their position in the ledger's canonical input
//! order, and each order's effect is the signed per-address asset delta
//! between what the transaction consumes and what it produces.
//!
//! ## Validators
//!
//! | Validator | Datum | Redeemer | Settlement |
//! |-----------|-------|----------|------------|
//! | Vault | owner | void | owner withdraws, optionally keeping a remainder |
//! | LimitOrder | sell/buy amounts | input, output, partial | fixed-ratio fill, full or partial |
//! | GridOrder | two ratios, held side | input, output | flips between buy and sell price |
//! | SlidingOrder | start price, slope | input, output | price decays linearly from start time |
//! | LiquidityBin | weighted swap rate | input, output | swap either asset at the bin rate |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plutus_orders_rs::config::Config;
//! use plutus_orders_rs::scenarios;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let steps = scenarios::run("limit_order", &Config::default(), None).await?;
//!     for step in steps {
//!         println!("{} {} fee={}", step.tx_hash, step.label, step.record.fees);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Run every scenario on the emulator
//! cargo run --release
//!
//! # Run one scenario and keep the report
//! cargo run --release -- --scenario grid_order --out grid.json
//!
//! # Inspect live outputs through Kupo
//! KUPO_URL=http://localhost:1442 cargo run --release -- --kupo 'addr_test1wq...'
//! ```

pub mod cbor;
pub mod config;
pub mod error;
pub mod kupo;
pub mod ledger;
pub mod manifest;
pub mod models;
pub mod scenarios;
pub mod strategy;
pub mod tx;
pub mod utils;
pub mod wallet;

pub use error::{SettlementError, SettlementResult};
pub use kupo::KupoApi;
pub use ledger::{Emulator, Ledger, LedgerDelta, UtxoSource};
pub use models::{Asset, OrderDatum, OrderKind, Token, Utxo, Value};
pub use strategy::{FillContext, Settlement};
pub use tx::TxBuilder;
