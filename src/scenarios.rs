//! End-to-end runs of every validator against the in-memory emulator.
//!
//! Each scenario funds two wallets, drives a short order lifecycle and returns
//! the report of every transaction it submitted.
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::SettlementError;
use crate::ledger::{Emulator, EmulatorConfig, Ledger, TxRecord, UtxoSource};
use crate::manifest::{resolve_script, Blueprint, Script};
use crate::models::{
    Asset, GridOrderDatum, LimitOrderDatum, LiquidityBinDatum, OrderKind, Rational,
    SlidingOrderDatum, SwapLeg, Token, TxOutput, Utxo, ValidityInterval, Value,
};
use crate::strategy::mint::{mint_request, MintingPolicy};
use crate::strategy::{
    always_succeed, cancel, grid_order, limit_order, liquidity_bin, sliding_order, vault,
    FillContext, MIN_UTXO_LOVELACE,
};
use crate::tx::TxBuilder;
use crate::utils::Network;
use crate::wallet::Wallet;

pub const SCENARIOS: &[&str] = &[
    "vault",
    "keep_stake",
    "limit_order",
    "grid_order",
    "sliding_order",
    "swap",
    "mint",
    "always_succeed",
];

const ADA: u64 = 1_000_000;
/// Blocks to wait after each submission.
const SETTLE_BLOCKS: u64 = 4;

#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub label: String,
    pub tx_hash: String,
    pub record: TxRecord,
}

pub struct Harness {
    pub ledger: Emulator,
    pub network: Network,
    pub alice: Wallet,
    pub bob: Wallet,
    known: HashMap<String, String>,
    blueprint: Option<Blueprint>,
    steps: Vec<Step>,
}

impl Harness {
    /// Alice starts with 2000 ada and Bob with 3000 ada.
    pub fn new(config: &Config, blueprint: Option<Blueprint>) -> Result<Self> {
        let network = config.network;
        let alice = Wallet::generate("alice", network)?;
        let bob = Wallet::generate("bob", network)?;
        let mut emulator_config = EmulatorConfig {
            block_ms: config.emulator_block_ms,
            ..Default::default()
        };
        if let Some(start) = config.emulator_start_ms {
            emulator_config.start_time_ms = start;
        }
        let ledger = Emulator::new(
            vec![
                (alice.address.clone(), Value::lovelace(2000 * ADA)),
                (bob.address.clone(), Value::lovelace(3000 * ADA)),
            ],
            emulator_config,
        );

        let mut known = HashMap::new();
        known.insert(alice.address.clone(), "Alice".to_string());
        known.insert(bob.address.clone(), "Bob".to_string());
        Ok(Self {
            ledger,
            network,
            alice,
            bob,
            known,
            blueprint,
            steps: Vec::new(),
        })
    }

    pub fn script(&self, title: &str) -> Script {
        resolve_script(self.blueprint.as_ref(), title)
    }

    /// Address of `script`, remembered under `nickname` in reports.
    pub fn address_of(&mut self, script: &Script, nickname: &str) -> Result<String> {
        let address = script.address(self.network)?;
        self.known.insert(address.clone(), nickname.to_string());
        Ok(address)
    }

    pub fn nickname(&mut self, address: &str, nickname: &str) {
        self.known.insert(address.to_string(), nickname.to_string());
    }

    pub async fn utxos(&self, wallet: &Wallet) -> Result<Vec<Utxo>> {
        Ok(wallet.utxos(&self.ledger).await?)
    }

    pub async fn utxos_at(&self, address: &str) -> Result<Vec<Utxo>> {
        Ok(self.ledger.utxos_at(address).await?)
    }

    pub fn fill_context(&self, inputs: &[Utxo], output_offset: u64) -> FillContext {
        FillContext::new(self.network)
            .with_inputs(inputs)
            .at_output(output_offset)
    }

    /// Balance `builder` with change to `payer`, submit it signed by
    /// `signers`, then let a few blocks pass.
    pub async fn submit(
        &mut self,
        label: &str,
        builder: TxBuilder,
        payer: &Wallet,
        signers: &[&Wallet],
    ) -> Result<String> {
        self.submit_and_wait(label, builder, payer, signers, SETTLE_BLOCKS)
            .await
    }

    /// [`Harness::submit`] with an explicit number of blocks to wait.
    pub async fn submit_and_wait(
        &mut self,
        label: &str,
        builder: TxBuilder,
        payer: &Wallet,
        signers: &[&Wallet],
        blocks: u64,
    ) -> Result<String> {
        let (tx, inputs) = builder.complete(&payer.address)?;
        let record = TxRecord::new(&tx, inputs, &self.known);
        let witnesses: Vec<String> = signers.iter().flat_map(|w| w.witness()).collect();
        let tx_hash = self.ledger.submit(&tx, &witnesses).await?;
        info!(tx = %tx_hash, "{}", label);
        self.ledger.await_block(blocks).await;
        self.steps.push(Step {
            label: label.to_string(),
            tx_hash: tx_hash.clone(),
            record,
        });
        Ok(tx_hash)
    }

    /// Mint `amount` PIZADA for each wallet under the always-mint policy.
    pub async fn mint_pizada(&mut self, amount: u64) -> Result<Token> {
        let script = self.script("mint.always_mint");
        let policy = MintingPolicy::Always {
            policy_id: script.hash,
        };
        let quantities = mint_request(&policy, &[], &[("PIZADA", 2 * amount as i64)])?;
        let pizada = Token::Asset(Asset::from_text(policy.policy_id(), "PIZADA"));

        let alice = self.alice.clone();
        let bob = self.bob.clone();
        let builder = TxBuilder::new()
            .spend(&self.utxos(&alice).await?)
            .mint(quantities)
            .pay(TxOutput::new(
                &bob.address,
                Value::lovelace(MIN_UTXO_LOVELACE).with_token(&pizada, amount),
            ));
        self.submit("Alice mints PIZADA for herself and Bob", builder, &alice, &[&alice])
            .await?;
        Ok(pizada)
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

/// Run scenario `name` on a fresh emulator.
pub async fn run(name: &str, config: &Config, blueprint: Option<Blueprint>) -> Result<Vec<Step>> {
    let mut h = Harness::new(config, blueprint)?;
    match name {
        "vault" => vault_scenario(&mut h, false).await?,
        "keep_stake" => vault_scenario(&mut h, true).await?,
        "limit_order" => limit_order_scenario(&mut h).await?,
        "grid_order" => grid_order_scenario(&mut h).await?,
        "sliding_order" => sliding_order_scenario(&mut h).await?,
        "swap" => swap_scenario(&mut h).await?,
        "mint" => mint_scenario(&mut h).await?,
        "always_succeed" => always_succeed_scenario(&mut h).await?,
        other => return Err(anyhow!("unknown scenario '{}'", other)),
    }
    Ok(h.into_steps())
}

async fn vault_scenario(h: &mut Harness, keep_stake: bool) -> Result<()> {
    let script = h.script(OrderKind::Vault.validator_title());
    let (alice, bob) = (h.alice.clone(), h.bob.clone());
    let address = if keep_stake {
        let address = alice.staked_script_address(&script.hash, h.network)?;
        h.nickname(&address, "Vault with Alice stake");
        address
    } else {
        h.address_of(&script, "Vault")?
    };

    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .pay(vault::lock(&alice.key_hash, &address, Value::lovelace(100 * ADA))?);
    h.submit("Alice locks 100 ada in the vault", builder, &alice, &[&alice])
        .await?;

    let locked = first(h.utxos_at(&address).await?, "vault UTxO")?;
    match vault::request_withdrawal(&locked, &Value::new(), &bob.key_hash) {
        Err(e @ SettlementError::Unauthorized { .. }) => warn!("Bob cannot withdraw: {}", e),
        other => return Err(anyhow!("Bob's withdrawal should be refused, got {:?}", other)),
    }

    let keep = Value::lovelace(50 * ADA);
    let settlement = vault::request_withdrawal(&locked, &keep, &alice.key_hash)?;
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .settle(settlement)?;
    h.submit("Alice takes back 50 of the 100 ada", builder, &alice, &[&alice])
        .await?;

    let locked = first(h.utxos_at(&address).await?, "vault UTxO")?;
    let settlement = vault::request_withdrawal(&locked, &Value::new(), &alice.key_hash)?;
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .settle(settlement)?;
    h.submit("Alice empties the vault", builder, &alice, &[&alice])
        .await?;
    Ok(())
}

async fn limit_order_scenario(h: &mut Harness) -> Result<()> {
    let pizada = h.mint_pizada(100).await?;
    let script = h.script(OrderKind::LimitOrder.validator_title());
    let address = h.address_of(&script, "LimitOrderContract")?;
    let (alice, bob) = (h.alice.clone(), h.bob.clone());

    let datum = LimitOrderDatum {
        owner: alice.key_hash.clone(),
        sell_asset: pizada,
        buy_asset: Token::Lovelace,
        sell_amount: 42,
        buy_amount: 420 * ADA,
        from_utxo: None,
    };
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .pay(limit_order::place(&address, datum)?);
    h.submit("Alice sells 42 PIZADA for 420 ada", builder, &alice, &[&alice])
        .await?;

    let order = first(h.utxos_at(&address).await?, "limit order")?;
    let wallet = h.utxos(&bob).await?;
    let settlement = limit_order::settle(&order, 20, true, &h.fill_context(&wallet, 0))?;
    let builder = TxBuilder::new().spend(&wallet).settle(settlement)?;
    h.submit("Bob buys 20 PIZADA for 200 ada", builder, &bob, &[&bob])
        .await?;

    let order = first(h.utxos_at(&address).await?, "limit order")?;
    let wallet = h.utxos(&bob).await?;
    let settlement = limit_order::settle(&order, 22, false, &h.fill_context(&wallet, 0))?;
    let builder = TxBuilder::new().spend(&wallet).settle(settlement)?;
    h.submit("Bob buys the remaining 22 PIZADA", builder, &bob, &[&bob])
        .await?;
    Ok(())
}

async fn grid_order_scenario(h: &mut Harness) -> Result<()> {
    let pizada = h.mint_pizada(100).await?;
    let script = h.script(OrderKind::GridOrder.validator_title());
    let address = h.address_of(&script, "GridOrderContract")?;
    let (alice, bob) = (h.alice.clone(), h.bob.clone());

    let datum = GridOrderDatum {
        owner: alice.key_hash.clone(),
        grid_id: 0,
        asset_1: Token::Lovelace,
        asset_2: pizada.clone(),
        ratio_buy_1: Rational::new(2 * ADA as i64, 1)?,
        ratio_sell_1: Rational::new(ADA as i64, 1)?,
        hold_1: false,
        from_utxo: None,
    };
    let deposit = Value::lovelace(MIN_UTXO_LOVELACE).with_token(&pizada, 42);
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .pay(grid_order::place(&address, datum, deposit)?);
    h.submit("Alice grids 42 PIZADA between 1 and 2 ada", builder, &alice, &[&alice])
        .await?;

    let order = first(h.utxos_at(&address).await?, "grid order")?;
    let wallet = h.utxos(&bob).await?;
    let settlement = grid_order::settle(&order, 42, &h.fill_context(&wallet, 0))?;
    let builder = TxBuilder::new().spend(&wallet).settle(settlement)?;
    h.submit("Bob buys 42 PIZADA for 84 ada", builder, &bob, &[&bob])
        .await?;

    let order = first(h.utxos_at(&address).await?, "grid order")?;
    let wallet = h.utxos(&bob).await?;
    let settlement = grid_order::settle(&order, 84 * ADA, &h.fill_context(&wallet, 0))?;
    let builder = TxBuilder::new().spend(&wallet).settle(settlement)?;
    h.submit("Bob sells 84 PIZADA back for 84 ada", builder, &bob, &[&bob])
        .await?;

    let order = first(h.utxos_at(&address).await?, "grid order")?;
    let wallet = h.utxos(&alice).await?;
    let settlement = cancel(
        &order,
        OrderKind::GridOrder,
        &alice.key_hash,
        &h.fill_context(&wallet, 0),
    )?;
    let builder = TxBuilder::new().spend(&wallet).settle(settlement)?;
    h.submit("Alice closes her grid", builder, &alice, &[&alice])
        .await?;
    Ok(())
}

async fn sliding_order_scenario(h: &mut Harness) -> Result<()> {
    let pizada = h.mint_pizada(100).await?;
    let script = h.script(OrderKind::SlidingOrder.validator_title());
    let address = h.address_of(&script, "SlidingOrderContract")?;
    let (alice, bob) = (h.alice.clone(), h.bob.clone());

    let start_time = h.ledger.now().await;
    let datum = SlidingOrderDatum {
        owner: alice.key_hash.clone(),
        sell_asset: pizada,
        buy_asset: Token::Lovelace,
        sell_amount: 42,
        buy_amount_start: 420 * ADA,
        // one ada less every second
        buy_amount_slope_per_ms: Rational::new(-(ADA as i64), 1000)?,
        start_time: start_time as i64,
    };
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .pay(sliding_order::place(&address, datum)?);
    // one block of decay before Bob fills
    h.submit_and_wait(
        "Alice sells 42 PIZADA from 420 ada, decaying",
        builder,
        &alice,
        &[&alice],
        1,
    )
    .await?;

    let now = h.ledger.now().await;
    let order = first(h.utxos_at(&address).await?, "sliding order")?;
    let wallet = h.utxos(&bob).await?;
    let validity = ValidityInterval::between(now, now + 10_000);
    let settlement =
        sliding_order::settle(&order, 42, validity, &h.fill_context(&wallet, 0))?;
    let builder = TxBuilder::new().spend(&wallet).settle(settlement)?;
    h.submit("Bob buys the 42 PIZADA at the decayed price", builder, &bob, &[&bob])
        .await?;
    Ok(())
}

async fn swap_scenario(h: &mut Harness) -> Result<()> {
    let pizada = h.mint_pizada(100).await?;
    let script = h.script(OrderKind::LiquidityBin.validator_title());
    let address = h.address_of(&script, "LiquidityBinContract")?;
    let (alice, bob) = (h.alice.clone(), h.bob.clone());

    let datum = LiquidityBinDatum {
        owner: alice.key_hash.clone(),
        swap_rate: (
            SwapLeg {
                asset: Token::Lovelace,
                weight: 100,
            },
            SwapLeg {
                asset: pizada.clone(),
                weight: 1,
            },
        ),
        from_utxo: None,
    };
    let deposit = Value::lovelace(MIN_UTXO_LOVELACE).with_token(&pizada, 42);
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .pay(liquidity_bin::place(&address, datum, deposit)?);
    h.submit("Alice opens a bin with 42 PIZADA", builder, &alice, &[&alice])
        .await?;

    let bin = first(h.utxos_at(&address).await?, "liquidity bin")?;
    let wallet = h.utxos(&bob).await?;
    let settlement =
        liquidity_bin::settle(&bin, &Token::Lovelace, 1000, &h.fill_context(&wallet, 0))?;
    let builder = TxBuilder::new().spend(&wallet).settle(settlement)?;
    h.submit("Bob swaps 1000 lovelace for 10 PIZADA", builder, &bob, &[&bob])
        .await?;

    let bin = first(h.utxos_at(&address).await?, "liquidity bin")?;
    let wallet = h.utxos(&bob).await?;
    let settlement = liquidity_bin::settle(&bin, &pizada, 3, &h.fill_context(&wallet, 0))?;
    let builder = TxBuilder::new().spend(&wallet).settle(settlement)?;
    h.submit("Bob swaps 3 PIZADA back for 300 lovelace", builder, &bob, &[&bob])
        .await?;
    Ok(())
}

async fn mint_scenario(h: &mut Harness) -> Result<()> {
    let alice = h.alice.clone();
    let script = h.script("mint.always_mint");
    let always = MintingPolicy::Always {
        policy_id: script.hash,
    };

    let quantities = mint_request(&always, &[], &[("PIZADA1", 10), ("PIZADA2", 20)])?;
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .mint(quantities);
    h.submit("Alice mints 10 PIZADA1 and 20 PIZADA2", builder, &alice, &[&alice])
        .await?;

    let quantities = mint_request(&always, &[], &[("PIZADA1", -10)])?;
    let builder = TxBuilder::new()
        .spend(&h.utxos(&alice).await?)
        .mint(quantities);
    h.submit("Alice burns her 10 PIZADA1", builder, &alice, &[&alice])
        .await?;

    let wallet = h.utxos(&alice).await?;
    let seed = first(wallet.clone(), "seed UTxO")?.reference();
    let one_shot = MintingPolicy::OneShot {
        policy_id: h.script("mint.one_shot").hash,
        seed,
    };
    let refs: Vec<_> = wallet.iter().map(Utxo::reference).collect();
    let quantities = mint_request(&one_shot, &refs, &[("UNIQUE", 1)])?;
    let builder = TxBuilder::new().spend(&wallet).mint(quantities);
    h.submit("Alice mints a one-shot UNIQUE token", builder, &alice, &[&alice])
        .await?;

    let refs: Vec<_> = h.utxos(&alice).await?.iter().map(Utxo::reference).collect();
    match mint_request(&one_shot, &refs, &[("UNIQUE", 1)]) {
        Err(e @ SettlementError::TargetNotFound(_)) => warn!("second one-shot mint refused: {}", e),
        other => return Err(anyhow!("one-shot policy minted twice: {:?}", other)),
    }
    Ok(())
}

async fn always_succeed_scenario(h: &mut Harness) -> Result<()> {
    let script = always_succeed::script();
    let address = h.address_of(&script, "AlwaysSucceed")?;
    let (alice, bob) = (h.alice.clone(), h.bob.clone());

    let mut builder = TxBuilder::new().spend(&h.utxos(&alice).await?);
    for output in always_succeed::lock(&address, 100 * ADA) {
        builder = builder.pay(output);
    }
    h.submit("Alice locks 100 ada and the script", builder, &alice, &[&alice])
        .await?;

    let at_script = h.utxos_at(&address).await?;
    let (reference, spendable) = always_succeed::partition(&at_script)?;
    let locked = spendable
        .first()
        .ok_or_else(|| anyhow!("nothing locked at {}", address))?;
    let settlement = always_succeed::redeem(locked, reference)?;
    let builder = TxBuilder::new()
        .spend(&h.utxos(&bob).await?)
        .settle(settlement)?;
    h.submit("Bob redeems the 100 ada through the reference script", builder, &bob, &[&bob])
        .await?;
    Ok(())
}

fn first(utxos: Vec<Utxo>, what: &str) -> Result<Utxo> {
    utxos
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no {} found", what))
}

