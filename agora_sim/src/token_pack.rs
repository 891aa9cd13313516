//! TokenPack - a single-pool token market used as the reference world.
//!
//! Every account holds `BASE` and `QUOTE` balances and may approve other
//! accounts to move its funds. One constant-product pool (`x * y = k`,
//! fee taken from the input) sets the price.
//!
//! Every action runs against a scratch copy of the ledger that is only
//! committed on success, so a failed apply never changes the world.

use agora_env::{Action, ActionResult, ApplyContext, Pack, PackSetup, SetupError, StateView};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub const BASE: &str = "BASE";
pub const QUOTE: &str = "QUOTE";

/// Account that receives transfers no agent owns.
pub const TREASURY: &str = "treasury";

/// Pack name recorded in artifacts.
pub const PACK_NAME: &str = "token";

/// Initialization parameters (`pack_params` in a scenario).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPackParams {
    /// BASE given to every agent account
    pub initial_base: f64,
    /// QUOTE given to every agent account
    pub initial_quote: f64,
    pub pool_base: f64,
    pub pool_quote: f64,
    /// Fraction of the input kept by the pool
    pub fee: f64,
    /// Legs a `batch_swap` may execute before it times out
    pub max_steps_per_action: usize,
}

impl Default for TokenPackParams {
    fn default() -> Self {
        Self {
            initial_base: 1_000.0,
            initial_quote: 1_000.0,
            pool_base: 10_000.0,
            pool_quote: 10_000.0,
            fee: 0.003,
            max_steps_per_action: 4,
        }
    }
}

/// Snapshot of the market handed to agents and preconditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenWorld {
    pub tick: u64,
    pub timestamp: u64,
    /// account -> asset -> amount
    pub balances: BTreeMap<String, BTreeMap<String, f64>>,
    /// (owner, spender, asset) -> amount
    pub allowances: BTreeMap<(String, String, String), f64>,
    pub reserve_base: f64,
    pub reserve_quote: f64,
    pub fee: f64,
}

impl TokenWorld {
    /// QUOTE per BASE implied by the pool.
    pub fn price(&self) -> f64 {
        if self.reserve_base > 0.0 {
            self.reserve_quote / self.reserve_base
        } else {
            0.0
        }
    }

    /// Supply of `asset` across accounts and the pool.
    pub fn total(&self, asset: &str) -> f64 {
        let held: f64 = self
            .balances
            .values()
            .filter_map(|assets| assets.get(asset))
            .sum();
        let pooled = match asset {
            BASE => self.reserve_base,
            QUOTE => self.reserve_quote,
            _ => 0.0,
        };
        held + pooled
    }

    fn balance_mut(&mut self, account: &str, asset: &str) -> Result<&mut f64, ActionResult> {
        self.balances
            .get_mut(account)
            .ok_or_else(|| ActionResult::revert(format!("unknown account '{}'", account)))?
            .get_mut(asset)
            .ok_or_else(|| ActionResult::revert(format!("unknown asset '{}'", asset)))
    }

    fn debit(&mut self, account: &str, asset: &str, amount: f64) -> Result<(), ActionResult> {
        let balance = self.balance_mut(account, asset)?;
        if *balance < amount {
            return Err(ActionResult::revert("insufficient balance"));
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, account: &str, asset: &str, amount: f64) -> Result<(), ActionResult> {
        *self.balance_mut(account, asset)? += amount;
        Ok(())
    }

    /// Executes one swap leg, returning `amount_out`.
    fn swap(
        &mut self,
        trader: &str,
        side: Side,
        amount_in: f64,
        min_out: f64,
    ) -> Result<f64, ActionResult> {
        let (asset_in, asset_out) = side.assets();
        let (reserve_in, reserve_out) = match side {
            Side::Buy => (self.reserve_quote, self.reserve_base),
            Side::Sell => (self.reserve_base, self.reserve_quote),
        };

        let in_after_fee = amount_in * (1.0 - self.fee);
        let amount_out = reserve_out * in_after_fee / (reserve_in + in_after_fee);
        if !amount_out.is_finite() || amount_out <= 0.0 {
            return Err(ActionResult::revert("insufficient liquidity"));
        }
        if amount_out < min_out {
            return Err(ActionResult::revert("slippage"));
        }

        self.debit(trader, asset_in, amount_in)?;
        self.credit(trader, asset_out, amount_out)?;
        match side {
            Side::Buy => {
                self.reserve_quote += amount_in;
                self.reserve_base -= amount_out;
            }
            Side::Sell => {
                self.reserve_base += amount_in;
                self.reserve_quote -= amount_out;
            }
        }
        Ok(amount_out)
    }
}

impl StateView for TokenWorld {
    fn balance(&self, account: &str, asset: &str) -> Option<f64> {
        self.balances.get(account)?.get(asset).copied()
    }

    fn allowance(&self, owner: &str, spender: &str, asset: &str) -> Option<f64> {
        self.allowances
            .get(&(owner.to_string(), spender.to_string(), asset.to_string()))
            .copied()
    }

    fn value(&self, key: &str) -> Option<f64> {
        match key {
            "price" => Some(self.price()),
            "reserve_base" => Some(self.reserve_base),
            "reserve_quote" => Some(self.reserve_quote),
            "fee" => Some(self.fee),
            "tick" => Some(self.tick as f64),
            "timestamp" => Some(self.timestamp as f64),
            _ => None,
        }
    }
}

/// Direction of a swap, from the trader's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Pay QUOTE, receive BASE
    Buy,
    /// Pay BASE, receive QUOTE
    Sell,
}

impl Side {
    fn assets(&self) -> (&'static str, &'static str) {
        match self {
            Side::Buy => (QUOTE, BASE),
            Side::Sell => (BASE, QUOTE),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(format!("invalid side '{}'", s)),
        }
    }
}

/// Running totals that are not part of the world state.
#[derive(Debug, Clone, Default, PartialEq)]
struct MarketStats {
    /// Traded volume in QUOTE
    volume: f64,
    swap_count: u64,
    revert_count: u64,
}

/// What a committed action contributed to the stats.
struct Effect {
    volume: f64,
    swaps: u64,
    data: Value,
}

/// The reference market pack.
#[derive(Debug, Clone, Default)]
pub struct TokenPack {
    params: TokenPackParams,
    world: TokenWorld,
    stats: MarketStats,
}

impl TokenPack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &TokenPackParams {
        &self.params
    }

    pub fn world(&self) -> &TokenWorld {
        &self.world
    }

    /// Runs `f` against a scratch ledger and commits it only on success.
    fn transact<F>(&mut self, f: F) -> ActionResult
    where
        F: FnOnce(&mut TokenWorld) -> Result<Effect, ActionResult>,
    {
        let mut scratch = self.world.clone();
        match f(&mut scratch) {
            Ok(effect) => {
                self.world = scratch;
                self.stats.volume += effect.volume;
                self.stats.swap_count += effect.swaps;
                ActionResult::ok_with(effect.data)
            }
            Err(failure) => {
                self.stats.revert_count += 1;
                failure
            }
        }
    }

    fn swap(&mut self, trader: &str, action: &Action) -> ActionResult {
        let leg = match SwapLeg::from_params(
            action.param("side"),
            action.param("amount_in"),
            action.param("min_out"),
        ) {
            Ok(leg) => leg,
            Err(failure) => return self.reject(failure),
        };
        self.transact(|world| {
            let out = world.swap(trader, leg.side, leg.amount_in, leg.min_out)?;
            Ok(Effect {
                volume: leg.quote_volume(out),
                swaps: 1,
                data: json!({ "amount_out": out }),
            })
        })
    }

    fn batch_swap(&mut self, trader: &str, action: &Action) -> ActionResult {
        let legs = match action.param("legs").and_then(Value::as_array) {
            Some(legs) if !legs.is_empty() => legs,
            Some(_) => return self.reject(ActionResult::revert("empty batch")),
            None => return self.reject(ActionResult::revert("missing 'legs'")),
        };
        let max_steps = self.params.max_steps_per_action;
        if legs.len() > max_steps {
            return self.reject(ActionResult::timeout(format!(
                "batch of {} legs exceeds {} steps",
                legs.len(),
                max_steps
            )));
        }

        let mut parsed = Vec::with_capacity(legs.len());
        for (i, leg) in legs.iter().enumerate() {
            match SwapLeg::from_params(leg.get("side"), leg.get("amount_in"), leg.get("min_out")) {
                Ok(leg) => parsed.push(leg),
                Err(failure) => return self.reject(with_leg(i, failure)),
            }
        }

        self.transact(|world| {
            let mut volume = 0.0;
            let mut outs = Vec::with_capacity(parsed.len());
            for (i, leg) in parsed.iter().enumerate() {
                let out = world
                    .swap(trader, leg.side, leg.amount_in, leg.min_out)
                    .map_err(|failure| with_leg(i, failure))?;
                volume += leg.quote_volume(out);
                outs.push(out);
            }
            Ok(Effect {
                volume,
                swaps: parsed.len() as u64,
                data: json!({ "amounts_out": outs }),
            })
        })
    }

    fn transfer(&mut self, sender: &str, action: &Action) -> ActionResult {
        let (Some(to), Some(asset)) = (action.param_str("to"), action.param_str("asset")) else {
            return self.reject(ActionResult::revert("transfer needs 'to' and 'asset'"));
        };
        let amount = match positive_amount(action.param("amount")) {
            Ok(amount) => amount,
            Err(failure) => return self.reject(failure),
        };
        // `from` other than the sender spends an allowance
        let from = action.param_str("from").unwrap_or(sender);

        self.transact(|world| {
            if from != sender {
                let key = (from.to_string(), sender.to_string(), asset.to_string());
                let allowance = world.allowances.get(&key).copied().unwrap_or(0.0);
                if allowance < amount {
                    return Err(ActionResult::revert("insufficient allowance"));
                }
                world.allowances.insert(key, allowance - amount);
            }
            world.debit(from, asset, amount)?;
            world.credit(to, asset, amount)?;
            Ok(Effect {
                volume: 0.0,
                swaps: 0,
                data: json!({ "amount": amount }),
            })
        })
    }

    fn approve(&mut self, owner: &str, action: &Action) -> ActionResult {
        let (Some(spender), Some(asset)) =
            (action.param_str("spender"), action.param_str("asset"))
        else {
            return self.reject(ActionResult::revert("approve needs 'spender' and 'asset'"));
        };
        let amount = match action.param_f64("amount") {
            Some(a) if a.is_finite() && a >= 0.0 => a,
            _ => return self.reject(ActionResult::revert("invalid amount")),
        };

        self.transact(|world| {
            if !world.balances.contains_key(spender) {
                return Err(ActionResult::revert(format!("unknown account '{}'", spender)));
            }
            if world.balance(owner, asset).is_none() {
                return Err(ActionResult::revert(format!("unknown asset '{}'", asset)));
            }
            world
                .allowances
                .insert((owner.to_string(), spender.to_string(), asset.to_string()), amount);
            Ok(Effect {
                volume: 0.0,
                swaps: 0,
                data: Value::Null,
            })
        })
    }

    /// Counts a failure detected before any state was touched.
    fn reject(&mut self, failure: ActionResult) -> ActionResult {
        self.stats.revert_count += 1;
        failure
    }
}

impl Pack for TokenPack {
    type View = TokenWorld;

    fn name(&self) -> &str {
        PACK_NAME
    }

    fn initialize(&mut self, setup: &PackSetup<'_>) -> Result<(), SetupError> {
        let params: TokenPackParams = if setup.params.is_null() {
            TokenPackParams::default()
        } else {
            serde_json::from_value(setup.params.clone())
                .map_err(|e| SetupError::invalid_param("pack_params", e.to_string()))?
        };

        for (name, value) in [
            ("initial_base", params.initial_base),
            ("initial_quote", params.initial_quote),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SetupError::invalid_param(name, "must be a finite non-negative number"));
            }
        }
        for (name, value) in [("pool_base", params.pool_base), ("pool_quote", params.pool_quote)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SetupError::invalid_param(name, "pool reserves must be positive"));
            }
        }
        if !(0.0..1.0).contains(&params.fee) {
            return Err(SetupError::invalid_param("fee", "must be in [0, 1)"));
        }
        if params.max_steps_per_action == 0 {
            return Err(SetupError::invalid_param("max_steps_per_action", "must be at least 1"));
        }

        let mut world = TokenWorld {
            reserve_base: params.pool_base,
            reserve_quote: params.pool_quote,
            fee: params.fee,
            ..Default::default()
        };
        for agent in setup.agents {
            if agent.as_str() == TREASURY {
                return Err(SetupError::PackInit(format!("agent id '{}' is reserved", TREASURY)));
            }
            let mut assets = BTreeMap::new();
            assets.insert(BASE.to_string(), params.initial_base);
            assets.insert(QUOTE.to_string(), params.initial_quote);
            world.balances.insert(agent.to_string(), assets);
        }
        let mut treasury = BTreeMap::new();
        treasury.insert(BASE.to_string(), 0.0);
        treasury.insert(QUOTE.to_string(), 0.0);
        world.balances.insert(TREASURY.to_string(), treasury);

        debug!(
            "TokenPack initialized: {} accounts, pool {}/{}",
            world.balances.len(),
            world.reserve_base,
            world.reserve_quote
        );

        self.params = params;
        self.world = world;
        self.stats = MarketStats::default();
        Ok(())
    }

    fn advance(&mut self, tick: u64, timestamp: u64) {
        self.world.tick = tick;
        self.world.timestamp = timestamp;
    }

    fn apply(&mut self, ctx: &ApplyContext<'_>, action: &Action) -> ActionResult {
        let agent = ctx.agent.as_str();
        match action.name.as_str() {
            "swap" => self.swap(agent, action),
            "batch_swap" => self.batch_swap(agent, action),
            "transfer" => self.transfer(agent, action),
            "approve" => self.approve(agent, action),
            other => self.reject(ActionResult::revert(format!("unknown action '{}'", other))),
        }
    }

    fn snapshot(&self) -> TokenWorld {
        self.world.clone()
    }

    fn metric(&self, key: &str) -> Option<f64> {
        match key {
            "volume" => Some(self.stats.volume),
            "swap_count" => Some(self.stats.swap_count as f64),
            "revert_count" => Some(self.stats.revert_count as f64),
            "total_base" => Some(self.world.total(BASE)),
            "total_quote" => Some(self.world.total(QUOTE)),
            _ => self.world.value(key),
        }
    }
}

/// A validated swap request.
#[derive(Debug, Clone, Copy)]
struct SwapLeg {
    side: Side,
    amount_in: f64,
    min_out: f64,
}

impl SwapLeg {
    fn from_params(
        side: Option<&Value>,
        amount_in: Option<&Value>,
        min_out: Option<&Value>,
    ) -> Result<Self, ActionResult> {
        let side = side
            .and_then(Value::as_str)
            .ok_or_else(|| ActionResult::revert("missing 'side'"))?
            .parse::<Side>()
            .map_err(ActionResult::revert)?;
        let amount_in = positive_amount(amount_in)?;
        let min_out = match min_out {
            None | Some(Value::Null) => 0.0,
            Some(v) => v
                .as_f64()
                .filter(|m| m.is_finite() && *m >= 0.0)
                .ok_or_else(|| ActionResult::revert("invalid min_out"))?,
        };
        Ok(Self {
            side,
            amount_in,
            min_out,
        })
    }

    fn quote_volume(&self, amount_out: f64) -> f64 {
        match self.side {
            Side::Buy => self.amount_in,
            Side::Sell => amount_out,
        }
    }
}

fn positive_amount(value: Option<&Value>) -> Result<f64, ActionResult> {
    value
        .and_then(Value::as_f64)
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or_else(|| ActionResult::revert("invalid amount"))
}

fn with_leg(index: usize, mut failure: ActionResult) -> ActionResult {
    let reason = failure.reason.take().unwrap_or_default();
    failure.reason = Some(format!("leg {}: {}", index, reason));
    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_env::{ActionId, AgentId, FailureKind};
    use proptest::prelude::*;

    fn agents() -> Vec<AgentId> {
        vec![AgentId::from("trader-0"), AgentId::from("trader-1")]
    }

    fn pack_with(params: Value) -> TokenPack {
        let agents = agents();
        let mut pack = TokenPack::new();
        pack.initialize(&PackSetup {
            params: &params,
            seconds_per_tick: 12,
            agents: &agents,
        })
        .unwrap();
        pack
    }

    fn pack() -> TokenPack {
        pack_with(json!({}))
    }

    fn action(name: &str) -> Action {
        Action::new(ActionId::from_parts(0, 0, 0), name)
    }

    fn apply_as(pack: &mut TokenPack, agent: &str, action: &Action) -> ActionResult {
        let agent = AgentId::from(agent);
        pack.apply(
            &ApplyContext {
                tick: 0,
                timestamp: 0,
                agent: &agent,
            },
            action,
        )
    }

    fn swap(side: &str, amount_in: f64) -> Action {
        action("swap").with_param("side", side).with_param("amount_in", amount_in)
    }

    #[test]
    fn test_initial_state() {
        let pack = pack();
        let world = pack.snapshot();
        assert_eq!(world.balance("trader-0", BASE), Some(1_000.0));
        assert_eq!(world.balance(TREASURY, QUOTE), Some(0.0));
        assert_eq!(world.balance("nobody", BASE), None);
        assert_eq!(world.value("price"), Some(1.0));
        assert_eq!(pack.metric("total_base"), Some(12_000.0));
    }

    #[test]
    fn test_swap_moves_price_and_conserves_supply() {
        let mut pack = pack();
        let result = apply_as(&mut pack, "trader-0", &swap("buy", 100.0));
        assert!(result.success, "{:?}", result);

        let world = pack.snapshot();
        assert!(world.price() > 1.0);
        assert_eq!(world.balance("trader-0", QUOTE), Some(900.0));
        assert!(world.balance("trader-0", BASE).unwrap() > 1_000.0);
        assert!((pack.metric("total_base").unwrap() - 12_000.0).abs() < 1e-9);
        assert!((pack.metric("total_quote").unwrap() - 12_000.0).abs() < 1e-9);
        assert_eq!(pack.metric("volume"), Some(100.0));
        assert_eq!(pack.metric("swap_count"), Some(1.0));
    }

    #[test]
    fn test_failed_swap_leaves_world_untouched() {
        let mut pack = pack();
        let before = pack.snapshot();

        let too_big = swap("sell", 5_000.0);
        let result = apply_as(&mut pack, "trader-0", &too_big);
        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::Revert));
        assert_eq!(result.reason.as_deref(), Some("insufficient balance"));

        let greedy = swap("buy", 10.0).with_param("min_out", 1_000.0);
        let result = apply_as(&mut pack, "trader-0", &greedy);
        assert_eq!(result.reason.as_deref(), Some("slippage"));

        assert_eq!(pack.snapshot(), before);
        assert_eq!(pack.metric("revert_count"), Some(2.0));
        assert_eq!(pack.metric("volume"), Some(0.0));
    }

    #[test]
    fn test_batch_swap_is_atomic() {
        let mut pack = pack();
        let before = pack.snapshot();

        // Second leg cannot be funded after the first spends most QUOTE
        let batch = action("batch_swap").with_param(
            "legs",
            json!([
                {"side": "buy", "amount_in": 900.0},
                {"side": "buy", "amount_in": 900.0},
            ]),
        );
        let result = apply_as(&mut pack, "trader-0", &batch);
        assert!(!result.success);
        assert_eq!(result.reason.as_deref(), Some("leg 1: insufficient balance"));
        assert_eq!(pack.snapshot(), before);
    }

    #[test]
    fn test_batch_swap_over_budget_times_out() {
        let mut pack = pack_with(json!({"max_steps_per_action": 2}));
        let before = pack.snapshot();
        let leg = json!({"side": "buy", "amount_in": 1.0});
        let batch = action("batch_swap").with_param("legs", json!([leg, leg, leg]));

        let result = apply_as(&mut pack, "trader-0", &batch);
        assert_eq!(result.kind, Some(FailureKind::Timeout));
        assert_eq!(pack.snapshot(), before);
    }

    #[test]
    fn test_batch_swap_success() {
        let mut pack = pack();
        let leg = json!({"side": "buy", "amount_in": 10.0});
        let batch = action("batch_swap").with_param("legs", json!([leg, leg]));
        let result = apply_as(&mut pack, "trader-0", &batch);
        assert!(result.success);
        assert_eq!(pack.metric("swap_count"), Some(2.0));
        assert_eq!(pack.metric("volume"), Some(20.0));
    }

    #[test]
    fn test_transfer_and_allowance() {
        let mut pack = pack();

        let send = action("transfer")
            .with_param("to", TREASURY)
            .with_param("asset", QUOTE)
            .with_param("amount", 50.0);
        assert!(apply_as(&mut pack, "trader-0", &send).success);
        assert_eq!(pack.snapshot().balance(TREASURY, QUOTE), Some(50.0));

        // trader-1 pulls from trader-0 without approval
        let pull = send.clone().with_param("from", "trader-0");
        let result = apply_as(&mut pack, "trader-1", &pull);
        assert_eq!(result.reason.as_deref(), Some("insufficient allowance"));

        let approve = action("approve")
            .with_param("spender", "trader-1")
            .with_param("asset", QUOTE)
            .with_param("amount", 60.0);
        assert!(apply_as(&mut pack, "trader-0", &approve).success);
        assert!(apply_as(&mut pack, "trader-1", &pull).success);

        let world = pack.snapshot();
        assert_eq!(world.balance("trader-0", QUOTE), Some(900.0));
        assert_eq!(world.allowance("trader-0", "trader-1", QUOTE), Some(10.0));
    }

    #[test]
    fn test_transfer_to_unknown_account_is_atomic() {
        let mut pack = pack();
        let before = pack.snapshot();
        let send = action("transfer")
            .with_param("to", "ghost")
            .with_param("asset", BASE)
            .with_param("amount", 5.0);
        let result = apply_as(&mut pack, "trader-0", &send);
        assert_eq!(result.reason.as_deref(), Some("unknown account 'ghost'"));
        assert_eq!(pack.snapshot(), before);
    }

    #[test]
    fn test_unknown_action_reverts() {
        let mut pack = pack();
        let result = apply_as(&mut pack, "trader-0", &action("mint"));
        assert_eq!(result.reason.as_deref(), Some("unknown action 'mint'"));
    }

    #[test]
    fn test_invalid_params_rejected_at_setup() {
        let agents = agents();
        let mut pack = TokenPack::new();
        let bad = json!({"fee": 1.5});
        let err = pack
            .initialize(&PackSetup {
                params: &bad,
                seconds_per_tick: 12,
                agents: &agents,
            })
            .unwrap_err();
        assert!(matches!(err, SetupError::InvalidParam { .. }));
    }

    proptest! {
        #[test]
        fn prop_swaps_conserve_supply_and_failures_are_atomic(
            legs in proptest::collection::vec(
                (any::<bool>(), 0.5f64..1_500.0, 0.0f64..200.0),
                1..40,
            )
        ) {
            let mut pack = pack();
            for (i, (buy, amount_in, min_out)) in legs.into_iter().enumerate() {
                let trader = if i % 2 == 0 { "trader-0" } else { "trader-1" };
                let before = pack.snapshot();
                let side = if buy { "buy" } else { "sell" };
                let action = swap(side, amount_in).with_param("min_out", min_out);
                let result = apply_as(&mut pack, trader, &action);
                if !result.success {
                    prop_assert_eq!(pack.snapshot(), before);
                }
                prop_assert!((pack.metric("total_base").unwrap() - 12_000.0).abs() < 1e-6);
                prop_assert!((pack.metric("total_quote").unwrap() - 12_000.0).abs() < 1e-6);
                prop_assert!(pack.world().reserve_base > 0.0 && pack.world().reserve_quote > 0.0);
            }
        }
    }

    #[test]
    fn test_advance_sets_clock() {
        let mut pack = pack();
        pack.advance(7, 84);
        assert_eq!(pack.snapshot().value("timestamp"), Some(84.0));
        assert_eq!(pack.metric("tick"), Some(7.0));
    }
}
