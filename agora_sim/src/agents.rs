//! Agent registry and the reference agents for `TokenPack`.
//!
//! | Type              | Behaviour                                              |
//! |-------------------|--------------------------------------------------------|
//! | `random_trader`   | Random side, normally distributed size                 |
//! | `momentum_trader` | Follows the last price move it remembers               |
//! | `liquidity_hog`   | Drains QUOTE to the treasury, gated by a cooldown      |
//! | `idle`            | Never acts                                             |
//! | `faulty`          | Fails on a fixed cadence, for fault isolation tests    |

use agora_core::{Agent, Outcome, Precondition};
use agora_env::{Action, AgentError, AgentId, AgentMemory, SetupError, StateView, TickContext};
use rand_distr::{Distribution, Normal};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::token_pack::{TokenWorld, BASE, QUOTE, TREASURY};

/// Builds one agent from its id and roster parameters.
pub type AgentFactory<V> = fn(&AgentId, &Value) -> Result<Box<dyn Agent<V>>, SetupError>;

/// Maps agent type tags to constructors.
pub struct AgentRegistry<V> {
    factories: BTreeMap<String, AgentFactory<V>>,
}

impl<V> Default for AgentRegistry<V> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }
}

impl<V> AgentRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent_type: &str, factory: AgentFactory<V>) {
        self.factories.insert(agent_type.to_string(), factory);
    }

    pub fn contains(&self, agent_type: &str) -> bool {
        self.factories.contains_key(agent_type)
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Constructs an agent. Unknown types are a setup error.
    pub fn build(
        &self,
        agent_type: &str,
        id: &AgentId,
        params: &Value,
    ) -> Result<Box<dyn Agent<V>>, SetupError> {
        let factory = self
            .factories
            .get(agent_type)
            .ok_or_else(|| SetupError::UnknownAgentType(agent_type.to_string()))?;
        factory(id, params)
    }
}

impl AgentRegistry<TokenWorld> {
    /// Registry with every reference agent.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(RandomTrader::TYPE, RandomTrader::build);
        registry.register(MomentumTrader::TYPE, MomentumTrader::build);
        registry.register(LiquidityHog::TYPE, LiquidityHog::build);
        registry.register(Idle::TYPE, Idle::build);
        registry.register(Faulty::TYPE, Faulty::build);
        registry
    }
}

fn parse_params<T: DeserializeOwned>(agent_type: &str, params: &Value) -> Result<T, SetupError> {
    let params = if params.is_null() { json!({}) } else { params.clone() };
    serde_json::from_value(params).map_err(|e| SetupError::invalid_param(agent_type, e.to_string()))
}

fn swap_action(ctx: &mut TickContext<'_, TokenWorld>, side: &str, amount_in: f64) -> Action {
    ctx.action("swap")
        .with_param("side", side)
        .with_param("amount_in", amount_in)
        .with_param("min_out", 0.0)
}

/// Balance gate for whatever asset a swap pays with.
fn can_pay_for(account: &str, action: &Action) -> Precondition {
    let asset = match action.param_str("side") {
        Some("sell") => BASE,
        _ => QUOTE,
    };
    Precondition::min_balance(account, asset, action.param_f64("amount_in").unwrap_or(0.0))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RandomTraderParams {
    /// Probability of acting on a given tick
    pub act_probability: f64,
    pub mean_size: f64,
    pub size_std: f64,
    pub max_size: f64,
}

impl Default for RandomTraderParams {
    fn default() -> Self {
        Self {
            act_probability: 0.6,
            mean_size: 20.0,
            size_std: 8.0,
            max_size: 100.0,
        }
    }
}

/// Trades a random side with a normally distributed size.
pub struct RandomTrader {
    id: AgentId,
    params: RandomTraderParams,
    size: Normal<f64>,
}

impl RandomTrader {
    pub const TYPE: &'static str = "random_trader";

    pub fn build(id: &AgentId, params: &Value) -> Result<Box<dyn Agent<TokenWorld>>, SetupError> {
        let params: RandomTraderParams = parse_params(Self::TYPE, params)?;
        if !(0.0..=1.0).contains(&params.act_probability) {
            return Err(SetupError::invalid_param("act_probability", "must be in [0, 1]"));
        }
        if !(params.max_size > 0.0) {
            return Err(SetupError::invalid_param("max_size", "must be positive"));
        }
        let size = Normal::new(params.mean_size, params.size_std)
            .map_err(|e| SetupError::invalid_param("size_std", e.to_string()))?;
        Ok(Box::new(Self {
            id: id.clone(),
            params,
            size,
        }))
    }
}

impl Agent<TokenWorld> for RandomTrader {
    fn agent_type(&self) -> &str {
        Self::TYPE
    }

    fn decide(
        &mut self,
        ctx: &mut TickContext<'_, TokenWorld>,
    ) -> Result<Option<Action>, AgentError> {
        if !ctx.rng.chance(self.params.act_probability) {
            return Ok(None);
        }
        let side = *ctx.rng.pick_one(&["buy", "sell"])?;
        let amount = self.size.sample(&mut ctx.rng).clamp(1.0, self.params.max_size);
        Ok(Some(swap_action(ctx, side, amount)))
    }

    fn preconditions(&self, action: &Action) -> Precondition {
        can_pay_for(self.id.as_str(), action)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MomentumParams {
    pub trade_size: f64,
    /// Relative price move that triggers a trade
    pub threshold: f64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            trade_size: 25.0,
            threshold: 0.001,
        }
    }
}

/// Buys after a rise, sells after a fall.
///
/// The last seen price lives in agent memory under `last_price`.
pub struct MomentumTrader {
    id: AgentId,
    params: MomentumParams,
}

impl MomentumTrader {
    pub const TYPE: &'static str = "momentum_trader";
    const LAST_PRICE: &'static str = "last_price";

    pub fn build(id: &AgentId, params: &Value) -> Result<Box<dyn Agent<TokenWorld>>, SetupError> {
        let params: MomentumParams = parse_params(Self::TYPE, params)?;
        if !(params.trade_size > 0.0) {
            return Err(SetupError::invalid_param("trade_size", "must be positive"));
        }
        Ok(Box::new(Self { id: id.clone(), params }))
    }
}

impl Agent<TokenWorld> for MomentumTrader {
    fn agent_type(&self) -> &str {
        Self::TYPE
    }

    fn decide(
        &mut self,
        ctx: &mut TickContext<'_, TokenWorld>,
    ) -> Result<Option<Action>, AgentError> {
        let price = ctx
            .world
            .value("price")
            .ok_or_else(|| AgentError::MissingValue("price".into()))?;
        let last = ctx.memory.get_f64(Self::LAST_PRICE);
        ctx.memory.set(Self::LAST_PRICE, price);

        let Some(last) = last.filter(|l| *l > 0.0) else {
            return Ok(None);
        };
        let change = (price - last) / last;
        let side = if change > self.params.threshold {
            "buy"
        } else if change < -self.params.threshold {
            "sell"
        } else {
            return Ok(None);
        };
        Ok(Some(swap_action(ctx, side, self.params.trade_size)))
    }

    fn preconditions(&self, action: &Action) -> Precondition {
        can_pay_for(self.id.as_str(), action)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiquidityHogParams {
    /// QUOTE moved per transfer
    pub amount: f64,
    /// Ticks between transfers
    pub cooldown_ticks: u64,
    /// When non-zero, every transfer is replaced by a `batch_swap` with
    /// this many legs
    pub batch_legs: usize,
}

impl Default for LiquidityHogParams {
    fn default() -> Self {
        Self {
            amount: 15.0,
            cooldown_ticks: 3,
            batch_legs: 0,
        }
    }
}

/// Proposes a drain every tick; the cooldown gate rejects most of them.
pub struct LiquidityHog {
    id: AgentId,
    params: LiquidityHogParams,
}

impl LiquidityHog {
    pub const TYPE: &'static str = "liquidity_hog";
    const LAST_TRANSFER: &'static str = "last_transfer_tick";

    pub fn build(id: &AgentId, params: &Value) -> Result<Box<dyn Agent<TokenWorld>>, SetupError> {
        let params: LiquidityHogParams = parse_params(Self::TYPE, params)?;
        if !(params.amount > 0.0) {
            return Err(SetupError::invalid_param("amount", "must be positive"));
        }
        Ok(Box::new(Self { id: id.clone(), params }))
    }
}

impl Agent<TokenWorld> for LiquidityHog {
    fn agent_type(&self) -> &str {
        Self::TYPE
    }

    fn decide(
        &mut self,
        ctx: &mut TickContext<'_, TokenWorld>,
    ) -> Result<Option<Action>, AgentError> {
        if self.params.batch_legs > 0 {
            let leg = json!({"side": "buy", "amount_in": self.params.amount, "min_out": 0.0});
            let legs = vec![leg; self.params.batch_legs];
            return Ok(Some(ctx.action("batch_swap").with_param("legs", legs)));
        }
        Ok(Some(
            ctx.action("transfer")
                .with_param("to", TREASURY)
                .with_param("asset", QUOTE)
                .with_param("amount", self.params.amount),
        ))
    }

    fn preconditions(&self, _action: &Action) -> Precondition {
        Precondition::all(vec![
            Precondition::cooldown(Self::LAST_TRANSFER, self.params.cooldown_ticks),
            Precondition::min_balance(self.id.as_str(), QUOTE, self.params.amount),
        ])
    }

    fn observe(
        &mut self,
        tick: u64,
        _action: &Action,
        outcome: &Outcome,
        memory: &mut AgentMemory,
    ) {
        if matches!(outcome, Outcome::Applied(_)) {
            memory.set(Self::LAST_TRANSFER, tick);
        }
    }
}

/// Never acts.
pub struct Idle;

impl Idle {
    pub const TYPE: &'static str = "idle";

    pub fn build(_id: &AgentId, _params: &Value) -> Result<Box<dyn Agent<TokenWorld>>, SetupError> {
        Ok(Box::new(Idle))
    }
}

impl Agent<TokenWorld> for Idle {
    fn agent_type(&self) -> &str {
        Self::TYPE
    }

    fn decide(
        &mut self,
        _ctx: &mut TickContext<'_, TokenWorld>,
    ) -> Result<Option<Action>, AgentError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaultyParams {
    /// Fail on every tick divisible by this
    pub fail_every: u64,
    /// Panic instead of returning an error
    pub panic: bool,
}

impl Default for FaultyParams {
    fn default() -> Self {
        Self {
            fail_every: 3,
            panic: false,
        }
    }
}

/// Small buyer that fails on a fixed cadence.
pub struct Faulty {
    id: AgentId,
    params: FaultyParams,
}

impl Faulty {
    pub const TYPE: &'static str = "faulty";

    pub fn build(id: &AgentId, params: &Value) -> Result<Box<dyn Agent<TokenWorld>>, SetupError> {
        let params: FaultyParams = parse_params(Self::TYPE, params)?;
        if params.fail_every == 0 {
            return Err(SetupError::invalid_param("fail_every", "must be at least 1"));
        }
        Ok(Box::new(Self { id: id.clone(), params }))
    }
}

impl Agent<TokenWorld> for Faulty {
    fn agent_type(&self) -> &str {
        Self::TYPE
    }

    fn decide(
        &mut self,
        ctx: &mut TickContext<'_, TokenWorld>,
    ) -> Result<Option<Action>, AgentError> {
        if ctx.tick % self.params.fail_every == 0 {
            if self.params.panic {
                panic!("{} blew up at tick {}", self.id, ctx.tick);
            }
            return Err(AgentError::other(format!("scripted failure at tick {}", ctx.tick)));
        }
        Ok(Some(swap_action(ctx, "buy", 1.0)))
    }

    fn preconditions(&self, action: &Action) -> Precondition {
        can_pay_for(self.id.as_str(), action)
    }
}
