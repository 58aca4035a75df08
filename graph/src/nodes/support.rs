use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::graph::StrategyGraph;
use kite_conditions::{json_to_value, EvalContext, Expr, Value};
use kite_execution::{OrderType, ProductType};
use kite_instrument::{Exchange, ExpiryCalendar, FnoResolver, ResolvedContract, Side};
use kite_positions::PositionStore;
use rust_decimal::Decimal;
use serde_json::{Map as JsonMap, Value as JsonValue};
use smol_str::SmolStr;
use std::collections::VecDeque;

/// Builds a read-only evaluator context over the tick's market-data/GPS
/// snapshot (§4.4). `ctx.positions` is reborrowed immutably — evaluation never
/// mutates the GPS.
pub fn eval_context<'a>(ctx: &'a TraversalContext<'a>, underlying_symbol: &'a str) -> EvalContext<'a> {
    EvalContext::new(ctx.ltp, ctx.candles, ctx.positions, underlying_symbol)
}

/// Resolves a node's `instrument` string against the current tick (§4.6):
/// dynamic symbols (containing `:`) go through the F&O resolver using the
/// underlying's spot; anything else is a literal equity symbol. Returns the
/// tradable symbol, its exchange, and (for dynamic symbols) the underlying base
/// to use as the GPS LTP fallback.
pub fn resolve_order_symbol(
    instrument: &str,
    ctx: &mut TraversalContext<'_>,
    fno_resolver: &mut FnoResolver,
) -> Result<(SmolStr, Exchange, Option<SmolStr>), GraphError> {
    if !instrument.contains(':') {
        let symbol = SmolStr::new(instrument);
        let exchange = Exchange::infer_from_symbol(instrument);
        return Ok((symbol, exchange, None));
    }

    let base = instrument.split(':').next().unwrap_or(instrument);
    let spot = ctx.ltp.ltp(base);
    let reference_date = ctx.tick_time.date_naive();
    let resolved: ResolvedContract = fno_resolver.resolve(instrument, reference_date, spot, ctx.calendar)?;
    let symbol = SmolStr::new(resolved.to_string());
    let exchange = resolved.exchange();
    Ok((symbol, exchange, Some(resolved.base.clone())))
}

/// Evaluates a node's variable list (already topologically ordered by
/// [`crate::variables::topo_sort_variables`]), writing each into the GPS
/// (`node_variables[node_id][name]`, §4.5 "Variables") so later variables in the
/// same list, and later nodes' expressions, can read it via
/// `node_variable(node_id, name)`. Returns a JSON snapshot of the computed
/// values for the resulting position's `node_variables_snapshot`.
///
/// Takes the whole `ctx` (rather than a pre-built `EvalContext`) and rebuilds a
/// fresh, narrowly-scoped read-only view every iteration: each variable's
/// expression is evaluated against `ctx.positions` immutably, that borrow ends
/// at the end of the iteration, and only then is the result written back
/// mutably — letting a later variable observe an earlier one in the same list.
pub fn evaluate_and_store_variables(
    ctx: &mut TraversalContext<'_>,
    node_id: &str,
    variables: &[(String, Expr)],
    underlying_symbol: &str,
) -> Result<JsonValue, GraphError> {
    let mut snapshot = JsonMap::new();
    for (name, expr) in variables {
        let value = {
            let eval_ctx = EvalContext::new(ctx.ltp, ctx.candles, ctx.positions, underlying_symbol);
            expr.eval(&eval_ctx)?
        };
        let json = value_to_json(&value);
        ctx.positions.set_node_variable(node_id, name, json.clone());
        snapshot.insert(name.clone(), json);
    }
    Ok(JsonValue::Object(snapshot))
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Number(n) => serde_json::Number::from_f64(*n).map(JsonValue::Number).unwrap_or(JsonValue::Null),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Null => JsonValue::Null,
    }
}

/// Whether `position_id` is in a re-entry cycle (§4.5 EntrySignalNode: "Uses
/// `reEntryConditions` ... if present and in re-entry mode, detected by
/// `position_num > 0` on the target position").
pub fn is_re_entry(positions: &PositionStore, position_id: &str) -> bool {
    positions.get_latest_position_num(position_id) > 0
}

#[allow(dead_code)]
pub fn node_variable_value(positions: &PositionStore, node_id: &str, name: &str) -> Value {
    positions
        .get_node_variable(node_id, name)
        .map(json_to_value)
        .unwrap_or(Value::Null)
}

pub fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}

pub fn parse_side(position_type: &str) -> Result<Side, GraphError> {
    match position_type.to_uppercase().as_str() {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(GraphError::MalformedSpec(format!("unknown position type `{other}`"))),
    }
}

pub fn parse_order_type(order_type: Option<&str>, limit_price: Option<Decimal>) -> Result<OrderType, GraphError> {
    match order_type.unwrap_or("market").to_lowercase().as_str() {
        "market" => Ok(OrderType::Market),
        "limit" => Ok(OrderType::Limit(limit_price.unwrap_or_default())),
        other => Err(GraphError::MalformedSpec(format!("unknown order type `{other}`"))),
    }
}

pub fn parse_product_type(product_type: Option<&str>) -> Result<ProductType, GraphError> {
    match product_type.unwrap_or("intraday").to_lowercase().as_str() {
        "intraday" | "mis" => Ok(ProductType::Intraday),
        "carryforward" | "nrml" => Ok(ProductType::Carryforward),
        "delivery" | "cnc" => Ok(ProductType::Delivery),
        other => Err(GraphError::MalformedSpec(format!("unknown product type `{other}`"))),
    }
}

/// Builds the per-leg dynamic symbol for an EntryNode/ExitNode position (§4.6):
/// `instrument` is the node-level base (e.g. `NIFTY`), combined with the leg's
/// own `optionDetails` into `BASE:<EXP>:<STRIKE>:<CE|PE>` when present, or used
/// bare for an equity leg.
pub fn leg_instrument(instrument: &str, option_details: Option<&crate::model::OptionDetailsSpec>) -> String {
    match option_details {
        Some(opt) => format!("{instrument}:{}:{}:{}", opt.expiry, opt.strike_type, opt.option_type),
        None => instrument.to_string(),
    }
}

/// Breadth-first search for the nearest descendant of `node_id` (exclusive)
/// whose config satisfies `matches`, stopping at the first hit on each branch
/// (§4.5: Entry/Exit-adjacent signal nodes resolve their target position by
/// walking to "the nearest" Entry/Exit node rather than the whole subtree).
pub fn find_descendant(
    graph: &StrategyGraph,
    node_id: &str,
    matches: impl Fn(&crate::model::NodeConfig) -> bool,
) -> Option<String> {
    let mut queue: VecDeque<String> = graph.children_of(node_id).iter().cloned().collect();
    while let Some(candidate) = queue.pop_front() {
        let node = graph.node(&candidate)?;
        if matches(&node.config) {
            return Some(candidate);
        }
        queue.extend(graph.children_of(&candidate).iter().cloned());
    }
    None
}
