use super::support;
use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::events::{EvaluationData, NodeOutcome};
use crate::graph::{NodeInstance, StrategyGraph};
use crate::model::NodeConfig;
use crate::runtime::{NodeStatus, PendingOrderState};
use kite_execution::{OrderRequest, OrderStatus};
use kite_positions::EntryData;

/// EntryNode (§4.5) lifecycle: one [`PendingOrderState`] per leg (`vpi`),
/// supporting multi-leg entries (e.g. a straddle's CE/PE pair). For each leg,
/// either places a fresh order (if none in flight and the leg isn't already
/// open) or polls the one already placed. Completes into its children only
/// once every leg has reached a terminal outcome this activation.
pub async fn on_tick(
    node: &NodeInstance,
    graph: &StrategyGraph,
    ctx: &mut TraversalContext<'_>,
    parent_execution_id: Option<&str>,
) -> Result<NodeOutcome, GraphError> {
    let NodeConfig::Entry(data) = &node.config else {
        unreachable!("dispatch only calls entry::on_tick for NodeConfig::Entry");
    };

    node.runtime.borrow_mut().status = NodeStatus::Active;

    let mut last_order: Option<EvaluationData> = None;
    let mut any_pending = false;

    for leg in &data.positions {
        let already_pending = node.runtime.borrow().pending_entries.contains_key(&leg.vpi);

        if !already_pending {
            if ctx.positions.has_open_position(&leg.vpi) {
                continue;
            }
            if node.runtime.borrow().rejected_legs.contains(&leg.vpi) {
                continue;
            }

            let instrument = support::leg_instrument(&data.instrument, leg.option_details.as_ref());
            let (symbol, exchange, underlying_symbol) = {
                let mut resolver = graph.fno_resolver();
                support::resolve_order_symbol(&instrument, ctx, &mut resolver)?
            };

            if ctx.ltp.ltp(&symbol).is_none() {
                any_pending = true;
                last_order = Some(EvaluationData::Order {
                    position_id: leg.vpi.clone(),
                    symbol: symbol.to_string(),
                    side: support::parse_side(&leg.position_type)?,
                    quantity: leg.quantity,
                    status: OrderStatus::Pending,
                    order_id: None,
                    rejection_reason: Some("no price available yet".to_string()),
                });
                continue;
            }

            let side = support::parse_side(&leg.position_type)?;
            let order_type = support::parse_order_type(leg.order_type.as_deref(), None)?;
            let product_type = support::parse_product_type(leg.product_type.as_deref())?;
            let actual_quantity = leg.quantity * leg.multiplier * ctx.strategy_scale;

            let request = OrderRequest {
                symbol: symbol.clone(),
                exchange,
                side,
                quantity: leg.quantity,
                order_type,
                product_type,
                node_id: node.id.clone(),
            };

            let execution_id = graph.next_execution_id();
            let underlying_price_on_entry = underlying_symbol.as_ref().and_then(|u| ctx.ltp.ltp(u));
            let node_variables_snapshot =
                support::evaluate_and_store_variables(ctx, &node.id, &node.variables, graph.underlying_symbol())?;

            let ack = ctx.gateway.place_order(request).await?;

            node.runtime.borrow_mut().pending_entries.insert(
                leg.vpi.clone(),
                PendingOrderState {
                    order_id: ack.order_id.clone(),
                    execution_id,
                    position_id: leg.vpi.clone(),
                    symbol,
                    exchange,
                    side,
                    quantity: leg.quantity,
                    multiplier: leg.multiplier,
                    actual_quantity,
                    order_type,
                    product_type,
                    underlying_symbol,
                    underlying_price_on_entry,
                    node_variables_snapshot,
                },
            );
        }

        let pending = node
            .runtime
            .borrow()
            .pending_entries
            .get(&leg.vpi)
            .cloned()
            .expect("just inserted or already present");

        let snapshot = ctx.gateway.get_order_status(&pending.order_id, !ctx.mode.is_backtest()).await?;

        match snapshot.status {
            OrderStatus::Complete => {
                // BacktestGateway's `place_order` doesn't know the quoted LTP, so it
                // always reports a zero fill price (§4.5 "in backtest mode, immediately
                // fill at LTP"): fall back to the symbol's current LTP when the
                // reported price is unusable.
                let fill_price = snapshot
                    .average_price
                    .filter(|p| !p.is_zero())
                    .or_else(|| ctx.ltp.ltp(&pending.symbol))
                    .unwrap_or_default();
                let entry = EntryData {
                    entry_time: ctx.tick_time,
                    entry_price: fill_price,
                    quantity: pending.quantity,
                    multiplier: pending.multiplier,
                    actual_quantity: Some(pending.actual_quantity),
                    symbol: pending.symbol.clone(),
                    exchange: Some(pending.exchange),
                    side: pending.side,
                    instrument: data.instrument.clone(),
                    strategy: graph.strategy_name().to_string(),
                    node_id: node.id.clone(),
                    underlying_symbol: pending.underlying_symbol.clone(),
                    underlying_price_on_entry: pending.underlying_price_on_entry,
                    node_variables_snapshot: pending.node_variables_snapshot.clone(),
                    order_id: Some(pending.order_id.clone()),
                    execution_id: Some(pending.execution_id.clone()),
                };
                ctx.positions.add_position(&pending.position_id, entry)?;
                graph.mark_just_opened(&pending.position_id, ctx.tick_time);
                node.runtime.borrow_mut().pending_entries.shift_remove(&leg.vpi);
                last_order = Some(EvaluationData::Order {
                    position_id: pending.position_id,
                    symbol: pending.symbol.to_string(),
                    side: pending.side,
                    quantity: pending.quantity,
                    status: OrderStatus::Complete,
                    order_id: Some(pending.order_id),
                    rejection_reason: None,
                });
            }
            OrderStatus::Rejected | OrderStatus::Cancelled => {
                tracing::warn!(
                    node_id = %node.id,
                    position_id = %pending.position_id,
                    order_id = %pending.order_id,
                    reason = ?snapshot.rejection_reason,
                    "entry order did not fill"
                );
                {
                    let mut rt = node.runtime.borrow_mut();
                    rt.pending_entries.shift_remove(&leg.vpi);
                    rt.rejected_legs.insert(leg.vpi.clone());
                }
                last_order = Some(EvaluationData::Order {
                    position_id: pending.position_id,
                    symbol: pending.symbol.to_string(),
                    side: pending.side,
                    quantity: pending.quantity,
                    status: snapshot.status,
                    order_id: Some(pending.order_id),
                    rejection_reason: snapshot.rejection_reason,
                });
            }
            OrderStatus::Pending | OrderStatus::Open => {
                any_pending = true;
                last_order = Some(EvaluationData::Order {
                    position_id: pending.position_id,
                    symbol: pending.symbol.to_string(),
                    side: pending.side,
                    quantity: pending.quantity,
                    status: snapshot.status,
                    order_id: Some(pending.order_id),
                    rejection_reason: None,
                });
            }
        }
    }

    let diagnostic = last_order.unwrap_or(EvaluationData::Order {
        position_id: String::new(),
        symbol: String::new(),
        side: kite_instrument::Side::Buy,
        quantity: Default::default(),
        status: OrderStatus::Complete,
        order_id: None,
        rejection_reason: None,
    });

    if any_pending {
        {
            let mut rt = node.runtime.borrow_mut();
            rt.status = NodeStatus::Pending;
            rt.parent_execution_id = parent_execution_id.map(str::to_string);
        }
        return Ok(NodeOutcome::Pending(diagnostic));
    }

    node.runtime.borrow_mut().status = NodeStatus::Inactive;
    Ok(NodeOutcome::LogicCompleted(diagnostic))
}
