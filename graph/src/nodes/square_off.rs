use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::events::{EvaluationData, NodeOutcome};
use crate::graph::{NodeInstance, StrategyGraph};
use crate::model::NodeConfig;
use crate::runtime::NodeStatus;
use kite_positions::ExitData;
use rust_decimal::Decimal;
use smol_str::SmolStr;

/// SquareOffNode (§4.5): the strategy-level terminator. Only ever does
/// anything once, on the tick [`StrategyGraph::mark_ended`] was just set by
/// `startNode` — cancels every order in flight (live mode only; backtest fills
/// have nothing to cancel), flattens every open position at the best available
/// price, and halts the whole graph by forcing every node's runtime back to
/// `Inactive`. Idempotent via [`StrategyGraph::square_off_done`]: a strategy
/// that has already ended never liquidates twice, even if this node is
/// reachable from more than one branch.
pub async fn on_tick(
    node: &NodeInstance,
    graph: &StrategyGraph,
    ctx: &mut TraversalContext<'_>,
    _parent_execution_id: Option<&str>,
) -> Result<NodeOutcome, GraphError> {
    let NodeConfig::SquareOff(_) = &node.config else {
        unreachable!("dispatch only calls square_off::on_tick for NodeConfig::SquareOff");
    };

    if !graph.has_ended() {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::SquareOff {
            reason: "not triggered".to_string(),
            closed_positions: Vec::new(),
        }));
    }

    if graph.square_off_done() {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::SquareOff {
            reason: "already squared off".to_string(),
            closed_positions: Vec::new(),
        }));
    }

    let node_ids: Vec<String> = graph.node_ids().map(str::to_string).collect();
    for id in &node_ids {
        let Some(n) = graph.node(id) else { continue };
        let (entry_order_ids, exit_order_id) = {
            let rt = n.runtime.borrow();
            (
                rt.pending_entries.values().map(|p| p.order_id.clone()).collect::<Vec<_>>(),
                rt.pending_exit.as_ref().map(|p| p.order_id.clone()),
            )
        };

        if !ctx.mode.is_backtest() {
            for order_id in &entry_order_ids {
                let _ = ctx.gateway.cancel_order(order_id).await;
            }
            if let Some(order_id) = &exit_order_id {
                let _ = ctx.gateway.cancel_order(order_id).await;
            }
        }

        let mut rt = n.runtime.borrow_mut();
        rt.pending_entries.clear();
        rt.pending_exit = None;
        rt.status = NodeStatus::Inactive;
    }

    let open: Vec<(String, SmolStr, Option<SmolStr>, Decimal)> = ctx
        .positions
        .get_open_positions()
        .into_iter()
        .map(|p| (p.position_id.clone(), p.symbol.clone(), p.underlying_symbol.clone(), p.current_price))
        .collect();

    let mut closed_positions = Vec::with_capacity(open.len());
    for (position_id, symbol, underlying_symbol, current_price) in open {
        let exit_price = ctx
            .ltp
            .ltp(&symbol)
            .or_else(|| underlying_symbol.as_ref().and_then(|u| ctx.ltp.ltp(u)))
            .unwrap_or(current_price);

        ctx.positions.close_position(
            &position_id,
            ExitData {
                exit_time: ctx.tick_time,
                exit_price,
                close_reason: Some("square_off".to_string()),
                order_id: None,
                execution_id: None,
            },
        );
        closed_positions.push(position_id);
    }

    graph.mark_square_off_done();

    Ok(NodeOutcome::LogicCompleted(EvaluationData::SquareOff {
        reason: "end_conditions_met".to_string(),
        closed_positions,
    }))
}
