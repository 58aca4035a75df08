use super::support;
use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::events::{EvaluationData, NodeOutcome};
use crate::graph::{NodeInstance, StrategyGraph};
use crate::model::NodeConfig;
use crate::runtime::{NodeStatus, PendingOrderState};
use kite_execution::{OrderRequest, OrderStatus};
use kite_positions::ExitData;
use rust_decimal::Decimal;

/// ExitNode (§4.5) lifecycle: mirrors [`super::entry::on_tick`] but flattens a
/// single existing position rather than opening one. Short-circuits (without
/// placing an order) if the position is already closed — a sibling ExitNode
/// reached it first — or if it was opened on this very tick, deferring the
/// exit to the next one rather than closing a position in the same activation
/// it was entered.
pub async fn on_tick(
    node: &NodeInstance,
    graph: &StrategyGraph,
    ctx: &mut TraversalContext<'_>,
    parent_execution_id: Option<&str>,
) -> Result<NodeOutcome, GraphError> {
    let NodeConfig::Exit(data) = &node.config else {
        unreachable!("dispatch only calls exit::on_tick for NodeConfig::Exit");
    };
    let vpi = &data.exit_config.target_position_vpi;

    node.runtime.borrow_mut().status = NodeStatus::Active;

    let already_pending = node.runtime.borrow().pending_exit.is_some();

    if !already_pending {
        if !ctx.positions.has_open_position(vpi) {
            node.runtime.borrow_mut().status = NodeStatus::Inactive;
            return Ok(NodeOutcome::LogicCompleted(EvaluationData::Signal {
                condition: None,
                note: Some(format!("position `{vpi}` already closed")),
            }));
        }

        if graph.was_just_opened_this_tick(vpi, ctx.tick_time) {
            node.runtime.borrow_mut().status = NodeStatus::Inactive;
            return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
                condition: None,
                note: Some(format!("position `{vpi}` opened this tick, deferring exit")),
            }));
        }

        let position = ctx.positions.get_position(vpi).expect("has_open_position just returned true");
        let side = position.side.opposite();
        let symbol = position.symbol.clone();
        let exchange = position.exchange;
        let full_quantity = position.quantity;

        let quantity = match data.exit_config.quantity.as_deref() {
            Some("specific") => data.exit_config.specific_quantity.unwrap_or(full_quantity),
            _ => full_quantity,
        };

        let order_type = support::parse_order_type(data.exit_config.order_type.as_deref(), None)?;
        let product_type = kite_execution::ProductType::Intraday;

        let request = OrderRequest {
            symbol: symbol.clone(),
            exchange,
            side,
            quantity,
            order_type,
            product_type,
            node_id: node.id.clone(),
        };

        let execution_id = graph.next_execution_id();
        let node_variables_snapshot =
            support::evaluate_and_store_variables(ctx, &node.id, &node.variables, graph.underlying_symbol())?;

        let ack = ctx.gateway.place_order(request).await?;

        node.runtime.borrow_mut().pending_exit = Some(PendingOrderState {
            order_id: ack.order_id,
            execution_id,
            position_id: vpi.clone(),
            symbol,
            exchange,
            side,
            quantity,
            multiplier: Decimal::ONE,
            actual_quantity: quantity,
            order_type,
            product_type,
            underlying_symbol: None,
            underlying_price_on_entry: None,
            node_variables_snapshot,
        });
    }

    let pending = node
        .runtime
        .borrow()
        .pending_exit
        .clone()
        .expect("just inserted or already present");

    let snapshot = ctx.gateway.get_order_status(&pending.order_id, !ctx.mode.is_backtest()).await?;

    let outcome = match snapshot.status {
        OrderStatus::Complete => {
            let fill_price = snapshot
                .average_price
                .filter(|p| !p.is_zero())
                .or_else(|| ctx.ltp.ltp(&pending.symbol))
                .unwrap_or_default();
            let exit = ExitData {
                exit_time: ctx.tick_time,
                exit_price: fill_price,
                close_reason: Some("signal".to_string()),
                order_id: Some(pending.order_id.clone()),
                execution_id: Some(pending.execution_id.clone()),
            };
            ctx.positions.close_position(vpi, exit);
            node.runtime.borrow_mut().pending_exit = None;
            node.runtime.borrow_mut().status = NodeStatus::Inactive;
            NodeOutcome::LogicCompleted(EvaluationData::Order {
                position_id: pending.position_id,
                symbol: pending.symbol.to_string(),
                side: pending.side,
                quantity: pending.quantity,
                status: OrderStatus::Complete,
                order_id: Some(pending.order_id),
                rejection_reason: None,
            })
        }
        OrderStatus::Rejected | OrderStatus::Cancelled => {
            tracing::warn!(
                node_id = %node.id,
                position_id = %pending.position_id,
                order_id = %pending.order_id,
                reason = ?snapshot.rejection_reason,
                "exit order did not fill"
            );
            node.runtime.borrow_mut().pending_exit = None;
            node.runtime.borrow_mut().status = NodeStatus::Inactive;
            NodeOutcome::LogicCompleted(EvaluationData::Order {
                position_id: pending.position_id,
                symbol: pending.symbol.to_string(),
                side: pending.side,
                quantity: pending.quantity,
                status: snapshot.status,
                order_id: Some(pending.order_id),
                rejection_reason: snapshot.rejection_reason,
            })
        }
        OrderStatus::Pending | OrderStatus::Open => {
            node.runtime.borrow_mut().status = NodeStatus::Pending;
            node.runtime.borrow_mut().parent_execution_id = parent_execution_id.map(str::to_string);
            NodeOutcome::Pending(EvaluationData::Order {
                position_id: pending.position_id,
                symbol: pending.symbol.to_string(),
                side: pending.side,
                quantity: pending.quantity,
                status: snapshot.status,
                order_id: Some(pending.order_id),
                rejection_reason: None,
            })
        }
    };

    Ok(outcome)
}
