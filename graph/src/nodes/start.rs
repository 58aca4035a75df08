use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::events::{EvaluationData, NodeOutcome};
use crate::graph::{NodeInstance, StrategyGraph};
use crate::model::NodeConfig;
use chrono::NaiveTime;

/// StartNode (§4.5): one-time symbol/timeframe/indicator registration already
/// happened via [`StrategyGraph::register_market_data`] before the tick loop
/// started. Per tick this only checks the configured end conditions and, while
/// the strategy hasn't ended, always completes into its children (the entry
/// signal nodes) — it has no condition of its own to gate on.
pub async fn on_tick(
    node: &NodeInstance,
    graph: &StrategyGraph,
    ctx: &mut TraversalContext<'_>,
    parent_execution_id: Option<&str>,
) -> Result<NodeOutcome, GraphError> {
    let NodeConfig::Start(data) = &node.config else {
        unreachable!("dispatch only calls start::on_tick for NodeConfig::Start");
    };

    if graph.has_ended() {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::Start {
            resolved_symbol: None,
            end_condition_triggered: None,
        }));
    }

    let triggered = check_end_conditions(data, ctx);
    if triggered.is_some() {
        graph.mark_ended();
    }

    {
        let mut rt = node.runtime.borrow_mut();
        rt.execution_id = Some(graph.next_execution_id());
        rt.parent_execution_id = parent_execution_id.map(str::to_string);
    }

    Ok(NodeOutcome::LogicCompleted(EvaluationData::Start {
        resolved_symbol: Some(graph.underlying_symbol().to_string()),
        end_condition_triggered: triggered,
    }))
}

fn check_end_conditions(data: &crate::model::StartNodeData, ctx: &TraversalContext<'_>) -> Option<String> {
    let end = &data.end_conditions;

    if end.immediate_exit == Some(true) {
        return Some("immediate_exit".to_string());
    }

    if let Some(time_exit) = &end.time_based_exit {
        if time_exit.enabled {
            if let Ok(cutoff) = NaiveTime::parse_from_str(&time_exit.exit_time, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(&time_exit.exit_time, "%H:%M"))
            {
                if ctx.tick_time.time() >= cutoff {
                    return Some(format!("time_based_exit@{}", time_exit.exit_time));
                }
            }
        }
    }

    if let Some(perf_exit) = &end.performance_based_exit {
        if perf_exit.enabled {
            let total_pnl: f64 = ctx
                .positions
                .get_open_positions()
                .into_iter()
                .chain(ctx.positions.get_closed_positions())
                .map(|p| super::support::decimal_to_f64(p.pnl))
                .sum();
            if let Some(target) = perf_exit.target_pnl {
                if total_pnl >= target {
                    return Some("performance_based_exit:target".to_string());
                }
            }
            if let Some(stop_loss) = perf_exit.stop_loss_pnl {
                if total_pnl <= stop_loss {
                    return Some("performance_based_exit:stop_loss".to_string());
                }
            }
        }
    }

    None
}
