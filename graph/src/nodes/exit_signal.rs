use super::support;
use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::events::{EvaluationData, NodeOutcome};
use crate::graph::{NodeInstance, StrategyGraph};
use crate::model::{NodeConfig, SignalNodeData};

/// ExitSignalNode (§4.5): gates its child ExitNode. Unlike the entry-side
/// signals, this only ever evaluates while the target position is open — there
/// is nothing to exit otherwise — and has no re-entry distinction of its own.
pub async fn on_tick(
    node: &NodeInstance,
    graph: &StrategyGraph,
    ctx: &mut TraversalContext<'_>,
    parent_execution_id: Option<&str>,
) -> Result<NodeOutcome, GraphError> {
    let NodeConfig::ExitSignal(data) = &node.config else {
        unreachable!("dispatch only calls exit_signal::on_tick for NodeConfig::ExitSignal");
    };

    let Some(vpi) = target_position_vpi(node, graph, data) else {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
            condition: None,
            note: Some("no target position could be resolved".to_string()),
        }));
    };

    if !ctx.positions.has_open_position(&vpi) {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
            condition: None,
            note: Some(format!("position `{vpi}` is not open")),
        }));
    }

    let condition = node.conditions.as_ref().expect("exit signal nodes always parse a condition tree");

    let outcome = {
        let eval_ctx = support::eval_context(ctx, graph.underlying_symbol());
        condition.eval(&eval_ctx)?
    };

    if !outcome.satisfied {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
            condition: Some(outcome.diagnostic),
            note: None,
        }));
    }

    support::evaluate_and_store_variables(ctx, &node.id, &node.variables, graph.underlying_symbol())?;

    {
        let mut rt = node.runtime.borrow_mut();
        rt.execution_id = Some(graph.next_execution_id());
        rt.parent_execution_id = parent_execution_id.map(str::to_string);
    }

    Ok(NodeOutcome::LogicCompleted(EvaluationData::Signal {
        condition: Some(outcome.diagnostic),
        note: None,
    }))
}

fn target_position_vpi(node: &NodeInstance, graph: &StrategyGraph, data: &SignalNodeData) -> Option<String> {
    if let Some(vpi) = &data.target_position_vpi {
        return Some(vpi.clone());
    }
    let exit_id = support::find_descendant(graph, &node.id, |c| matches!(c, NodeConfig::Exit(_)))?;
    let NodeConfig::Exit(exit) = &graph.node(&exit_id)?.config else {
        return None;
    };
    Some(exit.exit_config.target_position_vpi.clone())
}
