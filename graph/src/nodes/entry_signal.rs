use super::support;
use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::events::{EvaluationData, NodeOutcome};
use crate::graph::{NodeInstance, StrategyGraph};
use crate::model::{NodeConfig, SignalNodeData};

/// EntrySignalNode (§4.5): gates its child EntryNode. Evaluates `conditions`
/// normally, or `reEntryConditions` (if configured) once the target position
/// has already completed at least one full entry/exit cycle. Skips entirely
/// while the target position is currently open — an EntrySignalNode never
/// fires into an already-open position.
pub async fn on_tick(
    node: &NodeInstance,
    graph: &StrategyGraph,
    ctx: &mut TraversalContext<'_>,
    parent_execution_id: Option<&str>,
) -> Result<NodeOutcome, GraphError> {
    let NodeConfig::EntrySignal(data) = &node.config else {
        unreachable!("dispatch only calls entry_signal::on_tick for NodeConfig::EntrySignal");
    };

    let Some(vpi) = target_position_vpi(node, graph, data) else {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
            condition: None,
            note: Some("no target position could be resolved".to_string()),
        }));
    };

    if ctx.positions.has_open_position(&vpi) {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
            condition: None,
            note: Some(format!("position `{vpi}` already open")),
        }));
    }

    let is_re_entry = support::is_re_entry(ctx.positions, &vpi);
    let condition = if is_re_entry {
        node.re_entry_conditions.as_ref().unwrap_or_else(|| {
            node.conditions.as_ref().expect("entry signal nodes always parse a condition tree")
        })
    } else {
        node.conditions.as_ref().expect("entry signal nodes always parse a condition tree")
    };

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

/// Resolves the position this signal gates: the explicit binding if configured,
/// otherwise the first leg's `vpi` on the nearest descendant EntryNode (§4.5).
pub(super) fn target_position_vpi(node: &NodeInstance, graph: &StrategyGraph, data: &SignalNodeData) -> Option<String> {
    if let Some(vpi) = &data.target_position_vpi {
        return Some(vpi.clone());
    }
    let entry_id = support::find_descendant(graph, &node.id, |c| matches!(c, NodeConfig::Entry(_)))?;
    let NodeConfig::Entry(entry) = &graph.node(&entry_id)?.config else {
        return None;
    };
    entry.positions.first().map(|p| p.vpi.clone())
}
