use super::support;
use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::events::{EvaluationData, NodeOutcome};
use crate::graph::{NodeInstance, StrategyGraph};
use crate::model::NodeConfig;
use crate::runtime::NodeStatus;

use super::entry_signal::target_position_vpi;

/// ReEntrySignalNode (§4.5): a standalone re-entry gate, distinct from an
/// EntrySignalNode's own optional `reEntryConditions`. Only ever fires once the
/// target position has completed at least one cycle; never fires on a fresh
/// (never-entered) position, never fires while the position is open or its
/// EntryNode already has an order in flight, and stops firing permanently once
/// the target EntryNode's leg has reached its configured `maxEntries`.
pub async fn on_tick(
    node: &NodeInstance,
    graph: &StrategyGraph,
    ctx: &mut TraversalContext<'_>,
    parent_execution_id: Option<&str>,
) -> Result<NodeOutcome, GraphError> {
    let NodeConfig::ReEntrySignal(data) = &node.config else {
        unreachable!("dispatch only calls re_entry_signal::on_tick for NodeConfig::ReEntrySignal");
    };

    if node.runtime.borrow().permanently_inactive {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
            condition: None,
            note: Some("max entries reached".to_string()),
        }));
    }

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

    if !support::is_re_entry(ctx.positions, &vpi) {
        return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
            condition: None,
            note: Some(format!("position `{vpi}` has not completed a first cycle yet")),
        }));
    }

    let entry_id = support::find_descendant(graph, &node.id, |c| matches!(c, NodeConfig::Entry(_)));
    if let Some(entry_id) = &entry_id {
        let entry_node = graph.node(entry_id).expect("find_descendant returned a known node id");
        let NodeConfig::Entry(entry_data) = &entry_node.config else {
            unreachable!("find_descendant matched only NodeConfig::Entry");
        };

        if let Some(max_entries) = entry_data.positions.iter().find(|p| p.vpi == vpi).and_then(|p| p.max_entries) {
            if ctx.positions.get_latest_position_num(&vpi) >= max_entries {
                node.runtime.borrow_mut().permanently_inactive = true;
                return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
                    condition: None,
                    note: Some("max entries reached".to_string()),
                }));
            }
        }

        if entry_node.runtime.borrow().status != NodeStatus::Inactive {
            return Ok(NodeOutcome::NotCompleted(EvaluationData::Signal {
                condition: None,
                note: Some(format!("entry node `{entry_id}` already has an order in flight")),
            }));
        }
    }

    let condition = node
        .re_entry_conditions
        .as_ref()
        .or(node.conditions.as_ref())
        .expect("re-entry signal nodes always parse a condition tree");

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
        rt.re_entry_num += 1;
    }

    Ok(NodeOutcome::LogicCompleted(EvaluationData::Signal {
        condition: Some(outcome.diagnostic),
        note: None,
    }))
}
