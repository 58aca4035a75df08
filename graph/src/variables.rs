use crate::error::GraphError;
use indexmap::IndexMap;
use kite_conditions::Expr;
use std::collections::HashSet;

/// Finds every reference to one of `names` on `this_node` within `expr` (only
/// `node_variable(this_node, name)` lookups targeting a *sibling variable on the
/// same node* count as a dependency edge — cross-node variable reads are plain
/// data lookups, not part of this node's internal dependency graph).
fn collect_refs(this_node: &str, expr: &Expr, names: &HashSet<&str>, out: &mut Vec<String>) {
    match expr {
        Expr::NodeVariable { node_id, name } if node_id == this_node && names.contains(name.as_str()) => {
            out.push(name.clone());
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_refs(this_node, left, names, out);
            collect_refs(this_node, right, names, out);
        }
        _ => {}
    }
}

/// Orders `vars` so that every variable is evaluated after the sibling
/// variables it references (§4.5 "Variables"). Self-reference and cycles are
/// hard errors per the specification.
pub fn topo_sort_variables(node_id: &str, vars: Vec<(String, Expr)>) -> Result<Vec<(String, Expr)>, GraphError> {
    let names: HashSet<&str> = vars.iter().map(|(n, _)| n.as_str()).collect();
    let mut expr_by_name: IndexMap<String, Expr> = IndexMap::new();
    let mut deps: IndexMap<String, Vec<String>> = IndexMap::new();

    for (name, expr) in &vars {
        let mut refs = Vec::new();
        collect_refs(node_id, expr, &names, &mut refs);
        if refs.iter().any(|r| r == name) {
            return Err(GraphError::SelfReferentialVariable {
                node_id: node_id.to_string(),
                name: name.clone(),
            });
        }
        deps.insert(name.clone(), refs);
        expr_by_name.insert(name.clone(), expr.clone());
    }

    let mut indegree: IndexMap<String, usize> = IndexMap::new();
    let mut dependents: IndexMap<String, Vec<String>> = IndexMap::new();
    for name in &names {
        indegree.insert(name.to_string(), 0);
        dependents.insert(name.to_string(), Vec::new());
    }
    for (name, refs) in &deps {
        indegree.insert(name.clone(), refs.len());
        for dep in refs {
            dependents.get_mut(dep).expect("dep is a known variable name").push(name.clone());
        }
    }

    let mut ready: Vec<String> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| name.clone())
        .collect();
    let mut ordered = Vec::with_capacity(vars.len());
    while let Some(name) = ready.pop() {
        ordered.push(name.clone());
        for dependent in dependents.get(&name).cloned().unwrap_or_default() {
            let degree = indegree.get_mut(&dependent).expect("dependent is a known variable name");
            *degree -= 1;
            if *degree == 0 {
                ready.push(dependent);
            }
        }
    }

    if ordered.len() != vars.len() {
        let unresolved: Vec<String> = names
            .iter()
            .filter(|n| !ordered.contains(&n.to_string()))
            .map(|n| n.to_string())
            .collect();
        return Err(GraphError::VariableCycle {
            node_id: node_id.to_string(),
            cycle: unresolved.join(", "),
        });
    }

    Ok(ordered
        .into_iter()
        .map(|name| {
            let expr = expr_by_name.swap_remove(&name).expect("ordered name came from expr_by_name");
            (name, expr)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_variables_keep_declaration_order() {
        let vars = vec![("a".to_string(), Expr::Number(1.0)), ("b".to_string(), Expr::Number(2.0))];
        let ordered = topo_sort_variables("node-1", vars).unwrap();
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn dependent_variable_sorts_after_dependency() {
        let vars = vec![
            (
                "b".to_string(),
                Expr::NodeVariable {
                    node_id: "node-1".to_string(),
                    name: "a".to_string(),
                },
            ),
            ("a".to_string(), Expr::Number(1.0)),
        ];
        let ordered = topo_sort_variables("node-1", vars).unwrap();
        let names: Vec<&str> = ordered.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn self_reference_is_an_error() {
        let vars = vec![(
            "a".to_string(),
            Expr::NodeVariable {
                node_id: "node-1".to_string(),
                name: "a".to_string(),
            },
        )];
        let err = topo_sort_variables("node-1", vars).unwrap_err();
        assert!(matches!(err, GraphError::SelfReferentialVariable { .. }));
    }

    #[test]
    fn two_cycle_is_an_error() {
        let vars = vec![
            (
                "a".to_string(),
                Expr::NodeVariable {
                    node_id: "node-1".to_string(),
                    name: "b".to_string(),
                },
            ),
            (
                "b".to_string(),
                Expr::NodeVariable {
                    node_id: "node-1".to_string(),
                    name: "a".to_string(),
                },
            ),
        ];
        let err = topo_sort_variables("node-1", vars).unwrap_err();
        assert!(matches!(err, GraphError::VariableCycle { .. }));
    }
}
