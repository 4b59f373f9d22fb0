//! Expression connector: validates `[target] = <expr>;` statements and wires
//! them into the dependency graph.
//!
//! Validation runs to completion before anything is mutated, so a rejected
//! statement leaves trackers and graph exactly as they were.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::expr::{self, Expr, ParseError};
use crate::graph::{BoundExpression, DependencyGraph};
use crate::tracker::{TrackerId, TrackerStore, UpdaterId};

/// Reasons a statement is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectError {
    #[error("expression must end with a semicolon (;)")]
    MissingTerminator,
    #[error("invalid expression format, expected `[target] = expression;`")]
    InvalidFormat,
    #[error("target tracker '{0}' does not exist")]
    UnknownTarget(String),
    #[error("expression has no right-hand side")]
    EmptyExpression,
    #[error("dependency tracker '{0}' does not exist")]
    UnknownDependency(String),
    /// The position of the error is deliberately not reported.
    #[error("syntax error in expression")]
    Syntax(#[source] ParseError),
    #[error("unknown symbol '{0}' in expression")]
    UnknownSymbol(String),
    #[error("circular dependency: '{dependency}' already depends on '{target}'")]
    Cycle { dependency: String, target: String },
}

/// Successfully registered statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub target: TrackerId,
    pub dependencies: Vec<TrackerId>,
    pub source: String,
}

/// `{ success, message }` report for display surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOutcome {
    pub success: bool,
    pub message: String,
}

impl From<&Result<Connection, ConnectError>> for ConnectOutcome {
    fn from(result: &Result<Connection, ConnectError>) -> Self {
        match result {
            Ok(connection) => Self {
                success: true,
                message: format!("linked expression to '{}'", connection.target),
            },
            Err(err) => Self {
                success: false,
                message: err.to_string(),
            },
        }
    }
}

impl From<Result<Connection, ConnectError>> for ConnectOutcome {
    fn from(result: Result<Connection, ConnectError>) -> Self {
        Self::from(&result)
    }
}

/// Statement that passed every check but has not been committed.
#[derive(Debug, Clone)]
struct Validated {
    target: TrackerId,
    source: String,
    expr: Expr,
    dependencies: BTreeSet<TrackerId>,
}

fn validate(
    trackers: &TrackerStore,
    graph: &DependencyGraph,
    text: &str,
) -> Result<Validated, ConnectError> {
    let source = text.trim();
    let body = source
        .strip_suffix(';')
        .ok_or(ConnectError::MissingTerminator)?;

    let (lhs, rhs) = body.split_once('=').ok_or(ConnectError::InvalidFormat)?;
    let target = lhs
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|id| expr::is_valid_id(id))
        .ok_or(ConnectError::InvalidFormat)?;
    if !trackers.contains(target) {
        return Err(ConnectError::UnknownTarget(target.to_string()));
    }

    let rhs = rhs.trim();
    if rhs.is_empty() {
        return Err(ConnectError::EmptyExpression);
    }
    if let Some(missing) = expr::tracker_refs(rhs)
        .into_iter()
        .find(|dep| !trackers.contains(dep))
    {
        return Err(ConnectError::UnknownDependency(missing));
    }

    let expr = Expr::parse(rhs).map_err(ConnectError::Syntax)?;
    if let Some(symbol) = expr.variables().into_iter().next() {
        return Err(ConnectError::UnknownSymbol(symbol));
    }
    let dependencies = expr.tracker_refs();
    // Refs the lexical scan skipped fail to parse, so this only guards
    // against the two passes disagreeing.
    if let Some(missing) = dependencies.iter().find(|dep| !trackers.contains(dep)) {
        return Err(ConnectError::UnknownDependency(missing.clone()));
    }

    if let Some(dependency) = graph.find_cycle(target, &dependencies) {
        return Err(ConnectError::Cycle {
            dependency: dependency.to_string(),
            target: target.to_string(),
        });
    }

    Ok(Validated {
        target: target.to_string(),
        source: source.to_string(),
        expr,
        dependencies,
    })
}

/// Validates `text` and, on success, binds its target: the graph entry for
/// the target is replaced and every dependency carries exactly one updater
/// for the target. Dependencies of a previous binding that are no longer
/// read lose their updater.
///
/// The target value is not recomputed here; callers owning the propagation
/// loop do that after committing.
pub fn connect(
    trackers: &mut TrackerStore,
    graph: &mut DependencyGraph,
    text: &str,
) -> Result<Connection, ConnectError> {
    let validated = validate(trackers, graph, text)?;
    let Validated {
        target,
        source,
        expr,
        dependencies,
    } = validated;

    let updater = UpdaterId::Expression {
        target: target.clone(),
    };
    if let Some(previous) = graph.dependencies_of(&target) {
        for stale in previous.difference(&dependencies) {
            if let Some(tracker) = trackers.get_mut(stale) {
                tracker.remove_updater(&updater);
            }
        }
    }
    for dep in &dependencies {
        if let Some(tracker) = trackers.get_mut(dep) {
            tracker.add_updater(updater.clone(), source.clone());
        }
    }

    let connection = Connection {
        target: target.clone(),
        dependencies: dependencies.iter().cloned().collect(),
        source: source.clone(),
    };
    graph.insert(
        target,
        BoundExpression {
            source,
            expr,
            dependencies,
        },
    );
    debug!(
        target = %connection.target,
        dependencies = ?connection.dependencies,
        "expression linked"
    );
    Ok(connection)
}

/// Unbinds `target`, removing its graph entry and the updaters it placed on
/// its dependencies. Returns `false` when the target had no expression.
pub fn remove_expression(trackers: &mut TrackerStore, graph: &mut DependencyGraph, target: &str) -> bool {
    let Some(bound) = graph.remove(target) else {
        warn!(target, "no expression to remove");
        return false;
    };
    let updater = UpdaterId::Expression {
        target: target.to_string(),
    };
    for dep in &bound.dependencies {
        if let Some(tracker) = trackers.get_mut(dep) {
            tracker.remove_updater(&updater);
        }
    }
    debug!(target, "expression removed");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ids: &[&str]) -> TrackerStore {
        let mut store = TrackerStore::new();
        for id in ids {
            store.create(id, 0.0).unwrap();
        }
        store
    }

    fn reject(text: &str) -> ConnectError {
        let mut trackers = store(&["a", "b", "c"]);
        let mut graph = DependencyGraph::new();
        connect(&mut trackers, &mut graph, text).unwrap_err()
    }

    #[test]
    fn rejects_each_validation_stage() {
        assert_eq!(reject("[b] = [a] * 2"), ConnectError::MissingTerminator);
        assert_eq!(reject("b = [a] * 2;"), ConnectError::InvalidFormat);
        assert_eq!(reject("[b] [a];"), ConnectError::InvalidFormat);
        assert_eq!(reject("[z] = [a];"), ConnectError::UnknownTarget("z".into()));
        assert_eq!(reject("[b] =  ;"), ConnectError::EmptyExpression);
        assert_eq!(reject("[b] = [a] + [q];"), ConnectError::UnknownDependency("q".into()));
        assert!(matches!(reject("[b] = [a] * * 2;"), ConnectError::Syntax(_)));
        assert_eq!(reject("[b] = [a] * k;"), ConnectError::UnknownSymbol("k".into()));
    }

    #[test]
    fn syntax_errors_use_a_generic_message() {
        let err = reject("[b] = ([a] + 1;");
        assert_eq!(err.to_string(), "syntax error in expression");
    }

    #[test]
    fn registers_one_updater_per_dependency() {
        let mut trackers = store(&["a", "b", "c"]);
        let mut graph = DependencyGraph::new();

        let connection = connect(&mut trackers, &mut graph, "[c] = [a] + [b] * [a];").unwrap();
        assert_eq!(connection.dependencies, vec!["a".to_string(), "b".to_string()]);

        let updater = UpdaterId::Expression { target: "c".into() };
        assert_eq!(trackers.get("a").unwrap().updater_ids(), vec![updater.clone()]);
        assert_eq!(trackers.get("b").unwrap().updater_ids(), vec![updater]);
        assert!(trackers.get("c").unwrap().updater_ids().is_empty());
    }

    #[test]
    fn rebinding_replaces_dependencies() {
        let mut trackers = store(&["a", "b", "c"]);
        let mut graph = DependencyGraph::new();

        connect(&mut trackers, &mut graph, "[c] = [a];").unwrap();
        connect(&mut trackers, &mut graph, "[c] = [b] + 1;").unwrap();

        assert!(trackers.get("a").unwrap().updater_ids().is_empty());
        assert_eq!(trackers.get("b").unwrap().updater_ids().len(), 1);
        let deps: Vec<_> = graph.dependencies_of("c").unwrap().iter().cloned().collect();
        assert_eq!(deps, vec!["b".to_string()]);
        assert_eq!(graph.get("c").unwrap().source, "[c] = [b] + 1;");
    }

    #[test]
    fn cycle_rejection_leaves_state_untouched() {
        let mut trackers = store(&["a", "b", "c"]);
        let mut graph = DependencyGraph::new();
        connect(&mut trackers, &mut graph, "[b] = [a];").unwrap();
        connect(&mut trackers, &mut graph, "[c] = [b];").unwrap();

        let err = connect(&mut trackers, &mut graph, "[a] = [c] * 2;").unwrap_err();
        assert_eq!(
            err,
            ConnectError::Cycle {
                dependency: "c".into(),
                target: "a".into()
            }
        );
        assert!(!graph.is_bound("a"));
        assert!(trackers.get("c").unwrap().updater_ids().is_empty());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn removal_clears_updaters_and_tolerates_missing_targets() {
        let mut trackers = store(&["a", "b"]);
        let mut graph = DependencyGraph::new();
        connect(&mut trackers, &mut graph, "[b] = [a] / 2;").unwrap();

        assert!(remove_expression(&mut trackers, &mut graph, "b"));
        assert!(trackers.get("a").unwrap().updater_ids().is_empty());
        assert!(graph.is_empty());
        assert!(!remove_expression(&mut trackers, &mut graph, "b"));
    }

    #[test]
    fn outcome_reports_success_and_failure() {
        let mut trackers = store(&["a", "b"]);
        let mut graph = DependencyGraph::new();

        let ok = ConnectOutcome::from(connect(&mut trackers, &mut graph, "[b] = [a];"));
        assert!(ok.success);
        assert!(ok.message.contains("'b'"));

        let failed = ConnectOutcome::from(connect(&mut trackers, &mut graph, "[b] = [a]"));
        assert!(!failed.success);
        assert!(failed.message.contains("semicolon"));
    }
}
