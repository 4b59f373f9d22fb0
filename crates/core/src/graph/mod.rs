//! Dependency graph between bound trackers.
//!
//! Each bound target maps to the expression that computes it and the set of
//! trackers that expression reads. Edges point from a target to its
//! dependencies and the graph is kept acyclic by the expression connector.

use std::collections::{BTreeMap, BTreeSet};

use crate::expr::Expr;
use crate::tracker::TrackerId;

/// Expression currently bound to a target tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundExpression {
    /// Text as entered, kept for display and removal.
    pub source: String,
    pub expr: Expr,
    pub dependencies: BTreeSet<TrackerId>,
}

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    entries: BTreeMap<TrackerId, BoundExpression>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `target`, replacing any previous expression. Returns the
    /// previous binding.
    pub fn insert(&mut self, target: TrackerId, bound: BoundExpression) -> Option<BoundExpression> {
        self.entries.insert(target, bound)
    }

    pub fn remove(&mut self, target: &str) -> Option<BoundExpression> {
        self.entries.remove(target)
    }

    pub fn get(&self, target: &str) -> Option<&BoundExpression> {
        self.entries.get(target)
    }

    pub fn dependencies_of(&self, target: &str) -> Option<&BTreeSet<TrackerId>> {
        self.entries.get(target).map(|b| &b.dependencies)
    }

    pub fn is_bound(&self, target: &str) -> bool {
        self.entries.contains_key(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Targets whose expression reads `dependency`.
    pub fn dependents_of(&self, dependency: &str) -> Vec<TrackerId> {
        self.entries
            .iter()
            .filter(|(_, bound)| bound.dependencies.contains(dependency))
            .map(|(target, _)| target.clone())
            .collect()
    }

    /// Returns `true` when `from` is `to` or reaches `to` by following
    /// dependency edges.
    pub fn depends_on(&self, from: &str, to: &str) -> bool {
        let mut visited = BTreeSet::new();
        self.reaches(from, to, &mut visited)
    }

    fn reaches<'a>(&'a self, from: &'a str, to: &str, visited: &mut BTreeSet<&'a str>) -> bool {
        if from == to {
            return true;
        }
        if !visited.insert(from) {
            return false;
        }
        self.entries
            .get(from)
            .map(|bound| {
                bound
                    .dependencies
                    .iter()
                    .any(|dep| self.reaches(dep, to, visited))
            })
            .unwrap_or(false)
    }

    /// Checks a prospective binding of `target` to `dependencies` against the
    /// current graph and returns the first dependency that would close a
    /// cycle. The graph is not modified.
    pub fn find_cycle<'d, I>(&self, target: &str, dependencies: I) -> Option<&'d str>
    where
        I: IntoIterator<Item = &'d TrackerId>,
    {
        dependencies
            .into_iter()
            .find(|dep| self.depends_on(dep, target))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of `target -> dependencies` edges.
    pub fn edges(&self) -> BTreeMap<TrackerId, BTreeSet<TrackerId>> {
        self.entries
            .iter()
            .map(|(target, bound)| (target.clone(), bound.dependencies.clone()))
            .collect()
    }
}
