//! Path resolution over the revision graph.
//!
//! Resolution runs in three steps:
//! 1. symbolic targets are mapped to concrete revisions, both endpoints are
//!    checked against the known node set and the directional graph is built,
//! 2. unless the endpoints coincide, a breadth-first search finds the
//!    shortest node path in the requested direction,
//! 3. every step of the node path is turned into an edge whose operation is
//!    present.

use crate::error::{Result, TrekError};
use crate::graph::RevisionGraph;
use crate::migration::Migrations;
use crate::plan::{Plan, PlannedStep};
use crate::revision::{Direction, Revision, Target};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Resolve a plan that moves `current` to `target` in `direction`.
pub fn resolve<C: Send + ?Sized>(
    migrations: &Migrations<C>,
    current: &Revision,
    target: &Target,
    direction: Direction,
) -> Result<Plan<C>> {
    let target = concrete_target(migrations, target, direction)?;

    for revision in [current, &target] {
        if !revision.is_initial() && !migrations.contains(revision) {
            return Err(TrekError::UnknownRevision {
                revision: revision.clone(),
            });
        }
    }

    let graph = RevisionGraph::build(migrations, direction)?;
    if *current == target {
        debug!(revision = %current, "Already at target revision");
        return Ok(Plan::empty(current.clone(), direction));
    }

    let path = shortest_path(&graph, current, &target).ok_or_else(|| TrekError::NoPath {
        from: current.clone(),
        to: target.clone(),
        direction,
    })?;

    let mut steps = Vec::with_capacity(path.len().saturating_sub(1));
    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let edge = graph.edge(from, to).ok_or_else(|| TrekError::NoPath {
            from: from.clone(),
            to: to.clone(),
            direction,
        })?;
        let operation = edge.operation().ok_or_else(|| TrekError::NoOperation {
            from: from.clone(),
            to: to.clone(),
            direction,
        })?;
        steps.push(PlannedStep::new(
            from.clone(),
            to.clone(),
            direction,
            operation.clone(),
        ));
    }

    debug!(
        from = %current,
        to = %target,
        %direction,
        steps = steps.len(),
        "Resolved migration path"
    );
    Ok(Plan::new(current.clone(), target, direction, steps))
}

/// Map a possibly symbolic target to a concrete revision.
fn concrete_target<C: Send + ?Sized>(
    migrations: &Migrations<C>,
    target: &Target,
    direction: Direction,
) -> Result<Revision> {
    match target {
        Target::Head => migrations
            .head()
            .cloned()
            .ok_or_else(|| TrekError::NoRevisions {
                target: target.to_string(),
                direction,
            }),
        Target::Initial => Ok(Revision::initial()),
        Target::Revision(revision) => Ok(revision.clone()),
    }
}

/// Breadth-first search returning the node path from `start` to `end`.
///
/// Each node is enqueued at most once, so cycles terminate and the first path
/// found has the fewest edges. Successors are visited in sorted order, which
/// makes the choice among equally short paths deterministic.
fn shortest_path<'g, C: Send + ?Sized>(
    graph: &RevisionGraph<'g, C>,
    start: &'g Revision,
    end: &Revision,
) -> Option<Vec<&'g Revision>> {
    let mut parents: HashMap<&'g Revision, &'g Revision> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        if node == end {
            let mut path = vec![node];
            let mut cursor = node;
            while let Some(&parent) = parents.get(cursor) {
                path.push(parent);
                cursor = parent;
            }
            path.reverse();
            return Some(path);
        }
        for next in graph.successors(node) {
            if next != start && !parents.contains_key(next) {
                parents.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    None
}
