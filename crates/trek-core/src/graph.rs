//! Directional revision graph.

use crate::error::{Result, TrekError};
use crate::migration::{Migration, Migrations};
use crate::revision::{Direction, Revision};
use std::collections::{BTreeMap, BTreeSet};

/// Adjacency view of one direction of an edge collection.
///
/// Keys and neighbour lists are kept sorted, so the same edge set yields the
/// same graph regardless of input order.
#[derive(Debug)]
pub struct RevisionGraph<'a, C: Send + ?Sized> {
    direction: Direction,
    adjacency: BTreeMap<&'a Revision, BTreeSet<&'a Revision>>,
    edges: BTreeMap<(&'a Revision, &'a Revision), &'a Migration<C>>,
}

impl<'a, C: Send + ?Sized> RevisionGraph<'a, C> {
    /// Build the graph for `direction`.
    ///
    /// Fails with [`TrekError::DuplicateMigration`] when two edges of that
    /// direction share endpoints. Revisions without outgoing edges are simply
    /// absent from the adjacency map.
    pub fn build(migrations: &'a Migrations<C>, direction: Direction) -> Result<Self> {
        let mut adjacency: BTreeMap<&Revision, BTreeSet<&Revision>> = BTreeMap::new();
        let mut edges = BTreeMap::new();

        for migration in migrations.iter().filter(|m| m.direction() == direction) {
            let key = (migration.from_rev(), migration.to_rev());
            if edges.insert(key, migration).is_some() {
                return Err(TrekError::DuplicateMigration {
                    from: migration.from_rev().clone(),
                    to: migration.to_rev().clone(),
                    direction,
                });
            }
            adjacency
                .entry(migration.from_rev())
                .or_default()
                .insert(migration.to_rev());
        }

        Ok(Self {
            direction,
            adjacency,
            edges,
        })
    }

    /// Direction this graph was built for.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Sorted successors of `revision`.
    pub fn successors(&self, revision: &Revision) -> impl Iterator<Item = &'a Revision> + '_ {
        self.adjacency
            .get(revision)
            .into_iter()
            .flat_map(|next| next.iter().copied())
    }

    /// The edge between two adjacent revisions.
    #[must_use]
    pub fn edge(&self, from: &Revision, to: &Revision) -> Option<&'a Migration<C>> {
        self.edges.get(&(from, to)).copied()
    }

    /// Every revision touched by an edge of this direction.
    #[must_use]
    pub fn nodes(&self) -> BTreeSet<&'a Revision> {
        self.edges.keys().flat_map(|(from, to)| [*from, *to]).collect()
    }

    /// Number of edges in this direction.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
