//! Migration edges and the ordered collection they are resolved from.

use crate::operation::Operation;
use crate::revision::{Direction, Revision};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A directed, executable transition between two revisions.
pub struct Migration<C: Send + ?Sized> {
    from: Revision,
    to: Revision,
    direction: Direction,
    operation: Option<Arc<dyn Operation<C>>>,
}

impl<C: Send + ?Sized> Migration<C> {
    /// Create an edge with an operation.
    pub fn new(
        from: impl Into<Revision>,
        to: impl Into<Revision>,
        direction: Direction,
        operation: Arc<dyn Operation<C>>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            direction,
            operation: Some(operation),
        }
    }

    /// Create an edge declared without a body.
    pub fn without_operation(
        from: impl Into<Revision>,
        to: impl Into<Revision>,
        direction: Direction,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            direction,
            operation: None,
        }
    }

    /// Shorthand for an `up` edge.
    pub fn up(
        from: impl Into<Revision>,
        to: impl Into<Revision>,
        operation: Arc<dyn Operation<C>>,
    ) -> Self {
        Self::new(from, to, Direction::Up, operation)
    }

    /// Shorthand for a `down` edge.
    pub fn down(
        from: impl Into<Revision>,
        to: impl Into<Revision>,
        operation: Arc<dyn Operation<C>>,
    ) -> Self {
        Self::new(from, to, Direction::Down, operation)
    }

    /// Source revision.
    #[must_use]
    pub fn from_rev(&self) -> &Revision {
        &self.from
    }

    /// Destination revision.
    #[must_use]
    pub fn to_rev(&self) -> &Revision {
        &self.to
    }

    /// Direction of the edge.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The edge body, if one was declared.
    #[must_use]
    pub fn operation(&self) -> Option<&Arc<dyn Operation<C>>> {
        self.operation.as_ref()
    }

    /// Whether the edge carries a body.
    #[must_use]
    pub fn has_operation(&self) -> bool {
        self.operation.is_some()
    }
}

impl<C: Send + ?Sized> Clone for Migration<C> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            direction: self.direction,
            operation: self.operation.clone(),
        }
    }
}

impl<C: Send + ?Sized> fmt::Debug for Migration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("direction", &self.direction)
            .field("operation", &self.operation.as_ref().map(|op| op.describe()))
            .finish()
    }
}

impl<C: Send + ?Sized> fmt::Display for Migration<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.direction)
    }
}

/// One revision of a linear, file-per-revision history.
pub struct RevisionSpec<C: Send + ?Sized> {
    /// Revision identifier.
    pub id: Revision,
    /// Body applied when moving onto this revision.
    pub upgrade: Option<Arc<dyn Operation<C>>>,
    /// Body applied when moving off this revision.
    pub downgrade: Option<Arc<dyn Operation<C>>>,
}

impl<C: Send + ?Sized> RevisionSpec<C> {
    /// A revision with neither body set.
    pub fn new(id: impl Into<Revision>) -> Self {
        Self {
            id: id.into(),
            upgrade: None,
            downgrade: None,
        }
    }

    /// Set the upgrade body.
    #[must_use]
    pub fn with_upgrade(mut self, op: Arc<dyn Operation<C>>) -> Self {
        self.upgrade = Some(op);
        self
    }

    /// Set the downgrade body.
    #[must_use]
    pub fn with_downgrade(mut self, op: Arc<dyn Operation<C>>) -> Self {
        self.downgrade = Some(op);
        self
    }
}

/// Ordered edge collection.
///
/// Collection order is the external sort order: the newest known revision is
/// the destination of the last `up` edge.
pub struct Migrations<C: Send + ?Sized> {
    edges: Vec<Migration<C>>,
}

impl<C: Send + ?Sized> Default for Migrations<C> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

impl<C: Send + ?Sized> Clone for Migrations<C> {
    fn clone(&self) -> Self {
        Self {
            edges: self.edges.clone(),
        }
    }
}

impl<C: Send + ?Sized> fmt::Debug for Migrations<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.edges).finish()
    }
}

impl<C: Send + ?Sized> Migrations<C> {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the edges of a linear history.
    ///
    /// Revision `i` gets an `up` edge from its predecessor (the initial
    /// sentinel for the first one) carrying `upgrade`, and a `down` edge back
    /// carrying `downgrade`. Missing bodies stay missing so resolution can
    /// report them.
    pub fn from_linear(revisions: impl IntoIterator<Item = RevisionSpec<C>>) -> Self {
        let mut migrations = Self::new();
        let mut previous = Revision::initial();
        for spec in revisions {
            migrations.push(Migration {
                from: previous.clone(),
                to: spec.id.clone(),
                direction: Direction::Up,
                operation: spec.upgrade,
            });
            migrations.push(Migration {
                from: spec.id.clone(),
                to: previous,
                direction: Direction::Down,
                operation: spec.downgrade,
            });
            previous = spec.id;
        }
        migrations
    }

    /// Append an edge.
    pub fn push(&mut self, migration: Migration<C>) -> &mut Self {
        self.edges.push(migration);
        self
    }

    /// Append an edge, builder style.
    #[must_use]
    pub fn with(mut self, migration: Migration<C>) -> Self {
        self.edges.push(migration);
        self
    }

    /// Edges in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &Migration<C>> {
        self.edges.iter()
    }

    /// Number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The newest known revision.
    #[must_use]
    pub fn head(&self) -> Option<&Revision> {
        self.edges
            .iter()
            .rev()
            .find(|m| m.direction == Direction::Up)
            .map(|m| &m.to)
    }

    /// Every revision mentioned by any edge, in either direction.
    #[must_use]
    pub fn revisions(&self) -> BTreeSet<&Revision> {
        self.edges
            .iter()
            .flat_map(|m| [&m.from, &m.to])
            .collect()
    }

    /// Whether any edge mentions `revision`.
    #[must_use]
    pub fn contains(&self, revision: &Revision) -> bool {
        self.edges
            .iter()
            .any(|m| &m.from == revision || &m.to == revision)
    }
}

impl<C: Send + ?Sized> FromIterator<Migration<C>> for Migrations<C> {
    fn from_iter<I: IntoIterator<Item = Migration<C>>>(iter: I) -> Self {
        Self {
            edges: iter.into_iter().collect(),
        }
    }
}

impl<C: Send + ?Sized> Extend<Migration<C>> for Migrations<C> {
    fn extend<I: IntoIterator<Item = Migration<C>>>(&mut self, iter: I) {
        self.edges.extend(iter);
    }
}

impl<'a, C: Send + ?Sized> IntoIterator for &'a Migrations<C> {
    type Item = &'a Migration<C>;
    type IntoIter = std::slice::Iter<'a, Migration<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Operation<()> for Noop {
        async fn run(&self, _conn: &mut ()) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn noop() -> Arc<dyn Operation<()>> {
        Arc::new(Noop)
    }

    #[test]
    fn test_head_is_last_up_edge() {
        let migrations: Migrations<()> = Migrations::new()
            .with(Migration::up("initial", "1", noop()))
            .with(Migration::up("1", "2", noop()))
            .with(Migration::down("2", "1", noop()))
            .with(Migration::down("1", "initial", noop()));

        assert_eq!(migrations.head(), Some(&Revision::new("2")));
        assert_eq!(migrations.len(), 4);
        assert!(migrations.contains(&Revision::initial()));
        assert_eq!(migrations.revisions().len(), 3);
    }

    #[test]
    fn test_head_without_up_edges() {
        let migrations: Migrations<()> =
            Migrations::new().with(Migration::down("1", "initial", noop()));
        assert_eq!(migrations.head(), None);
        assert_eq!(Migrations::<()>::new().head(), None);
    }

    #[test]
    fn test_from_linear_builds_both_directions() {
        let migrations = Migrations::from_linear(vec![
            RevisionSpec::new("1").with_upgrade(noop()).with_downgrade(noop()),
            RevisionSpec::new("2").with_upgrade(noop()),
        ]);

        let edges: Vec<String> = migrations.iter().map(ToString::to_string).collect();
        assert_eq!(
            edges,
            vec![
                "initial -> 1 (up)",
                "1 -> initial (down)",
                "1 -> 2 (up)",
                "2 -> 1 (down)",
            ]
        );
        let missing: Vec<bool> = migrations.iter().map(Migration::has_operation).collect();
        assert_eq!(missing, vec![true, true, true, false]);
        assert_eq!(migrations.head(), Some(&Revision::new("2")));
    }
}
