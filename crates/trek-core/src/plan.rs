//! Resolved migration plans.

use crate::operation::Operation;
use crate::revision::{Direction, Revision};
use std::fmt;
use std::sync::Arc;

/// One validated edge of a plan.
pub struct PlannedStep<C: Send + ?Sized> {
    from: Revision,
    to: Revision,
    direction: Direction,
    operation: Arc<dyn Operation<C>>,
}

impl<C: Send + ?Sized> PlannedStep<C> {
    pub(crate) fn new(
        from: Revision,
        to: Revision,
        direction: Direction,
        operation: Arc<dyn Operation<C>>,
    ) -> Self {
        Self {
            from,
            to,
            direction,
            operation,
        }
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

    /// Direction of the step.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The operation to run.
    #[must_use]
    pub fn operation(&self) -> &dyn Operation<C> {
        self.operation.as_ref()
    }
}

impl<C: Send + ?Sized> Clone for PlannedStep<C> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            direction: self.direction,
            operation: Arc::clone(&self.operation),
        }
    }
}

impl<C: Send + ?Sized> fmt::Debug for PlannedStep<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("direction", &self.direction)
            .field("operation", &self.operation.describe())
            .finish()
    }
}

impl<C: Send + ?Sized> fmt::Display for PlannedStep<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Immutable ordered list of steps from a start revision to a target.
///
/// Consecutive steps chain (`steps[i].to == steps[i + 1].from`). An empty
/// plan means the start already is the target.
pub struct Plan<C: Send + ?Sized> {
    start: Revision,
    target: Revision,
    direction: Direction,
    steps: Vec<PlannedStep<C>>,
}

impl<C: Send + ?Sized> Plan<C> {
    pub(crate) fn new(
        start: Revision,
        target: Revision,
        direction: Direction,
        steps: Vec<PlannedStep<C>>,
    ) -> Self {
        Self {
            start,
            target,
            direction,
            steps,
        }
    }

    pub(crate) fn empty(at: Revision, direction: Direction) -> Self {
        Self {
            start: at.clone(),
            target: at,
            direction,
            steps: Vec::new(),
        }
    }

    /// Revision the plan starts from.
    #[must_use]
    pub fn start(&self) -> &Revision {
        &self.start
    }

    /// Revision the plan ends at.
    #[must_use]
    pub fn target(&self) -> &Revision {
        &self.target
    }

    /// Direction of every step.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Steps in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, PlannedStep<C>> {
        self.steps.iter()
    }

    /// Steps as a slice.
    #[must_use]
    pub fn steps(&self) -> &[PlannedStep<C>] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Revisions visited, start first.
    #[must_use]
    pub fn revisions(&self) -> Vec<&Revision> {
        std::iter::once(&self.start)
            .chain(self.steps.iter().map(|s| &s.to))
            .collect()
    }
}

impl<C: Send + ?Sized> Clone for Plan<C> {
    fn clone(&self) -> Self {
        Self {
            start: self.start.clone(),
            target: self.target.clone(),
            direction: self.direction,
            steps: self.steps.clone(),
        }
    }
}

impl<C: Send + ?Sized> fmt::Debug for Plan<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("start", &self.start)
            .field("target", &self.target)
            .field("direction", &self.direction)
            .field("steps", &self.steps)
            .finish()
    }
}

/// Renders as `A -> B -> C`.
impl<C: Send + ?Sized> fmt::Display for Plan<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.revisions().iter().map(ToString::to_string).collect();
        f.write_str(&path.join(" -> "))
    }
}

impl<'a, C: Send + ?Sized> IntoIterator for &'a Plan<C> {
    type Item = &'a PlannedStep<C>;
    type IntoIter = std::slice::Iter<'a, PlannedStep<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
