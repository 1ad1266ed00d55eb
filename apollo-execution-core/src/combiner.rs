//! Ordered combination of a fixed number of [`Outcome`]s.
//!
//! The position a slot was added at is the position of its value in the combined result,
//! whatever the order in which pending slots complete. Adding more or fewer slots than the
//! expected size is a programming error and panics.

use derivative::Derivative;
use futures::stream::FuturesUnordered;
use futures::Future;
use futures::StreamExt;

use crate::error::FieldError;
use crate::outcome::Outcome;
use crate::outcome::Pending;

/// Merges a declared number of slots into one ordered outcome.
pub trait CombinedBuilder<T> {
    /// Adds a pending slot.
    fn add(&mut self, pending: Pending<T>);

    /// Adds a slot that is either materialized or pending.
    fn add_outcome(&mut self, outcome: Outcome<T>);

    /// Combines the slots into a pending computation of the ordered values.
    ///
    /// Fails with the first failure reported by the join if any pending slot fails.
    fn combine(self) -> Pending<Vec<T>>;

    /// Same as [`CombinedBuilder::combine`], but returns the materialized values directly when
    /// no slot was pending.
    fn combine_polymorphic(self) -> Outcome<Vec<T>>;
}

/// Builder for an expected size of zero.
#[derive(Debug, Default)]
pub struct Empty {
    added: usize,
}

impl Empty {
    fn assert_size(&self) {
        assert!(
            self.added == 0,
            "expected size was 0 got {}",
            self.added
        );
    }
}

impl<T> CombinedBuilder<T> for Empty
where
    T: Send + 'static,
{
    fn add(&mut self, _pending: Pending<T>) {
        self.added += 1;
    }

    fn add_outcome(&mut self, _outcome: Outcome<T>) {
        self.added += 1;
    }

    fn combine(self) -> Pending<Vec<T>> {
        self.assert_size();
        Pending::ready(Vec::new())
    }

    fn combine_polymorphic(self) -> Outcome<Vec<T>> {
        self.assert_size();
        Outcome::Ready(Vec::new())
    }
}

/// Builder for an expected size of one, holding the slot without any array allocation.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Single<T> {
    #[derivative(Debug = "ignore")]
    slot: Option<Outcome<T>>,
    added: usize,
}

impl<T> Default for Single<T> {
    fn default() -> Self {
        Self {
            slot: None,
            added: 0,
        }
    }
}

impl<T> Single<T> {
    fn into_slot(self) -> Outcome<T> {
        match (self.added, self.slot) {
            (1, Some(slot)) => slot,
            (added, _) => panic!("expected size was 1 got {added}"),
        }
    }
}

impl<T> CombinedBuilder<T> for Single<T>
where
    T: Send + 'static,
{
    fn add(&mut self, pending: Pending<T>) {
        self.add_outcome(Outcome::Pending(pending));
    }

    fn add_outcome(&mut self, outcome: Outcome<T>) {
        self.slot = Some(outcome);
        self.added += 1;
    }

    fn combine(self) -> Pending<Vec<T>> {
        match self.into_slot() {
            Outcome::Ready(value) => Pending::ready(vec![value]),
            Outcome::Pending(pending) => pending.map(|value| vec![value]),
        }
    }

    fn combine_polymorphic(self) -> Outcome<Vec<T>> {
        match self.into_slot() {
            Outcome::Ready(value) => Outcome::Ready(vec![value]),
            Outcome::Pending(pending) => Outcome::Pending(pending.map(|value| vec![value])),
        }
    }
}

/// Builder for an expected size of two or more.
///
/// Materialized values are stored in place; pending slots leave a hole that is filled once the
/// join over exactly the pending slots succeeds.
pub struct Many<T> {
    expected: usize,
    values: Vec<Option<T>>,
    pending: Vec<(usize, Pending<T>)>,
}

impl<T> std::fmt::Debug for Many<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Many")
            .field("expected", &self.expected)
            .field("added", &self.values.len())
            .field("pending", &format_args!("Pending[{}]", self.pending.len()))
            .finish()
    }
}

impl<T> Many<T> {
    fn with_expected_size(expected: usize) -> Self {
        Self {
            expected,
            values: Vec::with_capacity(expected),
            pending: Vec::new(),
        }
    }

    fn next_index(&mut self) -> usize {
        let index = self.values.len();
        assert!(
            index < self.expected,
            "expected size was {} got {}",
            self.expected,
            index + 1
        );
        index
    }

    fn assert_size(&self) {
        assert!(
            self.values.len() == self.expected,
            "expected size was {} got {}",
            self.expected,
            self.values.len()
        );
    }

    fn materialized(self) -> Vec<T> {
        self.values.into_iter().flatten().collect()
    }
}

impl<T> CombinedBuilder<T> for Many<T>
where
    T: Send + 'static,
{
    fn add(&mut self, pending: Pending<T>) {
        let index = self.next_index();
        self.values.push(None);
        self.pending.push((index, pending));
    }

    fn add_outcome(&mut self, outcome: Outcome<T>) {
        match outcome {
            Outcome::Ready(value) => {
                self.next_index();
                self.values.push(Some(value));
            }
            Outcome::Pending(pending) => self.add(pending),
        }
    }

    fn combine(self) -> Pending<Vec<T>> {
        self.assert_size();
        tracing::trace!(
            slots = self.expected,
            pending = self.pending.len(),
            "combining slots"
        );
        if self.pending.is_empty() {
            return Pending::ready(self.materialized());
        }

        let Many {
            mut values,
            pending,
            ..
        } = self;
        let (indices, pending): (Vec<usize>, Vec<Pending<T>>) = pending.into_iter().unzip();
        Pending::new(async move {
            let resolved = join(pending).await?;
            for (index, value) in indices.into_iter().zip(resolved) {
                values[index] = Some(value);
            }
            Ok::<_, FieldError>(values.into_iter().flatten().collect())
        })
    }

    fn combine_polymorphic(self) -> Outcome<Vec<T>> {
        if self.pending.is_empty() {
            self.assert_size();
            Outcome::Ready(self.materialized())
        } else {
            Outcome::Pending(self.combine())
        }
    }
}

/// Joins pending computations in order, failing with the first failure observed.
///
/// The computations still running when a failure is observed are not cancelled: they are
/// detached and driven to completion in the background.
pub(crate) async fn join<T>(pending: Vec<Pending<T>>) -> Result<Vec<T>, FieldError>
where
    T: Send + 'static,
{
    let mut values: Vec<Option<T>> = pending.iter().map(|_| None).collect();
    let mut running: FuturesUnordered<_> = pending
        .into_iter()
        .enumerate()
        .map(|(index, pending)| async move { (index, pending.await) })
        .collect();
    while let Some((index, result)) = running.next().await {
        match result {
            Ok(value) => values[index] = Some(value),
            Err(error) => {
                detach(running);
                return Err(error);
            }
        }
    }
    Ok(values.into_iter().flatten().collect())
}

/// Drives the remaining computations of a failed join to completion.
///
/// Runs them on the ambient tokio runtime, or on a dedicated thread outside of one.
fn detach<F>(running: FuturesUnordered<F>)
where
    F: Future + Send + 'static,
    F::Output: Send,
{
    if running.is_empty() {
        return;
    }
    tracing::trace!(remaining = running.len(), "detaching computations of a failed join");
    let drive = running.for_each(|_| futures::future::ready(()));
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(drive);
        }
        Err(_) => {
            std::thread::spawn(move || futures::executor::block_on(drive));
        }
    }
}

/// A [`CombinedBuilder`] whose strategy is chosen from the expected size.
#[derive(Debug)]
pub enum Combined<T> {
    Empty(Empty),
    Single(Single<T>),
    Many(Many<T>),
}

impl<T> Combined<T>
where
    T: Send + 'static,
{
    pub fn with_expected_size(expected: usize) -> Self {
        match expected {
            0 => Combined::Empty(Empty::default()),
            1 => Combined::Single(Single::default()),
            _ => Combined::Many(Many::with_expected_size(expected)),
        }
    }
}

impl<T> CombinedBuilder<T> for Combined<T>
where
    T: Send + 'static,
{
    fn add(&mut self, pending: Pending<T>) {
        match self {
            Combined::Empty(builder) => CombinedBuilder::<T>::add(builder, pending),
            Combined::Single(builder) => builder.add(pending),
            Combined::Many(builder) => builder.add(pending),
        }
    }

    fn add_outcome(&mut self, outcome: Outcome<T>) {
        match self {
            Combined::Empty(builder) => CombinedBuilder::<T>::add_outcome(builder, outcome),
            Combined::Single(builder) => builder.add_outcome(outcome),
            Combined::Many(builder) => builder.add_outcome(outcome),
        }
    }

    fn combine(self) -> Pending<Vec<T>> {
        match self {
            Combined::Empty(builder) => CombinedBuilder::<T>::combine(builder),
            Combined::Single(builder) => builder.combine(),
            Combined::Many(builder) => builder.combine(),
        }
    }

    fn combine_polymorphic(self) -> Outcome<Vec<T>> {
        match self {
            Combined::Empty(builder) => CombinedBuilder::<T>::combine_polymorphic(builder),
            Combined::Single(builder) => builder.combine_polymorphic(),
            Combined::Many(builder) => builder.combine_polymorphic(),
        }
    }
}
