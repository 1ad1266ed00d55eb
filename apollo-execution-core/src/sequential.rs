//! Strictly ordered evaluation of steps that may suspend.
//!
//! Step `i + 1` is only invoked once the outcome of step `i` is fully resolved, and receives the
//! results accumulated so far. The first failure stops the evaluation; the accumulated results
//! are dropped with it.
//!
//! Steps returning materialized values are evaluated eagerly on the calling stack. Once a step
//! suspends, the remaining steps are driven by a loop awaiting each pending step in turn, so the
//! stack never grows with the length of the sequence.

use crate::error::BoxError;
use crate::error::FieldError;
use crate::outcome::Outcome;
use crate::outcome::Pending;

struct Sequence<I, U, F> {
    items: I,
    results: Vec<U>,
    step: F,
}

impl<I, U, F, E> Sequence<I, U, F>
where
    I: Iterator + Send + 'static,
    U: Send + 'static,
    F: FnMut(I::Item, &[U]) -> Result<Outcome<U>, E> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    /// Evaluates steps until one suspends or the items are exhausted.
    fn advance(&mut self) -> Result<Option<Pending<U>>, FieldError> {
        for item in self.items.by_ref() {
            match (self.step)(item, &self.results).map_err(FieldError::capture)? {
                Outcome::Ready(value) => self.results.push(value),
                Outcome::Pending(pending) => return Ok(Some(pending)),
            }
        }
        Ok(None)
    }

    async fn resume(mut self, mut pending: Pending<U>) -> Result<Vec<U>, FieldError> {
        loop {
            let value = pending.await?;
            self.results.push(value);
            tracing::trace!(completed = self.results.len(), "sequential step resolved");
            match self.advance()? {
                Some(next) => pending = next,
                None => return Ok(self.results),
            }
        }
    }
}

/// Evaluates `step` for every item, one at a time and in order.
///
/// A synchronous failure of `step` is captured as an adapted failure; a failure delivered by a
/// pending step is passed through unchanged.
pub fn each_sequentially<I, U, F, E>(items: I, step: F) -> Pending<Vec<U>>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    U: Send + 'static,
    F: FnMut(I::Item, &[U]) -> Result<Outcome<U>, E> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    let items = items.into_iter();
    let mut sequence = Sequence {
        results: Vec::with_capacity(items.size_hint().0),
        items,
        step,
    };
    match sequence.advance() {
        Ok(None) => Pending::ready(sequence.results),
        Ok(Some(pending)) => Pending::new(sequence.resume(pending)),
        Err(error) => {
            tracing::debug!(completed = sequence.results.len(), %error, "sequential step failed");
            Pending::failed(error)
        }
    }
}

/// Same as [`each_sequentially`], but also passes the index of the item to `step`, which always
/// returns a pending computation.
pub fn each_sequentially_indexed<I, U, F, E>(items: I, mut step: F) -> Pending<Vec<U>>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    U: Send + 'static,
    F: FnMut(I::Item, usize, &[U]) -> Result<Pending<U>, E> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    let mut index = 0;
    each_sequentially(items, move |item, previous: &[U]| {
        let pending = step(item, index, previous)?;
        index += 1;
        Ok::<_, E>(Outcome::Pending(pending))
    })
}
