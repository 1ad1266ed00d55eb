//! Eager fan-out over independent items.
//!
//! Every factory invocation happens before anything is awaited, and a synchronous failure of one
//! invocation does not prevent the others. Results are always in item order; there is no
//! ordering between the side effects of different items.

use std::sync::Arc;

use crate::combiner::join;
use crate::combiner::Combined;
use crate::combiner::CombinedBuilder;
use crate::error::BoxError;
use crate::error::FieldError;
use crate::outcome::Outcome;
use crate::outcome::Pending;

/// Joins pending computations, failing as soon as one of them fails.
pub fn all<U>(pending: Vec<Pending<U>>) -> Pending<Vec<U>>
where
    U: Send + 'static,
{
    Pending::new(join(pending))
}

/// Invokes `factory` for every item with its index, then joins the results.
pub fn each<I, U, F, E>(items: I, mut factory: F) -> Pending<Vec<U>>
where
    I: IntoIterator,
    U: Send + 'static,
    F: FnMut(I::Item, usize) -> Result<Pending<U>, E>,
    E: Into<BoxError>,
{
    let pending = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match factory(item, index) {
            Ok(pending) => pending,
            Err(error) => Pending::failed(FieldError::capture(error)),
        })
        .collect();
    all(pending)
}

/// Invokes `factory` for every item and combines the outcomes.
///
/// Returns the materialized values directly when no outcome was pending.
pub fn each_polymorphic<I, U, F, E>(items: I, mut factory: F) -> Outcome<Vec<U>>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
    U: Send + 'static,
    F: FnMut(I::Item) -> Result<Outcome<U>, E>,
    E: Into<BoxError>,
{
    let items = items.into_iter();
    let mut combined = Combined::with_expected_size(items.len());
    for item in items {
        match factory(item) {
            Ok(outcome) => combined.add_outcome(outcome),
            Err(error) => combined.add(Pending::failed(FieldError::capture(error))),
        }
    }
    combined.combine_polymorphic()
}

/// Maps every input to a pending computation and joins them.
pub fn flat_map<T, U, F>(inputs: impl IntoIterator<Item = T>, mapper: F) -> Pending<Vec<U>>
where
    U: Send + 'static,
    F: FnMut(T) -> Pending<U>,
{
    all(inputs.into_iter().map(mapper).collect())
}

/// Maps every value of a pending list.
pub fn map_all<T, U, F>(values: Pending<Vec<T>>, mapper: F) -> Pending<Vec<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    values.map(|values| values.into_iter().map(mapper).collect())
}

/// Maps each pending value on its own.
pub fn map_each<T, U, F>(values: Vec<Pending<T>>, mapper: F) -> Vec<Pending<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    let mapper = Arc::new(mapper);
    values
        .into_iter()
        .map(|pending| {
            let mapper = mapper.clone();
            pending.map(move |value| mapper(value))
        })
        .collect()
}

/// Chains a pending computation on each pending value.
pub fn map_compose<T, U, F>(values: Vec<Pending<T>>, mapper: F) -> Vec<Pending<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> Pending<U> + Send + Sync + 'static,
{
    let mapper = Arc::new(mapper);
    values
        .into_iter()
        .map(|pending| {
            let mapper = mapper.clone();
            pending.and_then(move |value| mapper(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use futures::FutureExt;

    use super::*;

    #[tokio::test]
    async fn each_keeps_item_order() {
        let mut completers = Vec::new();
        let combined = each(0..4, |item, index| {
            assert_eq!(item, index);
            let (completer, pending) = Pending::channel();
            completers.push((item, completer));
            Ok::<_, BoxError>(pending)
        });
        let handle = tokio::spawn(combined);
        for (item, completer) in completers.into_iter().rev() {
            completer.complete(item * 10);
        }
        assert_eq!(handle.await.unwrap().unwrap(), vec![0, 10, 20, 30]);
    }

    #[tokio::test]
    async fn each_invokes_every_factory_despite_failures() {
        let invoked = AtomicUsize::new(0);
        let error = each(vec!["ok", "broken", "ok"], |item, _| {
            invoked.fetch_add(1, Ordering::SeqCst);
            if item == "broken" {
                Err("factory failed")
            } else {
                Ok(Pending::ready(item))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(invoked.load(Ordering::SeqCst), 3);
        assert_eq!(error.to_string(), "factory failed");
        assert!(error.is_adapted());
    }

    #[test]
    fn each_fails_fast() {
        let (_completer, slow) = Pending::<u32>::channel();
        let mut slow = Some(slow);
        let result = each(0..2, |item, _| match item {
            0 => Ok::<_, BoxError>(slow.take().unwrap()),
            _ => Ok(Pending::failed(FieldError::new("fast"))),
        })
        .now_or_never();
        assert_eq!(result.unwrap().unwrap_err().to_string(), "fast");
    }

    #[tokio::test]
    async fn sibling_branches_complete_after_a_failure() {
        let completed = Arc::new(AtomicUsize::new(0));
        let (completer, slow) = Pending::channel();
        let sibling = slow.map({
            let completed = completed.clone();
            move |value: usize| completed.fetch_add(value, Ordering::SeqCst)
        });
        let error = all(vec![sibling, Pending::failed(FieldError::new("fast"))])
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "fast");

        completer.complete(1);
        for _ in 0..100 {
            if completed.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn each_polymorphic_over_synchronous_items_is_materialized() {
        let outcome = each_polymorphic(vec![1, 2, 3, 4, 5], |item| {
            Ok::<_, BoxError>(Outcome::Ready(item * 2))
        });
        match outcome {
            Outcome::Ready(values) => assert_eq!(values, vec![2, 4, 6, 8, 10]),
            Outcome::Pending(_) => panic!("expected a materialized list"),
        }
    }

    #[tokio::test]
    async fn each_polymorphic_with_failure_is_pending_and_fails() {
        let outcome = each_polymorphic(vec![1, 2], |item| {
            if item == 2 {
                Err("no two")
            } else {
                Ok(Outcome::Ready(item))
            }
        });
        assert!(outcome.is_pending());
        let error = outcome.into_pending().await.unwrap_err();
        assert_eq!(error.to_string(), "no two");
    }

    #[tokio::test]
    async fn map_helpers() {
        let values = flat_map(vec![1, 2, 3], |value| Pending::ready(value + 1));
        let values = map_all(values, |value| value * 10);
        assert_eq!(values.await.unwrap(), vec![20, 30, 40]);

        let mapped = map_each(vec![Pending::ready(1), Pending::ready(2)], |value| {
            value.to_string()
        });
        assert_eq!(all(mapped).await.unwrap(), vec!["1", "2"]);

        let composed = map_compose(vec![Pending::ready(1), Pending::ready(2)], |value| {
            if value == 2 {
                Pending::failed(FieldError::new("two"))
            } else {
                Pending::ready(value)
            }
        });
        assert_eq!(all(composed).await.unwrap_err().to_string(), "two");
    }

    #[test]
    fn map_all_adds_no_suspension() {
        let values = map_all(Pending::ready(vec![1, 2]), |value| value + 1);
        assert_eq!(values.now_or_never().unwrap().unwrap(), vec![2, 3]);
    }
}
