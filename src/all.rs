//! "All must succeed" aggregation.
//!
//! The aggregate fulfills with every input's value, in input order, once the
//! last input fulfills. The first observed rejection rejects the aggregate
//! immediately; settlements of the remaining inputs after that are ignored.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::{Deferred, Promise, Resolver};

struct Slots<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

impl<T> Slots<T> {
    fn new(len: usize) -> Self {
        Self {
            values: (0..len).map(|_| None).collect(),
            remaining: len,
        }
    }

    /// Stores `value` at `index`. Returns the ordered values once every slot
    /// has been written.
    fn fill(&mut self, index: usize, value: T) -> Option<Vec<T>> {
        let slot = &mut self.values[index];
        if slot.is_some() {
            return None;
        }
        *slot = Some(value);
        self.remaining -= 1;
        if self.remaining > 0 {
            return None;
        }
        Some(std::mem::take(&mut self.values).into_iter().flatten().collect())
    }
}

/// Combines `inputs` into one result that fulfills with all of their values
/// in input order, or rejects with the first rejection observed.
///
/// An empty input fulfills immediately with an empty `Vec`. An input that
/// never settles keeps the aggregate pending.
///
/// # Examples
///
/// ```
/// use promise_combinators::{all, Deferred, Promise, Resolver};
///
/// let (slow, a) = Resolver::<&str, ()>::new();
/// let b = Deferred::fulfilled("fast");
/// let both = all([a, b]);
/// assert!(both.is_pending());
///
/// slow.resolve("slow");
/// assert_eq!(both.outcome().as_deref(), Some(&Ok(vec!["slow", "fast"])));
/// ```
pub fn all<T, E, I>(inputs: I) -> Deferred<Vec<T>, E>
where
    I: IntoIterator<Item = Deferred<T, E>>,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let inputs: Vec<_> = inputs.into_iter().collect();
    if inputs.is_empty() {
        return Deferred::fulfilled(Vec::new());
    }

    let (resolver, aggregate) = Resolver::new();
    let slots = Arc::new(Mutex::new(Slots::new(inputs.len())));
    for (index, input) in inputs.into_iter().enumerate() {
        let resolver: Resolver<Vec<T>, E> = resolver.clone();
        let slots = Arc::clone(&slots);
        input.subscribe(move |outcome| match outcome {
            Ok(value) => {
                if resolver.is_settled() {
                    return;
                }
                let done = slots
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .fill(index, value.clone());
                if let Some(values) = done {
                    debug!(inputs = values.len(), "all inputs fulfilled");
                    resolver.resolve(values);
                }
            }
            Err(reason) => {
                if resolver.reject(reason.clone()) {
                    debug!(index, "input rejected, failing fast");
                }
            }
        });
    }
    aggregate
}

#[cfg(test)]
mod tests {
    use super::{all, Slots};
    use crate::{Deferred, Promise, Resolver, State};

    #[test]
    fn test_slots_fill_in_index_order() {
        let mut slots = Slots::new(3);
        assert_eq!(slots.fill(2, 'c'), None);
        assert_eq!(slots.fill(0, 'a'), None);
        assert_eq!(slots.fill(2, 'x'), None);
        assert_eq!(slots.fill(1, 'b'), Some(vec!['a', 'b', 'c']));
    }

    #[test]
    fn test_empty_input_fulfills_immediately() {
        let none: Vec<Deferred<u8, ()>> = Vec::new();
        assert_eq!(all(none).state(), State::Fulfilled(vec![]));
    }

    #[test]
    fn test_output_order_follows_input_order() {
        let pairs: Vec<_> = (0..4).map(|_| Resolver::<usize, ()>::new()).collect();
        let aggregate = all(pairs.iter().map(|(_, d)| d.clone()));
        for index in [3, 1, 0] {
            pairs[index].0.resolve(index * 10);
            assert!(aggregate.is_pending());
        }
        pairs[2].0.resolve(20);
        assert_eq!(aggregate.state(), State::Fulfilled(vec![0, 10, 20, 30]));
    }

    #[test]
    fn test_first_rejection_wins_and_later_settlements_are_ignored() {
        let (a, da) = Resolver::<u8, &str>::new();
        let (b, db) = Resolver::<u8, &str>::new();
        let (c, dc) = Resolver::<u8, &str>::new();
        let aggregate = all(vec![da, db, dc]);

        a.resolve(1);
        c.reject("c failed");
        b.reject("b failed");
        b.resolve(2);
        assert_eq!(aggregate.state(), State::Rejected("c failed"));
    }

    #[test]
    fn test_never_settling_input_keeps_aggregate_pending() {
        let (_never, pending) = Resolver::<u8, ()>::new();
        let aggregate = all(vec![Deferred::fulfilled(1), pending]);
        assert!(aggregate.is_pending());
    }

    #[test]
    fn test_already_settled_inputs() {
        let aggregate = all(vec![Deferred::<_, ()>::fulfilled(1), Deferred::fulfilled(2)]);
        assert_eq!(aggregate.state(), State::Fulfilled(vec![1, 2]));

        let rejected = all(vec![Deferred::fulfilled(1), Deferred::rejected("no")]);
        assert_eq!(rejected.state(), State::Rejected("no"));
    }

    #[test]
    fn test_same_input_twice_fills_both_slots() {
        let (a, da) = Resolver::<&str, ()>::new();
        let aggregate = all(vec![da.clone(), da]);
        a.resolve("twin");
        assert_eq!(aggregate.state(), State::Fulfilled(vec!["twin", "twin"]));
    }
}
