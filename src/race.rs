use tracing::debug;

use crate::{Deferred, Promise, Resolver};

/// Settles with whichever of `inputs` settles first, fulfilled or rejected.
///
/// Every input is subscribed to once, in order. Later settlements are no-ops
/// on the already settled aggregate. With no inputs the result never settles.
///
/// # Examples
///
/// ```
/// use promise_combinators::{race, Promise, Resolver};
///
/// let (slow, a) = Resolver::<&str, &str>::new();
/// let (fast, b) = Resolver::<&str, &str>::new();
/// let winner = race([a, b]);
///
/// fast.reject("fast failed");
/// slow.resolve("slow");
/// assert_eq!(winner.outcome().as_deref(), Some(&Err("fast failed")));
/// ```
pub fn race<T, E, I>(inputs: I) -> Deferred<T, E>
where
    I: IntoIterator<Item = Deferred<T, E>>,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let (resolver, winner) = Resolver::new();
    for (index, input) in inputs.into_iter().enumerate() {
        let resolver: Resolver<T, E> = resolver.clone();
        input.subscribe(move |outcome| {
            if resolver.settle(outcome.clone()) {
                debug!(index, fulfilled = outcome.is_ok(), "race settled");
            }
        });
    }
    winner
}
