use tracing::trace;

use crate::{Deferred, Promise, Resolver};

/// Completion callback handed to a callback-style function by [`promisify`].
///
/// The callback is consumed when it fires, so it can complete its result at
/// most once. Dropping it without firing leaves the result pending forever.
#[derive(Debug)]
pub struct Callback<T, E> {
    resolver: Resolver<T, E>,
}

impl<T, E> Callback<T, E> {
    /// Completes in `(error, result)` form: a present `error` rejects and
    /// `result` is discarded, otherwise the result fulfills with `result`.
    pub fn call(self, error: Option<E>, result: T) {
        match error {
            Some(error) => self.err(error),
            None => self.ok(result),
        }
    }

    pub fn ok(self, result: T) {
        self.resolver.resolve(result);
    }

    pub fn err(self, error: E) {
        self.resolver.reject(error);
    }

    pub fn complete(self, outcome: Result<T, E>) {
        self.resolver.settle(outcome);
    }
}

/// Adapts a function that reports completion through a trailing
/// [`Callback`] into one that returns a [`Deferred`].
///
/// The leading arguments are passed through as a single value; use a tuple
/// for several and `()` for none. The wrapped function is invoked
/// synchronously, once per call. A panic raised by it is not converted into a
/// rejection and unwinds to the caller.
///
/// # Examples
///
/// ```
/// use promise_combinators::{promisify, Callback};
/// use futures::executor::block_on;
///
/// fn divide((a, b): (i32, i32), done: Callback<i32, String>) {
///     if b == 0 {
///         done.call(Some("division by zero".into()), 0);
///     } else {
///         done.call(None, a / b);
///     }
/// }
///
/// let divide = promisify(divide);
/// assert_eq!(*block_on(divide((84, 2))), Ok(42));
/// assert_eq!(*block_on(divide((1, 0))), Err("division by zero".into()));
/// ```
pub fn promisify<A, T, E, F>(node_style_fn: F) -> impl Fn(A) -> Deferred<T, E>
where
    F: Fn(A, Callback<T, E>),
{
    move |args| {
        let (resolver, deferred) = Resolver::new();
        trace!(
            function = std::any::type_name::<F>(),
            "invoking callback-style function"
        );
        node_style_fn(args, Callback { resolver });
        deferred
    }
}
