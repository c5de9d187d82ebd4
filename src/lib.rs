//! Single-assignment deferred results and the combinators built on them.
//!
//! A [`Deferred`] is the consumer side of an asynchronous outcome; the
//! matching [`Resolver`] settles it exactly once. Callback-style functions are
//! adapted with [`promisify`], and collections of deferred results are
//! combined with [`all`] (every input must fulfill) or [`race`] (first to
//! settle wins).
//!
//! ```
//! use promise_combinators::{all, race, Promise, Resolver};
//! use futures::executor::block_on;
//!
//! let (first, a) = Resolver::<i32, String>::new();
//! let (second, b) = Resolver::<i32, String>::new();
//! let both = all(vec![a.clone(), b.clone()]);
//! let winner = race(vec![a, b]);
//!
//! second.resolve(2);
//! first.resolve(1);
//!
//! assert_eq!(*block_on(both), Ok(vec![1, 2]));
//! assert_eq!(*block_on(winner), Ok(2));
//! ```

mod all;
mod deferred;
mod error;
mod promisify;
mod race;

pub use all::all;
pub use deferred::{Deferred, Resolver, State};
pub use error::Error;
pub use promisify::{promisify, Callback};
pub use race::race;

/// The producing half of a deferred result.
pub trait Promise {
    type Output;
    type Error;
    type Waiter;

    /// Creates an unsettled producer together with the handle to wait on.
    fn new() -> (Self, Self::Waiter)
    where
        Self: Sized;

    /// Fulfills the promise. Returns `false` if it was already settled.
    fn resolve(&self, value: Self::Output) -> bool;

    /// Rejects the promise. Returns `false` if it was already settled.
    fn reject(&self, err: Self::Error) -> bool;
}
