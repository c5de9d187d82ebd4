use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::trace;

use crate::{Error, Promise};

type Handler<T, E> = Box<dyn FnOnce(&Result<T, E>) + Send>;

/// A snapshot of a deferred result's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

/// The settling half of a [`Deferred`]. Clones settle the same result, and
/// only the first settlement among them takes effect.
///
/// # Examples
///
/// ```
/// use promise_combinators::{Promise, Resolver};
/// use futures::executor::block_on;
/// use std::thread;
/// let (resolver, deferred) = Resolver::<String, String>::new();
/// let late = resolver.clone();
///
/// let task1 = thread::spawn(move || block_on(async {
///     println!("Received {:?}", deferred.await);
/// }));
/// assert!(resolver.resolve("Hi".into()));
/// assert!(!late.reject("too late".into()));
/// task1.join().expect("The task1 thread has panicked.");
/// ```
pub struct Resolver<T, E> {
    promise: Arc<Mutex<Inner<T, E>>>,
}

/// A single-assignment result that is pending until its [`Resolver`] settles
/// it. Any number of clones may subscribe to or await the same outcome.
pub struct Deferred<T, E> {
    promise: Arc<Mutex<Inner<T, E>>>,
}

struct Inner<T, E> {
    outcome: Option<Arc<Result<T, E>>>,
    handlers: VecDeque<Handler<T, E>>,
    // Set while the settling call drains `handlers`; late subscribers queue
    // behind the ones already waiting instead of jumping ahead.
    dispatching: bool,
    wakers: Vec<Waker>,
}

impl<T, E> Inner<T, E> {
    fn label(&self) -> &'static str {
        match self.outcome.as_deref() {
            None => "pending",
            Some(Ok(_)) => "fulfilled",
            Some(Err(_)) => "rejected",
        }
    }
}

fn lock<T, E>(promise: &Mutex<Inner<T, E>>) -> MutexGuard<'_, Inner<T, E>> {
    promise.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs queued handlers until the queue is empty. A panicking handler does
/// not stop the rest; the first panic resumes once the queue is drained and
/// `dispatching` is cleared.
fn dispatch<T, E>(promise: &Mutex<Inner<T, E>>, outcome: &Result<T, E>) {
    let mut first_panic = None;
    loop {
        let handler = {
            let mut promise = lock(promise);
            match promise.handlers.pop_front() {
                Some(handler) => handler,
                None => {
                    promise.dispatching = false;
                    break;
                }
            }
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || handler(outcome))) {
            trace!("settlement handler panicked");
            first_panic.get_or_insert(payload);
        }
    }
    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }
}

impl<T, E> Promise for Resolver<T, E> {
    type Output = T;
    type Error = E;
    type Waiter = Deferred<T, E>;

    fn new() -> (Self, Self::Waiter) {
        let promise = Arc::new(Mutex::new(Inner {
            outcome: None,
            handlers: VecDeque::new(),
            dispatching: false,
            wakers: Vec::new(),
        }));
        let deferred = Deferred {
            promise: Arc::clone(&promise),
        };
        (Self { promise }, deferred)
    }

    fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    fn reject(&self, err: E) -> bool {
        self.settle(Err(err))
    }
}

impl<T, E> Resolver<T, E> {
    /// Settles the result with `outcome`, wakes every awaiting task and runs
    /// every attached handler in attachment order. Returns `false` without
    /// touching anything if the result was already settled.
    ///
    /// If a handler panics, the remaining handlers still run and the panic is
    /// then resumed on the settling thread.
    pub fn settle(&self, outcome: Result<T, E>) -> bool {
        let (outcome, wakers) = {
            let mut promise = lock(&self.promise);
            if promise.outcome.is_some() {
                trace!(state = promise.label(), "settlement ignored");
                return false;
            }
            let outcome = Arc::new(outcome);
            promise.outcome = Some(Arc::clone(&outcome));
            promise.dispatching = true;
            trace!(
                state = promise.label(),
                handlers = promise.handlers.len(),
                "deferred result settled"
            );
            (outcome, std::mem::take(&mut promise.wakers))
        };

        // Locks are released before any user code runs.
        for waker in wakers {
            waker.wake();
        }
        dispatch(&self.promise, &outcome);
        true
    }

    pub fn try_settle(&self, outcome: Result<T, E>) -> Result<(), Error> {
        if self.settle(outcome) {
            Ok(())
        } else {
            Err(Error::AlreadySettled)
        }
    }

    pub fn try_resolve(&self, value: T) -> Result<(), Error> {
        self.try_settle(Ok(value))
    }

    pub fn try_reject(&self, err: E) -> Result<(), Error> {
        self.try_settle(Err(err))
    }

    pub fn is_settled(&self) -> bool {
        lock(&self.promise).outcome.is_some()
    }
}

impl<T, E> Deferred<T, E> {
    /// Runs `executor` synchronously with the resolver of a fresh result and
    /// returns that result. A panic in `executor` is not caught.
    ///
    /// ```
    /// use promise_combinators::{Deferred, Promise};
    /// let deferred = Deferred::<u8, ()>::new(|resolver| {
    ///     resolver.resolve(7);
    /// });
    /// assert_eq!(deferred.outcome().as_deref(), Some(&Ok(7)));
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>),
    {
        let (resolver, deferred) = Resolver::new();
        executor(resolver);
        deferred
    }

    pub fn fulfilled(value: T) -> Self {
        Self::new(|resolver| {
            resolver.resolve(value);
        })
    }

    pub fn rejected(err: E) -> Self {
        Self::new(|resolver| {
            resolver.reject(err);
        })
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.promise).outcome.is_none()
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// The shared outcome, once settled.
    pub fn outcome(&self) -> Option<Arc<Result<T, E>>> {
        lock(&self.promise).outcome.clone()
    }

    pub fn try_outcome(&self) -> Result<Arc<Result<T, E>>, Error> {
        self.outcome().ok_or(Error::Pending)
    }

    pub fn state(&self) -> State<T, E>
    where
        T: Clone,
        E: Clone,
    {
        match self.outcome().as_deref() {
            None => State::Pending,
            Some(Ok(value)) => State::Fulfilled(value.clone()),
            Some(Err(reason)) => State::Rejected(reason.clone()),
        }
    }
}

impl<T, E> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Attaches `handler` to run once the result settles. Handlers run in
    /// attachment order on the settling thread. If the result is already
    /// settled and its handlers have been drained, `handler` runs before
    /// `subscribe` returns; while the settling thread is still draining them,
    /// `handler` is queued and runs there after the handlers ahead of it.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: FnOnce(&Result<T, E>) + Send + 'static,
    {
        let outcome = {
            let mut promise = lock(&self.promise);
            match promise.outcome.clone() {
                Some(outcome) if !promise.dispatching => outcome,
                _ => {
                    promise.handlers.push_back(Box::new(handler));
                    return;
                }
            }
        };
        handler(&outcome);
    }

    /// Attaches a success and a failure continuation; exactly one of them
    /// runs.
    pub fn listen<F, R>(&self, on_fulfilled: F, on_rejected: R)
    where
        F: FnOnce(&T) + Send + 'static,
        R: FnOnce(&E) + Send + 'static,
    {
        self.subscribe(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value),
            Err(reason) => on_rejected(reason),
        });
    }

    /// Maps the fulfilled value. Rejections pass through unchanged.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        T: Clone,
        E: Clone,
        U: Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (resolver, next) = Resolver::new();
        self.subscribe(move |outcome| {
            resolver.settle(match outcome {
                Ok(value) => Ok(on_fulfilled(value.clone())),
                Err(reason) => Err(reason.clone()),
            });
        });
        next
    }

    /// Chains a dependent asynchronous step; the returned result adopts the
    /// outcome of the deferred result produced by `on_fulfilled`.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        T: Clone,
        E: Clone,
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Deferred<U, E> + Send + 'static,
    {
        let (resolver, next) = Resolver::new();
        self.subscribe(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value.clone()).subscribe(move |adopted| {
                resolver.settle(adopted.clone());
            }),
            Err(reason) => {
                resolver.reject(reason.clone());
            }
        });
        next
    }

    pub fn map_err<F, R>(&self, on_rejected: R) -> Deferred<T, F>
    where
        T: Clone,
        E: Clone,
        F: Send + Sync + 'static,
        R: FnOnce(E) -> F + Send + 'static,
    {
        self.catch(move |reason| Err(on_rejected(reason)))
    }

    /// Handles a rejection, either recovering with a value or failing with a
    /// new reason. Fulfillments pass through unchanged.
    pub fn catch<F, R>(&self, on_rejected: R) -> Deferred<T, F>
    where
        T: Clone,
        E: Clone,
        F: Send + Sync + 'static,
        R: FnOnce(E) -> Result<T, F> + Send + 'static,
    {
        let (resolver, next) = Resolver::new();
        self.subscribe(move |outcome| {
            resolver.settle(match outcome {
                Ok(value) => Ok(value.clone()),
                Err(reason) => on_rejected(reason.clone()),
            });
        });
        next
    }
}

impl<T, E> Future for Deferred<T, E> {
    type Output = Arc<Result<T, E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut promise = lock(&self.promise);
        if let Some(outcome) = &promise.outcome {
            return Poll::Ready(Arc::clone(outcome));
        }
        if !promise.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            promise.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: Arc::clone(&self.promise),
        }
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: Arc::clone(&self.promise),
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("state", &lock(&self.promise).label())
            .finish()
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &lock(&self.promise).label())
            .finish()
    }
}
