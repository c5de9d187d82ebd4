#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Initialize test logging (call once per test).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("promise_combinators=trace".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

type Task = Box<dyn FnOnce() + Send>;

/// A hand-cranked stand-in for the host task queue. Completions are parked
/// under a name and run when the test decides, so completion order is exact.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Arc<Mutex<VecDeque<(String, Task)>>>,
}

impl TaskQueue {
    pub fn defer(&self, name: impl Into<String>, task: impl FnOnce() + Send + 'static) {
        self.tasks
            .lock()
            .unwrap()
            .push_back((name.into(), Box::new(task)));
    }

    /// Runs the first parked task called `name`.
    pub fn run(&self, name: &str) {
        let task = {
            let mut tasks = self.tasks.lock().unwrap();
            let position = tasks
                .iter()
                .position(|(queued, _)| queued == name)
                .unwrap_or_else(|| panic!("no task named {name}"));
            tasks.remove(position).map(|(_, task)| task)
        };
        if let Some(task) = task {
            task();
        }
    }

    /// Runs tasks in FIFO order, including ones queued while draining.
    pub fn run_all(&self) {
        loop {
            let next = self.tasks.lock().unwrap().pop_front();
            match next {
                Some((_, task)) => task(),
                None => return,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}
