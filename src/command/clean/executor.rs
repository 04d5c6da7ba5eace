use futures_util::future::try_join_all;
use std::future::Future;
use tokio::sync::Semaphore;

use crate::command::clean::Error;

/// Runs a batch of tasks with at most `max_in_flight` of them running at once.
///
/// The first failure is returned and the tasks still pending are dropped.
pub struct BoundedExecutor {
    semaphore: Semaphore,
}

impl BoundedExecutor {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            semaphore: Semaphore::new(max_in_flight.max(1)),
        }
    }

    pub async fn run_all<I, F, Fut, T>(&self, items: I, task: F) -> Result<Vec<T>, Error>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let task = &task;
        let tasks = items.into_iter().map(|item| async move {
            let _permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|e| Error::Execution(format!("Executor closed: {e}")))?;
            task(item).await
        });

        try_join_all(tasks).await
    }
}
