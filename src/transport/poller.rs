use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::utils::Result;

/// Limits on a download loop beyond the empty page that always ends it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollPolicy {
    pub deadline: Option<Duration>,
    pub max_pages: Option<usize>,
}

impl PollPolicy {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

/// Fetches pages of downloads until an empty page, the deadline, or the
/// page limit ends the loop.
pub struct DownloadPoller<F, T> {
    fetch: F,
    policy: PollPolicy,
    started: Instant,
    pages: usize,
    finished: bool,
    _page: PhantomData<fn() -> T>,
}

impl<F, Fut, T> DownloadPoller<F, T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    pub fn new(fetch: F, policy: PollPolicy) -> Self {
        Self {
            fetch,
            policy,
            started: Instant::now(),
            pages: 0,
            finished: false,
            _page: PhantomData,
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// The next non-empty page, or `None` once the loop is over.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        if self.finished {
            return Ok(None);
        }

        if self
            .policy
            .deadline
            .is_some_and(|deadline| self.started.elapsed() >= deadline)
        {
            debug!("Stopping the download after {} pages: deadline reached", self.pages);
            self.finished = true;
            return Ok(None);
        }

        if self.policy.max_pages.is_some_and(|max| self.pages >= max) {
            self.finished = true;
            return Ok(None);
        }

        let page = (self.fetch)().await?;
        if page.is_empty() {
            self.finished = true;
            return Ok(None);
        }

        self.pages += 1;
        Ok(Some(page))
    }
}
