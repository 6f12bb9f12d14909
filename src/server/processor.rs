use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use super::service::MessagingService;

const ARCHIVE_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Works through the messages queued for asynchronous processing.
///
/// The loop wakes whenever a message is queued and also polls on an
/// interval, which is what picks up messages whose retry delay has passed.
/// Archive entries past their retention are pruned at most once an hour.
pub struct BackgroundMessageProcessor {
    service: Arc<MessagingService>,
    poll_interval: Duration,
}

impl BackgroundMessageProcessor {
    pub fn new(service: Arc<MessagingService>, poll_interval: Duration) -> Self {
        Self {
            service,
            poll_interval,
        }
    }

    /// Processes queued messages until none are eligible, returning how many
    /// processing attempts were made.
    pub fn drain(service: &MessagingService) -> usize {
        let mut attempts = 0;
        loop {
            match service.process_next_queued_message() {
                Ok(Some((message_id, status))) => {
                    debug!("Processing the message ({message_id}) left it {status:?}");
                    attempts += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to process the queued messages: {e}");
                    break;
                }
            }
        }
        attempts
    }

    fn prune_archive(service: &MessagingService) {
        match service.prune_archive() {
            Ok(0) => {}
            Ok(pruned) => info!("Pruned {pruned} messages from the archive"),
            Err(e) => error!("Failed to prune the archive: {e}"),
        }
    }

    pub async fn run(self) {
        match self.service.reset_message_locks() {
            Ok(0) => {}
            Ok(reset) => info!(
                "Reset the locks for {reset} messages left processing by ({})",
                self.service.lock_name()
            ),
            Err(e) => error!("Failed to reset the message locks: {e}"),
        }

        let mut last_prune: Option<Instant> = None;
        loop {
            let prune = last_prune.is_none_or(|at| at.elapsed() >= ARCHIVE_PRUNE_INTERVAL);
            if prune {
                last_prune = Some(Instant::now());
            }

            let service = self.service.clone();
            let task = tokio::task::spawn_blocking(move || {
                if prune {
                    Self::prune_archive(&service);
                }
                Self::drain(&service)
            });
            if let Err(e) = task.await {
                error!("The background message processor task failed: {e}");
            }

            tokio::select! {
                _ = self.service.queued_for_processing() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
