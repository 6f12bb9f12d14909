//! The `persistence` module stores the server's queue state.
//!
//! Inbound messages waiting for processing, responses and parts waiting for
//! download, the archive of processed message ids, and submitted error
//! reports all live here. `SledStore` keeps them in an embedded `sled`
//! database; the dispatch queue only sees the `MessageRepository` trait.

pub mod sled_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{ErrorReport, Message, MessagePart, MessageStatus};
use crate::utils::Result;

pub use sled_store::SledStore;

/// A processed message, kept so a re-submission can be recognised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedMessage {
    pub id: Uuid,
    pub message_type: String,
    pub type_version: u32,
    pub user: String,
    pub device: String,
    pub archived: DateTime<Utc>,
    /// The full request, kept only for message types whose handler marks
    /// them archivable.
    pub request: Option<Message>,
    /// The response of a synchronously processed message, replayed when the
    /// same message is submitted again.
    pub response: Option<Message>,
}

pub trait MessageRepository: Send + Sync {
    /// Stores `message` unless a message with the same id is already
    /// stored. Returns whether it was stored.
    fn create_message(&self, message: &Message) -> Result<bool>;

    fn get_message(&self, id: &Uuid) -> Result<Option<Message>>;

    /// Returns whether a message was removed.
    fn delete_message(&self, id: &Uuid) -> Result<bool>;

    /// Removes the message only while it is waiting for download by
    /// `device` or was downloaded but not yet acknowledged. Returns whether
    /// it was removed.
    fn delete_downloaded_message(&self, id: &Uuid, device: &str) -> Result<bool>;

    /// Atomically claims the oldest `QueuedForProcessing` message that was
    /// last attempted at or before `retry_before`, moving it to `Processing` under
    /// `lock_name`.
    fn claim_next_message_for_processing(
        &self,
        retry_before: DateTime<Utc>,
        lock_name: &str,
    ) -> Result<Option<Message>>;

    /// Records a failed processing attempt. The message becomes `Failed`
    /// once `process_attempts` reaches `maximum_attempts`, and returns to
    /// `QueuedForProcessing` otherwise.
    fn record_failed_processing_attempt(
        &self,
        id: &Uuid,
        maximum_attempts: u32,
    ) -> Result<Option<Message>>;

    /// Moves messages left in `status` under `lock_name` to `new_status`.
    fn reset_message_locks(
        &self,
        lock_name: &str,
        status: MessageStatus,
        new_status: MessageStatus,
    ) -> Result<usize>;

    /// Up to `limit` messages for `device` and `user` that are waiting for
    /// download or were downloaded without being acknowledged, oldest
    /// first. Each is marked `Downloading` and its download attempts are
    /// incremented.
    fn messages_for_download(&self, device: &str, user: &str, limit: usize)
    -> Result<Vec<Message>>;

    fn create_message_part(&self, part: &MessagePart) -> Result<()>;

    fn message_part_exists(&self, id: &Uuid) -> Result<bool>;

    /// Every stored part of `message_id`, in part order.
    fn message_parts_for_message(&self, message_id: &Uuid) -> Result<Vec<MessagePart>>;

    /// The part download counterpart of `messages_for_download`.
    fn message_parts_for_download(&self, device: &str, limit: usize) -> Result<Vec<MessagePart>>;

    fn delete_message_part(&self, id: &Uuid) -> Result<bool>;

    /// The part counterpart of `delete_downloaded_message`.
    fn delete_downloaded_message_part(&self, id: &Uuid, device: &str) -> Result<bool>;

    fn delete_message_parts_for_message(&self, message_id: &Uuid) -> Result<usize>;

    /// Takes the exclusive right to assemble `message_id`. Only one caller
    /// ever gets `true` until `release_assembly` is called.
    fn try_lock_assembly(&self, message_id: &Uuid, lock_name: &str) -> Result<bool>;

    fn release_assembly(&self, message_id: &Uuid) -> Result<()>;

    /// Releases every assembly lock held under `lock_name`, returning the
    /// ids of the messages they guarded.
    fn reset_assembly_locks(&self, lock_name: &str) -> Result<Vec<Uuid>>;

    /// Records `message` as processed. The request itself is only kept when
    /// `keep_request` is set.
    fn archive_message(
        &self,
        message: &Message,
        response: Option<&Message>,
        keep_request: bool,
    ) -> Result<()>;

    fn get_archived_message(&self, id: &Uuid) -> Result<Option<ArchivedMessage>>;

    fn is_message_archived(&self, id: &Uuid) -> Result<bool> {
        Ok(self.get_archived_message(id)?.is_some())
    }

    /// Removes archive entries recorded before `archived_before`.
    fn prune_archive(&self, archived_before: DateTime<Utc>) -> Result<usize>;

    fn create_error_report(&self, report: &ErrorReport) -> Result<()>;

    fn get_error_report(&self, id: &Uuid) -> Result<Option<ErrorReport>>;
}
