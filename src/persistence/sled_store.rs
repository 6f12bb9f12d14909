use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::{Db, Tree};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ArchivedMessage, MessageRepository};
use crate::message::{ErrorReport, Message, MessagePart, MessagePartStatus, MessageStatus};
use crate::utils::Result;

const MESSAGES: &str = "messages";
const MESSAGE_PARTS: &str = "message_parts";
const ARCHIVE: &str = "archive";
const ASSEMBLY_LOCKS: &str = "assembly_locks";
const ERROR_REPORTS: &str = "error_reports";

/// `MessageRepository` on an embedded sled database.
///
/// Values are JSON. Every status or counter change on a stored message or
/// part is a single-key `update_and_fetch` or `compare_and_swap`, so two
/// writers never interleave on the same record.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    messages: Tree,
    message_parts: Tree,
    archive: Tree,
    assembly_locks: Tree,
    error_reports: Tree,
}

impl SledStore {
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            messages: db.open_tree(MESSAGES)?,
            message_parts: db.open_tree(MESSAGE_PARTS)?,
            archive: db.open_tree(ARCHIVE)?,
            assembly_locks: db.open_tree(ASSEMBLY_LOCKS)?,
            error_reports: db.open_tree(ERROR_REPORTS)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn put<T: Serialize>(tree: &Tree, id: &Uuid, value: &T) -> Result<()> {
        tree.insert(id.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(tree: &Tree, id: &Uuid) -> Result<Option<T>> {
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every decodable value in `tree`. Undecodable records are logged and
    /// skipped.
    fn scan<T: DeserializeOwned>(tree: &Tree) -> Vec<(sled::IVec, T)> {
        tree.iter()
            .filter_map(|res| res.ok())
            .filter_map(|(key, val)| match serde_json::from_slice(&val) {
                Ok(value) => Some((key, value)),
                Err(e) => {
                    warn!("Skipping an undecodable record in the store: {e}");
                    None
                }
            })
            .collect()
    }

    /// Applies `f` to the record under `key` in one atomic step.
    fn update<T, F>(tree: &Tree, key: &[u8], mut f: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T),
    {
        let updated = tree.update_and_fetch(key, |old| {
            let old = old?;
            match serde_json::from_slice::<T>(old) {
                Ok(mut value) => {
                    f(&mut value);
                    Some(serde_json::to_vec(&value).unwrap_or_else(|_| old.to_vec()))
                }
                Err(_) => Some(old.to_vec()),
            }
        })?;

        match updated {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Removes the record under `key` only while `matches` accepts it.
    fn remove_if<T, P>(tree: &Tree, key: &[u8], matches: P) -> Result<bool>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        loop {
            let Some(current) = tree.get(key)? else {
                return Ok(false);
            };
            let value: T = serde_json::from_slice(&current)?;
            if !matches(&value) {
                return Ok(false);
            }

            // Retries if the record changed since it was read.
            let swapped = tree.compare_and_swap(key, Some(current), None as Option<&[u8]>)?;
            if swapped.is_ok() {
                return Ok(true);
            }
        }
    }

    fn is_awaiting_download(status: MessageStatus) -> bool {
        matches!(
            status,
            MessageStatus::QueuedForDownload | MessageStatus::Downloading
        )
    }

    fn is_part_awaiting_download(status: MessagePartStatus) -> bool {
        matches!(
            status,
            MessagePartStatus::QueuedForDownload | MessagePartStatus::Downloading
        )
    }
}

impl MessageRepository for SledStore {
    fn create_message(&self, message: &Message) -> Result<bool> {
        let swapped = self.messages.compare_and_swap(
            message.id.as_bytes(),
            None as Option<&[u8]>,
            Some(serde_json::to_vec(message)?),
        )?;
        Ok(swapped.is_ok())
    }

    fn get_message(&self, id: &Uuid) -> Result<Option<Message>> {
        Self::get(&self.messages, id)
    }

    fn delete_message(&self, id: &Uuid) -> Result<bool> {
        Ok(self.messages.remove(id.as_bytes())?.is_some())
    }

    fn delete_downloaded_message(&self, id: &Uuid, device: &str) -> Result<bool> {
        Self::remove_if::<Message, _>(&self.messages, id.as_bytes(), |m| {
            Self::is_awaiting_download(m.status) && m.device.eq_ignore_ascii_case(device)
        })
    }

    fn claim_next_message_for_processing(
        &self,
        retry_before: DateTime<Utc>,
        lock_name: &str,
    ) -> Result<Option<Message>> {
        let mut candidates: Vec<(sled::IVec, Message)> = Self::scan::<Message>(&self.messages)
            .into_iter()
            .filter(|(_, m)| m.status == MessageStatus::QueuedForProcessing)
            .filter(|(_, m)| m.last_processed.is_none_or(|at| at <= retry_before))
            .collect();
        candidates.sort_by_key(|(_, m)| m.created);

        for (key, _) in candidates {
            let Some(current) = self.messages.get(&key)? else {
                continue;
            };
            let mut claimed: Message = serde_json::from_slice(&current)?;
            if claimed.status != MessageStatus::QueuedForProcessing {
                continue;
            }

            claimed.status = MessageStatus::Processing;
            claimed.lock_name = Some(lock_name.to_string());
            claimed.updated = Some(Utc::now());

            // Fails if another worker changed the record since it was read.
            let swapped = self.messages.compare_and_swap(
                &key,
                Some(current),
                Some(serde_json::to_vec(&claimed)?),
            )?;

            if swapped.is_ok() {
                debug!("Claimed the message ({}) for processing", claimed.id);
                return Ok(Some(claimed));
            }
        }

        Ok(None)
    }

    fn record_failed_processing_attempt(
        &self,
        id: &Uuid,
        maximum_attempts: u32,
    ) -> Result<Option<Message>> {
        Self::update::<Message, _>(&self.messages, id.as_bytes(), |message| {
            let now = Utc::now();
            message.process_attempts += 1;
            message.last_processed = Some(now);
            message.updated = Some(now);
            message.lock_name = None;
            message.status = if message.process_attempts >= maximum_attempts {
                MessageStatus::Failed
            } else {
                MessageStatus::QueuedForProcessing
            };
        })
    }

    fn reset_message_locks(
        &self,
        lock_name: &str,
        status: MessageStatus,
        new_status: MessageStatus,
    ) -> Result<usize> {
        let mut reset = 0;
        for (key, message) in Self::scan::<Message>(&self.messages) {
            if message.status != status || message.lock_name.as_deref() != Some(lock_name) {
                continue;
            }
            let updated = Self::update::<Message, _>(&self.messages, &key, |m| {
                if m.status == status && m.lock_name.as_deref() == Some(lock_name) {
                    m.status = new_status;
                    m.lock_name = None;
                    m.updated = Some(Utc::now());
                }
            })?;
            if updated.is_some_and(|m| m.status == new_status) {
                reset += 1;
            }
        }
        Ok(reset)
    }

    fn messages_for_download(
        &self,
        device: &str,
        user: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let mut waiting: Vec<(sled::IVec, Message)> = Self::scan::<Message>(&self.messages)
            .into_iter()
            .filter(|(_, m)| {
                Self::is_awaiting_download(m.status)
                    && m.device.eq_ignore_ascii_case(device)
                    && m.user.eq_ignore_ascii_case(user)
            })
            .collect();
        waiting.sort_by_key(|(_, m)| m.created);

        let mut messages = Vec::new();
        for (key, _) in waiting.into_iter().take(limit) {
            let updated = Self::update::<Message, _>(&self.messages, &key, |m| {
                if Self::is_awaiting_download(m.status) {
                    m.status = MessageStatus::Downloading;
                    m.download_attempts += 1;
                    m.updated = Some(Utc::now());
                }
            })?;
            if let Some(message) = updated.filter(|m| m.status == MessageStatus::Downloading) {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    fn create_message_part(&self, part: &MessagePart) -> Result<()> {
        Self::put(&self.message_parts, &part.id, part)
    }

    fn message_part_exists(&self, id: &Uuid) -> Result<bool> {
        Ok(self.message_parts.contains_key(id.as_bytes())?)
    }

    fn message_parts_for_message(&self, message_id: &Uuid) -> Result<Vec<MessagePart>> {
        let mut parts: Vec<MessagePart> = Self::scan::<MessagePart>(&self.message_parts)
            .into_iter()
            .map(|(_, p)| p)
            .filter(|p| p.message_id == *message_id)
            .collect();
        parts.sort_by_key(|p| p.part_no);
        Ok(parts)
    }

    fn message_parts_for_download(&self, device: &str, limit: usize) -> Result<Vec<MessagePart>> {
        let mut waiting: Vec<(sled::IVec, MessagePart)> =
            Self::scan::<MessagePart>(&self.message_parts)
                .into_iter()
                .filter(|(_, p)| {
                    Self::is_part_awaiting_download(p.status)
                        && p.message_device.eq_ignore_ascii_case(device)
                })
                .collect();
        waiting.sort_by_key(|(_, p)| (p.message_created, p.message_id, p.part_no));

        let mut parts = Vec::new();
        for (key, _) in waiting.into_iter().take(limit) {
            let updated = Self::update::<MessagePart, _>(&self.message_parts, &key, |p| {
                if Self::is_part_awaiting_download(p.status) {
                    p.status = MessagePartStatus::Downloading;
                    p.download_attempts += 1;
                    p.updated = Some(Utc::now());
                }
            })?;
            if let Some(part) = updated.filter(|p| p.status == MessagePartStatus::Downloading) {
                parts.push(part);
            }
        }
        Ok(parts)
    }

    fn delete_message_part(&self, id: &Uuid) -> Result<bool> {
        Ok(self.message_parts.remove(id.as_bytes())?.is_some())
    }

    fn delete_downloaded_message_part(&self, id: &Uuid, device: &str) -> Result<bool> {
        Self::remove_if::<MessagePart, _>(&self.message_parts, id.as_bytes(), |p| {
            Self::is_part_awaiting_download(p.status)
                && p.message_device.eq_ignore_ascii_case(device)
        })
    }

    fn delete_message_parts_for_message(&self, message_id: &Uuid) -> Result<usize> {
        let mut deleted = 0;
        for (key, part) in Self::scan::<MessagePart>(&self.message_parts) {
            if part.message_id == *message_id && self.message_parts.remove(&key)?.is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn try_lock_assembly(&self, message_id: &Uuid, lock_name: &str) -> Result<bool> {
        let swapped = self.assembly_locks.compare_and_swap(
            message_id.as_bytes(),
            None as Option<&[u8]>,
            Some(lock_name.as_bytes()),
        )?;
        Ok(swapped.is_ok())
    }

    fn release_assembly(&self, message_id: &Uuid) -> Result<()> {
        self.assembly_locks.remove(message_id.as_bytes())?;
        Ok(())
    }

    fn reset_assembly_locks(&self, lock_name: &str) -> Result<Vec<Uuid>> {
        let mut released = Vec::new();
        for entry in self.assembly_locks.iter() {
            let (key, holder) = entry?;
            if &holder[..] != lock_name.as_bytes() {
                continue;
            }
            let swapped =
                self.assembly_locks
                    .compare_and_swap(&key, Some(holder), None as Option<&[u8]>)?;
            if swapped.is_ok() {
                match Uuid::from_slice(&key) {
                    Ok(message_id) => released.push(message_id),
                    Err(e) => warn!("Released an assembly lock with an invalid key: {e}"),
                }
            }
        }
        Ok(released)
    }

    fn archive_message(
        &self,
        message: &Message,
        response: Option<&Message>,
        keep_request: bool,
    ) -> Result<()> {
        let archived = ArchivedMessage {
            id: message.id,
            message_type: message.message_type.clone(),
            type_version: message.type_version,
            user: message.user.clone(),
            device: message.device.clone(),
            archived: Utc::now(),
            request: keep_request.then(|| message.clone()),
            response: response.cloned(),
        };
        Self::put(&self.archive, &message.id, &archived)
    }

    fn get_archived_message(&self, id: &Uuid) -> Result<Option<ArchivedMessage>> {
        Self::get(&self.archive, id)
    }

    fn prune_archive(&self, archived_before: DateTime<Utc>) -> Result<usize> {
        let mut pruned = 0;
        for (key, archived) in Self::scan::<ArchivedMessage>(&self.archive) {
            if archived.archived < archived_before && self.archive.remove(&key)?.is_some() {
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!("Pruned {pruned} archived messages");
        }
        Ok(pruned)
    }

    fn create_error_report(&self, report: &ErrorReport) -> Result<()> {
        Self::put(&self.error_reports, &report.id, report)
    }

    fn get_error_report(&self, id: &Uuid) -> Result<Option<ErrorReport>> {
        Self::get(&self.error_reports, id)
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
