//! services/bot/src/adapters/feedback_store.rs
//!
//! This module contains the feedback store, the concrete implementation of the
//! `FeedbackRepository` port from the `core` crate. The whole journal and its
//! statistics live in a single JSON document which is rewritten on every mutation.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::SecondsFormat;
use feedback_desk_core::domain::{FeedbackEntry, FeedbackStats, UserCount};
use feedback_desk_core::ports::{FeedbackRepository, PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const EXPORT_HEADER: [&str; 5] = ["timestamp", "user_id", "username", "full_name", "text"];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A JSON-file backed store that implements the `FeedbackRepository` port.
///
/// # Concurrency
///
/// Every public operation holds `lock` for its whole read-modify-write span, so
/// readers and writers are fully serialized and no update can be lost.
pub struct FeedbackStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FeedbackStore {
    /// Opens the store, creating an empty document if the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> PortResult<Self> {
        let store = Self {
            path: path.into(),
            lock: Mutex::new(()),
        };

        let exists = tokio::fs::try_exists(&store.path)
            .await
            .map_err(|e| store.storage_error("inspect", e))?;
        if !exists {
            info!("Creating feedback storage file at {}", store.path.display());
            store.write_document(&DocumentRecord::default()).await?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document. Callers must hold `lock`.
    ///
    /// A missing file reads as empty. Unparseable content is logged, replaced by an
    /// empty document and never surfaced to the caller.
    async fn read_document(&self) -> PortResult<DocumentRecord> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Feedback storage file {} vanished, starting empty", self.path.display());
                return Ok(DocumentRecord::default());
            }
            Err(e) => return Err(self.storage_error("read", e)),
        };

        match serde_json::from_slice::<DocumentRecord>(&raw) {
            Ok(mut document) => {
                if !document.is_consistent() {
                    warn!(
                        "Feedback statistics in {} disagree with the journal, rebuilding them",
                        self.path.display()
                    );
                    document.rebuild_stats();
                }
                Ok(document)
            }
            Err(e) => {
                error!(
                    "Failed to parse feedback storage {}: {}. Resetting to an empty document.",
                    self.path.display(),
                    e
                );
                let document = DocumentRecord::default();
                if let Err(write_err) = self.write_document(&document).await {
                    error!("Failed to rewrite corrupt feedback storage: {}", write_err);
                }
                Ok(document)
            }
        }
    }

    /// Persists the document. Callers must hold `lock`.
    ///
    /// The JSON goes to a sibling temp file first and is renamed over the real one,
    /// so readers only ever see a complete document.
    async fn write_document(&self, document: &DocumentRecord) -> PortResult<()> {
        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| PortError::Unexpected(format!("failed to serialize feedback: {}", e)))?;

        let tmp_path = temp_path_for(&self.path);
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| self.storage_error("create temp file for", e))?;
        file.write_all(&json)
            .await
            .map_err(|e| self.storage_error("write", e))?;
        file.sync_all()
            .await
            .map_err(|e| self.storage_error("flush", e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.storage_error("replace", e))?;
        Ok(())
    }

    fn storage_error(&self, action: &str, e: std::io::Error) -> PortError {
        error!("Failed to {} feedback storage {}: {}", action, self.path.display(), e);
        PortError::Storage(format!("failed to {} {}: {}", action, self.path.display(), e))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "feedback.json".into());
    file_name.push(".tmp");
    path.with_file_name(file_name)
}

//=========================================================================================
// "Impure" Document Record Structs
//=========================================================================================

#[derive(Serialize, Deserialize, Default)]
struct DocumentRecord {
    feedback: Vec<FeedbackRecord>,
    stats: StatsRecord,
}

impl DocumentRecord {
    fn is_consistent(&self) -> bool {
        // A sum that overflows cannot match the journal either.
        let per_user = self
            .stats
            .user_message_counts
            .values()
            .try_fold(0u64, |sum, &count| sum.checked_add(count));
        per_user == Some(self.stats.total_messages)
            && self.stats.total_messages == self.feedback.len() as u64
    }

    fn rebuild_stats(&mut self) {
        let mut counts = BTreeMap::new();
        for record in &self.feedback {
            *counts.entry(record.user_id).or_insert(0) += 1;
        }
        self.stats = StatsRecord {
            total_messages: self.feedback.len() as u64,
            user_message_counts: counts,
        };
    }

    fn push(&mut self, entry: FeedbackEntry) {
        *self
            .stats
            .user_message_counts
            .entry(entry.user_id)
            .or_insert(0) += 1;
        self.stats.total_messages += 1;
        self.feedback.push(FeedbackRecord::from_domain(entry));
    }
}

#[derive(Serialize, Deserialize, Default)]
struct StatsRecord {
    total_messages: u64,
    /// Keyed by user id; serde_json writes integer map keys as strings.
    user_message_counts: BTreeMap<i64, u64>,
}

#[derive(Serialize, Deserialize)]
struct FeedbackRecord {
    user_id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    text: String,
    /// Stored as written. Older journals carry ISO-8601 stamps without an offset.
    timestamp: String,
}

impl FeedbackRecord {
    fn from_domain(entry: FeedbackEntry) -> Self {
        Self {
            user_id: entry.user_id,
            username: entry.username,
            full_name: entry.full_name,
            text: entry.text,
            timestamp: entry.timestamp.to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }

    #[cfg(test)]
    fn to_domain(&self) -> FeedbackEntry {
        FeedbackEntry {
            user_id: self.user_id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            text: self.text.clone(),
            timestamp: chrono::DateTime::parse_from_rfc3339(&self.timestamp)
                .unwrap()
                .with_timezone(&chrono::Utc),
        }
    }
}

//=========================================================================================
// `FeedbackRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl FeedbackRepository for FeedbackStore {
    async fn add_feedback(&self, entry: FeedbackEntry) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        let user_id = entry.user_id;
        document.push(entry);
        self.write_document(&document).await?;
        info!(
            "Stored feedback from user {} (total {})",
            user_id, document.stats.total_messages
        );
        Ok(())
    }

    async fn get_stats(&self) -> PortResult<FeedbackStats> {
        let _guard = self.lock.lock().await;
        let document = self.read_document().await?;

        // BTreeMap iteration is ascending by id; the stable sort keeps that for ties.
        let mut top_users: Vec<UserCount> = document
            .stats
            .user_message_counts
            .iter()
            .map(|(&user_id, &count)| UserCount { user_id, count })
            .collect();
        top_users.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(FeedbackStats {
            total_messages: document.stats.total_messages,
            top_users,
        })
    }

    async fn export_csv(&self) -> PortResult<Bytes> {
        let _guard = self.lock.lock().await;
        let document = self.read_document().await?;
        if document.feedback.is_empty() {
            return Err(PortError::Empty("no feedback to export".to_string()));
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        let to_unexpected =
            |e: csv::Error| PortError::Unexpected(format!("failed to build CSV: {}", e));
        writer.write_record(EXPORT_HEADER).map_err(to_unexpected)?;
        for record in &document.feedback {
            let user_id = record.user_id.to_string();
            writer
                .write_record([
                    record.timestamp.as_str(),
                    user_id.as_str(),
                    record.username.as_deref().unwrap_or(""),
                    record.full_name.as_deref().unwrap_or(""),
                    record.text.as_str(),
                ])
                .map_err(to_unexpected)?;
        }

        let buffer = writer
            .into_inner()
            .map_err(|e| PortError::Unexpected(format!("failed to flush CSV: {}", e)))?;
        Ok(Bytes::from(buffer))
    }

    async fn clear(&self) -> PortResult<()> {
        let _guard = self.lock.lock().await;
        self.write_document(&DocumentRecord::default()).await?;
        info!("Feedback storage cleared");
        Ok(())
    }
}
