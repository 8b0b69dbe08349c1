//! In-memory object store for tests.
//!
//! Mirrors S3 listing semantics closely enough to exercise pagination: keys are
//! returned in lexicographic order, `page_size` at a time, with the last key of a
//! page acting as the continuation token.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use clipvault_core::SourceObject;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::traits::{ListPage, ObjectHead, ObjectStore, StorageError, StorageResult};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
    pub cache_control: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

pub struct InMemoryObjectStore {
    bucket: String,
    page_size: usize,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    put_count: AtomicUsize,
    list_calls: AtomicUsize,
    /// Simulates a transfer that reports one size and delivers fewer bytes.
    truncate_downloads_by: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            page_size: DEFAULT_PAGE_SIZE,
            objects: Mutex::new(BTreeMap::new()),
            put_count: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            truncate_downloads_by: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Seed an object as if a client had uploaded it.
    pub fn insert(
        &self,
        key: impl Into<String>,
        data: impl Into<Bytes>,
        last_modified: Option<DateTime<Utc>>,
    ) {
        self.lock().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                content_type: "video/mp4".to_string(),
                cache_control: None,
                last_modified,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Number of successful `put` calls since creation.
    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    /// Number of `list_page` calls since creation.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn truncate_downloads_by(&self, bytes: usize) {
        self.truncate_downloads_by.store(bytes, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        // A panicking test thread must not hide the store from the others.
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> StorageResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.lock();
        let prefix = prefix.unwrap_or("");

        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation_token.map_or(true, |token| key.as_str() > token));

        let page: Vec<SourceObject> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, object)| SourceObject {
                key: key.clone(),
                last_modified: object.last_modified,
                size: Some(object.data.len() as u64),
            })
            .collect();

        let next_token = if matching.next().is_some() {
            page.last().map(|object| object.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            next_token,
        })
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        let objects = self.lock();
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectHead {
            size: Some(object.data.len() as u64),
            last_modified: object.last_modified,
            content_type: Some(object.content_type.clone()),
        })
    }

    async fn download_to_path(&self, key: &str, destination: &Path) -> StorageResult<u64> {
        let data = self
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?
            .data;
        let cut = self.truncate_downloads_by.load(Ordering::SeqCst).min(data.len());
        let data = data.slice(..data.len() - cut);
        tokio::fs::write(destination, &data).await?;
        Ok(data.len() as u64)
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        self.lock().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                cache_control: cache_control.map(String::from),
                last_modified: Some(Utc::now()),
            },
        );
        self.put_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "memory://{}/{}?X-Amz-Expires={}&content-type={}",
            self.bucket,
            key,
            expires_in.as_secs(),
            urlencoding::encode(content_type)
        ))
    }

    async fn probe(&self) -> StorageResult<()> {
        Ok(())
    }
}
