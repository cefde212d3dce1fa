//! Decorator that only serves action results whose outputs still exist
//!
//! Action results reference files and trees stored in the Content
//! Addressable Storage. When those have been evicted, a client that trusts
//! the cached result would fail to download its outputs. This decorator
//! checks for the existence of every referenced object and reports the
//! action result as absent if anything is missing, so the action gets
//! executed again.

use crate::blobstore::blob_access::{BlobAccess, DigestSet};
use crate::digest::{Digest, DigestRef};
use crate::error::{ActionCacheError, ActionCacheResult, ResultExt};
use crate::messages::{self, ActionResult, Tree};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Number of digests to pass to a single `find_missing` call
pub const RECOMMENDED_FIND_MISSING_DIGESTS_COUNT: usize = 10_000;

pub struct CompletenessCheckingBlobAccess {
    action_cache: Arc<dyn BlobAccess>,
    content_addressable_storage: Arc<dyn BlobAccess>,
    batch_size: usize,
    maximum_message_size_bytes: usize,
}

impl CompletenessCheckingBlobAccess {
    pub fn new(
        action_cache: Arc<dyn BlobAccess>,
        content_addressable_storage: Arc<dyn BlobAccess>,
        batch_size: usize,
        maximum_message_size_bytes: usize,
    ) -> Self {
        Self {
            action_cache,
            content_addressable_storage,
            batch_size: batch_size.max(1),
            maximum_message_size_bytes,
        }
    }

    async fn check_completeness(
        &self,
        action_digest: &Digest,
        action_result: &ActionResult,
    ) -> ActionCacheResult<()> {
        let cas = self.content_addressable_storage.as_ref();
        let mut queue = FindMissingQueue::new(cas, self.batch_size);

        for file in &action_result.output_files {
            queue.add(action_digest.derive(&file.digest)?).await?;
        }

        for directory in &action_result.output_directories {
            let tree_digest = action_digest.derive(&directory.tree_digest)?;
            let tree_data = match cas.get(&tree_digest).await {
                Ok(data) => data,
                Err(e) if e.is_not_found() => return Err(missing_object(&tree_digest)),
                Err(e) => {
                    return Err(e.context(format!(
                        "Failed to fetch output directory {:?}",
                        directory.path
                    )))
                }
            };
            let tree: Tree = messages::decode(&tree_data, self.maximum_message_size_bytes)
                .context(format!("Failed to decode output directory {:?}", directory.path))?;
            for file in tree.directories().flat_map(|d| d.files.iter()) {
                queue.add(action_digest.derive(&file.digest)?).await?;
            }
        }

        let logs: [&Option<DigestRef>; 2] = [&action_result.stdout_digest, &action_result.stderr_digest];
        for log in logs.into_iter().flatten() {
            queue.add(action_digest.derive(log)?).await?;
        }

        queue.finalize().await
    }
}

#[async_trait]
impl BlobAccess for CompletenessCheckingBlobAccess {
    async fn get(&self, digest: &Digest) -> ActionCacheResult<Vec<u8>> {
        let data = self.action_cache.get(digest).await?;
        let action_result: ActionResult = messages::decode(&data, self.maximum_message_size_bytes)?;
        if let Err(e) = self.check_completeness(digest, &action_result).await {
            debug!("Action result {} is incomplete: {}", digest, e);
            return Err(e);
        }
        Ok(data)
    }

    async fn put(&self, digest: &Digest, data: Vec<u8>) -> ActionCacheResult<()> {
        self.action_cache.put(digest, data).await
    }

    async fn find_missing(&self, digests: &DigestSet) -> ActionCacheResult<DigestSet> {
        self.action_cache.find_missing(digests).await
    }
}

fn missing_object(digest: &Digest) -> ActionCacheError {
    ActionCacheError::NotFound(format!(
        "Object {} referenced by the action result is not present in the Content Addressable Storage",
        digest
    ))
}

/// Accumulates digests and checks their existence in bounded batches
struct FindMissingQueue<'a> {
    content_addressable_storage: &'a dyn BlobAccess,
    batch_size: usize,
    pending: DigestSet,
}

impl<'a> FindMissingQueue<'a> {
    fn new(content_addressable_storage: &'a dyn BlobAccess, batch_size: usize) -> Self {
        Self {
            content_addressable_storage,
            batch_size,
            pending: DigestSet::new(),
        }
    }

    async fn add(&mut self, digest: Digest) -> ActionCacheResult<()> {
        self.pending.insert(digest);
        if self.pending.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> ActionCacheResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let missing = self
            .content_addressable_storage
            .find_missing(&batch)
            .await
            .context("Failed to determine existence of child objects")?;
        match missing.iter().next() {
            Some(digest) => Err(missing_object(digest)),
            None => Ok(()),
        }
    }

    async fn finalize(mut self) -> ActionCacheResult<()> {
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::MemoryBlobAccess;
    use crate::digest::DigestKeyFormat;
    use crate::error::Code;
    use crate::messages::{Directory, FileNode, OutputDirectory, OutputFile};
    use std::sync::Mutex;

    /// Records the size of every find_missing batch
    struct RecordingBlobAccess {
        base: MemoryBlobAccess,
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl BlobAccess for RecordingBlobAccess {
        async fn get(&self, digest: &Digest) -> ActionCacheResult<Vec<u8>> {
            self.base.get(digest).await
        }

        async fn put(&self, digest: &Digest, data: Vec<u8>) -> ActionCacheResult<()> {
            self.base.put(digest, data).await
        }

        async fn find_missing(&self, digests: &DigestSet) -> ActionCacheResult<DigestSet> {
            self.batches.lock().unwrap().push(digests.len());
            self.base.find_missing(digests).await
        }
    }

    fn blob(n: u8) -> DigestRef {
        DigestRef {
            hash: format!("{:032x}", n),
            size_bytes: i64::from(n),
        }
    }

    fn action_digest() -> Digest {
        Digest::new("main", "8b1a9953c4611296a827abf8c47804d7", 123).unwrap()
    }

    struct Fixture {
        ac: Arc<MemoryBlobAccess>,
        cas: Arc<RecordingBlobAccess>,
        ba: CompletenessCheckingBlobAccess,
    }

    fn fixture(batch_size: usize) -> Fixture {
        let ac = Arc::new(MemoryBlobAccess::new(DigestKeyFormat::WithInstance));
        let cas = Arc::new(RecordingBlobAccess {
            base: MemoryBlobAccess::new(DigestKeyFormat::WithoutInstance),
            batches: Mutex::new(vec![]),
        });
        let ba = CompletenessCheckingBlobAccess::new(ac.clone(), cas.clone(), batch_size, 1 << 20);
        Fixture { ac, cas, ba }
    }

    impl Fixture {
        async fn store_cas(&self, digest: &DigestRef, data: Vec<u8>) {
            let d = action_digest().derive(digest).unwrap();
            self.cas.put(&d, data).await.unwrap();
        }

        async fn store_result(&self, result: &ActionResult) -> Vec<u8> {
            let data = messages::encode(result, 1 << 20).unwrap();
            self.ac.put(&action_digest(), data.clone()).await.unwrap();
            data
        }
    }

    fn result_with_files(files: &[DigestRef]) -> ActionResult {
        ActionResult {
            output_files: files
                .iter()
                .enumerate()
                .map(|(i, d)| OutputFile {
                    path: format!("out/{}", i),
                    digest: d.clone(),
                    is_executable: false,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn returns_complete_results() {
        let f = fixture(RECOMMENDED_FIND_MISSING_DIGESTS_COUNT);
        for n in 1..=3 {
            f.store_cas(&blob(n), vec![n]).await;
        }
        let mut result = result_with_files(&[blob(1), blob(2)]);
        result.stdout_digest = Some(blob(3));
        let data = f.store_result(&result).await;

        assert_eq!(f.ba.get(&action_digest()).await.unwrap(), data);
        assert_eq!(*f.cas.batches.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn reports_missing_output_files() {
        let f = fixture(RECOMMENDED_FIND_MISSING_DIGESTS_COUNT);
        f.store_cas(&blob(1), vec![1]).await;
        f.store_result(&result_with_files(&[blob(1), blob(2)])).await;

        let err = f.ba.get(&action_digest()).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
        assert!(err.to_string().contains(&blob(2).hash));
    }

    #[tokio::test]
    async fn reports_missing_stderr() {
        let f = fixture(RECOMMENDED_FIND_MISSING_DIGESTS_COUNT);
        let result = ActionResult {
            stderr_digest: Some(blob(9)),
            ..Default::default()
        };
        f.store_result(&result).await;

        let err = f.ba.get(&action_digest()).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn checks_in_bounded_batches() {
        let f = fixture(2);
        let files: Vec<_> = (1..=5).map(blob).collect();
        for d in &files {
            f.store_cas(d, vec![0]).await;
        }
        f.store_result(&result_with_files(&files)).await;

        assert!(f.ba.get(&action_digest()).await.is_ok());
        assert_eq!(*f.cas.batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn checks_files_inside_output_directories() {
        let f = fixture(RECOMMENDED_FIND_MISSING_DIGESTS_COUNT);
        let tree = Tree {
            root: Directory {
                files: vec![FileNode {
                    name: "a".to_string(),
                    digest: blob(1),
                    is_executable: false,
                }],
                directories: vec![],
            },
            children: vec![Directory {
                files: vec![FileNode {
                    name: "b".to_string(),
                    digest: blob(2),
                    is_executable: false,
                }],
                directories: vec![],
            }],
        };
        f.store_cas(&blob(10), messages::encode(&tree, 1 << 20).unwrap())
            .await;
        f.store_cas(&blob(1), vec![1]).await;
        let result = ActionResult {
            output_directories: vec![OutputDirectory {
                path: "out".to_string(),
                tree_digest: blob(10),
            }],
            ..Default::default()
        };
        f.store_result(&result).await;

        let err = f.ba.get(&action_digest()).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
        assert!(err.to_string().contains(&blob(2).hash));

        f.store_cas(&blob(2), vec![2]).await;
        assert!(f.ba.get(&action_digest()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_tree_is_a_miss() {
        let f = fixture(RECOMMENDED_FIND_MISSING_DIGESTS_COUNT);
        let result = ActionResult {
            output_directories: vec![OutputDirectory {
                path: "out".to_string(),
                tree_digest: blob(10),
            }],
            ..Default::default()
        };
        f.store_result(&result).await;

        let err = f.ba.get(&action_digest()).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn propagates_cas_failures_with_their_code() {
        let ac = Arc::new(MemoryBlobAccess::new(DigestKeyFormat::WithInstance));
        let cas = Arc::new(crate::blobstore::ErrorBlobAccess::new(
            Code::Unavailable,
            "CAS offline",
        ));
        let ba = CompletenessCheckingBlobAccess::new(ac.clone(), cas, 10, 1 << 20);
        let data = messages::encode(&result_with_files(&[blob(1)]), 1 << 20).unwrap();
        ac.put(&action_digest(), data).await.unwrap();

        let err = ba.get(&action_digest()).await.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
        assert!(err.to_string().contains("Failed to determine existence"));
    }
}
