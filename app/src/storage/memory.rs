use super::ObjectStore;
use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail: Mutex<bool>,
}

impl MemoryObjectStore {
    pub const PUBLIC_URL: &'static str = "http://storage.test";

    pub fn new() -> Self {
        Self::default()
    }

    /// Looks an object up by its public url.
    pub fn get_by_url(&self, url: &str) -> Option<Vec<u8>> {
        let key = url.strip_prefix(Self::PUBLIC_URL)?.trim_start_matches('/');
        self.objects.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn fail_uploads(&self) {
        *self.fail.lock() = true;
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if *self.fail.lock() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "storage offline",
            )));
        }
        let key = format!("{}/{}", bucket, path);
        let mut objects = self.objects.lock();
        if objects.contains_key(&key) {
            return Err(StorageError::Duplicate(key));
        }
        objects.insert(key, bytes.to_vec());
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", Self::PUBLIC_URL, bucket, path)
    }
}
