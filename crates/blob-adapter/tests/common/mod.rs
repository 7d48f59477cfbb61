//! Shared test utilities for adapter integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use blob_adapter::store::{
    ObjectBackend, ObjectStream, PutOptions, PutReceipt, RemoteStore, StoreError,
};
use blob_adapter::{
    Adapter, AdapterConfig, BackendConfig, BlobStorageAdapter, CollectionAdapter,
    CollectionContext, PublicAddress, StorageKey,
};
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use url::Url;

pub const PUBLIC_BASE: &str = "https://store-1.public.blob.example.com";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn public_base() -> Url {
    Url::parse(PUBLIC_BASE).unwrap()
}

pub fn memory_config(prefix: &str) -> AdapterConfig {
    AdapterConfig::new(public_base(), BackendConfig::Memory).with_prefix(prefix)
}

/// An adapter over an in-memory object store the test can inspect directly.
pub fn memory_adapter(prefix: &str) -> (BlobStorageAdapter, Arc<ObjectBackend>) {
    let backend = Arc::new(ObjectBackend::memory(
        PublicAddress::new(public_base()).unwrap(),
    ));
    let adapter = BlobStorageAdapter::with_store(memory_config(prefix), backend.clone()).unwrap();
    (adapter, backend)
}

pub fn media(adapter: &BlobStorageAdapter) -> CollectionAdapter {
    adapter.generate(&CollectionContext::new("media"))
}

/// Read a stored object back in full, or `None` if it is missing.
pub async fn read_object(backend: &ObjectBackend, key: &str) -> Option<Vec<u8>> {
    let key = StorageKey::new("", key).unwrap();
    match backend.fetch_object_stream(&key).await {
        Ok(object) => {
            let chunks: Vec<Bytes> = object.body.try_collect().await.unwrap();
            Some(chunks.concat())
        }
        Err(StoreError::NotFound(_)) => None,
        Err(e) => panic!("unexpected store error: {e}"),
    }
}

fn connection_reset() -> StoreError {
    StoreError::ObjectStore(object_store::Error::Generic {
        store: "faulty",
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )),
    })
}

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Unauthorized,
    Network,
    Missing,
}

/// A store whose every operation fails with the configured fault.
#[derive(Debug)]
pub struct FaultyStore {
    fault: Fault,
    calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new(fault: Fault) -> Self {
        Self {
            fault,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self, key: &StorageKey) -> StoreError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::Unauthorized => StoreError::Unauthorized("token expired".into()),
            Fault::Network => connection_reset(),
            Fault::Missing => StoreError::NotFound(key.to_string()),
        }
    }
}

#[async_trait]
impl RemoteStore for FaultyStore {
    async fn put_object(
        &self,
        key: &StorageKey,
        _body: Bytes,
        _opts: &PutOptions,
    ) -> Result<PutReceipt, StoreError> {
        Err(self.fail(key))
    }

    async fn delete_object(&self, key: &StorageKey) -> Result<(), StoreError> {
        Err(self.fail(key))
    }

    async fn fetch_object_stream(&self, key: &StorageKey) -> Result<ObjectStream, StoreError> {
        Err(self.fail(key))
    }
}

pub fn faulty_adapter(fault: Fault, prefix: &str) -> (BlobStorageAdapter, Arc<FaultyStore>) {
    let store = Arc::new(FaultyStore::new(fault));
    let adapter = BlobStorageAdapter::with_store(memory_config(prefix), store.clone()).unwrap();
    (adapter, store)
}

/// A store whose reads send `first` and then lose the connection.
#[derive(Debug)]
pub struct TruncatingStore {
    first: Bytes,
}

impl TruncatingStore {
    pub fn new(first: &'static [u8]) -> Self {
        Self {
            first: Bytes::from_static(first),
        }
    }
}

#[async_trait]
impl RemoteStore for TruncatingStore {
    async fn put_object(
        &self,
        _key: &StorageKey,
        _body: Bytes,
        _opts: &PutOptions,
    ) -> Result<PutReceipt, StoreError> {
        Err(connection_reset())
    }

    async fn delete_object(&self, _key: &StorageKey) -> Result<(), StoreError> {
        Err(connection_reset())
    }

    async fn fetch_object_stream(&self, _key: &StorageKey) -> Result<ObjectStream, StoreError> {
        let chunks = vec![Ok(self.first.clone()), Err(connection_reset())];
        Ok(ObjectStream {
            content_type: Some("application/pdf".into()),
            size: None,
            body: stream::iter(chunks).boxed(),
        })
    }
}

/// An adapter over a local directory, for checking what lands on disk.
pub fn local_adapter(root: &std::path::Path, prefix: &str) -> BlobStorageAdapter {
    let config = AdapterConfig::new(
        public_base(),
        BackendConfig::Local {
            path: root.to_path_buf(),
        },
    )
    .with_prefix(prefix);
    BlobStorageAdapter::new(config).unwrap()
}
