//! In-memory doubles shared by the integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use keywheel_common::{Clock, CredentialId, Provider, UserId};
use keywheel_core::{
    Credential, CredentialStore, CredentialUpdate, EncryptedSecret, StoreError, UsageError,
    UsageRecord, UsageSink, VertexCredential, VertexStore,
};

/// Deterministic clock that only moves when a test says so.
#[derive(Debug, Default)]
pub struct TestClock(AtomicI64);

impl TestClock {
    pub fn at(start: i64) -> Self {
        Self(AtomicI64::new(start))
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn unix_now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn credential(
    id: &str,
    user: &str,
    provider: Provider,
    priority: i32,
    last_used_at: Option<i64>,
) -> Credential {
    Credential {
        id: id.to_string(),
        user_id: Some(user.to_string()),
        provider,
        secret: EncryptedSecret(format!("enc:sk-{id}")),
        priority,
        last_used_at,
        active: true,
        quota: None,
    }
}

pub fn vertex_credential(
    id: &str,
    user: &str,
    priority: i32,
    last_used_at: Option<i64>,
) -> VertexCredential {
    VertexCredential {
        id: id.to_string(),
        user_id: user.to_string(),
        secret: EncryptedSecret(format!("enc:sa-{id}")),
        priority,
        last_used_at,
        active: true,
        quota: None,
        project_id: format!("proj-{id}"),
        location: "us-central1".to_string(),
    }
}

/// Generic-pool store over a plain `Vec`. Decryption strips the `enc:`
/// prefix; anything else refuses to decrypt, which is how tests provoke
/// the decrypt-failure path.
#[derive(Default)]
pub struct MemoryStore {
    creds: Mutex<Vec<Credential>>,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new(creds: Vec<Credential>) -> Self {
        Self {
            creds: Mutex::new(creds),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Option<Credential> {
        self.creds
            .lock()
            .unwrap()
            .iter()
            .find(|credential| credential.id == id)
            .cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn list_active(
        &self,
        user: &UserId,
        provider: Provider,
    ) -> Result<Vec<Credential>, StoreError> {
        Ok(self
            .creds
            .lock()
            .unwrap()
            .iter()
            .filter(|credential| {
                credential.active
                    && credential.provider == provider
                    && credential.user_id.as_deref() == Some(user.as_str())
            })
            .cloned()
            .collect())
    }

    async fn decrypt(
        &self,
        secret: &EncryptedSecret,
        _user: &UserId,
    ) -> Result<String, StoreError> {
        secret
            .0
            .strip_prefix("enc:")
            .map(str::to_string)
            .ok_or_else(|| StoreError::Decrypt("unknown payload format".to_string()))
    }

    async fn update(&self, id: &CredentialId, update: CredentialUpdate) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Update("store offline".to_string()));
        }
        let mut creds = self.creds.lock().unwrap();
        let Some(credential) = creds.iter_mut().find(|credential| &credential.id == id) else {
            return Err(StoreError::Update(format!("no credential {id}")));
        };
        if let Some(stamp) = update.last_used_at {
            credential.last_used_at = Some(stamp);
        }
        if let Some(active) = update.active {
            credential.active = active;
        }
        if let Some(quota) = update.quota {
            credential.quota = Some(quota);
        }
        Ok(())
    }
}

/// Vertex-pool store. The least-recently-used pick and its stamp happen
/// inside one lock, mirroring the server-side contract.
pub struct VertexMemoryStore {
    creds: Mutex<Vec<VertexCredential>>,
    stamp: AtomicI64,
}

impl VertexMemoryStore {
    pub fn new(creds: Vec<VertexCredential>) -> Self {
        Self {
            creds: Mutex::new(creds),
            stamp: AtomicI64::new(1_000),
        }
    }

    pub fn get(&self, id: &str) -> Option<VertexCredential> {
        self.creds
            .lock()
            .unwrap()
            .iter()
            .find(|credential| credential.id == id)
            .cloned()
    }
}

impl Default for VertexMemoryStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl VertexStore for VertexMemoryStore {
    async fn acquire_next(
        &self,
        user: &UserId,
        exclude: Option<&CredentialId>,
    ) -> Result<Option<VertexCredential>, StoreError> {
        let mut creds = self.creds.lock().unwrap();
        let mut candidates: Vec<&mut VertexCredential> = creds
            .iter_mut()
            .filter(|credential| {
                credential.active
                    && credential.user_id == *user
                    && Some(&credential.id) != exclude
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.last_used_at
                .cmp(&b.last_used_at)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.id.cmp(&b.id))
        });
        let Some(first) = candidates.into_iter().next() else {
            return Ok(None);
        };
        first.last_used_at = Some(self.stamp.fetch_add(1, Ordering::SeqCst));
        Ok(Some(first.clone()))
    }

    async fn list_active(&self, user: &UserId) -> Result<Vec<VertexCredential>, StoreError> {
        Ok(self
            .creds
            .lock()
            .unwrap()
            .iter()
            .filter(|credential| credential.active && credential.user_id == *user)
            .cloned()
            .collect())
    }

    async fn decrypt(
        &self,
        secret: &EncryptedSecret,
        _user: &UserId,
    ) -> Result<String, StoreError> {
        secret
            .0
            .strip_prefix("enc:")
            .map(str::to_string)
            .ok_or_else(|| StoreError::Decrypt("unknown payload format".to_string()))
    }

    async fn update(&self, id: &CredentialId, update: CredentialUpdate) -> Result<(), StoreError> {
        let mut creds = self.creds.lock().unwrap();
        let Some(credential) = creds.iter_mut().find(|credential| &credential.id == id) else {
            return Err(StoreError::Update(format!("no credential {id}")));
        };
        if let Some(stamp) = update.last_used_at {
            credential.last_used_at = Some(stamp);
        }
        if let Some(active) = update.active {
            credential.active = active;
        }
        if let Some(quota) = update.quota {
            credential.quota = Some(quota);
        }
        Ok(())
    }
}

/// Usage sink that either collects records or refuses them.
#[derive(Default)]
pub struct MemoryUsageSink {
    pub records: Mutex<Vec<UsageRecord>>,
    reject: AtomicBool,
}

impl MemoryUsageSink {
    pub fn rejecting() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            reject: AtomicBool::new(true),
        }
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl UsageSink for MemoryUsageSink {
    async fn record(&self, record: UsageRecord) -> Result<(), UsageError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(UsageError("ledger unavailable".to_string()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// Failure double with an explicit status and message, as a caller-owned
/// upstream error would carry.
#[derive(Debug)]
pub struct TestFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl TestFailure {
    pub fn quota() -> Self {
        Self {
            status: Some(429),
            message: "quota exceeded".to_string(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: Some(500),
            message: "internal error".to_string(),
        }
    }
}

impl std::fmt::Display for TestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TestFailure {}

impl keywheel_core::FailureSignal for TestFailure {
    fn status(&self) -> Option<u16> {
        self.status
    }
}
