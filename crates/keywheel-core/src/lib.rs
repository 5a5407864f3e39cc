//! Credential rotation and retry orchestration.
//!
//! This crate intentionally does **not** depend on any concrete HTTP client
//! or persistence layer. Stores, usage sinks, and the request execution
//! itself are trait seams; callers own the IO. The two rotation pools
//! (generic providers and Vertex AI) are fully isolated: they represent
//! different billing relationships and must never fall back to each other.

pub mod credential;
pub mod env;
pub mod model_map;
pub mod resolver;
pub mod retry;
pub mod rotation;
pub mod store;
pub mod usage;

pub use credential::{
    Credential, CredentialSource, EncryptedSecret, QuotaStatus, ResolvedCredential,
    VertexCredential, VertexRuntime,
};
pub use env::EnvKeys;
pub use model_map::{ModelSpec, resolve_model};
pub use resolver::CredentialResolver;
pub use retry::{
    FailureSignal, Orchestrator, QuotaClassifier, RetryPolicy, RetryState, RunError, RunReport,
    TerminalFailure,
};
pub use rotation::{KeyRotation, RotationEntry, VertexRotation, display_rank, pick_next};
pub use store::{CredentialStore, CredentialUpdate, StoreError, VertexStore};
pub use usage::{AdvisoryFailure, UsageError, UsageRecord, UsageSink};
