//! Seal Storage Layer
//!
//! The relational store is opaque to the core: it only sees these traits.
//! Versions and usages are insert-only; there is no update or delete for them.

pub mod artifacts;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SealResult;
use crate::model::{
    AcademicYear, Seal, SealId, SealUsage, SealVersion, TenantId, UsageQuery, VersionId,
};

/// Seal repository
///
/// Every lookup is tenant-scoped: a record of another tenant reads as absent.
#[async_trait]
pub trait SealRepository: Send + Sync {
    async fn load_academic_year(&self, tenant: TenantId, id: Uuid) -> SealResult<Option<AcademicYear>>;

    async fn load_seal(&self, tenant: TenantId, id: SealId) -> SealResult<Option<Seal>>;

    /// Insert or replace a seal.
    async fn save_seal(&self, seal: &Seal) -> SealResult<()>;

    async fn count_versions(&self, seal_id: SealId) -> SealResult<u32>;

    /// Insert a version. Fails if the id or `(seal_id, version_number)` already exists.
    async fn save_version(&self, version: &SealVersion) -> SealResult<()>;

    async fn load_version(&self, tenant: TenantId, id: VersionId) -> SealResult<Option<SealVersion>>;

    /// Versions of a seal, ascending by version number.
    async fn list_versions(&self, seal_id: SealId) -> SealResult<Vec<SealVersion>>;

    /// Insert a usage fact.
    async fn save_usage(&self, usage: &SealUsage) -> SealResult<()>;

    /// Usages matching `query`, newest first.
    async fn list_usages(&self, tenant: TenantId, query: &UsageQuery) -> SealResult<Vec<SealUsage>>;
}

/// Byte storage for rendered seal files, addressed by relative path.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Create a new artifact. Fails if `path` already exists; never overwrites.
    async fn put(&self, path: &str, bytes: &[u8]) -> SealResult<()>;

    async fn remove(&self, path: &str) -> SealResult<()>;
}

pub use artifacts::{FsArtifactStore, MemoryArtifactStore};
pub use memory::MemoryRepository;
