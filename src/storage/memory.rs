//! In-memory repository, used by tests, the CLI and development setups.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SealRepository;
use crate::error::{SealError, SealResult};
use crate::model::{
    AcademicYear, Seal, SealId, SealUsage, SealVersion, TenantId, UsageId, UsageQuery, VersionId,
};

#[derive(Debug, Default)]
pub struct MemoryRepository {
    academic_years: Arc<RwLock<HashMap<Uuid, AcademicYear>>>,
    seals: Arc<RwLock<HashMap<SealId, Seal>>>,
    versions: Arc<RwLock<HashMap<VersionId, SealVersion>>>,
    usages: Arc<RwLock<HashMap<UsageId, SealUsage>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_academic_year(&self, year: AcademicYear) {
        self.academic_years.write().await.insert(year.id, year);
    }

    pub async fn usage_count(&self) -> usize {
        self.usages.read().await.len()
    }

    pub async fn version_count(&self) -> usize {
        self.versions.read().await.len()
    }
}

#[async_trait]
impl SealRepository for MemoryRepository {
    async fn load_academic_year(&self, tenant: TenantId, id: Uuid) -> SealResult<Option<AcademicYear>> {
        let years = self.academic_years.read().await;
        Ok(years.get(&id).filter(|y| y.tenant_id == tenant).cloned())
    }

    async fn load_seal(&self, tenant: TenantId, id: SealId) -> SealResult<Option<Seal>> {
        let seals = self.seals.read().await;
        Ok(seals.get(&id).filter(|s| s.tenant_id == tenant).cloned())
    }

    async fn save_seal(&self, seal: &Seal) -> SealResult<()> {
        let mut seals = self.seals.write().await;
        if let Some(existing) = seals.get(&seal.id) {
            if existing.seal_type != seal.seal_type {
                return Err(SealError::Storage(format!(
                    "seal {} type is immutable",
                    seal.id
                )));
            }
        }
        seals.insert(seal.id, seal.clone());
        Ok(())
    }

    async fn count_versions(&self, seal_id: SealId) -> SealResult<u32> {
        let versions = self.versions.read().await;
        Ok(versions.values().filter(|v| v.seal_id == seal_id).count() as u32)
    }

    async fn save_version(&self, version: &SealVersion) -> SealResult<()> {
        let mut versions = self.versions.write().await;
        if versions.contains_key(&version.id) {
            return Err(SealError::Storage(format!(
                "seal version {} already exists",
                version.id
            )));
        }
        if versions
            .values()
            .any(|v| v.seal_id == version.seal_id && v.version_number == version.version_number)
        {
            return Err(SealError::Storage(format!(
                "seal {} already has version {}",
                version.seal_id, version.version_number
            )));
        }
        versions.insert(version.id, version.clone());
        Ok(())
    }

    async fn load_version(&self, tenant: TenantId, id: VersionId) -> SealResult<Option<SealVersion>> {
        let version = match self.versions.read().await.get(&id) {
            Some(v) => v.clone(),
            None => return Ok(None),
        };
        let seals = self.seals.read().await;
        let owned = seals
            .get(&version.seal_id)
            .map_or(false, |s| s.tenant_id == tenant);
        Ok(owned.then_some(version))
    }

    async fn list_versions(&self, seal_id: SealId) -> SealResult<Vec<SealVersion>> {
        let versions = self.versions.read().await;
        let mut list: Vec<_> = versions
            .values()
            .filter(|v| v.seal_id == seal_id)
            .cloned()
            .collect();
        list.sort_by_key(|v| v.version_number);
        Ok(list)
    }

    async fn save_usage(&self, usage: &SealUsage) -> SealResult<()> {
        let mut usages = self.usages.write().await;
        if usages.contains_key(&usage.id) {
            return Err(SealError::Storage(format!("seal usage {} already exists", usage.id)));
        }
        usages.insert(usage.id, usage.clone());
        Ok(())
    }

    async fn list_usages(&self, tenant: TenantId, query: &UsageQuery) -> SealResult<Vec<SealUsage>> {
        let usages = self.usages.read().await;
        let versions = self.versions.read().await;

        let mut list: Vec<SealUsage> = usages
            .values()
            .filter(|u| u.tenant_id == tenant)
            .filter(|u| query.seal_version_id.map_or(true, |id| u.seal_version_id == id))
            .filter(|u| {
                query.seal_id.map_or(true, |seal_id| {
                    versions
                        .get(&u.seal_version_id)
                        .map_or(false, |v| v.seal_id == seal_id)
                })
            })
            .filter(|u| {
                query
                    .document_type
                    .as_ref()
                    .map_or(true, |t| &u.document_type == t)
            })
            .filter(|u| query.academic_year_id.map_or(true, |id| u.academic_year_id == id))
            .filter(|u| query.since.map_or(true, |t| u.used_at >= t))
            .filter(|u| query.until.map_or(true, |t| u.used_at <= t))
            .cloned()
            .collect();

        list.sort_by(|a, b| b.used_at.cmp(&a.used_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            list.truncate(limit);
        }
        Ok(list)
    }
}
