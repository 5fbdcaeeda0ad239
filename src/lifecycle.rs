//! Seal Lifecycle Manager - Single Entry Point
//!
//! CRITICAL: a version is persisted only after its artifact exists, and
//! version numbers are assigned under a per-seal lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::SealConfig;
use crate::error::{SealError, SealResult};
use crate::export::{ExportPipeline, RenderBackend, SessionExporter, SvgOnlyExporter};
use crate::hashing::{compute_content_hash, compute_spec_hash};
use crate::layout;
use crate::model::{
    artifact_path, ensure_window_ordered, Actor, NewSeal, OutputFormat, Seal, SealId, SealPatch,
    SealUsage, SealVersion, SealVersionSpec, UsageOutcome, UsageQuery, UsageRequest,
    VersionId, VersionRequest,
};
use crate::sinks::{AlertSink, AuditAction, AuditRecord, AuditSink, FieldDiff, TracingAlertSink, TracingAuditSink};
use crate::storage::{ArtifactStore, FsArtifactStore, SealRepository};
use crate::svg;
use crate::usage::UsageValidator;

type VersionLock = Arc<tokio::sync::Mutex<()>>;

/// The seal service - every mutation of seals, versions and usages goes through here
pub struct SealService {
    config: SealConfig,
    repository: Arc<dyn SealRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    exporter: Arc<dyn ExportPipeline>,
    audit: Arc<dyn AuditSink>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    validator: UsageValidator,
    version_locks: Mutex<HashMap<SealId, VersionLock>>,
}

impl SealService {
    pub fn builder() -> SealServiceBuilder {
        SealServiceBuilder::new()
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    // ==================== Seals ====================

    pub async fn create_seal(&self, actor: &Actor, new: NewSeal) -> SealResult<Seal> {
        self.repository
            .load_academic_year(actor.tenant_id, new.academic_year_id)
            .await?
            .ok_or_else(|| {
                SealError::NotFound(format!("academic year {} not found", new.academic_year_id))
            })?;
        if new.label.trim().is_empty() {
            return Err(SealError::InvalidState("seal label must not be empty".into()));
        }
        ensure_window_ordered(new.valid_from, new.valid_to)?;

        let now = self.clock.now();
        let seal = Seal {
            id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            school_id: new.school_id,
            academic_year_id: new.academic_year_id,
            seal_type: new.seal_type,
            label: new.label,
            role: new.role,
            holder_name: new.holder_name,
            holder_title: new.holder_title,
            is_active: true,
            valid_from: new.valid_from,
            valid_to: new.valid_to,
            created_at: now,
            updated_at: now,
        };
        self.repository.save_seal(&seal).await?;

        info!(tenant = %actor.tenant_id, seal_id = %seal.id, seal_type = ?seal.seal_type, "seal created");
        self.audit(AuditRecord::new(actor, "seal", seal.id, AuditAction::Create, vec![], now))
            .await;
        Ok(seal)
    }

    /// Partial update. Unchanged patches are a no-op and leave no audit trace.
    pub async fn update_seal(&self, actor: &Actor, seal_id: SealId, patch: SealPatch) -> SealResult<Seal> {
        let mut seal = self.load_seal(actor, seal_id).await?;

        let mut diffs = Vec::new();
        apply_field("label", &mut seal.label, patch.label, &mut diffs)?;
        apply_field("role", &mut seal.role, patch.role, &mut diffs)?;
        apply_field("holderName", &mut seal.holder_name, patch.holder_name, &mut diffs)?;
        apply_field("holderTitle", &mut seal.holder_title, patch.holder_title, &mut diffs)?;
        apply_field("isActive", &mut seal.is_active, patch.is_active, &mut diffs)?;
        apply_field("validFrom", &mut seal.valid_from, patch.valid_from, &mut diffs)?;
        apply_field("validTo", &mut seal.valid_to, patch.valid_to, &mut diffs)?;

        if seal.label.trim().is_empty() {
            return Err(SealError::InvalidState("seal label must not be empty".into()));
        }
        ensure_window_ordered(seal.valid_from, seal.valid_to)?;

        if diffs.is_empty() {
            debug!(seal_id = %seal_id, "seal update without changes");
            return Ok(seal);
        }

        let now = self.clock.now();
        seal.updated_at = now;
        self.repository.save_seal(&seal).await?;

        info!(tenant = %actor.tenant_id, seal_id = %seal_id, changes = diffs.len(), "seal updated");
        self.audit(AuditRecord::new(actor, "seal", seal_id, AuditAction::Update, diffs, now))
            .await;
        Ok(seal)
    }

    pub async fn activate_seal(&self, actor: &Actor, seal_id: SealId) -> SealResult<Seal> {
        let patch = SealPatch { is_active: Some(true), ..Default::default() };
        self.update_seal(actor, seal_id, patch).await
    }

    pub async fn deactivate_seal(&self, actor: &Actor, seal_id: SealId) -> SealResult<Seal> {
        let patch = SealPatch { is_active: Some(false), ..Default::default() };
        self.update_seal(actor, seal_id, patch).await
    }

    // ==================== Versions ====================

    /// Create the next version of a seal.
    ///
    /// Fails with `InvalidState` if the seal is inactive or outside its
    /// validity window. Concurrent calls on one seal are serialized.
    pub async fn create_version(
        &self,
        actor: &Actor,
        seal_id: SealId,
        request: VersionRequest,
    ) -> SealResult<SealVersion> {
        let entry = self.version_lock(seal_id);
        let _guard = entry.lock.lock().await;
        self.create_version_locked(actor, seal_id, &request).await
    }

    async fn create_version_locked(
        &self,
        actor: &Actor,
        seal_id: SealId,
        request: &VersionRequest,
    ) -> SealResult<SealVersion> {
        let now = self.clock.now();
        let seal = self.load_seal(actor, seal_id).await?;
        seal.ensure_usable_at(now)?;

        let spec = SealVersionSpec::resolve(&seal, request);
        layout::ensure_drawable(&spec, &self.config.layout)?;
        let markup = svg::to_svg(&layout::compose(&spec, &self.config.layout));

        let version_number = self.repository.count_versions(seal_id).await? + 1;

        let artifact = match request.format {
            OutputFormat::Svg => markup.into_bytes(),
            OutputFormat::Png | OutputFormat::Pdf => {
                self.exporter.render(&markup, request.format).await?
            }
        };

        // Create-only: if another writer already holds this number, we fail here
        // and leave its file alone.
        let file_path = artifact_path(seal_id, version_number, request.format);
        self.artifacts.put(&file_path, &artifact).await?;

        let version = SealVersion {
            id: Uuid::new_v4(),
            seal_id,
            version_number,
            format: request.format,
            spec_hash: compute_spec_hash(&spec)?,
            content_hash: compute_content_hash(&artifact),
            spec,
            file_url: self.config.public_url(&file_path),
            file_path,
            created_by: actor.user_id,
            created_at: now,
        };

        if let Err(e) = self.repository.save_version(&version).await {
            if let Err(cleanup) = self.artifacts.remove(&version.file_path).await {
                warn!(path = %version.file_path, error = %cleanup, "orphaned artifact left behind");
            }
            return Err(e);
        }

        info!(
            tenant = %actor.tenant_id,
            seal_id = %seal_id,
            version = version_number,
            format = ?version.format,
            "seal version created"
        );
        let changes = vec![FieldDiff::new("versionNumber", &(version_number - 1), &version_number)?];
        self.audit(AuditRecord::new(actor, "seal_version", version.id, AuditAction::Create, changes, now))
            .await;
        Ok(version)
    }

    pub async fn list_versions(&self, actor: &Actor, seal_id: SealId) -> SealResult<Vec<SealVersion>> {
        self.load_seal(actor, seal_id).await?;
        self.repository.list_versions(seal_id).await
    }

    pub async fn get_version(&self, actor: &Actor, version_id: VersionId) -> SealResult<SealVersion> {
        self.repository
            .load_version(actor.tenant_id, version_id)
            .await?
            .ok_or_else(|| SealError::NotFound(format!("seal version {} not found", version_id)))
    }

    /// Preview markup for a prospective version. Persists nothing.
    pub async fn render_version(
        &self,
        actor: &Actor,
        seal_id: SealId,
        request: &VersionRequest,
    ) -> SealResult<String> {
        let seal = self.load_seal(actor, seal_id).await?;
        svg::render_seal(&SealVersionSpec::resolve(&seal, request), &self.config.layout)
    }

    // ==================== Usage ====================

    /// Record a usage, then evaluate it. Alert delivery failures are logged only.
    pub async fn record_usage(&self, actor: &Actor, request: UsageRequest) -> SealResult<UsageOutcome> {
        let version = self.get_version(actor, request.seal_version_id).await?;
        let seal = self.load_seal(actor, version.seal_id).await?;

        let usage = SealUsage {
            id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            seal_version_id: version.id,
            document_type: request.document_type,
            document_id: request.document_id,
            used_by: actor.user_id,
            school_id: request.school_id.unwrap_or(seal.school_id),
            academic_year_id: request.academic_year_id.unwrap_or(seal.academic_year_id),
            used_at: self.clock.now(),
        };
        self.repository.save_usage(&usage).await?;
        debug!(usage_id = %usage.id, seal_id = %seal.id, version = version.version_number, "seal usage recorded");

        let alerts = self.validator.evaluate(&seal, &usage);
        for alert in &alerts {
            info!(
                usage_id = %usage.id,
                seal_id = %seal.id,
                kind = ?alert.kind,
                severity = ?alert.severity,
                "seal usage anomaly"
            );
            if let Err(e) = self.alerts.publish_alert(alert).await {
                warn!(usage_id = %usage.id, kind = ?alert.kind, error = %e, "failed to publish anomaly alert");
            }
        }

        Ok(UsageOutcome { usage, alerts })
    }

    pub async fn query_usage_history(&self, actor: &Actor, query: &UsageQuery) -> SealResult<Vec<SealUsage>> {
        if let Some(seal_id) = query.seal_id {
            self.load_seal(actor, seal_id).await?;
        }
        self.repository.list_usages(actor.tenant_id, query).await
    }

    // ==================== Internals ====================

    async fn load_seal(&self, actor: &Actor, seal_id: SealId) -> SealResult<Seal> {
        self.repository
            .load_seal(actor.tenant_id, seal_id)
            .await?
            .ok_or_else(|| SealError::NotFound(format!("seal {} not found", seal_id)))
    }

    async fn audit(&self, record: AuditRecord) {
        let entity_id = record.entity_id;
        if let Err(e) = self.audit.record_change(record).await {
            warn!(entity_id = %entity_id, error = %e, "failed to record audit entry");
        }
    }

    fn version_lock(&self, seal_id: SealId) -> VersionLockEntry<'_> {
        let mut locks = self.version_locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = locks.entry(seal_id).or_default().clone();
        VersionLockEntry { locks: &self.version_locks, seal_id, lock }
    }
}

/// A caller's claim on a seal's version lock. The registry entry is removed
/// when the last claim is dropped, including when the caller is cancelled.
struct VersionLockEntry<'a> {
    locks: &'a Mutex<HashMap<SealId, VersionLock>>,
    seal_id: SealId,
    lock: VersionLock,
}

impl Drop for VersionLockEntry<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let ours = locks.get(&self.seal_id).map_or(false, |l| Arc::ptr_eq(l, &self.lock));
        if ours && Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.seal_id);
        }
    }
}

fn apply_field<T: PartialEq + Serialize>(
    field: &str,
    slot: &mut T,
    new: Option<T>,
    diffs: &mut Vec<FieldDiff>,
) -> SealResult<()> {
    if let Some(new) = new {
        if *slot != new {
            diffs.push(FieldDiff::new(field, &*slot, &new)?);
            *slot = new;
        }
    }
    Ok(())
}

/// Seal service builder
pub struct SealServiceBuilder {
    config: Option<SealConfig>,
    repository: Option<Arc<dyn SealRepository>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    exporter: Option<Arc<dyn ExportPipeline>>,
    render_backend: Option<Arc<dyn RenderBackend>>,
    audit: Option<Arc<dyn AuditSink>>,
    alerts: Option<Arc<dyn AlertSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SealServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            repository: None,
            artifacts: None,
            exporter: None,
            render_backend: None,
            audit: None,
            alerts: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: SealConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn SealRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn exporter(mut self, exporter: Arc<dyn ExportPipeline>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Export PNG/PDF through `backend`, bounded by the configured export timeout.
    pub fn render_backend(mut self, backend: Arc<dyn RenderBackend>) -> Self {
        self.render_backend = Some(backend);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the service. The repository is required; everything else has a default.
    pub fn build(self) -> SealResult<SealService> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let repository = self
            .repository
            .ok_or_else(|| SealError::Configuration("Repository is required".to_string()))?;
        let artifacts = self
            .artifacts
            .unwrap_or_else(|| Arc::new(FsArtifactStore::new(config.uploads_dir.clone())));
        let exporter: Arc<dyn ExportPipeline> = match (self.exporter, self.render_backend) {
            (Some(_), Some(_)) => {
                return Err(SealError::Configuration(
                    "set either an exporter or a render backend, not both".to_string(),
                ))
            }
            (Some(exporter), None) => exporter,
            (None, Some(backend)) => Arc::new(SessionExporter::new(backend, config.export_timeout())),
            (None, None) => Arc::new(SvgOnlyExporter),
        };

        Ok(SealService {
            repository,
            artifacts,
            exporter,
            audit: self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink)),
            alerts: self.alerts.unwrap_or_else(|| Arc::new(TracingAlertSink)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            validator: UsageValidator::new(),
            version_locks: Mutex::new(HashMap::new()),
            config,
        })
    }
}

impl Default for SealServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepository;

    #[test]
    fn test_builder_requires_repository() {
        let result = SealService::builder().build();
        assert!(matches!(result, Err(SealError::Configuration(_))));
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let mut config = SealConfig::default();
        config.export_timeout_secs = 0;
        let result = SealService::builder()
            .config(config)
            .repository(Arc::new(MemoryRepository::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_field_records_diff_only_on_change() {
        let mut diffs = Vec::new();
        let mut label = "Caisse".to_string();
        apply_field("label", &mut label, Some("Caisse".to_string()), &mut diffs).unwrap();
        assert!(diffs.is_empty());
        apply_field("label", &mut label, Some("Économat".to_string()), &mut diffs).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(label, "Économat");
        apply_field::<String>("label", &mut label, None, &mut diffs).unwrap();
        assert_eq!(diffs.len(), 1);
    }

    fn memory_service() -> SealService {
        SealService::builder()
            .repository(Arc::new(MemoryRepository::new()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_version_lock_entries_released() {
        let service = memory_service();
        let seal_id = Uuid::new_v4();
        let first = service.version_lock(seal_id);
        let second = service.version_lock(seal_id);
        drop(first);
        assert_eq!(service.version_locks.lock().unwrap().len(), 1);
        drop(second);
        assert!(service.version_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_version_request_releases_lock_entry() {
        let service = memory_service();
        let actor = Actor::new(Uuid::new_v4(), Uuid::new_v4());
        let seal_id = Uuid::new_v4();

        let held = service.version_lock(seal_id);
        let guard = held.lock.lock().await;
        let waiting = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            service.create_version(&actor, seal_id, VersionRequest::default()),
        )
        .await;
        assert!(waiting.is_err());

        drop(guard);
        drop(held);
        assert!(service.version_locks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_builder_rejects_exporter_and_backend_together() {
        struct NoBackend;

        #[async_trait::async_trait]
        impl RenderBackend for NoBackend {
            async fn open_session(&self) -> SealResult<Box<dyn crate::export::RenderSession>> {
                Err(SealError::RenderingFailure("unavailable".into()))
            }
        }

        let result = SealService::builder()
            .repository(Arc::new(MemoryRepository::new()))
            .exporter(Arc::new(SvgOnlyExporter))
            .render_backend(Arc::new(NoBackend))
            .build();
        assert!(matches!(result, Err(SealError::Configuration(_))));
    }
}
