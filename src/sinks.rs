//! Audit and alert collaborators.
//!
//! Both sinks are append-only and never queried by the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SealResult;
use crate::model::{Actor, AnomalyAlert, TenantId, UserId};

/// Old and new value of one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl FieldDiff {
    pub fn new<T: Serialize>(field: &str, old: &T, new: &T) -> SealResult<Self> {
        Ok(Self {
            field: field.to_string(),
            old: serde_json::to_value(old)?,
            new: serde_json::to_value(new)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub tenant_id: TenantId,
    pub entity: String,
    pub entity_id: Uuid,
    pub action: AuditAction,
    pub changes: Vec<FieldDiff>,
    pub actor_id: UserId,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor: &Actor,
        entity: &str,
        entity_id: Uuid,
        action: AuditAction,
        changes: Vec<FieldDiff>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: actor.tenant_id,
            entity: entity.to_string(),
            entity_id,
            action,
            changes,
            actor_id: actor.user_id,
            ip: actor.ip.clone(),
            user_agent: actor.user_agent.clone(),
            at,
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_change(&self, record: AuditRecord) -> SealResult<()>;
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Fire-and-forget; delivering the same alert twice is acceptable.
    async fn publish_alert(&self, alert: &AnomalyAlert) -> SealResult<()>;
}

/// Emits audit records as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_change(&self, record: AuditRecord) -> SealResult<()> {
        info!(
            tenant = %record.tenant_id,
            entity = %record.entity,
            entity_id = %record.entity_id,
            action = ?record.action,
            changes = record.changes.len(),
            actor = %record.actor_id,
            "audit"
        );
        Ok(())
    }
}

/// Emits anomaly alerts as warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn publish_alert(&self, alert: &AnomalyAlert) -> SealResult<()> {
        warn!(
            tenant = %alert.tenant_id,
            seal_id = %alert.metadata.seal_id,
            usage_id = %alert.metadata.usage_id,
            severity = ?alert.severity,
            kind = ?alert.kind,
            "{}: {}",
            alert.title,
            alert.description
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record_change(&self, record: AuditRecord) -> SealResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: RwLock<Vec<AnomalyAlert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<AnomalyAlert> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn publish_alert(&self, alert: &AnomalyAlert) -> SealResult<()> {
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }
}
