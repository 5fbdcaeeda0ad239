//! Usage Validator & Anomaly Detector
//!
//! Rules inspect a recorded usage against its seal and report anomalies.
//! The validator runs every rule; anomalies are independent and may co-occur.

use chrono::{DateTime, Utc};

use crate::model::{AlertMetadata, AnomalyAlert, AnomalyKind, Seal, SealUsage};

/// What a rule reports before it is turned into an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub description: String,
}

/// Usage rule trait - produces at most one anomaly
pub trait UsageRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, seal: &Seal, at: DateTime<Utc>) -> Option<Anomaly>;
}

// --- Concrete Rules ---

pub struct DisabledSealRule;

impl UsageRule for DisabledSealRule {
    fn name(&self) -> &'static str { "disabled_seal" }

    fn check(&self, seal: &Seal, _at: DateTime<Utc>) -> Option<Anomaly> {
        if seal.is_active {
            return None;
        }
        Some(Anomaly {
            kind: AnomalyKind::DisabledSealUsed,
            description: format!("Seal \"{}\" is disabled but was applied to a document", seal.label),
        })
    }
}

pub struct ExpiredSealRule;

impl UsageRule for ExpiredSealRule {
    fn name(&self) -> &'static str { "expired_seal" }

    fn check(&self, seal: &Seal, at: DateTime<Utc>) -> Option<Anomaly> {
        let valid_to = seal.valid_to?;
        if at <= valid_to {
            return None;
        }
        Some(Anomaly {
            kind: AnomalyKind::ExpiredSealUsed,
            description: format!(
                "Seal \"{}\" has expired since {} but was used at {}",
                seal.label,
                valid_to.to_rfc3339(),
                at.to_rfc3339()
            ),
        })
    }
}

pub struct PrematureSealRule;

impl UsageRule for PrematureSealRule {
    fn name(&self) -> &'static str { "premature_seal" }

    fn check(&self, seal: &Seal, at: DateTime<Utc>) -> Option<Anomaly> {
        let valid_from = seal.valid_from?;
        if at >= valid_from {
            return None;
        }
        Some(Anomaly {
            kind: AnomalyKind::PrematureSealUsed,
            description: format!(
                "Seal \"{}\" is not valid until {} but was used at {}",
                seal.label,
                valid_from.to_rfc3339(),
                at.to_rfc3339()
            ),
        })
    }
}

/// Runs every rule over a usage and builds the resulting alerts.
pub struct UsageValidator {
    rules: Vec<Box<dyn UsageRule>>,
}

impl UsageValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(DisabledSealRule),
                Box::new(ExpiredSealRule),
                Box::new(PrematureSealRule),
            ],
        }
    }

    /// Anomalies for a usage of `seal` at its recorded time, in rule order.
    pub fn evaluate(&self, seal: &Seal, usage: &SealUsage) -> Vec<AnomalyAlert> {
        self.rules
            .iter()
            .filter_map(|rule| rule.check(seal, usage.used_at))
            .map(|anomaly| AnomalyAlert {
                tenant_id: seal.tenant_id,
                academic_year_id: usage.academic_year_id,
                kind: anomaly.kind,
                severity: anomaly.kind.severity(),
                title: anomaly.kind.title().to_string(),
                description: anomaly.description,
                metadata: AlertMetadata {
                    seal_id: seal.id,
                    seal_label: seal.label.clone(),
                    usage_id: usage.id,
                    seal_version_id: usage.seal_version_id,
                    document_type: usage.document_type.clone(),
                    document_id: usage.document_id.clone(),
                },
            })
            .collect()
    }
}

impl Default for UsageValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SealType, Severity};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn seal() -> Seal {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Seal {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            academic_year_id: Uuid::new_v4(),
            seal_type: SealType::Institutional,
            label: "Cachet Direction".into(),
            role: None,
            holder_name: None,
            holder_title: None,
            is_active: true,
            valid_from: Some(created),
            valid_to: Some(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()),
            created_at: created,
            updated_at: created,
        }
    }

    fn usage_at(seal: &Seal, at: DateTime<Utc>) -> SealUsage {
        SealUsage {
            id: Uuid::new_v4(),
            tenant_id: seal.tenant_id,
            seal_version_id: Uuid::new_v4(),
            document_type: "bulletin".into(),
            document_id: "B-2024-001".into(),
            used_by: Uuid::new_v4(),
            school_id: seal.school_id,
            academic_year_id: seal.academic_year_id,
            used_at: at,
        }
    }

    fn kinds(seal: &Seal, at: DateTime<Utc>) -> Vec<AnomalyKind> {
        UsageValidator::new()
            .evaluate(seal, &usage_at(seal, at))
            .into_iter()
            .map(|a| a.kind)
            .collect()
    }

    #[test]
    fn test_boundaries_are_valid() {
        let s = seal();
        assert!(kinds(&s, s.valid_from.unwrap()).is_empty());
        assert!(kinds(&s, s.valid_to.unwrap()).is_empty());
    }

    #[test]
    fn test_one_nanosecond_outside() {
        let s = seal();
        let before = s.valid_from.unwrap() - Duration::nanoseconds(1);
        let after = s.valid_to.unwrap() + Duration::nanoseconds(1);

        let alerts = UsageValidator::new().evaluate(&s, &usage_at(&s, before));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AnomalyKind::PrematureSealUsed);
        assert_eq!(alerts[0].severity, Severity::Warning);

        let alerts = UsageValidator::new().evaluate(&s, &usage_at(&s, after));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AnomalyKind::ExpiredSealUsed);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_conditions_co_occur() {
        let mut s = seal();
        s.is_active = false;
        let after = s.valid_to.unwrap() + Duration::days(2);
        assert_eq!(
            kinds(&s, after),
            vec![AnomalyKind::DisabledSealUsed, AnomalyKind::ExpiredSealUsed]
        );
    }

    #[test]
    fn test_open_window_never_flags_time() {
        let mut s = seal();
        s.valid_from = None;
        s.valid_to = None;
        let far = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        assert!(kinds(&s, far).is_empty());
    }

    #[test]
    fn test_alert_metadata() {
        let mut s = seal();
        s.is_active = false;
        let usage = usage_at(&s, s.valid_from.unwrap());
        let alerts = UsageValidator::new().evaluate(&s, &usage);
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.tenant_id, s.tenant_id);
        assert_eq!(alert.metadata.seal_id, s.id);
        assert_eq!(alert.metadata.usage_id, usage.id);
        assert_eq!(alert.metadata.document_id, "B-2024-001");
        assert_eq!(alert.title, "Disabled seal used");
    }
}
