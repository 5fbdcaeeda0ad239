//! Seal Entity Graph - Seal → SealVersion → SealUsage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{SealError, SealResult};

pub type SealId = Uuid;
pub type VersionId = Uuid;
pub type UsageId = Uuid;
pub type TenantId = Uuid;
pub type UserId = Uuid;

/// Acting identity attached to every exposed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id, ip: None, user_agent: None }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SealType {
    Institutional,
    Nominative,
    Transactional,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SealShape {
    #[default]
    Round,
    Oval,
    Rectangular,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    #[default]
    Solid,
    Double,
    Dashed,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
    Pdf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Embedded symbol drawn on the inner ring of the seal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InnerSymbol {
    Star { size: f64 },
    Line,
    Dot { size: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColorPair {
    #[serde(default = "default_primary_color")]
    pub primary: String,
    #[serde(default = "default_secondary_color")]
    pub secondary: String,
}

fn default_primary_color() -> String { "#1a237e".to_string() }
fn default_secondary_color() -> String { "#3949ab".to_string() }

impl Default for ColorPair {
    fn default() -> Self {
        Self {
            primary: default_primary_color(),
            secondary: default_secondary_color(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BorderSpec {
    #[serde(default)]
    pub style: BorderStyle,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
}

fn default_thickness() -> f64 { 2.0 }

impl Default for BorderSpec {
    fn default() -> Self {
        Self { style: BorderStyle::Solid, thickness: default_thickness() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FontSizes {
    #[serde(default = "default_external_size")]
    pub external: f64,
    #[serde(default = "default_central_size")]
    pub central: f64,
    #[serde(default = "default_name_size")]
    pub name: f64,
    #[serde(default = "default_title_size")]
    pub title: f64,
}

fn default_external_size() -> f64 { 10.0 }
fn default_central_size() -> f64 { 14.0 }
fn default_name_size() -> f64 { 12.0 }
fn default_title_size() -> f64 { 10.0 }

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            external: default_external_size(),
            central: default_central_size(),
            name: default_name_size(),
            title: default_title_size(),
        }
    }
}

/// Which strings go where on the seal face.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextLayout {
    #[serde(default)]
    pub external: Option<String>,
    #[serde(default)]
    pub central: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub font_sizes: FontSizes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    #[serde(default = "default_font_family")]
    pub family: String,
    #[serde(default = "default_font_weight")]
    pub weight: String,
}

fn default_font_family() -> String { "Arial, sans-serif".to_string() }
fn default_font_weight() -> String { "bold".to_string() }

impl Default for FontSpec {
    fn default() -> Self {
        Self { family: default_font_family(), weight: default_font_weight() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYear {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Identity of a stamp definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Seal {
    pub id: SealId,
    pub tenant_id: TenantId,
    pub school_id: Uuid,
    pub academic_year_id: Uuid,
    #[serde(rename = "type")]
    pub seal_type: SealType,
    pub label: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub holder_title: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool { true }

impl Seal {
    /// Fails when `t` lies outside the inclusive `[valid_from, valid_to]` window.
    pub fn ensure_within_window(&self, t: DateTime<Utc>) -> SealResult<()> {
        if let Some(from) = self.valid_from {
            if t < from {
                return Err(SealError::InvalidState(format!(
                    "seal {} is not valid until {}",
                    self.id,
                    from.to_rfc3339()
                )));
            }
        }
        if let Some(to) = self.valid_to {
            if t > to {
                return Err(SealError::InvalidState(format!(
                    "seal {} has expired since {}",
                    self.id,
                    to.to_rfc3339()
                )));
            }
        }
        Ok(())
    }

    /// Active and inside its validity window at `t`.
    pub fn ensure_usable_at(&self, t: DateTime<Utc>) -> SealResult<()> {
        if !self.is_active {
            return Err(SealError::InvalidState(format!("seal {} is inactive", self.id)));
        }
        self.ensure_within_window(t)
    }
}

pub(crate) fn ensure_window_ordered(
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
) -> SealResult<()> {
    match (valid_from, valid_to) {
        (Some(from), Some(to)) if from > to => Err(SealError::InvalidState(format!(
            "validity window is inverted: {} is after {}",
            from.to_rfc3339(),
            to.to_rfc3339()
        ))),
        _ => Ok(()),
    }
}

/// Input for `create_seal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSeal {
    pub school_id: Uuid,
    pub academic_year_id: Uuid,
    #[serde(rename = "type")]
    pub seal_type: SealType,
    pub label: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub holder_title: Option<String>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
}

/// Partial update. The seal type is deliberately absent.
///
/// Nullable fields distinguish "absent" (keep) from `null` (clear).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealPatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub role: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub holder_title: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<Option<DateTime<Utc>>>,
}

/// A field that is present in the payload, possibly as `null`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Client request for a new visual definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRequest {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub shape: SealShape,
    #[serde(default)]
    pub colors: ColorPair,
    #[serde(default)]
    pub border: BorderSpec,
    #[serde(default)]
    pub text: TextLayout,
    #[serde(default)]
    pub font: FontSpec,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub opacity: Option<u8>,
    #[serde(default)]
    pub symbols: Vec<InnerSymbol>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Fully resolved layout input: seal identity plus visual parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SealVersionSpec {
    #[serde(rename = "type")]
    pub seal_type: SealType,
    pub label: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub holder_title: Option<String>,
    #[serde(default)]
    pub shape: SealShape,
    #[serde(default)]
    pub colors: ColorPair,
    #[serde(default)]
    pub border: BorderSpec,
    #[serde(default)]
    pub text: TextLayout,
    #[serde(default)]
    pub font: FontSpec,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    #[serde(default)]
    pub symbols: Vec<InnerSymbol>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

fn default_opacity() -> u8 { 100 }

impl SealVersionSpec {
    pub fn resolve(seal: &Seal, request: &VersionRequest) -> Self {
        Self {
            seal_type: seal.seal_type,
            label: seal.label.clone(),
            role: seal.role.clone(),
            holder_name: seal.holder_name.clone(),
            holder_title: seal.holder_title.clone(),
            shape: request.shape,
            colors: request.colors.clone(),
            border: request.border.clone(),
            text: request.text.clone(),
            font: request.font.clone(),
            rotation: request.rotation.unwrap_or(0.0),
            opacity: request.opacity.unwrap_or_else(default_opacity),
            symbols: request.symbols.clone(),
            logo: request.logo.clone(),
            signature: request.signature.clone(),
        }
    }

    /// Rejects parameters the layout engine cannot draw inside `canvas_radius`.
    pub fn validate(&self, canvas_radius: f64) -> SealResult<()> {
        if self.opacity > 100 {
            return Err(SealError::InvalidState(format!(
                "opacity must be between 0 and 100, got {}",
                self.opacity
            )));
        }
        if !self.rotation.is_finite() {
            return Err(SealError::InvalidState("rotation must be a finite number".into()));
        }
        let thickness = self.border.thickness;
        if !(thickness > 0.0 && thickness < canvas_radius) {
            return Err(SealError::InvalidState(format!(
                "border thickness must be in (0, {}), got {}",
                canvas_radius, thickness
            )));
        }
        let sizes = &self.text.font_sizes;
        for (role, size) in [
            ("external", sizes.external),
            ("central", sizes.central),
            ("name", sizes.name),
            ("title", sizes.title),
        ] {
            if !(size.is_finite() && size > 0.0) {
                return Err(SealError::InvalidState(format!(
                    "{} font size must be positive, got {}",
                    role, size
                )));
            }
        }
        for symbol in &self.symbols {
            if let InnerSymbol::Star { size } | InnerSymbol::Dot { size } = symbol {
                if !(size.is_finite() && *size > 0.0) {
                    return Err(SealError::InvalidState(format!(
                        "symbol size must be positive, got {}",
                        size
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One immutable rendered definition of a seal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SealVersion {
    pub id: VersionId,
    pub seal_id: SealId,
    pub version_number: u32,
    pub format: OutputFormat,
    pub spec: SealVersionSpec,
    pub file_path: String,
    pub file_url: String,
    pub spec_hash: String,
    pub content_hash: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Relative artifact path `{seal_id}/seal-v{n}.{ext}`.
pub fn artifact_path(seal_id: SealId, version_number: u32, format: OutputFormat) -> String {
    format!("{}/seal-v{}.{}", seal_id, version_number, format.extension())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    pub seal_version_id: VersionId,
    pub document_type: String,
    pub document_id: String,
    #[serde(default)]
    pub school_id: Option<Uuid>,
    #[serde(default)]
    pub academic_year_id: Option<Uuid>,
}

/// A seal version applied to a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SealUsage {
    pub id: UsageId,
    pub tenant_id: TenantId,
    pub seal_version_id: VersionId,
    pub document_type: String,
    pub document_id: String,
    pub used_by: UserId,
    pub school_id: Uuid,
    pub academic_year_id: Uuid,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuery {
    #[serde(default)]
    pub seal_id: Option<SealId>,
    #[serde(default)]
    pub seal_version_id: Option<VersionId>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub academic_year_id: Option<Uuid>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    DisabledSealUsed,
    ExpiredSealUsed,
    PrematureSealUsed,
}

impl AnomalyKind {
    pub fn severity(&self) -> Severity {
        match self {
            AnomalyKind::DisabledSealUsed | AnomalyKind::ExpiredSealUsed => Severity::Critical,
            AnomalyKind::PrematureSealUsed => Severity::Warning,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AnomalyKind::DisabledSealUsed => "Disabled seal used",
            AnomalyKind::ExpiredSealUsed => "Expired seal used",
            AnomalyKind::PrematureSealUsed => "Seal used before its validity period",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertMetadata {
    pub seal_id: SealId,
    pub seal_label: String,
    pub usage_id: UsageId,
    pub seal_version_id: VersionId,
    pub document_type: String,
    pub document_id: String,
}

/// Derived record produced when a usage violates the seal's state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyAlert {
    pub tenant_id: TenantId,
    pub academic_year_id: Uuid,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub metadata: AlertMetadata,
}

/// Result of `record_usage`: the stored fact plus any anomalies it raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutcome {
    pub usage: SealUsage,
    pub alerts: Vec<AnomalyAlert>,
}

impl UsageOutcome {
    pub fn is_valid(&self) -> bool {
        self.alerts.is_empty()
    }
}
