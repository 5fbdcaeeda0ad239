//! SealForge Core - Institutional Seal Engine
//!
//! # The Laws
//! 1. SVG Is Truth
//! 2. Versions Are Immutable
//! 3. Deterministic Layout
//! 4. Usage Is Always Recorded, Anomalies Are Always Evaluated

pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod hashing;
pub mod layout;
pub mod lifecycle;
pub mod model;
pub mod sinks;
pub mod storage;
pub mod svg;
pub mod usage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SealConfig;
pub use error::{SealError, SealResult};
pub use export::{ExportPipeline, RenderBackend, RenderSession, SessionExporter, SvgOnlyExporter};
pub use hashing::{canonical_json, compute_content_hash, compute_spec_hash};
pub use layout::{compose, Drawing, LayoutConfig, Primitive};
pub use lifecycle::{SealService, SealServiceBuilder};
pub use model::{
    Actor, AnomalyAlert, AnomalyKind, NewSeal, Seal, SealPatch, SealType, SealUsage, SealVersion,
    SealVersionSpec, Severity, UsageOutcome, UsageQuery, UsageRequest, VersionRequest,
};
pub use sinks::{AlertSink, AuditSink};
pub use storage::{ArtifactStore, SealRepository};
pub use svg::{render_seal, to_svg};
pub use usage::{UsageRule, UsageValidator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
