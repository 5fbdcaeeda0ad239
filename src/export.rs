//! Export Pipeline
//!
//! Converts SVG markup into raster/PDF through a headless renderer. The
//! renderer session is always closed, whether the render succeeds, fails
//! or times out. Opening, rendering and closing are each bounded by the
//! export timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{SealError, SealResult};
use crate::model::OutputFormat;

#[async_trait]
pub trait ExportPipeline: Send + Sync {
    /// Produce the final file bytes for `format`. SVG returns the markup itself.
    async fn render(&self, markup: &str, format: OutputFormat) -> SealResult<Vec<u8>>;
}

/// One acquired renderer handle (e.g. a headless browser page).
#[async_trait]
pub trait RenderSession: Send {
    async fn render(&mut self, markup: &str, format: OutputFormat) -> SealResult<Vec<u8>>;

    async fn close(self: Box<Self>) -> SealResult<()>;
}

#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn open_session(&self) -> SealResult<Box<dyn RenderSession>>;
}

#[async_trait]
impl<B: RenderBackend + ?Sized> RenderBackend for Arc<B> {
    async fn open_session(&self) -> SealResult<Box<dyn RenderSession>> {
        (**self).open_session().await
    }
}

/// Runs each export in a fresh session bounded by `timeout`.
pub struct SessionExporter<B> {
    backend: B,
    timeout: Duration,
}

impl<B: RenderBackend> SessionExporter<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }
}

#[async_trait]
impl<B: RenderBackend> ExportPipeline for SessionExporter<B> {
    async fn render(&self, markup: &str, format: OutputFormat) -> SealResult<Vec<u8>> {
        if format == OutputFormat::Svg {
            return Ok(markup.as_bytes().to_vec());
        }

        let mut session = match tokio::time::timeout(self.timeout, self.backend.open_session()).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                return Err(SealError::RenderingFailure(format!("could not open render session: {}", e)))
            }
            Err(_) => {
                return Err(SealError::RenderingFailure(format!(
                    "opening a render session timed out after {:?}",
                    self.timeout
                )))
            }
        };

        let outcome = tokio::time::timeout(self.timeout, session.render(markup, format)).await;

        match tokio::time::timeout(self.timeout, session.close()).await {
            Ok(Ok(())) => debug!(format = ?format, "render session closed"),
            Ok(Err(e)) => warn!(error = %e, "failed to close render session"),
            Err(_) => warn!(timeout = ?self.timeout, "render session close timed out, session dropped"),
        }

        match outcome {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(SealError::RenderingFailure(e.to_string())),
            Err(_) => Err(SealError::RenderingFailure(format!(
                "{} export timed out after {:?}",
                format.extension(),
                self.timeout
            ))),
        }
    }
}

/// Exporter for deployments without a headless renderer: SVG only.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgOnlyExporter;

#[async_trait]
impl ExportPipeline for SvgOnlyExporter {
    async fn render(&self, markup: &str, format: OutputFormat) -> SealResult<Vec<u8>> {
        match format {
            OutputFormat::Svg => Ok(markup.as_bytes().to_vec()),
            OutputFormat::Png | OutputFormat::Pdf => Err(SealError::RenderingFailure(format!(
                "no render backend configured for {}",
                format.extension()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        Fail,
        Hang,
        HangOnOpen,
        HangOnClose,
    }

    #[derive(Clone)]
    struct FakeBackend {
        behaviour: Behaviour,
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    struct FakeSession {
        behaviour: Behaviour,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RenderSession for FakeSession {
        async fn render(&mut self, markup: &str, format: OutputFormat) -> SealResult<Vec<u8>> {
            match self.behaviour {
                Behaviour::Fail => Err(SealError::RenderingFailure("page crashed".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(vec![])
                }
                _ => Ok(format!("{}:{}", format.extension(), markup.len()).into_bytes()),
            }
        }

        async fn close(self: Box<Self>) -> SealResult<()> {
            if let Behaviour::HangOnClose = self.behaviour {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl RenderBackend for FakeBackend {
        async fn open_session(&self) -> SealResult<Box<dyn RenderSession>> {
            if let Behaviour::HangOnOpen = self.behaviour {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                behaviour: self.behaviour,
                closed: self.closed.clone(),
            }))
        }
    }

    fn exporter(behaviour: Behaviour) -> (SessionExporter<FakeBackend>, FakeBackend) {
        let backend = FakeBackend {
            behaviour,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        };
        (SessionExporter::new(backend.clone(), Duration::from_millis(50)), backend)
    }

    #[tokio::test]
    async fn test_svg_bypasses_backend() {
        let (exporter, backend) = exporter(Behaviour::Succeed);
        let bytes = exporter.render("<svg/>", OutputFormat::Svg).await.unwrap();
        assert_eq!(bytes, b"<svg/>");
        assert_eq!(backend.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_session_closed_on_success() {
        let (exporter, backend) = exporter(Behaviour::Succeed);
        let bytes = exporter.render("<svg/>", OutputFormat::Png).await.unwrap();
        assert_eq!(bytes, b"png:6");
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_closed_on_failure() {
        let (exporter, backend) = exporter(Behaviour::Fail);
        let err = exporter.render("<svg/>", OutputFormat::Pdf).await.unwrap_err();
        assert!(matches!(err, SealError::RenderingFailure(_)));
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_closed_on_timeout() {
        let (exporter, backend) = exporter(Behaviour::Hang);
        let err = exporter.render("<svg/>", OutputFormat::Png).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hung_open_is_bounded() {
        let (exporter, backend) = exporter(Behaviour::HangOnOpen);
        let started = std::time::Instant::now();
        let err = exporter.render("<svg/>", OutputFormat::Png).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, SealError::RenderingFailure(_)));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(backend.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hung_close_keeps_rendered_bytes() {
        let (exporter, backend) = exporter(Behaviour::HangOnClose);
        let started = std::time::Instant::now();
        let bytes = exporter.render("<svg/>", OutputFormat::Pdf).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(bytes, b"pdf:6");
        assert_eq!(backend.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shared_backend_handle() {
        let backend = FakeBackend {
            behaviour: Behaviour::Succeed,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        };
        let shared: Arc<dyn RenderBackend> = Arc::new(backend.clone());
        let exporter = SessionExporter::new(shared, Duration::from_secs(1));
        assert!(exporter.render("<svg/>", OutputFormat::Png).await.is_ok());
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_svg_only_exporter() {
        assert!(SvgOnlyExporter.render("<svg/>", OutputFormat::Svg).await.is_ok());
        assert!(SvgOnlyExporter.render("<svg/>", OutputFormat::Png).await.is_err());
    }
}
