//! The report service: one entry point per pipeline stage.
//!
//! [`ReportService`] owns the configuration and the chart font and is cheap
//! to clone, so it doubles as the HTTP router state. Every method takes a
//! request, runs the blocking stage on tokio's blocking pool and returns the
//! result or a [`ReportError`]; nothing is cached between calls.

use crate::config::ServiceConfig;
use crate::error::ReportError;
use crate::pipeline::{aggregate, chart, encode, ingest, layout, pdf};
use crate::report::{AggregationRequest, IngestSummary, RenderedArtifact, Report};
use ab_glyph::FontVec;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Title of the plain report document.
pub const REPORT_TITLE: &str = "Report";
/// Title of the report document with the embedded chart.
pub const DETAILED_REPORT_TITLE: &str = "Detailed Report";

/// Size of the embedded chart in the detailed report: 6×4 in.
const DETAILED_CHART_WIDTH: f32 = 432.0;
const DETAILED_CHART_HEIGHT: f32 = 288.0;

struct Inner {
    config: ServiceConfig,
    font: FontVec,
}

/// Ingest, aggregate and render spreadsheet reports.
#[derive(Clone)]
pub struct ReportService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ReportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportService")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl ReportService {
    /// Create the service, making sure the upload directory exists.
    pub fn new(config: ServiceConfig) -> Result<Self, ReportError> {
        std::fs::create_dir_all(&config.upload_dir).map_err(|e| {
            ReportError::UploadWriteFailed {
                path: config.upload_dir.clone(),
                source: e,
            }
        })?;

        let font = chart::load_font(config.chart_font.as_deref())?;

        info!(
            "Report service ready: uploads in {}, paginate={}, debug={}",
            config.upload_dir.display(),
            config.paginate,
            config.debug
        );
        Ok(Self {
            inner: Arc::new(Inner { config, font }),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Validate and store an uploaded workbook.
    ///
    /// `filename` is `None` when the request had no file part at all.
    pub async fn ingest(
        &self,
        filename: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<IngestSummary, ReportError> {
        let start = Instant::now();
        let upload_dir = self.inner.config.upload_dir.clone();
        let summary = run_blocking("Ingest", move || {
            ingest::ingest(&upload_dir, filename.as_deref(), &bytes)
        })
        .await?;
        info!(
            "Ingest of '{}' done in {}ms",
            summary.filename,
            start.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Run an aggregation request against a stored workbook.
    pub async fn aggregate(&self, request: AggregationRequest) -> Result<Report, ReportError> {
        let (path, instructions) = request.validate()?;
        let start = Instant::now();
        let upload_dir = self.inner.config.upload_dir.clone();

        let report = run_blocking("Aggregate", move || {
            if instructions.is_empty() {
                return Ok(Report::new());
            }
            let path = aggregate::resolve_workbook_path(&upload_dir, &path)?;
            aggregate::aggregate(&path, &instructions)
        })
        .await?;

        info!(
            "Aggregate produced {} sheets in {}ms",
            report.len(),
            start.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Render `report` as a text-only PDF.
    pub async fn render_pdf(&self, report: Report) -> Result<RenderedArtifact, ReportError> {
        let start = Instant::now();
        let paginate = self.inner.config.paginate;
        let bytes = run_blocking("PDF render", move || {
            let layout = layout::layout_report(REPORT_TITLE, &report, paginate);
            pdf::write_pdf(&layout, None)
        })
        .await?;
        info!(
            "Rendered report PDF ({} bytes) in {}ms",
            bytes.len(),
            start.elapsed().as_millis()
        );
        Ok(RenderedArtifact::pdf(bytes, "report.pdf"))
    }

    /// Render the per-sheet totals of `report` as a PNG bar chart.
    pub async fn render_chart(&self, report: Report) -> Result<RenderedArtifact, ReportError> {
        let start = Instant::now();
        let inner = Arc::clone(&self.inner);
        let bytes = run_blocking("Chart render", move || {
            let img = chart::draw_bar_chart(&report.sheet_totals(), Some(&inner.font));
            encode::encode_png(&img).map_err(|e| ReportError::ChartRender(e.to_string()))
        })
        .await?;
        info!(
            "Rendered chart PNG ({} bytes) in {}ms",
            bytes.len(),
            start.elapsed().as_millis()
        );
        Ok(RenderedArtifact::png(bytes, "graph.png"))
    }

    /// Render `report` as a PDF with the bar chart embedded below the text.
    pub async fn render_detailed_pdf(
        &self,
        report: Report,
    ) -> Result<RenderedArtifact, ReportError> {
        let start = Instant::now();
        let inner = Arc::clone(&self.inner);
        let bytes = run_blocking("Detailed PDF render", move || {
            let img = chart::draw_bar_chart(&report.sheet_totals(), Some(&inner.font));
            let mut layout =
                layout::layout_report(DETAILED_REPORT_TITLE, &report, inner.config.paginate);
            let block = layout.reserve_block(
                layout::SHEET_X,
                DETAILED_CHART_WIDTH,
                DETAILED_CHART_HEIGHT,
            );
            debug!(
                "Chart block on page {} at y={}..{}",
                block.page + 1,
                block.y,
                block.y + block.height
            );
            pdf::write_pdf(&layout, Some((&block, &img)))
        })
        .await?;
        info!(
            "Rendered detailed PDF ({} bytes) in {}ms",
            bytes.len(),
            start.elapsed().as_millis()
        );
        Ok(RenderedArtifact::pdf(bytes, "detailed_report.pdf"))
    }
}

/// Summarise a workbook on disk without storing it.
///
/// Needs no service and no upload directory.
pub async fn inspect(path: impl Into<PathBuf>) -> Result<IngestSummary, ReportError> {
    let path = path.into();
    run_blocking("Inspect", move || ingest::inspect(Path::new(&path))).await
}

async fn run_blocking<T, F>(stage: &'static str, f: F) -> Result<T, ReportError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ReportError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ReportError::Internal(format!("{} task panicked: {}", stage, e)))?
}
