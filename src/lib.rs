//! # sheet-report
//!
//! Upload `.xlsx` workbooks, aggregate columns per sheet, and render the
//! result as a PDF report, a PNG bar chart, or both in one document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .xlsx upload
//!  │
//!  ├─ 1. Ingest     validate name, parse with calamine, store atomically
//!  ├─ 2. Aggregate  sum / average per column → Report
//!  │
//!  │   Report (sheet → column → value, insertion-ordered)
//!  │
//!  ├─ 3a. PDF       fixed text layout → lopdf
//!  ├─ 3b. Chart     per-sheet totals → imageproc bar chart → PNG
//!  └─ 3c. Detailed  3a text + 3b chart embedded below it
//! ```
//!
//! Stages are stateless: the only thing that survives a request is the
//! workbook file in the upload directory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheet_report::{AggregationRequest, ReportService, ServiceConfig, SheetInstruction};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ReportService::new(ServiceConfig::default())?;
//!
//!     let bytes = std::fs::read("data.xlsx")?;
//!     let summary = service.ingest(Some("data.xlsx".into()), bytes).await?;
//!     println!("{} sheets", summary.num_sheets);
//!
//!     let request = AggregationRequest::new(
//!         "data.xlsx",
//!         vec![SheetInstruction::new("Sheet1", "sum", ["A", "B"])],
//!     );
//!     let report = service.aggregate(request).await?;
//!     let pdf = service.render_pdf(report).await?;
//!     std::fs::write(pdf.filename, &pdf.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sheet-report` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{ErrorKind, ReportError};
pub use report::{
    AggregationRequest, ChartRequest, IngestSummary, Operation, RenderedArtifact, Report,
    SheetInstruction, SheetValues,
};
pub use server::{build_router, serve, start_server};
pub use service::{inspect, ReportService};
