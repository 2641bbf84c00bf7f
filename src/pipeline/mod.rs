//! Pipeline stages for spreadsheet reports.
//!
//! Each submodule implements exactly one transformation step and is a plain
//! blocking function of its inputs. [`crate::service::ReportService`] is the
//! only place that knows about async; it moves every stage onto the blocking
//! pool.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ ingest ──▶ aggregate ──▶ Report ──┬──▶ layout ──▶ pdf
//! (bytes)   (.xlsx)    (calamine)              └──▶ chart ──▶ encode
//!                                                   (imageproc) (PNG)
//! ```
//!
//! 1. [`ingest`]: validate the filename, parse the workbook, store it
//! 2. [`aggregate`]: read sheets into tables and compute sum/average
//! 3. [`layout`]: place report text lines on PDF pages
//! 4. [`pdf`]: write laid-out text (and optionally the chart) with lopdf
//! 5. [`chart`]: draw the per-sheet bar chart
//! 6. [`encode`]: PNG-encode the chart raster

pub mod aggregate;
pub mod chart;
pub mod encode;
pub mod ingest;
pub mod layout;
pub mod pdf;
