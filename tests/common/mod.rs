//! Shared helpers for integration tests: in-memory `.xlsx` fixtures and a
//! live server on an ephemeral port.

#![allow(dead_code)]

use sheet_report::{ReportService, ServiceConfig};
use std::io::{Cursor, Write};
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use zip::write::SimpleFileOptions;

// ── Workbook fixtures ────────────────────────────────────────────────────────

/// One worksheet cell.
#[derive(Debug, Clone)]
pub enum Cell {
    Text(&'static str),
    Num(f64),
    Empty,
}

pub use Cell::{Empty, Num, Text};

/// Builder for a minimal but valid `.xlsx` file.
#[derive(Debug, Default)]
pub struct Workbook {
    sheets: Vec<(String, Vec<Vec<Cell>>)>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet; the first row is the header.
    pub fn sheet(mut self, name: &str, rows: Vec<Vec<Cell>>) -> Self {
        self.sheets.push((name.to_string(), rows));
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let mut add = |name: &str, body: String| {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        add("[Content_Types].xml", self.content_types());
        add("_rels/.rels", ROOT_RELS.to_string());
        add("xl/workbook.xml", self.workbook_xml());
        add("xl/_rels/workbook.xml.rels", self.workbook_rels());
        for (i, (_, rows)) in self.sheets.iter().enumerate() {
            add(&format!("xl/worksheets/sheet{}.xml", i + 1), sheet_xml(rows));
        }

        zip.finish().unwrap().into_inner()
    }

    fn content_types(&self) -> String {
        let overrides: String = (1..=self.sheets.len())
            .map(|i| {
                format!(
                    r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
        )
    }

    fn workbook_xml(&self) -> String {
        let sheets: String = self
            .sheets
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                    name,
                    i + 1,
                    i + 1
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheets}</sheets></workbook>"#
        )
    }

    fn workbook_rels(&self) -> String {
        let rels: String = (1..=self.sheets.len())
            .map(|i| {
                format!(
                    r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        )
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

fn column_letter(idx: usize) -> char {
    (b'A' + idx as u8) as char
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut body = String::new();
    for (r, row) in rows.iter().enumerate() {
        body.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, cell) in row.iter().enumerate() {
            let at = format!("{}{}", column_letter(c), r + 1);
            match cell {
                Cell::Text(s) => body.push_str(&format!(
                    r#"<c r="{at}" t="inlineStr"><is><t>{s}</t></is></c>"#
                )),
                Cell::Num(v) => body.push_str(&format!(r#"<c r="{at}"><v>{v}</v></c>"#)),
                Cell::Empty => {}
            }
        }
        body.push_str("</row>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{body}</sheetData></worksheet>"#
    )
}

/// Two sheets: `Sheet1` with A = [1, 2, 3] and B = [10, 20, 30], `Sheet2`
/// with A = [4, 6] and a text column.
pub fn sample_workbook() -> Vec<u8> {
    Workbook::new()
        .sheet(
            "Sheet1",
            vec![
                vec![Text("A"), Text("B")],
                vec![Num(1.0), Num(10.0)],
                vec![Num(2.0), Num(20.0)],
                vec![Num(3.0), Num(30.0)],
            ],
        )
        .sheet(
            "Sheet2",
            vec![
                vec![Text("A"), Text("Label")],
                vec![Num(4.0), Text("x")],
                vec![Num(6.0), Empty],
            ],
        )
        .to_bytes()
}

// ── Live server ──────────────────────────────────────────────────────────────

/// A running server plus the temp directory it stores uploads in.
pub struct TestServer {
    pub addr: SocketAddr,
    pub uploads: TempDir,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|b| b).await
    }

    pub async fn start_with(
        configure: impl FnOnce(sheet_report::ServiceConfigBuilder) -> sheet_report::ServiceConfigBuilder,
    ) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let uploads = tempfile::tempdir().unwrap();
        let config = configure(ServiceConfig::builder().upload_dir(uploads.path()))
            .build()
            .unwrap();
        let service = ReportService::new(config).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            sheet_report::serve(listener, service)
                .await
                .expect("server failed");
        });

        Self {
            addr,
            uploads,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Upload `bytes` as the `file` part under `filename`.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        reqwest::Client::new()
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
