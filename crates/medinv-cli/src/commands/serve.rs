//! Serve command - a small web UI over the invoice store.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use clap::Args;
use console::style;
use serde_json::json;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{info, warn};

use medinv_core::archive::bundle_bytes;
use medinv_core::error::StorageError;
use medinv_core::extract::rules::format_amount;
use medinv_core::models::config::MedinvConfig;
use medinv_core::models::invoice::StoredInvoice;
use medinv_core::store::{DocumentStore, FsDocumentStore};
use medinv_core::{BatchProcessor, BatchReport};

use super::Globals;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (default: server.bind from the config)
    #[arg(short, long)]
    bind: Option<String>,
}

/// Shared by every request of one server process. The store lock is async so
/// a long upload never parks a runtime worker, and it does not poison.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<FsDocumentStore>>,
    config: Arc<MedinvConfig>,
}

impl AppState {
    pub fn new(store: FsDocumentStore, config: MedinvConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            config: Arc::new(config),
        }
    }

    async fn store(&self) -> MutexGuard<'_, FsDocumentStore> {
        self.store.lock().await
    }

    /// Lock held across a blocking task.
    async fn store_owned(&self) -> OwnedMutexGuard<FsDocumentStore> {
        self.store.clone().lock_owned().await
    }
}

pub async fn run(args: ServeArgs, globals: &Globals) -> anyhow::Result<()> {
    let config = globals.load_config()?;
    let store = globals.open_store(&config)?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let app = router(AppState::new(store, config));
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    println!(
        "{} Serving invoices on http://{}",
        style("✓").green(),
        listener.local_addr()?
    );
    info!("Listening on {}", bind);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let max_upload = state.config.server.max_upload_bytes;
    Router::new()
        .route("/", get(dashboard))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/api/invoices", get(list_invoices))
        .route("/invoices/{file}", get(download_invoice))
        .route("/bundle", get(download_bundle))
        .route("/clear", post(clear_store))
        .with_state(state)
}

fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn storage_error(err: StorageError) -> Response {
    match err {
        StorageError::NotFound(name) => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no invoice named {}", name),
        ),
        other => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            other.to_string(),
        ),
    }
}

async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, Response> {
    let invoices = state.store().await.list().map_err(storage_error)?;
    Ok(Html(render_dashboard(&invoices, &state.config)))
}

async fn list_invoices(State(state): State<AppState>) -> Result<Json<Vec<StoredInvoice>>, Response> {
    let invoices = state.store().await.list().map_err(storage_error)?;
    Ok(Json(invoices))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchReport>, Response> {
    let mut upload: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_upload", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.xlsx").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_upload", e.body_text()))?;
        upload = Some((data.to_vec(), name));
    }

    let Some((data, name)) = upload else {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "missing_file",
            "expected a multipart field named 'file'",
        ));
    };
    info!("Processing upload {} ({} bytes)", name, data.len());

    let mut store = state.store_owned().await;
    let config = state.config.clone();
    let result = tokio::task::spawn_blocking(move || {
        BatchProcessor::from_config(&config)
            .process_bytes(data, Some(name.as_str()), &mut *store)
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| json_error(StatusCode::INTERNAL_SERVER_ERROR, "task_failed", e.to_string()))?;

    match result {
        Ok(report) => {
            info!(
                "Upload stored {} invoice(s), {} problem(s)",
                report.documents.len(),
                report.errors.len()
            );
            Ok(Json(report))
        }
        Err(message) => {
            warn!("Upload rejected: {}", message);
            Err(json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "unreadable_workbook",
                message,
            ))
        }
    }
}

async fn download_invoice(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, Response> {
    let bytes = {
        let store = state.store().await;
        let indexed = store
            .list()
            .map_err(storage_error)?
            .iter()
            .any(|entry| entry.file_name == file);
        if !indexed {
            return Err(storage_error(StorageError::NotFound(file)));
        }
        store.read(&file).map_err(storage_error)?
    };
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn download_bundle(State(state): State<AppState>) -> Result<Response, Response> {
    let store = state.store_owned().await;
    let bytes = tokio::task::spawn_blocking(move || bundle_bytes(&*store))
        .await
        .map_err(|e| json_error(StatusCode::INTERNAL_SERVER_ERROR, "task_failed", e.to_string()))?
        .map_err(|e| json_error(StatusCode::INTERNAL_SERVER_ERROR, "archive_error", e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", state.config.storage.archive_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn clear_store(State(state): State<AppState>) -> Result<Json<serde_json::Value>, Response> {
    let removed = state.store().await.clear().map_err(storage_error)?;
    info!("Cleared {} invoice(s)", removed);
    Ok(Json(json!({ "removed": removed })))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_dashboard(invoices: &[StoredInvoice], config: &MedinvConfig) -> String {
    let mut rows = String::new();
    for inv in invoices {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{} {}</td>\
             <td><a href=\"/invoices/{}\">{}</a></td></tr>\n",
            escape(&inv.id),
            escape(inv.patient_name.as_deref().unwrap_or("-")),
            escape(inv.date.as_deref().unwrap_or("-")),
            format_amount(inv.total, config.render.amount_decimals),
            escape(&inv.currency),
            escape(&inv.file_name),
            escape(&inv.file_name),
        ));
    }
    if invoices.is_empty() {
        rows.push_str("<tr><td colspan=\"5\">No invoices yet.</td></tr>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; }}
th {{ background: #a6192e; color: #fff; }}
td.num {{ text-align: right; }}
</style>
</head>
<body>
<h1>{hospital}</h1>
<h2>{title}</h2>
<form id="upload" action="/upload" method="post" enctype="multipart/form-data">
<input type="file" name="file" accept=".xlsx,.xlsm,.xls,.xlsb,.ods">
<button type="submit">Generate invoices</button>
</form>
<pre id="report"></pre>
<p><a href="/bundle">Download all ({count})</a></p>
<form action="/clear" method="post" onsubmit="return confirm('Delete all invoices?')">
<button type="submit">Clear database</button>
</form>
<table>
<tr><th>Invoice</th><th>Patient</th><th>Date</th><th>Total</th><th>PDF</th></tr>
{rows}</table>
<script>
document.getElementById('upload').addEventListener('submit', async (e) => {{
  e.preventDefault();
  const res = await fetch('/upload', {{ method: 'POST', body: new FormData(e.target) }});
  document.getElementById('report').textContent = JSON.stringify(await res.json(), null, 2);
  if (res.ok) setTimeout(() => location.reload(), 1500);
}});
</script>
</body>
</html>
"#,
        title = escape(&config.branding.title_en),
        hospital = escape(&config.branding.hospital_name),
        count = invoices.len(),
        rows = rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn stored(id: &str) -> StoredInvoice {
        StoredInvoice {
            id: id.to_string(),
            invoice_number: id.to_string(),
            patient_name: Some("<Ali & Sons>".to_string()),
            date: Some("01/02/2024".to_string()),
            total: Decimal::new(200, 0),
            currency: "EGP".to_string(),
            source_file: None,
            source_sheets: vec![],
            file_name: format!("Invoice_{}.pdf", id),
            page_count: 1,
            metadata: BTreeMap::new(),
            stored_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
        }
    }

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::open(dir.path(), "invoices_db.json").unwrap();
        (dir, AppState::new(store, MedinvConfig::default()))
    }

    #[test]
    fn test_dashboard_escapes_cells() {
        let html = render_dashboard(&[stored("INV1")], &MedinvConfig::default());
        assert!(html.contains("&lt;Ali &amp; Sons&gt;"));
        assert!(html.contains("href=\"/invoices/Invoice_INV1.pdf\""));
        assert!(html.contains("Download all (1)"));
    }

    #[test]
    fn test_empty_dashboard() {
        let html = render_dashboard(&[], &MedinvConfig::default());
        assert!(html.contains("No invoices yet."));
    }

    #[tokio::test]
    async fn test_list_and_download() {
        let (_dir, state) = state();
        state
            .store()
            .await
            .save(stored("INV1"), b"%PDF-1.5 test")
            .unwrap();

        let Json(list) = list_invoices(State(state.clone())).await.unwrap();
        assert_eq!(list.len(), 1);

        let response = download_invoice(State(state.clone()), Path("Invoice_INV1.pdf".into()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
    }

    #[tokio::test]
    async fn test_missing_invoice_is_404() {
        let (_dir, state) = state();
        let err = download_invoice(State(state), Path("Invoice_nope.pdf".into()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clear_and_bundle() {
        let (_dir, state) = state();
        state
            .store()
            .await
            .save(stored("INV1"), b"%PDF-1.5 test")
            .unwrap();

        let response = download_bundle(State(state.clone())).await.unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/zip"
        );

        let Json(body) = clear_store(State(state.clone())).await.unwrap();
        assert_eq!(body["removed"], 1);
        assert!(state.store().await.list().unwrap().is_empty());
    }

    #[test]
    fn test_dashboard_uses_configured_decimals() {
        let mut config = MedinvConfig::default();
        config.render.amount_decimals = 2;
        let mut invoice = stored("INV1");
        invoice.total = Decimal::new(12345675, 4);
        let html = render_dashboard(&[invoice], &config);
        assert!(html.contains("1,234.57 EGP"));
    }

    #[tokio::test]
    async fn test_only_indexed_files_are_served() {
        let (dir, state) = state();
        state
            .store()
            .await
            .save(stored("INV1"), b"%PDF-1.5 test")
            .unwrap();
        std::fs::write(dir.path().join("stray.pdf"), b"%PDF-1.5 stray").unwrap();

        for name in ["invoices_db.json", "stray.pdf"] {
            let err = download_invoice(State(state.clone()), Path(name.into()))
                .await
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::NOT_FOUND, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_store_survives_panicking_batch() {
        let (_dir, state) = state();
        let guard = state.store_owned().await;
        let joined = tokio::task::spawn_blocking(move || {
            let _held = guard;
            panic!("batch blew up");
        })
        .await;
        assert!(joined.is_err());

        let Json(list) = list_invoices(State(state.clone())).await.unwrap();
        assert!(list.is_empty());
    }
}
