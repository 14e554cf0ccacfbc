use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{MpClient, SummaryClient};
use crate::config::Config;
use crate::enrich;
use crate::input::MaterialRow;
use crate::store;

pub struct HarvestStats {
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
}

#[derive(Debug)]
enum RowOutcome {
    Written,
    Skipped,
}

/// Process every row in order: fetch, enrich, persist two artifacts, pause.
/// Strictly sequential; the pause is courtesy toward the API.
pub async fn harvest_rows(cfg: &Config, rows: &[MaterialRow]) -> Result<HarvestStats> {
    store::ensure_dirs(&cfg.raw_dir, &cfg.out_dir)?;
    let client = MpClient::new(cfg);
    let summary = SummaryClient::new(cfg);
    let delay = Duration::from_millis(cfg.delay_ms);

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut written = 0usize;
    let mut skipped = 0usize;

    for row in rows {
        let raw = fetch_record(&client, &summary, row).await?;
        match enrich_and_persist(cfg, &client, row, &raw, delay).await? {
            RowOutcome::Written => {
                written += 1;
                // Courtesy pause toward the API; skipped rows go straight on.
                tokio::time::sleep(delay).await;
            }
            RowOutcome::Skipped => {
                record_skip(cfg, &row.mpid)?;
                skipped += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Harvested {} rows ({} written, {} skipped)",
        rows.len(),
        written,
        skipped
    );

    Ok(HarvestStats {
        total: rows.len(),
        written,
        skipped,
    })
}

/// A row with no usable title: fatal under --strict, otherwise a warning.
fn record_skip(cfg: &Config, mpid: &str) -> Result<()> {
    if cfg.strict {
        bail!("{}: record has no usable title", mpid);
    }
    warn!("Skipping {}: record has no usable title", mpid);
    Ok(())
}

/// Post-fetch stage, in the fixed order: title check, raw artifact,
/// bibliography, normalized artifact. A row without a title is skipped
/// before anything is written. The network is touched only when the record
/// carries no embedded `doi_bibtex`.
async fn enrich_and_persist(
    cfg: &Config,
    client: &MpClient,
    row: &MaterialRow,
    raw: &Value,
    delay: Duration,
) -> Result<RowOutcome> {
    let Some(name) = enrich::derive_title(raw) else {
        return Ok(RowOutcome::Skipped);
    };

    store::write_raw(&cfg.raw_dir, &row.mpid, raw)?;

    let bibtex = resolve_bibtex(client, raw, &row.mpid, delay).await?;
    let doc = enrich::build_document(raw, row, name, &bibtex, Local::now().naive_local())?;
    store::write_normalized(&cfg.out_dir, &row.mpid, &doc)?;

    Ok(RowOutcome::Written)
}

/// Primary doc fetch, falling back to the summary client when the payload
/// carries no `response` record.
async fn fetch_record(
    client: &MpClient,
    summary: &SummaryClient,
    row: &MaterialRow,
) -> Result<Value> {
    let payload = client.fetch_doc(&row.mpid).await?;
    if let Some(record) = payload.get("response") {
        return Ok(record.clone());
    }

    warn!("{}: doc payload has no response, using summary fallback", row.mpid);
    let records = summary.get_material(&row.mpid).await?;
    records
        .into_iter()
        .next()
        .with_context(|| format!("summary endpoint has no records for {}", row.mpid))?
        .into_record()
}

/// Bibliography string: embedded in the record when present, otherwise a
/// courtesy pause followed by the bibliography endpoint.
async fn resolve_bibtex(
    client: &MpClient,
    raw: &Value,
    mpid: &str,
    delay: Duration,
) -> Result<String> {
    if let Some(bibtex) = enrich::embedded_bibtex(raw) {
        return Ok(bibtex);
    }
    tokio::time::sleep(delay).await;
    client.fetch_bibtex(mpid).await
}
