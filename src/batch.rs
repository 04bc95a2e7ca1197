//! Sequential batch issuing
//! Author: kartik4091
//! Created: 2025-06-07
//!
//! Records are processed one at a time on a single blocking worker thread:
//! fill the template into a scratch file, seal it, delete the scratch file.
//! Cancellation is polled between records; a record in flight always finishes.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, instrument, warn};

use crate::config::SigningConfig;
use crate::error::{Error, Result};
use crate::pipeline::Issuer;
use crate::types::CertificateRecord;
use crate::utils::remove_with_retry;

const SCRATCH_DELETE_ATTEMPTS: u32 = 5;
const SCRATCH_DELETE_DELAY: Duration = Duration::from_millis(100);

/// Writes a filled-in copy of a template for one record
pub trait TemplateFiller: Send + Sync {
    fn fill(&self, template: &Path, record: &CertificateRecord, output: &Path) -> Result<()>;
}

/// Copies the template unchanged; for templates that are already final documents
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFiller;

impl TemplateFiller for PassthroughFiller {
    fn fill(&self, template: &Path, _record: &CertificateRecord, output: &Path) -> Result<()> {
        fs::copy(template, output)?;
        Ok(())
    }
}

/// Shared stop flag, checked before each record
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    /// Zero-based record index
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<RecordFailure>,
    pub cancelled: bool,
}

/// Progress reported while a batch runs
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started { total: usize },
    RecordSucceeded { index: usize, output: PathBuf },
    RecordFailed { index: usize, error: String },
    Cancelled { processed: usize },
    Finished(BatchSummary),
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub template: PathBuf,
    pub records: Vec<CertificateRecord>,
    pub output_dir: PathBuf,
    /// Record field naming each output file
    pub filename_column: Option<String>,
    pub config: SigningConfig,
}

/// Loads records from a JSON or YAML list of mappings
pub fn load_records(path: &Path) -> Result<Vec<CertificateRecord>> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .or_else(|_| serde_yaml::from_str(&content))
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

pub struct BatchWorker {
    filler: Arc<dyn TemplateFiller>,
    token: CancellationToken,
}

impl BatchWorker {
    pub fn new(filler: Arc<dyn TemplateFiller>) -> Self {
        Self {
            filler,
            token: CancellationToken::new(),
        }
    }

    pub fn passthrough() -> Self {
        Self::new(Arc::new(PassthroughFiller))
    }

    /// Handle for stopping the batch from another task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs the job on a blocking worker thread. Fails only when the session
    /// cannot start; per-record errors land in the summary.
    #[instrument(skip_all, fields(template = %job.template.display(), records = job.records.len()))]
    pub async fn run(&self, job: BatchJob, events: Option<UnboundedSender<BatchEvent>>) -> Result<BatchSummary> {
        let filler = Arc::clone(&self.filler);
        let token = self.token.clone();
        tokio::task::spawn_blocking(move || run_sequential(job, filler.as_ref(), &token, events.as_ref()))
            .await
            .map_err(|e| Error::Worker(e.to_string()))?
    }
}

fn emit(events: Option<&UnboundedSender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        // a dropped receiver only means nobody is listening
        let _ = tx.send(event);
    }
}

fn run_sequential(
    job: BatchJob,
    filler: &dyn TemplateFiller,
    token: &CancellationToken,
    events: Option<&UnboundedSender<BatchEvent>>,
) -> Result<BatchSummary> {
    let issuer = Issuer::new(job.config.clone())?;
    fs::create_dir_all(&job.output_dir)?;

    let total = job.records.len();
    let extension = job
        .template
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut summary = BatchSummary {
        total,
        ..BatchSummary::default()
    };
    info!("🚦 Starting batch of {} certificate(s)", total);
    emit(events, BatchEvent::Started { total });

    let mut used = HashSet::new();
    for (index, record) in job.records.iter().enumerate() {
        if token.is_cancelled() {
            warn!("🛑 Batch cancelled after {} record(s)", index);
            summary.cancelled = true;
            emit(events, BatchEvent::Cancelled { processed: index });
            break;
        }

        let name = output_name(record, job.filename_column.as_deref(), index);
        let stem = unique_stem(&job.output_dir, &name, &extension, &mut used);
        match process_record(&issuer, filler, &job, record, &stem, &extension) {
            Ok(output) => {
                summary.succeeded += 1;
                info!("✅ ({}/{}) {}", index + 1, total, output.display());
                emit(events, BatchEvent::RecordSucceeded { index, output });
            }
            Err(e) => {
                error!("❌ Record {}: {}", index + 1, e);
                summary.failures.push(RecordFailure {
                    index,
                    error: e.to_string(),
                });
                emit(events, BatchEvent::RecordFailed {
                    index,
                    error: e.to_string(),
                });
            }
        }
    }

    info!("🏁 Batch finished: {} of {} sealed", summary.succeeded, total);
    emit(events, BatchEvent::Finished(summary.clone()));
    Ok(summary)
}

fn process_record(
    issuer: &Issuer,
    filler: &dyn TemplateFiller,
    job: &BatchJob,
    record: &CertificateRecord,
    stem: &str,
    extension: &str,
) -> Result<PathBuf> {
    let output = job.output_dir.join(with_extension(stem, extension));
    let scratch = job.output_dir.join(with_extension(&format!(".{}.fill", stem), extension));

    let result = filler
        .fill(&job.template, record, &scratch)
        .and_then(|()| issuer.sign_and_embed(&scratch, &output, record.clone()));

    if scratch.exists() {
        remove_with_retry(&scratch, SCRATCH_DELETE_ATTEMPTS, SCRATCH_DELETE_DELAY);
    }
    result.map(|signed| signed.embedded.output_path)
}

fn with_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Keeps alphanumerics, spaces, hyphens and underscores
fn clean_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Filename column, else the first field, else `Certificate_<n>`
fn output_name(record: &CertificateRecord, filename_column: Option<&str>, index: usize) -> String {
    let raw = filename_column
        .and_then(|column| record.get(column))
        .and_then(value_text)
        .or_else(|| record.values().next().and_then(value_text));
    let cleaned = raw.map(|name| clean_file_name(&name)).unwrap_or_default();
    if cleaned.is_empty() {
        format!("Certificate_{}", index + 1)
    } else {
        cleaned
    }
}

/// First of `name`, `name (1)`, `name (2)`, ... not on disk and not yet used
fn unique_stem(dir: &Path, name: &str, extension: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut count = 1;
    while used.contains(&candidate) || dir.join(with_extension(&candidate, extension)).exists() {
        candidate = format!("{} ({})", name, count);
        count += 1;
    }
    used.insert(candidate.clone());
    candidate
}
