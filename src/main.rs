//! Certificate Sealing Tool - Command-Line Interface
//! Author: kartik4091
//! Created: 2025-06-06
//!
//! Subcommands: keygen, sign, verify, batch, inspect

use std::path::{Path, PathBuf};
use std::process;

use certseal::batch::load_records;
use certseal::crypto::KeyManager;
use certseal::types::CertificateRecord;
use certseal::{
    inspect_template, BatchEvent, BatchJob, BatchWorker, FolioManager, IntegrityChecker, Issuer, SigningConfig,
    VerificationStatus,
};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueEnum};
use serde_json::Value;
use tracing::{error, info, warn};

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages (default)
    Info,
    /// Debug and all messages
    Debug,
    /// Trace and all messages (most verbose)
    Trace,
}

const EXIT_INVALID: i32 = 1;
const EXIT_NO_SIGNATURE: i32 = 2;

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let log_level = matches.get_one::<LogLevel>("verbose").unwrap_or(&LogLevel::Info);
    init_logging(log_level);

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => match SigningConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("❌ Failed to load config file: {}", e);
                process::exit(EXIT_INVALID);
            }
        },
        None => SigningConfig::default(),
    };

    let code = match matches.subcommand() {
        Some(("keygen", _)) => run_keygen(&config),
        Some(("sign", sub)) => run_sign(config, sub),
        Some(("verify", sub)) => run_verify(&config, sub),
        Some(("batch", sub)) => run_batch(config, sub).await,
        Some(("inspect", sub)) => run_inspect(sub),
        _ => {
            error!("❌ No subcommand given");
            EXIT_INVALID
        }
    };
    process::exit(code);
}

fn build_cli() -> Command {
    Command::new("certseal")
        .version(env!("CARGO_PKG_VERSION"))
        .author("kartik4091")
        .about("Sign certificates, embed verifiable QR codes and detect tampering")
        .subcommand_required(true)
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .global(true)
            .help("Configuration file (JSON/YAML)"))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .value_parser(clap::value_parser!(LogLevel))
            .default_value("info")
            .global(true)
            .help("Set logging verbosity"))
        .subcommand(Command::new("keygen")
            .about("Create the signing key pair if it does not exist yet"))
        .subcommand(Command::new("sign")
            .about("Sign a finished document and embed the QR code")
            .arg(path_arg("input", "Document to sign"))
            .arg(path_arg("output", "Where to write the signed document"))
            .arg(Arg::new("field")
                .short('f')
                .long("field")
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .help("Certificate field; may be repeated"))
            .arg(Arg::new("data-file")
                .short('d')
                .long("data-file")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Certificate fields as a JSON/YAML mapping"))
            .arg(legend_arg())
            .arg(folio_arg()))
        .subcommand(Command::new("verify")
            .about("Check a signed document; writes a _MODIFIED copy when tampered")
            .arg(path_arg("input", "Document to verify")))
        .subcommand(Command::new("batch")
            .about("Generate and sign one certificate per record")
            .arg(path_arg("template", "Template document"))
            .arg(path_arg("records", "Records file: JSON/YAML list of mappings"))
            .arg(path_arg("output-dir", "Output directory"))
            .arg(Arg::new("filename-column")
                .long("filename-column")
                .value_name("FIELD")
                .help("Record field naming each output file"))
            .arg(legend_arg())
            .arg(folio_arg()))
        .subcommand(Command::new("inspect")
            .about("List the placeholders a template carries")
            .arg(path_arg("template", "Template document")))
}

fn path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help(help)
}

fn legend_arg() -> Arg {
    Arg::new("legend")
        .long("legend")
        .value_name("TEXT")
        .help("Validation legend printed under the QR code")
}

fn folio_arg() -> Arg {
    Arg::new("folio-pattern")
        .long("folio-pattern")
        .value_name("PATTERN")
        .help("Assign a folio to records without one, e.g. RALLY-{counter:06d}")
}

fn init_logging(level: &LogLevel) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter_level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!("certseal={}", filter_level)))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

fn apply_overrides(config: &mut SigningConfig, matches: &ArgMatches) {
    if let Some(legend) = matches.get_one::<String>("legend") {
        config.validation_legend = legend.clone();
    }
}

fn assign_folio(folios: &mut FolioManager, record: &mut CertificateRecord, pattern: &str) {
    if record.contains_key("folio") {
        return;
    }
    let folio = folios.generate(record, pattern);
    record.insert("folio".into(), Value::String(folio));
}

fn run_keygen(config: &SigningConfig) -> i32 {
    match KeyManager::new(config.keys.clone()).ensure() {
        Ok(paths) => {
            println!("private key: {}", paths.private_key.display());
            println!("public key:  {}", paths.public_key.display());
            0
        }
        Err(e) => {
            error!("❌ Key provisioning failed: {}", e);
            EXIT_INVALID
        }
    }
}

fn read_sign_record(matches: &ArgMatches) -> Result<CertificateRecord, String> {
    let mut record = match matches.get_one::<PathBuf>("data-file") {
        Some(path) => read_mapping(path)?,
        None => CertificateRecord::new(),
    };
    for field in matches.get_many::<String>("field").into_iter().flatten() {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| format!("Field {:?} is not KEY=VALUE", field))?;
        record.insert(key.trim().to_string(), Value::String(value.to_string()));
    }
    if record.is_empty() {
        return Err("No certificate fields given; use --field or --data-file".into());
    }
    Ok(record)
}

fn read_mapping(path: &Path) -> Result<CertificateRecord, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read data file: {}", e))?;

    // Try JSON first, then YAML
    serde_json::from_str(&content)
        .or_else(|_| serde_yaml::from_str(&content))
        .map_err(|e| format!("Data file parsing error: {}", e))
}

fn run_sign(mut config: SigningConfig, matches: &ArgMatches) -> i32 {
    apply_overrides(&mut config, matches);
    let (Some(input), Some(output)) = (matches.get_one::<PathBuf>("input"), matches.get_one::<PathBuf>("output")) else {
        return EXIT_INVALID;
    };

    let mut record = match read_sign_record(matches) {
        Ok(record) => record,
        Err(e) => {
            error!("❌ {}", e);
            return EXIT_INVALID;
        }
    };
    if let Some(pattern) = matches.get_one::<String>("folio-pattern") {
        assign_folio(&mut FolioManager::new(), &mut record, pattern);
    }

    let issuer = match Issuer::new(config) {
        Ok(issuer) => issuer,
        Err(e) => {
            error!("❌ Signing session could not start: {}", e);
            return EXIT_INVALID;
        }
    };
    match issuer.sign_and_embed(input, output, record) {
        Ok(signed) => {
            if let Some(placement) = &signed.embedded.placement {
                if !placement.at_placeholder {
                    warn!("⚠️ QR placed at the default position on page {}", placement.page + 1);
                }
            }
            println!("{}", signed.embedded.output_path.display());
            0
        }
        Err(e) => {
            error!("❌ Signing failed: {}", e);
            EXIT_INVALID
        }
    }
}

fn run_verify(config: &SigningConfig, matches: &ArgMatches) -> i32 {
    let Some(input) = matches.get_one::<PathBuf>("input") else {
        return EXIT_INVALID;
    };
    let checker = match IntegrityChecker::from_config(config) {
        Ok(checker) => checker,
        Err(e) => {
            error!("❌ Trusted public key unavailable: {}", e);
            return EXIT_INVALID;
        }
    };

    let report = checker.check(input);
    println!("{}", report.message());
    if let Some(legend) = &report.validation_text {
        println!("legend: {}", legend);
    }
    match report.status {
        VerificationStatus::SignatureFoundValid => 0,
        VerificationStatus::SignatureFoundInvalid => EXIT_INVALID,
        VerificationStatus::NoSignature => EXIT_NO_SIGNATURE,
    }
}

async fn run_batch(mut config: SigningConfig, matches: &ArgMatches) -> i32 {
    apply_overrides(&mut config, matches);
    let (Some(template), Some(records_path), Some(output_dir)) = (
        matches.get_one::<PathBuf>("template"),
        matches.get_one::<PathBuf>("records"),
        matches.get_one::<PathBuf>("output-dir"),
    ) else {
        return EXIT_INVALID;
    };

    let mut records = match load_records(records_path) {
        Ok(records) => records,
        Err(e) => {
            error!("❌ Failed to load records: {}", e);
            return EXIT_INVALID;
        }
    };
    if let Some(pattern) = matches.get_one::<String>("folio-pattern") {
        let mut folios = FolioManager::new();
        for record in &mut records {
            assign_folio(&mut folios, record, pattern);
        }
    }

    let job = BatchJob {
        template: template.clone(),
        records,
        output_dir: output_dir.clone(),
        filename_column: matches.get_one::<String>("filename-column").cloned(),
        config,
    };

    let worker = BatchWorker::passthrough();
    let token = worker.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received; stopping after the current record");
            token.cancel();
        }
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        let mut total = 0;
        let mut done = 0;
        while let Some(event) = rx.recv().await {
            match event {
                BatchEvent::Started { total: n } => total = n,
                BatchEvent::RecordSucceeded { .. } | BatchEvent::RecordFailed { .. } => {
                    done += 1;
                    info!("📈 Progress: {}%", done * 100 / total.max(1));
                }
                BatchEvent::Cancelled { processed } => info!("Stopped after {} record(s)", processed),
                BatchEvent::Finished(_) => {}
            }
        }
    });

    let result = worker.run(job, Some(tx)).await;
    let _ = progress.await;
    match result {
        Ok(summary) => {
            println!("{} of {} certificate(s) sealed", summary.succeeded, summary.total);
            for failure in &summary.failures {
                println!("record {}: {}", failure.index + 1, failure.error);
            }
            if summary.failures.is_empty() && !summary.cancelled {
                0
            } else {
                EXIT_INVALID
            }
        }
        Err(e) => {
            error!("❌ Batch aborted: {}", e);
            EXIT_INVALID
        }
    }
}

fn run_inspect(matches: &ArgMatches) -> i32 {
    let Some(template) = matches.get_one::<PathBuf>("template") else {
        return EXIT_INVALID;
    };
    let report = inspect_template(template);
    println!("format: {}", report.format);
    for placeholder in &report.placeholders {
        println!("placeholder: {}", placeholder);
    }
    for warning in &report.warnings {
        warn!("⚠️ {}", warning);
    }
    for problem in &report.errors {
        error!("❌ {}", problem);
    }
    if report.is_valid() {
        0
    } else {
        EXIT_INVALID
    }
}
