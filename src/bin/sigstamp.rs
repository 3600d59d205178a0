//! sigstamp CLI
//!
//! Verifies detached CMS/PKCS#7 signatures and signs documents through the
//! CryptoPro browser plugin.

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use sigstamp::{
    domain::verification::VerificationReport,
    infra::config::{parse_reference_time, validate_config, ConfigManager},
    pipelines::verify::find_signature_for,
    BrowserSignWorkflow, DigestAlgorithm, VerifyWorkflow,
};

#[derive(Parser)]
#[command(name = "sigstamp")]
#[command(about = "Detached signature verification and browser-based signing")]
#[command(long_about = "
sigstamp - detached CMS/PKCS#7 signatures with GOST R 34.10-2012 support

EXAMPLES:
    # Verify contract.pdf against contract.pdf.p7s (found automatically)
    sigstamp verify contract.pdf

    # Verify with an explicit signature and signer certificate
    sigstamp verify contract.pdf -s signature.sig --cert signer.cer

    # Sign through the CryptoPro browser plugin
    sigstamp browser-sign contract.pdf

ENVIRONMENT VARIABLES:
    SIGSTAMP_CONFIG   Configuration file path
    RUST_LOG          Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user configuration directory)
    #[arg(long, global = true, env = "SIGSTAMP_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a detached signature over a document
    Verify {
        /// Signed document
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Detached signature (defaults to <DOCUMENT>.p7s and similar)
        #[arg(short, long, value_name = "SIGNATURE")]
        signature: Option<PathBuf>,

        /// Signer certificate, DER or PEM, when the signature carries none
        #[arg(long, value_name = "CERT")]
        cert: Option<PathBuf>,

        /// Signer info to validate in multi-signer containers
        #[arg(long)]
        signer_index: Option<usize>,

        /// Judge certificate validity "now" or at "signing-time"
        #[arg(long)]
        reference_time: Option<String>,
    },

    /// Sign a document through the CryptoPro browser plugin
    BrowserSign {
        /// Document to sign
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Output signature path (defaults to <DOCUMENT>.p7s)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Digest algorithm
        #[arg(long, default_value = "gost3411-2012-256")]
        digest: String,

        /// Seconds to wait for the browser (overrides config)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Send only the digest to the page, not the document
        #[arg(long)]
        digest_only: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Print the configuration file path
    Path,

    /// Set a configuration value
    Set {
        /// Configuration key, e.g. browser_signing.timeout_seconds
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration as JSON
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    match cli.command {
        Commands::Verify {
            document,
            signature,
            cert,
            signer_index,
            reference_time,
        } => {
            let args = VerifyCommandArgs {
                document,
                signature,
                cert,
                signer_index,
                reference_time,
            };
            handle_verify_command(&manager, args, cli.verbose)?;
        }

        Commands::BrowserSign {
            document,
            output,
            digest,
            timeout,
            digest_only,
        } => {
            let args = BrowserSignCommandArgs {
                document,
                output,
                digest,
                timeout,
                digest_only,
            };
            handle_browser_sign_command(&manager, args).await?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(&manager, config_cmd)?;
        }
    }

    Ok(())
}

/// Parameters for the verify command
struct VerifyCommandArgs {
    document: PathBuf,
    signature: Option<PathBuf>,
    cert: Option<PathBuf>,
    signer_index: Option<usize>,
    reference_time: Option<String>,
}

/// Parameters for the browser-sign command
struct BrowserSignCommandArgs {
    document: PathBuf,
    output: Option<PathBuf>,
    digest: String,
    timeout: Option<u64>,
    digest_only: bool,
}

fn handle_verify_command(manager: &ConfigManager, args: VerifyCommandArgs, verbose: bool) -> Result<()> {
    let config = manager.load_or_default()?;

    let signature = match args.signature {
        Some(path) => path,
        None => find_signature_for(&args.document).ok_or_else(|| {
            miette::miette!(
                "No signature found next to {} (use --signature)",
                args.document.display()
            )
        })?,
    };
    let reference_time = match args.reference_time {
        Some(value) => parse_reference_time(&value)?,
        None => config.verification.reference_time()?,
    };
    let signer_index = args.signer_index.unwrap_or(config.verification.signer_index);

    let workflow = VerifyWorkflow::new()
        .with_reference_time(reference_time)
        .with_signer_index(signer_index);
    let report = workflow
        .run_files(&signature, &args.document, args.cert.as_deref())
        .wrap_err_with(|| format!("Failed to verify {}", signature.display()))?;

    print_report(&report, verbose);
    if !report.success() {
        std::process::exit(2);
    }
    Ok(())
}

fn print_report(report: &VerificationReport, verbose: bool) {
    let marker = if report.success() { "✅" } else { "❌" };
    println!("{marker} {}", report.status);

    let cert = report.certificate();
    println!("  Signer: {}", cert.display_name());
    println!("  Serial: {}", cert.serial());
    println!("  Valid until: {}", format_date(cert.not_after()));
    match report.signing_time() {
        Some(time) => println!("  Signing time: {}", format_datetime(time)),
        None => println!("  Signing time: not present"),
    }
    if report.signer_count > 1 {
        println!(
            "  ⚠️  {} signers in container, only signer {} was checked",
            report.signer_count, report.result.signer_index
        );
    }

    if verbose {
        println!("\n📜 Certificate:");
        println!("  Subject: {}", cert.subject());
        println!("  Issuer: {}", cert.issuer());
        println!("  Valid from: {}", format_date(cert.not_before()));
        println!("  Digest algorithm: {}", report.result.digest_algorithm);
        println!("  Content matches: {}", report.result.content_matches);
        println!("  Signature valid: {}", report.result.signature_crypto_valid);
    }
}

fn utc_datetime(time: SystemTime) -> Option<der::DateTime> {
    let since_epoch = time.duration_since(UNIX_EPOCH).ok()?;
    der::DateTime::from_unix_duration(since_epoch).ok()
}

/// `dd.mm.yyyy`
fn format_date(time: SystemTime) -> String {
    match utc_datetime(time) {
        Some(dt) => format!("{:02}.{:02}.{:04}", dt.day(), dt.month(), dt.year()),
        None => "unknown".to_string(),
    }
}

/// `dd.mm.yyyy HH:MM UTC`
fn format_datetime(time: SystemTime) -> String {
    match utc_datetime(time) {
        Some(dt) => format!(
            "{:02}.{:02}.{:04} {:02}:{:02} UTC",
            dt.day(),
            dt.month(),
            dt.year(),
            dt.hour(),
            dt.minutes()
        ),
        None => "unknown".to_string(),
    }
}

async fn handle_browser_sign_command(
    manager: &ConfigManager,
    args: BrowserSignCommandArgs,
) -> Result<()> {
    let config = manager.load_or_default()?;
    validate_config(&config)?;

    let digest_algorithm: DigestAlgorithm = args.digest.parse()?;
    let timeout = args
        .timeout
        .map_or_else(|| config.browser_signing.timeout(), Duration::from_secs);

    let mut workflow = BrowserSignWorkflow::new(
        digest_algorithm,
        config.browser_signing.session_settings(),
        timeout,
    );
    if args.digest_only {
        workflow = workflow.digest_only();
    }

    let outcome = workflow
        .sign_file(&args.document, args.output.as_deref(), |url| {
            println!("🌐 Open this page in a browser with the CryptoPro plugin:");
            println!("   {url}");
            println!("   Waiting up to {} s for the signature...", timeout.as_secs());
        })
        .await
        .wrap_err("Browser signing failed")?;

    println!(
        "✅ Signature written to {}",
        outcome.signature_path.display()
    );
    match &outcome.report {
        Some(report) => print_report(report, false),
        None => println!("⚠️  The signature was saved but could not be re-verified"),
    }
    Ok(())
}

fn handle_config_command(manager: &ConfigManager, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = manager.load_or_default()?;
            let text = toml::to_string_pretty(&config).into_diagnostic()?;
            println!("# {}", manager.config_path().display());
            print!("{text}");
        }
        ConfigCommands::Init => {
            manager.load_or_create_default()?;
            println!(
                "✅ Configuration file at {}",
                manager.config_path().display()
            );
        }
        ConfigCommands::Path => {
            println!("{}", manager.config_path().display());
        }
        ConfigCommands::Set { key, value } => {
            manager
                .update_value(&key, &value)
                .wrap_err_with(|| format!("Failed to set {key}"))?;
            println!("✅ {key} = {value}");
        }
        ConfigCommands::Export { output } => {
            let json = manager.export_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .into_diagnostic()
                        .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
                    println!("✅ Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
    }
    Ok(())
}
