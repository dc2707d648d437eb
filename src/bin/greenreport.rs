//! CLI binary for greenreport.
//!
//! A thin shim over the library crate that maps CLI flags to `RunConfig`
//! and the transport collaborators, then prints per-project outcomes.

use anyhow::{bail, Context, Result};
use clap::Parser;
use greenreport::{
    distribute, AssetSource, DriveAssetSource, FetchedAssets, GoogleArchiver, JsonRecordSource,
    LocalAssetSource, ReportError, RunConfig, SmtpConfig, SmtpMailer,
};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Test run for every project: reports land in the internal mailbox only
  greenreport --records projects.json

  # Test run for two projects, photos taken from a local directory
  greenreport --records projects.json --local-assets ./photos PM-204 PM-SC1

  # Production run: real recipients, drive archival, history sheet entry
  greenreport --records projects.json --production \
      --spreadsheet-id 1AbC... --sheet-tab History

  # Keep the scratch files for inspection
  greenreport --records projects.json --workdir ./run-debug --keep-workdir

ENVIRONMENT VARIABLES:
  GREENREPORT_SMTP_HOST   SMTP relay host
  GREENREPORT_SMTP_USER   SMTP username
  GREENREPORT_SMTP_PASS   SMTP password
  GREENREPORT_FROM        From header, e.g. "Reports <reports@example.com>"
  GREENREPORT_GOOGLE_TOKEN  OAuth bearer token for Drive and Sheets
  LD_LIBRARY_PATH         Must include the pdfium shared library's directory

SETUP:
  1. Place template_standard.pdf / template_town.pdf in the template dir.
  2. Export the SMTP variables above.
  3. Run a test first: greenreport --records projects.json
  4. When the internal copy looks right, re-run with --production.
"#;

/// Generate and distribute monthly investor progress reports.
#[derive(Parser, Debug)]
#[command(
    name = "greenreport",
    version,
    about = "Generate and distribute monthly investor progress reports",
    long_about = "Fill each project's PDF report template, composite its charts and photos onto \
the pages, bind the result into a single PDF and mail it to the project's investors. \
Production runs additionally archive the PDF to the project's history folder and log the \
link in the history spreadsheet.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Project ids to distribute. Empty means every project in the source.
    projects: Vec<String>,

    /// JSON file with project records and recipient lists.
    #[arg(long, env = "GREENREPORT_RECORDS")]
    records: PathBuf,

    /// Directory holding the fillable PDF templates.
    #[arg(long, env = "GREENREPORT_TEMPLATES", default_value = "templates")]
    templates: PathBuf,

    /// Working directory for scratch files. Default: a fresh temp directory.
    #[arg(long, env = "GREENREPORT_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Keep the working directory after the run instead of deleting it.
    #[arg(long)]
    keep_workdir: bool,

    /// Rasterisation DPI (72-400).
    #[arg(long, env = "GREENREPORT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Send to the real recipient lists and archive the reports.
    /// Without this flag reports go to the internal address only.
    #[arg(long, env = "GREENREPORT_PRODUCTION")]
    production: bool,

    /// Address receiving the internal copy of every report.
    #[arg(long, env = "GREENREPORT_INTERNAL_ADDRESS")]
    internal_address: Option<String>,

    /// Take project photos from subdirectories of this local directory
    /// instead of the shared drive.
    #[arg(long, env = "GREENREPORT_LOCAL_ASSETS")]
    local_assets: Option<PathBuf>,

    /// SMTP relay host.
    #[arg(long, env = "GREENREPORT_SMTP_HOST")]
    smtp_host: String,

    /// SMTP username.
    #[arg(long, env = "GREENREPORT_SMTP_USER")]
    smtp_user: String,

    /// SMTP password.
    #[arg(long, env = "GREENREPORT_SMTP_PASS", hide_env_values = true)]
    smtp_pass: String,

    /// From header, e.g. "Reports <reports@example.com>".
    #[arg(long, env = "GREENREPORT_FROM")]
    from: String,

    /// OAuth bearer token for Drive and Sheets.
    #[arg(long, env = "GREENREPORT_GOOGLE_TOKEN", hide_env_values = true)]
    google_token: Option<String>,

    /// History spreadsheet id (production runs).
    #[arg(long, env = "GREENREPORT_SPREADSHEET_ID")]
    spreadsheet_id: Option<String>,

    /// Tab of the history spreadsheet holding the report log.
    #[arg(long, env = "GREENREPORT_SHEET_TAB", default_value = "History")]
    sheet_tab: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "GREENREPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "GREENREPORT_QUIET")]
    quiet: bool,
}

/// Runtime choice between the drive-backed and local asset sources.
enum Assets {
    Drive(DriveAssetSource),
    Local(LocalAssetSource),
}

impl AssetSource for Assets {
    async fn fetch(&self, folder_url: &str, workdir: &Path) -> Result<FetchedAssets, ReportError> {
        match self {
            Assets::Drive(s) => s.fetch(folder_url, workdir).await,
            Assets::Local(s) => s.fetch(folder_url, workdir).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Working directory ────────────────────────────────────────────────
    // An explicit --workdir is reusable across runs; the default is a temp
    // directory that disappears with the process unless --keep-workdir.
    let (workdir, _tempdir_guard) = match &cli.workdir {
        Some(dir) => (dir.clone(), None),
        None => {
            let tmp = tempfile::Builder::new()
                .prefix("greenreport-")
                .tempdir()
                .context("Failed to create working directory")?;
            let path = tmp.path().to_path_buf();
            let guard = if cli.keep_workdir {
                let _ = tmp.keep();
                None
            } else {
                Some(tmp)
            };
            (path, guard)
        }
    };

    // ── Config and collaborators ─────────────────────────────────────────
    let mut builder = RunConfig::builder(&workdir, &cli.templates).dpi(cli.dpi);
    if let Some(addr) = &cli.internal_address {
        builder = builder.internal_address(addr);
    }
    let config = builder.build().context("Invalid configuration")?;

    let source = JsonRecordSource::load(&cli.records)
        .with_context(|| format!("Failed to load records from {}", cli.records.display()))?;

    let google_token = cli.google_token.clone().unwrap_or_default();
    let assets = match &cli.local_assets {
        Some(dir) => Assets::Local(LocalAssetSource::new(dir)),
        None => {
            if google_token.is_empty() {
                bail!("--google-token is required unless --local-assets is set");
            }
            Assets::Drive(DriveAssetSource::new(&google_token))
        }
    };

    let mailer = SmtpMailer::new(&SmtpConfig {
        host: cli.smtp_host.clone(),
        port: 587,
        username: cli.smtp_user.clone(),
        password: cli.smtp_pass.clone(),
        from: cli.from.clone(),
    })
    .context("Invalid SMTP configuration")?;

    let spreadsheet_id = cli.spreadsheet_id.clone().unwrap_or_default();
    if cli.production && (google_token.is_empty() || spreadsheet_id.is_empty()) {
        bail!("--production requires --google-token and --spreadsheet-id");
    }
    let archiver = GoogleArchiver::new(&google_token, &spreadsheet_id, &cli.sheet_tab);

    // ── Run ──────────────────────────────────────────────────────────────
    let output = distribute(
        &cli.projects,
        cli.production,
        &config,
        &source,
        &assets,
        &mailer,
        &archiver,
    )
    .await
    .context("Distribution failed")?;

    if !cli.quiet {
        for project in &output.projects {
            let mut line = format!(
                "{} {}  {}",
                green("✔"),
                bold(&project.project_id),
                project.message
            );
            if let Some(link) = &project.archive_link {
                line.push_str(&format!("  {}", dim(link)));
            }
            eprintln!("{line}");
        }
        eprintln!(
            "{} {} report(s) distributed",
            cyan("◆"),
            bold(&output.projects.len().to_string())
        );
        if cli.keep_workdir || cli.workdir.is_some() {
            eprintln!("   scratch files in {}", dim(&workdir.display().to_string()));
        }
    }

    Ok(())
}
