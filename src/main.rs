use clap::{Parser, Subcommand};
use gazette::config::{self, Config, SenderCredentials, env_var};
use gazette::delivery::{self, DeliverySettings, Sender, Transport};
use gazette::imaging::RustBackend;
use gazette::issue::{self, ContentRoot, ResolvedIssue};
use gazette::recipients::{RecipientEnv, RecipientSource};
use gazette::smtp::{DryRunTransport, SmtpTransport};
use gazette::types::RenderedDocument;
use gazette::{listing, output, render, scaffold, telemetry};
use std::path::{Path, PathBuf};

/// Sender shown in dry runs when `NEWSLETTER_EMAIL` is not set.
const DRY_RUN_SENDER: &str = "newsletter@example.org";

#[derive(Parser)]
#[command(name = "gazette")]
#[command(about = "Build a markdown newsletter into HTML and mail it to subscribers")]
#[command(long_about = "\
Build a markdown newsletter into HTML and mail it to subscribers

Each issue is a folder named after its date. Content paths are relative to
the directory holding newsletter.toml.

Content structure:

  newsletter.toml                 # Optional config (see gen-config)
  content/                        # Published issues
  ├── 2024-01-01/
  │   ├── meta.yml                # title, date, type (normal | canvas)
  │   ├── intro.md
  │   ├── article-1.md            # article*.md, in filename order
  │   └── images/                 # Downscaled to 600px wide on build
  └── 2024-02-02/                 # type: canvas
      ├── meta.yml
      └── banner.png              # The whole issue is this image
  planned/                        # Drafts, selected with --planned
  dist/                           # Rendered issues + newsletters.json

Issue selection (first available wins):
  argument → NEWSLETTER_ISSUE → latest folder in the content root

Environment (a .env file is loaded when present):
  NEWSLETTER_EMAIL, NEWSLETTER_PASSWORD   SMTP login, also the sender
  NEWSLETTER_ISSUE, NEWSLETTER_ROOT       issue and root selection
  NEWSLETTER_RECIPIENTS                   comma-separated recipient list
  GOOGLE_SHEET_ID, GOOGLE_SHEET_RANGE     recipient spreadsheet
  GOOGLE_SERVICE_ACCOUNT_JSON or _FILE    spreadsheet service account key
  GOOGLE_ACCESS_TOKEN or GOOGLE_API_KEY   spreadsheet authorization fallbacks

Run 'gazette gen-config' to generate a documented newsletter.toml.")]
#[command(version)]
struct Cli {
    /// Config file; content paths are relative to its directory
    #[arg(long, default_value = config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit diagnostics as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that operate on one issue.
#[derive(clap::Args, Clone)]
struct IssueArgs {
    /// Issue folder name, e.g. 2024-01-01
    issue: Option<String>,

    /// Use the planned root instead of the published one
    #[arg(long)]
    planned: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Render an issue to HTML, downscaling its images
    Build(IssueArgs),
    /// Mail a rendered issue to every recipient
    Send {
        #[command(flatten)]
        target: IssueArgs,

        /// Read recipients from this file instead of the environment
        #[arg(long)]
        recipients: Option<PathBuf>,

        /// Log the messages instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Create a new issue folder with starter files
    New {
        /// Issue date as YYYY-MM-DD (default: today)
        date: Option<String>,

        /// Create it in the planned root
        #[arg(long)]
        planned: bool,
    },
    /// Write newsletters.json listing the rendered issues
    Index,
    /// Print a stock newsletter.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    // Before the subscriber: .env may set RUST_LOG.
    let dotenv = config::load_dotenv();
    telemetry::init_tracing(cli.log_json, telemetry::level_for_verbosity(cli.verbose));
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    match cli.command {
        Command::Build(target) => {
            let Project { config, base, output_dir } = Project::load(&cli.config)?;
            let (issue, source) = resolve(&config, &base, &target)?;
            let result = render::render_issue(&config, &issue, &output_dir, &RustBackend::new())?;
            output::print_build_output(&issue, source, &result, &base);
        }
        Command::Send {
            target,
            recipients,
            dry_run,
        } => {
            let Project { config, base, output_dir } = Project::load(&cli.config)?;
            // Configuration problems surface before any file or network access.
            let credentials = if dry_run {
                None
            } else {
                Some(SenderCredentials::from_env()?)
            };
            let source =
                RecipientSource::select(recipients.as_deref(), RecipientEnv::from_env(), &config.recipients)?;

            let (issue, _) = resolve(&config, &base, &target)?;
            let document = render::read_document(&output_dir, &issue.id)?;
            let recipients = source.fetch()?;
            output::print_send_header(&document.title, recipients.len(), &source.describe(), dry_run);

            let report = match credentials {
                Some(credentials) => {
                    let sender = Sender::new(credentials.email.clone(), &config.smtp);
                    let transport = SmtpTransport::new(&config.smtp, &credentials);
                    send(&transport, &config, &document, &recipients, &sender)?
                }
                None => {
                    let address = env_var("NEWSLETTER_EMAIL").unwrap_or_else(|| DRY_RUN_SENDER.to_string());
                    let sender = Sender::new(address, &config.smtp);
                    send(&DryRunTransport, &config, &document, &recipients, &sender)?
                }
            };
            output::print_delivery_report(&report);

            if !report.is_success() {
                return Err(format!(
                    "{} of {} deliveries failed",
                    report.failed().len(),
                    report.attempted()
                )
                .into());
            }
        }
        Command::New { date, planned } => {
            let Project { config, base, .. } = Project::load(&cli.config)?;
            let root = ContentRoot::select(planned, env_var("NEWSLETTER_ROOT").as_deref())?;
            let today = chrono::Local::now().date_naive();
            let date = scaffold::issue_date(date.as_deref(), today)?;
            let report = scaffold::scaffold_issue(&base.join(root.dir_name(&config.site)), date)?;
            output::print_scaffold_output(&report, &base);
        }
        Command::Index => {
            let Project { base, output_dir, .. } = Project::load(&cli.config)?;
            let (entries, path) = listing::write_listing(&output_dir)?;
            output::print_listing_output(&entries, &path, &base);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Loaded config plus the directories its relative paths resolve against.
struct Project {
    config: Config,
    base: PathBuf,
    output_dir: PathBuf,
}

impl Project {
    fn load(config_path: &Path) -> Result<Self, config::ConfigError> {
        let config = config::load_config(config_path)?;
        let base = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let output_dir = base.join(&config.site.output_dir);
        Ok(Self {
            config,
            base,
            output_dir,
        })
    }
}

fn resolve(
    config: &Config,
    base: &Path,
    target: &IssueArgs,
) -> Result<(ResolvedIssue, issue::IssueSource), Box<dyn std::error::Error>> {
    let root = ContentRoot::select(target.planned, env_var("NEWSLETTER_ROOT").as_deref())?;
    let resolved = issue::resolve_issue(
        base,
        &config.site,
        root,
        target.issue.as_deref(),
        env_var("NEWSLETTER_ISSUE").as_deref(),
    )?;
    Ok(resolved)
}

fn send<T: Transport>(
    transport: &T,
    config: &Config,
    document: &RenderedDocument,
    recipients: &[String],
    sender: &Sender,
) -> Result<delivery::DeliveryReport, delivery::DeliveryError> {
    delivery::deliver(
        transport,
        document,
        recipients,
        sender,
        &DeliverySettings::from(&config.smtp),
        std::thread::sleep,
    )
}
