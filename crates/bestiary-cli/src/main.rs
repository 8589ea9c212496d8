use std::io;
use std::path::PathBuf;

use anyhow::Context;
use bestiary_fetch::{acquire, apply, AcquireConfig, HttpSession, Manifest, Target};
use bestiary_table::{extract, ExtractConfig};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use futures::future;
use tokio::runtime;
use url::Url;

mod report;

use report::ReportView;

const WIKI_URL: &str = "https://en.wikipedia.org/wiki/List_of_animal_names";
const DEFAULT_SNAPSHOT: &str = "data/raw_snapshot.html";
const LOG_FILTER: &str = "bestiary_table=info,bestiary_fetch=info,bestiary=info";
const VERBOSE_LOG_FILTER: &str = "bestiary_table=debug,bestiary_fetch=debug,bestiary=debug";

/// Collateral adjectives of animals, with a photo of each
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[command(name = "fetch")]
    Fetch(FetchArgs),
    #[command(name = "run")]
    Run(RunArgs),
    #[command(hide = true)]
    Completion,
}

/// Save a snapshot of the list of animal names
#[derive(Debug, clap::Args)]
pub struct FetchArgs {
    /// Page to download
    #[arg(long, default_value = WIKI_URL)]
    pub url: String,
    /// Path of the saved snapshot
    #[arg(long, short, default_value = DEFAULT_SNAPSHOT)]
    pub output: PathBuf,
    /// Custom user agent to download the page
    #[arg(long)]
    pub user_agent: Option<String>,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

pub fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let user_agent = args
        .user_agent
        .unwrap_or_else(|| AcquireConfig::default().user_agent);
    let client = reqwest::blocking::ClientBuilder::new()
        .user_agent(user_agent)
        .build()?;
    let page = client.get(&args.url).send()?.error_for_status()?.text()?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(&args.output, page)?;
    log::info!("Saved {} to {}", args.url, args.output.display());
    Ok(())
}

/// Extract adjectives from a snapshot, download photos and write the report
#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Saved page holding the collateral adjective table
    #[arg(long, short, default_value = DEFAULT_SNAPSHOT)]
    pub snapshot: PathBuf,
    /// Path to the HTML report to write
    #[arg(long, short)]
    pub output: PathBuf,
    /// Override the directory photos are saved to
    #[arg(long)]
    pub image_dir: Option<PathBuf>,
    /// Path of the download manifest
    #[arg(long, default_value = "data/manifest.json")]
    pub manifest: PathBuf,
    /// Override the number of download workers
    #[arg(long)]
    pub workers: Option<usize>,
    /// Override the number of attempts per photo
    #[arg(long)]
    pub retries: Option<u32>,
    /// Keep photos and placeholders recorded by a previous run
    #[arg(long)]
    pub reuse_manifest: bool,
    /// Optional yaml configuration of the downloads
    #[arg(env = "BESTIARY_CONFIG", long)]
    pub config: Option<PathBuf>,
    /// Override the base URL animal links are resolved against
    #[arg(long)]
    pub base_url: Option<Url>,
    /// Override the seed of the retry jitter
    #[arg(long)]
    pub seed: Option<u64>,
    /// No SIGINT handling, an interrupted run saves no manifest
    #[arg(long)]
    pub no_sigint: bool,
    /// When quiet no logs are outputted
    #[arg(long, short, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Log every decision
    #[arg(long, short)]
    pub verbose: bool,
}

impl TryFrom<&RunArgs> for AcquireConfig {
    type Error = anyhow::Error;

    fn try_from(args: &RunArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(path) = &args.config {
            let file = fs_err::File::open(path)?;
            serde_yaml::from_reader(file)
                .with_context(|| format!("Invalid configuration {}", path.display()))?
        } else {
            AcquireConfig::default()
        };
        if let Some(image_dir) = &args.image_dir {
            conf.image_dir = image_dir.clone();
        }
        if let Some(workers) = args.workers {
            conf.num_workers = workers;
        }
        if let Some(retries) = args.retries {
            conf.retries = retries;
        }
        if let Some(seed) = args.seed {
            conf.seed = Some(seed);
        }
        Ok(conf)
    }
}

impl From<&RunArgs> for ExtractConfig {
    fn from(args: &RunArgs) -> Self {
        match &args.base_url {
            Some(base_url) => Self {
                base_url: base_url.clone(),
            },
            None => Self::default(),
        }
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let acquire_conf = AcquireConfig::try_from(&args)?;
    let extract_conf = ExtractConfig::from(&args);

    let html = fs_err::read_to_string(&args.snapshot)?;
    let mut catalog = extract(&html, &extract_conf)
        .with_context(|| format!("Couldn't read the table of {}", args.snapshot.display()))?;

    let reuse = if args.reuse_manifest {
        Some(Manifest::load(&args.manifest)?)
    } else {
        None
    };
    let targets: Vec<Target> = catalog.targets().map(Target::from).collect();

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let acquired = rt.block_on(acquire::<HttpSession>(
        targets,
        &acquire_conf,
        &acquire_conf,
        reuse.as_ref(),
        shutdown(!args.no_sigint),
    ))?;

    Manifest::save(&acquired.manifest, &args.manifest)?;
    if acquired.failed_workers > 0 {
        log::warn!("{} download workers stopped early", acquired.failed_workers);
    }
    if acquired.interrupted {
        anyhow::bail!("Interrupted");
    }

    apply(&mut catalog, &acquired.manifest);
    ReportView::from(&catalog).write(&args.output)?;
    log::info!("Report written to {}", args.output.display());
    Ok(())
}

async fn shutdown(handle_sigint: bool) {
    if handle_sigint {
        match tokio::signal::ctrl_c().await {
            Ok(()) => return,
            Err(e) => log::warn!("Couldn't listen for SIGINT: {e}"),
        }
    }
    future::pending::<()>().await
}

fn init_logger(quiet: bool, verbose: bool) {
    if quiet {
        return;
    }
    let filter = if verbose { VERBOSE_LOG_FILTER } else { LOG_FILTER };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Fetch(args) => {
            init_logger(args.quiet, false);
            fetch(args)
        }
        SubCommand::Run(args) => {
            init_logger(args.quiet, args.verbose);
            run(args)
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "bestiary", &mut io::stdout());
            Ok(())
        }
    }
}
