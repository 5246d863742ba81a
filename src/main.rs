use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::try_join_all;
use nestedpatch::config::Config;
use nestedpatch::error::format_error;
use nestedpatch::gcp::auth::StaticToken;
use nestedpatch::gcp::client::GcpClient;
use nestedpatch::gcp::operation::OperationPoller;
use nestedpatch::gcp::transport::Transport;
use nestedpatch::nested::{Lifecycle, NestedResource, ResourceData, Timeouts};
use nestedpatch::resource::egress::EgressPolicyResource;
use nestedpatch::resource::ingress::IngressPolicyResource;
use nestedpatch::resource::perimeter_resource::PerimeterResourceKind;
use nestedpatch::resource::Section;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Manage service perimeter policies and resources one list element at a time
#[derive(Parser, Debug)]
#[command(name = "nestedpatch", version, about, long_about = None)]
struct Args {
    /// Log level for debugging (RUST_LOG overrides)
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Access Context Manager endpoint
    #[arg(long, global = true)]
    base_path: Option<String>,

    /// Project billed for API usage
    #[arg(long, global = true)]
    billing_project: Option<String>,

    /// Use this bearer token instead of Application Default Credentials
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Kind of element to manage
    #[arg(long, value_enum)]
    kind: Kind,

    /// Parent perimeter, `accessPolicies/{policy}/servicePerimeters/{name}` or its self-link
    #[arg(long)]
    perimeter: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add elements to the perimeter (several files run concurrently)
    Create {
        #[command(flatten)]
        target: Target,
        /// YAML or JSON element configuration
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the server-side state of an element
    Read {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace an element with a new configuration
    Update {
        #[command(flatten)]
        target: Target,
        /// Current configuration
        #[arg(long)]
        file: PathBuf,
        /// Desired configuration
        #[arg(long)]
        new_file: PathBuf,
    },
    /// Remove elements from the perimeter (several files run concurrently)
    Delete {
        #[command(flatten)]
        target: Target,
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
    },
    /// Resolve an import id and read the element it names
    Import {
        #[arg(long, value_enum)]
        kind: Kind,
        /// Perimeter name, or `{perimeter}/{resource}` for resources
        #[arg(long)]
        id: String,
        /// Element configuration, required for policies
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    IngressPolicy,
    EgressPolicy,
    DryRunIngressPolicy,
    DryRunEgressPolicy,
    Resource,
    DryRunResource,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().ok();
    let tracing_level = match (level.to_tracing_level(), &env_filter) {
        (Some(l), _) => l,
        (None, Some(_)) => Level::TRACE,
        (None, None) => return None,
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {log_path:?}: {e}");
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let filter = env_filter.unwrap_or_else(|| EnvFilter::new(tracing_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("nestedpatch started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("nestedpatch").join("nestedpatch.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".nestedpatch").join("nestedpatch.log");
    }
    PathBuf::from("nestedpatch.log")
}

/// Shared plumbing handed to every lifecycle
struct Session {
    transport: Arc<dyn Transport>,
    waiter: Arc<OperationPoller>,
    locks: Arc<nestedpatch::nested::LockRegistry>,
    base_path: String,
    timeouts: Timeouts,
}

impl Session {
    async fn new(args: &Args, config: &Config) -> Result<Self> {
        let base_path = config.effective_base_path(args.base_path.as_deref());
        let user_agent = config.effective_user_agent();

        let client = match &args.access_token {
            Some(token) => GcpClient::with_token_source(
                Arc::new(StaticToken(token.clone())),
                &base_path,
                &user_agent,
            )?,
            None => GcpClient::new(&base_path, &user_agent)
                .await
                .context("Failed to load Application Default Credentials")?,
        };
        let client =
            client.with_billing_project(config.effective_billing_project(args.billing_project.as_deref()));

        let base_path = client.base_path.clone();
        tracing::info!("Using endpoint: {}", base_path);

        let transport: Arc<dyn Transport> = Arc::new(client);
        Ok(Self {
            waiter: Arc::new(OperationPoller::new(transport.clone(), &base_path)),
            transport,
            locks: Arc::new(config.lock_registry()),
            base_path,
            timeouts: config.timeouts(),
        })
    }

    fn lifecycle<R: NestedResource>(&self, resource: R) -> Lifecycle<R> {
        Lifecycle::new(
            resource,
            self.transport.clone(),
            self.waiter.clone(),
            self.locks.clone(),
            &self.base_path,
        )
    }
}

/// What gets printed for each element
#[derive(Serialize)]
struct Output<'a, L: Serialize> {
    id: Option<&'a str>,
    perimeter: &'a str,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a L>,
}

fn print_state<L: Serialize>(data: &ResourceData<L>) -> Result<()> {
    let output = Output {
        id: data.id.as_deref(),
        perimeter: &data.perimeter,
        exists: data.exists(),
        state: data.state.as_ref(),
    };
    print!("---\n{}", serde_yaml::to_string(&output)?);
    Ok(())
}

fn load_element<L: DeserializeOwned>(path: &Path) -> Result<L> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {path:?}"))
}

/// Turn a library error into a short message, keeping the detail in the log
fn user_error(err: nestedpatch::Error) -> anyhow::Error {
    tracing::error!("{}", err);
    anyhow::anyhow!(format_error(&err))
}

async fn run<R: NestedResource>(resource: R, ctx: &Session, command: Command) -> Result<()> {
    let lc = ctx.lifecycle(resource);
    let kind = lc.resource().kind();

    match command {
        Command::Create { target, files } => {
            let creates = files.iter().map(|path| {
                let lc = &lc;
                let perimeter = target.perimeter.clone();
                async move {
                    let config = load_element(path)?;
                    let mut data = ResourceData::new(perimeter, config).with_timeouts(ctx.timeouts);
                    lc.create(&mut data)
                        .await
                        .map_err(user_error)
                        .with_context(|| format!("Error creating {kind} from {path:?}"))?;
                    Ok::<_, anyhow::Error>(data)
                }
            });
            for data in try_join_all(creates).await? {
                print_state(&data)?;
            }
        },
        Command::Read { target, file } => {
            let mut data = ResourceData::new(target.perimeter, load_element(&file)?);
            lc.read(&mut data)
                .await
                .map_err(user_error)
                .with_context(|| format!("Error reading {kind}"))?;
            print_state(&data)?;
        },
        Command::Update {
            target,
            file,
            new_file,
        } => {
            let mut data =
                ResourceData::new(target.perimeter, load_element(&file)?).with_timeouts(ctx.timeouts);
            lc.read(&mut data)
                .await
                .map_err(user_error)
                .with_context(|| format!("Error reading {kind}"))?;
            if !data.exists() {
                anyhow::bail!("{kind} described by {file:?} does not exist");
            }
            lc.update(&mut data, load_element(&new_file)?)
                .await
                .map_err(user_error)
                .with_context(|| format!("Error updating {kind}"))?;
            print_state(&data)?;
        },
        Command::Delete { target, files } => {
            let deletes = files.iter().map(|path| {
                let lc = &lc;
                let perimeter = target.perimeter.clone();
                async move {
                    let config = load_element(path)?;
                    let mut data = ResourceData::new(perimeter, config).with_timeouts(ctx.timeouts);
                    lc.delete(&mut data)
                        .await
                        .map_err(user_error)
                        .with_context(|| format!("Error deleting {kind} from {path:?}"))?;
                    Ok::<_, anyhow::Error>(data)
                }
            });
            let deleted = try_join_all(deletes).await?;
            println!("Deleted {} {}", deleted.len(), kind);
        },
        Command::Import { id, file, .. } => {
            let config = file.as_deref().map(load_element::<R::Local>).transpose()?;
            let imported = lc.import(&id, config).map_err(user_error)?;
            for mut data in imported {
                lc.read(&mut data)
                    .await
                    .map_err(user_error)
                    .with_context(|| format!("Error importing {kind} {id:?}"))?;
                if !data.exists() {
                    anyhow::bail!("Cannot import non-existent {kind} {id:?}");
                }
                print_state(&data)?;
            }
        },
    }

    Ok(())
}

fn kind_of(command: &Command) -> Kind {
    match command {
        Command::Create { target, .. }
        | Command::Read { target, .. }
        | Command::Update { target, .. }
        | Command::Delete { target, .. } => target.kind,
        Command::Import { kind, .. } => *kind,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = Config::load();
    let ctx = Session::new(&args, &config).await?;

    let command = args.command;
    match kind_of(&command) {
        Kind::IngressPolicy => run(IngressPolicyResource::new(Section::Status), &ctx, command).await,
        Kind::DryRunIngressPolicy => run(IngressPolicyResource::new(Section::Spec), &ctx, command).await,
        Kind::EgressPolicy => run(EgressPolicyResource::new(Section::Status), &ctx, command).await,
        Kind::DryRunEgressPolicy => run(EgressPolicyResource::new(Section::Spec), &ctx, command).await,
        Kind::Resource => run(PerimeterResourceKind::new(Section::Status), &ctx, command).await,
        Kind::DryRunResource => run(PerimeterResourceKind::new(Section::Spec), &ctx, command).await,
    }
}
