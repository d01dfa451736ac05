use crate::{
    config::{load_cors_conf, CorsConf},
    dispatcher::{Dispatcher, HandlerRequest, HandlerResponse, HeaderVec},
    middleware::{cors_middleware, CorsPolicy},
};
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use http::Method;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Command-line interface for brrtcors
#[derive(Parser)]
#[command(name = "brrtcors")]
#[command(about = "Inspect, validate and exercise CORS policies", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the resolved policy as YAML
    Show {
        /// CORS configuration file (YAML or JSON); the default policy if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load a configuration file and validate the policy
    Validate {
        /// CORS configuration file (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Evaluate a synthetic request against a policy
    Check(CheckArgs),
}

/// Arguments describing the request evaluated by `check`
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// CORS configuration file (YAML or JSON); the default policy if omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Value of the `Origin` header; omitted means a same-origin request
    #[arg(long)]
    pub origin: Option<String>,

    /// Request method
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Value of `Access-Control-Request-Method` (makes an OPTIONS request a preflight)
    #[arg(long)]
    pub request_method: Option<String>,

    /// Value of `Access-Control-Request-Headers`
    #[arg(long)]
    pub request_headers: Option<String>,

    /// Value of the `Host` header
    #[arg(long)]
    pub host: Option<String>,

    /// Request path
    #[arg(long, default_value = "/")]
    pub path: String,
}

fn load_policy(config: Option<&Path>) -> anyhow::Result<CorsPolicy> {
    match config {
        Some(path) => {
            let conf = load_cors_conf(path)?;
            let policy = CorsPolicy::try_from(&conf)
                .with_context(|| format!("Invalid CORS policy in '{}'", path.display()))?;
            Ok(policy)
        }
        None => Ok(CorsPolicy::default()),
    }
}

/// Run `args` through a dispatcher holding a CORS middleware for `policy`
///
/// The handler behind the middleware answers `200 {"handler": "reached"}`, so
/// a response without that body was produced by the middleware itself.
///
/// # Errors
///
/// Returns an error if `--method` is not a valid HTTP method.
pub fn check_request(policy: CorsPolicy, args: &CheckArgs) -> anyhow::Result<HandlerResponse> {
    let method = args
        .method
        .trim()
        .to_ascii_uppercase()
        .parse::<Method>()
        .with_context(|| format!("Invalid method '{}'", args.method))?;

    let mut headers = HeaderVec::new();
    let optional = [
        ("origin", &args.origin),
        ("host", &args.host),
        ("access-control-request-method", &args.request_method),
        ("access-control-request-headers", &args.request_headers),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            headers.push((Arc::from(name), value.clone()));
        }
    }

    let request = HandlerRequest::new(method, &args.path, headers).with_handler_name("cli_check");

    let mut dispatcher = Dispatcher::new();
    dispatcher.add_middleware(Arc::new(cors_middleware(policy)));

    Ok(dispatcher.dispatch(&request, |_req| {
        HandlerResponse::json(200, serde_json::json!({ "handler": "reached" }))
    }))
}

/// Execute a parsed command
///
/// # Errors
///
/// Returns an error if a configuration cannot be loaded, is invalid, or the
/// check request cannot be built.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { config } => {
            let policy = load_policy(config.as_deref())?;
            let conf = CorsConf::from(&policy);
            let yaml = serde_yaml::to_string(&conf).context("Failed to render policy")?;
            print!("{}", yaml);
        }
        Commands::Validate { config } => {
            let policy = load_policy(Some(&config))?;
            if let Err(e) = policy.validate() {
                bail!("{}: {}", config.display(), e);
            }
            info!(config = %config.display(), "CORS configuration is valid");
            println!("✅ {} is valid", config.display());
        }
        Commands::Check(args) => {
            let policy = load_policy(args.config.as_deref())?;
            let resp = check_request(policy, &args)?;
            let reached = resp.body.get("handler").is_some();

            println!("status: {}", resp.status);
            println!(
                "handler: {}",
                if reached { "reached" } else { "short-circuited" }
            );
            for (name, value) in resp
                .headers
                .iter()
                .filter(|(name, _)| name.starts_with("access-control-") || name.as_ref() == "vary")
            {
                println!("{}: {}", name, value);
            }
        }
    }
    Ok(())
}
