use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use maskinporten_operator::{
    controller::{self, OperatorContext},
    crd::MaskinportenClient,
    maskinporten::{ClientRegistry, CredentialProvider, MaskinportenApiConfig},
    Error,
};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
    /// Show cluster information
    Info(InfoArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Namespace to watch (all namespaces when unset)
    #[arg(long, env = "OPERATOR_NAMESPACE")]
    namespace: Option<String>,

    /// Service owner short name, the prefix of every MaskinportenClient name
    #[arg(long, env = "OPERATOR_SERVICE_OWNER")]
    service_owner: String,

    /// Environment the operator runs in, e.g. at22 or tt02
    #[arg(long, env = "OPERATOR_ENVIRONMENT")]
    environment: String,

    /// Client id of the operator's own Maskinporten integration
    #[arg(long, env = "MASKINPORTEN_CLIENT_ID")]
    maskinporten_client_id: String,

    /// Maskinporten base URL
    #[arg(long, env = "MASKINPORTEN_URL", default_value = "https://test.maskinporten.no/")]
    maskinporten_url: String,

    /// Scopes requested for the operator's own token
    #[arg(long, env = "MASKINPORTEN_SCOPE")]
    maskinporten_scope: String,

    /// Private RSA key as a JSON Web Key
    #[arg(
        long,
        env = "MASKINPORTEN_JWK",
        hide_env_values = true,
        conflicts_with = "maskinporten_jwk_file"
    )]
    maskinporten_jwk: Option<String>,

    /// File containing the private RSA key as a JSON Web Key
    #[arg(long, env = "MASKINPORTEN_JWK_FILE")]
    maskinporten_jwk_file: Option<PathBuf>,

    /// Port of the REST API
    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    api_port: u16,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl RunArgs {
    fn maskinporten_config(&self) -> Result<MaskinportenApiConfig, Error> {
        let config = match (&self.maskinporten_jwk, &self.maskinporten_jwk_file) {
            (Some(jwk), _) => MaskinportenApiConfig {
                client_id: self.maskinporten_client_id.clone(),
                url: self.maskinporten_url.clone(),
                jwk: jwk.clone(),
                scope: self.maskinporten_scope.clone(),
            },
            (None, Some(path)) => MaskinportenApiConfig::with_jwk_file(
                self.maskinporten_client_id.clone(),
                self.maskinporten_url.clone(),
                path,
                self.maskinporten_scope.clone(),
            )?,
            (None, None) => {
                return Err(Error::ConfigError(
                    "one of --maskinporten-jwk or --maskinporten-jwk-file is required".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn operator_context(&self) -> Result<OperatorContext, Error> {
        OperatorContext::new(self.service_owner.clone(), self.environment.clone())
    }

    fn watched_namespace(&self) -> Option<String> {
        self.namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
    }
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Operator namespace
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "default")]
    namespace: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("Maskinporten Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Info(info_args) => run_info(info_args).await,
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true))
            .init(),
    }
}

async fn run_info(args: InfoArgs) -> Result<(), Error> {
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    let api: kube::Api<MaskinportenClient> = kube::Api::namespaced(client, &args.namespace);
    let clients = api
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?;

    println!("Managed MaskinportenClients: {}", clients.items.len());
    Ok(())
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.log_format);

    info!(
        "Starting Maskinporten Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let operator_context = args.operator_context()?;
    let provider = Arc::new(CredentialProvider::new(args.maskinporten_config()?)?);

    // Discovery failures are not fatal here; the caches retry on first use.
    match provider.discovery_metadata().await {
        Ok(metadata) => info!("Using Maskinporten issuer {}", metadata.issuer),
        Err(e) => warn!("Maskinporten discovery failed at startup: {}", e),
    }

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let state = Arc::new(controller::ControllerState::new(
        client,
        Arc::new(ClientRegistry::new()),
        provider,
        operator_context,
        args.watched_namespace(),
    ));

    #[cfg(feature = "rest-api")]
    {
        let api_state = Arc::clone(&state);
        let port = args.api_port;
        tokio::spawn(async move {
            if let Err(e) = maskinporten_operator::rest_api::run_server(api_state, port).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }

    controller::run_controller(state).await
}
