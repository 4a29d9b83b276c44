//! The eIDAS specific proxy service daemon.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use clap::Parser;
use log::{error, info};
use tokio::runtime;
use eidas_proxy::commons::ProxyResult;
use eidas_proxy::config::Config;
use eidas_proxy::constants::{
    PROXY_DEFAULT_CONFIG_FILE, PROXY_SERVER_APP, PROXY_VERSION,
};
use eidas_proxy::http::start::start_proxy_daemon;
use eidas_proxy::idp::oidc::OidcIdentityProvider;
use eidas_proxy::light::node::StoreNodeCommunication;
use eidas_proxy::light::registry::AttributeRegistry;
use eidas_proxy::proxy::{ProxyService, ProxySettings};
use eidas_proxy::proxy::csrf::CsrfStateBinder;


//------------ Options -------------------------------------------------------

/// The command line options for the proxy daemon.
#[derive(clap::Parser)]
#[command(
    version,
    about = "The eIDAS specific proxy service.",
)]
struct Options {
    /// Path to the config file.
    #[arg(
        short, long,
        env = "EIDAS_PROXY_CONFIG",
        default_value = PROXY_DEFAULT_CONFIG_FILE,
    )]
    config: PathBuf,
}


//------------ main ----------------------------------------------------------

fn main() {
    let options = Options::parse();

    let config = match Config::create(&options.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };
    if let Err(err) = config.init_logging() {
        eprintln!("{err}");
        process::exit(1);
    }
    info!("{PROXY_SERVER_APP} {PROXY_VERSION} starting up");

    let runtime = match runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Cannot create runtime: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(config)) {
        error!("{PROXY_SERVER_APP} failed: {err}");
        process::exit(1);
    }
}

/// Assembles the proxy from the config and runs it.
async fn run(config: Config) -> ProxyResult<()> {
    let handle = runtime::Handle::current();
    let registry = AttributeRegistry::eidas_core();

    let idp = OidcIdentityProvider::discover(
        &config.oidc,
        config.upstream_timeout(),
        config.response_issuer.clone(),
        registry.clone(),
    ).await?;

    let node = StoreNodeCommunication::in_memory(
        config.light_token.request.codec(),
        config.light_token.response.codec(),
        config.node_store_ttl(),
        Some(&handle),
    );

    let service = ProxyService::new(
        ProxySettings::from_config(&config),
        Arc::new(node),
        Arc::new(idp),
        config.light_token.response.codec(),
        registry,
        CsrfStateBinder::new(config.oidc.state_cookie.clone()),
        Some(&handle),
    );

    start_proxy_daemon(Arc::new(config), Arc::new(service), None).await
}
