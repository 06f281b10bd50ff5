//! Terraform Provider for Azure Resource Manager
//!
//! Started by Terraform, which reads the plugin handshake from stdout.
//! Logs go to stderr.

use clap::Parser;
use tracing::{error, info};

use terraform_provider_azurerm::server::{self, CLIENT_CERT_KEY, MAGIC_COOKIE_KEY};
use terraform_provider_azurerm::AzureRmProvider;

#[derive(Parser, Debug)]
#[command(name = "terraform-provider-azurerm", version, about = "Terraform provider for Azure Resource Manager")]
struct Args {
    /// Run outside Terraform and print the TF_REATTACH_PROVIDERS value to use
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if !args.debug && !server::magic_cookie_matches(std::env::var(MAGIC_COOKIE_KEY).ok().as_deref()) {
        eprintln!(
            "This binary is a plugin. These are not meant to be executed directly.\n\
             Please execute the program that consumes these plugins, which will\n\
             load any plugins automatically"
        );
        std::process::exit(1);
    }

    info!("Starting AzureRM Terraform Provider v{}", env!("CARGO_PKG_VERSION"));

    let client_cert = std::env::var(CLIENT_CERT_KEY).ok();
    if let Err(e) = server::serve(AzureRmProvider::new(), client_cert, args.debug).await {
        error!("Provider server failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}
