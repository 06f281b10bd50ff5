//! Plugin server
//!
//! Speaks the go-plugin handshake Terraform expects on stdout, then serves
//! the provider and health services over gRPC until interrupted.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
    PKCS_ECDSA_P256_SHA256,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tonic_health::ServingStatus;
use tracing::info;

use crate::provider::AzureRmProvider;
use crate::tfplugin6::provider_server::ProviderServer;

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str = "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

/// Terraform's PEM client certificate when it wants mutual TLS
pub const CLIENT_CERT_KEY: &str = "PLUGIN_CLIENT_CERT";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PLUGIN_PROTOCOL_VERSION: u32 = 6;
const PROVIDER_ADDRESS: &str = "registry.terraform.io/hashicorp/azurerm";

pub fn magic_cookie_matches(value: Option<&str>) -> bool {
    value == Some(MAGIC_COOKIE_VALUE)
}

/// The line go-plugin reads from stdout to find the server
pub fn handshake_line(addr: SocketAddr, server_cert_der: Option<&[u8]>) -> String {
    format!(
        "{}|{}|tcp|{}|grpc|{}",
        CORE_PROTOCOL_VERSION,
        PLUGIN_PROTOCOL_VERSION,
        addr,
        server_cert_der.map(|der| STANDARD_NO_PAD.encode(der)).unwrap_or_default()
    )
}

/// Environment assignment that points Terraform at a running debug server
pub fn reattach_line(addr: SocketAddr, pid: u32) -> String {
    let providers = serde_json::json!({
        PROVIDER_ADDRESS: {
            "Protocol": "grpc",
            "ProtocolVersion": PLUGIN_PROTOCOL_VERSION,
            "Pid": pid,
            "Test": true,
            "Addr": {"Network": "tcp", "String": addr.to_string()},
        }
    });
    format!("TF_REATTACH_PROVIDERS='{}'", providers)
}

/// Self-signed certificate for the server side of mutual TLS.
/// Returns the DER encoding announced in the handshake and the identity.
fn generate_certificate() -> Result<(Vec<u8>, Identity)> {
    let mut params = CertificateParams::new(vec!["localhost".to_string()])?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::KeyAgreement,
        KeyUsagePurpose::KeyCertSign,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth, ExtendedKeyUsagePurpose::ClientAuth];
    params.distinguished_name.push(DnType::OrganizationName, "HashiCorp");
    params.distinguished_name.push(DnType::CommonName, "localhost");

    let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;
    let cert = params.self_signed(&key)?;
    let identity = Identity::from_pem(cert.pem(), key.serialize_pem());
    Ok((cert.der().to_vec(), identity))
}

/// Run the plugin server until Ctrl-C.
///
/// `client_cert` is the PEM certificate Terraform passed in
/// `PLUGIN_CLIENT_CERT`; `debug` prints reattach details instead of
/// expecting Terraform to have started the process.
pub async fn serve(provider: AzureRmProvider, client_cert: Option<String>, debug: bool) -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    info!("Provider listening on {}", addr);

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_service_status("plugin", ServingStatus::Serving).await;

    let mut builder = Server::builder();
    let mut server_cert = None;
    if let Some(client_cert) = client_cert.filter(|c| !c.trim().is_empty()) {
        let (der, identity) = generate_certificate().context("Failed to generate server certificate")?;
        let tls = ServerTlsConfig::new()
            .identity(identity)
            .client_ca_root(Certificate::from_pem(client_cert));
        builder = builder.tls_config(tls).context("Failed to configure TLS")?;
        server_cert = Some(der);
        info!("Serving with mutual TLS");
    }

    if debug {
        println!("Provider started. To attach Terraform CLI, set the TF_REATTACH_PROVIDERS environment variable:\n");
        println!("\t{}\n", reattach_line(addr, std::process::id()));
    } else {
        println!("{}", handshake_line(addr, server_cert.as_deref()));
    }

    builder
        .add_service(health_service)
        .add_service(ProviderServer::new(provider))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Interrupted, shutting down");
        })
        .await?;
    Ok(())
}
