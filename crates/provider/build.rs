fn main() -> Result<(), Box<dyn std::error::Error>> {
    let tfplugin_proto = "proto/tfplugin6.proto";

    // Use the bundled protoc unless the environment provides one
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    println!("cargo:rerun-if-changed={}", tfplugin_proto);

    // Terraform plugin protocol (server only)
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile(&[tfplugin_proto], &["proto"])?;

    Ok(())
}
