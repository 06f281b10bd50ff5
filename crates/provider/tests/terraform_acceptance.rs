use std::path::{Path, PathBuf};
use std::process::Command;

const CREDENTIAL_VARIABLES: &[&str] = &["ARM_SUBSCRIPTION_ID", "ARM_CLIENT_ID", "ARM_CLIENT_SECRET", "ARM_TENANT_ID"];

fn in_path(bin: &str) -> bool {
    Command::new("sh")
        .arg("-lc")
        .arg(format!("command -v {bin} >/dev/null 2>&1"))
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn provider_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_terraform-provider-azurerm"))
        .parent()
        .expect("provider binary has a parent directory")
        .to_path_buf()
}

/// CLI config that makes Terraform use the freshly built provider
fn write_cli_config(dir: &Path) -> PathBuf {
    let path = dir.join("terraform.rc");
    let config = format!(
        r#"provider_installation {{
  dev_overrides {{
    "hashicorp/azurerm" = "{}"
  }}
  direct {{}}
}}
"#,
        provider_dir().display()
    );
    std::fs::write(&path, config).expect("write terraform.rc");
    path
}

fn terraform(dir: &Path, cli_config: &Path, args: &[&str]) -> i32 {
    let status = Command::new("terraform")
        .args(args)
        .arg("-input=false")
        .env("TF_CLI_CONFIG_FILE", cli_config)
        .current_dir(dir)
        .status()
        .unwrap_or_else(|e| panic!("run terraform {}: {}", args.join(" "), e));
    status.code().unwrap_or(1)
}

/// Resource Group Acceptance Test
///
/// Applies a configuration with a resource group and the subscription data
/// source, then runs `terraform plan -detailed-exitcode` and asserts the
/// plan is empty. Destroys everything afterwards.
///
/// Marked ignored because it needs Terraform and creates real Azure resources
/// with the credentials in `ARM_*`.
#[test]
#[ignore]
fn resource_group_is_idempotent_after_apply() {
    if !in_path("terraform") {
        eprintln!("Skipping: terraform not available in PATH");
        return;
    }
    if let Some(missing) = CREDENTIAL_VARIABLES.iter().find(|v| std::env::var(v).is_err()) {
        eprintln!("Skipping: {missing} is not set");
        return;
    }

    let workdir = tempfile::tempdir().expect("create working directory");
    let cli_config = write_cli_config(workdir.path());
    let suffix = std::process::id();
    std::fs::write(
        workdir.path().join("main.tf"),
        format!(
            r#"provider "azurerm" {{}}

resource "azurerm_resource_group" "test" {{
  name     = "acctestRG-{suffix}"
  location = "West Europe"

  tags = {{
    environment = "acceptance"
  }}
}}

data "azurerm_subscription" "current" {{}}

output "subscription" {{
  value = data.azurerm_subscription.current.display_name
}}
"#
        ),
    )
    .expect("write main.tf");

    let code = terraform(workdir.path(), &cli_config, &["apply", "-auto-approve"]);
    assert_eq!(code, 0, "terraform apply failed with exit code {code}");

    let code = terraform(workdir.path(), &cli_config, &["plan", "-detailed-exitcode"]);

    let destroyed = terraform(workdir.path(), &cli_config, &["destroy", "-auto-approve"]);
    assert_eq!(
        code, 0,
        "expected no diff after apply; terraform plan exit code was {code}"
    );
    assert_eq!(destroyed, 0, "terraform destroy failed with exit code {destroyed}");
}
