//! Version comparison for the CLI self-update check

use crate::error::Result;
use crate::product::ProductConfig;
use crate::registry::RegistryClient;
use semver::Version;

/// Compare the running CLI version against the newest published one.
/// Returns a warning message if a newer version is available.
pub fn check_update(
    package_name: &str,
    cli_version: &str,
    latest_version: &str,
    upgrade_command: &str,
) -> Option<String> {
    let cli_ver = parse_version(cli_version).ok()?;
    let latest_ver = parse_version(latest_version).ok()?;

    if latest_ver > cli_ver {
        Some(format!(
            "Please update {} manually. Current version: {}, latest version: {}\n\
             Update with: {}",
            package_name, cli_ver, latest_ver, upgrade_command
        ))
    } else {
        None
    }
}

/// Ask the registry whether a compatible newer CLI version was published
pub async fn check_global_update<C: ProductConfig>(
    product: &C,
    client: &RegistryClient,
    cli_version: &str,
) -> Result<Option<String>> {
    let newest = client
        .newest_compatible(product.package_name(), cli_version)
        .await?;
    Ok(newest.and_then(|latest| {
        check_update(
            product.package_name(),
            cli_version,
            &latest,
            product.upgrade_command(),
        )
    }))
}

/// Parse version string, tolerating a leading `v`
pub fn parse_version(version_str: &str) -> std::result::Result<Version, semver::Error> {
    let cleaned = version_str.trim();
    let cleaned = cleaned.strip_prefix('v').unwrap_or(cleaned);
    Version::parse(cleaned)
}
