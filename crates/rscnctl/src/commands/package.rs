//! Package Command - installed and repository versions

use anyhow::Result;
use owo_colors::OwoColorize;

use rscn_common::{CommandRunner, Config, PackageQuery};

use super::system_query;
use crate::output::{print_footer, print_header};

/// Version lookup result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersions {
    pub installed: Option<String>,
    pub available: Option<String>,
}

impl PackageVersions {
    pub fn lookup<R: CommandRunner>(query: &PackageQuery<R>, name: &str) -> Self {
        Self {
            installed: query.installed_version(name),
            available: query.available_version(name),
        }
    }

    /// Installed and older than the repository
    pub fn update_available(&self) -> bool {
        matches!((&self.installed, &self.available), (Some(i), Some(a)) if i != a)
    }
}

pub fn run(config: &Config, name: &str) -> Result<()> {
    let query = system_query(config);
    let versions = PackageVersions::lookup(query.as_ref(), name);

    print_header(&format!("Package {}", name));
    println!(
        "  Installed:  {}",
        versions
            .installed
            .as_deref()
            .map(|v| v.green().to_string())
            .unwrap_or_else(|| "not installed".dimmed().to_string())
    );
    println!(
        "  Repository: {}",
        versions
            .available
            .as_deref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "not in the sync databases".dimmed().to_string())
    );
    if versions.update_available() {
        println!("  {}", "Update available".yellow());
    }
    println!();
    print_footer();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rscn_common::config::PackageConfig;
    use rscn_common::{CommandOutput, FakeCommandRunner};

    #[test]
    fn test_lookup_versions() {
        let fake = FakeCommandRunner::new()
            .respond("pacman -Q mesa", CommandOutput::ok("mesa 1:24.1.3-1\n"))
            .respond(
                "pacman -Si mesa",
                CommandOutput::ok("Repository      : extra\nName            : mesa\nVersion         : 1:24.1.4-1\n"),
            );
        let query = PackageQuery::new(fake, PackageConfig::default());

        let versions = PackageVersions::lookup(&query, "mesa");
        assert_eq!(versions.installed.as_deref(), Some("1:24.1.3-1"));
        assert_eq!(versions.available.as_deref(), Some("1:24.1.4-1"));
        assert!(versions.update_available());
    }

    #[test]
    fn test_unknown_package() {
        let query = PackageQuery::new(FakeCommandRunner::new(), PackageConfig::default());
        let versions = PackageVersions::lookup(&query, "nope");
        assert_eq!(versions, PackageVersions { installed: None, available: None });
        assert!(!versions.update_available());
    }
}
