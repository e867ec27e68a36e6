//! Install / Remove Commands - apply a driver profile
//!
//! The package set is computed against the local database, then handed to
//! the orchestrator on the Pacman or AUR path according to the profile's
//! source. Output is streamed until the operation finishes.

use anyhow::{anyhow, Context, Result};
use owo_colors::OwoColorize;
use tracing::info;

use rscn_common::catalog::{all_profiles, find_profile};
use rscn_common::reconcile::install_status;
use rscn_common::{Config, DriverProfile, InstallStatus, PackageLookup, PackageSource};

use super::progress::follow;
use super::{system_orchestrator, system_query, CommandStatus};

/// Missing required packages, plus missing optional ones on request
pub fn install_plan(
    profile: &DriverProfile,
    lookup: &dyn PackageLookup,
    include_optional: bool,
) -> Vec<String> {
    let mut packages = profile.missing_packages(lookup);
    if include_optional {
        for pkg in &profile.optional_packages {
            if !lookup.is_installed(pkg) && !packages.contains(pkg) {
                packages.push(pkg.clone());
            }
        }
    }
    packages
}

/// Installed packages of `profile` that no other fully installed profile
/// requires
///
/// Shared packages such as `mesa` or `nvidia-utils` stay in place while
/// another installed profile still depends on them.
pub fn removable_packages(profile: &DriverProfile, lookup: &dyn PackageLookup) -> Vec<String> {
    let retained: Vec<String> = all_profiles()
        .into_iter()
        .filter(|other| other.id != profile.id)
        .filter(|other| install_status(other, lookup) == InstallStatus::FullyInstalled)
        .flat_map(|other| other.required_packages)
        .collect();

    profile
        .installed_packages(lookup)
        .into_iter()
        .filter(|pkg| !retained.contains(pkg))
        .collect()
}

fn lookup_profile(id: &str) -> Result<DriverProfile> {
    find_profile(id).ok_or_else(|| {
        anyhow!(
            "Unknown profile '{}'. Run `rscnctl profiles` to list the catalog.",
            id
        )
    })
}

pub async fn install(config: &Config, id: &str, include_optional: bool) -> Result<CommandStatus> {
    let profile = lookup_profile(id)?;
    let query = system_query(config);

    let packages = install_plan(&profile, query.as_ref(), include_optional);
    if packages.is_empty() {
        println!(
            "{} {} is already installed.",
            "✓".green(),
            profile.display_name
        );
        return Ok(CommandStatus::Success);
    }

    info!("Installing {}: {}", profile.id, packages.join(" "));
    println!(
        "Installing {} ({}): {}",
        profile.display_name.bold(),
        profile.source,
        packages.join(" ")
    );

    let orchestrator = system_orchestrator(config, &query);
    let mut events = orchestrator.subscribe();
    match profile.source {
        PackageSource::Pacman => orchestrator.install_packages(&packages),
        PackageSource::Aur => orchestrator.install_aur_packages(&packages),
    }
    .with_context(|| format!("Cannot install {}", profile.id))?;

    let outcome = follow(&orchestrator, &mut events).await?;
    if !outcome.is_success() {
        return Ok(CommandStatus::OperationFailed);
    }

    let nvidia_proprietary = profile
        .kind()
        .is_some_and(|kind| kind.is_nvidia_proprietary());
    if nvidia_proprietary && query.is_kms_hook_present() {
        println!();
        println!(
            "{} The kms hook in {} loads nouveau early and can block the NVIDIA module.",
            "!".yellow().bold(),
            query.config().mkinitcpio_conf.display()
        );
        println!("  Run `rscnctl fixup kms-hook`, then reboot.");
    }

    Ok(CommandStatus::Success)
}

pub async fn remove(config: &Config, id: &str) -> Result<CommandStatus> {
    let profile = lookup_profile(id)?;
    let query = system_query(config);

    let packages = removable_packages(&profile, query.as_ref());
    if packages.is_empty() {
        println!("Nothing to remove for {}.", profile.display_name);
        return Ok(CommandStatus::Success);
    }

    info!("Removing {}: {}", profile.id, packages.join(" "));
    println!(
        "Removing {}: {}",
        profile.display_name.bold(),
        packages.join(" ")
    );

    let orchestrator = system_orchestrator(config, &query);
    let mut events = orchestrator.subscribe();
    match profile.source {
        PackageSource::Pacman => orchestrator.remove_packages(&packages),
        PackageSource::Aur => orchestrator.remove_aur_packages(&packages),
    }
    .with_context(|| format!("Cannot remove {}", profile.id))?;

    let outcome = follow(&orchestrator, &mut events).await?;
    Ok(if outcome.is_success() {
        CommandStatus::Success
    } else {
        CommandStatus::OperationFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn installed(packages: &[&'static str]) -> HashSet<&'static str> {
        packages.iter().copied().collect()
    }

    #[test]
    fn test_install_plan_only_missing() {
        let profile = find_profile("nvidia-proprietary").unwrap();
        let lookup = installed(&["nvidia-utils"]);
        assert_eq!(install_plan(&profile, &lookup, false), vec!["nvidia-dkms"]);
    }

    #[test]
    fn test_install_plan_with_optional() {
        let profile = find_profile("nvidia-proprietary").unwrap();
        let lookup = installed(&["nvidia-utils", "nvidia-settings"]);
        assert_eq!(
            install_plan(&profile, &lookup, true),
            vec!["nvidia-dkms", "lib32-nvidia-utils"]
        );
    }

    #[test]
    fn test_install_plan_nothing_to_do() {
        let profile = find_profile("intel-modern").unwrap();
        let lookup = installed(&["mesa", "vulkan-intel", "intel-media-driver"]);
        assert!(install_plan(&profile, &lookup, false).is_empty());
    }

    #[test]
    fn test_removable_disjoint_profiles() {
        // Both fully installed and disjoint: each removes its own set
        let profile = find_profile("nvidia-proprietary").unwrap();
        let lookup = installed(&["nvidia-dkms", "nvidia-utils", "mesa", "xf86-video-nouveau"]);
        assert_eq!(
            removable_packages(&profile, &lookup),
            vec!["nvidia-dkms", "nvidia-utils"]
        );

        let nouveau = find_profile("nvidia-nouveau").unwrap();
        assert_eq!(
            removable_packages(&nouveau, &lookup),
            vec!["mesa", "xf86-video-nouveau"]
        );
    }

    #[test]
    fn test_removable_keeps_packages_of_installed_variant() {
        let profile = find_profile("nvidia-lts").unwrap();
        let lookup = installed(&["nvidia", "nvidia-lts", "nvidia-utils"]);
        assert_eq!(removable_packages(&profile, &lookup), vec!["nvidia-lts"]);
    }

    #[test]
    fn test_removable_includes_optional() {
        let profile = find_profile("intel-legacy").unwrap();
        let lookup = installed(&["mesa", "libva-intel-driver", "xf86-video-intel"]);
        assert_eq!(
            removable_packages(&profile, &lookup),
            vec!["mesa", "libva-intel-driver", "xf86-video-intel"]
        );
    }

    #[test]
    fn test_unknown_profile() {
        let err = lookup_profile("nvidia-9000").unwrap_err();
        assert!(err.to_string().contains("nvidia-9000"));
    }
}
