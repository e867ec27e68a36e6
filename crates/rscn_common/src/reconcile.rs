//! Reconciliation of the static catalog against live system state.
//!
//! For one device: keep the profiles its architecture can use, then annotate
//! each with install status, whether it is the driver in use, and the single
//! effective recommendation.

use std::collections::HashSet;
use tracing::debug;

use crate::catalog::{profiles_for_vendor, DriverProfile, InstallStatus};
use crate::hardware::GpuDevice;

/// Source of "is this package installed" answers
pub trait PackageLookup {
    fn is_installed(&self, package: &str) -> bool;
}

impl PackageLookup for HashSet<String> {
    fn is_installed(&self, package: &str) -> bool {
        self.contains(package)
    }
}

impl PackageLookup for HashSet<&str> {
    fn is_installed(&self, package: &str) -> bool {
        self.contains(package)
    }
}

impl<T: PackageLookup + ?Sized> PackageLookup for &T {
    fn is_installed(&self, package: &str) -> bool {
        (**self).is_installed(package)
    }
}

/// Architecture-compatible profiles for `device`, annotated, in catalog order
pub fn profiles_for_device(device: &GpuDevice, lookup: &dyn PackageLookup) -> Vec<DriverProfile> {
    let mut profiles: Vec<DriverProfile> = profiles_for_vendor(device.vendor)
        .into_iter()
        .filter(|profile| profile.supports(device.architecture))
        .collect();

    for profile in &mut profiles {
        profile.install_status = install_status(profile, lookup);
        profile.active = is_driver_active(profile, &device.kernel_driver);
    }

    // Catalog order encodes priority: the first authored recommendation
    // wins, else the first survivor.
    let promoted = profiles
        .iter()
        .position(|p| p.recommended)
        .or_else(|| (!profiles.is_empty()).then_some(0));
    if let Some(index) = promoted {
        profiles[index].effective_recommended = true;
    }

    for profile in &profiles {
        debug!(
            "{} for {}: {:?}, active={}, recommended={}",
            profile.id,
            device.pci_slot,
            profile.install_status,
            profile.active,
            profile.effective_recommended
        );
    }

    profiles
}

/// Install status derived from the required packages
///
/// A profile without required packages is never considered installed.
pub fn install_status(profile: &DriverProfile, lookup: &dyn PackageLookup) -> InstallStatus {
    if profile.required_packages.is_empty() {
        return InstallStatus::NotInstalled;
    }

    let installed = profile
        .required_packages
        .iter()
        .filter(|pkg| lookup.is_installed(pkg))
        .count();

    if installed == 0 {
        InstallStatus::NotInstalled
    } else if installed == profile.required_packages.len() {
        InstallStatus::FullyInstalled
    } else {
        InstallStatus::PartiallyInstalled
    }
}

/// Whether `profile` is the driver bound to the device
///
/// Expects `install_status` to be filled in already. Profiles sharing a
/// kernel driver only count when fully installed.
pub fn is_driver_active(profile: &DriverProfile, kernel_driver: &str) -> bool {
    let Some(kind) = profile.kind() else {
        return false;
    };

    if kernel_driver != kind.expected_driver() {
        return false;
    }
    !kind.requires_full_install() || profile.install_status == InstallStatus::FullyInstalled
}

impl DriverProfile {
    /// Required packages not installed yet, in order
    pub fn missing_packages(&self, lookup: &dyn PackageLookup) -> Vec<String> {
        self.required_packages
            .iter()
            .filter(|pkg| !lookup.is_installed(pkg))
            .cloned()
            .collect()
    }

    /// Required and optional packages that are installed, in order
    pub fn installed_packages(&self, lookup: &dyn PackageLookup) -> Vec<String> {
        self.required_packages
            .iter()
            .chain(self.optional_packages.iter())
            .filter(|pkg| lookup.is_installed(pkg))
            .cloned()
            .collect()
    }
}
