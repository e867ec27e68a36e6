//! Driver profile catalog.
//!
//! Authored, static data: every driver offering per vendor, in priority
//! order. This is the only place vendor-specific package names live.
//! Lookups return fresh owned copies, so callers may mutate what they get.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hardware::{Architecture, Vendor};

/// Where a profile's packages come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageSource {
    Pacman,
    #[serde(rename = "AUR")]
    Aur,
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageSource::Pacman => f.write_str("pacman"),
            PackageSource::Aur => f.write_str("AUR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverType {
    OpenSource,
    Proprietary,
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverType::OpenSource => f.write_str("Open Source"),
            DriverType::Proprietary => f.write_str("Proprietary"),
        }
    }
}

/// Derived at reconciliation time, never authored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallStatus {
    #[default]
    NotInstalled,
    PartiallyInstalled,
    FullyInstalled,
}

impl InstallStatus {
    pub fn label(&self) -> &'static str {
        match self {
            InstallStatus::NotInstalled => "Not Installed",
            InstallStatus::PartiallyInstalled => "Partial",
            InstallStatus::FullyInstalled => "Installed",
        }
    }
}

/// Closed set of catalog entries
///
/// Several kinds bind the same kernel driver, so the kind also records
/// whether being active additionally requires a full install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileKind {
    IntelModern,
    IntelLegacy,
    AmdOpenSource,
    AmdLegacy,
    AmdPro,
    NvidiaProprietary,
    NvidiaStandard,
    NvidiaLts,
    Nvidia470xx,
    NvidiaNouveau,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 10] = [
        ProfileKind::IntelModern,
        ProfileKind::IntelLegacy,
        ProfileKind::AmdOpenSource,
        ProfileKind::AmdLegacy,
        ProfileKind::AmdPro,
        ProfileKind::NvidiaProprietary,
        ProfileKind::NvidiaStandard,
        ProfileKind::NvidiaLts,
        ProfileKind::Nvidia470xx,
        ProfileKind::NvidiaNouveau,
    ];

    /// Stable catalog identifier
    pub fn id(&self) -> &'static str {
        match self {
            ProfileKind::IntelModern => "intel-modern",
            ProfileKind::IntelLegacy => "intel-legacy",
            ProfileKind::AmdOpenSource => "amd-opensource",
            ProfileKind::AmdLegacy => "amd-legacy",
            ProfileKind::AmdPro => "amd-pro",
            ProfileKind::NvidiaProprietary => "nvidia-proprietary",
            ProfileKind::NvidiaStandard => "nvidia-standard",
            ProfileKind::NvidiaLts => "nvidia-lts",
            ProfileKind::Nvidia470xx => "nvidia-470xx",
            ProfileKind::NvidiaNouveau => "nvidia-nouveau",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Kernel driver bound to the device when this profile is in use
    pub fn expected_driver(&self) -> &'static str {
        match self {
            ProfileKind::IntelModern | ProfileKind::IntelLegacy => "i915",
            ProfileKind::AmdOpenSource | ProfileKind::AmdPro => "amdgpu",
            ProfileKind::AmdLegacy => "radeon",
            ProfileKind::NvidiaProprietary
            | ProfileKind::NvidiaStandard
            | ProfileKind::NvidiaLts
            | ProfileKind::Nvidia470xx => "nvidia",
            ProfileKind::NvidiaNouveau => "nouveau",
        }
    }

    /// Whether activity needs every required package installed on top of
    /// the driver-name match
    pub fn requires_full_install(&self) -> bool {
        matches!(
            self,
            ProfileKind::AmdPro
                | ProfileKind::NvidiaProprietary
                | ProfileKind::NvidiaStandard
                | ProfileKind::NvidiaLts
                | ProfileKind::Nvidia470xx
        )
    }

    /// Proprietary NVIDIA module built for the running kernel
    pub fn is_nvidia_proprietary(&self) -> bool {
        self.expected_driver() == "nvidia"
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A catalog entry as authored
#[derive(Debug)]
pub struct ProfileTemplate {
    pub kind: ProfileKind,
    pub display_name: &'static str,
    pub required_packages: &'static [&'static str],
    pub optional_packages: &'static [&'static str],
    pub source: PackageSource,
    pub driver_type: DriverType,
    pub recommended: bool,
    pub vendor: Vendor,
    pub description: &'static str,
    /// Empty matches every architecture of `vendor`
    pub supported_archs: &'static [Architecture],
}

impl ProfileTemplate {
    fn instantiate(&self) -> DriverProfile {
        DriverProfile {
            id: self.kind.id().to_string(),
            display_name: self.display_name.to_string(),
            required_packages: self.required_packages.iter().map(|s| s.to_string()).collect(),
            optional_packages: self.optional_packages.iter().map(|s| s.to_string()).collect(),
            source: self.source,
            driver_type: self.driver_type,
            recommended: self.recommended,
            vendor: self.vendor,
            description: self.description.to_string(),
            supported_archs: self.supported_archs.to_vec(),
            active: false,
            install_status: InstallStatus::NotInstalled,
            effective_recommended: false,
        }
    }
}

/// One way to drive a GPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: String,
    pub display_name: String,
    pub required_packages: Vec<String>,
    pub optional_packages: Vec<String>,
    pub source: PackageSource,
    pub driver_type: DriverType,
    /// As authored in the catalog
    pub recommended: bool,
    pub vendor: Vendor,
    pub description: String,
    pub supported_archs: Vec<Architecture>,

    // Populated by the reconciler
    pub active: bool,
    pub install_status: InstallStatus,
    pub effective_recommended: bool,
}

impl DriverProfile {
    pub fn kind(&self) -> Option<ProfileKind> {
        ProfileKind::from_id(&self.id)
    }

    pub fn supports(&self, arch: Architecture) -> bool {
        self.supported_archs.is_empty() || self.supported_archs.contains(&arch)
    }
}

// ============================================================================
// Authored data
// ============================================================================

const NVIDIA_MODERN: &[Architecture] = &[
    Architecture::NvidiaMaxwell,
    Architecture::NvidiaPascal,
    Architecture::NvidiaTuring,
    Architecture::NvidiaAmpere,
    Architecture::NvidiaAdaLovelace,
];

const AMD_MODERN: &[Architecture] = &[
    Architecture::AmdGcn,
    Architecture::AmdRdna,
    Architecture::AmdIntegrated,
];

static INTEL_PROFILES: &[ProfileTemplate] = &[
    ProfileTemplate {
        kind: ProfileKind::IntelModern,
        display_name: "Intel Mesa (Broadwell+)",
        required_packages: &["mesa", "vulkan-intel", "intel-media-driver"],
        optional_packages: &["lib32-mesa", "lib32-vulkan-intel"],
        source: PackageSource::Pacman,
        driver_type: DriverType::OpenSource,
        recommended: true,
        vendor: Vendor::Intel,
        description: "Open-source Mesa/Vulkan driver for Intel HD/UHD/Iris/Arc GPUs (Broadwell and newer).",
        supported_archs: &[Architecture::IntelBroadwellPlus, Architecture::IntelArc],
    },
    ProfileTemplate {
        kind: ProfileKind::IntelLegacy,
        display_name: "Intel Mesa (Legacy)",
        required_packages: &["mesa", "libva-intel-driver"],
        optional_packages: &["lib32-mesa", "xf86-video-intel"],
        source: PackageSource::Pacman,
        driver_type: DriverType::OpenSource,
        recommended: false,
        vendor: Vendor::Intel,
        description: "Open-source Mesa driver for older Intel GPUs (pre-Broadwell, GMA series).",
        supported_archs: &[Architecture::IntelLegacy],
    },
];

static AMD_PROFILES: &[ProfileTemplate] = &[
    ProfileTemplate {
        kind: ProfileKind::AmdOpenSource,
        display_name: "AMD Mesa / AMDGPU (Open Source)",
        required_packages: &["mesa", "xf86-video-amdgpu", "vulkan-radeon"],
        optional_packages: &["lib32-mesa", "lib32-vulkan-radeon"],
        source: PackageSource::Pacman,
        driver_type: DriverType::OpenSource,
        recommended: true,
        vendor: Vendor::Amd,
        description: "Open-source AMDGPU kernel driver with Mesa Vulkan, for GCN and newer.",
        supported_archs: AMD_MODERN,
    },
    ProfileTemplate {
        kind: ProfileKind::AmdLegacy,
        display_name: "AMD ATI (Legacy)",
        required_packages: &["mesa", "xf86-video-ati"],
        optional_packages: &["lib32-mesa"],
        source: PackageSource::Pacman,
        driver_type: DriverType::OpenSource,
        recommended: false,
        vendor: Vendor::Amd,
        description: "Open-source ATI driver for pre-GCN AMD/ATI GPUs.",
        supported_archs: &[Architecture::AmdPreGcn],
    },
    ProfileTemplate {
        kind: ProfileKind::AmdPro,
        display_name: "AMDGPU PRO (Proprietary)",
        required_packages: &["amdgpu-pro-libgl"],
        optional_packages: &["opencl-amd"],
        source: PackageSource::Aur,
        driver_type: DriverType::Proprietary,
        recommended: false,
        vendor: Vendor::Amd,
        description: "Proprietary AMDGPU PRO driver from the AUR, for OpenCL or professional applications.",
        supported_archs: AMD_MODERN,
    },
];

static NVIDIA_PROFILES: &[ProfileTemplate] = &[
    ProfileTemplate {
        kind: ProfileKind::NvidiaProprietary,
        display_name: "NVIDIA Proprietary (DKMS)",
        required_packages: &["nvidia-dkms", "nvidia-utils"],
        optional_packages: &["lib32-nvidia-utils", "nvidia-settings"],
        source: PackageSource::Pacman,
        driver_type: DriverType::Proprietary,
        recommended: true,
        vendor: Vendor::Nvidia,
        description: "Proprietary NVIDIA driver built with DKMS, for Maxwell (GTX 900) and newer.",
        supported_archs: NVIDIA_MODERN,
    },
    ProfileTemplate {
        kind: ProfileKind::NvidiaStandard,
        display_name: "NVIDIA Proprietary (Standard)",
        required_packages: &["nvidia", "nvidia-utils"],
        optional_packages: &["lib32-nvidia-utils", "nvidia-settings"],
        source: PackageSource::Pacman,
        driver_type: DriverType::Proprietary,
        recommended: false,
        vendor: Vendor::Nvidia,
        description: "Proprietary NVIDIA driver for the stock linux kernel. Use the DKMS variant for custom kernels.",
        supported_archs: NVIDIA_MODERN,
    },
    ProfileTemplate {
        kind: ProfileKind::NvidiaLts,
        display_name: "NVIDIA Proprietary (LTS Kernel)",
        required_packages: &["nvidia-lts", "nvidia-utils"],
        optional_packages: &["lib32-nvidia-utils", "nvidia-settings"],
        source: PackageSource::Pacman,
        driver_type: DriverType::Proprietary,
        recommended: false,
        vendor: Vendor::Nvidia,
        description: "Proprietary NVIDIA driver for the linux-lts kernel.",
        supported_archs: NVIDIA_MODERN,
    },
    ProfileTemplate {
        kind: ProfileKind::Nvidia470xx,
        display_name: "NVIDIA 470xx (Kepler Legacy)",
        required_packages: &["nvidia-470xx-dkms", "nvidia-470xx-utils"],
        optional_packages: &["lib32-nvidia-470xx-utils"],
        source: PackageSource::Aur,
        driver_type: DriverType::Proprietary,
        recommended: false,
        vendor: Vendor::Nvidia,
        description: "Legacy NVIDIA driver from the AUR for GeForce 600/700 series (Kepler).",
        supported_archs: &[Architecture::NvidiaKepler],
    },
    ProfileTemplate {
        kind: ProfileKind::NvidiaNouveau,
        display_name: "Nouveau (Open Source)",
        required_packages: &["mesa", "xf86-video-nouveau"],
        optional_packages: &["lib32-mesa"],
        source: PackageSource::Pacman,
        driver_type: DriverType::OpenSource,
        recommended: false,
        vendor: Vendor::Nvidia,
        description: "Open-source Nouveau driver. Lower performance, no advanced GPU features.",
        supported_archs: &[],
    },
];

fn templates_for(vendor: Vendor) -> &'static [ProfileTemplate] {
    match vendor {
        Vendor::Intel => INTEL_PROFILES,
        Vendor::Amd => AMD_PROFILES,
        Vendor::Nvidia => NVIDIA_PROFILES,
        Vendor::Unknown => &[],
    }
}

/// Profiles of one vendor, in authoring order
pub fn profiles_for_vendor(vendor: Vendor) -> Vec<DriverProfile> {
    templates_for(vendor)
        .iter()
        .map(ProfileTemplate::instantiate)
        .collect()
}

/// Whole catalog: Intel, AMD, then NVIDIA
pub fn all_profiles() -> Vec<DriverProfile> {
    Vendor::ALL
        .iter()
        .flat_map(|vendor| templates_for(*vendor))
        .map(ProfileTemplate::instantiate)
        .collect()
}

pub fn find_profile(id: &str) -> Option<DriverProfile> {
    let kind = ProfileKind::from_id(id)?;
    Vendor::ALL
        .iter()
        .flat_map(|vendor| templates_for(*vendor))
        .find(|template| template.kind == kind)
        .map(ProfileTemplate::instantiate)
}
