//! GPU hardware detection.
//!
//! Runs `lspci -nn -k`, turns every display-class device block into a
//! [`GpuDevice`] and classifies its [`Architecture`].
//!
//! Failures never surface as errors: a missing `lspci`, a non-zero exit or a
//! timeout all produce an empty device list.

mod classify;
mod lspci;

pub use classify::detect_architecture;
pub use lspci::{extract_model, identify_vendor, parse_lspci_output};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::runner::CommandRunner;

/// GPU vendor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Intel,
    #[serde(rename = "AMD")]
    Amd,
    #[serde(rename = "NVIDIA")]
    Nvidia,
    #[default]
    Unknown,
}

impl Vendor {
    pub const ALL: [Vendor; 3] = [Vendor::Intel, Vendor::Amd, Vendor::Nvidia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Intel => "Intel",
            Vendor::Amd => "AMD",
            Vendor::Nvidia => "NVIDIA",
            Vendor::Unknown => "Unknown",
        }
    }

    /// Parse a vendor name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "intel" => Some(Vendor::Intel),
            "amd" | "ati" => Some(Vendor::Amd),
            "nvidia" => Some(Vendor::Nvidia),
            _ => None,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Architecture generation
///
/// Coarse capability tier used to decide which driver profiles apply.
/// `Unknown` is a regular value, never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// Pre-Broadwell (GMA, Sandy/Ivy Bridge, Haswell, Bay Trail)
    IntelLegacy,
    /// Gen8 and newer integrated graphics
    IntelBroadwellPlus,
    /// Arc discrete (Alchemist, Battlemage)
    IntelArc,
    /// TeraScale and older
    AmdPreGcn,
    AmdGcn,
    AmdRdna,
    /// APU graphics
    AmdIntegrated,
    NvidiaKepler,
    NvidiaMaxwell,
    NvidiaPascal,
    NvidiaTuring,
    NvidiaAmpere,
    NvidiaAdaLovelace,
    #[default]
    Unknown,
}

impl Architecture {
    pub fn vendor(&self) -> Vendor {
        match self {
            Architecture::IntelLegacy | Architecture::IntelBroadwellPlus | Architecture::IntelArc => {
                Vendor::Intel
            }
            Architecture::AmdPreGcn
            | Architecture::AmdGcn
            | Architecture::AmdRdna
            | Architecture::AmdIntegrated => Vendor::Amd,
            Architecture::NvidiaKepler
            | Architecture::NvidiaMaxwell
            | Architecture::NvidiaPascal
            | Architecture::NvidiaTuring
            | Architecture::NvidiaAmpere
            | Architecture::NvidiaAdaLovelace => Vendor::Nvidia,
            Architecture::Unknown => Vendor::Unknown,
        }
    }

    /// Human-readable generation name
    pub fn label(&self) -> &'static str {
        match self {
            Architecture::IntelLegacy => "Legacy (pre-Broadwell)",
            Architecture::IntelBroadwellPlus => "Broadwell+",
            Architecture::IntelArc => "Arc",
            Architecture::AmdPreGcn => "Pre-GCN",
            Architecture::AmdGcn => "GCN",
            Architecture::AmdRdna => "RDNA",
            Architecture::AmdIntegrated => "Integrated (APU)",
            Architecture::NvidiaKepler => "Kepler",
            Architecture::NvidiaMaxwell => "Maxwell",
            Architecture::NvidiaPascal => "Pascal",
            Architecture::NvidiaTuring => "Turing",
            Architecture::NvidiaAmpere => "Ampere",
            Architecture::NvidiaAdaLovelace => "Ada Lovelace",
            Architecture::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One physical GPU found on the PCI bus
///
/// Built once per scan and never updated; a rescan yields a new list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDevice {
    /// e.g. "01:00.0"
    pub pci_slot: String,
    /// e.g. "VGA compatible controller"
    pub device_class: String,
    pub vendor: Vendor,
    /// e.g. "GeForce RTX 4060 Max-Q / Mobile"
    pub model: String,
    /// e.g. "10de", empty when lspci printed no ID
    pub vendor_id: String,
    /// e.g. "28e0", empty when lspci printed no ID
    pub device_id: String,
    /// e.g. "nvidia", "nouveau", "amdgpu", "i915"; empty when unbound
    pub kernel_driver: String,
    pub kernel_modules: Vec<String>,
    pub subsystem: String,
    pub architecture: Architecture,
}

impl GpuDevice {
    /// "vvvv:dddd", or empty when the IDs are unknown
    pub fn pci_id(&self) -> String {
        if self.vendor_id.is_empty() && self.device_id.is_empty() {
            String::new()
        } else {
            format!("{}:{}", self.vendor_id, self.device_id)
        }
    }

    /// "NVIDIA GeForce RTX 4060 Max-Q / Mobile"
    pub fn display_name(&self) -> String {
        match self.vendor {
            Vendor::Unknown => self.model.clone(),
            vendor => format!("{} {}", vendor, self.model),
        }
    }
}

/// Scans the PCI bus for GPUs
pub struct HardwareScanner<R: CommandRunner> {
    runner: R,
    timeout: Duration,
}

impl<R: CommandRunner> HardwareScanner<R> {
    pub fn new(runner: R, config: &ScanConfig) -> Self {
        Self {
            runner,
            timeout: config.timeout(),
        }
    }

    /// Detect all GPUs. Returns an empty list when lspci is unavailable.
    pub fn detect_gpus(&self) -> Vec<GpuDevice> {
        info!("Scanning GPU hardware...");

        let result = self.runner.run("lspci", &["-nn", "-k"], self.timeout);
        if !result.success() {
            warn!(
                "lspci failed (exit={:?}, timed_out={}), reporting no GPUs",
                result.exit_code, result.timed_out
            );
            return Vec::new();
        }

        let gpus = parse_lspci_output(&result.output);
        for gpu in &gpus {
            debug!(
                "GPU {} [{}]: {} → {} (driver: '{}')",
                gpu.pci_slot,
                gpu.pci_id(),
                gpu.display_name(),
                gpu.architecture,
                gpu.kernel_driver
            );
        }
        info!("Detected {} GPU(s)", gpus.len());

        gpus
    }
}
