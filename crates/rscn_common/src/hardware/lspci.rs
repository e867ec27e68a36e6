//! `lspci -nn -k` output parsing.
//!
//! The output is a block per device. The first line of a block is
//!
//! ```text
//! SLOT CLASS [CCCC]: DESCRIPTION [VVVV:DDDD] (rev XX)
//! ```
//!
//! followed by indented lines such as `Subsystem:`, `Kernel driver in use:`
//! and `Kernel modules:`. Only VGA, 3D and Display controllers are kept.

use once_cell::sync::Lazy;
use regex::Regex;

use super::classify::detect_architecture;
use super::{GpuDevice, Vendor};

static GPU_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\S+)\s+((?:VGA compatible|3D|Display)\s+controller)\s+\[([0-9a-f]{4})\]:\s+(.+)$")
        .expect("GPU header regex is valid")
});

static PCI_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[([0-9a-f]{4}):([0-9a-f]{4})\]").expect("PCI ID regex is valid"));

// "ati" only as a word: "Corporation" contains it too.
static ATI_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bati\b").expect("ATI word regex is valid"));

static PCI_ID_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\[[0-9a-f]{4}:[0-9a-f]{4}\]").expect("PCI ID strip regex is valid"));

static REVISION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(rev \w+\)").expect("revision regex is valid"));

static CLASS_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\[[0-9a-f]{4}\]").expect("class code regex is valid"));

static TRAILING_BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\s*$").expect("trailing bracket regex is valid"));

static NVIDIA_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)NVIDIA Corporation").expect("NVIDIA prefix regex is valid"));

static AMD_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Advanced Micro Devices,?\s*Inc\.?\s*\[AMD(?:/ATI)?\]|ATI Technologies Inc\.?)\s*")
        .expect("AMD prefix regex is valid")
});

static INTEL_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Intel Corporation").expect("Intel prefix regex is valid"));

const SUBSYSTEM_PREFIX: &str = "Subsystem:";
const DRIVER_PREFIX: &str = "Kernel driver in use:";
const MODULES_PREFIX: &str = "Kernel modules:";

/// Parse the complete `lspci -nn -k` output into GPU devices.
///
/// Non-GPU devices and malformed lines are skipped. A GPU header without a
/// `[vvvv:dddd]` pair still yields a device, with empty IDs.
pub fn parse_lspci_output(output: &str) -> Vec<GpuDevice> {
    let lines: Vec<&str> = output.lines().collect();
    let mut gpus = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(header) = GPU_HEADER_RE.captures(line) else {
            continue;
        };

        let description = &header[4];
        let mut gpu = GpuDevice {
            pci_slot: header[1].to_string(),
            device_class: header[2].to_string(),
            ..Default::default()
        };

        if let Some(ids) = PCI_ID_RE.captures(description) {
            gpu.vendor_id = ids[1].to_lowercase();
            gpu.device_id = ids[2].to_lowercase();
        }

        gpu.vendor = identify_vendor(description);
        gpu.model = extract_model(description, gpu.vendor);

        for sub_line in lines[i + 1..]
            .iter()
            .take_while(|l| l.starts_with('\t') || l.starts_with("  "))
        {
            let trimmed = sub_line.trim();
            if let Some(rest) = trimmed.strip_prefix(SUBSYSTEM_PREFIX) {
                gpu.subsystem = rest.trim().to_string();
            } else if let Some(rest) = trimmed.strip_prefix(DRIVER_PREFIX) {
                gpu.kernel_driver = rest.trim().to_string();
            } else if let Some(rest) = trimmed.strip_prefix(MODULES_PREFIX) {
                gpu.kernel_modules = rest
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }

        gpu.architecture = detect_architecture(gpu.vendor, &gpu.device_id, &gpu.model);
        gpus.push(gpu);
    }

    gpus
}

/// Identify the vendor from a device description.
///
/// NVIDIA is checked first since its name never collides with the others.
pub fn identify_vendor(description: &str) -> Vendor {
    let lower = description.to_lowercase();
    if lower.contains("nvidia") {
        Vendor::Nvidia
    } else if lower.contains("amd") || ATI_WORD_RE.is_match(&lower) || lower.contains("radeon") {
        Vendor::Amd
    } else if lower.contains("intel") {
        Vendor::Intel
    } else {
        Vendor::Unknown
    }
}

/// Reduce a device description to its model name.
///
/// ```text
/// "NVIDIA Corporation AD107M [GeForce RTX 4060 Max-Q / Mobile] [10de:28e0] (rev a1)"
///     → "GeForce RTX 4060 Max-Q / Mobile"
/// "Advanced Micro Devices, Inc. [AMD/ATI] Raphael [1002:164e] (rev d8)"
///     → "Raphael"
/// ```
pub fn extract_model(description: &str, vendor: Vendor) -> String {
    let desc = PCI_ID_STRIP_RE.replace_all(description, "");
    let desc = REVISION_RE.replace_all(&desc, "");
    let desc = CLASS_CODE_RE.replace_all(&desc, "");
    let desc = desc.trim();

    match vendor {
        Vendor::Nvidia => match TRAILING_BRACKET_RE.captures(desc) {
            // Marketing name, e.g. [GeForce RTX 3060]
            Some(caps) => caps[1].trim().to_string(),
            None => NVIDIA_PREFIX_RE.replace_all(desc, "").trim().to_string(),
        },
        Vendor::Amd => AMD_PREFIX_RE.replace(desc, "").trim().to_string(),
        Vendor::Intel => INTEL_PREFIX_RE.replace_all(desc, "").trim().to_string(),
        Vendor::Unknown => desc.to_string(),
    }
}
