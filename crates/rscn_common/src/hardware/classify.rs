//! Architecture classification.
//!
//! Two tiers per vendor: PCI device-ID windows and keyword search over the
//! lower-cased model name. The tier order differs per vendor, and so does the
//! fallback: NVIDIA falls back to `Unknown`, AMD to `Gcn` and Intel to
//! `BroadwellPlus`. The fallback decides which profile gets recommended, so
//! keep it stable.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Architecture, Vendor};

// ============================================================================
// NVIDIA
// ============================================================================

/// Lower bounds, newest first. A device belongs to the first window whose
/// bound it reaches.
const NVIDIA_ID_WINDOWS: &[(u16, Architecture)] = &[
    (0x2600, Architecture::NvidiaAdaLovelace),
    (0x2200, Architecture::NvidiaAmpere),
    (0x1e00, Architecture::NvidiaTuring),
    (0x1b00, Architecture::NvidiaPascal),
    (0x1340, Architecture::NvidiaMaxwell),
    (0x0fc0, Architecture::NvidiaKepler),
];

const NVIDIA_KEYWORDS: &[(&[&str], Architecture)] = &[
    (
        &["rtx 40", "rtx 6000 ada", "ada generation", "l40", "l4 ", "ad10"],
        Architecture::NvidiaAdaLovelace,
    ),
    (
        &["rtx 30", "rtx a", "a100", "a40", "a30", "a10", "a2000", "ga10"],
        Architecture::NvidiaAmpere,
    ),
    (
        &["rtx 20", "gtx 16", "titan rtx", "quadro rtx", "mx450", "t400", "t600", "t1000", "t1200", "tu10", "tu11"],
        Architecture::NvidiaTuring,
    ),
    (
        &["gtx 10", "titan xp", "titan x (pascal)", "quadro p", "mx1", "mx2", "mx3", "gp10"],
        Architecture::NvidiaPascal,
    ),
    (
        &["gtx 9", "gtx 750", "gtx 745", "titan x", "quadro m", "940m", "930m", "920m", "gm10", "gm20"],
        Architecture::NvidiaMaxwell,
    ),
    (
        &["gtx 6", "gtx 7", "gt 6", "gt 7", "titan black", "titan z", "quadro k", "tesla k", "gk10", "gk11", "gk20"],
        Architecture::NvidiaKepler,
    ),
];

fn classify_nvidia(device_id: Option<u16>, model: &str) -> Architecture {
    if let Some(id) = device_id {
        if let Some((_, arch)) = NVIDIA_ID_WINDOWS.iter().find(|(lower, _)| id >= *lower) {
            return *arch;
        }
    }

    // Unparseable ID, or older than Kepler
    match_keywords(model, NVIDIA_KEYWORDS).unwrap_or(Architecture::Unknown)
}

// ============================================================================
// AMD
// ============================================================================

const AMD_APU_CODENAMES: &[&str] = &[
    "raphael", "granite ridge", "rembrandt", "phoenix", "hawk point", "strix", "krackan",
    "renoir", "cezanne", "lucienne", "barcelo", "picasso", "raven", "dali", "pollock",
    "van gogh", "mendocino", "carrizo", "stoney", "kaveri", "godavari", "kabini", "mullins",
];

/// Radeon RX 5000 through 9000 series (four digits, so RX 580 stays GCN)
static AMD_RDNA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\brx\s*[5-9]\d{3}").expect("RDNA model regex is valid"));

/// Inclusive device-ID ranges
const AMD_ID_WINDOWS: &[(u16, u16, Architecture)] = &[
    (0x7310, 0x75ff, Architecture::AmdRdna),
    (0x1304, 0x131d, Architecture::AmdIntegrated), // Kaveri
    (0x1500, 0x17ff, Architecture::AmdIntegrated), // Raven .. Strix
    (0x9830, 0x983f, Architecture::AmdIntegrated), // Kabini
    (0x9850, 0x985f, Architecture::AmdIntegrated), // Mullins
    (0x9870, 0x98ef, Architecture::AmdIntegrated), // Carrizo, Stoney
];

const AMD_LEGACY_KEYWORDS: &[(&[&str], Architecture)] = &[
    (
        &[
            "polaris", "ellesmere", "baffin", "lexa", "vega", "fiji", "tonga", "hawaii", "grenada",
            "bonaire", "tahiti", "pitcairn", "curacao", "cape verde", "oland", "hainan", "iceland",
            "topaz", "radeon vii", "rx 4", "rx 5", "r9 ", "r7 ", "r5 ", "hd 7", "hd 8",
        ],
        Architecture::AmdGcn,
    ),
    (
        &[
            "terascale", "evergreen", "northern islands", "cypress", "juniper", "redwood", "cedar",
            "barts", "turks", "caicos", "cayman", "sumo", "wrestler", "rv6", "rv7", "r600", "r700",
            "hd 2", "hd 3", "hd 4", "hd 5", "hd 6", "radeon x",
        ],
        Architecture::AmdPreGcn,
    ),
];

const AMD_GCN_ID_WINDOWS: &[(u16, u16, Architecture)] = &[
    (0x6600, 0x66ff, Architecture::AmdGcn), // Oland, Hainan, Vega 20
    (0x6780, 0x683f, Architecture::AmdGcn), // Tahiti, Hawaii, Polaris, Pitcairn, Cape Verde
    (0x6860, 0x687f, Architecture::AmdGcn), // Vega 10
    (0x6900, 0x69ff, Architecture::AmdGcn), // Tonga, Polaris 12, Vega 12
    (0x6fdf, 0x6fdf, Architecture::AmdGcn), // Polaris 20 XL
    (0x7300, 0x730f, Architecture::AmdGcn), // Fiji
];

fn classify_amd(device_id: Option<u16>, model: &str) -> Architecture {
    let lower = model.to_lowercase();

    if AMD_APU_CODENAMES.iter().any(|name| lower.contains(name)) {
        return Architecture::AmdIntegrated;
    }
    if lower.contains("navi") || AMD_RDNA_RE.is_match(&lower) {
        return Architecture::AmdRdna;
    }
    if let Some(arch) = device_id.and_then(|id| match_windows(id, AMD_ID_WINDOWS)) {
        return arch;
    }
    if let Some(arch) = match_keywords(&lower, AMD_LEGACY_KEYWORDS) {
        return arch;
    }
    if let Some(arch) = device_id.and_then(|id| match_windows(id, AMD_GCN_ID_WINDOWS)) {
        return arch;
    }

    Architecture::AmdGcn
}

// ============================================================================
// Intel
// ============================================================================

static INTEL_ARC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:arc|alchemist|battlemage|dg2)\b").expect("Arc regex is valid"));

const INTEL_ARC_ID_WINDOWS: &[(u16, u16, Architecture)] = &[
    (0x5690, 0x56ff, Architecture::IntelArc), // DG2 / Alchemist
    (0xe200, 0xe2ff, Architecture::IntelArc), // Battlemage
];

/// Matched against the model with all whitespace removed, since lspci
/// spells codenames both ways ("Tiger Lake", "TigerLake-LP").
const INTEL_MODERN_KEYWORDS: &[&str] = &[
    "broadwell", "skylake", "kabylake", "coffeelake", "cometlake", "whiskeylake", "amberlake",
    "cannonlake", "icelake", "tigerlake", "rocketlake", "alderlake", "raptorlake", "meteorlake",
    "lunarlake", "arrowlake", "pantherlake", "jasperlake", "elkhartlake", "geminilake",
    "apollolake", "cherrytrail", "braswell", "irisxe", "irisplus", "uhdgraphics", "xegraphics",
    "hdgraphics51", "hdgraphics52", "hdgraphics53", "hdgraphics55", "hdgraphics56", "hdgraphics6",
];

/// Gen8 starts at 0x1600 (Broadwell)
const INTEL_BROADWELL_MIN_ID: u16 = 0x1600;

/// Pre-Broadwell blocks that sit above the Broadwell threshold
const INTEL_LEGACY_HIGH_IDS: &[(u16, u16)] = &[
    (0x2500, 0x2fff), // i915G .. G45 / 4 Series
    (0x3570, 0x35ef), // i830 .. i855
    (0x7120, 0x712f), // i810
    (0x8100, 0x810f), // Poulsbo
    (0xa000, 0xa0ff), // Pineview
];

const INTEL_LEGACY_KEYWORDS: &[&str] = &[
    "haswell", "ivybridge", "sandybridge", "ironlake", "2ndgeneration", "3rdgen", "4thgen",
    "gma", "4series", "atomprocessorz36", "atomprocessore3800", "valleyview", "baytrail",
    "g33", "g35", "g41", "g45", "q45", "945g", "965", "hdgraphics2000", "hdgraphics2500",
    "hdgraphics3000", "hdgraphics4000", "hdgraphics4200", "hdgraphics4400", "hdgraphics4600",
    "hdgraphics5000", "irisgraphics5100", "irispro",
];

fn classify_intel(device_id: Option<u16>, model: &str) -> Architecture {
    let lower = model.to_lowercase();
    let compact: String = lower.split_whitespace().collect();

    if INTEL_ARC_RE.is_match(&lower) {
        return Architecture::IntelArc;
    }
    if let Some(arch) = device_id.and_then(|id| match_windows(id, INTEL_ARC_ID_WINDOWS)) {
        return arch;
    }
    if INTEL_MODERN_KEYWORDS.iter().any(|k| compact.contains(k)) {
        return Architecture::IntelBroadwellPlus;
    }
    if let Some(id) = device_id {
        let legacy_block = INTEL_LEGACY_HIGH_IDS
            .iter()
            .any(|(lo, hi)| (*lo..=*hi).contains(&id));
        if id >= INTEL_BROADWELL_MIN_ID && !legacy_block {
            return Architecture::IntelBroadwellPlus;
        }
    }
    if INTEL_LEGACY_KEYWORDS.iter().any(|k| compact.contains(k)) {
        return Architecture::IntelLegacy;
    }

    Architecture::IntelBroadwellPlus
}

// ============================================================================
// Dispatch
// ============================================================================

/// Classify a device into its architecture generation.
///
/// `device_id_hex` is the 4-digit PCI device ID ("28e0"); an empty or
/// malformed value skips the numeric tier.
pub fn detect_architecture(vendor: Vendor, device_id_hex: &str, model: &str) -> Architecture {
    let device_id = parse_device_id(device_id_hex);
    match vendor {
        Vendor::Nvidia => classify_nvidia(device_id, model),
        Vendor::Amd => classify_amd(device_id, model),
        Vendor::Intel => classify_intel(device_id, model),
        Vendor::Unknown => Architecture::Unknown,
    }
}

fn parse_device_id(hex: &str) -> Option<u16> {
    let hex = hex.trim();
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    u16::from_str_radix(hex, 16).ok()
}

fn match_windows(id: u16, windows: &[(u16, u16, Architecture)]) -> Option<Architecture> {
    windows
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&id))
        .map(|(_, _, arch)| *arch)
}

fn match_keywords(model: &str, table: &[(&[&str], Architecture)]) -> Option<Architecture> {
    let lower = model.to_lowercase();
    table
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, arch)| *arch)
}
