//! Scan Command - detected GPUs with their driver profiles
//!
//! Per device: slot, PCI id, architecture, kernel driver and modules,
//! followed by every applicable profile with install state, whether it is
//! in use and the recommendation.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;

use rscn_common::{
    profiles_for_device, CommandRunner, Config, DriverProfile, GpuDevice, HardwareScanner,
    PackageLookup, SystemRunner,
};

use super::system_query;
use crate::output::{
    colored_profile_tags, driver_type_label, print_footer, print_header, print_section,
};

/// One device and its reconciled profiles, as emitted by `--json`
#[derive(Debug, Serialize)]
pub struct DeviceReport {
    pub device: GpuDevice,
    pub profiles: Vec<DriverProfile>,
}

/// Scan and reconcile every GPU
pub fn collect<R: CommandRunner>(
    scanner: &HardwareScanner<R>,
    lookup: &dyn PackageLookup,
) -> Vec<DeviceReport> {
    scanner
        .detect_gpus()
        .into_iter()
        .map(|device| {
            let profiles = profiles_for_device(&device, lookup);
            DeviceReport { device, profiles }
        })
        .collect()
}

pub fn run(config: &Config, json: bool) -> Result<()> {
    let scanner = HardwareScanner::new(SystemRunner::new(), &config.scan);
    let query = system_query(config);
    let reports = collect(&scanner, query.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    print_header("RSCN Drivers - GPU Scan");

    if reports.is_empty() {
        println!("  {}", "No GPU devices detected.".yellow());
        println!("  {}", "(is pciutils installed?)".dimmed());
        println!();
    }

    for report in &reports {
        print_device(report);
    }

    print_footer();
    Ok(())
}

fn print_device(report: &DeviceReport) {
    let gpu = &report.device;
    print_section(&format!("GPU {}", gpu.pci_slot));
    println!("  {}", gpu.display_name().bold());
    println!("  PCI ID:         {}", or_dash(&gpu.pci_id()));
    println!("  Architecture:   {}", gpu.architecture);
    println!("  Kernel driver:  {}", or_dash(&gpu.kernel_driver));
    println!("  Kernel modules: {}", or_dash(&gpu.kernel_modules.join(", ")));
    if !gpu.subsystem.is_empty() {
        println!("  Subsystem:      {}", gpu.subsystem.dimmed());
    }
    println!();

    if report.profiles.is_empty() {
        println!("  {}", "No driver profiles for this device.".dimmed());
        println!();
        return;
    }

    println!("  Driver profiles ({}):", report.profiles.len());
    for profile in &report.profiles {
        println!(
            "    - {} {} ({}, {})",
            profile.display_name,
            colored_profile_tags(profile),
            driver_type_label(profile.driver_type),
            profile.source
        );
        println!("      {} {}", "id:".dimmed(), profile.id);
        println!("      Packages: {}", profile.required_packages.join(", "));
    }
    println!();
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
