//! Profiles Command - the static driver catalog

use anyhow::{bail, Result};
use owo_colors::OwoColorize;

use rscn_common::catalog::{all_profiles, profiles_for_vendor};
use rscn_common::{DriverProfile, Vendor};

use crate::output::{driver_type_label, print_footer, print_header, print_section};

/// Catalog entries, optionally restricted to one vendor
pub fn select(vendor: Option<&str>) -> Result<Vec<DriverProfile>> {
    match vendor {
        None => Ok(all_profiles()),
        Some(name) => match Vendor::from_name(name) {
            Some(vendor) => Ok(profiles_for_vendor(vendor)),
            None => bail!("Unknown vendor '{}' (expected intel, amd or nvidia)", name),
        },
    }
}

pub fn run(vendor: Option<&str>, json: bool) -> Result<()> {
    let profiles = select(vendor)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    print_header("RSCN Drivers - Driver Profiles");

    let mut current = None;
    for profile in &profiles {
        if current != Some(profile.vendor) {
            current = Some(profile.vendor);
            print_section(profile.vendor.as_str());
        }

        let marker = if profile.recommended {
            format!(" {}", "*Recommended*".cyan())
        } else {
            String::new()
        };
        println!("  {}{}", profile.display_name.bold(), marker);
        println!("    {} {}", "id:".dimmed(), profile.id);
        println!(
            "    {}, {}",
            driver_type_label(profile.driver_type),
            profile.source
        );
        println!("    {}", profile.description);
        println!("    Required: {}", profile.required_packages.join(", "));
        if !profile.optional_packages.is_empty() {
            println!("    Optional: {}", profile.optional_packages.join(", "));
        }
        if !profile.supported_archs.is_empty() {
            let archs: Vec<&str> = profile.supported_archs.iter().map(|a| a.label()).collect();
            println!("    Supports: {}", archs.join(", "));
        }
        println!();
    }

    print_footer();
    Ok(())
}
