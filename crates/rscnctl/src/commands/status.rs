//! Status Command - whether operations can start right now

use anyhow::Result;
use owo_colors::OwoColorize;

use rscn_common::operations::resolve_helper_path;
use rscn_common::Config;

use super::system_query;
use crate::output::{check_mark, print_footer, print_header, print_section};

pub fn run(config: &Config) -> Result<()> {
    let query = system_query(config);
    let packages = query.config();

    print_header("RSCN Drivers - Status");

    print_section("PACKAGE MANAGER");
    let locked = query.is_package_manager_locked();
    println!(
        "  {} Database lock   {}",
        check_mark(!locked),
        if locked {
            format!("held ({})", packages.lock_file.display()).yellow().to_string()
        } else {
            "free".to_string()
        }
    );
    let online = query.is_network_available();
    println!(
        "  {} Network         {}",
        check_mark(online),
        if online { "default route present" } else { "no default route" }
    );
    let aur = query.find_aur_helper();
    println!(
        "  {} AUR helper      {}",
        check_mark(aur.is_some()),
        aur.unwrap_or_else(|| format!("none of {}", packages.aur_helpers.join(", ")))
    );
    println!();

    print_section("PRIVILEGED OPERATIONS");
    println!("  Escalation tool:  {}", config.operations.escalation_tool);
    match resolve_helper_path(&config.operations) {
        Ok(path) => println!("  {} Helper          {}", check_mark(true), path.display()),
        Err(e) => println!("  {} Helper          {}", check_mark(false), e.to_string().dimmed()),
    }
    println!();

    print_section("BOOT");
    let kms = query.is_kms_hook_present();
    println!(
        "  {} KMS hook        {}",
        check_mark(!kms),
        if kms {
            format!("present in {}", packages.mkinitcpio_conf.display())
        } else {
            "not present".to_string()
        }
    );
    if kms {
        println!(
            "    {}",
            "NVIDIA proprietary users: run `rscnctl fixup kms-hook`".dimmed()
        );
    }
    println!();

    print_footer();
    Ok(())
}
