//! Terminal rendering helpers shared by the commands.

use owo_colors::OwoColorize;
use rscn_common::{DriverProfile, DriverType, InstallStatus};

pub const THIN_SEP: &str = "------------------------------------------------------------";

/// Bold title followed by a separator
pub fn print_header(title: &str) {
    println!();
    println!("  {}", title.bold());
    println!("{}", THIN_SEP);
    println!();
}

pub fn print_footer() {
    println!("{}", THIN_SEP);
    println!();
}

/// `[SECTION]` heading
pub fn print_section(title: &str) {
    println!("{}", format!("[{}]", title).cyan());
}

/// "[Installed] (IN USE) *Recommended*" without colors
pub fn profile_tags(profile: &DriverProfile) -> String {
    let mut tags = format!("[{}]", profile.install_status.label());
    if profile.active {
        tags.push_str(" (IN USE)");
    }
    if profile.effective_recommended {
        tags.push_str(" *Recommended*");
    }
    tags
}

/// Colored variant of [`profile_tags`]
pub fn colored_profile_tags(profile: &DriverProfile) -> String {
    let status = format!("[{}]", profile.install_status.label());
    let mut tags = match profile.install_status {
        InstallStatus::FullyInstalled => status.green().to_string(),
        InstallStatus::PartiallyInstalled => status.yellow().to_string(),
        InstallStatus::NotInstalled => status.dimmed().to_string(),
    };
    if profile.active {
        tags.push_str(&format!(" {}", "(IN USE)".green().bold()));
    }
    if profile.effective_recommended {
        tags.push_str(&format!(" {}", "*Recommended*".cyan()));
    }
    tags
}

pub fn driver_type_label(driver_type: DriverType) -> &'static str {
    match driver_type {
        DriverType::OpenSource => "open-source",
        DriverType::Proprietary => "proprietary",
    }
}

/// Green check or red cross with a label
pub fn check_mark(ok: bool) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}
