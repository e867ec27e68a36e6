//! Package Query Service.
//!
//! Synchronous questions for pacman and the system around it. Every command
//! goes through a [`CommandRunner`] with a bounded timeout, so a test can
//! swap in a [`crate::runner::FakeCommandRunner`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::config::PackageConfig;
use crate::reconcile::PackageLookup;
use crate::runner::{CommandOutput, CommandRunner};

/// Uncommented `HOOKS=(...)` array in mkinitcpio.conf
static HOOKS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*HOOKS[ \t]*=[ \t]*\(([^)]*)\)").expect("HOOKS regex is valid")
});

pub struct PackageQuery<R: CommandRunner> {
    runner: R,
    config: PackageConfig,
    /// First AUR helper found on PATH, or the fact that none was
    aur_helper: OnceLock<Option<String>>,
}

impl<R: CommandRunner> PackageQuery<R> {
    pub fn new(runner: R, config: PackageConfig) -> Self {
        Self {
            runner,
            config,
            aur_helper: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    fn pacman(&self, flag: &str, package: &str) -> CommandOutput {
        self.runner
            .run("pacman", &[flag, package], self.config.query_timeout())
    }

    pub fn is_installed(&self, package: &str) -> bool {
        self.pacman("-Q", package).success()
    }

    /// Whether the sync databases know the package
    pub fn is_available(&self, package: &str) -> bool {
        self.pacman("-Si", package).success()
    }

    /// Local version from `pacman -Q` ("name version")
    pub fn installed_version(&self, package: &str) -> Option<String> {
        let result = self.pacman("-Q", package);
        if !result.success() {
            return None;
        }
        result.output.split_whitespace().nth(1).map(str::to_string)
    }

    /// Repository version from the `Version : x.y.z-r` line of `pacman -Si`
    pub fn available_version(&self, package: &str) -> Option<String> {
        let result = self.pacman("-Si", package);
        if !result.success() {
            return None;
        }
        result
            .output
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("Version"))
            .and_then(|line| line.split_once(':'))
            .map(|(_, version)| version.trim().to_string())
    }

    pub fn filter_installed(&self, packages: &[String]) -> Vec<String> {
        packages
            .iter()
            .filter(|pkg| self.is_installed(pkg))
            .cloned()
            .collect()
    }

    pub fn filter_not_installed(&self, packages: &[String]) -> Vec<String> {
        packages
            .iter()
            .filter(|pkg| !self.is_installed(pkg))
            .cloned()
            .collect()
    }

    /// First configured AUR helper present on PATH
    ///
    /// Probed once per instance; a negative answer is cached too.
    pub fn find_aur_helper(&self) -> Option<String> {
        self.aur_helper
            .get_or_init(|| {
                let found = self.config.aur_helpers.iter().find(|helper| {
                    self.runner
                        .run("which", &[helper.as_str()], self.config.query_timeout())
                        .success()
                });
                match found {
                    Some(helper) => info!("Using AUR helper: {}", helper),
                    None => warn!("No AUR helper found (tried: {})", self.config.aur_helpers.join(", ")),
                }
                found.cloned()
            })
            .clone()
    }

    /// AUR packages land in the same local database once built
    pub fn is_aur_package_installed(&self, package: &str) -> bool {
        self.is_installed(package)
    }

    /// Another pacman instance holds the database lock
    pub fn is_package_manager_locked(&self) -> bool {
        let locked = self.config.lock_file.exists();
        if locked {
            debug!("Lock file present: {}", self.config.lock_file.display());
        }
        locked
    }

    /// A default route exists
    pub fn is_network_available(&self) -> bool {
        let result = self.runner.run(
            "ip",
            &["route", "show", "default"],
            self.config.network_timeout(),
        );
        result.success() && !result.output.trim().is_empty()
    }

    /// mkinitcpio.conf loads the `kms` hook
    pub fn is_kms_hook_present(&self) -> bool {
        match fs::read_to_string(&self.config.mkinitcpio_conf) {
            Ok(content) => hooks_contain_kms(&content),
            Err(e) => {
                debug!("Cannot read {}: {}", self.config.mkinitcpio_conf.display(), e);
                false
            }
        }
    }
}

impl<R: CommandRunner> PackageLookup for PackageQuery<R> {
    fn is_installed(&self, package: &str) -> bool {
        PackageQuery::is_installed(self, package)
    }
}

/// Whether any active `HOOKS=(...)` array lists `kms` as a whole word
pub fn hooks_contain_kms(mkinitcpio_conf: &str) -> bool {
    HOOKS_RE
        .captures_iter(mkinitcpio_conf)
        .any(|caps| caps[1].split_whitespace().any(|hook| hook == "kms"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::FakeCommandRunner;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn query(fake: &FakeCommandRunner) -> PackageQuery<FakeCommandRunner> {
        PackageQuery::new(fake.clone(), PackageConfig::default())
    }

    #[test]
    fn test_installed_and_version() {
        let fake = FakeCommandRunner::new().respond("pacman -Q mesa", CommandOutput::ok("mesa 1:24.2.7-1\n"));
        let q = query(&fake);

        assert!(q.is_installed("mesa"));
        assert_eq!(q.installed_version("mesa").as_deref(), Some("1:24.2.7-1"));
        assert!(!q.is_installed("nvidia"));
        assert_eq!(q.installed_version("nvidia"), None);
    }

    #[test]
    fn test_available_version_parses_version_line() {
        let si = "\
Repository      : extra
Name            : nvidia-utils
Version         : 560.35.03-5
Description     : NVIDIA drivers utilities
";
        let fake = FakeCommandRunner::new().respond("pacman -Si nvidia-utils", CommandOutput::ok(si));
        let q = query(&fake);

        assert!(q.is_available("nvidia-utils"));
        assert_eq!(q.available_version("nvidia-utils").as_deref(), Some("560.35.03-5"));
        assert_eq!(q.available_version("missing"), None);
    }

    #[test]
    fn test_version_without_second_token() {
        let fake = FakeCommandRunner::new().respond("pacman -Q odd", CommandOutput::ok("odd\n"));
        assert_eq!(query(&fake).installed_version("odd"), None);
    }

    #[test]
    fn test_filters_preserve_order() {
        let fake = FakeCommandRunner::new()
            .respond("pacman -Q mesa", CommandOutput::ok("mesa 24.2.7-1"))
            .respond("pacman -Q vulkan-radeon", CommandOutput::ok("vulkan-radeon 24.2.7-1"));
        let q = query(&fake);
        let wanted: Vec<String> = ["mesa", "xf86-video-amdgpu", "vulkan-radeon"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(q.filter_installed(&wanted), vec!["mesa", "vulkan-radeon"]);
        assert_eq!(q.filter_not_installed(&wanted), vec!["xf86-video-amdgpu"]);
        assert!(q.is_aur_package_installed("mesa"));
    }

    #[test]
    fn test_aur_helper_preference_and_cache() {
        let fake = FakeCommandRunner::new()
            .respond("which yay", CommandOutput::ok("/usr/bin/yay"))
            .respond("which pikaur", CommandOutput::ok("/usr/bin/pikaur"));
        let q = query(&fake);

        assert_eq!(q.find_aur_helper().as_deref(), Some("yay"));
        assert_eq!(q.find_aur_helper().as_deref(), Some("yay"));
        assert_eq!(fake.call_count("which paru"), 1);
        assert_eq!(fake.call_count("which yay"), 1);
        assert_eq!(fake.call_count("which pikaur"), 0);
    }

    #[test]
    fn test_missing_aur_helper_is_cached() {
        let fake = FakeCommandRunner::new();
        let q = query(&fake);

        assert_eq!(q.find_aur_helper(), None);
        assert_eq!(q.find_aur_helper(), None);
        assert_eq!(fake.call_count("which trizen"), 1);
        assert_eq!(fake.total_calls(), 4);
    }

    #[test]
    fn test_network_requires_default_route() {
        let fake = FakeCommandRunner::new().respond(
            "ip route show default",
            CommandOutput::ok("default via 192.168.1.1 dev wlan0 proto dhcp metric 600\n"),
        );
        assert!(query(&fake).is_network_available());

        let empty = FakeCommandRunner::new().respond("ip route show default", CommandOutput::ok(""));
        assert!(!query(&empty).is_network_available());

        assert!(!query(&FakeCommandRunner::new()).is_network_available());
    }

    #[test]
    fn test_lock_file_detection() {
        let lock = NamedTempFile::new().unwrap();
        let config = PackageConfig {
            lock_file: lock.path().to_path_buf(),
            ..Default::default()
        };
        let q = PackageQuery::new(FakeCommandRunner::new(), config.clone());
        assert!(q.is_package_manager_locked());

        let path = lock.path().to_path_buf();
        drop(lock);
        let q = PackageQuery::new(FakeCommandRunner::new(), PackageConfig { lock_file: path, ..config });
        assert!(!q.is_package_manager_locked());
    }

    #[test]
    fn test_hooks_contain_kms() {
        assert!(hooks_contain_kms(
            "MODULES=()\nHOOKS=(base udev autodetect microcode modconf kms keyboard keymap consolefont block filesystems fsck)\n"
        ));
        assert!(hooks_contain_kms("HOOKS = ( base kms )"));
        assert!(!hooks_contain_kms(
            "HOOKS=(base systemd autodetect microcode modconf keyboard sd-vconsole block filesystems fsck)"
        ));
        // Substrings and comments do not count
        assert!(!hooks_contain_kms("HOOKS=(base kmsx udev)"));
        assert!(!hooks_contain_kms("#HOOKS=(base kms udev)\nHOOKS=(base udev)"));
        assert!(!hooks_contain_kms(""));
    }

    #[test]
    fn test_kms_hook_from_file() {
        let mut conf = NamedTempFile::new().unwrap();
        writeln!(conf, "# sample\nHOOKS=(base udev kms block filesystems)").unwrap();
        let config = PackageConfig {
            mkinitcpio_conf: conf.path().to_path_buf(),
            ..Default::default()
        };
        assert!(PackageQuery::new(FakeCommandRunner::new(), config).is_kms_hook_present());

        let config = PackageConfig {
            mkinitcpio_conf: "/nonexistent/mkinitcpio.conf".into(),
            ..Default::default()
        };
        assert!(!PackageQuery::new(FakeCommandRunner::new(), config).is_kms_hook_present());
    }

    #[test]
    fn test_query_is_a_package_lookup() {
        let fake = FakeCommandRunner::new().respond("pacman -Q mesa", CommandOutput::ok("mesa 24.2.7-1"));
        let q = query(&fake);
        let lookup: &dyn PackageLookup = &q;
        assert!(lookup.is_installed("mesa"));
        assert_eq!(fake.call_count("pacman -Q mesa"), 1);
    }
}
