//! Orchestrator lifecycle tests against real processes.
//!
//! `/bin/sh` stands in for the privilege-escalation tool and a temp shell
//! script for the privileged helper, so `sh <helper> install pkg...` runs
//! unprivileged.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rscn_common::config::{OperationConfig, PackageConfig};
use rscn_common::operations::HELPER_ENV_VAR;
use rscn_common::{
    CommandOutput, FakeCommandRunner, OperationError, OperationEvent, OperationOutcome,
    OperationType, Orchestrator, PackageQuery,
};
use tempfile::TempDir;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const EVENT_TIMEOUT: Duration = Duration::from_secs(15);

struct Harness {
    dir: TempDir,
    fake: FakeCommandRunner,
    orchestrator: Orchestrator<FakeCommandRunner>,
}

impl Harness {
    fn lock_file(&self) -> PathBuf {
        self.dir.path().join("db.lck")
    }
}

fn online() -> FakeCommandRunner {
    FakeCommandRunner::new().respond(
        "ip route show default",
        CommandOutput::ok("default via 10.0.0.1 dev eth0 proto dhcp\n"),
    )
}

fn harness_with(helper_body: &str, fake: FakeCommandRunner, tweak: impl FnOnce(&mut OperationConfig, &mut PackageConfig)) -> Harness {
    let dir = TempDir::new().unwrap();
    let helper = dir.path().join("rscn-drivers-helper");
    fs::write(&helper, format!("#!/bin/sh\n{}\n", helper_body)).unwrap();

    let mut packages = PackageConfig {
        lock_file: dir.path().join("db.lck"),
        mkinitcpio_conf: dir.path().join("mkinitcpio.conf"),
        ..Default::default()
    };
    let mut operations = OperationConfig {
        escalation_tool: "/bin/sh".to_string(),
        helper_path: Some(helper),
        kill_grace_secs: 1,
    };
    tweak(&mut operations, &mut packages);

    let query = Arc::new(PackageQuery::new(fake.clone(), packages));
    Harness {
        dir,
        fake,
        orchestrator: Orchestrator::new(operations, query),
    }
}

fn harness(helper_body: &str) -> Harness {
    harness_with(helper_body, online(), |_, _| {})
}

fn pkgs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

async fn until_finished(rx: &mut UnboundedReceiver<OperationEvent>) -> Vec<OperationEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(EVENT_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for events")
            .expect("event bus closed");
        let finished = event.is_finished();
        events.push(event);
        if finished {
            return events;
        }
    }
}

fn finished(events: &[OperationEvent]) -> (OperationType, OperationOutcome, String) {
    match events.last() {
        Some(OperationEvent::Finished {
            operation,
            outcome,
            message,
        }) => (*operation, *outcome, message.clone()),
        other => panic!("last event is not Finished: {:?}", other),
    }
}

fn output_lines(events: &[OperationEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            OperationEvent::Output { line, .. } => Some(line.clone()),
            _ => None,
        })
        .collect()
}

fn env_override_set() -> bool {
    std::env::var_os(HELPER_ENV_VAR).is_some()
}

#[tokio::test]
async fn locked_database_fails_before_spawning() {
    let h = harness("echo should-not-run");
    fs::write(h.lock_file(), "").unwrap();
    let mut rx = h.orchestrator.subscribe();

    let err = h.orchestrator.install_packages(&pkgs(&["mesa"])).unwrap_err();

    assert_eq!(err, OperationError::PackageManagerLocked(h.lock_file()));
    assert!(err.to_string().contains("locked"));
    assert!(!h.orchestrator.is_operation_running());
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    // Lock is checked before the network
    assert_eq!(h.fake.call_count("ip route show default"), 0);
}

#[tokio::test]
async fn exit_126_is_authorization_dismissed() {
    if env_override_set() {
        return;
    }
    let h = harness("exit 126");
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator.install_packages(&pkgs(&["nvidia-dkms"])).unwrap();
    let events = until_finished(&mut rx).await;

    assert_eq!(
        events[0],
        OperationEvent::Started {
            operation: OperationType::PacmanInstall
        }
    );
    let (operation, outcome, message) = finished(&events);
    assert_eq!(operation, OperationType::PacmanInstall);
    assert_eq!(outcome, OperationOutcome::AuthorizationDismissed);
    assert!(!outcome.is_success());
    assert_eq!(message, "Authorization dismissed by user");
}

#[tokio::test]
async fn exit_codes_map_to_outcomes() {
    if env_override_set() {
        return;
    }
    let cases = [
        ("exit 0", OperationOutcome::Succeeded),
        ("exit 127", OperationOutcome::AuthorizationFailed),
        ("exit 1", OperationOutcome::ExitCode(1)),
        ("kill -9 $$", OperationOutcome::Crashed),
    ];

    for (body, expected) in cases {
        let h = harness(body);
        let mut rx = h.orchestrator.subscribe();
        h.orchestrator.remove_packages(&pkgs(&["xf86-video-ati"])).unwrap();

        let (_, outcome, _) = finished(&until_finished(&mut rx).await);
        assert_eq!(outcome, expected, "helper body: {}", body);
    }
}

#[tokio::test]
async fn output_is_streamed_in_order_before_finished() {
    if env_override_set() {
        return;
    }
    let h = harness(
        r#"echo "args: $*"
echo "resolving dependencies..."
printf 'installing [##  ] 50%%\rinstalling [####] 100%%\n'
echo "warning: kernel headers missing" >&2
printf 'no trailing newline'"#,
    );
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator
        .install_packages(&pkgs(&["mesa", "vulkan-intel"]))
        .unwrap();
    assert_eq!(h.orchestrator.current_operation(), OperationType::PacmanInstall);

    let events = until_finished(&mut rx).await;
    let lines = output_lines(&events);
    let stdout: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|line| !line.starts_with("warning"))
        .collect();

    assert_eq!(
        stdout,
        vec![
            "args: install mesa vulkan-intel",
            "resolving dependencies...",
            "installing [##  ] 50%",
            "installing [####] 100%",
            "no trailing newline",
        ]
    );
    assert!(lines.contains(&"warning: kernel headers missing".to_string()));

    let (_, outcome, message) = finished(&events);
    assert_eq!(outcome, OperationOutcome::Succeeded);
    assert_eq!(message, "Package installation completed successfully");
    assert_eq!(events.iter().filter(|e| e.is_finished()).count(), 1);
    assert!(!h.orchestrator.is_operation_running());
}

#[tokio::test]
async fn second_start_is_rejected_without_disturbing_the_first() {
    if env_override_set() {
        return;
    }
    let h = harness("sleep 1\necho done\nexit 3");
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator.install_packages(&pkgs(&["mesa"])).unwrap();

    assert_eq!(
        h.orchestrator.remove_packages(&pkgs(&["mesa"])),
        Err(OperationError::AlreadyRunning(OperationType::PacmanInstall))
    );
    assert_eq!(
        h.orchestrator.clone().regenerate_initramfs(),
        Err(OperationError::AlreadyRunning(OperationType::PacmanInstall))
    );

    let events = until_finished(&mut rx).await;
    assert_eq!(output_lines(&events), vec!["done"]);
    let (operation, outcome, message) = finished(&events);
    assert_eq!(operation, OperationType::PacmanInstall);
    assert_eq!(outcome, OperationOutcome::ExitCode(3));
    assert_eq!(message, "Package installation failed with exit code 3");

    // Idle again as soon as Finished is observed
    assert!(h.orchestrator.regenerate_initramfs().is_ok());
    let (operation, _, _) = finished(&until_finished(&mut rx).await);
    assert_eq!(operation, OperationType::RegenerateInitramfs);
}

#[tokio::test]
async fn finishes_when_the_helper_exits_despite_background_children() {
    if env_override_set() {
        return;
    }
    // The background sleep inherits stdout/stderr and keeps them open
    let h = harness("echo hi\nsleep 6 &\nexit 0");
    let mut rx = h.orchestrator.subscribe();

    let started = Instant::now();
    h.orchestrator.install_packages(&pkgs(&["mesa"])).unwrap();
    let events = until_finished(&mut rx).await;

    assert!(
        started.elapsed() < Duration::from_secs(4),
        "finished only after {:?}",
        started.elapsed()
    );
    assert_eq!(output_lines(&events), vec!["hi"]);
    let (operation, outcome, _) = finished(&events);
    assert_eq!(operation, OperationType::PacmanInstall);
    assert_eq!(outcome, OperationOutcome::Succeeded);

    assert!(!h.orchestrator.is_operation_running());
    assert!(h.orchestrator.regenerate_initramfs().is_ok());
    let (operation, _, _) = finished(&until_finished(&mut rx).await);
    assert_eq!(operation, OperationType::RegenerateInitramfs);
}

#[tokio::test]
async fn cancel_terminates_and_reports_canceled() {
    if env_override_set() {
        return;
    }
    let h = harness("echo started\nexec sleep 30");
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator.regenerate_grub_config().unwrap();
    loop {
        let event = timeout(EVENT_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        if matches!(&event, OperationEvent::Output { line, .. } if line == "started") {
            break;
        }
        assert!(!event.is_finished(), "finished before cancel: {:?}", event);
    }

    let started = Instant::now();
    h.orchestrator.cancel().await;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!h.orchestrator.is_operation_running());

    // cancel() returns after the terminal event was emitted
    let mut rest = Vec::new();
    while let Ok(event) = rx.try_recv() {
        rest.push(event);
    }
    let (operation, outcome, message) = finished(&rest);
    assert_eq!(operation, OperationType::RegenerateGrubConfig);
    assert_eq!(outcome, OperationOutcome::Canceled);
    assert_eq!(message, "Operation canceled by user");
}

#[tokio::test]
async fn cancel_while_idle_is_a_no_op() {
    let h = harness("exit 0");
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator.cancel().await;

    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(h.orchestrator.current_operation(), OperationType::None);
}

#[tokio::test]
async fn missing_escalation_tool_reports_failed_to_start() {
    if env_override_set() {
        return;
    }
    let h = harness_with("exit 0", online(), |ops, _| {
        ops.escalation_tool = "/nonexistent/pkexec".to_string();
    });
    let mut rx = h.orchestrator.subscribe();

    assert!(h.orchestrator.remove_kms_hook().is_ok());
    let events = until_finished(&mut rx).await;

    assert_eq!(events.len(), 1);
    let (operation, outcome, message) = finished(&events);
    assert_eq!(operation, OperationType::RemoveKmsHook);
    assert_eq!(outcome, OperationOutcome::FailedToStart);
    assert!(message.contains("/nonexistent/pkexec"));
    assert!(!h.orchestrator.is_operation_running());
}

#[tokio::test]
async fn maintenance_operations_pass_a_single_subcommand() {
    if env_override_set() {
        return;
    }
    let h = harness(r#"echo "$*""#);
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator.remove_kms_hook().unwrap();
    let events = until_finished(&mut rx).await;
    assert_eq!(output_lines(&events), vec!["remove-kms-hook"]);
    let (_, outcome, message) = finished(&events);
    assert_eq!(outcome, OperationOutcome::Succeeded);
    assert_eq!(message, "KMS hook removal completed successfully");

    h.orchestrator.regenerate_grub_config().unwrap();
    assert_eq!(output_lines(&until_finished(&mut rx).await), vec!["regenerate-grub"]);
}

#[tokio::test]
async fn install_requires_network_but_remove_does_not() {
    if env_override_set() {
        return;
    }
    let h = harness_with("exit 0", FakeCommandRunner::new(), |_, _| {});
    let mut rx = h.orchestrator.subscribe();

    assert_eq!(
        h.orchestrator.install_packages(&pkgs(&["mesa"])),
        Err(OperationError::NoNetwork)
    );
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

    h.orchestrator.remove_packages(&pkgs(&["mesa"])).unwrap();
    let (_, outcome, _) = finished(&until_finished(&mut rx).await);
    assert_eq!(outcome, OperationOutcome::Succeeded);
}

#[tokio::test]
async fn empty_package_list_is_rejected() {
    let h = harness("exit 0");
    assert_eq!(h.orchestrator.install_packages(&[]), Err(OperationError::NoPackages));
    assert_eq!(h.orchestrator.remove_aur_packages(&[]), Err(OperationError::NoPackages));
    assert_eq!(h.fake.total_calls(), 0);
}

#[tokio::test]
async fn aur_install_needs_a_helper() {
    let h = harness("exit 0");
    let err = h
        .orchestrator
        .install_aur_packages(&pkgs(&["nvidia-470xx-dkms"]))
        .unwrap_err();

    assert_eq!(err, OperationError::NoAurHelper("paru, yay, pikaur, trizen".to_string()));
    assert!(!h.orchestrator.is_operation_running());
}

#[tokio::test]
async fn aur_install_runs_the_helper_as_the_user() {
    let dir = TempDir::new().unwrap();
    let aur_helper = dir.path().join("fake-paru");
    fs::write(&aur_helper, "#!/bin/sh\necho \"$*\"\n").unwrap();
    fs::set_permissions(&aur_helper, fs::Permissions::from_mode(0o755)).unwrap();
    let aur_helper = aur_helper.to_string_lossy().into_owned();

    let fake = online().respond(&format!("which {}", aur_helper), CommandOutput::ok(&aur_helper));
    let helper_for_config = aur_helper.clone();
    let h = harness_with("exit 99", fake, move |_, packages| {
        packages.aur_helpers = vec![helper_for_config];
    });
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator
        .install_aur_packages(&pkgs(&["nvidia-470xx-dkms", "nvidia-470xx-utils"]))
        .unwrap();
    let events = until_finished(&mut rx).await;

    assert_eq!(
        output_lines(&events),
        vec!["-S --noconfirm --needed nvidia-470xx-dkms nvidia-470xx-utils"]
    );
    let (operation, outcome, _) = finished(&events);
    assert_eq!(operation, OperationType::AurInstall);
    assert_eq!(outcome, OperationOutcome::Succeeded);
}

#[tokio::test]
async fn aur_removal_goes_through_the_privileged_helper() {
    if env_override_set() {
        return;
    }
    let h = harness(r#"echo "$*""#);
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator
        .remove_aur_packages(&pkgs(&["amdgpu-pro-libgl"]))
        .unwrap();
    let events = until_finished(&mut rx).await;

    assert_eq!(
        events[0],
        OperationEvent::Started {
            operation: OperationType::AurRemove
        }
    );
    assert_eq!(output_lines(&events), vec!["remove amdgpu-pro-libgl"]);
    assert_eq!(h.fake.call_count("which paru"), 0);
}

#[tokio::test]
async fn every_subscriber_sees_the_same_sequence() {
    if env_override_set() {
        return;
    }
    let h = harness("echo one\necho two");
    let mut first = h.orchestrator.subscribe();
    let mut second = h.orchestrator.subscribe();

    h.orchestrator.regenerate_initramfs().unwrap();

    let a = until_finished(&mut first).await;
    let b = until_finished(&mut second).await;
    assert_eq!(a, b);
    assert_eq!(output_lines(&a), vec!["one", "two"]);
}
