use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn sftp_mirror(workdir: &Path, log_file: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sftp-mirror"));
    cmd.env_clear()
        .current_dir(workdir)
        .env("LOG_FILE_PATH", log_file)
        .env("TRACING_LEVEL", "info")
        .args(args);
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().unwrap()
}

#[test]
fn test_config_error_exits_1_and_reaches_log_file() {
    let dir = tempdir().unwrap();
    let log_file = dir.path().join("mirror.log");

    let output = sftp_mirror(dir.path(), &log_file, &["--config", "absent", "run"], &[]);

    assert_eq!(output.status.code(), Some(1));
    let log = fs::read_to_string(&log_file).unwrap();
    assert!(
        log.contains("Error loading configuration"),
        "log file was not flushed before exit: {:?}",
        log
    );
}

#[test]
fn test_print_config_masks_secrets() {
    let dir = tempdir().unwrap();
    let log_file = dir.path().join("mirror.log");

    let output = sftp_mirror(
        dir.path(),
        &log_file,
        &["--config", "absent", "print-config"],
        &[
            ("MIRROR_REMOTE__HOST", "sftp.internal"),
            ("MIRROR_REMOTE__USERNAME", "mirror"),
            ("MIRROR_REMOTE__PASSWORD", "hunter2"),
            ("MIRROR_REMOTE__DIRECTORY", "/outgoing"),
            ("MIRROR_LOCAL__DIRECTORY", "/var/mirror"),
        ],
    );

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sftp.internal"));
    assert!(stdout.contains("********"));
    assert!(!stdout.contains("hunter2"));
}
