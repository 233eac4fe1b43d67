#![cfg(target_os = "linux")]

use assert_cmd::cargo::CommandCargoExt;
use rexpect::session::{spawn_command, PtySession};
use serial_test::serial;
use std::process::Command;

fn spawn_chronos() -> PtySession {
    let cmd = Command::cargo_bin("chronos").unwrap();
    spawn_command(cmd, Some(5_000)).unwrap()
}

#[test]
#[serial]
fn test_prompt_and_quit() {
    let mut session = spawn_chronos();
    session.exp_string("(Chronos)> ").unwrap();
    session.send_line("quit").unwrap();
    session.exp_eof().unwrap();
}

#[test]
#[serial]
fn test_commands_require_running_debugee() {
    let mut session = spawn_chronos();
    session.exp_string("(Chronos)> ").unwrap();

    session.send_line("continue").unwrap();
    session.exp_string("program is not being started").unwrap();

    session.send_line("break 0x401000").unwrap();
    session.exp_string("program is not being started").unwrap();

    session.send_line("unbreak 0x401000").unwrap();
    session.exp_string("program is not being started").unwrap();

    session.send_line("quit").unwrap();
    session.exp_eof().unwrap();
}

#[test]
#[serial]
fn test_run_requires_debug_target() {
    let mut session = spawn_chronos();
    session.exp_string("(Chronos)> ").unwrap();

    session.send_line("run").unwrap();
    session.exp_string("no debug target set").unwrap();

    session.send_line("quit").unwrap();
}

#[test]
#[serial]
fn test_file_rejects_missing_and_invalid_targets() {
    let mut session = spawn_chronos();
    session.exp_string("(Chronos)> ").unwrap();

    session.send_line("file /definitely/not/here").unwrap();
    session.exp_string("doesn't exist").unwrap();

    // a text file carries no executable magic
    let text_file = std::env::temp_dir().join("chronos_cli_not_an_executable");
    std::fs::write(&text_file, b"plain text, no magic").unwrap();
    session
        .send_line(&format!("file {}", text_file.display()))
        .unwrap();
    session.exp_string("is not a debuggable executable").unwrap();

    session.send_line("quit").unwrap();
}

#[test]
#[serial]
fn test_break_rejects_bad_address() {
    let mut session = spawn_chronos();
    session.exp_string("(Chronos)> ").unwrap();

    session.send_line("break nope").unwrap();
    session.exp_string("invalid address").unwrap();

    session.send_line("break").unwrap();
    session.exp_string("invalid usage").unwrap();

    session.send_line("quit").unwrap();
}
