use crate::common;
use crate::MT_APP;
use chronos::debugger::process::ProcessContext;
use chronos::debugger::Error;
use nix::unistd::Pid;
use serial_test::serial;
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;

fn spawn_debugee() -> (Child, Pid) {
    let debugee = Command::new(MT_APP).spawn().unwrap();
    // give the debugee time to spawn its worker thread
    thread::sleep(Duration::from_secs(1));
    let pid = Pid::from_raw(debugee.id() as i32);
    (debugee, pid)
}

#[test]
#[serial]
fn test_attach_enumerates_tasks() {
    let (mut debugee, pid) = spawn_debugee();

    let task_count = std::fs::read_dir(format!("/proc/{pid}/task"))
        .unwrap()
        .count();

    let ctx = ProcessContext::attach(pid).unwrap();
    assert_eq!(ctx.threads().len(), 2);
    assert_eq!(ctx.threads().len(), task_count);
    assert!(ctx.threads().contains_key(&pid));
    assert!(ctx.threads()[&pid].is_main_thread());
    drop(ctx);

    debugee.kill().unwrap();
    debugee.wait().unwrap();
}

#[test]
#[serial]
fn test_breakpoint_visible_from_every_thread() {
    let (mut debugee, pid) = spawn_debugee();

    let mut ctx = ProcessContext::attach(pid).unwrap();
    let addr = common::main_thread_pc(&ctx);
    let original = common::peek(&ctx, addr);

    ctx.add_breakpoint(addr).unwrap();
    for thread in ctx.threads().values() {
        let word = thread.peek_word(addr).unwrap();
        assert_eq!(word as u64 & 0xff, 0xCC);
    }

    ctx.remove_breakpoint(addr).unwrap();
    for thread in ctx.threads().values() {
        assert_eq!(thread.peek_word(addr).unwrap(), original);
    }
    drop(ctx);

    debugee.kill().unwrap();
    debugee.wait().unwrap();
}

#[test]
#[serial]
fn test_attach_missing_process() {
    let nobody = Pid::from_raw(i32::MAX - 1);
    let result = ProcessContext::attach(nobody);
    assert!(matches!(result, Err(Error::AttachedProcessNotFound(_))));
}
