use crate::common;
use crate::SPIN_APP;
use chronos::debugger::Error;
use nix::sys::signal::{kill, Signal};
use serial_test::serial;
use std::thread;
use std::time::Duration;

#[test]
#[serial]
fn test_install_remove_restores_memory() {
    let mut ctx = common::launch_stopped(SPIN_APP);
    let addr = common::main_thread_pc(&ctx);
    let original = common::peek(&ctx, addr);

    ctx.add_breakpoint(addr).unwrap();
    let patched = common::peek(&ctx, addr);
    assert_eq!(patched as u64 & 0xff, 0xCC);
    assert_eq!(patched as u64 & !0xff, original as u64 & !0xff);

    let brkpt = ctx.breakpoints().get(&addr).unwrap();
    assert_eq!(brkpt.address(), addr);
    assert!(brkpt.is_enabled());

    ctx.remove_breakpoint(addr).unwrap();
    assert_eq!(common::peek(&ctx, addr), original);
    assert!(ctx.breakpoints().is_empty());
}

#[test]
#[serial]
fn test_duplicate_breakpoint_rejected() {
    let mut ctx = common::launch_stopped(SPIN_APP);
    let addr = common::main_thread_pc(&ctx);
    let original = common::peek(&ctx, addr);

    ctx.add_breakpoint(addr).unwrap();
    let duplicate = ctx.add_breakpoint(addr);
    assert!(matches!(duplicate, Err(Error::BreakpointAlreadySet(a)) if a == addr));

    // the first installation stays untouched
    assert_eq!(ctx.breakpoints().len(), 1);
    assert_eq!(common::peek(&ctx, addr) as u64 & 0xff, 0xCC);

    ctx.remove_breakpoint(addr).unwrap();
    assert_eq!(common::peek(&ctx, addr), original);
}

#[test]
#[serial]
fn test_remove_unknown_breakpoint() {
    let mut ctx = common::launch_stopped(SPIN_APP);
    let addr = common::main_thread_pc(&ctx);
    let original = common::peek(&ctx, addr);

    let missing = ctx.remove_breakpoint(addr);
    assert!(matches!(missing, Err(Error::BreakpointNotFound(a)) if a == addr));
    assert_eq!(common::peek(&ctx, addr), original);
}

#[test]
#[serial]
fn test_breakpoint_hit_classifies_and_rewinds() {
    let mut ctx = common::launch_stopped(SPIN_APP);
    ctx.continue_execution(false).unwrap();
    thread::sleep(Duration::from_millis(200));

    // stop the debugee inside its loop to learn an address it re-executes
    kill(ctx.process_id(), Signal::SIGSTOP).unwrap();
    {
        let stop = ctx.wait_for_signal().unwrap();
        assert!(!stop.is_breakpoint());
    }
    let addr = common::main_thread_pc(&ctx);

    ctx.add_breakpoint(addr).unwrap();
    {
        let signal = ctx.continue_execution(true).unwrap().unwrap();
        assert!(signal.is_breakpoint());
        assert!(signal.thread().is_main_thread());
    }

    // the wait loop rewound the thread onto the breakpoint address
    assert_eq!(common::main_thread_pc(&ctx), addr);

    // stepping over the breakpoint lets the debugee pass it again
    {
        let signal = ctx.continue_execution(true).unwrap().unwrap();
        assert!(signal.is_breakpoint());
    }
    assert_eq!(common::main_thread_pc(&ctx), addr);

    ctx.remove_breakpoint(addr).unwrap();
}
