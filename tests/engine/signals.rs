use crate::common;
use crate::SEGV_APP;
use serial_test::serial;

#[test]
#[serial]
fn test_segfault_classification() {
    let ctx = common::launch_stopped(SEGV_APP);

    let signal = ctx.continue_execution(true).unwrap().unwrap();
    assert!(!signal.is_breakpoint());
    assert_eq!(signal.signo(), Some(nix::libc::SIGSEGV));
    assert!(signal.thread().is_main_thread());
}
