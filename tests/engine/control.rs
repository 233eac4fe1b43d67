use crate::common;
use crate::EXIT0_APP;
use chronos::debugger::Error;
use serial_test::serial;

#[test]
#[serial]
fn test_launch_run_to_exit() {
    let ctx = common::launch_stopped(EXIT0_APP);
    assert!(ctx.is_process_running().unwrap());

    {
        let signal = ctx.continue_execution(true).unwrap().unwrap();
        assert_eq!(signal.exit_code(), Some(0));
        assert!(signal.thread().is_main_thread());
    }

    assert!(!ctx.is_process_running().unwrap());
}

#[test]
#[serial]
fn test_operations_on_terminated_debugee() {
    let mut ctx = common::launch_stopped(EXIT0_APP);
    {
        let signal = ctx.continue_execution(true).unwrap().unwrap();
        assert_eq!(signal.exit_code(), Some(0));
    }

    assert!(matches!(
        ctx.add_breakpoint(0x1000),
        Err(Error::ProcessNotStarted)
    ));
    assert!(matches!(
        ctx.remove_breakpoint(0x1000),
        Err(Error::ProcessNotStarted)
    ));
    assert!(matches!(
        ctx.continue_execution(false),
        Err(Error::ProcessNotStarted)
    ));
}
