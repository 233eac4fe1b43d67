use chronos::debugger::process::ProcessContext;
use chronos::debugger::ThreadContext;
use std::path::Path;

/// Launch `path` under trace and wait until the initial post-exec stop.
pub fn launch_stopped(path: &str) -> ProcessContext {
    let ctx = ProcessContext::launch(Path::new(path), &[]).unwrap();
    let signal = ctx.wait_for_signal().unwrap();
    assert!(
        signal.exit_code().is_none(),
        "debugee died before the initial stop"
    );
    drop(signal);
    ctx
}

pub fn main_thread(ctx: &ProcessContext) -> &ThreadContext {
    ctx.threads()
        .get(&ctx.process_id())
        .expect("main thread must be registered")
}

/// Program counter of the debugee main thread.
pub fn main_thread_pc(ctx: &ProcessContext) -> usize {
    main_thread(ctx).pc().unwrap() as usize
}

/// Read a word from the debugee through its main thread.
pub fn peek(ctx: &ProcessContext, addr: usize) -> i64 {
    main_thread(ctx).peek_word(addr).unwrap()
}
