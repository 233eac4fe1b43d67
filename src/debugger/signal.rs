use crate::debugger::thread::ThreadContext;
use std::fmt;

#[cfg(target_os = "linux")]
use crate::debugger::code;
#[cfg(target_os = "linux")]
use nix::libc::{siginfo_t, SIGTRAP};
#[cfg(target_os = "linux")]
use nix::sys::wait::WaitStatus;

/// OS notification payload, tagged per platform.
pub enum SignalInfo {
    /// Wait status of the thread plus the detailed signal information.
    /// The siginfo is absent when the task terminated before it could be
    /// queried or the status carries no signal.
    #[cfg(target_os = "linux")]
    Posix {
        status: WaitStatus,
        siginfo: Option<siginfo_t>,
    },
    /// Raw record received from the debug-event loop.
    #[cfg(windows)]
    DebugEvent(windows::Win32::System::Diagnostics::Debug::DEBUG_EVENT),
}

/// Signal raised by a debugee thread, as returned by the signal wait loop.
///
/// Borrows the thread that produced it, the signal never outlives the
/// owning process context.
pub struct Signal<'a> {
    thread: &'a ThreadContext,
    info: SignalInfo,
}

impl<'a> Signal<'a> {
    pub(super) fn new(thread: &'a ThreadContext, info: SignalInfo) -> Self {
        Self { thread, info }
    }

    /// Thread that produced the signal.
    pub fn thread(&self) -> &ThreadContext {
        self.thread
    }

    /// Raw OS notification for callers that inspect signal number, code or
    /// faulting address themselves.
    pub fn info(&self) -> &SignalInfo {
        &self.info
    }

    /// Whether the signal is a trap-instruction or single-step trap.
    pub fn is_breakpoint(&self) -> bool {
        match &self.info {
            #[cfg(target_os = "linux")]
            SignalInfo::Posix {
                siginfo: Some(info),
                ..
            } => {
                // x86 kernels report INT3 either as TRAP_BRKPT or SI_KERNEL
                info.si_signo == SIGTRAP
                    && matches!(
                        info.si_code,
                        code::TRAP_BRKPT | code::TRAP_TRACE | code::SI_KERNEL
                    )
            }
            #[cfg(target_os = "linux")]
            SignalInfo::Posix { .. } => false,
            #[cfg(windows)]
            SignalInfo::DebugEvent(event) => {
                use windows::Win32::Foundation::{
                    EXCEPTION_BREAKPOINT, EXCEPTION_SINGLE_STEP,
                };
                use windows::Win32::System::Diagnostics::Debug::EXCEPTION_DEBUG_EVENT;

                if event.dwDebugEventCode != EXCEPTION_DEBUG_EVENT {
                    return false;
                }
                let code = unsafe { event.u.Exception }.ExceptionRecord.ExceptionCode;
                code == EXCEPTION_BREAKPOINT || code == EXCEPTION_SINGLE_STEP
            }
        }
    }

    /// Exit code when the notification reports debugee termination.
    pub fn exit_code(&self) -> Option<i32> {
        match &self.info {
            #[cfg(target_os = "linux")]
            SignalInfo::Posix {
                status: WaitStatus::Exited(_, code),
                ..
            } => Some(*code),
            #[cfg(windows)]
            SignalInfo::DebugEvent(event) => {
                use windows::Win32::System::Diagnostics::Debug::EXIT_PROCESS_DEBUG_EVENT;

                (event.dwDebugEventCode == EXIT_PROCESS_DEBUG_EVENT)
                    .then(|| unsafe { event.u.ExitProcess }.dwExitCode as i32)
            }
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Number of the delivered signal.
    #[cfg(target_os = "linux")]
    pub fn signo(&self) -> Option<i32> {
        match &self.info {
            SignalInfo::Posix { siginfo, .. } => siginfo.map(|info| info.si_signo),
        }
    }

    /// Kernel code qualifying the delivered signal.
    #[cfg(target_os = "linux")]
    pub fn code(&self) -> Option<i32> {
        match &self.info {
            SignalInfo::Posix { siginfo, .. } => siginfo.map(|info| info.si_code),
        }
    }
}

impl fmt::Display for Signal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.exit_code() {
            return write!(f, "debugee exit with code {code}");
        }
        if self.is_breakpoint() {
            return write!(
                f,
                "breakpoint trap in thread {}",
                self.thread.thread_id()
            );
        }

        match &self.info {
            #[cfg(target_os = "linux")]
            SignalInfo::Posix {
                siginfo: Some(info),
                ..
            } => {
                let name = nix::sys::signal::Signal::try_from(info.si_signo)
                    .map(|sig| sig.as_str())
                    .unwrap_or("unknown signal");
                write!(
                    f,
                    "{name} (code {code}) in thread {tid}",
                    code = info.si_code,
                    tid = self.thread.thread_id()
                )
            }
            #[cfg(target_os = "linux")]
            SignalInfo::Posix { status, .. } => {
                write!(
                    f,
                    "stop event {status:?} in thread {tid}",
                    tid = self.thread.thread_id()
                )
            }
            #[cfg(windows)]
            SignalInfo::DebugEvent(event) => {
                write!(
                    f,
                    "debug event {code} in thread {tid}",
                    code = event.dwDebugEventCode.0,
                    tid = self.thread.thread_id()
                )
            }
        }
    }
}
