use crate::debugger::breakpoint::Breakpoint;
use crate::debugger::error::Error;
use crate::debugger::platform::{self, TaskId};
use crate::debugger::signal::{Signal, SignalInfo};
use crate::debugger::thread::ThreadContext;
use std::collections::HashMap;
use std::path::Path;

#[cfg(target_os = "linux")]
use crate::debugger::code;
#[cfg(target_os = "linux")]
use crate::weak_error;
#[cfg(target_os = "linux")]
use itertools::Itertools;
#[cfg(target_os = "linux")]
use log::{debug, warn};
#[cfg(target_os = "linux")]
use nix::errno::Errno;
#[cfg(target_os = "linux")]
use nix::libc::{siginfo_t, SIGTRAP};
#[cfg(target_os = "linux")]
use nix::sys;
#[cfg(target_os = "linux")]
use nix::sys::personality::Persona;
#[cfg(target_os = "linux")]
use nix::sys::signal::SIGKILL;
#[cfg(target_os = "linux")]
use nix::sys::wait::{waitpid, WaitStatus};
#[cfg(target_os = "linux")]
use nix::unistd::{fork, ForkResult, Pid};
#[cfg(target_os = "linux")]
use std::os::unix::process::CommandExt;
#[cfg(target_os = "linux")]
use std::process::Command;
#[cfg(target_os = "linux")]
use std::time::{Duration, Instant};
#[cfg(target_os = "linux")]
use std::{fs, process, thread};

/// Poll slice granted to a single thread while waiting for a signal.
#[cfg(target_os = "linux")]
const WAIT_POLL_BUDGET: Duration = Duration::from_millis(500);
/// Pause between two non-blocking polls of the same thread.
#[cfg(target_os = "linux")]
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How the context took ownership of the debugee. Decides what happens on
/// drop: a launched tracee is killed, an attached one is detached and left
/// running.
enum Origin {
    Launched,
    Attached,
}

/// A debugee process under trace: its task id, every thread known to the
/// tracer and the set of installed breakpoints.
///
/// All trace operations originate from the single tracer task, no locking is
/// involved. Between a breakpoint installation and the next continue every
/// live thread observes the trap byte.
pub struct ProcessContext {
    process_id: TaskId,
    origin: Origin,
    breakpoints: HashMap<usize, Breakpoint>,
    threads: HashMap<TaskId, ThreadContext>,
    #[cfg(windows)]
    last_event: std::cell::Cell<(u32, u32)>,
}

impl ProcessContext {
    /// Task id of the debugee main thread.
    pub fn process_id(&self) -> TaskId {
        self.process_id
    }

    /// Registered breakpoints, keyed by address.
    pub fn breakpoints(&self) -> &HashMap<usize, Breakpoint> {
        &self.breakpoints
    }

    /// Registered threads, keyed by task id.
    pub fn threads(&self) -> &HashMap<TaskId, ThreadContext> {
        &self.threads
    }

    /// Whether the debugee still exists and has not been reaped.
    pub fn is_process_running(&self) -> Result<bool, Error> {
        platform::is_process_running(self.process_id)
    }

    fn ensure_running(&self) -> Result<(), Error> {
        match self.is_process_running()? {
            true => Ok(()),
            false => Err(Error::ProcessNotStarted),
        }
    }

    /// Install a breakpoint at `addr` into every registered thread.
    ///
    /// A failure partway leaves already visited threads patched; the map is
    /// not updated and the error names the failing operation. Rolling back
    /// would require uninstall to be infallible on threads that may have
    /// died in the meantime.
    pub fn add_breakpoint(&mut self, addr: usize) -> Result<(), Error> {
        self.ensure_running()?;
        if self.breakpoints.contains_key(&addr) {
            return Err(Error::BreakpointAlreadySet(addr));
        }

        let brkpt = Breakpoint::new(addr);
        for thread in self.threads.values() {
            brkpt.install(thread)?;
        }
        self.breakpoints.insert(addr, brkpt);
        Ok(())
    }

    /// Restore the original byte at `addr` in every registered thread and
    /// forget the breakpoint.
    pub fn remove_breakpoint(&mut self, addr: usize) -> Result<(), Error> {
        self.ensure_running()?;
        let brkpt = self
            .breakpoints
            .get(&addr)
            .ok_or(Error::BreakpointNotFound(addr))?;

        for thread in self.threads.values() {
            brkpt.uninstall(thread)?;
        }
        self.breakpoints.remove(&addr);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl ProcessContext {
    /// Fork a child that disables address space randomization, declares
    /// itself traceable and executes the target.
    ///
    /// The parent does not wait for the initial stop; callers that need a
    /// stopped debugee call [`ProcessContext::wait_for_signal`] first.
    pub fn launch(path: &Path, args: &[String]) -> Result<Self, Error> {
        let mut debugee_cmd = Command::new(path);
        debugee_cmd.args(args);
        unsafe {
            debugee_cmd.pre_exec(move || {
                sys::personality::set(Persona::ADDR_NO_RANDOMIZE)?;
                sys::ptrace::traceme()?;
                Ok(())
            });
        }

        match unsafe { fork() }.map_err(|e| Error::syscall("fork", e))? {
            ForkResult::Parent { child } => {
                debug!(target: "debugger", "debugee spawned, process: {child}");
                Ok(Self {
                    process_id: child,
                    origin: Origin::Launched,
                    breakpoints: HashMap::new(),
                    threads: HashMap::from([(child, ThreadContext::new(child, child))]),
                })
            }
            ForkResult::Child => {
                let err = debugee_cmd.exec();
                eprintln!("run debugee fail with: {err}");
                process::exit(1);
            }
        }
    }

    /// Attach to an already running process, tracing every task listed in
    /// its `/proc/<pid>/task` directory.
    ///
    /// Construction fails wholesale when any task refuses the attach;
    /// already traced tasks are detached again, best effort.
    pub fn attach(pid: TaskId) -> Result<Self, Error> {
        if !Path::new(&format!("/proc/{pid}")).exists() {
            return Err(Error::AttachedProcessNotFound(pid));
        }

        let mut threads: HashMap<TaskId, ThreadContext> = HashMap::new();
        for entry in fs::read_dir(format!("/proc/{pid}/task"))? {
            let entry = entry?;
            let tid = entry
                .file_name()
                .to_string_lossy()
                .parse::<i32>()
                .map_err(|_| {
                    Error::Attach(format!("unexpected task entry {:?}", entry.file_name()))
                })?;
            let tid = Pid::from_raw(tid);

            if let Err(e) = sys::ptrace::attach(tid) {
                for already_traced in threads.values() {
                    weak_error!(sys::ptrace::detach(already_traced.thread_id(), None));
                }
                return Err(Error::Attach(e.desc().to_string()));
            }
            threads.insert(tid, ThreadContext::new(pid, tid));
        }

        let this = Self {
            process_id: pid,
            origin: Origin::Attached,
            breakpoints: HashMap::new(),
            threads,
        };

        // reap the attach stop of every task, trace operations are legal
        // right after construction
        for thread in this.threads.values() {
            thread.wait_blocking()?;
        }

        debug!(
            target: "debugger",
            "attached to process {pid}, threads: {threads}",
            threads = this.threads.len()
        );
        Ok(this)
    }

    /// Resume the debugee. With `await_signal` the call blocks on
    /// [`ProcessContext::wait_for_signal`] and returns the resulting signal.
    pub fn continue_execution(&self, await_signal: bool) -> Result<Option<Signal<'_>>, Error> {
        self.ensure_running()?;
        self.step_over_breakpoints()?;
        self.cont_all()?;

        if await_signal {
            return self.wait_for_signal().map(Some);
        }
        Ok(None)
    }

    /// Round-robin over registered threads until one of them reports a
    /// status. The per-thread poll budget keeps a silent thread from
    /// starving its siblings; the outer loop is unbounded.
    pub fn wait_for_signal(&self) -> Result<Signal<'_>, Error> {
        loop {
            for thread in self.threads.values() {
                let deadline = Instant::now() + WAIT_POLL_BUDGET;
                loop {
                    if let Some((status, siginfo)) = thread.wait_nonblocking()? {
                        debug!(
                            target: "debugger",
                            "receive status {status:?}, thread {tid}",
                            tid = thread.thread_id()
                        );
                        self.rewind_on_trap(thread, siginfo)?;
                        return Ok(Signal::new(thread, SignalInfo::Posix { status, siginfo }));
                    }

                    if Instant::now() >= deadline {
                        break;
                    }
                    thread::sleep(WAIT_POLL_INTERVAL);
                }
            }
        }
    }

    /// A trap raised through an installed breakpoint leaves the program
    /// counter one past the patched byte; move it back onto the breakpoint
    /// address so the next continue steps over it instead of retrapping.
    fn rewind_on_trap(
        &self,
        thread: &ThreadContext,
        siginfo: Option<siginfo_t>,
    ) -> Result<(), Error> {
        let Some(info) = siginfo else { return Ok(()) };
        if info.si_signo != SIGTRAP
            || !matches!(info.si_code, code::TRAP_BRKPT | code::SI_KERNEL)
        {
            return Ok(());
        }

        let brkpt_addr = (thread.pc()? as usize).wrapping_sub(1);
        let on_brkpt = self
            .breakpoints
            .get(&brkpt_addr)
            .map(|brkpt| brkpt.is_enabled())
            .unwrap_or(false);
        if on_brkpt {
            thread.set_pc(brkpt_addr as u64)?;
        }
        Ok(())
    }

    /// A thread resting on an enabled breakpoint must execute the original
    /// instruction before the trap byte goes back, otherwise the same
    /// address retraps immediately: uninstall, single step, reinstall.
    fn step_over_breakpoints(&self) -> Result<(), Error> {
        for thread in self.threads.values() {
            // a running or vanished thread cannot rest on a trap byte
            let Ok(pc) = thread.pc() else { continue };
            let Some(brkpt) = self.breakpoints.get(&(pc as usize)) else {
                continue;
            };
            if !brkpt.is_enabled() {
                continue;
            }

            debug!(
                target: "debugger",
                "step thread {tid} over breakpoint {addr:#x}",
                tid = thread.thread_id(),
                addr = brkpt.address()
            );
            brkpt.uninstall(thread)?;
            sys::ptrace::step(thread.thread_id(), None).map_err(Error::ptrace)?;
            let (status, _) = thread.wait_blocking()?;
            if !matches!(status, WaitStatus::Exited(_, _)) {
                brkpt.install(thread)?;
            }
        }
        Ok(())
    }

    /// Resume every registered thread. Vanished threads are tolerated, the
    /// wait loop reports their exit.
    fn cont_all(&self) -> Result<(), Error> {
        let mut errors = vec![];
        for thread in self.threads.values() {
            if let Err(e) = sys::ptrace::cont(thread.thread_id(), None) {
                if Errno::ESRCH == e {
                    warn!(target: "debugger", "thread {} not found, ESRCH", thread.thread_id());
                    continue;
                }
                errors.push(format!("thread {}: {}", thread.thread_id(), e));
            }
        }

        if !errors.is_empty() {
            return Err(Error::Ptrace(errors.into_iter().join(";")));
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl Drop for ProcessContext {
    fn drop(&mut self) {
        match self.origin {
            Origin::Launched => {
                if matches!(self.is_process_running(), Ok(true)) {
                    weak_error!(sys::signal::kill(self.process_id, SIGKILL));
                    weak_error!(waitpid(self.process_id, None));
                }
            }
            Origin::Attached => {
                for thread in self.threads.values() {
                    weak_error!(sys::ptrace::detach(thread.thread_id(), None));
                }
            }
        }
    }
}

#[cfg(windows)]
impl ProcessContext {
    /// Create the target with the Win32 debug loop attached to it.
    pub fn launch(path: &Path, args: &[String]) -> Result<Self, Error> {
        use windows::core::{PCWSTR, PWSTR};
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{
            CreateProcessW, DEBUG_ONLY_THIS_PROCESS, PROCESS_INFORMATION, STARTUPINFOW,
        };

        let mut command_line: Vec<u16> = std::iter::once(path.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let startup_info = STARTUPINFOW {
            cb: std::mem::size_of::<STARTUPINFOW>() as u32,
            ..Default::default()
        };
        let mut proc_info = PROCESS_INFORMATION::default();

        unsafe {
            CreateProcessW(
                PCWSTR::null(),
                PWSTR(command_line.as_mut_ptr()),
                None,
                None,
                false,
                DEBUG_ONLY_THIS_PROCESS,
                None,
                PCWSTR::null(),
                &startup_info,
                &mut proc_info,
            )
        }
        .map_err(|_| Error::Syscall("CreateProcessW", platform::last_error()))?;

        unsafe {
            let _ = CloseHandle(proc_info.hThread);
            let _ = CloseHandle(proc_info.hProcess);
        }

        let pid = proc_info.dwProcessId;
        let main_thread = ThreadContext::new(pid, proc_info.dwThreadId)?;
        Ok(Self {
            process_id: pid,
            origin: Origin::Launched,
            breakpoints: HashMap::new(),
            threads: HashMap::from([(proc_info.dwThreadId, main_thread)]),
            last_event: std::cell::Cell::new((0, 0)),
        })
    }

    /// Attach the debug loop to a running process and register every thread
    /// the system snapshot lists for it.
    pub fn attach(pid: TaskId) -> Result<Self, Error> {
        use windows::Win32::System::Diagnostics::Debug::DebugActiveProcess;

        if !platform::is_process_running(pid)? {
            return Err(Error::AttachedProcessNotFound(pid));
        }

        unsafe { DebugActiveProcess(pid) }
            .map_err(|_| Error::Attach(platform::last_error()))?;

        let mut threads: HashMap<TaskId, ThreadContext> = HashMap::new();
        for tid in Self::snapshot_threads(pid)? {
            threads.insert(tid, ThreadContext::new(pid, tid)?);
        }

        Ok(Self {
            process_id: pid,
            origin: Origin::Attached,
            breakpoints: HashMap::new(),
            threads,
            last_event: std::cell::Cell::new((0, 0)),
        })
    }

    fn snapshot_threads(pid: TaskId) -> Result<Vec<TaskId>, Error> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD,
            THREADENTRY32,
        };

        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) }
            .map_err(|_| Error::Syscall("CreateToolhelp32Snapshot", platform::last_error()))?;

        let mut tids = vec![];
        let mut entry = THREADENTRY32 {
            dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
            ..Default::default()
        };
        let mut more = unsafe { Thread32First(snapshot, &mut entry) }.is_ok();
        while more {
            if entry.th32OwnerProcessID == pid {
                tids.push(entry.th32ThreadID);
            }
            more = unsafe { Thread32Next(snapshot, &mut entry) }.is_ok();
        }
        unsafe {
            let _ = CloseHandle(snapshot);
        }
        Ok(tids)
    }

    /// Resume the debugee by acknowledging the last surfaced debug event.
    pub fn continue_execution(&self, await_signal: bool) -> Result<Option<Signal<'_>>, Error> {
        use windows::Win32::Foundation::DBG_CONTINUE;
        use windows::Win32::System::Diagnostics::Debug::ContinueDebugEvent;

        self.ensure_running()?;
        let (event_pid, event_tid) = self.last_event.get();
        if event_pid != 0 {
            unsafe { ContinueDebugEvent(event_pid, event_tid, DBG_CONTINUE) }
                .map_err(|_| Error::Syscall("ContinueDebugEvent", platform::last_error()))?;
        }

        if await_signal {
            return self.wait_for_signal().map(Some);
        }
        Ok(None)
    }

    /// Pump the debug-event loop. Module load/unload, thread and process
    /// lifecycle and debug strings are serviced silently; only exceptions
    /// and debugee exit surface to the caller.
    pub fn wait_for_signal(&self) -> Result<Signal<'_>, Error> {
        use windows::Win32::Foundation::DBG_CONTINUE;
        use windows::Win32::System::Diagnostics::Debug::{
            ContinueDebugEvent, WaitForDebugEvent, DEBUG_EVENT, EXCEPTION_DEBUG_EVENT,
            EXIT_PROCESS_DEBUG_EVENT,
        };
        use windows::Win32::System::Threading::INFINITE;

        let mut event = DEBUG_EVENT::default();
        loop {
            unsafe { WaitForDebugEvent(&mut event, INFINITE) }
                .map_err(|_| Error::Syscall("WaitForDebugEvent", platform::last_error()))?;
            self.last_event.set((event.dwProcessId, event.dwThreadId));

            if event.dwDebugEventCode != EXCEPTION_DEBUG_EVENT
                && event.dwDebugEventCode != EXIT_PROCESS_DEBUG_EVENT
            {
                unsafe { ContinueDebugEvent(event.dwProcessId, event.dwThreadId, DBG_CONTINUE) }
                    .map_err(|_| {
                        Error::Syscall("ContinueDebugEvent", platform::last_error())
                    })?;
                continue;
            }

            let thread = self
                .threads
                .get(&event.dwThreadId)
                .or_else(|| self.threads.values().next())
                .ok_or(Error::ProcessNotStarted)?;
            return Ok(Signal::new(thread, SignalInfo::DebugEvent(event)));
        }
    }
}

#[cfg(windows)]
impl Drop for ProcessContext {
    fn drop(&mut self) {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Diagnostics::Debug::DebugActiveProcessStop;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        match self.origin {
            Origin::Launched => unsafe {
                if let Ok(handle) = OpenProcess(PROCESS_TERMINATE, false, self.process_id) {
                    let _ = TerminateProcess(handle, 1);
                    let _ = CloseHandle(handle);
                }
            },
            Origin::Attached => unsafe {
                let _ = DebugActiveProcessStop(self.process_id);
            },
        }
    }
}
