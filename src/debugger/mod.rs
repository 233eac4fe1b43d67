//! Debugging engine: process launch/attach over the OS trace primitives,
//! software breakpoints, signal waiting and execution control across the
//! debugee's threads.

pub mod breakpoint;
pub mod code;
pub mod error;
pub mod platform;
pub mod process;
pub mod signal;
pub mod thread;

pub use breakpoint::Breakpoint;
pub use error::Error;
pub use process::ProcessContext;
pub use signal::Signal;
pub use thread::ThreadContext;

use crate::debugger::platform::TaskId;
use std::path::Path;

/// Debugger session holder. At most one debugee is bound at a time; every
/// command that touches the debugee fails with
/// [`Error::ProcessNotStarted`] while no session is bound.
#[derive(Default)]
pub struct Debugger {
    process: Option<ProcessContext>,
}

impl Debugger {
    pub fn new() -> Self {
        Self { process: None }
    }

    fn context(&self) -> Result<&ProcessContext, Error> {
        self.process.as_ref().ok_or(Error::ProcessNotStarted)
    }

    fn context_mut(&mut self) -> Result<&mut ProcessContext, Error> {
        self.process.as_mut().ok_or(Error::ProcessNotStarted)
    }

    /// Launch the executable under trace and bind the session to it.
    pub fn run(&mut self, path: &Path, args: &[String]) -> Result<(), Error> {
        if self.process.is_some() {
            return Err(Error::AlreadyRun);
        }
        self.process = Some(ProcessContext::launch(path, args)?);
        Ok(())
    }

    /// Attach to a running process and bind the session to it.
    pub fn attach(&mut self, pid: TaskId) -> Result<(), Error> {
        if self.process.is_some() {
            return Err(Error::AlreadyRun);
        }
        self.process = Some(ProcessContext::attach(pid)?);
        Ok(())
    }

    /// Release the session. The debugee is killed if it was launched here,
    /// or detached and left running if it was attached.
    pub fn detach(&mut self) {
        self.process = None;
    }

    /// Resume the debugee and block until it signals again.
    pub fn continue_execution(&self) -> Result<Option<Signal<'_>>, Error> {
        self.context()?.continue_execution(true)
    }

    /// Block until any debugee thread signals.
    pub fn wait_for_signal(&self) -> Result<Signal<'_>, Error> {
        self.context()?.wait_for_signal()
    }

    pub fn add_breakpoint(&mut self, addr: usize) -> Result<(), Error> {
        self.context_mut()?.add_breakpoint(addr)
    }

    pub fn remove_breakpoint(&mut self, addr: usize) -> Result<(), Error> {
        self.context_mut()?.remove_breakpoint(addr)
    }

    /// Installed breakpoints, in no particular order.
    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.process.iter().flat_map(|p| p.breakpoints().values())
    }

    /// Debugee threads known to the tracer, in no particular order.
    pub fn threads(&self) -> impl Iterator<Item = &ThreadContext> {
        self.process.iter().flat_map(|p| p.threads().values())
    }

    /// Whether a debugee session is currently bound.
    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }
}
