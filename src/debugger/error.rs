use crate::debugger::platform::TaskId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error("debugee already run")]
    AlreadyRun,
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // --------------------------------- breakpoint errors -----------------------------------------
    #[error("breakpoint already set at address {0:#x}")]
    BreakpointAlreadySet(usize),
    #[error("no breakpoint at address {0:#x}")]
    BreakpointNotFound(usize),

    // --------------------------------- syscall errors --------------------------------------------
    #[error("waitpid syscall error: {0}")]
    Waitpid(String),
    #[error("ptrace syscall error: {0}")]
    Ptrace(String),
    #[error("{0} syscall error: {1}")]
    Syscall(&'static str, String),

    // --------------------------------- debugee process errors ------------------------------------
    #[error("program is not being started")]
    ProcessNotStarted,

    // --------------------------------- attach debugee errors -------------------------------------
    #[error("process pid {0} not found")]
    AttachedProcessNotFound(TaskId),
    #[error("attach a running process: {0}")]
    Attach(String),
}

impl Error {
    /// Return a hint to an interface - continue debugging after error or stop whole process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::AlreadyRun => false,
            Error::IO(_) => false,
            Error::InvalidArgument(_) => false,
            Error::BreakpointAlreadySet(_) => false,
            Error::BreakpointNotFound(_) => false,
            Error::Waitpid(_) => false,
            Error::Ptrace(_) => false,
            Error::ProcessNotStarted => false,

            // currently fatal errors
            Error::Syscall(_, _) => true,
            Error::AttachedProcessNotFound(_) => true,
            Error::Attach(_) => true,
        }
    }
}

#[cfg(target_os = "linux")]
impl Error {
    pub(crate) fn ptrace(e: nix::errno::Errno) -> Self {
        Error::Ptrace(e.desc().to_string())
    }

    pub(crate) fn waitpid(e: nix::errno::Errno) -> Self {
        Error::Waitpid(e.desc().to_string())
    }

    pub(crate) fn syscall(name: &'static str, e: nix::errno::Errno) -> Self {
        Error::Syscall(name, e.desc().to_string())
    }
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(target: "debugger", "{}", e);
                None
            }
        }
    };
}
