use crate::debugger::error::Error;
use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::Pid;

/// OS-level identifier of a schedulable entity. Equal to the process id for
/// the main thread.
pub type TaskId = Pid;

/// Human-readable snapshot of the most recent OS error.
pub fn last_error() -> String {
    Errno::last().desc().to_string()
}

/// Reset the latched OS error. Required before calls whose failure is
/// distinguishable from a valid result only through errno.
pub fn clear_last_error() {
    Errno::clear();
}

/// True if a task with this id exists and has not been reaped yet. The probe
/// sends the null signal, which delivers nothing but still validates the id.
pub fn is_process_running(task_id: TaskId) -> Result<bool, Error> {
    match signal::kill(task_id, None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(Error::syscall("kill", e)),
    }
}
