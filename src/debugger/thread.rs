use crate::debugger::error::Error;
use crate::debugger::platform::TaskId;

#[cfg(target_os = "linux")]
use nix::errno::Errno;
#[cfg(target_os = "linux")]
use nix::libc::{c_void, siginfo_t};
#[cfg(target_os = "linux")]
use nix::sys;
#[cfg(target_os = "linux")]
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};

/// Single thread of a debugee process. Owns identity only; all trace
/// operations address the thread by its task id.
///
/// A thread context never outlives the process context that discovered it.
pub struct ThreadContext {
    process_id: TaskId,
    thread_id: TaskId,
    #[cfg(windows)]
    process_handle: windows::Win32::Foundation::HANDLE,
}

impl ThreadContext {
    /// Process the thread belongs to.
    pub fn process_id(&self) -> TaskId {
        self.process_id
    }

    /// Task id of this thread.
    pub fn thread_id(&self) -> TaskId {
        self.thread_id
    }

    /// Whether this thread is the main thread of the parent process.
    pub fn is_main_thread(&self) -> bool {
        self.process_id == self.thread_id
    }
}

#[cfg(target_os = "linux")]
impl ThreadContext {
    pub(super) fn new(process_id: TaskId, thread_id: TaskId) -> Self {
        Self {
            process_id,
            thread_id,
        }
    }

    /// Read a machine word at the debugee's virtual address.
    pub fn peek_word(&self, addr: usize) -> Result<i64, Error> {
        sys::ptrace::read(self.thread_id, addr as *mut c_void).map_err(Error::ptrace)
    }

    /// Write a machine word at the debugee's virtual address.
    pub fn poke_word(&self, addr: usize, word: i64) -> Result<(), Error> {
        unsafe { sys::ptrace::write(self.thread_id, addr as *mut c_void, word as *mut c_void) }
            .map_err(Error::ptrace)
    }

    /// Block until the thread is stopped or signaled, then retrieve detailed
    /// signal information.
    pub fn wait_blocking(&self) -> Result<(WaitStatus, Option<siginfo_t>), Error> {
        let status =
            waitpid(self.thread_id, Some(WaitPidFlag::__WALL)).map_err(Error::waitpid)?;
        let info = self.stop_info(status)?;
        Ok((status, info))
    }

    /// Non-blocking variant of [`ThreadContext::wait_blocking`], `None` means
    /// no event available.
    pub fn wait_nonblocking(&self) -> Result<Option<(WaitStatus, Option<siginfo_t>)>, Error> {
        let status = waitpid(
            self.thread_id,
            Some(WaitPidFlag::WNOHANG | WaitPidFlag::__WALL),
        )
        .map_err(Error::waitpid)?;

        if matches!(status, WaitStatus::StillAlive) {
            return Ok(None);
        }
        let info = self.stop_info(status)?;
        Ok(Some((status, info)))
    }

    /// Signal information exists only for signal-delivery-stops; an exited
    /// task has none and the kernel answers ESRCH.
    fn stop_info(&self, status: WaitStatus) -> Result<Option<siginfo_t>, Error> {
        if !matches!(status, WaitStatus::Stopped(_, _)) {
            return Ok(None);
        }

        match sys::ptrace::getsiginfo(self.thread_id) {
            Ok(info) => Ok(Some(info)),
            Err(Errno::ESRCH) => Ok(None),
            Err(e) => Err(Error::ptrace(e)),
        }
    }

    /// Current program counter value.
    pub fn pc(&self) -> Result<u64, Error> {
        sys::ptrace::getregs(self.thread_id)
            .map(|regs| regs.rip)
            .map_err(Error::ptrace)
    }

    /// Set new program counter value.
    pub(super) fn set_pc(&self, value: u64) -> Result<(), Error> {
        let mut regs = sys::ptrace::getregs(self.thread_id).map_err(Error::ptrace)?;
        regs.rip = value;
        sys::ptrace::setregs(self.thread_id, regs).map_err(Error::ptrace)
    }
}

#[cfg(windows)]
impl ThreadContext {
    pub(super) fn new(process_id: TaskId, thread_id: TaskId) -> Result<Self, Error> {
        use windows::Win32::System::Threading::{
            OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_OPERATION, PROCESS_VM_READ,
            PROCESS_VM_WRITE,
        };

        let process_handle = unsafe {
            OpenProcess(
                PROCESS_QUERY_LIMITED_INFORMATION
                    | PROCESS_VM_OPERATION
                    | PROCESS_VM_READ
                    | PROCESS_VM_WRITE,
                false,
                process_id,
            )
        }
        .map_err(|_| Error::Syscall("OpenProcess", crate::debugger::platform::last_error()))?;

        Ok(Self {
            process_id,
            thread_id,
            process_handle,
        })
    }

    /// Read a machine word at the debugee's virtual address.
    pub fn peek_word(&self, addr: usize) -> Result<i64, Error> {
        use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;

        let mut word = 0i64;
        unsafe {
            ReadProcessMemory(
                self.process_handle,
                addr as *const std::ffi::c_void,
                &mut word as *mut i64 as *mut std::ffi::c_void,
                std::mem::size_of::<i64>(),
                None,
            )
        }
        .map_err(|_| Error::Syscall("ReadProcessMemory", crate::debugger::platform::last_error()))?;
        Ok(word)
    }

    /// Write a machine word at the debugee's virtual address. The instruction
    /// cache is flushed so every thread observes the new code bytes.
    pub fn poke_word(&self, addr: usize, word: i64) -> Result<(), Error> {
        use windows::Win32::System::Diagnostics::Debug::{
            FlushInstructionCache, WriteProcessMemory,
        };

        unsafe {
            WriteProcessMemory(
                self.process_handle,
                addr as *const std::ffi::c_void,
                &word as *const i64 as *const std::ffi::c_void,
                std::mem::size_of::<i64>(),
                None,
            )
        }
        .map_err(|_| {
            Error::Syscall("WriteProcessMemory", crate::debugger::platform::last_error())
        })?;

        unsafe {
            let _ = FlushInstructionCache(
                self.process_handle,
                Some(addr as *const std::ffi::c_void),
                std::mem::size_of::<i64>(),
            );
        }
        Ok(())
    }
}

#[cfg(windows)]
impl Drop for ThreadContext {
    fn drop(&mut self) {
        unsafe {
            let _ = windows::Win32::Foundation::CloseHandle(self.process_handle);
        }
    }
}
