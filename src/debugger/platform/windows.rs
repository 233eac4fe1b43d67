use crate::debugger::error::Error;
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, GetLastError, SetLastError, WIN32_ERROR};
use windows::Win32::System::Diagnostics::Debug::{
    FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
};

/// OS-level identifier of a schedulable entity.
pub type TaskId = u32;

/// `GetExitCodeProcess` reports this code while the process is alive.
const STILL_ACTIVE: u32 = 259;

/// Human-readable snapshot of the most recent OS error.
pub fn last_error() -> String {
    let code = unsafe { GetLastError() };
    if code == WIN32_ERROR(0) {
        return "no error occurred".to_string();
    }

    let mut buffer = [0u16; 512];
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            None,
            code.0,
            0,
            PWSTR(buffer.as_mut_ptr()),
            buffer.len() as u32,
            None,
        )
    };
    String::from_utf16_lossy(&buffer[..len as usize])
        .trim_end()
        .to_string()
}

/// Reset the latched OS error.
pub fn clear_last_error() {
    unsafe { SetLastError(WIN32_ERROR(0)) };
}

/// True if a process with this id exists and has not terminated.
pub fn is_process_running(task_id: TaskId) -> Result<bool, Error> {
    let handle = match unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, task_id) } {
        Ok(handle) => handle,
        // the id names no live process (or one we may not query)
        Err(_) => return Ok(false),
    };

    let mut exit_code = 0u32;
    let result = unsafe { GetExitCodeProcess(handle, &mut exit_code) };
    unsafe {
        let _ = CloseHandle(handle);
    }

    match result {
        Ok(()) => Ok(exit_code == STILL_ACTIVE),
        Err(_) => Err(Error::Syscall("GetExitCodeProcess", last_error())),
    }
}
