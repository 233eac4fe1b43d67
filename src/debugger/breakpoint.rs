use crate::debugger::code;
use crate::debugger::error::Error;
use crate::debugger::platform;
use crate::debugger::thread::ThreadContext;
use std::cell::Cell;

/// Software breakpoint on some address of the debugee.
///
/// A breakpoint is a plain value exclusively owned by the process context;
/// it holds no reference to its owner, trace operations go through the
/// thread handle passed by the caller. While enabled, the low byte of the
/// word at `addr` is the trap instruction and `saved_data` holds the byte
/// that was previously there.
pub struct Breakpoint {
    addr: usize,
    enabled: Cell<bool>,
    saved_data: Cell<u8>,
}

impl Breakpoint {
    pub(super) fn new(addr: usize) -> Self {
        Self {
            addr,
            enabled: Default::default(),
            saved_data: Default::default(),
        }
    }

    pub fn address(&self) -> usize {
        self.addr
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Patch the trap instruction into `thread`'s view of the address.
    ///
    /// The tracing primitive is word-granular: the aligned word is read, the
    /// new low byte spliced in, and the word written back, preserving the
    /// adjacent bytes. Debugee memory is shared between its threads, so only
    /// the first install captures the original byte; installs multiplexed
    /// over the remaining threads already observe the trap byte.
    pub(super) fn install(&self, thread: &ThreadContext) -> Result<(), Error> {
        platform::clear_last_error();
        let data = thread.peek_word(self.addr)?;
        if !self.enabled.get() {
            self.saved_data.set((data & 0xff) as u8);
        }

        let data_with_trap = (data as u64 & !0xff) | code::INT3;
        thread.poke_word(self.addr, data_with_trap as i64)?;
        self.enabled.set(true);

        Ok(())
    }

    /// Restore the saved byte in `thread`'s view of the address.
    /// Uninstalling a breakpoint that is not enabled is a no-op.
    pub(super) fn uninstall(&self, thread: &ThreadContext) -> Result<(), Error> {
        if !self.enabled.get() {
            return Ok(());
        }

        platform::clear_last_error();
        let data = thread.peek_word(self.addr)? as u64;
        let restored = (data & !0xff) | self.saved_data.get() as u64;
        thread.poke_word(self.addr, restored as i64)?;
        self.enabled.set(false);

        Ok(())
    }
}
