#![cfg(target_os = "linux")]

mod common;

mod attach;
mod breakpoints;
mod control;
mod signals;

const SPIN_APP: &str = env!("CARGO_BIN_EXE_spin");
const MT_APP: &str = env!("CARGO_BIN_EXE_mt");
const EXIT0_APP: &str = env!("CARGO_BIN_EXE_exit0");
const SEGV_APP: &str = env!("CARGO_BIN_EXE_segv");
