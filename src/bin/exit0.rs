//! Debugee sample: returns 0 immediately.

fn main() {}
