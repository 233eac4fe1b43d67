//! Debugee sample: a single thread spinning forever.

fn main() {
    loop {
        std::hint::spin_loop();
    }
}
