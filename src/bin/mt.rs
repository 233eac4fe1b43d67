//! Debugee sample: spawns one worker thread, then both threads idle.
//! Two tasks at steady state.

use std::thread;
use std::time::Duration;

fn main() {
    let _worker = thread::spawn(|| loop {
        thread::sleep(Duration::from_millis(50));
    });

    loop {
        thread::sleep(Duration::from_millis(50));
    }
}
