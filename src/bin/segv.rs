//! Debugee sample: dies with a segmentation fault.

fn main() {
    let ptr = std::ptr::null_mut::<u8>();
    unsafe { ptr.write_volatile(1) };
}
