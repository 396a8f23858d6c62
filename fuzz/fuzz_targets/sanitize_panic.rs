#![no_main]
use ferrotex_directive::{Sanitizer, render_document};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);
    let sanitizer = Sanitizer::default();
    if let Ok(sanitized) = sanitizer.sanitize(&s) {
        let _ = render_document(&sanitized);
    }
});
