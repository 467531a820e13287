//! Clipboard access through the terminal's OSC 52 escape, so copying works
//! over SSH and inside multiplexers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use std::io::{self, Write};

pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", BASE64_STANDARD.encode(text))
}

/// Ask the terminal behind `out` to put `text` on the clipboard
pub fn copy_to(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(osc52_sequence(text).as_bytes())?;
    out.flush()
}
