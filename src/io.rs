//! Output sink for host-registered "print"-style native functions
//! (`spec.md` §8 "native bridge" scenario; SPEC_FULL.md §4.6).
//!
//! Adapted from `ouros::io`'s `PrintWriter` trait, trimmed to this engine's
//! needs: there is no builtin `print` keyword here (the script language has
//! no I/O statements of its own), so a writer only matters to a host that
//! opts into [`Engine::register_print_function`].

use std::cell::RefCell;
use std::io::{self, Write as _};

/// Receives text from a registered print-style native function. Implement
/// this to capture or redirect that output; the default is [`StdPrint`].
pub trait PrintWriter {
    fn write_line(&mut self, text: &str);
}

/// Writes each line straight to stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_line(&mut self, text: &str) {
        let mut stdout = io::stdout();
        let _ = writeln!(stdout, "{text}");
    }
}

/// Collects every line into an in-memory buffer, for tests and embedding
/// scenarios that want to inspect script output without touching stdout.
#[derive(Debug, Default)]
pub struct CollectStringPrint {
    lines: RefCell<Vec<String>>,
}

impl CollectStringPrint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn joined(&self) -> String {
        self.lines.borrow().join("\n")
    }
}

impl PrintWriter for CollectStringPrint {
    fn write_line(&mut self, text: &str) {
        self.lines.get_mut().push(text.to_string());
    }
}

/// Discards everything written to it.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_line(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_string_print_records_lines_in_order() {
        let mut writer = CollectStringPrint::new();
        writer.write_line("first");
        writer.write_line("second");
        assert_eq!(writer.lines(), vec!["first".to_string(), "second".to_string()]);
        assert_eq!(writer.joined(), "first\nsecond");
    }

    #[test]
    fn no_print_drops_everything() {
        let mut writer = NoPrint;
        writer.write_line("ignored");
    }
}
