/// Debug switches for one interpreter.
///
/// Defaults follow the `print_code` and `trace_execution` cargo features, so a build with
/// either feature enabled behaves as if the matching command-line flag was always passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Write the disassembly of every successfully compiled chunk before running it.
    pub print_code: bool,
    /// Print the operand stack and the next instruction before every step, to the same
    /// stream that receives the result.
    pub trace_execution: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            print_code: cfg!(feature = "print_code"),
            trace_execution: cfg!(feature = "trace_execution"),
        }
    }
}

impl Config {
    pub fn with_print_code(mut self, enabled: bool) -> Self {
        self.print_code |= enabled;
        self
    }

    pub fn with_trace_execution(mut self, enabled: bool) -> Self {
        self.trace_execution |= enabled;
        self
    }
}
