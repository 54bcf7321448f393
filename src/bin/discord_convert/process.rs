//! External process seam.
//!
//! Every ffmpeg and ffprobe invocation goes through [`ProcessRunner`],
//! so the planning and pipeline logic can be exercised with fakes.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Captured result of one finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ProcessOutput {
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Diagnostic text for a failed run: stderr, or stdout if stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        let mut text = if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        };
        if text.is_empty() {
            let _ = write!(
                text,
                "process exited with status {}",
                self.code.map_or_else(|| "signal".to_string(), |code| code.to_string())
            );
        }
        text
    }
}

/// Runs an external program to completion and captures its output.
///
/// Calls block until the process exits. There is no timeout.
pub trait ProcessRunner {
    /// Run `program` with `args`.
    ///
    /// # Errors
    /// Returns an error only if the process could not be started.
    /// A non-zero exit is reported through [`ProcessOutput::code`].
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Render a command line for dry-run and verbose output.
pub fn format_command(program: &Path, args: &[OsString]) -> String {
    let mut line = discord_tools::path_to_string(program);
    for arg in args {
        let arg = arg.to_string_lossy();
        if arg.contains(' ') || arg.is_empty() {
            let _ = write!(line, " \"{arg}\"");
        } else {
            let _ = write!(line, " {arg}");
        }
    }
    line
}

#[cfg(test)]
pub mod fake {
    //! Scriptable [`ProcessRunner`] used by the unit tests.

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::ffi::OsString;
    use std::io;
    use std::path::{Path, PathBuf};

    use super::{ProcessOutput, ProcessRunner};

    /// A single recorded invocation.
    #[derive(Debug, Clone)]
    pub struct Call {
        pub program: PathBuf,
        pub args: Vec<String>,
    }

    impl Call {
        pub fn has_flag(&self, flag: &str, value: &str) -> bool {
            self.args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
        }

        pub fn value_of(&self, flag: &str) -> Option<&str> {
            self.args
                .windows(2)
                .find(|pair| pair[0] == flag)
                .map(|pair| pair[1].as_str())
        }
    }

    type Handler = Box<dyn Fn(&Call) -> io::Result<ProcessOutput>>;

    /// Records every call and answers with a handler, or with queued outputs.
    #[derive(Default)]
    pub struct FakeRunner {
        pub calls: RefCell<Vec<Call>>,
        queued: RefCell<VecDeque<io::Result<ProcessOutput>>>,
        handler: Option<Handler>,
    }

    impl FakeRunner {
        pub fn with_handler(handler: impl Fn(&Call) -> io::Result<ProcessOutput> + 'static) -> Self {
            Self {
                handler: Some(Box::new(handler)),
                ..Self::default()
            }
        }

        pub fn push(&self, output: io::Result<ProcessOutput>) {
            self.queued.borrow_mut().push_back(output);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
            let call = Call {
                program: program.to_path_buf(),
                args: args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect(),
            };
            self.calls.borrow_mut().push(call.clone());
            if let Some(output) = self.queued.borrow_mut().pop_front() {
                return output;
            }
            self.handler.as_ref().map_or_else(|| Ok(ok("", "")), |handler| handler(&call))
        }
    }

    pub fn ok(stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    pub fn failed(code: i32, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[cfg(test)]
mod process_tests {
    use super::*;

    #[test]
    fn diagnostic_prefers_stderr() {
        let output = ProcessOutput {
            code: Some(1),
            stdout: "out".to_string(),
            stderr: " err \n".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.diagnostic(), "err");
    }

    #[test]
    fn diagnostic_falls_back_to_exit_status() {
        let output = ProcessOutput {
            code: Some(234),
            ..ProcessOutput::default()
        };
        assert_eq!(output.diagnostic(), "process exited with status 234");

        let killed = ProcessOutput::default();
        assert_eq!(killed.diagnostic(), "process exited with status signal");
    }

    #[test]
    fn format_command_quotes_arguments_with_spaces() {
        let args: Vec<OsString> = ["-i", "my clip.mov", "-an"].iter().map(OsString::from).collect();
        assert_eq!(
            format_command(Path::new("ffmpeg"), &args),
            "ffmpeg -i \"my clip.mov\" -an"
        );
    }
}
