//! Child process execution for edge recipes.
//!
//! [`CommandRunner`] is the seam between the evaluator and the operating
//! system. [`ShellRunner`] is the production implementation; tests swap in
//! recorders or mocks.

use crate::ast::Recipe;
use camino::Utf8Path;
use std::{
    fmt,
    io::{self, Read, Write},
    process::{Command, Stdio},
    thread,
};
use tracing::debug;

/// Shell used for commands and scripts.
pub const SHELL_PROGRAM: &str = "sh";

/// Exit information for a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    code: Option<i32>,
}

impl CommandStatus {
    /// A status with the given exit code; `None` means killed by a signal.
    #[must_use]
    pub const fn from_code(code: Option<i32>) -> Self {
        Self { code }
    }

    /// A successful status.
    #[must_use]
    pub const fn success_status() -> Self {
        Self { code: Some(0) }
    }

    /// Whether the command exited with code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// The exit code, if the process exited normally.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        self.code
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}"),
            None => f.write_str("termination by signal"),
        }
    }
}

/// Runs one recipe to completion.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run `recipe` inside `workdir` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the process cannot be started or
    /// awaited. A non-zero exit is reported through [`CommandStatus`], not as
    /// an error.
    fn run(&mut self, recipe: &Recipe, workdir: &Utf8Path) -> io::Result<CommandStatus>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &mut T {
    fn run(&mut self, recipe: &Recipe, workdir: &Utf8Path) -> io::Result<CommandStatus> {
        (**self).run(recipe, workdir)
    }
}

/// Runs recipes through `sh`, streaming child output to this process.
///
/// Commands run as `sh -c <command>`; scripts as `sh -e -c <script>` so the
/// first failing line aborts the script.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl ShellRunner {
    /// Create a runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Copy raw child output to `sink`.
///
/// When `sink` stops accepting bytes the remainder is drained so the child
/// never writes into a closed pipe.
fn forward<R, W>(mut reader: R, mut sink: W, stream: &'static str)
where
    R: Read,
    W: Write,
{
    let copied = io::copy(&mut reader, &mut sink).and_then(|_| sink.flush());
    if let Err(err) = copied {
        debug!(stream, error = %err, "parent stream closed; discarding child output");
        if let Err(drain_err) = io::copy(&mut reader, &mut io::sink()) {
            debug!(stream, error = %drain_err, "failed to drain child output");
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, recipe: &Recipe, workdir: &Utf8Path) -> io::Result<CommandStatus> {
        let mut cmd = Command::new(SHELL_PROGRAM);
        match recipe {
            Recipe::Command { command } => cmd.arg("-c").arg(command),
            Recipe::Script { script } => cmd.arg("-e").arg("-c").arg(script),
            Recipe::Rule { rule } => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unresolved rule reference {:?}", rule.items()),
                ));
            }
        };
        cmd.current_dir(workdir.as_std_path());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        debug!(workdir = %workdir, "spawning {SHELL_PROGRAM}");

        let mut child = cmd.spawn()?;
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            if let Err(err) = child.kill() {
                debug!(error = %err, "failed to kill child after pipe setup failed");
            }
            return Err(io::Error::other("child output streams were not captured"));
        };

        let out_handle = thread::spawn(move || forward(stdout, io::stdout(), "stdout"));
        let err_handle = thread::spawn(move || forward(stderr, io::stderr(), "stderr"));

        let status = child.wait()?;
        for (stream, handle) in [("stdout", out_handle), ("stderr", err_handle)] {
            if handle.join().is_err() {
                debug!(stream, "output forwarding thread panicked");
            }
        }
        Ok(CommandStatus::from_code(status.code()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    fn root(dir: &tempfile::TempDir) -> &Utf8Path {
        Utf8Path::from_path(dir.path()).expect("utf8 temp dir")
    }

    #[rstest]
    #[case("exit 0", Some(0))]
    #[case("exit 3", Some(3))]
    fn command_exit_codes_are_reported(#[case] command: &str, #[case] code: Option<i32>) {
        let dir = tempdir().expect("temp dir");
        let recipe = Recipe::Command {
            command: command.into(),
        };
        let status = ShellRunner::new().run(&recipe, root(&dir)).expect("run");
        assert_eq!(status.code(), code);
    }

    #[test]
    fn commands_run_in_workdir() {
        let dir = tempdir().expect("temp dir");
        let recipe = Recipe::Command {
            command: "echo hi > made.txt".into(),
        };
        let status = ShellRunner::new().run(&recipe, root(&dir)).expect("run");
        assert!(status.success());
        assert!(dir.path().join("made.txt").exists());
    }

    #[test]
    fn scripts_stop_at_first_failure() {
        let dir = tempdir().expect("temp dir");
        let recipe = Recipe::Script {
            script: "false\ntouch never.txt\n".into(),
        };
        let status = ShellRunner::new().run(&recipe, root(&dir)).expect("run");
        assert!(!status.success());
        assert!(!dir.path().join("never.txt").exists());
    }

    #[test]
    fn non_utf8_output_does_not_stop_the_command() {
        let dir = tempdir().expect("temp dir");
        let recipe = Recipe::Command {
            command: "printf 'caf\\351 \\n' >&2; sleep 0.3; echo still-working >&2; \
                      printf 'Overfull \\\\hbox \\344\\n'; touch done.txt"
                .into(),
        };
        let status = ShellRunner::new().run(&recipe, root(&dir)).expect("run");
        assert_eq!(status.code(), Some(0));
        assert!(dir.path().join("done.txt").exists());
    }

    #[test]
    fn forward_copies_every_byte() {
        let bytes: &[u8] = b"caf\xe9 \nstill-working\npartial";
        let mut sink = Vec::new();
        forward(bytes, &mut sink, "stdout");
        assert_eq!(sink, bytes);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn forward_drains_after_sink_closes() {
        let bytes = vec![b'x'; 64 * 1024];
        let mut reader = io::Cursor::new(bytes);
        forward(&mut reader, ClosedPipe, "stderr");
        assert_eq!(reader.position(), 64 * 1024);
    }

    #[test]
    fn status_display_names_code() {
        assert_eq!(CommandStatus::from_code(Some(2)).to_string(), "exit status 2");
        assert_eq!(CommandStatus::from_code(None).to_string(), "termination by signal");
    }
}
