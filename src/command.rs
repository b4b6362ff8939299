use crate::env::Environment;
use anyhow::Result;
use std::io::{Read, Write};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// How a command stream maps onto a spawned child's standard descriptors.
///
/// `Inherit` means the child shares the shell's own descriptor; `Captured`
/// means the stream is memory-backed (a pipeline stage) and must be pumped
/// through an OS pipe by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Inherit,
    Captured,
}

/// Abstraction over a readable input stream handed to a command.
///
/// Implementors wrap either the shell's standard input or an in-memory
/// buffer produced by an earlier pipeline stage.
pub trait Stdin: Read {
    /// How this stream should be wired when spawning an external process.
    fn kind(&self) -> StreamKind;
}

/// Abstraction over a writable output stream handed to a command.
pub trait Stdout: Write {
    /// How this stream should be wired when spawning an external process.
    fn kind(&self) -> StreamKind;
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin + '_>,
        stdout: Box<dyn Stdout + '_>,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
/// Implementations can use the environment to resolve executables (e.g., using PATH).
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
