use crate::command::{CommandFactory, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::history;
use crate::io_adapters::{InheritedStdin, InheritedStdout, MemReader, MemWriter};
use crate::lexer;
use crate::session::Session;
use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate — BuiltinCommand and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The operator governing one split of a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Pipe,
    AppendRedirect,
    TruncateRedirect,
    And,
    Sequence,
}

/// Find the leftmost operator token. Exact token match only; an operator
/// character embedded in a longer token is not an operator.
fn leftmost_operator(tokens: &[String]) -> Option<(usize, Operator)> {
    tokens.iter().enumerate().find_map(|(i, tok)| {
        let op = match tok.as_str() {
            "|" => Operator::Pipe,
            ">>" => Operator::AppendRedirect,
            ">" => Operator::TruncateRedirect,
            "&&" => Operator::And,
            ";" => Operator::Sequence,
            _ => return None,
        };
        Some((i, op))
    })
}

/// Where a command reads its input from.
enum Input {
    /// The shell's own standard input.
    Inherited,
    /// Bytes produced by an earlier pipeline stage.
    Bytes(Vec<u8>),
}

impl Input {
    /// Split an input between the left command of an `&&`/`;` pair and the
    /// remainder. A piped buffer is consumed by the left command; the
    /// remainder sees an exhausted stream, like reading a drained pipe.
    fn split(self) -> (Input, Input) {
        match self {
            Input::Inherited => (Input::Inherited, Input::Inherited),
            Input::Bytes(buf) => (Input::Bytes(buf), Input::Bytes(Vec::new())),
        }
    }
}

/// Where a command writes its output to.
enum Output<'a> {
    /// The shell's own standard output.
    Inherited,
    /// Captured for a following pipeline stage or a redirect target.
    Buffer(&'a mut Vec<u8>),
}

/// A minimal shell interpreter that can execute built-in and external
/// commands joined by the operators `|`, `>`, `>>`, `&&` and `;`.
///
/// The interpreter maintains an [`Environment`] and a list of
/// [`CommandFactory`] objects that are queried to create commands by name.
/// See [`Default`] for the built-in factories included out of the box.
///
/// Example
/// ```
/// use turtlesh::Interpreter;
/// let mut sh = Interpreter::default();
/// let tokens = turtlesh::lexer::split_into_tokens("math 2+3*4").unwrap();
/// let mut out = Vec::new();
/// let code = sh.execute_with_output(&tokens, &mut out).unwrap();
/// assert_eq!(code, 0);
/// assert_eq!(out, b"14\n");
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(session: Session, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(session),
            commands,
        }
    }

    /// Handle to the shared session state, for wiring up the background
    /// monitor and the main-loop exit check.
    pub fn session(&self) -> Session {
        self.env.session.clone()
    }

    /// Execute one tokenized command line with inherited standard streams.
    pub fn execute(&mut self, tokens: &[String]) -> Result<ExitCode> {
        self.execute_split(tokens, Input::Inherited, &mut Output::Inherited)
    }

    /// Execute one tokenized command line, capturing its standard output
    /// into `out` instead of the terminal.
    pub fn execute_with_output(&mut self, tokens: &[String], out: &mut Vec<u8>) -> Result<ExitCode> {
        self.execute_split(tokens, Input::Inherited, &mut Output::Buffer(out))
    }

    /// Recursive operator scan: split at the leftmost operator token and
    /// route the two sides, or dispatch the whole line when no operator is
    /// present.
    fn execute_split(
        &mut self,
        tokens: &[String],
        input: Input,
        out: &mut Output<'_>,
    ) -> Result<ExitCode> {
        let Some((at, op)) = leftmost_operator(tokens) else {
            return self.run_command(tokens, input, out);
        };

        let left = &tokens[..at];
        let right = &tokens[at + 1..];
        log::debug!("split {:?} at {}: {:?} / {:?}", op, at, left, right);

        match op {
            Operator::Pipe => {
                let mut pipe_buf = Vec::new();
                self.run_command(left, input, &mut Output::Buffer(&mut pipe_buf))?;
                // The connector's result is the right side's status.
                self.execute_split(right, Input::Bytes(pipe_buf), out)
            }
            Operator::AppendRedirect => self.run_redirect(left, right, input, true),
            Operator::TruncateRedirect => self.run_redirect(left, right, input, false),
            Operator::And => {
                let (left_in, right_in) = input.split();
                let left_code = self.run_command(left, left_in, out)?;
                if left_code != 0 {
                    return Ok(0);
                }
                let right_code = self.execute_split(right, right_in, out)?;
                // Collapsed boolean, not the right side's real status.
                Ok(ExitCode::from(right_code != 0))
            }
            Operator::Sequence => {
                let (left_in, right_in) = input.split();
                let _ = self.run_command(left, left_in, out)?;
                self.execute_split(right, right_in, out)
            }
        }
    }

    /// Plain-run path: dispatch a single operator-free command to the first
    /// factory that recognizes it.
    fn run_command(
        &mut self,
        tokens: &[String],
        input: Input,
        out: &mut Output<'_>,
    ) -> Result<ExitCode> {
        if tokens.is_empty() {
            // A line with zero tokens is an implicit "exit".
            self.write_out(out, b"exit\n")?;
            self.env.session.request_exit();
            return Ok(0);
        }

        let name = tokens[0].as_str();
        let args: Vec<&str> = tokens[1..].iter().map(|s| s.as_str()).collect();

        let mut created = None;
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, &args) {
                created = Some(cmd);
                break;
            }
        }
        let Some(cmd) = created else {
            eprintln!("turtlesh: command not found: {}", name);
            return Ok(127);
        };

        let stdin_box: Box<dyn Stdin> = match input {
            Input::Inherited => Box::new(InheritedStdin),
            Input::Bytes(buf) => Box::new(MemReader::new(buf)),
        };

        match out {
            Output::Inherited => {
                let stdout_box: Box<dyn Stdout> = Box::new(InheritedStdout);
                cmd.execute(stdin_box, stdout_box, &mut self.env)
            }
            Output::Buffer(buf) => {
                let (writer, handle) = MemWriter::with_handle();
                let code = cmd.execute(stdin_box, Box::new(writer), &mut self.env)?;
                buf.extend_from_slice(&handle.borrow());
                Ok(code)
            }
        }
    }

    /// Redirect connector: run `left` with its output captured, then deliver
    /// every captured byte into the destination file (the first token of
    /// `right`).
    fn run_redirect(
        &mut self,
        left: &[String],
        right: &[String],
        input: Input,
        append: bool,
    ) -> Result<ExitCode> {
        let Some(target) = right.first() else {
            eprintln!("turtlesh: redirect: missing target file");
            return Ok(1);
        };

        let mut captured = Vec::new();
        self.run_command(left, input, &mut Output::Buffer(&mut captured))?;

        let path = self.resolve_path(target);
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if append {
            options.append(true);
        } else {
            options.truncate(true);
        }
        let mut file = match options.open(&path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("turtlesh: cannot open {}: {}", path.display(), e);
                return Ok(1);
            }
        };
        if let Err(e) = file.write_all(&captured) {
            eprintln!("turtlesh: write to {} failed: {}", path.display(), e);
            return Ok(1);
        }
        Ok(0)
    }

    fn resolve_path(&self, target: &str) -> PathBuf {
        let path = Path::new(target);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.env.current_dir.join(path)
        }
    }

    fn write_out(&self, out: &mut Output<'_>, bytes: &[u8]) -> Result<()> {
        match out {
            Output::Inherited => {
                std::io::stdout().write_all(bytes)?;
            }
            Output::Buffer(buf) => buf.extend_from_slice(bytes),
        }
        Ok(())
    }

    /// The interactive Read-Eval-Print Loop.
    ///
    /// Prompts with the current working directory, tokenizes each line,
    /// executes it and appends it to the on-disk history. The loop ends when
    /// the session exit flag is set (the `exit` built-in, an empty command
    /// line, or end of input).
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        while !self.env.session.should_exit() {
            let prompt = format!("{}$ ", self.env.current_dir.display());
            match rl.readline(&prompt) {
                Ok(line) => {
                    rl.add_history_entry(line.as_str())?;
                    let tokens = match lexer::split_into_tokens(&line) {
                        Ok(tokens) => tokens,
                        Err(e) => {
                            eprintln!("turtlesh: {}", e);
                            continue;
                        }
                    };
                    log::debug!("tokens = {:?}", tokens);
                    if let Err(e) = self.execute(&tokens) {
                        eprintln!("turtlesh: {}", e);
                    }
                    // History is written after execution, exit lines included.
                    if let Err(e) = history::append(&self.env, &tokens) {
                        log::warn!("history write failed: {}", e);
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    self.env.session.request_exit();
                }
                Err(err) => {
                    eprintln!("turtlesh: readline error: {:?}", err);
                    self.env.session.request_exit();
                }
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the fixed built-in set (`exit`, `cd`,
    /// `history`, `math`, `setmemlimit`, `showmemlimit`, `stopwatch`) and
    /// the external command launcher.
    fn default() -> Self {
        Self::with_session(Session::new())
    }
}

impl Interpreter {
    /// Like [`Default`], sharing the provided session with the caller.
    pub fn with_session(session: Session) -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(
            session,
            vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<History>::default()),
                Box::new(Factory::<Math>::default()),
                Box::new(Factory::<SetMemLimit>::default()),
                Box::new(Factory::<ShowMemLimit>::default()),
                Box::new(Factory::<Stopwatch>::default()),
                Box::new(Factory::<ExternalCommand>::default()),
            ],
        )
    }
}
