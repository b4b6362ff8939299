use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::expr;
use crate::external::ExternalCommand;
use crate::history;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "math".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: Box<dyn Stdin + '_>,
        mut stdout: Box<dyn Stdout + '_>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match T::execute(*self, &mut stdin, &mut stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                eprintln!("turtlesh: {}", e);
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin + '_>,
        mut stdout: Box<dyn Stdout + '_>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            eprint!("{}", self.output);
            Ok(1)
        } else {
            stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Terminate the interactive loop after the current line finishes.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.session.request_exit();
        Ok(1)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => {
                if let Some(home) = env.get_var("HOME") {
                    PathBuf::from(home)
                } else {
                    return Err(anyhow::anyhow!("cd: no target and HOME not set"));
                }
            }
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

/// Show the session's command history by running `cat -n` on the history
/// file through the external launcher, so it participates in pipelines like
/// any spawned program.
pub struct History;

impl CommandFactory for Factory<History> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        _args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == "history" {
            Some(Box::new(History))
        } else {
            None
        }
    }
}

impl ExecutableCommand for History {
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin + '_>,
        stdout: Box<dyn Stdout + '_>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let Some(path) = history::history_path(env) else {
            eprintln!("turtlesh: history: cannot determine home directory");
            return Ok(1);
        };
        let path = path.to_string_lossy().into_owned();
        let factory = Factory::<ExternalCommand>::default();
        let Some(cat) = factory.try_create(env, "cat", &["-n", path.as_str()]) else {
            eprintln!("turtlesh: history: cat not found in PATH");
            return Ok(1);
        };
        cat.execute(stdin, stdout, env)
    }
}

#[derive(FromArgs)]
/// Evaluate an arithmetic expression and print the result.
pub struct Math {
    #[argh(positional)]
    /// expression to evaluate, e.g. "2+3*4"; quote it when it contains spaces.
    pub expr: String,
}

impl BuiltinCommand for Math {
    fn name() -> &'static str {
        "math"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", expr::evaluate(&self.expr))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set the memory alert threshold (percent of total memory) used by the
/// background monitor. The argument is an arithmetic expression.
pub struct SetMemLimit {
    #[argh(positional)]
    /// new threshold, e.g. "80" or "100-25".
    pub expr: String,
}

impl BuiltinCommand for SetMemLimit {
    fn name() -> &'static str {
        "setmemlimit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let limit = expr::evaluate(&self.expr);
        env.session.set_mem_limit(limit as f32);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current memory alert threshold.
pub struct ShowMemLimit {}

impl BuiltinCommand for ShowMemLimit {
    fn name() -> &'static str {
        "showmemlimit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.session.mem_limit())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Control the shared stopwatch: "start" re-arms it, "stop" prints the
/// elapsed seconds since the last start.
pub struct Stopwatch {
    #[argh(positional)]
    /// either "start" or "stop".
    pub action: String,
}

impl BuiltinCommand for Stopwatch {
    fn name() -> &'static str {
        "stopwatch"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match self.action.as_str() {
            "start" => {
                env.session.stopwatch_start();
                Ok(0)
            }
            "stop" => {
                writeln!(stdout, "{}", env.session.stopwatch_elapsed())?;
                Ok(0)
            }
            other => Err(anyhow::anyhow!(
                "stopwatch: expected \"start\" or \"stop\", got \"{}\"",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env as stdenv;
    use std::io;
    use std::io::Cursor;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
    }

    #[test]
    fn test_exit_sets_session_flag_and_returns_one() {
        let mut env = Environment::default();
        let cmd = Exit {};
        let code = cmd
            .execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env)
            .unwrap();
        assert_eq!(code, 1);
        assert!(env.session.should_exit());
    }

    fn make_unique_temp_dir() -> io::Result<PathBuf> {
        let mut p = stdenv::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("builtin_test_cd_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&p)?;
        Ok(p)
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");

        // save original cwd to restore later
        let orig = stdenv::current_dir().unwrap();

        let mut env = Environment::default();

        let target = Some(canonical_temp.to_string_lossy().to_string());
        let cmd = Cd { target };
        let res = cmd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_ok());

        let new_cwd = stdenv::current_dir().unwrap();
        let new_canonical = fs::canonicalize(&new_cwd).unwrap();

        assert_eq!(new_canonical, canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");

        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");

        let orig = stdenv::current_dir().unwrap();

        let mut env = Environment::default();
        env.set_var("HOME", canonical_temp.to_string_lossy().to_string());

        let cmd = Cd { target: None };
        let res = cmd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_ok());

        let new_cwd = stdenv::current_dir().unwrap();
        let new_canonical = fs::canonicalize(&new_cwd).unwrap();

        assert_eq!(new_canonical, canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");

        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_nonexistent_path_errors_and_keeps_cwd() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();

        let mut env = Environment::default();

        let name = format!("nonexistent_dir_for_builtin_test_{}", std::process::id());
        let cmd = Cd { target: Some(name) };
        let res = cmd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_err());
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert_eq!(env.current_dir, orig);
    }

    #[test]
    fn test_math_prints_value() {
        let mut env = Environment::default();
        let mut out = Vec::new();
        let cmd = Math {
            expr: "2+3*4".to_string(),
        };
        let code = cmd
            .execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "14\n");
    }

    #[test]
    fn test_setmemlimit_and_showmemlimit() {
        let mut env = Environment::default();

        let cmd = SetMemLimit {
            expr: "100-20".to_string(),
        };
        let code = cmd
            .execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env)
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(env.session.mem_limit(), 80.0);

        let mut out = Vec::new();
        let cmd = ShowMemLimit {};
        cmd.execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "80\n");
    }

    #[test]
    fn test_stopwatch_stop_without_start_prints_nonnegative() {
        let mut env = Environment::default();
        let mut out = Vec::new();
        let cmd = Stopwatch {
            action: "stop".to_string(),
        };
        let code = cmd
            .execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(code, 0);
        let printed: f64 = String::from_utf8(out).unwrap().trim().parse().unwrap();
        assert!(printed >= 0.0);
    }

    #[test]
    fn test_stopwatch_start_then_stop_is_small() {
        let mut env = Environment::default();

        let start = Stopwatch {
            action: "start".to_string(),
        };
        start
            .execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env)
            .unwrap();

        let mut out = Vec::new();
        let stop = Stopwatch {
            action: "stop".to_string(),
        };
        stop.execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        let printed: f64 = String::from_utf8(out).unwrap().trim().parse().unwrap();
        assert!(printed >= 0.0);
        assert!(printed < 60.0);
    }

    #[test]
    fn test_stopwatch_rejects_unknown_action() {
        let mut env = Environment::default();
        let cmd = Stopwatch {
            action: "pause".to_string(),
        };
        let res = cmd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);
        assert!(res.is_err());
    }
}
