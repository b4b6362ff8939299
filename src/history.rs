use crate::env::Environment;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// File name of the on-disk history, relative to the user's home directory.
const HISTORY_FILE: &str = ".turtlesh_history";

/// Resolve the history file path.
///
/// Uses `$HOME` from the shell environment, falling back to the OS user
/// record when the variable is unset.
pub fn history_path(env: &Environment) -> Option<PathBuf> {
    let home = env
        .get_var("HOME")
        .map(PathBuf::from)
        .or_else(std::env::home_dir)?;
    Some(home.join(HISTORY_FILE))
}

/// Append one executed line to the history file as its space-joined tokens
/// plus a newline.
///
/// The file is created on first use and always opened in append mode.
pub fn append(env: &Environment, tokens: &[String]) -> std::io::Result<()> {
    let Some(path) = history_path(env) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no home directory",
        ));
    };
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", tokens.join(" "))
}
