//! # Utility Functions Module
//!
//! Small helpers for building external command lines.

use std::path::Path;

/// Converts an iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust,ignore
/// let level = 5;
/// let args = to_string_vec(["-strip", "all", &format!("-o{}", level)]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Quote one argument so it can be pasted into a POSIX shell.
pub fn shell_quote(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));

    if is_plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Render the exact command line used for a file, for failure reports.
pub fn render_command_line(program: &Path, args: &[String], target: &Path) -> String {
    std::iter::once(program.to_string_lossy())
        .chain(args.iter().map(|arg| arg.as_str().into()))
        .chain(std::iter::once(target.to_string_lossy()))
        .map(|part| shell_quote(&part))
        .collect::<Vec<_>>()
        .join(" ")
}
