//! POSIX shell quoting
//!
//! Every piece of caller-controlled text that ends up in a remote command line (directives,
//! invocation expressions, paths, job ids) goes through `quote`.

/// Quote a single word for `sh`. Safe words are passed through untouched.
pub fn quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(|c| c.is_ascii_alphanumeric() || "-_./:@=+,%".contains(c)) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Quote each word and join with single spaces
pub fn join<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words.into_iter().map(|w| quote(w.as_ref())).collect::<Vec<_>>().join(" ")
}

/// Build a one-line command that pipes a multi-line script into `program`
///
/// `printf '%s\n'` prints each quoted argument on its own line, so embedded quotes and newlines in
/// the script survive the round trip through the remote shell without a here-document.
pub fn pipe_script(lines: &[String], program: &str) -> String {
    format!("printf '%s\\n' {} | {}", join(lines), program)
}
