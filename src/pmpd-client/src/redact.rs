//! Log redaction for framed commands.
//!
//! Commands are logged at trace level. The `password` command carries the
//! daemon secret as its argument, so it is masked before it reaches a log.

use std::borrow::Cow;

const REDACTED: &str = "[REDACTED]";

/// Commands whose arguments are secrets.
const SENSITIVE_COMMANDS: &[&str] = &["password"];

/// Mask the arguments of sensitive commands in a framed request line.
///
/// # Examples
/// ```
/// use pmpd_client::redact::redact_command;
///
/// let output = redact_command("password \"hunter2\"\n");
/// assert!(!output.contains("hunter2"));
/// assert!(output.contains("[REDACTED]"));
/// ```
pub fn redact_command(line: &str) -> Cow<'_, str> {
    let trimmed = line.trim_end_matches('\n');
    let (name, rest) = match trimmed.split_once(' ') {
        Some(parts) => parts,
        None => return Cow::Borrowed(line),
    };
    if rest.is_empty() || !is_sensitive(name) {
        return Cow::Borrowed(line);
    }
    Cow::Owned(format!("{name} \"{REDACTED}\""))
}

/// Whether a command name carries a secret argument.
pub fn is_sensitive(command: &str) -> bool {
    SENSITIVE_COMMANDS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(command))
}
