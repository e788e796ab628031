//! # Utility Functions Module
//!
//! Helper per costruire e loggare le righe di comando dei tool esterni.

use std::ffi::OsString;

/// Builds a `Vec<String>` from heterogeneous `Display` items.
///
/// # Example
/// ```rust,ignore
/// let crf = 28;
/// let args = args!["-crf", crf, "-preset", "medium"];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$(::std::string::ToString::to_string(&$item)),*]
    };
}

/// Render a command line for logs, quoting arguments that contain spaces.
pub fn display_command(program: &std::path::Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|arg| {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("\"{}\"", arg)
            } else {
                arg.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
