//! Output rendering. Structured results go to stdout as JSON; logs stay
//! on stderr.

use std::io::{self, Write};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Serialize `data` as JSON, compact or pretty per `--compact`.
pub fn render_json<T: serde::Serialize + ?Sized>(
    global: &GlobalOpts,
    data: &T,
) -> Result<String, CliError> {
    let text = if global.compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(text)
}

/// Write one block of output followed by a newline.
pub fn print_output(text: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}
