//! Text normalisation: whitespace collapsing and non-ASCII stripping.
//!
//! The model input must be a single clean line of ASCII text. The rules run
//! in a fixed order:
//!
//! 1. every maximal whitespace run → one space (the ASCII separators
//!    U+001C..U+001F count as whitespace)
//! 2. every maximal run of code points ≥ U+0080 → one space
//! 3. spaces produced by rule 2 next to existing spaces → one space
//! 4. trim both ends
//!
//! Rule 3 makes the function idempotent and guarantees no output contains
//! two consecutive spaces.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::error;

static RE_WHITESPACE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"[\s\x1C-\x1F]+"));

static RE_NON_ASCII: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"[^\x00-\x7F]+"));

/// Normalise `text`. Never fails; on an internal error the input is
/// returned unchanged and the error is logged.
pub fn normalize(text: &str) -> String {
    match try_normalize(text) {
        Ok(cleaned) => cleaned,
        Err(e) => {
            error!("Error preprocessing text: {}", e);
            text.to_string()
        }
    }
}

fn try_normalize(text: &str) -> Result<String, &'static regex::Error> {
    let whitespace = Result::as_ref(&*RE_WHITESPACE)?;
    let non_ascii = Result::as_ref(&*RE_NON_ASCII)?;

    let collapsed = whitespace.replace_all(text, " ");
    let ascii = non_ascii.replace_all(&collapsed, " ");
    let recollapsed = whitespace.replace_all(&ascii, " ");
    Ok(recollapsed.trim().to_string())
}
