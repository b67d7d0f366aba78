//! Rendering of bound statement parameters for span display.

use std::fmt::Write;

use crate::statement::SqlValue;

const EMPTY_LIST: &str = "[]";
const NULL_MARKER: &str = "null";
const ELLIPSIS: &str = "...";

/// Renders a bound-parameter array as `[v1,v2,...]`.
///
/// Output is meant for display only. It is deterministic for a given input
/// and never panics on sparse or ragged arrays.
#[derive(Debug, Clone, Copy)]
pub struct ParameterFormatter {
    max_length: usize,
}

impl Default for ParameterFormatter {
    fn default() -> Self {
        Self { max_length: 512 }
    }
}

impl ParameterFormatter {
    /// A formatter that cuts its output after `max_length` characters.
    /// `0` disables truncation.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// A formatter that never truncates.
    pub fn unbounded() -> Self {
        Self { max_length: 0 }
    }

    /// Render positions `0..max_index` of `parameters`.
    ///
    /// `max_index` is the highest 1-based index bound. Indices past the end of
    /// the array are not rendered.
    pub fn render(&self, parameters: &[Option<SqlValue>], max_index: usize) -> String {
        let count = max_index.min(parameters.len());
        if count < max_index {
            tracing::debug!(
                max_index,
                available = parameters.len(),
                "Parameter index exceeds bound values, clamping"
            );
        }
        if count == 0 {
            return EMPTY_LIST.to_string();
        }

        let mut body = String::new();
        let mut chars = 0;
        for (i, parameter) in parameters[..count].iter().enumerate() {
            let start = body.len();
            if i > 0 {
                body.push(',');
            }
            match parameter {
                Some(value) => {
                    let _ = write!(body, "{value}");
                }
                None => body.push_str(NULL_MARKER),
            }
            chars += body[start..].chars().count();

            if self.max_length > 0 && chars + EMPTY_LIST.len() > self.max_length {
                return self.truncated(&body);
            }
        }

        format!("[{body}]")
    }

    fn truncated(&self, body: &str) -> String {
        let full = format!("[{body}]");
        let mut cut: String = full.chars().take(self.max_length).collect();
        cut.push_str(ELLIPSIS);
        cut
    }
}
