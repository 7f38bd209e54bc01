//! The real, terminal-backed [`Oracle`] implementation used by the CLI.

use crate::diff::Oracle;
use inquire::{Confirm, Text};

/// Prompts on stdin/stdout via `inquire`. An empty answer to a yes/no prompt
/// defaults to "yes" rather than aborting the prompt.
pub struct TerminalOracle;

impl Oracle for TerminalOracle {
    fn ask_yes_no(&self, prompt: &str) -> bool {
        Confirm::new(prompt)
            .with_default(true)
            .prompt()
            .unwrap_or(true)
    }

    fn ask_text(&self, prompt: &str) -> String {
        Text::new(prompt).prompt().unwrap_or_default()
    }
}
