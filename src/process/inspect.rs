//! Locating the emulator process in the host process table.

use std::time::Duration;

use regex::Regex;

use super::shell::exec;
use crate::error::{AppError, Result};

/// Listing whose second column is the pid.
pub const PROCESS_LISTING_COMMAND: &str = "ps -ef";

/// `ps -ef` columns before the command.
const LEADING_COLUMNS: usize = 7;

const SEARCH_PROGRAMS: &[&str] = &["grep", "egrep", "fgrep", "pgrep", "pkill"];

/// Command-line pattern identifying one emulator instance.
#[derive(Debug, Clone)]
pub struct ProcessPattern {
    literal: String,
    regex: Regex,
}

impl ProcessPattern {
    /// Build the pattern for `name` from a template containing `{name}`.
    pub fn for_instance(template: &str, name: &str) -> Result<Self> {
        let literal = template.replace("{name}", name);
        let regex = Regex::new(&template.replace("{name}", &regex::escape(name)))
            .map_err(|e| AppError::config(format!("Invalid process pattern {template:?}: {e}")))?;
        Ok(Self { literal, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.literal
    }

    fn matches(&self, line: &str) -> bool {
        self.regex.is_match(line) && !self.is_search_for_pattern(line)
    }

    /// A search tool given the pattern text verbatim (`grep -e <pattern>`) is
    /// looking for the emulator, not running it.
    fn is_search_for_pattern(&self, line: &str) -> bool {
        line.contains(&self.literal)
            && line
                .split_whitespace()
                .skip(LEADING_COLUMNS)
                .any(is_search_program)
    }
}

fn is_search_program(word: &str) -> bool {
    let program = word.rsplit('/').next().unwrap_or(word);
    SEARCH_PROGRAMS.contains(&program)
}

/// Extract the pid of the single process matching `pattern` from `ps -ef` output.
pub fn parse_pid(listing: &str, pattern: &ProcessPattern) -> Result<u32> {
    let matches: Vec<&str> = listing
        .lines()
        .filter(|line| pattern.matches(line))
        .collect();

    let line = match matches.as_slice() {
        [] => {
            return Err(AppError::not_found(
                pattern.as_str(),
                "no matching process",
            ))
        }
        [line] => *line,
        more => {
            return Err(AppError::not_found(
                pattern.as_str(),
                format!("{} processes match", more.len()),
            ))
        }
    };

    let token = line.split_whitespace().nth(1).unwrap_or_default();
    token.parse::<u32>().map_err(|e| {
        AppError::not_found(
            pattern.as_str(),
            format!("pid is not a number ({token:?}): {e}"),
        )
    })
}

/// Find the pid of the process matching `pattern`.
///
/// Listing failures keep their command error kind, including timeouts.
pub async fn find_pid(pattern: &ProcessPattern, timeout: Duration) -> Result<u32> {
    let output = exec(PROCESS_LISTING_COMMAND, timeout).await?;
    parse_pid(&output.stdout_lossy(), pattern)
}
