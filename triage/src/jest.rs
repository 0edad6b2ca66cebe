//! Jest console output parsing.
//!
//! CI providers hand back raw runner logs rather than structured results.
//! This extracts the failing test file, the test name and the stack-ish
//! lines that the classifier and strategies feed on.

use regex::Regex;
use std::sync::LazyLock;

static FAIL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FAIL\s+(.+?\.(?:spec|test)\.[jt]sx?)\b").unwrap());

static CODE_FRAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*>?\s*\d+\s+\|").unwrap());

/// What could be recovered from a Jest log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JestFailureInfo {
    pub test_file: Option<String>,
    pub test_name: Option<String>,
    pub stack_trace: Option<String>,
}

/// Parse raw Jest output.
pub fn parse_jest_output(output: &str) -> JestFailureInfo {
    let test_file = output
        .lines()
        .find(|line| line.trim_start().starts_with("FAIL"))
        .and_then(|line| FAIL_LINE.captures(line))
        .map(|caps| caps[1].trim().to_string());

    let test_name = output
        .lines()
        .find(|line| line.contains('●'))
        .map(|line| line.replace('●', "").trim().to_string())
        .filter(|name| !name.is_empty());

    let stack: Vec<&str> = output.lines().filter(|line| is_stack_line(line)).collect();
    let stack_trace = (!stack.is_empty()).then(|| stack.join("\n"));

    JestFailureInfo {
        test_file,
        test_name,
        stack_trace,
    }
}

fn is_stack_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("at ")
        || trimmed.contains(".ts:")
        || trimmed.contains(".js:")
        || CODE_FRAME_LINE.is_match(line)
}
