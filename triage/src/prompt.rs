//! Prompt rendering and response parsing for generative fixes.
//!
//! The model is asked to answer in a fixed two-part format:
//!
//! ~~~text
//! FIXED_CODE:
//! ```typescript
//! <complete corrected file>
//! ```
//!
//! EXPLANATION:
//! <short explanation>
//! ~~~
//!
//! [`parse_fix_response`] is lenient: when the model ignores the format the
//! whole response is taken as code.

use regex::Regex;
use std::sync::LazyLock;

use crate::backend::FixRequest;

/// System message sent ahead of every fix prompt.
pub const SYSTEM_PROMPT: &str = "You are an expert at fixing JavaScript and TypeScript test failures.
Your task is to analyze test failures and provide corrected code.
Always return valid, working code that will pass the tests.
Focus on:
- Snapshot updates
- Assertion value corrections
- Mock adjustments
- Property name changes
- Type fixes";

/// Explanation used when the response has no `EXPLANATION:` section.
pub const DEFAULT_EXPLANATION: &str = "AI-generated fix applied";

static FIXED_CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)FIXED_CODE:\s*```(?:typescript|javascript|tsx|jsx|ts|js)?\s*([\s\S]*?)```")
        .unwrap()
});

static EXPLANATION_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)EXPLANATION:\s*([\s\S]*)$").unwrap());

/// Code and explanation extracted from a model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFixResponse {
    pub code: String,
    pub explanation: String,
}

/// Render the user prompt for one failing test file.
pub fn build_fix_prompt(request: &FixRequest) -> String {
    let mut prompt = String::from("## Test Failure Analysis\n\n");
    prompt.push_str(&format!("**Error Message:**\n{}\n\n", request.error_message));
    prompt.push_str(&format!("**Stack Trace:**\n{}\n\n", request.stack_trace));

    if let Some(diff) = request.code_diff.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("**Recent Code Changes:**\n```diff\n{}\n```\n\n", diff));
    }

    prompt.push_str(&format!(
        "**Current Test File ({}):**\n```typescript\n{}\n```\n\n",
        request.test_file, request.file_content
    ));
    prompt.push_str("Please provide:\n");
    prompt.push_str("1. The corrected test file code (complete file)\n");
    prompt.push_str("2. A brief explanation of what was fixed\n\n");
    prompt.push_str("Format your response as:\n");
    prompt.push_str("FIXED_CODE:\n```typescript\n[code here]\n```\n\n");
    prompt.push_str("EXPLANATION:\n[explanation here]");
    prompt
}

/// Split a model response into replacement code and explanation.
pub fn parse_fix_response(response: &str) -> ParsedFixResponse {
    let code = FIXED_CODE_BLOCK
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|code| !code.is_empty())
        .unwrap_or(response)
        .to_string();

    let explanation = EXPLANATION_SECTION
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|text| !text.is_empty())
        .unwrap_or(DEFAULT_EXPLANATION)
        .to_string();

    ParsedFixResponse { code, explanation }
}
