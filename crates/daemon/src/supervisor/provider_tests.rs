// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn claude_cli_resumes_an_existing_session() {
    let args = ClaudeCli.args("hello", Some("sess-1"));
    assert_eq!(args, vec!["-p", "hello", "--output-format", "json", "--resume", "sess-1"]);
}

#[test]
fn claude_cli_omits_resume_without_a_session() {
    let args = ClaudeCli.args("hello", None);
    assert!(!args.contains(&"--resume".to_string()));
}

#[test]
fn gemini_cli_is_not_structured() {
    assert!(!GeminiCli.structured_output());
    assert!(ClaudeCli.structured_output());
}
