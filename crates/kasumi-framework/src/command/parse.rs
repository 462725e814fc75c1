//! Splitting and tokenizing of command text.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::SyntaxError;

static INVOCATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\A(\S+)(?:\s+(.+))?\z").ok());

const BLOCK_FENCE: &str = "```";

/// Splits prefix-stripped text into a command name and its raw arguments.
///
/// Returns `None` when the text holds no command token at all.
pub fn split_invocation(text: &str) -> Option<(&str, &str)> {
    let captures = INVOCATION.as_ref()?.captures(text)?;
    let name = captures.get(1)?.as_str();
    let rest = captures.get(2).map_or("", |m| m.as_str());
    Some((name, rest))
}

/// `concat` mode: the whole argument text as a single argument, with one
/// surrounding code fence removed.
///
/// Empty input produces no argument.
pub fn concat(input: &str) -> Vec<String> {
    if input.is_empty() {
        return Vec::new();
    }
    vec![strip_fence(input).to_owned()]
}

fn strip_fence(input: &str) -> &str {
    if input.len() >= 2 * BLOCK_FENCE.len()
        && let Some(inner) = input
            .strip_prefix(BLOCK_FENCE)
            .and_then(|s| s.strip_suffix(BLOCK_FENCE))
    {
        return inner;
    }
    if !input.starts_with("``")
        && input.len() >= 2
        && let Some(inner) = input.strip_prefix('`').and_then(|s| s.strip_suffix('`'))
    {
        return inner;
    }
    input
}

/// `words` mode: splits on whitespace, honoring quotes and code fences.
///
/// - `` ```block``` `` is one token, fences included, never joined with
///   neighbours;
/// - `` `span` `` yields its content;
/// - `"quoted text"` yields its content with `""` collapsed to `"`;
/// - a bare `""` is an escaped literal quote;
/// - anything else up to whitespace, a quote or a backtick is a bare run.
///
/// Pieces not separated by whitespace join into one token.
pub fn words(input: &str) -> Result<Vec<String>, SyntaxError> {
    let mut words = Vec::new();
    let mut accum = String::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        if let Some(body) = rest.strip_prefix(BLOCK_FENCE) {
            let end = body.find(BLOCK_FENCE).ok_or(SyntaxError::BadQuotes)?;
            if !accum.is_empty() {
                words.push(std::mem::take(&mut accum));
            }
            words.push(format!("{BLOCK_FENCE}{}{BLOCK_FENCE}", &body[..end]));
            rest = &body[end + BLOCK_FENCE.len()..];
            continue;
        }

        rest = if let Some(body) = rest.strip_prefix('`') {
            let end = body.find('`').ok_or(SyntaxError::BadQuotes)?;
            accum.push_str(&body[..end]);
            &body[end + 1..]
        } else if let Some(after) = rest.strip_prefix("\"\"") {
            accum.push('"');
            after
        } else if let Some(body) = rest.strip_prefix('"') {
            quoted(body, &mut accum)?
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '"' || c == '`')
                .unwrap_or(rest.len());
            accum.push_str(&rest[..end]);
            &rest[end..]
        };

        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            words.push(std::mem::take(&mut accum));
        }
    }

    Ok(words)
}

/// Consumes a quoted span after its opening quote. Returns the remainder
/// after the closing quote.
fn quoted<'a>(body: &'a str, out: &mut String) -> Result<&'a str, SyntaxError> {
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            out.push(c);
            continue;
        }
        if chars.next_if(|&(_, next)| next == '"').is_some() {
            out.push('"');
            continue;
        }
        return Ok(&body[i + 1..]);
    }
    Err(SyntaxError::BadQuotes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn tokens(input: &str) -> Vec<String> {
        assert_ok!(words(input))
    }

    #[test]
    fn splits_name_and_arguments() {
        assert_eq!(split_invocation("echo hello  world"), Some(("echo", "hello  world")));
        assert_eq!(split_invocation("ping"), Some(("ping", "")));
        assert_eq!(split_invocation("say\nline one\nline two"), Some(("say", "line one\nline two")));
        assert_eq!(split_invocation(""), None);
    }

    #[test]
    fn mixed_quoting() {
        assert_eq!(tokens(r#"foo "bar baz" `q u x`"#), ["foo", "bar baz", "q u x"]);
    }

    #[test]
    fn adjacent_pieces_join() {
        assert_eq!(tokens(r#"a"b c"`d` e"#), ["ab cd", "e"]);
        assert_eq!(tokens(r#""say ""hi""" x"#), [r#"say "hi""#, "x"]);
        assert_eq!(tokens(r#"""quoted"""#), [r#""quoted""#]);
    }

    #[test]
    fn code_blocks_stay_whole() {
        assert_eq!(
            tokens("run ```let x = \"1\";\nx``` after"),
            ["run", "```let x = \"1\";\nx```", "after"]
        );
        assert_eq!(tokens("pre```a```post"), ["pre", "```a```", "post"]);
    }

    #[test]
    fn empty_spans_are_tokens() {
        assert_eq!(tokens("`` x"), ["", "x"]);
        assert!(tokens("   ").is_empty());
    }

    #[test]
    fn malformed_quotes_are_rejected() {
        assert_eq!(assert_err!(words(r#"foo "bar"#)), SyntaxError::BadQuotes);
        assert_err!(words("foo `bar"));
        assert_err!(words("```never closed"));
    }

    #[test]
    fn concat_strips_one_fence() {
        assert_eq!(concat("hello world"), ["hello world"]);
        assert_eq!(concat("```\ncode\n```"), ["\ncode\n"]);
        assert_eq!(concat("`inline`"), ["inline"]);
        assert_eq!(concat("``"), ["``"]);
        assert!(concat("").is_empty());
    }
}
