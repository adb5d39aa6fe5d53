//! Migration script parsing.
//!
//! A script is split into batches on lines containing only the `GO` token
//! (case-insensitive, surrounding whitespace allowed). `--` line comments are
//! removed before the separator check so `GO -- end of part 1` still splits.
//! Quote state is carried across lines, so neither a `GO` line nor `--` inside
//! a multi-line string literal is touched. Block comments are passed through
//! to the engine verbatim.

/// Batch separator token.
pub const BATCH_SEPARATOR: &str = "GO";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Lexical {
    #[default]
    Code,
    SingleQuoted,
    DoubleQuoted,
    BlockComment,
}

/// Remove `--` comments from one line, updating the lexical state that
/// carries over to the next line.
fn strip_line(line: &str, state: &mut Lexical) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match *state {
            Lexical::Code => match c {
                '-' if chars.peek() == Some(&'-') => break,
                '/' if chars.peek() == Some(&'*') => {
                    out.push(c);
                    out.push('*');
                    chars.next();
                    *state = Lexical::BlockComment;
                }
                '\'' => {
                    out.push(c);
                    *state = Lexical::SingleQuoted;
                }
                '"' => {
                    out.push(c);
                    *state = Lexical::DoubleQuoted;
                }
                _ => out.push(c),
            },
            Lexical::SingleQuoted => {
                out.push(c);
                if c == '\'' {
                    *state = Lexical::Code;
                }
            }
            Lexical::DoubleQuoted => {
                out.push(c);
                if c == '"' {
                    *state = Lexical::Code;
                }
            }
            Lexical::BlockComment => {
                out.push(c);
                if c == '*' && chars.peek() == Some(&'/') {
                    out.push('/');
                    chars.next();
                    *state = Lexical::Code;
                }
            }
        }
    }
    out
}

/// Remove `--` line comments that are outside string literals.
pub fn strip_comments(script: &str) -> String {
    let mut state = Lexical::default();
    script
        .lines()
        .map(|line| strip_line(line, &mut state))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a script into executable batches.
///
/// Blank batches (only whitespace after comment removal) are dropped, so a
/// leading or trailing `GO` never yields an empty command.
pub fn split_batches(script: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();
    let mut state = Lexical::default();

    for line in script.lines() {
        let at_code = state == Lexical::Code;
        let stripped = strip_line(line, &mut state);

        if at_code && stripped.trim().eq_ignore_ascii_case(BATCH_SEPARATOR) {
            push_batch(&mut batches, &mut current);
            continue;
        }
        current.push_str(&stripped);
        current.push('\n');
    }
    if state != Lexical::Code {
        log::warn!("Script ends inside {state:?}; later GO lines were not treated as separators");
    }
    push_batch(&mut batches, &mut current);
    batches
}

fn push_batch(batches: &mut Vec<String>, current: &mut String) {
    let batch = current.trim();
    if !batch.is_empty() {
        batches.push(batch.to_string());
    }
    current.clear();
}

#[cfg(test)]
#[path = "script_test.rs"]
mod tests;
