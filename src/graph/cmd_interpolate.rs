//! Placeholder substitution for edge commands.
//!
//! `$in` expands to every prerequisite, `$out` to every output and `$first`
//! to the first prerequisite (make's `$<`). Paths are shell-quoted. Text
//! between backticks is copied verbatim.

use camino::Utf8PathBuf;
use shell_quote::{QuoteRefExt, Sh};

use super::GraphError;

/// Quoted replacement text for each placeholder.
struct Replacements {
    ins: String,
    outs: String,
    first: String,
}

const PLACEHOLDERS: [&str; 3] = ["in", "out", "first"];

impl Replacements {
    fn for_token(&self, token: &str) -> &str {
        match token {
            "in" => &self.ins,
            "out" => &self.outs,
            _ => &self.first,
        }
    }
}

fn quote(path: &Utf8PathBuf) -> String {
    let bytes: Vec<u8> = path.as_str().quoted(Sh);
    String::from_utf8(bytes)
        .unwrap_or_else(|err| String::from_utf8_lossy(&err.into_bytes()).into_owned())
}

fn quote_all(paths: &[Utf8PathBuf]) -> String {
    paths.iter().map(quote).collect::<Vec<_>>().join(" ")
}

fn has_unmatched_backticks(s: &str) -> bool {
    s.chars().filter(|&c| c == '`').count().rem_euclid(2) != 0
}

/// Substitute placeholders in `template` and check the result still parses
/// as a shell command.
pub(crate) fn interpolate_command(
    template: &str,
    inputs: &[Utf8PathBuf],
    outputs: &[Utf8PathBuf],
) -> Result<String, GraphError> {
    let replacements = Replacements {
        ins: quote_all(inputs),
        outs: quote_all(outputs),
        first: inputs.first().map(quote).unwrap_or_default(),
    };
    let interpolated = substitute(template, &replacements);
    if has_unmatched_backticks(&interpolated) || shlex::split(&interpolated).is_none() {
        let snippet = interpolated.chars().take(160).collect();
        return Err(GraphError::InvalidCommand {
            command: interpolated,
            snippet,
        });
    }
    Ok(interpolated)
}

/// Substitute placeholders in a multi-line script without the single-command
/// parse check; scripts may legitimately span lines with here-documents.
pub(crate) fn interpolate_script(
    template: &str,
    inputs: &[Utf8PathBuf],
    outputs: &[Utf8PathBuf],
) -> String {
    let replacements = Replacements {
        ins: quote_all(inputs),
        outs: quote_all(outputs),
        first: inputs.first().map(quote).unwrap_or_default(),
    };
    substitute(template, &replacements)
}

const fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Length of the placeholder token starting just after the `$` at `pos`.
fn match_placeholder(chars: &[char], pos: usize) -> Option<&'static str> {
    if pos > 0 && chars.get(pos - 1).is_some_and(|c| is_identifier_char(*c)) {
        return None;
    }
    PLACEHOLDERS.into_iter().find(|token| {
        let len = token.chars().count();
        let matches = token
            .chars()
            .enumerate()
            .all(|(off, ch)| chars.get(pos + 1 + off) == Some(&ch));
        matches && !chars.get(pos + 1 + len).is_some_and(|c| is_identifier_char(*c))
    })
}

fn substitute(template: &str, replacements: &Replacements) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut in_backticks = false;
    let mut i = 0;
    while let Some(&ch) = chars.get(i) {
        if ch == '`' {
            in_backticks ^= true;
        } else if !in_backticks
            && ch == '$'
            && let Some(token) = match_placeholder(&chars, i)
        {
            out.push_str(replacements.for_token(token));
            i += token.len() + 1;
            continue;
        }
        out.push(ch);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn paths(names: &[&str]) -> Vec<Utf8PathBuf> {
        names.iter().map(Utf8PathBuf::from).collect()
    }

    #[rstest]
    #[case("cp $in $out", "cp in aux out")]
    #[case("latexmk -pdf $first", "latexmk -pdf in")]
    #[case("echo $input $out_dir", "echo $input $out_dir")]
    #[case("echo `cat $in` && echo $out", "echo `cat $in` && echo out")]
    #[case("echo a$in", "echo a$in")]
    fn interpolates_placeholders(#[case] template: &str, #[case] expected: &str) {
        let command = interpolate_command(template, &paths(&["in", "aux"]), &paths(&["out"]))
            .expect("command");
        assert_eq!(command, expected);
    }

    #[test]
    fn quotes_paths_with_spaces() {
        let command = interpolate_command(
            "cat $in",
            &paths(&["my tables/a.tex"]),
            &paths(&["out"]),
        )
        .expect("command");
        assert_eq!(shlex::split(&command), Some(vec!["cat".into(), "my tables/a.tex".into()]));
    }

    #[test]
    fn first_is_empty_without_inputs() {
        let command = interpolate_command("echo $first", &[], &paths(&["out"])).expect("command");
        assert_eq!(command.trim_end(), "echo");
    }

    #[test]
    fn rejects_unbalanced_backticks() {
        let err = interpolate_command("echo `", &paths(&["a"]), &paths(&["a"]))
            .expect_err("command should be rejected");
        match err {
            GraphError::InvalidCommand { command, .. } => assert_eq!(command, "echo `"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn scripts_skip_parse_check() {
        let script = interpolate_script("cat <<EOF\n'$out\nEOF\n", &[], &paths(&["x"]));
        assert_eq!(script, "cat <<EOF\n'x\nEOF\n");
    }
}
