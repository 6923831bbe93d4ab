//! Minimal script lexer used by the test-panel key extractor.
//!
//! It only distinguishes what `extract_keys` needs: identifiers, string
//! literals (opaque, so text inside them is never scanned), and single-char
//! punctuation. Comments and whitespace are dropped. Unterminated strings and
//! comments run to the end of input instead of failing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lexeme {
    Ident(String),
    Str(String),
    Punct(char),
    Other,
}

pub(crate) fn lex(script: &str) -> Vec<Lexeme> {
    let chars: Vec<char> = script.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            let quote = c;
            let mut body = String::new();
            i += 1;
            while i < chars.len() && chars[i] != quote {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    body.push(chars[i]);
                    i += 1;
                }
                body.push(chars[i]);
                i += 1;
            }
            i += 1;
            out.push(Lexeme::Str(body));
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            out.push(Lexeme::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                i += 1;
            }
            out.push(Lexeme::Other);
            continue;
        }

        out.push(Lexeme::Punct(c));
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_dropped_and_strings_are_opaque() {
        let lexemes = lex("// ctx.a\nctx[\"b\"] /* vars.c */ 'x // y'");
        assert_eq!(
            lexemes,
            vec![
                Lexeme::Ident("ctx".into()),
                Lexeme::Punct('['),
                Lexeme::Str("b".into()),
                Lexeme::Punct(']'),
                Lexeme::Str("x // y".into()),
            ]
        );
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        assert_eq!(lex("\"abc"), vec![Lexeme::Str("abc".into())]);
    }
}
