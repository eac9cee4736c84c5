//! Tokenizer for the expression language inside `{{ … }}` spans.

use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Str(String),
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Plus,
    Minus,
    Pipe,
    Dot,
    LParen,
    RParen,
    Comma,
    Assign,
}

/// A token plus the byte offset where it started, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Tok,
    pub offset: usize,
}

/// Tokenizes one expression. Offsets are relative to the expression text.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>, TemplateError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = text[pos..].chars().next().unwrap_or('\0');
        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }

        let start = pos;
        let tok = match ch {
            '(' => {
                pos += 1;
                Tok::LParen
            }
            ')' => {
                pos += 1;
                Tok::RParen
            }
            ',' => {
                pos += 1;
                Tok::Comma
            }
            '.' => {
                pos += 1;
                Tok::Dot
            }
            '|' => {
                pos += 1;
                Tok::Pipe
            }
            '+' => {
                pos += 1;
                Tok::Plus
            }
            '-' => {
                pos += 1;
                Tok::Minus
            }
            '=' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    pos += 2;
                    Tok::Eq
                } else {
                    pos += 1;
                    Tok::Assign
                }
            }
            '!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    pos += 2;
                    Tok::Ne
                } else {
                    return Err(TemplateError::UnexpectedCharacter { ch, offset: start });
                }
            }
            '<' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    pos += 2;
                    Tok::Le
                } else {
                    pos += 1;
                    Tok::Lt
                }
            }
            '>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    pos += 2;
                    Tok::Ge
                } else {
                    pos += 1;
                    Tok::Gt
                }
            }
            '\'' | '"' => {
                let (literal, end) = lex_string(text, pos, ch)?;
                pos = end;
                Tok::Str(literal)
            }
            '0'..='9' => {
                let end = scan_while(text, pos, |c| c.is_ascii_digit());
                let literal = &text[pos..end];
                let value: i64 = literal
                    .parse()
                    .map_err(|_| TemplateError::IntegerOverflow { offset: start })?;
                pos = end;
                Tok::Int(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = scan_while(text, pos, |c| c.is_ascii_alphanumeric() || c == '_');
                let ident = text[pos..end].to_string();
                pos = end;
                Tok::Ident(ident)
            }
            _ => return Err(TemplateError::UnexpectedCharacter { ch, offset: start }),
        };
        tokens.push(Spanned { tok, offset: start });
    }

    Ok(tokens)
}

fn scan_while(text: &str, start: usize, keep: impl Fn(char) -> bool) -> usize {
    let mut end = start;
    for ch in text[start..].chars() {
        if keep(ch) {
            end += ch.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Lexes a quoted string starting at `start` (which holds the quote char).
/// Returns the unescaped contents and the offset past the closing quote.
fn lex_string(text: &str, start: usize, quote: char) -> Result<(String, usize), TemplateError> {
    let mut literal = String::new();
    let mut chars = text[start + 1..].char_indices();

    while let Some((i, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((literal, start + 1 + i + 1)),
            '\\' => match chars.next() {
                Some((_, escaped @ ('\\' | '\'' | '"'))) => literal.push(escaped),
                Some((_, 'n')) => literal.push('\n'),
                Some((_, 't')) => literal.push('\t'),
                Some((_, other)) => {
                    literal.push('\\');
                    literal.push(other);
                }
                None => break,
            },
            other => literal.push(other),
        }
    }

    Err(TemplateError::UnterminatedString { offset: start })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(text: &str) -> Vec<Tok> {
        tokenize(text).unwrap().into_iter().map(|s| s.tok).collect()
    }

    #[test]
    fn comparison_and_idents() {
        assert_eq!(
            toks("correspondent == 'The Bank'"),
            vec![
                Tok::Ident("correspondent".to_string()),
                Tok::Eq,
                Tok::Str("The Bank".to_string()),
            ]
        );
    }

    #[test]
    fn call_with_keyword_argument() {
        assert_eq!(
            toks("num_documents(created_year=created_year)"),
            vec![
                Tok::Ident("num_documents".to_string()),
                Tok::LParen,
                Tok::Ident("created_year".to_string()),
                Tok::Assign,
                Tok::Ident("created_year".to_string()),
                Tok::RParen,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(toks(r#"'it\'s'"#), vec![Tok::Str("it's".to_string())]);
        assert_eq!(toks(r#""a\\b""#), vec![Tok::Str("a\\b".to_string())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(
            tokenize("'open"),
            Err(TemplateError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn bare_bang_is_rejected() {
        assert!(matches!(
            tokenize("a ! b"),
            Err(TemplateError::UnexpectedCharacter { ch: '!', .. })
        ));
    }
}
