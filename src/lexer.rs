//! Line-oriented lexer.
//!
//! Kconfig's grammar is line-oriented rather than free-form: a lexical line
//! is first assembled by joining backslash-continued physical lines, then
//! tokenized independently of everything around it. [`LineFeeder`] handles
//! the physical-to-logical line join and keeps a one-line pushback buffer;
//! [`tokenize_line`] turns one logical line into a token sequence.

use crate::error::{KconfigError, Location};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Config,
    MenuConfig,
    Choice,
    EndChoice,
    CommentKw,
    Menu,
    EndMenu,
    If,
    EndIf,
    Source,
    MainMenu,

    Bool,
    Tristate,
    StringType,
    Hex,
    Int,

    Prompt,
    Default,
    DefBool,
    DefTristate,
    Depends,
    On,
    Select,
    Imply,
    Visible,
    Range,
    Help,
    Option,
    Env,
    DefconfigList,
    Modules,
    AllNoConfigY,
    Optional,

    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Not,
    And,
    Or,
    OpenParen,
    CloseParen,

    StringLit(String),
    Ident(String),

    /// Sentinel returned by a cursor past the end of its token slice; never
    /// produced by the lexer itself.
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
}

const KEYWORD_FOLLOWERS: &[TokenKind] = &[
    TokenKind::Bool,
    TokenKind::Tristate,
    TokenKind::StringType,
    TokenKind::Hex,
    TokenKind::Int,
    TokenKind::Choice,
    TokenKind::CommentKw,
    TokenKind::Menu,
    TokenKind::Prompt,
    TokenKind::Source,
    TokenKind::MainMenu,
];

fn keyword(s: &str) -> Option<TokenKind> {
    Some(match s {
        "config" => TokenKind::Config,
        "menuconfig" => TokenKind::MenuConfig,
        "choice" => TokenKind::Choice,
        "endchoice" => TokenKind::EndChoice,
        "comment" => TokenKind::CommentKw,
        "menu" => TokenKind::Menu,
        "endmenu" => TokenKind::EndMenu,
        "if" => TokenKind::If,
        "endif" => TokenKind::EndIf,
        "source" => TokenKind::Source,
        "mainmenu" => TokenKind::MainMenu,
        "bool" => TokenKind::Bool,
        "tristate" => TokenKind::Tristate,
        "string" => TokenKind::StringType,
        "hex" => TokenKind::Hex,
        "int" => TokenKind::Int,
        "prompt" => TokenKind::Prompt,
        "default" => TokenKind::Default,
        "def_bool" => TokenKind::DefBool,
        "def_tristate" => TokenKind::DefTristate,
        "depends" => TokenKind::Depends,
        "on" => TokenKind::On,
        "select" => TokenKind::Select,
        "imply" => TokenKind::Imply,
        "visible" => TokenKind::Visible,
        "range" => TokenKind::Range,
        "help" | "---help---" => TokenKind::Help,
        "option" => TokenKind::Option,
        "env" => TokenKind::Env,
        "defconfig_list" => TokenKind::DefconfigList,
        "modules" => TokenKind::Modules,
        "allnoconfig_y" => TokenKind::AllNoConfigY,
        "optional" => TokenKind::Optional,
        _ => return None,
    })
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'/' | b'-')
}

/// Tokenize one already-joined logical line. `file`/`line` are used only to
/// annotate a tokenization error.
pub fn tokenize_line(text: &str, file: &Rc<str>, line: u32) -> Result<Vec<Token>, KconfigError> {
    let bytes = text.as_bytes();
    let mut pos = 0usize;
    let mut tokens = Vec::new();

    // Skip leading whitespace, then a `#`-comment line produces no tokens.
    while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
        pos += 1;
    }
    if pos >= bytes.len() || bytes[pos] == b'#' {
        return Ok(tokens);
    }

    let mut suppress_after_help = false;

    loop {
        while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        if bytes[pos] == b'#' {
            break;
        }
        let start = pos;
        let ch = bytes[pos];

        let kind = match ch {
            b'"' | b'\'' => {
                let quote = ch;
                pos += 1;
                let mut value = String::new();
                let mut closed = false;
                while pos < bytes.len() {
                    let b = bytes[pos];
                    if b == quote {
                        pos += 1;
                        closed = true;
                        break;
                    }
                    if b == b'\\' && pos + 1 < bytes.len() {
                        let esc = bytes[pos + 1];
                        match esc {
                            b'\\' | b'"' | b'\'' => {
                                value.push(esc as char);
                                pos += 2;
                                continue;
                            }
                            _ => {}
                        }
                    }
                    value.push(b as char);
                    pos += 1;
                }
                if !closed {
                    return Err(KconfigError::Lex {
                        location: Location {
                            file: file.clone(),
                            line,
                        },
                        message: "unterminated string literal".to_string(),
                    });
                }
                TokenKind::StringLit(value)
            }
            b'(' => {
                pos += 1;
                TokenKind::OpenParen
            }
            b')' => {
                pos += 1;
                TokenKind::CloseParen
            }
            b'!' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                TokenKind::NotEq
            }
            b'!' => {
                pos += 1;
                TokenKind::Not
            }
            b'=' => {
                pos += 1;
                TokenKind::Eq
            }
            b'<' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                TokenKind::LessEq
            }
            b'<' => {
                pos += 1;
                TokenKind::Less
            }
            b'>' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                TokenKind::GreaterEq
            }
            b'>' => {
                pos += 1;
                TokenKind::Greater
            }
            b'&' if bytes.get(pos + 1) == Some(&b'&') => {
                pos += 2;
                TokenKind::And
            }
            b'|' if bytes.get(pos + 1) == Some(&b'|') => {
                pos += 2;
                TokenKind::Or
            }
            b if is_ident_byte(b) => {
                while pos < bytes.len() && is_ident_byte(bytes[pos]) {
                    pos += 1;
                }
                let text_tok = &text[start..pos];
                if tokens.is_empty() {
                    match keyword(text_tok) {
                        Some(k) => k,
                        None => {
                            return Err(KconfigError::Lex {
                                location: Location {
                                    file: file.clone(),
                                    line,
                                },
                                message: format!(
                                    "unrecognized construct, expected keyword, found `{text_tok}`"
                                ),
                            });
                        }
                    }
                } else {
                    let prev_is_follower = KEYWORD_FOLLOWERS.contains(&tokens.last().unwrap().kind);
                    if prev_is_follower {
                        TokenKind::StringLit(text_tok.to_string())
                    } else if matches!(text_tok, "n" | "m" | "y") {
                        TokenKind::StringLit(text_tok.to_string())
                    } else if let Some(k) = keyword(text_tok) {
                        k
                    } else {
                        TokenKind::Ident(text_tok.to_string())
                    }
                }
            }
            _ => {
                // Unrecognized byte: skip it (error recovery, §4.1).
                pos += 1;
                continue;
            }
        };

        if tokens.is_empty() && matches!(kind, TokenKind::Help) {
            suppress_after_help = true;
        }

        tokens.push(Token { kind });

        if suppress_after_help {
            break;
        }
    }

    Ok(tokens)
}

/// Reads physical lines out of Kconfig source text, joining `\`-continued
/// lines into one logical line and supporting one line of pushback so the
/// parser can peek ahead and hand a line back to the outer block.
pub struct LineFeeder {
    pub file: Rc<str>,
    /// Unjoined physical lines, indexed by `line_no - 1`; used for help-text
    /// collection, which is indentation-sensitive and line-by-line.
    physical: Vec<String>,
    /// Joined logical lines paired with the 1-based physical line number
    /// they start at.
    logical: Vec<(String, u32)>,
    next_idx: usize,
    pushed_back: Option<(String, u32)>,
}

impl LineFeeder {
    pub fn new(file: Rc<str>, source: &str) -> Self {
        let physical: Vec<String> = source.split('\n').map(str::to_string).collect();
        let mut logical = Vec::with_capacity(physical.len());
        let mut i = 0;
        while i < physical.len() {
            let start = i as u32 + 1;
            let mut joined = physical[i].clone();
            while joined.ends_with('\\') {
                joined.pop();
                i += 1;
                if i >= physical.len() {
                    break;
                }
                joined.push(' ');
                joined.push_str(&physical[i]);
            }
            logical.push((joined, start));
            i += 1;
        }
        Self {
            file,
            physical,
            logical,
            next_idx: 0,
            pushed_back: None,
        }
    }

    /// Returns `(logical line text, 1-based starting line number)`.
    pub fn next_line(&mut self) -> Option<(String, u32)> {
        if let Some(p) = self.pushed_back.take() {
            return Some(p);
        }
        if self.next_idx >= self.logical.len() {
            return None;
        }
        let (text, line_no) = self.logical[self.next_idx].clone();
        self.next_idx += 1;
        Some((text, line_no))
    }

    pub fn push_back(&mut self, line: String, line_no: u32) {
        self.pushed_back = Some((line, line_no));
    }

    /// Raw (untokenized) text of the physical line `line_no`, used by
    /// `help` text collection which needs indentation-sensitive raw text
    /// rather than tokens.
    pub fn raw_line(&self, line_no: u32) -> Option<&str> {
        self.physical.get(line_no as usize - 1).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> Rc<str> {
        Rc::from("test")
    }

    #[test]
    fn tokenizes_config_line() {
        let toks = tokenize_line("config FOO", &file(), 1).unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].kind, TokenKind::Config);
        assert_eq!(toks[1].kind, TokenKind::Ident("FOO".to_string()));
    }

    #[test]
    fn comment_only_line_is_empty() {
        let toks = tokenize_line("   # a comment", &file(), 1).unwrap();
        assert!(toks.is_empty());
    }

    #[test]
    fn quoted_prompt_after_bool_is_string_not_ident() {
        let toks = tokenize_line(r#"bool "Enable thing""#, &file(), 1).unwrap();
        assert_eq!(toks[1].kind, TokenKind::StringLit("Enable thing".to_string()));
    }

    #[test]
    fn help_suppresses_rest_of_line() {
        let toks = tokenize_line("help something else", &file(), 1).unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::Help);
    }

    #[test]
    fn line_continuation_joins_physical_lines() {
        let mut feeder = LineFeeder::new(file(), "depends on \\\nFOO\nconfig BAR");
        let (l1, n1) = feeder.next_line().unwrap();
        assert_eq!(l1, "depends on  FOO");
        assert_eq!(n1, 1);
        let (l2, n2) = feeder.next_line().unwrap();
        assert_eq!(l2, "config BAR");
        assert_eq!(n2, 3);
    }

    #[test]
    fn unterminated_string_is_lex_error() {
        let res = tokenize_line(r#"prompt "unterminated"#, &file(), 1);
        assert!(res.is_err());
    }
}
