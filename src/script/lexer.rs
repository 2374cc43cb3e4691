//! Tokenizer for the console scripting language

use super::error::{Pos, ScriptError, ScriptResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    KwDef,
    KwVar,
    KwIf,
    KwElse,
    KwWhile,
    KwFor,
    KwIn,
    KwReturn,
    KwBreak,
    KwContinue,
    KwTrue,
    KwFalse,
    KwNull,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Semicolon,
    Newline,
    Arrow,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    EqEq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "def" => TokenKind::KwDef,
        "var" => TokenKind::KwVar,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "while" => TokenKind::KwWhile,
        "for" => TokenKind::KwFor,
        "in" => TokenKind::KwIn,
        "return" => TokenKind::KwReturn,
        "break" => TokenKind::KwBreak,
        "continue" => TokenKind::KwContinue,
        "true" => TokenKind::KwTrue,
        "false" => TokenKind::KwFalse,
        "null" => TokenKind::KwNull,
        _ => return None,
    };
    Some(kind)
}

/// Words the lexer never yields as identifiers
pub fn is_keyword(word: &str) -> bool {
    keyword(word).is_some()
}

pub struct Lexer<'src> {
    chars: std::iter::Peekable<std::str::Chars<'src>>,
    line: usize,
    col: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(
        &mut self,
        expected: char,
    ) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Skip spaces and comments, stopping at newlines
    fn skip_trivia(&mut self) -> ScriptResult<()> {
        loop {
            match self.peek() {
                Some(c) if c != '\n' && c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.next() {
                        Some('/') => {
                            while let Some(c) = self.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            let start = self.pos();
                            self.bump();
                            self.bump();
                            loop {
                                match self.bump() {
                                    Some('*') if self.eat('/') => break,
                                    Some(_) => {}
                                    None => return Err(ScriptError::syntax("Unterminated comment", start)),
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn string(
        &mut self,
        quote: char,
        start: Pos,
    ) -> ScriptResult<TokenKind> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(TokenKind::Str(text)),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(c) => c,
                        None => break,
                    };
                    text.push(escaped);
                }
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(ScriptError::syntax("Unterminated string literal", start))
    }

    fn number(
        &mut self,
        first: char,
        start: Pos,
    ) -> ScriptResult<TokenKind> {
        let mut text = String::from(first);
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.bump();
                if c != '_' {
                    text.push(c);
                }
            } else if c == '.' && !is_float {
                // `1..3` or `1.size()` are not floats
                let mut ahead = self.chars.clone();
                ahead.next();
                if !matches!(ahead.next(), Some(d) if d.is_ascii_digit()) {
                    break;
                }
                is_float = true;
                self.bump();
                text.push('.');
            } else {
                break;
            }
        }
        if is_float {
            text.parse()
                .map(TokenKind::Float)
                .map_err(|_| ScriptError::syntax(format!("Invalid number: '{}'", text), start))
        } else {
            text.parse()
                .map(TokenKind::Int)
                .map_err(|_| ScriptError::syntax(format!("Integer literal out of range: '{}'", text), start))
        }
    }

    fn identifier(
        &mut self,
        first: char,
    ) -> TokenKind {
        let mut word = String::from(first);
        while let Some(c) = self.peek() {
            if c == '_' || c == '$' || unicode_ident::is_xid_continue(c) {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        keyword(&word).unwrap_or(TokenKind::Ident(word))
    }

    fn next_token(&mut self) -> ScriptResult<Token> {
        self.skip_trivia()?;
        let pos = self.pos();
        let Some(c) = self.bump() else {
            return Ok(Token { kind: TokenKind::Eof, pos });
        };
        let kind = match c {
            '\n' => TokenKind::Newline,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '+' if self.eat('=') => TokenKind::PlusAssign,
            '+' => TokenKind::Plus,
            '-' if self.eat('>') => TokenKind::Arrow,
            '-' if self.eat('=') => TokenKind::MinusAssign,
            '-' => TokenKind::Minus,
            '=' if self.eat('=') => TokenKind::EqEq,
            '=' => TokenKind::Assign,
            '!' if self.eat('=') => TokenKind::Neq,
            '!' => TokenKind::Not,
            '<' if self.eat('=') => TokenKind::Le,
            '<' => TokenKind::Lt,
            '>' if self.eat('=') => TokenKind::Ge,
            '>' => TokenKind::Gt,
            '&' if self.eat('&') => TokenKind::And,
            '|' if self.eat('|') => TokenKind::Or,
            '\'' | '"' => self.string(c, pos)?,
            c if c.is_ascii_digit() => self.number(c, pos)?,
            c if c == '_' || c == '$' || unicode_ident::is_xid_start(c) => self.identifier(c),
            other => {
                return Err(ScriptError::syntax(
                    format!("Unexpected character: '{}'", other),
                    pos,
                ))
            }
        };
        Ok(Token { kind, pos })
    }
}

/// Tokenize a whole source string; the result always ends with `Eof`
pub fn tokenize(source: &str) -> ScriptResult<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tracing::trace!(count = tokens.len(), "tokenized input");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a >= 1 && b != 2"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ge,
                TokenKind::Int(1),
                TokenKind::And,
                TokenKind::Ident("b".into()),
                TokenKind::Neq,
                TokenKind::Int(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb""#),
            vec![
                TokenKind::Str("it's".into()),
                TokenKind::Str("a\nb".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_followed_by_method() {
        assert_eq!(
            kinds("1.5 2.abs"),
            vec![
                TokenKind::Float(1.5),
                TokenKind::Int(2),
                TokenKind::Dot,
                TokenKind::Ident("abs".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("x // trailing\n/* block\n */ y"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Newline,
                TokenKind::Ident("y".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_closure_arrow() {
        assert_eq!(
            kinds("{ r -> r }"),
            vec![
                TokenKind::LBrace,
                TokenKind::Ident("r".into()),
                TokenKind::Arrow,
                TokenKind::Ident("r".into()),
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reports_start() {
        let err = tokenize("x = 'abc").unwrap_err();
        assert_eq!(err.pos, Some(Pos::new(1, 5)));
    }
}
