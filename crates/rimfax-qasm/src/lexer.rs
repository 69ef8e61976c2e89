//! Lexer for the `OpenQASM` subset.

use logos::Logos;

/// Tokens for the `OpenQASM` 2/3 subset.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
pub enum Token {
    // Keywords
    #[token("OPENQASM")]
    OpenQasm,

    #[token("include")]
    Include,

    #[token("qreg")]
    Qreg,

    #[token("creg")]
    Creg,

    #[token("qubit")]
    Qubit,

    #[token("bit")]
    Bit,

    #[token("measure")]
    Measure,

    #[token("barrier")]
    Barrier,

    // Built-in QASM2 gate alias (higher priority than identifier)
    #[token("CX", priority = 3)]
    GateCX,

    // Constants
    #[token("pi")]
    Pi,

    // Literals
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLiteral(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u64>().ok())]
    IntLiteral(u64),

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len()-1].to_string())
    })]
    StringLiteral(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Punctuation
    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("->")]
    Arrow,

    #[token("=")]
    Equals,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::OpenQasm => write!(f, "OPENQASM"),
            Token::Include => write!(f, "include"),
            Token::Qreg => write!(f, "qreg"),
            Token::Creg => write!(f, "creg"),
            Token::Qubit => write!(f, "qubit"),
            Token::Bit => write!(f, "bit"),
            Token::Measure => write!(f, "measure"),
            Token::Barrier => write!(f, "barrier"),
            Token::GateCX => write!(f, "CX"),
            Token::Pi => write!(f, "pi"),
            Token::FloatLiteral(v) => write!(f, "{v}"),
            Token::IntLiteral(v) => write!(f, "{v}"),
            Token::StringLiteral(s) => write!(f, "\"{s}\""),
            Token::Identifier(s) => write!(f, "{s}"),
            Token::Semicolon => write!(f, ";"),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Arrow => write!(f, "->"),
            Token::Equals => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
        }
    }
}

/// Tokenize a source string, reporting the byte offset of any lexer error.
pub fn tokenize(source: &str) -> Result<Vec<Token>, (usize, String)> {
    let mut tokens = vec![];
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err((
                    lexer.span().start,
                    format!("invalid token '{}'", lexer.slice()),
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_simple() {
        let tokens = tokenize("OPENQASM 2.0;\nqreg q[2];\n").unwrap();
        assert_eq!(tokens[0], Token::OpenQasm);
        assert_eq!(tokens[1], Token::FloatLiteral(2.0));
        assert_eq!(tokens[2], Token::Semicolon);
        assert_eq!(tokens[3], Token::Qreg);
    }

    #[test]
    fn test_tokenize_comments_skipped() {
        let tokens = tokenize("// comment\nh q[0]; /* block */ x q[1];").unwrap();
        assert_eq!(tokens[0], Token::Identifier("h".into()));
    }

    #[test]
    fn test_tokenize_error_position() {
        let err = tokenize("h q[0]; @").unwrap_err();
        assert_eq!(err.0, 8);
    }
}
