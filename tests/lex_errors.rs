//! Lexer error-path coverage.

use emberscript::{Engine, EngineError, LexErrorKind};

#[test]
fn unterminated_string_is_a_lex_error() {
    let mut engine = Engine::new();
    let err = engine.load(r#"string s = "unterminated;"#).unwrap_err();
    match err {
        EngineError::Lex(lex_err) => {
            assert!(matches!(lex_err.kind, LexErrorKind::UnterminatedString));
        }
        other => panic!("expected a lex error, got {other:?}"),
    }
}

#[test]
fn unexpected_character_is_a_lex_error() {
    let mut engine = Engine::new();
    let err = engine.load("int x = 1 ` 2;").unwrap_err();
    match err {
        EngineError::Lex(lex_err) => {
            assert!(matches!(lex_err.kind, LexErrorKind::UnexpectedChar('`')));
        }
        other => panic!("expected a lex error, got {other:?}"),
    }
}

#[test]
fn lex_error_reports_line_and_column() {
    let mut engine = Engine::new();
    let err = engine.load("int a = 1;\nint b = 1 ` 2;").unwrap_err();
    match err {
        EngineError::Lex(lex_err) => {
            assert_eq!(lex_err.line, 2);
        }
        other => panic!("expected a lex error, got {other:?}"),
    }
}
