//! Parser error-path coverage.

use emberscript::{Engine, EngineError, ParseErrorKind};

#[test]
fn missing_closing_brace_is_a_parse_error() {
    let mut engine = Engine::new();
    let err = engine.load("int f() { return 1;").unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)), "expected a parse error, got {err:?}");
}

#[test]
fn malformed_class_member_reports_expected_kind() {
    let mut engine = Engine::new();
    let err = engine.load("class Foo { 42; }").unwrap_err();
    match err {
        EngineError::Parse(parse_err) => {
            assert!(
                matches!(parse_err.kind, ParseErrorKind::Expected { .. } | ParseErrorKind::UnexpectedToken(_)),
                "unexpected parse error kind: {:?}",
                parse_err.kind
            );
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn truncated_input_is_unexpected_eof() {
    let mut engine = Engine::new();
    let err = engine.load("int f(int a").unwrap_err();
    match err {
        EngineError::Parse(parse_err) => {
            assert!(
                matches!(parse_err.kind, ParseErrorKind::UnexpectedEof | ParseErrorKind::Expected { .. }),
                "unexpected parse error kind: {:?}",
                parse_err.kind
            );
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}
