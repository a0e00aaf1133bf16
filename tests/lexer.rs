use emberc::frontend::lexer::{lex, LexError, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    lex("test.em", source)
        .expect("source should tokenize")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

// ── Basics ───────────────────────────────────────────────────────────────

#[test]
fn keywords_and_identifiers() {
    let got = kinds("package main\nmain :: func() -> int");
    assert_eq!(
        got,
        vec![
            TokenKind::Package,
            TokenKind::Ident("main".into()),
            TokenKind::Ident("main".into()),
            TokenKind::ColonColon,
            TokenKind::Func,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Arrow,
            TokenKind::Int,
        ]
    );
}

#[test]
fn keyword_prefix_stays_identifier() {
    assert_eq!(kinds("iffy"), vec![TokenKind::Ident("iffy".into())]);
    assert_eq!(kinds("format"), vec![TokenKind::Ident("format".into())]);
}

#[test]
fn comments_and_whitespace_are_skipped() {
    let got = kinds("x // trailing comment\n// full line\n\t y");
    assert_eq!(
        got,
        vec![TokenKind::Ident("x".into()), TokenKind::Ident("y".into())]
    );
}

#[test]
fn multi_character_operators() {
    let got = kinds(":= :: == != <= >= << >> && || ->");
    assert_eq!(
        got,
        vec![
            TokenKind::Walrus,
            TokenKind::ColonColon,
            TokenKind::EqEq,
            TokenKind::Ne,
            TokenKind::Le,
            TokenKind::Ge,
            TokenKind::Shl,
            TokenKind::Shr,
            TokenKind::AndAnd,
            TokenKind::OrOr,
            TokenKind::Arrow,
        ]
    );
}

#[test]
fn locations_track_lines_and_columns() {
    let tokens = lex("test.em", "x\n  y := 1").unwrap();

    assert_eq!((tokens[0].location.line, tokens[0].location.column), (1, 1));
    assert_eq!((tokens[1].location.line, tokens[1].location.column), (2, 3));
    assert_eq!((tokens[2].location.line, tokens[2].location.column), (2, 5));
    assert_eq!(tokens[2].location.offset, 6);
    assert_eq!(tokens[0].location.file, "test.em");
}

// ── Strings ──────────────────────────────────────────────────────────────

#[test]
fn string_escapes_are_preserved_literally() {
    let got = kinds(r#"s := "Hi-%d\n""#);
    assert_eq!(
        got,
        vec![
            TokenKind::Ident("s".into()),
            TokenKind::Walrus,
            TokenKind::Str("Hi-%d\\n".into()),
        ]
    );
}

#[test]
fn escaped_quote_does_not_end_the_string() {
    let got = kinds(r#""a\"b""#);
    assert_eq!(got, vec![TokenKind::Str("a\\\"b".into())]);
}

#[test]
fn empty_string() {
    assert_eq!(kinds(r#""""#), vec![TokenKind::Str("".into())]);
}

// ── Negative literals ────────────────────────────────────────────────────

#[test]
fn minus_after_value_is_binary() {
    assert_eq!(
        kinds("x -1"),
        vec![
            TokenKind::Ident("x".into()),
            TokenKind::Minus,
            TokenKind::Number(1),
        ]
    );
    assert_eq!(
        kinds("x^-1"),
        vec![
            TokenKind::Ident("x".into()),
            TokenKind::Caret,
            TokenKind::Minus,
            TokenKind::Number(1),
        ]
    );
}

#[test]
fn minus_in_value_position_is_part_of_the_literal() {
    assert_eq!(
        kinds("x := -5"),
        vec![
            TokenKind::Ident("x".into()),
            TokenKind::Walrus,
            TokenKind::Number(-5),
        ]
    );
    assert_eq!(
        kinds("(-3)"),
        vec![
            TokenKind::LParen,
            TokenKind::Number(-3),
            TokenKind::RParen,
        ]
    );
    assert_eq!(
        kinds("f(1, -2)"),
        vec![
            TokenKind::Ident("f".into()),
            TokenKind::LParen,
            TokenKind::Number(1),
            TokenKind::Comma,
            TokenKind::Number(-2),
            TokenKind::RParen,
        ]
    );
}

// ── Token reassembly ─────────────────────────────────────────────────────

// Rendering the tokens in order reproduces the non-whitespace, non-comment
// content of the source.
#[test]
fn tokens_reassemble_the_source() {
    let source = "package main // the entry point\nmain :: func() -> int {\n  x := -1\n  return x + 2\n}\n";
    let expected = "packagemainmain::func()->int{x:=-1returnx+2}";

    let rendered: String = lex("test.em", source)
        .unwrap()
        .into_iter()
        .map(|t| t.kind.to_string())
        .collect();

    assert_eq!(rendered, expected);
}

// ── Errors ───────────────────────────────────────────────────────────────

#[test]
fn unterminated_string_fails() {
    let err = lex("test.em", "s := \"abc").unwrap_err();
    assert!(
        matches!(err, LexError::UnterminatedString { .. }),
        "expected unterminated string, got: {err:?}"
    );
}

#[test]
fn invalid_character_fails() {
    let err = lex("test.em", "x ? y").unwrap_err();
    match err {
        LexError::InvalidCharacter { ch, location } => {
            assert_eq!(ch, '?');
            assert_eq!((location.line, location.column), (1, 3));
        }
        other => panic!("expected invalid character, got: {other:?}"),
    }
}

#[test]
fn numeric_overflow_fails() {
    let err = lex("test.em", "x := 99999999999999999999").unwrap_err();
    assert!(
        matches!(err, LexError::MalformedNumber { .. }),
        "expected malformed number, got: {err:?}"
    );
}
