use super::parse_expr;
use crate::ast::*;
use crate::error::CompileError;

fn field(p: &str) -> Box<Expr> {
    Expr::Field(FieldPath::parse(p).unwrap()).boxed()
}

fn string(s: &str) -> Box<Expr> {
    Expr::Literal(Literal::Str(s.into())).boxed()
}

// -----------------------------------------------------------------------
// Quoted operand position
// -----------------------------------------------------------------------

#[test]
fn left_quoted_is_field_right_quoted_is_constant() {
    let e = parse_expr(r#""currency" === "USD""#).unwrap();
    assert_eq!(
        e,
        Expr::Compare {
            op: CmpOp::Eq,
            left: field("currency"),
            right: string("USD"),
        }
    );
}

#[test]
fn same_text_on_both_sides() {
    let e = parse_expr(r#""k" === "k""#).unwrap();
    assert_eq!(
        e,
        Expr::Compare {
            op: CmpOp::Eq,
            left: field("k"),
            right: string("k"),
        }
    );
}

#[test]
fn explicit_field_and_const_functions() {
    let e = parse_expr(r#"const("USD") === field("currency")"#).unwrap();
    assert_eq!(
        e,
        Expr::Compare {
            op: CmpOp::Eq,
            left: string("USD"),
            right: field("currency"),
        }
    );
}

#[test]
fn standalone_quoted_is_field() {
    assert_eq!(parse_expr(r#""isFraud""#).unwrap(), *field("isFraud"));
}

#[test]
fn nested_path_and_single_quotes() {
    let e = parse_expr(r#"'payment.amount' > 10.5"#).unwrap();
    assert_eq!(
        e,
        Expr::Compare {
            op: CmpOp::Gt,
            left: field("payment.amount"),
            right: Expr::Literal(Literal::Float(10.5)).boxed(),
        }
    );
}

// -----------------------------------------------------------------------
// Operators
// -----------------------------------------------------------------------

#[test]
fn string_operators() {
    for (text, op) in [
        (r#""name" #== "Jo""#, StrOp::Prefix),
        (r#""name" =@= "oh""#, StrOp::Contains),
        (r#""name" ==# "hn""#, StrOp::Suffix),
        (r#""name" =#= "^J""#, StrOp::Regex),
    ] {
        match parse_expr(text).unwrap() {
            Expr::StrMatch { op: got, left, .. } => {
                assert_eq!(got, op, "{text}");
                assert_eq!(left, field("name"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn not_equal_operator() {
    match parse_expr(r#""a" =!= 3"#).unwrap() {
        Expr::Compare { op, .. } => assert_eq!(op, CmpOp::Ne),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn plain_double_equals_rejected() {
    let err = parse_expr(r#""a" == 3"#).unwrap_err();
    assert!(matches!(err, CompileError::Syntax { .. }));
    assert!(parse_expr(r#""a" != 3"#).is_err());
}

#[test]
fn in_list_and_synonym() {
    let expected = Expr::InList {
        expr: field("country"),
        list: vec![Literal::Str("US".into()), Literal::Str("CA".into())],
        negated: false,
    };
    assert_eq!(
        parse_expr(r#""country" in ("US", "CA")"#).unwrap(),
        expected
    );
    assert_eq!(
        parse_expr(r#""country" =:= ("US", "CA")"#).unwrap(),
        expected
    );
}

#[test]
fn not_in_list_with_numbers() {
    let e = parse_expr(r#""code" not in (1, -2, 3.5, null)"#).unwrap();
    assert_eq!(
        e,
        Expr::InList {
            expr: field("code"),
            list: vec![
                Literal::Int(1),
                Literal::Int(-2),
                Literal::Float(3.5),
                Literal::Null,
            ],
            negated: true,
        }
    );
}

#[test]
fn logical_precedence() {
    // a || b && c  =>  a || (b && c)
    let e = parse_expr(r#""a" || "b" && "c""#).unwrap();
    match e {
        Expr::Logic {
            op: LogicOp::Or,
            right,
            ..
        } => assert!(matches!(
            *right,
            Expr::Logic {
                op: LogicOp::And,
                ..
            }
        )),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn keyword_logic_is_case_insensitive() {
    let e = parse_expr(r#"NOT "a" === 1 AND "b" === 2 or "c""#).unwrap();
    match e {
        Expr::Logic {
            op: LogicOp::Or,
            left,
            ..
        } => match *left {
            Expr::Logic {
                op: LogicOp::And,
                left,
                ..
            } => assert!(matches!(*left, Expr::Not(_))),
            other => panic!("unexpected {other:?}"),
        },
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn arithmetic_precedence() {
    let e = parse_expr(r#""a" + "b" * 2 > 10"#).unwrap();
    match e {
        Expr::Compare { left, .. } => match *left {
            Expr::Arith {
                op: ArithOp::Add,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Arith {
                    op: ArithOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected {other:?}"),
        },
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn quoted_operands_inside_arithmetic_follow_side() {
    // Right-hand arithmetic keeps constant semantics.
    let e = parse_expr(r#""a" === "x" + "y""#).unwrap();
    match e {
        Expr::Compare { right, .. } => assert_eq!(
            *right,
            Expr::Arith {
                op: ArithOp::Add,
                left: string("x"),
                right: string("y"),
            }
        ),
        other => panic!("unexpected {other:?}"),
    }
}

// -----------------------------------------------------------------------
// Functions
// -----------------------------------------------------------------------

#[test]
fn exist_and_temporal_functions() {
    assert_eq!(
        parse_expr(r#"exist("device.id")"#).unwrap(),
        Expr::Exist(FieldPath::parse("device.id").unwrap())
    );
    for (name, kind) in [
        ("time", TemporalKind::Time),
        ("DATE", TemporalKind::Date),
        ("datetime", TemporalKind::DateTime),
    ] {
        let text = format!(r#"{name}("ts")"#);
        assert_eq!(
            parse_expr(&text).unwrap(),
            Expr::Temporal {
                kind,
                path: FieldPath::parse("ts").unwrap(),
            }
        );
    }
}

#[test]
fn unknown_function_rejected() {
    let err = parse_expr(r#"upper("name") === "X""#).unwrap_err();
    match err {
        CompileError::Syntax { message, .. } => assert!(message.contains("function")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn extra_argument_rejected() {
    assert!(parse_expr(r#"field("a", "b")"#).is_err());
}

#[test]
fn empty_field_path_rejected() {
    assert!(parse_expr(r#""" === 1"#).is_err());
    assert!(parse_expr(r#"field("a..b")"#).is_err());
}

// -----------------------------------------------------------------------
// Quantifiers
// -----------------------------------------------------------------------

#[test]
fn have_membership_and_size() {
    assert_eq!(
        parse_expr(r#""tags" have "vip""#).unwrap(),
        Expr::Quantified {
            target: field("tags"),
            quantifier: Quantifier::Have(string("vip")),
        }
    );
    assert_eq!(
        parse_expr(r#""tags" have size >= 2"#).unwrap(),
        Expr::Quantified {
            target: field("tags"),
            quantifier: Quantifier::HaveSize {
                op: CmpOp::Ge,
                size: 2,
            },
        }
    );
}

#[test]
fn matches_with_placeholder_paths() {
    let e = parse_expr(r#""items" all matches (?.price > 0 && ?.sku #== "A")"#).unwrap();
    match e {
        Expr::Quantified {
            target,
            quantifier: Quantifier::All(body),
        } => {
            assert_eq!(target, field("items"));
            assert!(body.uses_placeholder());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(parse_expr(r#""items" none matches (? === 3)"#).is_ok());
    assert!(parse_expr(r#""items" any (? === 3)"#).is_err());
}

// -----------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------

#[test]
fn unterminated_string_rejected() {
    assert!(parse_expr(r#""a === 1"#).is_err());
}

#[test]
fn unterminated_string_names_its_own_quote() {
    let CompileError::Syntax { message, .. } = parse_expr("'a === 1").unwrap_err() else {
        panic!("expected a syntax error");
    };
    assert!(message.contains("`'`"), "{message}");

    let CompileError::Syntax { message, .. } = parse_expr(r#""a === 1"#).unwrap_err() else {
        panic!("expected a syntax error");
    };
    assert!(message.contains("`\"`"), "{message}");
}

#[test]
fn trailing_garbage_rejected() {
    assert!(parse_expr(r#""a" === 1 )"#).is_err());
}

#[test]
fn syntax_error_reports_offset() {
    match parse_expr(r#""a" === "#).unwrap_err() {
        CompileError::Syntax { offset, .. } => assert!(offset >= 7),
        other => panic!("unexpected {other:?}"),
    }
}
