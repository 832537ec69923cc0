use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use predicate::builtins::{self, BoolPredicate};
use predicate::{Callable, Definition, ErrorKind, Operators, Parser, Value};
use proptest::prelude::*;

/// Route parser logs to the test output; set `RUST_LOG=predicate=trace` to
/// see every dispatched call
fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

type NumberPredicate = Arc<dyn Fn(i64) -> bool + Send + Sync>;
type NumberMapper = Arc<dyn Fn(i64) -> i64 + Send + Sync>;

fn divisible_by(divisor: i64) -> NumberPredicate {
    Arc::new(move |v| v % divisor == 0)
}

fn number_remainder(divide_by: i64) -> NumberMapper {
    Arc::new(move |v| v % divide_by)
}

fn number_and(a: NumberPredicate, b: NumberPredicate) -> NumberPredicate {
    Arc::new(move |v| a(v) && b(v))
}

fn number_or(a: NumberPredicate, b: NumberPredicate) -> NumberPredicate {
    Arc::new(move |v| a(v) || b(v))
}

fn number_not(a: NumberPredicate) -> NumberPredicate {
    Arc::new(move |v| !a(v))
}

/// Accepts integer and float thresholds; floats are truncated
fn number_gt(m: NumberMapper, value: Value) -> anyhow::Result<NumberPredicate> {
    let threshold = if let Some(v) = value.downcast_ref::<i64>() {
        *v
    } else if let Some(v) = value.downcast_ref::<f64>() {
        *v as i64
    } else {
        bail!("GT: unsupported argument type: {}", value.type_name());
    };
    Ok(Arc::new(move |v| m(v) > threshold))
}

fn number_ge(m: NumberMapper, value: i64) -> anyhow::Result<NumberPredicate> {
    Ok(Arc::new(move |v| m(v) >= value))
}

fn number_le(m: NumberMapper, value: i64) -> anyhow::Result<NumberPredicate> {
    Ok(Arc::new(move |v| m(v) <= value))
}

fn number_lt(m: NumberMapper, value: i64) -> NumberPredicate {
    Arc::new(move |v| m(v) < value)
}

fn number_eq(m: NumberMapper, value: i64) -> NumberPredicate {
    Arc::new(move |v| m(v) == value)
}

fn number_neq(m: NumberMapper, value: i64) -> NumberPredicate {
    Arc::new(move |v| m(v) != value)
}

fn number_definition() -> Definition {
    Definition::new()
        .with_operators(Operators {
            and: Some(Callable::new(number_and)),
            or: Some(Callable::new(number_or)),
            not: Some(Callable::new(number_not)),
            gt: Some(Callable::fallible(number_gt)),
            ge: Some(Callable::fallible(number_ge)),
            le: Some(Callable::fallible(number_le)),
            lt: Some(Callable::new(number_lt)),
            eq: Some(Callable::new(number_eq)),
            neq: Some(Callable::new(number_neq)),
        })
        .with_function("DivisibleBy", Callable::new(divisible_by))
        .with_function("number.DivisibleBy", Callable::new(divisible_by))
        .with_function("Remainder", Callable::new(number_remainder))
        .with_function("Len", Callable::new(|s: String| s.len() as i64))
        .with_function("Equals", Callable::new(builtins::equals))
        .with_function("Contains", Callable::new(builtins::contains))
        .with_function(
            "fnreturn",
            Callable::fallible(|arg: Value| -> anyhow::Result<Value> { Ok(arg) }),
        )
        .with_function(
            "fnerr",
            Callable::fallible(|_arg: Value| -> anyhow::Result<Value> {
                Err(anyhow!("don't like this parameter"))
            }),
        )
}

fn number_parser() -> Parser {
    init_test_logging();
    Parser::new(number_definition())
}

fn number_predicate(parser: &Parser, source: &str) -> NumberPredicate {
    let value = parser
        .parse(source)
        .unwrap_or_else(|e| panic!("failed to parse {source}: {e}"));
    value
        .downcast_ref::<NumberPredicate>()
        .cloned()
        .unwrap_or_else(|| panic!("{source} produced {:?}", value))
}

/// Outcomes of a number predicate for inputs 1 through 5
fn outcomes(predicate: &NumberPredicate) -> [bool; 5] {
    [1, 2, 3, 4, 5].map(|v| predicate(v))
}

#[test]
fn test_single_predicate() {
    let fun = number_predicate(&number_parser(), "DivisibleBy(2)");
    assert!(fun(2));
    assert!(!fun(3));
}

#[test]
fn test_single_predicate_not() {
    let fun = number_predicate(&number_parser(), "!DivisibleBy(2)");
    assert!(!fun(2));
    assert!(fun(3));
}

#[test]
fn test_single_predicate_with_func() {
    let fun = number_predicate(&number_parser(), "DivisibleBy(fnreturn(2))");
    assert!(fun(2));
    assert!(!fun(3));
}

#[test]
fn test_single_predicate_with_func_err() {
    let err = number_parser().parse("DivisibleBy(fnerr(2))").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallableFailed);
    assert_eq!(err.to_string(), "fnerr: don't like this parameter");
}

#[test]
fn test_module_predicate() {
    let fun = number_predicate(&number_parser(), "number.DivisibleBy(2)");
    assert!(fun(2));
    assert!(!fun(3));
}

#[test]
fn test_join_and_or() {
    let parser = number_parser();

    let fun = number_predicate(&parser, "DivisibleBy(2) && DivisibleBy(3)");
    assert!(!fun(2));
    assert!(!fun(3));
    assert!(fun(6));

    let fun = number_predicate(&parser, "DivisibleBy(2) || DivisibleBy(3)");
    assert!(fun(2));
    assert!(fun(3));
    assert!(!fun(5));
}

#[test]
fn test_comparisons() {
    let parser = number_parser();
    let cases = [
        ("Remainder(3) > 1", [false, true, false, false, true]),
        ("Remainder(3) >= 1", [true, true, false, true, true]),
        ("Remainder(3) < 2", [true, false, true, true, false]),
        ("Remainder(3) <= 2", [true, true, true, true, true]),
        ("Remainder(3) == 2", [false, true, false, false, true]),
        ("Remainder(3) != 2", [true, false, true, true, false]),
        ("Remainder(3) > 1.2", [false, true, false, false, true]),
    ];

    for (source, expected) in cases {
        let fun = number_predicate(&parser, source);
        assert_eq!(outcomes(&fun), expected, "{}", source);
    }
}

#[test]
fn test_paren() {
    let fun = number_predicate(
        &number_parser(),
        "(Remainder(3) != 1) && (Remainder(3) != 0)",
    );
    assert!(!fun(0));
    assert!(!fun(1));
    assert!(fun(2));
}

#[test]
fn test_strings() {
    let fun = number_predicate(&number_parser(), r#"Remainder(3) == Len("hi")"#);
    assert!(!fun(0));
    assert!(!fun(1));
    assert!(fun(2));
}

#[test]
fn test_select_expr() {
    let parser = Parser::new(number_definition().with_identifier(|fields| {
        assert_eq!(fields, ["first", "second", "third"]);
        Ok(Value::new(2i64))
    }));

    let fun = number_predicate(&parser, "Remainder(4) <= first.second.third");
    assert!(fun(2));
    assert!(!fun(3));

    let fun = number_predicate(&parser, "DivisibleBy(first.second.third)");
    assert!(fun(2));
    assert!(!fun(3));

    // parentheses around or beside the selector leave its chain intact
    let cases = [
        ("(Remainder(4) <= first.second.third)", [true, true, false, true, true]),
        ("(DivisibleBy(2)) && DivisibleBy(first.second.third)", [false, true, false, true, false]),
        ("DivisibleBy((first.second.third))", [false, true, false, true, false]),
        ("!(!(DivisibleBy(first.second.third)))", [false, true, false, true, false]),
    ];
    for (source, expected) in cases {
        let fun = number_predicate(&parser, source);
        assert_eq!(outcomes(&fun), expected, "{}", source);
    }
}

#[test]
fn test_index_expr() {
    let parser = Parser::new(
        number_definition()
            .with_identifier(|fields| {
                assert_eq!(fields, ["first", "second"]);
                Ok(Value::new(HashMap::from([("key".to_string(), 2i64)])))
            })
            .with_property(|map, key| {
                let map = map
                    .downcast_ref::<HashMap<String, i64>>()
                    .ok_or_else(|| anyhow!("expected a map"))?;
                let key = key
                    .downcast_ref::<String>()
                    .ok_or_else(|| anyhow!("expected a string key"))?;
                Ok(Value::new(map.get(key).copied().unwrap_or_default()))
            }),
    );

    let fun = number_predicate(&parser, r#"Remainder(4) <= first.second["key"]"#);
    assert!(fun(2));
    assert!(!fun(3));

    let fun = number_predicate(&parser, r#"DivisibleBy(first.second["key"])"#);
    assert!(fun(2));
    assert!(!fun(3));
}

#[test]
fn test_identifier_expr() {
    let parser = Parser::new(number_definition().with_identifier(|fields| {
        Ok(match fields[0].as_str() {
            "firstSlice" => Value::new(vec!["a".to_string()]),
            "secondSlice" => Value::new(vec!["b".to_string()]),
            "a" => Value::new("a".to_string()),
            "b" => Value::new("b".to_string()),
            "num" => Value::new(2i64),
            _ => Value::nil(),
        })
    }));

    let bool_predicate = |source: &str| {
        let value = parser.parse(source).unwrap();
        let predicate = value.downcast_ref::<BoolPredicate>().cloned().unwrap();
        predicate()
    };

    assert!(bool_predicate("Equals(firstSlice, firstSlice)"));
    assert!(bool_predicate("Equals(a, a)"));
    assert!(!bool_predicate("Equals(firstSlice, secondSlice)"));
    assert!(!bool_predicate("Equals(a, unknown)"));

    let fun = number_predicate(&parser, "Remainder(4) <= num");
    assert!(fun(2));
    assert!(!fun(3));
}

#[test]
fn test_unhappy_cases() {
    let parser = number_parser();
    let cases = [
        (")(", ErrorKind::Syntax),
        ("SomeFunc", ErrorKind::UndefinedIdentifier),
        ("Remainder(banana)", ErrorKind::UndefinedIdentifier),
        ("Remainder(1, 2)", ErrorKind::ArityMismatch),
        ("Remainder(Len)", ErrorKind::UndefinedIdentifier),
        ("Bla(1)", ErrorKind::UndefinedFunction),
        ("0.2 && Remainder(1)", ErrorKind::InvocationFailure),
        (r#"Len("Ho") && 0.2"#, ErrorKind::InvocationFailure),
        ("func(){}()", ErrorKind::Syntax),
        ("Remainder(3) >> 3", ErrorKind::UndefinedOperator),
        (r#"Remainder(3) > "banana""#, ErrorKind::CallableFailed),
        ("Remainder(3)(4)", ErrorKind::UnsupportedNodeKind),
        ("Remainder('a')", ErrorKind::UnsupportedNodeKind),
        ("", ErrorKind::Syntax),
    ];

    for (source, kind) in cases {
        match parser.parse(source) {
            Ok(value) => panic!("{source} unexpectedly produced {:?}", value),
            Err(err) => assert_eq!(err.kind(), kind, "{source}: {err}"),
        }
    }
}

#[test]
fn test_logical_operators_evaluate_both_operands() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let parser = Parser::new(
        Definition::new()
            .with_operators(builtins::operators())
            .with_function(
                "count",
                Callable::new(move |result: bool| -> BoolPredicate {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Arc::new(move || result)
                }),
            )
            .with_identifier(|fields| match fields {
                [name] if name == "true" => Ok(Value::new(true)),
                [name] if name == "false" => Ok(Value::new(false)),
                _ => Err(anyhow!("unknown identifier {}", fields.join("."))),
            }),
    );

    parser.parse("count(false) && count(true)").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    parser.parse("count(true) || count(false)").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_nested_expressions() {
    let parser = Parser::new(
        Definition::new()
            .with_operators(builtins::operators())
            .with_function("fnreturn", Callable::new(|arg: Value| arg))
            .with_identifier(|fields| {
                let [field] = fields else {
                    bail!("identifier with multiple fields unsupported");
                };
                match field.as_str() {
                    "true" => Ok(Value::new(Arc::new(|| true) as BoolPredicate)),
                    "false" => Ok(Value::new(Arc::new(|| false) as BoolPredicate)),
                    "opposite" => Ok(Value::new(HashMap::from([(false, true), (true, false)]))),
                    other => bail!("identifier {:?} not found", other),
                }
            })
            .with_property(|map, key| {
                let map = map.downcast_ref::<HashMap<bool, bool>>().ok_or_else(|| {
                    anyhow!("only HashMap<bool, bool> is supported, got {}", map.type_name())
                })?;
                let key = key.downcast_ref::<BoolPredicate>().ok_or_else(|| {
                    anyhow!("only boolean predicates are supported as keys, got {}", key.type_name())
                })?;
                Ok(Value::new(map.get(&key()).copied().unwrap_or_default()))
            }),
    );

    let cases = [
        ("unary expr as arg", "fnreturn(!false)", true),
        ("binary expr as arg", "fnreturn(true || false)", true),
        (
            "paren expr as arg",
            "fnreturn(false || (true && false) || fnreturn((false)))",
            false,
        ),
        ("unary expr as index", "opposite[!true]", true),
        ("binary expr as index", "opposite[true || false]", false),
        ("paren expr as index", "opposite[(true && false)]", true),
    ];

    for (desc, source, expected) in cases {
        let value = parser.parse(source).unwrap_or_else(|e| panic!("{desc}: {e}"));
        let result = match value.downcast_ref::<BoolPredicate>() {
            Some(predicate) => predicate(),
            None => *value
                .downcast_ref::<bool>()
                .unwrap_or_else(|| panic!("{desc}: unexpected {:?}", value)),
        };
        assert_eq!(result, expected, "{}", desc);
    }

    let err = parser.parse("a.b").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResolverFailed);
}

#[test]
fn test_reparse_is_deterministic() {
    let parser = number_parser();
    let first = number_predicate(&parser, "Remainder(5) >= 2 && !DivisibleBy(4)");
    let second = number_predicate(&parser, "Remainder(5) >= 2 && !DivisibleBy(4)");
    for v in -20..20 {
        assert_eq!(first(v), second(v));
    }
}

#[test]
fn test_parser_shared_across_threads() {
    let parser = number_parser();
    let handles: Vec<_> = (2..6)
        .map(|divisor| {
            let parser = parser.clone();
            std::thread::spawn(move || {
                let fun = number_predicate(&parser, &format!("DivisibleBy({divisor})"));
                fun(divisor * 3)
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

proptest! {
    #[test]
    fn prop_and_matches_both_divisors(v in any::<i64>()) {
        let fun = number_predicate(&number_parser(), "DivisibleBy(2) && DivisibleBy(3)");
        prop_assert_eq!(fun(v), v % 2 == 0 && v % 3 == 0);
    }

    #[test]
    fn prop_not_negates(v in any::<i64>()) {
        let parser = number_parser();
        let plain = number_predicate(&parser, "DivisibleBy(2)");
        let negated = number_predicate(&parser, "!DivisibleBy(2)");
        prop_assert_eq!(negated(v), !plain(v));
    }
}
