//! Scripting language behaviour through the public runtime

use indexmap::IndexMap;
use rowscope::script::{ErrorKind, ScriptRuntime, SharedOutput, Value};

fn eval(source: &str) -> Value {
    let mut runtime = ScriptRuntime::with_output(Box::new(SharedOutput::new()));
    let mut globals: IndexMap<String, Value> = IndexMap::new();
    runtime.run(source, &mut globals).unwrap()
}

fn eval_err(source: &str) -> rowscope::script::ScriptError {
    let mut runtime = ScriptRuntime::with_output(Box::new(SharedOutput::new())).with_max_depth(24);
    let mut globals: IndexMap<String, Value> = IndexMap::new();
    runtime.run(source, &mut globals).unwrap_err()
}

#[test]
fn test_control_flow() {
    let source = "
        def total = 0
        for (i in range(10)) {
            if (i % 2 == 0) { continue }
            if (i > 7) { break }
            total += i
        }
        total
    ";
    assert_eq!(eval(source), Value::Int(16));
}

#[test]
fn test_while_loop() {
    assert_eq!(eval("n = 1\nwhile (n < 100) { n = n * 3 }\nn"), Value::Int(243));
}

#[test]
fn test_closures_capture_by_value() {
    let source = "
        def makeAdder(n) { return { x -> x + n } }
        add5 = makeAdder(5)
        add5(10)
    ";
    assert_eq!(eval(source), Value::Int(15));
}

#[test]
fn test_recursion() {
    let source = "def fact(n) { if (n <= 1) { return 1 }\n n * fact(n - 1) }\nfact(10)";
    assert_eq!(eval(source), Value::Int(3_628_800));
}

#[test]
fn test_runaway_recursion_is_reported() {
    let err = eval_err("def loop(n) { loop(n) }\nloop(1)");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("Maximum call depth of 24"));
}

#[test]
fn test_maps_and_member_updates() {
    let source = "
        def row = [name: 'ann', tags: []]
        row.age = 31
        row.tags += 'admin'
        row['name'] = 'Ann'
        row
    ";
    assert_eq!(eval(source).to_string(), "[name:'Ann', tags:['admin'], age:31]");
}

#[test]
fn test_row_set_queries() {
    let source = "
        rows = [[n: 'a', dept: 'x', pay: 10], [n: 'b', dept: 'y', pay: 20], [n: 'c', dept: 'x', pay: 30]]
        byDept = rows.groupBy { it.dept }
        [byDept.keySet(), byDept.x.pay.sum(), rows.any { it.pay > 25 }, rows.every { it.pay > 25 }]
    ";
    assert_eq!(eval(source).to_string(), "[['x', 'y'], 40, true, false]");
}

#[test]
fn test_string_operations() {
    assert_eq!(eval("'ab' * 3"), Value::str("ababab"));
    assert_eq!(eval("'x=' + 1 + true"), Value::str("x=1true"));
    assert_eq!(eval("\"tab\\there\".contains('\\t')"), Value::Bool(true));
}

#[test]
fn test_arithmetic_errors() {
    assert_eq!(eval_err("1 / 0").kind, ErrorKind::Arithmetic);
    assert_eq!(eval_err("9223372036854775807 + 1").kind, ErrorKind::Arithmetic);
    assert_eq!(eval_err("[1] - 'a' * null").kind, ErrorKind::Type);
}

#[test]
fn test_syntax_error_positions() {
    let err = eval_err("x = (1 +\n  )");
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.diagnostic().contains("line 2"));
}

#[test]
fn test_json_values_become_script_values() {
    let json: serde_json::Value =
        serde_json::from_str(r#"{"b": [1, 2.5, "s", null, true], "a": {}}"#).unwrap();
    let value = Value::from(json);
    assert_eq!(value.to_string(), "[b:[1, 2.5, 's', null, true], a:[:]]");
}
