use fax_sema::ast::{Expr, LitValue, Param, Pos, Program, Stmt};
use fax_sema::error::AnalysisError;
use fax_sema::types::Ty;
use fax_sema::Analyzer;

fn pos(line: usize) -> Pos {
    Pos::new(line, 1)
}

fn ident(name: &str, line: usize) -> Expr {
    Expr::Identifier { name: name.to_string(), position: pos(line) }
}

fn int(value: i64, line: usize) -> Expr {
    Expr::Literal { value: LitValue::Int(value), position: pos(line) }
}

fn text(value: &str, line: usize) -> Expr {
    Expr::Literal { value: LitValue::Str(value.to_string()), position: pos(line) }
}

fn let_decl(name: &str, ty: &str, init: Option<Expr>, line: usize) -> Stmt {
    Stmt::VariableDeclaration {
        identifier: name.to_string(),
        data_type: ty.to_string(),
        is_constant: false,
        initializer: init.map(Box::new),
        resolved_type: None,
        position: pos(line),
    }
}

fn call(name: &str, args: Vec<Expr>, line: usize) -> Expr {
    Expr::CallExpression {
        callee: Box::new(ident(name, line)),
        arguments: args,
        position: pos(line),
    }
}

fn expr_stmt(expression: Expr, line: usize) -> Stmt {
    Stmt::ExpressionStatement { expression: Box::new(expression), position: pos(line) }
}

fn block(body: Vec<Stmt>, line: usize) -> Stmt {
    Stmt::BlockStatement { body, position: pos(line) }
}

fn func(name: &str, params: Vec<Param>, ret: &str, body: Vec<Stmt>, line: usize) -> Stmt {
    Stmt::FunctionDeclaration {
        name: name.to_string(),
        params,
        return_type: ret.to_string(),
        body: Box::new(block(body, line)),
        position: pos(line),
    }
}

fn param(name: &str, ty: &str, line: usize) -> Param {
    Param { name: name.to_string(), param_type: ty.to_string(), position: pos(line) }
}

/// A valid program exercising all three stages: a function, a call, and a
/// declaration inferred from the call's return type.
fn clean_program() -> Program {
    Program::new(vec![
        func(
            "add",
            vec![param("a", "int", 1), param("b", "int", 1)],
            "int",
            vec![Stmt::ReturnStatement {
                argument: Some(Box::new(Expr::BinaryExpression {
                    operator: "+".to_string(),
                    left: Box::new(ident("a", 2)),
                    right: Box::new(ident("b", 2)),
                    position: pos(2),
                })),
                position: pos(2),
            }],
            1,
        ),
        let_decl("total", "auto", Some(call("add", vec![int(1, 4), int(2, 4)], 4)), 4),
        expr_stmt(call("println", vec![ident("total", 5)], 5), 5),
    ])
}

/// One type error and one ownership error, so stage ordering is observable.
fn faulty_program() -> Program {
    Program::new(vec![
        func(
            "consume",
            vec![param("v", "string", 1)],
            "void",
            vec![],
            1,
        ),
        let_decl("bad", "int", Some(text("text", 2)), 2), // type error
        let_decl("s", "string", Some(text("hi", 3)), 3),
        expr_stmt(call("consume", vec![ident("s", 4)], 4), 4),
        expr_stmt(call("consume", vec![ident("s", 5)], 5), 5), // move error
    ])
}

#[test]
fn clean_program_produces_no_diagnostics() {
    let mut program = clean_program();
    let diagnostics = Analyzer::new().analyze(&mut program).unwrap();
    assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
}

#[test]
fn type_checker_annotates_declarations() {
    let mut program = clean_program();
    Analyzer::new().analyze(&mut program).unwrap();
    match &program.body[1] {
        Stmt::VariableDeclaration { resolved_type, .. } => {
            assert_eq!(resolved_type, &Some(Ty::Int));
        }
        other => panic!("unexpected statement: {:?}", other),
    }
}

#[test]
fn diagnostics_arrive_in_stage_order() {
    let mut program = faulty_program();
    let diagnostics = Analyzer::new().analyze(&mut program).unwrap();
    assert_eq!(diagnostics.codes(), vec!["E0308", "E0382"]);
}

#[test]
fn reanalyzing_an_annotated_tree_is_idempotent() {
    let mut program = faulty_program();
    let first = Analyzer::new().analyze(&mut program).unwrap();
    let annotated = program.clone();
    let second = Analyzer::new().analyze(&mut program).unwrap();
    assert_eq!(first, second);
    assert_eq!(program, annotated);
}

#[test]
fn malformed_statement_aborts_the_pass() {
    let mut program = Program::new(vec![Stmt::Unknown]);
    let result = Analyzer::new().analyze(&mut program);
    assert!(matches!(result, Err(AnalysisError::MalformedTree(_))));
}

#[test]
fn malformed_expression_aborts_the_pass() {
    let mut program = Program::new(vec![expr_stmt(Expr::Unknown, 1)]);
    let result = Analyzer::new().analyze(&mut program);
    assert!(matches!(result, Err(AnalysisError::MalformedTree(_))));
}

#[test]
fn wire_json_round_trips_with_annotations() {
    let json = r#"{
        "type": "Program",
        "body": [
            {
                "type": "VariableDeclaration",
                "identifier": "x",
                "dataType": "auto",
                "isConstant": false,
                "initializer": {
                    "type": "Literal",
                    "value": 5,
                    "position": { "line": 1, "column": 9 }
                },
                "position": { "line": 1, "column": 1 }
            }
        ],
        "position": { "line": 1, "column": 1 }
    }"#;

    let mut program = Program::from_json(json).unwrap();
    let diagnostics = Analyzer::new().analyze(&mut program).unwrap();
    assert!(diagnostics.is_empty());

    let out = program.to_json().unwrap();
    assert!(out.contains("\"resolvedType\": \"int\""), "missing annotation: {}", out);
}

#[test]
fn unknown_wire_node_kind_is_a_contract_violation() {
    let json = r#"{
        "type": "Program",
        "body": [ { "type": "GotoStatement", "label": "end" } ],
        "position": { "line": 1, "column": 1 }
    }"#;

    let mut program = Program::from_json(json).unwrap();
    let result = Analyzer::new().analyze(&mut program);
    assert!(matches!(result, Err(AnalysisError::MalformedTree(_))));
}

#[test]
fn diagnostics_serialize_to_the_documented_shape() {
    let mut program = faulty_program();
    let diagnostics = Analyzer::new().analyze(&mut program).unwrap();
    let json = serde_json::to_value(&diagnostics).unwrap();

    let entries = json.as_array().expect("array of diagnostics");
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert!(entry.get("code").is_some());
        assert!(entry.get("message").is_some());
        let span = entry.get("primary_span").expect("primary span");
        for key in ["line", "column", "length", "label"] {
            assert!(span.get(key).is_some(), "span missing {}", key);
        }
    }
}
