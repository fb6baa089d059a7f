use fax_sema::ast::{Expr, LitValue, Param, Pos, Program, Stmt};
use fax_sema::semantics::LifetimeAnalyzer;

fn pos(line: usize) -> Pos {
    Pos::new(line, 1)
}

fn ident(name: &str, line: usize) -> Expr {
    Expr::Identifier { name: name.to_string(), position: pos(line) }
}

fn int(value: i64, line: usize) -> Expr {
    Expr::Literal { value: LitValue::Int(value), position: pos(line) }
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

fn block(body: Vec<Stmt>, line: usize) -> Stmt {
    Stmt::BlockStatement { body, position: pos(line) }
}

fn borrow(name: &str, line: usize) -> Expr {
    Expr::UnaryExpression {
        operator: "&".to_string(),
        argument: Box::new(ident(name, line)),
        position: pos(line),
    }
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

fn ret(argument: Option<Expr>, line: usize) -> Stmt {
    Stmt::ReturnStatement { argument: argument.map(Box::new), position: pos(line) }
}

fn analyze(program: &Program) -> fax_sema::diagnostics::Diagnostics {
    let mut analyzer = LifetimeAnalyzer::new();
    analyzer.analyze(program);
    analyzer.into_diagnostics()
}

#[test]
fn returning_a_reference_to_a_local_is_reported() {
    let program = Program::new(vec![func(
        "dangle",
        vec![],
        "ref<int>",
        vec![
            let_decl("x", "int", Some(int(1, 2)), 2),
            ret(Some(borrow("x", 3)), 3), // ERROR: x dies with the function
        ],
        1,
    )]);
    let diagnostics = analyze(&program);
    assert_eq!(diagnostics.codes(), vec!["E0597"]);
}

#[test]
fn returning_a_reference_to_a_parameter_is_allowed() {
    let program = Program::new(vec![func(
        "first",
        vec![Param { name: "x".to_string(), param_type: "int".to_string(), position: pos(1) }],
        "ref<int>",
        vec![ret(Some(borrow("x", 2)), 2)],
        1,
    )]);
    assert!(analyze(&program).is_empty());
}

#[test]
fn returning_a_local_reference_through_an_alias_is_reported() {
    let program = Program::new(vec![func(
        "dangle",
        vec![],
        "ref<int>",
        vec![
            let_decl("x", "int", Some(int(1, 2)), 2),
            let_decl("r", "ref<int>", Some(borrow("x", 3)), 3),
            ret(Some(ident("r", 4)), 4), // ERROR: r still points at x
        ],
        1,
    )]);
    let diagnostics = analyze(&program);
    assert_eq!(diagnostics.codes(), vec!["E0597"]);
}

#[test]
fn storing_a_reference_into_an_outer_binding_is_reported() {
    let program = Program::new(vec![
        let_decl("r", "ref<int>", None, 1),
        block(
            vec![
                let_decl("x", "int", Some(int(1, 3)), 3),
                Stmt::ExpressionStatement {
                    expression: Box::new(Expr::AssignmentExpression {
                        left: Box::new(ident("r", 4)),
                        right: Box::new(borrow("x", 4)), // ERROR: x dies with the block
                        position: pos(4),
                    }),
                    position: pos(4),
                },
            ],
            2,
        ),
    ]);
    let diagnostics = analyze(&program);
    assert_eq!(diagnostics.codes(), vec!["E0597"]);
}

#[test]
fn storing_an_aliased_reference_into_an_outer_binding_is_reported() {
    let program = Program::new(vec![
        let_decl("keep", "ref<int>", None, 1),
        block(
            vec![
                let_decl("x", "int", Some(int(1, 3)), 3),
                let_decl("inner", "ref<int>", Some(borrow("x", 4)), 4),
                Stmt::ExpressionStatement {
                    expression: Box::new(Expr::AssignmentExpression {
                        left: Box::new(ident("keep", 5)),
                        right: Box::new(ident("inner", 5)), // ERROR: still points at x
                        position: pos(5),
                    }),
                    position: pos(5),
                },
            ],
            2,
        ),
    ]);
    let diagnostics = analyze(&program);
    assert_eq!(diagnostics.codes(), vec!["E0597"]);
}

#[test]
fn references_within_one_scope_are_allowed() {
    let program = Program::new(vec![
        let_decl("x", "int", Some(int(1, 1)), 1),
        let_decl("r", "ref<int>", Some(borrow("x", 2)), 2),
    ]);
    assert!(analyze(&program).is_empty());
}

#[test]
fn storing_into_a_deeper_binding_is_allowed() {
    let program = Program::new(vec![
        let_decl("x", "int", Some(int(1, 1)), 1),
        block(
            vec![let_decl("r", "ref<int>", Some(borrow("x", 3)), 3)],
            2,
        ),
    ]);
    assert!(analyze(&program).is_empty());
}

#[test]
fn non_reference_returns_are_ignored() {
    let program = Program::new(vec![func(
        "plain",
        vec![],
        "int",
        vec![
            let_decl("x", "int", Some(int(1, 2)), 2),
            ret(Some(ident("x", 3)), 3),
        ],
        1,
    )]);
    assert!(analyze(&program).is_empty());
}
