pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod semantics;
pub mod types;

use ast::{Expr, Program, Stmt};
use diagnostics::Diagnostics;
use error::AnalysisError;
use semantics::{LifetimeAnalyzer, OwnershipAnalyzer, TypeChecker};

pub const VERSION: &str = "0.3.0";

// Fetches hash from build.rs
pub fn git_commit_hash() -> String {
    env!("GIT_HASH").to_string()
}

/// The semantic-analysis driver.
///
/// Runs the three analyzers in fixed order over one syntax tree:
/// type checking (which writes the resolved-type annotations), then
/// ownership, then lifetimes. Each stage assumes the invariants the prior
/// stage established; diagnostics are aggregated append-only in stage
/// order. An empty collection means analysis passed and the tree may go to
/// code generation.
pub struct Analyzer;

impl Analyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, program: &mut Program) -> Result<Diagnostics, AnalysisError> {
        // 0. CONTRACT CHECK
        // A node kind this stage does not know is an upstream parser defect,
        // not a user error; it aborts the pass outright.
        validate_tree(program)?;

        let mut diagnostics = Diagnostics::new();

        // 1. TYPE CHECKING (annotates the tree)
        let mut checker = TypeChecker::new();
        checker.check_program(program);
        diagnostics.extend(checker.into_diagnostics());

        // 2. OWNERSHIP
        let mut ownership = OwnershipAnalyzer::new();
        ownership.analyze(program);
        diagnostics.extend(ownership.into_diagnostics());

        // 3. LIFETIMES
        let mut lifetimes = LifetimeAnalyzer::new();
        lifetimes.analyze(program);
        diagnostics.extend(lifetimes.into_diagnostics());

        Ok(diagnostics)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_tree(program: &Program) -> Result<(), AnalysisError> {
    for stmt in &program.body {
        validate_stmt(stmt)?;
    }
    Ok(())
}

fn validate_stmt(stmt: &Stmt) -> Result<(), AnalysisError> {
    match stmt {
        Stmt::Unknown => Err(AnalysisError::MalformedTree(
            "unrecognized statement node".to_string(),
        )),
        Stmt::VariableDeclaration { initializer, .. } => match initializer.as_deref() {
            Some(init) => validate_expr(init),
            None => Ok(()),
        },
        Stmt::FunctionDeclaration { body, .. } => validate_stmt(body),
        Stmt::StructDeclaration { .. } => Ok(()),
        Stmt::IfStatement { test, consequent, alternate, .. } => {
            validate_expr(test)?;
            validate_stmt(consequent)?;
            match alternate.as_deref() {
                Some(alt) => validate_stmt(alt),
                None => Ok(()),
            }
        }
        Stmt::WhileStatement { test, body, .. } => {
            validate_expr(test)?;
            validate_stmt(body)
        }
        Stmt::ForStatement { init, test, update, body, .. } => {
            if let Some(init) = init.as_deref() {
                validate_stmt(init)?;
            }
            if let Some(test) = test.as_deref() {
                validate_expr(test)?;
            }
            if let Some(update) = update.as_deref() {
                validate_expr(update)?;
            }
            validate_stmt(body)
        }
        Stmt::ReturnStatement { argument, .. } => match argument.as_deref() {
            Some(expr) => validate_expr(expr),
            None => Ok(()),
        },
        Stmt::BlockStatement { body, .. } => {
            for stmt in body {
                validate_stmt(stmt)?;
            }
            Ok(())
        }
        Stmt::ExpressionStatement { expression, .. } => validate_expr(expression),
    }
}

fn validate_expr(expr: &Expr) -> Result<(), AnalysisError> {
    match expr {
        Expr::Unknown => Err(AnalysisError::MalformedTree(
            "unrecognized expression node".to_string(),
        )),
        Expr::Identifier { .. } | Expr::Literal { .. } => Ok(()),
        Expr::BinaryExpression { left, right, .. }
        | Expr::AssignmentExpression { left, right, .. } => {
            validate_expr(left)?;
            validate_expr(right)
        }
        Expr::UnaryExpression { argument, .. } => validate_expr(argument),
        Expr::CallExpression { callee, arguments, .. } => {
            validate_expr(callee)?;
            for arg in arguments {
                validate_expr(arg)?;
            }
            Ok(())
        }
        Expr::MemberExpression { object, .. } => validate_expr(object),
        Expr::IndexExpression { object, index, .. } => {
            validate_expr(object)?;
            validate_expr(index)
        }
        Expr::ArrayLiteral { elements, .. } => {
            for element in elements {
                validate_expr(element)?;
            }
            Ok(())
        }
    }
}
