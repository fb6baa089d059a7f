//! Syntax tree handed over by the upstream parser.
//!
//! The wire format is the parser's tagged JSON (`{"type": "...", ...}`);
//! field names follow that format, not Rust convention. Analyzers never
//! mutate the tree except for the `resolved_type` annotation the type
//! checker writes into each `VariableDeclaration`.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::types::Ty;

/// Source position of a node, 1-based. The parser may omit positions on
/// synthesized nodes; those default to 0:0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A function parameter as declared in the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub position: Pos,
}

/// A struct field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub position: Pos,
}

/// Literal values as they appear on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LitValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Identifier {
        name: String,
        #[serde(default)]
        position: Pos,
    },
    Literal {
        value: LitValue,
        #[serde(default)]
        position: Pos,
    },
    BinaryExpression {
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default)]
        position: Pos,
    },
    UnaryExpression {
        operator: String,
        argument: Box<Expr>,
        #[serde(default)]
        position: Pos,
    },
    CallExpression {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
        #[serde(default)]
        position: Pos,
    },
    MemberExpression {
        object: Box<Expr>,
        property: String,
        #[serde(default)]
        position: Pos,
    },
    IndexExpression {
        object: Box<Expr>,
        index: Box<Expr>,
        #[serde(default)]
        position: Pos,
    },
    AssignmentExpression {
        left: Box<Expr>,
        right: Box<Expr>,
        #[serde(default)]
        position: Pos,
    },
    ArrayLiteral {
        elements: Vec<Expr>,
        #[serde(default)]
        position: Pos,
    },
    /// A node kind this stage does not know. Reaching one during analysis
    /// is an upstream contract violation, not a user error.
    #[serde(other)]
    Unknown,
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Identifier { position, .. }
            | Expr::Literal { position, .. }
            | Expr::BinaryExpression { position, .. }
            | Expr::UnaryExpression { position, .. }
            | Expr::CallExpression { position, .. }
            | Expr::MemberExpression { position, .. }
            | Expr::IndexExpression { position, .. }
            | Expr::AssignmentExpression { position, .. }
            | Expr::ArrayLiteral { position, .. } => *position,
            Expr::Unknown => Pos::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Stmt {
    VariableDeclaration {
        identifier: String,
        #[serde(rename = "dataType")]
        data_type: String,
        #[serde(rename = "isConstant", default)]
        is_constant: bool,
        initializer: Option<Box<Expr>>,
        /// Written once by the type checker; absent on freshly parsed trees.
        #[serde(
            rename = "resolvedType",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        resolved_type: Option<Ty>,
        #[serde(default)]
        position: Pos,
    },
    FunctionDeclaration {
        name: String,
        params: Vec<Param>,
        #[serde(rename = "returnType")]
        return_type: String,
        body: Box<Stmt>,
        #[serde(default)]
        position: Pos,
    },
    StructDeclaration {
        name: String,
        fields: Vec<Field>,
        #[serde(default)]
        position: Pos,
    },
    IfStatement {
        test: Box<Expr>,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
        #[serde(default)]
        position: Pos,
    },
    WhileStatement {
        test: Box<Expr>,
        body: Box<Stmt>,
        #[serde(default)]
        position: Pos,
    },
    ForStatement {
        init: Option<Box<Stmt>>,
        test: Option<Box<Expr>>,
        update: Option<Box<Expr>>,
        body: Box<Stmt>,
        #[serde(default)]
        position: Pos,
    },
    ReturnStatement {
        argument: Option<Box<Expr>>,
        #[serde(default)]
        position: Pos,
    },
    BlockStatement {
        body: Vec<Stmt>,
        #[serde(default)]
        position: Pos,
    },
    ExpressionStatement {
        expression: Box<Expr>,
        #[serde(default)]
        position: Pos,
    },
    #[serde(other)]
    Unknown,
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::VariableDeclaration { position, .. }
            | Stmt::FunctionDeclaration { position, .. }
            | Stmt::StructDeclaration { position, .. }
            | Stmt::IfStatement { position, .. }
            | Stmt::WhileStatement { position, .. }
            | Stmt::ForStatement { position, .. }
            | Stmt::ReturnStatement { position, .. }
            | Stmt::BlockStatement { position, .. }
            | Stmt::ExpressionStatement { position, .. } => *position,
            Stmt::Unknown => Pos::default(),
        }
    }
}

/// One translation unit: an ordered sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub position: Pos,
}

/// Wire shadow for `Program`, which the parser emits as a tagged node.
#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum RootNode {
    Program {
        body: Vec<Stmt>,
        #[serde(default)]
        position: Pos,
    },
}

impl Program {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            body,
            position: Pos::new(1, 1),
        }
    }

    /// Deserializes a program from the parser's JSON output. Anything that
    /// is not a `Program` root is an upstream contract violation.
    pub fn from_json(input: &str) -> Result<Self, AnalysisError> {
        let RootNode::Program { body, position } = serde_json::from_str(input)?;
        Ok(Self { body, position })
    }

    /// Serializes the (possibly annotated) program back to wire JSON.
    pub fn to_json(&self) -> Result<String, AnalysisError> {
        let root = RootNode::Program {
            body: self.body.clone(),
            position: self.position,
        };
        Ok(serde_json::to_string_pretty(&root)?)
    }
}
