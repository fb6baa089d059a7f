//! Type inference and checking.
//!
//! Two phases, the way the rest of the toolchain expects: first collect
//! struct definitions and function signatures so forward and recursive
//! calls resolve, then check every body. The checker is error tolerant: a
//! violation becomes a diagnostic and the walk continues into siblings, so
//! one pass surfaces every type error in the tree.

use crate::ast::{Expr, LitValue, Pos, Program, Stmt};
use crate::diagnostics::{Diagnostic, Diagnostics, Span};
use crate::semantics::symbols::{
    Binding, FnSig, LifetimeTag, StructInfo, SymbolTable, TypeRegistry,
};
use crate::types::{Ty, TypeInterner};

/// Name treated as a reporting intrinsic: callable with any arguments and
/// exempt from signature lookup.
pub(crate) const PRINT_INTRINSIC: &str = "println";

pub struct TypeChecker {
    symbols: SymbolTable,
    registry: TypeRegistry,
    interner: TypeInterner,
    diagnostics: Diagnostics,
    current_return: Option<Ty>,
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            registry: TypeRegistry::new(),
            interner: TypeInterner::new(),
            diagnostics: Diagnostics::new(),
            current_return: None,
        }
    }

    /// Checks the whole program, writing the one permitted annotation (the
    /// resolved type of each variable declaration) into the tree.
    pub fn check_program(&mut self, program: &mut Program) {
        self.collect_definitions(&program.body);
        for stmt in &mut program.body {
            self.check_stmt(stmt);
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    // ----- phase 1: definitions -----

    fn collect_definitions(&mut self, body: &[Stmt]) {
        // Struct names first so fields may reference structs declared later.
        for stmt in body {
            if let Stmt::StructDeclaration { name, fields, position } = stmt {
                let info = StructInfo {
                    fields: fields
                        .iter()
                        .map(|f| (f.name.clone(), Ty::parse(&f.field_type)))
                        .collect(),
                    declared_at: *position,
                };
                if let Err(first) = self.registry.add_struct(name.clone(), info) {
                    self.diagnostics
                        .push(Diagnostic::duplicate_declaration(name, *position, first));
                }
            }
        }

        // Field types are validated only after every struct name is known,
        // so member accesses always run against fully resolved definitions.
        for stmt in body {
            if let Stmt::StructDeclaration { fields, .. } = stmt {
                for field in fields {
                    let ty = Ty::parse(&field.field_type);
                    self.check_type_resolves(&ty, field.position);
                }
            }
        }

        for stmt in body {
            if let Stmt::FunctionDeclaration { name, params, return_type, position, .. } = stmt {
                self.register_function(name, params, return_type, *position);
            }
        }
    }

    fn register_function(
        &mut self,
        name: &str,
        params: &[crate::ast::Param],
        return_type: &str,
        position: Pos,
    ) {
        let mut sig_params = Vec::with_capacity(params.len());
        for param in params {
            let ty = Ty::parse(&param.param_type);
            self.check_type_resolves(&ty, param.position);
            sig_params.push((param.name.clone(), ty));
        }
        let ret = Ty::parse(return_type);
        self.check_type_resolves(&ret, position);

        let sig = FnSig {
            params: sig_params,
            return_type: ret,
            declared_at: position,
        };
        if let Err(first) = self.registry.add_function(name.to_string(), sig) {
            self.diagnostics
                .push(Diagnostic::duplicate_declaration(name, position, first));
        }
    }

    fn check_type_resolves(&mut self, ty: &Ty, position: Pos) {
        if let Err(unknown) = self.registry.validate(ty) {
            self.diagnostics.push(Diagnostic::new(
                "E0425",
                format!("cannot find type `{}`", unknown),
                Span::new(position, unknown.len(), "unknown type"),
            ));
        }
    }

    // ----- phase 2: bodies -----

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::VariableDeclaration {
                identifier,
                data_type,
                is_constant,
                initializer,
                resolved_type,
                position,
            } => {
                let init_ty = initializer.as_deref_mut().map(|e| self.check_expr(e));

                let ty = if data_type == "auto" {
                    // Annotation of `auto` waives the agreement check.
                    init_ty.unwrap_or(Ty::Unknown)
                } else {
                    let declared = Ty::parse(data_type);
                    self.check_type_resolves(&declared, *position);
                    if let Some(found) = &init_ty {
                        if !declared.agrees_with(found) {
                            self.diagnostics.push(Diagnostic::type_mismatch(
                                &declared.to_string(),
                                &found.to_string(),
                                *position,
                                identifier.len(),
                            ));
                        }
                    }
                    declared
                };

                // The single permitted tree mutation: written once, and
                // recomputed identically on a re-run.
                *resolved_type = Some(ty.clone());

                let id = self.interner.intern(ty);
                let depth = self.symbols.depth();
                let result = self.symbols.define(Binding {
                    name: identifier.clone(),
                    ty: id,
                    mutable: !*is_constant,
                    lifetime: LifetimeTag::Local(depth),
                    referent_depth: None,
                    declared_at: *position,
                });
                if let Err(existing) = result {
                    let first = self.symbols.binding(existing).declared_at;
                    self.diagnostics
                        .push(Diagnostic::duplicate_declaration(identifier, *position, first));
                }
            }

            Stmt::FunctionDeclaration { name, params, return_type, body, position } => {
                // Top-level signatures were collected up front; a nested
                // declaration registers itself here, before its body runs.
                if self.registry.signature(name).is_none() {
                    self.register_function(name, params, return_type, *position);
                }

                let previous_return = self.current_return.take();
                self.current_return = Some(Ty::parse(return_type));

                self.symbols.push_scope();
                for param in params.clone() {
                    let ty = self.interner.intern(Ty::parse(&param.param_type));
                    let result = self.symbols.define(Binding {
                        name: param.name.clone(),
                        ty,
                        mutable: true,
                        lifetime: LifetimeTag::Parameter,
                        referent_depth: None,
                        declared_at: param.position,
                    });
                    if let Err(existing) = result {
                        let first = self.symbols.binding(existing).declared_at;
                        self.diagnostics.push(Diagnostic::duplicate_declaration(
                            &param.name,
                            param.position,
                            first,
                        ));
                    }
                }
                self.check_stmt(body);
                self.symbols.pop_scope();

                self.current_return = previous_return;
            }

            // Registered during definition collection.
            Stmt::StructDeclaration { .. } => {}

            Stmt::IfStatement { test, consequent, alternate, .. } => {
                self.check_condition(test);
                self.check_stmt(consequent);
                if let Some(alt) = alternate {
                    self.check_stmt(alt);
                }
            }

            Stmt::WhileStatement { test, body, .. } => {
                self.check_condition(test);
                self.check_stmt(body);
            }

            Stmt::ForStatement { init, test, update, body, .. } => {
                self.symbols.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(test) = test {
                    self.check_condition(test);
                }
                if let Some(update) = update {
                    self.check_expr(update);
                }
                self.check_stmt(body);
                self.symbols.pop_scope();
            }

            Stmt::ReturnStatement { argument, position } => {
                let found = match argument.as_deref_mut() {
                    Some(expr) => self.check_expr(expr),
                    None => Ty::Void,
                };
                if let Some(expected) = self.current_return.clone() {
                    if !expected.agrees_with(&found) {
                        let pos = argument.as_deref().map(|e| e.pos()).unwrap_or(*position);
                        self.diagnostics.push(Diagnostic::type_mismatch(
                            &expected.to_string(),
                            &found.to_string(),
                            pos,
                            1,
                        ));
                    }
                }
            }

            Stmt::BlockStatement { body, .. } => {
                self.symbols.push_scope();
                for stmt in body {
                    self.check_stmt(stmt);
                }
                self.symbols.pop_scope();
            }

            Stmt::ExpressionStatement { expression, .. } => {
                self.check_expr(expression);
            }

            // The driver rejects malformed trees before this stage runs.
            Stmt::Unknown => {}
        }
    }

    fn check_condition(&mut self, test: &Expr) {
        let ty = self.check_expr(test);
        if !Ty::Bool.agrees_with(&ty) {
            self.diagnostics.push(Diagnostic::type_mismatch(
                "bool",
                &ty.to_string(),
                test.pos(),
                1,
            ));
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Ty {
        match expr {
            Expr::Literal { value, .. } => match value {
                LitValue::Int(_) => Ty::Int,
                LitValue::Float(_) => Ty::Float,
                LitValue::Bool(_) => Ty::Bool,
                LitValue::Str(_) => Ty::Str,
            },

            Expr::Identifier { name, position } => match self.symbols.lookup(name) {
                Some(id) => self.interner.resolve(self.symbols.binding(id).ty).clone(),
                None => {
                    self.diagnostics
                        .push(Diagnostic::name_not_found(name, *position));
                    Ty::Unknown
                }
            },

            Expr::BinaryExpression { operator, left, right, position } => {
                let lt = self.check_expr(left);
                let rt = self.check_expr(right);
                self.check_binary_op(operator, &lt, &rt, *position)
            }

            Expr::UnaryExpression { operator, argument, position } => {
                let ty = self.check_expr(argument);
                self.check_unary_op(operator, ty, *position)
            }

            Expr::CallExpression { callee, arguments, position } => {
                self.check_call(callee, arguments, *position)
            }

            Expr::MemberExpression { object, property, position } => {
                let obj_ty = self.check_expr(object);
                self.check_member(&obj_ty, property, *position)
            }

            Expr::IndexExpression { object, index, position } => {
                let obj_ty = self.check_expr(object);
                let index_ty = self.check_expr(index);
                if !Ty::Int.agrees_with(&index_ty) {
                    self.diagnostics.push(Diagnostic::type_mismatch(
                        "int",
                        &index_ty.to_string(),
                        index.pos(),
                        1,
                    ));
                }
                match obj_ty {
                    Ty::Array(elem) => *elem,
                    Ty::Unknown => Ty::Unknown,
                    other => {
                        self.diagnostics.push(Diagnostic::new(
                            "E0308",
                            format!("cannot index into a value of type `{}`", other),
                            Span::new(*position, 1, "not an array"),
                        ));
                        Ty::Unknown
                    }
                }
            }

            Expr::AssignmentExpression { left, right, position } => {
                let rt = self.check_expr(right);
                let lt = self.check_expr(left);
                if !lt.agrees_with(&rt) {
                    self.diagnostics.push(Diagnostic::type_mismatch(
                        &lt.to_string(),
                        &rt.to_string(),
                        *position,
                        1,
                    ));
                }
                rt
            }

            Expr::ArrayLiteral { elements, .. } => {
                let mut elem_ty = Ty::Unknown;
                for element in elements {
                    let ty = self.check_expr(element);
                    if elem_ty == Ty::Unknown {
                        elem_ty = ty;
                    } else if !elem_ty.agrees_with(&ty) {
                        self.diagnostics.push(Diagnostic::type_mismatch(
                            &elem_ty.to_string(),
                            &ty.to_string(),
                            element.pos(),
                            1,
                        ));
                    }
                }
                Ty::Array(Box::new(elem_ty))
            }

            Expr::Unknown => Ty::Unknown,
        }
    }

    fn check_binary_op(&mut self, operator: &str, lt: &Ty, rt: &Ty, position: Pos) -> Ty {
        match operator {
            "==" | "!=" | "<" | ">" | "<=" | ">=" => {
                if !lt.agrees_with(rt) {
                    self.push_operand_mismatch(operator, lt, rt, position);
                }
                Ty::Bool
            }
            "&&" | "||" => {
                if !Ty::Bool.agrees_with(lt) || !Ty::Bool.agrees_with(rt) {
                    self.push_operand_mismatch(operator, lt, rt, position);
                }
                Ty::Bool
            }
            "+" | "-" | "*" | "/" | "%" => {
                // Arithmetic needs identical operand types; there is no
                // implicit widening in the language.
                if !lt.agrees_with(rt) {
                    self.push_operand_mismatch(operator, lt, rt, position);
                    return Ty::Unknown;
                }
                if lt == &Ty::Unknown {
                    rt.clone()
                } else {
                    lt.clone()
                }
            }
            _ => {
                self.diagnostics.push(Diagnostic::new(
                    "E0308",
                    format!("unsupported binary operator `{}`", operator),
                    Span::new(position, operator.len(), "unknown operator"),
                ));
                Ty::Unknown
            }
        }
    }

    fn push_operand_mismatch(&mut self, operator: &str, lt: &Ty, rt: &Ty, position: Pos) {
        self.diagnostics.push(Diagnostic::new(
            "E0308",
            "mismatched types",
            Span::new(
                position,
                operator.len(),
                format!("cannot apply `{}` to `{}` and `{}`", operator, lt, rt),
            ),
        ));
    }

    fn check_unary_op(&mut self, operator: &str, ty: Ty, position: Pos) -> Ty {
        match operator {
            "-" => {
                if matches!(ty, Ty::Int | Ty::Float | Ty::Unknown) {
                    ty
                } else {
                    self.push_operand_mismatch(operator, &ty, &ty, position);
                    Ty::Unknown
                }
            }
            "!" => {
                if !Ty::Bool.agrees_with(&ty) {
                    self.push_operand_mismatch(operator, &ty, &ty, position);
                }
                Ty::Bool
            }
            "&" => Ty::Ref(Box::new(ty)),
            "&mut" => Ty::Ptr(Box::new(ty)),
            "*" => match ty {
                Ty::Ref(inner) | Ty::Ptr(inner) => *inner,
                Ty::Unknown => Ty::Unknown,
                other => {
                    self.diagnostics.push(Diagnostic::new(
                        "E0308",
                        format!("cannot dereference a value of type `{}`", other),
                        Span::new(position, 1, "not a reference"),
                    ));
                    Ty::Unknown
                }
            },
            _ => Ty::Unknown,
        }
    }

    fn check_call(&mut self, callee: &Expr, arguments: &[Expr], position: Pos) -> Ty {
        let name = match callee {
            Expr::Identifier { name, .. } => name.clone(),
            other => {
                // Only direct calls exist in the language.
                self.check_expr(other);
                for arg in arguments {
                    self.check_expr(arg);
                }
                return Ty::Unknown;
            }
        };

        if name == PRINT_INTRINSIC {
            for arg in arguments {
                self.check_expr(arg);
            }
            return Ty::Void;
        }

        let sig = match self.registry.signature(&name) {
            Some(sig) => sig.clone(),
            None => {
                self.diagnostics.push(Diagnostic::new(
                    "E0425",
                    format!("cannot find function `{}`", name),
                    Span::new(position, name.len(), "not found in this scope"),
                ));
                for arg in arguments {
                    self.check_expr(arg);
                }
                return Ty::Unknown;
            }
        };

        if arguments.len() != sig.params.len() {
            self.diagnostics.push(Diagnostic::arity_mismatch(
                &name,
                sig.params.len(),
                arguments.len(),
                position,
            ));
        }

        for (i, arg) in arguments.iter().enumerate() {
            let found = self.check_expr(arg);
            if let Some((param_name, expected)) = sig.params.get(i) {
                if !expected.agrees_with(&found) {
                    self.diagnostics.push(
                        Diagnostic::type_mismatch(
                            &expected.to_string(),
                            &found.to_string(),
                            arg.pos(),
                            1,
                        )
                        .with_note(format!(
                            "argument `{}` of `{}` expects `{}`",
                            param_name, name, expected
                        )),
                    );
                }
            }
        }

        sig.return_type
    }

    fn check_member(&mut self, obj_ty: &Ty, property: &str, position: Pos) -> Ty {
        match obj_ty {
            Ty::Named(struct_name) => match self.registry.struct_def(struct_name) {
                Some(info) => match info.field_ty(property) {
                    Some(ty) => ty.clone(),
                    None => {
                        self.diagnostics.push(Diagnostic::unknown_field(
                            struct_name,
                            property,
                            position,
                        ));
                        Ty::Unknown
                    }
                },
                // Unresolved struct names were already reported when the
                // declaration was checked.
                None => Ty::Unknown,
            },
            // Auto-deref through views so `p.field` works on references.
            Ty::Ref(inner) | Ty::Ptr(inner) => self.check_member(inner, property, position),
            Ty::Unknown => Ty::Unknown,
            other => {
                self.diagnostics.push(Diagnostic::new(
                    "E0609",
                    format!("no field `{}` on type `{}`", property, other),
                    Span::new(position, property.len(), "not a struct"),
                ));
                Ty::Unknown
            }
        }
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}
