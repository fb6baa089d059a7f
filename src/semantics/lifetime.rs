//! Escape analysis for references.
//!
//! The model is scope depth: every binding is declared at some depth, and a
//! reference is valid only while its referent's scope is alive. A reference
//! escaping to a shallower scope than its referent, by being stored into an
//! outer binding or returned out of the declaring function, outlives the
//! value it points at.

use std::collections::HashMap;

use crate::ast::{Expr, Program, Stmt};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::semantics::symbols::{Binding, BindingId, LifetimeTag, SymbolTable};
use crate::types::{Ty, TypeInterner};

pub struct LifetimeAnalyzer {
    symbols: SymbolTable,
    interner: TypeInterner,
    diagnostics: Diagnostics,
    /// Reference binding → the binding its value points at.
    origins: HashMap<BindingId, BindingId>,
    /// Declaration depth of every binding, parameters included.
    decl_depth: HashMap<BindingId, usize>,
    /// Depth of the innermost enclosing function body, if any.
    fn_base: Option<usize>,
}

impl LifetimeAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            interner: TypeInterner::new(),
            diagnostics: Diagnostics::new(),
            origins: HashMap::new(),
            decl_depth: HashMap::new(),
            fn_base: None,
        }
    }

    pub fn analyze(&mut self, program: &Program) {
        for stmt in &program.body {
            self.visit_stmt(stmt);
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VariableDeclaration {
                identifier,
                data_type,
                is_constant,
                initializer,
                resolved_type,
                position,
            } => {
                if let Some(init) = initializer.as_deref() {
                    self.visit_expr(init);
                }
                let referent = initializer.as_deref().and_then(|e| self.ref_source(e));

                let ty = resolved_type
                    .clone()
                    .unwrap_or_else(|| Ty::parse(data_type));
                let ty = self.interner.intern(ty);
                let depth = self.symbols.depth();
                let referent_depth = referent.map(|r| self.depth_of(r));
                let id = self
                    .symbols
                    .define(Binding {
                        name: identifier.clone(),
                        ty,
                        mutable: !*is_constant,
                        lifetime: LifetimeTag::Local(depth),
                        referent_depth,
                        declared_at: *position,
                    })
                    .unwrap_or_else(|existing| existing);
                self.decl_depth.insert(id, depth);
                match referent {
                    Some(r) => {
                        self.origins.insert(id, r);
                    }
                    None => {
                        self.origins.remove(&id);
                    }
                }
            }

            Stmt::FunctionDeclaration { params, body, .. } => {
                self.symbols.push_scope();
                let previous_base = self.fn_base.replace(self.symbols.depth());
                for param in params {
                    let ty = self.interner.intern(Ty::parse(&param.param_type));
                    let depth = self.symbols.depth();
                    let id = self
                        .symbols
                        .define(Binding {
                            name: param.name.clone(),
                            ty,
                            mutable: true,
                            lifetime: LifetimeTag::Parameter,
                            referent_depth: None,
                            declared_at: param.position,
                        })
                        .unwrap_or_else(|existing| existing);
                    self.decl_depth.insert(id, depth);
                }
                self.visit_stmt(body);
                self.fn_base = previous_base;
                self.symbols.pop_scope();
            }

            Stmt::StructDeclaration { .. } => {}

            Stmt::IfStatement { test, consequent, alternate, .. } => {
                self.visit_expr(test);
                self.visit_stmt(consequent);
                if let Some(alt) = alternate {
                    self.visit_stmt(alt);
                }
            }

            Stmt::WhileStatement { test, body, .. } => {
                self.visit_expr(test);
                self.visit_stmt(body);
            }

            Stmt::ForStatement { init, test, update, body, .. } => {
                self.symbols.push_scope();
                if let Some(init) = init.as_deref() {
                    self.visit_stmt(init);
                }
                if let Some(test) = test.as_deref() {
                    self.visit_expr(test);
                }
                if let Some(update) = update.as_deref() {
                    self.visit_expr(update);
                }
                self.visit_stmt(body);
                self.symbols.pop_scope();
            }

            Stmt::ReturnStatement { argument, .. } => {
                if let Some(expr) = argument.as_deref() {
                    self.visit_expr(expr);
                    self.check_return(expr);
                }
            }

            Stmt::BlockStatement { body, .. } => {
                self.symbols.push_scope();
                for stmt in body {
                    self.visit_stmt(stmt);
                }
                self.symbols.pop_scope();
            }

            Stmt::ExpressionStatement { expression, .. } => self.visit_expr(expression),

            Stmt::Unknown => {}
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::AssignmentExpression { left, right, .. } => {
                self.visit_expr(right);
                self.check_store(left, right);
            }
            Expr::BinaryExpression { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::UnaryExpression { argument, .. } => self.visit_expr(argument),
            Expr::CallExpression { arguments, .. } => {
                for arg in arguments {
                    self.visit_expr(arg);
                }
            }
            Expr::MemberExpression { object, .. } => self.visit_expr(object),
            Expr::IndexExpression { object, index, .. } => {
                self.visit_expr(object);
                self.visit_expr(index);
            }
            Expr::ArrayLiteral { elements, .. } => {
                for element in elements {
                    self.visit_expr(element);
                }
            }
            Expr::Identifier { .. } | Expr::Literal { .. } | Expr::Unknown => {}
        }
    }

    /// Scope depth of the value a reference-producing expression points
    /// at: the referent's own depth for a direct borrow, or the depth
    /// recorded on a reference-typed identifier's binding.
    fn referent_depth_of(&self, expr: &Expr) -> Option<usize> {
        match expr {
            Expr::UnaryExpression { operator, argument, .. }
                if operator == "&" || operator == "&mut" =>
            {
                match argument.as_ref() {
                    Expr::Identifier { name, .. } => {
                        self.symbols.lookup(name).map(|id| self.depth_of(id))
                    }
                    _ => None,
                }
            }
            Expr::Identifier { name, .. } => {
                let id = self.symbols.lookup(name)?;
                self.symbols.binding(id).referent_depth
            }
            _ => None,
        }
    }

    /// The binding a reference-producing expression points at: a direct
    /// borrow (`&x`, `&mut x`) points at `x`; a reference-typed identifier
    /// carries its recorded origin forward.
    fn ref_source(&self, expr: &Expr) -> Option<BindingId> {
        match expr {
            Expr::UnaryExpression { operator, argument, .. }
                if operator == "&" || operator == "&mut" =>
            {
                match argument.as_ref() {
                    Expr::Identifier { name, .. } => self.symbols.lookup(name),
                    _ => None,
                }
            }
            Expr::Identifier { name, .. } => {
                let id = self.symbols.lookup(name)?;
                self.origins.get(&id).copied()
            }
            _ => None,
        }
    }

    fn depth_of(&self, id: BindingId) -> usize {
        self.decl_depth.get(&id).copied().unwrap_or(0)
    }

    /// Storing a reference into a binding declared in a shallower scope
    /// lets it outlive its referent.
    fn check_store(&mut self, left: &Expr, right: &Expr) {
        let Expr::Identifier { name, position } = left else {
            return;
        };
        let Some(target) = self.symbols.lookup(name) else {
            return;
        };
        let Some(referent) = self.ref_source(right) else {
            self.origins.remove(&target);
            self.symbols.binding_mut(target).referent_depth = None;
            return;
        };
        let referent_depth = self
            .referent_depth_of(right)
            .unwrap_or_else(|| self.depth_of(referent));
        if referent_depth > self.depth_of(target) {
            let r = self.symbols.binding(referent);
            let referent_name = r.name.clone();
            let declared_at = r.declared_at;
            self.diagnostics.push(Diagnostic::ref_outlives_referent(
                &referent_name,
                *position,
                declared_at,
            ));
        }
        self.origins.insert(target, referent);
        self.symbols.binding_mut(target).referent_depth = Some(referent_depth);
    }

    /// Returning a reference whose referent is local to the returning
    /// function hands the caller a dangling view. Parameter referents
    /// outlive the body and may be returned.
    fn check_return(&mut self, argument: &Expr) {
        let Some(base) = self.fn_base else {
            return;
        };
        let Some(referent) = self.ref_source(argument) else {
            return;
        };
        let binding = self.symbols.binding(referent);
        if let LifetimeTag::Local(depth) = binding.lifetime {
            if depth >= base {
                let name = binding.name.clone();
                let declared_at = binding.declared_at;
                self.diagnostics.push(Diagnostic::ref_outlives_referent(
                    &name,
                    argument.pos(),
                    declared_at,
                ));
            }
        }
    }
}

impl Default for LifetimeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
