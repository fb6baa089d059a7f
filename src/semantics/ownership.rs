//! Move and borrow checking.
//!
//! Runs after the type checker and trusts its annotations. Per-binding
//! ownership state lives in a snapshot map keyed by arena id, threaded
//! functionally through the walk: every step takes a state and returns a
//! new one, so branch arms can never alias their parent's map.

use std::collections::HashMap;

use crate::ast::{Expr, Pos, Program, Stmt};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::semantics::symbols::{Binding, BindingId, LifetimeTag, SymbolTable};
use crate::semantics::type_checker::PRINT_INTRINSIC;
use crate::types::{Ty, TypeInterner};

/// Ownership state of one binding at one program point.
///
/// Transitions only worsen: `Owned` can be borrowed or moved, and `Moved`
/// is terminal for reads until a fresh assignment revives the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnState {
    Owned,
    BorrowedShared { first_at: Pos },
    BorrowedMutable { at: Pos },
    Moved { at: Pos },
}

impl OwnState {
    /// Restrictiveness rank used at control-flow joins.
    fn rank(self) -> u8 {
        match self {
            OwnState::Owned => 0,
            OwnState::BorrowedShared { .. } => 1,
            OwnState::BorrowedMutable { .. } => 2,
            OwnState::Moved { .. } => 3,
        }
    }

    /// Most-restrictive-wins merge; in particular a binding moved on any
    /// arm is moved after the join.
    fn merge(self, other: OwnState) -> OwnState {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Immutable snapshot of every live binding's state.
pub type StateMap = HashMap<BindingId, OwnState>;

fn merge_states(a: &StateMap, b: &StateMap) -> StateMap {
    let mut out = a.clone();
    for (&id, &state) in b {
        out.entry(id)
            .and_modify(|s| *s = s.merge(state))
            .or_insert(state);
    }
    out
}

pub struct OwnershipAnalyzer {
    symbols: SymbolTable,
    interner: TypeInterner,
    diagnostics: Diagnostics,
    /// Set during the probing first pass over a loop body, where state
    /// transitions are recorded but nothing is reported.
    muted: bool,
}

impl OwnershipAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            interner: TypeInterner::new(),
            diagnostics: Diagnostics::new(),
            muted: false,
        }
    }

    pub fn analyze(&mut self, program: &Program) {
        let mut state = StateMap::new();
        for stmt in &program.body {
            state = self.flow_stmt(stmt, state);
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if !self.muted {
            self.diagnostics.push(diagnostic);
        }
    }

    fn binding_ty(&self, id: BindingId) -> &Ty {
        self.interner.resolve(self.symbols.binding(id).ty)
    }

    // ----- statements -----

    fn flow_stmt(&mut self, stmt: &Stmt, state: StateMap) -> StateMap {
        match stmt {
            Stmt::VariableDeclaration {
                identifier,
                data_type,
                is_constant,
                initializer,
                resolved_type,
                position,
            } => {
                let mut state = match initializer.as_deref() {
                    Some(init) => self.flow_expr(init, state),
                    None => state,
                };
                let ty = resolved_type
                    .clone()
                    .unwrap_or_else(|| Ty::parse(data_type));
                let ty = self.interner.intern(ty);
                let depth = self.symbols.depth();
                let id = self
                    .symbols
                    .define(Binding {
                        name: identifier.clone(),
                        ty,
                        mutable: !*is_constant,
                        lifetime: LifetimeTag::Local(depth),
                        referent_depth: None,
                        declared_at: *position,
                    })
                    // Duplicates were already diagnosed by the type checker;
                    // treat the re-declaration as a fresh write.
                    .unwrap_or_else(|existing| existing);
                state.insert(id, OwnState::Owned);
                state
            }

            Stmt::FunctionDeclaration { params, body, .. } => {
                // A body does not execute at its declaration site, so the
                // surrounding state flows past it untouched.
                self.symbols.push_scope();
                let mut inner = state.clone();
                for param in params {
                    let ty = self.interner.intern(Ty::parse(&param.param_type));
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
                    inner.insert(id, OwnState::Owned);
                }
                self.flow_stmt(body, inner);
                self.symbols.pop_scope();
                state
            }

            Stmt::StructDeclaration { .. } => state,

            Stmt::IfStatement { test, consequent, alternate, .. } => {
                let state = self.flow_expr(test, state);
                let then_state = self.flow_stmt(consequent, state.clone());
                let else_state = match alternate {
                    Some(alt) => self.flow_stmt(alt, state.clone()),
                    // A missing arm contributes the incoming state.
                    None => state,
                };
                merge_states(&then_state, &else_state)
            }

            Stmt::WhileStatement { test, body, .. } => {
                self.flow_loop(state, |this, s| {
                    let s = this.flow_expr(test, s);
                    this.flow_stmt(body, s)
                })
            }

            Stmt::ForStatement { init, test, update, body, .. } => {
                self.symbols.push_scope();
                let state = match init.as_deref() {
                    Some(init) => self.flow_stmt(init, state),
                    None => state,
                };
                let state = self.flow_loop(state, |this, mut s| {
                    if let Some(test) = test.as_deref() {
                        s = this.flow_expr(test, s);
                    }
                    s = this.flow_stmt(body, s);
                    if let Some(update) = update.as_deref() {
                        s = this.flow_expr(update, s);
                    }
                    s
                });
                self.symbols.pop_scope();
                state
            }

            Stmt::ReturnStatement { argument, .. } => match argument.as_deref() {
                Some(expr) => self.flow_expr(expr, state),
                None => state,
            },

            Stmt::BlockStatement { body, .. } => {
                self.symbols.push_scope();
                let mut state = state;
                for stmt in body {
                    state = self.flow_stmt(stmt, state);
                }
                self.symbols.pop_scope();
                // State entries of bindings that just went out of scope are
                // unreachable and harmless; outer bindings keep theirs.
                state
            }

            Stmt::ExpressionStatement { expression, .. } => self.flow_expr(expression, state),

            Stmt::Unknown => state,
        }
    }

    /// Two-pass loop approximation. Pass one probes the body silently
    /// against the pre-loop state; any worsening it observes is unioned in,
    /// and pass two reports against that worst case. State only moves
    /// monotonically toward `Moved`, so two passes catch a move made on a
    /// previous iteration.
    fn flow_loop<F>(&mut self, state: StateMap, mut body: F) -> StateMap
    where
        F: FnMut(&mut Self, StateMap) -> StateMap,
    {
        let was_muted = self.muted;
        self.muted = true;
        let probe = body(self, state.clone());
        self.muted = was_muted;

        let start = merge_states(&state, &probe);
        let after = body(self, start.clone());
        // The body may run zero times.
        merge_states(&start, &after)
    }

    // ----- expressions -----

    fn flow_expr(&mut self, expr: &Expr, state: StateMap) -> StateMap {
        match expr {
            Expr::Identifier { name, position } => self.flow_read(name, *position, state),

            Expr::Literal { .. } | Expr::Unknown => state,

            Expr::BinaryExpression { left, right, .. } => {
                let state = self.flow_expr(left, state);
                self.flow_expr(right, state)
            }

            Expr::UnaryExpression { operator, argument, position } => {
                if let Expr::Identifier { name, .. } = argument.as_ref() {
                    match operator.as_str() {
                        "&" => return self.flow_shared_borrow(name, *position, state),
                        "&mut" => return self.flow_exclusive_borrow(name, *position, state),
                        _ => {}
                    }
                }
                self.flow_expr(argument, state)
            }

            Expr::CallExpression { callee, arguments, .. } => {
                self.flow_call(callee, arguments, state)
            }

            Expr::MemberExpression { object, .. } => self.flow_expr(object, state),

            Expr::IndexExpression { object, index, .. } => {
                let state = self.flow_expr(object, state);
                self.flow_expr(index, state)
            }

            Expr::AssignmentExpression { left, right, .. } => {
                let state = self.flow_expr(right, state);
                self.flow_assign(left, state)
            }

            Expr::ArrayLiteral { elements, .. } => {
                let mut state = state;
                for element in elements {
                    state = self.flow_expr(element, state);
                }
                state
            }
        }
    }

    /// A plain read. Reads never change state, but a read of a moved
    /// binding is the canonical use-after-move.
    fn flow_read(&mut self, name: &str, pos: Pos, state: StateMap) -> StateMap {
        if let Some(id) = self.symbols.lookup(name) {
            if let Some(OwnState::Moved { at }) = state.get(&id) {
                let at = *at;
                self.report(Diagnostic::use_after_move(name, pos, at));
            }
        }
        state
    }

    fn flow_shared_borrow(&mut self, name: &str, pos: Pos, mut state: StateMap) -> StateMap {
        let Some(id) = self.symbols.lookup(name) else {
            return state;
        };
        match state.get(&id).copied().unwrap_or(OwnState::Owned) {
            OwnState::Owned => {
                state.insert(id, OwnState::BorrowedShared { first_at: pos });
            }
            // Shared views coexist with each other.
            OwnState::BorrowedShared { .. } => {}
            OwnState::BorrowedMutable { at } => {
                self.report(Diagnostic::borrow_conflict(
                    name,
                    "shared",
                    pos,
                    at,
                    "exclusive view taken here",
                ));
            }
            OwnState::Moved { at } => {
                self.report(Diagnostic::borrow_conflict(
                    name,
                    "shared",
                    pos,
                    at,
                    "value moved here",
                ));
            }
        }
        state
    }

    fn flow_exclusive_borrow(&mut self, name: &str, pos: Pos, mut state: StateMap) -> StateMap {
        let Some(id) = self.symbols.lookup(name) else {
            return state;
        };
        match state.get(&id).copied().unwrap_or(OwnState::Owned) {
            OwnState::Owned => {
                state.insert(id, OwnState::BorrowedMutable { at: pos });
            }
            OwnState::BorrowedMutable { at } => {
                self.report(Diagnostic::second_exclusive_borrow(name, pos, at));
            }
            OwnState::BorrowedShared { first_at } => {
                self.report(Diagnostic::borrow_conflict(
                    name,
                    "exclusive",
                    pos,
                    first_at,
                    "shared view taken here",
                ));
            }
            OwnState::Moved { at } => {
                self.report(Diagnostic::borrow_conflict(
                    name,
                    "exclusive",
                    pos,
                    at,
                    "value moved here",
                ));
            }
        }
        state
    }

    fn flow_call(&mut self, callee: &Expr, arguments: &[Expr], mut state: StateMap) -> StateMap {
        let callee_name = match callee {
            Expr::Identifier { name, .. } => Some(name.as_str()),
            other => {
                state = self.flow_expr(other, state);
                None
            }
        };
        // The reporting intrinsic observes its arguments without taking them.
        let moves = callee_name != Some(PRINT_INTRINSIC);

        for arg in arguments {
            match arg {
                Expr::Identifier { name, position } if moves => {
                    state = self.flow_argument(name, *position, state);
                }
                other => {
                    state = self.flow_expr(other, state);
                }
            }
        }
        state
    }

    /// Passing a binding by value: non-copy types transfer ownership to the
    /// callee, copy types are duplicated implicitly.
    fn flow_argument(&mut self, name: &str, pos: Pos, mut state: StateMap) -> StateMap {
        let Some(id) = self.symbols.lookup(name) else {
            return state;
        };
        if self.binding_ty(id).is_copy() {
            return self.flow_read(name, pos, state);
        }
        match state.get(&id).copied().unwrap_or(OwnState::Owned) {
            OwnState::Moved { at } => {
                self.report(Diagnostic::move_of_moved(name, pos, at));
            }
            _ => {
                state.insert(id, OwnState::Moved { at: pos });
            }
        }
        state
    }

    /// Assignment writes a new value into the target: the target becomes
    /// Owned again regardless of its previous state, reviving a moved
    /// binding. Writing through a constant binding is rejected.
    fn flow_assign(&mut self, left: &Expr, mut state: StateMap) -> StateMap {
        match left {
            Expr::Identifier { name, position } => {
                if let Some(id) = self.symbols.lookup(name) {
                    let binding = self.symbols.binding(id);
                    if !binding.mutable {
                        let declared_at = binding.declared_at;
                        self.report(Diagnostic::assign_to_const(name, *position, declared_at));
                    }
                    state.insert(id, OwnState::Owned);
                }
                state
            }
            // Writing into a field or element mutates in place; the
            // containing binding keeps its state but must be readable.
            Expr::MemberExpression { object, .. } => self.flow_expr(object, state),
            Expr::IndexExpression { object, index, .. } => {
                let state = self.flow_expr(object, state);
                self.flow_expr(index, state)
            }
            other => self.flow_expr(other, state),
        }
    }
}

impl Default for OwnershipAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_the_worse_state() {
        let moved = OwnState::Moved { at: Pos::new(3, 1) };
        let shared = OwnState::BorrowedShared { first_at: Pos::new(2, 1) };
        assert_eq!(OwnState::Owned.merge(moved), moved);
        assert_eq!(moved.merge(OwnState::Owned), moved);
        assert_eq!(OwnState::Owned.merge(shared), shared);
        assert_eq!(
            shared.merge(OwnState::BorrowedMutable { at: Pos::new(4, 1) }),
            OwnState::BorrowedMutable { at: Pos::new(4, 1) }
        );
    }

    #[test]
    fn merge_states_unions_missing_entries() {
        let id = {
            let mut table = SymbolTable::new();
            let mut interner = TypeInterner::new();
            let ty = interner.intern(Ty::Str);
            table
                .define(Binding {
                    name: "s".into(),
                    ty,
                    mutable: true,
                    lifetime: LifetimeTag::Local(0),
                    referent_depth: None,
                    declared_at: Pos::new(1, 1),
                })
                .unwrap()
        };
        let mut a = StateMap::new();
        a.insert(id, OwnState::Owned);
        let mut b = StateMap::new();
        b.insert(id, OwnState::Moved { at: Pos::new(2, 1) });
        let merged = merge_states(&a, &b);
        assert_eq!(merged.get(&id), Some(&OwnState::Moved { at: Pos::new(2, 1) }));
    }
}
