//! The expression model: a tagged tree whose leaves are either a symbol
//! reference or a constant string, used for `depends on`, `default`
//! conditions, `select`/`imply` conditions, ranges and relational tests.
//!
//! Expressions are built once during parsing and are immutable afterwards;
//! they hold `SymbolId` handles rather than back-pointers into the symbol
//! table, so the expression tree stays a plain DAG for drop purposes (see
//! the arena note in [`crate::ids`]).

use crate::ids::SymbolId;

#[derive(Debug, Clone)]
pub enum Expr {
    Symbol(SymbolId),
    /// A bare string constant: `"n"`/`"m"`/`"y"` or an arbitrary literal used
    /// on the right of a relational comparison.
    Const(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    Less(Box<Expr>, Box<Expr>),
    LessEq(Box<Expr>, Box<Expr>),
    Greater(Box<Expr>, Box<Expr>),
    GreaterEq(Box<Expr>, Box<Expr>),
}

impl Default for Expr {
    fn default() -> Self {
        Expr::yes()
    }
}

impl Expr {
    pub fn no() -> Expr {
        Expr::Const("n".to_string())
    }

    pub fn yes() -> Expr {
        Expr::Const("y".to_string())
    }

    pub fn is_const_no(&self) -> bool {
        matches!(self, Expr::Const(s) if s == "n")
    }

    pub fn and(self, other: Expr) -> Expr {
        if self.is_const_no() || other.is_const_no() {
            return Expr::no();
        }
        Expr::And(Box::new(self), Box::new(other))
    }

    /// ANDs `cond` onto `self` in place, used repeatedly while propagating
    /// enclosing `depends on`/`if` conditions down into a property.
    pub fn and_with(self, cond: &Option<Expr>) -> Expr {
        match cond {
            Some(c) => self.and(c.clone()),
            None => self,
        }
    }

    pub fn or(self, other: Expr) -> Expr {
        if self.is_const_no() {
            return other;
        }
        if other.is_const_no() {
            return self;
        }
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// ORs `other` into `*self`, the pattern used to accumulate `rev_dep`/
    /// `weak_rev_dep` as `select`/`imply` declarations are discovered.
    pub fn or_assign(&mut self, other: Expr) {
        let old = std::mem::replace(self, Expr::no());
        *self = old.or(other);
    }

    pub fn collect_symbols(&self, out: &mut Vec<SymbolId>) {
        match self {
            Expr::Symbol(id) => out.push(*id),
            Expr::Const(_) => {}
            Expr::Not(e) => e.collect_symbols(out),
            Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Eq(a, b)
            | Expr::NotEq(a, b)
            | Expr::Less(a, b)
            | Expr::LessEq(a, b)
            | Expr::Greater(a, b)
            | Expr::GreaterEq(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// True if `sym` appears as a direct operand of an AND-chain anchored at
    /// this node, or as the left side of `sym = y`, `sym = m`, `sym != n` at
    /// the top of that chain. Used by the menu finalizer (§4.4) to decide
    /// whether one entry "depends on" a preceding symbol for the purpose of
    /// building an implicit submenu.
    pub fn implies_dependency_on(&self, sym: SymbolId) -> bool {
        match self {
            Expr::Symbol(id) => *id == sym,
            Expr::And(a, b) => a.implies_dependency_on(sym) || b.implies_dependency_on(sym),
            Expr::Eq(a, b) => is_sym_eq_truthy(a, b, sym, true) || is_sym_eq_truthy(b, a, sym, true),
            Expr::NotEq(a, b) => is_sym_uneq_n(a, b, sym) || is_sym_uneq_n(b, a, sym),
            _ => false,
        }
    }
}

fn is_sym_eq_truthy(lhs: &Expr, rhs: &Expr, sym: SymbolId, _eq: bool) -> bool {
    matches!(lhs, Expr::Symbol(id) if *id == sym)
        && matches!(rhs, Expr::Const(s) if s == "y" || s == "m")
}

fn is_sym_uneq_n(lhs: &Expr, rhs: &Expr, sym: SymbolId) -> bool {
    matches!(lhs, Expr::Symbol(id) if *id == sym) && matches!(rhs, Expr::Const(s) if s == "n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_assign_identity_on_no() {
        let mut e = Expr::no();
        e.or_assign(Expr::Symbol(SymbolId(0)));
        assert!(matches!(e, Expr::Symbol(_)));
    }

    #[test]
    fn and_short_circuits_on_no() {
        let e = Expr::no().and(Expr::Symbol(SymbolId(0)));
        assert!(e.is_const_no());
    }

    #[test]
    fn implies_dependency_direct_operand() {
        let sym = SymbolId(3);
        let e = Expr::Symbol(sym).and(Expr::Symbol(SymbolId(4)));
        assert!(e.implies_dependency_on(sym));
    }

    #[test]
    fn implies_dependency_eq_y() {
        let sym = SymbolId(5);
        let e = Expr::Eq(
            Box::new(Expr::Symbol(sym)),
            Box::new(Expr::Const("y".into())),
        );
        assert!(e.implies_dependency_on(sym));
    }
}
