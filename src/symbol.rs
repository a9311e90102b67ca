//! Symbols, choices, and the value/visibility/assignable engine (§3, §4.6,
//! §4.7). Structural fields are populated once during parsing/finalization;
//! `user_value`/`user_selection` and the cache cells are the only state that
//! mutates afterwards.

use std::cell::{Cell, RefCell};

use crate::eval::eval;
use crate::expr::Expr;
use crate::ids::{ChoiceId, NodeId, SymbolId};
use crate::tristate::Tristate;
use crate::Kconfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymType {
    Unknown,
    Bool,
    Tristate,
    Int,
    Hex,
    String,
}

impl SymType {
    pub fn is_bool_ish(self) -> bool {
        matches!(self, SymType::Bool)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymType::Unknown => "unknown",
            SymType::Bool => "bool",
            SymType::Tristate => "tristate",
            SymType::Int => "int",
            SymType::Hex => "hex",
            SymType::String => "string",
        }
    }
}

#[derive(Debug)]
pub struct SymbolData {
    pub name: String,
    pub type_: Cell<SymType>,
    pub defaults: RefCell<Vec<(Expr, Option<Expr>)>>,
    pub selects: RefCell<Vec<(SymbolId, Option<Expr>)>>,
    pub implies: RefCell<Vec<(SymbolId, Option<Expr>)>>,
    pub ranges: RefCell<Vec<(Expr, Expr, Option<Expr>)>>,
    pub rev_dep: RefCell<Expr>,
    pub weak_rev_dep: RefCell<Expr>,
    pub direct_deps: RefCell<Expr>,
    pub user_value: RefCell<Option<String>>,
    pub choice: Cell<Option<ChoiceId>>,
    pub env_var: RefCell<Option<String>>,
    pub is_allnoconfig_y: Cell<bool>,
    pub nodes: RefCell<Vec<NodeId>>,

    // caches, invalidated by the dependency graph (§4.8)
    pub(crate) cached_value: RefCell<Option<String>>,
    pub(crate) cached_visibility: Cell<Option<Tristate>>,
    pub(crate) write_to_conf: Cell<bool>,
    pub(crate) dependents: RefCell<Option<Vec<SymbolId>>>,
}

impl SymbolData {
    pub fn new(name: String) -> Self {
        Self {
            name,
            type_: Cell::new(SymType::Unknown),
            defaults: RefCell::new(Vec::new()),
            selects: RefCell::new(Vec::new()),
            implies: RefCell::new(Vec::new()),
            ranges: RefCell::new(Vec::new()),
            rev_dep: RefCell::new(Expr::no()),
            weak_rev_dep: RefCell::new(Expr::no()),
            direct_deps: RefCell::new(Expr::no()),
            user_value: RefCell::new(None),
            choice: Cell::new(None),
            env_var: RefCell::new(None),
            is_allnoconfig_y: Cell::new(false),
            nodes: RefCell::new(Vec::new()),
            cached_value: RefCell::new(None),
            cached_visibility: Cell::new(None),
            write_to_conf: Cell::new(false),
            dependents: RefCell::new(None),
        }
    }

    pub(crate) fn invalidate(&self) {
        *self.cached_value.borrow_mut() = None;
        self.cached_visibility.set(None);
    }
}

#[derive(Debug)]
pub struct ChoiceData {
    pub name: Option<String>,
    pub type_: Cell<SymType>,
    pub syms: RefCell<Vec<SymbolId>>,
    pub defaults: RefCell<Vec<(SymbolId, Option<Expr>)>>,
    pub is_optional: Cell<bool>,
    pub user_value: RefCell<Option<Tristate>>,
    pub user_selection: Cell<Option<SymbolId>>,
    pub nodes: RefCell<Vec<NodeId>>,

    pub(crate) cached_visibility: Cell<Option<Tristate>>,
    pub(crate) cached_selection: RefCell<Option<Option<SymbolId>>>,
}

impl ChoiceData {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            type_: Cell::new(SymType::Unknown),
            syms: RefCell::new(Vec::new()),
            defaults: RefCell::new(Vec::new()),
            is_optional: Cell::new(false),
            user_value: RefCell::new(None),
            user_selection: Cell::new(None),
            nodes: RefCell::new(Vec::new()),
            cached_visibility: Cell::new(None),
            cached_selection: RefCell::new(None),
        }
    }

    pub(crate) fn invalidate(&self) {
        self.cached_visibility.set(None);
        *self.cached_selection.borrow_mut() = None;
    }
}

impl Kconfig {
    pub fn sym(&self, id: SymbolId) -> &SymbolData {
        &self.symbols[id.index()]
    }

    pub fn choice(&self, id: ChoiceId) -> &ChoiceData {
        &self.choices[id.index()]
    }

    /// §4.6: the symbol's computed value, as the string kconfig would print
    /// it (`"n"`/`"m"`/`"y"` for bool/tristate; the canonical numeric/hex
    /// text for int/hex; the raw string for string symbols).
    pub fn value(&self, id: SymbolId) -> String {
        let sym = self.sym(id);
        if let Some(v) = sym.cached_value.borrow().as_ref() {
            return v.clone();
        }
        let v = self.compute_value(id);
        *sym.cached_value.borrow_mut() = Some(v.clone());
        v
    }

    /// The value as a [`Tristate`] — `"n"` for every non-bool/tristate
    /// symbol, matching the evaluator's symbol-leaf rule (§4.5).
    pub fn tri_value(&self, id: SymbolId) -> Tristate {
        let sym = self.sym(id);
        match sym.type_.get() {
            SymType::Bool | SymType::Tristate => {
                Tristate::from_str_opt(&self.value(id)).unwrap_or(Tristate::N)
            }
            _ => Tristate::N,
        }
    }

    fn compute_value(&self, id: SymbolId) -> String {
        let sym = self.sym(id);
        match sym.type_.get() {
            SymType::Unknown => sym.name.clone(),
            SymType::Bool | SymType::Tristate => self.compute_tristate_value(id).as_str().to_string(),
            SymType::Int | SymType::Hex => self.compute_numeric_value(id),
            SymType::String => self.compute_string_value(id),
        }
    }

    fn compute_tristate_value(&self, id: SymbolId) -> Tristate {
        let sym = self.sym(id);
        if let Some(choice_id) = sym.choice.get() {
            return self.compute_choice_member_value(id, choice_id);
        }

        let visibility = self.visibility_sym(id);
        sym.write_to_conf.set(visibility != Tristate::N);

        let mut val = Tristate::N;
        if visibility != Tristate::N && sym.user_value.borrow().is_some() {
            if let Some(t) = sym.user_value.borrow().as_deref().and_then(Tristate::from_str_opt) {
                val = t.min(visibility);
            }
        } else {
            for (value_expr, cond) in sym.defaults.borrow().iter() {
                let cond_val = cond.as_ref().map(|c| eval(self, c)).unwrap_or(Tristate::Y);
                if cond_val != Tristate::N {
                    val = eval(self, value_expr).min(cond_val);
                    sym.write_to_conf.set(true);
                    break;
                }
            }
        }

        let direct_deps = eval(self, &sym.direct_deps.borrow());
        let weak = eval(self, &sym.weak_rev_dep.borrow());
        if direct_deps != Tristate::N {
            val = val.max(weak);
        }

        let rev_dep = eval(self, &sym.rev_dep.borrow());
        if rev_dep != Tristate::N {
            val = val.max(rev_dep);
            sym.write_to_conf.set(true);
        }

        let effective_bool = sym.type_.get() == SymType::Bool || !self.modules_on();
        if val == Tristate::M && (effective_bool || weak == Tristate::Y) {
            val = Tristate::Y;
        }
        val
    }

    fn compute_choice_member_value(&self, id: SymbolId, choice_id: ChoiceId) -> Tristate {
        let choice = self.choice(choice_id);
        let visibility = self.visibility_sym(id);
        let mode = choice.user_value.borrow().unwrap_or(Tristate::N);

        if visibility == Tristate::N || mode == Tristate::N {
            return Tristate::N;
        }
        if mode == Tristate::Y {
            return if self.choice_selection(choice_id) == Some(id) {
                Tristate::Y
            } else {
                Tristate::N
            };
        }
        // mode == M
        let sym = self.sym(id);
        match sym.user_value.borrow().as_deref() {
            Some("m") | Some("y") => Tristate::M,
            _ => Tristate::N,
        }
    }

    fn compute_numeric_value(&self, id: SymbolId) -> String {
        let sym = self.sym(id);
        let base = if sym.type_.get() == SymType::Hex { 16 } else { 10 };
        let active_range = self.active_range(id);

        let visible = self.visibility_sym(id) != Tristate::N;
        if visible
            && let Some(uv) = sym.user_value.borrow().clone()
                && let Some(n) = parse_int(&uv, base)
                    && active_range
                        .as_ref()
                        .map(|(lo, hi)| n >= *lo && n <= *hi)
                        .unwrap_or(true)
                    {
                        return uv;
                    }

        for (value_expr, cond) in sym.defaults.borrow().iter() {
            let cond_val = cond.as_ref().map(|c| eval(self, c)).unwrap_or(Tristate::Y);
            if cond_val == Tristate::N {
                continue;
            }
            let raw = self.expr_string_value(value_expr);
            if let Some(n) = parse_int(&raw, base) {
                if let Some((lo, hi)) = active_range {
                    let clamped = n.clamp(lo, hi);
                    return format_int(clamped, base);
                }
                return format_int(n, base);
            }
            return raw;
        }

        if let Some((lo, _hi)) = active_range
            && lo > 0 {
                return format_int(lo, base);
            }
        if sym.type_.get() == SymType::Hex {
            "0x0".to_string()
        } else {
            "0".to_string()
        }
    }

    pub(crate) fn active_range(&self, id: SymbolId) -> Option<(i64, i64)> {
        let sym = self.sym(id);
        let base = if sym.type_.get() == SymType::Hex { 16 } else { 10 };
        for (lo, hi, cond) in sym.ranges.borrow().iter() {
            let cond_val = cond.as_ref().map(|c| eval(self, c)).unwrap_or(Tristate::Y);
            if cond_val == Tristate::N {
                continue;
            }
            let lo_v = parse_int(&self.expr_string_value(lo), base).unwrap_or(0);
            let hi_v = parse_int(&self.expr_string_value(hi), base).unwrap_or(i64::MAX);
            return Some((lo_v, hi_v));
        }
        None
    }

    fn compute_string_value(&self, id: SymbolId) -> String {
        let sym = self.sym(id);
        let visible = self.visibility_sym(id) != Tristate::N;
        if visible
            && let Some(uv) = sym.user_value.borrow().as_ref() {
                return uv.clone();
            }
        for (value_expr, cond) in sym.defaults.borrow().iter() {
            let cond_val = cond.as_ref().map(|c| eval(self, c)).unwrap_or(Tristate::Y);
            if cond_val != Tristate::N {
                return self.expr_string_value(value_expr);
            }
        }
        String::new()
    }

    /// The string form of an expression used as a *value* (not a
    /// condition): a symbol operand yields its own value, a constant
    /// operand is itself.
    pub(crate) fn expr_string_value(&self, expr: &Expr) -> String {
        match expr {
            Expr::Symbol(id) => self.value(*id),
            Expr::Const(s) => s.clone(),
            _ => eval(self, expr).as_str().to_string(),
        }
    }

    /// §4.7 visibility for a plain symbol: max over all nodes' prompt
    /// conditions. A node with no prompt at all isn't gated by a prompt
    /// condition; it falls back to its own `depends on` chain, so a
    /// promptless symbol still has its assignability bounded by the
    /// dependencies declared at its definition site(s).
    pub fn visibility_sym(&self, id: SymbolId) -> Tristate {
        let sym = self.sym(id);
        if let Some(v) = sym.cached_visibility.get() {
            return v;
        }
        let mut vis = Tristate::N;
        for node_id in sym.nodes.borrow().iter() {
            let node = self.node(*node_id);
            let contribution = match &node.prompt {
                Some((_, cond)) => cond.as_ref().map(|c| eval(self, c)).unwrap_or(Tristate::Y),
                None => eval(self, &node.dep),
            };
            vis = vis.max(contribution);
        }
        if let Some(choice_id) = sym.choice.get() {
            vis = self.adjust_choice_member_visibility(id, choice_id, vis);
        }
        sym.cached_visibility.set(Some(vis));
        vis
    }

    fn adjust_choice_member_visibility(&self, id: SymbolId, choice_id: ChoiceId, own_vis: Tristate) -> Tristate {
        let sym = self.sym(id);
        let choice = self.choice(choice_id);
        let choice_vis = self.visibility_choice(choice_id);
        let choice_is_tristate = choice.type_.get() == SymType::Tristate;
        let mut vis = own_vis;
        if choice_is_tristate {
            let choice_mode = choice.user_value.borrow().unwrap_or(Tristate::N);
            if sym.type_.get() != SymType::Tristate && choice_mode != Tristate::Y {
                return Tristate::N;
            }
            if sym.type_.get() == SymType::Tristate && vis == Tristate::M && choice_mode == Tristate::Y {
                return Tristate::N;
            }
        }
        vis = vis.min(choice_vis);
        if sym.type_.get() != SymType::Tristate && vis == Tristate::M {
            vis = Tristate::Y;
        }
        vis
    }

    pub fn visibility_choice(&self, id: ChoiceId) -> Tristate {
        let choice = self.choice(id);
        if let Some(v) = choice.cached_visibility.get() {
            return v;
        }
        let mut vis = Tristate::N;
        for node_id in choice.nodes.borrow().iter() {
            let node = self.node(*node_id);
            let contribution = match &node.prompt {
                Some((_, cond)) => cond.as_ref().map(|c| eval(self, c)).unwrap_or(Tristate::Y),
                None => eval(self, &node.dep),
            };
            vis = vis.max(contribution);
        }
        if choice.type_.get() != SymType::Tristate && vis == Tristate::M {
            vis = Tristate::Y;
        }
        choice.cached_visibility.set(Some(vis));
        vis
    }

    /// §4.7 assignable set for a bool/tristate symbol, as an ordered
    /// subsequence of `"nmy"`.
    pub fn assignable(&self, id: SymbolId) -> Vec<Tristate> {
        let sym = self.sym(id);
        let vis = self.visibility_sym(id);
        if vis == Tristate::N {
            return Vec::new();
        }
        let rev_dep = eval(self, &sym.rev_dep.borrow());
        let weak = eval(self, &sym.weak_rev_dep.borrow());
        let bool_ish = sym.type_.get() == SymType::Bool || weak == Tristate::Y || !self.modules_on();

        match (vis, rev_dep) {
            (Tristate::Y, Tristate::N) => {
                if bool_ish {
                    vec![Tristate::N, Tristate::Y]
                } else {
                    vec![Tristate::N, Tristate::M, Tristate::Y]
                }
            }
            (Tristate::Y, Tristate::Y) => vec![Tristate::Y],
            (Tristate::Y, Tristate::M) => {
                if bool_ish {
                    vec![Tristate::Y]
                } else {
                    vec![Tristate::M, Tristate::Y]
                }
            }
            (Tristate::M, Tristate::N) => {
                if !bool_ish {
                    vec![Tristate::M]
                } else {
                    vec![Tristate::Y]
                }
            }
            (Tristate::M, Tristate::Y) => vec![Tristate::Y],
            (Tristate::M, Tristate::M) => vec![Tristate::M],
            _ => Vec::new(),
        }
    }

    /// §4.7 assignable set for a choice.
    pub fn choice_assignable(&self, id: ChoiceId) -> Vec<Tristate> {
        let choice = self.choice(id);
        match self.visibility_choice(id) {
            Tristate::N => Vec::new(),
            Tristate::Y => {
                if choice.is_optional.get() || choice.type_.get() == SymType::Bool {
                    vec![Tristate::Y]
                } else {
                    vec![Tristate::M, Tristate::Y]
                }
            }
            Tristate::M => {
                if choice.is_optional.get() {
                    vec![Tristate::N, Tristate::M]
                } else {
                    vec![Tristate::M]
                }
            }
        }
    }

    /// The currently-selected member of a `y`-mode choice.
    pub fn choice_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        let choice = self.choice(id);
        if let Some(cached) = *choice.cached_selection.borrow() {
            return cached;
        }
        let sel = self.compute_choice_selection(id);
        *choice.cached_selection.borrow_mut() = Some(sel);
        sel
    }

    fn compute_choice_selection(&self, id: ChoiceId) -> Option<SymbolId> {
        let choice = self.choice(id);
        if let Some(explicit) = choice.user_selection.get() {
            let vis = self.visibility_sym(explicit);
            if vis != Tristate::N {
                return Some(explicit);
            }
        }
        for (sym_id, cond) in choice.defaults.borrow().iter() {
            let cond_val = cond.as_ref().map(|c| eval(self, c)).unwrap_or(Tristate::Y);
            if cond_val == Tristate::N {
                continue;
            }
            if self.visibility_sym(*sym_id) != Tristate::N {
                return Some(*sym_id);
            }
        }
        choice
            .syms
            .borrow()
            .iter()
            .find(|s| self.visibility_sym(**s) != Tristate::N)
            .copied()
    }
}

fn parse_int(s: &str, base: u32) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (neg, rest) = if let Some(r) = s.strip_prefix('-') {
        (true, r)
    } else {
        (false, s)
    };
    let (effective_base, digits) = if let Some(r) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, r)
    } else {
        (base, rest)
    };
    let n = i64::from_str_radix(digits, effective_base).ok()?;
    Some(if neg { -n } else { n })
}

fn format_int(n: i64, base: u32) -> String {
    if base == 16 {
        if n < 0 {
            format!("-0x{:x}", -n)
        } else {
            format!("0x{:x}", n)
        }
    } else {
        n.to_string()
    }
}

impl Kconfig {
    pub fn modules_on(&self) -> bool {
        match self.modules_sym {
            Some(id) => self.tri_value(id) == Tristate::Y,
            None => false,
        }
    }
}
