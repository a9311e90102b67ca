//! A library for parsing, evaluating, and serializing Kconfig
//! configurations: symbols, choices, and the menu-node tree they occupy,
//! plus the value/visibility/assignable engine and the dependency graph
//! that keeps it consistent under mutation.
//!
//! The crate is organized the way the language itself is layered: [`lexer`]
//! and [`parser`] turn text into a tree ([`menu`], [`symbol`], [`expr`]),
//! [`finalize`] normalizes that tree, [`eval`]/[`symbol`] compute values
//! over it, [`depgraph`] keeps the value caches honest under mutation, and
//! [`config_io`] reads and writes the serialized assignment format.

mod config_io;
mod depgraph;
mod error;
mod eval;
mod expr;
mod finalize;
mod ids;
mod lexer;
mod menu;
mod parser;
mod symbol;
mod tristate;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub use error::{KconfigError, Location, Result, Warning};
pub use expr::Expr;
pub use ids::{ChoiceId, NodeId, SymbolId};
pub use menu::{Item, NodeData};
pub use symbol::{ChoiceData, SymType, SymbolData};
pub use tristate::Tristate;

/// Constructor options and the environment snapshot (§2a, §6): captured
/// once so that mutating `$CONFIG_`/`$srctree` after construction never
/// retroactively affects an already-built configuration.
#[derive(Debug, Clone)]
pub struct Options {
    pub warnings_enabled: bool,
    pub srctree: Option<PathBuf>,
    pub config_prefix: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            warnings_enabled: true,
            srctree: std::env::var_os("srctree").map(PathBuf::from),
            config_prefix: std::env::var("CONFIG_").unwrap_or_else(|_| "CONFIG_".to_string()),
        }
    }
}

/// The whole in-memory graph: symbols, choices, and menu nodes, all
/// arena-owned and addressed by the `Copy` ids in [`ids`]. Structural
/// fields are fixed at parse/finalize time; `user_value`/`user_selection`
/// and the value caches are the only state that mutates afterwards.
#[derive(Debug)]
pub struct Kconfig {
    symbols: Vec<SymbolData>,
    choices: Vec<ChoiceData>,
    nodes: Vec<NodeData>,
    syms_by_name: HashMap<String, SymbolId>,
    top_node: NodeId,
    modules_sym: Option<SymbolId>,
    defconfig_list_sym: Option<SymbolId>,
    mainmenu_text: Option<String>,
    options: Options,
    warnings: RefCell<Vec<Warning>>,
}

impl Kconfig {
    /// §6 `construct`: parses `path` as the base Kconfig file.
    pub fn from_file(path: impl AsRef<Path>, options: Options) -> Result<Kconfig> {
        let mut kc = Kconfig::empty(options);
        let srctree = kc.options.srctree.clone();
        let top = {
            let mut parser = parser::Parser::new(&mut kc, srctree);
            let top = parser.parse_root(path.as_ref())?;
            let parser_warnings = parser.into_warnings();
            kc.warnings.borrow_mut().extend(parser_warnings);
            top
        };
        kc.top_node = top;
        finalize::finalize_tree(&mut kc, top);
        Ok(kc)
    }

    /// Parses `source` as if it were the contents of `filename`, with no
    /// `srctree` fallback — convenient for tests and for embedding a
    /// Kconfig tree that doesn't live on disk.
    pub fn from_str(source: &str, filename: &str) -> Result<Kconfig> {
        let dir = std::env::temp_dir().join(format!("kconfig-rs-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join(filename);
        std::fs::write(&path, source).map_err(|e| KconfigError::Io { path: path.clone(), source: e })?;
        let result = Kconfig::from_file(&path, Options { srctree: Some(dir.clone()), ..Options::default() });
        let _ = std::fs::remove_dir_all(&dir);
        result
    }

    fn empty(options: Options) -> Kconfig {
        Kconfig {
            symbols: Vec::new(),
            choices: Vec::new(),
            nodes: Vec::new(),
            syms_by_name: HashMap::new(),
            top_node: NodeId(0),
            modules_sym: None,
            defconfig_list_sym: None,
            mainmenu_text: None,
            options,
            warnings: RefCell::new(Vec::new()),
        }
    }

    // ---- arena bookkeeping, used by the parser/finalizer ---------------

    pub(crate) fn push_node(&mut self, node: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub(crate) fn push_choice(&mut self, choice: ChoiceData) -> ChoiceId {
        let id = ChoiceId(self.choices.len() as u32);
        self.choices.push(choice);
        id
    }

    /// Finds the symbol named `name`, creating an `Unknown`-typed one (a
    /// forward reference, resolved once its real `config` block is parsed)
    /// if it isn't already known.
    pub(crate) fn lookup_or_create(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.syms_by_name.get(name) {
            return *id;
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolData::new(name.to_string()));
        self.syms_by_name.insert(name.to_string(), id);
        id
    }

    pub fn symbol_ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        (0..self.symbols.len()).map(|i| SymbolId(i as u32))
    }

    pub fn choice_ids(&self) -> impl Iterator<Item = ChoiceId> + '_ {
        (0..self.choices.len()).map(|i| ChoiceId(i as u32))
    }

    pub(crate) fn config_prefix(&self) -> &str {
        &self.options.config_prefix
    }

    pub(crate) fn modules_sym(&self) -> Option<SymbolId> {
        self.modules_sym
    }

    pub(crate) fn defconfig_list_sym(&self) -> Option<SymbolId> {
        self.defconfig_list_sym
    }

    pub(crate) fn invalidate_all(&self) {
        for s in &self.symbols {
            s.invalidate();
        }
        for c in &self.choices {
            c.invalidate();
        }
    }

    /// `$NAME` expansion for paths (`source`, `defconfig_list` filenames):
    /// same rule as prompts/help text (§4.3).
    pub(crate) fn expand_path_refs(&self, text: &str) -> String {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                    j += 1;
                }
                if j > start {
                    let name = &text[start..j];
                    out.push_str(&match std::env::var(name) {
                        Ok(v) => v,
                        Err(_) => self.lookup(name).map(|id| self.value(id)).unwrap_or_default(),
                    });
                    i = j;
                    continue;
                }
            }
            out.push(bytes[i] as char);
            i += 1;
        }
        out
    }

    pub(crate) fn resolve_existing_path(&self, path: &str) -> Option<PathBuf> {
        let p = Path::new(path);
        if p.exists() {
            return Some(p.to_path_buf());
        }
        if p.is_relative()
            && let Some(srctree) = &self.options.srctree {
                let joined = srctree.join(p);
                if joined.exists() {
                    return Some(joined);
                }
            }
        None
    }

    // ---- §6 public API ---------------------------------------------------

    pub fn top_menu(&self) -> NodeId {
        self.top_node
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.syms_by_name.get(name).copied()
    }

    pub fn symbol_name(&self, id: SymbolId) -> &str {
        &self.sym(id).name
    }

    pub fn warnings(&self) -> std::cell::Ref<'_, Vec<Warning>> {
        self.warnings.borrow()
    }

    pub fn mainmenu_text(&self) -> Option<&str> {
        self.mainmenu_text.as_deref()
    }

    /// Assigns a new `user_value` to a plain (non-choice-member) symbol and
    /// invalidates the transitive closure of affected caches (§4.8).
    /// Choice members are assigned through [`Kconfig::set_choice_selection`]
    /// or [`Kconfig::set_choice_mode`] instead, since their value depends on
    /// the owning choice's mode.
    pub fn set_user_value(&self, id: SymbolId, value: Option<&str>) {
        *self.sym(id).user_value.borrow_mut() = value.map(|s| s.to_string());
        depgraph::invalidate_after_set(self, id);
    }

    pub fn user_value(&self, id: SymbolId) -> Option<String> {
        self.sym(id).user_value.borrow().clone()
    }

    /// Sets a choice's mode directly (`n`/`m`/`y`).
    pub fn set_choice_mode(&self, id: ChoiceId, mode: Tristate) {
        *self.choice(id).user_value.borrow_mut() = Some(mode);
        self.invalidate_choice(id);
    }

    /// Selects `member` as the preferred member of its choice, switching the
    /// choice to mode "y".
    pub fn select_choice_member(&self, member: SymbolId) {
        let Some(choice_id) = self.sym(member).choice.get() else { return };
        *self.choice(choice_id).user_value.borrow_mut() = Some(Tristate::Y);
        self.choice(choice_id).user_selection.set(Some(member));
        self.invalidate_choice(choice_id);
    }

    fn invalidate_choice(&self, id: ChoiceId) {
        self.choice(id).invalidate();
        for member in self.choice(id).syms.borrow().iter() {
            depgraph::invalidate_after_set(self, *member);
        }
    }

    /// Clears every symbol's and choice's user-provided value, reverting
    /// the whole tree to its declared defaults.
    pub fn clear_all_user_values(&self) {
        for s in self.symbol_ids() {
            *self.sym(s).user_value.borrow_mut() = None;
        }
        for c in self.choice_ids() {
            *self.choice(c).user_value.borrow_mut() = None;
            self.choice(c).user_selection.set(None);
        }
        self.invalidate_all();
    }

    /// §4.5's evaluator applied to an ad hoc expression string, for callers
    /// that want `eval_string("A && !B")` rather than walking the tree.
    pub fn eval_string(&self, s: &str) -> Result<Tristate> {
        let tokens = lexer::tokenize_line(s, &Rc::from("<eval_string>"), 1)?;
        let mut this = self;
        let _ = &mut this;
        eval_tokens(self, &tokens)
    }

    pub fn load_config(&mut self, path: impl AsRef<Path>, replace: bool) -> Result<Vec<Warning>> {
        let warnings = config_io::load_config(self, path.as_ref(), replace)?;
        self.warnings.borrow_mut().extend(warnings.clone());
        Ok(warnings)
    }

    pub fn write_config(&self, path: impl AsRef<Path>, header: &str) -> Result<()> {
        config_io::write_config(self, path.as_ref(), header)
    }

    pub fn defconfig_filename(&self) -> Option<String> {
        config_io::defconfig_filename(self)
    }
}

/// A tiny standalone expression parser for [`Kconfig::eval_string`] — reuses
/// the same precedence as the main parser (OR < AND < comparison < primary)
/// but over a fixed token slice instead of a line feeder.
fn eval_tokens(kc: &Kconfig, tokens: &[lexer::Token]) -> Result<Tristate> {
    struct C<'t> {
        toks: &'t [lexer::Token],
        i: Cell<usize>,
    }
    impl<'t> C<'t> {
        fn peek(&self) -> lexer::TokenKind {
            self.toks.get(self.i.get()).map(|t| t.kind.clone()).unwrap_or(lexer::TokenKind::CloseParen)
        }
        fn advance(&self) -> lexer::TokenKind {
            let k = self.peek();
            self.i.set(self.i.get() + 1);
            k
        }
    }
    fn primary(kc: &Kconfig, c: &C) -> Expr {
        match c.advance() {
            lexer::TokenKind::Not => Expr::Not(Box::new(primary(kc, c))),
            lexer::TokenKind::OpenParen => {
                let inner = or_expr(kc, c);
                c.advance();
                inner
            }
            lexer::TokenKind::Ident(name) => match kc.lookup(&name) {
                Some(id) => Expr::Symbol(id),
                None => Expr::Const(name),
            },
            lexer::TokenKind::StringLit(s) => Expr::Const(s),
            _ => Expr::no(),
        }
    }
    fn comparison(kc: &Kconfig, c: &C) -> Expr {
        let lhs = primary(kc, c);
        let op = c.peek();
        let ctor: Option<fn(Box<Expr>, Box<Expr>) -> Expr> = match op {
            lexer::TokenKind::Eq => Some(Expr::Eq),
            lexer::TokenKind::NotEq => Some(Expr::NotEq),
            lexer::TokenKind::Less => Some(Expr::Less),
            lexer::TokenKind::LessEq => Some(Expr::LessEq),
            lexer::TokenKind::Greater => Some(Expr::Greater),
            lexer::TokenKind::GreaterEq => Some(Expr::GreaterEq),
            _ => None,
        };
        match ctor {
            Some(f) => {
                c.advance();
                let rhs = primary(kc, c);
                f(Box::new(lhs), Box::new(rhs))
            }
            None => lhs,
        }
    }
    fn and_expr(kc: &Kconfig, c: &C) -> Expr {
        let mut lhs = comparison(kc, c);
        while matches!(c.peek(), lexer::TokenKind::And) {
            c.advance();
            lhs = lhs.and(comparison(kc, c));
        }
        lhs
    }
    fn or_expr(kc: &Kconfig, c: &C) -> Expr {
        let mut lhs = and_expr(kc, c);
        while matches!(c.peek(), lexer::TokenKind::Or) {
            c.advance();
            lhs = lhs.or(and_expr(kc, c));
        }
        lhs
    }

    let cursor = C { toks: tokens, i: Cell::new(0) };
    let expr = or_expr(kc, &cursor);
    Ok(eval::eval(kc, &expr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_plain_bool_default() {
        let kc = Kconfig::from_str("config FOO\n\tbool\n\tdefault y\n", "Kconfig").unwrap();
        let foo = kc.lookup("FOO").unwrap();
        assert_eq!(kc.value(foo), "y");
    }

    #[test]
    fn scenario_dependency_default_and_config_load() {
        let mut kc = Kconfig::from_str(
            "config A\n\tbool\nconfig B\n\tbool\n\tdefault A\n",
            "Kconfig",
        )
        .unwrap();
        let dir = std::env::temp_dir().join("kconfig-rs-test-scenario2");
        std::fs::create_dir_all(&dir).unwrap();
        let cfg = dir.join("config1");
        std::fs::write(&cfg, "CONFIG_A=y\n").unwrap();
        kc.load_config(&cfg, true).unwrap();
        let b = kc.lookup("B").unwrap();
        assert_eq!(kc.value(b), "y");

        std::fs::write(&cfg, "# CONFIG_A is not set\n").unwrap();
        kc.load_config(&cfg, true).unwrap();
        assert_eq!(kc.value(b), "n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn scenario_int_range_default_clamped() {
        let kc = Kconfig::from_str("config N\n\tint\n\trange 10 20\n\tdefault 5\n", "Kconfig").unwrap();
        let n = kc.lookup("N").unwrap();
        assert_eq!(kc.value(n), "10");
        kc.set_user_value(n, Some("15"));
        assert_eq!(kc.value(n), "15");
    }
}
