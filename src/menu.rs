//! The menu-node tree (§3 `MenuNode`): one node per occurrence of a symbol,
//! choice, menu, or comment, linked by `parent`/`list`/`next`.

use std::cell::Cell;
use std::rc::Rc;

use crate::expr::Expr;
use crate::ids::{ChoiceId, NodeId, SymbolId};
use crate::Kconfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    Symbol(SymbolId),
    Choice(ChoiceId),
    Menu,
    Comment,
    /// Scaffolding for an `if ... endif` block; removed by the finalizer.
    If,
}

#[derive(Debug)]
pub struct NodeData {
    pub item: Item,
    pub prompt: Option<(String, Option<Expr>)>,
    pub help: Option<String>,
    pub dep: Expr,
    /// `visible if` on menus; `Expr::yes()` when absent.
    pub visibility: Expr,
    pub is_menuconfig: bool,
    pub file: Rc<str>,
    pub linenr: u32,

    pub parent: Cell<Option<NodeId>>,
    pub next: Cell<Option<NodeId>>,
    pub list: Cell<Option<NodeId>>,
}

impl NodeData {
    pub fn new(item: Item, file: Rc<str>, linenr: u32) -> Self {
        Self {
            item,
            prompt: None,
            help: None,
            dep: Expr::yes(),
            visibility: Expr::yes(),
            is_menuconfig: false,
            file,
            linenr,
            parent: Cell::new(None),
            next: Cell::new(None),
            list: Cell::new(None),
        }
    }
}

impl Kconfig {
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    /// Mutable access during parsing, before the node's structural fields
    /// (`dep`/`prompt`/`help`/`visibility`/`is_menuconfig`) are frozen.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub fn top_node(&self) -> NodeId {
        self.top_node
    }

    /// Children of `node`, in source order.
    pub fn children(&self, node: NodeId) -> NodeIter<'_> {
        NodeIter {
            kconfig: self,
            next: self.node(node).list.get(),
        }
    }

    /// Whether a MENU or COMMENT node is currently visible: its accumulated
    /// `dep` is satisfied and (for menus) its `visible if` is satisfied.
    pub fn node_visible(&self, id: NodeId) -> bool {
        let node = self.node(id);
        crate::eval::is_satisfied(self, &node.dep) && crate::eval::is_satisfied(self, &node.visibility)
    }
}

pub struct NodeIter<'a> {
    kconfig: &'a Kconfig,
    next: Option<NodeId>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.kconfig.node(cur).next.get();
        Some(cur)
    }
}
