//! §4.4: the tree finalizer. Runs once after parsing to build implicit
//! submenus from auto-menu dependencies, flatten promptless wrapper nodes
//! (including leftover `if` scaffolding) into their parent's sibling chain,
//! and bind choice members.

use crate::ids::NodeId;
use crate::menu::Item;
use crate::symbol::SymType;
use crate::Kconfig;

/// Entry point: call once on the tree root after parsing.
pub fn finalize_tree(kc: &mut Kconfig, node: NodeId) {
    if kc.node(node).list.get().is_some() {
        let mut cur = kc.node(node).list.get();
        while let Some(cur_id) = cur {
            finalize_tree(kc, cur_id);
            // the recursive call may have grown an auto-submenu under
            // `cur_id`, swallowing following siblings, so re-read `next`.
            cur = kc.node(cur_id).next.get();
        }
    } else if !matches!(kc.node(node).item, Item::If) {
        check_auto_menu(kc, node);
    }

    if kc.node(node).list.get().is_some() {
        flatten(kc, kc.node(node).list.get());
        remove_if_nodes(kc, node);
    }

    if let Item::Choice(choice_id) = kc.node(node).item {
        finalize_choice(kc, node, choice_id);
    }
}

/// A childless node whose following siblings each depend on it becomes an
/// implicit submenu over those siblings (the "auto-menu" feature).
fn check_auto_menu(kc: &mut Kconfig, node: NodeId) {
    let mut last = node;
    loop {
        let next = kc.node(last).next.get();
        let Some(next_id) = next else { break };
        if !depends_on_owner(kc, node, next_id) {
            break;
        }
        finalize_tree(kc, next_id);
        last = next_id;
    }
    if last == node {
        return;
    }
    let first_absorbed = kc.node(node).next.get();
    let tail = kc.node(last).next.get();
    kc.node(node).list.set(first_absorbed);
    kc.node(node).next.set(tail);

    let mut cur = first_absorbed;
    while let Some(cid) = cur {
        kc.node(cid).parent.set(Some(node));
        cur = kc.node(cid).next.get();
    }
}

fn depends_on_owner(kc: &Kconfig, owner_node: NodeId, candidate: NodeId) -> bool {
    let owner_sym = match kc.node(owner_node).item {
        Item::Symbol(id) => id,
        _ => return false,
    };
    let candidate_node = kc.node(candidate);
    match &candidate_node.prompt {
        Some((_, Some(cond))) => cond.implies_dependency_on(owner_sym),
        Some((_, None)) => false,
        None => candidate_node.dep.implies_dependency_on(owner_sym),
    }
}

/// Splices the children of any promptless node with children into that
/// node's own place in the sibling chain, leaving the node itself in the
/// chain but childless. Applies uniformly, including to `if`-scaffolding and
/// to a promptless choice (whose members then surface as plain siblings,
/// matching the reference implementation).
fn flatten(kc: &mut Kconfig, head: Option<NodeId>) {
    let mut cur = head;
    while let Some(id) = cur {
        let has_children = kc.node(id).list.get().is_some();
        let promptless = match &kc.node(id).prompt {
            None => true,
            Some((text, _)) => text.is_empty(),
        };
        if has_children && promptless {
            let list_head = kc.node(id).list.get().unwrap();
            let new_parent = kc.node(id).parent.get();

            let mut last = list_head;
            kc.node(last).parent.set(new_parent);
            while let Some(n) = kc.node(last).next.get() {
                kc.node(n).parent.set(new_parent);
                last = n;
            }

            let after = kc.node(id).next.get();
            kc.node(last).next.set(after);
            kc.node(id).next.set(Some(list_head));
            kc.node(id).list.set(None);
        }
        cur = kc.node(id).next.get();
    }
}

/// Unlinks `if`-scaffolding nodes (`item == Item::If`) from `node`'s
/// immediate child list. By the time this runs, [`flatten`] has already
/// spliced any children the `if` held, so every remaining `If` node here is
/// childless and safe to drop.
fn remove_if_nodes(kc: &mut Kconfig, node: NodeId) {
    let mut head = kc.node(node).list.get();
    while let Some(id) = head {
        if matches!(kc.node(id).item, Item::If) {
            head = kc.node(id).next.get();
        } else {
            break;
        }
    }

    let mut cur = head;
    while let Some(id) = cur {
        let mut next = kc.node(id).next.get();
        while let Some(nid) = next {
            if matches!(kc.node(nid).item, Item::If) {
                next = kc.node(nid).next.get();
            } else {
                break;
            }
        }
        kc.node(id).next.set(next);
        cur = next;
    }

    kc.node(node).list.set(head);
}

/// Binds each symbol child of a choice node as a choice member, and
/// back-fills an `Unknown` choice/member type from the first typed member.
fn finalize_choice(kc: &Kconfig, node: NodeId, choice_id: crate::ids::ChoiceId) {
    let mut cur = kc.node(node).list.get();
    while let Some(id) = cur {
        if let Item::Symbol(sym_id) = kc.node(id).item {
            kc.sym(sym_id).choice.set(Some(choice_id));
            kc.choice(choice_id).syms.borrow_mut().push(sym_id);
        }
        cur = kc.node(id).next.get();
    }

    if kc.choice(choice_id).type_.get() == SymType::Unknown {
        let inferred = kc
            .choice(choice_id)
            .syms
            .borrow()
            .iter()
            .map(|s| kc.sym(*s).type_.get())
            .find(|t| *t != SymType::Unknown);
        if let Some(t) = inferred {
            kc.choice(choice_id).type_.set(t);
        }
    }
    let ctype = kc.choice(choice_id).type_.get();
    for s in kc.choice(choice_id).syms.borrow().iter() {
        if kc.sym(*s).type_.get() == SymType::Unknown {
            kc.sym(*s).type_.set(ctype);
        }
    }
}
