//! §4.8: the dependency graph. Built lazily and cached per symbol — each
//! symbol's `dependents*` closure is derived from the (immutable, post-parse)
//! expression structure, so once computed it never needs to be recomputed,
//! only consulted to know which caches a `set_user_value` must drop.

use std::collections::{HashSet, VecDeque};

use crate::ids::SymbolId;
use crate::Kconfig;

/// The reflexive-transitive closure of "whose computed value mentions S",
/// cached on `S` itself.
pub fn dependents_closure(kc: &Kconfig, id: SymbolId) -> Vec<SymbolId> {
    if let Some(cached) = kc.sym(id).dependents.borrow().as_ref() {
        return cached.clone();
    }
    let mut seen: HashSet<SymbolId> = HashSet::new();
    let mut queue: VecDeque<SymbolId> = VecDeque::new();
    seen.insert(id);
    queue.push_back(id);
    let mut out = Vec::new();
    while let Some(cur) = queue.pop_front() {
        for next in direct_dependents(kc, cur) {
            if seen.insert(next) {
                out.push(next);
                queue.push_back(next);
            }
        }
    }
    *kc.sym(id).dependents.borrow_mut() = Some(out.clone());
    out
}

/// Symbols whose own expressions (prompt conditions, defaults, ranges,
/// `rev_dep`, `weak_rev_dep`, `direct_deps`) mention `id`.
fn direct_dependents(kc: &Kconfig, id: SymbolId) -> Vec<SymbolId> {
    let mut out = Vec::new();
    for other in kc.symbol_ids() {
        if other == id {
            continue;
        }
        if symbol_mentions(kc, other, id) {
            out.push(other);
        }
    }
    out
}

fn symbol_mentions(kc: &Kconfig, haystack: SymbolId, needle: SymbolId) -> bool {
    let mut refs = Vec::new();
    let sym = kc.sym(haystack);

    for node_id in sym.nodes.borrow().iter() {
        if let Some((_, Some(cond))) = &kc.node(*node_id).prompt {
            cond.collect_symbols(&mut refs);
        }
    }
    for (value, cond) in sym.defaults.borrow().iter() {
        value.collect_symbols(&mut refs);
        if let Some(c) = cond {
            c.collect_symbols(&mut refs);
        }
    }
    for (lo, hi, cond) in sym.ranges.borrow().iter() {
        lo.collect_symbols(&mut refs);
        hi.collect_symbols(&mut refs);
        if let Some(c) = cond {
            c.collect_symbols(&mut refs);
        }
    }
    sym.rev_dep.borrow().collect_symbols(&mut refs);
    sym.weak_rev_dep.borrow().collect_symbols(&mut refs);
    sym.direct_deps.borrow().collect_symbols(&mut refs);

    refs.contains(&needle)
}

/// Drops the value/visibility caches of `id` and everything that depends on
/// it (transitively), plus the choice-level caches of any choice `id` or one
/// of its dependents belongs to (a choice member's value computation reads
/// `choice_selection`, which is cached on the `Choice`, not on the member).
/// A change to the modules symbol invalidates every symbol and choice.
pub fn invalidate_after_set(kc: &Kconfig, id: SymbolId) {
    if kc.modules_sym() == Some(id) {
        for s in kc.symbol_ids() {
            kc.sym(s).invalidate();
        }
        for c in kc.choice_ids() {
            kc.choice(c).invalidate();
        }
        return;
    }

    let closure = dependents_closure(kc, id);
    kc.sym(id).invalidate();
    for s in &closure {
        kc.sym(*s).invalidate();
    }

    let mut touched_choices = HashSet::new();
    if let Some(c) = kc.sym(id).choice.get() {
        touched_choices.insert(c);
    }
    for s in &closure {
        if let Some(c) = kc.sym(*s).choice.get() {
            touched_choices.insert(c);
        }
    }
    for c in touched_choices {
        kc.choice(c).invalidate();
        for member in kc.choice(c).syms.borrow().iter() {
            kc.sym(*member).invalidate();
        }
    }
}
