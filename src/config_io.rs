//! §4.9/§4.10: the serialized assignment format — `CONFIG_NAME=value` /
//! `# CONFIG_NAME is not set` — and the `defconfig_list` filename lookup.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::error::{KconfigError, Location, Result, Warning};
use crate::eval::eval;
use crate::ids::SymbolId;
use crate::menu::Item;
use crate::symbol::SymType;
use crate::tristate::Tristate;
use crate::Kconfig;

/// Reads a config file into `kc`. `replace` clears every symbol's prior
/// `user_value` first (default kconfig semantics: loading a `.config`
/// starts from scratch); with `replace = false`, unmatched symbols keep
/// whatever value they had. Returns the warnings collected along the way —
/// I/O failure opening `path` is the only fatal condition here.
pub fn load_config(kc: &mut Kconfig, path: &Path, replace: bool) -> Result<Vec<Warning>> {
    let text = fs::read_to_string(path).map_err(|e| KconfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file: Rc<str> = Rc::from(path.to_string_lossy().as_ref());
    let prefix = kc.config_prefix().to_string();

    if replace {
        for s in kc.symbol_ids() {
            *kc.sym(s).user_value.borrow_mut() = None;
        }
        for c in kc.choice_ids() {
            *kc.choice(c).user_value.borrow_mut() = None;
            kc.choice(c).user_selection.set(None);
        }
    }

    let mut warnings = Vec::new();
    let mut set_this_load: HashSet<SymbolId> = HashSet::new();

    for (i, raw_line) in text.lines().enumerate() {
        let line_no = i as u32 + 1;
        let line = raw_line.trim_end();
        if let Some(name) = parse_not_set_line(line, &prefix) {
            apply_assignment(kc, &name, None, &file, line_no, &mut set_this_load, &mut warnings);
        } else if let Some((name, raw_value)) = parse_assign_line(line, &prefix) {
            apply_assignment(kc, &name, Some(raw_value), &file, line_no, &mut set_this_load, &mut warnings);
        }
        // lines matching neither pattern are silently ignored (§4.9)
    }

    kc.invalidate_all();
    if kc.options.warnings_enabled {
        for w in &warnings {
            w.log();
        }
    }
    Ok(warnings)
}

fn parse_not_set_line(line: &str, prefix: &str) -> Option<String> {
    let rest = line.strip_prefix("# ")?.strip_prefix(prefix)?;
    let name = rest.strip_suffix(" is not set")?;
    is_symbol_name(name).then(|| name.to_string())
}

fn parse_assign_line(line: &str, prefix: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix(prefix)?;
    let eq = rest.find('=')?;
    let name = &rest[..eq];
    is_symbol_name(name).then(|| (name.to_string(), rest[eq + 1..].to_string()))
}

fn is_symbol_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[allow(clippy::too_many_arguments)]
fn apply_assignment(
    kc: &Kconfig,
    name: &str,
    raw_value: Option<String>,
    file: &Rc<str>,
    line_no: u32,
    set_this_load: &mut HashSet<SymbolId>,
    warnings: &mut Vec<Warning>,
) {
    let Some(id) = kc.lookup(name) else {
        warnings.push(Warning::AssignUndefinedSymbol {
            location: Some(Location { file: file.clone(), line: line_no }),
            symbol: name.to_string(),
        });
        return;
    };

    if !set_this_load.insert(id) {
        warnings.push(Warning::ReassignedInLoad {
            location: Some(Location { file: file.clone(), line: line_no }),
            symbol: name.to_string(),
        });
    }

    let ty = kc.sym(id).type_.get();

    let value = match raw_value {
        None => "n".to_string(),
        Some(raw) if ty == SymType::String => match unescape(&raw) {
            Some(v) => v,
            None => {
                warnings.push(Warning::MalformedStringLiteral {
                    location: Location { file: file.clone(), line: line_no },
                    symbol: name.to_string(),
                });
                return;
            }
        },
        Some(raw) => raw,
    };

    match ty {
        SymType::Bool | SymType::Tristate => {
            if Tristate::from_str_opt(&value).is_none() {
                warnings.push(Warning::InvalidAssignedValue {
                    location: Some(Location { file: file.clone(), line: line_no }),
                    symbol: name.to_string(),
                    value,
                });
                return;
            }
        }
        SymType::Int | SymType::Hex => {
            let base = if ty == SymType::Hex { 16 } else { 10 };
            match parse_int(&value, base) {
                None => {
                    warnings.push(Warning::InvalidAssignedValue {
                        location: Some(Location { file: file.clone(), line: line_no }),
                        symbol: name.to_string(),
                        value,
                    });
                    return;
                }
                Some(n) => {
                    if let Some((lo, hi)) = kc.active_range(id)
                        && (n < lo || n > hi) {
                            warnings.push(Warning::RangeClamped {
                                symbol: name.to_string(),
                                value: value.clone(),
                                low: lo.to_string(),
                                high: hi.to_string(),
                            });
                        }
                }
            }
        }
        SymType::Unknown | SymType::String => {}
    }

    if let Some(choice_id) = kc.sym(id).choice.get() {
        let mode = kc.choice(choice_id).user_value.borrow().unwrap_or(Tristate::N);
        let assigned = Tristate::from_str_opt(&value).unwrap_or(Tristate::N);
        if assigned != Tristate::N && mode == Tristate::N {
            warnings.push(Warning::InconsistentChoiceMode { symbol: name.to_string() });
        }
    }

    *kc.sym(id).user_value.borrow_mut() = Some(value);
}

fn unescape(raw: &str) -> Option<String> {
    if raw.len() < 2 || !raw.starts_with('"') || !raw.ends_with('"') {
        return None;
    }
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn parse_int(s: &str, base: u32) -> Option<i64> {
    let t = s.trim();
    let (neg, rest) = t.strip_prefix('-').map(|r| (true, r)).unwrap_or((false, t));
    let (radix, digits) = match rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        Some(r) => (16, r),
        None => (base, rest),
    };
    if digits.is_empty() {
        return None;
    }
    let n = i64::from_str_radix(digits, radix).ok()?;
    Some(if neg { -n } else { n })
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Writes the current configuration to `path`. Walks the menu tree in
/// source order, writing each Symbol node's first occurrence once (its
/// `write_to_conf` flag, set as a side effect of computing `value`, decides
/// whether it appears at all) and emitting section headers for visible,
/// satisfied MENU/COMMENT nodes.
pub fn write_config(kc: &Kconfig, path: &Path, header: &str) -> Result<()> {
    let mut out = String::new();
    out.push_str(header);
    if !header.is_empty() && !header.ends_with('\n') {
        out.push('\n');
    }

    let mut written: HashSet<SymbolId> = HashSet::new();
    write_node(kc, kc.top_node(), &mut out, &mut written);

    fs::write(path, out).map_err(|e| KconfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_node(kc: &Kconfig, node: crate::ids::NodeId, out: &mut String, written: &mut HashSet<SymbolId>) {
    for child in kc.children(node) {
        match kc.node(child).item {
            Item::Symbol(id) => {
                if written.insert(id) {
                    write_symbol_line(kc, id, out);
                }
            }
            Item::Menu | Item::Comment => {
                if kc.node_visible(child)
                    && let Some((text, _)) = &kc.node(child).prompt {
                        out.push_str(&format!("\n#\n# {text}\n#\n"));
                    }
            }
            Item::Choice(_) | Item::If => {}
        }
        write_node(kc, child, out, written);
    }
}

fn write_symbol_line(kc: &Kconfig, id: SymbolId, out: &mut String) {
    let sym = kc.sym(id);
    let _ = kc.value(id); // force computation so write_to_conf is current
    if !sym.write_to_conf.get() || sym.env_var.borrow().is_some() {
        return;
    }
    let prefix = kc.config_prefix();
    let name = &sym.name;
    match sym.type_.get() {
        SymType::Bool | SymType::Tristate => {
            let v = kc.value(id);
            if v == "n" {
                out.push_str(&format!("# {prefix}{name} is not set\n"));
            } else {
                out.push_str(&format!("{prefix}{name}={v}\n"));
            }
        }
        SymType::Int | SymType::Hex => {
            out.push_str(&format!("{prefix}{name}={}\n", kc.value(id)));
        }
        SymType::String => {
            out.push_str(&format!("{prefix}{name}=\"{}\"\n", escape(&kc.value(id))));
        }
        SymType::Unknown => {}
    }
}

/// §4.10: the first successfully-opened default filename of the symbol
/// marked `option defconfig_list`, with `$NAME` already expanded and
/// `srctree` consulted for relative paths.
pub fn defconfig_filename(kc: &Kconfig) -> Option<String> {
    let id = kc.defconfig_list_sym()?;
    let sym = kc.sym(id);
    for (value_expr, cond) in sym.defaults.borrow().iter() {
        let cond_val = cond.as_ref().map(|c| eval(kc, c)).unwrap_or(Tristate::Y);
        if cond_val == Tristate::N {
            continue;
        }
        let raw = kc.expr_string_value(value_expr);
        let expanded = kc.expand_path_refs(&raw);
        if kc.resolve_existing_path(&expanded).is_some() {
            return Some(expanded);
        }
    }
    None
}
