//! §4.5: the tristate/relational expression evaluator.

use crate::expr::Expr;
use crate::symbol::SymType;
use crate::tristate::Tristate;
use crate::Kconfig;

/// Evaluate `expr` against the current symbol values in `kconfig`.
pub fn eval(kconfig: &Kconfig, expr: &Expr) -> Tristate {
    match expr {
        Expr::Symbol(id) => kconfig.tri_value(*id),
        Expr::Const(s) => Tristate::from_str_opt(s).unwrap_or(Tristate::N),
        Expr::Not(e) => eval(kconfig, e).not(),
        Expr::And(a, b) => {
            let av = eval(kconfig, a);
            if av == Tristate::N {
                return Tristate::N;
            }
            av.min(eval(kconfig, b))
        }
        Expr::Or(a, b) => {
            let av = eval(kconfig, a);
            if av == Tristate::Y {
                return Tristate::Y;
            }
            av.max(eval(kconfig, b))
        }
        Expr::Eq(a, b) => eval_relational(kconfig, a, b, Rel::Eq),
        Expr::NotEq(a, b) => eval_relational(kconfig, a, b, Rel::NotEq),
        Expr::Less(a, b) => eval_relational(kconfig, a, b, Rel::Less),
        Expr::LessEq(a, b) => eval_relational(kconfig, a, b, Rel::LessEq),
        Expr::Greater(a, b) => eval_relational(kconfig, a, b, Rel::Greater),
        Expr::GreaterEq(a, b) => eval_relational(kconfig, a, b, Rel::GreaterEq),
    }
}

/// Evaluate `expr` and return `true` unless it resolves to `n` — the
/// `cond ≠ "n"` test used throughout the value engine.
pub fn is_satisfied(kconfig: &Kconfig, expr: &Expr) -> bool {
    eval(kconfig, expr) != Tristate::N
}

enum Rel {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

struct Operand {
    base: Option<u32>,
    text: String,
}

fn operand(kconfig: &Kconfig, expr: &Expr) -> Operand {
    match expr {
        Expr::Symbol(id) => {
            let base = match kconfig.sym(*id).type_.get() {
                SymType::Hex => Some(16),
                SymType::Int => Some(10),
                _ => None,
            };
            Operand {
                base,
                text: kconfig.value(*id),
            }
        }
        Expr::Const(s) => Operand { base: None, text: s.clone() },
        _ => Operand {
            base: None,
            text: eval(kconfig, expr).as_str().to_string(),
        },
    }
}

fn parse_with_base(text: &str, base: Option<u32>) -> Option<i64> {
    let t = text.trim();
    let (neg, rest) = t.strip_prefix('-').map(|r| (true, r)).unwrap_or((false, t));
    let (radix, digits) = if let Some(r) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (16, r)
    } else {
        (base.unwrap_or(10), rest)
    };
    if digits.is_empty() {
        return None;
    }
    let n = i64::from_str_radix(digits, radix).ok()?;
    Some(if neg { -n } else { n })
}

fn eval_relational(kconfig: &Kconfig, lhs: &Expr, rhs: &Expr, rel: Rel) -> Tristate {
    let l = operand(kconfig, lhs);
    let r = operand(kconfig, rhs);

    // Both symbolic operands come from an untyped (string-like) source:
    // compare lexicographically.
    if l.base.is_none() && r.base.is_none() {
        return string_cmp(&l.text, &r.text, rel);
    }

    let base = l.base.or(r.base);
    match (parse_with_base(&l.text, base), parse_with_base(&r.text, base)) {
        (Some(a), Some(b)) => numeric_cmp(a, b, rel),
        _ => match rel {
            Rel::Eq | Rel::NotEq => string_cmp(&l.text, &r.text, rel),
            _ => Tristate::N,
        },
    }
}

fn string_cmp(a: &str, b: &str, rel: Rel) -> Tristate {
    let ord = a.cmp(b);
    bool_to_tri(match rel {
        Rel::Eq => ord.is_eq(),
        Rel::NotEq => ord.is_ne(),
        Rel::Less => ord.is_lt(),
        Rel::LessEq => ord.is_le(),
        Rel::Greater => ord.is_gt(),
        Rel::GreaterEq => ord.is_ge(),
    })
}

fn numeric_cmp(a: i64, b: i64, rel: Rel) -> Tristate {
    bool_to_tri(match rel {
        Rel::Eq => a == b,
        Rel::NotEq => a != b,
        Rel::Less => a < b,
        Rel::LessEq => a <= b,
        Rel::Greater => a > b,
        Rel::GreaterEq => a >= b,
    })
}

fn bool_to_tri(b: bool) -> Tristate {
    if b {
        Tristate::Y
    } else {
        Tristate::N
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kconfig;

    #[test]
    fn and_or_not_short_circuit_and_order() {
        let kc = Kconfig::from_str("config A\n\tbool\n\tdefault y\n", "Kconfig").unwrap();
        let a = kc.lookup("A").unwrap();
        let expr = Expr::Not(Box::new(Expr::Symbol(a)));
        assert_eq!(eval(&kc, &expr), Tristate::N);
    }

    #[test]
    fn relational_numeric_compare() {
        let kc = Kconfig::from_str(
            "config N\n\tint\n\tdefault 5\n",
            "Kconfig",
        )
        .unwrap();
        let n = kc.lookup("N").unwrap();
        let expr = Expr::Less(
            Box::new(Expr::Symbol(n)),
            Box::new(Expr::Const("10".to_string())),
        );
        assert_eq!(eval(&kc, &expr), Tristate::Y);
    }
}
