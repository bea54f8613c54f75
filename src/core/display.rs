//! Display implementation for expressions.
//!
//! Human-readable notation with precedence-aware parentheses:
//! - `2*x + 3*y - 1`
//! - `x^2*sin(x)`, `pow` is always written with `^`
//! - `x[i + 1]`, `r.F`, `(a, b)`
//! - `inv(A)*B'`, `[i,j => i + j; 2x3]`
//! - `sum(_1 = 0..n, _1^2)`
//!
//! # Display Behavior Notes
//! - A sum term with a negative coefficient is written with `-`
//! - The coefficient `-1` is written as a leading `-`
//! - Products and powers are never re-associated for display

use std::fmt;

use super::expr::{Expr, ExprKind};
use super::number::Number;

/// Binding strength of the outermost operator of an expression.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Sum,
    Product,
    Power,
    Atom,
}

fn precedence(e: &Expr) -> Precedence {
    match e.kind() {
        ExprKind::Sum(_) => Precedence::Sum,
        ExprKind::Number(n) if n.is_negative() => Precedence::Product,
        ExprKind::MatrixMultiply(_) => Precedence::Product,
        ExprKind::Apply { .. } if e.is_product() => Precedence::Product,
        ExprKind::Apply { .. } if e.as_power().is_some() => Precedence::Power,
        _ => Precedence::Atom,
    }
}

/// Writes `e`, parenthesized when it binds looser than `min`.
fn write_operand(f: &mut fmt::Formatter<'_>, e: &Expr, min: Precedence) -> fmt::Result {
    if precedence(e) < min {
        write!(f, "({e})")
    } else {
        write!(f, "{e}")
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str) -> fmt::Result {
    for (k, item) in items.iter().enumerate() {
        if k > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Writes a product chain, replacing its coefficient with `coefficient`.
fn write_product(f: &mut fmt::Formatter<'_>, factors: &[Expr], coefficient: Option<Number>) -> fmt::Result {
    let mut first = true;
    match coefficient {
        Some(Number::Int(-1)) => f.write_str("-")?,
        Some(c) if !num_traits::One::is_one(&c) => {
            write!(f, "{c}")?;
            first = false;
        }
        _ => {}
    }
    for factor in factors {
        if !first {
            f.write_str("*")?;
        }
        write_operand(f, factor, Precedence::Power)?;
        first = false;
    }
    Ok(())
}

/// Coefficient and remaining factors of a sum term.
fn split_term(term: &Expr) -> (Option<Number>, Vec<Expr>) {
    if term.is_product() {
        let factors = crate::core::expr::factors(term);
        if let Some((first, rest)) = factors.split_first()
            && let Some(c) = first.as_number()
        {
            return (Some(c), rest.to_vec());
        }
        return (None, factors);
    }
    (None, vec![term.clone()])
}

fn write_sum(f: &mut fmt::Formatter<'_>, terms: &[Expr]) -> fmt::Result {
    for (k, term) in terms.iter().enumerate() {
        if let Some(n) = term.as_number() {
            match (k, n.is_negative()) {
                (0, _) => write!(f, "{n}")?,
                (_, true) => write!(f, " - {}", -n)?,
                (_, false) => write!(f, " + {n}")?,
            }
            continue;
        }
        let (coefficient, factors) = split_term(term);
        match coefficient {
            Some(c) if k > 0 && c.is_negative() => {
                f.write_str(" - ")?;
                write_product(f, &factors, Some(-c))?;
            }
            _ => {
                if k > 0 {
                    f.write_str(" + ")?;
                }
                write_product(f, &factors, coefficient)?;
            }
        }
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Symbol(name) => f.write_str(name),
            ExprKind::Number(n) => write!(f, "{n}"),
            ExprKind::Object(value) => write!(f, "{value}"),
            ExprKind::Field(name) => write!(f, ".{name}"),
            ExprKind::Function(function) => write!(f, "{function}"),
            ExprKind::Tuple(items) => {
                f.write_str("(")?;
                write_list(f, items, ", ")?;
                f.write_str(")")
            }
            ExprKind::Sum(terms) => write_sum(f, terms),
            ExprKind::Apply { .. } if self.is_product() => {
                let (coefficient, factors) = split_term(self);
                write_product(f, &factors, coefficient)
            }
            ExprKind::Apply { .. } if self.as_power().is_some() => {
                let Some((base, exponent)) = self.as_power() else {
                    return Ok(());
                };
                write_operand(f, base, Precedence::Atom)?;
                f.write_str("^")?;
                match exponent.as_number() {
                    Some(n) => write!(f, "{n}"),
                    None => write_operand(f, exponent, Precedence::Atom),
                }
            }
            ExprKind::Apply { target, argument } => match (target.kind(), argument.kind()) {
                (ExprKind::Function(function), ExprKind::Tuple(items)) if function.arity() != 1 => {
                    write!(f, "{function}(")?;
                    write_list(f, items, ", ")?;
                    f.write_str(")")
                }
                (ExprKind::Function(function), _) => write!(f, "{function}({argument})"),
                (_, ExprKind::Field(name)) => {
                    write_operand(f, target, Precedence::Atom)?;
                    write!(f, ".{name}")
                }
                (_, ExprKind::Tuple(items)) => {
                    write_operand(f, target, Precedence::Atom)?;
                    f.write_str("[")?;
                    write_list(f, items, ", ")?;
                    f.write_str("]")
                }
                _ => {
                    write_operand(f, target, Precedence::Atom)?;
                    write!(f, "[{argument}]")
                }
            },
            ExprKind::MatrixGenerator {
                rows,
                cols,
                element,
            } => {
                let (i, j) = (crate::matrix::row_index(), crate::matrix::col_index());
                write!(f, "[{i},{j} => {element}; {rows}x{cols}]")
            }
            ExprKind::MatrixMultiply(factors) => {
                for (k, factor) in factors.iter().enumerate() {
                    if k > 0 {
                        f.write_str("*")?;
                    }
                    write_operand(f, factor, Precedence::Power)?;
                }
                Ok(())
            }
            ExprKind::MatrixInverse(inner) => write!(f, "inv({inner})"),
            ExprKind::MatrixTranspose(inner) => {
                write_operand(f, inner, Precedence::Atom)?;
                f.write_str("'")
            }
            ExprKind::IndexedSum {
                index,
                lower,
                upper,
                body,
            } => write!(f, "sum({index} = {lower}..{upper}, {body})"),
            ExprKind::CollectionSum {
                index,
                collection,
                body,
            } => write!(f, "sum({index} in {collection}, {body})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::host::{HostType, RecordType};
    use crate::{Domain, Expr, matrix};

    #[test]
    fn test_sums_and_products() {
        let x = Expr::symbol("x", Domain::Reals);
        let y = Expr::symbol("y", Domain::Reals);
        assert_eq!((2 * &x + 3 * &y).to_string(), "2*x + 3*y");
        assert_eq!((&x - &y).to_string(), "x - y");
        assert_eq!((&x - 2 * &y + 1).to_string(), "1 + x - 2*y");
        assert_eq!((-&x).to_string(), "-x");
    }

    #[test]
    fn test_powers_and_calls() {
        let x = Expr::symbol("x", Domain::Reals);
        let y = Expr::symbol("y", Domain::Reals);
        assert_eq!((&x * &x).to_string(), "x^2");
        assert_eq!((&x + &y).powi(2).to_string(), "(x + y)^2");
        assert_eq!((2 * &x).sin().to_string(), "sin(2*x)");
        assert_eq!((&x / &y).to_string(), "x*y^-1");
    }

    #[test]
    fn test_access_and_matrices() {
        let record = RecordType::new("Pair")
            .field("F", HostType::Integer)
            .into_type();
        let r = Expr::symbol("r", Domain::of(&record));
        assert_eq!(r.member("F").unwrap().to_string(), "r.F");

        let a = Expr::symbol("A", Domain::Matrices);
        let b = Expr::symbol("B", Domain::Matrices);
        let p = matrix::multiply(vec![matrix::inverse(a).unwrap(), matrix::transpose(b).unwrap()]);
        assert_eq!(p.unwrap().to_string(), "inv(A)*B'");
    }
}
