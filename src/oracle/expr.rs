use std::fmt::{self, Display};

use crate::common::Name;

const SIMPLIFY_ROUNDS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,
    Sign,
    Sinh,
    Cosh,
    Tanh,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "exp" => Func::Exp,
            "ln" | "log" => Func::Ln,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "sign" => Func::Sign,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Sign => "sign",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
            Func::Sign => {
                if x == 0.0 {
                    0.0
                } else {
                    x.signum()
                }
            }
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
        }
    }

    /// The outer derivative `f'(arg)`, or `None` where `f` has none.
    fn derivative_at(self, arg: &Expr) -> Option<Expr> {
        let a = || Box::new(arg.clone());
        Some(match self {
            Func::Sin => Expr::Call(Func::Cos, a()),
            Func::Cos => Expr::Neg(Box::new(Expr::Call(Func::Sin, a()))),
            Func::Tan => Expr::Div(
                Box::new(Expr::Num(1.0)),
                Box::new(Expr::Pow(
                    Box::new(Expr::Call(Func::Cos, a())),
                    Box::new(Expr::Num(2.0)),
                )),
            ),
            Func::Exp => Expr::Call(Func::Exp, a()),
            Func::Ln => Expr::Div(Box::new(Expr::Num(1.0)), a()),
            Func::Sqrt => Expr::Div(
                Box::new(Expr::Num(1.0)),
                Box::new(Expr::Mul(
                    Box::new(Expr::Num(2.0)),
                    Box::new(Expr::Call(Func::Sqrt, a())),
                )),
            ),
            Func::Abs => Expr::Call(Func::Sign, a()),
            Func::Sign => return None,
            Func::Sinh => Expr::Call(Func::Cosh, a()),
            Func::Cosh => Expr::Call(Func::Sinh, a()),
            Func::Tanh => Expr::Div(
                Box::new(Expr::Num(1.0)),
                Box::new(Expr::Pow(
                    Box::new(Expr::Call(Func::Cosh, a())),
                    Box::new(Expr::Num(2.0)),
                )),
            ),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(Name),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn mentions(&self, var: &Name) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Var(x) => x == var,
            Expr::Neg(a) | Expr::Call(_, a) => a.mentions(var),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => a.mentions(var) || b.mentions(var),
        }
    }

    /// Every constant is finite.
    pub fn is_defined(&self) -> bool {
        match self {
            Expr::Num(n) => n.is_finite(),
            Expr::Var(_) => true,
            Expr::Neg(a) | Expr::Call(_, a) => a.is_defined(),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => a.is_defined() && b.is_defined(),
        }
    }

    pub fn substitute(&self, var: &Name, replacement: &Expr) -> Expr {
        let go = |e: &Expr| Box::new(e.substitute(var, replacement));
        match self {
            Expr::Num(_) => self.clone(),
            Expr::Var(x) if x == var => replacement.clone(),
            Expr::Var(_) => self.clone(),
            Expr::Neg(a) => Expr::Neg(go(a)),
            Expr::Add(a, b) => Expr::Add(go(a), go(b)),
            Expr::Sub(a, b) => Expr::Sub(go(a), go(b)),
            Expr::Mul(a, b) => Expr::Mul(go(a), go(b)),
            Expr::Div(a, b) => Expr::Div(go(a), go(b)),
            Expr::Pow(a, b) => Expr::Pow(go(a), go(b)),
            Expr::Call(f, a) => Expr::Call(*f, go(a)),
        }
    }

    /// Symbolic derivative in `var`, unsimplified. `None` if some
    /// sub-expression has no derivative.
    pub fn derivative(&self, var: &Name) -> Option<Expr> {
        if !self.mentions(var) {
            return Some(Expr::Num(0.0));
        }
        let b = Box::new;
        Some(match self {
            Expr::Num(_) => Expr::Num(0.0),
            Expr::Var(_) => Expr::Num(1.0),
            Expr::Neg(a) => Expr::Neg(b(a.derivative(var)?)),
            Expr::Add(l, r) => Expr::Add(b(l.derivative(var)?), b(r.derivative(var)?)),
            Expr::Sub(l, r) => Expr::Sub(b(l.derivative(var)?), b(r.derivative(var)?)),
            Expr::Mul(l, r) => Expr::Add(
                b(Expr::Mul(b(l.derivative(var)?), r.clone())),
                b(Expr::Mul(l.clone(), b(r.derivative(var)?))),
            ),
            Expr::Div(l, r) => Expr::Div(
                b(Expr::Sub(
                    b(Expr::Mul(b(l.derivative(var)?), r.clone())),
                    b(Expr::Mul(l.clone(), b(r.derivative(var)?))),
                )),
                b(Expr::Pow(r.clone(), b(Expr::Num(2.0)))),
            ),
            Expr::Pow(base, exp) if !exp.mentions(var) => Expr::Mul(
                b(Expr::Mul(
                    exp.clone(),
                    b(Expr::Pow(
                        base.clone(),
                        b(Expr::Sub(exp.clone(), b(Expr::Num(1.0)))),
                    )),
                )),
                b(base.derivative(var)?),
            ),
            Expr::Pow(base, exp) if !base.mentions(var) => Expr::Mul(
                b(Expr::Mul(
                    b(self.clone()),
                    b(Expr::Call(Func::Ln, base.clone())),
                )),
                b(exp.derivative(var)?),
            ),
            // d(u^v) = u^v (v' ln u + v u' / u)
            Expr::Pow(base, exp) => Expr::Mul(
                b(self.clone()),
                b(Expr::Add(
                    b(Expr::Mul(
                        b(exp.derivative(var)?),
                        b(Expr::Call(Func::Ln, base.clone())),
                    )),
                    b(Expr::Div(
                        b(Expr::Mul(exp.clone(), b(base.derivative(var)?))),
                        base.clone(),
                    )),
                )),
            ),
            Expr::Call(f, a) => Expr::Mul(b(f.derivative_at(a)?), b(a.derivative(var)?)),
        })
    }

    /// Constant folding and neutral elements, repeated until nothing changes.
    pub fn simplify(&self) -> Expr {
        let mut current = self.simplify_step();
        for _ in 0..SIMPLIFY_ROUNDS {
            let next = current.simplify_step();
            // NaN never compares equal, so undefined results stop here too.
            if next == current || !next.is_defined() {
                return next;
            }
            current = next;
        }
        current
    }

    fn simplify_step(&self) -> Expr {
        use Expr::{Add, Call, Div, Mul, Neg, Num, Pow, Sub};

        match self {
            Num(_) | Expr::Var(_) => self.clone(),
            Neg(a) => negate(a.simplify_step()),
            Add(a, b) => match (a.simplify_step(), b.simplify_step()) {
                (Num(x), Num(y)) => Num(x + y),
                (Num(z), e) | (e, Num(z)) if z == 0.0 => e,
                (e, Neg(f)) => Sub(Box::new(e), f),
                (a, b) => Add(Box::new(a), Box::new(b)),
            },
            Sub(a, b) => match (a.simplify_step(), b.simplify_step()) {
                (Num(x), Num(y)) => Num(x - y),
                (e, Num(z)) if z == 0.0 => e,
                (Num(z), e) if z == 0.0 => negate(e),
                (a, b) if a == b => Num(0.0),
                (a, b) => Sub(Box::new(a), Box::new(b)),
            },
            Mul(a, b) => match (a.simplify_step(), b.simplify_step()) {
                (Num(x), Num(y)) => Num(x * y),
                (Num(z), _) | (_, Num(z)) if z == 0.0 => Num(0.0),
                (Num(o), e) | (e, Num(o)) if o == 1.0 => e,
                (Num(m), e) | (e, Num(m)) if m == -1.0 => negate(e),
                (Num(x), Mul(c, e)) if matches!(*c, Num(_)) => match *c {
                    Num(y) => Mul(Box::new(Num(x * y)), e),
                    c => Mul(Box::new(Num(x)), Box::new(Mul(Box::new(c), e))),
                },
                (e, Num(n)) => Mul(Box::new(Num(n)), Box::new(e)),
                (a, b) => Mul(Box::new(a), Box::new(b)),
            },
            Div(a, b) => match (a.simplify_step(), b.simplify_step()) {
                (Num(x), Num(y)) => Num(x / y),
                (e, Num(o)) if o == 1.0 => e,
                (Num(z), _) if z == 0.0 => Num(0.0),
                (a, b) => Div(Box::new(a), Box::new(b)),
            },
            Pow(a, b) => match (a.simplify_step(), b.simplify_step()) {
                (Num(x), Num(y)) => Num(x.powf(y)),
                (e, Num(o)) if o == 1.0 => e,
                (_, Num(z)) if z == 0.0 => Num(1.0),
                (Num(o), _) if o == 1.0 => Num(1.0),
                (a, b) => Pow(Box::new(a), Box::new(b)),
            },
            Call(f, a) => match a.simplify_step() {
                Num(x) => Num(f.apply(x)),
                a => Call(*f, Box::new(a)),
            },
        }
    }

    /// Numeric value with `var` set to `at`. Any other free variable, or a
    /// non-finite result, gives `None`.
    pub fn eval(&self, var: &Name, at: f64) -> Option<f64> {
        let value = match self {
            Expr::Num(n) => *n,
            Expr::Var(x) if x == var => at,
            Expr::Var(_) => return None,
            Expr::Neg(a) => -a.eval(var, at)?,
            Expr::Add(a, b) => a.eval(var, at)? + b.eval(var, at)?,
            Expr::Sub(a, b) => a.eval(var, at)? - b.eval(var, at)?,
            Expr::Mul(a, b) => a.eval(var, at)? * b.eval(var, at)?,
            Expr::Div(a, b) => a.eval(var, at)? / b.eval(var, at)?,
            Expr::Pow(a, b) => a.eval(var, at)?.powf(b.eval(var, at)?),
            Expr::Call(f, a) => f.apply(a.eval(var, at)?),
        };
        value.is_finite().then_some(value)
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(_, _) | Expr::Sub(_, _) => 1,
            Expr::Mul(_, _) | Expr::Div(_, _) => 2,
            Expr::Neg(_) => 3,
            Expr::Num(n) if *n < 0.0 => 3,
            Expr::Pow(_, _) => 4,
            Expr::Num(_) | Expr::Var(_) | Expr::Call(_, _) => 5,
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "(")?;
            self.fmt_at(f, 0)?;
            return write!(f, ")");
        }
        match self {
            Expr::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Expr::Num(n) => write!(f, "{n}"),
            Expr::Var(x) => write!(f, "{x}"),
            Expr::Neg(a) => {
                write!(f, "-")?;
                a.fmt_at(f, 3)
            }
            Expr::Add(a, b) => {
                a.fmt_at(f, 1)?;
                write!(f, " + ")?;
                b.fmt_at(f, 2)
            }
            Expr::Sub(a, b) => {
                a.fmt_at(f, 1)?;
                write!(f, " - ")?;
                b.fmt_at(f, 2)
            }
            Expr::Mul(a, b) => {
                a.fmt_at(f, 2)?;
                write!(f, "*")?;
                b.fmt_at(f, 3)
            }
            Expr::Div(a, b) => {
                a.fmt_at(f, 2)?;
                write!(f, "/")?;
                b.fmt_at(f, 3)
            }
            Expr::Pow(a, b) => {
                a.fmt_at(f, 5)?;
                write!(f, "**")?;
                b.fmt_at(f, 3)
            }
            Expr::Call(func, a) => {
                write!(f, "{}(", func.name())?;
                a.fmt_at(f, 0)?;
                write!(f, ")")
            }
        }
    }
}

fn negate(e: Expr) -> Expr {
    match e {
        Expr::Num(n) => Expr::Num(-n),
        Expr::Neg(inner) => *inner,
        e => Expr::Neg(Box::new(e)),
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Name {
        Name::from("x")
    }

    fn var() -> Expr {
        Expr::Var(x())
    }

    fn nth(e: &Expr, n: usize) -> Option<Expr> {
        let mut e = e.simplify();
        for _ in 0..n {
            e = e.derivative(&x())?.simplify();
        }
        Some(e)
    }

    #[test]
    fn sine_cycles_through_four_derivatives() {
        let sin = Expr::Call(Func::Sin, Box::new(var()));
        assert_eq!(nth(&sin, 1).unwrap().to_string(), "cos(x)");
        assert_eq!(nth(&sin, 2).unwrap().to_string(), "-sin(x)");
        assert_eq!(nth(&sin, 3).unwrap().to_string(), "-cos(x)");
        assert_eq!(nth(&sin, 4).unwrap(), sin);
    }

    #[test]
    fn polynomial_derivatives_vanish() {
        let square = Expr::Pow(Box::new(var()), Box::new(Expr::Num(2.0)));
        assert_eq!(nth(&square, 1).unwrap().to_string(), "2*x");
        assert_eq!(nth(&square, 2).unwrap(), Expr::Num(2.0));
        assert_eq!(nth(&square, 3).unwrap(), Expr::Num(0.0));
    }

    #[test]
    fn abs_has_one_derivative_only() {
        let abs = Expr::Call(Func::Abs, Box::new(var()));
        assert_eq!(nth(&abs, 1).unwrap().to_string(), "sign(x)");
        assert_eq!(nth(&abs, 2), None);
    }

    #[test]
    fn sign_of_a_constant_is_differentiable() {
        let e = Expr::Mul(
            Box::new(Expr::Call(Func::Sign, Box::new(Expr::Num(3.0)))),
            Box::new(var()),
        );
        assert_eq!(nth(&e, 1).unwrap(), Expr::Num(1.0));
    }

    #[test]
    fn constant_folding_flags_division_by_zero() {
        let e = Expr::Div(Box::new(Expr::Num(1.0)), Box::new(Expr::Num(0.0)));
        assert!(!e.simplify().is_defined());
    }

    #[test]
    fn printing_parenthesises_by_precedence() {
        let e = Expr::Mul(
            Box::new(Expr::Add(Box::new(var()), Box::new(Expr::Num(1.0)))),
            Box::new(Expr::Pow(Box::new(Expr::Num(-2.0)), Box::new(var()))),
        );
        assert_eq!(e.to_string(), "(x + 1)*(-2)**x");
    }

    #[test]
    fn evaluation_rejects_other_variables() {
        let e = Expr::Add(Box::new(var()), Box::new(Expr::Var(Name::from("y"))));
        assert_eq!(e.eval(&x(), 1.0), None);
        assert_eq!(var().eval(&x(), 0.25), Some(0.25));
    }
}
