use std::{collections::BTreeSet, fmt::Display};

use pretty::RcDoc;

use crate::{
    common::{Name, ToDoc},
    typecheck::CheckError,
};

/// A point of the unit interval. Only [`Point::new`] can build one, so the
/// value always lies in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Point(f64);

impl Point {
    pub const ZERO: Point = Point(0.0);
    pub const ONE: Point = Point(1.0);

    pub fn new(value: f64) -> Result<Point, CheckError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Point(value))
        } else {
            Err(CheckError::IntervalOutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn approx_eq(self, other: Point) -> bool {
        (self.0 - other.0).abs() < 1e-10
    }

    /// `i ∧ j`.
    pub fn meet(self, other: Point) -> Point {
        Point(self.0.min(other.0))
    }

    /// `i ∨ j`.
    pub fn join(self, other: Point) -> Point {
        Point(self.0.max(other.0))
    }

    /// `1 - i`, the reversal of the interval.
    pub fn neg(self) -> Point {
        Point(1.0 - self.0)
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An opaque real function of one variable, in the oracle's expression
/// language.
#[derive(Clone, Debug, PartialEq)]
pub struct SmoothFn {
    pub expr: String,
    pub var: Name,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Universe(u32),
    Smooth(Box<Type>),
    Path(Box<Type>, Box<Term>, Box<Term>),
    Function {
        domain: Box<Type>,
        codomain: Box<Type>,
        is_smooth: bool,
    },
    Product(Box<Type>, Box<Type>),
    Interval,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Variable(Name),
    Lambda {
        param: Name,
        param_type: Box<Type>,
        body: Box<Term>,
        is_smooth: bool,
    },
    Application(Box<Term>, Box<Term>),
    PathLambda(Name, Box<Term>),
    PathApp(Box<Term>, Box<Term>),
    SmoothFunction(SmoothFn),
    IntervalLiteral(Point),
}

impl Type {
    pub fn universe(level: u32) -> Type {
        Type::Universe(level)
    }

    /// `C∞ Type0`, the type of smooth reals.
    pub fn reals() -> Type {
        Type::smooth(Type::Universe(0))
    }

    pub fn smooth(base: Type) -> Type {
        Type::Smooth(Box::new(base))
    }

    pub fn path(space: Type, start: Term, end: Term) -> Type {
        Type::Path(Box::new(space), Box::new(start), Box::new(end))
    }

    pub fn function(domain: Type, codomain: Type) -> Type {
        Type::Function {
            domain: Box::new(domain),
            codomain: Box::new(codomain),
            is_smooth: false,
        }
    }

    pub fn smooth_function(domain: Type, codomain: Type) -> Type {
        Type::Function {
            domain: Box::new(domain),
            codomain: Box::new(codomain),
            is_smooth: true,
        }
    }

    pub fn product(left: Type, right: Type) -> Type {
        Type::Product(Box::new(left), Box::new(right))
    }

    pub fn interval() -> Type {
        Type::Interval
    }

    /// Types whose inhabitants are real numbers: the smooth reals and the
    /// interval.
    pub fn is_real(&self) -> bool {
        match self {
            Type::Smooth(base) => matches!(**base, Type::Universe(0)),
            Type::Interval => true,
            _ => false,
        }
    }

    /// Domain, codomain and smoothness of a function type, looking through
    /// one smooth modality.
    pub fn as_function(&self) -> Option<(&Type, &Type, bool)> {
        match self {
            Type::Function {
                domain,
                codomain,
                is_smooth,
            } => Some((domain, codomain, *is_smooth)),
            Type::Smooth(base) => match &**base {
                Type::Function {
                    domain,
                    codomain,
                    is_smooth,
                } => Some((domain, codomain, *is_smooth)),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_atomic(&self) -> bool {
        matches!(self, Type::Universe(_) | Type::Interval)
    }
}

impl Term {
    pub fn var(name: impl Into<Name>) -> Term {
        Term::Variable(name.into())
    }

    pub fn lambda(param: impl Into<Name>, param_type: Type, body: Term) -> Term {
        Term::Lambda {
            param: param.into(),
            param_type: Box::new(param_type),
            body: Box::new(body),
            is_smooth: false,
        }
    }

    pub fn smooth_lambda(param: impl Into<Name>, param_type: Type, body: Term) -> Term {
        Term::Lambda {
            param: param.into(),
            param_type: Box::new(param_type),
            body: Box::new(body),
            is_smooth: true,
        }
    }

    pub fn app(func: Term, arg: Term) -> Term {
        Term::Application(Box::new(func), Box::new(arg))
    }

    pub fn path_lambda(param: impl Into<Name>, body: Term) -> Term {
        Term::PathLambda(param.into(), Box::new(body))
    }

    pub fn path_app(path: Term, point: Term) -> Term {
        Term::PathApp(Box::new(path), Box::new(point))
    }

    pub fn smooth(expr: impl Into<String>, var: impl Into<Name>) -> Term {
        Term::SmoothFunction(SmoothFn {
            expr: expr.into(),
            var: var.into(),
        })
    }

    /// Fails with [`CheckError::IntervalOutOfRange`] unless `0 <= value <= 1`.
    pub fn interval(value: f64) -> Result<Term, CheckError> {
        Point::new(value).map(Term::IntervalLiteral)
    }

    pub fn point(p: Point) -> Term {
        Term::IntervalLiteral(p)
    }

    /// The parts of `(λx:T. b) a`: `x`, `T`, `b` and `a`.
    pub fn as_redex(&self) -> Option<(&Name, &Type, &Term, &Term)> {
        match self {
            Term::Application(f, arg) => match &**f {
                Term::Lambda {
                    param,
                    param_type,
                    body,
                    ..
                } => Some((param, param_type, body, arg)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Free variables. The variable of a smooth leaf counts as free.
    pub fn free_vars(&self) -> BTreeSet<Name> {
        let mut vars = BTreeSet::new();
        self.collect_free(&mut vars);
        vars
    }

    fn collect_free(&self, vars: &mut BTreeSet<Name>) {
        match self {
            Term::Variable(x) => {
                vars.insert(x.clone());
            }
            Term::Lambda {
                param,
                param_type,
                body,
                ..
            } => {
                param_type.collect_free(vars);
                let mut inner = body.free_vars();
                inner.remove(param);
                vars.extend(inner);
            }
            Term::PathLambda(param, body) => {
                let mut inner = body.free_vars();
                inner.remove(param);
                vars.extend(inner);
            }
            Term::Application(f, a) | Term::PathApp(f, a) => {
                f.collect_free(vars);
                a.collect_free(vars);
            }
            Term::SmoothFunction(leaf) => {
                vars.insert(leaf.var.clone());
            }
            Term::IntervalLiteral(_) => {}
        }
    }

    fn is_atomic(&self) -> bool {
        matches!(
            self,
            Term::Variable(_) | Term::SmoothFunction(_) | Term::IntervalLiteral(_)
        )
    }
}

impl Type {
    fn collect_free(&self, vars: &mut BTreeSet<Name>) {
        match self {
            Type::Universe(_) | Type::Interval => {}
            Type::Smooth(base) => base.collect_free(vars),
            Type::Path(space, start, end) => {
                space.collect_free(vars);
                start.collect_free(vars);
                end.collect_free(vars);
            }
            Type::Function {
                domain, codomain, ..
            } => {
                domain.collect_free(vars);
                codomain.collect_free(vars);
            }
            Type::Product(l, r) => {
                l.collect_free(vars);
                r.collect_free(vars);
            }
        }
    }
}

fn parens(doc: RcDoc<'_>) -> RcDoc<'_> {
    RcDoc::text("(").append(doc).append(")")
}

impl Type {
    fn to_doc_atom(&self) -> RcDoc<'_> {
        if self.is_atomic() {
            self.to_doc()
        } else {
            parens(self.to_doc())
        }
    }
}

impl Term {
    fn to_doc_atom(&self) -> RcDoc<'_> {
        if self.is_atomic() {
            self.to_doc()
        } else {
            parens(self.to_doc())
        }
    }
}

impl ToDoc for Type {
    fn to_doc(&self) -> RcDoc<'_> {
        match self {
            Type::Universe(l) => RcDoc::text(format!("Type{l}")),
            Type::Smooth(base) => RcDoc::text("C∞ ").append(base.to_doc_atom()),
            Type::Path(space, start, end) => RcDoc::group(
                RcDoc::text("Path")
                    .append(RcDoc::line().append(space.to_doc_atom()))
                    .append(RcDoc::line().append(start.to_doc_atom()))
                    .append(RcDoc::line().append(end.to_doc_atom()))
                    .nest(2),
            ),
            Type::Function {
                domain,
                codomain,
                is_smooth,
            } => {
                let dom = match **domain {
                    Type::Function { .. } => parens(domain.to_doc()),
                    _ => domain.to_doc(),
                };
                let arrow = if *is_smooth { "→∞" } else { "→" };
                RcDoc::group(
                    dom.append(RcDoc::line())
                        .append(arrow)
                        .append(RcDoc::line())
                        .append(codomain.to_doc()),
                )
            }
            Type::Product(l, r) => RcDoc::group(
                l.to_doc_atom()
                    .append(RcDoc::line())
                    .append("×")
                    .append(RcDoc::line())
                    .append(r.to_doc_atom()),
            ),
            Type::Interval => RcDoc::text("I"),
        }
    }
}

impl ToDoc for Term {
    fn to_doc(&self) -> RcDoc<'_> {
        match self {
            Term::Variable(x) => x.to_doc(),
            Term::Lambda {
                param,
                param_type,
                body,
                is_smooth,
            } => RcDoc::group(
                RcDoc::text(if *is_smooth { "λ∞(" } else { "λ(" })
                    .append(param.to_doc())
                    .append(" : ")
                    .append(param_type.to_doc())
                    .append(").")
                    .append(RcDoc::line().append(body.to_doc()).nest(2)),
            ),
            Term::Application(f, a) => {
                let func = match **f {
                    Term::Application(_, _) => f.to_doc(),
                    _ => f.to_doc_atom(),
                };
                RcDoc::group(func.append(RcDoc::line().append(a.to_doc_atom()).nest(2)))
            }
            Term::PathLambda(param, body) => RcDoc::group(
                RcDoc::text("⟨")
                    .append(param.to_doc())
                    .append("⟩")
                    .append(RcDoc::line().append(body.to_doc()).nest(2)),
            ),
            Term::PathApp(p, r) => RcDoc::group(
                p.to_doc_atom()
                    .append(RcDoc::line())
                    .append("@ ")
                    .append(r.to_doc_atom()),
            ),
            Term::SmoothFunction(leaf) => {
                RcDoc::text(format!("smooth({} ↦ {})", leaf.var, leaf.expr))
            }
            Term::IntervalLiteral(p) => RcDoc::text(p.to_string()),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_doc().render_fmt(usize::MAX, f)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_doc().render_fmt(usize::MAX, f)
    }
}
