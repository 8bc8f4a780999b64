use std::collections::BTreeSet;

use either::Either;

use crate::{
    common::Name,
    eval::{instantiate_at, rename_leaf, Normalizer},
    oracle::DerivativeOracle,
    syntax::{SmoothFn, Term, Type},
    typecheck::CheckError,
    value::Env,
};

impl Normalizer {
    pub fn normalize(&self, term: &Term) -> Result<Term, CheckError> {
        self.normalize_in(term, &Env::new())
    }

    pub fn normalize_in(&self, term: &Term, env: &Env) -> Result<Term, CheckError> {
        let mut machine = self.machine();
        let value = machine.eval(term, env)?;
        machine.readback(&value)
    }

    /// Definitional equality: alpha-equivalence of normal forms.
    pub fn equal_terms(&self, a: &Term, b: &Term) -> Result<bool, CheckError> {
        Ok(self.alpha_eq(&self.normalize(a)?, &self.normalize(b)?))
    }

    /// Equality up to renaming of bound variables. Interval points are
    /// compared with a tolerance and smooth leaves through the oracle's
    /// canonical form.
    pub fn alpha_eq(&self, a: &Term, b: &Term) -> bool {
        Alpha {
            oracle: self.oracle(),
            left: vec![],
            right: vec![],
        }
        .terms(a, b)
    }

    /// Capture-avoiding `term[var := replacement]`. A leaf over `var` is
    /// renamed when the replacement is a variable and evaluated when it is a
    /// point.
    pub fn substitute(&self, term: &Term, var: &Name, replacement: &Term) -> Term {
        let free = replacement.free_vars();
        self.subst(term, var, replacement, &free)
    }

    fn subst(&self, term: &Term, var: &Name, rep: &Term, free: &BTreeSet<Name>) -> Term {
        match term {
            Term::Variable(x) if x == var => rep.clone(),
            Term::Variable(_) | Term::IntervalLiteral(_) => term.clone(),
            Term::Application(f, a) => Term::app(
                self.subst(f, var, rep, free),
                self.subst(a, var, rep, free),
            ),
            Term::PathApp(p, i) => Term::path_app(
                self.subst(p, var, rep, free),
                self.subst(i, var, rep, free),
            ),
            Term::Lambda {
                param,
                param_type,
                body,
                is_smooth,
            } => {
                let param_type = Box::new(self.subst_type(param_type, var, rep, free));
                let (param, body) = self.under_binder(param, body, var, rep, free);
                Term::Lambda {
                    param,
                    param_type,
                    body: Box::new(body),
                    is_smooth: *is_smooth,
                }
            }
            Term::PathLambda(param, body) => {
                let (param, body) = self.under_binder(param, body, var, rep, free);
                Term::PathLambda(param, Box::new(body))
            }
            Term::SmoothFunction(leaf) if &leaf.var == var => self
                .subst_leaf(leaf, rep),
            Term::SmoothFunction(_) => term.clone(),
        }
    }

    fn under_binder(
        &self,
        param: &Name,
        body: &Term,
        var: &Name,
        rep: &Term,
        free: &BTreeSet<Name>,
    ) -> (Name, Term) {
        if param == var {
            return (param.clone(), body.clone());
        }
        if free.contains(param) {
            let fresh = self.supply.fresh(param);
            let renamed = self.subst(
                body,
                param,
                &Term::Variable(fresh.clone()),
                &BTreeSet::from([fresh.clone()]),
            );
            let body = self.subst(&renamed, var, rep, free);
            (fresh, body)
        } else {
            (param.clone(), self.subst(body, var, rep, free))
        }
    }

    /// Pushes a variable or point into a leaf. Any other replacement, or one
    /// the oracle refuses, leaves the leaf applied to it.
    fn subst_leaf(&self, leaf: &SmoothFn, rep: &Term) -> Term {
        let oracle = self.oracle();
        let pushed = match rep {
            Term::Variable(y) => rename_leaf(oracle, leaf, y).ok().map(Term::SmoothFunction),
            Term::IntervalLiteral(p) => instantiate_at(oracle, leaf, *p).ok().map(|r| match r {
                Either::Left(q) => Term::IntervalLiteral(q),
                Either::Right(constant) => Term::SmoothFunction(constant),
            }),
            _ => None,
        };
        pushed.unwrap_or_else(|| Term::app(Term::SmoothFunction(leaf.clone()), rep.clone()))
    }

    fn subst_type(&self, ty: &Type, var: &Name, rep: &Term, free: &BTreeSet<Name>) -> Type {
        match ty {
            Type::Universe(_) | Type::Interval => ty.clone(),
            Type::Smooth(base) => Type::smooth(self.subst_type(base, var, rep, free)),
            Type::Path(space, start, end) => Type::path(
                self.subst_type(space, var, rep, free),
                self.subst(start, var, rep, free),
                self.subst(end, var, rep, free),
            ),
            Type::Function {
                domain,
                codomain,
                is_smooth,
            } => Type::Function {
                domain: Box::new(self.subst_type(domain, var, rep, free)),
                codomain: Box::new(self.subst_type(codomain, var, rep, free)),
                is_smooth: *is_smooth,
            },
            Type::Product(l, r) => Type::product(
                self.subst_type(l, var, rep, free),
                self.subst_type(r, var, rep, free),
            ),
        }
    }
}

struct Alpha<'o> {
    oracle: &'o dyn DerivativeOracle,
    left: Vec<Name>,
    right: Vec<Name>,
}

fn depth(binders: &[Name], x: &Name) -> Option<usize> {
    binders.iter().rposition(|y| y == x)
}

impl Alpha<'_> {
    fn under<R>(&mut self, l: &Name, r: &Name, f: impl FnOnce(&mut Self) -> R) -> R {
        self.left.push(l.clone());
        self.right.push(r.clone());
        let result = f(self);
        self.left.pop();
        self.right.pop();
        result
    }

    fn terms(&mut self, a: &Term, b: &Term) -> bool {
        match (a, b) {
            (Term::Variable(x), Term::Variable(y)) => {
                match (depth(&self.left, x), depth(&self.right, y)) {
                    (Some(i), Some(j)) => i == j,
                    (None, None) => x == y,
                    _ => false,
                }
            }
            (
                Term::Lambda {
                    param: p,
                    param_type: s,
                    body: m,
                    is_smooth: smooth_l,
                },
                Term::Lambda {
                    param: q,
                    param_type: t,
                    body: n,
                    is_smooth: smooth_r,
                },
            ) => smooth_l == smooth_r && self.types(s, t) && self.under(p, q, |a| a.terms(m, n)),
            (Term::PathLambda(p, m), Term::PathLambda(q, n)) => {
                self.under(p, q, |a| a.terms(m, n))
            }
            (Term::Application(f, x), Term::Application(g, y))
            | (Term::PathApp(f, x), Term::PathApp(g, y)) => self.terms(f, g) && self.terms(x, y),
            (Term::SmoothFunction(l), Term::SmoothFunction(r)) => self.leaves(l, r),
            (Term::IntervalLiteral(p), Term::IntervalLiteral(q)) => p.approx_eq(*q),
            _ => false,
        }
    }

    fn leaves(&self, l: &SmoothFn, r: &SmoothFn) -> bool {
        let common = match (depth(&self.left, &l.var), depth(&self.right, &r.var)) {
            (Some(i), Some(j)) if i == j => Name(format!("bv'{i}")),
            (None, None) if l.var == r.var => l.var.clone(),
            _ => return false,
        };
        let canonical = |leaf: &SmoothFn| {
            self.oracle
                .substitute(&leaf.expr, &leaf.var, &common.0)
                .ok()
        };
        match (canonical(l), canonical(r)) {
            (Some(a), Some(b)) => a == b,
            _ => l == r,
        }
    }

    fn types(&mut self, a: &Type, b: &Type) -> bool {
        match (a, b) {
            (Type::Universe(i), Type::Universe(j)) => i == j,
            (Type::Smooth(x), Type::Smooth(y)) => self.types(x, y),
            (Type::Path(s, a0, a1), Type::Path(t, b0, b1)) => {
                self.types(s, t) && self.terms(a0, b0) && self.terms(a1, b1)
            }
            (
                Type::Function {
                    domain: d,
                    codomain: c,
                    is_smooth: x,
                },
                Type::Function {
                    domain: e,
                    codomain: k,
                    is_smooth: y,
                },
            ) => x == y && self.types(d, e) && self.types(c, k),
            (Type::Product(a0, a1), Type::Product(b0, b1)) => {
                self.types(a0, b0) && self.types(a1, b1)
            }
            (Type::Interval, Type::Interval) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Point;

    fn id(x: &str) -> Term {
        Term::lambda(x, Type::reals(), Term::var(x))
    }

    #[test]
    fn beta_reduces_under_binders() {
        let norm = Normalizer::default();
        let term = Term::lambda("y", Type::reals(), Term::app(id("x"), Term::var("y")));
        let nf = norm.normalize(&term).unwrap();
        assert!(norm.alpha_eq(&nf, &id("z")));
    }

    #[test]
    fn readback_draws_distinct_names() {
        let norm = Normalizer::default();
        let a = norm.normalize(&id("x")).unwrap();
        let b = norm.normalize(&id("x")).unwrap();
        let (Term::Lambda { param: p, .. }, Term::Lambda { param: q, .. }) = (&a, &b) else {
            panic!("expected lambdas, got {a} and {b}");
        };
        assert_ne!(p, q);
        assert_eq!(p.stem(), "x");
        assert!(norm.alpha_eq(&a, &b));
    }

    #[test]
    fn path_application_instantiates_leaves() {
        let norm = Normalizer::default();
        let path = Term::path_lambda("t", Term::smooth("t**2", "t"));
        let half = Term::interval(0.5).unwrap();
        let nf = norm.normalize(&Term::path_app(path.clone(), half)).unwrap();
        assert_eq!(nf, Term::interval(0.25).unwrap());

        let shifted = Term::path_lambda("t", Term::smooth("t + 1", "t"));
        let nf = norm
            .normalize(&Term::path_app(shifted, Term::point(Point::ONE)))
            .unwrap();
        assert_eq!(nf, Term::smooth("2", "t"));
    }

    #[test]
    fn leaves_compare_up_to_bound_renaming() {
        let norm = Normalizer::default();
        let a = Term::path_lambda("s", Term::smooth("s*s + 0", "s"));
        let b = Term::path_lambda("t", Term::smooth("t*t", "t"));
        assert!(norm.equal_terms(&a, &b).unwrap());

        let free_x = Term::smooth("sin(x)", "x");
        let free_y = Term::smooth("sin(y)", "y");
        assert!(!norm.alpha_eq(&free_x, &free_y));
    }

    #[test]
    fn substitution_avoids_capture() {
        let norm = Normalizer::default();
        let term = Term::lambda("y", Type::reals(), Term::app(Term::var("x"), Term::var("y")));
        let result = norm.substitute(&term, &Name::from("x"), &Term::var("y"));
        let Term::Lambda { param, body, .. } = &result else {
            panic!("expected a lambda, got {result}");
        };
        assert_ne!(param, &Name::from("y"));
        assert_eq!(
            **body,
            Term::app(Term::var("y"), Term::Variable(param.clone()))
        );
    }

    #[test]
    fn substitution_stops_at_shadowing_binder() {
        let norm = Normalizer::default();
        let term = Term::path_lambda("t", Term::smooth("t + 1", "t"));
        let result = norm.substitute(&term, &Name::from("t"), &Term::point(Point::ZERO));
        assert_eq!(result, term);
    }

    #[test]
    fn stuck_leaf_keeps_its_argument() {
        let norm = Normalizer::default();
        let sine = Term::lambda("x", Type::reals(), Term::smooth("sin(x)", "x"));
        let at = |f: &str| Term::app(sine.clone(), Term::app(Term::var(f), Term::var("z")));
        assert!(!norm.equal_terms(&at("f"), &at("g")).unwrap());
        assert!(norm.equal_terms(&at("f"), &at("f")).unwrap());
        assert_eq!(
            norm.normalize(&at("f")).unwrap(),
            Term::app(
                Term::smooth("sin(x)", "x"),
                Term::app(Term::var("f"), Term::var("z"))
            )
        );
    }

    #[test]
    fn substituting_a_compound_into_a_leaf_applies_it() {
        let norm = Normalizer::default();
        let leaf = Term::smooth("exp(x)", "x");
        let arg = Term::app(Term::var("f"), Term::var("z"));
        assert_eq!(
            norm.substitute(&leaf, &Name::from("x"), &arg),
            Term::app(leaf.clone(), arg)
        );
    }

    #[test]
    fn leaf_renaming_does_not_capture() {
        let norm = Normalizer::default();
        let leaf = Term::smooth("x + y", "x");
        assert_eq!(
            norm.substitute(&leaf, &Name::from("x"), &Term::var("y")),
            Term::app(leaf.clone(), Term::var("y"))
        );
        assert_eq!(
            norm.substitute(&leaf, &Name::from("x"), &Term::var("w")),
            Term::smooth("w + y", "w")
        );

        let redex = Term::app(Term::lambda("x", Type::reals(), leaf.clone()), Term::var("y"));
        assert_eq!(
            norm.normalize(&redex).unwrap(),
            Term::app(leaf, Term::var("y"))
        );
    }

    #[test]
    fn out_of_fuel_is_an_error() {
        use crate::{config::Config, oracle::Symbolic};
        use std::sync::Arc;

        let config = Config {
            fuel: 3,
            ..Config::default()
        };
        let norm = Normalizer::new(Arc::new(Symbolic), &config);
        let term = Term::app(id("x"), Term::app(id("y"), Term::var("z")));
        assert_eq!(
            norm.normalize(&term),
            Err(CheckError::NormalizationOverflow(3))
        );
    }
}
