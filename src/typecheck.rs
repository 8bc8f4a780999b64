use std::{fmt::Display, sync::Arc};

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    common::Name,
    config::{Config, ConfigError},
    context::Context,
    eval::Normalizer,
    oracle::{DerivativeOracle, Symbolic},
    syntax::{Point, SmoothFn, Term, Type},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

impl Endpoint {
    pub fn point(self) -> Point {
        match self {
            Endpoint::Start => Point::ZERO,
            Endpoint::End => Point::ONE,
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start (0)"),
            Endpoint::End => write!(f, "end (1)"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("Unknown variable: {0}")]
    UnboundVariable(Name),
    #[error("Term \"{0}\" should have type \"{1}\" but has type \"{2}\"")]
    TypeMismatch(Term, Type, Type),
    #[error("Term \"{0}\" has type \"{1}\" and cannot be applied")]
    NotAFunction(Term, Type),
    #[error("Term \"{0}\" has type \"{1}\" and is not a path")]
    NotAPath(Term, Type),
    #[error("Path \"{0}\" reaches \"{3}\" at its {1} but should reach \"{2}\"")]
    BoundaryMismatch(Term, Endpoint, Term, Term),
    #[error("Cannot show \"{0}\" is smooth: {1}")]
    SmoothnessObligationFailed(Term, String),
    #[error("Interval point {0} is outside [0, 1]")]
    IntervalOutOfRange(f64),
    #[error("Normalisation did not finish within {0} steps")]
    NormalizationOverflow(usize),
    #[error("Cannot infer a type for \"{0}\"")]
    CannotInfer(Term),
}

impl CheckError {
    /// The sub-term at fault, when the failure has one.
    pub fn term(&self) -> Option<&Term> {
        match self {
            CheckError::TypeMismatch(tm, _, _)
            | CheckError::NotAFunction(tm, _)
            | CheckError::NotAPath(tm, _)
            | CheckError::BoundaryMismatch(tm, _, _, _)
            | CheckError::SmoothnessObligationFailed(tm, _)
            | CheckError::CannotInfer(tm) => Some(tm),
            CheckError::UnboundVariable(_)
            | CheckError::IntervalOutOfRange(_)
            | CheckError::NormalizationOverflow(_) => None,
        }
    }

    pub fn rule(&self) -> &'static str {
        match self {
            CheckError::UnboundVariable(_) => "variable",
            CheckError::TypeMismatch(_, _, _) => "conversion",
            CheckError::NotAFunction(_, _) => "application",
            CheckError::NotAPath(_, _) => "path application",
            CheckError::BoundaryMismatch(_, _, _, _) => "path boundary",
            CheckError::SmoothnessObligationFailed(_, _) => "smoothness",
            CheckError::IntervalOutOfRange(_) => "interval point",
            CheckError::NormalizationOverflow(_) => "normalisation",
            CheckError::CannotInfer(_) => "inference",
        }
    }
}

fn not_smooth(term: &Term, reason: impl ToString) -> CheckError {
    CheckError::SmoothnessObligationFailed(term.clone(), reason.to_string())
}

/// Bidirectional checker for the smooth cubical calculus.
pub struct Checker {
    normalizer: Normalizer,
    oracle: Arc<dyn DerivativeOracle>,
    config: Config,
}

impl Default for Checker {
    fn default() -> Self {
        Checker::build(Arc::new(Symbolic), Config::default())
    }
}

impl Checker {
    /// A checker over `oracle`. The configuration is validated first.
    pub fn new(oracle: Arc<dyn DerivativeOracle>, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Checker::build(oracle, config))
    }

    fn build(oracle: Arc<dyn DerivativeOracle>, config: Config) -> Self {
        Checker {
            normalizer: Normalizer::new(oracle.clone(), &config),
            oracle,
            config,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn checks(&self, ctx: &Context, term: &Term, expected: &Type) -> bool {
        self.check(ctx, term, expected).is_ok()
    }

    pub fn infers(&self, ctx: &Context, term: &Term) -> Option<Type> {
        self.infer(ctx, term).ok()
    }

    pub fn check(&self, ctx: &Context, term: &Term, expected: &Type) -> Result<(), CheckError> {
        trace!(%term, %expected, "check");
        match (term, expected) {
            (
                Term::Lambda {
                    param,
                    param_type,
                    body,
                    is_smooth,
                },
                Type::Function {
                    domain,
                    codomain,
                    is_smooth: smooth_expected,
                },
            ) => {
                if !self.equal_types(param_type, domain)? {
                    return Err(CheckError::TypeMismatch(
                        Term::Variable(param.clone()),
                        (**domain).clone(),
                        (**param_type).clone(),
                    ));
                }
                let inner = ctx.extend(param.clone(), (**domain).clone());
                self.check(&inner, body, codomain)?;
                if *smooth_expected || *is_smooth {
                    self.verify_smooth_lambda(ctx, term)?;
                }
                Ok(())
            }
            (Term::PathLambda(param, body), Type::Path(space, start, end)) => {
                self.check(ctx, start, space)?;
                self.check(ctx, end, space)?;
                let inner = ctx.extend(param.clone(), Type::Interval);
                self.check(&inner, body, space)?;
                self.check_boundary(term, param, body, Endpoint::Start, start)?;
                self.check_boundary(term, param, body, Endpoint::End, end)
            }
            (Term::SmoothFunction(leaf), ty)
                if *ty == Type::reals() && ctx.lookup(&leaf.var).is_some_and(Type::is_real) =>
            {
                self.oracle
                    .differentiate(&leaf.expr, &leaf.var, 0)
                    .map(|_| ())
                    .map_err(|err| not_smooth(term, err))
            }
            (Term::IntervalLiteral(_), ty) if *ty == Type::reals() => Ok(()),
            (Term::Variable(x), ty) if *ty == Type::reals() && ctx.is_interval_var(x) => Ok(()),
            _ => {
                // A redex checks its body against the expected type directly.
                if let Some((param, param_type, body, arg)) = term.as_redex() {
                    self.check(ctx, arg, param_type)?;
                    let inner = ctx.extend(param.clone(), param_type.clone());
                    return self.check(&inner, body, expected);
                }
                let found = self.infer(ctx, term)?;
                if self.equal_types(&found, expected)? {
                    Ok(())
                } else {
                    debug!(%term, %expected, %found, "type mismatch");
                    Err(CheckError::TypeMismatch(
                        term.clone(),
                        expected.clone(),
                        found,
                    ))
                }
            }
        }
    }

    pub fn infer(&self, ctx: &Context, term: &Term) -> Result<Type, CheckError> {
        trace!(%term, "infer");
        match term {
            Term::Variable(x) => ctx
                .lookup(x)
                .cloned()
                .ok_or_else(|| CheckError::UnboundVariable(x.clone())),
            Term::Application(f, arg) => {
                // A redex: the argument fixes the parameter, the body gives the type.
                if let Some((param, param_type, body, arg)) = term.as_redex() {
                    self.check(ctx, arg, param_type)?;
                    return self.infer(&ctx.extend(param.clone(), param_type.clone()), body);
                }
                let fty = self.infer(ctx, f)?;
                let (domain, codomain, _) = fty
                    .as_function()
                    .ok_or_else(|| CheckError::NotAFunction((**f).clone(), fty.clone()))?;
                self.check(ctx, arg, domain)?;
                Ok(codomain.clone())
            }
            Term::Lambda { .. } | Term::PathLambda(_, _) => {
                Err(CheckError::CannotInfer(term.clone()))
            }
            Term::SmoothFunction(_) => Ok(Type::smooth(Type::smooth_function(
                Type::reals(),
                Type::reals(),
            ))),
            Term::IntervalLiteral(_) => Ok(Type::Interval),
            Term::PathApp(p, i) => match self.infer(ctx, p)? {
                Type::Path(space, _, _) => {
                    self.check(ctx, i, &Type::Interval)?;
                    Ok(*space)
                }
                other => Err(CheckError::NotAPath((**p).clone(), other)),
            },
        }
    }

    /// Structural type equality. Path endpoints are compared by normal form.
    pub fn equal_types(&self, a: &Type, b: &Type) -> Result<bool, CheckError> {
        Ok(match (a, b) {
            (Type::Universe(i), Type::Universe(j)) => i == j,
            (Type::Smooth(x), Type::Smooth(y)) => self.equal_types(x, y)?,
            (Type::Path(s, a0, a1), Type::Path(t, b0, b1)) => {
                self.equal_types(s, t)?
                    && self.normalizer.equal_terms(a0, b0)?
                    && self.normalizer.equal_terms(a1, b1)?
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
            ) => x == y && self.equal_types(d, e)? && self.equal_types(c, k)?,
            (Type::Product(a0, a1), Type::Product(b0, b1)) => {
                self.equal_types(a0, b0)? && self.equal_types(a1, b1)?
            }
            (Type::Interval, Type::Interval) => true,
            _ => false,
        })
    }

    /// The smoothness obligation of a lambda checked in `ctx`.
    pub fn verify_smooth_lambda(&self, ctx: &Context, lam: &Term) -> Result<(), CheckError> {
        let Term::Lambda {
            param,
            param_type,
            body,
            ..
        } = lam
        else {
            return Err(not_smooth(lam, "not a lambda"));
        };
        let inner = ctx.extend(param.clone(), (**param_type).clone());
        let result = self.smooth_term(&inner, body);
        if let Err(err) = &result {
            debug!(%lam, %err, "smoothness obligation failed");
        }
        result
    }

    fn smooth_term(&self, ctx: &Context, term: &Term) -> Result<(), CheckError> {
        match term {
            Term::SmoothFunction(leaf) => self.certify_leaf(term, leaf),
            Term::Variable(x) if ctx.is_smooth_var(x) => Ok(()),
            Term::Variable(x) => Err(not_smooth(term, format!("{x} is not a smooth variable"))),
            Term::Application(f, arg) => {
                match &**f {
                    Term::SmoothFunction(leaf) => self.certify_leaf(f, leaf)?,
                    _ => {
                        let fty = self.infer(ctx, f).map_err(|err| not_smooth(f, err))?;
                        if !matches!(fty.as_function(), Some((_, _, true))) {
                            return Err(not_smooth(
                                f,
                                format!("type \"{fty}\" is not a smooth function type"),
                            ));
                        }
                    }
                }
                self.smooth_term(ctx, arg)
            }
            _ => Err(not_smooth(term, "not syntactically smooth")),
        }
    }

    fn certify_leaf(&self, term: &Term, leaf: &SmoothFn) -> Result<(), CheckError> {
        self.oracle
            .differentiate(&leaf.expr, &leaf.var, self.config.derivative_order)
            .map(|top| trace!(expr = %leaf.expr, %top, "leaf certified"))
            .map_err(|err| not_smooth(term, err))
    }

    fn check_boundary(
        &self,
        path: &Term,
        param: &Name,
        body: &Term,
        endpoint: Endpoint,
        expected: &Term,
    ) -> Result<(), CheckError> {
        let reached = self
            .normalizer
            .substitute(body, param, &Term::point(endpoint.point()));
        let found = self.normalizer.normalize(&reached)?;
        let expected = self.normalizer.normalize(expected)?;
        if self.normalizer.alpha_eq(&found, &expected) {
            trace!(%path, %endpoint, "boundary agrees");
            Ok(())
        } else {
            debug!(%path, %endpoint, %expected, %found, "boundary mismatch");
            Err(CheckError::BoundaryMismatch(
                path.clone(),
                endpoint,
                expected,
                found,
            ))
        }
    }
}
