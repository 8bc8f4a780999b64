use std::sync::Arc;

use either::Either;
use tracing::{debug, trace};

use crate::{
    common::{Name, NameSupply},
    config::Config,
    oracle::{DerivativeOracle, OracleError, Symbolic},
    syntax::{Point, SmoothFn, Term},
    typecheck::CheckError,
    value::{Binder, Closure, Env, Value},
};

/// Normalisation by evaluation. Owns the fresh-name supply, so readbacks
/// through one normaliser never reuse a bound-variable name.
pub struct Normalizer {
    pub(crate) oracle: Arc<dyn DerivativeOracle>,
    pub(crate) supply: NameSupply,
    fuel: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(Arc::new(Symbolic), &Config::default())
    }
}

impl Normalizer {
    pub fn new(oracle: Arc<dyn DerivativeOracle>, config: &Config) -> Self {
        Normalizer {
            oracle,
            supply: NameSupply::new(),
            fuel: config.fuel,
        }
    }

    pub fn oracle(&self) -> &dyn DerivativeOracle {
        self.oracle.as_ref()
    }

    pub fn evaluate(&self, term: &Term, env: &Env) -> Result<Value, CheckError> {
        self.machine().eval(term, env)
    }

    /// A machine with a full fuel tank; each public entry point uses its own.
    pub(crate) fn machine(&self) -> Machine<'_> {
        Machine {
            norm: self,
            fuel: self.fuel,
        }
    }
}

pub(crate) struct Machine<'n> {
    pub(crate) norm: &'n Normalizer,
    fuel: usize,
}

impl Machine<'_> {
    fn tick(&mut self) -> Result<(), CheckError> {
        if self.fuel == 0 {
            debug!(limit = self.norm.fuel, "normalisation ran out of fuel");
            return Err(CheckError::NormalizationOverflow(self.norm.fuel));
        }
        self.fuel -= 1;
        Ok(())
    }

    pub(crate) fn eval(&mut self, term: &Term, env: &Env) -> Result<Value, CheckError> {
        self.tick()?;
        match term {
            Term::Variable(x) => Ok(env
                .get(x)
                .cloned()
                .unwrap_or_else(|| Value::var(x.clone()))),
            Term::Lambda {
                param,
                param_type,
                body,
                is_smooth,
            } => Ok(Value::Closure(Closure {
                binder: Binder::Lambda {
                    param_type: (**param_type).clone(),
                    is_smooth: *is_smooth,
                },
                param: param.clone(),
                body: (**body).clone(),
                env: env.clone(),
            })),
            Term::PathLambda(param, body) => Ok(Value::Closure(Closure {
                binder: Binder::Path,
                param: param.clone(),
                body: (**body).clone(),
                env: env.clone(),
            })),
            Term::Application(f, a) => {
                let fv = self.eval(f, env)?;
                let av = self.eval(a, env)?;
                match fv {
                    Value::Closure(c) if matches!(c.binder, Binder::Lambda { .. }) => {
                        self.enter(&c, av)
                    }
                    fv => Ok(Value::Neutral(Term::app(
                        self.readback(&fv)?,
                        self.readback(&av)?,
                    ))),
                }
            }
            Term::PathApp(p, i) => {
                let pv = self.eval(p, env)?;
                let iv = self.eval(i, env)?;
                match pv {
                    Value::Closure(c) if c.binder == Binder::Path => self.enter(&c, iv),
                    pv => Ok(Value::Neutral(Term::path_app(
                        self.readback(&pv)?,
                        self.readback(&iv)?,
                    ))),
                }
            }
            Term::IntervalLiteral(p) => Ok(Value::Interval(*p)),
            Term::SmoothFunction(leaf) => self.eval_leaf(term, leaf, env),
        }
    }

    /// Runs a closure body with its parameter bound to `arg`.
    pub(crate) fn enter(&mut self, closure: &Closure, arg: Value) -> Result<Value, CheckError> {
        let env = closure.env.extend(closure.param.clone(), arg);
        self.eval(&closure.body, &env)
    }

    /// A leaf over a bound variable. Points and variables are pushed into the
    /// expression; anything else leaves the leaf applied to its argument.
    fn eval_leaf(
        &mut self,
        term: &Term,
        leaf: &SmoothFn,
        env: &Env,
    ) -> Result<Value, CheckError> {
        let Some(bound) = env.get(&leaf.var) else {
            return Ok(Value::Neutral(term.clone()));
        };
        let norm = self.norm;
        let oracle = norm.oracle();
        let pushed = match bound {
            Value::Interval(p) => instantiate_at(oracle, leaf, *p).map(|r| match r {
                Either::Left(q) => Value::Interval(q),
                Either::Right(constant) => Value::Neutral(Term::SmoothFunction(constant)),
            }),
            Value::Neutral(Term::Variable(y)) => rename_leaf(oracle, leaf, y)
                .map(|renamed| Value::Neutral(Term::SmoothFunction(renamed))),
            _ => return self.stuck_leaf(term, bound),
        };
        match pushed {
            Ok(value) => Ok(value),
            Err(err) => {
                trace!(%err, %term, "smooth leaf left stuck");
                self.stuck_leaf(term, bound)
            }
        }
    }

    fn stuck_leaf(&mut self, term: &Term, arg: &Value) -> Result<Value, CheckError> {
        Ok(Value::Neutral(Term::app(term.clone(), self.readback(arg)?)))
    }
}

/// Value of a leaf at an interval point: a point again when the result lies
/// in `[0, 1]`, otherwise a constant leaf.
pub(crate) fn instantiate_at(
    oracle: &dyn DerivativeOracle,
    leaf: &SmoothFn,
    at: Point,
) -> Result<Either<Point, SmoothFn>, OracleError> {
    let value = oracle.evaluate(&leaf.expr, &leaf.var, at.value())?;
    Ok(match Point::new(value) {
        Ok(p) => Either::Left(p),
        Err(_) => Either::Right(SmoothFn {
            expr: oracle.substitute(&leaf.expr, &leaf.var, &at.to_string())?,
            var: leaf.var.clone(),
        }),
    })
}

/// The leaf with its variable renamed to `to`. Fails when the expression
/// already mentions `to` as some other variable.
pub(crate) fn rename_leaf(
    oracle: &dyn DerivativeOracle,
    leaf: &SmoothFn,
    to: &Name,
) -> Result<SmoothFn, OracleError> {
    if *to != leaf.var && oracle.mentions(&leaf.expr, to)? {
        return Err(OracleError::Capture(leaf.expr.clone(), to.clone()));
    }
    Ok(SmoothFn {
        expr: oracle.substitute(&leaf.expr, &leaf.var, &to.0)?,
        var: to.clone(),
    })
}
