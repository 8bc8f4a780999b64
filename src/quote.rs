use crate::{
    eval::{Machine, Normalizer},
    syntax::Term,
    typecheck::CheckError,
    value::{Binder, Closure, Value},
};

impl Machine<'_> {
    pub(crate) fn readback(&mut self, value: &Value) -> Result<Term, CheckError> {
        match value {
            Value::Neutral(term) => Ok(term.clone()),
            Value::Interval(p) => Ok(Term::IntervalLiteral(*p)),
            Value::Closure(closure) => self.readback_closure(closure),
        }
    }

    /// Opens the closure on a fresh variable and reads back its body.
    fn readback_closure(&mut self, closure: &Closure) -> Result<Term, CheckError> {
        let fresh = self.norm.supply.fresh(&closure.param);
        let body = self.enter(closure, Value::var(fresh.clone()))?;
        let body = Box::new(self.readback(&body)?);
        Ok(match &closure.binder {
            Binder::Lambda {
                param_type,
                is_smooth,
            } => Term::Lambda {
                param: fresh,
                param_type: Box::new(param_type.clone()),
                body,
                is_smooth: *is_smooth,
            },
            Binder::Path => Term::PathLambda(fresh, body),
        })
    }
}

impl Normalizer {
    pub fn readback(&self, value: &Value) -> Result<Term, CheckError> {
        self.machine().readback(value)
    }
}
