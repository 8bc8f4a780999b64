use std::fmt::Display;

use derivative::Derivative;

use crate::{
    common::{Name, Scope},
    syntax::{Point, Term, Type},
};

/// Evaluation environment: values for the variables in scope.
pub type Env = Scope<Value>;

/// What kind of abstraction produced a closure.
#[derive(Clone, Debug, PartialEq)]
pub enum Binder {
    Lambda { param_type: Type, is_smooth: bool },
    Path,
}

#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Closure {
    pub binder: Binder,
    pub param: Name,
    pub body: Term,
    #[derivative(Debug = "ignore")]
    pub env: Env,
}

#[derive(Clone, Debug)]
pub enum Value {
    Closure(Closure),
    /// Computation stuck on a free variable or an unreducible form.
    Neutral(Term),
    Interval(Point),
}

impl Value {
    pub fn var(name: Name) -> Value {
        Value::Neutral(Term::Variable(name))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Closure(c) => match &c.binder {
                Binder::Lambda { .. } => write!(f, "<closure λ{}. {}>", c.param, c.body),
                Binder::Path => write!(f, "<closure ⟨{}⟩ {}>", c.param, c.body),
            },
            Value::Neutral(t) => t.fmt(f),
            Value::Interval(p) => p.fmt(f),
        }
    }
}
