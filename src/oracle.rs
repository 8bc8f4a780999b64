//! The derivative oracle: the symbolic-algebra collaborator the checker
//! consults about smooth leaves.
//!
//! Expressions cross this boundary as strings so that any engine can sit
//! behind [`DerivativeOracle`]. [`Symbolic`] is the built-in one: a small
//! deterministic differentiator over numbers, variables, arithmetic, powers
//! and the usual elementary functions.

pub mod expr;
pub(crate) mod parsing;

use thiserror::Error;
use tracing::trace;

use crate::common::Name;
use expr::Expr;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Cannot parse expression \"{0}\": {1}")]
    Parse(String, String),
    #[error("Derivative of order {1} of \"{0}\" is undefined")]
    Undefined(String, usize),
    #[error("Expression \"{0}\" has no value at {1} = {2}")]
    Evaluation(String, Name, f64),
    #[error("Renaming into \"{0}\" would capture {1}")]
    Capture(String, Name),
}

pub trait DerivativeOracle: Send + Sync {
    /// The `order`-th derivative of `expr` in `var`. Order `0` returns the
    /// expression in canonical form.
    fn differentiate(&self, expr: &str, var: &Name, order: usize) -> Result<String, OracleError>;

    /// `expr` with every occurrence of `var` replaced by `replacement`.
    fn substitute(&self, expr: &str, var: &Name, replacement: &str)
        -> Result<String, OracleError>;

    /// Numeric value of `expr` with `var` set to `at`.
    fn evaluate(&self, expr: &str, var: &Name, at: f64) -> Result<f64, OracleError>;

    /// Whether `var` occurs in `expr`.
    fn mentions(&self, expr: &str, var: &Name) -> Result<bool, OracleError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Symbolic;

impl Symbolic {
    pub fn new() -> Self {
        Symbolic
    }

    pub fn parse(&self, src: &str) -> Result<Expr, OracleError> {
        parsing::parse(src)
    }
}

impl DerivativeOracle for Symbolic {
    fn differentiate(&self, expr: &str, var: &Name, order: usize) -> Result<String, OracleError> {
        let mut current = self.parse(expr)?.simplify();
        for k in 1..=order {
            current = current
                .derivative(var)
                .map(|d| d.simplify())
                .filter(Expr::is_defined)
                .ok_or_else(|| OracleError::Undefined(expr.to_owned(), k))?;
            trace!(%var, order = k, derivative = %current, "differentiated");
        }
        if current.is_defined() {
            Ok(current.to_string())
        } else {
            Err(OracleError::Undefined(expr.to_owned(), 0))
        }
    }

    fn substitute(
        &self,
        expr: &str,
        var: &Name,
        replacement: &str,
    ) -> Result<String, OracleError> {
        let replacement = self.parse(replacement)?;
        let result = self.parse(expr)?.substitute(var, &replacement).simplify();
        if result.is_defined() {
            Ok(result.to_string())
        } else {
            Err(OracleError::Undefined(expr.to_owned(), 0))
        }
    }

    fn evaluate(&self, expr: &str, var: &Name, at: f64) -> Result<f64, OracleError> {
        self.parse(expr)?
            .eval(var, at)
            .ok_or_else(|| OracleError::Evaluation(expr.to_owned(), var.clone(), at))
    }

    fn mentions(&self, expr: &str, var: &Name) -> Result<bool, OracleError> {
        Ok(self.parse(expr)?.mentions(var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Name {
        Name::from("x")
    }

    #[test]
    fn differentiates_to_canonical_strings() {
        let oracle = Symbolic::new();
        assert_eq!(oracle.differentiate("sin(x)", &x(), 5).unwrap(), "cos(x)");
        assert_eq!(oracle.differentiate("x**2", &x(), 1).unwrap(), "2*x");
        assert_eq!(oracle.differentiate("exp(x)", &x(), 3).unwrap(), "exp(x)");
        assert_eq!(oracle.differentiate("x + 0", &x(), 0).unwrap(), "x");
    }

    #[test]
    fn reports_the_failing_order() {
        let oracle = Symbolic::new();
        assert_eq!(
            oracle.differentiate("abs(x)", &x(), 5),
            Err(OracleError::Undefined("abs(x)".to_owned(), 2))
        );
        assert!(matches!(
            oracle.differentiate("sin(", &x(), 1),
            Err(OracleError::Parse(_, _))
        ));
    }

    #[test]
    fn substitutes_expressions() {
        let oracle = Symbolic::new();
        assert_eq!(
            oracle.substitute("sin(x)", &x(), "(x**2)").unwrap(),
            "sin(x**2)"
        );
        assert_eq!(oracle.substitute("x**2 + 1", &x(), "1").unwrap(), "2");
        assert_eq!(oracle.substitute("exp(x)", &x(), "y'4").unwrap(), "exp(y'4)");
        assert!(oracle.substitute("1/x", &x(), "0").is_err());
    }

    #[test]
    fn evaluates_at_points() {
        let oracle = Symbolic::new();
        assert_eq!(oracle.evaluate("x**2", &x(), 0.5).unwrap(), 0.25);
        assert!(oracle.evaluate("ln(x)", &x(), 0.0).is_err());
        assert!(oracle.evaluate("x + y", &x(), 0.0).is_err());
    }

    #[test]
    fn reports_mentioned_variables() {
        let oracle = Symbolic::new();
        assert!(oracle.mentions("x + y", &Name::from("y")).unwrap());
        assert!(!oracle.mentions("sin(x)", &Name::from("y")).unwrap());
        assert!(oracle.mentions("sin(", &x()).is_err());
    }
}
