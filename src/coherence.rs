//! Coherence of smooth structure: composites of smooth leaves stay smooth,
//! and transport along a smooth path keeps its derivatives well behaved.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    common::Name,
    config::{Config, ConfigError},
    oracle::{DerivativeOracle, Symbolic},
    syntax::{SmoothFn, Term},
    typecheck::CheckError,
};

/// Distance either side of a sample point used to test continuity.
const NUDGE: f64 = 1e-6;

fn not_smooth(term: &Term, reason: impl ToString) -> CheckError {
    CheckError::SmoothnessObligationFailed(term.clone(), reason.to_string())
}

fn leaf(term: &Term) -> Result<&SmoothFn, CheckError> {
    match term {
        Term::SmoothFunction(leaf) => Ok(leaf),
        _ => Err(not_smooth(term, "not a smooth function")),
    }
}

pub struct Coherence {
    oracle: Arc<dyn DerivativeOracle>,
    config: Config,
}

impl Default for Coherence {
    fn default() -> Self {
        Coherence {
            oracle: Arc::new(Symbolic),
            config: Config::default(),
        }
    }
}

impl Coherence {
    pub fn new(oracle: Arc<dyn DerivativeOracle>, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Coherence { oracle, config })
    }

    pub fn is_composition_smooth(&self, f: &Term, g: &Term) -> bool {
        self.check_composition(f, g).is_ok()
    }

    pub fn is_transport_smooth(&self, path: &Term, value: &Term) -> bool {
        self.check_transport(path, value).is_ok()
    }

    /// `f ∘ g` has derivatives up to the configured order.
    pub fn check_composition(&self, f: &Term, g: &Term) -> Result<(), CheckError> {
        let (outer, inner) = (leaf(f)?, leaf(g)?);
        let expr = self
            .oracle
            .substitute(&outer.expr, &outer.var, &format!("({})", inner.expr))
            .map_err(|err| not_smooth(f, err))?;
        let composite = Term::SmoothFunction(SmoothFn {
            expr,
            var: inner.var.clone(),
        });
        trace!(%composite, "composed");
        self.certify(&composite)
    }

    /// Transport of `value` along `path`: every derivative of the path body
    /// up to the configured order exists and is finite and continuous at the
    /// interior sample points.
    pub fn check_transport(&self, path: &Term, value: &Term) -> Result<(), CheckError> {
        let Term::PathLambda(_, body) = path else {
            return Err(not_smooth(path, "transport needs a path abstraction"));
        };
        let body_leaf = leaf(body)?;
        leaf(value)?;

        let n = self.config.transport_samples;
        let samples: Vec<f64> = (1..=n).map(|k| k as f64 / (n + 1) as f64).collect();
        for order in 1..=self.config.derivative_order {
            let derivative = self
                .oracle
                .differentiate(&body_leaf.expr, &body_leaf.var, order)
                .map_err(|err| not_smooth(body, err))?;
            for &t in &samples {
                self.continuous_at(&derivative, &body_leaf.var, t)
                    .map_err(|reason| {
                        debug!(%derivative, t, "transport derivative misbehaves");
                        not_smooth(body, format!("derivative of order {order} {reason}"))
                    })?;
            }
        }
        trace!(%path, %value, "transport certified");
        Ok(())
    }

    fn certify(&self, term: &Term) -> Result<(), CheckError> {
        let leaf = leaf(term)?;
        match self
            .oracle
            .differentiate(&leaf.expr, &leaf.var, self.config.derivative_order)
        {
            Ok(_) => Ok(()),
            Err(err) => {
                debug!(%term, %err, "composite is not smooth");
                Err(not_smooth(term, err))
            }
        }
    }

    fn continuous_at(&self, expr: &str, var: &Name, t: f64) -> Result<(), String> {
        let at = |x: f64| {
            self.oracle
                .evaluate(expr, var, x)
                .map_err(|_| format!("has no finite value near {t}"))
        };
        let centre = at(t)?;
        let tolerance = self.config.continuity_tolerance * centre.abs().max(1.0);
        for side in [at(t - NUDGE)?, at(t + NUDGE)?] {
            if (side - centre).abs() > tolerance {
                return Err(format!("jumps at {t}"));
            }
        }
        Ok(())
    }
}
