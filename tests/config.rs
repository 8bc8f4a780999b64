use std::sync::Arc;

use smooth_cubical::{Checker, Coherence, Config, ConfigError, Context, Symbolic, Term, Type};

#[test]
fn empty_document_gives_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.derivative_order, 5);
    assert_eq!(config.fuel, 100_000);
    assert_eq!(config.transport_samples, 8);
}

#[test]
fn partial_documents_override_some_keys() {
    let config = Config::from_toml("derivative_order = 2\nfuel = 10\n").unwrap();
    assert_eq!(config.derivative_order, 2);
    assert_eq!(config.fuel, 10);
    assert_eq!(config.continuity_tolerance, 1e-3);
}

#[test]
fn bad_documents_are_rejected() {
    assert!(matches!(
        Config::from_toml("fuel = \"lots\""),
        Err(ConfigError::Toml(_))
    ));
    assert!(matches!(
        Config::from_toml("fuel = 0"),
        Err(ConfigError::NotPositive("fuel"))
    ));
    assert!(matches!(
        Config::from_toml("derivative_orders = 3"),
        Err(ConfigError::Toml(_))
    ));
}

#[test]
fn derivative_order_bounds_the_obligation() {
    // abs has a first derivative but no second.
    let lam = Term::smooth_lambda("x", Type::reals(), Term::smooth("abs(x)", "x"));
    let ty = Type::smooth_function(Type::reals(), Type::reals());

    let strict = Checker::default();
    assert!(!strict.checks(&Context::new(), &lam, &ty));

    let lenient = Checker::new(
        Arc::new(Symbolic),
        Config::from_toml("derivative_order = 1").unwrap(),
    )
    .unwrap();
    assert!(lenient.checks(&Context::new(), &lam, &ty));
}

#[test]
fn constructors_reject_invalid_configs() {
    let zero_order = Config {
        derivative_order: 0,
        ..Config::default()
    };
    assert!(matches!(
        Checker::new(Arc::new(Symbolic), zero_order.clone()),
        Err(ConfigError::NotPositive("derivative_order"))
    ));
    assert!(matches!(
        Coherence::new(Arc::new(Symbolic), zero_order),
        Err(ConfigError::NotPositive("derivative_order"))
    ));

    let no_tolerance = Config {
        continuity_tolerance: f64::NAN,
        ..Config::default()
    };
    assert!(matches!(
        Coherence::new(Arc::new(Symbolic), no_tolerance),
        Err(ConfigError::NotPositive("continuity_tolerance"))
    ));
    assert!(Checker::new(Arc::new(Symbolic), Config::default()).is_ok());
}
