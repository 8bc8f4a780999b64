use std::collections::BTreeSet;

use proptest::prelude::*;
use smooth_cubical::{common::Name, Context, Type};

fn name() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("x"), Just("y"), Just("i"), Just("j")]
}

fn binding_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::reals()),
        Just(Type::interval()),
        Just(Type::universe(0)),
        Just(Type::function(Type::reals(), Type::reals())),
    ]
}

/// What a context built from `bindings` should report: the latest binding of
/// each name wins.
fn latest(bindings: &[(&'static str, Type)]) -> Vec<(Name, Type)> {
    let mut out: Vec<(Name, Type)> = vec![];
    for (x, ty) in bindings {
        out.retain(|(y, _)| y.0 != *x);
        out.push((Name::from(*x), ty.clone()));
    }
    out
}

fn vars_of(model: &[(Name, Type)], keep: impl Fn(&Type) -> bool) -> BTreeSet<Name> {
    model
        .iter()
        .filter(|(_, ty)| keep(ty))
        .map(|(x, _)| x.clone())
        .collect()
}

proptest! {
    #[test]
    fn prop_extension_never_disturbs_earlier_contexts(
        bindings in prop::collection::vec((name(), binding_type()), 0..12)
    ) {
        let mut snapshots = vec![Context::new()];
        for (x, ty) in &bindings {
            let next = snapshots[snapshots.len() - 1].extend(*x, ty.clone());
            snapshots.push(next);
        }

        for (k, ctx) in snapshots.iter().enumerate() {
            let model = latest(&bindings[..k]);
            prop_assert_eq!(ctx.len(), k);
            for (x, ty) in &model {
                prop_assert_eq!(ctx.lookup(x), Some(ty));
            }
            prop_assert_eq!(
                ctx.smooth_vars(),
                vars_of(&model, |ty| matches!(ty, Type::Smooth(_)))
            );
            prop_assert_eq!(
                ctx.interval_vars(),
                vars_of(&model, |ty| *ty == Type::interval())
            );
            for x in ["x", "y", "i", "j"] {
                if !model.iter().any(|(y, _)| y.0 == x) {
                    prop_assert_eq!(ctx.lookup(&Name::from(x)), None);
                }
            }
        }
    }
}
