use std::{collections::BTreeSet, fmt::Display};

use itertools::Itertools;

use crate::{
    common::{Name, Scope},
    syntax::Type,
};

/// How a variable was introduced, fixed when it is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    Ordinary,
    Smooth,
    Interval,
}

impl Provenance {
    pub fn of(ty: &Type) -> Provenance {
        match ty {
            Type::Smooth(_) => Provenance::Smooth,
            Type::Interval => Provenance::Interval,
            _ => Provenance::Ordinary,
        }
    }
}

#[derive(Clone, Debug)]
struct Binding {
    ty: Type,
    provenance: Provenance,
}

/// Typing context. Extension returns a new context sharing every earlier
/// binding; nothing is ever mutated in place.
#[derive(Clone, Debug, Default)]
pub struct Context {
    bindings: Scope<Binding>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn extend(&self, name: impl Into<Name>, ty: Type) -> Context {
        let provenance = Provenance::of(&ty);
        Context {
            bindings: self
                .bindings
                .extend(name.into(), Binding { ty, provenance }),
        }
    }

    pub fn lookup(&self, name: &Name) -> Option<&Type> {
        self.bindings.get(name).map(|b| &b.ty)
    }

    pub fn provenance(&self, name: &Name) -> Option<Provenance> {
        self.bindings.get(name).map(|b| b.provenance)
    }

    pub fn is_smooth_var(&self, name: &Name) -> bool {
        self.provenance(name) == Some(Provenance::Smooth)
    }

    pub fn is_interval_var(&self, name: &Name) -> bool {
        self.provenance(name) == Some(Provenance::Interval)
    }

    pub fn smooth_vars(&self) -> BTreeSet<Name> {
        self.vars_with(Provenance::Smooth)
    }

    pub fn interval_vars(&self) -> BTreeSet<Name> {
        self.vars_with(Provenance::Interval)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn vars_with(&self, provenance: Provenance) -> BTreeSet<Name> {
        let mut seen = BTreeSet::new();
        let mut vars = BTreeSet::new();
        for (name, binding) in self.bindings.iter() {
            if seen.insert(name.clone()) && binding.provenance == provenance {
                vars.insert(name.clone());
            }
        }
        vars
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bindings: Vec<_> = self.bindings.iter().collect();
        write!(
            f,
            "{}",
            bindings
                .into_iter()
                .rev()
                .map(|(name, b)| format!("({name} : {})", b.ty))
                .join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_reclassifies() {
        let ctx = Context::new()
            .extend("x", Type::reals())
            .extend("i", Type::interval());
        assert!(ctx.is_smooth_var(&Name::from("x")));
        assert!(ctx.is_interval_var(&Name::from("i")));

        let shadowed = ctx.extend("x", Type::interval());
        assert!(shadowed.smooth_vars().is_empty());
        assert_eq!(shadowed.interval_vars().len(), 2);
        assert!(ctx.is_smooth_var(&Name::from("x")));

        let ordinary = shadowed.extend("i", Type::universe(0));
        assert_eq!(
            ordinary.interval_vars().into_iter().collect::<Vec<_>>(),
            vec![Name::from("x")]
        );
        assert_eq!(ordinary.provenance(&Name::from("i")), Some(Provenance::Ordinary));
    }

    #[test]
    fn extension_leaves_parent_untouched() {
        let parent = Context::new().extend("x", Type::reals());
        let child = parent.extend("y", Type::interval());
        assert_eq!(parent.lookup(&Name::from("y")), None);
        assert_eq!(child.lookup(&Name::from("y")), Some(&Type::interval()));
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
    }

    #[test]
    fn displays_oldest_first() {
        let ctx = Context::new()
            .extend("x", Type::reals())
            .extend("i", Type::interval());
        assert_eq!(ctx.to_string(), "(x : C∞ Type0) (i : I)");
    }
}
