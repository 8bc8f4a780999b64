use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use pretty::RcDoc;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(pub String);

impl Name {
    /// The name without any `'n` suffix added by a [`NameSupply`].
    pub fn stem(&self) -> &str {
        match self.0.rsplit_once('\'') {
            Some((stem, n))
                if !stem.is_empty() && !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) =>
            {
                stem
            }
            _ => &self.0,
        }
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_owned())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s)
    }
}

pub trait ToDoc {
    fn to_doc(&self) -> RcDoc<'_>;
}

impl ToDoc for Name {
    fn to_doc(&self) -> RcDoc<'_> {
        RcDoc::text(&self.0)
    }
}

/// Source of names of the form `stem'n`, unique per supply.
///
/// Names with this shape are reserved: user terms should not bind them.
#[derive(Debug, Default)]
pub struct NameSupply {
    next: AtomicUsize,
}

impl NameSupply {
    pub fn new() -> Self {
        NameSupply::default()
    }

    pub fn fresh(&self, base: &Name) -> Name {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Name(format!("{}'{n}", base.stem()))
    }
}

/// Persistent snoc-list of named entries. Extending shares the tail.
#[derive(Debug)]
pub struct Scope<T> {
    head: Option<Arc<Entry<T>>>,
    len: usize,
}

#[derive(Debug)]
struct Entry<T> {
    name: Name,
    item: T,
    tail: Option<Arc<Entry<T>>>,
}

impl<T> Clone for Scope<T> {
    fn clone(&self) -> Self {
        Scope {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Scope { head: None, len: 0 }
    }
}

impl<T> Scope<T> {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn extend(&self, name: Name, item: T) -> Self {
        Scope {
            head: Some(Arc::new(Entry {
                name,
                item,
                tail: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn get(&self, name: &Name) -> Option<&T> {
        self.iter().find(|(n, _)| *n == name).map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries from the most recent to the oldest, shadowed ones included.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &T)> {
        let mut cursor = self.head.as_deref();
        std::iter::from_fn(move || {
            let entry = cursor?;
            cursor = entry.tail.as_deref();
            Some((&entry.name, &entry.item))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_strips_supply_suffix() {
        assert_eq!(Name::from("x'12").stem(), "x");
        assert_eq!(Name::from("x'").stem(), "x'");
        assert_eq!(Name::from("x").stem(), "x");
        assert_eq!(Name::from("'3").stem(), "'3");
    }

    #[test]
    fn supply_never_repeats() {
        let supply = NameSupply::new();
        let x = Name::from("x");
        let a = supply.fresh(&x);
        let b = supply.fresh(&a);
        assert_ne!(a, b);
        assert_eq!(b.stem(), "x");
    }

    #[test]
    fn scope_extension_shares_and_shadows() {
        let base = Scope::new().extend(Name::from("x"), 1);
        let left = base.extend(Name::from("x"), 2);
        let right = base.extend(Name::from("y"), 3);

        assert_eq!(base.get(&Name::from("x")), Some(&1));
        assert_eq!(left.get(&Name::from("x")), Some(&2));
        assert_eq!(right.get(&Name::from("x")), Some(&1));
        assert_eq!(base.get(&Name::from("y")), None);
        assert_eq!(left.len(), 2);
        assert_eq!(left.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![2, 1]);
    }
}
