use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
};

use ref_cast::RefCast;

/// Upper-cases a character when the mapping yields exactly one character, and leaves it as is
/// otherwise. This is the folding used for all case-insensitive matching in the language.
pub fn fold_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

/// Case-insensitive name. Unlike ASCII folding, this handles Cyrillic identifiers.
#[derive(Clone, Copy, RefCast)]
#[repr(transparent)]
pub struct CaseInsensitive<S: ?Sized>(S);

impl<S> CaseInsensitive<S> {
    pub fn new(inner: S) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> S {
        self.0
    }
}

impl CaseInsensitive<str> {
    pub fn new_ref(s: &str) -> &Self {
        CaseInsensitive::ref_cast(s)
    }
}

impl<S> CaseInsensitive<S>
where
    S: ?Sized + AsRef<str>,
{
    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.as_ref().chars().map(fold_char)
    }
}

impl<S> fmt::Debug for CaseInsensitive<S>
where
    S: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<S> fmt::Display for CaseInsensitive<S>
where
    S: ?Sized + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<S> PartialEq for CaseInsensitive<S>
where
    S: ?Sized + AsRef<str>,
{
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl<S> Eq for CaseInsensitive<S> where S: ?Sized + AsRef<str> {}

impl<S> PartialOrd for CaseInsensitive<S>
where
    S: ?Sized + AsRef<str>,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for CaseInsensitive<S>
where
    S: ?Sized + AsRef<str>,
{
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl<S> Hash for CaseInsensitive<S>
where
    S: ?Sized + AsRef<str>,
{
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.folded().for_each(|c| c.hash(state))
    }
}

impl Borrow<CaseInsensitive<str>> for CaseInsensitive<String> {
    fn borrow(&self) -> &CaseInsensitive<str> {
        CaseInsensitive::ref_cast(&self.0)
    }
}

impl AsRef<str> for CaseInsensitive<String> {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl AsRef<str> for CaseInsensitive<str> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<T> Deref for CaseInsensitive<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn cyrillic_names_compare_case_insensitively() {
        assert_eq!(
            CaseInsensitive::new_ref("НаСервере"),
            CaseInsensitive::new_ref("НАСЕРВЕРЕ")
        );
        assert_ne!(
            CaseInsensitive::new_ref("MacOS"),
            // Cyrillic `О`.
            CaseInsensitive::new_ref("MacОS")
        );
    }

    #[test]
    fn lookup_through_borrow() {
        let mut set = HashSet::new();
        set.insert(CaseInsensitive::new(String::from("Отладка")));
        assert!(set.contains(CaseInsensitive::new_ref("ОТЛАДКА")));
        assert!(!set.contains(CaseInsensitive::new_ref("Отладк")));
    }

    #[test]
    fn folding_keeps_multi_char_mappings_intact() {
        assert_eq!(fold_char('ß'), 'ß');
        assert_eq!(fold_char('ё'), 'Ё');
        assert_eq!(fold_char('7'), '7');
    }
}
