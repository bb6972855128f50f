// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{borrow::Borrow, cmp::Ordering, fmt::{Debug, Display}, hash::Hash, ops::Deref, sync::Arc};

/// A cheaply clonable name. Clones share the same allocation, so names that
/// are copied around the tree (references, side tables) never reallocate.
#[derive(Clone)]
pub struct YulString {
    inner: YulStringImpl,
}

impl YulString {
    #[must_use]
    pub const fn empty() -> Self {
        Self::new_static("")
    }

    #[must_use]
    pub const fn new_static(str: &'static str) -> YulString {
        Self {
            inner: YulStringImpl::Static { str },
        }
    }

    #[must_use]
    pub fn new(str: impl Into<Arc<str>>) -> Self {
        Self {
            inner: YulStringImpl::Dynamic {
                data: str.into(),
            },
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match &self.inner {
            YulStringImpl::Dynamic { data } => data,
            YulStringImpl::Static { str } => str,
        }
    }
}

impl Debug for YulString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self.as_str(), f)
    }
}

impl Default for YulString {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone)]
enum YulStringImpl {
    Dynamic {
        data: Arc<str>,
    },
    Static {
        str: &'static str,
    }
}

impl Deref for YulString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl Borrow<str> for YulString {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<String> for YulString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for YulString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl PartialEq for YulString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for YulString {}

impl PartialOrd for YulString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for YulString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Hash for YulString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialEq<str> for YulString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for YulString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<YulString> for str {
    fn eq(&self, other: &YulString) -> bool {
        self == other.as_str()
    }
}

impl PartialEq<YulString> for &str {
    fn eq(&self, other: &YulString) -> bool {
        *self == other.as_str()
    }
}

impl Display for YulString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.as_str(), f)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn static_and_dynamic_compare_equal() {
        assert_eq!(YulString::new_static("x"), YulString::from("x".to_string()));
        assert!(YulString::empty().is_empty());
    }

    #[test]
    fn lookup_by_str_in_ordered_map() {
        let mut map = BTreeMap::new();
        map.insert(YulString::from("b"), 2);
        map.insert(YulString::from("a"), 1);

        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.keys().map(|k| k.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }
}
