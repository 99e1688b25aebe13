//! Ordered, case-policy-aware property storage for a message.

use crate::error::MessageError;

use super::model::{ComparisonMode, MAX_PROP_NAME_LEN, MAX_PROP_VAL_LEN};

/// What a [`PropertyBag::set`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key was new.
    Added,
    /// The key existed and its value changed. `name` is the stored spelling.
    Changed { name: String, old: Option<String> },
    /// The key existed with an equal value.
    Unchanged,
}

/// Insertion-ordered map of property name to optional value.
///
/// Keys are unique under the bag's [`ComparisonMode`]. Lookups are a linear
/// scan; messages carry a handful of properties.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    entries: Vec<(String, Option<String>)>,
    mode: ComparisonMode,
}

impl PropertyBag {
    pub fn new(mode: ComparisonMode) -> Self {
        Self {
            entries: Vec::new(),
            mode,
        }
    }

    pub fn mode(&self) -> ComparisonMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of `name` under the comparison mode.
    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(key, _)| self.mode.equals(key, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Stored spelling and value for `name`, if defined.
    pub fn entry(&self, name: &str) -> Option<(&str, Option<&str>)> {
        self.position(name).map(|i| {
            let (key, value) = &self.entries[i];
            (key.as_str(), value.as_deref())
        })
    }

    /// Add a new key. Fails if the key already exists under the mode.
    pub fn add(&mut self, name: &str, value: Option<&str>) -> Result<(), MessageError> {
        validate_name(name)?;
        validate_value(value)?;
        if let Some(i) = self.position(name) {
            return Err(MessageError::DuplicateProperty {
                name: name.to_string(),
                existing: self.entries[i].1.clone(),
            });
        }
        self.entries
            .push((name.to_string(), value.map(str::to_string)));
        Ok(())
    }

    /// Insert or update a key, keeping the originally-defined spelling.
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Result<SetOutcome, MessageError> {
        validate_name(name)?;
        validate_value(value)?;
        let Some(i) = self.position(name) else {
            self.entries
                .push((name.to_string(), value.map(str::to_string)));
            return Ok(SetOutcome::Added);
        };

        let changed = match (self.entries[i].1.as_deref(), value) {
            (None, None) => false,
            (Some(current), Some(new)) => !self.mode.equals(current, new),
            _ => true,
        };
        let old = std::mem::replace(&mut self.entries[i].1, value.map(str::to_string));
        if changed {
            Ok(SetOutcome::Changed {
                name: self.entries[i].0.clone(),
                old,
            })
        } else {
            Ok(SetOutcome::Unchanged)
        }
    }

    /// Keys in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Null every value but keep the keys.
    pub fn clear_values(&mut self) {
        for (_, value) in &mut self.entries {
            *value = None;
        }
    }
}

/// A property name must be non-blank and at most [`MAX_PROP_NAME_LEN`] chars.
pub(crate) fn validate_name(name: &str) -> Result<(), MessageError> {
    if name.trim().is_empty() {
        return Err(MessageError::Validation("Property name is required".into()));
    }
    if name.chars().count() > MAX_PROP_NAME_LEN {
        return Err(MessageError::Validation(format!(
            "Property name cannot be more than {MAX_PROP_NAME_LEN} characters in length"
        )));
    }
    Ok(())
}

pub(crate) fn validate_value(value: Option<&str>) -> Result<(), MessageError> {
    if value.is_some_and(|v| v.chars().count() > MAX_PROP_VAL_LEN) {
        return Err(MessageError::Validation(format!(
            "Property value cannot be more than {MAX_PROP_VAL_LEN} characters in length"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut bag = PropertyBag::default();
        bag.add("Zeta", Some("1")).unwrap();
        bag.add("Alpha", None).unwrap();
        bag.set("Mid", Some("2")).unwrap();
        assert_eq!(bag.names().collect::<Vec<_>>(), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn duplicate_add_fails_under_ignore_case() {
        let mut bag = PropertyBag::new(ComparisonMode::IgnoreCase);
        bag.add("Vendor", Some("Acme")).unwrap();
        let err = bag.add("VENDOR", Some("Other")).unwrap_err();
        match err {
            MessageError::DuplicateProperty { name, existing } => {
                assert_eq!(name, "VENDOR");
                assert_eq!(existing.as_deref(), Some("Acme"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn case_sensitive_keys_are_distinct() {
        let mut bag = PropertyBag::new(ComparisonMode::CaseSensitive);
        bag.add("Vendor", Some("a")).unwrap();
        bag.add("vendor", Some("b")).unwrap();
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.entry("vendor"), Some(("vendor", Some("b"))));
    }

    #[test]
    fn set_keeps_original_spelling() {
        let mut bag = PropertyBag::new(ComparisonMode::IgnoreCase);
        bag.add("Amount", Some("1")).unwrap();
        let outcome = bag.set("AMOUNT", Some("2")).unwrap();
        assert_eq!(
            outcome,
            SetOutcome::Changed {
                name: "Amount".into(),
                old: Some("1".into())
            }
        );
        assert_eq!(bag.entry("amount"), Some(("Amount", Some("2"))));
    }

    #[test]
    fn set_change_detection() {
        let mut bag = PropertyBag::new(ComparisonMode::IgnoreCase);
        bag.add("X", None).unwrap();
        assert_eq!(bag.set("X", None).unwrap(), SetOutcome::Unchanged);
        assert!(matches!(bag.set("X", Some("")).unwrap(), SetOutcome::Changed { .. }));
        assert!(matches!(bag.set("X", None).unwrap(), SetOutcome::Changed { .. }));
        bag.set("X", Some("abc")).unwrap();
        // Equal under the mode is not a change, but the new spelling is stored.
        assert_eq!(bag.set("X", Some("ABC")).unwrap(), SetOutcome::Unchanged);
        assert_eq!(bag.entry("X"), Some(("X", Some("ABC"))));
    }

    #[test]
    fn validation_limits() {
        let mut bag = PropertyBag::default();
        assert!(matches!(bag.add("  ", None), Err(MessageError::Validation(_))));
        assert!(matches!(
            bag.add(&"n".repeat(65), None),
            Err(MessageError::Validation(_))
        ));
        assert!(bag.add(&"n".repeat(64), None).is_ok());
        assert!(matches!(
            bag.set("v", Some(&"x".repeat(257))),
            Err(MessageError::Validation(_))
        ));
        assert!(bag.set("v", Some(&"x".repeat(256))).is_ok());
    }

    #[test]
    fn clear_values_keeps_keys() {
        let mut bag = PropertyBag::default();
        bag.add("A", Some("1")).unwrap();
        bag.add("B", Some("2")).unwrap();
        bag.clear_values();
        assert_eq!(bag.len(), 2);
        assert!(bag.iter().all(|(_, v)| v.is_none()));
        bag.clear();
        assert!(bag.is_empty());
    }
}
