//! Three-state document data.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// Primary data or relationship linkage.
///
/// JSON:API distinguishes a member that is missing from one that is present
/// but empty, and the distinction changes client behavior: a relationship
/// without `data` only carries navigation links, while `"data": null` or
/// `"data": []` states that the relationship is known to be empty.
///
/// | Wire form           | Variant              |
/// |---------------------|----------------------|
/// | member missing      | [`Data::Absent`]     |
/// | `null`              | [`Data::Null`]       |
/// | `{ ... }`           | [`Data::One`]        |
/// | `[ ... ]`           | [`Data::Many`]       |
///
/// Containing structs must mark the field with
/// `#[serde(default, skip_serializing_if = "Data::is_absent")]` so that a
/// missing member maps to [`Data::Absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data<T> {
    /// The member is not present at all.
    Absent,
    /// The member is present and explicitly `null`.
    Null,
    /// The member holds a single value.
    One(T),
    /// The member holds an array (possibly empty).
    Many(Vec<T>),
}

impl<T> Default for Data<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Data<T> {
    /// Returns `true` if the member was missing.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns `true` if the member was present, even if empty.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    /// Returns `true` if the member was present but holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Many(values) => values.is_empty(),
            Self::Absent | Self::One(_) => false,
        }
    }

    /// Iterates over the contained values, in document order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        match self {
            Self::One(value) => core::slice::from_ref(value).iter(),
            Self::Many(values) => values.iter(),
            Self::Absent | Self::Null => [].iter(),
        }
    }

    /// Converts into a vector of the contained values.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
            Self::Absent | Self::Null => Vec::new(),
        }
    }

    /// Maps the contained values, preserving the shape.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Data<U> {
        match self {
            Self::Absent => Data::Absent,
            Self::Null => Data::Null,
            Self::One(value) => Data::One(f(value)),
            Self::Many(values) => Data::Many(values.into_iter().map(f).collect()),
        }
    }
}

impl<T: Serialize> Serialize for Data<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent | Self::Null => serializer.serialize_none(),
            Self::One(value) => value.serialize(serializer),
            Self::Many(values) => values.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Data<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Many(Vec<T>),
            One(T),
        }

        Ok(match Option::<Repr<T>>::deserialize(deserializer)? {
            None => Self::Null,
            Some(Repr::One(value)) => Self::One(value),
            Some(Repr::Many(values)) => Self::Many(values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default)]
        data: Data<u32>,
    }

    fn parse(json: &str) -> Data<u32> {
        serde_json::from_str::<Holder>(json).unwrap().data
    }

    #[test]
    fn missing_member_is_absent() {
        assert_eq!(parse("{}"), Data::Absent);
    }

    #[test]
    fn null_member_is_null() {
        let data = parse(r#"{"data": null}"#);
        assert_eq!(data, Data::Null);
        assert!(data.is_present());
        assert!(data.is_empty());
    }

    #[test]
    fn empty_array_is_present_and_empty() {
        let data = parse(r#"{"data": []}"#);
        assert_eq!(data, Data::Many(vec![]));
        assert!(data.is_present());
        assert!(data.is_empty());
    }

    #[test]
    fn single_and_many_values() {
        assert_eq!(parse(r#"{"data": 3}"#), Data::One(3));
        assert_eq!(parse(r#"{"data": [1, 2]}"#), Data::Many(vec![1, 2]));
    }

    #[test]
    fn iter_follows_document_order() {
        let data = Data::Many(vec![3, 1, 2]);
        assert_eq!(data.iter().copied().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(Data::One(7).into_vec(), vec![7]);
        assert!(Data::<u32>::Null.into_vec().is_empty());
    }
}
