//! Coercion of "one or many" values into a sequence.

/// A value that is either a single item or a sequence of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaybeArray<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> MaybeArray<T> {
    /// Convert into a `Vec`, wrapping a single item.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    /// Number of items once coerced.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    /// Whether the coerced sequence would be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> From<Vec<T>> for MaybeArray<T> {
    fn from(items: Vec<T>) -> Self {
        Self::Many(items)
    }
}

impl<T> From<MaybeArray<T>> for Vec<T> {
    fn from(value: MaybeArray<T>) -> Self {
        value.into_vec()
    }
}

/// Returns `value` unchanged if it is already a sequence, otherwise a
/// one-element sequence.
///
/// ```
/// use quell_core::array::{MaybeArray, to_array};
///
/// assert_eq!(to_array(MaybeArray::One("todos")), vec!["todos"]);
/// assert_eq!(to_array(vec![1, 2]), vec![1, 2]);
/// ```
pub fn to_array<T>(value: impl Into<MaybeArray<T>>) -> Vec<T> {
    value.into().into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_is_wrapped() {
        assert_eq!(to_array(MaybeArray::One(5)), vec![5]);
    }

    #[test]
    fn sequence_is_returned_unchanged() {
        let items = vec!["a".to_string(), "b".to_string()];
        let ptr = items.as_ptr();
        let out = to_array(MaybeArray::Many(items));
        assert_eq!(out, vec!["a".to_string(), "b".to_string()]);
        // Same allocation: no copy was made.
        assert_eq!(out.as_ptr(), ptr);
    }

    #[test]
    fn empty_sequence_stays_empty() {
        let out: Vec<u8> = to_array(Vec::new());
        assert!(out.is_empty());
        assert!(MaybeArray::<u8>::Many(vec![]).is_empty());
    }

    #[test]
    fn nested_vec_single_is_not_flattened() {
        // A lone Vec wrapped in One stays a single element.
        let out = to_array(MaybeArray::One(vec![1, 2]));
        assert_eq!(out, vec![vec![1, 2]]);
    }

    #[test]
    fn len_counts_coerced_items() {
        assert_eq!(MaybeArray::One('x').len(), 1);
        assert_eq!(MaybeArray::Many(vec!['x', 'y']).len(), 2);
        let v: Vec<char> = MaybeArray::One('z').into();
        assert_eq!(v, vec!['z']);
    }
}
