//! Statement parameters

use easysql_core::Value;

/// Ordered positional parameters for one statement
///
/// `()` converts to the empty parameter list, so statements without
/// placeholders read `db.execute("select 1", ())`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a parameter
    pub fn push(&mut self, value: impl Into<Value>) {
        self.0.push(value.into());
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Self(values.to_vec())
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Params {
    fn from(values: [V; N]) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<Value> for Params {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_is_empty() {
        let params = Params::from(());
        assert!(params.is_empty());
        assert_eq!(params, Params::default());
    }

    #[test]
    fn test_array_converts_each_element() {
        let params = Params::from(["foo", "bar"]);
        assert_eq!(
            params.as_slice(),
            &[Value::from("foo"), Value::from("bar")]
        );

        let mixed = Params::from([Value::from("foo"), Value::Int64(3), Value::Null]);
        assert_eq!(mixed.len(), 3);
    }

    #[test]
    fn test_push_keeps_order() {
        let mut params = Params::new();
        params.push(1_i64);
        params.push("two");
        params.push(None::<i64>);
        assert_eq!(
            params.as_slice(),
            &[Value::Int64(1), Value::from("two"), Value::Null]
        );
    }
}
