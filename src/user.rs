//! User context attached to every analytics event.
use derive_more::From;
use serde::{Deserialize, Serialize};

/// Enum representing possible values of a built-in user attribute.
///
/// Built-in attributes are sent as strings, but the evaluation engine may hand us numbers or
/// booleans (e.g., a numeric user key). Conveniently implements `From` conversions for `String`,
/// `&str`, `f64`, and `bool` types.
///
/// Examples:
/// ```
/// # use flag_events::AttributeValue;
/// let string_attr: AttributeValue = "example".into();
/// let number_attr: AttributeValue = 42.0.into();
/// let bool_attr: AttributeValue = true.into();
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, PartialOrd, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// A null value or absence of value.
    Null,
}

impl AttributeValue {
    /// Canonical string form sent over the wire. Returns `None` for `Null`.
    ///
    /// ```
    /// # use flag_events::AttributeValue;
    /// assert_eq!(AttributeValue::from(1.0).to_attribute_string().as_deref(), Some("1"));
    /// assert_eq!(AttributeValue::from(2.5).to_attribute_string().as_deref(), Some("2.5"));
    /// assert_eq!(AttributeValue::Null.to_attribute_string(), None);
    /// ```
    pub fn to_attribute_string(&self) -> Option<String> {
        match self {
            AttributeValue::String(s) => Some(s.clone()),
            // f64 Display prints integral values without a fractional part.
            AttributeValue::Number(n) => Some(n.to_string()),
            AttributeValue::Boolean(b) => Some(b.to_string()),
            AttributeValue::Null => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// A user context as supplied by the flag evaluation engine.
///
/// `key` is the only required attribute. Other built-in attributes are optional and are sent as
/// strings, except `anonymous` and `custom` which keep their types.
///
/// # Examples
/// ```
/// # use flag_events::User;
/// let user = User {
///     name: Some("Red".into()),
///     private_attribute_names: vec!["email".to_owned()],
///     ..User::new("user-key")
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct User {
    pub key: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom: serde_json::Map<String, serde_json::Value>,
    /// Names of attributes (built-in or custom) that must not be sent for this user.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_attribute_names: Vec<String>,
}

impl User {
    /// Create a user with only the key set.
    pub fn new(key: impl Into<AttributeValue>) -> User {
        User {
            key: key.into(),
            secondary: None,
            ip: None,
            country: None,
            email: None,
            first_name: None,
            last_name: None,
            avatar: None,
            name: None,
            anonymous: None,
            custom: serde_json::Map::new(),
            private_attribute_names: Vec::new(),
        }
    }

    /// The user key in its wire form. This is the identity used for deduplication.
    pub fn key_string(&self) -> String {
        self.key.to_attribute_string().unwrap_or_default()
    }

    /// Built-in attributes subject to string coercion, paired with their wire names.
    pub(crate) fn builtin_attributes(&self) -> [(&'static str, Option<&AttributeValue>); 8] {
        [
            ("secondary", self.secondary.as_ref()),
            ("ip", self.ip.as_ref()),
            ("country", self.country.as_ref()),
            ("email", self.email.as_ref()),
            ("firstName", self.first_name.as_ref()),
            ("lastName", self.last_name.as_ref()),
            ("avatar", self.avatar.as_ref()),
            ("name", self.name.as_ref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_key_is_stringified() {
        let user = User::new(1i64);
        assert_eq!(user.key_string(), "1");
    }

    #[test]
    fn deserializes_camel_case_attributes() {
        let user: User = serde_json::from_str(
            r#"{"key":"k","firstName":"Ann","anonymous":true,"custom":{"age":99},"privateAttributeNames":["firstName"]}"#,
        )
        .unwrap();

        assert_eq!(user.first_name, Some("Ann".into()));
        assert_eq!(user.anonymous, Some(true));
        assert_eq!(user.custom["age"], serde_json::json!(99));
        assert_eq!(user.private_attribute_names, vec!["firstName".to_owned()]);
    }
}
