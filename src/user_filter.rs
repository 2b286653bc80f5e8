//! Privacy filtering of users before they leave the process.
use std::collections::HashSet;

use serde::Serialize;

use crate::{AttributeValue, User};

/// A user as it is sent in analytics events: private attributes removed and built-in attributes
/// converted to strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct FilteredUser {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub custom: serde_json::Map<String, serde_json::Value>,
    /// Names of attributes that were present but removed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub private_attrs: Vec<String>,
}

impl FilteredUser {
    /// Returns `true` if at least one attribute was removed.
    pub fn is_redacted(&self) -> bool {
        !self.private_attrs.is_empty()
    }
}

/// Removes private attributes from users.
///
/// An attribute is private if all attributes are configured private, if its name is in the
/// globally configured list, or if its name is in the user's own `private_attribute_names`. The
/// key is never private.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    all_attributes_private: bool,
    private_attribute_names: HashSet<String>,
}

impl UserFilter {
    /// Create a new filter.
    pub fn new(
        all_attributes_private: bool,
        private_attribute_names: impl IntoIterator<Item = String>,
    ) -> UserFilter {
        UserFilter {
            all_attributes_private,
            private_attribute_names: private_attribute_names.into_iter().collect(),
        }
    }

    /// Filter `user` for transmission.
    pub fn filter(&self, user: &User) -> FilteredUser {
        let mut redaction = Redaction {
            filter: self,
            user,
            private_attrs: Vec::new(),
        };

        let [secondary, ip, country, email, first_name, last_name, avatar, name] = user
            .builtin_attributes()
            .map(|(attribute, value)| redaction.builtin(attribute, value));
        let anonymous = redaction.anonymous();
        let custom = redaction.custom();

        FilteredUser {
            key: user.key_string(),
            secondary,
            ip,
            country,
            email,
            first_name,
            last_name,
            avatar,
            name,
            anonymous,
            custom,
            private_attrs: redaction.private_attrs,
        }
    }

    fn is_private(&self, user: &User, attribute: &str) -> bool {
        self.all_attributes_private
            || self.private_attribute_names.contains(attribute)
            || user.private_attribute_names.iter().any(|it| it == attribute)
    }
}

/// Accumulates names of redacted attributes while filtering a single user.
struct Redaction<'a> {
    filter: &'a UserFilter,
    user: &'a User,
    private_attrs: Vec<String>,
}

impl Redaction<'_> {
    fn redact(&mut self, attribute: &str) -> bool {
        if self.filter.is_private(self.user, attribute) {
            self.private_attrs.push(attribute.to_owned());
            true
        } else {
            false
        }
    }

    fn builtin(&mut self, attribute: &str, value: Option<&AttributeValue>) -> Option<String> {
        // Null attributes are absent, there is nothing to redact.
        let value = value?.to_attribute_string()?;
        if self.redact(attribute) {
            None
        } else {
            Some(value)
        }
    }

    fn anonymous(&mut self) -> Option<bool> {
        let anonymous = self.user.anonymous?;
        if self.redact("anonymous") {
            None
        } else {
            Some(anonymous)
        }
    }

    fn custom(&mut self) -> serde_json::Map<String, serde_json::Value> {
        let mut custom = serde_json::Map::new();
        for (attribute, value) in &self.user.custom {
            if !self.redact(attribute) {
                custom.insert(attribute.clone(), value.clone());
            }
        }
        custom
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user() -> User {
        User {
            name: Some("Red".into()),
            ..User::new("userkey")
        }
    }

    fn numeric_user() -> User {
        User {
            secondary: Some(2.0.into()),
            ip: Some(3.0.into()),
            country: Some(4.0.into()),
            email: Some(5.0.into()),
            first_name: Some(6.0.into()),
            last_name: Some(7.0.into()),
            avatar: Some(8.0.into()),
            name: Some(9.0.into()),
            anonymous: Some(false),
            custom: [("age".to_owned(), json!(99))].into_iter().collect(),
            ..User::new(1.0)
        }
    }

    #[test]
    fn passes_user_through_by_default() {
        let filtered = UserFilter::default().filter(&user());

        assert_eq!(
            serde_json::to_value(&filtered).unwrap(),
            json!({"key": "userkey", "name": "Red"})
        );
        assert!(!filtered.is_redacted());
    }

    #[test]
    fn all_attributes_private_keeps_only_key() {
        let filter = UserFilter::new(true, []);

        let filtered = filter.filter(&user());

        assert_eq!(
            serde_json::to_value(&filtered).unwrap(),
            json!({"key": "userkey", "privateAttrs": ["name"]})
        );
        assert!(filtered.is_redacted());
    }

    #[test]
    fn all_attributes_private_redacts_custom_attributes_individually() {
        let filter = UserFilter::new(true, []);

        let filtered = filter.filter(&numeric_user());

        assert_eq!(filtered.key, "1");
        assert!(filtered.custom.is_empty());
        assert_eq!(
            filtered.private_attrs,
            vec![
                "secondary",
                "ip",
                "country",
                "email",
                "firstName",
                "lastName",
                "avatar",
                "name",
                "anonymous",
                "age"
            ]
        );
    }

    #[test]
    fn per_user_private_attributes_redact_only_named() {
        let user = User {
            email: Some("red@example.com".into()),
            custom: [
                ("age".to_owned(), json!(42)),
                ("team".to_owned(), json!("blue")),
            ]
            .into_iter()
            .collect(),
            private_attribute_names: vec!["email".to_owned(), "team".to_owned()],
            ..user()
        };

        let filtered = UserFilter::default().filter(&user);

        assert_eq!(
            serde_json::to_value(&filtered).unwrap(),
            json!({
                "key": "userkey",
                "name": "Red",
                "custom": {"age": 42},
                "privateAttrs": ["email", "team"],
            })
        );
    }

    #[test]
    fn global_private_attribute_names_apply_to_every_user() {
        let filter = UserFilter::new(false, ["name".to_owned()]);

        let filtered = filter.filter(&user());

        assert_eq!(filtered.name, None);
        assert_eq!(filtered.private_attrs, vec!["name"]);
    }

    #[test]
    fn stringifies_builtin_attributes() {
        let filtered = UserFilter::default().filter(&numeric_user());

        assert_eq!(
            serde_json::to_value(&filtered).unwrap(),
            json!({
                "key": "1",
                "secondary": "2",
                "ip": "3",
                "country": "4",
                "email": "5",
                "firstName": "6",
                "lastName": "7",
                "avatar": "8",
                "name": "9",
                "anonymous": false,
                "custom": {"age": 99},
            })
        );
    }

    #[test]
    fn null_attributes_are_dropped_without_redaction() {
        let user = User {
            email: Some(AttributeValue::Null),
            ..User::new("k")
        };

        let filtered = UserFilter::new(true, []).filter(&user);

        assert_eq!(filtered.email, None);
        assert!(!filtered.is_redacted());
    }
}
