//! RBAC subjects, and the mapping between a subject and the flat user name that legacy
//! RoleBindings carry in `userNames`.
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use std::fmt::{self, Display};

pub const SERVICE_ACCOUNT_USER_PREFIX: &str = "system:serviceaccount:";

lazy_static! {
    static ref SERVICE_ACCOUNT_USER_REGEX: Regex =
        Regex::new("^system:serviceaccount:([^:]+):([^:]+)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubjectKind {
    User,
    ServiceAccount,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            SubjectKind::User => "User",
            SubjectKind::ServiceAccount => "ServiceAccount",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Subject {
    pub kind: SubjectKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Subject {
        Subject {
            kind: SubjectKind::User,
            namespace: None,
            name: name.into(),
        }
    }

    pub fn service_account(namespace: impl Into<String>, name: impl Into<String>) -> Subject {
        Subject {
            kind: SubjectKind::ServiceAccount,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Parses a user name as used by `oc policy`. Names of the form
    /// `system:serviceaccount:<namespace>:<name>` become a ServiceAccount subject, anything else
    /// is a plain User.
    pub fn from_username(username: &str) -> Subject {
        match SERVICE_ACCOUNT_USER_REGEX.captures(username) {
            Some(captures) => Subject::service_account(&captures[1], &captures[2]),
            None => Subject::user(username),
        }
    }

    /// True exactly when `from_username` would return a ServiceAccount subject
    pub fn is_service_account_username(username: &str) -> bool {
        SERVICE_ACCOUNT_USER_REGEX.is_match(username)
    }

    /// The flat name that goes into a RoleBinding's `userNames`
    pub fn username(&self) -> String {
        match self.kind {
            SubjectKind::User => self.name.clone(),
            SubjectKind::ServiceAccount => format!(
                "{}{}:{}",
                SERVICE_ACCOUNT_USER_PREFIX,
                self.namespace.as_deref().unwrap_or(""),
                self.name
            ),
        }
    }

    /// Returns true if `value` is a subject entry with the same kind, name and namespace
    pub fn matches(&self, value: &Value) -> bool {
        let kind = value.get("kind").and_then(Value::as_str);
        let name = value.get("name").and_then(Value::as_str);
        let namespace = value
            .get("namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty());
        kind == Some(self.kind.as_str())
            && name == Some(self.name.as_str())
            && namespace == self.namespace.as_deref()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Derives the `userNames` entry for an existing subject entry. Subjects that have no flat
    /// user name (groups, for instance) return `None`.
    pub fn username_of(value: &Value) -> Option<String> {
        let name = value.get("name").and_then(Value::as_str)?;
        match value.get("kind").and_then(Value::as_str)? {
            "User" => Some(name.to_owned()),
            "ServiceAccount" => {
                let namespace = value.get("namespace").and_then(Value::as_str).unwrap_or("");
                Some(format!("{}{}:{}", SERVICE_ACCOUNT_USER_PREFIX, namespace, name))
            }
            _ => None,
        }
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} '{}'", self.kind.as_str(), self.username())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_username_is_a_user_subject() {
        let subject = Subject::from_username("alice");
        assert_eq!(Subject::user("alice"), subject);
        assert_eq!(json!({"kind": "User", "name": "alice"}), subject.to_value());
        assert_eq!("alice", subject.username());
    }

    #[test]
    fn service_account_username_is_parsed() {
        let subject = Subject::from_username("system:serviceaccount:ns2:sa1");
        assert_eq!(Subject::service_account("ns2", "sa1"), subject);
        assert_eq!(
            json!({"kind": "ServiceAccount", "namespace": "ns2", "name": "sa1"}),
            subject.to_value()
        );
        assert_eq!("system:serviceaccount:ns2:sa1", subject.username());
        assert!(Subject::is_service_account_username("system:serviceaccount:ns2:sa1"));
    }

    #[test]
    fn malformed_service_account_username_falls_back_to_user() {
        let subject = Subject::from_username("system:serviceaccount:only-namespace");
        assert_eq!(SubjectKind::User, subject.kind);
        assert!(!Subject::is_service_account_username("system:serviceaccount:only-namespace"));
        assert!(!Subject::is_service_account_username("system:serviceaccount:ns:sa:extra"));
    }

    #[test]
    fn matches_compares_kind_name_and_namespace() {
        let subject = Subject::service_account("ns2", "sa1");
        assert!(subject.matches(&json!({"kind": "ServiceAccount", "namespace": "ns2", "name": "sa1"})));
        assert!(!subject.matches(&json!({"kind": "ServiceAccount", "namespace": "ns3", "name": "sa1"})));
        assert!(!subject.matches(&json!({"kind": "User", "name": "sa1"})));
        assert!(Subject::user("bob").matches(&json!({"kind": "User", "name": "bob", "namespace": ""})));
    }

    #[test]
    fn username_of_existing_subjects() {
        assert_eq!(
            Some("system:serviceaccount:ns:jenkins".to_owned()),
            Subject::username_of(&json!({"kind": "ServiceAccount", "namespace": "ns", "name": "jenkins"}))
        );
        assert_eq!(None, Subject::username_of(&json!({"kind": "Group", "name": "devs"})));
    }
}
