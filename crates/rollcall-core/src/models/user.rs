use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Instructor,
}

impl UserRole {
    pub fn display_name(&self) -> &'static str {
        match self {
            UserRole::Student => "Student",
            UserRole::Instructor => "Instructor",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The signed-in account as reported by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(rename = "user_id")]
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "type")]
    pub role: UserRole,
}

impl User {
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => self.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_wire_names() {
        let json = r#"{"user_id":"7f1c","email":"a@b.com","first_name":"Ada","last_name":"Byron","type":"instructor"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.id, "7f1c");
        assert_eq!(user.role, UserRole::Instructor);
        assert_eq!(user.full_name(), "Ada Byron");

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["user_id"], "7f1c");
        assert_eq!(back["type"], "instructor");
    }

    #[test]
    fn test_full_name_falls_back_to_email() {
        let user = User {
            id: "1".to_string(),
            email: "x@y.org".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role: UserRole::Student,
        };
        assert_eq!(user.full_name(), "x@y.org");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let json = r#"{"user_id":"1","email":"a@b.com","first_name":"A","last_name":"B","type":"admin"}"#;
        assert!(serde_json::from_str::<User>(json).is_err());
    }
}
