use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please enter a username")]
    MissingUsername,
    #[error("Please enter a class name")]
    MissingClassName,
}

/// Who is taking the test. Created on the username screen and handed to every
/// screen after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
    class_name: String,
}

impl Session {
    pub fn new(username: &str, class_name: &str) -> Result<Self, SessionError> {
        let username = username.trim();
        let class_name = class_name.trim();
        if username.is_empty() {
            return Err(SessionError::MissingUsername);
        }
        if class_name.is_empty() {
            return Err(SessionError::MissingClassName);
        }
        Ok(Self {
            username: username.to_string(),
            class_name: class_name.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_both_fields() {
        let s = Session::new("  amy ", "3B\n").unwrap();
        assert_eq!(s.username(), "amy");
        assert_eq!(s.class_name(), "3B");
    }

    #[test]
    fn rejects_blank_fields() {
        assert_eq!(Session::new(" ", "3B"), Err(SessionError::MissingUsername));
        assert_eq!(Session::new("amy", ""), Err(SessionError::MissingClassName));
    }
}
