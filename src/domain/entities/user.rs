//! Session identity and cash position.

use chrono::NaiveDateTime;

/// A row of `USER_INFO`, looked up by its unique username.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub creation_tmsp: NaiveDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Cash balance derived from `USER_DEPOSITS`: total deposits minus total withdrawals.
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub user_id: i64,
    pub balance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let user = User {
            user_id: 1,
            username: "jdoe".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            creation_tmsp: chrono::DateTime::from_timestamp(0, 0).unwrap().naive_utc(),
        };
        assert_eq!(user.full_name(), "Jane Doe");
    }
}
