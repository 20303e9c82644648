use crate::application::ApplicationError;
use crate::domain::model::UserId;

use std::fmt;

/// ロール
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Member,
    Staff,
    Admin,
}

impl Role {
    /// 文字列からRoleを作成（大文字小文字は区別しない）
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "member" => Some(Role::Member),
            "staff" => Some(Role::Staff),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self {
            Role::User => "User",
            Role::Member => "Member",
            Role::Staff => "Staff",
            Role::Admin => "Admin",
        };
        write!(f, "{}", role)
    }
}

/// 認証済みの呼び出し元
/// すべてのユースケースに明示的な引数として渡される
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(user_id: UserId, email: String, display_name: String, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            email,
            display_name,
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// 指定ロールのいずれかを持っていることを要求する
    pub fn require_any(&self, roles: &[Role]) -> Result<(), ApplicationError> {
        if roles.iter().any(|role| self.has_role(*role)) {
            return Ok(());
        }
        let required = roles
            .iter()
            .map(|role| role.to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        Err(ApplicationError::Unauthorized(format!(
            "This action requires the {} role.",
            required
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_any() {
        let actor = Actor::new(
            UserId::new(),
            "staff@example.com".to_string(),
            "Sam".to_string(),
            vec![Role::Staff],
        );
        assert!(actor.require_any(&[Role::Staff, Role::Admin]).is_ok());
        let err = actor.require_any(&[Role::User, Role::Member]).unwrap_err();
        assert_eq!(err.to_string(), "This action requires the User or Member role.");
    }

    #[test]
    fn test_role_from_string() {
        assert_eq!(Role::from_string(" ADMIN "), Some(Role::Admin));
        assert_eq!(Role::from_string("guest"), None);
    }
}
