use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Owner,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Owner => write!(f, "owner"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

/// 已认证的请求者 (由鉴权中间件注入请求扩展)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// 路由级角色限制
    pub fn ensure_role(&self, allowed: &[UserRole]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::UnauthorizedAccess(format!(
                "User role {} is not authorized to access this route",
                self.role
            )))
        }
    }

    /// 预订/设施预订的修改权限:
    /// - admin: 全部允许
    /// - owner: 营地归自己所有, 或记录本身属于自己
    /// - user: 仅记录属于自己
    pub fn can_manage(&self, camp_owner_id: i64, record_user_id: i64) -> bool {
        match self.role {
            UserRole::Admin => true,
            UserRole::Owner => camp_owner_id == self.id || record_user_id == self.id,
            UserRole::User => record_user_id == self.id,
        }
    }

    pub fn ensure_can_manage(&self, camp_owner_id: i64, record_user_id: i64) -> AppResult<()> {
        if self.can_manage(camp_owner_id, record_user_id) {
            Ok(())
        } else {
            Err(AppError::UnauthorizedAccess(format!(
                "User {} is not authorized to modify this booking",
                self.id
            )))
        }
    }

    /// 营地级资源 (设施目录) 的管理权限: admin 或营地所有者
    pub fn ensure_camp_owner(&self, camp_owner_id: i64) -> AppResult<()> {
        match self.role {
            UserRole::Admin => Ok(()),
            UserRole::Owner if camp_owner_id == self.id => Ok(()),
            _ => Err(AppError::UnauthorizedAccess(format!(
                "User {} does not own this campground",
                self.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i64 = 10;
    const RENTER: i64 = 20;

    fn who(id: i64, role: UserRole) -> CurrentUser {
        CurrentUser { id, role }
    }

    #[test]
    fn test_admin_always_allowed() {
        assert!(who(1, UserRole::Admin).can_manage(OWNER, RENTER));
    }

    #[test]
    fn test_owner_rules() {
        assert!(who(OWNER, UserRole::Owner).can_manage(OWNER, RENTER));
        // 非本营地 owner 但记录属于自己
        assert!(who(RENTER, UserRole::Owner).can_manage(OWNER, RENTER));
        assert!(!who(99, UserRole::Owner).can_manage(OWNER, RENTER));
    }

    #[test]
    fn test_user_rules() {
        assert!(who(RENTER, UserRole::User).can_manage(OWNER, RENTER));
        // user 即使 id 与营地 owner 相同也不能越权
        assert!(!who(OWNER, UserRole::User).can_manage(OWNER, RENTER));
        assert!(matches!(
            who(30, UserRole::User).ensure_can_manage(OWNER, RENTER),
            Err(AppError::UnauthorizedAccess(_))
        ));
    }

    #[test]
    fn test_role_gate() {
        let user = who(RENTER, UserRole::User);
        assert!(user.ensure_role(&[UserRole::Admin, UserRole::Owner]).is_err());
        assert!(user.ensure_role(&[UserRole::User]).is_ok());
        assert!(who(OWNER, UserRole::Owner).ensure_camp_owner(OWNER).is_ok());
        assert!(who(RENTER, UserRole::Owner).ensure_camp_owner(OWNER).is_err());
    }
}
