use crate::db::schema::users;
use chrono::{DateTime, Utc};
use diesel::{Queryable, Selectable};
use doccontrol_auth_api::{ParseRoleError, Role, UserResponse};
use uuid::Uuid;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[allow(dead_code)]
    pub updated_at: DateTime<Utc>,
    #[allow(dead_code)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> Result<Role, ParseRoleError> {
        self.role.parse()
    }

    pub fn to_response(&self) -> Result<UserResponse, ParseRoleError> {
        Ok(UserResponse {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            role: self.role()?,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}
