use chrono::{Duration, Utc};
use entity::{profiles, sessions, users};
use platform_authn::ProfileRecord;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};
use tracing::info;
use uuid::Uuid;

use crate::{DbError, DbPool, DbResult};

pub async fn upsert_user(
    pool: &DbPool,
    email: &str,
    display_name: Option<String>,
) -> DbResult<users::Model> {
    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(pool)
        .await?;
    if let Some(user) = existing {
        let mut active: users::ActiveModel = user.into();
        active.display_name = Set(display_name);
        return Ok(active.update(pool).await?);
    }
    let model = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        display_name: Set(display_name),
        created_at: Set(Utc::now().into()),
    };
    let user = model.insert(pool).await?;
    info!(user_id = %user.id, "user created");
    Ok(user)
}

/// Attach or replace the profile of an existing user.
pub async fn set_profile(pool: &DbPool, user_id: Uuid, record: ProfileRecord) -> DbResult<()> {
    if users::Entity::find_by_id(user_id).one(pool).await?.is_none() {
        return Err(DbError::UserNotFound(user_id.to_string()));
    }
    let model = profiles::ActiveModel {
        user_id: Set(user_id),
        role: Set(record.role.as_str().to_string()),
        grade: Set(record.profile.grade().map(|grade| i16::from(grade.value()))),
        created_at: Set(Utc::now().into()),
    };
    profiles::Entity::insert(model)
        .on_conflict(
            OnConflict::column(profiles::Column::UserId)
                .update_columns([profiles::Column::Role, profiles::Column::Grade])
                .to_owned(),
        )
        .exec(pool)
        .await?;
    Ok(())
}

pub async fn open_session(
    pool: &DbPool,
    user_id: Uuid,
    ttl: Duration,
    user_agent: Option<String>,
) -> DbResult<sessions::Model> {
    let now = Utc::now();
    let model = sessions::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: Set(now.into()),
        expires_at: Set((now + ttl).into()),
        user_agent: Set(user_agent),
    };
    Ok(model.insert(pool).await?)
}
