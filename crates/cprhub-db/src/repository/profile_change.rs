//! SurrealDB implementation of [`ProfileChangeRepository`].

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::profile_change::{
    CreateProfileChange, ProfileChangeRequest, ProfileChangeStatus, ProfileField,
};
use cprhub_core::repository::ProfileChangeRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use super::support::{CountRow, not_found, parse_enum, parse_opt_uuid, parse_uuid, stale};
use crate::error::DbError;

const SELECT_FIELDS: &str = "SELECT meta::id(id) AS record_id, *";

#[derive(Debug, SurrealValue)]
struct ProfileChangeRow {
    record_id: String,
    user_id: String,
    field_name: String,
    old_value: Option<String>,
    new_value: String,
    status: String,
    review_comment: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ProfileChangeRow {
    fn try_into_request(self) -> Result<ProfileChangeRequest, DbError> {
        Ok(ProfileChangeRequest {
            id: parse_uuid("profile change", &self.record_id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            field: parse_enum::<ProfileField>("profile field", &self.field_name)?,
            old_value: self.old_value,
            new_value: self.new_value,
            status: parse_enum::<ProfileChangeStatus>("profile change status", &self.status)?,
            review_comment: self.review_comment,
            reviewed_by: parse_opt_uuid("reviewed_by", self.reviewed_by)?,
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the ProfileChange repository.
#[derive(Clone)]
pub struct SurrealProfileChangeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealProfileChangeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<ProfileChangeRequest, DbError> {
        let query = format!("{SELECT_FIELDS} FROM type::record('profile_change_request', $id)");
        let mut result = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<ProfileChangeRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| not_found("profile change", id))?
            .try_into_request()
    }

    async fn list_where(
        &self,
        condition: &str,
        value: Option<String>,
    ) -> CprResult<Vec<ProfileChangeRequest>> {
        let query = format!(
            "{SELECT_FIELDS} FROM profile_change_request WHERE {condition} \
             ORDER BY created_at ASC"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("value", value))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ProfileChangeRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_request())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn email_taken(&self, email: &str, user_id: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE email = $email AND meta::id(id) != $user_id GROUP ALL",
            )
            .bind(("email", email.to_string()))
            .bind(("user_id", user_id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    async fn pending_count(&self, user_id: &str, field: ProfileField) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM profile_change_request \
                 WHERE user_id = $user_id AND field_name = $field_name \
                 AND status = 'pending' GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("field_name", field.as_str()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}

impl<C: Connection> ProfileChangeRepository for SurrealProfileChangeRepository<C> {
    async fn create(&self, input: CreateProfileChange) -> CprResult<ProfileChangeRequest> {
        let id = Uuid::new_v4().to_string();
        let user_id = input.user_id.to_string();

        let outcome = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 LET $open = (SELECT VALUE meta::id(id) FROM profile_change_request \
                     WHERE user_id = $user_id AND field_name = $field_name \
                     AND status = 'pending'); \
                 IF array::len($open) > 0 { THROW 'pending profile change exists' }; \
                 CREATE type::record('profile_change_request', $id) SET \
                     user_id = $user_id, field_name = $field_name, \
                     old_value = $old_value, new_value = $new_value, \
                     status = 'pending'; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.clone()))
            .bind(("user_id", user_id.clone()))
            .bind(("field_name", input.field.as_str()))
            .bind(("old_value", input.old_value))
            .bind(("new_value", input.new_value))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(user_id = %user_id, error = %e, "Profile change creation rolled back");
            return Err(if self.pending_count(&user_id, input.field).await? > 0 {
                DbError::Duplicate {
                    entity: format!("pending {} change", input.field),
                }
            } else {
                DbError::Query(e.to_string())
            }
            .into());
        }

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<ProfileChangeRequest> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> CprResult<Vec<ProfileChangeRequest>> {
        self.list_where("user_id = $value", Some(user_id.to_string()))
            .await
    }

    async fn list(
        &self,
        status: Option<ProfileChangeStatus>,
    ) -> CprResult<Vec<ProfileChangeRequest>> {
        match status {
            Some(status) => {
                self.list_where("status = $value", Some(status.as_str().to_string()))
                    .await
            }
            None => self.list_where("true", None).await,
        }
    }

    async fn approve(
        &self,
        id: Uuid,
        reviewer: Uuid,
        comment: Option<String>,
    ) -> CprResult<ProfileChangeRequest> {
        let id_str = id.to_string();
        let request = self.fetch(&id_str).await?;

        // The column name comes from a closed enum.
        let column = request.field.as_str();
        let query = format!(
            "BEGIN TRANSACTION; \
             LET $request = (UPDATE type::record('profile_change_request', $id) SET \
                 status = 'approved', review_comment = $comment, \
                 reviewed_by = $reviewer, reviewed_at = time::now() \
                 WHERE status = 'pending'); \
             IF array::len($request) = 0 {{ THROW 'profile change changed concurrently' }}; \
             UPDATE type::record('user', $user_id) SET \
                 {column} = $new_value, updated_at = time::now(); \
             COMMIT TRANSACTION;"
        );

        let outcome = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("comment", comment))
            .bind(("reviewer", reviewer.to_string()))
            .bind(("user_id", request.user_id.to_string()))
            .bind(("new_value", request.new_value.clone()))
            .await
            .map_err(DbError::from)?
            .check();

        if let Err(e) = outcome {
            debug!(profile_change_id = %id, error = %e, "Approval rolled back");
            let current = self.fetch(&id_str).await?;
            return Err(if current.status != ProfileChangeStatus::Pending {
                DbError::Conflict(format!(
                    "profile change {id} is {}, expected pending",
                    current.status
                ))
            } else if request.field == ProfileField::Email
                && self.email_taken(&request.new_value, &request.user_id.to_string()).await?
            {
                DbError::Duplicate {
                    entity: "user email".into(),
                }
            } else {
                DbError::Query(e.to_string())
            }
            .into());
        }

        Ok(self.fetch(&id_str).await?)
    }

    async fn reject(
        &self,
        id: Uuid,
        reviewer: Uuid,
        comment: Option<String>,
    ) -> CprResult<ProfileChangeRequest> {
        let id_str = id.to_string();
        let mut result = self
            .db
            .query(
                "UPDATE type::record('profile_change_request', $id) SET \
                 status = 'rejected', review_comment = $comment, \
                 reviewed_by = $reviewer, reviewed_at = time::now() \
                 WHERE status = 'pending'",
            )
            .bind(("id", id_str.clone()))
            .bind(("comment", comment))
            .bind(("reviewer", reviewer.to_string()))
            .await
            .map_err(DbError::from)?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(stale(
                &self.db,
                "profile_change_request",
                "profile change",
                &id_str,
                "pending",
            )
            .await
            .into());
        }
        Ok(self.fetch(&id_str).await?)
    }
}
