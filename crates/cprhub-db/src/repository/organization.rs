//! SurrealDB implementation of [`OrganizationRepository`].

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::organization::{CreateOrganization, Organization, UpdateOrganization};
use cprhub_core::repository::{OrganizationRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{CountRow, not_found, parse_uuid, write_error};
use crate::error::DbError;

const SELECT_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
     FROM type::record('organization', $id)";

#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    record_id: String,
    name: String,
    contact_email: String,
    contact_phone: Option<String>,
    address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrganizationRow {
    fn try_into_organization(self) -> Result<Organization, DbError> {
        Ok(Organization {
            id: parse_uuid("organization", &self.record_id)?,
            name: self.name,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            address: self.address,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Organization repository.
#[derive(Clone)]
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<Organization, DbError> {
        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<OrganizationRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| not_found("organization", id))?
            .try_into_organization()
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn create(&self, input: CreateOrganization) -> CprResult<Organization> {
        let id = Uuid::new_v4().to_string();

        self.db
            .query(
                "CREATE type::record('organization', $id) SET \
                 name = $name, contact_email = $contact_email, \
                 contact_phone = $contact_phone, address = $address",
            )
            .bind(("id", id.clone()))
            .bind(("name", input.name))
            .bind(("contact_email", input.contact_email))
            .bind(("contact_phone", input.contact_phone))
            .bind(("address", input.address))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("organization", e))?;

        Ok(self.fetch(&id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CprResult<Organization> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn update(&self, id: Uuid, input: UpdateOrganization) -> CprResult<Organization> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.contact_email.is_some() {
            sets.push("contact_email = $contact_email");
        }
        if input.contact_phone.is_some() {
            sets.push("contact_phone = $contact_phone");
        }
        if input.address.is_some() {
            sets.push("address = $address");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('organization', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(contact_email) = input.contact_email {
            builder = builder.bind(("contact_email", contact_email));
        }
        if let Some(contact_phone) = input.contact_phone {
            builder = builder.bind(("contact_phone", contact_phone));
        }
        if let Some(address) = input.address {
            builder = builder.bind(("address", address));
        }

        let mut result = builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("organization", e))?;
        let updated: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(not_found("organization", id).into());
        }

        Ok(self.fetch(&id_str).await?)
    }

    async fn list(&self, pagination: Pagination) -> CprResult<PaginatedResult<Organization>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM organization GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM organization \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<OrganizationRow> = result.take(1).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_organization())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
