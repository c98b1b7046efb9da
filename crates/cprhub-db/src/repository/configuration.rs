//! SurrealDB implementation of [`ConfigurationRepository`].
//!
//! Entries are keyed by their configuration key, which doubles as the
//! record id.

use chrono::{DateTime, Utc};
use cprhub_core::error::CprResult;
use cprhub_core::models::configuration::{SystemConfiguration, UpsertConfiguration};
use cprhub_core::repository::ConfigurationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::support::{not_found, opt_uuid_str, parse_opt_uuid, write_error};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ConfigurationRow {
    config_key: String,
    config_value: String,
    description: Option<String>,
    category: String,
    updated_by: Option<String>,
    updated_at: DateTime<Utc>,
}

impl ConfigurationRow {
    fn try_into_entry(self) -> Result<SystemConfiguration, DbError> {
        Ok(SystemConfiguration {
            key: self.config_key,
            value: self.config_value,
            description: self.description,
            category: self.category,
            updated_by: parse_opt_uuid("updated_by", self.updated_by)?,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of runtime configuration storage.
#[derive(Clone)]
pub struct SurrealConfigurationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealConfigurationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ConfigurationRepository for SurrealConfigurationRepository<C> {
    async fn list(&self, category: Option<String>) -> CprResult<Vec<SystemConfiguration>> {
        let query = if category.is_some() {
            "SELECT * FROM system_configuration WHERE category = $category \
             ORDER BY config_key ASC"
        } else {
            "SELECT * FROM system_configuration ORDER BY config_key ASC"
        };
        let mut result = self
            .db
            .query(query)
            .bind(("category", category))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ConfigurationRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn get(&self, key: &str) -> CprResult<SystemConfiguration> {
        let mut result = self
            .db
            .query("SELECT * FROM system_configuration WHERE config_key = $key")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ConfigurationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found("configuration", key))?;
        Ok(row.try_into_entry()?)
    }

    async fn upsert(&self, input: UpsertConfiguration) -> CprResult<SystemConfiguration> {
        let description_set = if input.description.is_some() {
            ", description = $description"
        } else {
            ""
        };
        let query = format!(
            "UPSERT type::record('system_configuration', $key) SET \
             config_key = $key, config_value = $value, category = $category, \
             updated_by = $updated_by, updated_at = time::now(){description_set}"
        );

        self.db
            .query(&query)
            .bind(("key", input.key.clone()))
            .bind(("value", input.value))
            .bind(("category", input.category))
            .bind(("updated_by", opt_uuid_str(input.updated_by)))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| write_error("configuration", e))?;

        self.get(&input.key).await
    }

    async fn delete(&self, key: &str) -> CprResult<()> {
        let mut result = self
            .db
            .query("DELETE system_configuration WHERE config_key = $key RETURN BEFORE")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;
        let removed: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if removed.is_empty() {
            return Err(not_found("configuration", key).into());
        }
        Ok(())
    }
}
