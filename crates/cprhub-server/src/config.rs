//! Command line and environment configuration.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cprhub_auth::{password, AuthConfig};
use cprhub_core::error::{CprError, CprResult};
use cprhub_core::models::user::{CreateUser, Role, User};
use cprhub_core::repository::{OrganizationRepository, UserRepository};
use cprhub_db::repository::{SurrealOrganizationRepository, SurrealUserRepository};
use cprhub_db::DbConfig;
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::state::ApiConfig;

#[derive(Debug, Parser)]
#[command(name = "cprhub")]
#[command(about = "CPR training business management server")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply migrations and start the API server
    Serve {
        #[command(flatten)]
        auth: AuthArgs,
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Apply schema migrations and exit
    Migrate,

    /// Create an account, e.g. the first sysadmin
    CreateUser(CreateUserArgs),
}

#[derive(Debug, Args)]
pub struct CreateUserArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    /// Read from the environment to keep it out of shell history
    #[arg(long, env = "CPRHUB_NEW_USER_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long, default_value = "sysadmin")]
    pub role: Role,
    #[arg(long)]
    pub full_name: String,
    /// Required for the organization role
    #[arg(long)]
    pub organization_id: Option<Uuid>,
    #[arg(long, env = "CPRHUB_PASSWORD_PEPPER", hide_env_values = true)]
    pub password_pepper: Option<String>,
    #[arg(long, env = "CPRHUB_MIN_PASSWORD_LENGTH", default_value_t = 10)]
    pub min_password_length: usize,
}

impl CreateUserArgs {
    /// Checks that need no database: the same rules the sysadmin API applies.
    pub fn validate(&self) -> CprResult<()> {
        password::check_policy(&self.password, self.min_password_length)?;
        if !self.email.contains('@') {
            return Err(CprError::validation(format!(
                "invalid email address: {}",
                self.email
            )));
        }
        if self.role == Role::Organization && self.organization_id.is_none() {
            return Err(CprError::validation(
                "organization users must reference an organization",
            ));
        }
        Ok(())
    }

    /// Validate, confirm the linked organization exists and store the user.
    pub async fn provision<C: Connection>(self, db: &Surreal<C>) -> CprResult<User> {
        self.validate()?;
        if let Some(id) = self.organization_id {
            SurrealOrganizationRepository::new(db.clone())
                .get_by_id(id)
                .await?;
        }

        let users = match self.password_pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper),
            None => SurrealUserRepository::new(db.clone()),
        };
        users
            .create(CreateUser {
                username: self.username.trim().to_string(),
                email: self.email.trim().to_string(),
                password: self.password,
                role: self.role,
                full_name: self.full_name.trim().to_string(),
                phone: None,
                organization_id: self.organization_id,
            })
            .await
    }
}

#[derive(Debug, Args)]
pub struct DbArgs {
    /// SurrealDB endpoint (`mem://`, `ws://host:port`)
    #[arg(long, env = "CPRHUB_DB_URL", default_value = "mem://", global = true)]
    pub db_url: String,

    #[arg(long, env = "CPRHUB_DB_NAMESPACE", default_value = "cprhub", global = true)]
    pub db_namespace: String,

    #[arg(long, env = "CPRHUB_DB_DATABASE", default_value = "main", global = true)]
    pub db_database: String,

    #[arg(long, env = "CPRHUB_DB_USERNAME", global = true)]
    pub db_username: Option<String>,

    #[arg(long, env = "CPRHUB_DB_PASSWORD", hide_env_values = true, global = true)]
    pub db_password: Option<String>,
}

impl From<DbArgs> for DbConfig {
    fn from(args: DbArgs) -> Self {
        Self {
            url: args.db_url,
            namespace: args.db_namespace,
            database: args.db_database,
            username: args.db_username,
            password: args.db_password,
        }
    }
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    /// Ed25519 private key (PEM) used to sign access tokens
    #[arg(long, env = "CPRHUB_JWT_PRIVATE_KEY")]
    pub jwt_private_key: PathBuf,

    /// Ed25519 public key (PEM) used to verify access tokens
    #[arg(long, env = "CPRHUB_JWT_PUBLIC_KEY")]
    pub jwt_public_key: PathBuf,

    #[arg(long, env = "CPRHUB_JWT_ISSUER", default_value = "cprhub")]
    pub jwt_issuer: String,

    #[arg(long, env = "CPRHUB_ACCESS_TOKEN_LIFETIME_SECS", default_value_t = 28_800)]
    pub access_token_lifetime_secs: u64,

    #[arg(long, env = "CPRHUB_PASSWORD_PEPPER", hide_env_values = true)]
    pub password_pepper: Option<String>,

    #[arg(long, env = "CPRHUB_MIN_PASSWORD_LENGTH", default_value_t = 10)]
    pub min_password_length: usize,
}

impl AuthArgs {
    /// Read the key files and build the auth configuration.
    pub fn load(self) -> std::io::Result<AuthConfig> {
        Ok(AuthConfig {
            jwt_private_key_pem: std::fs::read_to_string(&self.jwt_private_key)?,
            jwt_public_key_pem: std::fs::read_to_string(&self.jwt_public_key)?,
            access_token_lifetime_secs: self.access_token_lifetime_secs,
            jwt_issuer: self.jwt_issuer,
            pepper: self.password_pepper,
            min_password_length: self.min_password_length,
        })
    }
}

#[derive(Debug, Args)]
pub struct ApiArgs {
    #[arg(short = 'H', long, env = "CPRHUB_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "CPRHUB_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Allow cross-origin requests from any origin
    #[arg(long, env = "CPRHUB_CORS")]
    pub cors: bool,

    /// Seconds between token blacklist sweeps, 0 to disable
    #[arg(long, env = "CPRHUB_BLACKLIST_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub blacklist_cleanup_interval_secs: u64,
}

impl From<ApiArgs> for ApiConfig {
    fn from(args: ApiArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            enable_cors: args.cors,
            blacklist_cleanup_interval_secs: args.blacklist_cleanup_interval_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_parses_flags() {
        let cli = Cli::try_parse_from([
            "cprhub",
            "serve",
            "--jwt-private-key",
            "priv.pem",
            "--jwt-public-key",
            "pub.pem",
            "--port",
            "9000",
            "--cors",
        ])
        .unwrap();

        match cli.command {
            Command::Serve { api, auth } => {
                let api = ApiConfig::from(api);
                assert_eq!(api.port, 9000);
                assert!(api.enable_cors);
                assert_eq!(auth.jwt_issuer, "cprhub");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(DbConfig::from(cli.db).url, "mem://");
    }

    #[test]
    fn create_user_defaults_to_sysadmin() {
        let cli = Cli::try_parse_from([
            "cprhub",
            "create-user",
            "--username",
            "root",
            "--email",
            "root@example.com",
            "--password",
            "long-enough-password",
            "--full-name",
            "Root",
        ])
        .unwrap();
        match cli.command {
            Command::CreateUser(args) => {
                assert_eq!(args.role, Role::Sysadmin);
                assert_eq!(args.min_password_length, 10);
                assert!(args.validate().is_ok());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn create_user_args(extra: &[&str]) -> CreateUserArgs {
        let mut argv = vec![
            "cprhub",
            "create-user",
            "--username",
            "billing",
            "--email",
            "billing@harbourview.example.com",
            "--password",
            "long-enough-password",
            "--full-name",
            "Harbourview Billing",
        ];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::CreateUser(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn create_user_honours_password_policy() {
        let args = create_user_args(&["--min-password-length", "32"]);
        assert!(matches!(
            args.validate(),
            Err(CprError::Validation { .. })
        ));
    }

    #[test]
    fn organization_user_needs_an_organization() {
        let args = create_user_args(&["--role", "organization"]);
        assert!(matches!(
            args.validate(),
            Err(CprError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn provision_checks_the_linked_organization() {
        let db = surrealdb::engine::any::connect("mem://").await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        cprhub_db::run_migrations(&db).await.unwrap();

        let unknown = Uuid::new_v4().to_string();
        let args = create_user_args(&[
            "--role",
            "organization",
            "--organization-id",
            unknown.as_str(),
        ]);
        let err = args
            .provision(&db)
            .await
            .unwrap_err();
        assert!(matches!(err, CprError::NotFound { .. }), "{err:?}");

        let user = create_user_args(&[]).provision(&db).await.unwrap();
        assert_eq!(user.role, Role::Sysadmin);
        assert!(user.organization_id.is_none());
    }
}
