//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided at construction time.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, NaiveDate, Utc};
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::user::{CreateUser, DependentRecords, UpdateUser, User};
use softdesk_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, first_total, parse_uuid, retry_on_conflict};
use crate::error::DbError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// DB-side row struct; the record ID comes from `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    tenant_id: String,
    username: String,
    email: String,
    password_hash: String,
    is_staff: bool,
    is_superuser: bool,
    date_birth: String,
    can_be_contacted: bool,
    can_data_be_collected: bool,
    can_data_be_shared: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let date_birth = NaiveDate::parse_from_str(&self.date_birth, DATE_FORMAT)
            .map_err(|e| DbError::invalid("user", format!("invalid date_birth: {e}")))?;
        Ok(User {
            id: parse_uuid("user", &self.record_id)?,
            tenant_id: parse_uuid("user", &self.tenant_id)?,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_staff: self.is_staff,
            is_superuser: self.is_superuser,
            date_birth,
            can_be_contacted: self.can_be_contacted,
            can_data_be_collected: self.can_data_be_collected,
            can_data_be_shared: self.can_data_be_shared,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Hash a password with Argon2id using OWASP-recommended parameters.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, SoftdeskError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| SoftdeskError::Crypto(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| SoftdeskError::Crypto(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    /// One attempt at the conditional delete; `true` when the row is gone.
    ///
    /// The dependents are re-checked inside the DELETE itself. A write that
    /// starts referencing the user bumps its `revision` in the same
    /// statement, so it and this DELETE cannot both commit.
    async fn try_delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "DELETE type::record('user', $id) \
                 WHERE tenant_id = $tenant_id \
                 AND array::len((SELECT VALUE id FROM comment \
                     WHERE author_id = $id)) = 0 \
                 AND array::len((SELECT VALUE id FROM issue \
                     WHERE author_id = $id OR attribution_id = $id)) = 0 \
                 AND array::len((SELECT VALUE id FROM project \
                     WHERE author_id = $id)) = 0 \
                 AND array::len((SELECT VALUE id FROM contributes_to \
                     WHERE in = type::record('user', $id))) = 0 \
                 RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(|e| DbError::from_statement(e, "user"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "user"))?;

        let deleted: Vec<surrealdb_types::Value> = result.take(0)?;
        Ok(!deleted.is_empty())
    }

    async fn fetch_one(
        &self,
        query: &str,
        bindings: Vec<(&'static str, String)>,
        id: String,
    ) -> SoftdeskResult<User> {
        let mut builder = self.db.query(query.to_string());
        for binding in bindings {
            builder = builder.bind(binding);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id,
        })?;

        Ok(row.try_into_user()?)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> SoftdeskResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 tenant_id = $tenant_id, \
                 username = $username, email = $email, \
                 password_hash = $password_hash, \
                 is_staff = $is_staff, is_superuser = $is_superuser, \
                 date_birth = $date_birth, \
                 can_be_contacted = $can_be_contacted, \
                 can_data_be_collected = $can_data_be_collected, \
                 can_data_be_shared = $can_data_be_shared; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('user', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("password_hash", password_hash))
            .bind(("is_staff", input.is_staff))
            .bind(("is_superuser", input.is_superuser))
            .bind(("date_birth", input.date_birth.format(DATE_FORMAT).to_string()))
            .bind(("can_be_contacted", input.can_be_contacted))
            .bind(("can_data_be_collected", input.can_data_be_collected))
            .bind(("can_data_be_shared", input.can_data_be_shared))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "user"))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> SoftdeskResult<User> {
        let id_str = id.to_string();
        self.fetch_one(
            "SELECT meta::id(id) AS record_id, * FROM type::record('user', $id) \
             WHERE tenant_id = $tenant_id",
            vec![("id", id_str.clone()), ("tenant_id", tenant_id.to_string())],
            id_str,
        )
        .await
    }

    async fn get_by_username(&self, tenant_id: Uuid, username: &str) -> SoftdeskResult<User> {
        self.fetch_one(
            "SELECT meta::id(id) AS record_id, * FROM user \
             WHERE tenant_id = $tenant_id AND username = $username",
            vec![
                ("tenant_id", tenant_id.to_string()),
                ("username", username.to_string()),
            ],
            format!("username={username}"),
        )
        .await
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdateUser) -> SoftdeskResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.username.is_some() {
            sets.push("username = $username");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.is_staff.is_some() {
            sets.push("is_staff = $is_staff");
        }
        if input.date_birth.is_some() {
            sets.push("date_birth = $date_birth");
        }
        if input.can_be_contacted.is_some() {
            sets.push("can_be_contacted = $can_be_contacted");
        }
        if input.can_data_be_collected.is_some() {
            sets.push("can_data_be_collected = $can_data_be_collected");
        }
        if input.can_data_be_shared.is_some() {
            sets.push("can_data_be_shared = $can_data_be_shared");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} \
             WHERE tenant_id = $tenant_id; \
             SELECT meta::id(id) AS record_id, * FROM type::record('user', $id) \
             WHERE tenant_id = $tenant_id;",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(username) = input.username {
            builder = builder.bind(("username", username));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(is_staff) = input.is_staff {
            builder = builder.bind(("is_staff", is_staff));
        }
        if let Some(date_birth) = input.date_birth {
            builder = builder.bind(("date_birth", date_birth.format(DATE_FORMAT).to_string()));
        }
        if let Some(flag) = input.can_be_contacted {
            builder = builder.bind(("can_be_contacted", flag));
        }
        if let Some(flag) = input.can_data_be_collected {
            builder = builder.bind(("can_data_be_collected", flag));
        }
        if let Some(flag) = input.can_data_be_shared {
            builder = builder.bind(("can_data_be_shared", flag));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "user"))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn dependents(&self, tenant_id: Uuid, id: Uuid) -> SoftdeskResult<DependentRecords> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM comment \
                 WHERE tenant_id = $tenant_id AND author_id = $id GROUP ALL; \
                 SELECT count() AS total FROM issue \
                 WHERE tenant_id = $tenant_id AND author_id = $id GROUP ALL; \
                 SELECT count() AS total FROM issue \
                 WHERE tenant_id = $tenant_id AND attribution_id = $id GROUP ALL; \
                 SELECT count() AS total FROM project \
                 WHERE tenant_id = $tenant_id AND author_id = $id GROUP ALL; \
                 SELECT count() AS total FROM contributes_to \
                 WHERE tenant_id = $tenant_id \
                 AND in = type::record('user', $id) GROUP ALL;",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut totals = [0u64; 5];
        for (index, total) in totals.iter_mut().enumerate() {
            let rows: Vec<CountRow> = result.take(index).map_err(DbError::from)?;
            *total = first_total(&rows);
        }
        let [authored_comments, authored_issues, assigned_issues, authored_projects, memberships] =
            totals;

        Ok(DependentRecords {
            authored_comments,
            authored_issues,
            assigned_issues,
            authored_projects,
            memberships,
        })
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> SoftdeskResult<()> {
        if retry_on_conflict(move || self.try_delete(tenant_id, id)).await? {
            return Ok(());
        }

        match self.dependents(tenant_id, id).await?.first_blocking() {
            Some(kind) => Err(SoftdeskError::HasDependentRecords(kind)),
            None => Err(DbError::NotFound {
                entity: "user".into(),
                id: id.to_string(),
            }
            .into()),
        }
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<User>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE tenant_id = $tenant_id GROUP ALL; \
                 SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset;",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = first_total(&count_rows);

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
