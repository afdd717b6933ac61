use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use store::{
    Account, AccountStore, OAuthStateStore, PendingLogin, Profile, ProfileStore, StoreError,
    StoreResult, Task, TaskStore,
};
use uuid::Uuid;

/// PostgreSQL-backed store.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
    provider: String,
    provider_id: String,
    password_hash: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            avatar_url: row.avatar_url,
            provider: row.provider,
            provider_id: row.provider_id,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    name: Option<String>,
    phone_number: Option<String>,
    school: Option<String>,
    department: Option<String>,
    student_id: Option<String>,
    avatar_url: Option<String>,
    is_profile_completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            phone_number: row.phone_number,
            school: row.school,
            department: row.department,
            student_id: row.student_id,
            avatar_url: row.avatar_url,
            is_profile_completed: row.is_profile_completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TaskRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            completed: row.completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, email, name, avatar_url, provider, provider_id, password_hash, created_at, updated_at";
const TASK_COLUMNS: &str = "id, user_id, title, completed, created_at, updated_at";

impl AccountStore for PgStore {
    async fn find_account(&self, provider: &str, provider_id: &str) -> StoreResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE provider = $1 AND provider_id = $2"
        ))
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(Account::from))
    }

    async fn insert_account(&self, account: Account) -> StoreResult<Account> {
        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts (id, email, name, avatar_url, provider, provider_id, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.avatar_url)
        .bind(&account.provider)
        .bind(&account.provider_id)
        .bind(&account.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn upsert_account(&self, account: Account) -> StoreResult<Account> {
        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts (id, email, name, avatar_url, provider, provider_id, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (provider, provider_id)
            DO UPDATE SET
                email = EXCLUDED.email,
                name = EXCLUDED.name,
                avatar_url = EXCLUDED.avatar_url,
                updated_at = NOW()
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.avatar_url)
        .bind(&account.provider)
        .bind(&account.provider_id)
        .bind(&account.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }
}

impl ProfileStore for PgStore {
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let row: Option<ProfileRow> = sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(Profile::from))
    }

    async fn upsert_profile(&self, profile: Profile) -> StoreResult<Profile> {
        let row: ProfileRow = sqlx::query_as(
            r#"
            INSERT INTO profiles
                (id, name, phone_number, school, department, student_id, avatar_url,
                 is_profile_completed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                phone_number = EXCLUDED.phone_number,
                school = EXCLUDED.school,
                department = EXCLUDED.department,
                student_id = EXCLUDED.student_id,
                avatar_url = EXCLUDED.avatar_url,
                is_profile_completed = EXCLUDED.is_profile_completed,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(profile.id)
        .bind(&profile.name)
        .bind(&profile.phone_number)
        .bind(&profile.school)
        .bind(&profile.department)
        .bind(&profile.student_id)
        .bind(&profile.avatar_url)
        .bind(profile.is_profile_completed)
        .bind(profile.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }
}

impl TaskStore for PgStore {
    async fn list_tasks(&self, user_id: Uuid) -> StoreResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM todos WHERE user_id = $1 ORDER BY created_at DESC, seq DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn insert_task(&self, user_id: Uuid, title: &str) -> StoreResult<Task> {
        let row: TaskRow = sqlx::query_as(&format!(
            "INSERT INTO todos (id, user_id, title) VALUES ($1, $2, $3) RETURNING {TASK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn set_task_completed(&self, user_id: Uuid, id: Uuid, completed: bool) -> StoreResult<Task> {
        // fetch_one turns "no row" (missing or someone else's) into NotFound
        let row: TaskRow = sqlx::query_as(&format!(
            r#"
            UPDATE todos SET completed = $3, updated_at = clock_timestamp()
            WHERE id = $1 AND user_id = $2
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(completed)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

impl OAuthStateStore for PgStore {
    async fn put_pending_login(&self, login: PendingLogin) -> StoreResult<()> {
        // Abandoned logins are never taken; drop them as new ones arrive
        sqlx::query("DELETE FROM oauth_states WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO oauth_states (state, provider, pkce_verifier, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&login.state)
        .bind(&login.provider)
        .bind(&login.pkce_verifier)
        .bind(login.expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn take_pending_login(
        &self,
        state: &str,
        provider: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<String>> {
        // The row is consumed even when it has expired
        let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            DELETE FROM oauth_states
            WHERE state = $1 AND provider = $2
            RETURNING pkce_verifier, expires_at
            "#,
        )
        .bind(state)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(verifier, _)| verifier))
    }
}
