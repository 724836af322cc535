//! Database store for actors, letters and steps

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::{Actor, Letter, LetterStatus, Step, StepStatus};
use crate::workflow::views::{LetterDetail, LetterSummary, PendingStep, StepDetail};
use crate::workflow::{Role, Route};

/// Open (creating if needed) the SQLite database at `database_url`
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Apply the schema in `migrations/`
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(sqlx::Error::from)?;
    Ok(())
}

/// A decision to write to the step at `current_step`
#[derive(Debug, Clone)]
pub struct Decision<'a> {
    pub letter_id: i64,
    pub step_id: i64,
    pub step_index: i64,
    pub actor_id: i64,
    pub step_status: StepStatus,
    pub comments: &'a str,
    pub acted_at: DateTime<Utc>,
    /// Letter state after the decision
    pub letter_status: LetterStatus,
    pub next_step: i64,
}

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Actor operations

    pub async fn create_actor(&self, name: &str, role: Role) -> Result<Actor> {
        if self.find_actor(name, role).await?.is_some() {
            return Err(duplicate(name, role));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO actors (name, role)
            VALUES (?, ?)
            "#,
        )
        .bind(name)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => duplicate(name, role),
            other => AppError::Database(other),
        })?;

        Ok(Actor {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            role,
        })
    }

    pub async fn get_actor(&self, id: i64) -> Result<Actor> {
        let row = sqlx::query_as::<_, ActorRow>(
            r#"
            SELECT id, name, role
            FROM actors
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ActorNotFound(id))?;

        row.try_into()
    }

    /// Exact (name, role) lookup
    pub async fn find_actor(&self, name: &str, role: Role) -> Result<Option<Actor>> {
        let row = sqlx::query_as::<_, ActorRow>(
            r#"
            SELECT id, name, role
            FROM actors
            WHERE name = ? AND role = ?
            "#,
        )
        .bind(name)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Actor::try_from).transpose()
    }

    pub async fn list_actors(&self) -> Result<Vec<Actor>> {
        let rows = sqlx::query_as::<_, ActorRow>(
            r#"
            SELECT id, name, role
            FROM actors
            ORDER BY role, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Administrative removal; refuses actors still referenced by letters or steps
    pub async fn delete_actor(&self, id: i64) -> Result<()> {
        self.get_actor(id).await?;

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(1) FROM letters WHERE sender_id = ?)
                 + (SELECT COUNT(1) FROM steps WHERE actor_id = ?)
            "#,
        )
        .bind(id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if references > 0 {
            return Err(AppError::ActorInUse(id));
        }

        sqlx::query("DELETE FROM actors WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Letter operations

    /// Insert a letter and one pending step per route entry, atomically
    pub async fn insert_letter(
        &self,
        sender_id: i64,
        title: &str,
        body: &str,
        route: &Route,
    ) -> Result<Letter> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let letter_id = sqlx::query(
            r#"
            INSERT INTO letters (title, body, sender_id, status, created_at, current_step)
            VALUES (?, ?, ?, 'pending', ?, 0)
            "#,
        )
        .bind(title)
        .bind(body)
        .bind(sender_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (index, role) in route.roles().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO steps (letter_id, step_index, role, status)
                VALUES (?, ?, ?, 'pending')
                "#,
            )
            .bind(letter_id)
            .bind(index as i64)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Letter {
            id: letter_id,
            title: title.to_string(),
            body: body.to_string(),
            sender_id,
            status: LetterStatus::Pending,
            created_at: now,
            current_step: 0,
        })
    }

    pub async fn get_letter(&self, id: i64) -> Result<Letter> {
        let row = sqlx::query_as::<_, LetterRow>(
            r#"
            SELECT id, title, body, sender_id, status, created_at, current_step
            FROM letters
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::LetterNotFound(id))?;

        row.try_into()
    }

    pub async fn get_step(&self, letter_id: i64, step_index: i64) -> Result<Option<Step>> {
        let row = sqlx::query_as::<_, StepRow>(
            r#"
            SELECT id, letter_id, step_index, role, status, actor_id, comments, acted_at
            FROM steps
            WHERE letter_id = ? AND step_index = ?
            "#,
        )
        .bind(letter_id)
        .bind(step_index)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Step::try_from).transpose()
    }

    pub async fn count_steps(&self, letter_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM steps WHERE letter_id = ?")
            .bind(letter_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // Transitions

    /// Append one entry to a step's comment log in a single statement
    pub async fn append_comment(&self, step_id: i64, entry: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE steps
               SET comments = CASE
                    WHEN comments IS NULL OR comments = '' THEN ?
                    ELSE comments || char(10) || ?
               END
             WHERE id = ?
            "#,
        )
        .bind(entry)
        .bind(entry)
        .bind(step_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Write an approve/reject decision and the resulting letter state.
    ///
    /// Both updates are guarded: the step must still be pending and the letter
    /// must still be pending at the same `current_step`. If either guard fails
    /// nothing is written and `StepAlreadyActed` is returned.
    pub async fn record_decision(&self, decision: &Decision<'_>) -> Result<()> {
        let already_acted = || AppError::StepAlreadyActed {
            letter_id: decision.letter_id,
            step_index: decision.step_index,
        };

        let mut tx = self.pool.begin().await?;

        let step = sqlx::query(
            r#"
            UPDATE steps
               SET status = ?,
                   actor_id = ?,
                   acted_at = ?,
                   comments = CASE
                        WHEN ? = '' THEN comments
                        WHEN comments IS NULL OR comments = '' THEN ?
                        ELSE comments || char(10) || ?
                   END
             WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(decision.step_status.as_str())
        .bind(decision.actor_id)
        .bind(decision.acted_at)
        .bind(decision.comments)
        .bind(decision.comments)
        .bind(decision.comments)
        .bind(decision.step_id)
        .execute(&mut *tx)
        .await?;

        if step.rows_affected() == 0 {
            return Err(already_acted());
        }

        let letter = sqlx::query(
            r#"
            UPDATE letters
               SET status = ?, current_step = ?
             WHERE id = ? AND status = 'pending' AND current_step = ?
            "#,
        )
        .bind(decision.letter_status.as_str())
        .bind(decision.next_step)
        .bind(decision.letter_id)
        .bind(decision.step_index)
        .execute(&mut *tx)
        .await?;

        if letter.rows_affected() == 0 {
            return Err(already_acted());
        }

        tx.commit().await?;
        Ok(())
    }

    /// Overwrite content and restart the whole route.
    ///
    /// Returns false without writing if the letter is no longer a rejected
    /// letter owned by `sender_id`.
    pub async fn reset_for_resend(
        &self,
        letter_id: i64,
        sender_id: i64,
        title: &str,
        body: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let letter = sqlx::query(
            r#"
            UPDATE letters
               SET title = ?, body = ?, status = 'pending', current_step = 0
             WHERE id = ? AND sender_id = ? AND status = 'rejected'
            "#,
        )
        .bind(title)
        .bind(body)
        .bind(letter_id)
        .bind(sender_id)
        .execute(&mut *tx)
        .await?;

        if letter.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE steps
               SET status = 'pending', actor_id = NULL, comments = NULL, acted_at = NULL
             WHERE letter_id = ?
            "#,
        )
        .bind(letter_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    // Read views

    pub async fn letter_detail(&self, letter_id: i64) -> Result<LetterDetail> {
        let row = sqlx::query_as::<_, LetterDetailRow>(
            r#"
            SELECT l.id, l.title, l.body, l.sender_id,
                   a.name AS sender_name, a.role AS sender_role,
                   l.status, l.created_at, l.current_step
            FROM letters l
            JOIN actors a ON a.id = l.sender_id
            WHERE l.id = ?
            "#,
        )
        .bind(letter_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::LetterNotFound(letter_id))?;

        row.try_into()
    }

    pub async fn step_details(&self, letter_id: i64) -> Result<Vec<StepDetail>> {
        let rows = sqlx::query_as::<_, StepDetailRow>(
            r#"
            SELECT s.id, s.letter_id, s.step_index, s.role, s.status, s.actor_id,
                   a.name AS actor_name, a.role AS actor_role,
                   s.comments, s.acted_at
            FROM steps s
            LEFT JOIN actors a ON a.id = s.actor_id
            WHERE s.letter_id = ?
            ORDER BY s.step_index ASC
            "#,
        )
        .bind(letter_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Pending steps for `role` on pending letters, oldest letter first
    pub async fn pending_for_role(&self, role: &str) -> Result<Vec<PendingStep>> {
        let rows = sqlx::query_as::<_, PendingStepRow>(
            r#"
            SELECT s.id AS step_id, s.letter_id, s.step_index, s.role,
                   (SELECT COUNT(1) FROM steps t WHERE t.letter_id = s.letter_id) AS total_steps,
                   l.title, l.body, l.sender_id, a.name AS sender_name, l.created_at
            FROM steps s
            JOIN letters l ON l.id = s.letter_id
            JOIN actors a ON a.id = l.sender_id
            WHERE s.role = ? AND s.status = 'pending' AND l.status = 'pending'
            ORDER BY l.created_at ASC, l.id ASC, s.step_index ASC
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// All letters newest first, or those a user sent or acted on
    pub async fn list_letters(&self, user_id: Option<i64>) -> Result<Vec<LetterSummary>> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, LetterSummaryRow>(
                    r#"
                    SELECT l.id, l.title, l.sender_id, a.name AS sender_name,
                           l.status, l.created_at, l.current_step
                    FROM letters l
                    JOIN actors a ON a.id = l.sender_id
                    WHERE l.sender_id = ?
                       OR EXISTS (SELECT 1 FROM steps s WHERE s.letter_id = l.id AND s.actor_id = ?)
                    ORDER BY l.created_at DESC, l.id DESC
                    "#,
                )
                .bind(user_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, LetterSummaryRow>(
                    r#"
                    SELECT l.id, l.title, l.sender_id, a.name AS sender_name,
                           l.status, l.created_at, l.current_step
                    FROM letters l
                    JOIN actors a ON a.id = l.sender_id
                    ORDER BY l.created_at DESC, l.id DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

fn duplicate(name: &str, role: Role) -> AppError {
    AppError::DuplicateActor {
        name: name.to_string(),
        role: role.as_str().to_string(),
    }
}

// Internal row types for sqlx

fn parse_status<T: FromStr<Err = String>>(s: &str) -> Result<T> {
    s.parse()
        .map_err(|e| AppError::Internal(format!("Invalid status: {}", e)))
}

#[derive(sqlx::FromRow)]
struct ActorRow {
    id: i64,
    name: String,
    role: String,
}

impl TryFrom<ActorRow> for Actor {
    type Error = AppError;

    fn try_from(row: ActorRow) -> Result<Self> {
        Ok(Actor {
            id: row.id,
            name: row.name,
            role: row.role.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LetterRow {
    id: i64,
    title: String,
    body: String,
    sender_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    current_step: i64,
}

impl TryFrom<LetterRow> for Letter {
    type Error = AppError;

    fn try_from(row: LetterRow) -> Result<Self> {
        Ok(Letter {
            id: row.id,
            title: row.title,
            body: row.body,
            sender_id: row.sender_id,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            current_step: row.current_step,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    id: i64,
    letter_id: i64,
    step_index: i64,
    role: String,
    status: String,
    actor_id: Option<i64>,
    comments: Option<String>,
    acted_at: Option<DateTime<Utc>>,
}

impl TryFrom<StepRow> for Step {
    type Error = AppError;

    fn try_from(row: StepRow) -> Result<Self> {
        Ok(Step {
            id: row.id,
            letter_id: row.letter_id,
            step_index: row.step_index,
            role: row.role.parse()?,
            status: parse_status(&row.status)?,
            actor_id: row.actor_id,
            comments: row.comments,
            acted_at: row.acted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LetterDetailRow {
    id: i64,
    title: String,
    body: String,
    sender_id: i64,
    sender_name: String,
    sender_role: String,
    status: String,
    created_at: DateTime<Utc>,
    current_step: i64,
}

impl TryFrom<LetterDetailRow> for LetterDetail {
    type Error = AppError;

    fn try_from(row: LetterDetailRow) -> Result<Self> {
        Ok(LetterDetail {
            id: row.id,
            title: row.title,
            body: row.body,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            sender_role: row.sender_role.parse()?,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            current_step: row.current_step,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StepDetailRow {
    id: i64,
    letter_id: i64,
    step_index: i64,
    role: String,
    status: String,
    actor_id: Option<i64>,
    actor_name: Option<String>,
    actor_role: Option<String>,
    comments: Option<String>,
    acted_at: Option<DateTime<Utc>>,
}

impl TryFrom<StepDetailRow> for StepDetail {
    type Error = AppError;

    fn try_from(row: StepDetailRow) -> Result<Self> {
        Ok(StepDetail {
            id: row.id,
            letter_id: row.letter_id,
            step_index: row.step_index,
            role: row.role.parse()?,
            status: parse_status(&row.status)?,
            actor_id: row.actor_id,
            actor_name: row.actor_name,
            actor_role: row.actor_role.map(|r| r.parse::<Role>()).transpose()?,
            comments: row.comments,
            acted_at: row.acted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PendingStepRow {
    step_id: i64,
    letter_id: i64,
    step_index: i64,
    role: String,
    total_steps: i64,
    title: String,
    body: String,
    sender_id: i64,
    sender_name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingStepRow> for PendingStep {
    type Error = AppError;

    fn try_from(row: PendingStepRow) -> Result<Self> {
        Ok(PendingStep {
            step_id: row.step_id,
            letter_id: row.letter_id,
            step_index: row.step_index,
            total_steps: row.total_steps,
            role: row.role.parse()?,
            title: row.title,
            body: row.body,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LetterSummaryRow {
    id: i64,
    title: String,
    sender_id: i64,
    sender_name: String,
    status: String,
    created_at: DateTime<Utc>,
    current_step: i64,
}

impl TryFrom<LetterSummaryRow> for LetterSummary {
    type Error = AppError;

    fn try_from(row: LetterSummaryRow) -> Result<Self> {
        Ok(LetterSummary {
            id: row.id,
            title: row.title,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            current_step: row.current_step,
        })
    }
}
