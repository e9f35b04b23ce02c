use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgConnection;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
use super::models::application::{ApplicationRow, StatusEntryRow};
use super::models::appointment::AppointmentRow;
use super::models::upload::UploadRow;
use super::models::user::UserRow;
use super::models::visa_type::VisaTypeRow;
use super::models::{
    Application, ApplicationContent, ApplicationFilter, Appointment, AppointmentFilter,
    DashboardStats, NewUser, PdfRef, StatusEntry, UploadDescriptor, User, UserChanges, UserFilter,
    VisaType, VisaTypeQuery,
};
use super::store::{Store, StoreResult};
use crate::types::{ApplicationStatus, Role, UploadPurpose};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active, phone, nationality, \
     passport_number, address, created_at, updated_at";

const VISA_TYPE_COLUMNS: &str = "id, country, country_code, name, category, public_requirements, \
     detailed_requirements, fees, processing_time, validity, max_stay, pdf_files, is_active, \
     updated_by, created_at, updated_at";

const APPLICATION_COLUMNS: &str = "id, application_number, user_id, visa_type_id, personal_info, \
     travel_info, documents, shipping, payment, notes, status, created_at, updated_at";

const APPOINTMENT_COLUMNS: &str = "id, user_id, application_id, scheduled_at, location, purpose, \
     status, notes, created_by, created_at";

const UPLOAD_COLUMNS: &str = "generated_name, original_name, storage_path, size, mime_type, \
     checksum, owner_id, purpose, created_at";

/// `Store` backed by Postgres through sqlx
pub struct PgStore {
    db: DatabaseManager,
}

impl PgStore {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db }
    }
}

/// Unique violations become `Conflict`, everything else passes through
fn map_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> DatabaseError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return DatabaseError::Conflict(what());
        }
    }
    DatabaseError::Sqlx(err)
}

async fn load_history(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, Vec<StatusEntry>>> {
    let rows: Vec<StatusEntryRow> = sqlx::query_as(
        "SELECT application_id, status, note, actor_id, recorded_at \
         FROM application_status_history WHERE application_id = ANY($1) ORDER BY id",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<StatusEntry>> = HashMap::new();
    for row in rows {
        let app_id = row.application_id;
        grouped.entry(app_id).or_default().push(row.try_into()?);
    }
    Ok(grouped)
}

async fn load_application(
    conn: &mut PgConnection,
    id: Uuid,
    for_update: bool,
) -> StoreResult<Option<Application>> {
    let sql = format!(
        "SELECT {} FROM applications WHERE id = $1{}",
        APPLICATION_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: Option<ApplicationRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *conn).await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut history = load_history(conn, &[id]).await?;
    let app = row.into_application(history.remove(&id).unwrap_or_default())?;
    Ok(Some(app))
}

async fn insert_history(conn: &mut PgConnection, app_id: Uuid, entry: &StatusEntry) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO application_status_history (application_id, status, note, actor_id, recorded_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(app_id)
    .bind(entry.status.as_str())
    .bind(&entry.note)
    .bind(entry.actor_id)
    .bind(entry.recorded_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn status_conflict(current: ApplicationStatus, expected: ApplicationStatus) -> DatabaseError {
    DatabaseError::Conflict(format!("application is {}, expected {}", current, expected))
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        self.db.health_check().await
    }

    async fn close(&self) {
        self.db.close().await;
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let user = user.into_user(Utc::now());
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, is_active, phone, nationality, \
             passport_number, address, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&user.profile.phone)
        .bind(&user.profile.nationality)
        .bind(&user.profile.passport_number)
        .bind(&user.profile.address)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| map_unique(e, || format!("email '{}' already registered", user.email)))?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql).bind(id).fetch_optional(self.db.pool()).await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql).bind(email).fetch_optional(self.db.pool()).await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users \
             WHERE ($1::text IS NULL OR role = $1) AND ($2::bool IS NULL OR is_active = $2) \
             ORDER BY created_at DESC",
            USER_COLUMNS
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(filter.role.map(|r| r.as_str()))
            .bind(filter.is_active)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(User::try_from).collect::<Result<_, _>>()?)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut tx = self.db.pool().begin().await?;

        let sql = format!("SELECT {} FROM users WHERE id = $1 FOR UPDATE", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *tx).await?;
        let mut user = User::try_from(row.ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?)?;
        changes.apply(&mut user, Utc::now());

        sqlx::query(
            "UPDATE users SET name = $2, password_hash = $3, role = $4, is_active = $5, phone = $6, \
             nationality = $7, passport_number = $8, address = $9, updated_at = $10 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&user.profile.phone)
        .bind(&user.profile.nationality)
        .bind(&user.profile.passport_number)
        .bind(&user.profile.address)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn insert_visa_type(&self, entry: VisaType) -> StoreResult<VisaType> {
        sqlx::query(
            "INSERT INTO visa_types (id, country, country_code, name, category, public_requirements, \
             detailed_requirements, fees, processing_time, validity, max_stay, pdf_files, is_active, \
             updated_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(entry.id)
        .bind(&entry.country)
        .bind(&entry.country_code)
        .bind(&entry.name)
        .bind(entry.category.as_str())
        .bind(Json(&entry.public_requirements))
        .bind(Json(&entry.detailed_requirements))
        .bind(Json(&entry.fees))
        .bind(&entry.processing_time)
        .bind(&entry.validity)
        .bind(&entry.max_stay)
        .bind(Json(&entry.pdf_files))
        .bind(entry.is_active)
        .bind(entry.updated_by)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| map_unique(e, || format!("visa type {}", entry.id)))?;
        Ok(entry)
    }

    async fn replace_visa_type(&self, entry: VisaType) -> StoreResult<VisaType> {
        let result = sqlx::query(
            "UPDATE visa_types SET country = $2, country_code = $3, name = $4, category = $5, \
             public_requirements = $6, detailed_requirements = $7, fees = $8, processing_time = $9, \
             validity = $10, max_stay = $11, pdf_files = $12, is_active = $13, updated_by = $14, \
             updated_at = $15 WHERE id = $1",
        )
        .bind(entry.id)
        .bind(&entry.country)
        .bind(&entry.country_code)
        .bind(&entry.name)
        .bind(entry.category.as_str())
        .bind(Json(&entry.public_requirements))
        .bind(Json(&entry.detailed_requirements))
        .bind(Json(&entry.fees))
        .bind(&entry.processing_time)
        .bind(&entry.validity)
        .bind(&entry.max_stay)
        .bind(Json(&entry.pdf_files))
        .bind(entry.is_active)
        .bind(entry.updated_by)
        .bind(entry.updated_at)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("visa type {}", entry.id)));
        }
        Ok(entry)
    }

    async fn append_visa_type_pdfs(&self, id: Uuid, pdfs: Vec<PdfRef>, actor: Uuid) -> StoreResult<VisaType> {
        let sql = format!(
            "UPDATE visa_types SET pdf_files = pdf_files || $2, updated_by = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {}",
            VISA_TYPE_COLUMNS
        );
        let row: Option<VisaTypeRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(Json(&pdfs))
            .bind(actor)
            .bind(Utc::now())
            .fetch_optional(self.db.pool())
            .await?;
        let row = row.ok_or_else(|| DatabaseError::NotFound(format!("visa type {}", id)))?;
        Ok(VisaType::try_from(row)?)
    }

    async fn find_visa_type(&self, id: Uuid) -> StoreResult<Option<VisaType>> {
        let sql = format!("SELECT {} FROM visa_types WHERE id = $1", VISA_TYPE_COLUMNS);
        let row: Option<VisaTypeRow> = sqlx::query_as(&sql).bind(id).fetch_optional(self.db.pool()).await?;
        Ok(row.map(VisaType::try_from).transpose()?)
    }

    async fn list_visa_types(&self, query: &VisaTypeQuery) -> StoreResult<Vec<VisaType>> {
        let sql = format!(
            "SELECT {} FROM visa_types \
             WHERE ($1 OR is_active) AND ($2::text IS NULL OR category = $2) \
             AND ($3::text IS NULL OR lower(country) = lower($3) OR lower(country_code) = lower($3)) \
             ORDER BY country, category, name",
            VISA_TYPE_COLUMNS
        );
        let rows: Vec<VisaTypeRow> = sqlx::query_as(&sql)
            .bind(query.include_inactive)
            .bind(query.category.map(|c| c.as_str()))
            .bind(query.country.as_deref().map(str::trim))
            .fetch_all(self.db.pool())
            .await?;

        // Free-text matching spans derived fields, so it stays in Rust
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let entry = VisaType::try_from(row)?;
            if query.matches(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn next_application_sequence(&self, year: i32) -> StoreResult<u64> {
        let (value,): (i64,) = sqlx::query_as(
            "INSERT INTO counters (name, value) VALUES ($1, 1) \
             ON CONFLICT (name) DO UPDATE SET value = counters.value + 1 RETURNING value",
        )
        .bind(format!("application_number:{}", year))
        .fetch_one(self.db.pool())
        .await?;
        Ok(value as u64)
    }

    async fn insert_application(&self, application: Application) -> StoreResult<Application> {
        let mut tx = self.db.pool().begin().await?;
        let content = &application.content;

        sqlx::query(
            "INSERT INTO applications (id, application_number, user_id, visa_type_id, personal_info, \
             travel_info, documents, shipping, payment, notes, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(application.id)
        .bind(&application.application_number)
        .bind(application.user_id)
        .bind(application.visa_type_id)
        .bind(Json(&content.personal_info))
        .bind(Json(&content.travel_info))
        .bind(Json(&content.documents))
        .bind(content.shipping.as_ref().map(Json))
        .bind(content.payment.as_ref().map(Json))
        .bind(&content.notes)
        .bind(application.status.as_str())
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_unique(e, || {
                format!("application number {} already assigned", application.application_number)
            })
        })?;

        for entry in &application.status_history {
            insert_history(&mut tx, application.id, entry).await?;
        }

        tx.commit().await?;
        Ok(application)
    }

    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
        let mut conn = self.db.pool().acquire().await?;
        load_application(&mut conn, id, false).await
    }

    async fn list_applications(&self, filter: &ApplicationFilter) -> StoreResult<Vec<Application>> {
        let mut conn = self.db.pool().acquire().await?;
        let sql = format!(
            "SELECT {} FROM applications \
             WHERE ($1::uuid IS NULL OR user_id = $1) AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC",
            APPLICATION_COLUMNS
        );
        let rows: Vec<ApplicationRow> = sqlx::query_as(&sql)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&mut *conn)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut history = load_history(&mut conn, &ids).await?;

        let mut apps = Vec::with_capacity(rows.len());
        for row in rows {
            let entries = history.remove(&row.id).unwrap_or_default();
            apps.push(row.into_application(entries)?);
        }
        Ok(apps)
    }

    async fn update_application_content(
        &self,
        id: Uuid,
        content: ApplicationContent,
        expected: ApplicationStatus,
    ) -> StoreResult<Application> {
        let mut tx = self.db.pool().begin().await?;
        let mut app = load_application(&mut tx, id, true)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("application {}", id)))?;
        if app.status != expected {
            return Err(status_conflict(app.status, expected));
        }

        app.updated_at = Utc::now().max(app.updated_at);
        sqlx::query(
            "UPDATE applications SET personal_info = $2, travel_info = $3, documents = $4, \
             shipping = $5, payment = $6, notes = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(id)
        .bind(Json(&content.personal_info))
        .bind(Json(&content.travel_info))
        .bind(Json(&content.documents))
        .bind(content.shipping.as_ref().map(Json))
        .bind(content.payment.as_ref().map(Json))
        .bind(&content.notes)
        .bind(app.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        app.content = content;
        Ok(app)
    }

    async fn append_status(
        &self,
        id: Uuid,
        entry: StatusEntry,
        expected: Option<ApplicationStatus>,
    ) -> StoreResult<Application> {
        let mut tx = self.db.pool().begin().await?;
        let mut app = load_application(&mut tx, id, true)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("application {}", id)))?;
        if let Some(expected) = expected {
            if app.status != expected {
                return Err(status_conflict(app.status, expected));
            }
        }

        let entry = app.record_status(entry).clone();
        insert_history(&mut tx, id, &entry).await?;
        sqlx::query("UPDATE applications SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(app.status.as_str())
            .bind(app.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(app)
    }

    async fn insert_upload(&self, upload: UploadDescriptor) -> StoreResult<UploadDescriptor> {
        sqlx::query(
            "INSERT INTO uploads (generated_name, original_name, storage_path, size, mime_type, \
             checksum, owner_id, purpose, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&upload.generated_name)
        .bind(&upload.original_name)
        .bind(&upload.storage_path)
        .bind(upload.size as i64)
        .bind(&upload.mime_type)
        .bind(&upload.checksum)
        .bind(upload.owner_id)
        .bind(upload.purpose.as_str())
        .bind(upload.created_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| map_unique(e, || format!("upload {}", upload.generated_name)))?;
        Ok(upload)
    }

    async fn find_upload(&self, generated_name: &str) -> StoreResult<Option<UploadDescriptor>> {
        let sql = format!("SELECT {} FROM uploads WHERE generated_name = $1", UPLOAD_COLUMNS);
        let row: Option<UploadRow> = sqlx::query_as(&sql)
            .bind(generated_name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(UploadDescriptor::try_from).transpose()?)
    }

    async fn delete_upload(&self, generated_name: &str) -> StoreResult<bool> {
        let mut tx = self.db.pool().begin().await?;

        let purpose: Option<(String,)> =
            sqlx::query_as("SELECT purpose FROM uploads WHERE generated_name = $1 FOR UPDATE")
                .bind(generated_name)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((purpose,)) = purpose else {
            return Ok(false);
        };
        let reference = serde_json::json!([{ "file_name": generated_name }]);

        match purpose.parse::<UploadPurpose>()? {
            UploadPurpose::Document => {
                let (in_use,): (bool,) = sqlx::query_as(
                    "SELECT EXISTS (SELECT 1 FROM applications WHERE status <> $1 AND documents @> $2)",
                )
                .bind(ApplicationStatus::Draft.as_str())
                .bind(Json(&reference))
                .fetch_one(&mut *tx)
                .await?;
                if in_use {
                    return Err(DatabaseError::Conflict(format!(
                        "upload {} is part of a submitted application",
                        generated_name
                    )));
                }
            }
            UploadPurpose::Requirement => {
                sqlx::query(
                    "UPDATE visa_types SET pdf_files = COALESCE( \
                       (SELECT jsonb_agg(pdf) FROM jsonb_array_elements(pdf_files) AS pdf \
                        WHERE pdf->>'file_name' <> $1), '[]'::jsonb), updated_at = $3 \
                     WHERE pdf_files @> $2",
                )
                .bind(generated_name)
                .bind(Json(&reference))
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            }
        }

        let result = sqlx::query("DELETE FROM uploads WHERE generated_name = $1")
            .bind(generated_name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment> {
        sqlx::query(
            "INSERT INTO appointments (id, user_id, application_id, scheduled_at, location, purpose, \
             status, notes, created_by, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(appointment.id)
        .bind(appointment.user_id)
        .bind(appointment.application_id)
        .bind(appointment.scheduled_at)
        .bind(&appointment.location)
        .bind(&appointment.purpose)
        .bind(appointment.status.as_str())
        .bind(&appointment.notes)
        .bind(appointment.created_by)
        .bind(appointment.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(appointment)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let sql = format!(
            "SELECT {} FROM appointments \
             WHERE ($1::uuid IS NULL OR user_id = $1) AND ($2::text IS NULL OR status = $2) \
             AND ($3::timestamptz IS NULL OR scheduled_at >= $3) \
             ORDER BY scheduled_at",
            APPOINTMENT_COLUMNS
        );
        let rows: Vec<AppointmentRow> = sqlx::query_as(&sql)
            .bind(filter.user_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.from)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(Appointment::try_from).collect::<Result<_, _>>()?)
    }

    async fn dashboard_stats(&self, now: DateTime<Utc>) -> StoreResult<DashboardStats> {
        let pool = self.db.pool();

        let role_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role").fetch_all(pool).await?;
        let (active_users,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_active").fetch_one(pool).await?;
        let status_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM applications GROUP BY status")
                .fetch_all(pool)
                .await?;
        let (active_visa_types,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM visa_types WHERE is_active").fetch_one(pool).await?;
        let (upcoming_appointments,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM appointments WHERE status = 'scheduled' AND scheduled_at >= $1",
        )
        .bind(now)
        .fetch_one(pool)
        .await?;

        let mut users_by_role: BTreeMap<String, i64> =
            Role::ALL.iter().map(|r| (r.as_str().to_string(), 0)).collect();
        users_by_role.extend(role_counts);
        let mut applications_by_status: BTreeMap<String, i64> =
            ApplicationStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        applications_by_status.extend(status_counts);

        Ok(DashboardStats {
            total_users: users_by_role.values().sum(),
            active_users,
            users_by_role,
            total_applications: applications_by_status.values().sum(),
            applications_by_status,
            active_visa_types,
            upcoming_appointments,
        })
    }
}
