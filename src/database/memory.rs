use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    Application, ApplicationContent, ApplicationFilter, Appointment, AppointmentFilter,
    DashboardStats, NewUser, PdfRef, StatusEntry, UploadDescriptor, User, UserChanges, UserFilter,
    VisaType, VisaTypeQuery,
};
use super::store::{Store, StoreResult};
use crate::types::{ApplicationStatus, AppointmentStatus, Role, UploadPurpose};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    visa_types: HashMap<Uuid, VisaType>,
    applications: HashMap<Uuid, Application>,
    counters: HashMap<String, u64>,
    uploads: HashMap<String, UploadDescriptor>,
    appointments: Vec<Appointment>,
}

/// Process-local store for development and tests.
///
/// A single lock guards all tables so each trait call is one atomic section.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn counter_key(year: i32) -> String {
    format!("application_number:{}", year)
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) {}

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Conflict(format!("email '{}' already registered", user.email)));
        }
        let user = user.into_user(Utc::now());
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().filter(|u| filter.matches(u)).cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user {}", id)))?;
        changes.apply(user, Utc::now());
        Ok(user.clone())
    }

    async fn insert_visa_type(&self, entry: VisaType) -> StoreResult<VisaType> {
        let mut tables = self.tables.write().await;
        if tables.visa_types.contains_key(&entry.id) {
            return Err(DatabaseError::Conflict(format!("visa type {}", entry.id)));
        }
        tables.visa_types.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn replace_visa_type(&self, entry: VisaType) -> StoreResult<VisaType> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .visa_types
            .get_mut(&entry.id)
            .ok_or_else(|| DatabaseError::NotFound(format!("visa type {}", entry.id)))?;
        *slot = entry.clone();
        Ok(entry)
    }

    async fn append_visa_type_pdfs(&self, id: Uuid, pdfs: Vec<PdfRef>, actor: Uuid) -> StoreResult<VisaType> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .visa_types
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("visa type {}", id)))?;
        entry.pdf_files.extend(pdfs);
        entry.updated_by = Some(actor);
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn find_visa_type(&self, id: Uuid) -> StoreResult<Option<VisaType>> {
        Ok(self.tables.read().await.visa_types.get(&id).cloned())
    }

    async fn list_visa_types(&self, query: &VisaTypeQuery) -> StoreResult<Vec<VisaType>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<VisaType> = tables
            .visa_types
            .values()
            .filter(|v| query.matches(v))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.country
                .cmp(&b.country)
                .then(a.category.cmp(&b.category))
                .then(a.name.cmp(&b.name))
        });
        Ok(entries)
    }

    async fn next_application_sequence(&self, year: i32) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let counter = tables.counters.entry(counter_key(year)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_application(&self, application: Application) -> StoreResult<Application> {
        let mut tables = self.tables.write().await;
        if tables
            .applications
            .values()
            .any(|a| a.application_number == application.application_number)
        {
            return Err(DatabaseError::Conflict(format!(
                "application number {} already assigned",
                application.application_number
            )));
        }
        tables.applications.insert(application.id, application.clone());
        Ok(application)
    }

    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn list_applications(&self, filter: &ApplicationFilter) -> StoreResult<Vec<Application>> {
        let tables = self.tables.read().await;
        let mut apps: Vec<Application> = tables
            .applications
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    async fn update_application_content(
        &self,
        id: Uuid,
        content: ApplicationContent,
        expected: ApplicationStatus,
    ) -> StoreResult<Application> {
        let mut tables = self.tables.write().await;
        let app = tables
            .applications
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("application {}", id)))?;
        if app.status != expected {
            return Err(DatabaseError::Conflict(format!(
                "application is {}, expected {}",
                app.status, expected
            )));
        }
        app.content = content;
        app.updated_at = Utc::now().max(app.updated_at);
        Ok(app.clone())
    }

    async fn append_status(
        &self,
        id: Uuid,
        entry: StatusEntry,
        expected: Option<ApplicationStatus>,
    ) -> StoreResult<Application> {
        let mut tables = self.tables.write().await;
        let app = tables
            .applications
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound(format!("application {}", id)))?;
        if let Some(expected) = expected {
            if app.status != expected {
                return Err(DatabaseError::Conflict(format!(
                    "application is {}, expected {}",
                    app.status, expected
                )));
            }
        }
        app.record_status(entry);
        Ok(app.clone())
    }

    async fn insert_upload(&self, upload: UploadDescriptor) -> StoreResult<UploadDescriptor> {
        let mut tables = self.tables.write().await;
        if tables.uploads.contains_key(&upload.generated_name) {
            return Err(DatabaseError::Conflict(format!("upload {}", upload.generated_name)));
        }
        tables.uploads.insert(upload.generated_name.clone(), upload.clone());
        Ok(upload)
    }

    async fn find_upload(&self, generated_name: &str) -> StoreResult<Option<UploadDescriptor>> {
        Ok(self.tables.read().await.uploads.get(generated_name).cloned())
    }

    async fn delete_upload(&self, generated_name: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(purpose) = tables.uploads.get(generated_name).map(|u| u.purpose) else {
            return Ok(false);
        };

        match purpose {
            UploadPurpose::Document => {
                let in_use = tables.applications.values().any(|app| {
                    app.status != ApplicationStatus::Draft
                        && app.content.documents.iter().any(|d| d.file_name == generated_name)
                });
                if in_use {
                    return Err(DatabaseError::Conflict(format!(
                        "upload {} is part of a submitted application",
                        generated_name
                    )));
                }
            }
            UploadPurpose::Requirement => {
                let now = Utc::now();
                for entry in tables.visa_types.values_mut() {
                    let before = entry.pdf_files.len();
                    entry.pdf_files.retain(|pdf| pdf.file_name != generated_name);
                    if entry.pdf_files.len() != before {
                        entry.updated_at = now;
                    }
                }
            }
        }

        Ok(tables.uploads.remove(generated_name).is_some())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment> {
        self.tables.write().await.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.read().await;
        let mut list: Vec<Appointment> = tables
            .appointments
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(list)
    }

    async fn dashboard_stats(&self, now: DateTime<Utc>) -> StoreResult<DashboardStats> {
        let tables = self.tables.read().await;

        let mut users_by_role = BTreeMap::new();
        for role in Role::ALL {
            users_by_role.insert(role.as_str().to_string(), 0);
        }
        for user in tables.users.values() {
            *users_by_role.entry(user.role.as_str().to_string()).or_insert(0) += 1;
        }

        let mut applications_by_status = BTreeMap::new();
        for status in ApplicationStatus::ALL {
            applications_by_status.insert(status.as_str().to_string(), 0);
        }
        for app in tables.applications.values() {
            *applications_by_status.entry(app.status.as_str().to_string()).or_insert(0) += 1;
        }

        Ok(DashboardStats {
            total_users: tables.users.len() as i64,
            active_users: tables.users.values().filter(|u| u.is_active).count() as i64,
            users_by_role,
            total_applications: tables.applications.len() as i64,
            applications_by_status,
            active_visa_types: tables.visa_types.values().filter(|v| v.is_active).count() as i64,
            upcoming_appointments: tables
                .appointments
                .iter()
                .filter(|a| a.status == AppointmentStatus::Scheduled && a.scheduled_at >= now)
                .count() as i64,
        })
    }
}
