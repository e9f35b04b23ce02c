use chrono::{Datelike, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::application::application_number_for;
use crate::database::models::{
    Application, ApplicationContent, ApplicationDocument, ApplicationFilter, Payment, PaymentStatus,
    PersonalInfo, Shipping, StatusEntry, TravelInfo,
};
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::state::AppState;
use crate::types::{ApplicationStatus, UploadPurpose};

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateApplicationRequest {
    pub visa_type_id: Uuid,
    #[validate(nested)]
    pub personal_info: PersonalInfo,
    #[validate(nested)]
    pub travel_info: TravelInfo,
    #[serde(default)]
    #[validate(nested)]
    pub documents: Vec<ApplicationDocument>,
    #[validate(nested)]
    pub shipping: Option<Shipping>,
    #[validate(length(max = 64))]
    pub payment_method: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Submit right away instead of keeping a draft
    #[serde(default)]
    pub submit: bool,
}

/// Full replacement of the editable blocks of a draft
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateApplicationRequest {
    #[validate(nested)]
    pub personal_info: PersonalInfo,
    #[validate(nested)]
    pub travel_info: TravelInfo,
    #[serde(default)]
    #[validate(nested)]
    pub documents: Vec<ApplicationDocument>,
    #[validate(nested)]
    pub shipping: Option<Shipping>,
    #[validate(length(max = 64))]
    pub payment_method: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SubmitRequest {
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StatusUpdateRequest {
    pub status: ApplicationStatus,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

/// Every referenced document must be one of the caller's own uploads
async fn check_documents(state: &AppState, owner: Uuid, documents: &[ApplicationDocument]) -> Result<(), ApiError> {
    for doc in documents {
        let upload = state.store.find_upload(&doc.file_name).await?;
        match upload {
            Some(u) if u.owner_id == owner && u.purpose == UploadPurpose::Document => {}
            _ => {
                return Err(ApiError::field_error(
                    "documents",
                    format!("Unknown document '{}'", doc.file_name),
                ))
            }
        }
    }
    Ok(())
}

async fn load_owned(state: &AppState, id: Uuid, identity: &Identity) -> Result<Application, ApiError> {
    let app = state
        .store
        .find_application(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;
    if app.user_id != identity.id() && !identity.is_admin() {
        return Err(ApiError::forbidden("You do not have access to this application"));
    }
    Ok(app)
}

pub async fn create(state: &AppState, identity: &Identity, req: CreateApplicationRequest) -> Result<Application, ApiError> {
    let visa_type = state
        .store
        .find_visa_type(req.visa_type_id)
        .await?
        .filter(|v| v.is_active)
        .ok_or_else(|| ApiError::not_found("Visa type not found"))?;

    check_documents(state, identity.id(), &req.documents).await?;

    let now = Utc::now();
    let sequence = state.store.next_application_sequence(now.year()).await?;
    let number = application_number_for(now, sequence);

    let content = ApplicationContent {
        personal_info: req.personal_info,
        travel_info: req.travel_info,
        documents: req.documents,
        shipping: req.shipping,
        payment: Some(Payment {
            amount: visa_type.fees.total_fee,
            currency: visa_type.fees.currency.clone(),
            method: req.payment_method,
            status: PaymentStatus::Pending,
            reference: None,
        }),
        notes: req.notes,
    };

    let app = Application::new_draft(number, identity.id(), visa_type.id, content, now);
    let mut app = state.store.insert_application(app).await?;
    info!(user_id = %identity.id(), application = %app.application_number, "created application");

    if req.submit {
        let entry = StatusEntry {
            status: ApplicationStatus::Submitted,
            recorded_at: Utc::now(),
            note: None,
            actor_id: identity.id(),
        };
        app = state
            .store
            .append_status(app.id, entry, Some(ApplicationStatus::Draft))
            .await?;
        info!(application = %app.application_number, "submitted application");
    }

    Ok(app)
}

/// Owner moves a draft to `submitted`
pub async fn submit(state: &AppState, identity: &Identity, id: Uuid, req: SubmitRequest) -> Result<Application, ApiError> {
    let app = load_owned(state, id, identity).await?;
    if app.user_id != identity.id() {
        return Err(ApiError::forbidden("Only the applicant can submit an application"));
    }
    if app.status != ApplicationStatus::Draft {
        return Err(ApiError::conflict(format!("Application is already {}", app.status)));
    }
    // Drafts may point at documents deleted since they were attached
    check_documents(state, identity.id(), &app.content.documents).await?;

    let entry = StatusEntry {
        status: ApplicationStatus::Submitted,
        recorded_at: Utc::now(),
        note: req.note,
        actor_id: identity.id(),
    };
    let app = state
        .store
        .append_status(id, entry, Some(ApplicationStatus::Draft))
        .await?;
    info!(application = %app.application_number, "submitted application");
    Ok(app)
}

/// Admin transition to any status. The history entry is always appended.
pub async fn admin_update_status(
    state: &AppState,
    actor: &Identity,
    id: Uuid,
    req: StatusUpdateRequest,
) -> Result<Application, ApiError> {
    if !actor.is_admin() {
        return Err(ApiError::forbidden("Only administrators can change application status"));
    }

    let entry = StatusEntry {
        status: req.status,
        recorded_at: Utc::now(),
        note: req.note,
        actor_id: actor.id(),
    };
    let app = state.store.append_status(id, entry, None).await?;
    info!(actor = %actor.id(), application = %app.application_number, status = %app.status, "status changed");
    Ok(app)
}

/// Owner edits while the application is still a draft
pub async fn update_draft(
    state: &AppState,
    identity: &Identity,
    id: Uuid,
    req: UpdateApplicationRequest,
) -> Result<Application, ApiError> {
    let app = load_owned(state, id, identity).await?;
    if app.user_id != identity.id() {
        return Err(ApiError::forbidden("Only the applicant can edit an application"));
    }
    if app.status != ApplicationStatus::Draft {
        return Err(ApiError::conflict("Only draft applications can be edited"));
    }

    check_documents(state, identity.id(), &req.documents).await?;

    let payment = app.content.payment.map(|mut payment| {
        if req.payment_method.is_some() {
            payment.method = req.payment_method;
        }
        payment
    });
    let content = ApplicationContent {
        personal_info: req.personal_info,
        travel_info: req.travel_info,
        documents: req.documents,
        shipping: req.shipping,
        payment,
        notes: req.notes,
    };

    Ok(state
        .store
        .update_application_content(id, content, ApplicationStatus::Draft)
        .await?)
}

pub async fn get(state: &AppState, identity: &Identity, id: Uuid) -> Result<Application, ApiError> {
    load_owned(state, id, identity).await
}

pub async fn list_for_user(state: &AppState, identity: &Identity) -> Result<Vec<Application>, ApiError> {
    let filter = ApplicationFilter {
        user_id: Some(identity.id()),
        ..ApplicationFilter::default()
    };
    Ok(state.store.list_applications(&filter).await?)
}

pub async fn list_all(state: &AppState, filter: ApplicationFilter) -> Result<Vec<Application>, ApiError> {
    Ok(state.store.list_applications(&filter).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::application::sample_content;
    use crate::testing::TestContext;
    use crate::types::{Role, VisaCategory};
    use std::collections::HashSet;

    fn request(visa_type_id: Uuid) -> CreateApplicationRequest {
        let content = sample_content();
        CreateApplicationRequest {
            visa_type_id,
            personal_info: content.personal_info,
            travel_info: content.travel_info,
            documents: vec![],
            shipping: None,
            payment_method: None,
            notes: None,
            submit: false,
        }
    }

    #[tokio::test]
    async fn draft_submit_approve_builds_three_entries() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        let (admin, _) = ctx.user(Role::Admin).await;
        let owner = Identity { user };
        let admin = Identity { user: admin };
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;

        let app = create(&ctx.state, &owner, request(visa.id)).await.unwrap();
        assert_eq!(app.status, ApplicationStatus::Draft);
        assert!(app.application_number.starts_with(&format!("VA{}", Utc::now().year())));
        assert_eq!(app.application_number.len(), 12);

        submit(&ctx.state, &owner, app.id, SubmitRequest::default()).await.unwrap();
        let app = admin_update_status(
            &ctx.state,
            &admin,
            app.id,
            StatusUpdateRequest { status: ApplicationStatus::Approved, note: Some("ok".into()) },
        )
        .await
        .unwrap();

        assert_eq!(app.status, ApplicationStatus::Approved);
        let statuses: Vec<_> = app.status_history.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![ApplicationStatus::Draft, ApplicationStatus::Submitted, ApplicationStatus::Approved]
        );
        assert!(app
            .status_history
            .windows(2)
            .all(|pair| pair[0].recorded_at <= pair[1].recorded_at));
        assert_eq!(app.status_history[2].actor_id, admin.id());
    }

    #[tokio::test]
    async fn payment_defaults_from_visa_fees() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        let visa = ctx.visa_type("Japan", "JP", VisaCategory::Business, vec![]).await;

        let app = create(&ctx.state, &Identity { user }, request(visa.id)).await.unwrap();
        let payment = app.content.payment.unwrap();
        assert_eq!(payment.amount, visa.fees.total_fee);
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn submit_twice_is_a_conflict() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        let owner = Identity { user };
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;

        let mut req = request(visa.id);
        req.submit = true;
        let app = create(&ctx.state, &owner, req).await.unwrap();
        assert_eq!(app.status, ApplicationStatus::Submitted);
        assert_eq!(app.status_history.len(), 2);

        let err = submit(&ctx.state, &owner, app.id, SubmitRequest::default()).await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        let stored = ctx.state.store.find_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status_history.len(), 2);
    }

    #[tokio::test]
    async fn non_admin_cannot_change_status() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::Subscriber).await;
        let owner = Identity { user };
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;
        let app = create(&ctx.state, &owner, request(visa.id)).await.unwrap();

        let err = admin_update_status(
            &ctx.state,
            &owner,
            app.id,
            StatusUpdateRequest { status: ApplicationStatus::Approved, note: None },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let stored = ctx.state.store.find_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Draft);
        assert_eq!(stored.status_history.len(), 1);
    }

    #[tokio::test]
    async fn foreign_application_is_forbidden() {
        let ctx = TestContext::new().await;
        let (alice, _) = ctx.user(Role::NonSubscriber).await;
        let (bob, _) = ctx.user(Role::NonSubscriber).await;
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;
        let app = create(&ctx.state, &Identity { user: alice }, request(visa.id)).await.unwrap();

        let err = get(&ctx.state, &Identity { user: bob }, app.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn edits_only_while_draft() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        let owner = Identity { user };
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;
        let app = create(&ctx.state, &owner, request(visa.id)).await.unwrap();

        let mut content = sample_content();
        content.travel_info.purpose = "Conference".to_string();
        let edit = |content: ApplicationContent| UpdateApplicationRequest {
            personal_info: content.personal_info,
            travel_info: content.travel_info,
            documents: vec![],
            shipping: None,
            payment_method: Some("card".into()),
            notes: Some("updated".into()),
        };

        let updated = update_draft(&ctx.state, &owner, app.id, edit(content.clone())).await.unwrap();
        assert_eq!(updated.content.travel_info.purpose, "Conference");
        assert_eq!(updated.content.payment.unwrap().method.as_deref(), Some("card"));

        submit(&ctx.state, &owner, app.id, SubmitRequest::default()).await.unwrap();
        let err = update_draft(&ctx.state, &owner, app.id, edit(content)).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn documents_must_belong_to_the_applicant() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;

        let mut req = request(visa.id);
        req.documents = vec![ApplicationDocument {
            document_type: "passport".into(),
            file_name: "1700000000000-abcdefghijklmnop.pdf".into(),
        }];
        let err = create(&ctx.state, &Identity { user }, req).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn concurrent_creations_get_unique_numbers() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        let owner = Identity { user };
        let visa = ctx.visa_type("France", "FR", VisaCategory::Tourism, vec![]).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let state = ctx.state.clone();
                let owner = owner.clone();
                let visa_id = visa.id;
                tokio::spawn(async move { create(&state, &owner, request(visa_id)).await.unwrap() })
            })
            .collect();

        let mut numbers = HashSet::new();
        for handle in handles {
            let app = handle.await.unwrap();
            assert!(app.is_consistent());
            assert!(numbers.insert(app.application_number));
        }
        assert_eq!(numbers.len(), 25);
    }
}
