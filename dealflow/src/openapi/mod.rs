//! OpenAPI documentation for the CRM API at `/api/v1/*`.
//!
//! The document is served as JSON at `/api-docs/openapi.json` and rendered at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{api, db, insights, pipeline, types};

/// Security scheme for the identity header set by the authenticating proxy.
struct ProxyHeaderAddon;

impl Modify for ProxyHeaderAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "X-Dealflow-User".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-dealflow-user",
                    "Email address of the authenticated user, set by the reverse proxy in front of Dealflow.\n\n\
                    ```\nx-dealflow-user: ada@example.com\n```",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dealflow API",
        description = "Contacts, pipeline, follow-ups and email for sales teams, plus customer health and churn for admins."
    ),
    servers(
        (url = "/api/v1", description = "Dealflow API server")
    ),
    modifiers(&ProxyHeaderAddon),
    paths(
        api::handlers::config::get_config,
        api::handlers::users::get_current_user,
        api::handlers::users::list_users,
        api::handlers::users::update_user,
        api::handlers::contacts::list_contacts,
        api::handlers::contacts::create_contact,
        api::handlers::contacts::get_contact,
        api::handlers::contacts::update_contact,
        api::handlers::contacts::delete_contact,
        api::handlers::contacts::add_contact_tag,
        api::handlers::contacts::remove_contact_tag,
        api::handlers::deals::list_deals,
        api::handlers::deals::get_pipeline,
        api::handlers::deals::create_deal,
        api::handlers::deals::get_deal,
        api::handlers::deals::update_deal,
        api::handlers::deals::delete_deal,
        api::handlers::deals::add_deal_tag,
        api::handlers::deals::remove_deal_tag,
        api::handlers::activities::list_activities,
        api::handlers::activities::create_activity,
        api::handlers::activities::get_activity,
        api::handlers::activities::update_activity,
        api::handlers::activities::delete_activity,
        api::handlers::reminders::list_reminders,
        api::handlers::reminders::create_reminder,
        api::handlers::reminders::get_reminder,
        api::handlers::reminders::update_reminder,
        api::handlers::reminders::delete_reminder,
        api::handlers::reminders::complete_reminder,
        api::handlers::reminders::reopen_reminder,
        api::handlers::tags::list_tags,
        api::handlers::tags::create_tag,
        api::handlers::tags::update_tag,
        api::handlers::tags::delete_tag,
        api::handlers::mail_accounts::list_mail_accounts,
        api::handlers::mail_accounts::create_mail_account,
        api::handlers::mail_accounts::delete_mail_account,
        api::handlers::email_drafts::list_email_drafts,
        api::handlers::email_drafts::create_email_draft,
        api::handlers::email_drafts::get_email_draft,
        api::handlers::email_drafts::update_email_draft,
        api::handlers::email_drafts::delete_email_draft,
        api::handlers::email_drafts::send_email_draft,
        api::handlers::processed_emails::list_processed_emails,
        api::handlers::processed_emails::ingest_processed_email,
        api::handlers::organizations::list_organizations,
        api::handlers::organizations::create_organization,
        api::handlers::organizations::get_organization,
        api::handlers::organizations::update_organization,
        api::handlers::organizations::delete_organization,
        api::handlers::organizations::get_organization_health,
        api::handlers::organizations::churn_organization,
        api::handlers::organizations::list_churn_events,
        api::handlers::insights::get_portfolio_health,
        api::handlers::insights::get_renewals,
        api::handlers::insights::get_churn_stats,
        api::handlers::insights::get_upgrade_opportunities,
        api::handlers::insights::get_revenue,
    ),
    components(
        schemas(
            types::Tier,
            pipeline::DealStage,
            pipeline::StageSummary,
            pipeline::PipelineSummary,
            db::models::activities::ActivityKind,
            db::models::reminders::ReminderStatus,
            db::models::email_drafts::DraftStatus,
            db::models::organizations::OrganizationStatus,
            db::models::organizations::ChurnReason,
            api::models::users::Role,
            api::models::users::UserResponse,
            api::models::users::UserUpdate,
            api::models::contacts::ContactCreate,
            api::models::contacts::ContactUpdate,
            api::models::contacts::ContactResponse,
            api::models::deals::DealCreate,
            api::models::deals::DealUpdate,
            api::models::deals::DealResponse,
            api::models::activities::ActivityCreate,
            api::models::activities::ActivityUpdate,
            api::models::activities::ActivityResponse,
            api::models::reminders::ReminderCreate,
            api::models::reminders::ReminderUpdate,
            api::models::reminders::ReminderResponse,
            api::models::tags::TagCreate,
            api::models::tags::TagUpdate,
            api::models::tags::TagResponse,
            api::models::mail::MailAccountCreate,
            api::models::mail::MailAccountResponse,
            api::models::mail::EmailDraftCreate,
            api::models::mail::EmailDraftUpdate,
            api::models::mail::EmailDraftResponse,
            api::models::mail::ProcessedEmailCreate,
            api::models::mail::ProcessedEmailResponse,
            api::models::organizations::OrganizationCreate,
            api::models::organizations::OrganizationUpdate,
            api::models::organizations::OrganizationResponse,
            api::models::organizations::ChurnRequest,
            api::models::organizations::ChurnEventResponse,
            api::models::config::ConfigResponse,
            insights::HealthCategory,
            insights::HealthBreakdown,
            insights::PortfolioHealth,
            insights::RenewalEntry,
            insights::RenewalBucket,
            insights::RenewalReport,
            insights::ChurnReasonStat,
            insights::ChurnStats,
            insights::OpportunityKind,
            insights::UpgradeOpportunity,
            insights::TierRevenue,
            insights::RevenueSummary,
        )
    ),
    tags(
        (name = "users", description = "The signed-in user, and user management for admins."),
        (name = "contacts", description = "People you sell to. Contacts carry tags and link to deals, activities and reminders."),
        (name = "deals", description = "Opportunities moving through the pipeline.

Stages run `lead`, `qualified`, `proposal`, `negotiation`, then `won` or `lost`. Moving a deal into a closed stage stamps `closed_at`; moving it back out clears it."),
        (name = "activities", description = "Calls, meetings, emails and notes logged against a contact or deal."),
        (name = "reminders", description = "Follow-up tasks with a due date. Open reminders past their due date are reported as overdue."),
        (name = "tags", description = "Labels shared across contacts and deals. Names are unique, case-insensitively."),
        (name = "mail", description = "Sending accounts, templated email drafts and ingestion of inbound mail.

Draft subjects and bodies are rendered once at creation time with `contact`, `deal` and `sender` in scope."),
        (name = "organizations", description = "Paying customer accounts, their health score and churn history. Admin only."),
        (name = "insights", description = "Portfolio-wide health, renewals, churn, expansion and revenue reports. Admin only."),
        (name = "config", description = "Client metadata."),
    )
)]
pub struct ApiDoc;
