//! Code-signing identity command handlers.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Serialize;
use tvsling_api::{EnrollmentClient, VENDOR_ENROLLMENT_URL};
use tvsling_core::{
    CertificateProfile, IdentityError, IdentityIssuer, IdentityRequest, RequestProfile,
};

use crate::cli::{CertArgs, CertCommand, CertIssueArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: CertArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        CertCommand::Issue(issue) => issue_cmd(issue, global).await,
    }
}

async fn issue_cmd(args: CertIssueArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = tvsling_config::load_config_or_default();

    let email = args
        .email
        .or_else(|| config.identity.email.clone())
        .ok_or_else(|| CliError::Validation {
            field: "email".into(),
            reason: "no email configured; pass --email or set [identity].email".into(),
        })?;
    let user_id = global
        .user
        .clone()
        .or_else(|| config.server.user_id.clone())
        .ok_or_else(|| CliError::Validation {
            field: "user".into(),
            reason: "no user id configured; pass --user or set [server].user_id".into(),
        })?;
    let token = super::resolve_token(global, &config)?;

    let endpoint: url::Url = args
        .endpoint
        .as_deref()
        .unwrap_or(VENDOR_ENROLLMENT_URL)
        .parse()
        .map_err(|_| CliError::Validation {
            field: "endpoint".into(),
            reason: "invalid enrollment URL".into(),
        })?;
    let out_dir = args.out.unwrap_or_else(|| config.identity_dir());

    // 2048-bit RSA generation takes a noticeable moment; keep it off the
    // async runtime.
    let bar = output::spinner("Generating key pair and signing request…", global.quiet);
    let device_id = args.device_id.clone();
    let request = tokio::task::spawn_blocking(move || {
        IdentityRequest::generate(&email, &device_id, RequestProfile::Distributor)
    })
    .await
    .map_err(|e| CliError::Identity(IdentityError::Request(e.to_string())))??;
    bar.finish_and_clear();

    let bar = output::spinner("Enrolling with the vendor…", global.quiet);
    let enrollment = EnrollmentClient::new(endpoint, Duration::from_secs(30))?;
    let issuer = IdentityIssuer::new(enrollment);
    let profile = issuer.enroll(&request, &token, &user_id, &out_dir).await?;
    bar.finish_and_clear();

    report(&profile, global);
    Ok(())
}

#[derive(Serialize)]
struct IssueSummary {
    author_bundle: String,
    distributor_bundle: String,
    author_password: String,
    distributor_password: String,
    expires_at: Option<String>,
}

fn report(profile: &CertificateProfile, global: &GlobalOpts) {
    let summary = IssueSummary {
        author_bundle: profile.author_bundle.display().to_string(),
        distributor_bundle: profile.distributor_bundle.display().to_string(),
        author_password: profile.author_password.expose_secret().to_owned(),
        distributor_password: profile.distributor_password.expose_secret().to_owned(),
        expires_at: profile.expires_at.map(|t| t.to_rfc3339()),
    };

    let rendered = match global.output {
        OutputFormat::Json => output::render_json_pretty(&summary),
        OutputFormat::JsonCompact => output::render_json_compact(&summary),
        OutputFormat::Table | OutputFormat::Plain => {
            let color = output::should_color(&global.color);
            let mut lines = vec![
                output::success_line("identity issued", color),
                format!("Author bundle:       {}", summary.author_bundle),
                format!("  password:          {}", summary.author_password),
                format!("Distributor bundle:  {}", summary.distributor_bundle),
                format!("  password:          {}", summary.distributor_password),
            ];
            if let Some(ref expires) = summary.expires_at {
                lines.push(format!("Expires:             {expires}"));
            }
            lines.push("Store the passwords now; they are not persisted anywhere.".into());
            lines.join("\n")
        }
    };
    output::print_output(&rendered, global.quiet);
}
