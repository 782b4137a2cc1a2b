use notepaper_core::auth::SignUpOutcome;

use crate::auth::{clear_stored_session, load_stored_session};
use crate::cli::AuthCommands;
use crate::commands::common::open_context;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => {
            let (profile_name, context) = open_context(profile.as_deref().or(global_profile))?;
            let session = context
                .sign_in(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Signup {
            profile,
            email,
            password,
        } => {
            let (profile_name, context) = open_context(profile.as_deref().or(global_profile))?;
            let outcome = context
                .sign_up(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            match outcome {
                SignUpOutcome::SignedIn(session) => {
                    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                    println!("Signed up and signed in profile '{profile_name}' as {email_label}");
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!("Check {email} for a confirmation link, then run `notepaper auth login`.");
                }
            }
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let explicit = profile.as_deref().or(global_profile);
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(explicit);

            let session = if config.client_config(&profile_name)?.is_some() {
                let (_, context) = open_context(explicit)?;
                let session = context
                    .restore_session()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?;
                if let Some(session) = &session {
                    match context.auth().get_user(&session.access_token).await {
                        Ok(user) => tracing::debug!("Backend confirmed user {}", user.id),
                        Err(error) => {
                            println!("Profile '{profile_name}' has a stored session the backend rejected: {error}");
                            return Ok(());
                        }
                    }
                }
                session
            } else {
                println!("Profile '{profile_name}' is not configured.");
                load_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?
            };

            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let explicit = profile.as_deref().or(global_profile);
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(explicit);

            if config.client_config(&profile_name)?.is_some() {
                let (_, context) = open_context(explicit)?;
                if let Err(error) = context.restore_session().await {
                    tracing::warn!("Failed to restore session before sign-out: {}", error);
                }
                context
                    .teardown()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            } else {
                clear_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?;
            }

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
