use notepaper_core::config::{ClientConfig, SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV};
use notepaper_core::config::{has_http_scheme, non_blank};

use crate::cli::ConfigCommands;
use crate::commands::common::mask_secret;
use crate::config_profiles::{default_config_path, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            supabase_url,
            supabase_anon_key,
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let (env_url, env_anon_key) = ClientConfig::env_values();

    let merged = merge_profile(
        &existing_profile,
        (supabase_url, supabase_anon_key),
        (env_url, env_anon_key),
    )?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let missing_fields = merged.missing_fields();
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `notepaper auth login --email <email> --password <password>`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

/// Merge explicit flags over environment values over the stored profile.
pub fn merge_profile(
    existing: &CliProfile,
    explicit: (Option<String>, Option<String>),
    env: (Option<String>, Option<String>),
) -> Result<CliProfile, CliError> {
    let supabase_url = non_blank(explicit.0)
        .or_else(|| non_blank(env.0))
        .or_else(|| existing.supabase_url())
        .map(|url| url.trim_end_matches('/').to_string());
    let supabase_anon_key = non_blank(explicit.1)
        .or_else(|| non_blank(env.1))
        .or_else(|| existing.supabase_anon_key());

    if let Some(url) = supabase_url.as_deref() {
        if !has_http_scheme(url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }

    Ok(CliProfile {
        supabase_url,
        supabase_anon_key,
    })
}

pub fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let path = default_config_path().map_err(CliError::Config)?;

    println!("Config file: {}", path.display());
    println!(
        "Active profile: {}",
        config.active_profile.as_deref().unwrap_or("(none)")
    );
    println!("Profile: {profile_name}");

    match config.profile(&profile_name) {
        Some(profile) => {
            println!(
                "  supabase_url: {}",
                profile.supabase_url().as_deref().unwrap_or("(unset)")
            );
            println!(
                "  supabase_anon_key: {}",
                profile
                    .supabase_anon_key()
                    .map_or_else(|| "(unset)".to_string(), |key| mask_secret(&key))
            );
        }
        None => println!("  (not configured)"),
    }

    let (env_url, env_anon_key) = ClientConfig::env_values();
    if non_blank(env_url).is_some() {
        println!("  {SUPABASE_URL_ENV} overrides supabase_url");
    }
    if non_blank(env_anon_key).is_some() {
        println!("  {SUPABASE_ANON_KEY_ENV} overrides supabase_anon_key");
    }

    match config.client_config(&profile_name) {
        Ok(Some(resolved)) => println!("Backend: {}", resolved.supabase_url),
        Ok(None) => println!("Backend: not configured"),
        Err(error) => println!("Backend: invalid ({error})"),
    }
    Ok(())
}
