use anyhow::Context as _;

use super::commands::{ConnectArgs, ModifierArgs};
use super::pickers::text_or_prompt;
use super::session::{apply_connect, confirm_strategy, credentials, install_token, repo_root};
use super::sync::finish;
use crate::config::{Context, Meta, Options, SYSTEM_FILE, SystemConfig, save_cached_token};
use crate::error::Error;
use crate::remote::{HttpRemote, Remote, login};
use crate::store::RepoStore;
use crate::store::path::validate_name;
use crate::sync::{AutoApprove, Engine, Selection};

/// Logs in, looks the system up and lays out a fresh repo for it under
/// `./<system name>`.
fn bootstrap(connect: &ConnectArgs, modifiers: &ModifierArgs) -> anyhow::Result<Engine<HttpRemote>> {
    let url = text_or_prompt(connect.url.clone(), "Platform URL")?;
    let system_key = text_or_prompt(connect.system_key.clone(), "System key")?;

    let mut system = SystemConfig {
        platform_url: url.trim_end_matches('/').to_string(),
        system_key,
        messaging_url: connect.messaging_url.clone().unwrap_or_default(),
        developer_email: connect.email.clone().unwrap_or_default(),
        ..SystemConfig::default()
    };

    let mut options = Options::default();
    modifiers.apply(&mut options);

    let mut remote = HttpRemote::new(&system, options.max_retries)?;
    let mut creds = credentials(connect, &system, &Meta::default());
    let mut token = install_token(&mut remote, connect.dev_token.as_deref(), None, &mut creds)?;

    let info = match remote.system_info() {
        Err(Error::AuthFailure(_)) if connect.dev_token.is_none() => {
            // The cached ~/.cbauth token was stale.
            token = login(&mut remote, &mut creds).context("login failed")?;
            save_cached_token(&token)?;
            remote.system_info()?
        }
        other => other?,
    };
    if info.name.is_empty() {
        anyhow::bail!("The platform did not return a name for system '{}'", system.system_key);
    }
    validate_name(&info.name)?;
    system.name = info.name;
    system.description = info.description;
    system.system_secret = info.system_secret;

    let root = std::env::current_dir()?.join(&system.name);
    if root.join(SYSTEM_FILE).exists() {
        anyhow::bail!("{} already holds a system repo", root.display());
    }

    let store = RepoStore::new(&root, options.clone());
    store.init_hidden()?;
    store.save_system(&system)?;
    store.save_meta(&Meta {
        token,
        developer_email: system.developer_email.clone(),
        options: Some(options.clone()),
    })?;

    let confirm = confirm_strategy(&options);
    let ctx = Context::new(root, system, options);
    let mut engine = Engine::new(ctx, remote, confirm).with_credentials(Box::new(creds));
    engine.refresh_maps()?;
    Ok(engine)
}

pub fn run_init(connect: ConnectArgs, modifiers: ModifierArgs) -> anyhow::Result<()> {
    let engine = bootstrap(&connect, &modifiers)?;
    let ctx = engine.context();
    println!();
    println!("Initialized repo for system '{}' in {}", ctx.system.name, ctx.root.display());
    println!("Run 'cb-cli pull -all' inside it to fetch assets.");
    Ok(())
}

pub fn run_export(connect: ConnectArgs, modifiers: ModifierArgs) -> anyhow::Result<()> {
    let mut engine = bootstrap(&connect, &modifiers)?;
    let report = engine.pull(&Selection::everything())?;
    let ctx = engine.context();
    println!();
    println!("Exported system '{}' into {}", ctx.system.name, ctx.root.display());
    finish(&report)
}

/// Creates a new system from the repo's `system.json` and pushes every
/// local asset into it.
pub fn run_import(connect: ConnectArgs, modifiers: ModifierArgs) -> anyhow::Result<()> {
    let root = repo_root()?;
    let repo = RepoStore::new(&root, Options::default());
    let mut system = repo.load_system()?;
    let meta = repo.load_meta()?;
    apply_connect(&mut system, &connect);
    if system.platform_url.is_empty() {
        system.platform_url = text_or_prompt(None, "Platform URL")?;
    }

    let mut options = meta.options.clone().unwrap_or_default();
    modifiers.apply(&mut options);
    options.auto_approve = true;

    let mut unbound = HttpRemote::unbound(&system.platform_url, options.max_retries)?;
    let mut creds = credentials(&connect, &system, &meta);
    let token = install_token(&mut unbound, connect.dev_token.as_deref(), None, &mut creds)?;

    let created = unbound
        .create_system(&system.name, &system.description)
        .with_context(|| format!("could not create system '{}'", system.name))?;
    system.system_key = created.system_key;
    system.system_secret = created.system_secret;
    repo.save_system(&system)?;
    repo.init_hidden()?;
    repo.save_meta(&Meta {
        token: token.clone(),
        developer_email: system.developer_email.clone(),
        options: Some(options.clone()),
    })?;
    println!("Created system '{}' ({})", system.name, system.system_key);

    let mut remote = HttpRemote::new(&system, options.max_retries)?;
    remote.set_token(&token);
    let ctx = Context::new(root, system, options);
    let mut engine = Engine::new(ctx, remote, Box::new(AutoApprove)).with_credentials(Box::new(creds));
    engine.refresh_maps()?;
    let report = engine.push(&Selection::everything())?;
    finish(&report)
}

/// Points the repo at another platform or system.
pub fn run_target(connect: ConnectArgs) -> anyhow::Result<()> {
    if connect.url.is_none() && connect.system_key.is_none() && connect.messaging_url.is_none() {
        anyhow::bail!("target needs at least one of -url, -system-key or -messaging-url");
    }

    let root = repo_root()?;
    let repo = RepoStore::new(&root, Options::default());
    let mut system = repo.load_system()?;
    let meta = repo.load_meta()?;
    apply_connect(&mut system, &connect);

    let options = meta.options.clone().unwrap_or_default();
    let mut remote = HttpRemote::new(&system, options.max_retries)?;
    let mut creds = credentials(&connect, &system, &meta);
    let token = match &connect.dev_token {
        Some(token) => {
            remote.set_token(token);
            token.clone()
        }
        None => login(&mut remote, &mut creds).context("login failed")?,
    };

    let info = remote.system_info()?;
    if !info.system_secret.is_empty() {
        system.system_secret = info.system_secret;
    }
    repo.save_system(&system)?;
    repo.save_token(&token)?;

    let ctx = Context::new(root, system, options);
    let mut engine = Engine::new(ctx, remote, Box::new(AutoApprove)).with_credentials(Box::new(creds));
    engine.refresh_maps()?;

    let ctx = engine.context();
    println!("Now targeting {} ({})", ctx.system.platform_url, ctx.system.system_key);
    Ok(())
}
