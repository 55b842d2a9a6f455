use std::path::PathBuf;

use anyhow::Context as _;
use tracing::{debug, info, warn};

use super::commands::{ConnectArgs, ModifierArgs};
use super::pickers::{InteractiveConfirm, PromptCredentials};
use crate::config::{Context, Meta, Options, SystemConfig, find_repo_root, load_cached_token, save_cached_token};
use crate::remote::{CredentialSource, HttpRemote, Remote, login};
use crate::store::RepoStore;
use crate::sync::{AutoApprove, Confirm, Engine};

/// Locates the repo containing the working directory.
pub fn repo_root() -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    match find_repo_root(&cwd) {
        Some(root) => Ok(root),
        None => anyhow::bail!(
            "Not inside a system repo (no system.json in {} or any parent). Run 'cb-cli init' or 'cb-cli export' first.",
            cwd.display()
        ),
    }
}

/// Overlays connection flags onto the stored system metadata.
pub fn apply_connect(system: &mut SystemConfig, connect: &ConnectArgs) {
    if let Some(url) = &connect.url {
        system.platform_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(url) = &connect.messaging_url {
        system.messaging_url = url.trim().to_string();
    }
    if let Some(key) = &connect.system_key {
        system.system_key = key.trim().to_string();
    }
    if let Some(email) = &connect.email {
        system.developer_email = email.trim().to_string();
    }
}

pub fn confirm_strategy(options: &Options) -> Box<dyn Confirm> {
    if options.auto_approve {
        Box::new(AutoApprove)
    } else {
        Box::new(InteractiveConfirm)
    }
}

pub fn credentials(connect: &ConnectArgs, system: &SystemConfig, meta: &Meta) -> PromptCredentials {
    let email = connect
        .email
        .clone()
        .or_else(|| (!system.developer_email.is_empty()).then(|| system.developer_email.clone()))
        .or_else(|| (!meta.developer_email.is_empty()).then(|| meta.developer_email.clone()));
    PromptCredentials::new(email, connect.password.clone())
}

/// Installs a token on `remote`, taken from the first source that has one:
/// the `-dev-token` flag, the repo's cached token, `~/.cbauth`, then a
/// fresh login.
pub fn install_token<R: Remote>(
    remote: &mut R,
    dev_token: Option<&str>,
    repo_token: Option<&str>,
    source: &mut dyn CredentialSource,
) -> anyhow::Result<String> {
    let cached = match load_cached_token() {
        Ok(token) => token,
        Err(err) => {
            debug!(error = %err, "no usable ~/.cbauth");
            None
        }
    };

    let found = dev_token
        .map(str::to_string)
        .or_else(|| repo_token.filter(|t| !t.is_empty()).map(str::to_string))
        .or(cached);

    if let Some(token) = found {
        remote.set_token(&token);
        return Ok(token);
    }

    let token = login(remote, source).context("login failed")?;
    if let Err(err) = save_cached_token(&token) {
        warn!(error = %err, "could not cache the developer token in ~/.cbauth");
    }
    info!("logged in");
    Ok(token)
}

/// Opens the repo around the working directory and builds an engine
/// connected to its system.
pub fn open_engine(connect: &ConnectArgs, modifiers: &ModifierArgs) -> anyhow::Result<Engine<HttpRemote>> {
    let root = repo_root()?;
    let repo = RepoStore::new(&root, Options::default());
    let mut system = repo.load_system()?;
    let meta = repo.load_meta()?;

    apply_connect(&mut system, connect);
    if system.platform_url.is_empty() {
        anyhow::bail!("system.json has no platform_url; pass -url");
    }

    let mut options = meta.options.clone().unwrap_or_default();
    modifiers.apply(&mut options);

    let mut remote = HttpRemote::new(&system, options.max_retries)?;
    let mut creds = credentials(connect, &system, &meta);
    let token = install_token(
        &mut remote,
        connect.dev_token.as_deref(),
        Some(meta.token.as_str()),
        &mut creds,
    )?;

    let confirm = confirm_strategy(&options);
    let ctx = Context::new(root, system, options);
    let engine = Engine::new(ctx, remote, confirm).with_credentials(Box::new(creds));
    if token != meta.token {
        engine.store().save_token(&token)?;
    }
    Ok(engine)
}
