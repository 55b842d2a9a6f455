use std::io::Write;
use std::process::{Command, Stdio};

use super::commands::{AssetArgs, ConnectArgs, ModifierArgs};
use super::session::{open_engine, repo_root};
use crate::config::Options;
use crate::store::RepoStore;
use crate::store::path::code_path;
use crate::sync::{AssetDiff, Report, Selection, decompress_portal, scaffold};
use crate::types::Kind;

/// Prints each per-asset line, then fails if any asset failed.
pub fn finish(report: &Report) -> anyhow::Result<()> {
    for entry in report.entries() {
        println!("{entry}");
    }
    let failed: Vec<_> = report.failures().collect();
    if failed.is_empty() {
        return Ok(());
    }
    eprintln!();
    for entry in &failed {
        eprintln!("{entry}");
    }
    anyhow::bail!("{} asset(s) failed", failed.len())
}

fn require(selection: Selection) -> anyhow::Result<Selection> {
    if selection.is_empty() {
        anyhow::bail!("Nothing selected. Pass -all, -all-<kind>s or -<kind>=<name>");
    }
    Ok(selection)
}

pub fn run_pull(connect: ConnectArgs, assets: AssetArgs, modifiers: ModifierArgs) -> anyhow::Result<()> {
    let mut engine = open_engine(&connect, &modifiers)?;
    let selection = require(assets.selection(engine.store())?)?;
    let report = engine.pull(&selection)?;
    finish(&report)
}

pub fn run_push(connect: ConnectArgs, assets: AssetArgs, modifiers: ModifierArgs) -> anyhow::Result<()> {
    let mut engine = open_engine(&connect, &modifiers)?;
    let selection = require(assets.selection(engine.store())?)?;
    let report = engine.push(&selection)?;
    finish(&report)
}

fn print_diff(diff: &AssetDiff) {
    let (kind, name) = (diff.kind, &diff.name);
    if diff.missing_remote {
        println!("{kind} '{name}' exists only locally");
    } else if diff.is_clean() {
        println!("{kind} '{name}' matches the remote");
    } else {
        println!("{kind} '{name}' differs:");
        for message in &diff.messages {
            println!("  {message}");
        }
    }
}

/// Feeds the remote source to `diff -u <local> -`.
fn diff_code(local: &std::path::Path, remote_code: &str) -> anyhow::Result<()> {
    let mut child = Command::new("diff")
        .arg("-u")
        .arg(local)
        .arg("-")
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow::anyhow!("could not run diff: {e}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(remote_code.as_bytes())?;
    }
    // diff exits 1 when the inputs differ.
    let status = child.wait()?;
    if status.code().is_some_and(|c| c > 1) {
        anyhow::bail!("diff failed on {}", local.display());
    }
    Ok(())
}

pub fn run_diff(
    connect: ConnectArgs,
    assets: AssetArgs,
    modifiers: ModifierArgs,
    code: bool,
) -> anyhow::Result<()> {
    let mut engine = open_engine(&connect, &modifiers)?;
    let selection = require(assets.selection(engine.store())?)?;
    let diffs = engine.diff(&selection)?;

    let root = engine.context().root.clone();
    for diff in &diffs {
        print_diff(diff);
        if let (true, Some(remote_code)) = (code, &diff.remote_code) {
            diff_code(&code_path(&root, diff.kind, &diff.name), remote_code)?;
        }
    }

    let dirty = diffs.iter().filter(|d| !d.is_clean()).count();
    println!();
    println!("{} asset(s) compared, {dirty} with differences", diffs.len());
    Ok(())
}

/// Writes local skeletons; nothing reaches the remote until the next push.
pub fn run_create(assets: AssetArgs) -> anyhow::Result<()> {
    let named = assets.named()?;
    if named.is_empty() {
        anyhow::bail!("Name the asset to create, for example -service=MyService");
    }
    let store = RepoStore::new(repo_root()?, Options::default());
    for (kind, name) in named {
        let path = scaffold(&store, kind, &name)?;
        println!("Created {kind} '{name}' at {}", path.display());
    }
    Ok(())
}

pub fn run_delete(connect: ConnectArgs, assets: AssetArgs, modifiers: ModifierArgs) -> anyhow::Result<()> {
    let named = assets.named()?;
    if named.is_empty() {
        anyhow::bail!("Name the asset to delete, for example -role=Old");
    }
    let mut engine = open_engine(&connect, &modifiers)?;
    let mut report = Report::default();
    for (kind, name) in named {
        let outcome = engine.delete(kind, &name)?;
        report.record(kind, name, outcome);
    }
    finish(&report)
}

pub fn run_decompress(portals: Vec<String>, all: bool) -> anyhow::Result<()> {
    let store = RepoStore::new(repo_root()?, Options::default());
    let names = if all { store.list(Kind::Portal)? } else { portals };
    if names.is_empty() {
        anyhow::bail!("Pass -portal=<name> or -all-portals");
    }
    for name in names {
        if decompress_portal(&store, &name)? {
            println!("Decompressed portal '{name}'");
        } else {
            println!("Portal '{name}' is already decompressed");
        }
    }
    Ok(())
}
