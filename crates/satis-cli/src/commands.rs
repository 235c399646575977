use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info_span};

use satis_persistence::{
    Clock, FilePersister, Filesystem, GuardConfig, LockProvider, PersistenceError, Persister,
};

use crate::cli::{BackupsArgs, GuardArgs, WriteArgs};

/// Build the guard configuration from `--config` and the override flags.
pub fn resolve_guard_config(args: &GuardArgs) -> Result<GuardConfig> {
    let mut config = match (&args.config, &args.file) {
        (Some(path), _) => GuardConfig::from_file(path)
            .with_context(|| format!("load guard configuration {}", path.display()))?,
        (None, Some(file)) => GuardConfig::new(file),
        (None, None) => bail!("no configuration file given; pass --file or --config"),
    };

    if args.config.is_some()
        && let Some(file) = &args.file
    {
        config.target = file.clone();
    }
    if let Some(dir) = &args.backup_dir {
        config.backup_dir = Some(dir.clone());
    }
    if let Some(timeout_ms) = args.lock_timeout_ms {
        config.lock.timeout_ms = timeout_ms;
    }
    debug!(?config, "Resolved guard configuration");
    Ok(config)
}

pub fn run_show(persister: &impl Persister, out: &mut impl Write) -> Result<()> {
    let content = persister.load()?;
    writeln!(out, "{content}").context("write document")?;
    Ok(())
}

pub fn run_write(persister: &impl Persister, args: &WriteArgs) -> Result<()> {
    let content = match &args.input {
        Some(path) => read_input(path)?,
        None => io::read_to_string(io::stdin()).context("read new content from stdin")?,
    };
    let _span = info_span!("write", bytes = content.len()).entered();
    persister.flush(&content)?;
    Ok(())
}

pub fn run_backup<F, L, C>(persister: &FilePersister<F, L, C>, out: &mut impl Write) -> Result<()>
where
    F: Filesystem,
    L: LockProvider,
    C: Clock,
{
    let written = match persister.create_backup()? {
        Some(snapshot) => writeln!(out, "{}", snapshot.path.display()),
        None => writeln!(
            out,
            "No backup created (no current file or no writable backup directory)"
        ),
    };
    written.context("write report")?;
    Ok(())
}

pub fn run_backups<F, L, C>(
    persister: &FilePersister<F, L, C>,
    args: &BackupsArgs,
    out: &mut impl Write,
) -> Result<()>
where
    F: Filesystem,
    L: LockProvider,
    C: Clock,
{
    let snapshots = persister.list_backups()?;
    if args.json {
        serde_json::to_writer_pretty(&mut *out, &snapshots).context("encode backup list")?;
        writeln!(out)?;
        return Ok(());
    }
    for snapshot in &snapshots {
        writeln!(out, "{}  {}", snapshot.created_at, snapshot.path.display())?;
    }
    Ok(())
}

/// The remediation hint of the first persistence error in the chain.
pub fn suggestion_for(error: &anyhow::Error) -> Option<String> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<PersistenceError>())
        .and_then(PersistenceError::suggestion)
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read new content from {}", path.display()))
}
