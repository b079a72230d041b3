//! Wiring from configuration to the core services a command needs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use rental_core::cache::{InventoryCache, snapshot};
use rental_core::config::{self, Config};
use rental_core::directory::StaticDirectory;
use rental_core::wiki::JsonRpcWiki;
use rental_core::{AuthLookup, ErrorCode, ItemService};

use crate::output::{CliError, OutputMode, render_error};

/// Item service plus the snapshot it was restored from.
pub struct Inventory {
    pub service: ItemService,
    snapshot_path: Option<PathBuf>,
}

impl Inventory {
    /// Connect to the configured wiki and restore the cache snapshot, if any.
    pub fn open(config: &Config) -> Result<Self> {
        if config.wiki.token.is_none() {
            tracing::debug!("no wiki token configured, using anonymous access");
        }
        let wiki = Arc::new(JsonRpcWiki::new(
            &config.wiki.server,
            config.wiki.token.clone(),
            config.wiki.timeout(),
        ));
        tracing::debug!(endpoint = wiki.endpoint(), "wiki client ready");

        let namespace = config.wiki.namespace.clone();
        let cache = Arc::new(InventoryCache::new(wiki.clone(), namespace.clone()));

        let snapshot_path = config.cache.resolved_snapshot_path();
        if let Some(path) = snapshot_path.as_deref() {
            match snapshot::load(path, &namespace) {
                Ok(Some(state)) => {
                    tracing::debug!(entries = state.len(), "restored cache snapshot");
                    cache.restore(state);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("cache snapshot not restored: {e:#}"),
            }
        }

        let service = ItemService::new(cache, wiki).with_wiki_server(&config.wiki.server);
        Ok(Self {
            service,
            snapshot_path,
        })
    }

    /// Save the cache for the next invocation. Failures are logged only.
    pub fn persist(&self) {
        let Some(path) = self.snapshot_path.as_deref() else {
            return;
        };
        let cache = self.service.cache();
        if let Err(e) = snapshot::save(path, cache.namespace(), &cache.snapshot()) {
            tracing::warn!("cache snapshot not saved: {e:#}");
        }
    }

    /// Delete the saved snapshot, if persistence is enabled.
    pub fn forget_snapshot(&self) -> Result<()> {
        match self.snapshot_path.as_deref() {
            Some(path) => snapshot::remove(path),
            None => Ok(()),
        }
    }
}

/// Load configuration from `--config`, `RENTAL_CONFIG`, or the default path.
pub fn load_config(explicit: Option<&Path>, output: OutputMode) -> Result<Config> {
    match config::load_config(explicit) {
        Ok(config) => Ok(config),
        Err(e) => {
            let code = ErrorCode::ConfigParseError;
            render_error(
                output,
                &CliError::with_details(format!("{e:#}"), code.hint().unwrap_or_default(), code.code()),
            )?;
            Err(e.context("load rental configuration"))
        }
    }
}

/// Build the authorization lookup from the configured directory file.
pub fn open_auth(config: &Config, output: OutputMode) -> Result<AuthLookup> {
    let Some(path) = config.directory.entries_file.as_deref() else {
        render_error(
            output,
            &CliError::with_details(
                "no directory configured",
                "set [directory] entries_file in the rental config",
                "no_directory",
            ),
        )?;
        anyhow::bail!("no directory configured");
    };

    let directory = StaticDirectory::load(path)?;
    Ok(AuthLookup::new(Arc::new(directory), config.directory.base_dn.clone())
        .with_scope(config.directory.scope)
        .with_timeout(config.directory.timeout())
        .with_privileged_groups(config.groups_with_edit_rights.iter().cloned()))
}
