//! Command handlers behind the CLI subcommands.
//!
//! Handlers print progress for humans and return `anyhow::Result`; the
//! library errors they wrap stay reachable through the error chain.

pub mod ca;
pub mod certs;
pub mod platform;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::configs::AppConfig;
use crate::external_interface::{Signer, StoreTool};
use crate::storage::Workspace;
use crate::ui;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Everything a handler needs: configuration, the CA workspace and the tools.
pub struct CommandContext<'a> {
    pub config: &'a AppConfig,
    pub workspace: Workspace,
    pub signer: &'a dyn Signer,
    pub store: &'a dyn StoreTool,
}

impl<'a> CommandContext<'a> {
    /// Open (or create) the configured workspace.
    pub fn open(config: &'a AppConfig, signer: &'a dyn Signer, store: &'a dyn StoreTool) -> Result<Self> {
        let workspace = Workspace::init(&config.workspace.path).with_context(|| {
            format!(
                "Failed to open workspace {}",
                config.workspace.path.display()
            )
        })?;
        Ok(CommandContext {
            config,
            workspace,
            signer,
            store,
        })
    }

    /// `name`, else the current CA, else the configured default.
    pub fn ca_name(&self, name: Option<&str>) -> Result<String> {
        Ok(self
            .workspace
            .ca_name_or_current(name, &self.config.workspace.default_ca)?)
    }
}

/// Which targets a destructive command acts on.
#[derive(Debug, Clone)]
pub enum Targets {
    All,
    Named(Vec<String>),
}

impl Targets {
    pub fn from_args(names: Vec<String>, all: bool) -> Self {
        if all {
            Targets::All
        } else {
            Targets::Named(names)
        }
    }

    pub fn resolve(self, existing: Vec<String>) -> Vec<String> {
        match self {
            Targets::All => existing,
            Targets::Named(names) => names,
        }
    }
}

/// Ask for confirmation unless `assume_yes` is set.
pub(crate) fn confirmed(what: &str, targets: &[String], assume_yes: bool) -> Result<bool> {
    println!("{} {}: {}", "!".yellow().bold(), what, targets.join(", "));
    if assume_yes {
        return Ok(true);
    }
    let answer = ui::confirm(ui::CONFIRM_QUESTION).context("Failed to read confirmation")?;
    if !answer {
        println!("Aborted.");
    }
    Ok(answer)
}

pub(crate) fn banner(title: &str) {
    println!("\n{RULE}");
    println!("  {title}");
    println!("{RULE}\n");
}

pub(crate) fn done(message: &str) {
    println!("\n{RULE}");
    println!("  {} {}", "✓".green().bold(), message);
    println!("{RULE}\n");
}

pub(crate) fn step(message: impl std::fmt::Display) {
    println!("   {} {}", "✓".green(), message);
}
