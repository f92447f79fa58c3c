//! Available commands and their arguments.

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::workflow::FilterField;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// List registered funds
  Funds {
    #[command(flatten)]
    page: PageArgs,
  },
  /// Show one fund
  Fund { id: u64 },
  /// Delete a fund and its assets
  Delete { id: u64 },
  /// Upload an XML portfolio file as a new fund
  Upload {
    #[arg(required = true)]
    files: Vec<PathBuf>,
  },
  /// List processed files
  History {
    #[command(flatten)]
    page: PageArgs,
    /// Only files whose name contains this text
    #[arg(short, long)]
    search: Option<String>,
  },
  /// Show one processed file
  File {
    lot: u64,
    /// Show per-file analytics instead of the raw details
    #[arg(long)]
    analytics: bool,
  },
  /// Portfolio overview
  Overview {
    /// Switch enrichment mode on before loading
    #[arg(long)]
    enriched: bool,
    /// Restrict to one fund
    #[arg(long)]
    fund: Option<u64>,
    #[command(flatten)]
    filters: FilterArgs,
  },
  /// Edit analytics filters and show draft against applied values
  Filters {
    #[command(flatten)]
    filters: FilterArgs,
    /// Commit the edited filters
    #[arg(long)]
    apply: bool,
    /// Reset all filters before editing
    #[arg(long)]
    clear: bool,
  },
  /// Indexer breakdown
  Indexers,
  /// Monthly evolution with month-over-month growth
  Evolution {
    #[arg(long)]
    year: Option<i32>,
    #[command(flatten)]
    filters: FilterArgs,
  },
  /// List assets
  Assets {
    #[arg(long)]
    indexador: Option<String>,
    #[command(flatten)]
    page: PageArgs,
  },
  /// Asset enrichment
  Enrichment {
    #[command(subcommand)]
    command: EnrichmentCommand,
  },
  /// Show or change the display theme
  Theme {
    #[arg(value_enum, default_value_t = ThemeAction::Show)]
    action: ThemeAction,
  },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentCommand {
  /// Enrichment coverage
  Status,
  /// Enriched data stored for one asset
  Asset { id: u64 },
  /// Enrich one asset
  Enrich { id: u64 },
  /// Enrich several assets
  Bulk {
    #[arg(required = true)]
    ids: Vec<u64>,
    #[arg(long)]
    background: bool,
  },
  /// Enrich assets that have no registry data yet
  Pending {
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    background: bool,
  },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
  Show,
  Toggle,
  Light,
  Dark,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct PageArgs {
  /// Page size (defaults to the configured page_size)
  #[arg(long)]
  pub limit: Option<u32>,
  #[arg(long, default_value_t = 0)]
  pub offset: u32,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterArgs {
  /// Earliest date, YYYY-MM-DD
  #[arg(long)]
  pub date_from: Option<String>,
  /// Latest date, YYYY-MM-DD
  #[arg(long)]
  pub date_to: Option<String>,
  /// Indexer code, e.g. DI1
  #[arg(long)]
  pub indexador: Option<String>,
  /// Asset code
  #[arg(long)]
  pub asset: Option<String>,
}

impl FilterArgs {
  /// Field edits given on the command line.
  pub fn edits(&self) -> Vec<(FilterField, &str)> {
    [
      (FilterField::DateFrom, &self.date_from),
      (FilterField::DateTo, &self.date_to),
      (FilterField::Indexador, &self.indexador),
      (FilterField::Asset, &self.asset),
    ]
    .into_iter()
    .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
    .collect()
  }
}
