use crate::analytics::{filter_history, format_amount, format_bytes, monthly_growth};
use crate::api::{
  ApiClient, ApiError, BulkEnrichmentResponse, FundClient, MonthlyEvolutionResponse,
  OverviewResponse, Transport,
};
use crate::cache::RemoteCache;
use crate::commands::{Command, EnrichmentCommand, FilterArgs, ThemeAction};
use crate::config::Config;
use crate::query::{Query, QueryState};
use crate::settings::{SettingsStore, Theme};
use crate::workflow::{
  EnrichmentToggle, FilterController, FilterField, NotificationCenter, NotificationKind, Rejected,
  StagedFile, UploadController, UploadState,
};
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::{info, warn};

/// Main application state
pub struct App<T: Transport = ApiClient> {
  /// Application configuration
  config: Config,

  /// Cache-backed backend client
  client: FundClient<T>,

  uploads: UploadController,
  filters: FilterController,
  enrichment: EnrichmentToggle,

  /// Acknowledgments printed after each command
  notifications: NotificationCenter,

  settings: SettingsStore,
}

impl App<ApiClient> {
  pub fn new(config: Config) -> Result<Self> {
    let client = FundClient::new(ApiClient::new(&config)?, RemoteCache::new());
    let settings = SettingsStore::open_default()?;
    Ok(Self::with_client(config, client, settings))
  }
}

impl<T: Transport> App<T> {
  pub fn with_client(config: Config, client: FundClient<T>, settings: SettingsStore) -> Self {
    let enrichment = EnrichmentToggle::new(config.enrich_pending_limit);
    Self {
      config,
      client,
      uploads: UploadController::new(),
      filters: FilterController::new(),
      enrichment,
      notifications: NotificationCenter::new(),
      settings,
    }
  }

  /// Run one command, writing its output followed by any notifications.
  /// Notifications are written even when the command fails.
  pub async fn execute(&mut self, command: Command, out: &mut String) -> Result<()> {
    info!(?command, "running command");
    let result = self.dispatch(command, out).await;
    self.render_notifications(out);
    result
  }

  async fn dispatch(&mut self, command: Command, out: &mut String) -> Result<()> {
    match command {
      Command::Funds { page } => {
        let limit = page.limit.unwrap_or(self.config.page_size);
        self.funds(limit, page.offset, out).await
      }
      Command::Fund { id } => self.fund(id, out).await,
      Command::Delete { id } => self.delete(id).await,
      Command::Upload { files } => self.upload(files, out).await,
      Command::History { page, search } => {
        let limit = page.limit.unwrap_or(self.config.page_size);
        self
          .history(limit, page.offset, search.as_deref().unwrap_or(""), out)
          .await
      }
      Command::File { lot, analytics } => self.file(lot, analytics, out).await,
      Command::Overview {
        enriched,
        fund,
        filters,
      } => {
        self.apply_filters(&filters);
        self.overview(enriched, fund, out).await
      }
      Command::Filters {
        filters,
        apply,
        clear,
      } => self.edit_filters(&filters, apply, clear, out),
      Command::Indexers => self.indexers(out).await,
      Command::Evolution { year, filters } => {
        self.apply_filters(&filters);
        self.evolution(year, out).await
      }
      Command::Assets { indexador, page } => {
        let limit = page.limit.unwrap_or(self.config.page_size);
        self.assets(indexador, limit, page.offset, out).await
      }
      Command::Enrichment { command } => self.enrichment(command, out).await,
      Command::Theme { action } => self.theme(action, out),
    }
  }

  // ==========================================================================
  // Funds
  // ==========================================================================

  async fn funds(&mut self, limit: u32, offset: u32, out: &mut String) -> Result<()> {
    let list = self.client.fund_list(limit, offset).await?;
    writeln!(out, "{:>6}  {:<40} {:>8} {:>18}", "ID", "NAME", "ASSETS", "TOTAL")?;
    for fund in &list.fundos {
      writeln!(
        out,
        "{:>6}  {:<40} {:>8} {:>18}",
        fund.id,
        fund.name,
        fund.total_ativos,
        format_amount(fund.valor_total)
      )?;
    }
    writeln!(out, "{} of {} funds", list.fundos.len(), list.total)?;
    Ok(())
  }

  async fn fund(&mut self, id: u64, out: &mut String) -> Result<()> {
    let detail = self
      .client
      .fund_detail(Some(id))
      .await?
      .ok_or_else(|| eyre!("Fund {} not found", id))?;
    let fund = &detail.summary;
    writeln!(out, "Fund {}: {}", fund.id, fund.name)?;
    if !fund.description.is_empty() {
      writeln!(out, "  {}", fund.description)?;
    }
    writeln!(out, "  Assets:   {}", fund.total_ativos)?;
    writeln!(out, "  Indexers: {}", detail.total_indexadores)?;
    writeln!(out, "  Total:    {}", format_amount(fund.valor_total))?;
    if let Some(created) = &fund.created_at {
      writeln!(out, "  Created:  {}", created)?;
    }
    if let Some(updated) = &fund.updated_at {
      writeln!(out, "  Updated:  {}", updated)?;
    }
    writeln!(out, "  Files:    {}", detail.arquivos.len())?;
    Ok(())
  }

  async fn delete(&mut self, id: u64) -> Result<()> {
    match self.client.delete_fund(id).await {
      Ok(resp) if !resp.mensagem.is_empty() => {
        self.notifications.success(resp.mensagem);
      }
      Ok(_) => {
        self.notifications.success(format!("Fund {} deleted", id));
      }
      Err(e) => {
        warn!(fund_id = id, error = %e, "delete failed");
        self
          .notifications
          .error(format!("Could not delete fund {}: {}", id, e.user_message()));
      }
    }
    Ok(())
  }

  // ==========================================================================
  // Upload
  // ==========================================================================

  async fn upload(&mut self, paths: Vec<PathBuf>, out: &mut String) -> Result<()> {
    let mut staged = Vec::with_capacity(paths.len());
    for path in &paths {
      match StagedFile::from_path(path).await {
        Ok(file) => staged.push(file),
        Err(e) => {
          self.notifications.error(e.user_message());
        }
      }
    }

    if let Err(rejected) = self.uploads.stage(staged) {
      self.notifications.error(rejected.to_string());
      return Ok(());
    }
    let selection = self.uploads.selection();
    if selection.is_empty() {
      self.notifications.error(Rejected::NothingStaged.to_string());
      return Ok(());
    }
    writeln!(
      out,
      "{} file(s) staged ({})",
      selection.len(),
      format_bytes(selection.total_size())
    )?;

    match self.uploads.submit(&self.client, &mut self.notifications).await {
      Ok(UploadState::DuplicateWarning {
        existing_fund: Some(id),
        ..
      }) => {
        writeln!(out, "Already uploaded as fund {}", id)?;
      }
      Ok(_) => {}
      Err(rejected) => return Err(eyre!(rejected)),
    }
    if let Some(id) = self.uploads.created_fund() {
      writeln!(out, "Created fund {}", id)?;
    }
    // The outcome is reported; the controller goes back to idle.
    self.uploads.acknowledge()?;
    Ok(())
  }

  // ==========================================================================
  // History
  // ==========================================================================

  async fn history(&mut self, limit: u32, offset: u32, search: &str, out: &mut String) -> Result<()> {
    let history = self.client.file_history(limit, offset).await?;
    let files = filter_history(&history.files, search);
    writeln!(
      out,
      "{:>6}  {:<40} {:<20} {:>8} {:>18}  {}",
      "LOT", "FILE", "SENT", "ASSETS", "TOTAL", "STATUS"
    )?;
    for file in &files {
      writeln!(
        out,
        "{:>6}  {:<40} {:<20} {:>8} {:>18}  {}",
        file.lot_id,
        file.file_name,
        file.sent_at,
        file.quantidade_ativos,
        format_amount(file.valor_total),
        file.status
      )?;
    }
    writeln!(out, "{} of {} files", files.len(), history.total)?;
    Ok(())
  }

  async fn file(&mut self, lot: u64, analytics: bool, out: &mut String) -> Result<()> {
    if analytics {
      let stats = self
        .client
        .file_analytics(Some(lot))
        .await?
        .ok_or_else(|| eyre!("File {} not found", lot))?;
      writeln!(out, "File {}: {}", stats.lote_id, stats.file_name)?;
      writeln!(out, "  Assets:   {}", stats.total_ativos)?;
      writeln!(out, "  Indexers: {}", stats.total_indexadores)?;
      writeln!(out, "  Total:    {}", format_amount(stats.valor_total))?;
      return Ok(());
    }

    let details = self
      .client
      .file_details(Some(lot))
      .await?
      .ok_or_else(|| eyre!("File {} not found", lot))?;
    writeln!(out, "{}", serde_json::to_string_pretty(&details.lote)?)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&details.estatisticas)?)?;
    writeln!(out, "{} assets", details.ativos.len())?;
    Ok(())
  }

  // ==========================================================================
  // Analytics
  // ==========================================================================

  fn apply_filters(&mut self, args: &FilterArgs) {
    for (field, value) in args.edits() {
      self.filters.edit(field, value);
    }
    self.filters.apply();
  }

  fn edit_filters(
    &mut self,
    args: &FilterArgs,
    apply: bool,
    clear: bool,
    out: &mut String,
  ) -> Result<()> {
    if clear && self.filters.clear() {
      self.notifications.success("Filters cleared");
    }
    for (field, value) in args.edits() {
      self.filters.edit(field, value);
    }
    if apply && self.filters.apply() {
      self.notifications.success("Filters applied");
    }

    let pending = self.filters.pending_fields();
    writeln!(out, "{:<12} {:<14} {:<14}", "FIELD", "DRAFT", "APPLIED")?;
    for field in FilterField::ALL {
      let shown = |value: &str| match value.trim() {
        "" => "-".to_string(),
        v => v.to_string(),
      };
      writeln!(
        out,
        "{:<12} {:<14} {:<14}{}",
        field.label(),
        shown(field.value(self.filters.draft())),
        shown(field.value(self.filters.applied())),
        if pending.contains(&field) { " *" } else { "" }
      )?;
    }
    if self.filters.has_pending() {
      writeln!(out, "* not applied")?;
    }
    Ok(())
  }

  async fn overview(&mut self, enriched: bool, fund: Option<u64>, out: &mut String) -> Result<()> {
    if enriched && !self.enrichment.is_enriched() {
      if let Err(rejected) = self.enrichment.toggle(&self.client, &mut self.notifications).await {
        self.notifications.error(rejected.to_string());
      }
    }

    // Both panels load concurrently, as on the dashboard.
    let mut overview: Query<OverviewResponse> = self
      .client
      .query(Some(self.filters.overview(self.enrichment.is_enriched(), fund)));
    let mut evolution: Query<MonthlyEvolutionResponse> =
      self.client.query(Some(self.filters.monthly_evolution(None)));
    overview.fetch();
    evolution.fetch();

    overview.settle().await;
    if let Some(e) = overview.error() {
      return Err(eyre!(e.user_message()));
    }
    let data = overview.data().ok_or_else(|| eyre!("No data loaded"))?;
    writeln!(out, "Mode:     {}", self.enrichment.mode().as_str())?;
    writeln!(out, "Assets:   {}", data.total_ativos)?;
    writeln!(out, "Indexers: {}", data.total_indexadores)?;
    writeln!(out, "Total:    {}", format_amount(data.valor_total))?;
    for share in &data.indexadores {
      writeln!(
        out,
        "  {:<12} {:>8} {:>7.2}%",
        share.nome, share.quantidade, share.percentual
      )?;
    }
    if !data.top_ativos.is_empty() {
      writeln!(out, "Top assets:")?;
      for asset in &data.top_ativos {
        write!(
          out,
          "  {:<16} {:<10} {:>18}",
          asset.codigo,
          asset.indexador,
          format_amount(asset.valor)
        )?;
        if let Some(issuer) = asset.enrichment.get("emissor").and_then(|v| v.as_str()) {
          write!(out, "  {}", issuer)?;
        }
        writeln!(out)?;
      }
    }

    // The evolution panel failing does not hide the overview.
    match evolution.settle().await {
      QueryState::Success(evolution) => self.render_evolution(evolution, out)?,
      QueryState::Error(e) => {
        self
          .notifications
          .error(format!("Monthly evolution unavailable: {}", e.user_message()));
      }
      _ => {}
    }
    Ok(())
  }

  async fn evolution(&mut self, year: Option<i32>, out: &mut String) -> Result<()> {
    let evolution = self
      .client
      .monthly_evolution(year, self.filters.applied())
      .await?;
    self.render_evolution(&evolution, out)
  }

  fn render_evolution(&self, evolution: &MonthlyEvolutionResponse, out: &mut String) -> Result<()> {
    writeln!(out, "{:>5} {:>8} {:>18} {:>9}", "MONTH", "ASSETS", "TOTAL", "GROWTH")?;
    for (item, (_, growth)) in evolution.evolucao.iter().zip(monthly_growth(&evolution.evolucao)) {
      let growth = growth
        .map(|g| format!("{:+.1}%", g))
        .unwrap_or_else(|| "-".to_string());
      writeln!(
        out,
        "{:>5} {:>8} {:>18} {:>9}",
        item.mes,
        item.quantidade,
        format_amount(item.valor_total),
        growth
      )?;
    }
    Ok(())
  }

  async fn indexers(&mut self, out: &mut String) -> Result<()> {
    let indexers = self.client.indexers().await?;
    writeln!(out, "{:<10} {:<8} {:>8} {:>8} {:>18}", "CODE", "SIGLA", "ASSETS", "SHARE", "TOTAL")?;
    for ix in &indexers.indexadores {
      writeln!(
        out,
        "{:<10} {:<8} {:>8} {:>7.2}% {:>18}",
        ix.codigo,
        ix.sigla,
        ix.quantidade,
        ix.percentual,
        format_amount(ix.valor_total)
      )?;
    }
    Ok(())
  }

  async fn assets(
    &mut self,
    indexador: Option<String>,
    limit: u32,
    offset: u32,
    out: &mut String,
  ) -> Result<()> {
    let assets = self.client.assets(indexador, limit, offset).await?;
    writeln!(out, "{:<16} {:<10} {:>18} {:<12}", "CODE", "INDEXER", "PRINCIPAL", "MATURITY")?;
    for asset in &assets.ativos {
      writeln!(
        out,
        "{:<16} {:<10} {:>18} {:<12}",
        asset.codigo,
        asset.indexador,
        format_amount(asset.valor_principal),
        asset.data_vencimento.as_deref().unwrap_or("-")
      )?;
    }
    writeln!(out, "{} of {} assets", assets.ativos.len(), assets.total)?;
    Ok(())
  }

  // ==========================================================================
  // Enrichment
  // ==========================================================================

  async fn enrichment(&mut self, command: EnrichmentCommand, out: &mut String) -> Result<()> {
    match command {
      EnrichmentCommand::Status => {
        let status = self.client.enrichment_status().await?;
        writeln!(out, "Assets:     {}", status.total_ativos)?;
        writeln!(
          out,
          "Enriched:   {} ({:.1}%)",
          status.enriquecidos, status.percentual_enriquecidos
        )?;
        writeln!(out, "With error: {}", status.com_erro)?;
        writeln!(out, "Pending:    {}", status.sem_enriquecimento)?;
      }
      EnrichmentCommand::Asset { id } => {
        let asset = self
          .client
          .enriched_asset(Some(id))
          .await?
          .ok_or_else(|| eyre!("Asset {} not found", id))?;
        writeln!(out, "Asset {}", asset.ativo_id)?;
        writeln!(out, "{}", serde_json::to_string_pretty(&asset.dados)?)?;
      }
      EnrichmentCommand::Enrich { id } => match self.client.enrich_asset(id).await {
        Ok(result) if result.sucesso => {
          self
            .notifications
            .success(format!("Asset {} enriched", result.ativo_id));
        }
        Ok(result) => {
          let reason = result.erro.or(result.mensagem).unwrap_or_default();
          self
            .notifications
            .error(format!("Asset {} not enriched: {}", result.ativo_id, reason));
        }
        Err(e) => {
          self
            .notifications
            .error(format!("Enrichment failed: {}", e.user_message()));
        }
      },
      EnrichmentCommand::Bulk { ids, background } => {
        let result = self.client.enrich_bulk(ids, background).await;
        self.bulk_outcome(result);
      }
      EnrichmentCommand::Pending { limit, background } => {
        let limit = limit.unwrap_or(self.config.enrich_pending_limit);
        let result = self.client.enrich_pending(limit, background).await;
        self.bulk_outcome(result);
      }
    }
    Ok(())
  }

  fn bulk_outcome(&mut self, result: Result<BulkEnrichmentResponse, ApiError>) {
    match result {
      Ok(resp) if resp.background => {
        let message = resp
          .message
          .unwrap_or_else(|| "Enrichment started in background".to_string());
        self.notifications.success(message);
      }
      Ok(resp) => {
        self.notifications.success(format!(
          "Enriched {} of {} assets ({} failed)",
          resp.enriquecidos, resp.total, resp.falhas
        ));
      }
      Err(e) => {
        self
          .notifications
          .error(format!("Enrichment failed: {}", e.user_message()));
      }
    }
  }

  // ==========================================================================
  // Settings
  // ==========================================================================

  fn theme(&mut self, action: ThemeAction, out: &mut String) -> Result<()> {
    let theme = match action {
      ThemeAction::Show => self.settings.theme(),
      ThemeAction::Toggle => self.settings.toggle_theme()?,
      ThemeAction::Light => self.settings.set_theme(Theme::Light)?,
      ThemeAction::Dark => self.settings.set_theme(Theme::Dark)?,
    };
    writeln!(out, "Theme: {}", theme.as_str())?;
    Ok(())
  }

  fn render_notifications(&mut self, out: &mut String) {
    for note in self.notifications.take_active(Utc::now()) {
      let marker = match note.kind {
        NotificationKind::Success => "ok",
        NotificationKind::Warning => "warning",
        NotificationKind::Error => "error",
      };
      // Writing to a String cannot fail.
      let _ = writeln!(out, "[{}] {}", marker, note.message);
    }
  }
}
