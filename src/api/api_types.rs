//! Serde-deserializable types matching the backend's JSON responses.
//!
//! Field names follow the backend contract via `rename`; everything optional
//! on the wire is defaulted so that older backends still decode.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::ApiError;

/// Decode a cached JSON value into a typed payload.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(ApiError::from)
}

/// Decimal amounts are serialized either as numbers or as strings.
fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Number(f64),
    Text(String),
    Null,
  }

  match Raw::deserialize(deserializer)? {
    Raw::Number(n) => Ok(n),
    Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    Raw::Null => Ok(0.0),
  }
}

// ============================================================================
// Funds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSummary {
  #[serde(rename = "id_fundo_investimento")]
  pub id: u64,
  #[serde(rename = "nm_fundo_investimento", default)]
  pub name: String,
  #[serde(rename = "ds_fundo_investimento", default)]
  pub description: String,
  #[serde(default)]
  pub total_ativos: u64,
  #[serde(default, deserialize_with = "amount")]
  pub valor_total: f64,
  #[serde(rename = "data_criacao", default)]
  pub created_at: Option<String>,
  #[serde(rename = "ultima_atualizacao", default)]
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundListResponse {
  #[serde(default)]
  pub fundos: Vec<FundSummary>,
  #[serde(default)]
  pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundDetail {
  #[serde(flatten)]
  pub summary: FundSummary,
  #[serde(default)]
  pub total_indexadores: u64,
  #[serde(default)]
  pub arquivos: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadFundResponse {
  #[serde(default)]
  pub sucesso: bool,
  #[serde(default)]
  pub mensagem: String,
  #[serde(default)]
  pub fundo_id: Option<u64>,
  #[serde(default)]
  pub arquivo_duplicado: bool,
  #[serde(default)]
  pub fundo_existente: Option<FundSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteFundResponse {
  #[serde(default)]
  pub mensagem: String,
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct FileHistoryItem {
  #[serde(rename = "id_lote")]
  pub lot_id: u64,
  #[serde(rename = "nome_arquivo", default)]
  pub file_name: String,
  #[serde(rename = "data_envio", default)]
  pub sent_at: String,
  #[serde(default)]
  pub quantidade_ativos: u64,
  #[serde(default, deserialize_with = "amount")]
  pub valor_total: f64,
  #[serde(default)]
  pub indexadores: Vec<String>,
  #[serde(default)]
  pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileHistoryResponse {
  #[serde(default)]
  pub files: Vec<FileHistoryItem>,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub limit: u32,
  #[serde(default)]
  pub offset: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileDetailsResponse {
  #[serde(default)]
  pub lote: Value,
  #[serde(default)]
  pub estatisticas: Value,
  #[serde(default)]
  pub ativos: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileAnalyticsResponse {
  pub lote_id: u64,
  #[serde(rename = "nome_arquivo", default)]
  pub file_name: String,
  #[serde(default)]
  pub total_ativos: u64,
  #[serde(default)]
  pub total_indexadores: u64,
  #[serde(default, deserialize_with = "amount")]
  pub valor_total: f64,
  #[serde(default)]
  pub indexadores: Vec<Value>,
  #[serde(default)]
  pub top_ativos: Vec<Value>,
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerShare {
  pub nome: String,
  #[serde(default)]
  pub quantidade: u64,
  #[serde(default)]
  pub percentual: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopAsset {
  pub codigo: String,
  #[serde(default, deserialize_with = "amount")]
  pub valor: f64,
  #[serde(default)]
  pub indexador: String,
  /// Registry fields, present only when enrichment mode is requested
  #[serde(flatten)]
  pub enrichment: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverviewResponse {
  #[serde(default)]
  pub total_ativos: u64,
  #[serde(default)]
  pub total_indexadores: u64,
  #[serde(default, deserialize_with = "amount")]
  pub valor_total: f64,
  #[serde(default)]
  pub indexadores: Vec<IndexerShare>,
  #[serde(default)]
  pub top_ativos: Vec<TopAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerDetail {
  #[serde(default)]
  pub codigo: String,
  #[serde(default)]
  pub sigla: String,
  #[serde(default)]
  pub quantidade: u64,
  #[serde(default)]
  pub percentual: f64,
  #[serde(default, deserialize_with = "amount")]
  pub valor_total: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexersResponse {
  #[serde(default)]
  pub indexadores: Vec<IndexerDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetDetail {
  pub codigo: String,
  #[serde(default, deserialize_with = "amount")]
  pub valor_principal: f64,
  #[serde(default)]
  pub indexador: String,
  #[serde(default)]
  pub data_vencimento: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsResponse {
  #[serde(default)]
  pub ativos: Vec<AssetDetail>,
  #[serde(default)]
  pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonthlyEvolutionItem {
  pub mes: u32,
  #[serde(default)]
  pub quantidade: u64,
  #[serde(default, deserialize_with = "amount")]
  pub valor_total: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyEvolutionResponse {
  #[serde(default)]
  pub evolucao: Vec<MonthlyEvolutionItem>,
}

// ============================================================================
// Enrichment
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentStatus {
  #[serde(default)]
  pub total_ativos: u64,
  #[serde(default)]
  pub enriquecidos: u64,
  #[serde(default)]
  pub com_erro: u64,
  #[serde(default)]
  pub sem_enriquecimento: u64,
  #[serde(default)]
  pub percentual_enriquecidos: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentResult {
  #[serde(default)]
  pub sucesso: bool,
  pub ativo_id: u64,
  #[serde(default)]
  pub dados: Option<Value>,
  #[serde(default)]
  pub erro: Option<String>,
  #[serde(default)]
  pub mensagem: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkEnrichmentResponse {
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub enriquecidos: u64,
  #[serde(default)]
  pub falhas: u64,
  #[serde(default)]
  pub background: bool,
  #[serde(default)]
  pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichedAssetResponse {
  pub ativo_id: u64,
  #[serde(default)]
  pub dados: Value,
}
