//! Client-side derivations over already-aggregated backend data.

use crate::api::{FileHistoryItem, MonthlyEvolutionItem};

/// Month-over-month change of `valor_total`, in percent.
///
/// One entry per input month. The first month and months following a zero
/// total have no growth figure.
pub fn monthly_growth(evolution: &[MonthlyEvolutionItem]) -> Vec<(u32, Option<f64>)> {
  let mut previous: Option<f64> = None;
  evolution
    .iter()
    .map(|item| {
      let growth = previous
        .filter(|p| *p != 0.0)
        .map(|p| (item.valor_total - p) / p * 100.0);
      previous = Some(item.valor_total);
      (item.mes, growth)
    })
    .collect()
}

/// History entries whose file name contains `term`, ignoring case.
pub fn filter_history<'a>(files: &'a [FileHistoryItem], term: &str) -> Vec<&'a FileHistoryItem> {
  let term = term.trim().to_lowercase();
  files
    .iter()
    .filter(|f| term.is_empty() || f.file_name.to_lowercase().contains(&term))
    .collect()
}

pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
  if bytes == 0 {
    return "0 B".to_string();
  }
  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} B", bytes)
  } else {
    format!("{:.1} {}", value, UNITS[unit])
  }
}

/// Format a monetary amount with two decimals and thousands separators.
pub fn format_amount(value: f64) -> String {
  let formatted = format!("{:.2}", value.abs());
  let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
  let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
  for (i, c) in int_part.chars().enumerate() {
    if i > 0 && (int_part.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  let sign = if value < 0.0 { "-" } else { "" };
  format!("{}{}.{}", sign, grouped, frac_part)
}
