//! Run report generation (text / JSON)

use anyhow::Result;
use callback_bridge::{BridgeStatus, DeliveryStats, RegistryStatus, SlotKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// One payload handed to the bridge during the run
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryRecord {
    pub slot: SlotKind,
    pub bytes: usize,
    pub status: BridgeStatus,
}

/// Everything the harness reports at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub bridge_version: String,
    pub library: Option<String>,
    pub registry: RegistryStatus,
    pub stats: DeliveryStats,
    pub deliveries: Vec<DeliveryRecord>,
}

impl Report {
    /// Number of deliveries that did not reach a callback
    pub fn failures(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| !matches!(d.status, BridgeStatus::Ok | BridgeStatus::Dropped))
            .count()
    }
}

/// Render the report as pretty-printed JSON
pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════")?;
        writeln!(f, "  Callback Bridge Report")?;
        writeln!(f, "═══════════════════════════════════════════════")?;
        writeln!(f, "Generated: {}", self.generated_at.to_rfc3339())?;
        writeln!(f, "Bridge:    v{}", self.bridge_version)?;
        writeln!(
            f,
            "Library:   {}",
            self.library.as_deref().unwrap_or("built-in handlers")
        )?;

        writeln!(f, "\nRegistry:")?;
        writeln!(
            f,
            "  result callback:      {}",
            self.registry.result_callback
        )?;
        writeln!(
            f,
            "  file-result callback: {}",
            self.registry.file_result_callback
        )?;

        if !self.deliveries.is_empty() {
            writeln!(f, "\nDeliveries:")?;
            for (i, d) in self.deliveries.iter().enumerate() {
                writeln!(
                    f,
                    "  #{:<3} {:<12} {:>8} bytes  {:?}",
                    i + 1,
                    d.slot.to_string(),
                    d.bytes,
                    d.status
                )?;
            }
        }

        writeln!(f, "\nStats:")?;
        writeln!(f, "  delivered: {}", self.stats.delivered)?;
        writeln!(f, "  dropped:   {}", self.stats.dropped)?;
        writeln!(f, "  failed:    {}", self.stats.failed)
    }
}
