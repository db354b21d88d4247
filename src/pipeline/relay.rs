//! One polling cycle across every enabled source.
//!
//! Sources run one at a time and records one at a time. An error inside a
//! source stops only that source; whatever it already delivered stays
//! persisted. A failed send or edit writes nothing, so the record comes back
//! next cycle.

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Config, Record, SeenAt, SourceConfig, parse_timestamp};
use crate::notify::{Messenger, OutboundMessage, deliver, redeliver};
use crate::pipeline::correlate::{chronological, collapse_last_wins};
use crate::pipeline::pace::Pacer;
use crate::pipeline::reconcile::{Decision, Reconciler};
use crate::services::{Source, SourceRegistry};
use crate::storage::RecordStore;

/// Outcome of one source's turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    /// Records returned by the fetch
    pub fetched: usize,
    /// Records left after same-event collapsing
    pub considered: usize,
    pub sent: usize,
    pub edited: usize,
    /// Already delivered
    pub skipped: usize,
    /// Send or edit attempts that failed; retried next cycle
    pub failed: usize,
    /// Error that aborted the source, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }
}

/// Outcome of a whole cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn sent(&self) -> usize {
        self.sources.iter().map(|s| s.sent).sum()
    }

    pub fn edited(&self) -> usize {
        self.sources.iter().map(|s| s.edited).sum()
    }

    pub fn failed(&self) -> usize {
        self.sources.iter().map(|s| s.failed).sum()
    }

    /// Names of sources whose turn was aborted by an error.
    pub fn failed_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|s| s.error.is_some())
            .map(|s| s.source.as_str())
            .collect()
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == name)
    }
}

/// Timestamp stored for a delivered record: its own date when readable.
fn seen_at(record: &Record) -> SeenAt {
    record
        .create_date
        .as_deref()
        .filter(|date| parse_timestamp(date).is_some())
        .map(SeenAt::from)
        .unwrap_or_else(SeenAt::now)
}

/// Drives polling cycles over explicit collaborators.
pub struct Relay<'a> {
    config: &'a Config,
    registry: &'a SourceRegistry,
    store: &'a dyn RecordStore,
    messenger: &'a dyn Messenger,
}

impl<'a> Relay<'a> {
    pub fn new(
        config: &'a Config,
        registry: &'a SourceRegistry,
        store: &'a dyn RecordStore,
        messenger: &'a dyn Messenger,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            messenger,
        }
    }

    /// Process every enabled source once. Never fails; errors are reported
    /// per source.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut dispatch_pacer = Pacer::new(self.config.relay.dispatch_interval());
        let mut report = CycleReport::default();

        for source_config in self.config.enabled_sources() {
            let mut source_report = SourceReport::new(&source_config.name);
            log::info!("Processing source: {}", source_config.name);

            match self
                .run_source(source_config, &mut dispatch_pacer, &mut source_report)
                .await
            {
                Ok(()) => log::info!(
                    "{}: {} fetched, {} sent, {} edited, {} skipped, {} failed",
                    source_config.name,
                    source_report.fetched,
                    source_report.sent,
                    source_report.edited,
                    source_report.skipped,
                    source_report.failed
                ),
                Err(e) => {
                    log::error!("Error processing source {}: {}", source_config.name, e);
                    source_report.error = Some(e.to_string());
                }
            }
            report.sources.push(source_report);
        }

        log::info!(
            "Cycle complete: {} sent, {} edited, {} failed, {} sources aborted",
            report.sent(),
            report.edited(),
            report.failed(),
            report.failed_sources().len()
        );
        report
    }

    async fn run_source(
        &self,
        config: &SourceConfig,
        dispatch_pacer: &mut Pacer,
        report: &mut SourceReport,
    ) -> Result<()> {
        let source = self
            .registry
            .get(&config.name)
            .ok_or_else(|| AppError::UnknownSource(config.name.clone()))?;

        let records = source.fetch().await?;
        report.fetched = records.len();

        let mut records = chronological(records, config.scrape_order);
        if let Some(separator) = config.correlated_editing() {
            records = collapse_last_wins(records, separator);
        }
        report.considered = records.len();

        let mut reconciler = Reconciler::load(self.store, config).await?;
        let mut detail_pacer = Pacer::new(self.config.relay.detail_interval());

        for mut record in records {
            let decision = reconciler.classify(&record.id);
            log::debug!("{} {}: {:?}", config.name, record.id, decision);

            match decision {
                Decision::KnownExact => report.skipped += 1,
                Decision::Unseen | Decision::KnownByPrefixNoHandle => {
                    self.enrich(source, &mut record, &mut detail_pacer).await;
                    let message = self.outbound(source, &record, config, true);

                    dispatch_pacer.wait().await;
                    match deliver(self.messenger, &message).await {
                        Ok(handle) => {
                            reconciler.record_send(&record.id, seen_at(&record), handle).await?;
                            report.sent += 1;
                        }
                        Err(e) => {
                            log::warn!("Send failed for {} {}: {}", config.name, record.id, e);
                            report.failed += 1;
                        }
                    }
                }
                Decision::EditByPrefix(handle) => {
                    let message = self.outbound(source, &record, config, false);

                    dispatch_pacer.wait().await;
                    match redeliver(self.messenger, handle, &message).await {
                        Ok(()) => {
                            reconciler.record_edit(&record.id, seen_at(&record), handle).await?;
                            report.edited += 1;
                        }
                        Err(e) => {
                            log::warn!(
                                "Edit of message {} failed for {} {}: {}",
                                handle,
                                config.name,
                                record.id,
                                e
                            );
                            report.failed += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Merge the source's detail page into a record about to be sent.
    ///
    /// A failed detail fetch is logged and the record goes out as scraped.
    async fn enrich(&self, source: &dyn Source, record: &mut Record, pacer: &mut Pacer) {
        let (Some(details), Some(key)) = (source.details(), record.detail_key.clone()) else {
            return;
        };

        pacer.wait().await;
        match details.fetch_detail(&key).await {
            Ok(detail) => record.apply_detail(detail, self.config.relay.max_content_chars),
            Err(e) => log::warn!("Detail fetch failed for {} {}: {}", source.name(), key, e),
        }
    }

    fn outbound(
        &self,
        source: &dyn Source,
        record: &Record,
        config: &SourceConfig,
        with_media: bool,
    ) -> OutboundMessage {
        let text = source.build_message(record, config);
        let message = OutboundMessage::new(text, config.message_thread_id);
        if with_media {
            message.with_media(record.media().into_iter().map(String::from).collect())
        } else {
            message
        }
    }
}

/// Run one cycle with the given collaborators.
pub async fn run_cycle(
    config: &Config,
    registry: &SourceRegistry,
    store: &dyn RecordStore,
    messenger: &dyn Messenger,
) -> CycleReport {
    Relay::new(config, registry, store, messenger).run_cycle().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_at_prefers_record_date() {
        let record = Record::new("1", "t").with_create_date("2026-02-01 08:00:00");
        assert_eq!(seen_at(&record), SeenAt::from("2026-02-01 08:00:00"));

        let undated = Record::new("2", "t").with_create_date("下午三點");
        assert!(matches!(seen_at(&undated), SeenAt::Text(ref t) if t.ends_with('Z')));
    }

    #[test]
    fn test_cycle_report_totals() {
        let report = CycleReport {
            sources: vec![
                SourceReport {
                    sent: 2,
                    edited: 1,
                    ..SourceReport::new("a")
                },
                SourceReport {
                    failed: 1,
                    error: Some("boom".into()),
                    ..SourceReport::new("b")
                },
            ],
        };
        assert_eq!(report.sent(), 2);
        assert_eq!(report.edited(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failed_sources(), vec!["b"]);
        assert!(report.source("a").is_some());
    }
}
