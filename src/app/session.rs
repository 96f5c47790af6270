use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;

use crate::app::ingest_use_case::IngestUseCase;
use crate::app::ports::{ReportReceipt, ReportSink};
use crate::app::report_use_case::{ReportRequest, ReportUseCase};
use crate::config::NavigatorConfig;
use crate::domain::{ContractStatus, Record};
use crate::error::Result;
use crate::pipeline::ingestion::{CandidateFile, IngestionPipeline, IngestionResult, ProgressSender};
use crate::pipeline::processing::quality::{QualityAnalyzer, QualityReport};
use crate::pipeline::processing::query::{self, BankFilter, DateRange, FilterSpec, StatusFilter};
use crate::pipeline::processing::summary::{summarize, PortfolioSummary};
use crate::pipeline::storage::{RecordSet, RecordStore};

/// Screens of the navigator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveView {
    #[default]
    Dashboard,
    Explorer,
    Quality,
    Insights,
    Reports,
    Upload,
}

/// Presentation state owned by the caller and passed by reference to queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub active_view: ActiveView,
    pub sidebar_open: bool,
    pub filters: FilterSpec,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            active_view: ActiveView::Dashboard,
            sidebar_open: true,
            filters: FilterSpec::default(),
        }
    }
}

impl ViewState {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            filters: FilterSpec::with_page_size(page_size),
            ..Self::default()
        }
    }

    pub fn show(&mut self, view: ActiveView) {
        self.active_view = view;
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
    }

    /// Like every predicate setter below, returns to the first page
    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filters.search = search.into();
        self.filters.page = 1;
    }

    pub fn set_status(&mut self, status: Option<ContractStatus>) {
        self.filters.status = status.map_or(StatusFilter::All, StatusFilter::Only);
        self.filters.page = 1;
    }

    pub fn set_bank(&mut self, bank: Option<String>) {
        self.filters.bank = bank.map_or(BankFilter::All, BankFilter::Only);
        self.filters.page = 1;
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.filters.date_range = range;
        self.filters.page = 1;
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.filters.page = page.max(1);
    }

    /// Clear every predicate, keeping the page size
    pub fn reset_filters(&mut self) {
        self.filters = FilterSpec::with_page_size(self.filters.page_size);
    }
}

/// Query page with owned records, detached from the store snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorerPage {
    pub records: Vec<Record>,
    pub total_matching: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Ties the store, ingestion, analysis and reporting together for one user
pub struct NavigatorSession {
    config: NavigatorConfig,
    store: Arc<RecordStore>,
    ingest: IngestUseCase,
    analyzer: Arc<QualityAnalyzer>,
}

impl NavigatorSession {
    pub fn new(config: NavigatorConfig) -> Self {
        let store = Arc::new(RecordStore::new());
        let pipeline = IngestionPipeline::new(&config.ingestion);
        let ingest = IngestUseCase::new(pipeline, Arc::clone(&store));
        let analyzer = Arc::new(QualityAnalyzer::new(config.quality.clone()));
        Self {
            config,
            store,
            ingest,
            analyzer,
        }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// View state sized by the configured default page size
    pub fn initial_view(&self) -> ViewState {
        ViewState::with_page_size(self.config.explorer.default_page_size)
    }

    pub fn records(&self) -> Arc<RecordSet> {
        self.store.snapshot()
    }

    pub async fn ingest<R>(
        &self,
        candidate: CandidateFile<R>,
        progress: Option<&ProgressSender>,
    ) -> Result<IngestionResult>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.ingest.ingest(candidate, progress).await
    }

    pub async fn ingest_path(
        &self,
        path: impl AsRef<Path>,
        progress: Option<&ProgressSender>,
    ) -> Result<IngestionResult> {
        self.ingest.ingest_path(path, progress).await
    }

    pub fn cancel_ingestion(&self) {
        self.ingest.cancel_current();
    }

    pub fn explore(&self, view: &ViewState) -> ExplorerPage {
        let set = self.store.snapshot();
        let page = query::query(&set.records, &view.filters);
        ExplorerPage {
            records: page.records.into_iter().cloned().collect(),
            total_matching: page.total_matching,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
        }
    }

    /// Choices for the bank filter
    pub fn banks(&self) -> Vec<String> {
        query::distinct_banks(&self.store.snapshot().records)
    }

    pub fn consultants(&self) -> Vec<String> {
        query::distinct_consultants(&self.store.snapshot().records)
    }

    pub fn quality(&self) -> QualityReport {
        self.analyzer.analyze(&self.store.snapshot().records)
    }

    pub fn summary(&self) -> PortfolioSummary {
        summarize(&self.store.snapshot().records)
    }

    pub async fn report(&self, request: &ReportRequest, sink: Arc<dyn ReportSink>) -> anyhow::Result<ReportReceipt> {
        let use_case = ReportUseCase::new(Arc::clone(&self.analyzer), sink);
        use_case.generate(&self.store.snapshot(), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const DATA: &str = "id;data_cadastro;banco;consultor;status\n\
        CORB-000001;15/08/2024;Banco do Brasil;João Silva;Pago\n\
        CORB-000002;16/08/2024;Caixa Econômica;Maria Santos;Averbado\n\
        CORB-000003;17/08/2024;Banco do Brasil;Pedro Costa;Cadastrado\n";

    #[test]
    fn test_filter_changes_reset_page() {
        let mut view = ViewState::with_page_size(5);
        view.go_to_page(3);
        view.set_search("maria");
        assert_eq!(view.filters.page, 1);

        view.go_to_page(0);
        assert_eq!(view.filters.page, 1);

        view.set_status(Some(ContractStatus::Paid));
        view.reset_filters();
        assert_eq!(view.filters, FilterSpec::with_page_size(5));
    }

    #[test]
    fn test_view_state_serializes() {
        let mut view = ViewState::default();
        view.show(ActiveView::Quality);
        view.toggle_sidebar();
        view.set_bank(Some("Itaú".to_string()));
        let json = serde_json::to_string(&view).unwrap();
        let back: ViewState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
        assert!(!back.sidebar_open);
    }

    #[tokio::test]
    async fn test_session_end_to_end() {
        let session = NavigatorSession::new(NavigatorConfig::default());
        assert!(session.records().is_empty());

        let candidate = CandidateFile::new("data.xlsx", DATA.len() as u64, Utc::now(), DATA.as_bytes());
        let result = session.ingest(candidate, None).await.unwrap();
        assert_eq!(result.row_count, 3);

        let mut view = session.initial_view();
        view.set_bank(Some("banco do brasil".to_string()));
        let page = session.explore(&view);
        assert_eq!(page.total_matching, 2);
        assert_eq!(page.records[0].id, "CORB-000001");

        assert_eq!(session.banks(), vec!["Banco do Brasil", "Caixa Econômica"]);
        assert_eq!(session.summary().total_records, 3);
        assert_eq!(session.quality().total_records, 3);
    }
}
