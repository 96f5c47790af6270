/// Shared constants used across ingestion, querying and quality analysis

// Workbook extensions accepted by the ingestion pipeline (compared case-insensitively)
pub const XLSX_EXTENSION: &str = "xlsx";
pub const XLS_EXTENSION: &str = "xls";

/// Default number of rows shown per explorer page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Default read size for chunked transfers
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default stall timeout for a transfer, in seconds
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 30;

/// Default quality thresholds (percent scores)
pub const DEFAULT_SUCCESS_THRESHOLD: f64 = 97.0;
pub const DEFAULT_WARNING_THRESHOLD: f64 = 90.0;

/// Default acceptable range for expected commission / outstanding balance
pub const DEFAULT_MIN_COMMISSION_RATE: f64 = 0.0;
pub const DEFAULT_MAX_COMMISSION_RATE: f64 = 0.15;

/// Upper bound on detail rows kept in a quality report
pub const DEFAULT_MAX_ISSUE_DETAILS: usize = 500;

// Canonical column names used for drill-down and header mapping
pub const COL_ID: &str = "id";
pub const COL_REGISTERED_AT: &str = "data_cadastro";
pub const COL_BANK: &str = "banco";
pub const COL_CONSULTANT: &str = "consultor";
pub const COL_STATUS: &str = "status";
pub const COL_OUTSTANDING_BALANCE: &str = "saldo_devedor";
pub const COL_COMMISSION_EXPECTED: &str = "comissao_prevista";
pub const COL_COMMISSION_RECEIVED: &str = "comissao_recebida";
pub const COL_PAID_AT: &str = "data_pago";

/// Local (pt-BR) date format expected in spreadsheets
pub const LOCAL_DATE_FORMAT: &str = "%d/%m/%Y";
/// ISO date format, accepted but flagged as non-local
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Whether a file name carries one of the accepted workbook extensions
pub fn is_supported_workbook(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.eq_ignore_ascii_case(XLSX_EXTENSION) || ext.eq_ignore_ascii_case(XLS_EXTENSION)
        })
        .unwrap_or(false)
}
