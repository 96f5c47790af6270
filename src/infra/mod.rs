pub mod report_sink_adapter;

pub use report_sink_adapter::JsonFileReportSink;
