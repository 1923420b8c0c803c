use std::path::PathBuf;

/// Errors raised at the edges of the crate: reading record files, reading
/// configuration and writing exports.
///
/// The field resolver and the filter pipeline never produce these; missing or
/// malformed values there degrade to "not found" or "sorted last".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}: file is empty", .0.display())]
    EmptyFile(PathBuf),

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("{}: file has no extension", .0.display())]
    MissingExtension(PathBuf),

    #[error("sheet `{0}` not found in workbook")]
    SheetNotFound(String),

    #[error("Excel support requires the `excel` feature")]
    ExcelDisabled,

    #[cfg(feature = "excel")]
    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, Error>;
