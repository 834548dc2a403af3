use thiserror::Error;

/// Failure of the menu retrieval pipeline. Missing fragments for single meals
/// never show up here; the parser skips those meals instead.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("Speiseplan-Request fehlgeschlagen: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Speiseplan-Server antwortete mit Status {0}")]
    BadStatus(reqwest::StatusCode),
    #[error("kein Speiseplan innerhalb von {0} Tagen gefunden")]
    DaysExhausted(u32),
}

#[derive(Debug, Error, Clone)]
pub enum TimeParseError {
    #[error("Keine Zeit übergeben")]
    NoTimePassed,
    #[error("Zeit konnte nicht gelesen werden")]
    InvalidTimePassed,
}
