use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Duplicate lot_id: {0}")]
    DuplicateLot(String),
}

pub type Result<T> = std::result::Result<T, PortfolioError>;
