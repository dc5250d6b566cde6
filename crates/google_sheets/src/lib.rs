//! Google Sheets values client
//!
//! Only the calls the journey mirror needs: read the key column, read a row,
//! append a row, overwrite a row. The bearer token is passed on every call.

pub mod client;
pub mod error;
pub mod values;

pub use client::SheetsClient;
pub use error::{Result, SheetsError};
pub use values::{a1_range, cell_text, ValueRange};
