//! `spreadsheets.values` endpoints: get, append, update

use crate::client::SheetsClient;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Body of `spreadsheets.values.get` / `update`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// A1 notation with the sheet name quoted when it needs to be
pub fn a1_range(sheet: &str, cells: &str) -> String {
    let plain = !sheet.is_empty() && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        format!("{}!{}", sheet, cells)
    } else {
        format!("'{}'!{}", sheet.replace('\'', "''"), cells)
    }
}

/// Renders a cell as the string a sheet user would see
pub fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetsClient {
    pub async fn get_values(&self, token: &str, range: &str) -> Result<ValueRange> {
        let url = self.values_url(range, "");
        let response = self.get(token, &url).await?;
        Ok(response.json().await?)
    }

    /// Finds the 1-based row whose first column equals `key`
    pub async fn find_row_by_key(&self, token: &str, sheet: &str, key: &str) -> Result<Option<usize>> {
        let column = self.get_values(token, &a1_range(sheet, "A:A")).await?;
        let key = key.trim();

        let row = column
            .values
            .iter()
            .position(|row| row.first().map(cell_text).as_deref() == Some(key))
            .map(|index| index + 1);

        Ok(row)
    }

    /// Reads one full row (1-based); empty when the row has no data
    pub async fn get_row(&self, token: &str, sheet: &str, row_number: usize) -> Result<Vec<Value>> {
        let range = a1_range(sheet, &format!("{}:{}", row_number, row_number));
        let values = self.get_values(token, &range).await?;
        Ok(values.values.into_iter().next().unwrap_or_default())
    }

    /// Appends one row after the last row with data
    pub async fn append_row(&self, token: &str, sheet: &str, row: &[Value]) -> Result<()> {
        let url = self.values_url(&a1_range(sheet, "A1"), ":append");
        let body = json!({ "majorDimension": "ROWS", "values": [row] });

        self.post(
            token,
            &url,
            &[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")],
            &body,
        )
        .await?;

        tracing::debug!("Row appended to {}", sheet);
        Ok(())
    }

    /// Overwrites a row starting at column A
    pub async fn update_row(&self, token: &str, sheet: &str, row_number: usize, row: &[Value]) -> Result<()> {
        let range = a1_range(sheet, &format!("A{}", row_number));
        let url = self.values_url(&range, "");
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": [row] });

        self.put(token, &url, &[("valueInputOption", "RAW")], &body).await?;

        tracing::debug!("Row {} updated in {}", row_number, sheet);
        Ok(())
    }
}
