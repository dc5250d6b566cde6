//! Zoho CRM client
//!
//! Covers only what the journey sync needs from the Leads module:
//!
//! - Search by `(Mobile, Lead_Source)` criteria
//! - Partial update of one lead by id
//!
//! Tokens are passed per call (`Authorization: Zoho-oauthtoken <token>`), so
//! refresh and retry stay with the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use zoho_crm::ZohoClient;
//!
//! let client = ZohoClient::new("https://www.zohoapis.in")?;
//! let leads = client.search_leads(&token, "+919800000001", "WATI").await?;
//! ```

pub mod client;
pub mod error;
pub mod leads;

pub use client::ZohoClient;
pub use error::{Result, ZohoError};
pub use leads::LeadRef;
