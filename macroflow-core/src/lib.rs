//! MacroFlow Core: series types, credential discovery, provider clients,
//! calendar alignment, validation and persistence of the merged table.
//!
//! Control flow for one ETL run:
//! - resolve provider credentials ([`credentials`])
//! - fetch every indicator through its ordered candidates ([`data::fetch`])
//! - align onto one calendar ([`data::align`])
//! - validate ([`data::validate`]) and persist ([`data::store`])

pub mod credentials;
pub mod data;
pub mod domain;
