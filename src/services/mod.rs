//! Service layer for the class checker.
//!
//! This module contains the collaborators a reconciliation pass talks to:
//! - Catalog fetching (`CatalogClient`)
//! - Availability parsing (`JsonParser`, `HtmlParser`)
//! - Catalog access tokens (`ClientCredentials`, `StaticToken`)
//! - Status change notifications (`HttpMailNotifier`, `LogNotifier`)

mod catalog;
mod notifier;
mod parser;
mod token;

pub use catalog::{CatalogClient, CatalogFetcher};
pub use notifier::{HttpMailNotifier, LogNotifier, Message, Notifier, notifier_from_config};
pub use parser::{
    AvailabilityParser, HtmlParser, JsonParser, NOT_AVAILABLE_SENTINEL, SEATS_FIELD, parser_for,
};
pub use token::{ClientCredentials, StaticToken, TokenProvider, provider_from_config};
