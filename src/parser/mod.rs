//! HTML to records. Everything here is synchronous and works on an already
//! parsed `scraper::Html`.

pub mod charts;
pub mod embedded;
pub mod links;
pub mod listing;
pub mod locator;
pub mod profile;
