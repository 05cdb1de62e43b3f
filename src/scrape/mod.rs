pub mod categories;
pub mod detail;
pub mod extract;
pub mod filters;
pub mod http;
pub mod search;
pub mod sites;

#[cfg(test)]
pub(crate) mod testutil;
