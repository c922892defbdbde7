//! Core of a movie/TV browsing app: a paginating list controller over the
//! TMDB API plus trending-counter and saved-item stores backed by a hosted
//! document database. Screens drive [`feed::FeedController`] and
//! [`debounce::SearchFlow`]; persistence goes through [`trending`] and
//! [`saved`] over the [`docstore`] client.

pub mod debounce;
pub mod docstore;
pub mod error;
pub mod feed;
pub mod models;
pub mod saved;
pub mod tmdb;
pub mod trending;
