pub mod tmdb;

pub use tmdb::{TmdbClient, TmdbError, TvCatalog, TvDetails, TvListing};
