mod url;

pub use url::{ShortenRequest, ShortenResponse};
