mod fetcher;

pub use fetcher::{
    parse_source_url, HttpFetcher, SourceFetcher, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_BODY_BYTES,
};
