mod fetcher;
mod sample;
mod source;

pub use fetcher::NewsApiClient;
pub use sample::SampleSource;
pub use source::RemoteSource;
