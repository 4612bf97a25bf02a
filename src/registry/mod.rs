//! Source Reader
//!
//! Lens contract bindings, the read surfaces over them, and the paginated
//! fetcher that merges metadata, reserves and reward tokens into pool records.

mod contracts;
mod fetcher;
mod source;

pub use contracts::{OXDAO_VOTER, OX_LENS, SOLIDEX_VOTER, SOLIDLY_LENS};
pub use fetcher::{PoolFetcher, DEFAULT_PAGE_SIZE};
pub use source::{ChainReader, GaugeSource, RegistrySource};

#[cfg(test)]
pub(crate) use fetcher::tests as fakes;
