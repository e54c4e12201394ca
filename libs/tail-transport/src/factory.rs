use std::sync::Arc;

use tail_api::{AdapterFactory, TransportAdapter};

use crate::endpoint::TailEndpoint;
use crate::poll::{PollAdapter, PollFetcher, PollSettings};
use crate::stream::StreamAdapter;

/// Builds a fresh [`StreamAdapter`] for every (re)open.
pub struct StreamAdapterFactory {
    client: reqwest::Client,
    endpoint: TailEndpoint,
}

impl StreamAdapterFactory {
    pub fn new(client: reqwest::Client, endpoint: TailEndpoint) -> Self {
        Self { client, endpoint }
    }
}

impl AdapterFactory for StreamAdapterFactory {
    fn build(&mut self) -> Box<dyn TransportAdapter> {
        Box::new(StreamAdapter::new(self.client.clone(), self.endpoint.clone()))
    }
}

/// Builds a fresh [`PollAdapter`]; all of them share one fetcher.
pub struct PollAdapterFactory<F: PollFetcher> {
    fetcher: Arc<F>,
    endpoint: TailEndpoint,
    settings: PollSettings,
}

impl<F: PollFetcher> PollAdapterFactory<F> {
    pub fn new(fetcher: F, endpoint: TailEndpoint, settings: PollSettings) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            endpoint,
            settings,
        }
    }
}

impl<F: PollFetcher> AdapterFactory for PollAdapterFactory<F> {
    fn build(&mut self) -> Box<dyn TransportAdapter> {
        Box::new(PollAdapter::new(
            self.fetcher.clone(),
            self.endpoint.clone(),
            self.settings.clone(),
        ))
    }
}
