use std::time::Duration;

use reqwest::{Client, Error};

pub struct HttpClient;

impl HttpClient {
    /// Client for streaming sources. Only connecting is bounded, since a
    /// response body lives as long as the track plays.
    pub fn new(user_agent: &str) -> Result<Client, Error> {
        Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()
    }
}
