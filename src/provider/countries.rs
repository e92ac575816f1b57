use reqwest::Client;

use super::types::CountriesResponse;
use super::ProviderError;

/// Client for the countriesnow.space country/city listing.
pub struct CountriesClient {
    client: Client,
    url: String,
}

impl CountriesClient {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }

    pub async fn get_city_names(&self) -> Result<Vec<String>, ProviderError> {
        tracing::debug!("Countries request: {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api(format!("HTTP {}", status)));
        }

        let countries: CountriesResponse = response.json().await?;
        if countries.error {
            return Err(ProviderError::Api(countries.msg));
        }

        Ok(countries.into_city_names())
    }
}
