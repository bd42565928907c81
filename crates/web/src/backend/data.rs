use reqwest::Method;

use patentdesk_auth::{DataProvider, DataProviderError, Row};

use super::BackendClient;

/// Row lookups over the backend's REST table interface.
#[derive(Debug, Clone)]
pub struct RestDataProvider {
    client: BackendClient,
}

impl RestDataProvider {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

impl DataProvider for RestDataProvider {
    async fn fetch_one(&self, collection: &str, key: &str) -> Result<Option<Row>, DataProviderError> {
        let response = self
            .client
            .request(Method::GET, &format!("/rest/v1/{collection}"))
            .query(&[("id", format!("eq.{key}")), ("select", "*".to_string())])
            .send()
            .await
            .map_err(|e| DataProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataProviderError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let mut rows: Vec<Row> = response
            .json()
            .await
            .map_err(|e| DataProviderError::Decode(e.to_string()))?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(DataProviderError::Ambiguous {
                collection: collection.to_string(),
                count,
            }),
        }
    }
}
