//! Collection discovery against the ODE iipt endpoint

use crate::config::HarvestConfig;
use crate::ode::models::{self, CollectionDescriptor};
use crate::store::RegistryStore;
use pdh_common::{HarvestError, Result};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{info, warn};

/// Discovers georeferenced PDS collections from the ODE web service
pub struct Discovery {
    client: Client,
    config: HarvestConfig,
}

impl Discovery {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs))
            .timeout(Duration::from_secs(config.http.read_timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(|err| HarvestError::network("client", err.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Discovery query URL, optionally scoped to one planet meta-db
    pub fn discovery_url(&self, planet: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.config.ode_service_url)
            .map_err(|err| HarvestError::config(err.to_string(), "check ode_service_url"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("query", "iipt");
            query.append_pair("output", "JSON");
            if let Some(planet) = planet {
                query.append_pair("odemetadb", planet);
            }
        }
        Ok(url)
    }

    /// Query the discovery endpoint and return the georeferenced
    /// descriptors, optionally filtered to one dataset id.
    pub async fn discover(
        &self,
        planet: Option<&str>,
        dataset_id: Option<&str>,
    ) -> Result<Vec<CollectionDescriptor>> {
        let url = self.discovery_url(planet)?;
        info!(url = %url, planet = planet.unwrap_or("all"), "Querying ODE collection index");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| HarvestError::network(url.as_str(), err.to_string()))?;
        if !response.status().is_success() {
            return Err(HarvestError::network(
                url.as_str(),
                format!("HTTP {}", response.status()),
            ));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| HarvestError::network(url.as_str(), err.to_string()))?;

        let all = models::decode_discovery_response(&body)?;
        let total = all.len();

        let wanted_dataset = dataset_id.map(str::to_uppercase);
        let mut skipped = 0usize;
        let mut product_total = 0i64;
        let mut retained = Vec::new();
        for descriptor in all {
            if !descriptor.is_georeferenced() {
                skipped += 1;
                continue;
            }
            if let Some(wanted) = &wanted_dataset {
                if descriptor.dataset_id.to_uppercase() != *wanted {
                    continue;
                }
            }
            product_total += descriptor.number_products;
            retained.push(descriptor);
        }

        info!(
            collections = retained.len(),
            of = total,
            skipped,
            products = product_total,
            "ODE discovery summary"
        );
        if retained.is_empty() {
            warn!("No georeferenced collection matched the query");
        }
        Ok(retained)
    }

    /// Discover and write the descriptors through to the registry store
    pub async fn discover_and_save(
        &self,
        planet: Option<&str>,
        dataset_id: Option<&str>,
        registry: &RegistryStore,
    ) -> Result<Vec<CollectionDescriptor>> {
        let descriptors = self.discover(planet, dataset_id).await?;
        registry.upsert_all(&descriptors)?;
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_url() {
        let discovery = Discovery::new(&HarvestConfig::default()).unwrap();

        let url = discovery.discovery_url(Some("mars")).unwrap();
        assert_eq!(url.host_str(), Some("oderest.rsl.wustl.edu"));
        assert!(url.query().unwrap().contains("query=iipt"));
        assert!(url.query().unwrap().contains("output=JSON"));
        assert!(url.query().unwrap().contains("odemetadb=mars"));

        let url = discovery.discovery_url(None).unwrap();
        assert!(!url.query().unwrap().contains("odemetadb"));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_discover_mars_contains_mola() {
        let discovery = Discovery::new(&HarvestConfig::default()).unwrap();
        let descriptors = discovery.discover(Some("mars"), None).await.unwrap();

        assert!(descriptors.iter().any(|d| {
            d.ode_meta_db.to_uppercase() == "MARS"
                && d.ihid == "MGS"
                && d.iid == "MOLA"
                && d.number_products > 0
        }));
    }
}
