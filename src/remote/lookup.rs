//! Taxonomy lookups: refreshed coordinates, display names and positions.

use crate::core::geo::{LatLng, Point};
use crate::data::dataset::{as_number, as_taxid, TaxId};
use crate::prelude::HashMap;
use crate::{MapError, Result};
use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_TAXONOMY_URL: &str = "https://lifemap-back.univ-lyon1.fr";

/// Shared HTTP client for taxonomy queries
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("lifemap/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Where to centre the view on an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxonLocation {
    pub point: Point,
    pub zoom: f64,
}

/// Remote taxonomy backend
#[async_trait]
pub trait TaxonomyService: Send + Sync {
    /// Current coordinates of each requested id; ids the backend does not know
    /// are absent from the result
    async fn coordinates(&self, ids: &[TaxId]) -> Result<HashMap<TaxId, Point>>;

    /// Scientific name of an entity
    async fn name(&self, taxid: TaxId) -> Result<Option<String>>;

    async fn locate(&self, taxid: TaxId) -> Result<Option<TaxonLocation>>;
}

#[derive(Debug, Deserialize)]
struct SolrEnvelope {
    response: SolrResponse,
}

#[derive(Debug, Deserialize)]
struct SolrResponse {
    docs: Vec<Value>,
}

/// Taxonomy service backed by the lifemap Solr index
#[derive(Debug, Clone)]
pub struct SolrTaxonomyService {
    base_url: String,
}

impl Default for SolrTaxonomyService {
    fn default() -> Self {
        Self::new(DEFAULT_TAXONOMY_URL)
    }
}

impl SolrTaxonomyService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn select_url(&self) -> String {
        format!("{}/solr/taxo/select", self.base_url)
    }

    async fn select(&self, filter: String, fields: &[&str], rows: usize) -> Result<Vec<Value>> {
        let payload = json!({
            "params": {
                "q": "*:*",
                "fq": filter,
                "fl": fields.join(","),
                "wt": "json",
                "rows": rows,
            }
        });
        let response = HTTP_CLIENT
            .post(self.select_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MapError::RemoteLookup(format!(
                "taxonomy query returned HTTP {}",
                response.status()
            )));
        }
        let envelope: SolrEnvelope = response.json().await?;
        Ok(envelope.response.docs)
    }

    async fn fetch_one(&self, taxid: TaxId, fields: &[&str]) -> Result<Option<Value>> {
        let docs = self.select(format!("taxid:{taxid}"), fields, 1).await?;
        Ok(docs.into_iter().next())
    }
}

/// Solr stores multi-valued fields; the first value is the one that counts
fn first_number(doc: &Value, field: &str) -> Option<f64> {
    match doc.get(field)? {
        Value::Array(values) => values.first().and_then(as_number),
        other => as_number(other),
    }
}

fn doc_point(doc: &Value) -> Option<Point> {
    let lat = first_number(doc, "lat")?;
    let lon = first_number(doc, "lon")?;
    let coord = LatLng::new(lat, lon);
    coord.is_valid().then(|| coord.to_mercator())
}

#[async_trait]
impl TaxonomyService for SolrTaxonomyService {
    async fn coordinates(&self, ids: &[TaxId]) -> Result<HashMap<TaxId, Point>> {
        if ids.is_empty() {
            return Ok(HashMap::default());
        }
        let joined = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" ");
        let docs = self
            .select(format!("taxid:({joined})"), &["taxid", "lat", "lon"], ids.len())
            .await?;
        let coords: HashMap<TaxId, Point> = docs
            .iter()
            .filter_map(|doc| Some((as_taxid(doc.get("taxid")?)?, doc_point(doc)?)))
            .collect();
        debug!("taxonomy returned coordinates for {}/{} ids", coords.len(), ids.len());
        Ok(coords)
    }

    async fn name(&self, taxid: TaxId) -> Result<Option<String>> {
        let doc = self.fetch_one(taxid, &["taxid", "sci_name"]).await?;
        Ok(doc.and_then(|d| match d.get("sci_name")? {
            Value::Array(names) => names.first()?.as_str().map(str::to_string),
            Value::String(name) => Some(name.clone()),
            _ => None,
        }))
    }

    async fn locate(&self, taxid: TaxId) -> Result<Option<TaxonLocation>> {
        let doc = self.fetch_one(taxid, &["taxid", "lat", "lon", "zoom"]).await?;
        Ok(doc.and_then(|d| {
            Some(TaxonLocation {
                point: doc_point(&d)?,
                zoom: first_number(&d, "zoom")?,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_point_projects_first_values() {
        let doc = json!({"taxid": 2759, "lat": [0.0, 10.0], "lon": [0.0]});
        let p = doc_point(&doc).unwrap();
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
        assert_eq!(first_number(&json!({"zoom": [7]}), "zoom"), Some(7.0));
        assert!(doc_point(&json!({"lat": [1.0]})).is_none());
    }

    #[test]
    fn test_select_url() {
        let service = SolrTaxonomyService::new("http://localhost:8983/");
        assert_eq!(service.select_url(), "http://localhost:8983/solr/taxo/select");
    }
}
