use crate::constants::{columns, ROOT_LABEL};
use crate::core::geo::Point;
use crate::data::dataset::{as_taxid, stringify, Row, TaxId};
use crate::layers::base::LayerId;
use crate::layers::feature::Feature;
use crate::remote::lookup::TaxonomyService;
use crate::styles::color::SerializableColor;
use log::warn;
use serde::Serialize;

/// One donut wedge as listed in a popup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupSlice {
    pub category: String,
    pub count: f64,
    pub percent: f64,
    pub color: Option<SerializableColor>,
}

/// Structured popup body; the host decides how to lay it out
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PopupContent {
    pub title: String,
    /// Label and value of each data-driven channel
    pub rows: Vec<(String, String)>,
    pub slices: Vec<PopupSlice>,
}

impl PopupContent {
    pub fn text(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// How a layer fills its popups
#[derive(Debug, Clone, PartialEq)]
pub enum PopupTemplate {
    /// Show a single column's value, no lookup involved
    Column(String),
    /// Resolve the entity name, then list channel values and donut slices
    Taxon {
        /// `(label, column)` pairs shown under the title
        fields: Vec<(String, String)>,
        /// Category order for donut slices
        slice_order: Option<Vec<String>>,
    },
}

impl PopupTemplate {
    /// Builds the request for a hit feature; features without their row
    /// cannot carry a popup
    pub fn request(&self, layer_id: &LayerId, feature: &Feature, offset: [f64; 2]) -> Option<PopupRequest> {
        let row = feature.row.as_deref()?;
        let body = match self {
            Self::Column(col) => PopupBody::Ready(PopupContent::text(
                row.get(col).map(stringify).unwrap_or_default(),
            )),
            Self::Taxon {
                fields,
                slice_order,
            } => PopupBody::Taxon {
                taxid: row.get(columns::TAXID).and_then(as_taxid),
                raw_id: row.get(columns::TAXID).map(stringify).unwrap_or_default(),
                rows: field_rows(row, fields),
                slices: slice_order
                    .as_ref()
                    .map(|order| ordered_slices(feature, order))
                    .unwrap_or_default(),
            },
        };
        Some(PopupRequest {
            layer_id: layer_id.clone(),
            anchor: feature.geometry.anchor(),
            offset,
            body,
        })
    }
}

fn field_rows(row: &Row, fields: &[(String, String)]) -> Vec<(String, String)> {
    fields
        .iter()
        .filter_map(|(label, col)| row.get(col).map(|v| (label.clone(), stringify(v))))
        .collect()
}

fn ordered_slices(feature: &Feature, order: &[String]) -> Vec<PopupSlice> {
    let total = feature.slice_total();
    let mut slices: Vec<PopupSlice> = feature
        .slices
        .iter()
        .map(|s| PopupSlice {
            category: s.category.clone(),
            count: s.count,
            percent: if total > 0.0 { s.count / total * 100.0 } else { 0.0 },
            color: s.color,
        })
        .collect();
    let rank = |c: &str| order.iter().position(|o| o == c).unwrap_or(order.len());
    slices.sort_by_key(|s| rank(&s.category));
    slices
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupBody {
    Ready(PopupContent),
    Taxon {
        taxid: Option<TaxId>,
        raw_id: String,
        rows: Vec<(String, String)>,
        slices: Vec<PopupSlice>,
    },
}

/// A popup waiting for its content to be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct PopupRequest {
    pub layer_id: LayerId,
    pub anchor: Point,
    pub offset: [f64; 2],
    pub body: PopupBody,
}

impl PopupRequest {
    /// Whether the content is known without a lookup
    pub fn is_ready(&self) -> bool {
        matches!(self.body, PopupBody::Ready(_))
    }

    pub async fn resolve(self, service: &dyn TaxonomyService) -> Popup {
        let content = match self.body {
            PopupBody::Ready(content) => content,
            PopupBody::Taxon {
                taxid,
                raw_id,
                rows,
                slices,
            } => {
                let title = match taxid {
                    Some(id) => popup_title(service, id).await,
                    None => raw_id,
                };
                PopupContent {
                    title,
                    rows,
                    slices,
                }
            }
        };
        Popup {
            layer_id: self.layer_id,
            anchor: self.anchor,
            offset: self.offset,
            content,
        }
    }
}

/// Scientific name and id of an entity, or just the id when the lookup fails
pub async fn popup_title(service: &dyn TaxonomyService, taxid: TaxId) -> String {
    if taxid == 0 {
        return format!("{ROOT_LABEL} ({taxid})");
    }
    match service.name(taxid).await {
        Ok(Some(name)) => format!("{name} ({taxid})"),
        Ok(None) => taxid.to_string(),
        Err(e) => {
            warn!("title lookup for taxid {taxid} failed: {e}");
            taxid.to_string()
        }
    }
}

/// An open popup
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub layer_id: LayerId,
    pub anchor: Point,
    /// Pixel offset from the anchor
    pub offset: [f64; 2],
    pub content: PopupContent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::test_row;
    use crate::layers::feature::{DonutSlice, Geometry};
    use crate::prelude::{Arc, HashMap};
    use crate::remote::lookup::TaxonLocation;
    use crate::{MapError, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct Names;

    #[async_trait]
    impl TaxonomyService for Names {
        async fn coordinates(&self, _ids: &[TaxId]) -> Result<HashMap<TaxId, Point>> {
            Ok(HashMap::default())
        }

        async fn name(&self, taxid: TaxId) -> Result<Option<String>> {
            match taxid {
                9606 => Ok(Some("Homo sapiens".into())),
                13 => Err(MapError::RemoteLookup("offline".into())),
                _ => Ok(None),
            }
        }

        async fn locate(&self, _taxid: TaxId) -> Result<Option<TaxonLocation>> {
            Ok(None)
        }
    }

    fn feature(row: serde_json::Value) -> Feature {
        let mut f = Feature::new(Geometry::Segment(Point::new(0.0, 0.0), Point::new(2.0, 4.0)), 0);
        f.row = Some(Arc::new(test_row(row)));
        f
    }

    #[tokio::test]
    async fn test_titles() {
        assert_eq!(popup_title(&Names, 9606).await, "Homo sapiens (9606)");
        assert_eq!(popup_title(&Names, 0).await, "LUCA (0)");
        assert_eq!(popup_title(&Names, 13).await, "13");
        assert_eq!(popup_title(&Names, 77).await, "77");
    }

    #[tokio::test]
    async fn test_taxon_request_resolves() {
        let template = PopupTemplate::Taxon {
            fields: vec![("abundance".into(), "n".into())],
            slice_order: None,
        };
        let id = LayerId::generate("d");
        let req = template
            .request(&id, &feature(json!({"taxid": 9606, "n": 12})), [0.0, -5.0])
            .unwrap();
        assert!(!req.is_ready());
        assert_eq!(req.anchor, Point::new(1.0, 2.0));
        let popup = req.resolve(&Names).await;
        assert_eq!(popup.content.title, "Homo sapiens (9606)");
        assert_eq!(popup.content.rows, vec![("abundance".to_string(), "12".to_string())]);
        assert_eq!(popup.offset, [0.0, -5.0]);
    }

    #[test]
    fn test_column_template_is_synchronous() {
        let template = PopupTemplate::Column("name".into());
        let id = LayerId::generate("d");
        let req = template
            .request(&id, &feature(json!({"name": "Bacteria"})), [0.0, -5.0])
            .unwrap();
        assert_eq!(req.body, PopupBody::Ready(PopupContent::text("Bacteria")));

        let mut bare = feature(json!({}));
        bare.row = None;
        assert!(template.request(&id, &bare, [0.0, 0.0]).is_none());
    }

    #[test]
    fn test_slices_follow_domain_order() {
        let mut f = feature(json!({"taxid": 2}));
        for (category, count) in [("b", 1.0), ("a", 3.0)] {
            f.slices.push(DonutSlice {
                category: category.into(),
                count,
                color: None,
            });
        }
        let slices = ordered_slices(&f, &["a".to_string(), "b".to_string()]);
        assert_eq!(slices[0].category, "a");
        assert_eq!(slices[0].percent, 75.0);
        assert_eq!(slices[1].percent, 25.0);
    }
}
