//! `ArcGIS` `FeatureServer` / `MapServer` layer query client.
//!
//! Queries a layer's `query` endpoint with `f=json` (Esri JSON) and follows
//! `resultOffset` pagination while the server reports
//! `exceededTransferLimit`. All pages are merged into a single Esri
//! `FeatureSet` document so that it can be cached as one payload.

use serde_json::{Value, json};

use crate::{FetchError, Transport};

/// Records requested per page when the layer definition does not say.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// A query against one `ArcGIS` layer.
#[derive(Debug, Clone)]
pub struct LayerQuery<'a> {
    /// Layer query URL (up to `.../query`).
    pub url: &'a str,
    /// Server-side `where` clause.
    pub where_clause: &'a str,
    /// Output spatial reference to request, if any.
    pub out_sr: Option<u32>,
    /// Records per page.
    pub page_size: u32,
}

impl<'a> LayerQuery<'a> {
    /// Creates a query that selects every feature of the layer.
    #[must_use]
    pub const fn new(url: &'a str) -> Self {
        Self {
            url,
            where_clause: "1=1",
            out_sr: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Fetches every feature matching `query` and returns them as a single
/// Esri `FeatureSet` (`{ geometryType, spatialReference, features }`).
///
/// The `spatialReference` and `geometryType` of the first page are kept.
///
/// # Errors
///
/// Returns [`FetchError`] if a request fails, the body is not JSON, the
/// server reports an `error` object, or a page has no `features` array.
pub fn query_feature_set(
    transport: &dyn Transport,
    query: &LayerQuery<'_>,
) -> Result<Value, FetchError> {
    let page_size = query.page_size.max(1);
    let mut features: Vec<Value> = Vec::new();
    let mut spatial_reference = Value::Null;
    let mut geometry_type = Value::Null;
    let mut offset: u64 = 0;

    loop {
        let mut params = vec![
            ("where", query.where_clause.to_string()),
            ("outFields", "*".to_string()),
            ("returnGeometry", "true".to_string()),
            ("f", "json".to_string()),
            ("resultOffset", offset.to_string()),
            ("resultRecordCount", page_size.to_string()),
        ];
        if let Some(out_sr) = query.out_sr {
            params.push(("outSR", out_sr.to_string()));
        }

        let body = transport.get(query.url, &params)?;
        let json: Value = serde_json::from_slice(&body)?;

        if let Some(error) = json.get("error") {
            return Err(FetchError::Response {
                url: query.url.to_string(),
                message: format!(
                    "ArcGIS API error: {}",
                    error["message"].as_str().unwrap_or("unknown error")
                ),
            });
        }

        let page = json["features"]
            .as_array()
            .ok_or_else(|| FetchError::Response {
                url: query.url.to_string(),
                message: "No features array in ArcGIS response".to_string(),
            })?;

        if offset == 0 {
            spatial_reference = json["spatialReference"].clone();
            geometry_type = json["geometryType"].clone();
        }

        let count = page.len() as u64;
        features.extend(page.iter().cloned());

        let exceeded = json["exceededTransferLimit"].as_bool().unwrap_or(false);
        if !exceeded || count == 0 {
            break;
        }
        offset += count;
    }

    log::debug!("{}: {} features", query.url, features.len());

    Ok(json!({
        "geometryType": geometry_type,
        "spatialReference": spatial_reference,
        "features": features,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    fn feature(id: u32) -> Value {
        json!({
            "attributes": { "OBJECTID": id },
            "geometry": { "rings": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]] }
        })
    }

    #[test]
    fn follows_exceeded_transfer_limit() {
        let transport = ScriptedTransport::json(vec![
            json!({
                "geometryType": "esriGeometryPolygon",
                "spatialReference": { "wkid": 102_100, "latestWkid": 3857 },
                "features": [feature(1), feature(2)],
                "exceededTransferLimit": true
            }),
            json!({
                "spatialReference": { "wkid": 4326 },
                "features": [feature(3)]
            }),
        ]);
        let query = LayerQuery {
            page_size: 2,
            out_sr: Some(3310),
            ..LayerQuery::new("https://example.com/FeatureServer/0/query")
        };

        let set = query_feature_set(&transport, &query).unwrap();

        assert_eq!(set["features"].as_array().unwrap().len(), 3);
        assert_eq!(set["spatialReference"]["latestWkid"], 3857);
        assert_eq!(set["geometryType"], "esriGeometryPolygon");
        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.param(1, "resultOffset").as_deref(), Some("2"));
        assert_eq!(transport.param(0, "outSR").as_deref(), Some("3310"));
        assert_eq!(transport.param(0, "f").as_deref(), Some("json"));
    }

    #[test]
    fn passes_where_clause_through() {
        let transport = ScriptedTransport::json(vec![json!({ "features": [] })]);
        let query = LayerQuery {
            where_clause: "name='Salton Sea'",
            ..LayerQuery::new("https://example.com/FeatureServer/1/query")
        };

        let set = query_feature_set(&transport, &query).unwrap();

        assert!(set["features"].as_array().unwrap().is_empty());
        assert_eq!(
            transport.param(0, "where").as_deref(),
            Some("name='Salton Sea'")
        );
        assert_eq!(transport.param(0, "outSR"), None);
    }

    #[test]
    fn api_error_object_is_an_error() {
        let transport = ScriptedTransport::json(vec![json!({
            "error": { "code": 400, "message": "Invalid query parameters" }
        })]);

        let err = query_feature_set(&transport, &LayerQuery::new("https://example.com/q"))
            .unwrap_err();

        assert!(err.to_string().contains("Invalid query parameters"));
    }
}
