//! HTTP handler functions for the generic map API.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, web};
use generic_map_api_clustering::BasicClustering;
use generic_map_api_layers::{FeatureLayer, LayerMeta, parse_params};
use generic_map_api_serializer::{
    MapItem, collect_records, find_bounding_box, serialize_clustered_stream, serialize_stream,
};
use generic_map_api_server_models::{ApiError, ApiHealth, ApiItem, ApiItems, ListOptions};
use generic_map_api_viewport::Viewport;

use crate::AppState;

type QueryPairs = web::Query<Vec<(String, String)>>;

fn not_found(layer: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ApiError::new(format!("Unknown layer `{layer}`")))
}

fn bad_request(e: &impl std::fmt::Display) -> HttpResponse {
    log::debug!("Rejecting request: {e}");
    HttpResponse::BadRequest().json(ApiError::new(e.to_string()))
}

fn layer_meta(layer: &dyn FeatureLayer) -> LayerMeta {
    let base = format!("/api/layers/{}", layer.id());
    let mut meta = layer.meta();
    meta.urls.extend([
        ("meta".to_string(), format!("{base}/_meta")),
        ("list".to_string(), format!("{base}/")),
        ("detail".to_string(), format!("{base}/items/ID")),
    ]);
    if layer.supports_bounds() {
        meta.urls.insert("bounds".to_string(), format!("{base}/bounds"));
    }
    if layer.has_parametrized_meta() {
        meta.urls.insert(
            "parametrized_meta".to_string(),
            format!("{base}/_meta/parametrized"),
        );
    }
    meta
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/layers`
///
/// Returns the metadata of every configured layer.
pub async fn layers(state: web::Data<AppState>) -> HttpResponse {
    let metas: Vec<LayerMeta> = state.layers.iter().map(layer_meta).collect();
    HttpResponse::Ok().json(metas)
}

/// `GET /api/layers/{layer}/_meta`
pub async fn meta(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    state
        .layers
        .get(&id)
        .map_or_else(|| not_found(&id), |layer| HttpResponse::Ok().json(layer_meta(layer)))
}

/// `GET /api/layers/{layer}/_meta/parametrized`
pub async fn parametrized_meta(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: QueryPairs,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(layer) = state.layers.get(&id) else {
        return not_found(&id);
    };

    let params = parse_params(layer.query_params(), &query);
    HttpResponse::Ok().json(layer.parametrized_meta(&params))
}

/// `GET /api/layers/{layer}/_meta/query_param/{name}/options`
///
/// Parameters without a fixed set of options answer `504`.
pub async fn query_param_options(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (layer_id, name) = path.into_inner();
    let Some(layer) = state.layers.get(&layer_id) else {
        return not_found(&layer_id);
    };

    let Some(param) = layer.query_params().iter().find(|param| param.name == name) else {
        return HttpResponse::NotFound().json(ApiError::new(format!(
            "Unknown query param `{name}` in layer `{layer_id}`"
        )));
    };

    param.render_options().map_or_else(
        || {
            HttpResponse::build(StatusCode::GATEWAY_TIMEOUT).json(ApiError::new(format!(
                "Query param `{name}` has no options"
            )))
        },
        |options| HttpResponse::Ok().json(options),
    )
}

/// `GET /api/layers/{layer}/`
///
/// Lists the layer's items inside the `tile` or `viewport` window,
/// filtered by the layer's declared parameters. Items are clustered when
/// the layer supports it and the request sets `clustering`.
pub async fn list(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: QueryPairs,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(layer) = state.layers.get(&id) else {
        return not_found(&id);
    };

    let options = match ListOptions::from_pairs(&query) {
        Ok(options) => options,
        Err(e) => return bad_request(&e),
    };
    if let Some(missing) = layer
        .requirements()
        .into_iter()
        .find(|requirement| !options.provides(requirement.as_ref()))
    {
        return bad_request(&format!("Layer `{id}` requires `{missing}`"));
    }
    log::trace!(
        "List options for `{id}`: zoom={:?} mpp={:?} size={:?}",
        options.zoom,
        options.meters_per_pixel,
        options.size
    );

    let viewport = match Viewport::from_query(options.tile.as_deref(), options.viewport.as_deref())
    {
        Ok(viewport) => viewport,
        Err(e) => return bad_request(&e),
    };

    let clustering = if layer.clustering() && options.clustering {
        match BasicClustering::new(layer.clustering_config()) {
            Ok(clustering) => Some(clustering),
            Err(e) => return bad_request(&e),
        }
    } else {
        None
    };

    let params = parse_params(layer.query_params(), &query);
    let items = layer.items(&viewport, &params);
    let serializer = layer.serializer();

    let rendered: Vec<MapItem> = match &clustering {
        Some(clustering) => collect_records(serialize_clustered_stream(
            serializer,
            clustering.find_clusters(serializer, &viewport, items),
        )),
        None => collect_records(serialize_stream(serializer, items))
            .into_iter()
            .map(MapItem::Feature)
            .collect(),
    };

    log::debug!("Listing {} items from layer `{id}`", rendered.len());

    HttpResponse::Ok().json(ApiItems { items: rendered })
}

/// `GET /api/layers/{layer}/bounds`
///
/// Summarizes the extent of every item matching the declared parameters,
/// regardless of viewport.
pub async fn bounds(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: QueryPairs,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(layer) = state.layers.get(&id) else {
        return not_found(&id);
    };
    if !layer.supports_bounds() {
        return bad_request(&format!("Layer `{id}` does not serve bounds"));
    }

    let params = parse_params(layer.query_params(), &query);
    let summary = find_bounding_box(layer.serializer(), layer.items(&Viewport::Empty, &params));

    HttpResponse::Ok().json(summary)
}

/// `GET /api/layers/{layer}/items/{id}`
pub async fn item(state: web::Data<AppState>, path: web::Path<(String, String)>) -> HttpResponse {
    let (layer_id, item_id) = path.into_inner();
    let Some(layer) = state.layers.get(&layer_id) else {
        return not_found(&layer_id);
    };

    let Some(feature) = layer.item(&item_id) else {
        return HttpResponse::NotFound().json(ApiError::new(format!(
            "Unknown item `{item_id}` in layer `{layer_id}`"
        )));
    };

    match layer.serializer().serialize_details(feature) {
        Ok(record) => HttpResponse::Ok().json(ApiItem { item: record }),
        Err(e) => {
            log::error!("Failed to serialize item `{item_id}` of layer `{layer_id}`: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to serialize item"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use generic_map_api_layers::LayerRegistry;
    use serde_json::{Value, json};

    use crate::{AppState, configure};

    const CONFIG: &str = r#"
[[layers]]
id = "places"
name = "Places"
path = "places.geojson"
feature_type = "place"
clustering = true
attributes = ["name"]

[[layers.filters]]
name = "kind"
label = "Kind"
many = true

[[layers.filters]]
name = "highlight"
label = "Highlight"
frontend_only = true
options = ["shop", "cafe"]

[layers.clustering_config]
eps = 0.05
min_samples = 4
include_orphans = true

[[layers]]
id = "broken"
name = "Broken clustering"
path = "places.geojson"
clustering = true

[layers.clustering_config]
min_samples = 0

[[layers]]
id = "strict"
name = "Strict viewport"
path = "places.geojson"
bounds = false
parametrized_meta = true

[[layers.filters]]
name = "kind"
label = "Kind"

[layers.require_viewport]
zoom = true
size = true
"#;

    fn state() -> web::Data<AppState> {
        let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data");
        web::Data::new(AppState {
            layers: LayerRegistry::from_toml(CONFIG, &data_dir).unwrap(),
        })
    }

    async fn get(uri: &str) -> (StatusCode, Value) {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    fn types(body: &Value) -> Vec<String> {
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| {
                item["type"].as_array().unwrap().last().unwrap().as_str().unwrap().to_string()
            })
            .collect()
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let (status, body) = get("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], json!(true));
    }

    #[actix_web::test]
    async fn lists_layer_metadata() {
        let (status, body) = get("/api/layers").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, meta) = get("/api/layers/places/_meta").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(meta["type"], json!("Features"));
        assert_eq!(meta["clustering"], json!(true));
        assert_eq!(meta["query_params"]["kind"]["type"], json!("text"));
        assert_eq!(meta["urls"]["list"], json!("/api/layers/places/"));
        assert_eq!(meta["urls"]["bounds"], json!("/api/layers/places/bounds"));
        assert!(meta["urls"].get("parametrized_meta").is_none());
        assert_eq!(meta["requirements"], json!([]));
    }

    #[actix_web::test]
    async fn meta_reflects_requirements_and_endpoint_toggles() {
        let (status, meta) = get("/api/layers/strict/_meta").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(meta["requirements"], json!(["viewport.size", "viewport.zoom"]));
        assert!(meta["urls"].get("bounds").is_none());
        assert_eq!(
            meta["urls"]["parametrized_meta"],
            json!("/api/layers/strict/_meta/parametrized")
        );

        let (status, _) = get("/api/layers/strict/bounds").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn renders_parametrized_meta() {
        let (status, body) = get("/api/layers/strict/_meta/parametrized?kind=park").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"count": 2}));

        let (status, body) = get("/api/layers/places/_meta/parametrized").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    #[actix_web::test]
    async fn renders_query_param_options() {
        let (status, body) = get("/api/layers/places/_meta/query_param/highlight/options").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["shop", "cafe"]));

        let (status, _) = get("/api/layers/places/_meta/query_param/kind/options").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let (status, _) = get("/api/layers/places/_meta/query_param/nope/options").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn enforces_viewport_requirements() {
        let (status, body) = get("/api/layers/strict/?viewport.zoom=3").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("viewport.size"));

        let (status, body) =
            get("/api/layers/strict/?viewport.zoom=3&viewport.size=800x600&viewport.mpp=2.5")
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 7);

        let (status, _) = get("/api/layers/places/?viewport.size=wide").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unknown_layer_is_not_found() {
        for uri in [
            "/api/layers/nope/_meta",
            "/api/layers/nope/",
            "/api/layers/nope/bounds",
            "/api/layers/nope/items/a",
        ] {
            let (status, body) = get(uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(body["error"].is_string());
        }
    }

    #[actix_web::test]
    async fn lists_items_without_clustering() {
        let (status, body) = get("/api/layers/places/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 7);
        assert_eq!(body["items"][0]["type"], json!(["place", "point"]));
        assert_eq!(body["items"][0]["geom"], json!([50.0, 20.0]));
    }

    #[actix_web::test]
    async fn clusters_on_request() {
        let (status, body) = get("/api/layers/places/?clustering=true").await;
        assert_eq!(status, StatusCode::OK);

        let types = types(&body);
        assert_eq!(types.iter().filter(|t| *t == "cluster").count(), 1);
        assert_eq!(types.len(), 4);

        let cluster = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|item| item["type"] == json!(["cluster"]))
            .unwrap();
        assert_eq!(cluster["count"], json!(4));
        assert_eq!(cluster["bbox"], json!([[49.99, 19.99], [50.0, 20.0]]));
    }

    #[actix_web::test]
    async fn filters_by_viewport_and_params() {
        let (status, body) = get("/api/layers/places/?viewport=u&kind=cafe").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Charlie", "Delta"]);
    }

    #[actix_web::test]
    async fn filters_by_geohash_pair() {
        let (status, body) = get("/api/layers/places/?viewport=get2u6/rfpzxg").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Alpha", "Bravo", "Charlie", "Delta", "Golf"]);
    }

    #[actix_web::test]
    async fn malformed_viewport_is_a_bad_request() {
        let (status, _) = get("/api/layers/places/?tile=1/2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get("/api/layers/places/?viewport=not-a-hash!").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn invalid_clustering_config_is_a_bad_request() {
        let (status, body) = get("/api/layers/broken/?clustering=1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("min_samples"));

        let (status, _) = get("/api/layers/broken/").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[actix_web::test]
    async fn summarizes_bounds() {
        let (status, body) = get("/api/layers/places/bounds").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(7));
        assert_eq!(body["northwest"], json!({"latitude": 50.0, "longitude": -20.0}));
        assert_eq!(body["southeast"], json!({"latitude": -50.0, "longitude": 20.0}));

        let (_, body) = get("/api/layers/places/bounds?kind=nothing").await;
        assert_eq!(body, json!({"count": 0}));
    }

    #[actix_web::test]
    async fn returns_item_details() {
        let (status, body) = get("/api/layers/places/items/charlie").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["id"], json!("charlie"));
        assert_eq!(body["item"]["name"], json!("Charlie"));

        let (status, _) = get("/api/layers/places/items/zulu").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
