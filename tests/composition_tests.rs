use async_trait::async_trait;
use lifemap::input::events::MouseButton;
use lifemap::prelude::*;
use lifemap::styles::scale::ScaleKind;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Taxonomy backend that answers from a fixed table and counts requests
#[derive(Default)]
struct MockTaxonomy {
    known: HashMap<TaxId, Point>,
    coordinate_calls: AtomicUsize,
    name_calls: AtomicUsize,
}

impl MockTaxonomy {
    fn knowing(ids: &[(TaxId, Point)]) -> Self {
        Self {
            known: ids.iter().copied().collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TaxonomyService for MockTaxonomy {
    async fn coordinates(&self, ids: &[TaxId]) -> Result<HashMap<TaxId, Point>> {
        self.coordinate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| self.known.get(id).map(|p| (*id, *p)))
            .collect())
    }

    async fn name(&self, taxid: TaxId) -> Result<Option<String>> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("Taxon {taxid}")))
    }

    async fn locate(&self, _taxid: TaxId) -> Result<Option<TaxonLocation>> {
        Ok(None)
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn payload(id: &str, rows: Value) -> Value {
    json!({ id: { "serialized": false, "value": rows } })
}

fn grid_rows(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| {
                json!({
                    "taxid": i + 1,
                    "x": (i % 10) as f64 * 10.0,
                    "y": (i / 10) as f64 * 10.0,
                    "zoom": 1,
                    "v": i
                })
            })
            .collect(),
    )
}

async fn controller_with(rows: Value, service: Arc<MockTaxonomy>) -> CompositionController {
    init_logging();
    let mut controller = CompositionController::new(EngineConfig::default(), service).unwrap();
    assert!(controller.update_data(&payload("d", rows)).await.unwrap().is_some());
    controller
}

fn only_layer(controller: &CompositionController) -> &dyn LayerTrait {
    let layers = controller.layers().layers();
    assert_eq!(layers.len(), 1);
    layers[0]
}

#[tokio::test]
async fn test_repeated_refresh_issues_one_remote_request() {
    let service = Arc::new(MockTaxonomy::knowing(&[(1, Point::new(500.0, 600.0))]));
    let mut controller = controller_with(grid_rows(5), service.clone()).await;
    assert_eq!(controller.dataset("d").unwrap().rows()[0]["x"], json!(500.0));

    // Same id set in a different order
    let mut rows = grid_rows(5);
    rows.as_array_mut().unwrap().reverse();
    assert!(controller.update_data(&payload("d", rows)).await.unwrap().is_some());

    assert_eq!(service.coordinate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_shared_cache_spans_controllers_and_clears_on_teardown() {
    init_logging();
    let service = Arc::new(MockTaxonomy::default());
    let cache = Arc::new(CoordinateCache::new(&CoordinateCacheConfig::default()));
    let mut a = CompositionController::new(EngineConfig::default(), service.clone())
        .unwrap()
        .with_cache(cache.clone());
    let mut b = CompositionController::new(EngineConfig::default(), service.clone())
        .unwrap()
        .with_cache(cache.clone());

    a.update_data(&payload("d", grid_rows(3))).await.unwrap();
    b.update_data(&payload("e", grid_rows(3))).await.unwrap();
    assert_eq!(service.coordinate_calls.load(Ordering::SeqCst), 1);

    a.teardown();
    assert!(cache.is_empty());
    b.update_data(&payload("e", grid_rows(3))).await.unwrap();
    assert_eq!(service.coordinate_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_identical_settles_keep_rows_and_legend() {
    let mut controller = controller_with(grid_rows(100), Arc::new(MockTaxonomy::default())).await;
    let report = controller
        .update_layers(
            &json!({"layer": "points", "options": {"id": "d", "fill": "v", "lazy": true, "lazy_zoom": 0}}),
            ColorRanges::default(),
        )
        .unwrap();
    assert!(report.legend.changed);
    assert!(only_layer(&controller).features().is_empty());

    let view = ViewportWindow::new(0.0, 0.0, 25.0, 25.0, 6.0);
    let first = controller.on_viewport_settled(view);
    let rows_first: Vec<usize> = only_layer(&controller)
        .features()
        .iter()
        .map(|f| f.source_index)
        .collect();
    let second = controller.on_viewport_settled(view);
    let rows_second: Vec<usize> = only_layer(&controller)
        .features()
        .iter()
        .map(|f| f.source_index)
        .collect();

    assert_eq!(first.rebuilt.len(), 1);
    assert!(!first.legend.changed);
    assert!(!second.legend.changed);
    assert_eq!(rows_first, rows_second);
    // 3x3 grid cells inside [0, 25] padded by 5% of the range
    assert_eq!(rows_first, vec![0, 1, 2, 10, 11, 12, 20, 21, 22]);
}

#[tokio::test]
async fn test_at_most_one_popup_open() {
    let service = Arc::new(MockTaxonomy::default());
    let mut controller = controller_with(grid_rows(3), service.clone()).await;
    controller
        .update_layers(
            &json!({"layer": "points", "options": {"id": "d", "popup": true, "fill": "v"}}),
            ColorRanges::default(),
        )
        .unwrap();

    let click = |x: f64| InputEvent::Click {
        position: Point::new(x, 0.0),
        resolution: 1.0,
        button: MouseButton::Left,
    };

    assert_eq!(controller.handle_event(click(0.0)).await, EventHandled::Handled);
    assert_eq!(controller.popup().unwrap().content.title, "Taxon 1 (1)");

    assert_eq!(controller.handle_event(click(10.0)).await, EventHandled::Handled);
    let popup = controller.popup().unwrap();
    assert_eq!(popup.content.title, "Taxon 2 (2)");
    assert_eq!(popup.anchor, Point::new(10.0, 0.0));
    assert_eq!(popup.offset, [0.0, -5.0]);
    assert_eq!(popup.content.rows, vec![("v".to_string(), "1".to_string())]);

    // Empty space disposes it
    assert_eq!(controller.handle_event(click(500.0)).await, EventHandled::Handled);
    assert!(controller.popup().is_none());
    assert_eq!(service.name_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_hover_never_dangles() {
    let mut controller = controller_with(grid_rows(3), Arc::new(MockTaxonomy::default())).await;
    controller
        .update_layers(
            &json!({"layer": "points", "options": {"id": "d", "hover": true}}),
            ColorRanges::default(),
        )
        .unwrap();

    let moved = |x: f64| InputEvent::PointerMove {
        position: Point::new(x, 0.0),
        resolution: 0.2,
    };
    controller.handle_event(moved(10.5)).await;
    let hovered: Vec<bool> = only_layer(&controller).features().iter().map(|f| f.hover).collect();
    assert_eq!(hovered, vec![false, true, false]);

    controller.handle_event(moved(5.0)).await;
    assert!(only_layer(&controller).features().iter().all(|f| !f.hover));
    assert_eq!(controller.router().hover_state(), &HoverState::Idle);
}

#[tokio::test]
async fn test_twelve_string_categories_classify_linear() {
    let rows = Value::Array(
        (0..12)
            .map(|i| json!({"x": i as f64, "y": 0.0, "group": format!("g{i}")}))
            .collect(),
    );
    let mut controller = controller_with(rows, Arc::new(MockTaxonomy::default())).await;
    controller
        .update_layers(
            &json!({"layer": "points", "options": {"id": "d", "fill": "group"}}),
            ColorRanges::default(),
        )
        .unwrap();
    assert_eq!(controller.scales().len(), 1);
    assert_eq!(controller.scales()[0].kind, ScaleKind::Linear);
}

#[tokio::test]
async fn test_size_remap_scenario() {
    let rows = json!([
        {"x": 0.0, "y": 0.0, "v": 1},
        {"x": 1.0, "y": 0.0, "v": 5},
        {"x": 2.0, "y": 0.0, "v": 10}
    ]);
    let mut controller = controller_with(rows, Arc::new(MockTaxonomy::default())).await;
    controller
        .update_layers(
            &json!({"layer": "points", "options": {"id": "d", "radius": "v", "radius_range": [0, 100]}}),
            ColorRanges::default(),
        )
        .unwrap();
    let radii: Vec<f64> = only_layer(&controller)
        .features()
        .iter()
        .map(|f| f.radius.unwrap())
        .collect();
    assert_eq!(radii[0], 0.0);
    assert_eq!(radii[2], 100.0);
    assert!((radii[1] - 44.444).abs() < 1e-3);
}

#[tokio::test]
async fn test_rows_only_kept_for_popup_layers() {
    let mut controller = controller_with(grid_rows(4), Arc::new(MockTaxonomy::default())).await;
    controller
        .update_layers(
            &json!([
                {"layer": "points", "options": {"id": "d", "popup": false}},
                {"layer": "lines", "options": {"id": "d"}}
            ]),
            ColorRanges::default(),
        )
        .unwrap();
    for layer in controller.layers().layers() {
        assert!(layer.features().iter().all(|f| f.row.is_none()));
    }
}

#[tokio::test]
async fn test_degenerate_domain_stays_defined() {
    let rows = Value::Array(
        (0..30)
            .map(|i| json!({"x": i as f64, "y": 0.0, "v": 7}))
            .collect(),
    );
    let mut controller = controller_with(rows, Arc::new(MockTaxonomy::default())).await;
    controller
        .update_layers(
            &json!({"layer": "points", "options": {"id": "d", "radius": "v", "fill": "v", "fill_cat": false}}),
            ColorRanges::default(),
        )
        .unwrap();
    assert_eq!(controller.scales()[0].kind, ScaleKind::Linear);
    for feature in only_layer(&controller).features() {
        assert!(feature.radius.unwrap().is_finite());
        assert!(feature.fill_color.is_some());
    }
}

#[tokio::test]
async fn test_failing_definitions_do_not_block_others() {
    let mut controller = controller_with(grid_rows(4), Arc::new(MockTaxonomy::default())).await;
    let report = controller
        .update_layers(
            &json!([
                {"layer": "choropleth", "options": {"id": "d"}},
                {"layer": "points", "options": {"id": "missing"}},
                {"layer": "points", "options": {"id": "d", "bogus_option": 1}},
                {"layer": "text", "options": {"id": "d", "text": "v"}},
                {"layer": "screengrid", "options": {"id": "d"}}
            ]),
            ColorRanges::default(),
        )
        .unwrap();
    assert_eq!(report.skipped.len(), 3);
    assert!(report.skipped.iter().all(|e| e.is_layer_local()));
    assert_eq!(report.built.len(), 2);
    assert_eq!(controller.layers().len(), 2);
}

#[tokio::test]
async fn test_color_range_override_pins_legend() {
    let mut controller = controller_with(grid_rows(20), Arc::new(MockTaxonomy::default())).await;
    let mut ranges = ColorRanges::default();
    ranges.insert("v".to_string(), lifemap::styles::ColorRange { min: 0.0, max: 1000.0 });
    let first = controller
        .update_layers(&json!({"layer": "points", "options": {"id": "d", "fill": "v"}}), ranges.clone())
        .unwrap();
    assert!(first.legend.changed);

    controller
        .update_data(&payload("d", grid_rows(15)))
        .await
        .unwrap();
    assert_eq!(controller.scales()[0].linear_domain(), Some([0.0, 1000.0]));
    let again = controller
        .update_layers(&json!({"layer": "points", "options": {"id": "d", "fill": "v"}}), ranges)
        .unwrap();
    assert!(!again.legend.changed);
}
