use approx::assert_abs_diff_eq;
use gridsite_algorithms::{BoundsConfig, DEFAULT_GRID_SPACING_M};
use gridsite_core::{
    parse_timestamp, GridBounds, GridIndex, LambertConformal, LatLon, MetaColumn, ProjectedPoint,
    SiteMeta,
};
use gridsite_io::{
    BoxSelection, ChunkConfig, DataStore, Error, GridConfig, GridResource, MemoryStore,
    SiteConfig, SiteResource,
};
use ndarray::{Array, IxDyn};

const ROWS: usize = 40;
const COLS: usize = 50;
const STEPS: usize = 30;

/// Grid dataset whose cell (r, c) sits exactly at origin + (c, r) * 2 km.
fn grid_store() -> MemoryStore {
    let proj = LambertConformal::wind_toolkit();
    let origin = proj.project(LatLon::new(36.0, -110.0));
    let coords = Array::from_shape_fn(IxDyn(&[ROWS, COLS, 2]), |ix| {
        let p = proj.unproject(ProjectedPoint::new(
            origin.x + ix[1] as f64 * DEFAULT_GRID_SPACING_M,
            origin.y + ix[0] as f64 * DEFAULT_GRID_SPACING_M,
        ));
        if ix[2] == 0 {
            p.lat
        } else {
            p.lon
        }
    });
    let wind = Array::from_shape_fn(IxDyn(&[STEPS, ROWS, COLS]), |ix| {
        (ix[0] * 10_000 + ix[1] * 100 + ix[2]) as f64
    });

    let mut store = MemoryStore::new();
    store
        .insert_array("coordinates", coords)
        .insert_array("windspeed_100m", wind);
    store
}

fn cell(store: &MemoryStore, row: usize, col: usize) -> LatLon {
    let c = store.read_all("coordinates").unwrap();
    LatLon::new(c[[row, col, 0]], c[[row, col, 1]])
}

#[test]
fn test_grid_resource_resolves_stored_cells() {
    let store = grid_store();
    let cells = [(0, 0), (7, 31), (39, 49), (20, 0)];
    let expected: Vec<LatLon> = cells.iter().map(|&(r, c)| cell(&store, r, c)).collect();
    let grid = GridResource::load(store, &GridConfig::default()).unwrap();

    assert_eq!(grid.grid_shape(), (ROWS, COLS));
    for (&(r, c), coord) in cells.iter().zip(&expected) {
        let idx = grid.resolve(*coord).unwrap();
        assert_eq!(idx, GridIndex::new(r as i64, c as i64));
        let stored = grid.coordinate(idx).unwrap();
        assert_abs_diff_eq!(stored.lat, coord.lat, epsilon = 1e-12);
    }
}

#[test]
fn test_grid_timeseries_and_window() {
    let store = grid_store();
    let point = cell(&store, 12, 8);
    let grid = GridResource::load(
        store,
        &GridConfig::default().with_chunk(ChunkConfig::default().with_batch_size(8)),
    )
    .unwrap();

    let series = grid.timeseries("windspeed_100m", point).unwrap();
    assert_eq!(series.len(), STEPS);
    assert_eq!(series[29], 291_208.0);

    let window = grid.point_window("windspeed_100m", point, 0..24).unwrap();
    assert_eq!(window.len(), 24);
    assert_eq!(window[1], 11_208.0);
}

#[test]
fn test_grid_point_outside_extent() {
    let grid = GridResource::load(grid_store(), &GridConfig::default()).unwrap();
    let far = LatLon::new(45.0, -80.0);
    let idx = grid.resolve(far).unwrap();
    assert!(idx.row >= ROWS as i64 || idx.col >= COLS as i64);
    assert!(matches!(
        grid.timeseries("windspeed_100m", far),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_extract_box_inclusive_and_strided() {
    let store = grid_store();
    let sw = cell(&store, 5, 10);
    let ne = cell(&store, 9, 20);
    let grid = GridResource::load(store, &GridConfig::default()).unwrap();

    let bounds = grid
        .resolve_bounds(sw, ne, &BoundsConfig::default().with_samples_per_edge(200))
        .unwrap();
    assert!(bounds.rows().contains(&5) && bounds.rows().contains(&9));
    assert!(bounds.cols().contains(&10) && bounds.cols().contains(&20));

    let exact = GridBounds {
        min: GridIndex::new(5, 10),
        max: GridIndex::new(9, 20),
    };
    let block = grid
        .extract_box("windspeed_100m", &exact, &BoxSelection::default().with_time(0..24))
        .unwrap();
    assert_eq!(block.shape(), &[24, 5, 11]);
    assert_eq!(block[[0, 4, 10]], 920.0);

    let strided = grid
        .extract_box(
            "windspeed_100m",
            &exact,
            &BoxSelection::default()
                .with_time(0..24)
                .with_tskip(6)
                .with_skip(2),
        )
        .unwrap();
    assert_eq!(strided.shape(), &[4, 3, 6]);

    let coords = grid.coordinates_box(&exact, 1).unwrap();
    assert_eq!(coords.shape(), &[5, 11, 2]);
}

#[test]
fn test_extract_box_clips_to_grid() {
    let grid = GridResource::load(grid_store(), &GridConfig::default()).unwrap();
    let overhanging = GridBounds {
        min: GridIndex::new(-3, 45),
        max: GridIndex::new(2, 60),
    };
    let block = grid
        .extract_box("windspeed_100m", &overhanging, &BoxSelection::default())
        .unwrap();
    assert_eq!(block.shape(), &[STEPS, 3, 5]);

    let outside = GridBounds::point(GridIndex::new(100, 100));
    assert!(matches!(
        grid.extract_box("windspeed_100m", &outside, &BoxSelection::default()),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_grid_load_rejects_bad_coordinates() {
    let mut store = MemoryStore::new();
    store.insert_array("coordinates", Array::zeros(IxDyn(&[4, 2])));
    assert!(matches!(
        GridResource::load(store, &GridConfig::default()),
        Err(Error::DimensionMismatch { expected: 3, .. })
    ));
    assert!(matches!(
        GridResource::load(MemoryStore::new(), &GridConfig::default()),
        Err(Error::NotFound(_))
    ));
}

fn site_store() -> MemoryStore {
    let coords = Array::from_shape_vec(
        IxDyn(&[4, 2]),
        vec![39.74, -105.18, 21.3, -157.8, 35.1, -106.6, 44.98, -93.27],
    )
    .unwrap();
    let ghi = Array::from_shape_fn(IxDyn(&[24, 4]), |ix| (ix[0] * 100 + ix[1]) as f64);
    let stamps = (0..24)
        .map(|h| format!("2017-06-21 {h:02}:00:00"))
        .collect();
    let meta = SiteMeta::new([
        (
            "country",
            MetaColumn::Bytes(vec![
                b"United States".to_vec(),
                b"United States".to_vec(),
                b"United States".to_vec(),
                b"Canada".to_vec(),
            ]),
        ),
        (
            "state",
            MetaColumn::Bytes(vec![
                b"Colorado".to_vec(),
                b"Hawaii".to_vec(),
                b"New Mexico".to_vec(),
                b"None".to_vec(),
            ]),
        ),
        ("timezone", MetaColumn::Numeric(vec![-7.0, -10.0, -7.0, -6.0])),
    ])
    .unwrap();

    let mut store = MemoryStore::new();
    store
        .insert_array("coordinates", coords)
        .insert_array("ghi", ghi)
        .insert_strings("time_index", stamps)
        .insert_table("meta", meta);
    store
}

#[test]
fn test_site_lookups() {
    let sites = SiteResource::load(site_store(), &SiteConfig::default()).unwrap();

    let nearest = sites.nearest_site(LatLon::new(35.0, -106.5)).unwrap();
    assert_eq!(nearest.index, 2);

    let t = parse_timestamp("2017-06-21 13:00:00").unwrap();
    assert_eq!(sites.nearest_timestep(t).unwrap(), 13);

    assert_eq!(sites.region_indices("Colorado", "state").unwrap(), vec![0]);
    assert!(sites.region_indices("Texas", "state").unwrap().is_empty());
    assert!(sites.region_indices("Colorado", "county").is_err());
    assert_eq!(sites.conus_indices().unwrap(), vec![0, 2]);
}

#[test]
fn test_site_timeseries_without_scale_factor() {
    let sites = SiteResource::load(site_store(), &SiteConfig::default()).unwrap();
    let series = sites
        .timeseries("ghi", LatLon::new(44.9, -93.3), false)
        .unwrap();
    assert_eq!(series.site, 3);
    assert_eq!(series.values[5], 503.0);
    assert_eq!(series.times, *sites.time_index());

    let stats = series.stats().unwrap();
    assert_eq!(stats.count, 24);
    assert_abs_diff_eq!(stats.min, 3.0);
    assert_abs_diff_eq!(stats.max, 2303.0);
}

#[test]
fn test_site_variable_shape_checked() {
    let mut store = site_store();
    store.insert_array("wind", Array::zeros(IxDyn(&[24, 3])));
    let sites = SiteResource::load(store, &SiteConfig::default()).unwrap();
    let t = parse_timestamp("2017-06-21 00:00:00").unwrap();
    assert!(matches!(
        sites.timestep_snapshot("wind", t),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_site_variable_time_extent_checked() {
    let mut store = site_store();
    store.insert_array("short", Array::zeros(IxDyn(&[20, 4])));
    let sites = SiteResource::load(store, &SiteConfig::default()).unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2017, 6, 21).unwrap();
    assert!(matches!(
        sites.day("short", date, false),
        Err(Error::InvalidInput(_))
    ));
    let t = parse_timestamp("2017-06-21 03:00:00").unwrap();
    assert!(matches!(
        sites.timestep_snapshot("short", t),
        Err(Error::InvalidInput(_))
    ));

    let day = sites.day("ghi", date, false).unwrap();
    assert_eq!(day.values.nrows(), day.times.len());
    assert_eq!(day.steps, 0..24);
}

#[test]
fn test_site_meta_without_rows_rejected() {
    let mut store = site_store();
    store.insert_table(
        "meta",
        SiteMeta::new([("timezone", MetaColumn::Numeric(Vec::new()))]).unwrap(),
    );
    assert!(matches!(
        SiteResource::load(store, &SiteConfig::default()),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_site_load_missing_time_index() {
    let mut store = MemoryStore::new();
    store.insert_array("coordinates", Array::zeros(IxDyn(&[1, 2])));
    assert!(matches!(
        SiteResource::load(store, &SiteConfig::default()),
        Err(Error::NotFound(name)) if name == "time_index"
    ));
}

#[cfg(feature = "hdf5")]
mod hdf5_roundtrip {
    use super::*;
    use gridsite_io::{write_subset, Hdf5Store};
    use tempfile::NamedTempFile;

    #[test]
    fn test_box_extract_written_and_reread() {
        let grid = GridResource::load(grid_store(), &GridConfig::default()).unwrap();
        let bounds = GridBounds {
            min: GridIndex::new(1, 1),
            max: GridIndex::new(3, 4),
        };
        let block = grid
            .extract_box("windspeed_100m", &bounds, &BoxSelection::default().with_time(0..2))
            .unwrap();
        let coords = grid.coordinates_box(&bounds, 1).unwrap();

        let tmp = NamedTempFile::new().unwrap();
        write_subset(
            tmp.path(),
            &[
                ("windspeed_100m".to_string(), block.clone()),
                ("coordinates".to_string(), coords),
            ],
        )
        .unwrap();

        let reopened = Hdf5Store::open(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(reopened.read_all("windspeed_100m").unwrap(), block);

        // The extract is itself a grid dataset anchored at its own corner.
        let sub = GridResource::load(reopened, &GridConfig::default()).unwrap();
        assert_eq!(sub.grid_shape(), (3, 4));
    }
}
