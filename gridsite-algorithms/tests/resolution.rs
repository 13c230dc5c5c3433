use approx::assert_abs_diff_eq;
use gridsite_algorithms::{
    BoundsConfig, GridResolver, SiteIndex, DEFAULT_GRID_SPACING_M,
};
use gridsite_core::{GridIndex, LambertConformal, LatLon, ProjectedPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Coordinate table of a small grid laid out exactly like the wind toolkit:
/// cell (r, c) sits at origin + (c, r) * 2 km in projected space.
fn coordinate_table(origin: LatLon, rows: usize, cols: usize) -> Vec<Vec<LatLon>> {
    let proj = LambertConformal::wind_toolkit();
    let o = proj.project(origin);
    (0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| {
                    proj.unproject(ProjectedPoint::new(
                        o.x + c as f64 * DEFAULT_GRID_SPACING_M,
                        o.y + r as f64 * DEFAULT_GRID_SPACING_M,
                    ))
                })
                .collect()
        })
        .collect()
}

#[test]
fn test_grid_roundtrip_every_cell() {
    let table = coordinate_table(LatLon::new(36.5, -109.5), 60, 80);
    let resolver = GridResolver::new(
        LambertConformal::wind_toolkit(),
        table[0][0],
        DEFAULT_GRID_SPACING_M,
    )
    .unwrap();

    for (r, row) in table.iter().enumerate() {
        for (c, coord) in row.iter().enumerate() {
            assert_eq!(
                resolver.resolve(*coord).unwrap(),
                GridIndex::new(r as i64, c as i64),
                "cell ({r}, {c})"
            );
        }
    }
}

#[test]
fn test_bounds_enclose_sampled_cells() {
    let table = coordinate_table(LatLon::new(36.5, -109.5), 60, 80);
    let resolver = GridResolver::new(
        LambertConformal::wind_toolkit(),
        table[0][0],
        DEFAULT_GRID_SPACING_M,
    )
    .unwrap();

    let sw = LatLon::new(36.8, -109.2);
    let ne = LatLon::new(37.3, -108.6);
    let bounds = resolver
        .resolve_bounds(sw, ne, &BoundsConfig::default())
        .unwrap();

    assert!(!bounds.is_point());
    assert!(bounds.min.row >= 0 && bounds.min.col >= 0);
    // Interior points of the rectangle resolve inside the bounds.
    for k in 0..=10 {
        let t = f64::from(k) / 10.0;
        let p = sw.lerp(ne, t);
        let idx = resolver.resolve(p).unwrap();
        assert!(bounds.rows().contains(&idx.row));
        assert!(bounds.cols().contains(&idx.col));
    }
}

#[test]
fn test_degenerate_bounds_collapse() {
    let resolver = GridResolver::new(
        LambertConformal::wind_toolkit(),
        LatLon::new(19.624_062_7, -123.305_206_3),
        DEFAULT_GRID_SPACING_M,
    )
    .unwrap();
    let p = LatLon::new(36.967_449_464_169_34, -109.050_292_968_75);
    let bounds = resolver
        .resolve_bounds(p, p, &BoundsConfig::default())
        .unwrap();
    assert_eq!(bounds.min, resolver.resolve(p).unwrap());
    assert_eq!(bounds.max, resolver.resolve(p).unwrap());
}

#[test]
fn test_site_self_query_many() {
    // Seeded scatter over a regional extent.
    let mut rng = StdRng::seed_from_u64(42);
    let sites: Vec<LatLon> = (0..2000)
        .map(|_| LatLon::new(rng.gen_range(30.0..40.0), rng.gen_range(-110.0..-95.0)))
        .collect();

    let index = SiteIndex::build(&sites).unwrap();
    assert_eq!(index.len(), sites.len());
    for (i, site) in sites.iter().enumerate() {
        let found = index.nearest(*site).unwrap();
        assert_eq!(found.index, i);
        assert_abs_diff_eq!(found.distance, 0.0);
    }
}

#[test]
fn test_site_matches_brute_force() {
    let sites: Vec<LatLon> = (0..400)
        .map(|i| {
            let i = f64::from(i);
            LatLon::new(25.0 + (i * 0.37) % 20.0, -120.0 + (i * 0.91) % 40.0)
        })
        .collect();
    let index = SiteIndex::build(&sites).unwrap();

    for query in [
        LatLon::new(33.3, -101.1),
        LatLon::new(44.0, -85.2),
        LatLon::new(26.1, -119.9),
    ] {
        let best = sites
            .iter()
            .map(|s| (s.lat - query.lat).hypot(s.lon - query.lon))
            .fold(f64::INFINITY, f64::min);
        let found = index.nearest(query).unwrap();
        assert_abs_diff_eq!(found.distance, best, epsilon = 1e-12);
    }
}
