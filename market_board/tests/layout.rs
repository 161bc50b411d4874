use market_board::layout::{LayoutParams, Viewport, layout, layout_with};
use market_common::catalog::{Catalog, GeoPoint, IndexSymbol};
use market_common::quote::{Provenance, QuoteValues};
use market_common::Quote;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

fn quotes(catalog: &Catalog) -> Vec<Quote> {
    catalog
        .iter()
        .map(|spec| {
            let values = QuoteValues {
                price: Some(100.0),
                change_percent: 0.5,
                volume: 0,
            };
            Quote::from_spec(spec, values, Provenance::Primary)
        })
        .collect()
}

/// Every catalog symbol, anchored on a tight golden-angle spiral around (0, 0).
fn cluster(scale: f64) -> Vec<Quote> {
    quotes(&Catalog::standard())
        .into_iter()
        .enumerate()
        .map(|(i, mut quote)| {
            let angle = i as f64 * 2.39996;
            let spread = scale * ((i + 1) as f64).sqrt();
            quote.anchor = GeoPoint {
                lat: spread * angle.sin(),
                lon: spread * angle.cos(),
            };
            quote
        })
        .collect()
}

#[test]
fn few_markers_keep_projected_positions() {
    let catalog = Catalog::from_symbols([IndexSymbol::Gspc, IndexSymbol::Ftse, IndexSymbol::N225]);
    let positions = layout(&quotes(&catalog), Viewport::new(1000.0, 800.0), 50.0);

    assert_eq!(positions.len(), 3);
    for spec in catalog.iter() {
        let point = positions[&spec.symbol];
        assert_eq!(point.x, (spec.anchor.lon + 180.0) / 360.0 * 1000.0);
        assert_eq!(point.y, (90.0 - spec.anchor.lat) / 180.0 * 800.0);
    }
}

#[test]
fn clustered_markers_are_pushed_apart() {
    let radius = 40.0;
    let required = radius * 2.2 * 0.95;
    for scale in [0.001, 0.01, 0.1] {
        let positions = layout(&cluster(scale), Viewport::new(1000.0, 800.0), radius);
        let points: Vec<_> = positions.values().copied().collect();
        assert_eq!(points.len(), 20);
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert!(
                    a.distance(*b) >= required,
                    "scale {scale}: {a:?} and {b:?} are {} apart",
                    a.distance(*b)
                );
            }
        }
    }
}

#[test]
fn layout_is_deterministic() {
    let input = quotes(&Catalog::standard());
    let viewport = Viewport::new(1280.0, 720.0);
    assert_eq!(layout(&input, viewport, 40.0), layout(&input, viewport, 40.0));
}

#[test]
fn zero_iterations_leave_projection_untouched() {
    let input = quotes(&Catalog::standard());
    let viewport = Viewport::new(1280.0, 720.0);
    let params = LayoutParams {
        max_iterations: 0,
        ..LayoutParams::default()
    };
    let positions = layout_with(&input, viewport, 40.0, &params);
    for quote in &input {
        assert_eq!(positions[&quote.symbol], viewport.project(quote.anchor));
    }
}

#[quickcheck]
fn relaxed_markers_stay_inside_the_margin(width: u16, height: u16, radius: u8, take: u8) -> TestResult {
    let count = 5 + usize::from(take) % 16;
    let catalog = Catalog::from_symbols(Catalog::standard().symbols().into_iter().take(count));
    let (width, height, radius) = (f64::from(width), f64::from(height), f64::from(radius));
    let margin = radius * 1.2;

    let positions = layout(&quotes(&catalog), Viewport::new(width, height), radius);
    if positions.len() != count {
        return TestResult::failed();
    }

    let within = |value: f64, extent: f64| {
        if margin > extent - margin {
            value == extent / 2.0
        } else {
            (margin..=extent - margin).contains(&value)
        }
    };
    TestResult::from_bool(
        positions
            .values()
            .all(|p| within(p.x, width) && within(p.y, height)),
    )
}
