//! Marker placement: equirectangular projection of each quote's anchor, followed by a
//! bounded force-directed relaxation that pushes overlapping markers apart.
//!
//! The relaxation is deterministic for identical inputs. It runs a fixed number of
//! iterations, so very dense inputs may still overlap slightly.

use std::collections::BTreeMap;

use market_common::catalog::GeoPoint;
use market_common::{IndexSymbol, Quote};
use serde::Serialize;

/// Final marker centre per symbol.
pub type PositionMap = BTreeMap<IndexSymbol, Point>;

/// A point in viewport pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset, growing downwards.
    pub y: f64,
}

impl Point {
    /// Euclidean distance to `other`.
    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Drawing surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Viewport {
    /// Viewport of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Equirectangular projection of `anchor` onto this viewport.
    pub fn project(&self, anchor: GeoPoint) -> Point {
        Point {
            x: (anchor.lon + 180.0) / 360.0 * self.width,
            y: (90.0 - anchor.lat) / 180.0 * self.height,
        }
    }
}

/// Relaxation constants.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    /// Target centre distance as a multiple of the marker radius.
    pub spacing: f64,
    /// Distance kept from the viewport edges, as a multiple of the radius.
    pub edge_margin: f64,
    /// Velocity damping per iteration.
    pub damping: f64,
    /// Strength of the pull back to the projected position.
    pub homing: f64,
    /// Upper bound on iterations; the actual count is `min(max_iterations, 2n)`.
    pub max_iterations: usize,
    /// Below this many markers the projection is returned unrelaxed.
    pub min_markers: usize,
    /// Upper bound on the repulsion factor; the actual factor is `min(max_force, 10/n)`.
    pub max_force: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            spacing: 2.2,
            edge_margin: 1.2,
            damping: 0.6,
            homing: 0.01,
            max_iterations: 50,
            min_markers: 5,
            max_force: 0.15,
        }
    }
}

/// Lay out `quotes` with the default constants.
pub fn layout(quotes: &[Quote], viewport: Viewport, radius: f64) -> PositionMap {
    layout_with(quotes, viewport, radius, &LayoutParams::default())
}

/// Lay out `quotes` with explicit constants.
pub fn layout_with(
    quotes: &[Quote],
    viewport: Viewport,
    radius: f64,
    params: &LayoutParams,
) -> PositionMap {
    let mut nodes: Vec<Node> = quotes
        .iter()
        .map(|quote| Node::new(quote.symbol, viewport.project(quote.anchor)))
        .collect();

    if nodes.len() >= params.min_markers {
        relax(&mut nodes, viewport, radius, params);
    }

    nodes.into_iter().map(|node| (node.symbol, node.position)).collect()
}

struct Node {
    symbol: IndexSymbol,
    position: Point,
    home: Point,
    velocity: Point,
}

impl Node {
    fn new(symbol: IndexSymbol, home: Point) -> Self {
        Self {
            symbol,
            position: home,
            home,
            velocity: Point::default(),
        }
    }
}

fn relax(nodes: &mut [Node], viewport: Viewport, radius: f64, params: &LayoutParams) {
    let n = nodes.len();
    let min_distance = radius * params.spacing;
    let force_factor = params.max_force.min(10.0 / n as f64);
    let iterations = params.max_iterations.min(2 * n);
    let margin = radius * params.edge_margin;

    let mut forces = vec![Point::default(); n];
    let mut crowded = vec![false; n];

    for _ in 0..iterations {
        forces.fill(Point::default());
        crowded.fill(false);

        for i in 0..n {
            for j in (i + 1)..n {
                let dx = nodes[j].position.x - nodes[i].position.x;
                let dy = nodes[j].position.y - nodes[i].position.y;
                let distance = dx.hypot(dy);
                if distance >= min_distance {
                    continue;
                }
                crowded[i] = true;
                crowded[j] = true;

                // coincident centres have no direction to push along
                let (ux, uy) = if distance > 0.0 {
                    (dx / distance, dy / distance)
                } else {
                    (0.0, 0.0)
                };
                let magnitude = (min_distance - distance) / 2.0 * force_factor;
                forces[i].x -= ux * magnitude;
                forces[i].y -= uy * magnitude;
                forces[j].x += ux * magnitude;
                forces[j].y += uy * magnitude;
            }
        }

        for (k, node) in nodes.iter_mut().enumerate() {
            let mut force = forces[k];
            // only markers clear of every neighbour drift home
            if !crowded[k] {
                force.x += params.homing * (node.home.x - node.position.x);
                force.y += params.homing * (node.home.y - node.position.y);
            }
            node.velocity.x = (node.velocity.x + force.x) * params.damping;
            node.velocity.y = (node.velocity.y + force.y) * params.damping;
            node.position.x = clamp_axis(node.position.x + node.velocity.x, viewport.width, margin);
            node.position.y =
                clamp_axis(node.position.y + node.velocity.y, viewport.height, margin);
        }
    }
}

/// Clamp to `[margin, extent - margin]`, or the axis centre when that band is empty.
fn clamp_axis(value: f64, extent: f64, margin: f64) -> f64 {
    let (lo, hi) = (margin, extent - margin);
    if lo > hi {
        extent / 2.0
    } else {
        value.clamp(lo, hi)
    }
}
