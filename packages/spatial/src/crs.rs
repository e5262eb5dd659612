//! Coordinate reference systems used by the saltwater sources.
//!
//! Only the handful of systems the upstream data actually arrives in are
//! supported. Every conversion goes through geographic longitude/latitude
//! on the GRS80 ellipsoid; the NAD83/WGS84 datum difference (about a meter
//! in California) is ignored.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use geo::{Coord, MapCoords};

use crate::ProjectionError;

/// GRS80 semi-major axis in meters.
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// GRS80 inverse flattening.
const INVERSE_FLATTENING: f64 = 298.257_222_101;

/// Latitude limit of the Web Mercator square.
const MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A supported coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    /// EPSG:4326, geographic longitude/latitude in degrees.
    Wgs84,
    /// EPSG:3857, spherical Web Mercator in meters.
    WebMercator,
    /// EPSG:3310, NAD83 / California Albers in meters.
    CaliforniaAlbers,
    /// EPSG:5070, NAD83 / Conus Albers in meters.
    ConusAlbers,
}

impl Crs {
    /// Resolves an EPSG (or Esri WKID) code.
    ///
    /// NAD83 geographic (4269) is treated as WGS84, and the legacy Esri
    /// Web Mercator WKIDs (102100, 102113, 900913) as EPSG:3857.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::UnsupportedEpsg`] for any other code.
    pub const fn from_epsg(code: u32) -> Result<Self, ProjectionError> {
        match code {
            4326 | 4269 => Ok(Self::Wgs84),
            3857 | 102_100 | 102_113 | 900_913 => Ok(Self::WebMercator),
            3310 => Ok(Self::CaliforniaAlbers),
            5070 => Ok(Self::ConusAlbers),
            _ => Err(ProjectionError::UnsupportedEpsg(code)),
        }
    }

    /// Returns the canonical EPSG code.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
            Self::WebMercator => 3857,
            Self::CaliforniaAlbers => 3310,
            Self::ConusAlbers => 5070,
        }
    }

    /// Returns `true` for projected systems whose units are meters.
    #[must_use]
    pub const fn is_projected(self) -> bool {
        !matches!(self, Self::Wgs84)
    }

    fn projector(self) -> Projector {
        match self {
            Self::Wgs84 => Projector::Geographic,
            Self::WebMercator => Projector::WebMercator,
            Self::CaliforniaAlbers => Projector::Albers(Albers::new(&AlbersParams {
                lat1: 34.0,
                lat2: 40.5,
                lat0: 0.0,
                lon0: -120.0,
                false_easting: 0.0,
                false_northing: -4_000_000.0,
            })),
            Self::ConusAlbers => Projector::Albers(Albers::new(&AlbersParams {
                lat1: 29.5,
                lat2: 45.5,
                lat0: 23.0,
                lon0: -96.0,
                false_easting: 0.0,
                false_northing: 0.0,
            })),
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Albers equal-area conic defining parameters, in degrees and meters.
struct AlbersParams {
    lat1: f64,
    lat2: f64,
    lat0: f64,
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
}

/// Ellipsoidal Albers equal-area conic with precomputed constants.
#[derive(Debug, Clone, Copy)]
struct Albers {
    e: f64,
    e2: f64,
    n: f64,
    c: f64,
    rho0: f64,
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl Albers {
    fn new(params: &AlbersParams) -> Self {
        let e2 = (2.0 - 1.0 / INVERSE_FLATTENING) / INVERSE_FLATTENING;
        let e = e2.sqrt();

        let phi1 = params.lat1.to_radians();
        let phi2 = params.lat2.to_radians();
        let phi0 = params.lat0.to_radians();

        let m1 = m(phi1, e2);
        let m2 = m(phi2, e2);
        let q0 = q(phi0, e, e2);
        let q1 = q(phi1, e, e2);
        let q2 = q(phi2, e, e2);

        let n = if (phi1 - phi2).abs() > f64::EPSILON {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        } else {
            phi1.sin()
        };
        let c = n.mul_add(q1, m1 * m1);
        let rho0 = SEMI_MAJOR_AXIS * n.mul_add(-q0, c).sqrt() / n;

        Self {
            e,
            e2,
            n,
            c,
            rho0,
            lon0: params.lon0.to_radians(),
            false_easting: params.false_easting,
            false_northing: params.false_northing,
        }
    }

    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let phi = lat.to_radians();
        let rho = SEMI_MAJOR_AXIS * self.n.mul_add(-q(phi, self.e, self.e2), self.c).sqrt() / self.n;
        let theta = self.n * normalize_radians(lon.to_radians() - self.lon0);

        (
            rho.mul_add(theta.sin(), self.false_easting),
            rho.mul_add(-theta.cos(), self.false_northing + self.rho0),
        )
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.false_easting;
        let dy = self.rho0 - (y - self.false_northing);

        let (rho, theta) = if self.n >= 0.0 {
            (dx.hypot(dy), dx.atan2(dy))
        } else {
            (-dx.hypot(dy), (-dx).atan2(-dy))
        };

        let rho_n = rho * self.n / SEMI_MAJOR_AXIS;
        let q_value = rho_n.mul_add(-rho_n, self.c) / self.n;
        let phi = self.latitude_from_q(q_value);
        let lambda = self.lon0 + theta / self.n;

        (normalize_radians(lambda).to_degrees(), phi.to_degrees())
    }

    /// Iteratively solves `q(phi) = q_value` for `phi`.
    fn latitude_from_q(&self, q_value: f64) -> f64 {
        let pole_q = q(FRAC_PI_2, self.e, self.e2);
        if q_value.abs() >= pole_q {
            return FRAC_PI_2.copysign(q_value);
        }

        let mut phi = (q_value / 2.0).clamp(-1.0, 1.0).asin();
        for _ in 0..16 {
            let sin_phi = phi.sin();
            let es = self.e * sin_phi;
            let one_minus = es.mul_add(-es, 1.0);
            let delta = one_minus * one_minus / (2.0 * phi.cos())
                * (q_value / (1.0 - self.e2) - sin_phi / one_minus
                    + (1.0 / (2.0 * self.e)) * ((1.0 - es) / (1.0 + es)).ln());
            phi += delta;
            if delta.abs() < 1e-12 {
                break;
            }
        }
        phi
    }
}

/// Authalic `q` function of the Albers projection.
fn q(phi: f64, e: f64, e2: f64) -> f64 {
    let sin_phi = phi.sin();
    let es = e * sin_phi;
    (1.0 - e2) * (sin_phi / es.mul_add(-es, 1.0) - (1.0 / (2.0 * e)) * ((1.0 - es) / (1.0 + es)).ln())
}

/// Albers `m` function (parallel radius scale).
fn m(phi: f64, e2: f64) -> f64 {
    let sin_phi = phi.sin();
    phi.cos() / (e2 * sin_phi).mul_add(-sin_phi, 1.0).sqrt()
}

fn normalize_radians(angle: f64) -> f64 {
    if angle.abs() <= PI {
        angle
    } else {
        (angle + PI).rem_euclid(2.0 * PI) - PI
    }
}

#[derive(Debug, Clone, Copy)]
enum Projector {
    Geographic,
    WebMercator,
    Albers(Albers),
}

impl Projector {
    fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::Geographic => (x, y),
            Self::WebMercator => (
                (x / SEMI_MAJOR_AXIS).to_degrees(),
                2.0f64
                    .mul_add((y / SEMI_MAJOR_AXIS).exp().atan(), -FRAC_PI_2)
                    .to_degrees(),
            ),
            Self::Albers(albers) => albers.inverse(x, y),
        }
    }

    fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Self::Geographic => (lon, lat),
            Self::WebMercator => {
                let lat = lat.clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE);
                (
                    SEMI_MAJOR_AXIS * lon.to_radians(),
                    SEMI_MAJOR_AXIS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
                )
            }
            Self::Albers(albers) => albers.forward(lon, lat),
        }
    }
}

/// A coordinate transformation between two [`Crs`]s.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    source: Crs,
    target: Crs,
    from: Projector,
    to: Projector,
}

impl Transform {
    /// Builds the transformation from `source` to `target`.
    #[must_use]
    pub fn new(source: Crs, target: Crs) -> Self {
        Self {
            source,
            target,
            from: source.projector(),
            to: target.projector(),
        }
    }

    /// Transforms a single coordinate.
    #[must_use]
    pub fn coord(&self, coord: Coord<f64>) -> Coord<f64> {
        if self.source == self.target {
            return coord;
        }
        let (lon, lat) = self.from.to_geographic(coord.x, coord.y);
        let (x, y) = self.to.from_geographic(lon, lat);
        Coord { x, y }
    }

    /// Transforms every coordinate of `geometry`.
    #[must_use]
    pub fn apply<G>(&self, geometry: &G) -> G::Output
    where
        G: MapCoords<f64, f64>,
    {
        geometry.map_coords(|c| self.coord(c))
    }
}
