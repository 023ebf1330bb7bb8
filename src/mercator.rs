//! Web Mercator projection (C1): bijective lng/lat <-> unit-square mercator.

use std::f64::consts::PI;

/// Latitude beyond which Web Mercator is undefined (the projection's poles).
pub const MAX_LATITUDE: f64 = 85.0511287798066;

/// Convert (lng, lat) in degrees to mercator (mx, my) in `[0, 1]^2`.
///
/// `my` increases southward, matching raster tile-pixel convention. Latitude is
/// clamped to `+/- MAX_LATITUDE` before projecting.
pub fn from_lnglat(lng: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let mx = (lng + 180.0) / 360.0;
    let sin_component = (PI / 4.0 + lat * PI / 360.0).tan();
    let my = (180.0 - (180.0 / PI) * sin_component.ln()) / 360.0;
    (mx, my)
}

/// Inverse of [`from_lnglat`]: mercator (mx, my) back to (lng, lat) in degrees.
pub fn to_lnglat(mx: f64, my: f64) -> (f64, f64) {
    let lng = mx * 360.0 - 180.0;
    let n = PI - 2.0 * PI * my;
    let lat = (180.0 / PI) * (0.5 * (n.exp() - (-n).exp())).atan();
    (lng, lat)
}
