//! Camera (C7): double-precision MVP, screen<->world ray-plane intersection,
//! pan/zoom-at-anchor.

use glam::{DMat4, DVec3, DVec4};

use crate::tile::TileBounds;

/// Double-precision camera state. All math happens in `f64`; downcast to
/// `f32` only at the point of GPU upload (see [`CameraUniform`]), per the
/// numerical policy: absolute mercator baked into a float matrix causes
/// vertex jitter at high zoom.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    /// Mercator center, x in `[0,1]`.
    pub mx: f64,
    /// Mercator center, y in `[0,1]`.
    pub my: f64,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Degrees, normalized to `[0, 360)`.
    pub bearing: f64,
    /// Degrees, clamped to `[0, 60]`.
    pub pitch: f64,
    pub viewport_w: f64,
    pub viewport_h: f64,
    near: f64,
    far_multiplier: f64,
    fov_degrees: f64,
}

/// GPU-upload-ready camera uniform (downcast float companion).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl Camera {
    pub fn new(mx: f64, my: f64, zoom: f64, viewport_w: f64, viewport_h: f64) -> Self {
        Self {
            mx,
            my,
            zoom,
            min_zoom: 0.0,
            max_zoom: 22.0,
            bearing: 0.0,
            pitch: 0.0,
            viewport_w,
            viewport_h,
            near: 0.1,
            far_multiplier: 100.0,
            fov_degrees: 60.0,
        }
    }

    /// `world_size = 512 * 2^zoom`, the mercator-to-pixel scale at the
    /// current zoom.
    pub fn world_size(&self) -> f64 {
        512.0 * 2f64.powf(self.zoom)
    }

    /// Altitude chosen so screen pixel scale matches mercator pixel scale
    /// (1:1) at the current zoom.
    fn altitude(&self) -> f64 {
        (self.viewport_h / 2.0) / (30f64.to_radians()).tan()
    }

    /// `pan(dx_pixels, dy_pixels)`: drag-down moves the camera up (mercator
    /// my decreases).
    pub fn pan(&mut self, dx_pixels: f64, dy_pixels: f64) {
        let world_size = self.world_size();
        self.mx -= dx_pixels / world_size;
        self.my -= dy_pixels / world_size;
    }

    /// Zoom-at-anchor: the world point under `(sx, sy)` is invariant across
    /// the zoom change.
    pub fn zoom_at(&mut self, delta: f64, sx: f64, sy: f64) {
        let before = self.screen_to_world(sx, sy);
        let clamped_zoom = (self.zoom + delta).clamp(self.min_zoom, self.max_zoom);
        if clamped_zoom == self.zoom {
            return;
        }
        self.zoom = clamped_zoom;
        let (bx, by) = match before {
            Some((x, y)) => (x, y),
            None => return,
        };
        let after = self.screen_to_world(sx, sy);
        if let Some((ax, ay)) = after {
            self.mx += bx - ax;
            self.my += by - ay;
        }
    }

    /// World transform: `translate(-mx,-my,0) * scale(world_size, -world_size, 1)`.
    /// The Y-flip accounts for mercator-y-down vs GL-y-up.
    fn world_matrix(&self) -> DMat4 {
        let world_size = self.world_size();
        DMat4::from_scale(DVec3::new(world_size, -world_size, 1.0))
            * DMat4::from_translation(DVec3::new(-self.mx, -self.my, 0.0))
    }

    /// View transform. Spec's row-vector formula `translate * rotate_x(-pitch)
    /// * rotate_z(bearing)` applies translate first; `glam::DMat4` composes in
    /// column-vector convention (the rightmost factor applies first), so the
    /// factor order here is reversed from the spec's written formula to match.
    fn view_matrix(&self) -> DMat4 {
        let altitude = self.altitude();
        DMat4::from_translation(DVec3::new(0.0, 0.0, -altitude))
            * DMat4::from_rotation_x(-self.pitch.to_radians())
            * DMat4::from_rotation_z(self.bearing.to_radians())
    }

    fn projection_matrix(&self) -> DMat4 {
        let altitude = self.altitude();
        let aspect = self.viewport_w / self.viewport_h;
        DMat4::perspective_rh(
            self.fov_degrees.to_radians(),
            aspect,
            self.near,
            self.far_multiplier * altitude,
        )
    }

    /// `M = World * View * Projection` (double precision).
    pub fn view_projection_matrix(&self) -> DMat4 {
        self.projection_matrix() * self.view_matrix() * self.world_matrix()
    }

    /// `f32` downcast companion, for GPU upload only.
    pub fn uniform(&self) -> CameraUniform {
        let m = self.view_projection_matrix();
        CameraUniform {
            view_proj: m.as_mat4().to_cols_array_2d(),
        }
    }

    /// `View * Projection`, deliberately excluding the `World` transform.
    /// The layer batcher applies `World` itself, per-tile, in double
    /// precision (see [`Camera::tile_transform`]) before handing off
    /// already-camera-relative `f32` vertices for this matrix to consume --
    /// this is the mechanism behind keeping absolute mercator out of any
    /// float matrix.
    pub fn view_projection_no_world(&self) -> DMat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Computes the camera-relative offset and scale for a tile's local
    /// `[0,1]` vertex space, downcasting to `f32` only here -- the one place
    /// absolute mercator is allowed to become a float, since the subtraction
    /// against the camera center has already removed the large common
    /// component.
    pub fn tile_transform(&self, tile_origin_mx: f64, tile_origin_my: f64, tile_size: f64) -> TileTransform {
        let world_size = self.world_size();
        let offset_x = (tile_origin_mx - self.mx) * world_size;
        let offset_y = (tile_origin_my - self.my) * -world_size;
        let scale = tile_size * world_size;
        TileTransform {
            offset: [offset_x as f32, offset_y as f32],
            scale: scale as f32,
        }
    }

    /// Double-precision ray-plane intersection: unproject the near/far clip
    /// points under `(sx, sy)` and intersect the ray with the `z=0` plane.
    /// Degenerate rays (parallel to the plane) return the camera center.
    pub fn screen_to_world(&self, sx: f64, sy: f64) -> Option<(f64, f64)> {
        let nx = (2.0 * sx) / self.viewport_w - 1.0;
        let ny = 1.0 - (2.0 * sy) / self.viewport_h;

        let inv = self.view_projection_matrix().inverse();
        let near = unproject(&inv, nx, ny, -1.0);
        let far = unproject(&inv, nx, ny, 1.0);

        let (near, far) = match (near, far) {
            (Some(n), Some(f)) => (n, f),
            _ => return Some((self.mx, self.my)),
        };

        let dir = far - near;
        if dir.z.abs() < 1e-12 {
            return Some((self.mx, self.my));
        }
        let t = -near.z / dir.z;
        let hit = near + dir * t;
        Some((hit.x, hit.y))
    }

    /// `world_to_screen`, for label projection. Returns `None` (off-screen
    /// sentinel) when the homogeneous `w` is near zero or the point is
    /// behind the camera.
    pub fn world_to_screen(&self, mx: f64, my: f64) -> Option<(f64, f64)> {
        let m = self.view_projection_matrix();
        let clip = m * DVec4::new(mx, my, 0.0, 1.0);
        if clip.w.abs() < 1e-9 || clip.w < 0.0 {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let sx = (ndc_x + 1.0) * 0.5 * self.viewport_w;
        let sy = (1.0 - ndc_y) * 0.5 * self.viewport_h;
        Some((sx, sy))
    }

    /// Approximate lng/lat rectangle enclosing the on-screen footprint, used
    /// to drive tile planning. The true visible footprint is a trapezoid at
    /// high pitch; this computes the axis-aligned hull of all four
    /// unprojected viewport corners, which over-approximates rather than
    /// risk excluding a tile.
    pub fn bounds(&self) -> TileBounds {
        let corners = [
            self.screen_to_world(0.0, 0.0),
            self.screen_to_world(self.viewport_w, 0.0),
            self.screen_to_world(self.viewport_w, self.viewport_h),
            self.screen_to_world(0.0, self.viewport_h),
        ];

        let mut min_mx = f64::MAX;
        let mut max_mx = f64::MIN;
        let mut min_my = f64::MAX;
        let mut max_my = f64::MIN;
        for c in corners.into_iter().flatten() {
            min_mx = min_mx.min(c.0);
            max_mx = max_mx.max(c.0);
            min_my = min_my.min(c.1);
            max_my = max_my.max(c.1);
        }

        let (min_lng, max_lat) = crate::mercator::to_lnglat(min_mx.clamp(0.0, 1.0), min_my.clamp(0.0, 1.0));
        let (max_lng, min_lat) = crate::mercator::to_lnglat(max_mx.clamp(0.0, 1.0), max_my.clamp(0.0, 1.0));

        TileBounds {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Sets bearing, normalizing to `[0, 360)`.
    pub fn set_bearing(&mut self, bearing: f64) {
        let b = bearing % 360.0;
        self.bearing = if b < 0.0 { b + 360.0 } else { b };
    }

    /// Sets pitch, clamping to `[0, 60]` (strictly less than 90 per spec).
    pub fn set_pitch(&mut self, pitch: f64) {
        self.pitch = pitch.clamp(0.0, 60.0);
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn resize(&mut self, w: f64, h: f64) {
        self.viewport_w = w;
        self.viewport_h = h;
    }
}

/// Camera-relative transform for one tile's local `[0,1]` vertex space.
#[derive(Debug, Clone, Copy)]
pub struct TileTransform {
    pub offset: [f32; 2],
    pub scale: f32,
}

impl TileTransform {
    /// Maps a tile-local `(u, v)` vertex into camera-relative, Y-flip-applied
    /// world-pixel space.
    pub fn apply(&self, u: f32, v: f32) -> [f32; 2] {
        [
            self.offset[0] + u * self.scale,
            self.offset[1] - v * self.scale,
        ]
    }
}

fn unproject(inv: &DMat4, nx: f64, ny: f64, nz: f64) -> Option<DVec3> {
    let clip = DVec4::new(nx, ny, nz, 1.0);
    let world = *inv * clip;
    if world.w.abs() < 1e-12 {
        return None;
    }
    Some(DVec3::new(world.x / world.w, world.y / world.w, world.z / world.w))
}
