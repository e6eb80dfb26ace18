use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphCoord {
    pub pol: f64,
    pub az: f64,
}

impl SphCoord {
    pub fn new(pol: f64, az: f64) -> Self {
        SphCoord { pol, az }
    }

    pub fn from_lonlat_deg(lon: f64, lat: f64) -> Self {
        SphCoord::new((90.0 - lat).to_radians(), lon.to_radians())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3d { x, y, z }
    }

    pub fn from_sph_coord(sph: SphCoord) -> Self {
        let s = sph.pol.sin();
        Vec3d::new(s * sph.az.cos(), s * sph.az.sin(), sph.pol.cos())
    }

    pub fn dot(&self, rhs: &Vec3d) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn to_lonlat(&self) -> (f64, f64) {
        (
            self.y.atan2(self.x).rem_euclid(2.0 * PI),
            self.z.clamp(-1.0, 1.0).asin(),
        )
    }

    pub fn angle_to(&self, rhs: &Vec3d) -> f64 {
        self.dot(rhs).clamp(-1.0, 1.0).acos()
    }
}
