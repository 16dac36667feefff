use super::Vec3;

/// Row-major 3x3 matrix, used for sphere rotations.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat3 {
    pub m: [[f64; 3]; 3],
}

impl Mat3 {
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn rotation_x(angle_rad: f64) -> Self {
        let (s, c) = angle_rad.sin_cos();
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        }
    }

    pub fn rotation_y(angle_rad: f64) -> Self {
        let (s, c) = angle_rad.sin_cos();
        Self {
            m: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    pub fn rotation_z(angle_rad: f64) -> Self {
        let (s, c) = angle_rad.sin_cos();
        Self {
            m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// `self * rhs`: applying the product applies `rhs` first.
    pub fn mul(&self, rhs: &Mat3) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        Mat3 { m: out }
    }

    /// Inverse of an orthonormal matrix.
    pub fn transpose(&self) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.m[j][i];
            }
        }
        Mat3 { m: out }
    }

    pub fn apply(&self, v: Vec3) -> Vec3 {
        let r = &self.m;
        Vec3::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Mat3;
    use crate::math::Vec3;

    fn assert_vec_close(a: Vec3, b: Vec3, eps: f64) {
        let d = (a - b).length();
        assert!(d <= eps, "expected {a:?} ~= {b:?} (diff {d})");
    }

    #[test]
    fn rotation_z_quarter_turn_maps_x_to_y() {
        let r = Mat3::rotation_z(std::f64::consts::FRAC_PI_2);
        assert_vec_close(r.apply(Vec3::new(1.0, 0.0, 0.0)), Vec3::new(0.0, 1.0, 0.0), 1e-12);
    }

    #[test]
    fn transpose_inverts_composed_rotation() {
        let r = Mat3::rotation_x(0.3).mul(&Mat3::rotation_y(-1.1));
        let v = Vec3::new(0.2, -0.5, 0.84);
        assert_vec_close(r.transpose().apply(r.apply(v)), v, 1e-12);
    }

    #[test]
    fn product_applies_right_operand_first() {
        let rx = Mat3::rotation_x(0.7);
        let ry = Mat3::rotation_y(0.4);
        let v = Vec3::new(0.0, 0.0, 1.0);
        assert_vec_close(rx.mul(&ry).apply(v), rx.apply(ry.apply(v)), 1e-12);
    }
}
