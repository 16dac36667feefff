/// Screen-space axis-aligned bounding box (y down: `min` is top-left).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn from_origin_size(left: f64, top: f64, width: f64, height: f64) -> Self {
        Aabb2::new([left, top], [left + width, top + height])
    }

    pub fn left(&self) -> f64 {
        self.min[0]
    }

    pub fn top(&self) -> f64 {
        self.min[1]
    }

    pub fn right(&self) -> f64 {
        self.max[0]
    }

    pub fn bottom(&self) -> f64 {
        self.max[1]
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    /// Strict overlap; boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &Aabb2) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.left() && x <= self.right() && y >= self.top() && y <= self.bottom()
    }

    /// Grow by CSS-ordered padding `[top, right, bottom, left]`.
    pub fn padded(&self, padding: [f64; 4]) -> Aabb2 {
        let [top, right, bottom, left] = padding;
        Aabb2::new(
            [self.min[0] - left, self.min[1] - top],
            [self.max[0] + right, self.max[1] + bottom],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb2;

    #[test]
    fn edge_touching_boxes_do_not_intersect() {
        let a = Aabb2::from_origin_size(0.0, 0.0, 10.0, 10.0);
        let b = Aabb2::from_origin_size(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Aabb2::from_origin_size(9.0, 9.0, 5.0, 5.0)));
    }

    #[test]
    fn padding_is_css_ordered() {
        let b = Aabb2::from_origin_size(10.0, 10.0, 4.0, 2.0).padded([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(b, Aabb2::new([6.0, 9.0], [16.0, 15.0]));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 6.0);
    }

    #[test]
    fn contains_point_is_inclusive() {
        let b = Aabb2::from_origin_size(0.0, 0.0, 2.0, 2.0);
        assert!(b.contains_point(2.0, 0.0));
        assert!(!b.contains_point(2.1, 0.0));
    }
}
