pub trait FloatExt: Copy {
    fn approximately_eq_within(self, other: Self, tolerance: Self) -> bool;

    fn approximately_eq(self, other: Self) -> bool;
}

impl FloatExt for f32 {
    fn approximately_eq_within(self, other: Self, tolerance: Self) -> bool {
        (self - other).abs() <= tolerance
    }

    fn approximately_eq(self, other: Self) -> bool {
        // f32 cannot resolve 1e-9 around unit values
        self.approximately_eq_within(other, 1e-6)
    }
}

impl FloatExt for f64 {
    fn approximately_eq_within(self, other: Self, tolerance: Self) -> bool {
        (self - other).abs() <= tolerance
    }

    fn approximately_eq(self, other: Self) -> bool {
        self.approximately_eq_within(other, crate::EPSILON)
    }
}
