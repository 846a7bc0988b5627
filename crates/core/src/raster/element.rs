//! Cell value types

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Every sample type a GeoTIFF can carry is convertible to `f64`, which is
/// what the zonal statistics work in.
pub trait RasterElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Value used when a source sample cannot be represented in this type
    fn fallback_nodata() -> Self;

    /// Whether this value is no-data, given the raster's declared no-data value
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64, `None` when out of range
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn fallback_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn fallback_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0),
                    None => false,
                }
            }
        }
    )*};
}

impl_int_element!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_float_element!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_always_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(f32::NAN.is_nodata(Some(-9999.0)));
    }

    #[test]
    fn declared_nodata_matches() {
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
        assert!(!(1.0_f64).is_nodata(Some(-9999.0)));
        assert!(255_u8.is_nodata(Some(255)));
        assert!(!0_u8.is_nodata(None));
    }

    #[test]
    fn f64_conversion_rejects_out_of_range() {
        assert_eq!(<u8 as RasterElement>::from_f64(300.0), None);
        assert_eq!(<i16 as RasterElement>::from_f64(-12.0), Some(-12));
    }
}
