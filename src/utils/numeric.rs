use bigdecimal::{BigDecimal, ToPrimitive};

/// Numeric coercion that never fails and never produces NaN or infinity.
///
/// Anything that cannot be represented as a finite `f64` (empty strings,
/// `"NaN"`, `None`, infinities, unparseable text) maps to `None`, which is
/// serialized as `null`. Callers use `None` to mean "unavailable", never zero.
pub trait SafeCast {
    fn safe_f64(&self) -> Option<f64>;
}

impl SafeCast for f64 {
    fn safe_f64(&self) -> Option<f64> {
        self.is_finite().then_some(*self)
    }
}

impl SafeCast for f32 {
    fn safe_f64(&self) -> Option<f64> {
        f64::from(*self).safe_f64()
    }
}

impl SafeCast for i32 {
    fn safe_f64(&self) -> Option<f64> {
        Some(f64::from(*self))
    }
}

impl SafeCast for i64 {
    fn safe_f64(&self) -> Option<f64> {
        (*self as f64).safe_f64()
    }
}

impl SafeCast for str {
    fn safe_f64(&self) -> Option<f64> {
        // Thousands separators show up in hand-maintained fundamentals feeds
        let cleaned: String = self.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return None;
        }
        cleaned.parse::<f64>().ok().and_then(|v| v.safe_f64())
    }
}

impl SafeCast for String {
    fn safe_f64(&self) -> Option<f64> {
        self.as_str().safe_f64()
    }
}

impl SafeCast for BigDecimal {
    fn safe_f64(&self) -> Option<f64> {
        self.to_f64().and_then(|v| v.safe_f64())
    }
}

impl<T: SafeCast> SafeCast for Option<T> {
    fn safe_f64(&self) -> Option<f64> {
        self.as_ref().and_then(|v| v.safe_f64())
    }
}

impl<T: SafeCast + ?Sized> SafeCast for &T {
    fn safe_f64(&self) -> Option<f64> {
        (**self).safe_f64()
    }
}

/// Re-apply the safe cast to an already-optional float.
///
/// Used on every field of an outgoing row so that a computation producing a
/// non-finite value can never leak it into the response.
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.safe_f64()
}
