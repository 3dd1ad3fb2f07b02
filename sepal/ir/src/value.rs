/// Bit-level annotation carried by every port and bus: width, signedness,
/// and the compile-time constant value when one is known. Values are locked
/// by constant propagation before scheduling runs; the pipelining engine
/// only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Value {
    width: u32,
    signed: bool,
    constant: Option<u64>,
}

impl Value {
    pub fn new(width: u32, signed: bool) -> Self {
        Self {
            width,
            signed,
            constant: None,
        }
    }

    /// A value fixed at compile time. Constant-driven edges are exempt from
    /// pipelining.
    pub fn constant(width: u32, signed: bool, value: u64) -> Self {
        Self {
            width,
            signed,
            constant: Some(value),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    pub fn constant_value(&self) -> Option<u64> {
        self.constant
    }

    /// The same size and signedness with any constant annotation dropped.
    /// Used when sizing a freshly inserted register from its consumer.
    pub fn shape(&self) -> Self {
        Self::new(self.width, self.signed)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::new(1, false)
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn shape_drops_constant() {
        let v = Value::constant(8, true, 42);
        assert!(v.is_constant());
        assert_eq!(v.constant_value(), Some(42));
        let s = v.shape();
        assert!(!s.is_constant());
        assert_eq!(s.constant_value(), None);
        assert_eq!(s.width(), 8);
        assert!(s.is_signed());
    }
}
