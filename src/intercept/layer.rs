//! Architectural call boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A layer the interceptor chain wraps, outermost first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Auth = 0,
    Router = 1,
    Service = 2,
    Database = 3,
}

impl Layer {
    /// Every layer in chain order.
    pub const ALL: [Layer; 4] = [Layer::Auth, Layer::Router, Layer::Service, Layer::Database];

    pub fn from_u8(val: u8) -> Option<Layer> {
        match val {
            0 => Some(Layer::Auth),
            1 => Some(Layer::Router),
            2 => Some(Layer::Service),
            3 => Some(Layer::Database),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Auth => "auth",
            Layer::Router => "router",
            Layer::Service => "service",
            Layer::Database => "database",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(Layer::from_u8(layer as u8), Some(layer));
        }
        assert_eq!(Layer::from_u8(u8::MAX), None);
    }

    #[test]
    fn test_chain_order() {
        let mut sorted = Layer::ALL;
        sorted.sort();
        assert_eq!(sorted, Layer::ALL);
        assert_eq!(serde_json::to_string(&Layer::Database).unwrap(), "\"database\"");
    }
}
