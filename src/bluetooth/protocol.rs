// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command and telemetry text exchanged with the dispenser peripheral.
//!
//! The link itself transports these verbatim; this module only builds
//! outbound orders and recognizes the one telemetry line consumers act on.

use std::fmt;

/// Prefix of the item-count telemetry line.
pub const ULTRASONIC_PREFIX: &str = "ULTRASONIC:";

/// Seconds the conveyor motors run after the servos dispense.
pub const MOTOR_RUN_SECONDS: u32 = 10;

/// Outbound order: one servo segment per non-empty slot plus the motor segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCommand {
    quantities: Vec<u32>,
}

impl OrderCommand {
    /// Build an order from per-slot quantities. Slot `i` drives servo `i + 1`.
    ///
    /// Returns `None` when every slot is empty.
    pub fn from_quantities(quantities: &[u32]) -> Option<Self> {
        if quantities.iter().all(|&q| q == 0) {
            return None;
        }
        Some(Self {
            quantities: quantities.to_vec(),
        })
    }

    /// Total items across all slots.
    pub fn total_items(&self) -> u32 {
        self.quantities.iter().sum()
    }

    /// Encode as the `SERVO<n>:<count>;...MOTORS:10;` wire string.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }
}

impl fmt::Display for OrderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (slot, &count) in self.quantities.iter().enumerate() {
            if count > 0 {
                write!(f, "SERVO{}:{};", slot + 1, count)?;
            }
        }
        write!(f, "MOTORS:{};", MOTOR_RUN_SECONDS)
    }
}

/// Telemetry lines the consumer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Telemetry {
    /// Items detected by the ultrasonic sensor.
    Ultrasonic(u32),
}

impl Telemetry {
    /// Parse from a received line.
    pub fn parse(line: &str) -> Option<Self> {
        let count = line.trim().strip_prefix(ULTRASONIC_PREFIX)?;
        count.trim().parse().ok().map(Self::Ultrasonic)
    }

    /// Whether the detected items cover the whole order.
    pub fn order_ready(&self, order: &OrderCommand) -> bool {
        match self {
            Self::Ultrasonic(detected) => *detected >= order.total_items(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_encoding_skips_empty_slots() {
        let order = OrderCommand::from_quantities(&[2, 0, 1]).unwrap();
        assert_eq!(order.encode(), "SERVO1:2;SERVO3:1;MOTORS:10;");
        assert_eq!(order.total_items(), 3);
        assert_eq!(order.to_bytes(), b"SERVO1:2;SERVO3:1;MOTORS:10;".to_vec());
    }

    #[test]
    fn test_single_slot_order() {
        let order = OrderCommand::from_quantities(&[1, 0, 0]).unwrap();
        assert_eq!(order.encode(), "SERVO1:1;MOTORS:10;");
    }

    #[test]
    fn test_empty_order_is_none() {
        assert!(OrderCommand::from_quantities(&[0, 0, 0]).is_none());
        assert!(OrderCommand::from_quantities(&[]).is_none());
    }

    #[test]
    fn test_telemetry_parse() {
        assert_eq!(Telemetry::parse("ULTRASONIC:3"), Some(Telemetry::Ultrasonic(3)));
        assert_eq!(Telemetry::parse(" ULTRASONIC: 12 \r\n"), Some(Telemetry::Ultrasonic(12)));
        assert_eq!(Telemetry::parse("ULTRASONIC:abc"), None);
        assert_eq!(Telemetry::parse("ULTRASONIC:-1"), None);
        assert_eq!(Telemetry::parse("TEMP:20"), None);
    }

    #[test]
    fn test_order_ready() {
        let order = OrderCommand::from_quantities(&[2, 1, 0]).unwrap();
        assert!(!Telemetry::Ultrasonic(2).order_ready(&order));
        assert!(Telemetry::Ultrasonic(3).order_ready(&order));
        assert!(Telemetry::Ultrasonic(5).order_ready(&order));
    }
}
