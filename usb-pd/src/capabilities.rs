//! Source capability store and request builder

use {
    crate::{
        message::MAX_DATA_OBJECTS,
        pdo::{FixedSupply, FixedVariableRequestDataObject, PowerDataObject},
    },
    heapless::Vec,
};

/// Lowest current ever requested, in 10mA units
const REQUEST_FLOOR: u16 = 10;

/// How a PDO is picked out of the advertised list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelectionPolicy {
    /// First advertised fixed supply
    #[default]
    FirstFixed,
    /// Fixed supply with the highest voltage × current product, earliest on ties
    MaximumPower,
}

/// A contract as requested from (or granted by) the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Contract {
    pub voltage_mv: u32,
    pub current_ma: u32,
    /// 1-based position of the PDO in the capability list
    pub object_position: u8,
}

/// Most recent Source Capabilities
#[derive(Debug, Clone, Default)]
pub struct PowerCapabilities {
    pdos: Vec<u32, MAX_DATA_OBJECTS>,
    /// 1-based, 0 until a PDO has been selected
    best_index: u8,
}

impl PowerCapabilities {
    pub const fn new() -> Self {
        Self {
            pdos: Vec::new(),
            best_index: 0,
        }
    }

    /// Replaces the stored list, returns the number of PDOs kept
    pub fn store(&mut self, data_objects: &[u32]) -> usize {
        self.clear();

        for raw in data_objects.iter().take(MAX_DATA_OBJECTS) {
            // capacity matches the take() above
            let _ = self.pdos.push(*raw);
        }

        for (i, pdo) in self.iter().enumerate() {
            match pdo {
                PowerDataObject::FixedSupply(fixed) => debug!(
                    "PDO {}: fixed {} mV {} mA",
                    i + 1,
                    fixed.voltage_mv(),
                    fixed.max_current_ma()
                ),
                other => debug!("PDO {}: {:?}", i + 1, other.supply_type()),
            }
        }

        self.pdos.len()
    }

    pub fn clear(&mut self) {
        self.pdos.clear();
        self.best_index = 0;
    }

    pub fn count(&self) -> usize {
        self.pdos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pdos.is_empty()
    }

    pub fn best_index(&self) -> u8 {
        self.best_index
    }

    /// PDO at a 0-based index
    pub fn get(&self, index: usize) -> Option<PowerDataObject> {
        self.pdos.get(index).map(|raw| PowerDataObject::from_raw(*raw))
    }

    pub fn iter(&self) -> impl Iterator<Item = PowerDataObject> + '_ {
        self.pdos.iter().map(|raw| PowerDataObject::from_raw(*raw))
    }

    pub fn raw(&self) -> &[u32] {
        &self.pdos
    }

    /// Voltage (mV) and maximum current (mA) of the fixed supply at a 0-based index
    pub fn fixed_supply(&self, index: usize) -> Option<(u32, u32)> {
        match self.get(index)? {
            PowerDataObject::FixedSupply(fixed) => {
                Some((fixed.voltage_mv(), fixed.max_current_ma()))
            }
            _ => None,
        }
    }

    /// Picks a fixed supply PDO and records its 1-based position
    pub fn select(&mut self, policy: SelectionPolicy) -> Option<u8> {
        let fixed = self.iter().enumerate().filter_map(|(i, pdo)| match pdo {
            PowerDataObject::FixedSupply(fixed) => Some((i, fixed)),
            _ => None,
        });

        let chosen = match policy {
            SelectionPolicy::FirstFixed => fixed.map(|(i, _)| i).next(),
            SelectionPolicy::MaximumPower => fixed
                .fold(None, |best: Option<(usize, u32)>, (i, pdo)| {
                    let power = pdo.power_mw();
                    match best {
                        Some((_, best_power)) if best_power >= power => best,
                        _ => Some((i, power)),
                    }
                })
                .map(|(i, _)| i),
        };

        self.best_index = chosen.map_or(0, |i| i as u8 + 1);
        chosen.map(|_| self.best_index)
    }

    /// Request data object for the selected PDO with the current limited to `ceiling_ma`
    pub fn build_request(
        &self,
        ceiling_ma: u32,
    ) -> Option<(FixedVariableRequestDataObject, Contract)> {
        let position = self.best_index;
        let PowerDataObject::FixedSupply(fixed) = self.get(usize::from(position).checked_sub(1)?)?
        else {
            return None;
        };

        let current = request_current(fixed, ceiling_ma);

        let rdo = FixedVariableRequestDataObject(0)
            .with_object_position(position)
            .with_operating_current(current)
            .with_maximum_operating_current(current)
            .with_no_usb_suspend(true);

        let contract = Contract {
            voltage_mv: fixed.voltage_mv(),
            current_ma: u32::from(current) * 10,
            object_position: position,
        };

        Some((rdo, contract))
    }
}

/// 30% of the advertised maximum, clamped to the ceiling and to the 100mA floor.
/// Returned in 10mA units.
pub fn request_current(pdo: FixedSupply, ceiling_ma: u32) -> u16 {
    let ceiling = (ceiling_ma / 10).min(0x3ff) as u16;

    let current = u32::from(pdo.max_current()) * 3 / 10;
    let current = (current as u16).min(ceiling);

    current.max(REQUEST_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(voltage_mv: u32, current_ma: u32) -> u32 {
        FixedSupply(0)
            .with_voltage((voltage_mv / 50) as u16)
            .with_max_current((current_ma / 10) as u16)
            .0
    }

    const BATTERY: u32 = 0x4000_0000;

    #[test]
    fn thirty_percent_of_advertised() {
        let pdo = FixedSupply(fixed(5000, 3000));
        assert_eq!(request_current(pdo, 1500), 90);
    }

    #[test]
    fn ceiling_and_floor() {
        assert_eq!(request_current(FixedSupply(fixed(9000, 5000)), 1000), 100);
        assert_eq!(request_current(FixedSupply(fixed(5000, 100)), 1500), 10);
        assert_eq!(request_current(FixedSupply(fixed(5000, 300)), 1500), 10);
    }

    #[test]
    fn first_fixed_policy() {
        let mut caps = PowerCapabilities::new();
        assert_eq!(
            caps.store(&[BATTERY, fixed(5000, 3000), fixed(20000, 5000)]),
            3
        );

        assert_eq!(caps.select(SelectionPolicy::FirstFixed), Some(2));
        assert_eq!(caps.best_index(), 2);
    }

    #[test]
    fn maximum_power_policy() {
        let mut caps = PowerCapabilities::new();
        caps.store(&[
            fixed(5000, 3000),
            fixed(9000, 3000),
            fixed(15000, 1800),
            fixed(20000, 1350),
        ]);

        // 27 W from 9 V upwards, the earliest wins
        assert_eq!(caps.select(SelectionPolicy::MaximumPower), Some(2));
    }

    #[test]
    fn single_pdo_selects_first() {
        let mut caps = PowerCapabilities::new();
        caps.store(&[fixed(5000, 3000)]);

        for policy in [SelectionPolicy::FirstFixed, SelectionPolicy::MaximumPower] {
            assert_eq!(caps.select(policy), Some(1));
        }
    }

    #[test]
    fn no_fixed_supply() {
        let mut caps = PowerCapabilities::new();
        caps.store(&[BATTERY]);

        assert_eq!(caps.select(SelectionPolicy::FirstFixed), None);
        assert_eq!(caps.best_index(), 0);
        assert!(caps.build_request(1500).is_none());
        assert_eq!(caps.fixed_supply(0), None);
    }

    #[test]
    fn request_for_selected_pdo() {
        let mut caps = PowerCapabilities::new();
        caps.store(&[fixed(5000, 3000), fixed(9000, 2000)]);
        caps.select(SelectionPolicy::FirstFixed);

        let (rdo, contract) = caps.build_request(1500).unwrap();
        assert_eq!(rdo.object_position(), 1);
        assert_eq!(rdo.operating_current(), 90);
        assert_eq!(rdo.maximum_operating_current(), 90);
        assert!(rdo.no_usb_suspend());
        assert_eq!(
            contract,
            Contract {
                voltage_mv: 5000,
                current_ma: 900,
                object_position: 1
            }
        );
    }

    #[test]
    fn fixed_supply_lookup() {
        let mut caps = PowerCapabilities::new();
        caps.store(&[fixed(5000, 3000), BATTERY]);

        assert_eq!(caps.fixed_supply(0), Some((5000, 3000)));
        assert_eq!(caps.fixed_supply(1), None);
        assert_eq!(caps.fixed_supply(7), None);

        caps.clear();
        assert!(caps.is_empty());
        assert_eq!(caps.fixed_supply(0), None);
    }
}
