//! Tiered sensor selection
//!
//! A logical role ("the CPU fan", "the RAM voltage") is resolved by an ordered
//! list of [`Tier`]s. Each tier names where to look ([`Scope`]) and what to
//! accept ([`SensorQuery`]); the first tier yielding a sensor wins. An empty
//! result is an expected capability gap, not an error.

use crate::hardware::{self, Hardware, SensorHandle, SensorType};
use log::debug;

/// Where a tier looks for sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The monitored device's own node
    Own,
    /// The mainboard node itself
    Board,
    /// Direct sub-nodes of the mainboard (Super I/O chips)
    BoardSub,
    /// The mainboard node followed by its sub-nodes
    BoardAll,
}

/// Name filter applied to raw sensor names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Any,
    Contains(&'static str),
    Excludes(&'static str),
    Exactly(&'static str),
}

impl NameMatch {
    fn accepts(&self, name: &str) -> bool {
        match self {
            NameMatch::Any => true,
            NameMatch::Contains(needle) => name.contains(needle),
            NameMatch::Excludes(needle) => !name.contains(needle),
            NameMatch::Exactly(expected) => name == *expected,
        }
    }
}

/// Predicate over raw sensors: class, optional name filter, optional index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorQuery {
    pub sensor_type: SensorType,
    pub name: NameMatch,
    pub index: Option<u32>,
}

impl SensorQuery {
    /// Any sensor of the given class
    pub fn of(sensor_type: SensorType) -> Self {
        Self {
            sensor_type,
            name: NameMatch::Any,
            index: None,
        }
    }

    pub fn named(mut self, needle: &'static str) -> Self {
        self.name = NameMatch::Contains(needle);
        self
    }

    pub fn excluding(mut self, needle: &'static str) -> Self {
        self.name = NameMatch::Excludes(needle);
        self
    }

    pub fn exactly(mut self, name: &'static str) -> Self {
        self.name = NameMatch::Exactly(name);
        self
    }

    pub fn at(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn matches(&self, sensor: &SensorHandle) -> bool {
        sensor.sensor_type() == self.sensor_type
            && self.index.map_or(true, |i| sensor.index() == i)
            && self.name.accepts(sensor.name())
    }
}

/// One step of a fallback search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub scope: Scope,
    pub query: SensorQuery,
}

impl Tier {
    pub fn new(scope: Scope, query: SensorQuery) -> Self {
        Self { scope, query }
    }

    pub fn own(query: SensorQuery) -> Self {
        Self::new(Scope::Own, query)
    }

    pub fn board(query: SensorQuery) -> Self {
        Self::new(Scope::Board, query)
    }

    pub fn board_sub(query: SensorQuery) -> Self {
        Self::new(Scope::BoardSub, query)
    }

    pub fn board_all(query: SensorQuery) -> Self {
        Self::new(Scope::BoardAll, query)
    }
}

/// The nodes a monitor may search: its own node and, optionally, the board
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    own: &'a dyn Hardware,
    board: Option<&'a dyn Hardware>,
}

impl<'a> SearchContext<'a> {
    pub fn new(own: &'a dyn Hardware, board: Option<&'a dyn Hardware>) -> Self {
        Self { own, board }
    }

    pub fn own(&self) -> &'a dyn Hardware {
        self.own
    }

    pub fn board(&self) -> Option<&'a dyn Hardware> {
        self.board
    }

    /// Sensors visible in a scope, in enumeration order
    pub fn sensors_in(&self, scope: Scope) -> Vec<SensorHandle> {
        match (scope, self.board) {
            (Scope::Own, _) => self.own.sensors(),
            (Scope::Board, Some(board)) => board.sensors(),
            (Scope::BoardSub, Some(board)) => hardware::sub_hardware_sensors(board),
            (Scope::BoardAll, Some(board)) => {
                let mut sensors = board.sensors();
                sensors.extend(hardware::sub_hardware_sensors(board));
                sensors
            }
            (_, None) => Vec::new(),
        }
    }

    /// Every sensor a tier accepts
    pub fn all(&self, tier: &Tier) -> Vec<SensorHandle> {
        self.sensors_in(tier.scope)
            .into_iter()
            .filter(|s| tier.query.matches(s))
            .collect()
    }

    /// First sensor a tier accepts
    pub fn first(&self, tier: &Tier) -> Option<SensorHandle> {
        self.sensors_in(tier.scope)
            .into_iter()
            .find(|s| tier.query.matches(s))
    }

    /// Evaluate tiers in order and return the first match
    pub fn select(&self, role: &str, tiers: &[Tier]) -> Option<SensorHandle> {
        for (position, tier) in tiers.iter().enumerate() {
            if let Some(sensor) = self.first(tier) {
                debug!(
                    "{}: {} resolved by tier {} ({:?}) to '{}'",
                    self.own.name(),
                    role,
                    position,
                    tier.scope,
                    sensor.name()
                );
                return Some(sensor);
            }
        }
        debug!("{}: no sensor for {}", self.own.name(), role);
        None
    }
}

/// Sensors of one class keyed by raw index; later duplicates of an index are
/// ignored
pub fn by_index(sensors: &[SensorHandle]) -> std::collections::BTreeMap<u32, SensorHandle> {
    let mut map = std::collections::BTreeMap::new();
    for sensor in sensors {
        map.entry(sensor.index()).or_insert_with(|| sensor.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::virt::{VirtualHardware, VirtualSensor};
    use crate::hardware::HardwareType;
    use std::sync::Arc;

    fn board() -> VirtualHardware {
        let chip = VirtualHardware::new("NCT6798D", HardwareType::SuperIo)
            .with_sensor(VirtualSensor::new(SensorType::Fan, 0, "Fan #1", Some(700.0)))
            .with_sensor(VirtualSensor::new(SensorType::Fan, 1, "CPU Fan", Some(1100.0)));
        VirtualHardware::new("X570", HardwareType::Mainboard)
            .with_sensor(VirtualSensor::new(SensorType::Voltage, 0, "+12V", Some(12.1)))
            .with_sub_hardware(Arc::new(chip))
    }

    #[test]
    fn test_query_matching() {
        let sensor: SensorHandle =
            Arc::new(VirtualSensor::new(SensorType::Clock, 2, "CPU Core #2", Some(3000.0)));
        assert!(SensorQuery::of(SensorType::Clock).matches(&sensor));
        assert!(SensorQuery::of(SensorType::Clock).named("CPU").at(2).matches(&sensor));
        assert!(!SensorQuery::of(SensorType::Clock).at(1).matches(&sensor));
        assert!(!SensorQuery::of(SensorType::Load).matches(&sensor));
        assert!(!SensorQuery::of(SensorType::Clock).excluding("Core").matches(&sensor));
        assert!(!SensorQuery::of(SensorType::Clock).exactly("CPU Core").matches(&sensor));
    }

    #[test]
    fn test_scopes() {
        let board = board();
        let own = VirtualHardware::new("CPU", HardwareType::Cpu);
        let ctx = SearchContext::new(&own, Some(&board));

        assert_eq!(ctx.sensors_in(Scope::Own).len(), 0);
        assert_eq!(ctx.sensors_in(Scope::Board).len(), 1);
        assert_eq!(ctx.sensors_in(Scope::BoardSub).len(), 2);
        assert_eq!(ctx.sensors_in(Scope::BoardAll).len(), 3);

        let no_board = SearchContext::new(&own, None);
        assert!(no_board.sensors_in(Scope::BoardAll).is_empty());
    }

    #[test]
    fn test_first_tier_wins() {
        let board = board();
        let own = VirtualHardware::new("CPU", HardwareType::Cpu)
            .with_sensor(VirtualSensor::new(SensorType::Fan, 0, "Fan", Some(500.0)));
        let ctx = SearchContext::new(&own, Some(&board));

        let tiers = [
            Tier::board(SensorQuery::of(SensorType::Fan).named("CPU")),
            Tier::board_sub(SensorQuery::of(SensorType::Fan).named("CPU")),
            Tier::own(SensorQuery::of(SensorType::Fan)),
        ];
        let fan = ctx.select("fan", &tiers).unwrap();
        assert_eq!(fan.name(), "CPU Fan");

        // dropping the name-filtered tiers falls through to the own node
        let fan = ctx.select("fan", &tiers[2..]).unwrap();
        assert_eq!(fan.name(), "Fan");

        assert!(ctx
            .select("voltage", &[Tier::own(SensorQuery::of(SensorType::Voltage))])
            .is_none());
    }

    #[test]
    fn test_by_index_keeps_first_duplicate() {
        let sensors: Vec<SensorHandle> = vec![
            Arc::new(VirtualSensor::new(SensorType::Load, 2, "a", None)),
            Arc::new(VirtualSensor::new(SensorType::Load, 0, "b", None)),
            Arc::new(VirtualSensor::new(SensorType::Load, 2, "c", None)),
        ];
        let map = by_index(&sensors);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&2].name(), "a");
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    }
}
