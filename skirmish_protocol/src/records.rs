// Structured payloads carried inside remote messages.
//
// Each record knows how to append itself to a `Packet` and read itself back,
// field for field in the same order. `message.rs` composes these into the
// per-kind packet layouts. Settings and rules records also derive serde so
// the lobby can persist and load them as JSON.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::order::{self, CascadeLevel, OrderKind, OrderPayload};
use crate::packet::Packet;
use crate::types::{EntityId, MAX_TEAM_COUNT};

/// A value with a fixed field layout inside a packet.
pub trait Record: Sized {
    fn write_to(&self, packet: &mut Packet);
    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError>;
}

pub(crate) fn write_records<T: Record>(packet: &mut Packet, items: &[T]) {
    packet.write(u32::try_from(items.len()).unwrap_or(u32::MAX));
    for item in items {
        item.write_to(packet);
    }
}

pub(crate) fn read_records<T: Record>(packet: &mut Packet) -> Result<Vec<T>, DecodeError> {
    let count = packet.read::<u32>()?;
    // Every record is at least one byte; a larger count is corrupt.
    if count as usize > packet.remaining() {
        return Err(DecodeError::Truncated {
            needed: count as usize,
            remaining: packet.remaining(),
        });
    }
    (0..count).map(|_| T::read_from(packet)).collect()
}

// ---------------------------------------------------------------------------
// Team state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResearchTopic {
    pub level: u32,
    pub turns_to_complete: u32,
    pub allocation: i32,
}

impl Record for ResearchTopic {
    fn write_to(&self, packet: &mut Packet) {
        packet.write(self.level);
        packet.write(self.turns_to_complete);
        packet.write(self.allocation);
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        Ok(Self {
            level: packet.read()?,
            turns_to_complete: packet.read()?,
            allocation: packet.read()?,
        })
    }
}

/// Gold, research and name of one team (packet 09).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeamEconomy {
    pub gold: u16,
    pub gold_spent_on_upgrades: u16,
    pub markers: Vec<u16>,
    pub research: Vec<ResearchTopic>,
    pub team_name: String,
}

impl Record for TeamEconomy {
    fn write_to(&self, packet: &mut Packet) {
        packet.write(self.gold);
        packet.write(self.gold_spent_on_upgrades);
        packet.write_vec(&self.markers);
        write_records(packet, &self.research);
        packet.write_str(&self.team_name);
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        Ok(Self {
            gold: packet.read()?,
            gold_spent_on_upgrades: packet.read()?,
            markers: packet.read_vec()?,
            research: read_records(packet)?,
            team_name: packet.read_string()?,
        })
    }
}

/// The thirteen upgradeable attributes of a unit type (packets 10 and 20).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnitAttributes {
    pub turns: u16,
    pub hits: u16,
    pub armor: u16,
    pub attack: u16,
    pub speed: u16,
    pub range: u16,
    pub rounds: u16,
    pub move_and_fire: u16,
    pub scan: u16,
    pub storage: u16,
    pub ammo: u16,
    pub attack_radius: u16,
    pub agent_adjust: u16,
}

impl UnitAttributes {
    fn as_array(&self) -> [u16; 13] {
        [
            self.turns,
            self.hits,
            self.armor,
            self.attack,
            self.speed,
            self.range,
            self.rounds,
            self.move_and_fire,
            self.scan,
            self.storage,
            self.ammo,
            self.attack_radius,
            self.agent_adjust,
        ]
    }

    fn from_array(v: [u16; 13]) -> Self {
        Self {
            turns: v[0],
            hits: v[1],
            armor: v[2],
            attack: v[3],
            speed: v[4],
            range: v[5],
            rounds: v[6],
            move_and_fire: v[7],
            scan: v[8],
            storage: v[9],
            ammo: v[10],
            attack_radius: v[11],
            agent_adjust: v[12],
        }
    }
}

impl Record for UnitAttributes {
    fn write_to(&self, packet: &mut Packet) {
        for value in self.as_array() {
            packet.write(value);
        }
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        let mut values = [0u16; 13];
        for value in &mut values {
            *value = packet.read()?;
        }
        Ok(Self::from_array(values))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SupplyUnit {
    pub unit_type: u16,
    pub cargo: u16,
}

/// Starting units and gold a team picked before landing (packet 12).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MissionSupplies {
    pub team_gold: u16,
    pub gold_spent_on_upgrades: u16,
    pub starting_x: i32,
    pub starting_y: i32,
    pub proximity_alert_ack: bool,
    pub units: Vec<SupplyUnit>,
}

impl Record for MissionSupplies {
    fn write_to(&self, packet: &mut Packet) {
        let count = u16::try_from(self.units.len()).unwrap_or(u16::MAX);
        packet.write(self.team_gold);
        packet.write(count);
        packet.write(self.gold_spent_on_upgrades);
        packet.write(self.starting_x);
        packet.write(self.starting_y);
        packet.write(self.proximity_alert_ack);
        for unit in self.units.iter().take(usize::from(count)) {
            packet.write(unit.unit_type);
            packet.write(unit.cargo);
        }
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        let team_gold = packet.read()?;
        let count: u16 = packet.read()?;
        let gold_spent_on_upgrades = packet.read()?;
        let starting_x = packet.read()?;
        let starting_y = packet.read()?;
        let proximity_alert_ack = packet.read()?;
        let units = (0..count)
            .map(|_| {
                Ok(SupplyUnit {
                    unit_type: packet.read()?,
                    cargo: packet.read()?,
                })
            })
            .collect::<Result<_, DecodeError>>()?;
        Ok(Self {
            team_gold,
            gold_spent_on_upgrades,
            starting_x,
            starting_y,
            proximity_alert_ack,
            units,
        })
    }
}

/// Material moved between the storage buildings of one complex (packet 21).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComplexTransfer {
    pub complex_id: u16,
    pub material: u16,
    pub fuel: u16,
    pub gold: u16,
}

impl Record for ComplexTransfer {
    fn write_to(&self, packet: &mut Packet) {
        packet.write(self.complex_id);
        packet.write(self.material);
        packet.write(self.fuel);
        packet.write(self.gold);
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        Ok(Self {
            complex_id: packet.read()?,
            material: packet.read()?,
            fuel: packet.read()?,
            gold: packet.read()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Settings and rules
// ---------------------------------------------------------------------------

/// Lobby game settings, chosen by the host and mirrored to every client
/// (packets 30 and 37).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub world: i32,
    pub game_file_number: i32,
    pub game_file_type: i32,
    pub play_mode: i32,
    pub timer: i32,
    pub endturn: i32,
    pub start_gold: i32,
    pub opponent: i32,
    pub victory_type: i32,
    pub victory_limit: i32,
    pub raw_resource: i32,
    pub fuel_resource: i32,
    pub gold_resource: i32,
    pub alien_derelicts: i32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            world: 0,
            game_file_number: 0,
            game_file_type: 0,
            play_mode: 0,
            timer: 180,
            endturn: 45,
            start_gold: 150,
            opponent: 1,
            victory_type: 0,
            victory_limit: 50,
            raw_resource: 1,
            fuel_resource: 1,
            gold_resource: 1,
            alien_derelicts: 0,
        }
    }
}

impl GameSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn as_array(&self) -> [i32; 14] {
        [
            self.world,
            self.game_file_number,
            self.game_file_type,
            self.play_mode,
            self.timer,
            self.endturn,
            self.start_gold,
            self.opponent,
            self.victory_type,
            self.victory_limit,
            self.raw_resource,
            self.fuel_resource,
            self.gold_resource,
            self.alien_derelicts,
        ]
    }
}

impl Record for GameSettings {
    fn write_to(&self, packet: &mut Packet) {
        for value in self.as_array() {
            packet.write(value);
        }
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        Ok(Self {
            world: packet.read()?,
            game_file_number: packet.read()?,
            game_file_type: packet.read()?,
            play_mode: packet.read()?,
            timer: packet.read()?,
            endturn: packet.read()?,
            start_gold: packet.read()?,
            opponent: packet.read()?,
            victory_type: packet.read()?,
            victory_limit: packet.read()?,
            raw_resource: packet.read()?,
            fuel_resource: packet.read()?,
            gold_resource: packet.read()?,
            alien_derelicts: packet.read()?,
        })
    }
}

/// Resource placement parameters for one resource kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceProfile {
    pub normal_low: i32,
    pub normal_high: i32,
    pub concentrate_low: i32,
    pub concentrate_high: i32,
    pub concentrate_separation: i32,
    pub concentrate_diffusion: i32,
}

impl Record for ResourceProfile {
    fn write_to(&self, packet: &mut Packet) {
        packet.write(self.normal_low);
        packet.write(self.normal_high);
        packet.write(self.concentrate_low);
        packet.write(self.concentrate_high);
        packet.write(self.concentrate_separation);
        packet.write(self.concentrate_diffusion);
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        Ok(Self {
            normal_low: packet.read()?,
            normal_high: packet.read()?,
            concentrate_low: packet.read()?,
            concentrate_high: packet.read()?,
            concentrate_separation: packet.read()?,
            concentrate_diffusion: packet.read()?,
        })
    }
}

/// Full rule set the host broadcasts when a match starts (packet 17).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    pub game_state: u8,
    pub settings: GameSettings,
    pub raw: ResourceProfile,
    pub fuel: ResourceProfile,
    pub gold: ResourceProfile,
    pub mixed_resource_separation: i32,
    pub min_resources: i32,
    pub max_resources: i32,
}

impl GameRules {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Record for GameRules {
    fn write_to(&self, packet: &mut Packet) {
        packet.write(self.game_state);
        self.settings.write_to(packet);
        self.raw.write_to(packet);
        self.fuel.write_to(packet);
        self.gold.write_to(packet);
        packet.write(self.mixed_resource_separation);
        packet.write(self.min_resources);
        packet.write(self.max_resources);
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        Ok(Self {
            game_state: packet.read()?,
            settings: GameSettings::read_from(packet)?,
            raw: ResourceProfile::read_from(packet)?,
            fuel: ResourceProfile::read_from(packet)?,
            gold: ResourceProfile::read_from(packet)?,
            mixed_resource_separation: packet.read()?,
            min_resources: packet.read()?,
            max_resources: packet.read()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

/// One lobby node as listed in a registration reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    pub entity_id: EntityId,
    pub address: SocketAddr,
    pub name: String,
    pub is_host: bool,
}

impl Record for NodeRecord {
    fn write_to(&self, packet: &mut Packet) {
        packet.write(self.entity_id);
        packet.write_str(&self.address.to_string());
        packet.write_str(&self.name);
        packet.write(self.is_host);
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        let entity_id = packet.read()?;
        let address: SocketAddr = packet
            .read_string()?
            .parse()
            .map_err(|_| DecodeError::InvalidValue {
                field: "node address",
                value: 0,
            })?;
        Ok(Self {
            entity_id,
            address,
            name: packet.read_string()?,
            is_host: packet.read()?,
        })
    }
}

/// Team slot assignments as seen by the host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeamRoster {
    pub nodes: [EntityId; MAX_TEAM_COUNT],
    pub names: [String; MAX_TEAM_COUNT],
}

impl Record for TeamRoster {
    fn write_to(&self, packet: &mut Packet) {
        for node in self.nodes {
            packet.write(node);
        }
        for name in &self.names {
            packet.write_str(name);
        }
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        let mut roster = TeamRoster::default();
        for node in &mut roster.nodes {
            *node = packet.read()?;
        }
        for name in &mut roster.names {
            *name = packet.read_string()?;
        }
        Ok(roster)
    }
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AirRoute {
    pub end_x: i16,
    pub end_y: i16,
    pub distance_x: i32,
    pub distance_y: i32,
    pub euclidean_distance: i16,
    pub speed: u8,
    pub move_fraction: u8,
    pub max_velocity: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathStep {
    pub dx: i8,
    pub dy: i8,
}

/// The route a moving unit follows. The kind is tagged on the wire so the
/// receiver does not need to know whether the unit flies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PathRoute {
    #[default]
    Stationary,
    Air(AirRoute),
    Ground(Vec<PathStep>),
}

/// Path sync for one unit (packet 38).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitPath {
    pub orders: OrderKind,
    pub state: u8,
    pub target_grid_x: i16,
    pub target_grid_y: i16,
    pub group_speed: u8,
    pub route: PathRoute,
}

const ROUTE_STATIONARY: u8 = 0;
const ROUTE_AIR: u8 = 1;
const ROUTE_GROUND: u8 = 2;

impl Record for UnitPath {
    fn write_to(&self, packet: &mut Packet) {
        packet.write(self.orders.code());
        packet.write(self.state);
        packet.write(self.target_grid_x);
        packet.write(self.target_grid_y);
        packet.write(self.group_speed);
        match &self.route {
            PathRoute::Stationary => packet.write(ROUTE_STATIONARY),
            PathRoute::Air(air) => {
                packet.write(ROUTE_AIR);
                packet.write(air.end_x);
                packet.write(air.end_y);
                packet.write(air.distance_x);
                packet.write(air.distance_y);
                packet.write(air.euclidean_distance);
                packet.write(air.speed);
                packet.write(air.move_fraction);
                packet.write(air.max_velocity);
            }
            PathRoute::Ground(steps) => {
                packet.write(ROUTE_GROUND);
                packet.write(u32::try_from(steps.len()).unwrap_or(u32::MAX));
                for step in steps {
                    packet.write(step.dx);
                    packet.write(step.dy);
                }
            }
        }
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        let orders = OrderKind::try_from(packet.read::<u8>()?)?;
        let state = packet.read()?;
        let target_grid_x = packet.read()?;
        let target_grid_y = packet.read()?;
        let group_speed = packet.read()?;
        let route = match packet.read::<u8>()? {
            ROUTE_STATIONARY => PathRoute::Stationary,
            ROUTE_AIR => PathRoute::Air(AirRoute {
                end_x: packet.read()?,
                end_y: packet.read()?,
                distance_x: packet.read()?,
                distance_y: packet.read()?,
                euclidean_distance: packet.read()?,
                speed: packet.read()?,
                move_fraction: packet.read()?,
                max_velocity: packet.read()?,
            }),
            ROUTE_GROUND => {
                let count = packet.read::<u32>()? as usize;
                if count.saturating_mul(2) > packet.remaining() {
                    return Err(DecodeError::Truncated {
                        needed: count.saturating_mul(2),
                        remaining: packet.remaining(),
                    });
                }
                let steps = (0..count)
                    .map(|_| {
                        Ok(PathStep {
                            dx: packet.read()?,
                            dy: packet.read()?,
                        })
                    })
                    .collect::<Result<_, DecodeError>>()?;
                PathRoute::Ground(steps)
            }
            other => {
                return Err(DecodeError::InvalidValue {
                    field: "route kind",
                    value: u64::from(other),
                });
            }
        };
        Ok(Self {
            orders,
            state,
            target_grid_x,
            target_grid_y,
            group_speed,
            route,
        })
    }
}

// ---------------------------------------------------------------------------
// Desync snapshot
// ---------------------------------------------------------------------------

/// Flattened authoritative state of one unit, compared field by field when
/// peers disagree on a turn checksum (packet 23). Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesyncSnapshot {
    pub order: OrderPayload,
    pub build_time: u8,
    pub build_rate: u16,
    pub unit_type: u16,
    pub unit_id: u16,
    pub grid_x: i16,
    pub grid_y: i16,
    pub team: u16,
    pub hits: u16,
    pub speed: u8,
    pub shots: u8,
    pub storage: u16,
    pub ammo: u16,
}

/// One field that differs between the local and remote snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: &'static str,
    pub local: i64,
    pub remote: i64,
}

impl DesyncSnapshot {
    /// Comparable fields in wire order. The order payload contributes its
    /// Miner-level fields only; the build queue is not part of a snapshot.
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        let o = &self.order;
        let unit_ref = |u: Option<crate::types::UnitId>| u.map_or(0, |u| i64::from(u.0));
        vec![
            ("orders", i64::from(o.orders.code())),
            ("state", i64::from(o.state)),
            ("prior_orders", i64::from(o.prior_orders.code())),
            ("prior_state", i64::from(o.prior_state)),
            ("reaction_fire_disabled", i64::from(o.reaction_fire_disabled)),
            ("parent_unit", unit_ref(o.parent_unit)),
            ("experience", i64::from(o.experience)),
            ("target_grid_x", i64::from(o.target_grid_x)),
            ("target_grid_y", i64::from(o.target_grid_y)),
            ("enemy_unit", unit_ref(o.enemy_unit)),
            ("cargo_transfer", i64::from(o.cargo_transfer)),
            ("stealth_roll", i64::from(o.stealth_roll)),
            ("total_mining", i64::from(o.total_mining)),
            ("raw_mining", i64::from(o.raw_mining)),
            ("fuel_mining", i64::from(o.fuel_mining)),
            ("gold_mining", i64::from(o.gold_mining)),
            ("build_time", i64::from(self.build_time)),
            ("build_rate", i64::from(self.build_rate)),
            ("unit_type", i64::from(self.unit_type)),
            ("unit_id", i64::from(self.unit_id)),
            ("grid_x", i64::from(self.grid_x)),
            ("grid_y", i64::from(self.grid_y)),
            ("team", i64::from(self.team)),
            ("hits", i64::from(self.hits)),
            ("speed", i64::from(self.speed)),
            ("shots", i64::from(self.shots)),
            ("storage", i64::from(self.storage)),
            ("ammo", i64::from(self.ammo)),
        ]
    }

    /// Fields where `self` (local) and `remote` disagree, in wire order.
    pub fn diff(&self, remote: &DesyncSnapshot) -> Vec<FieldDiff> {
        self.fields()
            .into_iter()
            .zip(remote.fields())
            .filter(|((_, local), (_, remote))| local != remote)
            .map(|((field, local), (_, remote))| FieldDiff {
                field,
                local,
                remote,
            })
            .collect()
    }
}

impl Record for DesyncSnapshot {
    fn write_to(&self, packet: &mut Packet) {
        order::encode(CascadeLevel::Miner, &self.order, packet);
        packet.write(self.build_time);
        packet.write(self.build_rate);
        packet.write(self.unit_type);
        packet.write(self.unit_id);
        packet.write(self.grid_x);
        packet.write(self.grid_y);
        packet.write(self.team);
        packet.write(self.hits);
        packet.write(self.speed);
        packet.write(self.shots);
        packet.write(self.storage);
        packet.write(self.ammo);
    }

    fn read_from(packet: &mut Packet) -> Result<Self, DecodeError> {
        let mut order = OrderPayload::default();
        order::decode(CascadeLevel::Miner, &mut order, packet)?;
        Ok(Self {
            order,
            build_time: packet.read()?,
            build_rate: packet.read()?,
            unit_type: packet.read()?,
            unit_id: packet.read()?,
            grid_x: packet.read()?,
            grid_y: packet.read()?,
            team: packet.read()?,
            hits: packet.read()?,
            speed: packet.read()?,
            shots: packet.read()?,
            storage: packet.read()?,
            ammo: packet.read()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Record + PartialEq + std::fmt::Debug>(value: &T) {
        let mut packet = Packet::new();
        value.write_to(&mut packet);
        let back = T::read_from(&mut packet).unwrap();
        assert_eq!(&back, value);
        assert_eq!(packet.remaining(), 0);
    }

    #[test]
    fn mission_supplies_interleave_type_and_cargo() {
        let supplies = MissionSupplies {
            team_gold: 40,
            gold_spent_on_upgrades: 110,
            starting_x: 12,
            starting_y: 80,
            proximity_alert_ack: true,
            units: vec![
                SupplyUnit {
                    unit_type: 3,
                    cargo: 0,
                },
                SupplyUnit {
                    unit_type: 9,
                    cargo: 20,
                },
            ],
        };
        let mut packet = Packet::new();
        supplies.write_to(&mut packet);
        // gold, count, spent, x, y, ack, then (type, cargo) pairs.
        assert_eq!(&packet.as_bytes()[..6], &[40, 0, 2, 0, 110, 0]);
        assert_eq!(&packet.as_bytes()[15..], &[3, 0, 0, 0, 9, 0, 20, 0]);
        roundtrip(&supplies);
    }

    #[test]
    fn settings_load_from_partial_json() {
        let settings = GameSettings::from_json(r#"{"start_gold": 300}"#).unwrap();
        assert_eq!(settings.start_gold, 300);
        assert_eq!(settings.timer, GameSettings::default().timer);
        roundtrip(&settings);
    }

    #[test]
    fn rules_roundtrip() {
        let rules = GameRules {
            game_state: 7,
            raw: ResourceProfile {
                normal_low: 1,
                normal_high: 5,
                concentrate_low: 13,
                concentrate_high: 16,
                concentrate_separation: 23,
                concentrate_diffusion: 6,
            },
            max_resources: 20,
            ..GameRules::default()
        };
        roundtrip(&rules);
    }

    #[test]
    fn node_record_carries_address() {
        roundtrip(&NodeRecord {
            entity_id: EntityId(4410),
            address: "192.168.1.20:31554".parse().unwrap(),
            name: "Blue".into(),
            is_host: false,
        });
    }

    #[test]
    fn node_record_rejects_bad_address() {
        let mut packet = Packet::new();
        packet.write(EntityId(12));
        packet.write_str("not an address");
        packet.write_str("x");
        packet.write(false);
        assert!(matches!(
            NodeRecord::read_from(&mut packet),
            Err(DecodeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unit_path_variants() {
        roundtrip(&UnitPath::default());
        roundtrip(&UnitPath {
            orders: OrderKind::Move,
            state: 5,
            target_grid_x: 30,
            target_grid_y: 31,
            group_speed: 4,
            route: PathRoute::Air(AirRoute {
                end_x: 30,
                end_y: 31,
                distance_x: -1200,
                distance_y: 640,
                euclidean_distance: 1360,
                speed: 8,
                move_fraction: 2,
                max_velocity: 16,
            }),
        });
        roundtrip(&UnitPath {
            orders: OrderKind::Move,
            route: PathRoute::Ground(vec![
                PathStep { dx: 1, dy: 0 },
                PathStep { dx: 1, dy: -1 },
            ]),
            ..UnitPath::default()
        });
    }

    #[test]
    fn snapshot_diff_names_changed_fields() {
        let local = DesyncSnapshot {
            unit_type: 12,
            hits: 24,
            grid_x: 40,
            ..DesyncSnapshot::default()
        };
        let mut remote = local.clone();
        assert!(local.diff(&remote).is_empty());

        remote.hits = 18;
        remote.order.orders = OrderKind::Fire;
        let diffs = local.diff(&remote);
        assert_eq!(
            diffs,
            vec![
                FieldDiff {
                    field: "orders",
                    local: 0,
                    remote: 3
                },
                FieldDiff {
                    field: "hits",
                    local: 24,
                    remote: 18
                },
            ]
        );
        roundtrip(&remote);
    }

    #[test]
    fn economy_and_attributes_roundtrip() {
        roundtrip(&TeamEconomy {
            gold: 120,
            gold_spent_on_upgrades: 30,
            markers: vec![1, 0, 5],
            research: vec![ResearchTopic {
                level: 2,
                turns_to_complete: 7,
                allocation: 3,
            }],
            team_name: "Green".into(),
        });
        roundtrip(&UnitAttributes {
            turns: 3,
            hits: 24,
            armor: 6,
            attack: 12,
            speed: 10,
            range: 4,
            rounds: 1,
            move_and_fire: 0,
            scan: 7,
            storage: 0,
            ammo: 14,
            attack_radius: 0,
            agent_adjust: 0,
        });
    }
}
