// Unit order codec cascade.
//
// A unit's order state is serialized at one of six "richness levels". Each
// level's payload is the previous level's payload plus a few fields, so order
// kinds that only need the common prefix share it byte for byte:
//
//   None      no data
//   Basic     orders, state, prior orders, prior state, reaction-fire flag
//   Parented  Basic + parent unit, experience
//   Targeted  Parented + target grid x/y, enemy unit, cargo transfer, stealth roll
//   Builder   Targeted + repeat-build flag, build time, build rate, build queue
//   Miner     Targeted + total/raw/fuel/gold mining rates
//
// Builder and Miner are siblings: both extend Targeted, neither extends the
// other. The level of an order kind comes from `OrderKind::cascade_level`, an
// exhaustive match, so adding an order kind without choosing its level does
// not compile. The writer and reader of a unit order always pick the level
// from the same `orders` byte (the first byte of every non-empty level), which
// is what keeps the two sides on the same field list.
//
// Decoding is all-or-nothing: on a truncated packet the target payload is
// left untouched. Fields above the decoded level are never modified.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::packet::Packet;
use crate::types::{UnitId, read_unit_ref, write_unit_ref};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderKind {
    #[default]
    Await = 0,
    Transform = 1,
    Move = 2,
    Fire = 3,
    Build = 4,
    Activate = 5,
    NewAllocate = 6,
    PowerOn = 7,
    PowerOff = 8,
    Explode = 9,
    Unload = 10,
    Clear = 11,
    Sentry = 12,
    Land = 13,
    TakeOff = 14,
    Load = 15,
    Idle = 16,
    Repair = 17,
    Refuel = 18,
    Reload = 19,
    Transfer = 20,
    HaltBuilding = 21,
    AwaitScaling = 22,
    AwaitTapePositioning = 23,
    AwaitStealUnit = 24,
    AwaitDisableUnit = 25,
    Disable = 26,
    MoveToUnit = 27,
    Upgrade = 28,
    LayMine = 29,
    MoveToAttack = 30,
    HaltBuilding2 = 31,
}

impl OrderKind {
    pub const ALL: [OrderKind; 32] = [
        OrderKind::Await,
        OrderKind::Transform,
        OrderKind::Move,
        OrderKind::Fire,
        OrderKind::Build,
        OrderKind::Activate,
        OrderKind::NewAllocate,
        OrderKind::PowerOn,
        OrderKind::PowerOff,
        OrderKind::Explode,
        OrderKind::Unload,
        OrderKind::Clear,
        OrderKind::Sentry,
        OrderKind::Land,
        OrderKind::TakeOff,
        OrderKind::Load,
        OrderKind::Idle,
        OrderKind::Repair,
        OrderKind::Refuel,
        OrderKind::Reload,
        OrderKind::Transfer,
        OrderKind::HaltBuilding,
        OrderKind::AwaitScaling,
        OrderKind::AwaitTapePositioning,
        OrderKind::AwaitStealUnit,
        OrderKind::AwaitDisableUnit,
        OrderKind::Disable,
        OrderKind::MoveToUnit,
        OrderKind::Upgrade,
        OrderKind::LayMine,
        OrderKind::MoveToAttack,
        OrderKind::HaltBuilding2,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Which payload level carries this order kind on the wire.
    pub fn cascade_level(self) -> CascadeLevel {
        match self {
            OrderKind::PowerOn
            | OrderKind::PowerOff
            | OrderKind::Explode
            | OrderKind::Sentry
            | OrderKind::Land
            | OrderKind::TakeOff
            | OrderKind::Load
            | OrderKind::Idle
            | OrderKind::HaltBuilding
            | OrderKind::AwaitScaling
            | OrderKind::AwaitTapePositioning
            | OrderKind::LayMine
            | OrderKind::HaltBuilding2 => CascadeLevel::Basic,

            OrderKind::Unload
            | OrderKind::Repair
            | OrderKind::Refuel
            | OrderKind::Reload
            | OrderKind::Upgrade => CascadeLevel::Parented,

            OrderKind::Await
            | OrderKind::Move
            | OrderKind::Fire
            | OrderKind::Activate
            | OrderKind::Transfer
            | OrderKind::AwaitStealUnit
            | OrderKind::AwaitDisableUnit
            | OrderKind::MoveToUnit
            | OrderKind::MoveToAttack => CascadeLevel::Targeted,

            OrderKind::Transform | OrderKind::Build | OrderKind::Clear | OrderKind::Disable => {
                CascadeLevel::Builder
            }

            OrderKind::NewAllocate => CascadeLevel::Miner,
        }
    }
}

impl TryFrom<u8> for OrderKind {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        OrderKind::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(DecodeError::InvalidValue {
                field: "orders",
                value: u64::from(code),
            })
    }
}

/// Richness level of an order payload on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CascadeLevel {
    None,
    Basic,
    Parented,
    Targeted,
    Builder,
    Miner,
}

/// Every order-related field a unit can put on the wire. Which fields are
/// actually sent depends on the cascade level of `orders`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    // Basic
    pub orders: OrderKind,
    pub state: u8,
    pub prior_orders: OrderKind,
    pub prior_state: u8,
    pub reaction_fire_disabled: bool,
    // Parented
    pub parent_unit: Option<UnitId>,
    pub experience: u8,
    // Targeted
    pub target_grid_x: i16,
    pub target_grid_y: i16,
    pub enemy_unit: Option<UnitId>,
    pub cargo_transfer: u16,
    pub stealth_roll: u8,
    // Builder
    pub repeat_build: bool,
    pub build_time: u8,
    pub build_rate: u16,
    pub build_queue: Vec<u16>,
    // Miner
    pub total_mining: u8,
    pub raw_mining: u8,
    pub fuel_mining: u8,
    pub gold_mining: u8,
}

impl OrderPayload {
    /// The level this payload is sent at: the level of its current order.
    pub fn cascade_level(&self) -> CascadeLevel {
        self.orders.cascade_level()
    }

    /// Copy exactly the fields carried at `level` from `src`, leaving all
    /// others as they are.
    pub fn merge_level(&mut self, level: CascadeLevel, src: &OrderPayload) {
        match level {
            CascadeLevel::None => {}
            CascadeLevel::Basic => self.merge_basic(src),
            CascadeLevel::Parented => self.merge_parented(src),
            CascadeLevel::Targeted => self.merge_targeted(src),
            CascadeLevel::Builder => {
                self.merge_targeted(src);
                self.repeat_build = src.repeat_build;
                self.build_time = src.build_time;
                self.build_rate = src.build_rate;
                self.build_queue.clone_from(&src.build_queue);
            }
            CascadeLevel::Miner => {
                self.merge_targeted(src);
                self.total_mining = src.total_mining;
                self.raw_mining = src.raw_mining;
                self.fuel_mining = src.fuel_mining;
                self.gold_mining = src.gold_mining;
            }
        }
    }

    fn merge_basic(&mut self, src: &OrderPayload) {
        self.orders = src.orders;
        self.state = src.state;
        self.prior_orders = src.prior_orders;
        self.prior_state = src.prior_state;
        self.reaction_fire_disabled = src.reaction_fire_disabled;
    }

    fn merge_parented(&mut self, src: &OrderPayload) {
        self.merge_basic(src);
        self.parent_unit = src.parent_unit;
        self.experience = src.experience;
    }

    fn merge_targeted(&mut self, src: &OrderPayload) {
        self.merge_parented(src);
        self.target_grid_x = src.target_grid_x;
        self.target_grid_y = src.target_grid_y;
        self.enemy_unit = src.enemy_unit;
        self.cargo_transfer = src.cargo_transfer;
        self.stealth_roll = src.stealth_roll;
    }
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

/// Append the fields of `level` to `packet`.
pub fn encode(level: CascadeLevel, payload: &OrderPayload, packet: &mut Packet) {
    match level {
        CascadeLevel::None => {}
        CascadeLevel::Basic => write_basic(payload, packet),
        CascadeLevel::Parented => write_parented(payload, packet),
        CascadeLevel::Targeted => write_targeted(payload, packet),
        CascadeLevel::Builder => write_builder(payload, packet),
        CascadeLevel::Miner => write_miner(payload, packet),
    }
}

fn write_basic(p: &OrderPayload, packet: &mut Packet) {
    packet.write(p.orders.code());
    packet.write(p.state);
    packet.write(p.prior_orders.code());
    packet.write(p.prior_state);
    packet.write(p.reaction_fire_disabled);
}

fn write_parented(p: &OrderPayload, packet: &mut Packet) {
    write_basic(p, packet);
    write_unit_ref(packet, p.parent_unit);
    packet.write(p.experience);
}

fn write_targeted(p: &OrderPayload, packet: &mut Packet) {
    write_parented(p, packet);
    packet.write(p.target_grid_x);
    packet.write(p.target_grid_y);
    write_unit_ref(packet, p.enemy_unit);
    packet.write(p.cargo_transfer);
    packet.write(p.stealth_roll);
}

fn write_builder(p: &OrderPayload, packet: &mut Packet) {
    write_targeted(p, packet);
    packet.write(p.repeat_build);
    packet.write(p.build_time);
    packet.write(p.build_rate);
    packet.write_vec(&p.build_queue);
}

fn write_miner(p: &OrderPayload, packet: &mut Packet) {
    write_targeted(p, packet);
    packet.write(p.total_mining);
    packet.write(p.raw_mining);
    packet.write(p.fuel_mining);
    packet.write(p.gold_mining);
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

/// Read the fields of `level` from `packet` into `payload`.
///
/// On error `payload` is unchanged.
pub fn decode(
    level: CascadeLevel,
    payload: &mut OrderPayload,
    packet: &mut Packet,
) -> Result<(), DecodeError> {
    let mut next = payload.clone();
    match level {
        CascadeLevel::None => {}
        CascadeLevel::Basic => read_basic(&mut next, packet)?,
        CascadeLevel::Parented => read_parented(&mut next, packet)?,
        CascadeLevel::Targeted => read_targeted(&mut next, packet)?,
        CascadeLevel::Builder => read_builder(&mut next, packet)?,
        CascadeLevel::Miner => read_miner(&mut next, packet)?,
    }
    *payload = next;
    Ok(())
}

fn read_basic(p: &mut OrderPayload, packet: &mut Packet) -> Result<(), DecodeError> {
    p.orders = OrderKind::try_from(packet.read::<u8>()?)?;
    p.state = packet.read()?;
    p.prior_orders = OrderKind::try_from(packet.read::<u8>()?)?;
    p.prior_state = packet.read()?;
    p.reaction_fire_disabled = packet.read()?;
    Ok(())
}

fn read_parented(p: &mut OrderPayload, packet: &mut Packet) -> Result<(), DecodeError> {
    read_basic(p, packet)?;
    p.parent_unit = read_unit_ref(packet)?;
    p.experience = packet.read()?;
    Ok(())
}

fn read_targeted(p: &mut OrderPayload, packet: &mut Packet) -> Result<(), DecodeError> {
    read_parented(p, packet)?;
    p.target_grid_x = packet.read()?;
    p.target_grid_y = packet.read()?;
    p.enemy_unit = read_unit_ref(packet)?;
    p.cargo_transfer = packet.read()?;
    p.stealth_roll = packet.read()?;
    Ok(())
}

fn read_builder(p: &mut OrderPayload, packet: &mut Packet) -> Result<(), DecodeError> {
    read_targeted(p, packet)?;
    p.repeat_build = packet.read()?;
    p.build_time = packet.read()?;
    p.build_rate = packet.read()?;
    p.build_queue = packet.read_vec()?;
    Ok(())
}

fn read_miner(p: &mut OrderPayload, packet: &mut Packet) -> Result<(), DecodeError> {
    read_targeted(p, packet)?;
    p.total_mining = packet.read()?;
    p.raw_mining = packet.read()?;
    p.fuel_mining = packet.read()?;
    p.gold_mining = packet.read()?;
    Ok(())
}
