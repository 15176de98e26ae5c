//! Canonical dive model every vendor driver maps onto.

use std::fmt;

/// Cylinders a dive can carry; further cylinders are ignored.
pub const MAX_CYLINDERS: usize = 8;

/// Measured oxygen cells a sample can carry.
pub const MAX_O2_SENSORS: usize = 3;

/// O2 permille assumed for a cylinder with no recorded mix.
pub const O2_IN_AIR: u32 = 209;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, uniffi::Record)]
pub struct GasMix {
    pub o2_permille: u32,
    pub he_permille: u32,
}

impl GasMix {
    pub fn new(o2_permille: u32, he_permille: u32) -> Self {
        Self {
            o2_permille: o2_permille.min(1000),
            he_permille: he_permille.min(1000),
        }
    }

    pub fn clamped(self) -> Self {
        Self::new(self.o2_permille, self.he_permille)
    }

    /// O2 permille, reading an unset mix as air.
    pub fn o2_or_air(&self) -> u32 {
        if self.o2_permille == 0 {
            O2_IN_AIR
        } else {
            self.o2_permille
        }
    }

    /// Event payload of a gas change: O2 percent in the low 16 bits, He
    /// percent above them.
    pub fn gaschange_value(&self) -> i32 {
        let o2 = (self.o2_or_air() + 5) / 10;
        let he = (self.he_permille + 5) / 10;
        (o2 + (he << 16)) as i32
    }
}

#[derive(Clone, Debug, Default, PartialEq, uniffi::Record)]
pub struct Cylinder {
    pub gasmix: GasMix,
    pub size_ml: Option<u32>,
    pub working_pressure_mbar: Option<u32>,
    pub start_mbar: Option<u32>,
    pub end_mbar: Option<u32>,
    pub gas_used_ml: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, uniffi::Record)]
pub struct Sample {
    pub time_s: u32,
    pub depth_mm: i32,
    pub temperature_mk: Option<u32>,
    pub pressure_mbar: Option<u32>,
    /// Second transmitter of air-integrated computers.
    pub pressure2_mbar: Option<u32>,
    pub setpoint_mbar: Option<u32>,
    pub ndl_s: Option<u32>,
    pub tts_s: Option<u32>,
    pub stop_time_s: Option<u32>,
    pub stop_depth_mm: Option<u32>,
    /// Remaining bottom time.
    pub rbt_s: Option<u32>,
    pub cns_percent: Option<u32>,
    /// Measured ppO2 per cell, indexed by channel.
    pub o2_sensor_mbar: Vec<Option<u32>>,
    pub heartbeat: Option<u32>,
    pub in_deco: bool,
}

impl Sample {
    /// Record a cell reading. Channels past `MAX_O2_SENSORS` are ignored.
    pub fn set_o2_sensor(&mut self, channel: usize, mbar: u32) {
        if channel >= MAX_O2_SENSORS {
            return;
        }
        if self.o2_sensor_mbar.len() <= channel {
            self.o2_sensor_mbar.resize(channel + 1, None);
        }
        self.o2_sensor_mbar[channel] = Some(mbar);
    }

    /// Cells that reported a nonzero reading.
    pub fn o2_sensor_count(&self) -> u32 {
        self.o2_sensor_mbar
            .iter()
            .filter(|reading| matches!(reading, Some(mbar) if *mbar > 0))
            .count() as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, uniffi::Enum)]
pub enum EventKind {
    GasChange,
    SafetyStopMandatory,
    Deco,
    Ascent,
    Violation,
    BelowFloor,
    DiveTime,
    MaxDepth,
    Olf,
    Po2,
    AirTime,
    Ceiling,
    Surface,
    TissueWarning,
    TankPressure,
    Heading,
    Bookmark,
    DeepStop,
    DeepStopCleared,
    Rbt,
    Workload,
    Unknown,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::GasChange => "gaschange",
            EventKind::SafetyStopMandatory => "safety stop (mandatory)",
            EventKind::Deco => "deco",
            EventKind::Ascent => "ascent",
            EventKind::Violation => "violation",
            EventKind::BelowFloor => "below floor",
            EventKind::DiveTime => "divetime",
            EventKind::MaxDepth => "maxdepth",
            EventKind::Olf => "OLF",
            EventKind::Po2 => "PO2",
            EventKind::AirTime => "airtime",
            EventKind::Ceiling => "ceiling",
            EventKind::Surface => "surface",
            EventKind::TissueWarning => "tissue warning",
            EventKind::TankPressure => "tank pressure",
            EventKind::Heading => "heading",
            EventKind::Bookmark => "bookmark",
            EventKind::DeepStop => "Deep stop",
            EventKind::DeepStopCleared => "Deep stop cleared",
            EventKind::Rbt => "rbt",
            EventKind::Workload => "workload",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct Event {
    pub time_s: u32,
    pub kind: EventKind,
    pub value: Option<i32>,
    /// Cylinder a gas change switches to.
    pub cylinder: Option<u32>,
}

impl Event {
    pub fn new(time_s: u32, kind: EventKind) -> Self {
        Self {
            time_s,
            kind,
            value: None,
            cylinder: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, uniffi::Enum)]
pub enum DiveMode {
    #[default]
    OpenCircuit,
    ClosedCircuit,
    SemiClosed,
}

#[derive(Clone, Debug, Default, PartialEq, uniffi::Record)]
pub struct DeviceSettings {
    pub model: Option<String>,
    pub serial: Option<String>,
    pub device_id: Option<u32>,
}

impl DeviceSettings {
    /// The recorded id, or one derived from model and serial: a numeric
    /// serial is its own id, anything else hashes to a stable value.
    pub fn resolved_device_id(&self) -> u32 {
        if let Some(id) = self.device_id {
            return id;
        }
        let serial = self.serial.as_deref().unwrap_or("").trim();
        if let Ok(id) = serial.parse::<u32>() {
            return id;
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.model.as_deref().unwrap_or("").as_bytes());
        hasher.update(&[0]);
        hasher.update(serial.as_bytes());
        let hash = hasher.finalize();
        let bytes = hash.as_bytes();
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn same_device(&self, other: &DeviceSettings) -> bool {
        self.model == other.model && self.serial == other.serial
    }
}

#[derive(Clone, Debug, Default, PartialEq, uniffi::Record)]
pub struct DiveComputer {
    pub model: Option<String>,
    pub serial: Option<String>,
    pub device_id: Option<u32>,
    pub duration_s: u32,
    pub max_depth_mm: i32,
    pub mean_depth_mm: i32,
    pub air_temp_mk: Option<u32>,
    pub water_temp_mk: Option<u32>,
    pub surface_pressure_mbar: Option<u32>,
    pub dive_mode: DiveMode,
    pub o2_sensor_count: u32,
    pub samples: Vec<Sample>,
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, Default, PartialEq, uniffi::Record)]
pub struct Dive {
    pub number: u32,
    /// Start time as Unix timestamp
    pub when: i64,
    pub duration_s: u32,
    pub notes: Option<String>,
    pub buddy: Option<String>,
    pub divemaster: Option<String>,
    pub suit: Option<String>,
    /// Star rating, 0-5
    pub visibility: Option<u8>,
    pub weight_g: Option<u32>,
    pub tags: Vec<String>,
    /// Index into `Logbook::sites`
    pub dive_site: Option<u32>,
    pub cylinders: Vec<Cylinder>,
    pub dc: DiveComputer,
}

impl Dive {
    pub fn new(number: u32, when: i64) -> Self {
        Self {
            number,
            when,
            ..Self::default()
        }
    }

    /// Append a cylinder and return its index; a full table ignores it.
    pub fn add_cylinder(&mut self, mut cylinder: Cylinder) -> Option<usize> {
        if self.cylinders.len() >= MAX_CYLINDERS {
            return None;
        }
        cylinder.gasmix = cylinder.gasmix.clamped();
        self.cylinders.push(cylinder);
        Some(self.cylinders.len() - 1)
    }

    pub fn replace_cylinder(&mut self, index: usize, mut cylinder: Cylinder) -> Option<usize> {
        let slot = self.cylinders.get_mut(index)?;
        cylinder.gasmix = cylinder.gasmix.clamped();
        *slot = cylinder;
        Some(index)
    }

    pub fn find_cylinder(&self, mix: GasMix) -> Option<usize> {
        self.cylinders.iter().position(|c| c.gasmix == mix)
    }

    /// Append a sample; one that does not advance time is rejected.
    pub fn add_sample(&mut self, sample: Sample) -> bool {
        if let Some(last) = self.dc.samples.last() {
            if sample.time_s <= last.time_s {
                return false;
            }
        }
        self.dc.samples.push(sample);
        true
    }

    /// Insert an event after every event at the same or an earlier time.
    pub fn add_event(&mut self, event: Event) {
        let at = self
            .dc
            .events
            .partition_point(|e| e.time_s <= event.time_s);
        self.dc.events.insert(at, event);
    }

    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return;
        }
        self.tags.push(tag.to_string());
    }

    pub fn merge_device(&mut self, settings: &DeviceSettings) {
        if settings.model.is_some() {
            self.dc.model = settings.model.clone();
        }
        if settings.serial.is_some() {
            self.dc.serial = settings.serial.clone();
        }
        self.dc.device_id = settings.device_id;
    }
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct DiveSite {
    pub id: u32,
    pub name: String,
}

/// Everything one import produced.
#[derive(Clone, Debug, Default, PartialEq, uniffi::Record)]
pub struct Logbook {
    pub dives: Vec<Dive>,
    pub sites: Vec<DiveSite>,
    pub devices: Vec<DeviceSettings>,
}

impl Logbook {
    pub fn find_or_create_site(&mut self, name: &str) -> u32 {
        let name = name.trim();
        if let Some(site) = self.sites.iter().find(|s| s.name == name) {
            return site.id;
        }
        let id = self.sites.len() as u32;
        self.sites.push(DiveSite {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Register a device once; later sightings only fill in what was
    /// missing. Returns the registry entry.
    pub fn merge_device(&mut self, mut settings: DeviceSettings) -> DeviceSettings {
        settings.device_id = Some(settings.resolved_device_id());
        match self.devices.iter_mut().find(|d| d.same_device(&settings)) {
            Some(known) => {
                if known.device_id.is_none() {
                    known.device_id = settings.device_id;
                }
                known.clone()
            }
            None => {
                self.devices.push(settings.clone());
                settings
            }
        }
    }
}
