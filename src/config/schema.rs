//! Configuration schema types
//!
//! Every section defaults independently, so an empty YAML document is a
//! complete configuration. Durations are written as human strings such as
//! `"250ms"` or `"30m"`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for the reflection engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReflectionConfig {
    /// Player-vs-player reflection
    pub pvp: PvpConfig,

    /// Player-vs-structure reflection and raid classification
    pub structure: StructureConfig,

    /// Strike tracking and escalation
    pub forgiveness: ForgivenessConfig,

    /// Degradation applied to punished attackers that survive
    pub bleed: BleedConfig,

    /// Bypass permission and anti-loop token lifetimes
    pub bypass: BypassConfig,

    /// Punishment dispatch tunables
    pub dispatch: DispatchConfig,

    /// Notification templates
    pub messages: Messages,
}

// ============================================================================
// PvP
// ============================================================================

/// Player-vs-player settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvpConfig {
    /// Reflect player-vs-player damage back to the attacker
    pub enabled: bool,

    /// Share of inflicted damage reflected, in percent
    pub reflect_percent: f32,

    /// Let the victim still take the original damage
    pub damage_victim: bool,

    /// Multiplier applied to reflected head shots
    pub headshot_multiplier: f32,

    /// Globally forbid player-vs-player damage (blocked in the early phase)
    pub block_pvp: bool,
}

impl Default for PvpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reflect_percent: 100.0,
            damage_victim: false,
            headshot_multiplier: 1.0,
            block_pvp: false,
        }
    }
}

// ============================================================================
// Structures
// ============================================================================

/// Player-vs-structure settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StructureConfig {
    /// Reflect damage dealt to structures the attacker is not authorized on
    pub enabled: bool,

    /// Share of inflicted damage reflected, in percent
    pub reflect_percent: f32,

    /// Let the structure still take the original damage
    pub damage_target: bool,

    /// Always block unauthorized damage to vital hubs
    pub protect_vital_hub: bool,

    /// Raid relevance lists and explosive detection
    pub raid: RaidConfig,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reflect_percent: 100.0,
            damage_target: false,
            protect_vital_hub: true,
            raid: RaidConfig::default(),
        }
    }
}

/// Raid relevance configuration.
///
/// `include` and `exclude` entries are type names (`Door`,
/// `StorageContainer*`) or prefab identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RaidConfig {
    /// Entries that make a target raid relevant
    pub include: Vec<String>,

    /// Entries that are never raid relevant
    pub exclude: Vec<String>,

    /// Item identifiers treated as explosive ammunition
    pub explosive_items: Vec<String>,

    /// Name fragments marking explosive weapons and projectiles
    pub explosive_fragments: Vec<String>,
}

impl Default for RaidConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            explosive_items: [
                "ammo.rocket.basic",
                "ammo.rocket.hv",
                "ammo.rocket.fire",
                "ammo.grenadelauncher.he",
                "ammo.rifle.explosive",
                "explosive.timed",
                "explosive.satchel",
                "grenade.beancan",
                "grenade.f1",
            ]
            .map(String::from)
            .to_vec(),
            explosive_fragments: [
                "rocket",
                "explosive",
                "satchel",
                "grenade",
                "beancan",
                "c4",
                "molotov",
                "incendiary",
                "landmine",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

// ============================================================================
// Forgiveness
// ============================================================================

/// Strike tracking and escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgivenessConfig {
    /// Track strikes instead of escalating immediately
    pub enabled: bool,

    /// Strikes that trigger escalation; 0 disables tracking
    pub threshold: u32,

    /// Idle time after which strikes are forgiven; `null` never decays
    #[serde(with = "opt_duration")]
    pub decay: Option<Duration>,

    /// Reflect lethal damage when the threshold is reached
    pub death_penalty: bool,

    /// Kick on escalation
    pub auto_kick: bool,

    /// Temporarily ban on escalation (takes precedence over kick)
    pub auto_ban: bool,

    /// Temporary ban length in hours
    pub ban_hours: u32,

    /// Minimum time between two kick/ban escalations of the same actor
    #[serde(with = "duration")]
    pub escalation_cooldown: Duration,
}

impl Default for ForgivenessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 3,
            decay: Some(Duration::from_secs(30 * 60)),
            death_penalty: false,
            auto_kick: false,
            auto_ban: false,
            ban_hours: 24,
            escalation_cooldown: Duration::from_secs(5 * 60),
        }
    }
}

impl ForgivenessConfig {
    /// Whether strikes are tracked at all.
    #[must_use]
    pub const fn tracks_strikes(&self) -> bool {
        self.enabled && self.threshold > 0
    }
}

// ============================================================================
// Bleed
// ============================================================================

/// Continuous degradation applied after a punishment the attacker survives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BleedConfig {
    /// Apply bleeding to surviving attackers
    pub enabled: bool,

    /// Bleed amount handed to the host
    pub amount: f32,
}

impl Default for BleedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 5.0,
        }
    }
}

// ============================================================================
// Bypass
// ============================================================================

/// Bypass permission and anti-loop tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BypassConfig {
    /// Exempt actors holding the bypass permission
    pub permission: bool,

    /// Lifetime of a bypass token
    #[serde(with = "duration")]
    pub token_ttl: Duration,

    /// Lifetime of a reflection intent
    #[serde(with = "duration")]
    pub intent_ttl: Duration,

    /// Live entries tolerated before a table sweeps expired ones
    pub table_bound: usize,
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            permission: true,
            token_ttl: Duration::from_millis(500),
            intent_ttl: Duration::from_millis(250),
            table_bound: 256,
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Punishment dispatch tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Minimum magnitude used when death is predicted
    pub lethal_floor: f32,

    /// Multiple of current health used when death is predicted
    pub lethal_multiplier: f32,

    /// Smallest health drop counted as a measurable effect
    pub epsilon: f32,

    /// Delay before verifying that a predicted death happened
    #[serde(with = "duration")]
    pub verify_delay: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lethal_floor: 1000.0,
            lethal_multiplier: 2.0,
            epsilon: 0.01,
            verify_delay: Duration::from_secs(2),
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Notification templates.
///
/// Placeholders: `{attacker}`, `{victim}`, `{count}`, `{threshold}`, `{hours}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Messages {
    /// Sent to an attacker whose PvP damage was reflected
    pub pvp_reflected: String,
    /// Sent with each recorded strike
    pub strike_warning: String,
    /// Sent when structural splash damage is tolerated
    pub structure_tolerated: String,
    /// Sent to an attacker whose structure damage was reflected
    pub structure_reflected: String,
    /// Kick reason
    pub kick_reason: String,
    /// Ban reason
    pub ban_reason: String,
    /// Broadcast when an actor is banned
    pub ban_broadcast: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            pvp_reflected: "Damage against {victim} was reflected back to you.".to_string(),
            strike_warning: "Warning {count}/{threshold}: stop attacking other players' property."
                .to_string(),
            structure_tolerated: "You are not authorized here. Damage was blocked.".to_string(),
            structure_reflected: "Damage to protected structures is reflected back to you."
                .to_string(),
            kick_reason: "Repeated attacks on protected players or bases".to_string(),
            ban_reason: "Raiding a protected base".to_string(),
            ban_broadcast: "{attacker} was banned for {hours}h for raiding.".to_string(),
        }
    }
}

/// Values substituted into a message template.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageArgs<'a> {
    /// Attacker display name
    pub attacker: &'a str,
    /// Victim display name
    pub victim: &'a str,
    /// Current strike count
    pub count: u32,
    /// Strike threshold
    pub threshold: u32,
    /// Ban duration in hours
    pub hours: u32,
}

/// Renders a template by replacing known placeholders.
#[must_use]
pub fn render(template: &str, args: &MessageArgs<'_>) -> String {
    template
        .replace("{attacker}", args.attacker)
        .replace("{victim}", args.victim)
        .replace("{count}", &args.count.to_string())
        .replace("{threshold}", &args.threshold.to_string())
        .replace("{hours}", &args.hours.to_string())
}

// ============================================================================
// Duration (de)serialization
// ============================================================================

pub(crate) mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

mod opt_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&humantime::format_duration(*d).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|r| humantime::parse_duration(r.trim()).map_err(serde::de::Error::custom))
            .transpose()
            .map(|d| d.filter(|d| !d.is_zero()))
    }
}

// ============================================================================
// Tests
// ============================================================================
