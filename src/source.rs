// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Sources
//!
//! Every message on the bus carries a `source` header naming the subsystem that
//! produced it. The set of known sources is closed: six categories, each with a
//! fixed list of tags. Inbound tags are resolved against the categories in a
//! fixed priority order (module, plugin, connector, automator, addon, bridge)
//! and the first match wins.

use std::{fmt, str::FromStr};
use thiserror::Error;

macro_rules! source_kind {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            pub fn parse(value: &str) -> Option<$name> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

source_kind!(
    /// Core application modules
    ModuleSource {
        Accounts => "module.accounts",
        Devices => "module.devices",
        Triggers => "module.triggers",
        Ui => "module.ui",
    }
);

source_kind!(
    /// Infrastructure plugins
    PluginSource {
        RabbitMq => "plugin.rabbitmq",
        RedisDb => "plugin.redisdb",
        WsServer => "plugin.ws-server",
        WebServer => "plugin.web-server",
        ApiKey => "plugin.api-key",
    }
);

source_kind!(
    /// Device connectors
    ConnectorSource {
        FbMqtt => "connector.fb-mqtt",
        FbBus => "connector.fb-bus",
        Shelly => "connector.shelly",
        Tuya => "connector.tuya",
        Sonoff => "connector.sonoff",
        Modbus => "connector.modbus",
        HomeKit => "connector.homekit",
        Virtual => "connector.virtual",
        Zigbee2Mqtt => "connector.zigbee2mqtt",
        NsPanel => "connector.ns-panel",
    }
);

source_kind!(
    /// Trigger automators
    AutomatorSource {
        DateTime => "automator.date-time",
        DevicesProperty => "automator.devices-property",
    }
);

source_kind!(
    /// Add-ons built on top of connectors
    AddonSource {
        VirtualThermostat => "addon.virtual-thermostat",
    }
);

source_kind!(
    /// Bridges between two connectors
    BridgeSource {
        ShellyHomeKit => "bridge.shelly-homekit",
        NsPanelHomeKit => "bridge.ns-panel-homekit",
    }
);

/// Logical origin of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Module(ModuleSource),
    Plugin(PluginSource),
    Connector(ConnectorSource),
    Automator(AutomatorSource),
    Addon(AddonSource),
    Bridge(BridgeSource),
}

impl Source {
    /// Resolves a raw tag, trying each category in priority order.
    pub fn parse(value: &str) -> Option<Source> {
        ModuleSource::parse(value)
            .map(Source::Module)
            .or_else(|| PluginSource::parse(value).map(Source::Plugin))
            .or_else(|| ConnectorSource::parse(value).map(Source::Connector))
            .or_else(|| AutomatorSource::parse(value).map(Source::Automator))
            .or_else(|| AddonSource::parse(value).map(Source::Addon))
            .or_else(|| BridgeSource::parse(value).map(Source::Bridge))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Module(s) => s.as_str(),
            Source::Plugin(s) => s.as_str(),
            Source::Connector(s) => s.as_str(),
            Source::Automator(s) => s.as_str(),
            Source::Addon(s) => s.as_str(),
            Source::Bridge(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a tag does not belong to any known source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown message source `{0}`")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::parse(s).ok_or_else(|| UnknownSource(s.to_owned()))
    }
}

impl From<ModuleSource> for Source {
    fn from(value: ModuleSource) -> Self {
        Source::Module(value)
    }
}

impl From<PluginSource> for Source {
    fn from(value: PluginSource) -> Self {
        Source::Plugin(value)
    }
}

impl From<ConnectorSource> for Source {
    fn from(value: ConnectorSource) -> Self {
        Source::Connector(value)
    }
}

impl From<AutomatorSource> for Source {
    fn from(value: AutomatorSource) -> Self {
        Source::Automator(value)
    }
}

impl From<AddonSource> for Source {
    fn from(value: AddonSource) -> Self {
        Source::Addon(value)
    }
}

impl From<BridgeSource> for Source {
    fn from(value: BridgeSource) -> Self {
        Source::Bridge(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_category() {
        assert_eq!(
            Source::parse("module.devices"),
            Some(Source::Module(ModuleSource::Devices))
        );
        assert_eq!(
            Source::parse("plugin.rabbitmq"),
            Some(Source::Plugin(PluginSource::RabbitMq))
        );
        assert_eq!(
            Source::parse("connector.shelly"),
            Some(Source::Connector(ConnectorSource::Shelly))
        );
        assert_eq!(
            Source::parse("automator.date-time"),
            Some(Source::Automator(AutomatorSource::DateTime))
        );
        assert_eq!(
            Source::parse("addon.virtual-thermostat"),
            Some(Source::Addon(AddonSource::VirtualThermostat))
        );
        assert_eq!(
            Source::parse("bridge.shelly-homekit"),
            Some(Source::Bridge(BridgeSource::ShellyHomeKit))
        );
    }

    #[test]
    fn unknown_tags_do_not_resolve() {
        assert_eq!(Source::parse("unknown.origin"), None);
        assert_eq!(Source::parse(""), None);
        assert_eq!(Source::parse("MODULE.DEVICES"), None);
        assert_eq!(
            "unknown.origin".parse::<Source>(),
            Err(UnknownSource("unknown.origin".to_owned()))
        );
    }

    #[test]
    fn tags_round_trip_through_display() {
        let all = ModuleSource::ALL
            .iter()
            .map(|s| Source::from(*s))
            .chain(PluginSource::ALL.iter().map(|s| Source::from(*s)))
            .chain(ConnectorSource::ALL.iter().map(|s| Source::from(*s)))
            .chain(AutomatorSource::ALL.iter().map(|s| Source::from(*s)))
            .chain(AddonSource::ALL.iter().map(|s| Source::from(*s)))
            .chain(BridgeSource::ALL.iter().map(|s| Source::from(*s)));

        for source in all {
            assert_eq!(source.to_string().parse::<Source>(), Ok(source));
        }
    }
}
