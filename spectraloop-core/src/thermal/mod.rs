//! Temperature monitoring

mod channel;
mod monitor;

pub use channel::{ChannelUpdate, SensorChannel};
pub use monitor::{
    FusedTemperature, MonitoringMode, TemperatureMonitor, ThermalEvent, ThermalEvents,
    MAX_THERMAL_EVENTS,
};
