//! Protobuf payloads carried inside sealed frames.

/// MultiSensor status report. Every reading is optional.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MultiSensorStatus {
    #[prost(message, optional, tag = "1")]
    pub temperature: Option<Temperature>,
    #[prost(message, optional, tag = "2")]
    pub humidity: Option<Humidity>,
    #[prost(message, optional, tag = "3")]
    pub ambient_light: Option<AmbientLight>,
    #[prost(message, optional, tag = "4")]
    pub battery: Option<Battery>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Temperature {
    #[prost(float, tag = "1")]
    pub value_c: f32,
    #[prost(float, tag = "2")]
    pub value_f: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Humidity {
    #[prost(float, tag = "1")]
    pub value: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AmbientLight {
    #[prost(float, tag = "1")]
    pub value: f32,
    #[prost(float, tag = "2")]
    pub white_value: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Battery {
    #[prost(uint32, tag = "1")]
    pub voltage_mv: u32,
}

/// LoveHeart status report.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LoveHeartStatus {
    /// Centi-degrees Celsius.
    #[prost(int32, tag = "1")]
    pub temperature: i32,
    #[prost(uint32, tag = "2")]
    pub humidity: u32,
    #[prost(uint32, tag = "3")]
    pub voltage_mv: u32,
    #[prost(uint32, tag = "4")]
    pub battery_percents: u32,
    #[prost(uint32, tag = "5")]
    pub light_als: u32,
    #[prost(uint32, tag = "6")]
    pub light_white: u32,
    #[prost(bool, tag = "7")]
    pub charging: bool,
    #[prost(bool, tag = "8")]
    pub animation: bool,
}

/// Reply sent while the LoveHeart is still listening.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LoveHeartStatusResponse {
    #[prost(bool, tag = "1")]
    pub enable_animation: bool,
    #[prost(uint32, tag = "2")]
    pub sequence: u32,
    #[prost(uint32, tag = "3")]
    pub magic: u32,
}

/// LED strip channel levels, both reported and commanded.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LedStripStatus {
    #[prost(uint32, repeated, tag = "1")]
    pub channels: Vec<u32>,
}
