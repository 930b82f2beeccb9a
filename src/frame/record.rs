//! # Telemetry Record Types
//!
//! Core data definitions for one CanSat telemetry line.

/// Number of comma-separated fields in a telemetry line
/// (`TEAM_ID,TIME,ALT,PRESSURE,TEMP,AX,AY,AZ,GX,GY,GZ,SERVO`)
pub const FRAME_FIELD_COUNT: usize = 12;

/// Number of numeric channels carried by each line
pub const CHANNEL_COUNT: usize = 9;

/// Wire index of the team identifier field
pub const FIELD_TEAM_ID: usize = 0;

/// Wire index of the device-supplied mission time field
pub const FIELD_MISSION_TIME: usize = 1;

/// Wire index of the servo/deployment token field
pub const FIELD_SERVO: usize = 11;

/// Servo tokens (lowercase) that mean the payload has been deployed
const DEPLOYED_TOKENS: [&str; 4] = ["1", "deployed", "yes", "true"];

/// Numeric telemetry channel, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Altitude in meters
    Altitude,
    /// Barometric pressure in kPa
    Pressure,
    /// Temperature in °C
    Temperature,
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
}

impl Channel {
    /// All channels in wire order
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Altitude,
        Channel::Pressure,
        Channel::Temperature,
        Channel::AccelX,
        Channel::AccelY,
        Channel::AccelZ,
        Channel::GyroX,
        Channel::GyroY,
        Channel::GyroZ,
    ];

    /// Position of this channel in per-channel arrays (0-8)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Position of this channel's field in a wire line (2-10)
    pub fn field_index(self) -> usize {
        self.index() + 2
    }

    /// Stable column name used in exports and summaries
    pub fn name(self) -> &'static str {
        match self {
            Channel::Altitude => "altitude",
            Channel::Pressure => "pressure",
            Channel::Temperature => "temperature",
            Channel::AccelX => "accel_x",
            Channel::AccelY => "accel_y",
            Channel::AccelZ => "accel_z",
            Channel::GyroX => "gyro_x",
            Channel::GyroY => "gyro_y",
            Channel::GyroZ => "gyro_z",
        }
    }
}

/// Deployment state derived from the raw servo token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoState {
    Deployed,
    NotDeployed,
}

impl ServoState {
    /// Classify a raw servo token.
    ///
    /// Matches case-insensitively against `1`, `deployed`, `yes` and `true`;
    /// everything else (including an empty token) is `NotDeployed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cansat_groundstation::frame::ServoState;
    ///
    /// assert_eq!(ServoState::classify("YES"), ServoState::Deployed);
    /// assert_eq!(ServoState::classify("standby"), ServoState::NotDeployed);
    /// ```
    pub fn classify(token: &str) -> Self {
        let token = token.trim();
        if DEPLOYED_TOKENS.iter().any(|t| token.eq_ignore_ascii_case(t)) {
            ServoState::Deployed
        } else {
            ServoState::NotDeployed
        }
    }

    /// Display label for dashboards
    pub fn label(self) -> &'static str {
        match self {
            ServoState::Deployed => "DEPLOYED",
            ServoState::NotDeployed => "NOT DEPLOYED",
        }
    }
}

/// One fully validated telemetry line
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Team identifier, carried verbatim
    pub team_id: String,

    /// Device-supplied mission time, carried verbatim (not wall-clock)
    pub mission_time: String,

    /// Numeric channel values, indexed by [`Channel::index`]
    pub values: [f64; CHANNEL_COUNT],

    /// Raw servo token, kept for display and export
    pub servo: String,
}

impl TelemetryRecord {
    /// Value of a single numeric channel
    pub fn value(&self, channel: Channel) -> f64 {
        self.values[channel.index()]
    }

    pub fn altitude(&self) -> f64 {
        self.value(Channel::Altitude)
    }

    pub fn pressure(&self) -> f64 {
        self.value(Channel::Pressure)
    }

    pub fn temperature(&self) -> f64 {
        self.value(Channel::Temperature)
    }

    /// Acceleration as `[x, y, z]`
    pub fn accel(&self) -> [f64; 3] {
        [
            self.value(Channel::AccelX),
            self.value(Channel::AccelY),
            self.value(Channel::AccelZ),
        ]
    }

    /// Angular rate as `[x, y, z]`
    pub fn gyro(&self) -> [f64; 3] {
        [
            self.value(Channel::GyroX),
            self.value(Channel::GyroY),
            self.value(Channel::GyroZ),
        ]
    }

    /// Deployment state derived from the servo token
    pub fn servo_state(&self) -> ServoState {
        ServoState::classify(&self.servo)
    }
}
