use bytes::Bytes;
use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::core::{Error, Mode, Result};
use super::MAX_PAYLOAD_SIZE;

/// Message type tags understood by the accessory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    GetDeviceType,
    GetDeviceTypeResponse,
    GetInformationString,
    GetInformationStringResponse,
    AdvanceWatchHands,
    SetVibrateMode,
    SetRealTimeClock,
    GetRealTimeClock,
    GetRealTimeClockResponse,
    StatusChangeEvent,
    ButtonEvent,
    WriteBuffer,
    ConfigureMode,
    ConfigureIdleBufferSize,
    UpdateDisplay,
    LoadTemplate,
    EnableButton,
    DisableButton,
    ReadButtonConfiguration,
    ReadButtonConfigurationResponse,
    BatteryConfiguration,
    LowBatteryWarning,
    LowBatteryBluetoothOff,
    ReadBatteryVoltage,
    ReadBatteryVoltageResponse,
    Accelerometer,
}

impl MessageType {
    /// Wire tag of this message type
    pub fn code(self) -> u8 {
        match self {
            MessageType::GetDeviceType => 0x01,
            MessageType::GetDeviceTypeResponse => 0x02,
            MessageType::GetInformationString => 0x03,
            MessageType::GetInformationStringResponse => 0x04,
            MessageType::AdvanceWatchHands => 0x20,
            MessageType::SetVibrateMode => 0x23,
            MessageType::SetRealTimeClock => 0x26,
            MessageType::GetRealTimeClock => 0x27,
            MessageType::GetRealTimeClockResponse => 0x28,
            MessageType::StatusChangeEvent => 0x33,
            MessageType::ButtonEvent => 0x34,
            MessageType::WriteBuffer => 0x40,
            MessageType::ConfigureMode => 0x41,
            MessageType::ConfigureIdleBufferSize => 0x42,
            MessageType::UpdateDisplay => 0x43,
            MessageType::LoadTemplate => 0x44,
            MessageType::EnableButton => 0x46,
            MessageType::DisableButton => 0x47,
            MessageType::ReadButtonConfiguration => 0x48,
            MessageType::ReadButtonConfigurationResponse => 0x49,
            MessageType::BatteryConfiguration => 0x53,
            MessageType::LowBatteryWarning => 0x54,
            MessageType::LowBatteryBluetoothOff => 0x55,
            MessageType::ReadBatteryVoltage => 0x56,
            MessageType::ReadBatteryVoltageResponse => 0x57,
            MessageType::Accelerometer => 0xea,
        }
    }

    /// Looks up a wire tag
    pub fn from_code(code: u8) -> Option<Self> {
        let ty = match code {
            0x01 => MessageType::GetDeviceType,
            0x02 => MessageType::GetDeviceTypeResponse,
            0x03 => MessageType::GetInformationString,
            0x04 => MessageType::GetInformationStringResponse,
            0x20 => MessageType::AdvanceWatchHands,
            0x23 => MessageType::SetVibrateMode,
            0x26 => MessageType::SetRealTimeClock,
            0x27 => MessageType::GetRealTimeClock,
            0x28 => MessageType::GetRealTimeClockResponse,
            0x33 => MessageType::StatusChangeEvent,
            0x34 => MessageType::ButtonEvent,
            0x40 => MessageType::WriteBuffer,
            0x41 => MessageType::ConfigureMode,
            0x42 => MessageType::ConfigureIdleBufferSize,
            0x43 => MessageType::UpdateDisplay,
            0x44 => MessageType::LoadTemplate,
            0x46 => MessageType::EnableButton,
            0x47 => MessageType::DisableButton,
            0x48 => MessageType::ReadButtonConfiguration,
            0x49 => MessageType::ReadButtonConfigurationResponse,
            0x53 => MessageType::BatteryConfiguration,
            0x54 => MessageType::LowBatteryWarning,
            0x55 => MessageType::LowBatteryBluetoothOff,
            0x56 => MessageType::ReadBatteryVoltage,
            0x57 => MessageType::ReadBatteryVoltageResponse,
            0xea => MessageType::Accelerometer,
            _ => return None,
        };
        Some(ty)
    }
}

/// A typed message as carried by one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw type tag; unknown tags are preserved so they can be logged
    pub msg_type: u8,
    /// Option byte, usually carrying a mode in its low nibble
    pub options: u8,
    /// Type-specific payload
    pub payload: Bytes,
}

/// How a button press is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPress {
    PressOnly = 0,
    PressAndRelease = 1,
    HoldAndRelease = 2,
    LongHoldAndRelease = 3,
}

/// Physical button index for each logical button A..F
pub const BUTTON_TO_PHYSICAL: [u8; 6] = [0, 1, 2, 3, 5, 6];

/// Maps a physical button index reported by the accessory to a logical button
pub fn logical_button(physical: u8) -> Option<usize> {
    BUTTON_TO_PHYSICAL.iter().position(|&p| p == physical)
}

/// Flag in the options byte of a write that carries a single row
pub const WRITE_SINGLE_ROW: u8 = 0x10;

/// Status codes carried by a status change event
pub const STATUS_MODE_CHANGE: u8 = 1;
pub const STATUS_DISPLAY_TIMEOUT: u8 = 2;

impl Message {
    /// Creates a message, rejecting payloads that do not fit into one frame
    pub fn new(msg_type: MessageType, options: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Message {
            msg_type: msg_type.code(),
            options,
            payload,
        })
    }

    /// Creates a message without payload
    pub fn empty(msg_type: MessageType, options: u8) -> Self {
        Message {
            msg_type: msg_type.code(),
            options,
            payload: Bytes::new(),
        }
    }

    /// Builds a message whose payload is statically known to fit
    fn fixed<const N: usize>(msg_type: MessageType, options: u8, payload: [u8; N]) -> Self {
        debug_assert!(N <= MAX_PAYLOAD_SIZE);
        Message {
            msg_type: msg_type.code(),
            options,
            payload: Bytes::copy_from_slice(&payload),
        }
    }

    /// Returns the decoded type tag, if known
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_code(self.msg_type)
    }

    /// Asks the accessory for its device type
    pub fn get_device_type() -> Self {
        Message::empty(MessageType::GetDeviceType, 0)
    }

    /// Asks the accessory for its capability string
    pub fn get_information_string() -> Self {
        Message::empty(MessageType::GetInformationString, 0)
    }

    /// Configures the vibration motor
    pub fn set_vibrate_mode(enable: bool, on_ms: u16, off_ms: u16, cycles: u8) -> Self {
        let [on_lo, on_hi] = on_ms.to_le_bytes();
        let [off_lo, off_hi] = off_ms.to_le_bytes();
        Message::fixed(
            MessageType::SetVibrateMode,
            0,
            [enable as u8, on_lo, on_hi, off_lo, off_hi, cycles],
        )
    }

    /// Sets the accessory's real time clock
    pub fn set_real_time_clock(time: NaiveDateTime, twenty_four_hour: bool, day_month_order: bool) -> Self {
        let [year_hi, year_lo] = (time.year().clamp(0, u16::MAX as i32) as u16).to_be_bytes();
        Message::fixed(
            MessageType::SetRealTimeClock,
            0,
            [
                year_hi,
                year_lo,
                time.month() as u8,
                time.day() as u8,
                time.weekday().num_days_from_sunday() as u8,
                time.hour() as u8,
                time.minute() as u8,
                time.second() as u8,
                twenty_four_hour as u8,
                day_month_order as u8,
            ],
        )
    }

    /// Reads back the accessory's real time clock
    pub fn get_real_time_clock() -> Self {
        Message::empty(MessageType::GetRealTimeClock, 0)
    }

    /// Configures the timeout and inversion of a display mode
    pub fn configure_mode(mode: Mode, timeout_secs: u8, invert: bool) -> Self {
        Message::fixed(MessageType::ConfigureMode, mode.code(), [timeout_secs, invert as u8])
    }

    /// Selects whether the idle buffer covers the entire screen or only the
    /// area below the accessory-drawn system area
    pub fn configure_idle_buffer_size(entire_screen: bool) -> Self {
        Message::fixed(MessageType::ConfigureIdleBufferSize, 0, [entire_screen as u8])
    }

    /// Shows the buffer of `mode`
    pub fn update_display(mode: Mode) -> Self {
        Message::empty(MessageType::UpdateDisplay, mode.code())
    }

    /// Writes one display row into the buffer of `mode`
    pub fn write_row(mode: Mode, row: u8, data: &[u8; 12]) -> Self {
        let mut payload = [0u8; 13];
        payload[0] = row;
        payload[1..].copy_from_slice(data);
        Message::fixed(MessageType::WriteBuffer, mode.code() | WRITE_SINGLE_ROW, payload)
    }

    /// Writes two display rows into the buffer of `mode`
    pub fn write_rows(mode: Mode, row_a: u8, data_a: &[u8; 12], row_b: u8, data_b: &[u8; 12]) -> Self {
        let mut payload = [0u8; 26];
        payload[0] = row_a;
        payload[1..13].copy_from_slice(data_a);
        payload[13] = row_b;
        payload[14..].copy_from_slice(data_b);
        Message::fixed(MessageType::WriteBuffer, mode.code(), payload)
    }

    /// Routes presses of a logical button in `mode` to the host
    pub fn enable_button(mode: Mode, button: usize, press: ButtonPress) -> Option<Self> {
        let physical = *BUTTON_TO_PHYSICAL.get(button)?;
        Some(Message::fixed(
            MessageType::EnableButton,
            0,
            [
                mode.code(),
                physical,
                press as u8,
                MessageType::ButtonEvent.code(),
                physical,
            ],
        ))
    }

    /// Stops routing presses of a logical button in `mode` to the host
    pub fn disable_button(mode: Mode, button: usize, press: ButtonPress) -> Option<Self> {
        let physical = *BUTTON_TO_PHYSICAL.get(button)?;
        Some(Message::fixed(
            MessageType::DisableButton,
            0,
            [mode.code(), physical, press as u8],
        ))
    }

    /// Sets the low battery warning and radio shutdown thresholds
    pub fn battery_configuration(warning_mv: u16, radio_off_mv: u16) -> Self {
        let [warn_lo, warn_hi] = warning_mv.to_le_bytes();
        let [off_lo, off_hi] = radio_off_mv.to_le_bytes();
        Message::fixed(
            MessageType::BatteryConfiguration,
            0,
            [warn_lo, warn_hi, off_lo, off_hi],
        )
    }

    /// Asks for the current battery status
    pub fn read_battery_voltage() -> Self {
        Message::empty(MessageType::ReadBatteryVoltage, 0)
    }
}

/// Battery state reported by the accessory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    pub power_good: bool,
    pub charging: bool,
    pub millivolts: u16,
}

impl BatteryStatus {
    /// Parses a battery voltage response payload
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            [power_good, charging, lo, hi, ..] => Some(BatteryStatus {
                power_good: *power_good != 0,
                charging: *charging != 0,
                millivolts: u16::from_le_bytes([*lo, *hi]),
            }),
            _ => None,
        }
    }
}

/// Kind of accessory reported in a device type response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Analog,
    Digital,
    DigitalDevBoard,
    AnalogDevBoard,
    Unknown(u8),
}

impl DeviceType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => DeviceType::Analog,
            2 => DeviceType::Digital,
            3 => DeviceType::DigitalDevBoard,
            4 => DeviceType::AnalogDevBoard,
            other => DeviceType::Unknown(other),
        }
    }
}

/// Parses a real time clock payload as sent by the accessory
pub fn parse_real_time_clock(payload: &[u8]) -> Option<NaiveDateTime> {
    match payload {
        [year_hi, year_lo, month, day, _weekday, hour, minute, second, ..] => {
            let year = u16::from_be_bytes([*year_hi, *year_lo]) as i32;
            chrono::NaiveDate::from_ymd_opt(year, *month as u32, *day as u32)?
                .and_hms_opt(*hour as u32, *minute as u32, *second as u32)
        }
        _ => None,
    }
}
