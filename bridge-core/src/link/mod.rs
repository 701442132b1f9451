//! Wireless link collaborator contracts and shared connection state.
//!
//! The radio stack itself lives outside this crate. It reports lifecycle and
//! GATT procedure results as [`LinkEvent`]s and exposes the attribute
//! primitives through [`GattServer`] (sensor side) and [`GattClient`]
//! (discovering side).

use core::fmt;

use heapless::Vec;

use crate::thermo::RECORD_LEN;

/// Connection handle assigned by the link layer.
pub type ConnectionHandle = u8;

/// Remote service handle reported by primary-service discovery.
pub type ServiceHandle = u32;

/// Attribute handle of a characteristic value (local or remote).
pub type AttributeHandle = u16;

/// Service or characteristic identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Uuid {
    /// 16-bit SIG-assigned identifier.
    Short(u16),
    /// 128-bit vendor identifier, little-endian as sent over the air.
    Long([u8; 16]),
}

impl Uuid {
    /// Little-endian bytes as handed to discovery requests.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8, 16> {
        let mut bytes = Vec::new();
        match self {
            Uuid::Short(value) => {
                // Two bytes always fit in the 16-byte buffer.
                let _ = bytes.extend_from_slice(&value.to_le_bytes());
            }
            Uuid::Long(value) => {
                let _ = bytes.extend_from_slice(value);
            }
        }
        bytes
    }
}

/// Non-success status code returned by a link primitive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStatus(pub u16);

impl LinkStatus {
    /// No connection is open to carry the request.
    pub const NOT_CONNECTED: Self = Self(0x0002);
    /// Another GATT procedure or indication is already outstanding.
    pub const BUSY: Self = Self(0x0004);
    /// Requested attribute is not present.
    pub const INVALID_HANDLE: Self = Self(0x0101);
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status=0x{:04x}", self.0)
    }
}

/// Result type returned by link primitives.
pub type LinkResult = Result<(), LinkStatus>;

/// Client characteristic configuration requested on a remote characteristic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotificationMode {
    Disabled,
    Notification,
    Indication,
}

/// Attribute-server primitives used to publish readings.
pub trait GattServer {
    /// Writes `value` into the local attribute database.
    fn write_attribute(&mut self, handle: AttributeHandle, offset: u16, value: &[u8])
    -> LinkResult;

    /// Sends an acknowledged indication to the peer.
    fn send_indication(
        &mut self,
        connection: ConnectionHandle,
        handle: AttributeHandle,
        value: &[u8],
    ) -> LinkResult;
}

/// Attribute-client primitives used to discover the remote sensor.
pub trait GattClient {
    fn discover_primary_service(&mut self, connection: ConnectionHandle, uuid: &Uuid)
    -> LinkResult;

    fn discover_characteristic(
        &mut self,
        connection: ConnectionHandle,
        service: ServiceHandle,
        uuid: &Uuid,
    ) -> LinkResult;

    fn set_characteristic_notification(
        &mut self,
        connection: ConnectionHandle,
        characteristic: AttributeHandle,
        mode: NotificationMode,
    ) -> LinkResult;
}

/// Link stand-in used when no radio stack is attached.
///
/// Attribute writes succeed, while every request that needs a peer reports
/// [`LinkStatus::NOT_CONNECTED`].
#[derive(Copy, Clone, Debug, Default)]
pub struct DetachedLink;

impl DetachedLink {
    pub const fn new() -> Self {
        Self
    }
}

impl GattServer for DetachedLink {
    fn write_attribute(&mut self, _: AttributeHandle, _: u16, _: &[u8]) -> LinkResult {
        Ok(())
    }

    fn send_indication(&mut self, _: ConnectionHandle, _: AttributeHandle, _: &[u8]) -> LinkResult {
        Err(LinkStatus::NOT_CONNECTED)
    }
}

impl GattClient for DetachedLink {
    fn discover_primary_service(&mut self, _: ConnectionHandle, _: &Uuid) -> LinkResult {
        Err(LinkStatus::NOT_CONNECTED)
    }

    fn discover_characteristic(
        &mut self,
        _: ConnectionHandle,
        _: ServiceHandle,
        _: &Uuid,
    ) -> LinkResult {
        Err(LinkStatus::NOT_CONNECTED)
    }

    fn set_characteristic_notification(
        &mut self,
        _: ConnectionHandle,
        _: AttributeHandle,
        _: NotificationMode,
    ) -> LinkResult {
        Err(LinkStatus::NOT_CONNECTED)
    }
}

/// Service/characteristic handles discovered for one remote service group.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteService {
    pub service: Option<ServiceHandle>,
    pub characteristic: Option<AttributeHandle>,
    pub indications_armed: bool,
}

/// Connection state owned by the link lifecycle handler.
///
/// The state machines read and write individual fields but never replace the
/// whole context.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionContext {
    pub connection: Option<ConnectionHandle>,
    /// Peer enabled indications on the local temperature characteristic.
    pub indications_enabled: bool,
    /// An indication was sent and its confirmation has not arrived yet.
    pub indication_in_flight: bool,
    /// Service handle from the most recent discovery result.
    pub last_service: Option<ServiceHandle>,
    /// Characteristic handle from the most recent discovery result.
    pub last_characteristic: Option<AttributeHandle>,
    pub thermometer: RemoteService,
    pub button: RemoteService,
}

impl ConnectionContext {
    pub const fn new() -> Self {
        Self {
            connection: None,
            indications_enabled: false,
            indication_in_flight: false,
            last_service: None,
            last_characteristic: None,
            thermometer: RemoteService {
                service: None,
                characteristic: None,
                indications_armed: false,
            },
            button: RemoteService {
                service: None,
                characteristic: None,
                indications_armed: false,
            },
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Connection open and the peer asked for temperature indications.
    #[must_use]
    pub const fn can_publish(&self) -> bool {
        self.is_open() && self.indications_enabled
    }

    /// Forgets everything tied to the previous connection.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Lifecycle and procedure-completion signals reported by the link stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    ConnectionOpened(ConnectionHandle),
    ConnectionClosed,
    /// Peer changed the client configuration of the temperature characteristic.
    IndicationsEnabled(bool),
    /// Peer acknowledged the outstanding indication.
    IndicationConfirmed,
    ServiceDiscovered(ServiceHandle),
    CharacteristicDiscovered(AttributeHandle),
    /// The outstanding GATT client procedure finished with the given result.
    ProcedureCompleted(LinkResult),
    /// Indication received from the remote server.
    IndicationReceived {
        characteristic: AttributeHandle,
        payload: Vec<u8, RECORD_LEN>,
    },
}

impl LinkEvent {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            LinkEvent::ConnectionOpened(_) => "connection-opened",
            LinkEvent::ConnectionClosed => "connection-closed",
            LinkEvent::IndicationsEnabled(_) => "indications-enabled",
            LinkEvent::IndicationConfirmed => "indication-confirmed",
            LinkEvent::ServiceDiscovered(_) => "service-discovered",
            LinkEvent::CharacteristicDiscovered(_) => "characteristic-discovered",
            LinkEvent::ProcedureCompleted(_) => "procedure-completed",
            LinkEvent::IndicationReceived { .. } => "indication-received",
        }
    }
}
