//! Radio collaborator and the advertised session summary

use core::fmt::Write;

/// Base of the advertised host name; the configured suffix byte follows it.
pub const HOST_NAME_PREFIX: &str = "peppe";

pub type HostName = heapless::String<8>;

/// Platform radio / advertising stack
pub trait Radio {
    /// Whether the radio server is up and advertising
    fn is_init(&self) -> bool;

    /// Bring the radio up, advertising as `host_name`.
    fn init(&mut self, host_name: &str);

    /// Tear the radio down.
    fn term(&mut self);

    /// Whether a client is connected right now
    fn has_client(&self) -> bool;

    /// Replace the manufacturer-specific advertising payload.
    fn set_adv_manuf_data(&mut self, data: &[u8]);
}

/// Manufacturer data carried in every advertisement
///
/// Clients scan for this to learn whether a new session was flushed since
/// they last connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManufData {
    pub last_session_unixtime: u32,
}

impl ManufData {
    pub fn to_bytes(&self) -> [u8; 4] {
        self.last_session_unixtime.to_le_bytes()
    }

    /// Push the payload to the radio, if it is up.
    pub fn refresh<R: Radio + ?Sized>(&self, radio: &mut R) {
        if radio.is_init() {
            radio.set_adv_manuf_data(&self.to_bytes());
        }
    }
}

/// Host name for a module suffix, e.g. `peppeX`.
pub fn host_name(suffix: u8) -> HostName {
    let mut name = HostName::new();
    // Always fits: five prefix bytes plus at most two for the suffix.
    let _ = write!(name, "{}{}", HOST_NAME_PREFIX, suffix as char);
    name
}
