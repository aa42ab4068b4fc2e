//! Fakes shared by the unit tests

use alloc::string::String;

use crate::command::Terminal;
use crate::radio::Radio;

/// Radio that records every call
#[derive(Debug, Default)]
pub(crate) struct RecordingRadio {
    pub up: bool,
    pub client: bool,
    pub inits: u32,
    pub terms: u32,
    pub host_name: String,
    pub manuf_data: Option<[u8; 4]>,
}

impl Radio for RecordingRadio {
    fn is_init(&self) -> bool {
        self.up
    }

    fn init(&mut self, host_name: &str) {
        self.up = true;
        self.inits += 1;
        self.host_name = String::from(host_name);
    }

    fn term(&mut self) {
        self.up = false;
        self.terms += 1;
    }

    fn has_client(&self) -> bool {
        self.client
    }

    fn set_adv_manuf_data(&mut self, data: &[u8]) {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&data[..4]);
        self.manuf_data = Some(bytes);
    }
}

/// Terminal collecting output in memory
#[derive(Debug)]
pub(crate) struct BufferTerminal {
    pub ready: bool,
    pub out: String,
}

impl Default for BufferTerminal {
    fn default() -> Self {
        Self {
            ready: true,
            out: String::new(),
        }
    }
}

impl BufferTerminal {
    pub fn lines(&self) -> alloc::vec::Vec<&str> {
        self.out.lines().collect()
    }
}

impl core::fmt::Write for BufferTerminal {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.out.push_str(s);
        Ok(())
    }
}

impl Terminal for BufferTerminal {
    fn is_ready(&self) -> bool {
        self.ready
    }
}
