use core::future::Future;

use packed_struct::prelude::*;
use serde::{Deserialize, Serialize};

pub trait CanBusFrame {
    fn id(&self) -> u32;
    fn data(&self) -> &[u8];
}

impl CanBusFrame for (u32, &[u8]) {
    fn id(&self) -> u32 {
        self.0
    }

    fn data(&self) -> &[u8] {
        self.1
    }
}

impl<const N: usize> CanBusFrame for (u32, &[u8; N]) {
    fn id(&self) -> u32 {
        self.0
    }

    fn data(&self) -> &[u8] {
        self.1
    }
}

pub trait CanBusTX {
    #[cfg(feature = "defmt")]
    type Error: defmt::Format + core::fmt::Debug;
    #[cfg(not(feature = "defmt"))]
    type Error: core::fmt::Debug;

    /// Send a frame with the given ID and data. data must be
    /// not empty and not more than 8 bytes.
    fn send(&mut self, id: u32, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;
}

pub trait CanBusRX {
    #[cfg(feature = "defmt")]
    type Error: defmt::Format + core::fmt::Debug;
    #[cfg(not(feature = "defmt"))]
    type Error: core::fmt::Debug;
    type Frame: CanBusFrame;

    fn receive(&mut self) -> impl Future<Output = Result<Self::Frame, Self::Error>>;
}

/// CAN id layout of the transfer service: the low byte selects the device,
/// the next byte selects the command. Bits above 16 are unused.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(PackedStruct, Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[packed_struct(endian = "msb", size_bytes = "2")]
#[repr(C)]
pub struct TransferCanId {
    pub command_id: u8,
    pub device_id: u8,
}

impl TransferCanId {
    pub fn new(command_id: u8, device_id: u8) -> Self {
        Self {
            command_id,
            device_id,
        }
    }

    pub fn from_raw(raw: u32) -> Self {
        Self::unpack(&(raw as u16).to_be_bytes()).unwrap()
    }
}

impl Into<u32> for TransferCanId {
    fn into(self) -> u32 {
        u16::from_be_bytes(self.pack().unwrap()) as u32
    }
}
