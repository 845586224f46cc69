/*
Copyright (c) 2020 Todd Stellanova
LICENSE: BSD3 (see LICENSE file)
*/

use crate::Error;
use embedded_hal::blocking::i2c::{Write, WriteRead};

/// Addressed register access over the two-wire bus.
///
/// Every transaction starts with the 16-bit register address, big-endian,
/// followed by the value bytes (writes) or a repeated-start read (reads).
/// No retries are made: a failed or short transfer is returned as-is.
pub struct RegisterBus<I2C> {
    address: u8,
    i2c: I2C,
}

impl<I2C, CommE> RegisterBus<I2C>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { address, i2c }
    }

    /// Write the low `width` bytes of `val`, most significant first
    pub fn write_reg(&mut self, reg: u16, width: usize, val: u32) -> Result<(), Error<CommE>> {
        if width == 0 || width > 4 {
            return Err(Error::InvalidArgument);
        }
        let mut write_buf = [0u8; 6];
        write_buf[..2].copy_from_slice(&reg.to_be_bytes());
        write_buf[2..2 + width].copy_from_slice(&val.to_be_bytes()[4 - width..]);
        self.i2c
            .write(self.address, &write_buf[..2 + width])
            .map_err(Error::Comm)
    }

    /// Read `width` bytes, reassembled big-endian into the low bytes
    pub fn read_reg(&mut self, reg: u16, width: usize) -> Result<u32, Error<CommE>> {
        if width == 0 || width > 4 {
            return Err(Error::InvalidArgument);
        }
        let mut recv_buf = [0u8; 4];
        self.i2c
            .write_read(self.address, &reg.to_be_bytes(), &mut recv_buf[4 - width..])
            .map_err(Error::Comm)?;
        Ok(u32::from_be_bytes(recv_buf))
    }

    /// Write a u8 to a 16-bit address
    pub fn write_reg_u8(&mut self, reg: u16, val: u8) -> Result<(), Error<CommE>> {
        self.write_reg(reg, 1, val as u32)
    }

    /// Read a u8 from a 16-bit address
    pub fn read_reg_u8(&mut self, reg: u16) -> Result<u8, Error<CommE>> {
        Ok(self.read_reg(reg, 1)? as u8)
    }

    /// Read a u16 from a 16-bit address
    pub fn read_reg_u16(&mut self, reg: u16) -> Result<u16, Error<CommE>> {
        Ok(self.read_reg(reg, 2)? as u16)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
