use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, MSB first, no reflection, no final XOR
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Frame checksum over header and payload
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
