//! Acknowledgement datagrams.
//!
//! Both `ACK` and `NACK` share one layout: the packet id, a big endian record
//! count, then each record. A record is a flag byte (`1` for a single sequence
//! number, `0` for an inclusive range) followed by one or two little endian
//! 24 bit sequence numbers.
use std::io::{Error, ErrorKind};

use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};

pub const ACK: u8 = 0xc0;
pub const NACK: u8 = 0xa0;

/// An ack record.
/// A record holds a single or range of acked packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Single(SingleRecord),
    Range(RangeRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleRecord {
    pub sequence: u32,
}

/// An inclusive range of sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRecord {
    pub start: u32,
    pub end: u32,
}

impl RangeRecord {
    /// Fixes the end of the range if it is lower than the start.
    pub fn fix(&mut self) {
        if self.end < self.start {
            std::mem::swap(&mut self.start, &mut self.end);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub id: u8,
    pub records: Vec<Record>,
}

impl Ack {
    pub fn new(nack: bool) -> Self {
        Self {
            id: if nack { NACK } else { ACK },
            records: Vec::new(),
        }
    }

    pub fn is_nack(&self) -> bool {
        self.id == NACK
    }

    /// Builds an ack from a list of sequence numbers, coalescing contiguous
    /// runs into range records. The input does not need to be sorted and may
    /// contain duplicates.
    pub fn from_records(mut sequences: Vec<u32>, nack: bool) -> Self {
        sequences.sort_unstable();
        sequences.dedup();

        let mut ack = Self::new(nack);
        let mut iter = sequences.into_iter();

        let Some(first) = iter.next() else {
            return ack;
        };

        let (mut start, mut end) = (first, first);
        for seq in iter {
            if seq == end + 1 {
                end = seq;
                continue;
            }
            ack.push_run(start, end);
            start = seq;
            end = seq;
        }
        ack.push_run(start, end);

        ack
    }

    fn push_run(&mut self, start: u32, end: u32) {
        if start == end {
            self.records
                .push(Record::Single(SingleRecord { sequence: start }));
        } else {
            self.records.push(Record::Range(RangeRecord { start, end }));
        }
    }

    /// Every sequence number covered by this ack, in record order.
    pub fn sequences(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for record in self.records.iter() {
            match record {
                Record::Single(single) => out.push(single.sequence),
                Record::Range(range) => out.extend(range.start..=range.end),
            }
        }
        out
    }
}

impl Reader<Ack> for Ack {
    fn read(buf: &mut ByteReader) -> Result<Ack, Error> {
        let id = buf.read_u8()?;
        if id != ACK && id != NACK {
            return Err(Error::new(ErrorKind::InvalidData, "Not an ack"));
        }

        let count = buf.read_u16()?;
        let mut records = Vec::with_capacity(count.min(512) as usize);

        for _ in 0..count {
            if buf.read_u8()? == 1 {
                records.push(Record::Single(SingleRecord {
                    sequence: buf.read_u24_le()?,
                }));
            } else {
                let mut record = RangeRecord {
                    start: buf.read_u24_le()?,
                    end: buf.read_u24_le()?,
                };
                record.fix();
                records.push(Record::Range(record));
            }
        }

        Ok(Ack { id, records })
    }
}

impl Writer for Ack {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), Error> {
        let count = u16::try_from(self.records.len())
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "Too many ack records"))?;

        buf.write_u8(self.id)?;
        buf.write_u16(count)?;

        for record in self.records.iter() {
            match record {
                Record::Single(rec) => {
                    buf.write_u8(1)?;
                    buf.write_u24_le(rec.sequence)?;
                }
                Record::Range(rec) => {
                    buf.write_u8(0)?;
                    buf.write_u24_le(rec.start)?;
                    buf.write_u24_le(rec.end)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_runs_become_ranges() {
        let ack = Ack::from_records(vec![5, 1, 2, 3, 9, 2], false);
        assert_eq!(
            ack.records,
            vec![
                Record::Range(RangeRecord { start: 1, end: 3 }),
                Record::Single(SingleRecord { sequence: 5 }),
                Record::Single(SingleRecord { sequence: 9 }),
            ]
        );
        assert_eq!(ack.sequences(), vec![1, 2, 3, 5, 9]);
    }

    #[test]
    fn single_record_wire_layout() {
        let ack = Ack::from_records(vec![0x010203], false);
        let bytes = ack.write_to_bytes().unwrap();
        assert_eq!(
            bytes.as_slice(),
            &[0xc0, 0x00, 0x01, 0x01, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn reads_reversed_ranges() {
        let bytes = [0xa0, 0x00, 0x01, 0x00, 0x09, 0x00, 0x00, 0x07, 0x00, 0x00];
        let nack = Ack::read_from_slice(&bytes).unwrap();
        assert!(nack.is_nack());
        assert_eq!(nack.sequences(), vec![7, 8, 9]);
    }

    #[test]
    fn empty_input_has_no_records() {
        assert!(Ack::from_records(Vec::new(), true).records.is_empty());
    }
}
